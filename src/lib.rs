pub mod config;
pub mod date_util;
pub mod error;
pub mod report;
pub mod server;
pub mod source;
pub mod summary;

pub use config::{
    ConfigProvider, ConfigState, FileConfigStore, MemoryConfigStore, ServiceNowConfig,
};
pub use error::{Error, Result};
pub use source::{IncidentProvider, MockOptions, MockSource, ServiceNowSource, Source};
pub use summary::{
    compute_summary, compute_summary_now, Incident, IncidentStatus, IncidentSummary,
    IncidentSummaryResponse, ResolverCount, SummaryReport,
};

use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};

/// Main entry point: binds an incident source to the summary computation.
pub struct IncidentPulse<P> {
    provider: P,
}

impl<P: IncidentProvider> IncidentPulse<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Fetch incidents and summarize them against the current local time.
    pub async fn summary(&self, query: Option<String>) -> Result<SummaryReport> {
        self.summary_at(query, &Local::now()).await
    }

    /// Fetch incidents and summarize them against `now`.
    pub async fn summary_at<Tz: TimeZone>(
        &self,
        query: Option<String>,
        now: &DateTime<Tz>,
    ) -> Result<SummaryReport> {
        let incidents = self.provider.incidents(query).await?;
        log::debug!("Summarizing {} incidents", incidents.len());
        Ok(SummaryReport {
            incident_count: incidents.len(),
            response: IncidentSummaryResponse {
                summary: compute_summary(&incidents, now),
                generated_at: generated_at_now(),
            },
        })
    }
}

/// Current UTC time in ISO-8601 with millisecond precision.
pub fn generated_at_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
