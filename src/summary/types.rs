use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle label of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    Resolved,
    OnHold,
}

/// A single incident record, as handed to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    pub status: IncidentStatus,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

impl Incident {
    /// The assignee, treating an empty string as unassigned.
    pub fn assignee(&self) -> Option<&str> {
        self.assigned_to.as_deref().filter(|name| !name.is_empty())
    }
}

/// One leaderboard row: how many incidents a resolver closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverCount {
    pub name: String,
    pub count: u64,
}

/// Rolled-up incident counts relative to a reference time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentSummary {
    pub today_total: u64,
    pub today_raised: u64,
    pub today_resolved: u64,
    pub yesterday_raised: u64,
    pub yesterday_resolved: u64,
    pub current_month_total: u64,
    pub current_month_resolved: u64,
    pub not_assigned: u64,
    pub on_hold_total: u64,
    /// Sorted by count descending, then name ascending.
    pub resolved_by: Vec<ResolverCount>,
}

/// Payload returned by the summary endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentSummaryResponse {
    pub summary: IncidentSummary,
    /// ISO-8601 UTC timestamp of when the summary was computed.
    pub generated_at: String,
}

/// A computed summary plus the number of incidents it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryReport {
    pub incident_count: usize,
    pub response: IncidentSummaryResponse,
}
