use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::summary::{IncidentSummaryResponse, SummaryReport, UNASSIGNED};

static RE_NAME_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s_-]+").unwrap());

/// What the dashboard should show for a fetch outcome.
#[derive(Debug)]
pub enum DashboardView<'a> {
    NotConfigured,
    FetchError(&'a Error),
    Empty { generated_at: &'a str },
    Summary(&'a IncidentSummaryResponse),
}

impl<'a> DashboardView<'a> {
    /// The empty state is chosen only when no incidents were fetched; a non-empty
    /// list whose counts are all zero still shows the summary.
    pub fn classify(outcome: &'a Result<SummaryReport>) -> Self {
        match outcome {
            Err(Error::MissingConfig) => DashboardView::NotConfigured,
            Err(e) => DashboardView::FetchError(e),
            Ok(report) if report.incident_count == 0 => DashboardView::Empty {
                generated_at: &report.response.generated_at,
            },
            Ok(report) => DashboardView::Summary(&report.response),
        }
    }
}

/// Display form of a resolver name: `jane_doe` becomes `Jane Doe`.
pub fn format_assignee_name(name: &str) -> String {
    if name == UNASSIGNED {
        return name.to_string();
    }
    RE_NAME_SEPARATORS
        .split(name)
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Plain-text dashboard sections for a summary.
pub struct SummaryText<'a>(pub &'a IncidentSummaryResponse);

impl fmt::Display for SummaryText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.0.summary;
        writeln!(f, "Incident Status (generated {})", self.0.generated_at)?;
        writeln!(f)?;
        writeln!(f, "Today")?;
        writeln!(f, "  Total Incident Count:        {}", s.today_total)?;
        writeln!(f, "  Today Raised Incident:       {}", s.today_raised)?;
        writeln!(f, "  Today Resolved Incident:     {}", s.today_resolved)?;
        writeln!(f)?;
        writeln!(f, "Yesterday")?;
        writeln!(f, "  Yesterday Raised Incident:   {}", s.yesterday_raised)?;
        writeln!(f, "  Yesterday Resolved Incident: {}", s.yesterday_resolved)?;
        writeln!(f)?;
        writeln!(f, "Current Month")?;
        writeln!(f, "  Total Incidents:             {}", s.current_month_total)?;
        writeln!(f, "  Resolved Incidents:          {}", s.current_month_resolved)?;
        writeln!(f)?;
        writeln!(f, "Backlog")?;
        writeln!(f, "  Not Assigned:                {}", s.not_assigned)?;
        writeln!(f, "  On Hold:                     {}", s.on_hold_total)?;
        writeln!(f)?;
        writeln!(f, "Resolved By")?;
        if s.resolved_by.is_empty() {
            writeln!(f, "  No resolved incidents yet.")?;
        }
        for (rank, resolver) in s.resolved_by.iter().enumerate() {
            writeln!(
                f,
                "  {:>2}. {:<24} {}",
                rank + 1,
                format_assignee_name(&resolver.name),
                resolver.count
            )?;
        }
        Ok(())
    }
}

/// Render a summary as plain-text dashboard sections.
pub fn render_summary(response: &IncidentSummaryResponse) -> String {
    SummaryText(response).to_string()
}

/// Render any fetch outcome, with a distinct message per failure kind.
pub fn render_outcome(outcome: &Result<SummaryReport>) -> String {
    match DashboardView::classify(outcome) {
        DashboardView::NotConfigured => {
            "ServiceNow configuration not found. Save your API details with \
             `incidentpulse config set --base-url <URL> --token <TOKEN>`.\n"
                .to_string()
        }
        DashboardView::FetchError(e) => format!("Failed to fetch ServiceNow data: {e}\n"),
        DashboardView::Empty { generated_at } => {
            format!("No incidents to report (generated {generated_at}).\n")
        }
        DashboardView::Summary(response) => render_summary(response),
    }
}
