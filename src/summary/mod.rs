pub mod types;

pub use types::*;

use std::collections::BTreeMap;

use chrono::{DateTime, Local, TimeZone};

use crate::date_util::{
    is_same_day, local_wall_clock, previous_day_start, start_of_day, start_of_month,
};

/// Resolver name credited when a resolved incident has no assignee.
pub const UNASSIGNED: &str = "Unassigned";

/// Compute the incident summary relative to the current local time.
pub fn compute_summary_now(incidents: &[Incident]) -> IncidentSummary {
    compute_summary(incidents, &Local::now())
}

/// Compute the incident summary relative to `now`.
///
/// Every timestamp is viewed in `now`'s time zone and bucketed by calendar day and
/// calendar month of that wall clock. An incident may land in several buckets.
/// `status` and `resolved_at` are read independently; neither is derived from
/// the other.
pub fn compute_summary<Tz: TimeZone>(
    incidents: &[Incident],
    now: &DateTime<Tz>,
) -> IncidentSummary {
    let tz = now.timezone();
    let now_local = now.naive_local();
    let today_start = start_of_day(now_local);
    let yesterday_start = previous_day_start(today_start);
    let month_start = start_of_month(now_local);

    let mut summary = IncidentSummary::default();
    let mut resolved_counts: BTreeMap<&str, u64> = BTreeMap::new();

    for incident in incidents {
        let created = local_wall_clock(&incident.created_at, &tz);
        let resolved = incident
            .resolved_at
            .as_ref()
            .map(|r| local_wall_clock(r, &tz));

        if created >= today_start {
            summary.today_total += 1;
            summary.today_raised += 1;
        }
        if created >= yesterday_start && created < today_start {
            summary.yesterday_raised += 1;
        }
        if created >= month_start {
            summary.current_month_total += 1;
        }

        if let Some(resolved) = resolved {
            if is_same_day(resolved, now_local) {
                summary.today_resolved += 1;
            }
            if resolved >= yesterday_start && resolved < today_start {
                summary.yesterday_resolved += 1;
            }
            if resolved >= month_start {
                summary.current_month_resolved += 1;
            }
            let name = incident.assignee().unwrap_or(UNASSIGNED);
            *resolved_counts.entry(name).or_insert(0) += 1;
        }

        if incident.assignee().is_none() {
            summary.not_assigned += 1;
        }
        if incident.status == IncidentStatus::OnHold {
            summary.on_hold_total += 1;
        }
    }

    summary.resolved_by = rank_resolvers(resolved_counts);
    summary
}

/// Order resolver counts by count descending, then name ascending.
fn rank_resolvers(counts: BTreeMap<&str, u64>) -> Vec<ResolverCount> {
    // BTreeMap iterates in name order; the stable sort keeps it within equal counts.
    let mut ranked: Vec<ResolverCount> = counts
        .into_iter()
        .map(|(name, count)| ResolverCount {
            name: name.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}
