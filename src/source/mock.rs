use std::future::Future;

use chrono::{DateTime, Days, Duration, Local, NaiveTime, TimeZone, Utc};

use crate::date_util::resolve_local;
use crate::error::Result;
use crate::source::IncidentProvider;
use crate::summary::{Incident, IncidentStatus};

const ASSIGNEES: [Option<&str>; 5] = [
    Some("alice"),
    Some("bob"),
    Some("carol"),
    Some("dave"),
    None,
];

/// Options for the mock generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockOptions {
    /// Number of days before today to generate; today is always included.
    pub days_back: u32,
    pub seed: u32,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            days_back: 120,
            seed: 123_456,
        }
    }
}

/// mulberry32: small, fast, seedable 32-bit PRNG.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        f64::from(t ^ (t >> 14)) / 4_294_967_296.0
    }

    /// Uniform integer in `[0, n)`.
    pub fn below(&mut self, n: u32) -> u32 {
        (self.next_f64() * f64::from(n)).floor() as u32
    }
}

/// Generate a deterministic incident history ending on `now`'s calendar day.
///
/// Each day gets 20-59 incidents at random times. Roughly 60% are open, 25%
/// resolved within 0-2 days and 15% on hold. A resolution that would land after
/// `now` leaves the incident open with no resolution time. A resolution is never
/// earlier than its creation.
pub fn generate_incidents<Tz: TimeZone>(
    options: &MockOptions,
    now: &DateTime<Tz>,
) -> Vec<Incident> {
    let tz = now.timezone();
    let now_utc = now.with_timezone(&Utc);
    let today = now.naive_local().date();
    let mut rng = Mulberry32::new(options.seed);
    let mut incidents = Vec::new();
    let mut next_id: u32 = 1;

    for days_ago in (0..=options.days_back).rev() {
        let day = today - Days::new(u64::from(days_ago));
        let day_start = day.and_time(NaiveTime::MIN);
        let daily_count = 20 + rng.below(40);

        for _ in 0..daily_count {
            let hour = rng.below(24);
            let minute = rng.below(60);
            let created_local =
                day_start + Duration::hours(i64::from(hour)) + Duration::minutes(i64::from(minute));
            let created_at = resolve_local(&tz, created_local).with_timezone(&Utc);

            let status_roll = rng.next_f64();
            let mut status = if status_roll < 0.6 {
                IncidentStatus::Open
            } else if status_roll < 0.85 {
                IncidentStatus::Resolved
            } else {
                IncidentStatus::OnHold
            };

            let mut resolved_at = None;
            if status == IncidentStatus::Resolved {
                let delay_days = rng.below(3);
                let extra_hours = rng.below(6);
                let resolve_minute = rng.below(60);
                // Hours past 23 roll over into the following day.
                let resolved_local = (day_start + Days::new(u64::from(delay_days)))
                    + Duration::hours(i64::from(hour + extra_hours))
                    + Duration::minutes(i64::from(resolve_minute));
                // Same-hour resolutions draw a fresh minute that may precede creation.
                let resolved = resolve_local(&tz, resolved_local)
                    .with_timezone(&Utc)
                    .max(created_at);
                if resolved <= now_utc {
                    resolved_at = Some(resolved);
                } else {
                    status = IncidentStatus::Open;
                }
            }

            let assignee = ASSIGNEES[rng.below(ASSIGNEES.len() as u32) as usize];

            incidents.push(Incident {
                id: format!("INC{next_id:06}"),
                created_at,
                resolved_at,
                status,
                assigned_to: assignee.map(str::to_string),
            });
            next_id += 1;
        }
    }

    log::debug!(
        "Generated {} mock incidents over {} days (seed {})",
        incidents.len(),
        options.days_back + 1,
        options.seed
    );
    incidents
}

/// Incident source backed by a pre-generated mock history.
#[derive(Debug, Clone)]
pub struct MockSource {
    incidents: Vec<Incident>,
}

impl MockSource {
    /// Generate a history ending today (local time).
    pub fn new(options: MockOptions) -> Self {
        Self::generate_at(options, &Local::now())
    }

    /// Generate a history ending on `now`'s calendar day.
    pub fn generate_at<Tz: TimeZone>(options: MockOptions, now: &DateTime<Tz>) -> Self {
        Self {
            incidents: generate_incidents(&options, now),
        }
    }

    /// Wrap an explicit incident list.
    pub fn from_incidents(incidents: Vec<Incident>) -> Self {
        Self { incidents }
    }

    pub fn records(&self) -> &[Incident] {
        &self.incidents
    }
}

impl IncidentProvider for MockSource {
    fn incidents(
        &self,
        _query: Option<String>,
    ) -> impl Future<Output = Result<Vec<Incident>>> + Send {
        let incidents = self.incidents.clone();
        async move { Ok(incidents) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use std::collections::{BTreeMap, HashSet};

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2025, 6, 15, 14, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_mulberry32_reference_sequence() {
        let mut rng = Mulberry32::new(123_456);
        assert_eq!(rng.next_f64(), 0.38233304349705577);
        assert_eq!(rng.next_f64(), 0.7972629074938595);
        assert_eq!(rng.next_f64(), 0.9965302373748273);
    }

    #[test]
    fn test_below_stays_in_range() {
        let mut rng = Mulberry32::new(7);
        for _ in 0..10_000 {
            assert!(rng.below(5) < 5);
        }
    }

    #[test]
    fn test_same_seed_is_byte_identical() {
        let options = MockOptions::default();
        let a = generate_incidents(&options, &now());
        let b = generate_incidents(&options, &now());
        assert_eq!(a, b);
        assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());
    }

    #[test]
    fn test_different_seed_differs() {
        let a = generate_incidents(&MockOptions { seed: 1, days_back: 10 }, &now());
        let b = generate_incidents(&MockOptions { seed: 2, days_back: 10 }, &now());
        assert_ne!(a, b);
    }

    #[test]
    fn test_daily_counts_and_ids() {
        let options = MockOptions { seed: 99, days_back: 30 };
        let incidents = generate_incidents(&options, &now());
        let tz = now().timezone();

        let mut per_day: BTreeMap<chrono::NaiveDate, u32> = BTreeMap::new();
        for incident in &incidents {
            *per_day
                .entry(incident.created_at.with_timezone(&tz).date_naive())
                .or_insert(0) += 1;
        }
        assert_eq!(per_day.len(), 31);
        for count in per_day.values() {
            assert!((20..60).contains(count), "daily count {count} out of range");
        }

        let ids: HashSet<&str> = incidents.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids.len(), incidents.len());
        assert_eq!(incidents[0].id, "INC000001");
    }

    #[test]
    fn test_resolutions_never_in_future() {
        let now = now();
        let now_utc = now.with_timezone(&Utc);
        let incidents = generate_incidents(&MockOptions::default(), &now);
        for incident in &incidents {
            match incident.status {
                IncidentStatus::Resolved => {
                    let resolved = incident.resolved_at.unwrap();
                    assert!(resolved <= now_utc);
                    assert!(resolved >= incident.created_at);
                }
                _ => assert!(incident.resolved_at.is_none()),
            }
        }
    }

    #[test]
    fn test_same_hour_resolution_is_not_before_creation() {
        let now = now();
        let incidents = generate_incidents(&MockOptions::default(), &now);
        let same_hour: Vec<&Incident> = incidents
            .iter()
            .filter(|i| i.resolved_at.is_some_and(|r| r - i.created_at < Duration::hours(1)))
            .collect();
        assert!(!same_hour.is_empty());
        for incident in same_hour {
            assert!(incident.resolved_at >= Some(incident.created_at), "{}", incident.id);
        }
    }

    #[test]
    fn test_status_distribution_is_roughly_60_25_15() {
        let incidents = generate_incidents(&MockOptions::default(), &now());
        let total = incidents.len() as f64;
        let share = |status: IncidentStatus| {
            incidents.iter().filter(|i| i.status == status).count() as f64 / total
        };
        assert!((0.55..0.68).contains(&share(IncidentStatus::Open)));
        assert!((0.20..0.30).contains(&share(IncidentStatus::Resolved)));
        assert!((0.12..0.18).contains(&share(IncidentStatus::OnHold)));
    }

    #[tokio::test]
    async fn test_mock_source_serves_the_same_list_every_call() {
        let source = MockSource::generate_at(MockOptions { seed: 5, days_back: 3 }, &now());
        let first = source.incidents(None).await.unwrap();
        let second = source.incidents(Some("ignored=1".into())).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_slice(), source.records());
    }
}
