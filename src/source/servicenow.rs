use std::future::Future;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::config::{ConfigProvider, ConfigState, ServiceNowConfig};
use crate::date_util::resolve_local;
use crate::error::{Error, Result};
use crate::source::IncidentProvider;
use crate::summary::{Incident, IncidentStatus};

/// Timestamp layout used by the ServiceNow table API.
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One raw incident row as returned by ServiceNow.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceNowRecord {
    pub sys_id: String,
    #[serde(default)]
    pub opened_at: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceNowResult {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<ServiceNowRecord>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceNowResponse {
    #[serde(default)]
    pub result: Option<ServiceNowResult>,
}

/// Parse a ServiceNow timestamp as wall-clock time in `tz`.
///
/// Blank and unparseable values yield `None`.
pub fn parse_servicenow_date<Tz: TimeZone>(value: Option<&str>, tz: &Tz) -> Option<DateTime<Utc>> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        return None;
    }
    match NaiveDateTime::parse_from_str(trimmed, DATE_FORMAT) {
        Ok(naive) => Some(resolve_local(tz, naive).with_timezone(&Utc)),
        Err(e) => {
            log::warn!("Failed to parse ServiceNow date '{trimmed}': {e}");
            None
        }
    }
}

/// Map a free-form ServiceNow state label onto an incident status.
pub fn map_state_to_status(state: Option<&str>) -> IncidentStatus {
    let normalized = state.unwrap_or("").to_lowercase();
    if normalized.contains("resolved") {
        IncidentStatus::Resolved
    } else if normalized.contains("hold") {
        IncidentStatus::OnHold
    } else {
        IncidentStatus::Open
    }
}

/// Convert a raw record into an [`Incident`].
///
/// A missing or malformed open time falls back to `now`; a malformed
/// resolution time is dropped.
pub fn map_record_to_incident<Tz: TimeZone>(
    record: &ServiceNowRecord,
    now: &DateTime<Tz>,
) -> Incident {
    let tz = now.timezone();
    let created_at = parse_servicenow_date(record.opened_at.as_deref(), &tz)
        .unwrap_or_else(|| now.with_timezone(&Utc));
    Incident {
        id: record.sys_id.clone(),
        created_at,
        resolved_at: parse_servicenow_date(record.resolved_at.as_deref(), &tz),
        status: map_state_to_status(record.state.as_deref()),
        assigned_to: record
            .assigned_to
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    }
}

/// Map every record of a response, treating a missing `result.data` as empty.
pub fn incidents_from_response<Tz: TimeZone>(
    response: &ServiceNowResponse,
    now: &DateTime<Tz>,
) -> Vec<Incident> {
    response
        .result
        .as_ref()
        .and_then(|r| r.data.as_ref())
        .map(|records| {
            records
                .iter()
                .map(|record| map_record_to_incident(record, now))
                .collect()
        })
        .unwrap_or_default()
}

/// Build the request URL from the base URL plus an optional query string.
///
/// `query` overrides the configured default query when given.
pub fn build_servicenow_url(config: &ServiceNowConfig, query: Option<&str>) -> String {
    let base = config.base_url.trim();
    let query = query
        .or(config.default_query.as_deref())
        .unwrap_or("")
        .trim();
    if query.is_empty() {
        return base.to_string();
    }
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

/// Incident source that queries the ServiceNow table API.
///
/// The connection settings are read once from the provider and kept current
/// through its change notifications.
pub struct ServiceNowSource {
    http: reqwest::Client,
    config: Arc<RwLock<ConfigState>>,
}

impl ServiceNowSource {
    pub fn new(provider: &dyn ConfigProvider) -> Result<Self> {
        Self::with_client(provider, reqwest::Client::new())
    }

    pub fn with_client(provider: &dyn ConfigProvider, http: reqwest::Client) -> Result<Self> {
        let config = Arc::new(RwLock::new(provider.load()?));
        let snapshot = Arc::clone(&config);
        provider.on_change(Box::new(move |state| {
            log::info!(
                "ServiceNow configuration {}",
                if state.is_configured() { "updated" } else { "cleared" }
            );
            if let Ok(mut current) = snapshot.write() {
                *current = state.clone();
            }
        }));
        Ok(Self { http, config })
    }

    /// Current settings, or [`Error::MissingConfig`].
    pub fn current_config(&self) -> Result<ServiceNowConfig> {
        self.config
            .read()
            .map_err(|e| Error::Config(e.to_string()))?
            .clone()
            .require()
    }

    /// Fetch and map incidents, using `query` in place of the default query.
    pub async fn fetch(&self, query: Option<&str>) -> Result<Vec<Incident>> {
        let config = self.current_config()?;
        let url = build_servicenow_url(&config, query);
        log::debug!("Fetching ServiceNow incidents from {url}");

        let response = self
            .http
            .get(&url)
            .bearer_auth(config.token.trim())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("ServiceNow request failed with {status}");
            return Err(Error::Transport {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
                body,
            });
        }

        let payload: ServiceNowResponse = response.json().await?;
        let incidents = incidents_from_response(&payload, &Local::now());
        log::info!("Fetched {} incidents from ServiceNow", incidents.len());
        Ok(incidents)
    }
}

impl IncidentProvider for ServiceNowSource {
    fn incidents(
        &self,
        query: Option<String>,
    ) -> impl Future<Output = Result<Vec<Incident>>> + Send {
        async move { self.fetch(query.as_deref()).await }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;
    use axum::extract::RawQuery;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use chrono::FixedOffset;

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 1800).unwrap()
    }

    fn config(base_url: &str) -> ServiceNowConfig {
        ServiceNowConfig {
            base_url: base_url.into(),
            token: "  tok-123  ".into(),
            default_query: Some("sysparm_limit=50".into()),
        }
    }

    #[test]
    fn test_parse_date_in_zone() {
        let parsed = parse_servicenow_date(Some(" 2025-03-14 09:15:00 "), &tz()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 14, 3, 45, 0).unwrap());
    }

    #[test]
    fn test_parse_date_rejects_blank_and_garbage() {
        assert!(parse_servicenow_date(None, &tz()).is_none());
        assert!(parse_servicenow_date(Some("   "), &tz()).is_none());
        assert!(parse_servicenow_date(Some("2025-03-14T09:15:00Z"), &tz()).is_none());
        assert!(parse_servicenow_date(Some("yesterday"), &tz()).is_none());
    }

    #[test]
    fn test_map_state_to_status() {
        assert_eq!(map_state_to_status(Some("Resolved")), IncidentStatus::Resolved);
        assert_eq!(map_state_to_status(Some("RESOLVED - closed")), IncidentStatus::Resolved);
        assert_eq!(map_state_to_status(Some("On Hold")), IncidentStatus::OnHold);
        assert_eq!(map_state_to_status(Some("awaiting_hold")), IncidentStatus::OnHold);
        assert_eq!(map_state_to_status(Some("In Progress")), IncidentStatus::Open);
        assert_eq!(map_state_to_status(None), IncidentStatus::Open);
    }

    #[test]
    fn test_map_record_with_malformed_dates() {
        let now = tz().with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        let record = ServiceNowRecord {
            sys_id: "abc".into(),
            opened_at: Some("not a date".into()),
            resolved_at: Some("also bad".into()),
            assigned_to: Some("   ".into()),
            state: Some("Resolved".into()),
        };
        let incident = map_record_to_incident(&record, &now);
        assert_eq!(incident.id, "abc");
        assert_eq!(incident.created_at, now.with_timezone(&Utc));
        assert!(incident.resolved_at.is_none());
        assert_eq!(incident.status, IncidentStatus::Resolved);
        assert!(incident.assigned_to.is_none());
    }

    #[test]
    fn test_map_record_trims_assignee() {
        let now = tz().with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        let record = ServiceNowRecord {
            sys_id: "x".into(),
            opened_at: Some("2025-03-14 08:00:00".into()),
            resolved_at: None,
            assigned_to: Some("  jane_doe ".into()),
            state: None,
        };
        let incident = map_record_to_incident(&record, &now);
        assert_eq!(incident.assigned_to.as_deref(), Some("jane_doe"));
        assert_eq!(incident.status, IncidentStatus::Open);
    }

    #[test]
    fn test_incidents_from_response_handles_missing_data() {
        let now = tz().with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        let empty: ServiceNowResponse = serde_json::from_str("{}").unwrap();
        assert!(incidents_from_response(&empty, &now).is_empty());

        let no_data: ServiceNowResponse =
            serde_json::from_str(r#"{"result":{"status":"ok"}}"#).unwrap();
        assert!(incidents_from_response(&no_data, &now).is_empty());

        let full: ServiceNowResponse = serde_json::from_str(
            r#"{"result":{"data":[{"sys_id":"1","opened_at":"2025-03-14 08:00:00","state":"On Hold"},{"sys_id":"2"}]}}"#,
        )
        .unwrap();
        let incidents = incidents_from_response(&full, &now);
        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[0].status, IncidentStatus::OnHold);
    }

    #[test]
    fn test_build_url() {
        let cfg = config(" https://sn.example/api/now/table/incident ");
        assert_eq!(
            build_servicenow_url(&cfg, None),
            "https://sn.example/api/now/table/incident?sysparm_limit=50"
        );
        assert_eq!(
            build_servicenow_url(&cfg, Some("state=2")),
            "https://sn.example/api/now/table/incident?state=2"
        );

        let with_query = config("https://sn.example/api?x=1");
        assert_eq!(
            build_servicenow_url(&with_query, None),
            "https://sn.example/api?x=1&sysparm_limit=50"
        );

        let mut no_default = config("https://sn.example/api");
        no_default.default_query = None;
        assert_eq!(build_servicenow_url(&no_default, Some("  ")), "https://sn.example/api");
    }

    async fn spawn_fake(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api/now/table/incident")
    }

    #[tokio::test]
    async fn test_missing_config_is_distinct_error() {
        let store = MemoryConfigStore::new();
        let source = ServiceNowSource::new(&store).unwrap();
        assert!(matches!(source.fetch(None).await, Err(Error::MissingConfig)));
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer_token_and_query() {
        let router = Router::new().route(
            "/api/now/table/incident",
            get(|headers: HeaderMap, RawQuery(query): RawQuery| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                if auth != "Bearer tok-123" || query.as_deref() != Some("state=1") {
                    return Err((StatusCode::UNAUTHORIZED, format!("auth={auth} query={query:?}")));
                }
                Ok(Json(serde_json::json!({
                    "result": {
                        "status": "success",
                        "data": [
                            {"sys_id": "a1", "opened_at": "2025-03-14 08:00:00", "assigned_to": "alice", "state": "Resolved", "resolved_at": "2025-03-14 09:00:00"},
                            {"sys_id": "a2", "opened_at": "2025-03-13 08:00:00", "state": "New"}
                        ]
                    }
                })))
            }),
        );
        let base = spawn_fake(router).await;
        let store = MemoryConfigStore::with_config(config(&base));
        let source = ServiceNowSource::new(&store).unwrap();

        let incidents = source.fetch(Some("state=1")).await.unwrap();
        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[0].assigned_to.as_deref(), Some("alice"));
        assert!(incidents[0].resolved_at.is_some());
        assert_eq!(incidents[1].status, IncidentStatus::Open);
    }

    #[tokio::test]
    async fn test_non_success_status_surfaces_code_and_body() {
        let router = Router::new().route(
            "/api/now/table/incident",
            get(|| async { (StatusCode::FORBIDDEN, "no access for you") }),
        );
        let base = spawn_fake(router).await;
        let store = MemoryConfigStore::with_config(config(&base));
        let source = ServiceNowSource::new(&store).unwrap();

        match source.fetch(None).await {
            Err(Error::Transport { status, reason, body }) => {
                assert_eq!(status, 403);
                assert_eq!(reason, "Forbidden");
                assert_eq!(body, "no access for you");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_source_follows_config_changes() {
        let store = MemoryConfigStore::new();
        let source = ServiceNowSource::new(&store).unwrap();
        assert!(matches!(source.current_config(), Err(Error::MissingConfig)));

        store.save(&config("https://sn.example/api")).unwrap();
        assert_eq!(source.current_config().unwrap().base_url, "https://sn.example/api");

        store.clear().unwrap();
        assert!(matches!(source.current_config(), Err(Error::MissingConfig)));
    }
}
