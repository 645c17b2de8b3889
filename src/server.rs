//! HTTP transport for the incident summary.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigProvider, ConfigState, ServiceNowConfig};
use crate::error::Error;
use crate::source::IncidentProvider;
use crate::summary::IncidentSummaryResponse;
use crate::IncidentPulse;

/// Shared state for all handlers.
pub struct AppState<P> {
    pub pulse: IncidentPulse<P>,
    pub config: Arc<dyn ConfigProvider>,
}

impl<P: IncidentProvider> AppState<P> {
    pub fn new(provider: P, config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            pulse: IncidentPulse::new(provider),
            config,
        }
    }
}

/// JSON error body: `{ code, message }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

/// Wrapper that maps crate errors onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::MissingConfig => StatusCode::PRECONDITION_FAILED,
            Error::Transport { .. } | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("Request failed: {}", self.0);
        } else {
            log::warn!("Request rejected: {}", self.0);
        }
        let body = ApiErrorBody {
            code: self.0.code().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub message: String,
}

/// Connection settings as exposed over HTTP; the token itself is never returned.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStatus {
    pub configured: bool,
    pub base_url: Option<String>,
    pub default_query: Option<String>,
    pub has_token: bool,
}

impl From<ConfigState> for ConfigStatus {
    fn from(state: ConfigState) -> Self {
        match state {
            ConfigState::Configured(c) => ConfigStatus {
                configured: true,
                has_token: !c.token.trim().is_empty(),
                base_url: Some(c.base_url),
                default_query: c.default_query,
            },
            ConfigState::Missing => ConfigStatus {
                configured: false,
                base_url: None,
                default_query: None,
                has_token: false,
            },
        }
    }
}

pub fn router<P: IncidentProvider + 'static>(state: Arc<AppState<P>>) -> Router {
    Router::new()
        .route("/api/ping", get(ping))
        .route("/api/incidents/summary", get(incident_summary::<P>))
        .route(
            "/api/config",
            get(get_config::<P>).put(put_config::<P>).delete(delete_config::<P>),
        )
        .with_state(state)
}

/// Serve the router on `addr` until the process exits.
pub async fn run<P: IncidentProvider + 'static>(
    state: AppState<P>,
    addr: &str,
) -> crate::Result<()> {
    let app = router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        message: "pong".to_string(),
    })
}

async fn incident_summary<P: IncidentProvider + 'static>(
    State(state): State<Arc<AppState<P>>>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<IncidentSummaryResponse>, ApiError> {
    let query = params.query.filter(|q| !q.trim().is_empty());
    let report = state.pulse.summary(query).await?;
    Ok(Json(report.response))
}

async fn get_config<P: IncidentProvider + 'static>(
    State(state): State<Arc<AppState<P>>>,
) -> Result<Json<ConfigStatus>, ApiError> {
    Ok(Json(state.config.load()?.into()))
}

async fn put_config<P: IncidentProvider + 'static>(
    State(state): State<Arc<AppState<P>>>,
    Json(config): Json<ServiceNowConfig>,
) -> Result<Json<ConfigStatus>, ApiError> {
    state.config.save(&config)?;
    Ok(Json(ConfigState::Configured(config).into()))
}

async fn delete_config<P: IncidentProvider + 'static>(
    State(state): State<Arc<AppState<P>>>,
) -> Result<StatusCode, ApiError> {
    state.config.clear()?;
    Ok(StatusCode::NO_CONTENT)
}
