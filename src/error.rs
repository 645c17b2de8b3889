use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("ServiceNow API configuration is missing")]
    MissingConfig,

    #[error("{status} {reason}: {body}")]
    Transport {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable machine-readable code, surfaced in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::MissingConfig => "MISSING_CONFIG",
            Error::Transport { .. } | Error::Http(_) => "UPSTREAM_ERROR",
            Error::Config(_) => "INVALID_CONFIG",
            Error::InvalidTimestamp(_) => "INVALID_TIMESTAMP",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
