// Error types for the fare pipeline

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FareError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("API error: {status_code} - {message}")]
    ApiResponse { status_code: u16, message: String },

    #[error("Malformed service response: {0}")]
    Decode(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("No flight duration available for {origin} to {destination}")]
    UndefinedDuration { origin: String, destination: String },

    #[error("Cabin class not resolved for {origin} to {destination}")]
    UnresolvedClass { origin: String, destination: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Worker task failed: {0}")]
    WorkerPanic(String),
}

impl FareError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FareError::Cancelled)
    }
}

impl From<reqwest::Error> for FareError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FareError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            FareError::ApiResponse {
                status_code: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            FareError::Network(err.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for FareError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            FareError::Cancelled
        } else {
            FareError::WorkerPanic(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
