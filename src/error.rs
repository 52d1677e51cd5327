use thiserror::Error;

use u50_protocol::ProbeError;

pub type Result<T> = std::result::Result<T, TelemetryError>;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned {status}: {body}")]
    WebhookStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid interval {0:?}: must be a number of seconds >= 1")]
    InvalidInterval(String),

    #[error("not connected to a probe")]
    NotConnected,

    #[error("no normalized values to send")]
    NoData,

    #[error("invalid authorization header value")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    Task(String),
}
