//! Connector error type.

/// Errors surfaced by the connector and its delegate.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("{0} capability required")]
    MissingCapability(&'static str),
    #[error("webhook secret must not be empty")]
    InvalidSecret,
    #[error("serializing webhook body: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("connector not validated; call validate first")]
    NotValidated,
    #[error("no active conversation; call start first")]
    NotStarted,
    #[error("bot message queue closed")]
    QueueClosed,
}
