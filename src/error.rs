use thiserror::Error;

/// Stage-level failures of the analytics pipeline. Any of these aborts
/// the remaining stages and surfaces to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("network error: {0}")]
    Network(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("notification error: {0}")]
    Notification(String),
}
