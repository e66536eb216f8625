use thiserror::Error;

/// Everything that can abort a snapshot run.
#[derive(Error, Debug)]
pub enum AutosnapError {
    #[error("Instance not found for ID: {instance_id}.")]
    InstanceNotFound { instance_id: String },

    #[error("Instance metadata error: {0}")]
    Metadata(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // Transport, throttling, permission and not-found failures from any provider call.
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AutosnapError>;
