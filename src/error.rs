use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("No contracts could be extracted from the provided batches")]
    InputMissing,

    #[error("Unparseable date: {0}")]
    DateUnparseable(String),

    #[error("History store failure: {0}")]
    ExternalStore(String),

    #[error("Audit record not found: {0}")]
    RecordNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;
