use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create storage directory: {0}")]
    DirCreation(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize record {path}: {source}", path = path.display())]
    Deserialization {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("alert {0} not found")]
    AlertNotFound(Uuid),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("store task failed: {0}")]
    Task(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

pub type TriageResult<T> = std::result::Result<T, TriageError>;
