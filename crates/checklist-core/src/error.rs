use thiserror::Error;

/// Failure reported by a [`KeyValueStore`](crate::store::KeyValueStore) backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChecklistError {
    #[error("Failed to read persisted state: {0}")]
    PersistenceRead(String),

    #[error("Failed to persist state: {0}")]
    PersistenceWrite(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Failed to read file '{name}': {reason}")]
    Read { name: String, reason: String },

    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("Image decoding timed out after {0} ms")]
    DecodeTimeout(u64),

    #[error("Unknown section: {0}")]
    UnknownSection(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Report rendering failed: {0}")]
    Render(String),

    #[error("Failed to save report: {0}")]
    Sink(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ChecklistError {
    fn from(e: serde_json::Error) -> Self {
        ChecklistError::Serialization(e.to_string())
    }
}

impl From<lopdf::Error> for ChecklistError {
    fn from(e: lopdf::Error) -> Self {
        ChecklistError::Render(e.to_string())
    }
}

impl From<image::ImageError> for ChecklistError {
    fn from(e: image::ImageError) -> Self {
        ChecklistError::ImageDecode(e.to_string())
    }
}
