use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    /// The uploaded file could not be decoded. The session stays usable.
    #[error("Failed to load PDF: {0}")]
    Load(String),

    /// User input rejected at the point of save. Nothing was mutated.
    #[error("{0}")]
    Validation(String),

    /// Rejected editor configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Operation not available: {0}")]
    InvalidState(String),

    #[error("Page {page} is out of range (1-{total})")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("Failed to embed image: {0}")]
    Embed(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EditorError {
    /// Load and validation failures are surfaced to the user and can be retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EditorError::Load(_) | EditorError::Validation(_))
    }
}

impl From<serde_json::Error> for EditorError {
    fn from(e: serde_json::Error) -> Self {
        EditorError::Serialization(e.to_string())
    }
}
