use thiserror::Error;

/// Failures while turning uploaded PDFs into chunked text.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf extraction failed for {name}: {details}")]
    Extraction { name: String, details: String },

    #[error("invalid chunking config: {0}")]
    InvalidConfig(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("no pdf files found in {0}")]
    NoDocuments(String),
}

/// Failures while building or querying the conversational index.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("embedding service failed: {0}")]
    Embedding(String),

    #[error("generation service failed: {0}")]
    Generation(String),

    #[error("no index has been built yet; process documents before asking")]
    NotReady,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;
