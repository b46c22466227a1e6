use thiserror::Error;

/// Startup-time configuration failures. None of these are recoverable once the
/// process is running.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read intents file '{path}': {source}")]
    IntentsIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse intents document: {0}")]
    IntentsJson(#[from] serde_json::Error),

    #[error("Invalid intent at position {index}: {reason}")]
    InvalidIntent {
        index: usize,
        reason: String,
    },

    #[error("Unsupported LLM type: {0}")]
    UnsupportedLlm(String),

    #[error("Unknown persona: {0}")]
    UnknownPersona(String),

    #[error("Missing API key for {0}")]
    MissingApiKey(&'static str),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// A call to the external language model failed. The dispatcher turns every one
/// of these into the fallback reply.
#[derive(Debug, Error)]
pub enum ExternalServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Empty response from {0}")]
    EmptyResponse(&'static str),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Conversation log lock poisoned")]
    Poisoned,

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Corrupt timestamp '{0}' in conversation log")]
    Timestamp(String),
}
