// Error types shared by the sequence engine
//
// EngineError covers local failures (bad note data, bad indices, encoding) and
// wraps CollaboratorError for anything that went wrong on the far side of a
// service boundary.

/// Result alias used throughout the engine
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the note-sequence engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid note: {0}")]
    InvalidNote(String),

    #[error("Index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("MIDI encoding error: {0}")]
    Encoding(String),

    #[error("{0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures reported by external collaborators (generation, rendering, storage)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollaboratorError {
    /// Network-level failure; the request may succeed if repeated
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status
    #[error("Service responded with status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Not authorized")]
    Unauthorized,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// The service understood the request but will not carry it out
    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl CollaboratorError {
    /// Whether repeating the same idempotent request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            CollaboratorError::Transport(_) => true,
            CollaboratorError::Status { code, .. } => *code >= 500,
            _ => false,
        }
    }
}

impl From<std::io::Error> for CollaboratorError {
    fn from(err: std::io::Error) -> Self {
        CollaboratorError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CollaboratorError {
    fn from(err: serde_json::Error) -> Self {
        CollaboratorError::InvalidResponse(err.to_string())
    }
}
