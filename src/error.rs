//! Error types for the voice navigation engine
//!
//! Collaborator failures are typed per concern. None of them escape the
//! engine: they are absorbed into [`ErrorKind`], which is the only failure
//! signal page collaborators observe (through `last_error`).

use serde::{Deserialize, Serialize};

/// User-facing failure taxonomy, published as the session's `last_error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    /// Capture permission rejected, or the recognizer reported `not-allowed`
    PermissionDenied,
    /// The host has no transcription capability
    NotSupported,
    /// The recognizer heard nothing before its own timeout
    NoSpeechDetected,
    /// The session was stopped on request
    SessionAborted,
    /// Any other recognizer failure; pauses auto-restart
    TransientResourceError {
        /// Raw code or message reported by the resource
        code: String,
    },
    /// The stored language preference could not be used
    PreferenceReadError,
}

impl ErrorKind {
    /// Whether a pending error of this kind blocks automatic restart
    pub fn blocks_restart(&self) -> bool {
        matches!(
            self,
            ErrorKind::PermissionDenied
                | ErrorKind::NotSupported
                | ErrorKind::TransientResourceError { .. }
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::PermissionDenied => write!(f, "permission denied"),
            ErrorKind::NotSupported => write!(f, "not supported"),
            ErrorKind::NoSpeechDetected => write!(f, "no speech detected"),
            ErrorKind::SessionAborted => write!(f, "session aborted"),
            ErrorKind::TransientResourceError { code } => {
                write!(f, "resource error ({})", code)
            }
            ErrorKind::PreferenceReadError => write!(f, "preference read error"),
        }
    }
}

/// Errors from preference storage backends
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("preference storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("preference file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rejected language codes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LanguageError {
    #[error("language code is empty")]
    Empty,

    #[error("malformed language code {0:?}")]
    Malformed(String),
}

/// Errors raised by a transcription resource when opened or started
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResourceError {
    #[error("transcription resource could not be opened: {0}")]
    Open(String),

    #[error("transcription resource failed to start: {0}")]
    Start(String),
}

/// Errors raised when opening the capture device
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeviceError {
    #[error("capture device access was not allowed")]
    NotAllowed,

    #[error("no capture device available")]
    NotFound,

    #[error("capture device failed: {0}")]
    Other(String),
}

/// Errors raised by the permission query capability
#[derive(Debug, Clone, thiserror::Error)]
pub enum PermissionError {
    #[error("permission query is not supported for this device")]
    Unsupported,

    #[error("permission query failed: {0}")]
    Failed(String),
}

/// Errors surfaced by the engine's public entry points
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("another voice engine instance is already active")]
    AlreadyActive,

    #[error("voice engine has shut down")]
    Closed,

    #[error(transparent)]
    Language(#[from] LanguageError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
