//! Events module for engine notifications
//!
//! Provides structured event types for listening, speech, navigation and
//! language changes, broadcast to host UIs.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::preferences::LanguageCode;

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A transcription resource is open and listening
    ListeningStarted {
        language: LanguageCode,
    },

    /// The session left the listening state
    ListeningStopped,

    /// The session halted on a classified error
    SessionFailed {
        kind: ErrorKind,
    },

    /// An utterance became audible
    SpeechStarted {
        id: u64,
    },

    /// The audible utterance ended, failed or was cancelled
    SpeechFinished {
        id: u64,
    },

    /// A transcript matched a command
    CommandMatched {
        phrase: String,
        path: String,
    },

    /// A page message was spoken for a newly mounted view
    PageAnnounced {
        path: String,
    },

    /// The current route changed
    RouteChanged {
        path: String,
    },

    /// The active spoken language changed
    LanguageChanged {
        language: LanguageCode,
    },
}

impl std::fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::ListeningStarted { language } => {
                write!(f, "LISTENING_STARTED ({})", language)
            }
            EngineEvent::ListeningStopped => write!(f, "LISTENING_STOPPED"),
            EngineEvent::SessionFailed { kind } => write!(f, "SESSION_FAILED ({})", kind),
            EngineEvent::SpeechStarted { id } => write!(f, "SPEECH_STARTED (#{})", id),
            EngineEvent::SpeechFinished { id } => write!(f, "SPEECH_FINISHED (#{})", id),
            EngineEvent::CommandMatched { phrase, path } => {
                write!(f, "COMMAND_MATCHED ({} -> {})", phrase, path)
            }
            EngineEvent::PageAnnounced { path } => write!(f, "PAGE_ANNOUNCED ({})", path),
            EngineEvent::RouteChanged { path } => write!(f, "ROUTE_CHANGED ({})", path),
            EngineEvent::LanguageChanged { language } => {
                write!(f, "LANGUAGE_CHANGED ({})", language)
            }
        }
    }
}
