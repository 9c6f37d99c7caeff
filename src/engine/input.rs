//! The engine's uniform input type
//!
//! Everything the engine reacts to (exposed-surface calls, resource
//! callbacks, timers, preference changes) arrives as one of these, and is
//! processed one at a time by the engine task.

use tokio::sync::oneshot;

use crate::permission::Access;
use crate::preferences::LanguageCode;
use crate::session::{RecognizerSignal, TimerFired};
use crate::speech::UtteranceSignal;

#[derive(Debug)]
pub enum EngineInput {
    /// Speak feedback, optionally bypassing route suppression
    Speak { text: String, forced: bool },

    /// Cancel the in-flight utterance
    StopSpeaking,

    /// Route a transcript obtained by a page collaborator
    Route {
        transcript: String,
        reply: Option<oneshot::Sender<bool>>,
    },

    /// Fresh, user-initiated start of listening
    StartListening,

    /// User-initiated stop of listening
    StopListening,

    /// The host's current route changed (or the view re-rendered)
    RouteChanged(String),

    /// The stored language preference changed
    LanguageChanged(LanguageCode),

    /// The user explicitly selected a language (already persisted)
    LanguageSelected(LanguageCode),

    /// Callback from the transcription resource
    Recognizer(RecognizerSignal),

    /// Callback from the utterance resource
    Utterance(UtteranceSignal),

    /// Capture access resolved for a start attempt
    PermissionResolved { attempt: u64, access: Access },

    /// A session timer expired
    Timer(TimerFired),

    /// Stop the engine and release every resource
    Shutdown,
}
