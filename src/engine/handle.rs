//! The engine's exposed surface for page collaborators

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::input::EngineInput;
use crate::error::{EngineError, ErrorKind};
use crate::events::EngineEvent;
use crate::preferences::{LanguageCode, PreferenceStore};

/// Cloneable handle to a running engine
#[derive(Clone)]
pub struct EngineHandle {
    pub(super) input_tx: mpsc::UnboundedSender<EngineInput>,
    pub(super) listening_rx: watch::Receiver<bool>,
    pub(super) speaking_rx: watch::Receiver<bool>,
    pub(super) language_rx: watch::Receiver<LanguageCode>,
    pub(super) error_rx: watch::Receiver<Option<ErrorKind>>,
    pub(super) event_tx: broadcast::Sender<EngineEvent>,
    pub(super) preferences: PreferenceStore,
}

impl EngineHandle {
    /// Speak feedback; unforced speech is dropped on the excluded route
    pub fn speak(&self, text: impl Into<String>, forced: bool) -> Result<(), EngineError> {
        self.send(EngineInput::Speak {
            text: text.into(),
            forced,
        })
    }

    pub fn stop_speaking(&self) -> Result<(), EngineError> {
        self.send(EngineInput::StopSpeaking)
    }

    /// Route a transcript; resolves to whether a command fired
    pub async fn route(&self, transcript: impl Into<String>) -> Result<bool, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineInput::Route {
            transcript: transcript.into(),
            reply: Some(reply),
        })?;
        rx.await.map_err(|_| EngineError::Closed)
    }

    /// Start listening, clearing any recoverable failure
    pub fn start_listening(&self) -> Result<(), EngineError> {
        self.send(EngineInput::StartListening)
    }

    /// Stop listening until the next `start_listening`
    pub fn stop_listening(&self) -> Result<(), EngineError> {
        self.send(EngineInput::StopListening)
    }

    /// Report the host's current route
    pub fn route_changed(&self, path: impl Into<String>) -> Result<(), EngineError> {
        self.send(EngineInput::RouteChanged(path.into()))
    }

    /// Persist and apply a new spoken language
    pub fn set_language(&self, code: &str) -> Result<LanguageCode, EngineError> {
        let language = LanguageCode::parse(code)?;
        self.preferences.set_language(&language)?;
        self.send(EngineInput::LanguageSelected(language.clone()))?;
        Ok(language)
    }

    pub fn is_listening(&self) -> bool {
        *self.listening_rx.borrow()
    }

    pub fn is_speaking(&self) -> bool {
        *self.speaking_rx.borrow()
    }

    pub fn language(&self) -> LanguageCode {
        self.language_rx.borrow().clone()
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.error_rx.borrow().clone()
    }

    pub fn watch_listening(&self) -> watch::Receiver<bool> {
        self.listening_rx.clone()
    }

    pub fn watch_speaking(&self) -> watch::Receiver<bool> {
        self.speaking_rx.clone()
    }

    pub fn watch_language(&self) -> watch::Receiver<LanguageCode> {
        self.language_rx.clone()
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Stop the engine, releasing the recognizer and silencing speech
    pub fn shutdown(&self) -> Result<(), EngineError> {
        self.send(EngineInput::Shutdown)
    }

    fn send(&self, input: EngineInput) -> Result<(), EngineError> {
        self.input_tx.send(input).map_err(|_| EngineError::Closed)
    }
}
