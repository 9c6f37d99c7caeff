//! Serialized spoken feedback
//!
//! At most one utterance is ever audible. Every `speak` cancels whatever is
//! playing before starting the new utterance (last write wins, no queue).

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info};

use super::sink::{
    Utterance, UtteranceId, UtteranceSignal, UtteranceSignalKind, UtteranceSignals, UtteranceSink,
};
use crate::engine::EngineInput;
use crate::events::EngineEvent;
use crate::preferences::LanguageCode;

/// Owns the output resource and the `is_speaking` state
pub struct SpeechOutput {
    sink: Box<dyn UtteranceSink>,
    language: LanguageCode,
    /// Unforced speech is dropped while set (excluded route)
    suppressed: bool,
    next_id: UtteranceId,
    in_flight: Option<UtteranceId>,
    speaking_tx: watch::Sender<bool>,
    input_tx: mpsc::UnboundedSender<EngineInput>,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl SpeechOutput {
    pub fn new(
        sink: Box<dyn UtteranceSink>,
        language: LanguageCode,
        speaking_tx: watch::Sender<bool>,
        input_tx: mpsc::UnboundedSender<EngineInput>,
        event_tx: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            sink,
            language,
            suppressed: false,
            next_id: 1,
            in_flight: None,
            speaking_tx,
            input_tx,
            event_tx,
        }
    }

    /// Speak `text` in the current language
    ///
    /// Returns the id of the started utterance, or `None` when suppressed.
    pub fn speak(&mut self, text: &str, forced: bool) -> Option<UtteranceId> {
        if self.suppressed && !forced {
            debug!(text, "speech suppressed on excluded route");
            return None;
        }

        self.cancel_in_flight();

        let id = self.next_id;
        self.next_id += 1;
        self.in_flight = Some(id);

        let utterance = Utterance::new(id, text, self.language.clone(), forced);
        info!(id, language = %self.language, forced, text, "speaking");
        self.sink
            .speak(utterance, UtteranceSignals::new(id, self.input_tx.clone()));
        Some(id)
    }

    /// Cancel the in-flight utterance, if any
    pub fn stop_speaking(&mut self) {
        self.cancel_in_flight();
    }

    /// Apply an utterance callback
    ///
    /// Callbacks of superseded utterances are ignored so a late `end` from a
    /// cancelled utterance cannot clear the state of its successor.
    pub fn on_signal(&mut self, signal: UtteranceSignal) {
        if self.in_flight != Some(signal.id) {
            debug!(id = signal.id, kind = ?signal.kind, "ignoring stale utterance signal");
            return;
        }

        match signal.kind {
            UtteranceSignalKind::Start => {
                self.set_speaking(true);
                let _ = self.event_tx.send(EngineEvent::SpeechStarted { id: signal.id });
            }
            UtteranceSignalKind::End => {
                self.in_flight = None;
                self.set_speaking(false);
                let _ = self.event_tx.send(EngineEvent::SpeechFinished { id: signal.id });
            }
            UtteranceSignalKind::Error(reason) => {
                debug!(id = signal.id, reason, "utterance failed");
                self.in_flight = None;
                self.set_speaking(false);
                let _ = self.event_tx.send(EngineEvent::SpeechFinished { id: signal.id });
            }
        }
    }

    pub fn set_language(&mut self, language: LanguageCode) {
        self.language = language;
    }

    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
    }

    pub fn is_speaking(&self) -> bool {
        *self.speaking_tx.borrow()
    }

    fn cancel_in_flight(&mut self) {
        // Cancel unconditionally: the host may still be playing something
        // whose start callback has not arrived yet
        self.sink.cancel_all();
        if let Some(id) = self.in_flight.take() {
            debug!(id, "cancelled in-flight utterance");
        }
        self.set_speaking(false);
    }

    fn set_speaking(&self, speaking: bool) {
        self.speaking_tx.send_if_modified(|current| {
            let changed = *current != speaking;
            *current = speaking;
            changed
        });
    }
}
