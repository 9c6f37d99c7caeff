//! Utterance output resource contract
//!
//! The host's synthesizer implements [`UtteranceSink`]. Its start/end/error
//! callbacks are reported through [`UtteranceSignals`], which turns them
//! into engine inputs tagged with the utterance id.

use tokio::sync::mpsc;

use crate::engine::EngineInput;
use crate::preferences::LanguageCode;

/// Default speaking rate
pub const DEFAULT_RATE: f32 = 1.0;
/// Default pitch
pub const DEFAULT_PITCH: f32 = 1.0;
/// Default volume
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Monotonic id of an utterance within one engine
pub type UtteranceId = u64;

/// One unit of spoken output
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub language: LanguageCode,
    pub forced: bool,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Utterance {
    pub fn new(
        id: UtteranceId,
        text: impl Into<String>,
        language: LanguageCode,
        forced: bool,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            language,
            forced,
            rate: DEFAULT_RATE,
            pitch: DEFAULT_PITCH,
            volume: DEFAULT_VOLUME,
        }
    }
}

/// Lifecycle callback kinds of an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceSignalKind {
    Start,
    End,
    /// Failed or cancelled
    Error(String),
}

/// An utterance callback, as delivered to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtteranceSignal {
    pub id: UtteranceId,
    pub kind: UtteranceSignalKind,
}

/// Callback adapter handed to the sink along with each utterance
#[derive(Debug, Clone)]
pub struct UtteranceSignals {
    id: UtteranceId,
    tx: mpsc::UnboundedSender<EngineInput>,
}

impl UtteranceSignals {
    pub fn new(id: UtteranceId, tx: mpsc::UnboundedSender<EngineInput>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> UtteranceId {
        self.id
    }

    pub fn started(&self) {
        self.send(UtteranceSignalKind::Start);
    }

    pub fn ended(&self) {
        self.send(UtteranceSignalKind::End);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        self.send(UtteranceSignalKind::Error(reason.into()));
    }

    fn send(&self, kind: UtteranceSignalKind) {
        // Engine gone: nothing left to notify
        let _ = self.tx.send(EngineInput::Utterance(UtteranceSignal { id: self.id, kind }));
    }
}

/// The host's speech synthesizer
pub trait UtteranceSink: Send {
    /// Begin speaking; report lifecycle through `signals`
    fn speak(&mut self, utterance: Utterance, signals: UtteranceSignals);

    /// Stop everything in flight; each cancelled utterance reports an error
    fn cancel_all(&mut self);
}
