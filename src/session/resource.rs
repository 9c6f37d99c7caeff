//! Continuous transcription resource contract
//!
//! The host recognizer's callbacks (`result`, `error`, `end`) are the only
//! adapter code: [`RecognizerSignals`] translates them into engine inputs
//! tagged with the generation of the resource that produced them.

use tokio::sync::mpsc;

use crate::engine::EngineInput;
use crate::error::ResourceError;
use crate::preferences::LanguageCode;

/// Settings applied to every opened resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizerSettings {
    pub language: LanguageCode,
    pub continuous: bool,
    pub interim_results: bool,
}

impl RecognizerSettings {
    /// Continuous, final-results-only recognition in `language`
    pub fn continuous(language: LanguageCode) -> Self {
        Self {
            language,
            continuous: true,
            interim_results: false,
        }
    }
}

/// Error codes reported by the recognizer, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerErrorCode {
    /// `not-allowed`: capture permission was refused
    NotAllowed,
    /// `no-speech`: nothing heard before the recognizer's own timeout
    NoSpeech,
    /// `aborted`: the resource was stopped on request
    Aborted,
    /// Anything else, kept verbatim
    Other(String),
}

impl RecognizerErrorCode {
    pub fn classify(code: &str) -> Self {
        match code {
            "not-allowed" | "service-not-allowed" => Self::NotAllowed,
            "no-speech" => Self::NoSpeech,
            "aborted" => Self::Aborted,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Recognizer callback kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerSignalKind {
    /// A finalized transcript segment
    Result(String),
    Error(RecognizerErrorCode),
    /// The resource has stopped and released the device
    End,
}

/// A recognizer callback, as delivered to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizerSignal {
    pub generation: u64,
    pub kind: RecognizerSignalKind,
}

/// Callback adapter handed to the backend when a resource is opened
#[derive(Debug, Clone)]
pub struct RecognizerSignals {
    generation: u64,
    tx: mpsc::UnboundedSender<EngineInput>,
}

impl RecognizerSignals {
    /// Signals for the resource of `generation`, posting into an engine input channel
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<EngineInput>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report the latest finalized transcript segment
    pub fn result(&self, transcript: impl Into<String>) {
        self.send(RecognizerSignalKind::Result(transcript.into()));
    }

    /// Report an error by its raw code
    pub fn error(&self, code: &str) {
        self.send(RecognizerSignalKind::Error(RecognizerErrorCode::classify(code)));
    }

    pub fn end(&self) {
        self.send(RecognizerSignalKind::End);
    }

    fn send(&self, kind: RecognizerSignalKind) {
        let _ = self.tx.send(EngineInput::Recognizer(RecognizerSignal {
            generation: self.generation,
            kind,
        }));
    }
}

/// Host capability for creating transcription resources
pub trait RecognizerBackend: Send + Sync {
    fn open(
        &self,
        settings: RecognizerSettings,
        signals: RecognizerSignals,
    ) -> Result<Box<dyn TranscriptionResource>, ResourceError>;
}

/// One open transcription resource; dropping it releases the device
pub trait TranscriptionResource: Send {
    fn start(&mut self) -> Result<(), ResourceError>;

    /// Ask the resource to stop; it answers asynchronously with `end`
    ///
    /// A resource that has not ended within [`STOP_TIMEOUT`] of a
    /// reconfiguring stop is dropped without waiting further.
    ///
    /// [`STOP_TIMEOUT`]: super::STOP_TIMEOUT
    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_codes() {
        assert_eq!(RecognizerErrorCode::classify("not-allowed"), RecognizerErrorCode::NotAllowed);
        assert_eq!(RecognizerErrorCode::classify("no-speech"), RecognizerErrorCode::NoSpeech);
        assert_eq!(RecognizerErrorCode::classify("aborted"), RecognizerErrorCode::Aborted);
        assert_eq!(
            RecognizerErrorCode::classify("network"),
            RecognizerErrorCode::Other("network".into())
        );
    }

    #[test]
    fn test_signals_are_tagged() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let signals = RecognizerSignals::new(7, tx);
        signals.result("go home");
        signals.end();

        match rx.try_recv().unwrap() {
            EngineInput::Recognizer(signal) => {
                assert_eq!(signal.generation, 7);
                assert_eq!(signal.kind, RecognizerSignalKind::Result("go home".into()));
            }
            other => panic!("unexpected input {:?}", other),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            EngineInput::Recognizer(RecognizerSignal { kind: RecognizerSignalKind::End, .. })
        ));
    }
}
