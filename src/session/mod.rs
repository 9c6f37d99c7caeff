//! Session module for continuous speech recognition
//!
//! Provides an explicit state machine with five states:
//! - Idle: no resource open, possibly waiting out a restart backoff
//! - Starting: waiting for capture access and the settle delay
//! - Listening: a transcription resource is open and producing transcripts
//! - Stopping: the resource was asked to stop ahead of a reconfiguration
//! - Failed: a classified error halted the session

mod machine;
mod resource;

pub use machine::{
    RecognitionSession, SessionChannels, SessionState, TimerFired, TimerKind, RESTART_BACKOFF,
    SETTLE_DELAY, STOP_TIMEOUT,
};
pub use resource::{
    RecognizerBackend, RecognizerErrorCode, RecognizerSettings, RecognizerSignal,
    RecognizerSignalKind, RecognizerSignals, TranscriptionResource,
};
