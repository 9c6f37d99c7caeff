//! Speech module for spoken feedback
//!
//! [`SpeechOutput`] enforces single-utterance playback on top of a host
//! synthesizer implementing [`UtteranceSink`].

mod output;
mod sink;

pub use output::SpeechOutput;
pub use sink::{
    Utterance, UtteranceId, UtteranceSignal, UtteranceSignalKind, UtteranceSignals,
    UtteranceSink, DEFAULT_PITCH, DEFAULT_RATE, DEFAULT_VOLUME,
};
