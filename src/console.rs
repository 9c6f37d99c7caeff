//! Terminal adapters for the engine's host collaborators
//!
//! Lines typed on stdin stand in for recognized speech, utterances are
//! printed instead of synthesized, and navigation is reported back to the
//! engine as a route change.

use std::io::BufRead;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use voicenav::error::{DeviceError, PermissionError, ResourceError};
use voicenav::navigation::Navigator;
use voicenav::permission::{
    CaptureConstraints, CaptureDevice, CaptureHandle, DeviceKind, PermissionQuery,
    PermissionState,
};
use voicenav::session::{
    RecognizerBackend, RecognizerSettings, RecognizerSignals, TranscriptionResource,
};
use voicenav::speech::{Utterance, UtteranceSignals, UtteranceSink};

/// Simulated playback time per word
const WORD_DURATION: Duration = Duration::from_millis(250);

/// A line typed at the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Report a route change (`:go <path>`)
    Go(String),
    /// Select a language (`:lang <code>`)
    Lang(String),
    /// Speak text (`:say <text>`)
    Say(String),
    Hush,
    Start,
    Stop,
    /// Simulate a recognizer error (`:err <code>`)
    Fail(String),
    Status,
    Help,
    Quit,
    /// Anything not starting with `:` is heard as speech
    Transcript(String),
    Unknown(String),
}

impl ConsoleCommand {
    /// Parse one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let Some(command) = line.strip_prefix(':') else {
            return Some(Self::Transcript(line.to_string()));
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim().to_string()),
            None => (command, String::new()),
        };

        let parsed = match (name, arg.is_empty()) {
            ("go", false) => Self::Go(arg),
            ("lang", false) => Self::Lang(arg),
            ("say", false) => Self::Say(arg),
            ("err", false) => Self::Fail(arg),
            ("hush", _) => Self::Hush,
            ("start", _) => Self::Start,
            ("stop", _) => Self::Stop,
            ("status", _) => Self::Status,
            ("help", _) => Self::Help,
            ("quit" | "q", _) => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        };
        Some(parsed)
    }
}

pub const HELP: &str = "\
commands:
  <text>          speak a transcript (e.g. \"open voice notes\")
  :go <path>      change route
  :lang <code>    change language (en-US, hi-IN, bn-IN, ta-IN, te-IN, kn-IN)
  :say <text>     speak feedback
  :hush           stop speaking
  :start / :stop  start or stop listening
  :err <code>     simulate a recognizer error (no-speech, not-allowed, network)
  :status         show engine state
  :quit           exit";

/// Read stdin on a dedicated thread so a pending read never holds up shutdown
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
        debug!("stdin closed");
    });
    rx
}

// ── Recognizer ─────────────────────────────────────────────────────

/// Recognizer fed by stdin lines
#[derive(Clone, Default)]
pub struct ConsoleRecognizer {
    active: Arc<Mutex<Option<RecognizerSignals>>>,
}

impl ConsoleRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a transcript; returns false when nothing is listening
    pub fn hear(&self, transcript: &str) -> bool {
        match self.active_signals() {
            Some(signals) => {
                signals.result(transcript);
                true
            }
            None => false,
        }
    }

    /// Simulate a recognizer error such as `no-speech` or `network`
    pub fn fail(&self, code: &str) -> bool {
        match self.active_signals() {
            Some(signals) => {
                signals.error(code);
                signals.end();
                true
            }
            None => false,
        }
    }

    fn active_signals(&self) -> Option<RecognizerSignals> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl RecognizerBackend for ConsoleRecognizer {
    fn open(
        &self,
        settings: RecognizerSettings,
        signals: RecognizerSignals,
    ) -> Result<Box<dyn TranscriptionResource>, ResourceError> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.is_some() {
            return Err(ResourceError::Open("console recognizer already open".into()));
        }

        info!(language = %settings.language, "console recognizer opened");
        *active = Some(signals.clone());
        Ok(Box::new(ConsoleResource {
            active: Arc::clone(&self.active),
            signals,
        }))
    }
}

struct ConsoleResource {
    active: Arc<Mutex<Option<RecognizerSignals>>>,
    signals: RecognizerSignals,
}

impl TranscriptionResource for ConsoleResource {
    fn start(&mut self) -> Result<(), ResourceError> {
        println!("🎤 listening (type a command)");
        Ok(())
    }

    fn stop(&mut self) {
        self.signals.end();
    }
}

impl Drop for ConsoleResource {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(&*active, Some(s) if s.generation() == self.signals.generation()) {
            *active = None;
            debug!(generation = self.signals.generation(), "console recognizer released");
        }
    }
}

// ── Speaker ────────────────────────────────────────────────────────

/// Prints utterances and simulates their playback time
#[derive(Default)]
pub struct ConsoleSpeaker {
    playing: Vec<(JoinHandle<()>, UtteranceSignals)>,
}

impl ConsoleSpeaker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UtteranceSink for ConsoleSpeaker {
    fn speak(&mut self, utterance: Utterance, signals: UtteranceSignals) {
        println!("🔊 [{}] {}", utterance.language, utterance.text);

        let words = utterance.text.split_whitespace().count().max(1) as u32;
        let finished = signals.clone();
        signals.started();
        let task = tokio::spawn(async move {
            tokio::time::sleep(WORD_DURATION * words).await;
            finished.ended();
        });

        self.playing.retain(|(task, _)| !task.is_finished());
        self.playing.push((task, signals));
    }

    fn cancel_all(&mut self) {
        for (task, signals) in self.playing.drain(..) {
            if !task.is_finished() {
                task.abort();
                signals.failed("interrupted");
            }
        }
    }
}

// ── Navigator ──────────────────────────────────────────────────────

/// Reports navigations so the host loop can feed them back as route changes
pub struct ConsoleNavigator {
    routes: mpsc::UnboundedSender<String>,
}

impl ConsoleNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (routes, rx) = mpsc::unbounded_channel();
        (Self { routes }, rx)
    }
}

impl Navigator for ConsoleNavigator {
    fn navigate_to(&self, path: &str) {
        println!("➡️  {}", path);
        let _ = self.routes.send(path.to_string());
    }
}

// ── Permission and capture ─────────────────────────────────────────

/// A terminal has no authorization prompt; access is always granted
pub struct ConsolePermissions;

#[async_trait]
impl PermissionQuery for ConsolePermissions {
    async fn query(&self, _kind: DeviceKind) -> Result<PermissionState, PermissionError> {
        Ok(PermissionState::Granted)
    }
}

/// Capture device backed by the terminal itself
pub struct ConsoleCapture;

struct ConsoleCaptureHandle;

impl CaptureHandle for ConsoleCaptureHandle {
    fn release(self: Box<Self>) {}
}

#[async_trait]
impl CaptureDevice for ConsoleCapture {
    async fn open(
        &self,
        _constraints: CaptureConstraints,
    ) -> Result<Box<dyn CaptureHandle>, DeviceError> {
        Ok(Box::new(ConsoleCaptureHandle))
    }
}

#[cfg(test)]
mod tests {
    use voicenav::engine::EngineInput;
    use voicenav::preferences::LanguageCode;

    use super::*;

    #[test]
    fn test_recognizer_feeds_only_while_open() {
        let recognizer = ConsoleRecognizer::new();
        assert!(!recognizer.hear("voice notes"));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let resource = recognizer
            .open(
                RecognizerSettings::continuous(LanguageCode::default()),
                RecognizerSignals::new(1, tx),
            )
            .unwrap();
        assert!(recognizer.hear("voice notes"));
        assert!(matches!(rx.try_recv(), Ok(EngineInput::Recognizer(_))));

        drop(resource);
        assert!(!recognizer.hear("voice notes"));
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse("   "), None);
        assert_eq!(
            ConsoleCommand::parse("open voice notes"),
            Some(ConsoleCommand::Transcript("open voice notes".into()))
        );
        assert_eq!(
            ConsoleCommand::parse(":go /image-analysis"),
            Some(ConsoleCommand::Go("/image-analysis".into()))
        );
        assert_eq!(
            ConsoleCommand::parse(":say  hello there "),
            Some(ConsoleCommand::Say("hello there".into()))
        );
        assert_eq!(ConsoleCommand::parse(":q"), Some(ConsoleCommand::Quit));
        assert_eq!(
            ConsoleCommand::parse(":lang"),
            Some(ConsoleCommand::Unknown(":lang".into()))
        );
    }

    #[test]
    fn test_navigator_reports_route() {
        let (navigator, mut rx) = ConsoleNavigator::new();
        navigator.navigate_to("/voice-notes");
        assert_eq!(rx.try_recv().unwrap(), "/voice-notes");
    }
}
