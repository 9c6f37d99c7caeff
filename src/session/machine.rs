//! Recognition session state machine
//!
//! Owns at most one transcription resource and decides, from a single
//! authoritative state, when to start, restart, reconfigure or give up.
//!
//! ```text
//!   Idle ──start──▶ Starting ──permission+settle──▶ Listening
//!    ▲                 │                               │
//!    │              denied                        end / error
//!    │                 ▼                               ▼
//!    └──backoff──── Idle ◀──────────────────────── Failed(kind)
//!
//!   Listening ──language──▶ Stopping ──end / stop timeout──▶ Idle ──▶ Starting
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::resource::{
    RecognizerBackend, RecognizerErrorCode, RecognizerSettings, RecognizerSignal,
    RecognizerSignalKind, RecognizerSignals, TranscriptionResource,
};
use crate::engine::EngineInput;
use crate::error::ErrorKind;
use crate::events::EngineEvent;
use crate::permission::{Access, PermissionGate};
use crate::preferences::LanguageCode;
use crate::speech::SpeechOutput;

/// Delay between capture access being granted and the resource starting
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Delay before restarting a session that ended on its own
pub const RESTART_BACKOFF: Duration = Duration::from_millis(1000);

/// How long a stopping resource may take to end before it is dropped
pub const STOP_TIMEOUT: Duration = Duration::from_millis(1000);

const MSG_ACCESS_REQUIRED: &str =
    "Voice navigation requires microphone access. Please enable it in your settings.";
const MSG_ACCESS_REVOKED: &str =
    "Please enable microphone access in your settings to use voice navigation.";
const MSG_NO_SPEECH: &str = "No speech detected. Please try speaking again.";
const MSG_NOT_SUPPORTED: &str = "Voice navigation is not supported on this device.";
const MSG_START_FAILED: &str = "Unable to start voice navigation. Please try again.";

/// Session states
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Waiting for capture access or the settle delay
    Starting,
    Listening,
    /// Waiting for the old resource to end before reopening
    Stopping,
    Failed(ErrorKind),
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Starting => write!(f, "Starting"),
            SessionState::Listening => write!(f, "Listening"),
            SessionState::Stopping => write!(f, "Stopping"),
            SessionState::Failed(kind) => write!(f, "Failed({})", kind),
        }
    }
}

/// Timers owned by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Settle,
    Backoff,
    StopTimeout,
}

/// A timer expiry delivered back to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub token: u64,
}

/// A scheduled timer; dropping it cancels the task
struct PendingTimer {
    kind: TimerKind,
    token: u64,
    handle: JoinHandle<()>,
}

impl Drop for PendingTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Channels the session publishes through
pub struct SessionChannels {
    pub input_tx: mpsc::UnboundedSender<EngineInput>,
    pub listening_tx: watch::Sender<bool>,
    pub error_tx: watch::Sender<Option<ErrorKind>>,
    pub event_tx: broadcast::Sender<EngineEvent>,
}

/// The single listening session of an engine
pub struct RecognitionSession {
    state: SessionState,
    language: LanguageCode,
    last_error: Option<ErrorKind>,
    backend: Option<Arc<dyn RecognizerBackend>>,
    gate: Arc<PermissionGate>,
    resource: Option<Box<dyn TranscriptionResource>>,
    /// Generation of the current resource; signals from others are stale
    generation: u64,
    /// Start attempt; permission answers for older attempts are stale
    attempt: u64,
    timer: Option<PendingTimer>,
    next_token: u64,
    restart_after_stop: bool,
    route_excluded: bool,
    paused_by_user: bool,
    unsupported_warned: bool,
    channels: SessionChannels,
}

impl RecognitionSession {
    /// Create an idle session; `backend` is `None` when the host cannot transcribe
    pub fn new(
        backend: Option<Arc<dyn RecognizerBackend>>,
        gate: Arc<PermissionGate>,
        language: LanguageCode,
        channels: SessionChannels,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            language,
            last_error: None,
            backend,
            gate,
            resource: None,
            generation: 0,
            attempt: 0,
            timer: None,
            next_token: 0,
            restart_after_stop: false,
            route_excluded: false,
            paused_by_user: false,
            unsupported_warned: false,
            channels,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == SessionState::Listening
    }

    pub fn last_error(&self) -> Option<&ErrorKind> {
        self.last_error.as_ref()
    }

    pub fn language(&self) -> &LanguageCode {
        &self.language
    }

    /// Whether a restart timer is pending
    pub fn restart_pending(&self) -> bool {
        matches!(&self.timer, Some(t) if t.kind == TimerKind::Backoff)
    }

    pub fn set_route_excluded(&mut self, excluded: bool) {
        self.route_excluded = excluded;
    }

    /// A view was mounted on a non-excluded route
    pub fn mount(&mut self, speech: &mut SpeechOutput) {
        if self.paused_by_user {
            debug!("listening paused by user, not starting on mount");
            return;
        }

        if matches!(
            self.state,
            SessionState::Idle | SessionState::Failed(ErrorKind::TransientResourceError { .. })
        ) {
            self.begin_start(speech);
        }
    }

    /// A fresh, user-initiated start; clears any recoverable failure
    pub fn start(&mut self, speech: &mut SpeechOutput) {
        self.paused_by_user = false;

        if let SessionState::Failed(kind) = &self.state {
            if *kind == ErrorKind::NotSupported {
                return;
            }
            info!(%kind, "clearing failure for explicit start");
            self.set_last_error(None);
            self.transition_to(SessionState::Idle);
        }

        self.begin_start(speech);
    }

    /// Explicit user stop; stays stopped across route changes
    pub fn pause(&mut self) {
        self.paused_by_user = true;
        self.stop();
    }

    /// Tear the session down immediately, bypassing auto-restart
    ///
    /// Permanent failures are kept so a later mount does not prompt again.
    pub fn stop(&mut self) {
        self.timer = None;
        self.attempt += 1;
        self.restart_after_stop = false;

        if let Some(mut resource) = self.resource.take() {
            resource.stop();
            drop(resource);
            debug!(generation = self.generation, "transcription resource released");
        }

        match &self.state {
            SessionState::Idle => {}
            SessionState::Failed(ErrorKind::PermissionDenied | ErrorKind::NotSupported) => {}
            _ => {
                self.transition_to(SessionState::Stopping);
                self.transition_to(SessionState::Idle);
            }
        }
    }

    /// Switch recognition language, reopening the resource if listening
    pub fn reconfigure(&mut self, language: LanguageCode) {
        if language == self.language {
            return;
        }

        info!(from = %self.language, to = %language, "session language changed");
        self.language = language;

        if self.state == SessionState::Listening {
            // The old resource must end before the new one opens
            self.restart_after_stop = true;
            self.transition_to(SessionState::Stopping);
            if let Some(resource) = self.resource.as_mut() {
                resource.stop();
            }
            self.schedule(TimerKind::StopTimeout, STOP_TIMEOUT);
        }
    }

    /// Capture access resolved for a start attempt
    pub fn on_permission(&mut self, attempt: u64, access: Access, speech: &mut SpeechOutput) {
        if attempt != self.attempt || self.state != SessionState::Starting {
            debug!(attempt, current = self.attempt, "ignoring stale permission result");
            return;
        }

        match access {
            Access::Granted => self.schedule(TimerKind::Settle, SETTLE_DELAY),
            Access::Denied => {
                self.fail(ErrorKind::PermissionDenied);
                speech.speak(MSG_ACCESS_REQUIRED, true);
            }
        }
    }

    /// A session timer expired
    pub fn on_timer(&mut self, fired: TimerFired, speech: &mut SpeechOutput) {
        match &self.timer {
            Some(pending) if pending.token == fired.token => {}
            _ => {
                debug!(?fired, "ignoring cancelled timer");
                return;
            }
        }
        self.timer = None;

        match fired.kind {
            TimerKind::Settle if self.state == SessionState::Starting => self.open_resource(speech),
            TimerKind::Settle => {}
            TimerKind::Backoff => {
                if self.state == SessionState::Idle && self.can_auto_restart() {
                    info!("restarting session after backoff");
                    self.begin_start(speech);
                }
            }
            TimerKind::StopTimeout if self.state == SessionState::Stopping => {
                warn!(
                    generation = self.generation,
                    timeout_ms = STOP_TIMEOUT.as_millis() as u64,
                    "resource did not end after stop, releasing it"
                );
                // A late end from the dropped resource no longer matches
                self.resource = None;
                self.finish_stopping(speech);
            }
            TimerKind::StopTimeout => {}
        }
    }

    /// Apply a recognizer callback; returns a transcript to route
    pub fn on_signal(
        &mut self,
        signal: RecognizerSignal,
        speech: &mut SpeechOutput,
    ) -> Option<String> {
        if self.resource.is_none() || signal.generation != self.generation {
            debug!(
                generation = signal.generation,
                current = self.generation,
                kind = ?signal.kind,
                "ignoring stale recognizer signal"
            );
            return None;
        }

        match signal.kind {
            RecognizerSignalKind::Result(transcript) => {
                if self.state == SessionState::Listening {
                    Some(transcript)
                } else {
                    None
                }
            }
            RecognizerSignalKind::Error(code) => {
                self.handle_error(code, speech);
                None
            }
            RecognizerSignalKind::End => {
                self.handle_end(speech);
                None
            }
        }
    }

    fn handle_error(&mut self, code: RecognizerErrorCode, speech: &mut SpeechOutput) {
        warn!(?code, state = %self.state, "recognizer error");

        match code {
            RecognizerErrorCode::NotAllowed => {
                self.restart_after_stop = false;
                self.fail(ErrorKind::PermissionDenied);
                speech.speak(MSG_ACCESS_REVOKED, true);
            }
            RecognizerErrorCode::NoSpeech => {
                // Transient: the end that follows restarts after backoff
                if self.state == SessionState::Listening {
                    self.set_last_error(Some(ErrorKind::NoSpeechDetected));
                    speech.speak(MSG_NO_SPEECH, false);
                }
            }
            RecognizerErrorCode::Aborted => {
                if self.state != SessionState::Stopping {
                    self.timer = None;
                    self.set_last_error(Some(ErrorKind::SessionAborted));
                    self.transition_to(SessionState::Idle);
                }
            }
            RecognizerErrorCode::Other(code) => {
                self.restart_after_stop = false;
                self.fail(ErrorKind::TransientResourceError { code });
            }
        }
    }

    fn handle_end(&mut self, speech: &mut SpeechOutput) {
        self.resource = None;
        debug!(generation = self.generation, "transcription resource ended");

        match self.state.clone() {
            SessionState::Stopping => {
                self.timer = None;
                self.finish_stopping(speech);
            }
            SessionState::Listening => {
                self.transition_to(SessionState::Idle);
                if self.can_auto_restart() {
                    self.schedule(TimerKind::Backoff, RESTART_BACKOFF);
                } else {
                    debug!(last_error = ?self.last_error, "not restarting ended session");
                }
            }
            _ => {}
        }
    }

    /// The old resource is gone; reopen if a restart was requested meanwhile
    fn finish_stopping(&mut self, speech: &mut SpeechOutput) {
        self.transition_to(SessionState::Idle);
        if std::mem::take(&mut self.restart_after_stop) {
            self.begin_start(speech);
        }
    }

    fn begin_start(&mut self, speech: &mut SpeechOutput) {
        if self.route_excluded {
            debug!("not starting on excluded route");
            return;
        }

        if self.backend.is_none() {
            if !self.unsupported_warned {
                self.unsupported_warned = true;
                speech.speak(MSG_NOT_SUPPORTED, true);
            }
            if self.state != SessionState::Failed(ErrorKind::NotSupported) {
                self.fail(ErrorKind::NotSupported);
            }
            return;
        }

        match self.state {
            SessionState::Starting | SessionState::Listening => return,
            SessionState::Stopping => {
                self.restart_after_stop = true;
                return;
            }
            _ => {}
        }

        self.timer = None;
        self.attempt += 1;
        self.transition_to(SessionState::Starting);

        let attempt = self.attempt;
        let gate = Arc::clone(&self.gate);
        let input_tx = self.channels.input_tx.clone();
        tokio::spawn(async move {
            let access = gate.ensure_capture_access().await;
            let _ = input_tx.send(EngineInput::PermissionResolved { attempt, access });
        });
    }

    fn open_resource(&mut self, speech: &mut SpeechOutput) {
        let Some(backend) = self.backend.clone() else {
            return;
        };

        self.generation += 1;
        let settings = RecognizerSettings::continuous(self.language.clone());
        let signals = RecognizerSignals::new(self.generation, self.channels.input_tx.clone());

        // A resource that fails to start is dropped, releasing the device
        let opened = backend.open(settings, signals).and_then(|mut resource| {
            resource.start()?;
            Ok(resource)
        });

        match opened {
            Ok(resource) => {
                self.resource = Some(resource);
                self.set_last_error(None);
                self.transition_to(SessionState::Listening);
            }
            Err(e) => {
                warn!(?e, "failed to start transcription resource");
                self.fail(ErrorKind::TransientResourceError { code: e.to_string() });
                speech.speak(MSG_START_FAILED, true);
            }
        }
    }

    fn can_auto_restart(&self) -> bool {
        !self.route_excluded
            && !self.paused_by_user
            && !self.last_error.as_ref().is_some_and(ErrorKind::blocks_restart)
    }

    fn schedule(&mut self, kind: TimerKind, delay: Duration) {
        self.next_token += 1;
        let token = self.next_token;
        let input_tx = self.channels.input_tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = input_tx.send(EngineInput::Timer(TimerFired { kind, token }));
        });

        debug!(?kind, delay_ms = delay.as_millis() as u64, "timer scheduled");
        // Replacing the previous timer aborts it
        self.timer = Some(PendingTimer { kind, token, handle });
    }

    fn fail(&mut self, kind: ErrorKind) {
        self.timer = None;
        self.set_last_error(Some(kind.clone()));
        self.transition_to(SessionState::Failed(kind));
    }

    /// Publish an error detected outside the session itself
    pub fn report_error(&mut self, kind: ErrorKind) {
        warn!(%kind, "error reported to session");
        self.set_last_error(Some(kind));
    }

    fn set_last_error(&mut self, error: Option<ErrorKind>) {
        self.last_error = error.clone();
        self.channels.error_tx.send_replace(error);
    }

    /// Perform a state transition
    fn transition_to(&mut self, new_state: SessionState) {
        if new_state == self.state {
            return;
        }

        let old_state = std::mem::replace(&mut self.state, new_state);
        info!(
            from = %old_state,
            to = %self.state,
            language = %self.language,
            "session transition"
        );

        let was_listening = old_state == SessionState::Listening;
        let listening = self.state == SessionState::Listening;
        self.channels.listening_tx.send_replace(listening);

        if was_listening && !listening {
            let _ = self.channels.event_tx.send(EngineEvent::ListeningStopped);
        }
        match &self.state {
            SessionState::Listening => {
                let _ = self.channels.event_tx.send(EngineEvent::ListeningStarted {
                    language: self.language.clone(),
                });
            }
            SessionState::Failed(kind) => {
                let _ = self
                    .channels
                    .event_tx
                    .send(EngineEvent::SessionFailed { kind: kind.clone() });
            }
            _ => {}
        }
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::PermissionState;
    use crate::testing::{RecordingBackend, RecordingSink, ScriptedDevice, ScriptedPermissions};

    struct Fixture {
        session: RecognitionSession,
        speech: SpeechOutput,
        backend: RecordingBackend,
        input_rx: mpsc::UnboundedReceiver<EngineInput>,
    }

    fn fixture() -> Fixture {
        let backend = RecordingBackend::new();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(16);
        let (speaking_tx, _) = watch::channel(false);
        let (listening_tx, _) = watch::channel(false);
        let (error_tx, _) = watch::channel(None);

        let speech = SpeechOutput::new(
            Box::new(RecordingSink::new()),
            LanguageCode::default(),
            speaking_tx,
            input_tx.clone(),
            event_tx.clone(),
        );
        let gate = Arc::new(PermissionGate::new(
            Some(Arc::new(ScriptedPermissions::new(Ok(PermissionState::Granted)))),
            Arc::new(ScriptedDevice::new(true)),
        ));
        let session = RecognitionSession::new(
            Some(Arc::new(backend.clone())),
            gate,
            LanguageCode::default(),
            SessionChannels {
                input_tx,
                listening_tx,
                error_tx,
                event_tx,
            },
        );

        Fixture {
            session,
            speech,
            backend,
            input_rx,
        }
    }

    /// Advance virtual time in small steps, feeding inputs back as the engine would
    async fn drive(fx: &mut Fixture, ms: u64) {
        for _ in 0..ms / 10 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            while let Ok(input) = fx.input_rx.try_recv() {
                match input {
                    EngineInput::PermissionResolved { attempt, access } => {
                        fx.session.on_permission(attempt, access, &mut fx.speech)
                    }
                    EngineInput::Timer(fired) => fx.session.on_timer(fired, &mut fx.speech),
                    EngineInput::Recognizer(signal) => {
                        fx.session.on_signal(signal, &mut fx.speech);
                    }
                    EngineInput::Utterance(signal) => fx.speech.on_signal(signal),
                    _ => {}
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_reaches_listening() {
        let mut fx = fixture();
        fx.session.mount(&mut fx.speech);
        assert_eq!(fx.session.state(), &SessionState::Starting);

        drive(&mut fx, 150).await;
        assert!(fx.session.is_listening());
        assert_eq!(fx.session.state().to_string(), "Listening");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_ignored() {
        let mut fx = fixture();
        fx.session.mount(&mut fx.speech);
        drive(&mut fx, 150).await;

        let stale = RecognizerSignal {
            generation: 0,
            kind: RecognizerSignalKind::End,
        };
        assert_eq!(fx.session.on_signal(stale, &mut fx.speech), None);
        assert!(fx.session.is_listening());

        let current = RecognizerSignal {
            generation: 1,
            kind: RecognizerSignalKind::Result("voice notes".into()),
        };
        assert_eq!(
            fx.session.on_signal(current, &mut fx.speech).as_deref(),
            Some("voice notes")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_permission_answer() {
        let mut fx = fixture();
        fx.session.mount(&mut fx.speech);
        fx.session.stop();

        drive(&mut fx, 500).await;
        assert_eq!(fx.session.state(), &SessionState::Idle);
        assert_eq!(fx.backend.opens(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_schedules_restart() {
        let mut fx = fixture();
        fx.session.mount(&mut fx.speech);
        drive(&mut fx, 150).await;

        fx.backend.emit_end();
        drive(&mut fx, 20).await;
        assert_eq!(fx.session.state(), &SessionState::Idle);
        assert!(fx.session.restart_pending());

        fx.session.stop();
        assert!(!fx.session.restart_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfigure_while_idle_only_records_language() {
        let mut fx = fixture();
        let hindi = LanguageCode::parse("hi-IN").unwrap();
        fx.session.reconfigure(hindi.clone());

        assert_eq!(fx.session.language(), &hindi);
        assert_eq!(fx.session.state(), &SessionState::Idle);
        assert!(fx.backend.log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_stop_is_bounded_by_timeout() {
        let mut fx = fixture();
        fx.session.mount(&mut fx.speech);
        drive(&mut fx, 150).await;

        fx.backend.set_silent_stop(true);
        fx.session.reconfigure(LanguageCode::parse("kn-IN").unwrap());
        drive(&mut fx, 500).await;
        assert_eq!(fx.session.state(), &SessionState::Stopping);
        assert_eq!(fx.backend.open_now(), 1);

        drive(&mut fx, 800).await;
        assert!(fx.session.is_listening());
        assert_eq!(fx.backend.max_open(), 1);
        assert_eq!(
            fx.backend.log(),
            vec!["open:en-US", "start", "stop", "release", "open:kn-IN", "start"]
        );

        // An end from the released resource is stale
        let late = RecognizerSignal {
            generation: 1,
            kind: RecognizerSignalKind::End,
        };
        fx.session.on_signal(late, &mut fx.speech);
        assert!(fx.session.is_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn test_excluded_route_never_starts() {
        let mut fx = fixture();
        fx.session.set_route_excluded(true);
        fx.session.mount(&mut fx.speech);

        drive(&mut fx, 500).await;
        assert_eq!(fx.session.state(), &SessionState::Idle);
        assert_eq!(fx.session.last_error(), None);
    }
}
