//! Scripted collaborators for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{DeviceError, PermissionError, ResourceError};
use crate::navigation::Navigator;
use crate::permission::{
    CaptureConstraints, CaptureDevice, CaptureHandle, DeviceKind, PermissionQuery,
    PermissionState,
};
use crate::session::{
    RecognizerBackend, RecognizerSettings, RecognizerSignals, TranscriptionResource,
};
use crate::speech::{Utterance, UtteranceSignals, UtteranceSink};

// ── Capture device ─────────────────────────────────────────────────

pub struct ScriptedDevice {
    ok: bool,
    opens: AtomicUsize,
    releases: Arc<AtomicUsize>,
}

impl ScriptedDevice {
    pub fn new(ok: bool) -> Self {
        Self {
            ok,
            opens: AtomicUsize::new(0),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

struct ScriptedHandle {
    releases: Arc<AtomicUsize>,
}

impl CaptureHandle for ScriptedHandle {
    fn release(self: Box<Self>) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CaptureDevice for ScriptedDevice {
    async fn open(
        &self,
        _constraints: CaptureConstraints,
    ) -> Result<Box<dyn CaptureHandle>, DeviceError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.ok {
            Ok(Box::new(ScriptedHandle {
                releases: Arc::clone(&self.releases),
            }))
        } else {
            Err(DeviceError::NotAllowed)
        }
    }
}

// ── Permission query ───────────────────────────────────────────────

pub struct ScriptedPermissions {
    answer: Mutex<Result<PermissionState, PermissionError>>,
    queries: AtomicUsize,
}

impl ScriptedPermissions {
    pub fn new(answer: Result<PermissionState, PermissionError>) -> Self {
        Self {
            answer: Mutex::new(answer),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, state: PermissionState) {
        *self.answer.lock().unwrap() = Ok(state);
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionQuery for ScriptedPermissions {
    async fn query(&self, _kind: DeviceKind) -> Result<PermissionState, PermissionError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.answer.lock().unwrap().clone()
    }
}

// ── Utterance sink ─────────────────────────────────────────────────

#[derive(Default)]
struct SinkState {
    spoken: Vec<Utterance>,
    audible: Vec<(Utterance, UtteranceSignals)>,
}

/// Records every utterance; starts them at once and keeps them audible
/// until cancelled or finished
#[derive(Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<SinkState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.state.lock().unwrap().spoken.clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.spoken().into_iter().map(|u| u.text).collect()
    }

    pub fn audible(&self) -> Vec<Utterance> {
        let state = self.state.lock().unwrap();
        state.audible.iter().map(|(u, _)| u.clone()).collect()
    }

    /// Let every audible utterance play to completion
    pub fn finish_all(&self) {
        let mut state = self.state.lock().unwrap();
        for (_, signals) in state.audible.drain(..) {
            signals.ended();
        }
    }
}

impl UtteranceSink for RecordingSink {
    fn speak(&mut self, utterance: Utterance, signals: UtteranceSignals) {
        let mut state = self.state.lock().unwrap();
        signals.started();
        state.spoken.push(utterance.clone());
        state.audible.push((utterance, signals));
    }

    fn cancel_all(&mut self) {
        let mut state = self.state.lock().unwrap();
        for (_, signals) in state.audible.drain(..) {
            signals.failed("interrupted");
        }
    }
}

// ── Recognizer backend ─────────────────────────────────────────────

#[derive(Default)]
struct BackendState {
    log: Vec<String>,
    opens: usize,
    open_now: usize,
    max_open: usize,
    signals: Option<RecognizerSignals>,
    fail_start: bool,
    silent_stop: bool,
}

/// Records resource lifecycle as `open:<lang>`, `start`, `stop`, `release`
///
/// Stopping a resource answers with an asynchronous `end`, like a real
/// recognizer.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    state: Arc<Mutex<BackendState>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn open_now(&self) -> usize {
        self.state.lock().unwrap().open_now
    }

    pub fn max_open(&self) -> usize {
        self.state.lock().unwrap().max_open
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.state.lock().unwrap().fail_start = fail;
    }

    /// Make `stop` never answer with `end`
    pub fn set_silent_stop(&self, silent: bool) {
        self.state.lock().unwrap().silent_stop = silent;
    }

    fn signals(&self) -> RecognizerSignals {
        self.state
            .lock()
            .unwrap()
            .signals
            .clone()
            .expect("no resource was opened")
    }

    pub fn emit_result(&self, transcript: &str) {
        self.signals().result(transcript);
    }

    pub fn emit_error(&self, code: &str) {
        self.signals().error(code);
    }

    pub fn emit_end(&self) {
        self.signals().end();
    }
}

impl RecognizerBackend for RecordingBackend {
    fn open(
        &self,
        settings: RecognizerSettings,
        signals: RecognizerSignals,
    ) -> Result<Box<dyn TranscriptionResource>, ResourceError> {
        let mut state = self.state.lock().unwrap();
        assert!(settings.continuous && !settings.interim_results);

        state.log.push(format!("open:{}", settings.language));
        state.opens += 1;
        state.open_now += 1;
        state.max_open = state.max_open.max(state.open_now);
        state.signals = Some(signals.clone());

        Ok(Box::new(RecordingResource {
            state: Arc::clone(&self.state),
            signals,
        }))
    }
}

struct RecordingResource {
    state: Arc<Mutex<BackendState>>,
    signals: RecognizerSignals,
}

impl TranscriptionResource for RecordingResource {
    fn start(&mut self) -> Result<(), ResourceError> {
        let mut state = self.state.lock().unwrap();
        state.log.push("start".to_string());
        if state.fail_start {
            Err(ResourceError::Start("device busy".to_string()))
        } else {
            Ok(())
        }
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.log.push("stop".to_string());
        if !state.silent_stop {
            self.signals.end();
        }
    }
}

impl Drop for RecordingResource {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.log.push("release".to_string());
        state.open_now -= 1;
    }
}

// ── Navigator ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNavigator {
    paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to(&self, path: &str) {
        self.paths.lock().unwrap().push(path.to_string());
    }
}
