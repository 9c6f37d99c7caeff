//! The engine task
//!
//! Owns every component and processes [`EngineInput`]s one at a time, so
//! all decisions are made against a single consistent state.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::handle::EngineHandle;
use super::input::EngineInput;
use super::instance::{InstanceClaim, InstanceSlot};
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::navigation::{
    CommandAction, CommandRouter, CommandTable, Navigator, PageAnnouncer, PageMessageTable,
};
use crate::permission::{CaptureDevice, PermissionGate, PermissionQuery};
use crate::preferences::{LanguageCode, PreferenceStorage, PreferenceStore, PreferenceWatcher};
use crate::session::{RecognitionSession, RecognizerBackend, SessionChannels};
use crate::speech::{SpeechOutput, UtteranceSink};

/// Default route where unsolicited speech and listening are suppressed
pub const DEFAULT_EXCLUDED_ROUTE: &str = "/login";

/// Engine policy and static tables
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The unauthenticated route
    pub excluded_route: String,
    /// Route of the view the engine is mounted on
    pub initial_route: String,
    pub commands: CommandTable,
    pub page_messages: PageMessageTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            excluded_route: DEFAULT_EXCLUDED_ROUTE.to_string(),
            initial_route: "/".to_string(),
            commands: CommandTable::default(),
            page_messages: PageMessageTable::builtin(),
        }
    }
}

/// Host capabilities the engine depends on
pub struct Collaborators {
    pub navigator: Arc<dyn Navigator>,
    pub storage: Arc<dyn PreferenceStorage>,
    /// Optional authorization query
    pub permissions: Option<Arc<dyn PermissionQuery>>,
    pub device: Arc<dyn CaptureDevice>,
    /// `None` when the host cannot transcribe speech
    pub recognizer: Option<Arc<dyn RecognizerBackend>>,
    pub speech: Box<dyn UtteranceSink>,
    /// Slot enforcing one engine at a time
    pub instance_slot: Arc<InstanceSlot>,
}

/// The voice session engine
pub struct Engine {
    excluded_route: String,
    current_path: String,
    language: LanguageCode,
    session: RecognitionSession,
    speech: SpeechOutput,
    router: CommandRouter,
    announcer: PageAnnouncer,
    navigator: Arc<dyn Navigator>,
    preferences: PreferenceStore,
    input_tx: mpsc::UnboundedSender<EngineInput>,
    input_rx: mpsc::UnboundedReceiver<EngineInput>,
    language_tx: watch::Sender<LanguageCode>,
    event_tx: broadcast::Sender<EngineEvent>,
    _claim: InstanceClaim,
}

impl Engine {
    /// Create an engine and its handle; the language preference is read here
    pub fn new(
        config: EngineConfig,
        collaborators: Collaborators,
    ) -> Result<(Self, EngineHandle), EngineError> {
        let claim = collaborators.instance_slot.try_claim()?;

        let preferences = PreferenceStore::new(collaborators.storage);
        let (language, read_error) = preferences.load_language();

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(64);
        let (listening_tx, listening_rx) = watch::channel(false);
        let (speaking_tx, speaking_rx) = watch::channel(false);
        let (language_tx, language_rx) = watch::channel(language.clone());
        let (error_tx, error_rx) = watch::channel(None);

        let speech = SpeechOutput::new(
            collaborators.speech,
            language.clone(),
            speaking_tx,
            input_tx.clone(),
            event_tx.clone(),
        );

        let gate = Arc::new(PermissionGate::new(
            collaborators.permissions,
            collaborators.device,
        ));
        let mut session = RecognitionSession::new(
            collaborators.recognizer,
            gate,
            language.clone(),
            SessionChannels {
                input_tx: input_tx.clone(),
                listening_tx,
                error_tx,
                event_tx: event_tx.clone(),
            },
        );
        if let Some(kind) = read_error {
            session.report_error(kind);
        }

        let handle = EngineHandle {
            input_tx: input_tx.clone(),
            listening_rx,
            speaking_rx,
            language_rx,
            error_rx,
            event_tx: event_tx.clone(),
            preferences: preferences.clone(),
        };

        let engine = Self {
            excluded_route: config.excluded_route,
            current_path: config.initial_route,
            language,
            session,
            speech,
            router: CommandRouter::new(config.commands),
            announcer: PageAnnouncer::new(config.page_messages),
            navigator: collaborators.navigator,
            preferences,
            input_tx,
            input_rx,
            language_tx,
            event_tx,
            _claim: claim,
        };

        Ok((engine, handle))
    }

    /// Create an engine and run it on the current runtime
    pub fn spawn(
        config: EngineConfig,
        collaborators: Collaborators,
    ) -> Result<(EngineHandle, JoinHandle<()>), EngineError> {
        let (engine, handle) = Self::new(config, collaborators)?;
        let task = tokio::spawn(engine.run());
        Ok((handle, task))
    }

    /// Run until shutdown
    pub async fn run(mut self) {
        info!(
            route = %self.current_path,
            language = %self.language,
            "voice engine started"
        );

        let watcher = PreferenceWatcher::new(
            self.preferences.clone(),
            self.input_tx.clone(),
            self.language_tx.subscribe(),
        );
        let watcher_task = tokio::spawn(watcher.run());

        self.mount_view();

        while let Some(input) = self.input_rx.recv().await {
            if !self.handle_input(input) {
                break;
            }
        }

        watcher_task.abort();
        self.session.stop();
        self.speech.stop_speaking();
        info!("voice engine stopped");
    }

    /// Process one input; returns false on shutdown
    fn handle_input(&mut self, input: EngineInput) -> bool {
        match input {
            EngineInput::Speak { text, forced } => {
                self.speech.speak(&text, forced);
            }
            EngineInput::StopSpeaking => self.speech.stop_speaking(),
            EngineInput::Route { transcript, reply } => {
                let fired = self.route_transcript(&transcript);
                if let Some(reply) = reply {
                    let _ = reply.send(fired);
                }
            }
            EngineInput::StartListening => self.session.start(&mut self.speech),
            EngineInput::StopListening => self.session.pause(),
            EngineInput::RouteChanged(path) => self.change_route(path),
            EngineInput::LanguageChanged(language) => self.apply_language(language),
            EngineInput::LanguageSelected(language) => {
                self.apply_language(language.clone());
                let name = language.display_name().unwrap_or(language.as_str());
                self.speech.speak(&format!("Language changed to {}", name), true);
            }
            EngineInput::Recognizer(signal) => {
                if let Some(transcript) = self.session.on_signal(signal, &mut self.speech) {
                    self.route_transcript(&transcript);
                }
            }
            EngineInput::Utterance(signal) => self.speech.on_signal(signal),
            EngineInput::PermissionResolved { attempt, access } => {
                self.session.on_permission(attempt, access, &mut self.speech)
            }
            EngineInput::Timer(fired) => self.session.on_timer(fired, &mut self.speech),
            EngineInput::Shutdown => {
                info!("shutdown requested");
                return false;
            }
        }
        true
    }

    /// Match a transcript and fire its command
    fn route_transcript(&mut self, transcript: &str) -> bool {
        let Some(entry) = self.router.find(transcript) else {
            debug!(transcript, "no command matched");
            return false;
        };

        info!(transcript, phrase = %entry.phrase, "voice command matched");

        // Speak first, then navigate without waiting for the speech to end
        self.speech.speak(&entry.confirmation(), false);
        match &entry.action {
            CommandAction::Navigate { path } => {
                self.navigator.navigate_to(path);
                let _ = self.event_tx.send(EngineEvent::CommandMatched {
                    phrase: entry.phrase.clone(),
                    path: path.clone(),
                });
            }
        }
        true
    }

    fn change_route(&mut self, path: String) {
        if path == self.current_path {
            debug!(path, "view re-rendered");
            self.announce();
            return;
        }

        info!(from = %self.current_path, to = %path, "route changed");
        self.current_path = path;
        let _ = self.event_tx.send(EngineEvent::RouteChanged {
            path: self.current_path.clone(),
        });
        self.mount_view();
    }

    /// Treat the current route as a freshly mounted view
    fn mount_view(&mut self) {
        let excluded = self.is_excluded();
        self.speech.set_suppressed(excluded);
        self.session.set_route_excluded(excluded);

        self.announcer.remount();
        self.announce();

        if excluded {
            self.session.stop();
        } else {
            self.session.mount(&mut self.speech);
        }
    }

    fn announce(&mut self) {
        let excluded = self.is_excluded();
        let spoken = self.announcer.announce(
            &self.current_path,
            excluded,
            &self.language,
            &mut self.speech,
        );
        if spoken.is_some() {
            let _ = self.event_tx.send(EngineEvent::PageAnnounced {
                path: self.current_path.clone(),
            });
        }
    }

    fn apply_language(&mut self, language: LanguageCode) {
        if language == self.language {
            return;
        }

        info!(from = %self.language, to = %language, "language changed");
        self.language = language.clone();
        self.speech.set_language(language.clone());
        self.session.reconfigure(language.clone());
        self.language_tx.send_replace(language.clone());
        let _ = self.event_tx.send(EngineEvent::LanguageChanged { language });

        // A view without a message in the old language may have one now
        self.announce();
    }

    fn is_excluded(&self) -> bool {
        self.current_path == self.excluded_route
    }
}
