//! voicenav: terminal host for the voice navigation engine
//!
//! Runs the engine against console collaborators:
//! - stdin lines are heard as speech while listening
//! - utterances are printed instead of synthesized
//! - navigations are fed back to the engine as route changes
//! - the language preference persists in a JSON file under the data dir

mod config;
mod console;
mod lifecycle;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use voicenav::engine::{Collaborators, Engine, EngineHandle, InstanceSlot};
use voicenav::preferences::FileStorage;

use crate::config::Config;
use crate::console::{
    ConsoleCapture, ConsoleCommand, ConsoleNavigator, ConsolePermissions, ConsoleRecognizer,
    ConsoleSpeaker, HELP,
};
use crate::lifecycle::ShutdownSignal;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "voicenav starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.data_dir, route = %config.initial_route, "configuration loaded");

    let shutdown = ShutdownSignal::new();

    let recognizer = ConsoleRecognizer::new();
    let (navigator, mut route_rx) = ConsoleNavigator::new();
    let collaborators = Collaborators {
        navigator: Arc::new(navigator),
        storage: Arc::new(FileStorage::new(config.preferences_path.clone())),
        permissions: Some(Arc::new(ConsolePermissions)),
        device: Arc::new(ConsoleCapture),
        recognizer: Some(Arc::new(recognizer.clone())),
        speech: Box::new(ConsoleSpeaker::new()),
        instance_slot: InstanceSlot::global(),
    };

    let (handle, mut engine_task) = Engine::spawn(config.engine_config()?, collaborators)?;
    let mut event_rx = handle.subscribe();
    let mut lines = console::spawn_stdin_reader();

    println!("{}", HELP);
    info!("engine initialized, entering main loop");

    // Main event loop
    tokio::select! {
        result = &mut engine_task => {
            if let Err(e) = result {
                error!(?e, "engine task failed");
            }
        }

        // Feed navigations back as route changes
        _ = async {
            while let Some(path) = route_rx.recv().await {
                if handle.route_changed(path).is_err() {
                    break;
                }
            }
        } => {
            info!("navigator channel closed");
        }

        // Log engine events
        _ = async {
            loop {
                match event_rx.recv().await {
                    Ok(event) => info!(%event, "engine event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "engine event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("engine event stream closed");
        }

        // Console input
        _ = async {
            while let Some(line) = lines.recv().await {
                let Some(command) = ConsoleCommand::parse(&line) else {
                    continue;
                };
                if command == ConsoleCommand::Quit {
                    shutdown.request();
                    break;
                }
                if let Err(e) = execute(&handle, &recognizer, command).await {
                    error!(?e, "console command failed");
                }
            }
        } => {
            info!("console input closed");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    if handle.shutdown().is_ok() {
        if let Err(e) = engine_task.await {
            error!(?e, "engine task failed during shutdown");
        }
    }

    info!("voicenav stopped");

    Ok(())
}

async fn execute(
    handle: &EngineHandle,
    recognizer: &ConsoleRecognizer,
    command: ConsoleCommand,
) -> Result<()> {
    match command {
        ConsoleCommand::Transcript(text) => {
            // Heard speech while listening, otherwise routed as free text
            if !recognizer.hear(&text) && !handle.route(text).await? {
                println!("(no command matched)");
            }
        }
        ConsoleCommand::Go(path) => handle.route_changed(path)?,
        ConsoleCommand::Lang(code) => match handle.set_language(&code) {
            Ok(language) => info!(%language, "language selected"),
            Err(e) => println!("invalid language {:?}: {}", code, e),
        },
        ConsoleCommand::Say(text) => handle.speak(text, false)?,
        ConsoleCommand::Hush => handle.stop_speaking()?,
        ConsoleCommand::Start => handle.start_listening()?,
        ConsoleCommand::Stop => handle.stop_listening()?,
        ConsoleCommand::Fail(code) => {
            if !recognizer.fail(&code) {
                println!("(not listening)");
            }
        }
        ConsoleCommand::Status => {
            println!(
                "listening={} speaking={} language={} last_error={}",
                handle.is_listening(),
                handle.is_speaking(),
                handle.language(),
                handle
                    .last_error()
                    .map(|kind| kind.to_string())
                    .unwrap_or_else(|| "none".to_string()),
            );
        }
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Unknown(line) => println!("unknown command {:?}, try :help", line),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}
