//! Signal handling for graceful shutdown

use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Resolves on SIGTERM, SIGINT, or an in-process request
#[derive(Default)]
pub struct ShutdownSignal {
    requested: Notify,
}

impl ShutdownSignal {
    /// Create a new shutdown signal handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask a pending or future `wait` to return
    pub fn request(&self) {
        self.requested.notify_one();
    }

    /// Wait for a shutdown signal
    pub async fn wait(&self) {
        let mut sigterm = register(SignalKind::terminate(), "SIGTERM");
        let mut sigint = register(SignalKind::interrupt(), "SIGINT");

        tokio::select! {
            _ = recv(&mut sigterm) => {
                debug!("received SIGTERM");
            }
            _ = recv(&mut sigint) => {
                debug!("received SIGINT");
            }
            _ = self.requested.notified() => {
                debug!("shutdown requested");
            }
        }
    }
}

fn register(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!(?e, signal = name, "failed to register signal handler");
            None
        }
    }
}

/// Wait for the next delivery; pends forever if the handler is missing
async fn recv(stream: &mut Option<Signal>) {
    match stream {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending().await,
    }
}
