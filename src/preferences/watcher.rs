//! Observes the language preference for changes made outside the engine
//!
//! Native change notifications and a coarse poll both funnel into the same
//! `LanguageChanged` engine input. The poll catches same-process writes that
//! never fire a notification.
//!
//! Observed values are compared against the language the engine has applied,
//! not against the watcher's own history, so a value selected through the
//! handle and later overwritten back by another context is still forwarded.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::language::LanguageCode;
use super::storage::PreferenceChange;
use super::store::{PreferenceStore, LANGUAGE_KEY};
use crate::engine::EngineInput;

/// Interval of the fallback preference poll
pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Background task forwarding language preference changes to the engine
pub struct PreferenceWatcher {
    store: PreferenceStore,
    input_tx: mpsc::UnboundedSender<EngineInput>,
    applied: watch::Receiver<LanguageCode>,
}

impl PreferenceWatcher {
    /// Create a watcher; `applied` tracks the language the engine is using
    pub fn new(
        store: PreferenceStore,
        input_tx: mpsc::UnboundedSender<EngineInput>,
        applied: watch::Receiver<LanguageCode>,
    ) -> Self {
        Self {
            store,
            input_tx,
            applied,
        }
    }

    /// Run until the engine input channel closes
    pub async fn run(self) {
        let mut changes = self.store.storage().subscribe();
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            native = changes.is_some(),
            poll_ms = POLL_INTERVAL.as_millis() as u64,
            "preference watcher started"
        );

        loop {
            let observed = tokio::select! {
                change = next_change(&mut changes) => match change {
                    Some(change) if change.key == LANGUAGE_KEY => {
                        Some(match change.new_value {
                            Some(raw) => PreferenceStore::decode(&raw),
                            None => LanguageCode::default(),
                        })
                    }
                    Some(_) => None,
                    // Lagged or closed: re-read the source of truth
                    None => Some(self.store.language()),
                },
                _ = ticker.tick() => Some(self.store.language()),
                _ = self.input_tx.closed() => break,
            };

            if let Some(language) = observed {
                if !self.forward(language) {
                    break;
                }
            }
        }

        debug!("preference watcher stopped");
    }

    /// Forward a language if it differs from the one the engine applied
    ///
    /// A value already in flight may be forwarded twice; the engine ignores
    /// a change to the language it already uses.
    fn forward(&self, language: LanguageCode) -> bool {
        let applied = self.applied.borrow().clone();
        if language == applied {
            return true;
        }

        debug!(from = %applied, to = %language, "language preference changed");
        self.input_tx
            .send(EngineInput::LanguageChanged(language))
            .is_ok()
    }
}

/// Wait for the next notification; pends forever without a native channel
async fn next_change(
    changes: &mut Option<broadcast::Receiver<PreferenceChange>>,
) -> Option<PreferenceChange> {
    let Some(rx) = changes.as_mut() else {
        return std::future::pending().await;
    };

    match rx.recv().await {
        Ok(change) => Some(change),
        Err(broadcast::error::RecvError::Lagged(n)) => {
            warn!(skipped = n, "preference notifications lagged");
            None
        }
        Err(broadcast::error::RecvError::Closed) => {
            *changes = None;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::preferences::{MemoryStorage, PreferenceStorage};

    struct Watched {
        watcher: PreferenceWatcher,
        rx: mpsc::UnboundedReceiver<EngineInput>,
        applied: watch::Sender<LanguageCode>,
    }

    fn watcher_with(storage: Arc<MemoryStorage>, applied: LanguageCode) -> Watched {
        let (tx, rx) = mpsc::unbounded_channel();
        let (applied, applied_rx) = watch::channel(applied);
        let store = PreferenceStore::new(storage);
        Watched {
            watcher: PreferenceWatcher::new(store, tx, applied_rx),
            rx,
            applied,
        }
    }

    fn expect_language(input: Option<EngineInput>) -> LanguageCode {
        match input {
            Some(EngineInput::LanguageChanged(lang)) => lang,
            other => panic!("expected LanguageChanged, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_notification_is_forwarded() {
        let storage = Arc::new(MemoryStorage::new());
        let mut w = watcher_with(storage.clone(), LanguageCode::default());
        tokio::spawn(w.watcher.run());
        tokio::task::yield_now().await;

        storage.set_from_other_context(LANGUAGE_KEY, "hi-IN");
        let lang = expect_language(w.rx.recv().await);
        assert_eq!(lang.as_str(), "hi-IN");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_catches_silent_write() {
        let storage = Arc::new(MemoryStorage::new());
        let mut w = watcher_with(storage.clone(), LanguageCode::default());
        tokio::spawn(w.watcher.run());

        storage.set(LANGUAGE_KEY, "ta-IN").unwrap();
        let lang = expect_language(w.rx.recv().await);
        assert_eq!(lang.as_str(), "ta-IN");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_value_is_not_forwarded() {
        let storage = Arc::new(MemoryStorage::new());
        let mut w = watcher_with(storage.clone(), LanguageCode::default());
        tokio::spawn(w.watcher.run());

        storage.set_from_other_context(LANGUAGE_KEY, "en-US");
        tokio::time::sleep(POLL_INTERVAL * 3).await;
        assert!(w.rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_revert_after_applied_change_is_forwarded() {
        let storage = Arc::new(MemoryStorage::new());
        let mut w = watcher_with(storage.clone(), LanguageCode::default());
        tokio::spawn(w.watcher.run());
        tokio::task::yield_now().await;

        // The engine switched language without the watcher observing a write
        w.applied.send_replace(LanguageCode::parse("ta-IN").unwrap());
        storage.set_from_other_context(LANGUAGE_KEY, "en-US");

        let lang = expect_language(w.rx.recv().await);
        assert_eq!(lang, LanguageCode::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_value_falls_back_to_default() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(LANGUAGE_KEY, "bn-IN").unwrap();
        let mut w = watcher_with(storage.clone(), LanguageCode::parse("bn-IN").unwrap());
        tokio::spawn(w.watcher.run());
        tokio::task::yield_now().await;

        storage.set_from_other_context(LANGUAGE_KEY, "???");
        let lang = expect_language(w.rx.recv().await);
        assert_eq!(lang, LanguageCode::default());
    }
}
