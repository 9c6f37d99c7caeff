//! Single-instance policy
//!
//! Only one engine may own the capture and output devices at a time. An
//! engine claims an [`InstanceSlot`] for its whole lifetime; a second claim
//! on the same slot is refused.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::error::EngineError;

/// A slot that at most one engine can hold
#[derive(Debug, Default)]
pub struct InstanceSlot {
    claimed: AtomicBool,
}

impl InstanceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide slot
    pub fn global() -> Arc<InstanceSlot> {
        static GLOBAL: OnceLock<Arc<InstanceSlot>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(InstanceSlot::new())))
    }

    pub fn try_claim(self: &Arc<Self>) -> Result<InstanceClaim, EngineError> {
        if self.claimed.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyActive);
        }
        debug!("engine instance slot claimed");
        Ok(InstanceClaim {
            slot: Arc::clone(self),
        })
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }
}

/// Held by a live engine; releases the slot on drop
#[derive(Debug)]
pub struct InstanceClaim {
    slot: Arc<InstanceSlot>,
}

impl Drop for InstanceClaim {
    fn drop(&mut self) {
        self.slot.claimed.store(false, Ordering::SeqCst);
        debug!("engine instance slot released");
    }
}
