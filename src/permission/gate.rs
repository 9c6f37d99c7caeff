//! Capture-device authorization
//!
//! Determines whether the microphone may be used, prompting the user at
//! most once per attempt and never re-prompting once access is denied.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DeviceError, PermissionError};

/// Kind of capture device being authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Microphone,
}

/// Authorization state reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    /// The host will show a prompt when the device is requested
    Prompt,
    Denied,
}

/// Outcome of [`PermissionGate::ensure_capture_access`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied,
}

/// Constraints passed when opening the capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub audio: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self { audio: true }
    }
}

/// Optional host capability for reading authorization without prompting
#[async_trait]
pub trait PermissionQuery: Send + Sync {
    async fn query(&self, kind: DeviceKind) -> Result<PermissionState, PermissionError>;
}

/// The host's capture device
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Open the device; may show the system authorization prompt
    async fn open(&self, constraints: CaptureConstraints)
        -> Result<Box<dyn CaptureHandle>, DeviceError>;
}

/// An open capture handle
pub trait CaptureHandle: Send {
    /// Release the device
    fn release(self: Box<Self>);
}

/// Decides capture access before a listening session may start
pub struct PermissionGate {
    query: Option<Arc<dyn PermissionQuery>>,
    device: Arc<dyn CaptureDevice>,
}

impl PermissionGate {
    pub fn new(query: Option<Arc<dyn PermissionQuery>>, device: Arc<dyn CaptureDevice>) -> Self {
        Self { query, device }
    }

    /// Ensure the microphone may be used
    ///
    /// `Granted` returns at once, `Prompt` opens and immediately releases
    /// the device to force the prompt, `Denied` returns without prompting.
    /// Without a usable query capability the device is requested directly.
    pub async fn ensure_capture_access(&self) -> Access {
        let state = match &self.query {
            Some(query) => match query.query(DeviceKind::Microphone).await {
                Ok(state) => Some(state),
                Err(e) => {
                    debug!(?e, "permission query unavailable, requesting device directly");
                    None
                }
            },
            None => None,
        };

        let access = match state {
            Some(PermissionState::Granted) => Access::Granted,
            Some(PermissionState::Denied) => Access::Denied,
            Some(PermissionState::Prompt) | None => self.request_device().await,
        };

        info!(?state, ?access, "capture access resolved");
        access
    }

    async fn request_device(&self) -> Access {
        match self.device.open(CaptureConstraints::default()).await {
            Ok(handle) => {
                handle.release();
                Access::Granted
            }
            Err(e) => {
                warn!(?e, "capture device request failed");
                Access::Denied
            }
        }
    }
}
