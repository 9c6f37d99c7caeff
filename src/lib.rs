//! voicenav: voice session engine for assistive navigation
//!
//! Listens continuously for spoken commands, routes them to navigation
//! targets, speaks confirmations and page descriptions, and keeps the
//! recognition language in step with the user's stored preference.
//!
//! Host capabilities (recognizer, synthesizer, capture device, permission
//! query, navigator, preference storage) are injected as trait objects
//! through [`engine::Collaborators`].

pub mod engine;
pub mod error;
pub mod events;
pub mod navigation;
pub mod permission;
pub mod preferences;
pub mod session;
pub mod speech;

#[cfg(test)]
mod testing;

pub use engine::{Collaborators, Engine, EngineConfig, EngineHandle, InstanceSlot};
pub use error::{EngineError, ErrorKind};
pub use events::EngineEvent;
