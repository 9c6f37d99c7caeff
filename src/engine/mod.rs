//! Engine module: the single-owner voice session engine
//!
//! [`Engine`] runs as one task that owns the recognition session, speech
//! output, command router and page announcer. Page collaborators talk to it
//! through a cloneable [`EngineHandle`].

mod actor;
mod handle;
mod input;
mod instance;

pub use actor::{Collaborators, Engine, EngineConfig, DEFAULT_EXCLUDED_ROUTE};
pub use handle::EngineHandle;
pub use input::EngineInput;
pub use instance::{InstanceClaim, InstanceSlot};
