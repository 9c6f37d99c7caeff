//! Navigation module: voice commands and page announcements

mod announcer;
mod commands;
mod navigator;

pub use announcer::{PageAnnouncer, PageMessageTable};
pub use commands::{CommandAction, CommandEntry, CommandRouter, CommandTable};
pub use navigator::Navigator;
