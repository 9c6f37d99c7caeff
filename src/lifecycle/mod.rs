//! Process lifecycle for the host binary

mod shutdown;

pub use shutdown::ShutdownSignal;
