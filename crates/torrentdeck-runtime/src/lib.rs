//! The sync engine: one actor task that owns the active connection, polls
//! the daemon on a timer, merges what it hears into the torrent list and
//! forwards local mutations.

mod actor;
mod engine;
mod error;
mod schedule;
mod state;

pub use engine::EngineHandle;
pub use error::EngineError;
pub use state::SyncState;
