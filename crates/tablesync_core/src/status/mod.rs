//! Index status: rows, storage and the state machine.

mod model;
mod store;
mod tracker;

pub use model::{Completion, Progress, StatusError, StatusLookup, TableState, TableStatus};
pub use store::{new_reset_token, MemoryStatusStore, StatusStore};
pub use tracker::StatusTracker;
