//! In-memory implementations of the external collaborators.
//!
//! Used by tests, the testkit and the CLI simulation. All of them are
//! thread-safe and cheap to construct.

mod index;
mod replication;
mod schema;
mod truth;

pub use index::MemoryIndexStore;
pub use replication::MemoryReplicationStore;
pub use schema::MemorySchemaStore;
pub use truth::MemoryTruthStore;
