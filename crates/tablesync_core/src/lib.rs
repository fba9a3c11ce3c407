//! # Tablesync Core
//!
//! Keeps the queryable index of every table and view consistent with the
//! authoritative entity graph and the replication store.
//!
//! This crate provides:
//! - Status tracking with fencing tokens (PROCESSING / AVAILABLE / FAILED)
//! - Schema and version fingerprints for staleness detection
//! - View scope validation and bounded container expansion
//! - Reconciliation requests for the replication pipeline
//! - Per-object exclusive and shared locks
//! - The index rebuild pipeline and its asynchronous worker
//! - In-memory collaborators for tests and simulation
//!
//! ## Key Invariants
//!
//! - A new reset token is issued on every entry into PROCESSING
//! - A completion is accepted only with the current token
//! - AVAILABLE is set only after the whole pipeline succeeds
//! - A Project scope never combines with other types
//! - Scope size is checked before and after expansion; it never truncates
//! - At most one rebuild per object runs at a time

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod builder;
mod cache;
mod change_feed;
mod clock;
mod column;
mod config;
mod error;
mod fingerprint;
mod hierarchy;
mod index_store;
mod lock;
pub mod memory;
mod notify;
mod reconcile;
mod replication;
mod scope;
mod service;
mod status;
mod support;
mod truth;
mod types;
mod view;
mod worker;

#[cfg(test)]
mod fixture;

pub use builder::{BuildOutcome, IndexBuilder};
pub use cache::ExpiringCache;
pub use change_feed::{ChangeEvent, ChangeFeed};
pub use clock::{Clock, ManualClock, SystemClock};
pub use column::{
    ColumnModel, ColumnType, EntityField, BASIC_ENTITY_DEFAULT_COLUMNS, FILE_VIEW_DEFAULT_COLUMNS,
    IMPLICIT_VIEW_FIELDS,
};
pub use config::{
    IndexConfig, RetryConfig, DEFAULT_ROOT_CONTAINER_ID, MAX_COLUMNS_PER_VIEW,
    MAX_CONTAINERS_PER_VIEW,
};
pub use error::{error_detail, IndexError, IndexResult};
pub use fingerprint::{compute_crc32, ContentCrc, SchemaFingerprint, VersionFingerprint};
pub use hierarchy::ContainerHierarchy;
pub use index_store::{IndexRow, IndexStore};
pub use lock::{table_lock_key, LockCoordinator};
pub use notify::{ChangeMessage, ChangeNotifier, ChangeType, UnitOfWork};
pub use reconcile::ReconciliationTrigger;
pub use replication::{ReplicatedEntity, ReplicationStore};
pub use scope::{over_limit_message, ScopeResolver};
pub use service::{Caller, IndexRead, TableIndexService};
pub use status::{
    new_reset_token, Completion, MemoryStatusStore, Progress, StatusError, StatusLookup,
    StatusStore, StatusTracker, TableState, TableStatus,
};
pub use support::{Collaborators, TableSupport};
pub use truth::{SchemaStore, TruthStore};
pub use types::{
    ContainerSet, EntityType, ObjectId, TableKind, ViewScope, ViewTypeMask,
    PROJECT_TYPE_CANNOT_BE_COMBINED_WITH_ANY_OTHER_TYPE,
};
pub use view::ViewManager;
pub use worker::{IndexWorker, WorkerReport};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
