//! # Tablesync Testkit
//!
//! Test utilities for tablesync.
//!
//! This crate provides:
//! - [`TestDeployment`]: the index service wired over in-memory stores
//! - Tree builders for projects, folders and files
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use tablesync_testkit::prelude::*;
//! use tablesync_core::{TableState, ViewTypeMask};
//!
//! let deployment = TestDeployment::new();
//! let worker = deployment.worker();
//! let tree = deployment.build_hierarchy(HierarchyShape::new(1, 1, 2));
//! let (view, status) = deployment
//!     .create_view(tree.projects[0], tree.projects.clone(), ViewTypeMask::FILE)
//!     .unwrap();
//! assert_eq!(status.state, TableState::Processing);
//!
//! let report = worker.run_until_idle();
//! assert_eq!(report.built, 1);
//! assert!(deployment.service.tracker().is_index_synchronized(&view).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
