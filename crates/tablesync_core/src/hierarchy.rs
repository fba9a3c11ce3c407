//! Container hierarchy abstraction.

use crate::error::IndexResult;
use crate::types::ContainerSet;
use std::collections::HashSet;

/// Expands containers to their transitive descendant containers.
pub trait ContainerHierarchy: Send + Sync {
    /// Returns `container_ids` plus every descendant container.
    ///
    /// Fails with [`IndexError::LimitExceeded`](crate::IndexError::LimitExceeded)
    /// as soon as the result would exceed `limit`; it never truncates.
    fn expand_descendants(&self, container_ids: &HashSet<u64>, limit: usize)
        -> IndexResult<ContainerSet>;
}
