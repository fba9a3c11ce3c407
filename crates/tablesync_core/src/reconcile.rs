//! Reconciliation requests for the replication pipeline.

use crate::notify::ChangeNotifier;
use crate::types::{ContainerSet, ViewTypeMask};
use std::sync::Arc;
use tracing::debug;

/// Asks the replication pipeline to re-replicate the containers behind a view.
pub struct ReconciliationTrigger {
    notifier: Arc<dyn ChangeNotifier>,
    root_container_id: u64,
}

impl ReconciliationTrigger {
    /// Creates a trigger; project views reconcile against `root_container_id`.
    pub fn new(notifier: Arc<dyn ChangeNotifier>, root_container_id: u64) -> Self {
        Self {
            notifier,
            root_container_id,
        }
    }

    /// Queues the containers of a resolved scope for reconciliation.
    ///
    /// Projects are children of the root container, so a project-only view
    /// reconciles the root regardless of the listed projects. Returns the
    /// ids that were queued, sorted for other masks.
    pub fn trigger_scope_reconciliation(
        &self,
        mask: ViewTypeMask,
        containers: &ContainerSet,
    ) -> Vec<u64> {
        let ids = if mask.is_project_only() {
            vec![self.root_container_id]
        } else {
            containers.to_sorted_vec()
        };
        debug!(
            count = ids.len(),
            project_view = mask.is_project_only(),
            "triggering scope reconciliation"
        );
        if !ids.is_empty() {
            self.notifier.send_to_reconciliation_queue(ids.clone());
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_feed::ChangeFeed;
    use proptest::prelude::*;

    fn trigger() -> (ReconciliationTrigger, Arc<ChangeFeed>) {
        let feed = Arc::new(ChangeFeed::new());
        (ReconciliationTrigger::new(feed.clone(), 4489), feed)
    }

    #[test]
    fn file_view_reconciles_every_container() {
        let (trigger, feed) = trigger();
        let containers: ContainerSet = vec![3, 1, 2].into_iter().collect();
        let sent = trigger.trigger_scope_reconciliation(ViewTypeMask::FILE, &containers);
        assert_eq!(sent, vec![1, 2, 3]);
        assert_eq!(feed.drain_reconciliation(), vec![1, 2, 3]);
    }

    #[test]
    fn empty_scope_sends_nothing() {
        let (trigger, feed) = trigger();
        let sent = trigger.trigger_scope_reconciliation(ViewTypeMask::FILE, &ContainerSet::new());
        assert!(sent.is_empty());
        assert!(feed.pending_reconciliation().is_empty());
    }

    proptest! {
        #[test]
        fn project_view_always_targets_root(ids in proptest::collection::hash_set(0u64..100_000, 0..50)) {
            let (trigger, feed) = trigger();
            let containers: ContainerSet = ids.into_iter().collect();
            let sent = trigger.trigger_scope_reconciliation(ViewTypeMask::PROJECT, &containers);
            prop_assert_eq!(sent, vec![4489]);
            prop_assert_eq!(feed.drain_reconciliation(), vec![4489]);
        }
    }
}
