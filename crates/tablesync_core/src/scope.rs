//! View scope validation and expansion.

use crate::error::{IndexError, IndexResult};
use crate::hierarchy::ContainerHierarchy;
use crate::types::{ContainerSet, ViewTypeMask};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Validates a view's scope and resolves it to the containers it draws rows from.
pub struct ScopeResolver {
    hierarchy: Arc<dyn ContainerHierarchy>,
    max_containers: usize,
}

impl ScopeResolver {
    /// Creates a resolver bounded by `max_containers`.
    pub fn new(hierarchy: Arc<dyn ContainerHierarchy>, max_containers: usize) -> Self {
        Self {
            hierarchy,
            max_containers,
        }
    }

    /// The container limit.
    pub fn max_containers(&self) -> usize {
        self.max_containers
    }

    /// Validates the mask and the scope size, then expands the scope.
    ///
    /// Project-only scopes are returned as listed; project membership does
    /// not nest. Every other scope is expanded to include all descendant
    /// containers. The size limit applies both to the listed scope and to
    /// the expansion, which fails rather than truncating.
    pub fn validate_and_expand(
        &self,
        container_ids: &HashSet<u64>,
        mask: ViewTypeMask,
    ) -> IndexResult<ContainerSet> {
        mask.validate()?;

        if container_ids.len() > self.max_containers {
            return Err(IndexError::LimitExceeded(over_limit_message(
                mask,
                self.max_containers,
            )));
        }

        if mask.is_project_only() {
            return Ok(container_ids.iter().copied().collect());
        }

        let expanded = self
            .hierarchy
            .expand_descendants(container_ids, self.max_containers)
            .map_err(|err| match err {
                IndexError::LimitExceeded(_) => {
                    IndexError::LimitExceeded(over_limit_message(mask, self.max_containers))
                }
                other => other,
            })?;

        // Guard against a hierarchy that ignores the limit.
        if expanded.len() > self.max_containers {
            return Err(IndexError::LimitExceeded(over_limit_message(
                mask,
                self.max_containers,
            )));
        }

        debug!(
            listed = container_ids.len(),
            expanded = expanded.len(),
            "expanded view scope"
        );
        Ok(expanded)
    }
}

/// The over-limit message shown to a view's owner.
pub fn over_limit_message(mask: ViewTypeMask, max_containers: usize) -> String {
    if mask.is_project_only() {
        format!("The view's scope exceeds the maximum number of {max_containers} projects.")
    } else {
        format!(
            "The view's scope exceeds the maximum number of {max_containers} projects and/or folders. \
             Note: The sub-folders of each project and folder in the scope count towards the limit."
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A hierarchy of explicit parent -> children edges.
    #[derive(Default)]
    struct Tree {
        children: HashMap<u64, Vec<u64>>,
        calls: AtomicUsize,
    }

    impl Tree {
        fn with(edges: &[(u64, u64)]) -> Self {
            let mut tree = Tree::default();
            for (parent, child) in edges {
                tree.children.entry(*parent).or_default().push(*child);
            }
            tree
        }
    }

    impl ContainerHierarchy for Tree {
        fn expand_descendants(
            &self,
            container_ids: &HashSet<u64>,
            limit: usize,
        ) -> IndexResult<ContainerSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut result = ContainerSet::new();
            let mut queue: Vec<u64> = container_ids.iter().copied().collect();
            while let Some(id) = queue.pop() {
                if result.insert(id) {
                    if result.len() > limit {
                        return Err(IndexError::LimitExceeded("limit".into()));
                    }
                    queue.extend(self.children.get(&id).into_iter().flatten());
                }
            }
            Ok(result)
        }
    }

    fn resolver(tree: Tree, max: usize) -> (ScopeResolver, Arc<Tree>) {
        let tree = Arc::new(tree);
        (ScopeResolver::new(tree.clone(), max), tree)
    }

    fn ids(range: impl IntoIterator<Item = u64>) -> HashSet<u64> {
        range.into_iter().collect()
    }

    #[test]
    fn file_scope_expands_to_descendants() {
        let (resolver, _) = resolver(Tree::with(&[(1, 11), (2, 21), (21, 211)]), 100);
        let set = resolver
            .validate_and_expand(&ids([1, 2]), ViewTypeMask::FILE)
            .unwrap();
        assert_eq!(set.to_sorted_vec(), vec![1, 2, 11, 21, 211]);
    }

    #[test]
    fn project_scope_is_not_expanded() {
        let (resolver, tree) = resolver(Tree::with(&[(1, 11)]), 100);
        let set = resolver
            .validate_and_expand(&ids([1, 2]), ViewTypeMask::PROJECT)
            .unwrap();
        assert_eq!(set.to_sorted_vec(), vec![1, 2]);
        assert_eq!(tree.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn raw_size_checked_before_expansion() {
        let (resolver, tree) = resolver(Tree::default(), 10_000);
        let err = resolver
            .validate_and_expand(&ids(0..10_001), ViewTypeMask::FILE)
            .unwrap_err();
        assert_eq!(err.to_string(), over_limit_message(ViewTypeMask::FILE, 10_000));
        assert!(err.to_string().contains("projects and/or folders"));
        assert_eq!(tree.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn project_over_limit_message() {
        let (resolver, _) = resolver(Tree::default(), 10_000);
        let err = resolver
            .validate_and_expand(&ids(0..10_001), ViewTypeMask::PROJECT)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The view's scope exceeds the maximum number of 10000 projects."
        );
    }

    #[test]
    fn expansion_over_limit_uses_mask_message() {
        let (resolver, _) = resolver(Tree::with(&[(1, 2), (2, 3), (3, 4)]), 3);
        let err = resolver
            .validate_and_expand(&ids([1]), ViewTypeMask::FILE | ViewTypeMask::FOLDER)
            .unwrap_err();
        assert!(matches!(err, IndexError::LimitExceeded(_)));
        assert_eq!(
            err.to_string(),
            over_limit_message(ViewTypeMask::FILE, 3)
        );
    }

    #[test]
    fn project_combined_with_other_bits_is_rejected() {
        let (resolver, _) = resolver(Tree::default(), 100);
        let err = resolver
            .validate_and_expand(&ids([1]), ViewTypeMask::PROJECT | ViewTypeMask::FILE)
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument(_)));
    }

    proptest! {
        #[test]
        fn oversized_scopes_always_rejected(extra in 1u64..50, max in 1usize..200) {
            let (resolver, tree) = resolver(Tree::default(), max);
            let scope = ids(0..(max as u64 + extra));
            prop_assert!(resolver.validate_and_expand(&scope, ViewTypeMask::FILE).is_err());
            prop_assert!(resolver.validate_and_expand(&scope, ViewTypeMask::PROJECT).is_err());
            prop_assert_eq!(tree.calls.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn project_bit_never_combines(other in 1u64..64) {
            let mask = ViewTypeMask::from_bits(other) | ViewTypeMask::PROJECT;
            prop_assume!(mask != ViewTypeMask::PROJECT);
            let (resolver, _) = resolver(Tree::default(), 100);
            prop_assert!(resolver.validate_and_expand(&ids([1]), mask).is_err());
        }

        #[test]
        fn expansion_contains_listed_scope(scope in proptest::collection::hash_set(0u64..500, 0..40)) {
            let (resolver, _) = resolver(Tree::default(), 100);
            let set = resolver.validate_and_expand(&scope, ViewTypeMask::FILE).unwrap();
            prop_assert_eq!(set.as_set(), &scope);
        }
    }
}
