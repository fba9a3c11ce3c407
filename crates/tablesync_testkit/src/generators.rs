//! Property-based test generators using proptest.
//!
//! Provides strategies for view masks, scopes and tree shapes that
//! respect (or deliberately break) the rules views are validated against.

use crate::fixtures::HierarchyShape;
use proptest::prelude::*;
use std::collections::HashSet;
use tablesync_core::ViewTypeMask;

/// Bits that may be combined with each other but never with Project.
const NON_PROJECT_BITS: [ViewTypeMask; 5] = [
    ViewTypeMask::FILE,
    ViewTypeMask::TABLE,
    ViewTypeMask::FOLDER,
    ViewTypeMask::VIEW,
    ViewTypeMask::DOCKER_REPO,
];

fn combine(bits: &[bool]) -> ViewTypeMask {
    NON_PROJECT_BITS
        .iter()
        .zip(bits)
        .filter(|(_, set)| **set)
        .fold(ViewTypeMask::default(), |mask, (bit, _)| mask | *bit)
}

/// Strategy for non-empty masks without the Project bit.
pub fn non_project_mask_strategy() -> impl Strategy<Value = ViewTypeMask> {
    prop::collection::vec(any::<bool>(), NON_PROJECT_BITS.len())
        .prop_filter("mask must not be empty", |bits| bits.iter().any(|b| *b))
        .prop_map(|bits| combine(&bits))
}

/// Strategy for every mask that passes validation.
pub fn valid_mask_strategy() -> impl Strategy<Value = ViewTypeMask> {
    prop_oneof![
        1 => Just(ViewTypeMask::PROJECT),
        4 => non_project_mask_strategy(),
    ]
}

/// Strategy for masks that combine Project with other types.
pub fn project_combined_mask_strategy() -> impl Strategy<Value = ViewTypeMask> {
    non_project_mask_strategy().prop_map(|mask| mask | ViewTypeMask::PROJECT)
}

/// Strategy for scope container sets of up to `max_len` ids.
pub fn scope_ids_strategy(max_len: usize) -> impl Strategy<Value = HashSet<u64>> {
    prop::collection::hash_set(1u64..1_000_000, 0..=max_len)
}

/// Strategy for small trees.
pub fn hierarchy_shape_strategy() -> impl Strategy<Value = HierarchyShape> {
    (1usize..4, 0usize..4, 0usize..4).prop_map(|(projects, folders, files)| {
        HierarchyShape::new(projects, folders, files)
    })
}

/// Strategy for column id lists of the given length range.
pub fn column_ids_strategy(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[0-9]{1,6}", len)
}
