//! View definitions: schema, scope and default columns.

use crate::column::{ColumnModel, BASIC_ENTITY_DEFAULT_COLUMNS, FILE_VIEW_DEFAULT_COLUMNS};
use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::status::{StatusTracker, TableStatus};
use crate::support::TableSupport;
use crate::types::{ObjectId, ViewScope, ViewTypeMask};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Defines views and answers which views an entity belongs to.
pub struct ViewManager {
    support: Arc<TableSupport>,
    tracker: Arc<StatusTracker>,
    max_columns: usize,
}

impl ViewManager {
    /// Creates a view manager.
    pub fn new(support: Arc<TableSupport>, tracker: Arc<StatusTracker>, config: &IndexConfig) -> Self {
        Self {
            support,
            tracker,
            max_columns: config.max_columns_per_view,
        }
    }

    /// Replaces a view's columns and scope, then requests a rebuild.
    ///
    /// Validation happens before anything is stored: the column count, the
    /// type mask and the expanded scope size.
    pub fn set_view_schema_and_scope(
        &self,
        view_id: u64,
        column_ids: &[String],
        scope: &ViewScope,
    ) -> IndexResult<TableStatus> {
        if column_ids.len() > self.max_columns {
            return Err(IndexError::invalid_argument(format!(
                "A view cannot have {} columns.  It must have {} columns or less.",
                column_ids.len(),
                self.max_columns
            )));
        }
        self.validate_scope_size(&scope.container_ids, scope.type_mask)?;

        let schema = self.support.schema();
        schema.set_view_scope(view_id, scope)?;
        schema.bind_columns(view_id, column_ids)?;
        info!(
            view_id,
            columns = column_ids.len(),
            containers = scope.container_ids.len(),
            "view definition changed"
        );
        self.tracker
            .set_to_processing_and_trigger_update(&ObjectId::latest(view_id))
    }

    /// Returns the views whose scope contains the entity or any of its ancestors.
    pub fn find_views_containing_entity(&self, entity_id: u64) -> IndexResult<HashSet<u64>> {
        let path = self.support.entity_path(entity_id)?;
        self.support.schema().find_views_intersecting(&path)
    }

    /// The default columns of a view with this mask.
    ///
    /// File views get the file columns; every other view gets the basic
    /// entity columns.
    pub fn default_view_columns(&self, mask: ViewTypeMask) -> IndexResult<Vec<ColumnModel>> {
        mask.validate()?;
        let fields = if mask.contains(ViewTypeMask::FILE) {
            FILE_VIEW_DEFAULT_COLUMNS
        } else {
            BASIC_ENTITY_DEFAULT_COLUMNS
        };
        fields
            .iter()
            .map(|field| self.support.column_model(*field))
            .collect()
    }

    /// Checks the scope expands within the container limit.
    pub fn validate_scope_size(
        &self,
        container_ids: &HashSet<u64>,
        mask: ViewTypeMask,
    ) -> IndexResult<()> {
        self.support
            .scope_resolver()
            .validate_and_expand(container_ids, mask)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use crate::fixture::{Fixture, F1, F2, P1, P2};
    use crate::{
        ChangeType, EntityType, IndexError, ObjectId, SchemaStore, TableState, ViewScope,
        ViewTypeMask, FILE_VIEW_DEFAULT_COLUMNS, PROJECT_TYPE_CANNOT_BE_COMBINED_WITH_ANY_OTHER_TYPE,
    };
    use std::collections::HashSet;
    use std::time::Duration;

    #[test]
    fn defining_a_view_stores_it_and_requests_update() {
        let fixture = Fixture::with_projects();
        let rx = fixture.feed.subscribe();
        let status = fixture.create_view(500, &[P1], ViewTypeMask::FILE);
        assert_eq!(status.state, TableState::Processing);

        let scope = fixture.schema.view_scope(500).unwrap().unwrap();
        assert_eq!(scope, ViewScope::new([P1], ViewTypeMask::FILE));
        assert_eq!(
            fixture.schema.column_ids(&ObjectId::latest(500)).unwrap().len(),
            FILE_VIEW_DEFAULT_COLUMNS.len()
        );
        let event = rx.try_recv().unwrap();
        assert_eq!(event.message.change_type, ChangeType::Update);
        assert_eq!(event.message.object_id, ObjectId::latest(500));
    }

    #[test]
    fn too_many_columns_rejected() {
        let fixture = Fixture::with_projects();
        let columns: Vec<String> = (0..153).map(|i| i.to_string()).collect();
        let err = fixture
            .service
            .views()
            .set_view_schema_and_scope(500, &columns, &ViewScope::new([P1], ViewTypeMask::FILE))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid argument: A view cannot have 153 columns.  It must have 152 columns or less."
        );
        assert_eq!(fixture.schema.view_scope(500).unwrap(), None);
    }

    #[test]
    fn project_mask_cannot_combine() {
        let fixture = Fixture::with_projects();
        let err = fixture
            .service
            .views()
            .set_view_schema_and_scope(
                500,
                &[],
                &ViewScope::new([P1], ViewTypeMask::PROJECT | ViewTypeMask::FOLDER),
            )
            .unwrap_err();
        assert!(err
            .to_string()
            .contains(PROJECT_TYPE_CANNOT_BE_COMBINED_WITH_ANY_OTHER_TYPE));
    }

    #[test]
    fn over_limit_scope_rejected_before_storing() {
        let fixture = Fixture::with_projects();
        let scope: HashSet<u64> = (0..10_001).collect();
        let views = fixture.service.views();
        let err = views.validate_scope_size(&scope, ViewTypeMask::FILE).unwrap_err();
        assert!(matches!(err, IndexError::LimitExceeded(_)));
        assert!(err.to_string().contains("10000 projects and/or folders"));
        let err = views.validate_scope_size(&scope, ViewTypeMask::PROJECT).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The view's scope exceeds the maximum number of 10000 projects."
        );
    }

    #[test]
    fn finds_views_through_ancestors() {
        let fixture = Fixture::with_projects();
        fixture.create_view(500, &[P1], ViewTypeMask::FILE);
        fixture.create_view(501, &[F2], ViewTypeMask::FILE);
        fixture.add_entity(112, F1, EntityType::File);

        let views = fixture.service.views();
        assert_eq!(views.find_views_containing_entity(112).unwrap(), HashSet::from([500]));
        assert_eq!(views.find_views_containing_entity(211).unwrap(), HashSet::from([501]));
        assert!(views.find_views_containing_entity(P2).unwrap().is_empty());
    }

    #[test]
    fn default_columns_follow_mask() {
        let fixture = Fixture::with_projects();
        let views = fixture.service.views();
        let file = views.default_view_columns(ViewTypeMask::FILE).unwrap();
        let project = views.default_view_columns(ViewTypeMask::PROJECT).unwrap();
        assert!(file.iter().any(|c| c.name == "dataFileHandleId"));
        assert!(!project.iter().any(|c| c.name == "dataFileHandleId"));
        assert!(file.iter().all(|c| !c.id.is_empty()));
    }

    #[test]
    fn default_columns_are_cached_until_ttl() {
        let fixture = Fixture::with_projects();
        let views = fixture.service.views();
        let first = views.default_view_columns(ViewTypeMask::FILE).unwrap();
        let stored = fixture.schema.column_model_count();
        let again = views.default_view_columns(ViewTypeMask::FILE).unwrap();
        assert_eq!(first, again);
        assert_eq!(fixture.schema.column_model_count(), stored);

        fixture.clock.advance(Duration::from_secs(3601));
        let reloaded = views.default_view_columns(ViewTypeMask::FILE).unwrap();
        // Creation is idempotent, so a reload yields the same models.
        assert_eq!(first, reloaded);
        assert_eq!(fixture.schema.column_model_count(), stored);
    }
}
