//! Generic repository over one entity type.

mod batch;
mod bulk;

pub use batch::BatchOutcome;
pub use bulk::SetClause;

use crate::context::{DbContext, EntryState};
use crate::entity::{CompositeKey, Entity, EntityMetadata};
use crate::error::{CoreError, CoreResult};
use crate::query::{pipeline, Include, PagedResult, Predicate, QueryOptions};
use std::collections::HashSet;
use std::sync::Arc;

/// Reads and queued writes for entities of type `T`.
///
/// Writes are queued in the owning context's change tracker and reach the
/// store on [`DbContext::save_changes`]. Reads never return tracker-owned
/// references: results are independent values.
///
/// ```rust,ignore
/// let claims = ctx.repository::<WarrantyClaim>()?;
/// let mut claim = claims.get_by_id(42)?.ok_or(...)?;
/// claim.status = "Approved".into();
/// claims.update(claim)?;
/// ctx.save_changes()?;
/// ```
pub struct Repository<'a, T> {
    ctx: &'a DbContext,
    metadata: Arc<EntityMetadata<T>>,
}

impl<'a, T: Entity> Repository<'a, T> {
    pub(crate) fn new(ctx: &'a DbContext, metadata: Arc<EntityMetadata<T>>) -> Self {
        Self { ctx, metadata }
    }

    /// Returns `T`'s metadata.
    #[must_use]
    pub fn metadata(&self) -> &EntityMetadata<T> {
        &self.metadata
    }

    /// Returns the owning context.
    #[must_use]
    pub fn context(&self) -> &'a DbContext {
        self.ctx
    }

    /// Runs a composed query and returns one page of results.
    pub fn query(&self, options: &QueryOptions<T>) -> CoreResult<PagedResult<T>> {
        pipeline::execute(self.ctx, &self.metadata, options)
    }

    /// Returns the first entity in natural order that passes the default
    /// filter and `filter`, with `includes` applied. Untracked.
    pub fn find_first(
        &self,
        filter: Option<Predicate<T>>,
        includes: Vec<Include<T>>,
    ) -> CoreResult<Option<T>> {
        let options = QueryOptions {
            filter,
            includes,
            page_number: 1,
            page_size: 1,
            ..QueryOptions::default()
        };
        Ok(self.query(&options)?.items.into_iter().next())
    }

    /// Counts stored entities that pass the default filter and `filter`.
    pub fn count(&self, filter: Option<&Predicate<T>>) -> CoreResult<u64> {
        let count = self
            .visible_rows()?
            .into_iter()
            .filter(|(_, entity)| filter.map_or(true, |f| f.matches(entity)))
            .count();
        Ok(count as u64)
    }

    /// Looks up one entity by primary key.
    ///
    /// An attached entity is returned in its tracked state; otherwise the
    /// store is read. Entities pending deletion or hidden by the default
    /// filter are reported as absent. The result is not attached.
    pub fn get_by_id(&self, id: impl Into<CompositeKey>) -> CoreResult<Option<T>> {
        let key = self.coerce_key(id.into())?;
        let collection = self.metadata.collection();

        let tracked = {
            let tracker = self.ctx.tracker();
            match tracker.state(collection, &key) {
                Some(EntryState::Deleted) => return Ok(None),
                Some(_) => tracker.get::<T>(collection, &key).cloned(),
                None => None,
            }
        };

        let entity = match tracked {
            Some(entity) => Some(entity),
            None => self.ctx.read_entity::<T>(collection, &key)?,
        };
        Ok(entity.filter(|e| self.passes_default_filter(e)))
    }

    /// Queues `entity` for insertion.
    ///
    /// Fails with `Argument` if a key component is null and with
    /// `DuplicateKey` if the key is already attached.
    pub fn insert(&self, entity: T) -> CoreResult<T> {
        let key = self.write_key(&entity)?;
        let collection = self.metadata.collection();

        let mut tracker = self.ctx.tracker();
        match tracker.state(collection, &key) {
            None => tracker.attach(collection, key, entity.clone(), EntryState::Added),
            Some(EntryState::Deleted) => {
                tracker.attach(collection, key, entity.clone(), EntryState::Modified);
            }
            Some(_) => {
                return Err(CoreError::duplicate_key(collection, key.encode()))
            }
        }
        Ok(entity)
    }

    /// Queues every entity for insertion. Nothing is queued unless all
    /// entities pass the checks of [`insert`](Self::insert) and their keys
    /// are distinct.
    pub fn insert_range(&self, entities: Vec<T>) -> CoreResult<Vec<T>> {
        if entities.is_empty() {
            return Ok(entities);
        }
        let collection = self.metadata.collection();
        let keys = entities
            .iter()
            .map(|e| self.write_key(e))
            .collect::<CoreResult<Vec<_>>>()?;

        let mut tracker = self.ctx.tracker();
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            let attached = matches!(
                tracker.state(collection, key),
                Some(EntryState::Unchanged | EntryState::Added | EntryState::Modified)
            );
            if attached || !seen.insert(key) {
                return Err(CoreError::duplicate_key(collection, key.encode()));
            }
        }

        for (key, entity) in keys.into_iter().zip(&entities) {
            let state = match tracker.state(collection, &key) {
                Some(EntryState::Deleted) => EntryState::Modified,
                _ => EntryState::Added,
            };
            tracker.attach(collection, key, entity.clone(), state);
        }
        Ok(entities)
    }

    /// Queues an update of the stored entity with `entity`'s key.
    ///
    /// An attached entity receives `entity`'s property values. A detached
    /// one is first looked up by key and fails with `NotFound` if absent.
    /// Returns the entity as it will be written.
    pub fn update(&self, entity: T) -> CoreResult<T> {
        let key = self.write_key(&entity)?;
        let collection = self.metadata.collection();

        {
            let mut tracker = self.ctx.tracker();
            match tracker.state(collection, &key) {
                Some(EntryState::Deleted) => {
                    return Err(self.not_found(&key));
                }
                Some(state) => {
                    let Some(tracked) = tracker.get_mut::<T>(collection, &key) else {
                        return Err(self.not_found(&key));
                    };
                    let changed = self.metadata.copy_values(&entity, tracked)?;
                    let current = tracked.clone();
                    if changed && state == EntryState::Unchanged {
                        tracker.set_state(collection, &key, EntryState::Modified);
                    }
                    return Ok(current);
                }
                None => {}
            }
        }

        let mut stored = self
            .ctx
            .read_entity::<T>(collection, &key)?
            .filter(|e| self.passes_default_filter(e))
            .ok_or_else(|| self.not_found(&key))?;
        let changed = self.metadata.copy_values(&entity, &mut stored)?;
        let state = if changed {
            EntryState::Modified
        } else {
            EntryState::Unchanged
        };

        self.ctx
            .tracker()
            .attach(collection, key, stored.clone(), state);
        Ok(stored)
    }

    /// Queues deletion of the entity with key `id`.
    ///
    /// Returns the entity, or `None` if nothing with that key is visible.
    /// Deleting an entity that was only queued for insertion just drops
    /// the insertion.
    pub fn delete_by_id(&self, id: impl Into<CompositeKey>) -> CoreResult<Option<T>> {
        let key: CompositeKey = id.into();
        if key.has_null() {
            return Ok(None);
        }
        let key = self.coerce_key(key)?;
        let collection = self.metadata.collection();

        {
            let mut tracker = self.ctx.tracker();
            match tracker.state(collection, &key) {
                Some(EntryState::Deleted) => return Ok(None),
                Some(state) => {
                    let entity = tracker.get::<T>(collection, &key).cloned();
                    if state == EntryState::Added {
                        tracker.detach(collection, &key);
                    } else {
                        tracker.set_state(collection, &key, EntryState::Deleted);
                    }
                    return Ok(entity);
                }
                None => {}
            }
        }

        let Some(entity) = self
            .ctx
            .read_entity::<T>(collection, &key)?
            .filter(|e| self.passes_default_filter(e))
        else {
            return Ok(None);
        };

        self.ctx
            .tracker()
            .attach(collection, key, entity.clone(), EntryState::Deleted);
        Ok(Some(entity))
    }

    /// Queues deletion of every entity by key without reading the store.
    /// A key with no stored row surfaces as `ConcurrencyConflict` on save.
    pub fn delete_range(&self, entities: Vec<T>) -> CoreResult<Vec<T>> {
        if entities.is_empty() {
            return Ok(entities);
        }
        let collection = self.metadata.collection();
        let keys = entities
            .iter()
            .map(|e| self.write_key(e))
            .collect::<CoreResult<Vec<_>>>()?;

        let mut tracker = self.ctx.tracker();
        for (key, entity) in keys.into_iter().zip(&entities) {
            match tracker.state(collection, &key) {
                Some(EntryState::Added) => {
                    tracker.detach(collection, &key);
                }
                Some(_) => {
                    tracker.set_state(collection, &key, EntryState::Deleted);
                }
                None => tracker.attach(collection, key, entity.clone(), EntryState::Deleted),
            }
        }
        Ok(entities)
    }

    /// Stored rows as seen from this context, after the default filter.
    fn visible_rows(&self) -> CoreResult<Vec<(CompositeKey, T)>> {
        let rows = self.ctx.read_entities(&self.metadata, false)?;
        Ok(rows
            .into_iter()
            .filter(|(_, entity)| self.passes_default_filter(entity))
            .collect())
    }

    fn passes_default_filter(&self, entity: &T) -> bool {
        self.metadata
            .query_filter()
            .map_or(true, |f| f.matches(entity))
    }

    fn coerce_key(&self, key: CompositeKey) -> CoreResult<CompositeKey> {
        key.coerce(&self.metadata.find_primary_key()?)
    }

    /// Key of an entity about to be written. Null components are rejected.
    fn write_key(&self, entity: &T) -> CoreResult<CompositeKey> {
        let key = self.metadata.key_of(entity)?;
        if key.has_null() {
            return Err(CoreError::argument(format!(
                "{} entity has a null primary key component",
                self.metadata.collection()
            )));
        }
        Ok(key)
    }

    fn not_found(&self, key: &CompositeKey) -> CoreError {
        CoreError::not_found(self.metadata.collection(), key.encode())
    }
}

impl<T: 'static> std::fmt::Debug for Repository<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("collection", &self.metadata.collection())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Model;
    use crate::store::Store;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Part {
        id: i64,
        name: String,
        retired: bool,
    }

    fn part(id: i64, name: &str) -> Part {
        Part {
            id,
            name: name.into(),
            retired: false,
        }
    }

    fn store() -> Arc<Store> {
        let model = Model::builder()
            .entity(
                EntityMetadata::builder("parts")
                    .key("Id", |p: &Part| &p.id, |p: &mut Part| &mut p.id)
                    .property("Name", |p: &Part| &p.name, |p: &mut Part| &mut p.name)
                    .property("Retired", |p: &Part| &p.retired, |p: &mut Part| &mut p.retired)
                    .query_filter(Predicate::new(|p: &Part| !p.retired))
                    .build(),
            )
            .build()
            .unwrap();
        let store = Store::open(model);
        let ctx = store.context();
        let parts = ctx.repository::<Part>().unwrap();
        parts
            .insert_range(vec![part(1, "Filter"), part(2, "Brake"), part(3, "Wiper")])
            .unwrap();
        ctx.save_changes().unwrap();
        store
    }

    #[test]
    fn debug_names_the_collection() {
        let store = store();
        let ctx = store.context();
        let parts = ctx.repository::<Part>().unwrap();

        assert_eq!(format!("{parts:?}"), r#"Repository { collection: "parts" }"#);
    }

    #[test]
    fn insert_is_queued_until_save() {
        let store = store();
        let ctx = store.context();
        let parts = ctx.repository::<Part>().unwrap();

        parts.insert(part(4, "Belt")).unwrap();
        assert_eq!(store.row_count("parts"), 3);
        assert_eq!(ctx.entry_state(&part(4, "Belt")).unwrap(), Some(EntryState::Added));

        assert_eq!(ctx.save_changes().unwrap(), 1);
        assert_eq!(store.row_count("parts"), 4);
        assert_eq!(ctx.entry_state(&part(4, "Belt")).unwrap(), Some(EntryState::Unchanged));
    }

    #[test]
    fn insert_range_rejects_duplicates_up_front() {
        let store = store();
        let ctx = store.context();
        let parts = ctx.repository::<Part>().unwrap();

        let err = parts
            .insert_range(vec![part(7, "a"), part(7, "b")])
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateKey { .. }));
        assert_eq!(ctx.tracked_count(), 0);
    }

    #[test]
    fn get_by_id_converts_the_key_and_does_not_track() {
        let store = store();
        let ctx = store.context();
        let parts = ctx.repository::<Part>().unwrap();

        let found = parts.get_by_id("2").unwrap().unwrap();
        assert_eq!(found.name, "Brake");
        assert_eq!(ctx.tracked_count(), 0);
        assert!(parts.get_by_id(99i64).unwrap().is_none());
    }

    #[test]
    fn detached_update_of_missing_key_is_not_found() {
        let store = store();
        let ctx = store.context();
        let parts = ctx.repository::<Part>().unwrap();

        let err = parts.update(part(42, "Ghost")).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { ref key, .. } if key == "42"));
    }

    #[test]
    fn detached_update_marks_modified() {
        let store = store();
        let ctx = store.context();
        let parts = ctx.repository::<Part>().unwrap();

        let updated = parts.update(part(1, "Oil filter")).unwrap();
        assert_eq!(updated.name, "Oil filter");
        assert_eq!(ctx.entry_state(&updated).unwrap(), Some(EntryState::Modified));

        ctx.save_changes().unwrap();
        let reread = store.context().repository::<Part>().unwrap().get_by_id(1i64).unwrap();
        assert_eq!(reread.unwrap().name, "Oil filter");
    }

    #[test]
    fn delete_of_added_entity_drops_the_insert() {
        let store = store();
        let ctx = store.context();
        let parts = ctx.repository::<Part>().unwrap();

        parts.insert(part(8, "Spare")).unwrap();
        assert!(parts.delete_by_id(8i64).unwrap().is_some());
        assert_eq!(ctx.save_changes().unwrap(), 0);
        assert_eq!(store.row_count("parts"), 3);
    }

    #[test]
    fn delete_by_id_of_missing_key_returns_none() {
        let store = store();
        let ctx = store.context();
        let parts = ctx.repository::<Part>().unwrap();

        assert!(parts.delete_by_id(99i64).unwrap().is_none());
        assert!(parts.delete_by_id(2i64).unwrap().is_some());
        assert!(parts.get_by_id(2i64).unwrap().is_none());

        ctx.save_changes().unwrap();
        assert_eq!(store.row_count("parts"), 2);
    }

    #[test]
    fn default_filter_hides_retired_rows() {
        let store = store();
        let ctx = store.context();
        let parts = ctx.repository::<Part>().unwrap();

        let updated = parts
            .bulk_update(
                Some(&Predicate::new(|p: &Part| p.id == 3)),
                &SetClause::new().set("retired", true),
            )
            .unwrap();
        assert_eq!(updated, 1);

        assert!(parts.get_by_id(3i64).unwrap().is_none());
        assert_eq!(parts.count(None).unwrap(), 2);

        let all = parts
            .query(&QueryOptions::new().ignore_query_filters())
            .unwrap();
        assert_eq!(all.total_items, 3);
    }

    #[test]
    fn find_first_uses_natural_order() {
        let store = store();
        let ctx = store.context();
        let parts = ctx.repository::<Part>().unwrap();

        let first = parts
            .find_first(Some(Predicate::new(|p: &Part| p.id > 1)), Vec::new())
            .unwrap();
        assert_eq!(first.map(|p| p.id), Some(2));
    }

    #[test]
    fn bulk_update_validates_the_clause() {
        let store = store();
        let ctx = store.context();
        let parts = ctx.repository::<Part>().unwrap();

        assert!(matches!(
            parts.bulk_update(None, &SetClause::new()),
            Err(CoreError::Argument { .. })
        ));
        assert!(matches!(
            parts.bulk_update(None, &SetClause::new().set("colour", "red")),
            Err(CoreError::Argument { .. })
        ));
        assert!(matches!(
            parts.bulk_update(None, &SetClause::new().set("id", 5i64)),
            Err(CoreError::Argument { .. })
        ));
        assert!(matches!(
            parts.bulk_update(None, &SetClause::new().set("retired", "maybe")),
            Err(CoreError::Conversion { .. })
        ));
    }

    #[test]
    fn bulk_delete_counts_rows() {
        let store = store();
        let ctx = store.context();
        let parts = ctx.repository::<Part>().unwrap();

        let deleted = parts
            .bulk_delete(&Predicate::new(|p: &Part| p.name.contains('r')))
            .unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(store.row_count("parts"), 0);
    }
}
