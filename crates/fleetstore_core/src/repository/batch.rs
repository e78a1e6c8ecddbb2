//! Batch update by primary key.

use super::Repository;
use crate::context::EntryState;
use crate::entity::{CompositeKey, Entity};
use crate::error::{CoreError, CoreResult};
use crate::query::Predicate;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Result of [`Repository::update_range`].
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome<T> {
    /// Every key resolved; the input entities are returned as accepted.
    Updated(Vec<T>),
    /// Some keys have no stored counterpart; nothing was queued.
    Rejected {
        /// Unresolved keys, in input order, without duplicates.
        missing: Vec<CompositeKey>,
    },
}

impl<T> BatchOutcome<T> {
    /// Returns true if the batch was applied.
    #[must_use]
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }

    /// Converts a rejection into `NotFound` naming the first missing key.
    pub fn into_result(self, collection: &str) -> CoreResult<Vec<T>> {
        match self {
            Self::Updated(entities) => Ok(entities),
            Self::Rejected { missing } => {
                let key = missing.first().map(CompositeKey::encode).unwrap_or_default();
                Err(CoreError::not_found(collection, key))
            }
        }
    }
}

impl<T: Entity> Repository<'_, T> {
    /// Copies each entity's property values onto its stored counterpart,
    /// matched by primary key.
    ///
    /// All counterparts are fetched with one key-match predicate. If any
    /// key is unresolved the batch is rejected as a whole and no copy is
    /// queued. Stored entities receive the values and are attached as
    /// modified; the inputs are returned unchanged.
    ///
    /// Fails with `Schema` if `T` has no primary key and with `Conversion`
    /// if a key component does not fit its property type.
    pub fn update_range(&self, entities: Vec<T>) -> CoreResult<BatchOutcome<T>> {
        if entities.is_empty() {
            return Ok(BatchOutcome::Updated(entities));
        }

        let key_properties = self.metadata.find_primary_key()?;
        let collection = self.metadata.collection();

        let input_keys = entities
            .iter()
            .map(|e| self.metadata.key_of(e))
            .collect::<CoreResult<Vec<_>>>()?;
        let mut seen = HashSet::new();
        let unique: Vec<&CompositeKey> = input_keys.iter().filter(|k| seen.insert(*k)).collect();

        let matcher = Predicate::key_match(unique.iter().copied(), &key_properties)?;
        let mut stored: HashMap<CompositeKey, T> = self
            .ctx
            .read_entities(&self.metadata, true)?
            .into_iter()
            .filter(|(_, entity)| self.passes_default_filter(entity) && matcher.matches(entity))
            .collect();
        debug!(
            collection,
            requested = unique.len(),
            matched = stored.len(),
            "batch keys resolved"
        );

        let missing: Vec<CompositeKey> = unique
            .into_iter()
            .filter(|key| !stored.contains_key(*key))
            .cloned()
            .collect();
        if !missing.is_empty() {
            let store = self.ctx.store();
            warn!(
                collection,
                missing = missing.len(),
                first = %store.render_key(&missing[0]),
                "batch update rejected"
            );
            return Ok(BatchOutcome::Rejected { missing });
        }

        let mut changed = HashSet::new();
        for (key, entity) in input_keys.iter().zip(&entities) {
            if let Some(target) = stored.get_mut(key) {
                if self.metadata.copy_values(entity, target)? {
                    changed.insert(key.clone());
                }
            }
        }

        let mut tracker = self.ctx.tracker();
        for (key, entity) in stored {
            let state = match tracker.state(collection, &key) {
                Some(EntryState::Added) => EntryState::Added,
                Some(EntryState::Modified) => EntryState::Modified,
                _ if changed.contains(&key) => EntryState::Modified,
                _ => EntryState::Unchanged,
            };
            tracker.attach(collection, key, entity, state);
        }

        Ok(BatchOutcome::Updated(entities))
    }
}
