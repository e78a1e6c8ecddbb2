//! Set-based updates and deletes.

use super::Repository;
use crate::entity::{encode_row, Entity};
use crate::error::{CoreError, CoreResult};
use crate::query::Predicate;
use crate::transaction::PendingWrite;
use crate::types::Value;
use std::sync::Arc;
use tracing::debug;

/// Ordered property assignments for [`Repository::bulk_update`].
///
/// Names are resolved against the entity's metadata when the update runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetClause {
    assignments: Vec<(String, Value)>,
}

impl SetClause {
    /// Creates an empty clause.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an assignment. Later assignments to the same property win.
    #[must_use]
    pub fn set(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((property.into(), value.into()));
        self
    }

    /// Returns the assignments in order.
    #[must_use]
    pub fn assignments(&self) -> &[(String, Value)] {
        &self.assignments
    }

    /// Returns true if nothing is assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

impl<T: Entity> Repository<'_, T> {
    /// Applies `set` to every stored entity that passes the default filter
    /// and `filter`, writing directly to the store.
    ///
    /// Rows are written without going through the change tracker: inside a
    /// transaction they join it, otherwise they commit at once. Returns the
    /// number of matched rows.
    ///
    /// Fails with `Argument` for an empty clause, an unknown property or a
    /// key property, and with `Conversion` if a value does not fit its
    /// property, before any row is touched.
    pub fn bulk_update(&self, filter: Option<&Predicate<T>>, set: &SetClause) -> CoreResult<u64> {
        if set.is_empty() {
            return Err(CoreError::argument("set clause has no assignments"));
        }

        let mut assignments = Vec::with_capacity(set.assignments().len());
        for (name, value) in set.assignments() {
            let property = self.metadata.property(name).ok_or_else(|| {
                CoreError::argument(format!(
                    "{} has no property '{name}'",
                    self.metadata.collection()
                ))
            })?;
            if property.is_key() {
                return Err(CoreError::argument(format!(
                    "key property '{}' cannot be bulk updated",
                    property.name()
                )));
            }
            let value = property.field_type().coerce(property.name(), value.clone())?;
            assignments.push((property, value));
        }

        let collection = self.metadata.collection();
        let mut matched = 0u64;
        let mut writes = Vec::new();
        for (key, mut entity) in self.visible_rows()? {
            if !filter.map_or(true, |f| f.matches(&entity)) {
                continue;
            }
            matched += 1;

            let mut changed = false;
            for (property, value) in &assignments {
                if property.get(&entity) != *value {
                    property.set(&mut entity, value.clone())?;
                    changed = true;
                }
            }
            if changed {
                let payload = Arc::from(encode_row(&entity)?);
                writes.push(((collection, key), PendingWrite::Update { payload }));
            }
        }

        let written = if writes.is_empty() {
            0
        } else {
            self.ctx.apply_writes(writes)?
        };
        debug!(collection, matched, written, "bulk update");
        Ok(matched)
    }

    /// Deletes every stored entity that passes the default filter and
    /// `filter`, writing directly to the store. Returns the number of
    /// deleted rows.
    pub fn bulk_delete(&self, filter: &Predicate<T>) -> CoreResult<u64> {
        let collection = self.metadata.collection();
        let writes: Vec<_> = self
            .visible_rows()?
            .into_iter()
            .filter(|(_, entity)| filter.matches(entity))
            .map(|(key, _)| ((collection, key), PendingWrite::Delete))
            .collect();

        let deleted = writes.len() as u64;
        if !writes.is_empty() {
            self.ctx.apply_writes(writes)?;
        }
        debug!(collection, deleted, "bulk delete");
        Ok(deleted)
    }
}
