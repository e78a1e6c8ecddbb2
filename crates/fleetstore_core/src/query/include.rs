//! Eager loading of related entities.

use crate::context::DbContext;
use crate::entity::{CompositeKey, Entity};
use crate::error::{CoreError, CoreResult};
use crate::query::options::ViewMode;
use crate::types::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type IncludeFn<T> = Arc<dyn Fn(&mut T, &mut IncludeLoader<'_>) -> CoreResult<()> + Send + Sync>;

/// A named expansion directive that fills navigation fields of `T`.
///
/// Directives run in the order they were added to the query, once per
/// entity, before the filter. Running the same directive twice simply
/// reassigns the same data.
pub struct Include<T> {
    name: &'static str,
    apply: IncludeFn<T>,
}

impl<T: 'static> Include<T> {
    /// Wraps a custom loader closure.
    pub fn new(
        name: &'static str,
        apply: impl Fn(&mut T, &mut IncludeLoader<'_>) -> CoreResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            apply: Arc::new(apply),
        }
    }

    /// One-to-many: assigns every `U` for which `belongs(parent, child)`
    /// holds, in natural order.
    pub fn collection<U: Entity>(
        name: &'static str,
        belongs: impl Fn(&T, &U) -> bool + Send + Sync + 'static,
        assign: impl Fn(&mut T, Vec<Arc<U>>) + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, move |parent, loader| {
            let children = loader.load_where::<U>(|child| belongs(parent, child))?;
            assign(parent, children);
            Ok(())
        })
    }

    /// Many-to-one: looks up the `U` whose key equals `foreign_key(parent)`.
    /// A null foreign key assigns `None`.
    pub fn reference<U: Entity>(
        name: &'static str,
        foreign_key: impl Fn(&T) -> Value + Send + Sync + 'static,
        assign: impl Fn(&mut T, Option<Arc<U>>) + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, move |parent, loader| {
            let target = loader.load_by_key::<U>(foreign_key(parent))?;
            assign(parent, target);
            Ok(())
        })
    }

    /// Returns the directive name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn apply(&self, entity: &mut T, loader: &mut IncludeLoader<'_>) -> CoreResult<()> {
        (self.apply)(entity, loader)
    }
}

impl<T> Clone for Include<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            apply: Arc::clone(&self.apply),
        }
    }
}

impl<T> fmt::Debug for Include<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Include").field(&self.name).finish()
    }
}

/// Reads related collections for include directives during one query.
///
/// Each related collection is read once per query. Under
/// [`ViewMode::Tracked`] and [`ViewMode::IdentityResolved`] every load of
/// the same identity returns the same `Arc`; untracked loads hand out
/// independent copies. Loaded entities are never attached to the tracker.
pub struct IncludeLoader<'a> {
    ctx: &'a DbContext,
    mode: ViewMode,
    ignore_query_filters: bool,
    cache: HashMap<TypeId, Box<dyn Any>>,
}

impl<'a> IncludeLoader<'a> {
    pub(crate) fn new(ctx: &'a DbContext, mode: ViewMode, ignore_query_filters: bool) -> Self {
        Self {
            ctx,
            mode,
            ignore_query_filters,
            cache: HashMap::new(),
        }
    }

    /// Loads every `U` accepted by `predicate`, in natural order.
    pub fn load_where<U: Entity>(
        &mut self,
        predicate: impl Fn(&U) -> bool,
    ) -> CoreResult<Vec<Arc<U>>> {
        let shared = self.mode.resolves_identity();
        Ok(self
            .rows::<U>()?
            .iter()
            .filter(|(_, entity)| predicate(entity))
            .map(|(_, entity)| share(entity, shared))
            .collect())
    }

    /// Loads the `U` with the given key.
    pub fn load_by_key<U: Entity>(
        &mut self,
        key: impl Into<CompositeKey>,
    ) -> CoreResult<Option<Arc<U>>> {
        let key = key.into();
        if key.has_null() {
            return Ok(None);
        }
        let key_properties = self.ctx.model().find_primary_key::<U>()?;
        let key = key.coerce(&key_properties.iter().collect::<Vec<_>>())?;

        let shared = self.mode.resolves_identity();
        Ok(self
            .rows::<U>()?
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, entity)| share(entity, shared)))
    }

    fn rows<U: Entity>(&mut self) -> CoreResult<&[(CompositeKey, Arc<U>)]> {
        let id = TypeId::of::<U>();
        if !self.cache.contains_key(&id) {
            let metadata = self.ctx.model().entity::<U>()?;
            let filter = if self.ignore_query_filters {
                None
            } else {
                metadata.query_filter().cloned()
            };
            let rows: Vec<(CompositeKey, Arc<U>)> = self
                .ctx
                .read_entities(&metadata, self.mode.resolves_identity())?
                .into_iter()
                .filter(|(_, entity)| filter.as_ref().map_or(true, |f| f.matches(entity)))
                .map(|(key, entity)| (key, Arc::new(entity)))
                .collect();
            self.cache.insert(id, Box::new(rows));
        }

        self.cache
            .get(&id)
            .and_then(|rows| rows.downcast_ref::<Vec<(CompositeKey, Arc<U>)>>())
            .map(Vec::as_slice)
            .ok_or_else(|| CoreError::schema::<U>("include cache holds a different type"))
    }
}

impl fmt::Debug for IncludeLoader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncludeLoader")
            .field("mode", &self.mode)
            .field("ignore_query_filters", &self.ignore_query_filters)
            .field("cached", &self.cache.len())
            .finish()
    }
}

fn share<U: Clone>(entity: &Arc<U>, shared: bool) -> Arc<U> {
    if shared {
        Arc::clone(entity)
    } else {
        Arc::new(U::clone(entity))
    }
}
