//! Query execution.

use crate::context::{DbContext, EntryState};
use crate::entity::{CompositeKey, Entity, EntityMetadata};
use crate::error::CoreResult;
use crate::query::include::IncludeLoader;
use crate::query::options::{QueryOptions, ViewMode};
use crate::query::order::SortPlan;
use crate::query::page::{paginate, PagedResult};
use tracing::debug;

/// Runs `options` against the collection of `T`.
///
/// Steps run in a fixed order: select the view, drop the default filter if
/// asked to, apply includes, filter, order, paginate. Under
/// [`ViewMode::Tracked`] the returned page is attached to the tracker.
pub(crate) fn execute<T: Entity>(
    ctx: &DbContext,
    metadata: &EntityMetadata<T>,
    options: &QueryOptions<T>,
) -> CoreResult<PagedResult<T>> {
    ctx.check_cancelled()?;

    let rows = ctx.read_entities(metadata, options.view_mode.resolves_identity())?;
    let scanned = rows.len();

    let default_filter = if options.ignore_query_filters {
        None
    } else {
        metadata.query_filter()
    };

    let mut candidates: Vec<(CompositeKey, T)> = rows
        .into_iter()
        .filter(|(_, entity)| default_filter.map_or(true, |f| f.matches(entity)))
        .collect();

    if !options.includes.is_empty() {
        let mut loader =
            IncludeLoader::new(ctx, options.view_mode, options.ignore_query_filters);
        for include in &options.includes {
            ctx.check_cancelled()?;
            for (_, entity) in &mut candidates {
                include.apply(entity, &mut loader)?;
            }
        }
    }

    if let Some(filter) = &options.filter {
        candidates.retain(|(_, entity)| filter.matches(entity));
    }

    let plan = SortPlan::compose(metadata, &options.order_by);
    let ordered = plan.apply_by(
        candidates.into_iter().map(Keyed::from).collect(),
        |row| &row.entity,
    );

    let page = paginate(ordered, options.page_number, options.page_size);
    debug!(
        collection = metadata.collection(),
        scanned,
        matched = page.total_items,
        returned = page.items.len(),
        "query executed"
    );

    if options.view_mode == ViewMode::Tracked {
        ctx.attach_all(
            metadata.collection(),
            page.items
                .iter()
                .map(|row| (row.key.clone(), row.entity.clone())),
            EntryState::Unchanged,
        );
    }

    Ok(page.map(|row| row.entity))
}

/// An entity carried with its key through ordering and pagination.
struct Keyed<T> {
    key: CompositeKey,
    entity: T,
}

impl<T> From<(CompositeKey, T)> for Keyed<T> {
    fn from((key, entity): (CompositeKey, T)) -> Self {
        Self { key, entity }
    }
}
