//! Dependency resolution for change sets.
//!
//! Orders a batch so principals are written before their dependents and
//! drops deletes the remote store will cascade on its own.

mod cascade;
mod depth;

#[cfg(test)]
mod tests;

pub use depth::DepthMap;

use crate::{
    db::executor::mutation::{ChangeEntry, EntryState},
    error::{ErrorOrigin, InternalError},
    model::Schema,
    obs::sink::{self, MetricsEvent},
};
use std::collections::BTreeSet;

///
/// DispatchPlan
///
/// Batch positions in send order. `elided` lists the deletes left to the
/// remote cascade; they never appear in `order`.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DispatchPlan {
    pub order: Vec<usize>,
    pub elided: Vec<usize>,
}

impl DispatchPlan {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Resolve the send order for `entries`.
///
/// Inserts go first, parents before children. Updates follow in input
/// order. Surviving deletes go last, parents before children. Entries in a
/// non-mutating state, or of an unregistered type, reject the whole batch.
pub fn resolve<E: ChangeEntry>(schema: &Schema, entries: &[E]) -> Result<DispatchPlan, InternalError> {
    let mut inserts = Vec::new();
    let mut updates = Vec::new();
    let mut deletes = Vec::new();

    for (position, entry) in entries.iter().enumerate() {
        schema.try_get(entry.entity(), ErrorOrigin::Relation)?;

        match entry.state() {
            EntryState::Added => inserts.push(position),
            EntryState::Modified => updates.push(position),
            EntryState::Deleted => deletes.push(position),
            state @ (EntryState::Unchanged | EntryState::Detached) => {
                return Err(InternalError::invalid_state(
                    ErrorOrigin::Relation,
                    format!(
                        "entry {position} ({}) is {state}; only added, modified and deleted entries can be saved",
                        entry.entity()
                    ),
                ));
            }
        }
    }

    // Cascade
    let elided = cascade::elided(schema, entries, &deletes);
    for &position in &elided {
        let entity = entries[position].entity();
        let table = schema
            .get(entity)
            .map_or(entity, |model| model.table.as_str());
        tracing::debug!(entity, table, "delete left to remote cascade");
        sink::record(MetricsEvent::DeleteElided { table });
    }
    deletes.retain(|position| !elided.contains(position));

    // Depth
    let types: BTreeSet<&str> = entries.iter().map(|entry| entry.entity()).collect();
    let depths = DepthMap::compute(schema, &types);
    inserts.sort_by_key(|&position| depths.depth(entries[position].entity()));
    deletes.sort_by_key(|&position| depths.depth(entries[position].entity()));

    let mut order = inserts;
    order.extend(updates);
    order.extend(deletes);

    Ok(DispatchPlan {
        order,
        elided: elided.into_iter().collect(),
    })
}
