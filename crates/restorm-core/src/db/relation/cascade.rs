use crate::{
    db::executor::mutation::ChangeEntry,
    model::{EntityModel, ForeignKeyModel, Schema},
    value::{Value, codec::format_value},
};
use std::collections::BTreeSet;

/// Deletes the remote store removes on its own through cascade foreign keys.
///
/// `deletes` holds batch positions of every delete entry. A delete is
/// covered when one of its cascade keys matches the original key of another
/// co-batched delete of the principal type. Only covers that trace back to
/// a delete that is actually sent count, so a ring of rows covering each
/// other is dispatched in full.
pub(super) fn elided<E: ChangeEntry>(
    schema: &Schema,
    entries: &[E],
    deletes: &[usize],
) -> BTreeSet<usize> {
    let covers: Vec<Vec<usize>> = deletes
        .iter()
        .map(|&dependent| {
            deletes
                .iter()
                .enumerate()
                .filter(|&(_, &principal)| principal != dependent)
                .filter(|&(_, &principal)| covered_by(schema, &entries[dependent], &entries[principal]))
                .map(|(slot, _)| slot)
                .collect()
        })
        .collect();

    // anchored: sent, or removed by a cascade starting at a sent delete
    let mut anchored: Vec<bool> = covers.iter().map(Vec::is_empty).collect();
    loop {
        let mut changed = false;
        for slot in 0..covers.len() {
            if !anchored[slot] && covers[slot].iter().any(|&c| anchored[c]) {
                anchored[slot] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    deletes
        .iter()
        .enumerate()
        .filter(|&(slot, _)| anchored[slot] && !covers[slot].is_empty())
        .map(|(_, &position)| position)
        .collect()
}

fn covered_by<E: ChangeEntry>(schema: &Schema, dependent: &E, principal: &E) -> bool {
    let Some(model) = schema.get(dependent.entity()) else {
        return false;
    };

    model
        .foreign_keys
        .iter()
        .filter(|fk| fk.is_cascade() && fk.principal == principal.entity())
        .any(|fk| {
            schema
                .get(&fk.principal)
                .is_some_and(|principal_model| key_matches(fk, principal_model, dependent, principal))
        })
}

// Compared through the wire encoding so Int32 5 and Int64 5 agree.
fn key_matches<E: ChangeEntry>(
    fk: &ForeignKeyModel,
    principal_model: &EntityModel,
    dependent: &E,
    principal: &E,
) -> bool {
    let principal_key = fk.resolved_principal_key(principal_model);
    if principal_key.is_empty() || principal_key.len() != fk.properties.len() {
        return false;
    }

    fk.properties.iter().zip(principal_key).all(|(property, key)| {
        let value = dependent.original_value(property);
        !matches!(value, Value::Null)
            && format_value(&value) == format_value(&principal.original_value(key))
    })
}
