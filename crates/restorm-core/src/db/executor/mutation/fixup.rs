use crate::{
    db::executor::mutation::{ChangeEntry, EntryState},
    model::{EntityModel, ForeignKeyModel, Schema},
    value::{Value, codec::format_value},
};

/// Key values an insert is about to replace.
pub(super) fn placeholder_key<E: ChangeEntry>(model: &EntityModel, entry: &E) -> Vec<Value> {
    model
        .primary_key
        .iter()
        .map(|property| entry.current_value(property))
        .collect()
}

/// Repoint pending dependents from a principal's placeholder key to the key
/// the store assigned. Only entries still waiting in `pending` are touched,
/// and only when every foreign-key column still matches the placeholder.
pub(super) fn fix_up<E: ChangeEntry>(
    schema: &Schema,
    principal_model: &EntityModel,
    placeholder: &[Value],
    entries: &mut [E],
    principal: usize,
    pending: &[usize],
) {
    if placeholder.is_empty() || placeholder.iter().any(Value::is_null) {
        return;
    }

    let assigned = placeholder_key(principal_model, &entries[principal]);
    if render(&assigned) == render(placeholder) {
        return;
    }

    for &position in pending {
        let entry = &mut entries[position];
        if !matches!(entry.state(), EntryState::Added | EntryState::Modified) {
            continue;
        }
        let Some(model) = schema.get(entry.entity()) else {
            continue;
        };

        for fk in model
            .foreign_keys
            .iter()
            .filter(|fk| fk.principal == principal_model.name)
        {
            let Some(targets) = key_slots(fk, principal_model) else {
                continue;
            };
            let points_at_placeholder = targets.iter().all(|&(property, slot)| {
                format_value(&entry.current_value(property)) == format_value(&placeholder[slot])
            });
            if !points_at_placeholder {
                continue;
            }

            for &(property, slot) in &targets {
                tracing::debug!(
                    entity = %model.name,
                    property,
                    principal = %principal_model.name,
                    "foreign key repointed to assigned key"
                );
                entry.fix_up_foreign_key(property, assigned[slot].clone());
            }
        }
    }
}

// Foreign-key property paired with its position in the principal's key.
// `None` when the relation targets something other than the primary key.
fn key_slots<'a>(
    fk: &'a ForeignKeyModel,
    principal_model: &EntityModel,
) -> Option<Vec<(&'a str, usize)>> {
    let principal_key = fk.resolved_principal_key(principal_model);
    if principal_key.len() != fk.properties.len() {
        return None;
    }

    fk.properties
        .iter()
        .zip(principal_key)
        .map(|(property, key)| {
            principal_model
                .primary_key
                .iter()
                .position(|candidate| candidate == key)
                .map(|slot| (property.as_str(), slot))
        })
        .collect()
}

fn render(values: &[Value]) -> Vec<String> {
    values.iter().map(format_value).collect()
}
