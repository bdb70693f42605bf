use super::{DepthMap, resolve};
use crate::{
    db::executor::mutation::{ChangeEntry, EntryState, TrackedEntry},
    error::{ErrorClass, ErrorOrigin},
    model::{DeleteBehavior, EntityModel, FieldKind, FieldModel, ForeignKeyModel, Schema},
    obs::{metrics_report, metrics_reset_all},
    test_fixtures::schema,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn entities(entries: &[TrackedEntry], order: &[usize]) -> Vec<String> {
    order
        .iter()
        .map(|&i| entries[i].entity().to_string())
        .collect()
}

fn parent(id: i64) -> TrackedEntry {
    TrackedEntry::deleted("Parent").with("Id", id)
}

fn child(id: i64, parent_id: i64) -> TrackedEntry {
    TrackedEntry::deleted("Child")
        .with("Id", id)
        .with("ParentId", parent_id)
}

// Ordering

#[test]
fn inserts_place_parents_before_children() {
    let schema = schema();
    let entries = vec![
        TrackedEntry::added("GrandChild"),
        TrackedEntry::added("Child"),
        TrackedEntry::added("Parent"),
    ];

    let plan = resolve(&schema, &entries).unwrap();

    assert_eq!(
        entities(&entries, &plan.order),
        ["Parent", "Child", "GrandChild"]
    );
}

#[test]
fn updates_keep_input_order_between_inserts_and_deletes() {
    let schema = schema();
    let entries = vec![
        TrackedEntry::deleted("Person").with("Id", 1),
        TrackedEntry::modified("Child").with("Id", 7),
        TrackedEntry::added("Person"),
        TrackedEntry::modified("Parent").with("Id", 3),
    ];

    let plan = resolve(&schema, &entries).unwrap();

    assert_eq!(plan.order, vec![2, 1, 3, 0]);
    assert!(plan.elided.is_empty());
}

#[test]
fn equal_depth_keeps_input_order() {
    let schema = schema();
    let entries = vec![
        TrackedEntry::added("Child").with("Label", "a"),
        TrackedEntry::added("Note"),
        TrackedEntry::added("Child").with("Label", "b"),
        TrackedEntry::added("Parent"),
    ];

    let plan = resolve(&schema, &entries).unwrap();

    assert_eq!(plan.order, vec![3, 0, 1, 2]);
}

#[test]
fn surviving_deletes_run_parents_first() {
    let schema = schema();
    let entries = vec![
        TrackedEntry::deleted("Note").with("Id", 1).with("ParentId", 9),
        parent(9),
    ];

    let plan = resolve(&schema, &entries).unwrap();

    assert_eq!(plan.order, vec![1, 0]);
}

// Cascade

#[test]
fn cascade_child_delete_is_elided() {
    metrics_reset_all();
    let schema = schema();
    let entries = vec![child(1, 5), parent(5)];

    let plan = resolve(&schema, &entries).unwrap();

    assert_eq!(plan.order, vec![1]);
    assert_eq!(plan.elided, vec![0]);

    let counters = metrics_report(None).counters.unwrap();
    assert_eq!(counters.ops.deletes_elided, 1);
    assert_eq!(counters.tables["children"].deletes_elided, 1);
}

#[test]
fn cascade_matches_original_key_values() {
    let schema = schema();
    // parent key was edited locally; the row on the server is still 5
    let moved = parent(5).set("Id", 6);
    let entries = vec![child(1, 5), moved];

    let plan = resolve(&schema, &entries).unwrap();

    assert_eq!(plan.elided, vec![0]);
}

#[test]
fn unrelated_parent_does_not_elide() {
    let schema = schema();
    let entries = vec![child(1, 5), parent(6)];

    let plan = resolve(&schema, &entries).unwrap();

    assert_eq!(plan.order, vec![1, 0]);
    assert!(plan.elided.is_empty());
}

#[test]
fn non_cascade_keys_are_never_elided() {
    let schema = schema();
    let entries = vec![
        TrackedEntry::deleted("Note").with("Id", 1).with("ParentId", 5),
        parent(5),
    ];

    let plan = resolve(&schema, &entries).unwrap();

    assert!(plan.elided.is_empty());
    assert_eq!(plan.len(), 2);
}

#[test]
fn null_foreign_key_is_never_elided() {
    let schema = schema();
    let orphan = TrackedEntry::deleted("Child")
        .with("Id", 1)
        .with("ParentId", crate::value::Value::Null);
    let entries = vec![orphan, TrackedEntry::deleted("Parent")];

    let plan = resolve(&schema, &entries).unwrap();

    assert!(plan.elided.is_empty());
}

#[test]
fn cascade_chains_elide_every_descendant() {
    let schema = schema();
    let entries = vec![
        TrackedEntry::deleted("GrandChild")
            .with("Id", 100)
            .with("ChildId", 10),
        child(10, 1),
        parent(1),
    ];

    let plan = resolve(&schema, &entries).unwrap();

    assert_eq!(plan.order, vec![2]);
    assert_eq!(plan.elided, vec![0, 1]);
}

#[test]
fn key_comparison_ignores_integer_signedness() {
    let schema = schema();
    let entries = vec![
        TrackedEntry::deleted("Child")
            .with("Id", 1)
            .with("ParentId", 5u64),
        TrackedEntry::deleted("Parent").with("Id", 5i64),
    ];

    let plan = resolve(&schema, &entries).unwrap();

    assert_eq!(plan.elided, vec![0]);
}

// Cycles

fn category_schema() -> Schema {
    // Category -> Category is a self reference; A <-> B is a real cycle
    Schema::new()
        .with(
            EntityModel::new("Category", "categories")
                .field(FieldModel::new("Id", FieldKind::Int64))
                .field(FieldModel::new("ParentId", FieldKind::Int64).nullable())
                .key(&["Id"])
                .foreign_key(
                    ForeignKeyModel::new(&["ParentId"], "Category")
                        .on_delete(DeleteBehavior::Cascade),
                ),
        )
        .with(
            EntityModel::new("A", "a")
                .field(FieldModel::new("Id", FieldKind::Int64))
                .field(FieldModel::new("BId", FieldKind::Int64))
                .key(&["Id"])
                .foreign_key(ForeignKeyModel::new(&["BId"], "B")),
        )
        .with(
            EntityModel::new("B", "b")
                .field(FieldModel::new("Id", FieldKind::Int64))
                .field(FieldModel::new("AId", FieldKind::Int64))
                .key(&["Id"])
                .foreign_key(ForeignKeyModel::new(&["AId"], "A")),
        )
        .with(
            EntityModel::new("C", "c")
                .field(FieldModel::new("Id", FieldKind::Int64))
                .field(FieldModel::new("AId", FieldKind::Int64))
                .key(&["Id"])
                .foreign_key(ForeignKeyModel::new(&["AId"], "A")),
        )
}

#[test]
fn self_reference_does_not_deepen() {
    let schema = category_schema();
    let types = BTreeSet::from(["Category"]);

    assert_eq!(DepthMap::compute(&schema, &types).depth("Category"), 0);
}

#[test]
fn cycle_members_share_depth_and_dependents_follow() {
    let schema = category_schema();
    let types = BTreeSet::from(["A", "B", "C"]);

    let depths = DepthMap::compute(&schema, &types);

    assert_eq!(depths.depth("A"), 0);
    assert_eq!(depths.depth("B"), 0);
    assert_eq!(depths.depth("C"), 1);
}

#[test]
fn cyclic_inserts_keep_input_order() {
    let schema = category_schema();
    let entries = vec![
        TrackedEntry::added("C"),
        TrackedEntry::added("B"),
        TrackedEntry::added("A"),
    ];

    let plan = resolve(&schema, &entries).unwrap();

    assert_eq!(plan.order, vec![1, 2, 0]);
}

#[test]
fn self_cascade_chain_is_elided_below_the_root() {
    let schema = category_schema();
    let node = |id: i64, parent: Option<i64>| {
        TrackedEntry::deleted("Category")
            .with("Id", id)
            .with("ParentId", parent.map_or(crate::value::Value::Null, Into::into))
    };
    let entries = vec![node(3, Some(2)), node(1, None), node(2, Some(1))];

    let plan = resolve(&schema, &entries).unwrap();

    assert_eq!(plan.order, vec![1]);
    assert_eq!(plan.elided, vec![0, 2]);
}

#[test]
fn rows_cascading_into_each_other_are_all_sent() {
    let schema = category_schema();
    let entries = vec![
        TrackedEntry::deleted("Category")
            .with("Id", 1)
            .with("ParentId", 2),
        TrackedEntry::deleted("Category")
            .with("Id", 2)
            .with("ParentId", 1),
    ];

    let plan = resolve(&schema, &entries).unwrap();

    assert_eq!(plan.order, vec![0, 1]);
    assert!(plan.elided.is_empty());
}

// Contract

#[test]
fn non_mutating_states_fail_fast() {
    let schema = schema();

    for state in [EntryState::Unchanged, EntryState::Detached] {
        let entries = vec![
            TrackedEntry::added("Parent"),
            TrackedEntry::new("Person", state),
        ];

        let err = resolve(&schema, &entries).unwrap_err();

        assert_eq!(err.class, ErrorClass::InvalidState);
        assert_eq!(err.origin, ErrorOrigin::Relation);
        assert!(err.message.contains(&state.to_string()), "{}", err.message);
    }
}

#[test]
fn unregistered_entity_fails_fast() {
    let err = resolve(&schema(), &[TrackedEntry::added("Ghost")]).unwrap_err();

    assert_eq!(err.class, ErrorClass::InvalidState);
    assert!(err.message.contains("Ghost"));
}

#[test]
fn empty_batch_resolves_to_nothing() {
    let plan = resolve::<TrackedEntry>(&schema(), &[]).unwrap();

    assert!(plan.is_empty());
}

///
/// PROPERTIES
///

const TYPES: [&str; 4] = ["Parent", "Child", "GrandChild", "Person"];

fn arb_entry() -> impl Strategy<Value = TrackedEntry> {
    (0..TYPES.len(), 0u8..3).prop_map(|(ty, state)| {
        let state = match state {
            0 => EntryState::Added,
            1 => EntryState::Modified,
            _ => EntryState::Deleted,
        };
        // distinct keys so no delete is elided
        TrackedEntry::new(TYPES[ty], state).with("ParentId", -1).with("ChildId", -1)
    })
}

proptest! {
    #[test]
    fn dispatch_order_respects_dependencies(entries in prop::collection::vec(arb_entry(), 0..24)) {
        let schema = schema();
        let plan = resolve(&schema, &entries).unwrap();
        let types: BTreeSet<&str> = entries.iter().map(|e| e.entity()).collect();
        let depths = DepthMap::compute(&schema, &types);

        // every entry is sent exactly once
        let mut sent = plan.order.clone();
        sent.sort_unstable();
        prop_assert_eq!(sent, (0..entries.len()).collect::<Vec<_>>());

        let phase = |i: usize| match entries[i].state() {
            EntryState::Added => 0,
            EntryState::Modified => 1,
            _ => 2,
        };

        for pair in plan.order.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            prop_assert!(phase(a) <= phase(b));
            if phase(a) == phase(b) {
                let (da, db) = (depths.depth(entries[a].entity()), depths.depth(entries[b].entity()));
                if phase(a) == 1 || da == db {
                    prop_assert!(a < b, "stable order broken at {} {}", a, b);
                } else {
                    prop_assert!(da < db);
                }
            }
        }
    }
}
