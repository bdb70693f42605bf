use super::{ChangeEntry, MutationDispatcher, SaveSummary, TrackedEntry};
use crate::{
    db::transport::{Method, TransportError},
    error::{ErrorClass, ErrorOrigin},
    obs::{metrics_report, metrics_reset_all},
    test_fixtures::{MockTransport, request_config, schema},
    value::Value,
};
use serde_json::{Value as JsonValue, json};

fn paths(transport: &MockTransport) -> Vec<String> {
    transport
        .requests()
        .iter()
        .map(|request| {
            let mut line = format!("{} {}", request.method, request.url.path());
            if let Some(query) = request.url.query() {
                line.push('?');
                line.push_str(query);
            }
            line
        })
        .collect()
}

fn new_parent(name: &str) -> TrackedEntry {
    TrackedEntry::added("Parent")
        .with_temporary("Id", -1)
        .with("Name", name)
}

#[test]
fn insert_writes_back_generated_key_without_marking_it_modified() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new().respond(201, r#"[{"id": 42, "name": "p"}]"#);
    let mut entries = vec![new_parent("p")];

    let summary = MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut entries)
        .unwrap();

    assert_eq!(summary, SaveSummary { dispatched: 1, elided: 0 });
    assert_eq!(entries[0].current_value("Id"), Value::Int(42));
    assert!(!entries[0].is_modified("Id"));
    assert!(!entries[0].has_temporary_value("Id"));

    let sent = transport.requests();
    assert_eq!(sent[0].method, Method::Post);
    assert_eq!(sent[0].body.as_deref(), Some(r#"{"name":"p"}"#));
}

fn body(transport: &MockTransport, nth: usize) -> JsonValue {
    serde_json::from_str(transport.requests()[nth].body.as_deref().unwrap()).unwrap()
}

#[test]
fn parents_are_inserted_before_children() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new()
        .respond(201, r#"[{"id": 42}]"#)
        .respond(201, r#"[{"id": 2}]"#);
    let mut entries = vec![
        TrackedEntry::added("Child")
            .with_temporary("Id", -2)
            .with("ParentId", -1)
            .with("Label", "c"),
        new_parent("p"),
    ];

    MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut entries)
        .unwrap();

    assert_eq!(paths(&transport), ["POST /parents", "POST /children"]);
    assert_eq!(body(&transport, 1), json!({ "label": "c", "parent_id": 42 }));
    assert_eq!(entries[1].current_value("Id"), Value::Int(42));
    assert_eq!(entries[0].current_value("ParentId"), Value::Int(42));
    assert_eq!(entries[0].current_value("Id"), Value::Int(2));
}

#[test]
fn generated_keys_flow_down_a_chain_of_inserts() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new()
        .respond(201, r#"[{"id": 42}]"#)
        .respond(201, r#"[{"id": 43}]"#)
        .respond(201, r#"[{"id": 44}]"#);
    let mut entries = vec![
        TrackedEntry::added("GrandChild")
            .with_temporary("Id", -3)
            .with("ChildId", -2),
        TrackedEntry::added("Child")
            .with_temporary("Id", -2)
            .with("ParentId", -1)
            .with("Label", "c"),
        new_parent("p"),
    ];

    MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut entries)
        .unwrap();

    assert_eq!(
        paths(&transport),
        ["POST /parents", "POST /children", "POST /grandchildren"]
    );
    assert_eq!(body(&transport, 1)["parent_id"], json!(42));
    assert_eq!(body(&transport, 2), json!({ "child_id": 43 }));
}

#[test]
fn only_dependents_of_the_inserted_row_are_repointed() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new()
        .respond(201, r#"[{"id": 42}]"#)
        .respond(201, r#"[{"id": 43}]"#)
        .respond(201, r#"[{"id": 7}]"#);
    let mut entries = vec![
        new_parent("first"),
        TrackedEntry::added("Parent")
            .with_temporary("Id", -2)
            .with("Name", "second"),
        TrackedEntry::added("Child")
            .with_temporary("Id", -3)
            .with("ParentId", -2)
            .with("Label", "c"),
    ];

    MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut entries)
        .unwrap();

    assert_eq!(body(&transport, 2)["parent_id"], json!(43));
}

#[test]
fn pending_updates_patch_the_assigned_key() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new()
        .respond(201, r#"[{"id": 42}]"#)
        .respond(200, r#"[{"id": 3, "parent_id": 42}]"#);
    let mut entries = vec![
        TrackedEntry::modified("Note")
            .with("Id", 3)
            .with("ParentId", 9)
            .set("ParentId", -1),
        new_parent("p"),
    ];

    MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut entries)
        .unwrap();

    assert_eq!(paths(&transport), ["POST /parents", "PATCH /notes?id=eq.3"]);
    assert_eq!(body(&transport, 1), json!({ "parent_id": 42 }));
}

#[test]
fn null_placeholders_repoint_nothing() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new()
        .respond(201, r#"[{"id": 42}]"#)
        .respond(201, r#"[{"id": 8}]"#);
    let mut entries = vec![
        TrackedEntry::added("Parent")
            .with_temporary("Id", Value::Null)
            .with("Name", "p"),
        TrackedEntry::added("Note")
            .with_temporary("Id", -5)
            .with("ParentId", Value::Null),
    ];

    MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut entries)
        .unwrap();

    assert_eq!(entries[1].current_value("ParentId"), Value::Null);
    assert_eq!(body(&transport, 1), json!({ "parent_id": null }));
}

#[test]
fn cascaded_child_delete_is_not_sent() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new().respond(200, "[]");
    let mut entries = vec![
        TrackedEntry::deleted("Parent").with("Id", 5),
        TrackedEntry::deleted("Child").with("Id", 8).with("ParentId", 5),
    ];

    let summary = MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut entries)
        .unwrap();

    assert_eq!(summary, SaveSummary { dispatched: 1, elided: 1 });
    assert_eq!(paths(&transport), ["DELETE /parents?id=eq.5"]);
}

#[test]
fn mixed_batch_runs_inserts_updates_then_deletes() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new()
        .respond(201, r#"[{"id": 11}]"#)
        .respond(200, r#"[{"id": 3, "name": "renamed"}]"#)
        .respond(200, "[]");
    let mut entries = vec![
        TrackedEntry::deleted("Person").with("Id", 9),
        TrackedEntry::modified("Parent")
            .with("Id", 3)
            .with("Name", "old")
            .set("Name", "renamed"),
        new_parent("fresh"),
    ];

    MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut entries)
        .unwrap();

    assert_eq!(entries[2].current_value("Id"), Value::Int(11));
    assert_eq!(
        paths(&transport),
        [
            "POST /parents",
            "PATCH /parents?id=eq.3",
            "DELETE /people?id=eq.9",
        ]
    );
}

#[test]
fn failure_aborts_the_rest_of_the_batch() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new()
        .respond(409, r#"{"message": "duplicate key", "code": "23505"}"#)
        .respond(201, r#"[{"id": 1}]"#);
    let mut entries = vec![new_parent("a"), new_parent("b")];

    let err = MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut entries)
        .unwrap_err();

    assert_eq!(err.class, ErrorClass::Request);
    let failure = err.request_failure().unwrap();
    assert_eq!(failure.status, 409);
    assert_eq!(failure.code.as_deref(), Some("23505"));
    assert_eq!(transport.requests().len(), 1);
    assert!(entries[1].has_temporary_value("Id"));
}

#[test]
fn invalid_entries_reject_the_batch_before_sending() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new();

    let mut keyless = vec![new_parent("a"), TrackedEntry::deleted("Audit")];
    let err = MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut keyless)
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::NoPrimaryKey);

    let mut unkeyed = vec![new_parent("a"), TrackedEntry::deleted("Person")];
    let err = MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut unkeyed)
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidState);

    assert!(transport.requests().is_empty());
}

#[test]
fn transport_errors_surface_unchanged() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new().fail(TransportError::Timeout);
    let mut entries = vec![new_parent("a")];

    let err = MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut entries)
        .unwrap_err();

    assert_eq!(err.class, ErrorClass::Transport);
    assert_eq!(err.message, "request timed out");
}

#[test]
fn deletes_never_read_the_body() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new().respond(204, "not json");
    let mut entries = vec![TrackedEntry::deleted("Person").with("Id", 1)];

    assert!(
        MutationDispatcher::new(&transport, &schema, &config)
            .save_changes(&mut entries)
            .is_ok()
    );
}

#[test]
fn empty_insert_response_leaves_placeholders() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new().respond(201, "");
    let mut entries = vec![new_parent("a")];

    MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut entries)
        .unwrap();

    assert!(entries[0].has_temporary_value("Id"));
}

#[test]
fn malformed_representation_is_a_decode_error() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new().respond(201, "{oops");
    let mut entries = vec![new_parent("a")];

    let err = MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut entries)
        .unwrap_err();

    assert_eq!(err.class, ErrorClass::Decode);
    assert_eq!(err.origin, ErrorOrigin::Mutation);
}

#[test]
fn mistyped_generated_value_is_a_decode_error() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new().respond(201, r#"{"id": "forty-two"}"#);
    let mut entries = vec![new_parent("a")];

    let err = MutationDispatcher::new(&transport, &schema, &config)
        .save_changes(&mut entries)
        .unwrap_err();

    assert_eq!(err.class, ErrorClass::Decode);
    assert!(err.message.starts_with("Parent.Id"), "{}", err.message);
}

#[test]
fn writes_are_counted_per_kind() {
    metrics_reset_all();
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new()
        .respond(201, r#"[{"id": 1}]"#)
        .respond(200, "[]")
        .respond(500, "");
    let mut entries = vec![
        new_parent("a"),
        TrackedEntry::deleted("Person").with("Id", 4),
        TrackedEntry::deleted("Note").with("Id", 2).with("ParentId", 3),
    ];

    let result = MutationDispatcher::new(&transport, &schema, &config).save_changes(&mut entries);
    assert!(result.is_err());

    let counters = metrics_report(None).counters.unwrap();
    assert_eq!(counters.ops.insert_calls, 1);
    assert_eq!(counters.ops.delete_calls, 2);
    assert_eq!(counters.ops.rows_written, 2);
    assert_eq!(counters.ops.requests_failed, 1);
    assert_eq!(counters.tables["notes"].requests_failed, 1);
}

#[tokio::test]
async fn async_dispatch_follows_the_same_plan() {
    let schema = schema();
    let config = request_config();
    let transport = MockTransport::new()
        .respond(201, r#"[{"id": 7}]"#)
        .respond(201, r#"[{"id": 70}]"#)
        .respond(200, "[]");
    let mut entries = vec![
        TrackedEntry::added("GrandChild")
            .with_temporary("Id", -1)
            .with("ChildId", 5),
        TrackedEntry::added("Child")
            .with_temporary("Id", -2)
            .with("ParentId", 1)
            .with("Label", "x"),
        TrackedEntry::deleted("Parent").with("Id", 99),
    ];

    let summary = MutationDispatcher::new(&transport, &schema, &config)
        .save_changes_async(&mut entries)
        .await
        .unwrap();

    assert_eq!(summary.dispatched, 3);
    assert_eq!(
        paths(&transport),
        ["POST /children", "POST /grandchildren", "DELETE /parents?id=eq.99"]
    );
    assert_eq!(entries[1].current_value("Id"), Value::Int(7));
    assert_eq!(entries[0].current_value("Id"), Value::Int(70));
}
