use crate::{
    db::{
        executor::mutation::{ChangeEntry, EntryState},
        query::{
            plan::{Filter, FilterOp, Operand, QueryModel},
            url::{Params, QueryString, request_url},
        },
        response::JsonObject,
        transport::{HttpRequest, Method, RequestConfig},
    },
    error::{ErrorOrigin, InternalError},
    model::EntityModel,
    obs::sink::ExecKind,
    value::{Value, codec::to_json},
};
use serde_json::Value as JsonValue;

///
/// WriteKind
/// The request an entry state maps to.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

impl WriteKind {
    /// Map a tracked state; non-mutating states are a contract violation.
    pub fn of(entity: &str, state: EntryState) -> Result<Self, InternalError> {
        match state {
            EntryState::Added => Ok(Self::Insert),
            EntryState::Modified => Ok(Self::Update),
            EntryState::Deleted => Ok(Self::Delete),
            EntryState::Unchanged | EntryState::Detached => Err(InternalError::invalid_state(
                ErrorOrigin::Mutation,
                format!("cannot build a request for {entity} in state {state}"),
            )),
        }
    }

    #[must_use]
    pub const fn method(self) -> Method {
        match self {
            Self::Insert => Method::Post,
            Self::Update => Method::Patch,
            Self::Delete => Method::Delete,
        }
    }

    #[must_use]
    pub const fn exec_kind(self) -> ExecKind {
        match self {
            Self::Insert => ExecKind::Insert,
            Self::Update => ExecKind::Update,
            Self::Delete => ExecKind::Delete,
        }
    }
}

/// Check that `entry` can be turned into a request without building it.
pub(crate) fn validate<E: ChangeEntry>(model: &EntityModel, entry: &E) -> Result<WriteKind, InternalError> {
    let kind = WriteKind::of(&model.name, entry.state())?;
    if kind != WriteKind::Insert {
        key_filters(model, entry)?;
    }

    Ok(kind)
}

/// Build the HTTP request for one change entry.
///
/// Inserts POST every mapped property except store-generated ones still
/// holding a placeholder. Updates PATCH the modified properties. Updates
/// and deletes address the row by its original key values.
pub fn build_request<E: ChangeEntry>(
    model: &EntityModel,
    entry: &E,
    config: &RequestConfig,
) -> Result<HttpRequest, InternalError> {
    let kind = WriteKind::of(&model.name, entry.state())?;

    let (query, body) = match kind {
        WriteKind::Insert => (QueryString::default(), Some(insert_body(model, entry))),
        WriteKind::Update => (key_query(model, entry)?, Some(update_body(model, entry))),
        WriteKind::Delete => (key_query(model, entry)?, None),
    };

    let method = kind.method();
    let body = body.map(|object| JsonValue::Object(object).to_string());

    Ok(HttpRequest {
        method,
        url: request_url(&config.base_url, &model.table, &query)?,
        headers: config.write_headers(method),
        body,
    })
}

fn insert_body<E: ChangeEntry>(model: &EntityModel, entry: &E) -> JsonObject {
    model
        .fields
        .iter()
        .filter(|field| !(field.store_generated && entry.has_temporary_value(&field.name)))
        .map(|field| (field.column.clone(), to_json(&entry.current_value(&field.name))))
        .collect()
}

fn update_body<E: ChangeEntry>(model: &EntityModel, entry: &E) -> JsonObject {
    model
        .fields
        .iter()
        .filter(|field| entry.is_modified(&field.name))
        .map(|field| (field.column.clone(), to_json(&entry.current_value(&field.name))))
        .collect()
}

fn key_query<E: ChangeEntry>(model: &EntityModel, entry: &E) -> Result<QueryString, InternalError> {
    let query = QueryModel {
        filters: key_filters(model, entry)?,
        ..QueryModel::new(model.table.clone())
    };

    QueryString::build(&query, &Params::new())
}

// One eq filter per key column, on the original value so a changed key
// still addresses the stored row.
fn key_filters<E: ChangeEntry>(model: &EntityModel, entry: &E) -> Result<Vec<Filter>, InternalError> {
    if !model.has_primary_key() {
        return Err(InternalError::no_primary_key(&model.name));
    }

    model
        .primary_key
        .iter()
        .map(|property| {
            let column = model.column_for(property).ok_or_else(|| {
                InternalError::invalid_state(
                    ErrorOrigin::Mutation,
                    format!("{}.{property} is a key but has no mapped column", model.name),
                )
            })?;

            let value = entry.original_value(property);
            if matches!(value, Value::Null) {
                return Err(InternalError::invalid_state(
                    ErrorOrigin::Mutation,
                    format!("{}.{property} has no original key value", model.name),
                ));
            }

            Ok(Filter::new(column, FilterOp::Eq, Operand::Literal(value)))
        })
        .collect()
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::executor::mutation::TrackedEntry,
        error::ErrorClass,
        model::{FieldKind, FieldModel},
        test_fixtures::{audit_model, person_model, request_config},
    };
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn body(request: &HttpRequest) -> JsonValue {
        serde_json::from_str(request.body.as_deref().expect("request has a body")).unwrap()
    }

    fn new_person() -> TrackedEntry {
        TrackedEntry::added("Person")
            .with_temporary("Id", -1)
            .with("Name", "Ada")
            .with("Age", 36)
            .with("IsActive", true)
            .with("Email", Value::Null)
            .with("CreatedAt", Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
            .with("Tags", Value::Json(json!(["a", "b"])))
    }

    #[test]
    fn insert_posts_columns_without_placeholders() {
        let request = build_request(&person_model(), &new_person(), &request_config()).unwrap();

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url.as_str(), "http://localhost:3000/people");
        assert_eq!(
            body(&request),
            json!({
                "name": "Ada",
                "age": 36,
                "isactive": true,
                "email": null,
                "created_at": "2024-05-01T12:00:00Z",
                "tags": ["a", "b"],
            })
        );
        assert_eq!(request.header("Prefer"), Some("return=representation"));
        assert_eq!(request.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn insert_keeps_explicit_store_generated_values() {
        let entry = TrackedEntry::added("Person").with("Id", 77).with("Name", "Bo");

        let request = build_request(&person_model(), &entry, &request_config()).unwrap();

        assert_eq!(body(&request)["id"], json!(77));
    }

    #[test]
    fn update_patches_modified_columns_by_original_key() {
        let entry = TrackedEntry::modified("Person")
            .with("Id", 7)
            .with("Name", "Old")
            .with("Age", 40)
            .set("Name", "New");

        let request = build_request(&person_model(), &entry, &request_config()).unwrap();

        assert_eq!(request.method, Method::Patch);
        assert_eq!(request.url.as_str(), "http://localhost:3000/people?id=eq.7");
        assert_eq!(body(&request), json!({ "name": "New" }));
    }

    #[test]
    fn changed_key_still_targets_the_stored_row() {
        let entry = TrackedEntry::modified("Person").with("Id", 7).set("Id", 8);

        let request = build_request(&person_model(), &entry, &request_config()).unwrap();

        assert_eq!(request.url.query(), Some("id=eq.7"));
        assert_eq!(body(&request), json!({ "id": 8 }));
    }

    #[test]
    fn delete_has_key_filter_and_no_body() {
        let entry = TrackedEntry::deleted("Person").with("Id", 7);

        let request = build_request(&person_model(), &entry, &request_config()).unwrap();

        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.url.query(), Some("id=eq.7"));
        assert_eq!(request.body, None);
        assert_eq!(request.header("Content-Type"), None);
        assert_eq!(request.header("Prefer"), Some("return=representation"));
    }

    #[test]
    fn composite_keys_filter_every_column() {
        let model = EntityModel::new("Membership", "memberships")
            .field(FieldModel::new("UserId", FieldKind::Int64).column("user_id"))
            .field(FieldModel::new("GroupId", FieldKind::Text).column("group_id"))
            .key(&["UserId", "GroupId"]);
        let entry = TrackedEntry::deleted("Membership")
            .with("UserId", 3)
            .with("GroupId", "staff");

        let request = build_request(&model, &entry, &request_config()).unwrap();

        assert_eq!(request.url.query(), Some("user_id=eq.3&group_id=eq.staff"));
    }

    #[test]
    fn keyless_update_and_delete_fail() {
        for entry in [
            TrackedEntry::modified("Audit").set("Message", "x"),
            TrackedEntry::deleted("Audit"),
        ] {
            let err = build_request(&audit_model(), &entry, &request_config()).unwrap_err();
            assert_eq!(err.class, ErrorClass::NoPrimaryKey);
        }

        let insert = TrackedEntry::added("Audit").with("Message", "x");
        assert!(build_request(&audit_model(), &insert, &request_config()).is_ok());
    }

    #[test]
    fn missing_original_key_fails() {
        let entry = TrackedEntry::deleted("Person");

        let err = validate(&person_model(), &entry).unwrap_err();

        assert_eq!(err.class, ErrorClass::InvalidState);
        assert!(err.message.contains("Person.Id"), "{}", err.message);
    }

    #[test]
    fn non_mutating_state_fails() {
        let entry = TrackedEntry::new("Person", EntryState::Unchanged).with("Id", 1);

        let err = build_request(&person_model(), &entry, &request_config()).unwrap_err();

        assert_eq!(err.class, ErrorClass::InvalidState);
        assert_eq!(err.origin, ErrorOrigin::Mutation);
    }

    #[test]
    fn custom_schema_sends_both_profile_headers() {
        let config = request_config().schema("tenant").token("t0k");
        let entry = TrackedEntry::deleted("Person").with("Id", 1);

        let request = build_request(&person_model(), &entry, &config).unwrap();

        assert_eq!(request.header("Content-Profile"), Some("tenant"));
        assert_eq!(request.header("Accept-Profile"), Some("tenant"));
        assert_eq!(request.header("Authorization"), Some("Bearer t0k"));
    }

    #[test]
    fn timestamps_match_filter_encoding() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let entry = TrackedEntry::modified("Person")
            .with("Id", 1)
            .set("CreatedAt", instant);

        let request = build_request(&person_model(), &entry, &request_config()).unwrap();

        let filter_text = crate::value::codec::format_value(&Value::from(instant));
        assert_eq!(body(&request)["created_at"], json!(filter_text));
    }
}
