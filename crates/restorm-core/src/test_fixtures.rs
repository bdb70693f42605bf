use crate::{
    db::transport::{
        AsyncTransport, HttpRequest, HttpResponse, RequestConfig, Transport, TransportError,
    },
    model::{DeleteBehavior, EntityModel, FieldKind, FieldModel, ForeignKeyModel, Schema},
};
use std::{collections::VecDeque, sync::Mutex};
use url::Url;

/// Flat entity exercising most scalar kinds.
pub(crate) fn person_model() -> EntityModel {
    EntityModel::new("Person", "people")
        .field(FieldModel::new("Id", FieldKind::Int64).store_generated())
        .field(FieldModel::new("Name", FieldKind::Text))
        .field(FieldModel::new("Age", FieldKind::Int32))
        .field(FieldModel::new("IsActive", FieldKind::Bool))
        .field(FieldModel::new("Email", FieldKind::Text).nullable())
        .field(FieldModel::new("CreatedAt", FieldKind::Timestamp).column("created_at"))
        .field(FieldModel::new("Tags", FieldKind::Other("jsonb".to_string())).nullable())
        .key(&["Id"])
}

pub(crate) fn parent_model() -> EntityModel {
    EntityModel::new("Parent", "parents")
        .field(FieldModel::new("Id", FieldKind::Int64).store_generated())
        .field(FieldModel::new("Name", FieldKind::Text))
        .key(&["Id"])
}

pub(crate) fn child_model() -> EntityModel {
    EntityModel::new("Child", "children")
        .field(FieldModel::new("Id", FieldKind::Int64).store_generated())
        .field(FieldModel::new("ParentId", FieldKind::Int64).column("parent_id"))
        .field(FieldModel::new("Label", FieldKind::Text))
        .key(&["Id"])
        .foreign_key(ForeignKeyModel::new(&["ParentId"], "Parent").on_delete(DeleteBehavior::Cascade))
}

pub(crate) fn grandchild_model() -> EntityModel {
    EntityModel::new("GrandChild", "grandchildren")
        .field(FieldModel::new("Id", FieldKind::Int64).store_generated())
        .field(FieldModel::new("ChildId", FieldKind::Int64).column("child_id"))
        .key(&["Id"])
        .foreign_key(ForeignKeyModel::new(&["ChildId"], "Child").on_delete(DeleteBehavior::Cascade))
}

/// Child-like entity whose foreign key does not cascade.
pub(crate) fn note_model() -> EntityModel {
    EntityModel::new("Note", "notes")
        .field(FieldModel::new("Id", FieldKind::Int64).store_generated())
        .field(FieldModel::new("ParentId", FieldKind::Int64).column("parent_id"))
        .key(&["Id"])
        .foreign_key(ForeignKeyModel::new(&["ParentId"], "Parent").on_delete(DeleteBehavior::Restrict))
}

/// Keyless entity; inserts only.
pub(crate) fn audit_model() -> EntityModel {
    EntityModel::new("Audit", "audit_log")
        .field(FieldModel::new("Message", FieldKind::Text))
}

pub(crate) fn schema() -> Schema {
    Schema::new()
        .with(person_model())
        .with(parent_model())
        .with(child_model())
        .with(grandchild_model())
        .with(note_model())
        .with(audit_model())
}

///
/// MockTransport
/// Replays queued responses in order and records every request it sees.
///

#[derive(Default)]
pub(crate) struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    pub(crate) fn fail(self, err: TransportError) -> Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("no response queued".to_string())))
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.next(request)
    }
}

impl AsyncTransport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        tokio::task::yield_now().await;
        self.next(request)
    }
}

pub(crate) fn request_config() -> RequestConfig {
    RequestConfig::new(Url::parse("http://localhost:3000/").unwrap())
}
