//! Fixtures shared by the integration suites.
#![allow(dead_code)]

use restorm_core::{
    db::transport::{
        AsyncTransport, HttpRequest, HttpResponse, RequestConfig, Transport, TransportError,
    },
    model::{DeleteBehavior, EntityModel, FieldKind, FieldModel, ForeignKeyModel, Schema},
};
use std::{collections::VecDeque, sync::Mutex};
use url::Url;

pub fn author_model() -> EntityModel {
    EntityModel::new("Author", "authors")
        .field(FieldModel::new("Id", FieldKind::Int64).store_generated())
        .field(FieldModel::new("Name", FieldKind::Text))
        .field(FieldModel::new("JoinedAt", FieldKind::Timestamp).column("joined_at").store_generated())
        .key(&["Id"])
}

pub fn post_model() -> EntityModel {
    EntityModel::new("Post", "posts")
        .field(FieldModel::new("Id", FieldKind::Uuid).store_generated())
        .field(FieldModel::new("AuthorId", FieldKind::Int64).column("author_id"))
        .field(FieldModel::new("Title", FieldKind::Text))
        .field(FieldModel::new("Views", FieldKind::Int32))
        .field(FieldModel::new("Rating", FieldKind::Decimal).nullable())
        .key(&["Id"])
        .foreign_key(
            ForeignKeyModel::new(&["AuthorId"], "Author").on_delete(DeleteBehavior::Cascade),
        )
}

pub fn comment_model() -> EntityModel {
    EntityModel::new("Comment", "comments")
        .field(FieldModel::new("Id", FieldKind::Int64).store_generated())
        .field(FieldModel::new("PostId", FieldKind::Uuid).column("post_id"))
        .field(FieldModel::new("Body", FieldKind::Text))
        .key(&["Id"])
        .foreign_key(ForeignKeyModel::new(&["PostId"], "Post").on_delete(DeleteBehavior::Cascade))
}

pub fn blog_schema() -> Schema {
    Schema::new()
        .with(author_model())
        .with(post_model())
        .with(comment_model())
}

pub fn config() -> RequestConfig {
    RequestConfig::new(Url::parse("https://api.example.test/rest/v1").unwrap()).token("secret")
}

///
/// Recorder
/// Scripted transport: answers in queue order and keeps every request.
///

#[derive(Default)]
pub struct Recorder {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, status: u16, body: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    pub fn error(self, err: TransportError) -> Self {
        self.script.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn seen(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().clone()
    }

    /// `METHOD /path?query` per request, in send order.
    pub fn lines(&self) -> Vec<String> {
        self.seen()
            .iter()
            .map(|request| match request.url.query() {
                Some(query) => format!("{} {}?{query}", request.method, request.url.path()),
                None => format!("{} {}", request.method, request.url.path()),
            })
            .collect()
    }

    fn answer(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("script exhausted".to_string())))
    }
}

impl Transport for Recorder {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.answer(request)
    }
}

impl AsyncTransport for Recorder {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        tokio::task::yield_now().await;
        self.answer(request)
    }
}
