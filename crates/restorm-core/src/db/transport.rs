//! HTTP seam. The host owns the client; the engine only builds requests and
//! reads responses.

use crate::DEFAULT_SCHEMA;
use std::{fmt, future::Future, sync::Arc};
use thiserror::Error as ThisError;
use url::Url;

///
/// Method
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    #[must_use]
    pub const fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// HttpRequest
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body; `None` for GET and DELETE.
    pub body: Option<String>,
}

impl HttpRequest {
    /// First header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

///
/// HttpResponse
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

///
/// TransportError
/// Failure below HTTP: the request never produced a status.
///

#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

///
/// Transport
/// Blocking request execution supplied by the host.
///

pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

///
/// AsyncTransport
/// Non-blocking request execution supplied by the host.
///

pub trait AsyncTransport: Send + Sync {
    fn send(
        &self,
        request: &HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

impl<T: AsyncTransport> AsyncTransport for &T {
    fn send(
        &self,
        request: &HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        (**self).send(request)
    }
}

impl<T: AsyncTransport> AsyncTransport for Arc<T> {
    fn send(
        &self,
        request: &HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        (**self).send(request)
    }
}

///
/// RequestConfig
/// Endpoint, credentials, and schema shared by every request.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestConfig {
    pub base_url: Url,
    pub token: Option<String>,
    pub schema: String,
}

impl RequestConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            token: None,
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }

    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    fn custom_schema(&self) -> Option<&str> {
        (self.schema != DEFAULT_SCHEMA).then_some(self.schema.as_str())
    }

    /// Headers for a GET.
    #[must_use]
    pub fn read_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![accept()];
        headers.extend(self.authorization());
        if let Some(schema) = self.custom_schema() {
            headers.push(("Accept-Profile".to_string(), schema.to_string()));
        }

        headers
    }

    /// Headers for a POST, PATCH, or DELETE.
    #[must_use]
    pub fn write_headers(&self, method: Method) -> Vec<(String, String)> {
        let mut headers = vec![accept()];
        if method.has_body() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        headers.push(("Prefer".to_string(), "return=representation".to_string()));
        headers.extend(self.authorization());
        // the returned representation is read from the same schema
        if let Some(schema) = self.custom_schema() {
            headers.push(("Accept-Profile".to_string(), schema.to_string()));
            headers.push(("Content-Profile".to_string(), schema.to_string()));
        }

        headers
    }

    fn authorization(&self) -> Option<(String, String)> {
        self.token
            .as_ref()
            .map(|token| ("Authorization".to_string(), format!("Bearer {token}")))
    }
}

fn accept() -> (String, String) {
    ("Accept".to_string(), "application/json".to_string())
}

///
/// TESTS
///
