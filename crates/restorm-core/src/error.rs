
use crate::db::transport::TransportError;
use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable classification.
/// Every failure that leaves the query or mutation paths is one of these;
/// untranslatable queries are signalled with `None`, never with an error.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// `Request` details only accompany `ErrorClass::Request`, and
    /// `Transport` details only accompany `ErrorClass::Transport`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError without a detail payload.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Update or delete attempted on an entity type without a declared key.
    pub(crate) fn no_primary_key(entity: &str) -> Self {
        Self::new(
            ErrorClass::NoPrimaryKey,
            ErrorOrigin::Mutation,
            format!("entity '{entity}' has no primary key; update and delete require one"),
        )
    }

    /// Change entry or batch shape that violates the dispatcher contract.
    pub(crate) fn invalid_state(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidState, origin, message)
    }

    /// Response body or value that cannot be decoded into the expected shape.
    pub(crate) fn decode(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Decode, origin, message)
    }

    /// Runtime input the engine cannot express on the wire.
    pub(crate) fn unsupported(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, origin, message)
    }

    /// Wrap a decoded non-success response.
    #[must_use]
    pub fn request(failure: RequestFailure) -> Self {
        Self {
            class: ErrorClass::Request,
            origin: ErrorOrigin::Transport,
            message: failure.to_string(),
            detail: Some(ErrorDetail::Request(failure)),
        }
    }

    /// Wrap a transport failure without altering it.
    #[must_use]
    pub fn transport(err: TransportError) -> Self {
        Self {
            class: ErrorClass::Transport,
            origin: ErrorOrigin::Transport,
            message: err.to_string(),
            detail: Some(ErrorDetail::Transport(err)),
        }
    }

    /// Decoded request failure, when this error came from a non-success status.
    #[must_use]
    pub const fn request_failure(&self) -> Option<&RequestFailure> {
        match &self.detail {
            Some(ErrorDetail::Request(failure)) => Some(failure),
            _ => None,
        }
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Cardinality,
    Decode,
    InvalidState,
    NoPrimaryKey,
    Request,
    Transport,
    Unsupported,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cardinality => "cardinality",
            Self::Decode => "decode",
            Self::InvalidState => "invalid_state",
            Self::NoPrimaryKey => "no_primary_key",
            Self::Request => "request",
            Self::Transport => "transport",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Codec,
    Load,
    Mutation,
    Query,
    Relation,
    Transport,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Codec => "codec",
            Self::Load => "load",
            Self::Mutation => "mutation",
            Self::Query => "query",
            Self::Relation => "relation",
            Self::Transport => "transport",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorDetail
///

#[derive(Debug)]
pub enum ErrorDetail {
    Request(RequestFailure),
    Transport(TransportError),
}

///
/// RequestFailure
///
/// A non-success HTTP status plus whatever the structured error body carried.
/// Every body field is optional; a missing or malformed body leaves them all
/// empty and the failure carries the status alone.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RequestFailure {
    pub status: u16,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
    pub code: Option<String>,
}

impl RequestFailure {
    /// Decode an error body of the form `{message, details, hint, code}`.
    #[must_use]
    pub fn decode(status: u16, body: &[u8]) -> Self {
        let mut failure = Self {
            status,
            ..Self::default()
        };

        let Ok(JsonValue::Object(fields)) = serde_json::from_slice::<JsonValue>(body) else {
            return failure;
        };
        let text = |name: &str| match fields.get(name) {
            Some(JsonValue::String(value)) => Some(value.clone()),
            _ => None,
        };

        failure.message = text("message");
        failure.details = text("details");
        failure.hint = text("hint");
        failure.code = text("code");

        failure
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request failed with status {}", self.status)?;
        if let Some(code) = &self.code {
            write!(f, " [{code}]")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "; hint: {hint}")?;
        }

        Ok(())
    }
}

impl std::error::Error for RequestFailure {}
