use crate::config::ConfigError;
use restorm_core::error::{ErrorClass, ErrorOrigin as CoreErrorOrigin, InternalError, RequestFailure};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
    /// Decoded error body of a rejected request.
    pub failure: Option<RequestFailure>,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
            failure: None,
        }
    }

    /// HTTP status of a rejected request.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.failure.as_ref().map(|failure| failure.status)
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        let kind = match err.class {
            ErrorClass::Cardinality => ErrorKind::Cardinality,
            ErrorClass::Decode => ErrorKind::Decode,
            ErrorClass::InvalidState => ErrorKind::InvalidState,
            ErrorClass::NoPrimaryKey => ErrorKind::NoPrimaryKey,
            ErrorClass::Request => ErrorKind::Request,
            ErrorClass::Transport => ErrorKind::Transport,
            ErrorClass::Unsupported => ErrorKind::Unsupported,
        };

        Self {
            kind,
            origin: err.origin.into(),
            failure: err.request_failure().cloned(),
            message: err.message,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::Config, ErrorOrigin::Config, err.to_string())
    }
}

///
/// ErrorKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Client configuration is missing or invalid.
    Config,

    /// Expected one row, got none or several.
    Cardinality,

    /// Response body could not be decoded.
    Decode,

    /// Caller broke a contract (bad entry state, unknown entity).
    InvalidState,

    /// Update or delete on an entity without a primary key.
    NoPrimaryKey,

    /// The remote API answered with a non-success status.
    Request,

    /// The request never produced a status.
    Transport,

    /// Input the remote API cannot express.
    Unsupported,
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Codec,
    Config,
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
            Self::Config => "config",
            Self::Load => "load",
            Self::Mutation => "mutation",
            Self::Query => "query",
            Self::Relation => "relation",
            Self::Transport => "transport",
        };
        f.write_str(label)
    }
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Codec => Self::Codec,
            CoreErrorOrigin::Load => Self::Load,
            CoreErrorOrigin::Mutation => Self::Mutation,
            CoreErrorOrigin::Query => Self::Query,
            CoreErrorOrigin::Relation => Self::Relation,
            CoreErrorOrigin::Transport => Self::Transport,
        }
    }
}
