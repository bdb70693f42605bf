use restorm_core::{DEFAULT_SCHEMA, db::transport::RequestConfig};
use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error as ThisError;
use url::Url;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("base_url '{url}' is not a valid URL: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base_url '{0}' must use http or https")]
    UnsupportedScheme(String),

    #[error("schema must not be empty")]
    EmptySchema,

    #[error("timeout_ms must be greater than zero")]
    ZeroTimeout,
}

///
/// ClientConfig
///
/// Connection settings as written in a TOML file:
///
/// ```toml
/// base_url = "https://api.example.com/rest/v1"
/// token = "..."
/// schema = "inventory"
/// timeout_ms = 5000
/// ```
///
/// Only `base_url` is required.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub base_url: String,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_schema")]
    pub schema: String,

    /// Per-request timeout handed to the transport.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            schema: default_schema(),
            timeout_ms: None,
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        if self.schema.trim().is_empty() {
            return Err(ConfigError::EmptySchema);
        }
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }

    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        match self.timeout_ms {
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        }
    }

    /// Validate and convert into the headers/endpoint bundle the engine uses.
    pub fn request_config(&self) -> Result<RequestConfig, ConfigError> {
        self.validate()?;

        let mut config = RequestConfig::new(self.base_url()?).schema(self.schema.trim());
        if let Some(token) = self.token.as_deref().filter(|token| !token.is_empty()) {
            config = config.token(token);
        }

        Ok(config)
    }

    fn base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|source| ConfigError::InvalidUrl {
            url: self.base_url.clone(),
            source,
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            _ => Err(ConfigError::UnsupportedScheme(self.base_url.clone())),
        }
    }
}

///
/// TESTS
///
