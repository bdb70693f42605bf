//! # restorm
//!
//! `restorm` lets an object-relational mapper talk to a PostgREST-style
//! HTTP table API instead of a database driver.
//!
//! Reads translate an expression pipeline (filter, projection, order,
//! skip/take) into a single GET against a table endpoint and materialize
//! the JSON rows back into entities or projections. Writes dispatch a
//! change set as ordered POST/PATCH/DELETE requests, principals before
//! dependents, skipping deletes the store will cascade.
//!
//! ## Crate layout
//! - `core`
//!   The engine: query translation, result materialization, dependency
//!   ordering and mutation dispatch. Re-exported for hosts that need the
//!   lower-level surfaces (cursors, request builders, metrics).
//!
//! - `config`
//!   TOML-backed connection settings.
//!
//! - `client`
//!   Binds a host transport, a schema and a config.
//!
//! - `error`
//!   The public error type with a stable kind/origin taxonomy.
//!
//! - `prelude`
//!   Domain vocabulary for host code.

pub use restorm_core as core;

pub mod client;
pub mod config;
pub mod error;

pub use client::Client;
pub use config::{ClientConfig, ConfigError};
pub use error::{Error, ErrorKind, ErrorOrigin};

///
/// CONSTANTS
///

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        client::Client,
        config::ClientConfig,
        core::{
            db::{
                executor::SaveSummary,
                transport::{AsyncTransport, Transport},
            },
            prelude::*,
        },
        error::{Error, ErrorKind},
    };
}
