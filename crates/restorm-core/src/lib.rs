//! Core runtime for restorm: query translation into PostgREST-style request
//! URLs, result materialization, and ordered change-set dispatch.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod db;
pub mod error;
pub mod model;
pub mod obs;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// CONSTANTS
///

/// Schema name the remote API serves when no profile header is sent.
pub const DEFAULT_SCHEMA: &str = "public";

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No executors, transports, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::{
            executor::{ChangeEntry, EntryState, TrackedEntry},
            query::{
                expr::{Expr, Projection},
                plan::{OrderDirection, PageBound},
                url::Params,
            },
        },
        model::{DeleteBehavior, EntityModel, FieldKind, FieldModel, ForeignKeyModel, Schema},
        value::Value,
    };
}
