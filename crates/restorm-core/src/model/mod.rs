//! Entity metadata supplied by the host ORM.
//!
//! The engine never discovers schema on its own; the host registers one
//! `EntityModel` per entity type and both the query and mutation paths read
//! table names, column names, keys and foreign keys from here.

pub mod entity;
pub mod field;
pub mod schema;


pub use entity::{DeleteBehavior, EntityModel, ForeignKeyModel};
pub use field::{FieldKind, FieldModel};
pub use schema::Schema;
