mod row;


pub use row::Row;
pub(crate) use row::{JsonObject, lookup, parse_body};

use crate::error::{ErrorClass, ErrorOrigin, InternalError};
use thiserror::Error as ThisError;

///
/// ResponseError
/// Errors related to interpreting a materialized response.
///

#[derive(Debug, ThisError)]
pub enum ResponseError {
    #[error("expected exactly one row, found 0 (table {table})")]
    NotFound { table: String },

    #[error("expected exactly one row, found {count} (table {table})")]
    NotUnique { table: String, count: usize },
}

impl From<ResponseError> for InternalError {
    fn from(err: ResponseError) -> Self {
        Self::new(ErrorClass::Cardinality, ErrorOrigin::Load, err.to_string())
    }
}

///
/// Response
/// Shaped rows of one fully drained read, in response order.
///

#[derive(Debug)]
pub struct Response<T> {
    table: String,
    rows: Vec<T>,
}

impl<T> Response<T> {
    pub(crate) fn new(table: impl Into<String>, rows: Vec<T>) -> Self {
        Self {
            table: table.into(),
            rows,
        }
    }

    //
    // Cardinality
    //

    #[must_use]
    pub const fn count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    //
    // Exact cardinality helpers
    //

    /// Require exactly one row.
    pub fn one(self) -> Result<T, InternalError> {
        let Self { table, rows } = self;
        let count = rows.len();

        match rows.into_iter().next() {
            Some(row) if count == 1 => Ok(row),
            None => Err(ResponseError::NotFound { table }.into()),
            Some(_) => Err(ResponseError::NotUnique { table, count }.into()),
        }
    }

    /// Require at most one row.
    pub fn one_opt(self) -> Result<Option<T>, InternalError> {
        match self.count() {
            0 => Ok(None),
            _ => self.one().map(Some),
        }
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }
}

impl<T> IntoIterator for Response<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
