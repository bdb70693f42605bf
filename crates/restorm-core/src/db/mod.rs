//! Read and write paths against the remote table API.
//!
//! - `query`: expression trees in, query model and result shaper out.
//! - `executor`: sends requests, materializes rows, dispatches change sets.
//! - `relation`: dependency ordering and cascade elision for change sets.
//! - `transport`: the HTTP seam the host implements.

pub mod executor;
pub mod query;
pub mod relation;
pub mod response;
pub mod transport;
