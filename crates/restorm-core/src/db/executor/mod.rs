//! Executors: the only code that talks to a transport.
//!
//! `load` drives read cursors, `mutation` dispatches change sets. Both
//! decode non-success responses through `RequestFailure` and never retry.

pub mod load;
pub mod mutation;

pub use load::{AsyncResultCursor, CursorPhase, LoadExecutor, ResultCursor};
pub use mutation::{
    ChangeEntry, EntryState, MutationDispatcher, SaveSummary, TrackedEntry, WriteKind, build_request,
};

use crate::{
    db::transport::{HttpResponse, TransportError},
    error::{InternalError, RequestFailure},
    obs::sink::{self, ExecKind, MetricsEvent},
};

// Turn a transport outcome into a successful response or a recorded failure.
fn check_response(
    kind: ExecKind,
    table: &str,
    outcome: Result<HttpResponse, TransportError>,
) -> Result<HttpResponse, InternalError> {
    let response = outcome.map_err(|err| {
        sink::record(MetricsEvent::RequestFailed {
            kind,
            table,
            status: None,
        });
        tracing::debug!(table, error = %err, "transport failed");
        InternalError::transport(err)
    })?;

    if response.is_success() {
        return Ok(response);
    }

    sink::record(MetricsEvent::RequestFailed {
        kind,
        table,
        status: Some(response.status),
    });
    let failure = RequestFailure::decode(response.status, &response.body);
    tracing::debug!(table, status = response.status, "request rejected");

    Err(InternalError::request(failure))
}
