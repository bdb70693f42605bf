//! Change-set dispatch.
//!
//! A batch is resolved into send order up front, validated as a whole,
//! then sent one request at a time. The first failure aborts the rest;
//! nothing already sent is compensated.

mod entry;
mod fixup;
mod request;

#[cfg(test)]
mod tests;

pub use entry::{ChangeEntry, EntryState, TrackedEntry};
pub use request::{WriteKind, build_request};

use crate::{
    db::{
        executor::check_response,
        relation::{DispatchPlan, resolve},
        response::{JsonObject, lookup, parse_body},
        transport::{AsyncTransport, HttpRequest, HttpResponse, RequestConfig, Transport, TransportError},
    },
    error::{ErrorOrigin, InternalError},
    model::{EntityModel, Schema},
    obs::sink::Span,
    value::{Value, codec::from_json},
};

///
/// SaveSummary
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SaveSummary {
    /// Requests sent and acknowledged.
    pub dispatched: usize,
    /// Deletes left to the remote cascade.
    pub elided: usize,
}

///
/// MutationDispatcher
///

pub struct MutationDispatcher<'a, T> {
    transport: &'a T,
    schema: &'a Schema,
    config: &'a RequestConfig,
}

impl<'a, T> MutationDispatcher<'a, T> {
    #[must_use]
    pub const fn new(transport: &'a T, schema: &'a Schema, config: &'a RequestConfig) -> Self {
        Self {
            transport,
            schema,
            config,
        }
    }

    // Resolve order and reject the batch before anything is sent.
    fn plan<E: ChangeEntry>(&self, entries: &[E]) -> Result<DispatchPlan, InternalError> {
        let plan = resolve(self.schema, entries)?;
        for &position in &plan.order {
            let entry = &entries[position];
            request::validate(self.model(entry)?, entry)?;
        }

        tracing::debug!(
            requests = plan.order.len(),
            elided = plan.elided.len(),
            "change set resolved"
        );

        Ok(plan)
    }

    fn model<E: ChangeEntry>(&self, entry: &E) -> Result<&'a EntityModel, InternalError> {
        self.schema.try_get(entry.entity(), ErrorOrigin::Mutation)
    }

    // Requests are built per step: an earlier insert may have repointed
    // this entry's foreign keys at a generated key.
    fn step<E: ChangeEntry>(&self, entry: &E) -> Result<Step<'a>, InternalError> {
        let model = self.model(entry)?;
        let kind = request::validate(model, entry)?;
        let request = build_request(model, entry, self.config)?;
        tracing::debug!(
            entity = %model.name,
            method = %request.method,
            url = %request.url,
            "dispatching change"
        );

        Ok(Step {
            model,
            kind,
            span: Span::new(kind.exec_kind(), &model.table),
            request,
        })
    }

    fn fix_up<E: ChangeEntry>(
        &self,
        model: &EntityModel,
        placeholder: Option<Vec<Value>>,
        entries: &mut [E],
        position: usize,
        pending: &[usize],
    ) {
        if let Some(placeholder) = placeholder {
            fixup::fix_up(self.schema, model, &placeholder, entries, position, pending);
        }
    }
}

impl<T: Transport> MutationDispatcher<'_, T> {
    /// Send every pending change in dependency order.
    pub fn save_changes<E: ChangeEntry>(&self, entries: &mut [E]) -> Result<SaveSummary, InternalError> {
        let plan = self.plan(entries)?;

        for (sent, &position) in plan.order.iter().enumerate() {
            let step = self.step(&entries[position])?;
            let placeholder = step.placeholder(&entries[position]);
            let outcome = self.transport.send(&step.request);
            let model = step.finish(outcome, &mut entries[position])?;
            self.fix_up(model, placeholder, entries, position, &plan.order[sent + 1..]);
        }

        Ok(summary(&plan))
    }
}

impl<T: AsyncTransport> MutationDispatcher<'_, T> {
    /// Async twin of `save_changes`. Dropping the future stops the batch at
    /// the pending request.
    pub async fn save_changes_async<E: ChangeEntry>(
        &self,
        entries: &mut [E],
    ) -> Result<SaveSummary, InternalError> {
        let plan = self.plan(entries)?;

        for (sent, &position) in plan.order.iter().enumerate() {
            let step = self.step(&entries[position])?;
            let placeholder = step.placeholder(&entries[position]);
            let outcome = self.transport.send(&step.request).await;
            let model = step.finish(outcome, &mut entries[position])?;
            self.fix_up(model, placeholder, entries, position, &plan.order[sent + 1..]);
        }

        Ok(summary(&plan))
    }
}

const fn summary(plan: &DispatchPlan) -> SaveSummary {
    SaveSummary {
        dispatched: plan.order.len(),
        elided: plan.elided.len(),
    }
}

///
/// Step
/// One in-flight write and its metrics span.
///

struct Step<'a> {
    model: &'a EntityModel,
    kind: WriteKind,
    span: Span,
    request: HttpRequest,
}

impl<'a> Step<'a> {
    // Only inserts can move a key that dependents point at.
    fn placeholder<E: ChangeEntry>(&self, entry: &E) -> Option<Vec<Value>> {
        (self.kind == WriteKind::Insert).then(|| fixup::placeholder_key(self.model, entry))
    }

    fn finish<E: ChangeEntry>(
        mut self,
        outcome: Result<HttpResponse, TransportError>,
        entry: &mut E,
    ) -> Result<&'a EntityModel, InternalError> {
        let response = check_response(self.kind.exec_kind(), &self.model.table, outcome)?;
        self.span.set_rows(1);

        if self.kind == WriteKind::Delete {
            return Ok(self.model);
        }

        if let Some(object) = representation(&response)? {
            write_back(self.model, &object, entry)?;
        }

        Ok(self.model)
    }
}

// First returned row, if the server sent one.
fn representation(response: &HttpResponse) -> Result<Option<JsonObject>, InternalError> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let rows = parse_body(&response.body).map_err(|err| {
        InternalError::decode(ErrorOrigin::Mutation, err.message)
    })?;

    Ok(rows.into_iter().next())
}

// Server truth for store-generated properties; never marks them modified.
fn write_back<E: ChangeEntry>(
    model: &EntityModel,
    object: &JsonObject,
    entry: &mut E,
) -> Result<(), InternalError> {
    for field in model.store_generated_fields() {
        let Some(json) = lookup(object, field) else {
            continue;
        };

        let value = from_json(json, &field.kind).map_err(|err| {
            InternalError::decode(
                ErrorOrigin::Mutation,
                format!("{}.{}: {err}", model.name, field.name),
            )
        })?;
        entry.set_store_generated_value(&field.name, value);
    }

    Ok(())
}
