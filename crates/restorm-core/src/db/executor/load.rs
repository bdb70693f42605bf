use crate::{
    db::{
        executor::check_response,
        query::{CompiledQuery, projection::Shaped, url::Params},
        response::{JsonObject, Response, Row, parse_body},
        transport::{AsyncTransport, HttpRequest, HttpResponse, RequestConfig, Transport},
    },
    error::InternalError,
    obs::sink::{ExecKind, Span},
};
use serde::de::DeserializeOwned;
use std::vec;

///
/// CursorPhase
/// Observable state of one enumeration.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CursorPhase {
    NotStarted,
    /// Request issued, response not yet decoded. Only observable on an
    /// async cursor whose `next` future was dropped mid-flight.
    Fetching,
    Ready,
    Exhausted,
}

enum CursorState {
    NotStarted,
    Fetching,
    Ready(vec::IntoIter<JsonObject>),
    Exhausted,
}

impl CursorState {
    const fn phase(&self) -> CursorPhase {
        match self {
            Self::NotStarted => CursorPhase::NotStarted,
            Self::Fetching => CursorPhase::Fetching,
            Self::Ready(_) => CursorPhase::Ready,
            Self::Exhausted => CursorPhase::Exhausted,
        }
    }
}

///
/// Materializer
/// Request building and row shaping shared by both cursor flavours.
///

struct Materializer<'a> {
    config: &'a RequestConfig,
    query: &'a CompiledQuery<'a>,
    params: Params,
}

impl Materializer<'_> {
    fn table(&self) -> &str {
        &self.query.query.table
    }

    fn request(&self) -> Result<HttpRequest, InternalError> {
        let request = self.query.request(self.config, &self.params)?;
        tracing::debug!(table = self.table(), url = %request.url, "load request");

        Ok(request)
    }

    fn rows(&self, response: HttpResponse, span: &mut Span) -> Result<Vec<JsonObject>, InternalError> {
        let rows = parse_body(&response.body)?;
        span.set_rows(u64::try_from(rows.len()).unwrap_or(u64::MAX));

        Ok(rows)
    }

    fn shape(&self, object: &JsonObject) -> Result<Shaped, InternalError> {
        let model = self.query.model;
        let row = Row::decode(model, &self.query.projection.fields(model), object)?;

        self.query.shape(&row, &self.params)
    }

    // Advance over buffered rows; `None` means a fetch is needed first.
    fn advance(&self, state: &mut CursorState) -> Option<Option<Result<Shaped, InternalError>>> {
        match state {
            CursorState::NotStarted | CursorState::Fetching => None,
            CursorState::Ready(rows) => {
                let Some(object) = rows.next() else {
                    *state = CursorState::Exhausted;
                    return Some(None);
                };
                let shaped = self.shape(&object);
                if shaped.is_err() {
                    *state = CursorState::Exhausted;
                }
                Some(Some(shaped))
            }
            CursorState::Exhausted => Some(None),
        }
    }

    fn settle(
        state: &mut CursorState,
        fetched: Result<Vec<JsonObject>, InternalError>,
    ) -> Option<InternalError> {
        match fetched {
            Ok(rows) => {
                *state = CursorState::Ready(rows.into_iter());
                None
            }
            Err(err) => {
                *state = CursorState::Exhausted;
                Some(err)
            }
        }
    }
}

///
/// ResultCursor
///
/// Lazy, single-shot enumeration over one blocking GET. The request is sent
/// on the first call to `next`; a new cursor is a new request.
///

pub struct ResultCursor<'a, T: Transport> {
    transport: &'a T,
    inner: Materializer<'a>,
    state: CursorState,
}

impl<T: Transport> ResultCursor<'_, T> {
    #[must_use]
    pub const fn phase(&self) -> CursorPhase {
        self.state.phase()
    }

    fn fetch(&self) -> Result<Vec<JsonObject>, InternalError> {
        let request = self.inner.request()?;
        let mut span = Span::new(ExecKind::Load, self.inner.table());
        let response = check_response(
            ExecKind::Load,
            self.inner.table(),
            self.transport.send(&request),
        )?;

        self.inner.rows(response, &mut span)
    }
}

impl<T: Transport> Iterator for ResultCursor<'_, T> {
    type Item = Result<Shaped, InternalError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.inner.advance(&mut self.state) {
                return item;
            }

            self.state = CursorState::Fetching;
            let fetched = self.fetch();
            if let Some(err) = Materializer::settle(&mut self.state, fetched) {
                return Some(Err(err));
            }
        }
    }
}

///
/// AsyncResultCursor
///
/// Async twin of `ResultCursor`. Dropping a pending `next` future leaves
/// the cursor in `Fetching`; the following `next` re-issues the GET.
///

pub struct AsyncResultCursor<'a, T: AsyncTransport> {
    transport: &'a T,
    inner: Materializer<'a>,
    state: CursorState,
}

impl<T: AsyncTransport> AsyncResultCursor<'_, T> {
    #[must_use]
    pub const fn phase(&self) -> CursorPhase {
        self.state.phase()
    }

    pub async fn next(&mut self) -> Option<Result<Shaped, InternalError>> {
        loop {
            if let Some(item) = self.inner.advance(&mut self.state) {
                return item;
            }

            self.state = CursorState::Fetching;
            let fetched = self.fetch().await;
            if let Some(err) = Materializer::settle(&mut self.state, fetched) {
                return Some(Err(err));
            }
        }
    }

    /// Drain the cursor.
    pub async fn collect(mut self) -> Result<Vec<Shaped>, InternalError> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await {
            out.push(item?);
        }

        Ok(out)
    }

    async fn fetch(&self) -> Result<Vec<JsonObject>, InternalError> {
        let request = self.inner.request()?;
        let mut span = Span::new(ExecKind::Load, self.inner.table());
        let outcome = self.transport.send(&request).await;
        let response = check_response(ExecKind::Load, self.inner.table(), outcome)?;

        self.inner.rows(response, &mut span)
    }
}

///
/// LoadExecutor
///

pub struct LoadExecutor<'a, T> {
    transport: &'a T,
    config: &'a RequestConfig,
}

impl<'a, T> LoadExecutor<'a, T> {
    #[must_use]
    pub const fn new(transport: &'a T, config: &'a RequestConfig) -> Self {
        Self { transport, config }
    }

    fn materializer(&self, query: &'a CompiledQuery<'a>, params: Params) -> Materializer<'a> {
        Materializer {
            config: self.config,
            query,
            params,
        }
    }
}

impl<'a, T: Transport> LoadExecutor<'a, T> {
    /// Cursor for one enumeration; nothing is sent until it is advanced.
    #[must_use]
    pub fn cursor(&self, query: &'a CompiledQuery<'a>, params: Params) -> ResultCursor<'a, T> {
        ResultCursor {
            transport: self.transport,
            inner: self.materializer(query, params),
            state: CursorState::NotStarted,
        }
    }

    /// Run the query and collect every shaped row.
    pub fn execute(
        &self,
        query: &'a CompiledQuery<'a>,
        params: Params,
    ) -> Result<Response<Shaped>, InternalError> {
        let rows = self.cursor(query, params).collect::<Result<Vec<_>, _>>()?;

        Ok(Response::new(query.query.table.clone(), rows))
    }

    /// Run the query and deserialize every shaped row into `D`.
    pub fn load<D: DeserializeOwned>(
        &self,
        query: &'a CompiledQuery<'a>,
        params: Params,
    ) -> Result<Response<D>, InternalError> {
        let rows = self
            .cursor(query, params)
            .map(|item| item.and_then(Shaped::deserialize))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Response::new(query.query.table.clone(), rows))
    }
}

impl<'a, T: AsyncTransport> LoadExecutor<'a, T> {
    #[must_use]
    pub fn cursor_async(
        &self,
        query: &'a CompiledQuery<'a>,
        params: Params,
    ) -> AsyncResultCursor<'a, T> {
        AsyncResultCursor {
            transport: self.transport,
            inner: self.materializer(query, params),
            state: CursorState::NotStarted,
        }
    }

    pub async fn execute_async(
        &self,
        query: &'a CompiledQuery<'a>,
        params: Params,
    ) -> Result<Response<Shaped>, InternalError> {
        let rows = self.cursor_async(query, params).collect().await?;

        Ok(Response::new(query.query.table.clone(), rows))
    }

    pub async fn load_async<D: DeserializeOwned>(
        &self,
        query: &'a CompiledQuery<'a>,
        params: Params,
    ) -> Result<Response<D>, InternalError> {
        let rows = self
            .cursor_async(query, params)
            .collect()
            .await?
            .into_iter()
            .map(Shaped::deserialize)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Response::new(query.query.table.clone(), rows))
    }
}

///
/// TESTS
///
