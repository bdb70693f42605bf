use crate::{config::ClientConfig, error::Error};
use restorm_core::{
    db::{
        executor::{ChangeEntry, LoadExecutor, MutationDispatcher, SaveSummary},
        query::{CompiledQuery, QueryTranslator, projection::Shaped, url::Params},
        response::Response,
        transport::{AsyncTransport, HttpRequest, RequestConfig, Transport},
    },
    error::ErrorOrigin,
    model::Schema,
};
use serde::de::DeserializeOwned;
use std::time::Duration;

///
/// Client
///
/// Binds a host transport, the entity schema and the request config.
/// Reads go through `query` + `load`/`execute`, writes through
/// `save_changes`. Every call is independent; the client holds no
/// per-request state.
///

pub struct Client<T> {
    transport: T,
    schema: Schema,
    config: RequestConfig,
    timeout: Option<Duration>,
}

impl<T> Client<T> {
    #[must_use]
    pub const fn new(transport: T, schema: Schema, config: RequestConfig) -> Self {
        Self {
            transport,
            schema,
            config,
            timeout: None,
        }
    }

    /// Build a client from file-backed settings.
    pub fn from_config(transport: T, schema: Schema, settings: &ClientConfig) -> Result<Self, Error> {
        let config = settings.request_config()?;
        tracing::debug!(
            base_url = %config.base_url,
            schema = %config.schema,
            entities = schema.entities().count(),
            "client configured"
        );

        Ok(Self {
            transport,
            schema,
            config,
            timeout: settings.timeout(),
        })
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub const fn request_config(&self) -> &RequestConfig {
        &self.config
    }

    /// Per-request timeout the transport is expected to enforce.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Start a translation over a registered entity.
    pub fn query(&self, entity: &str) -> Result<QueryTranslator<'_>, Error> {
        let model = self.schema.try_get(entity, ErrorOrigin::Query)?;

        Ok(QueryTranslator::new(model))
    }

    /// The GET a query would send, without sending it.
    pub fn request(&self, query: &CompiledQuery<'_>, params: &Params) -> Result<HttpRequest, Error> {
        Ok(query.request(&self.config, params)?)
    }
}

impl<T: Transport> Client<T> {
    pub fn execute<'q>(
        &'q self,
        query: &'q CompiledQuery<'q>,
        params: Params,
    ) -> Result<Response<Shaped>, Error> {
        Ok(LoadExecutor::new(&self.transport, &self.config).execute(query, params)?)
    }

    pub fn load<'q, D: DeserializeOwned>(
        &'q self,
        query: &'q CompiledQuery<'q>,
        params: Params,
    ) -> Result<Response<D>, Error> {
        Ok(LoadExecutor::new(&self.transport, &self.config).load(query, params)?)
    }

    pub fn save_changes<E: ChangeEntry>(&self, entries: &mut [E]) -> Result<SaveSummary, Error> {
        Ok(MutationDispatcher::new(&self.transport, &self.schema, &self.config)
            .save_changes(entries)?)
    }
}

impl<T: AsyncTransport> Client<T> {
    pub async fn execute_async<'q>(
        &'q self,
        query: &'q CompiledQuery<'q>,
        params: Params,
    ) -> Result<Response<Shaped>, Error> {
        Ok(LoadExecutor::new(&self.transport, &self.config)
            .execute_async(query, params)
            .await?)
    }

    pub async fn load_async<'q, D: DeserializeOwned>(
        &'q self,
        query: &'q CompiledQuery<'q>,
        params: Params,
    ) -> Result<Response<D>, Error> {
        Ok(LoadExecutor::new(&self.transport, &self.config)
            .load_async(query, params)
            .await?)
    }

    pub async fn save_changes_async<E: ChangeEntry>(
        &self,
        entries: &mut [E],
    ) -> Result<SaveSummary, Error> {
        Ok(MutationDispatcher::new(&self.transport, &self.schema, &self.config)
            .save_changes_async(entries)
            .await?)
    }
}

///
/// TESTS
///
