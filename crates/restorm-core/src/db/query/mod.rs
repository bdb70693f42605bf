//! Read-query translation.
//!
//! The host ORM hands over one operator at a time; `QueryTranslator`
//! either folds it into the query model or reports that the rest of the
//! pipeline must run client-side by returning `None`.

pub mod expr;
pub mod plan;
pub mod predicate;
pub mod projection;
pub mod url;


use crate::{
    db::{
        query::{
            expr::{Expr, Projection},
            plan::{OrderDirection, PageBound, QueryModel},
            predicate::{Untranslatable, analyze},
            projection::{CompiledProjection, Shaped, compile},
            url::{Params, QueryString, request_url},
        },
        response::Row,
        transport::{HttpRequest, Method, RequestConfig},
    },
    error::InternalError,
    model::EntityModel,
    obs::sink::{self, MetricsEvent},
};

///
/// QueryOperator
/// One step of the host's query pipeline.
///

#[derive(Clone, Debug, PartialEq)]
pub enum QueryOperator {
    Filter(Expr),
    Select(Projection),
    OrderBy { key: Expr, direction: OrderDirection },
    ThenBy { key: Expr, direction: OrderDirection },
    Skip(PageBound),
    Take(PageBound),

    // never translatable
    Join,
    GroupBy,
    Distinct,
    Aggregate(String),
}

///
/// QueryTranslator
///
/// Accumulates a `QueryModel` for one entity. Each step consumes the
/// translator and returns the extended one, or `None` when the step (and
/// therefore the remainder of the pipeline) has no remote equivalent.
///

#[derive(Clone, Debug)]
pub struct QueryTranslator<'m> {
    model: &'m EntityModel,
    query: QueryModel,
    projection: Option<CompiledProjection>,
}

impl<'m> QueryTranslator<'m> {
    #[must_use]
    pub fn new(model: &'m EntityModel) -> Self {
        Self {
            model,
            query: QueryModel::new(model.table.clone()),
            projection: None,
        }
    }

    #[must_use]
    pub const fn query(&self) -> &QueryModel {
        &self.query
    }

    /// Fold one operator into the model.
    #[must_use]
    pub fn apply(self, op: QueryOperator) -> Option<Self> {
        let table = self.model.table.clone();

        match self.try_apply(op) {
            Ok(next) => Some(next),
            Err(reason) => {
                let reason = reason.to_string();
                tracing::debug!(table = %table, reason = %reason, "query falls back to client evaluation");
                sink::record(MetricsEvent::TranslationFallback {
                    table: &table,
                    reason: &reason,
                });
                None
            }
        }
    }

    ///
    /// OPERATORS
    ///

    #[must_use]
    pub fn filter(self, predicate: Expr) -> Option<Self> {
        self.apply(QueryOperator::Filter(predicate))
    }

    #[must_use]
    pub fn select(self, projection: Projection) -> Option<Self> {
        self.apply(QueryOperator::Select(projection))
    }

    #[must_use]
    pub fn order_by(self, key: Expr, direction: OrderDirection) -> Option<Self> {
        self.apply(QueryOperator::OrderBy { key, direction })
    }

    #[must_use]
    pub fn then_by(self, key: Expr, direction: OrderDirection) -> Option<Self> {
        self.apply(QueryOperator::ThenBy { key, direction })
    }

    #[must_use]
    pub fn skip(self, count: PageBound) -> Option<Self> {
        self.apply(QueryOperator::Skip(count))
    }

    #[must_use]
    pub fn take(self, count: PageBound) -> Option<Self> {
        self.apply(QueryOperator::Take(count))
    }

    /// Finish translation. Without a `Select` the whole entity is shaped.
    #[must_use]
    pub fn compile(self) -> CompiledQuery<'m> {
        let projection = self
            .projection
            .unwrap_or_else(|| CompiledProjection::entity(self.model));
        let mut query = self.query;
        query.select.clone_from(&projection.columns);

        CompiledQuery {
            model: self.model,
            query,
            projection,
        }
    }

    fn try_apply(mut self, op: QueryOperator) -> Result<Self, Untranslatable> {
        match op {
            QueryOperator::Filter(predicate) => {
                self.require_unshaped()?;
                self.require_unpaged()?;
                let set = analyze(self.model, &predicate)?;
                self.query.push_filters(set);
            }
            QueryOperator::Select(projection) => {
                self.require_unshaped()?;
                self.projection = Some(compile(self.model, &projection)?);
            }
            QueryOperator::OrderBy { key, direction } => {
                self.require_unshaped()?;
                self.require_unpaged()?;
                let column = self.order_column(&key)?;
                self.query.order_by(column, direction);
            }
            QueryOperator::ThenBy { key, direction } => {
                self.require_unshaped()?;
                self.require_unpaged()?;
                if self.query.order.is_empty() {
                    return Err(Untranslatable::Sequence("then_by needs a preceding order_by"));
                }
                let column = self.order_column(&key)?;
                self.query.then_by(column, direction);
            }
            QueryOperator::Skip(count) => self.apply_skip(count)?,
            QueryOperator::Take(count) => self.apply_take(count)?,
            QueryOperator::Join => return Err(Untranslatable::Operator("join")),
            QueryOperator::GroupBy => return Err(Untranslatable::Operator("group_by")),
            QueryOperator::Distinct => return Err(Untranslatable::Operator("distinct")),
            QueryOperator::Aggregate(_) => return Err(Untranslatable::Operator("aggregate")),
        }

        Ok(self)
    }

    // skip after skip adds up; skip after take narrows the window
    fn apply_skip(&mut self, count: PageBound) -> Result<(), Untranslatable> {
        match (&self.query.limit, &count) {
            (None, _) => {}
            (Some(PageBound::Literal(limit)), PageBound::Literal(skipped)) => {
                let narrowed = limit.saturating_sub(*skipped);
                self.query.limit = Some(PageBound::Literal(narrowed));
            }
            _ => return Err(Untranslatable::Sequence("skip after take needs literal counts")),
        }

        let offset = match (self.query.offset.take(), count) {
            (None, count) => count,
            (Some(PageBound::Literal(a)), PageBound::Literal(b)) => {
                PageBound::Literal(a.saturating_add(b))
            }
            _ => return Err(Untranslatable::Sequence("repeated skip needs literal counts")),
        };

        self.query.offset = Some(offset);
        Ok(())
    }

    fn apply_take(&mut self, count: PageBound) -> Result<(), Untranslatable> {
        let limit = match (self.query.limit.take(), count) {
            (None, count) => count,
            (Some(PageBound::Literal(a)), PageBound::Literal(b)) => PageBound::Literal(a.min(b)),
            _ => return Err(Untranslatable::Sequence("repeated take needs literal counts")),
        };

        self.query.limit = Some(limit);
        Ok(())
    }

    fn order_column(&self, key: &Expr) -> Result<String, Untranslatable> {
        let Expr::Column(property) = key.unwrap_convert() else {
            return Err(Untranslatable::Node("computed ordering key"));
        };

        self.model
            .column_for(property)
            .map(ToString::to_string)
            .ok_or_else(|| Untranslatable::UnknownProperty(property.clone()))
    }

    const fn require_unshaped(&self) -> Result<(), Untranslatable> {
        if self.projection.is_some() {
            return Err(Untranslatable::Sequence("operator follows select"));
        }
        Ok(())
    }

    const fn require_unpaged(&self) -> Result<(), Untranslatable> {
        if self.query.offset.is_some() || self.query.limit.is_some() {
            return Err(Untranslatable::Sequence("operator follows skip or take"));
        }
        Ok(())
    }
}

///
/// CompiledQuery
/// Immutable product of translation; every enumeration builds a fresh request.
///

#[derive(Clone, Debug)]
pub struct CompiledQuery<'m> {
    pub model: &'m EntityModel,
    pub query: QueryModel,
    pub projection: CompiledProjection,
}

impl CompiledQuery<'_> {
    /// Query string with deferred values resolved from `params`.
    pub fn query_string(&self, params: &Params) -> Result<QueryString, InternalError> {
        QueryString::build(&self.query, params)
    }

    /// The GET request for one enumeration.
    pub fn request(&self, config: &RequestConfig, params: &Params) -> Result<HttpRequest, InternalError> {
        let query = self.query_string(params)?;

        Ok(HttpRequest {
            method: Method::Get,
            url: request_url(&config.base_url, &self.query.table, &query)?,
            headers: config.read_headers(),
            body: None,
        })
    }

    pub fn shape(&self, row: &Row, params: &Params) -> Result<Shaped, InternalError> {
        self.projection.shaper.shape(row, params)
    }
}
