//! Query-string assembly for a translated `QueryModel`.
//!
//! Parameters are resolved here and nowhere else: every call to
//! `QueryString::build` reads the bag it is given, so two enumerations of
//! the same compiled query may produce different strings.

use crate::{
    db::query::plan::{Filter, FilterOp, Operand, PageBound, QueryModel},
    error::{ErrorOrigin, InternalError},
    value::{
        Value,
        codec::{format_item, format_list, format_value},
    },
};
use derive_more::Deref;
use std::{collections::BTreeMap, fmt};
use url::Url;

///
/// Params
/// Named runtime values for deferred filters and page bounds.
///

#[derive(Clone, Debug, Default, Deref, PartialEq)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    fn resolve(&self, name: &str) -> Result<&Value, InternalError> {
        self.0.get(name).ok_or_else(|| {
            InternalError::unsupported(
                ErrorOrigin::Query,
                format!("parameter '{name}' has no value"),
            )
        })
    }
}

///
/// QueryString
///
/// Ordered `key=value` pairs in wire order. Values are raw; percent-encoding
/// happens only when the pairs are attached to a request URL.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryString {
    pairs: Vec<(String, String)>,
}

impl QueryString {
    /// Serialize a query model, resolving deferred values from `params`.
    pub fn build(query: &QueryModel, params: &Params) -> Result<Self, InternalError> {
        let mut out = Self::default();

        if !query.select.is_empty() {
            out.push("select", query.select.join(","));
        }

        for filter in &query.filters {
            let segment = render_filter(filter, params, false)?;
            out.push(filter.column.clone(), segment);
        }

        for group in &query.or_groups {
            let branches = group
                .iter()
                .map(|filter| {
                    render_filter(filter, params, true)
                        .map(|segment| format!("{}.{segment}", filter.column))
                })
                .collect::<Result<Vec<_>, _>>()?;
            out.push("or", format!("({})", branches.join(",")));
        }

        if !query.order.is_empty() {
            let order = query
                .order
                .iter()
                .map(|clause| format!("{}.{}", clause.column, clause.direction.as_str()))
                .collect::<Vec<_>>();
            out.push("order", order.join(","));
        }

        if let Some(offset) = &query.offset {
            out.push("offset", resolve_bound(offset, params)?.to_string());
        }
        if let Some(limit) = &query.limit {
            out.push("limit", resolve_bound(limit, params)?.to_string());
        }

        Ok(out)
    }

    fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// First value recorded under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).next()
    }

    /// Every value recorded under `key`, in wire order.
    pub fn get_all<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for QueryString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// `{base}/{table}?{query}` with the query pairs percent-encoded.
pub fn request_url(base: &Url, table: &str, query: &QueryString) -> Result<Url, InternalError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| {
            InternalError::invalid_state(
                ErrorOrigin::Transport,
                format!("base url '{base}' cannot carry a path"),
            )
        })?
        .pop_if_empty()
        .push(table);

    url.set_query(None);
    if !query.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(query.pairs().iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    Ok(url)
}

// `[not.]op.value`; inside an or-group scalar values are delimiter-quoted.
fn render_filter(filter: &Filter, params: &Params, grouped: bool) -> Result<String, InternalError> {
    let value = match &filter.operand {
        Operand::Literal(value) => value,
        Operand::Param(name) => params.resolve(name)?,
    };

    let (op, negate) = match filter.op {
        FilterOp::Eq if value.is_null() => (FilterOp::Is, filter.negate),
        FilterOp::Neq if value.is_null() => (FilterOp::Is, !filter.negate),
        op => (op, filter.negate),
    };

    let text = match op {
        FilterOp::In => format_list(value),
        FilterOp::Is => match value {
            Value::Null | Value::Bool(_) => format_value(value),
            other => {
                return Err(InternalError::unsupported(
                    ErrorOrigin::Query,
                    format!("'is' accepts null or a boolean, got {other:?}"),
                ));
            }
        },
        _ if value.is_list() => {
            return Err(InternalError::unsupported(
                ErrorOrigin::Query,
                format!("column '{}' compared against a list", filter.column),
            ));
        }
        _ if grouped => format_item(value),
        _ => format_value(value),
    };

    let not = if negate { "not." } else { "" };
    Ok(format!("{not}{}.{text}", op.as_str()))
}

fn resolve_bound(bound: &PageBound, params: &Params) -> Result<u64, InternalError> {
    match bound {
        PageBound::Literal(n) => Ok(*n),
        PageBound::Param(name) => params.resolve(name)?.as_u64().ok_or_else(|| {
            InternalError::unsupported(
                ErrorOrigin::Query,
                format!("parameter '{name}' is not a non-negative integer"),
            )
        }),
    }
}

///
/// TESTS
///
