use crate::{db::query::expr::BinaryOp, value::Value};

///
/// FilterOp
/// Wire operators of the query-string grammar.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    Is,
    In,
}

impl FilterOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::ILike => "ilike",
            Self::Is => "is",
            Self::In => "in",
        }
    }

    /// Wire operator for a comparison node; `None` for non-comparisons.
    #[must_use]
    pub const fn from_comparison(op: BinaryOp) -> Option<Self> {
        match op {
            BinaryOp::Eq => Some(Self::Eq),
            BinaryOp::Ne => Some(Self::Neq),
            BinaryOp::Gt => Some(Self::Gt),
            BinaryOp::Gte => Some(Self::Gte),
            BinaryOp::Lt => Some(Self::Lt),
            BinaryOp::Lte => Some(Self::Lte),
            _ => None,
        }
    }
}

///
/// Operand
/// A filter value is either known now or named for later; never both.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Literal(Value),
    Param(String),
}

///
/// Filter
///

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub negate: bool,
    pub operand: Operand,
}

impl Filter {
    pub fn new(column: impl Into<String>, op: FilterOp, operand: Operand) -> Self {
        Self {
            column: column.into(),
            op,
            negate: false,
            operand,
        }
    }

    #[must_use]
    pub const fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }
}

///
/// FilterSet
/// Output of predicate analysis: ANDed filters plus independent OR-groups.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSet {
    pub filters: Vec<Filter>,
    pub or_groups: Vec<Vec<Filter>>,
}

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

///
/// OrderClause
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderClause {
    pub column: String,
    pub direction: OrderDirection,
}

///
/// PageBound
/// Offset or limit, literal or resolved from the parameter bag per request.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PageBound {
    Literal(u64),
    Param(String),
}

///
/// QueryModel
///
/// Fully translated read query. Built by `QueryTranslator`, read-only once
/// compiled; parameters are resolved against it on every request.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryModel {
    pub table: String,
    pub filters: Vec<Filter>,
    pub or_groups: Vec<Vec<Filter>>,
    /// Ordered, duplicate-free column list; empty selects every column.
    pub select: Vec<String>,
    pub order: Vec<OrderClause>,
    pub offset: Option<PageBound>,
    pub limit: Option<PageBound>,
}

impl QueryModel {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// AND a translated predicate into the model.
    pub(crate) fn push_filters(&mut self, set: FilterSet) {
        self.filters.extend(set.filters);
        self.or_groups.extend(set.or_groups);
    }

    /// Replace the whole ordering with a single clause.
    pub(crate) fn order_by(&mut self, column: String, direction: OrderDirection) {
        self.order = vec![OrderClause { column, direction }];
    }

    /// Append a secondary ordering clause.
    pub(crate) fn then_by(&mut self, column: String, direction: OrderDirection) {
        self.order.push(OrderClause { column, direction });
    }
}
