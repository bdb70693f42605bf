use crate::value::Value;
use std::ops::{BitAnd, BitOr, Not};

///
/// Expression trees
///
/// Host-independent shapes of the predicate and projection lambdas the ORM
/// hands over. Both trees are closed: the analyzers match on these variants
/// and treat anything they do not recognize as untranslatable.
///

///
/// BinaryOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    // comparison
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,

    // logical
    And,
    Or,

    // arithmetic (never translatable)
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Gt | Self::Gte | Self::Lt | Self::Lte
        )
    }

    /// Operator to use when the operands swap sides.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Gt => Self::Lt,
            Self::Gte => Self::Lte,
            Self::Lt => Self::Gt,
            Self::Lte => Self::Gte,
            other => other,
        }
    }
}

///
/// Method
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Method {
    Contains,
    StartsWith,
    EndsWith,
    /// Pattern match with the caller's own `*` wildcards.
    Like,
    /// Case-insensitive `Like`.
    ILike,
    Other(String),
}

///
/// Expr
///
/// Boolean predicate over the single query subject.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Direct member access on the query subject, by property name.
    Column(String),
    /// Member access on anything other than the subject (navigations).
    Member { target: Box<Self>, member: String },
    Constant(Value),
    /// Deferred parameter resolved from the parameter bag at request time.
    Param(String),
    /// Type conversion inserted by the host compiler; transparent here.
    Convert(Box<Self>),
    Binary {
        op: BinaryOp,
        left: Box<Self>,
        right: Box<Self>,
    },
    Not(Box<Self>),
    /// Method call; `target` is `None` for static calls.
    Call {
        method: Method,
        target: Option<Box<Self>>,
        args: Vec<Self>,
    },
}

impl Expr {
    ///
    /// LEAVES
    ///

    pub fn column(property: impl Into<String>) -> Self {
        Self::Column(property.into())
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    pub fn param(name: impl Into<String>) -> Self {
        Self::Param(name.into())
    }

    #[must_use]
    pub fn member(self, member: impl Into<String>) -> Self {
        Self::Member {
            target: Box::new(self),
            member: member.into(),
        }
    }

    #[must_use]
    pub fn convert(self) -> Self {
        Self::Convert(Box::new(self))
    }

    ///
    /// BINARY
    ///

    #[must_use]
    pub fn binary(self, op: BinaryOp, rhs: Self) -> Self {
        Self::Binary {
            op,
            left: Box::new(self),
            right: Box::new(rhs),
        }
    }

    #[must_use]
    pub fn eq(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Eq, rhs.into())
    }

    #[must_use]
    pub fn ne(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Ne, rhs.into())
    }

    #[must_use]
    pub fn gt(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Gt, rhs.into())
    }

    #[must_use]
    pub fn gte(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Gte, rhs.into())
    }

    #[must_use]
    pub fn lt(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Lt, rhs.into())
    }

    #[must_use]
    pub fn lte(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Lte, rhs.into())
    }

    #[must_use]
    pub fn and(self, rhs: Self) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    #[must_use]
    pub fn or(self, rhs: Self) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }

    ///
    /// CALLS
    ///

    #[must_use]
    pub fn call(self, method: Method, args: Vec<Self>) -> Self {
        Self::Call {
            method,
            target: Some(Box::new(self)),
            args,
        }
    }

    #[must_use]
    pub fn static_call(method: Method, args: Vec<Self>) -> Self {
        Self::Call {
            method,
            target: None,
            args,
        }
    }

    /// `target.Contains(arg)`: substring match on a column, or membership
    /// when `target` is a list.
    #[must_use]
    pub fn contains(self, arg: impl Into<Self>) -> Self {
        self.call(Method::Contains, vec![arg.into()])
    }

    #[must_use]
    pub fn starts_with(self, arg: impl Into<Self>) -> Self {
        self.call(Method::StartsWith, vec![arg.into()])
    }

    #[must_use]
    pub fn ends_with(self, arg: impl Into<Self>) -> Self {
        self.call(Method::EndsWith, vec![arg.into()])
    }

    #[must_use]
    pub fn like(self, pattern: impl Into<Self>) -> Self {
        Self::static_call(Method::Like, vec![self, pattern.into()])
    }

    #[must_use]
    pub fn ilike(self, pattern: impl Into<Self>) -> Self {
        Self::static_call(Method::ILike, vec![self, pattern.into()])
    }

    /// Strip host conversion wrappers.
    #[must_use]
    pub fn unwrap_convert(&self) -> &Self {
        let mut expr = self;
        while let Self::Convert(inner) = expr {
            expr = inner;
        }
        expr
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Constant(value)
    }
}

impl Not for Expr {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::Not(Box::new(self))
    }
}

impl BitAnd for Expr {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl BitOr for Expr {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

///
/// Projection
///
/// Output shape of a `Select`, built only from construction nodes and
/// subject member access.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    /// The whole subject entity.
    Subject,
    Column(String),
    Constant(Value),
    /// Value taken from the parameter bag when the row is shaped.
    Param(String),
    Tuple(Vec<Self>),
    /// Anonymous object or member-initialized DTO.
    Record {
        type_name: Option<String>,
        fields: Vec<(String, Self)>,
    },
    /// DTO built through a positional constructor.
    Construct { type_name: String, args: Vec<Self> },
}

impl Projection {
    pub fn column(property: impl Into<String>) -> Self {
        Self::Column(property.into())
    }

    /// Anonymous object whose members are plain subject columns.
    #[must_use]
    pub fn record_of(properties: &[&str]) -> Self {
        Self::Record {
            type_name: None,
            fields: properties
                .iter()
                .map(|property| ((*property).to_string(), Self::column(*property)))
                .collect(),
        }
    }
}
