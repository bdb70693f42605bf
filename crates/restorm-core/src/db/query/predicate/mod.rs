//! Predicate analysis: boolean expression tree → filter primitives.
//!
//! Failure here is an expected outcome. It tells the host to evaluate the
//! predicate client-side, so the reason travels as `Untranslatable` and the
//! translator turns it into `None`.

#[cfg(test)]
mod tests;

use crate::{
    db::query::{
        expr::{BinaryOp, Expr, Method},
        plan::{Filter, FilterOp, FilterSet, Operand},
    },
    model::{EntityModel, FieldKind},
    value::Value,
};
use thiserror::Error as ThisError;

///
/// Untranslatable
/// Why a predicate has no remote equivalent.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum Untranslatable {
    #[error("property '{0}' is not mapped on this entity")]
    UnknownProperty(String),

    #[error("comparison needs one subject column and one constant or parameter")]
    ComparisonShape,

    #[error("null can only be compared with == or !=")]
    NullOrdering,

    #[error("negation must wrap exactly one filter")]
    CompoundNegation,

    #[error("or-branches must be single filters")]
    CompoundBranch,

    #[error("method '{0}' has no remote equivalent")]
    Method(String),

    #[error("'{0}' is not a boolean column")]
    NotBoolean(String),

    #[error("{0} expressions are not translatable")]
    Node(&'static str),

    #[error("{0} has no remote equivalent")]
    Operator(&'static str),

    #[error("{0}")]
    Sequence(&'static str),
}

/// Translate a predicate into ANDed filters and OR-groups.
pub fn analyze(model: &EntityModel, predicate: &Expr) -> Result<FilterSet, Untranslatable> {
    let analyzer = Analyzer { model };
    let mut set = FilterSet::default();
    analyzer.conjunct(predicate, &mut set)?;

    Ok(set)
}

///
/// Analyzer
///

struct Analyzer<'m> {
    model: &'m EntityModel,
}

impl Analyzer<'_> {
    // AND nodes flatten left-to-right; OR nodes become one group each.
    fn conjunct(&self, expr: &Expr, out: &mut FilterSet) -> Result<(), Untranslatable> {
        match expr.unwrap_convert() {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                self.conjunct(left, out)?;
                self.conjunct(right, out)
            }
            or @ Expr::Binary {
                op: BinaryOp::Or, ..
            } => {
                let mut group = Vec::new();
                self.disjunct(or, &mut group)?;
                out.or_groups.push(group);
                Ok(())
            }
            other => {
                out.filters.push(self.single(other)?);
                Ok(())
            }
        }
    }

    fn disjunct(&self, expr: &Expr, group: &mut Vec<Filter>) -> Result<(), Untranslatable> {
        match expr.unwrap_convert() {
            Expr::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                self.disjunct(left, group)?;
                self.disjunct(right, group)
            }
            other => {
                group.push(self.single(other)?);
                Ok(())
            }
        }
    }

    // One expression that must map onto exactly one filter primitive.
    fn single(&self, expr: &Expr) -> Result<Filter, Untranslatable> {
        match expr.unwrap_convert() {
            Expr::Not(inner) => self.negate(inner),
            Expr::Binary { op, left, right } if op.is_comparison() => {
                self.comparison(*op, left, right)
            }
            Expr::Binary {
                op: BinaryOp::And | BinaryOp::Or,
                ..
            } => Err(Untranslatable::CompoundBranch),
            Expr::Binary { .. } => Err(Untranslatable::Node("arithmetic")),
            Expr::Call {
                method,
                target,
                args,
            } => self.call(method, target.as_deref(), args),
            Expr::Column(property) => self.bool_check(property),
            Expr::Member { .. } => Err(Untranslatable::Node("navigation")),
            Expr::Constant(_) => Err(Untranslatable::Node("constant")),
            Expr::Param(_) => Err(Untranslatable::Node("parameter")),
            Expr::Convert(inner) => self.single(inner),
        }
    }

    fn negate(&self, inner: &Expr) -> Result<Filter, Untranslatable> {
        let filter = self.single(inner).map_err(|err| match err {
            Untranslatable::CompoundBranch => Untranslatable::CompoundNegation,
            other => other,
        })?;

        // boolean checks flip is.true <-> is.false instead of gaining not.
        if filter.op == FilterOp::Is
            && let Operand::Literal(Value::Bool(flag)) = filter.operand
        {
            return Ok(Filter {
                operand: Operand::Literal(Value::Bool(!flag)),
                ..filter
            });
        }

        Ok(filter.negated())
    }

    fn comparison(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Filter, Untranslatable> {
        let (left, right) = (left.unwrap_convert(), right.unwrap_convert());
        let (property, value, op) = match (left, right) {
            (Expr::Column(_), Expr::Column(_)) => return Err(Untranslatable::ComparisonShape),
            (Expr::Column(property), value) => (property, value, op),
            (value, Expr::Column(property)) => (property, value, op.reversed()),
            _ => return Err(Untranslatable::ComparisonShape),
        };

        let column = self.column(property)?;
        let operand = scalar_operand(value)?;
        let Some(wire_op) = FilterOp::from_comparison(op) else {
            return Err(Untranslatable::ComparisonShape);
        };

        let is_null = matches!(operand, Operand::Literal(Value::Null));
        match (wire_op, is_null) {
            (FilterOp::Eq, true) => Ok(Filter::new(column, FilterOp::Is, operand)),
            (FilterOp::Neq, true) => Ok(Filter::new(column, FilterOp::Is, operand).negated()),
            (_, true) => Err(Untranslatable::NullOrdering),
            (_, false) => Ok(Filter::new(column, wire_op, operand)),
        }
    }

    fn call(
        &self,
        method: &Method,
        target: Option<&Expr>,
        args: &[Expr],
    ) -> Result<Filter, Untranslatable> {
        let target = target.map(Expr::unwrap_convert);

        match (method, target, args) {
            // string methods on a subject column
            (
                Method::Contains | Method::StartsWith | Method::EndsWith,
                Some(Expr::Column(property)),
                [arg],
            ) => {
                let column = self.column(property)?;
                let operand = match arg.unwrap_convert() {
                    Expr::Constant(Value::Text(text)) => {
                        Operand::Literal(Value::Text(wrap_pattern(method, text)))
                    }
                    // the caller supplies its own wildcards for deferred values
                    Expr::Param(name) => Operand::Param(name.clone()),
                    _ => return Err(Untranslatable::Method(method_name(method))),
                };
                Ok(Filter::new(column, FilterOp::Like, operand))
            }

            // list.Contains(column)
            (Method::Contains, Some(list), [item]) => self.membership(list, item),

            // Contains(list, column)
            (Method::Contains, None, [list, item]) => self.membership(list, item),

            (Method::Like | Method::ILike, None, [subject, pattern]) => {
                let Expr::Column(property) = subject.unwrap_convert() else {
                    return Err(Untranslatable::Method(method_name(method)));
                };
                let column = self.column(property)?;
                let operand = match pattern.unwrap_convert() {
                    Expr::Constant(Value::Text(text)) => Operand::Literal(Value::Text(text.clone())),
                    Expr::Param(name) => Operand::Param(name.clone()),
                    _ => return Err(Untranslatable::Method(method_name(method))),
                };
                let op = if matches!(method, Method::ILike) {
                    FilterOp::ILike
                } else {
                    FilterOp::Like
                };
                Ok(Filter::new(column, op, operand))
            }

            _ => Err(Untranslatable::Method(method_name(method))),
        }
    }

    fn membership(&self, list: &Expr, item: &Expr) -> Result<Filter, Untranslatable> {
        let Expr::Column(property) = item.unwrap_convert() else {
            return Err(Untranslatable::Method("Contains".to_string()));
        };
        let column = self.column(property)?;
        let operand = match list.unwrap_convert() {
            Expr::Constant(list @ Value::List(_)) => Operand::Literal(list.clone()),
            Expr::Param(name) => Operand::Param(name.clone()),
            _ => return Err(Untranslatable::Method("Contains".to_string())),
        };

        Ok(Filter::new(column, FilterOp::In, operand))
    }

    fn bool_check(&self, property: &str) -> Result<Filter, Untranslatable> {
        let field = self
            .model
            .find_field(property)
            .ok_or_else(|| Untranslatable::UnknownProperty(property.to_string()))?;
        if field.kind != FieldKind::Bool {
            return Err(Untranslatable::NotBoolean(property.to_string()));
        }

        Ok(Filter::new(
            field.column.clone(),
            FilterOp::Is,
            Operand::Literal(Value::Bool(true)),
        ))
    }

    fn column(&self, property: &str) -> Result<String, Untranslatable> {
        self.model
            .column_for(property)
            .map(ToString::to_string)
            .ok_or_else(|| Untranslatable::UnknownProperty(property.to_string()))
    }
}

// Constant or parameter on the value side of a comparison.
fn scalar_operand(expr: &Expr) -> Result<Operand, Untranslatable> {
    match expr {
        Expr::Constant(Value::List(_)) => Err(Untranslatable::ComparisonShape),
        Expr::Constant(value) => Ok(Operand::Literal(value.clone())),
        Expr::Param(name) => Ok(Operand::Param(name.clone())),
        _ => Err(Untranslatable::ComparisonShape),
    }
}

fn wrap_pattern(method: &Method, text: &str) -> String {
    match method {
        Method::StartsWith => format!("{text}*"),
        Method::EndsWith => format!("*{text}"),
        _ => format!("*{text}*"),
    }
}

fn method_name(method: &Method) -> String {
    match method {
        Method::Contains => "Contains".to_string(),
        Method::StartsWith => "StartsWith".to_string(),
        Method::EndsWith => "EndsWith".to_string(),
        Method::Like => "Like".to_string(),
        Method::ILike => "ILike".to_string(),
        Method::Other(name) => name.clone(),
    }
}
