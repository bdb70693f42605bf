
use crate::{
    db::query::{
        expr::Expr,
        plan::{Filter, FilterOp, FilterSet, Operand},
        predicate::{Untranslatable, analyze},
    },
    test_fixtures::person_model,
    value::Value,
};

fn translate(predicate: &Expr) -> FilterSet {
    analyze(&person_model(), predicate).expect("predicate should translate")
}

fn reject(predicate: &Expr) -> Untranslatable {
    analyze(&person_model(), predicate).expect_err("predicate should not translate")
}

fn literal(column: &str, op: FilterOp, value: impl Into<Value>) -> Filter {
    Filter::new(column, op, Operand::Literal(value.into()))
}
