use super::{Rewrite, Rule};
use crate::ast::{ClauseKind, Expr, LogicalOp, Operator, Query, Value};
use crate::config::Context;
use crate::error::QueryResult;

/// `status = 'A' OR status = 'B'` becomes `status IN ('A','B')`.
pub struct FoldOr;

impl Rewrite for FoldOr {
    fn rule(&self) -> Rule {
        Rule::FoldOr
    }

    fn apply(&self, query: &mut Query, _ctx: &Context) -> QueryResult<bool> {
        let mut changed = false;
        for fragment in query.clause_mut(ClauseKind::Where).iter_mut() {
            if let Some(folded) = fold(fragment) {
                *fragment = folded;
                changed = true;
            }
        }
        Ok(changed)
    }
}

/// Collect the values of an OR group whose branches all test one column.
fn fold(expr: &Expr) -> Option<Expr> {
    let Expr::Group {
        op: LogicalOp::Or,
        items,
    } = expr
    else {
        return None;
    };
    let mut column: Option<&Expr> = None;
    let mut values: Vec<Value> = Vec::new();
    for item in items {
        let Expr::Compare {
            left,
            op,
            right: Some(right),
        } = item
        else {
            return None;
        };
        let found = match (op, right.as_ref()) {
            (Operator::Eq, Expr::Literal(value)) => vec![value.clone()],
            (Operator::In, Expr::List(list)) => list.clone(),
            _ => return None,
        };
        if !matches!(left.as_ref(), Expr::Column { .. }) {
            return None;
        }
        match column {
            Some(existing) if existing != left.as_ref() => return None,
            _ => column = Some(left),
        }
        for value in found {
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }
    let column = column?.clone();
    Some(Expr::compare(column, Operator::In, Expr::List(values)))
}

/// `NOT field op value` becomes `field inverse-op value`.
pub struct InvertNot;

impl Rewrite for InvertNot {
    fn rule(&self) -> Rule {
        Rule::InvertNot
    }

    fn apply(&self, query: &mut Query, _ctx: &Context) -> QueryResult<bool> {
        let mut changed = false;
        for fragment in query.clause_mut(ClauseKind::Where).iter_mut() {
            changed |= invert(fragment);
        }
        Ok(changed)
    }
}

fn invert(expr: &mut Expr) -> bool {
    match expr {
        Expr::Not(inner) => match inner.as_ref() {
            Expr::Compare { left, op, right } => {
                *expr = Expr::Compare {
                    left: left.clone(),
                    op: op.inverse(),
                    right: right.clone(),
                };
                true
            }
            Expr::Not(twice) => {
                *expr = (**twice).clone();
                invert(expr);
                true
            }
            _ => false,
        },
        Expr::Group { items, .. } => items.iter_mut().fold(false, |changed, item| invert(item) | changed),
        _ => false,
    }
}
