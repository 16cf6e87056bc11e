use chrono::NaiveDate;

use super::{Rewrite, Rule};
use crate::ast::{ClauseKind, Expr, Func, Operator, Query, Value};
use crate::config::Context;
use crate::error::QueryResult;

/// `YEAR(f) = 2020` becomes `f >= '2020-01-01' AND f <= '2020-12-31'`, so
/// an index on `f` stays usable. Ordered comparisons map to one bound.
pub struct YearRange;

impl Rewrite for YearRange {
    fn rule(&self) -> Rule {
        Rule::YearRange
    }

    fn apply(&self, query: &mut Query, _ctx: &Context) -> QueryResult<bool> {
        let conditions = query.clause_mut(ClauseKind::Where);
        let mut changed = false;
        let mut rewritten = Vec::with_capacity(conditions.len());
        for condition in conditions.drain(..) {
            match year_bounds(&condition) {
                Some(bounds) => {
                    changed = true;
                    rewritten.extend(bounds);
                }
                None => rewritten.push(condition),
            }
        }
        *conditions = rewritten;
        Ok(changed)
    }
}

fn year_bounds(condition: &Expr) -> Option<Vec<Expr>> {
    let Expr::Compare {
        left,
        op,
        right: Some(right),
    } = condition
    else {
        return None;
    };
    let Expr::Function(call) = left.as_ref() else {
        return None;
    };
    if call.func != Func::Year || call.frame.is_some() {
        return None;
    }
    let field = call.args.first()?.clone();
    let year = match right.as_ref() {
        Expr::Literal(Value::Int(n)) => i32::try_from(*n).ok()?,
        Expr::Literal(Value::String(s)) => s.trim().parse().ok()?,
        _ => return None,
    };
    let first = date(year, 1, 1)?;
    let last = date(year, 12, 31)?;
    let bound = |op: Operator, day: &str| Expr::compare(field.clone(), op, Expr::literal(day));
    let bounds = match op {
        Operator::Eq => vec![bound(Operator::Gte, &first), bound(Operator::Lte, &last)],
        Operator::Gt => vec![bound(Operator::Gt, &last)],
        Operator::Gte => vec![bound(Operator::Gte, &first)],
        Operator::Lt => vec![bound(Operator::Lt, &first)],
        Operator::Lte => vec![bound(Operator::Lte, &last)],
        _ => return None,
    };
    Some(bounds)
}

fn date(year: i32, month: u32, day: u32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FunctionCall;

    fn year_of(field: &str) -> Expr {
        Expr::function(FunctionCall::new(Func::Year, vec![Expr::qualified("m", field)]))
    }

    fn wheres(query: &Query) -> Vec<String> {
        query.clause(ClauseKind::Where).iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_year_equality_becomes_range() {
        let ctx = Context::default();
        let mut q = Query::from_table("Movie m", &ctx);
        q.add_clause(
            ClauseKind::Where,
            Expr::compare(year_of("release_date"), Operator::Eq, Expr::literal(2010)),
        );
        assert!(YearRange.apply(&mut q, &ctx).unwrap());
        assert_eq!(
            wheres(&q),
            vec!["m.release_date >= '2010-01-01'", "m.release_date <= '2010-12-31'"]
        );
        assert!(!YearRange.apply(&mut q, &ctx).unwrap());
    }

    #[test]
    fn test_year_ordering_and_bad_years() {
        let ctx = Context::default();
        let mut q = Query::from_table("Movie m", &ctx);
        q.add_clause(
            ClauseKind::Where,
            Expr::compare(year_of("released"), Operator::Gt, Expr::literal("1999")),
        );
        // out of range for a calendar date: kept as written
        q.add_clause(
            ClauseKind::Where,
            Expr::compare(year_of("released"), Operator::Eq, Expr::literal(i64::MAX)),
        );
        assert!(YearRange.apply(&mut q, &ctx).unwrap());
        let rendered = wheres(&q);
        assert_eq!(rendered[0], "m.released > '1999-12-31'");
        assert_eq!(rendered.len(), 2);
    }
}
