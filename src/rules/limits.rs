use super::{Rewrite, Rule};
use crate::ast::{ClauseKind, Query};
use crate::config::Context;
use crate::error::QueryResult;

/// Caps an open-ended `SELECT * FROM t` at `Context::auto_limit` rows, in
/// the context dialect.
pub struct AutoLimit;

impl Rewrite for AutoLimit {
    fn rule(&self) -> Rule {
        Rule::AutoLimit
    }

    fn apply(&self, query: &mut Query, ctx: &Context) -> QueryResult<bool> {
        let open = query.is_empty(ClauseKind::Select)
            && query.is_empty(ClauseKind::Where)
            && query.is_empty(ClauseKind::Limit);
        if !open {
            return Ok(false);
        }
        query.limit(ctx.auto_limit, 0, ctx.dialect);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::{Dialect, ToSql};

    #[test]
    fn test_auto_limit_per_dialect() {
        let ctx = Context::default();
        let mut q = Query::from_table("Movie m", &ctx);
        assert!(AutoLimit.apply(&mut q, &ctx).unwrap());
        assert_eq!(q.to_sql(), "SELECT * FROM Movie m LIMIT 100");
        assert!(!AutoLimit.apply(&mut q, &ctx).unwrap());

        let ctx = Context::builder().dialect(Dialect::SqlServer).build();
        let mut q = Query::from_table("Movie m", &ctx);
        AutoLimit.apply(&mut q, &ctx).unwrap();
        assert!(!AutoLimit.apply(&mut q, &ctx).unwrap());
        assert_eq!(q.clause(ClauseKind::Select).len(), 1);
    }

    #[test]
    fn test_filtered_query_is_left_alone() {
        let ctx = Context::default();
        let mut q = Query::from_table("Movie m", &ctx);
        q.add_clause(ClauseKind::Select, q.qualify("title"));
        assert!(!AutoLimit.apply(&mut q, &ctx).unwrap());
        assert!(q.is_empty(ClauseKind::Limit));
    }
}
