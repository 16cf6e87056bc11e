//! ORDER BY, GROUP BY and HAVING builders.

use super::{Block, Where};
use crate::ast::{ClauseKind, Expr, Func, FunctionCall, Query, SortType};
use crate::config::Context;
use crate::error::{QueryError, QueryResult};

/// Sort on the bound field. Without an explicit direction the context's
/// default sort applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderBy {
    sort: Option<SortType>,
}

impl OrderBy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc() -> Self {
        Self {
            sort: Some(SortType::Asc),
        }
    }

    pub fn desc() -> Self {
        Self {
            sort: Some(SortType::Desc),
        }
    }
}

impl Block for OrderBy {
    fn add(&self, name: &str, query: &mut Query, ctx: &mut Context) -> QueryResult<()> {
        let order = self.sort.unwrap_or(ctx.sort);
        let fragment = Expr::sorted(query.qualify(name), order);
        query.add_clause(ClauseKind::OrderBy, fragment);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupBy;

impl Block for GroupBy {
    fn add(&self, name: &str, query: &mut Query, _ctx: &mut Context) -> QueryResult<()> {
        query.add_clause(ClauseKind::GroupBy, query.qualify(name));
        Ok(())
    }
}

/// `HAVING func(field) <condition>` attached to the most recent GROUP BY
/// entry. With several GROUP BY fields only the last one can carry it.
#[derive(Debug, Clone)]
pub struct Having {
    func: Func,
    condition: Where,
}

impl Having {
    pub fn new(func: Func, condition: Where) -> Self {
        Self { func, condition }
    }

    pub fn avg(condition: Where) -> Self {
        Self::new(Func::Avg, condition)
    }

    pub fn min(condition: Where) -> Self {
        Self::new(Func::Min, condition)
    }

    pub fn max(condition: Where) -> Self {
        Self::new(Func::Max, condition)
    }

    pub fn sum(condition: Where) -> Self {
        Self::new(Func::Sum, condition)
    }

    pub fn count(condition: Where) -> Self {
        Self::new(Func::Count, condition)
    }
}

impl Block for Having {
    fn add(&self, name: &str, query: &mut Query, _ctx: &mut Context) -> QueryResult<()> {
        let call = Expr::function(FunctionCall::new(self.func, vec![query.qualify(name)]));
        let condition = self.condition.apply_to(call, query)?;
        let Some(last) = query.clause_mut(ClauseKind::GroupBy).last_mut() else {
            return Err(QueryError::config(format!(
                "HAVING on {name} needs a GROUP BY field first"
            )));
        };
        match last {
            Expr::Having { conditions, .. } => conditions.push(condition),
            group => {
                *group = Expr::Having {
                    group: Box::new(group.clone()),
                    conditions: vec![condition],
                }
            }
        }
        Ok(())
    }
}
