use super::{Block, Where};
use crate::ast::{ClauseKind, Expr, Query, Value};
use crate::config::Context;
use crate::error::QueryResult;

/// `CASE WHEN ... THEN ... [ELSE ...] END AS <bound name>` over one field.
#[derive(Debug, Clone)]
pub struct Case {
    field: String,
    branches: Vec<(Where, Value)>,
    default: Option<Value>,
}

impl Case {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            branches: Vec::new(),
            default: None,
        }
    }

    pub fn when(mut self, condition: Where, result: impl Into<Value>) -> Self {
        self.branches.push((condition, result.into()));
        self
    }

    pub fn otherwise(mut self, result: impl Into<Value>) -> Self {
        self.default = Some(result.into());
        self
    }
}

impl Block for Case {
    fn add(&self, name: &str, query: &mut Query, _ctx: &mut Context) -> QueryResult<()> {
        let branches = self
            .branches
            .iter()
            .map(|(cond, result)| {
                Ok((
                    cond.to_expr(&self.field, query)?,
                    Expr::Literal(result.clone()),
                ))
            })
            .collect::<QueryResult<Vec<_>>>()?;
        let case = Expr::Case {
            branches,
            default: self.default.clone().map(|d| Box::new(Expr::Literal(d))),
        };
        query.add_clause(ClauseKind::Select, Expr::aliased(case, name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::Select;
    use crate::transpiler::ToSql;

    #[test]
    fn test_case_when() {
        let mut ctx = Context::default();
        let q = Select::from("Person p")
            .bind(
                "age_group",
                Case::new("age")
                    .when(Where::lt(18), "minor")
                    .when(Where::gte(65), "senior")
                    .otherwise("adult"),
            )
            .build(&mut ctx)
            .unwrap();
        assert_eq!(
            q.to_sql(),
            "SELECT CASE WHEN p.age < 18 THEN 'minor' WHEN p.age >= 65 THEN 'senior' ELSE 'adult' END AS age_group FROM Person p"
        );
    }
}
