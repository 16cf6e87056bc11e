//! WHERE builders.

use std::cmp::Ordering;

use super::Block;
use crate::ast::{ClauseKind, Expr, LogicalOp, Operator, Query, Value};
use crate::config::Context;
use crate::error::{QueryError, QueryResult};

/// Position of the search text inside a LIKE pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `text%`
    Start,
    /// `%text%`
    Middle,
    /// `%text`
    End,
    /// Pattern given verbatim
    Pattern,
}

impl Anchor {
    pub fn pattern(&self, text: &str) -> String {
        match self {
            Anchor::Start => format!("{text}%"),
            Anchor::Middle => format!("%{text}%"),
            Anchor::End => format!("%{text}"),
            Anchor::Pattern => text.to_string(),
        }
    }
}

/// What a [`Where`] compares the bound field against.
#[derive(Debug, Clone)]
pub enum Condition {
    Compare { op: Operator, value: Value },
    /// Comparison with another field of the same query
    Field { op: Operator, field: String },
    Like { anchor: Anchor, text: String },
    IsNull,
    In(Vec<Value>),
    /// Raw text with `{alias}`, `{field}`, `{table}` and `%` placeholders
    Formula(String),
    /// `field IN (SELECT ...)`
    Subquery(Box<Query>),
    /// Correlated subquery folded into the owner's FROM and WHERE
    Join {
        query: Box<Query>,
        primary_key: Option<String>,
    },
}

/// Condition on the bound field.
#[derive(Debug, Clone)]
pub struct Where {
    condition: Condition,
    negated: bool,
}

impl Where {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            negated: false,
        }
    }

    fn compare(op: Operator, value: impl Into<Value>) -> Self {
        Self::new(Condition::Compare {
            op,
            value: value.into(),
        })
    }

    pub fn eq(value: impl Into<Value>) -> Self {
        Self::compare(Operator::Eq, value)
    }

    pub fn gt(value: impl Into<Value>) -> Self {
        Self::compare(Operator::Gt, value)
    }

    pub fn gte(value: impl Into<Value>) -> Self {
        Self::compare(Operator::Gte, value)
    }

    pub fn lt(value: impl Into<Value>) -> Self {
        Self::compare(Operator::Lt, value)
    }

    pub fn lte(value: impl Into<Value>) -> Self {
        Self::compare(Operator::Lte, value)
    }

    /// Compare with another field, e.g. `p.status = p.last_status`.
    pub fn field(op: Operator, field: &str) -> Self {
        Self::new(Condition::Field {
            op,
            field: field.to_string(),
        })
    }

    pub fn like(pattern: &str) -> Self {
        Self::new(Condition::Like {
            anchor: Anchor::Pattern,
            text: pattern.to_string(),
        })
    }

    pub fn starts_with(text: &str) -> Self {
        Self::new(Condition::Like {
            anchor: Anchor::Start,
            text: text.to_string(),
        })
    }

    pub fn contains(text: &str) -> Self {
        Self::new(Condition::Like {
            anchor: Anchor::Middle,
            text: text.to_string(),
        })
    }

    pub fn ends_with(text: &str) -> Self {
        Self::new(Condition::Like {
            anchor: Anchor::End,
            text: text.to_string(),
        })
    }

    pub fn is_null() -> Self {
        Self::new(Condition::IsNull)
    }

    pub fn inside<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::new(Condition::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn formula(text: &str) -> Self {
        Self::new(Condition::Formula(text.to_string()))
    }

    pub fn subquery(query: Query) -> Self {
        Self::new(Condition::Subquery(Box::new(query)))
    }

    /// Correlated mode: `owner.field = sub.<key>` with `sub` added to FROM.
    pub fn join(query: Query) -> Self {
        Self::new(Condition::Join {
            query: Box::new(query),
            primary_key: None,
        })
    }

    /// Key on the joined query, overriding its key field.
    pub fn on(mut self, primary_key: &str) -> Self {
        if let Condition::Join {
            primary_key: key, ..
        } = &mut self.condition
        {
            *key = Some(primary_key.to_string());
        }
        self
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Fragment for the field `name` of `query`.
    pub fn to_expr(&self, name: &str, query: &Query) -> QueryResult<Expr> {
        self.apply_to(query.qualify(name), query)
    }

    /// Fragment with an arbitrary left-hand side (a function call for
    /// HAVING, a column for CASE).
    pub fn apply_to(&self, left: Expr, query: &Query) -> QueryResult<Expr> {
        let expr = match &self.condition {
            Condition::Compare { op, value } => {
                Expr::compare(left, *op, Expr::Literal(value.clone()))
            }
            Condition::Field { op, field } => Expr::compare(left, *op, query.qualify(field)),
            Condition::Like { anchor, text } => Expr::compare(
                left,
                Operator::Like,
                Expr::Literal(Value::String(anchor.pattern(text))),
            ),
            Condition::IsNull => Expr::is_null(left, false),
            Condition::In(values) => Expr::compare(left, Operator::In, Expr::List(values.clone())),
            Condition::Formula(text) => Expr::Raw(fill_formula(text, &left, query)),
            Condition::Subquery(sub) => {
                let mut sub = (**sub).clone();
                sub.break_lines = false;
                Expr::compare(left, Operator::In, Expr::Subquery(Box::new(sub)))
            }
            Condition::Join { query: sub, .. } => {
                return Err(QueryError::config(format!(
                    "correlated join with {} cannot be nested in another condition",
                    sub.table_name
                )));
            }
        };
        if !self.negated {
            return Ok(expr);
        }
        Ok(match expr {
            Expr::Compare {
                left,
                op: op @ (Operator::Like | Operator::In | Operator::IsNull | Operator::NotLike | Operator::NotIn | Operator::IsNotNull),
                right,
            } => Expr::Compare {
                left,
                op: op.inverse(),
                right,
            },
            other => Expr::Not(Box::new(other)),
        })
    }

    fn add_join(
        &self,
        name: &str,
        sub: &Query,
        primary_key: Option<&str>,
        query: &mut Query,
        ctx: &mut Context,
    ) {
        query.set_table(&format!("{} {}", sub.table_name, sub.alias), ctx);
        for kind in ClauseKind::USUAL {
            for fragment in sub.clause(kind) {
                query.add_clause(kind, fragment.clone());
            }
        }
        let key = primary_key
            .map(str::to_string)
            .or_else(|| sub.key_field.clone())
            .unwrap_or_else(|| "id".to_string());
        let fragment = Expr::compare(
            query.qualify(name),
            Operator::Eq,
            Expr::qualified(&sub.alias, key),
        );
        query.add_clause(ClauseKind::Where, fragment);
    }
}

fn fill_formula(text: &str, field: &Expr, query: &Query) -> String {
    let bare = field.column_name().unwrap_or_default();
    text.replace("{alias}", &query.alias)
        .replace("{table}", &query.table_name)
        .replace("{field}", bare)
        .replace('%', &field.to_string())
}

impl Block for Where {
    fn add(&self, name: &str, query: &mut Query, ctx: &mut Context) -> QueryResult<()> {
        if let Condition::Join {
            query: sub,
            primary_key,
        } = &self.condition
        {
            self.add_join(name, sub, primary_key.as_deref(), query, ctx);
            return Ok(());
        }
        let fragment = self.to_expr(name, query)?;
        query.add_clause(ClauseKind::Where, fragment);
        Ok(())
    }
}

/// Negated conditions. `Not::eq` renders `<>`; the rest prefix `NOT` or
/// use the negated operator (`NOT LIKE`, `NOT IN`, `IS NOT NULL`).
pub struct Not;

impl Not {
    pub fn eq(value: impl Into<Value>) -> Where {
        Where::compare(Operator::Ne, value)
    }

    pub fn gt(value: impl Into<Value>) -> Where {
        Where::gt(value).negate()
    }

    pub fn gte(value: impl Into<Value>) -> Where {
        Where::gte(value).negate()
    }

    pub fn lt(value: impl Into<Value>) -> Where {
        Where::lt(value).negate()
    }

    pub fn lte(value: impl Into<Value>) -> Where {
        Where::lte(value).negate()
    }

    pub fn like(pattern: &str) -> Where {
        Where::like(pattern).negate()
    }

    pub fn contains(text: &str) -> Where {
        Where::contains(text).negate()
    }

    pub fn is_null() -> Where {
        Where::is_null().negate()
    }

    pub fn inside<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Where {
        Where::inside(values).negate()
    }

    pub fn formula(text: &str) -> Where {
        Where::formula(text).negate()
    }

    pub fn subquery(query: Query) -> Where {
        Where::subquery(query).negate()
    }
}

/// Several field conditions in one parenthesized group. The binding name is
/// the separator: `AND` or `OR`.
#[derive(Debug, Clone, Default)]
pub struct Options {
    items: Vec<(String, Where)>,
}

impl Options {
    pub fn new<S: Into<String>>(items: impl IntoIterator<Item = (S, Where)>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|(field, cond)| (field.into(), cond))
                .collect(),
        }
    }

    pub fn with(mut self, field: &str, condition: Where) -> Self {
        self.items.push((field.to_string(), condition));
        self
    }

    pub fn to_expr(&self, separator: &str, query: &Query) -> QueryResult<Expr> {
        let op = LogicalOp::parse(separator)?;
        let items = self
            .items
            .iter()
            .map(|(field, cond)| cond.to_expr(field, query))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(Expr::group(op, items))
    }
}

impl Block for Options {
    fn add(&self, name: &str, query: &mut Query, _ctx: &mut Context) -> QueryResult<()> {
        let fragment = self.to_expr(name, query)?;
        query.add_clause(ClauseKind::Where, fragment);
        Ok(())
    }
}

/// `field >= start AND field <= end`, bounds swapped when reversed.
#[derive(Debug, Clone)]
pub struct Between {
    start: Value,
    end: Value,
}

impl Between {
    pub fn new(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        let (start, end) = (start.into(), end.into());
        if start.compare(&end) == Some(Ordering::Greater) {
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }
}

impl Block for Between {
    fn add(&self, name: &str, query: &mut Query, ctx: &mut Context) -> QueryResult<()> {
        Where::gte(self.start.clone()).add(name, query, ctx)?;
        Where::lte(self.end.clone()).add(name, query, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::{PrimaryKey, Select};
    use crate::transpiler::ToSql;

    fn conditions(q: &Query) -> Vec<String> {
        q.clause(ClauseKind::Where)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_between_swaps() {
        let mut ctx = Context::default();
        let q = Select::from("Actor a")
            .bind("age", Between::new(69, 45))
            .build(&mut ctx)
            .unwrap();
        assert_eq!(conditions(&q), vec!["a.age >= 45", "a.age <= 69"]);
    }

    #[test]
    fn test_comparisons_and_quoting() {
        let mut ctx = Context::default();
        let q = Select::from("Product p")
            .bind("name", Where::starts_with("Smart"))
            .bind("descr", Where::contains("5G"))
            .bind("code", Where::ends_with("-X"))
            .bind("price", Where::gt(10.5))
            .bind("status", Where::inside(["A", "B"]))
            .bind("deleted_at", Where::is_null())
            .bind("status", Where::field(Operator::Ne, "last_status"))
            .build(&mut ctx)
            .unwrap();
        assert_eq!(
            conditions(&q),
            vec![
                "p.name LIKE 'Smart%'",
                "p.descr LIKE '%5G%'",
                "p.code LIKE '%-X'",
                "p.price > 10.5",
                "p.status IN ('A','B')",
                "p.deleted_at IS NULL",
                "p.status <> p.last_status",
            ]
        );
    }

    #[test]
    fn test_not_variants() {
        let mut ctx = Context::default();
        let q = Select::from("Product p")
            .bind("status", Not::eq("X"))
            .bind("price", Not::gt(100))
            .bind("name", Not::contains("old"))
            .bind("code", Not::inside([1, 2]))
            .bind("deleted_at", Not::is_null())
            .build(&mut ctx)
            .unwrap();
        assert_eq!(
            conditions(&q),
            vec![
                "p.status <> 'X'",
                "NOT p.price > 100",
                "p.name NOT LIKE '%old%'",
                "p.code NOT IN (1,2)",
                "p.deleted_at IS NOT NULL",
            ]
        );
    }

    #[test]
    fn test_formula_placeholders() {
        let mut ctx = Context::default();
        let q = Select::from("Sales s")
            .bind("total", Where::formula("{alias}.{field} > (SELECT AVG(total) FROM {table})"))
            .bind("sold_at", Where::formula("extract(year from %) = 2024"))
            .build(&mut ctx)
            .unwrap();
        assert_eq!(
            conditions(&q),
            vec![
                "s.total > (SELECT AVG(total) FROM Sales)",
                "extract(year from s.sold_at) = 2024",
            ]
        );
    }

    #[test]
    fn test_options_group() {
        let mut ctx = Context::default();
        let opts = Options::new([("genre", Where::eq("Sci-Fi")), ("awards", Where::contains("Oscar"))]);
        let q = Select::from("Movie m").bind("OR", opts.clone()).build(&mut ctx).unwrap();
        assert_eq!(conditions(&q), vec!["(m.genre = 'Sci-Fi' OR m.awards LIKE '%Oscar%')"]);

        let err = Select::from("Movie m").bind("XOR", opts).build(&mut ctx).unwrap_err();
        assert!(matches!(err, QueryError::Configuration(_)));
    }

    #[test]
    fn test_correlated_join() {
        let mut ctx = Context::default();
        let director = Select::from("Person d")
            .bind("pid", PrimaryKey)
            .bind("name", Where::eq("Nolan"))
            .build(&mut ctx)
            .unwrap();
        let q = Select::from("Movie m")
            .bind("title", crate::ast::builders::Field)
            .bind("director", Where::join(director))
            .build(&mut ctx)
            .unwrap();
        assert_eq!(
            q.to_sql(),
            "SELECT m.title FROM Movie m, Person d WHERE d.name = 'Nolan' AND m.director = d.pid"
        );
    }
}
