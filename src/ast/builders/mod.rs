//! Clause builders.
//!
//! Every builder implements [`Block`]: given the field (or table, or
//! separator) it was bound to, it appends fragments to a [`Query`] or
//! updates its metadata. [`Select`] applies a list of bindings in order.
//!
//! ```
//! use sql_blocks::prelude::*;
//!
//! let mut ctx = Context::default();
//! let query = Select::from("Actor a")
//!     .bind("name", NamedField::new("actors_name"))
//!     .bind("age", Between::new(69, 45))
//!     .build(&mut ctx)
//!     .unwrap();
//! assert_eq!(
//!     query.to_sql(),
//!     "SELECT a.name AS actors_name FROM Actor a WHERE a.age >= 45 AND a.age <= 69"
//! );
//! ```

pub mod case_when;
pub mod conditions;
pub mod cte;
pub mod field;
pub mod ordering;

pub use case_when::Case;
pub use conditions::{Anchor, Between, Condition, Not, Options, Where};
pub use cte::{Cte, Recursive};
pub use field::{
    Distinct, Expression, Field, FieldList, ForeignKey, Function, NamedField, Over, PrimaryKey,
    Projection, Table,
};
pub use ordering::{GroupBy, Having, OrderBy};

use crate::ast::{ClauseKind, Expr, Operator, Query};
use crate::config::Context;
use crate::error::{QueryError, QueryResult};

/// A strategy that writes into a query under a name.
pub trait Block {
    fn add(&self, name: &str, query: &mut Query, ctx: &mut Context) -> QueryResult<()>;
}

impl<B: Block + ?Sized> Block for Box<B> {
    fn add(&self, name: &str, query: &mut Query, ctx: &mut Context) -> QueryResult<()> {
        (**self).add(name, query, ctx)
    }
}

/// Binding a whole query joins it: `name` is the foreign key on the owner.
impl Block for Query {
    fn add(&self, name: &str, query: &mut Query, ctx: &mut Context) -> QueryResult<()> {
        if query.table_name.is_empty() {
            return Err(QueryError::config(format!(
                "cannot join {} before a table is set",
                self.table_name
            )));
        }
        ctx.registry.bind(
            &query.table_name,
            &self.table_name,
            name,
            self.key_field.clone().unwrap_or_default(),
        );
        let owner = std::mem::take(query);
        *query = owner.combine(self.clone(), &ctx.registry)?;
        Ok(())
    }
}

/// `field [NOT] IN (SELECT ...)`.
#[derive(Debug, Clone)]
pub struct SubSelect {
    query: Query,
    negated: bool,
}

impl SubSelect {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            negated: false,
        }
    }

    pub fn not(query: Query) -> Self {
        Self {
            query,
            negated: true,
        }
    }
}

impl Block for SubSelect {
    fn add(&self, name: &str, query: &mut Query, _ctx: &mut Context) -> QueryResult<()> {
        let op = if self.negated {
            Operator::NotIn
        } else {
            Operator::In
        };
        let mut sub = self.query.clone();
        sub.break_lines = false;
        let fragment = Expr::compare(query.qualify(name), op, Expr::Subquery(Box::new(sub)));
        query.add_clause(ClauseKind::Where, fragment);
        Ok(())
    }
}

/// Keyword-style assembly of a query: a table plus ordered field bindings.
#[derive(Default)]
pub struct Select {
    table: Option<String>,
    bindings: Vec<(String, Box<dyn Block>)>,
}

impl Select {
    /// Start without a table; a [`Table`] binding can supply it.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(table: &str) -> Self {
        Self {
            table: Some(table.to_string()),
            bindings: Vec::new(),
        }
    }

    /// Bind a builder to a field name. The same name may be bound again.
    pub fn bind(mut self, name: &str, block: impl Block + 'static) -> Self {
        self.bindings.push((name.to_string(), Box::new(block)));
        self
    }

    pub fn build(self, ctx: &mut Context) -> QueryResult<Query> {
        let mut query = Query::new(ctx);
        if let Some(table) = &self.table {
            query.set_table(table, ctx);
        }
        for (name, block) in &self.bindings {
            block.add(name, &mut query, ctx)?;
        }
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::ToSql;

    #[test]
    fn test_query_binding_joins() {
        let mut ctx = Context::default();
        let cast = Select::from("Cast c")
            .bind("id", PrimaryKey)
            .bind("role", Field)
            .build(&mut ctx)
            .unwrap();
        let actor = Select::from("Actor a")
            .bind("name", Field)
            .bind("cast", cast)
            .build(&mut ctx)
            .unwrap();
        assert_eq!(
            actor.to_sql(),
            "SELECT a.name, c.role FROM Actor a JOIN Cast c ON (a.cast = c.id)"
        );
        assert_eq!(ctx.registry.find("Actor", "Cast").unwrap().foreign_key, "cast");
    }

    #[test]
    fn test_sub_select() {
        let mut ctx = Context::default();
        let genres = Select::from("Genre g")
            .bind("movie", Field)
            .bind("name", Where::eq("Sci-Fi"))
            .build(&mut ctx)
            .unwrap();
        let movies = Select::from("Movie m")
            .bind("title", Field)
            .bind("id", SubSelect::new(genres))
            .build(&mut ctx)
            .unwrap();
        assert_eq!(
            movies.to_sql(),
            "SELECT m.title FROM Movie m WHERE m.id IN (SELECT g.movie FROM Genre g WHERE g.name = 'Sci-Fi')"
        );
        assert_eq!(movies.subqueries().len(), 1);
    }

    #[test]
    fn test_join_without_table() {
        let mut ctx = Context::default();
        let other = Query::from_table("Cast", &ctx);
        let err = Select::new().bind("cast", other).build(&mut ctx).unwrap_err();
        assert!(matches!(err, QueryError::Configuration(_)));
    }
}
