//! Parsers turning dialect text into queries.
//!
//! Every input syntax implements [`QueryParser`]: a cheap structural
//! `can_handle` check plus a full `parse` into one [`Query`] per table.
//! [`parser_class`] picks the syntax by trying them in a fixed order:
//!
//! | Syntax | Recognized by | Example |
//! |---|---|---|
//! | SQL | `SELECT ... FROM` | `SELECT m.title FROM Movie m` |
//! | Mongo | `.find(` / `.aggregate(` | `db.movies.find({year: 2000})` |
//! | Neo4j | `MATCH` or `(a:Label` | `MATCH (m:Movie) RETURN m.title` |
//! | Cypher | `Name(` | `Movie(title, ?year > 2000)` |
//!
//! Parsing records the relationships it discovers in the context registry,
//! so the returned queries can be combined with [`Query::combine_all`].

pub mod cypher;
pub mod mongo;
pub mod neo4j;
mod scope;
pub mod sql;
pub mod tokens;

#[cfg(test)]
mod tests;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ast::Query;
use crate::config::Context;
use crate::error::{QueryError, QueryResult};

pub use cypher::CypherParser;
pub use mongo::MongoParser;
pub use neo4j::Neo4jParser;
pub use sql::SqlParser;

/// A parser for one input syntax.
pub trait QueryParser {
    fn syntax(&self) -> Syntax;

    /// Fast structural check; `parse` may still fail on malformed text.
    fn can_handle(&self, text: &str) -> bool;

    fn parse(&self, text: &str, ctx: &mut Context) -> QueryResult<Vec<Query>>;
}

/// Input syntaxes, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    Sql,
    Mongo,
    /// `MATCH (a:Label)-[r:TYPE]->(b:Label) RETURN ...`
    Neo4j,
    /// Bracketed node patterns: `Actor(name) <- Cast(actor_id, movie_id) -> Movie(id, title)`
    Cypher,
}

impl Syntax {
    pub const ALL: [Syntax; 4] = [Syntax::Sql, Syntax::Mongo, Syntax::Neo4j, Syntax::Cypher];

    pub fn name(&self) -> &'static str {
        match self {
            Syntax::Sql => "sql",
            Syntax::Mongo => "mongo",
            Syntax::Neo4j => "neo4j",
            Syntax::Cypher => "cypher",
        }
    }

    pub fn parser(&self) -> Box<dyn QueryParser> {
        match self {
            Syntax::Sql => Box::new(SqlParser),
            Syntax::Mongo => Box::new(MongoParser),
            Syntax::Neo4j => Box::new(Neo4jParser),
            Syntax::Cypher => Box::new(CypherParser),
        }
    }
}

impl std::fmt::Display for Syntax {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Syntax {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sql" => Ok(Syntax::Sql),
            "mongo" | "mongodb" => Ok(Syntax::Mongo),
            "neo4j" => Ok(Syntax::Neo4j),
            "cypher" | "pattern" => Ok(Syntax::Cypher),
            other => Err(QueryError::config(format!("unknown input syntax: {other}"))),
        }
    }
}

/// Detect the syntax of `text` without parsing it.
pub fn parser_class(text: &str) -> QueryResult<Syntax> {
    Syntax::ALL
        .into_iter()
        .find(|syntax| syntax.parser().can_handle(text))
        .ok_or_else(|| QueryError::unknown_dialect(text.trim()))
}

/// Parse text in whatever syntax it is written in.
pub fn parse(text: &str, ctx: &mut Context) -> QueryResult<Vec<Query>> {
    let syntax = parser_class(text)?;
    tracing::debug!(%syntax, "detected input syntax");
    parse_with(syntax, text, ctx)
}

/// Parse text in a known syntax.
pub fn parse_with(syntax: Syntax, text: &str, ctx: &mut Context) -> QueryResult<Vec<Query>> {
    let text = tokens::normalize(text);
    let queries = syntax.parser().parse(&text, ctx)?;
    tracing::debug!(%syntax, queries = queries.len(), "parsed");
    Ok(queries)
}

/// Parse and combine every resulting query into one.
pub fn parse_combined(text: &str, ctx: &mut Context) -> QueryResult<Query> {
    let queries = parse(text, ctx)?;
    Query::combine_all(queries, &ctx.registry)
}
