//! Renderers turning the query model back into text.
//!
//! SQL goes through [`ToSql`] (parameterized by [`Dialect`]), Mongo call
//! syntax through [`ToMongo`] and Cypher through [`ToCypher`]. Rendering
//! never fails and never mutates the query.

pub mod dialect;
pub mod nosql;
pub mod sql;

#[cfg(test)]
mod tests;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ast::Query;
use crate::error::QueryError;

pub use dialect::{Dialect, LimitStyle};
pub use nosql::mongo::ToMongo;
pub use nosql::neo4j::ToCypher;

/// Trait for converting query nodes to SQL.
pub trait ToSql {
    /// Convert this node to SQL using the default dialect.
    fn to_sql(&self) -> String {
        self.to_sql_with_dialect(Dialect::default())
    }
    /// Convert this node to SQL with a specific dialect.
    fn to_sql_with_dialect(&self, dialect: Dialect) -> String;
}

/// Output family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Sql,
    Mongo,
    Cypher,
}

impl FromStr for Language {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sql" => Ok(Language::Sql),
            "mongo" | "mongodb" => Ok(Language::Mongo),
            "cypher" | "neo4j" => Ok(Language::Cypher),
            other => Err(QueryError::config(format!("unknown output language: {other}"))),
        }
    }
}

impl Query {
    /// Render in the given output family.
    pub fn render(&self, language: Language, dialect: Dialect) -> String {
        match language {
            Language::Sql => self.to_sql_with_dialect(dialect),
            Language::Mongo => self.to_mongo(),
            Language::Cypher => self.to_cypher(),
        }
    }
}
