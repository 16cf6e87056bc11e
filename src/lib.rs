//! # sql-blocks
//!
//! Build, parse, rewrite and render relational queries across SQL dialects,
//! MongoDB call chains and Cypher-like patterns.
//!
//! ## Quick Example
//!
//! ```rust
//! use sql_blocks::prelude::*;
//!
//! let mut ctx = Context::default();
//! let query = sql_blocks::parse_combined(
//!     "SELECT m.title FROM Movie m WHERE m.year > 2000",
//!     &mut ctx,
//! )
//! .unwrap();
//!
//! assert_eq!(query.to_mongo(), "Movie.find({year:{$gt:2000}}, {title:1})");
//! ```
//!
//! ## Input syntaxes
//!
//! | Syntax | Example                                             |
//! |--------|-----------------------------------------------------|
//! | SQL    | `SELECT a.name FROM Actor a WHERE a.age > 40`       |
//! | Mongo  | `Actor.find({age: {$gt: 40}}, {name: 1})`           |
//! | Neo4j  | `MATCH (a:Actor) WHERE a.age > 40 RETURN a.name`    |
//! | Cypher | `Actor(name, ?age > 40)`                            |
//!
//! Every syntax parses into one [`Query`](ast::Query) per table. Tables
//! are related through the [`Registry`](ast::Registry) held by the
//! [`Context`](config::Context), which parsers fill as they discover joins.

pub mod ast;
pub mod config;
pub mod error;
pub mod parser;
pub mod rules;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::{Context, Settings};
    pub use crate::error::*;
    pub use crate::parser::{Syntax, parse, parse_combined, parse_with, parser_class};
    pub use crate::rules::Rule;
    pub use crate::transpiler::{Dialect, Language, ToCypher, ToMongo, ToSql};
}

pub use parser::{parse, parse_combined, parse_with, parser_class};
