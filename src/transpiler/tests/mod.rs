//! Renderer tests.
//!
//! - `sql`: clause layout, fragments, pretty output, CTEs
//! - `dialects`: per-dialect function templates and row caps
//! - `nosql`: Mongo and Cypher output

mod nosql;
mod sql;
