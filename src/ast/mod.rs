pub mod builders;
pub mod clause;
pub mod expr;
pub mod function;
pub mod operators;
pub mod query;
pub mod registry;
pub mod values;

pub use self::builders::*;
pub use self::clause::ClauseKind;
pub use self::expr::Expr;
pub use self::function::{Frame, FrameBound, Func, FunctionCall};
pub use self::operators::{BinaryOp, JoinType, LogicalOp, Operator, SortType};
pub use self::query::{Query, parse_table_ref};
pub use self::registry::{Registry, Relationship};
pub use self::values::Value;
