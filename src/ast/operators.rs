use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};

/// Comparison operators usable in WHERE and HAVING fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn sql_symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    /// The operator that holds exactly when `self` does not.
    pub fn inverse(&self) -> Operator {
        match self {
            Operator::Eq => Operator::Ne,
            Operator::Ne => Operator::Eq,
            Operator::Gt => Operator::Lte,
            Operator::Gte => Operator::Lt,
            Operator::Lt => Operator::Gte,
            Operator::Lte => Operator::Gt,
            Operator::Like => Operator::NotLike,
            Operator::NotLike => Operator::Like,
            Operator::In => Operator::NotIn,
            Operator::NotIn => Operator::In,
            Operator::IsNull => Operator::IsNotNull,
            Operator::IsNotNull => Operator::IsNull,
        }
    }

    /// MongoDB query operator, when one exists.
    pub fn mongo_op(&self) -> Option<&'static str> {
        match self {
            Operator::Eq => Some("$eq"),
            Operator::Ne => Some("$ne"),
            Operator::Gt => Some("$gt"),
            Operator::Gte => Some("$gte"),
            Operator::Lt => Some("$lt"),
            Operator::Lte => Some("$lte"),
            Operator::In => Some("$in"),
            Operator::NotIn => Some("$nin"),
            _ => None,
        }
    }

    pub fn from_mongo(op: &str) -> Option<Operator> {
        match op {
            "$eq" => Some(Operator::Eq),
            "$ne" => Some(Operator::Ne),
            "$gt" => Some(Operator::Gt),
            "$gte" => Some(Operator::Gte),
            "$lt" => Some(Operator::Lt),
            "$lte" => Some(Operator::Lte),
            "$in" => Some(Operator::In),
            "$nin" => Some(Operator::NotIn),
            _ => None,
        }
    }

    /// Parse a symbolic comparison (`=`, `!=`, `<>`, `>=` ...).
    pub fn from_symbol(symbol: &str) -> Option<Operator> {
        match symbol {
            "=" | "==" => Some(Operator::Eq),
            "<>" | "!=" => Some(Operator::Ne),
            ">" => Some(Operator::Gt),
            ">=" => Some(Operator::Gte),
            "<" => Some(Operator::Lt),
            "<=" => Some(Operator::Lte),
            _ => None,
        }
    }

    /// True for operators that take no right-hand side.
    pub fn is_unary(&self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

/// Logical combinator for a parenthesized condition group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn keyword(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }

    /// Accepts only `AND` / `OR` (any case, surrounding blanks ignored).
    pub fn parse(separator: &str) -> QueryResult<LogicalOp> {
        match separator.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(LogicalOp::And),
            "OR" => Ok(LogicalOp::Or),
            other => Err(QueryError::config(format!(
                "invalid logical separator '{other}', expected AND or OR"
            ))),
        }
    }
}

/// Join flavour used when a query is attached to another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// Keyword prefix placed before `JOIN` (empty for inner joins).
    pub fn prefix(&self) -> &'static str {
        match self {
            JoinType::Inner => "",
            JoinType::Left => "LEFT ",
            JoinType::Right => "RIGHT ",
            JoinType::Full => "FULL ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortType {
    #[default]
    Asc,
    Desc,
}

impl SortType {
    pub fn suffix(&self) -> &'static str {
        match self {
            SortType::Asc => "",
            SortType::Desc => " DESC",
        }
    }

    /// Mongo sort direction (`1` / `-1`).
    pub fn mongo(&self) -> i8 {
        match self {
            SortType::Asc => 1,
            SortType::Desc => -1,
        }
    }
}

/// Arithmetic and concatenation operators inside value expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Concat => "||",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<BinaryOp> {
        match symbol {
            "+" => Some(BinaryOp::Add),
            "-" => Some(BinaryOp::Sub),
            "*" => Some(BinaryOp::Mul),
            "/" => Some(BinaryOp::Div),
            "%" => Some(BinaryOp::Rem),
            "||" => Some(BinaryOp::Concat),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_is_involution() {
        for op in [
            Operator::Eq,
            Operator::Gt,
            Operator::Lte,
            Operator::Like,
            Operator::In,
            Operator::IsNull,
        ] {
            assert_eq!(op.inverse().inverse(), op);
        }
        assert_eq!(Operator::Gt.inverse(), Operator::Lte);
    }

    #[test]
    fn test_logical_separator() {
        assert_eq!(LogicalOp::parse(" or ").unwrap(), LogicalOp::Or);
        assert!(matches!(
            LogicalOp::parse("XOR"),
            Err(QueryError::Configuration(_))
        ));
    }
}
