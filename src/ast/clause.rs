use serde::{Deserialize, Serialize};

/// The clause collections of a query, in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClauseKind {
    Select,
    From,
    Where,
    GroupBy,
    OrderBy,
    Limit,
}

impl ClauseKind {
    pub const ALL: [ClauseKind; 6] = [
        ClauseKind::Select,
        ClauseKind::From,
        ClauseKind::Where,
        ClauseKind::GroupBy,
        ClauseKind::OrderBy,
        ClauseKind::Limit,
    ];

    /// Kinds merged when two queries are combined (FROM and LIMIT have
    /// their own rules).
    pub const USUAL: [ClauseKind; 4] = [
        ClauseKind::Select,
        ClauseKind::Where,
        ClauseKind::GroupBy,
        ClauseKind::OrderBy,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            ClauseKind::Select => "SELECT",
            ClauseKind::From => "FROM",
            ClauseKind::Where => "WHERE",
            ClauseKind::GroupBy => "GROUP BY",
            ClauseKind::OrderBy => "ORDER BY",
            ClauseKind::Limit => "LIMIT",
        }
    }

    /// Join separator; `{}` stands for the line break or blank.
    pub fn separator(&self) -> &'static str {
        match self {
            ClauseKind::Select | ClauseKind::GroupBy | ClauseKind::OrderBy => ",{}",
            ClauseKind::From => "{}",
            ClauseKind::Where => "{}AND ",
            ClauseKind::Limit => " ",
        }
    }

    /// Text rendered when the clause is empty, if any.
    pub fn default_text(&self) -> Option<&'static str> {
        match self {
            ClauseKind::Select => Some("*"),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}
