use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Ansi,
    #[serde(alias = "sql_server", alias = "mssql")]
    SqlServer,
    Oracle,
    #[serde(alias = "postgres")]
    Postgresql,
    Mysql,
}

/// How a dialect caps the number of returned rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// Trailing `LIMIT n OFFSET m`.
    Clause,
    /// `TOP(n)` prefix on the first projection.
    Top,
    /// `ROWNUM` range in WHERE.
    RowNum,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Dialect::Ansi,
        Dialect::SqlServer,
        Dialect::Oracle,
        Dialect::Postgresql,
        Dialect::Mysql,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Ansi => "ANSI",
            Dialect::SqlServer => "SQL_SERVER",
            Dialect::Oracle => "ORACLE",
            Dialect::Postgresql => "POSTGRESQL",
            Dialect::Mysql => "MYSQL",
        }
    }

    pub fn limit_style(&self) -> LimitStyle {
        match self {
            Dialect::SqlServer => LimitStyle::Top,
            Dialect::Oracle => LimitStyle::RowNum,
            _ => LimitStyle::Clause,
        }
    }

    /// Dialects without a boolean literal type.
    pub fn numeric_bools(&self) -> bool {
        matches!(self, Dialect::SqlServer | Dialect::Oracle)
    }
}

impl std::str::FromStr for Dialect {
    type Err = QueryError;

    fn from_str(s: &str) -> QueryResult<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "ansi" => Ok(Dialect::Ansi),
            "sqlserver" | "sql_server" | "mssql" => Ok(Dialect::SqlServer),
            "oracle" => Ok(Dialect::Oracle),
            "postgresql" | "postgres" | "pg" => Ok(Dialect::Postgresql),
            "mysql" => Ok(Dialect::Mysql),
            other => Err(QueryError::config(format!("unknown SQL dialect '{other}'"))),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
