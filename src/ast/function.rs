//! Function identity, window framing and per-dialect templates.
//!
//! A call is a plain value `{func, args, frame}`. The SQL text comes from a
//! lookup table keyed by `(Func, Dialect)` with a per-function fallback, so
//! adding a dialect variant never touches the call sites.

use serde::{Deserialize, Serialize};

use super::expr::Expr;
use crate::transpiler::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Func {
    Avg,
    Min,
    Max,
    Sum,
    Count,
    SubString,
    Round,
    DateDiff,
    Year,
    CurrentDate,
    Coalesce,
    Cast,
    RowNumber,
    Rank,
    Lag,
    Lead,
}

/// Dialect specific overrides. Anything missing falls back to `Func::default_template`.
static TEMPLATES: &[(Func, Dialect, &str)] = &[
    (Func::Year, Dialect::SqlServer, "YEAR({0})"),
    (Func::Year, Dialect::Mysql, "YEAR({0})"),
    (Func::Year, Dialect::Postgresql, "DATE_PART('year', {0})"),
    (Func::CurrentDate, Dialect::SqlServer, "GETDATE()"),
    (Func::CurrentDate, Dialect::Oracle, "SYSDATE"),
    (Func::CurrentDate, Dialect::Mysql, "CURDATE()"),
    (Func::Coalesce, Dialect::SqlServer, "ISNULL({0}, {1})"),
    (Func::Coalesce, Dialect::Oracle, "NVL({0}, {1})"),
    (Func::SubString, Dialect::SqlServer, "SUBSTRING({0}, {1}, {2})"),
    (Func::SubString, Dialect::Mysql, "SUBSTRING({0}, {1}, {2})"),
    (Func::SubString, Dialect::Oracle, "SUBSTR({0}, {1}, {2})"),
    (Func::DateDiff, Dialect::SqlServer, "DATEDIFF(day, {1}, {0})"),
    (Func::DateDiff, Dialect::Mysql, "DATEDIFF({0}, {1})"),
    (Func::DateDiff, Dialect::Postgresql, "DATE_PART('day', {0} - {1})"),
];

impl Func {
    pub const ALL: [Func; 16] = [
        Func::Avg,
        Func::Min,
        Func::Max,
        Func::Sum,
        Func::Count,
        Func::SubString,
        Func::Round,
        Func::DateDiff,
        Func::Year,
        Func::CurrentDate,
        Func::Coalesce,
        Func::Cast,
        Func::RowNumber,
        Func::Rank,
        Func::Lag,
        Func::Lead,
    ];

    /// Case-insensitive lookup by SQL name (`avg`, `row_number`, `substr` ...).
    pub fn from_name(name: &str) -> Option<Func> {
        let func = match name.to_ascii_lowercase().as_str() {
            "avg" => Func::Avg,
            "min" => Func::Min,
            "max" => Func::Max,
            "sum" => Func::Sum,
            "count" => Func::Count,
            "substring" | "substr" => Func::SubString,
            "round" => Func::Round,
            "datediff" | "date_diff" => Func::DateDiff,
            "year" => Func::Year,
            "current_date" | "getdate" | "sysdate" | "curdate" => Func::CurrentDate,
            "coalesce" | "isnull" | "nvl" => Func::Coalesce,
            "cast" => Func::Cast,
            "row_number" | "rownumber" => Func::RowNumber,
            "rank" => Func::Rank,
            "lag" => Func::Lag,
            "lead" => Func::Lead,
            _ => return None,
        };
        Some(func)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Func::Avg => "avg",
            Func::Min => "min",
            Func::Max => "max",
            Func::Sum => "sum",
            Func::Count => "count",
            Func::SubString => "substring",
            Func::Round => "round",
            Func::DateDiff => "datediff",
            Func::Year => "year",
            Func::CurrentDate => "current_date",
            Func::Coalesce => "coalesce",
            Func::Cast => "cast",
            Func::RowNumber => "row_number",
            Func::Rank => "rank",
            Func::Lag => "lag",
            Func::Lead => "lead",
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Func::Avg | Func::Min | Func::Max | Func::Sum | Func::Count
        )
    }

    /// Functions that only make sense with an `OVER (...)` frame.
    pub fn is_window(&self) -> bool {
        matches!(self, Func::RowNumber | Func::Rank | Func::Lag | Func::Lead)
    }

    /// Takes no field argument.
    pub fn is_niladic(&self) -> bool {
        matches!(self, Func::CurrentDate | Func::RowNumber | Func::Rank)
    }

    /// MongoDB `$group` accumulator for aggregates.
    pub fn mongo_accumulator(&self) -> Option<&'static str> {
        match self {
            Func::Avg => Some("$avg"),
            Func::Min => Some("$min"),
            Func::Max => Some("$max"),
            Func::Sum | Func::Count => Some("$sum"),
            _ => None,
        }
    }

    pub fn from_mongo_accumulator(op: &str) -> Option<Func> {
        match op {
            "$avg" => Some(Func::Avg),
            "$min" => Some(Func::Min),
            "$max" => Some(Func::Max),
            "$sum" => Some(Func::Sum),
            _ => None,
        }
    }

    fn default_template(&self) -> &'static str {
        match self {
            Func::Avg => "AVG({0})",
            Func::Min => "MIN({0})",
            Func::Max => "MAX({0})",
            Func::Sum => "SUM({0})",
            Func::Count => "COUNT({0})",
            Func::SubString => "SUBSTRING({0} FROM {1} FOR {2})",
            Func::Round => "ROUND({0}, {1})",
            Func::DateDiff => "({0} - {1})",
            Func::Year => "EXTRACT(YEAR FROM {0})",
            Func::CurrentDate => "CURRENT_DATE",
            Func::Coalesce => "COALESCE({0}, {1})",
            Func::Cast => "CAST({0} AS {1})",
            Func::RowNumber => "ROW_NUMBER()",
            Func::Rank => "RANK()",
            Func::Lag => "LAG({0})",
            Func::Lead => "LEAD({0})",
        }
    }

    pub fn template(&self, dialect: Dialect) -> &'static str {
        TEMPLATES
            .iter()
            .find(|(func, d, _)| func == self && *d == dialect)
            .map(|(_, _, template)| *template)
            .unwrap_or_else(|| self.default_template())
    }

    /// Fill `{n}` placeholders with rendered arguments. Surplus arguments are
    /// appended comma-separated inside the last parenthesis; missing ones
    /// render empty.
    pub fn apply(&self, dialect: Dialect, args: &[String]) -> String {
        let template = self.template(dialect);
        let mut out = template.to_string();
        let mut used = 0;
        for (i, arg) in args.iter().enumerate() {
            let slot = format!("{{{i}}}");
            if out.contains(&slot) {
                out = out.replace(&slot, arg);
                used = i + 1;
            }
        }
        for i in used..3 {
            out = out
                .replace(&format!(", {{{i}}}"), "")
                .replace(&format!("{{{i}}}"), "");
        }
        if used < args.len() && out.ends_with(')') {
            let extra = args[used..].join(", ");
            out.truncate(out.len() - 1);
            if !out.ends_with('(') {
                out.push_str(", ");
            }
            out.push_str(&extra);
            out.push(')');
        }
        out
    }
}

impl std::fmt::Display for Func {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Window frame boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(u32),
    CurrentRow,
    Following(u32),
    UnboundedFollowing,
}

impl std::fmt::Display for FrameBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameBound::UnboundedPreceding => write!(f, "UNBOUNDED PRECEDING"),
            FrameBound::Preceding(n) => write!(f, "{} PRECEDING", n),
            FrameBound::CurrentRow => write!(f, "CURRENT ROW"),
            FrameBound::Following(n) => write!(f, "{} FOLLOWING", n),
            FrameBound::UnboundedFollowing => write!(f, "UNBOUNDED FOLLOWING"),
        }
    }
}

/// `OVER (PARTITION BY ... ORDER BY ... ROWS BETWEEN ...)`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    pub partition: Vec<Expr>,
    /// `Expr::Sorted` entries, or plain expressions for ascending order.
    pub order: Vec<Expr>,
    pub rows: Option<(FrameBound, FrameBound)>,
}

/// A call to a known function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub func: Func,
    pub args: Vec<Expr>,
    pub frame: Option<Frame>,
}

impl FunctionCall {
    pub fn new(func: Func, args: Vec<Expr>) -> Self {
        Self {
            func,
            args,
            frame: None,
        }
    }

    /// First argument, the field the function wraps.
    pub fn field(&self) -> Option<&Expr> {
        self.args.first()
    }
}
