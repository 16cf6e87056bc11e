use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::function::{Frame, FunctionCall};
use super::operators::{BinaryOp, JoinType, LogicalOp, Operator, SortType};
use super::query::Query;
use super::values::Value;
use crate::transpiler::Dialect;
use crate::transpiler::sql::expr_sql;

static QUALIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_*])").unwrap());

/// One fragment inside a clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// `*`
    Star,
    /// `alias.name` or a bare `name`
    Column {
        table: Option<String>,
        name: String,
    },
    Literal(Value),
    /// Literal list for `IN (...)`
    List(Vec<Value>),
    /// Known function with optional window frame
    Function(Box<FunctionCall>),
    /// Any other function call, kept verbatim by name
    Call { name: String, args: Vec<Expr> },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// `expr AS alias`
    Aliased { expr: Box<Expr>, alias: String },
    Distinct(Box<Expr>),
    /// SQL Server row cap on the first projection: `TOP(n) expr`
    Top { count: u64, expr: Box<Expr> },
    /// `left op right`; `right` is `None` for IS [NOT] NULL
    Compare {
        left: Box<Expr>,
        op: Operator,
        right: Option<Box<Expr>>,
    },
    /// Parenthesized AND/OR group
    Group { op: LogicalOp, items: Vec<Expr> },
    Not(Box<Expr>),
    Case {
        branches: Vec<(Expr, Expr)>,
        default: Option<Box<Expr>>,
    },
    Subquery(Box<Query>),
    Sorted { expr: Box<Expr>, order: SortType },
    /// GROUP BY entry carrying HAVING conditions
    Having {
        group: Box<Expr>,
        conditions: Vec<Expr>,
    },
    /// FROM entry `name alias`
    Table { name: String, alias: String },
    Join {
        join_type: JoinType,
        table: String,
        alias: String,
        on: Box<Expr>,
    },
    Offset(u64),
    /// Formula text rendered as-is
    Raw(String),
}

impl Expr {
    pub fn column(table: Option<&str>, name: impl Into<String>) -> Expr {
        Expr::Column {
            table: table.filter(|t| !t.is_empty()).map(str::to_string),
            name: name.into(),
        }
    }

    pub fn qualified(alias: &str, name: impl Into<String>) -> Expr {
        Expr::column(Some(alias), name)
    }

    /// Parse `a.b` or `b` into a column reference.
    pub fn field(text: &str) -> Expr {
        match text.trim() {
            "*" | "_" => Expr::Star,
            text => match text.split_once('.') {
                Some((table, name)) => Expr::qualified(table, name),
                None => Expr::column(None, text),
            },
        }
    }

    pub fn literal(value: impl Into<Value>) -> Expr {
        Expr::Literal(value.into())
    }

    pub fn compare(left: Expr, op: Operator, right: Expr) -> Expr {
        Expr::Compare {
            left: Box::new(left),
            op,
            right: Some(Box::new(right)),
        }
    }

    pub fn is_null(left: Expr, negated: bool) -> Expr {
        Expr::Compare {
            left: Box::new(left),
            op: if negated {
                Operator::IsNotNull
            } else {
                Operator::IsNull
            },
            right: None,
        }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Expr {
        Expr::Aliased {
            expr: Box::new(expr),
            alias: alias.into(),
        }
    }

    pub fn sorted(expr: Expr, order: SortType) -> Expr {
        Expr::Sorted {
            expr: Box::new(expr),
            order,
        }
    }

    pub fn function(call: FunctionCall) -> Expr {
        Expr::Function(Box::new(call))
    }

    /// Build a group, collapsing single-item groups.
    pub fn group(op: LogicalOp, mut items: Vec<Expr>) -> Expr {
        if items.len() == 1 {
            return items.remove(0);
        }
        Expr::Group { op, items }
    }

    pub fn raw(text: impl Into<String>) -> Expr {
        Expr::Raw(text.into())
    }

    /// Field name when this fragment is (a wrapper around) a single column.
    pub fn column_name(&self) -> Option<&str> {
        match self {
            Expr::Column { name, .. } => Some(name),
            Expr::Aliased { expr, .. }
            | Expr::Distinct(expr)
            | Expr::Top { expr, .. }
            | Expr::Sorted { expr, .. } => expr.column_name(),
            Expr::Having { group, .. } => group.column_name(),
            _ => None,
        }
    }

    /// Name under which the fragment appears in a result set.
    pub fn output_name(&self) -> Option<&str> {
        match self {
            Expr::Aliased { alias, .. } => Some(alias),
            other => other.column_name(),
        }
    }

    /// Strip presentation wrappers (alias, DISTINCT, TOP, sort direction).
    pub fn inner(&self) -> &Expr {
        match self {
            Expr::Aliased { expr, .. }
            | Expr::Distinct(expr)
            | Expr::Top { expr, .. }
            | Expr::Sorted { expr, .. } => expr.inner(),
            other => other,
        }
    }

    /// Visit every column reference, outside of subqueries.
    pub fn for_each_column(&self, f: &mut dyn FnMut(Option<&str>, &str)) {
        match self {
            Expr::Column { table, name } => f(table.as_deref(), name),
            Expr::Function(call) => {
                call.args.iter().for_each(|a| a.for_each_column(f));
                if let Some(frame) = &call.frame {
                    frame
                        .partition
                        .iter()
                        .chain(frame.order.iter())
                        .for_each(|e| e.for_each_column(f));
                }
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.for_each_column(f)),
            Expr::Binary { left, right, .. } => {
                left.for_each_column(f);
                right.for_each_column(f);
            }
            Expr::Aliased { expr, .. }
            | Expr::Distinct(expr)
            | Expr::Top { expr, .. }
            | Expr::Not(expr)
            | Expr::Sorted { expr, .. } => expr.for_each_column(f),
            Expr::Compare { left, right, .. } => {
                left.for_each_column(f);
                if let Some(right) = right {
                    right.for_each_column(f);
                }
            }
            Expr::Group { items, .. } => items.iter().for_each(|e| e.for_each_column(f)),
            Expr::Case { branches, default } => {
                for (when, then) in branches {
                    when.for_each_column(f);
                    then.for_each_column(f);
                }
                if let Some(d) = default {
                    d.for_each_column(f);
                }
            }
            Expr::Having { group, conditions } => {
                group.for_each_column(f);
                conditions.iter().for_each(|e| e.for_each_column(f));
            }
            Expr::Join { on, .. } => on.for_each_column(f),
            Expr::Star
            | Expr::Literal(_)
            | Expr::List(_)
            | Expr::Subquery(_)
            | Expr::Table { .. }
            | Expr::Offset(_)
            | Expr::Raw(_) => {}
        }
    }

    /// Mutable counterpart of [`Expr::for_each_column`]. Raw formulas are
    /// not touched here; see [`Expr::rename_qualifier`].
    pub fn for_each_column_mut(&mut self, f: &mut dyn FnMut(&mut Option<String>, &mut String)) {
        match self {
            Expr::Column { table, name } => f(table, name),
            Expr::Function(call) => {
                call.args.iter_mut().for_each(|a| a.for_each_column_mut(f));
                if let Some(Frame {
                    partition, order, ..
                }) = &mut call.frame
                {
                    partition
                        .iter_mut()
                        .chain(order.iter_mut())
                        .for_each(|e| e.for_each_column_mut(f));
                }
            }
            Expr::Call { args, .. } => args.iter_mut().for_each(|a| a.for_each_column_mut(f)),
            Expr::Binary { left, right, .. } => {
                left.for_each_column_mut(f);
                right.for_each_column_mut(f);
            }
            Expr::Aliased { expr, .. }
            | Expr::Distinct(expr)
            | Expr::Top { expr, .. }
            | Expr::Not(expr)
            | Expr::Sorted { expr, .. } => expr.for_each_column_mut(f),
            Expr::Compare { left, right, .. } => {
                left.for_each_column_mut(f);
                if let Some(right) = right {
                    right.for_each_column_mut(f);
                }
            }
            Expr::Group { items, .. } => items.iter_mut().for_each(|e| e.for_each_column_mut(f)),
            Expr::Case { branches, default } => {
                for (when, then) in branches {
                    when.for_each_column_mut(f);
                    then.for_each_column_mut(f);
                }
                if let Some(d) = default {
                    d.for_each_column_mut(f);
                }
            }
            Expr::Having { group, conditions } => {
                group.for_each_column_mut(f);
                conditions.iter_mut().for_each(|e| e.for_each_column_mut(f));
            }
            Expr::Join { on, .. } => on.for_each_column_mut(f),
            Expr::Star
            | Expr::Literal(_)
            | Expr::List(_)
            | Expr::Subquery(_)
            | Expr::Table { .. }
            | Expr::Offset(_)
            | Expr::Raw(_) => {}
        }
    }

    fn for_each_raw_mut(&mut self, f: &mut dyn FnMut(&mut String)) {
        match self {
            Expr::Raw(text) => f(text),
            Expr::Function(call) => call.args.iter_mut().for_each(|a| a.for_each_raw_mut(f)),
            Expr::Call { args, .. } => args.iter_mut().for_each(|a| a.for_each_raw_mut(f)),
            Expr::Binary { left, right, .. } => {
                left.for_each_raw_mut(f);
                right.for_each_raw_mut(f);
            }
            Expr::Aliased { expr, .. }
            | Expr::Distinct(expr)
            | Expr::Top { expr, .. }
            | Expr::Not(expr)
            | Expr::Sorted { expr, .. } => expr.for_each_raw_mut(f),
            Expr::Compare { left, right, .. } => {
                left.for_each_raw_mut(f);
                if let Some(right) = right {
                    right.for_each_raw_mut(f);
                }
            }
            Expr::Group { items, .. } => items.iter_mut().for_each(|e| e.for_each_raw_mut(f)),
            Expr::Having { group, conditions } => {
                group.for_each_raw_mut(f);
                conditions.iter_mut().for_each(|e| e.for_each_raw_mut(f));
            }
            Expr::Join { on, .. } => on.for_each_raw_mut(f),
            _ => {}
        }
    }

    /// Table qualifiers referenced by this fragment.
    pub fn qualifiers(&self) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        self.for_each_column(&mut |table, _| {
            if let Some(table) = table {
                found.insert(table.to_string());
            }
        });
        let mut raws = Vec::new();
        self.clone().for_each_raw_mut(&mut |text| raws.push(text.clone()));
        for text in raws {
            for cap in QUALIFIER_RE.captures_iter(&text) {
                found.insert(cap[1].to_string());
            }
        }
        found
    }

    /// Qualify every bare column with `alias`.
    pub fn qualify(&mut self, alias: &str) {
        self.for_each_column_mut(&mut |table, _| {
            if table.is_none() {
                *table = Some(alias.to_string());
            }
        });
    }

    /// Replace qualifier `from` by `to`, including inside raw formulas.
    pub fn rename_qualifier(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        self.for_each_column_mut(&mut |table, _| {
            if table.as_deref() == Some(from) {
                *table = Some(to.to_string());
            }
        });
        let pattern = format!(r"\b{}\.", regex::escape(from));
        if let Ok(re) = Regex::new(&pattern) {
            let replacement = format!("{to}.");
            self.for_each_raw_mut(&mut |text| {
                *text = re.replace_all(text, replacement.as_str()).into_owned();
            });
        }
    }

    /// Copy without any table qualifiers.
    pub fn unqualified(&self) -> Expr {
        let mut bare = self.clone();
        if let Expr::Table { alias, .. } | Expr::Join { alias, .. } = &mut bare {
            alias.clear();
        }
        bare.for_each_column_mut(&mut |table, _| *table = None);
        bare.for_each_raw_mut(&mut |text| {
            *text = QUALIFIER_RE.replace_all(text, "$2").into_owned();
        });
        bare
    }

    /// Normalized text used for equality and deduplication: no qualifiers,
    /// lower-case, no quotes, parentheses or whitespace.
    pub fn signature(&self) -> String {
        normalize(&self.unqualified().to_string())
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        expr_sql(self, dialect)
    }
}

pub(crate) fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\'' | '"' | '`' | '(' | ')') && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&expr_sql(self, Dialect::Ansi))
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}
