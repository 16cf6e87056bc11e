//! SQL generation for fragments, queries and CTEs.

use crate::ast::builders::Cte;
use crate::ast::{ClauseKind, Expr, Frame, FunctionCall, Query};

use super::{Dialect, ToSql};

/// Render one fragment.
pub fn expr_sql(expr: &Expr, dialect: Dialect) -> String {
    let render = |e: &Expr| expr_sql(e, dialect);
    match expr {
        Expr::Star => "*".to_string(),
        Expr::Column { table: Some(t), name } => format!("{t}.{name}"),
        Expr::Column { table: None, name } => name.clone(),
        Expr::Literal(v) => v.to_sql(dialect.numeric_bools()),
        Expr::List(values) => {
            let items: Vec<String> = values
                .iter()
                .map(|v| v.to_sql(dialect.numeric_bools()))
                .collect();
            format!("({})", items.join(","))
        }
        Expr::Function(call) => function_sql(call, dialect),
        Expr::Call { name, args } => {
            let args: Vec<String> = args.iter().map(render).collect();
            format!("{}({})", name, args.join(", "))
        }
        Expr::Binary { left, op, right } => {
            format!("{} {} {}", render(left), op.symbol(), render(right))
        }
        Expr::Aliased { expr, alias } => format!("{} AS {}", render(expr), alias),
        Expr::Distinct(inner) => format!("DISTINCT {}", render(inner)),
        Expr::Top { count, expr } => format!("TOP({}) {}", count, render(expr)),
        Expr::Compare { left, op, right } => match right {
            Some(right) => format!("{} {} {}", render(left), op.sql_symbol(), render(right)),
            None => format!("{} {}", render(left), op.sql_symbol()),
        },
        Expr::Group { op, items } => {
            let items: Vec<String> = items.iter().map(render).collect();
            format!("({})", items.join(&format!(" {} ", op.keyword())))
        }
        Expr::Not(inner) => format!("NOT {}", render(inner)),
        Expr::Case { branches, default } => {
            let mut sql = String::from("CASE");
            for (when, then) in branches {
                sql.push_str(&format!(" WHEN {} THEN {}", render(when), render(then)));
            }
            if let Some(default) = default {
                sql.push_str(&format!(" ELSE {}", render(default)));
            }
            sql.push_str(" END");
            sql
        }
        Expr::Subquery(query) => format!("({})", query_sql(query, dialect, false)),
        Expr::Sorted { expr, order } => format!("{}{}", render(expr), order.suffix()),
        Expr::Having { group, conditions } => {
            let conditions: Vec<String> = conditions.iter().map(render).collect();
            format!("{} HAVING {}", render(group), conditions.join(" AND "))
        }
        Expr::Table { name, alias } => table_ref(name, alias),
        Expr::Join {
            join_type,
            table,
            alias,
            on,
        } => {
            // groups already carry their parentheses
            let on = match on.as_ref() {
                group @ Expr::Group { .. } => render(group),
                other => format!("({})", render(other)),
            };
            format!("{}JOIN {} ON {}", join_type.prefix(), table_ref(table, alias), on)
        }
        Expr::Offset(n) => format!("OFFSET {n}"),
        Expr::Raw(text) => text.clone(),
    }
}

fn table_ref(name: &str, alias: &str) -> String {
    if alias.is_empty() {
        name.to_string()
    } else {
        format!("{name} {alias}")
    }
}

fn function_sql(call: &FunctionCall, dialect: Dialect) -> String {
    let args: Vec<String> = call.args.iter().map(|a| expr_sql(a, dialect)).collect();
    let mut sql = call.func.apply(dialect, &args);
    if let Some(frame) = &call.frame {
        sql.push_str(&format!(" OVER({})", frame_sql(frame, dialect)));
    }
    sql
}

fn frame_sql(frame: &Frame, dialect: Dialect) -> String {
    let list = |items: &[Expr]| {
        items
            .iter()
            .map(|e| expr_sql(e, dialect))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut parts = Vec::new();
    if !frame.partition.is_empty() {
        parts.push(format!("PARTITION BY {}", list(&frame.partition)));
    }
    if !frame.order.is_empty() {
        parts.push(format!("ORDER BY {}", list(&frame.order)));
    }
    if let Some((start, end)) = &frame.rows {
        parts.push(format!("ROWS BETWEEN {start} AND {end}"));
    }
    parts.join(" ")
}

/// Render a whole query. `pretty` puts every clause on its own line with
/// tab-indented fragments.
pub fn query_sql(query: &Query, dialect: Dialect, pretty: bool) -> String {
    let indent = if pretty { "\n\t" } else { " " };
    let mut parts = Vec::new();
    for kind in ClauseKind::ALL {
        let fragments = query.clause(kind);
        let body = if fragments.is_empty() {
            match kind.default_text() {
                Some(text) => text.to_string(),
                None => continue,
            }
        } else {
            join_fragments(kind, fragments, dialect, indent)
        };
        parts.push(format!("{}{}{}", kind.keyword(), indent, body));
    }
    parts.join(if pretty { "\n" } else { " " })
}

fn join_fragments(kind: ClauseKind, fragments: &[Expr], dialect: Dialect, indent: &str) -> String {
    let separator = kind.separator().replace("{}", indent);
    let mut out = String::new();
    for (i, fragment) in fragments.iter().enumerate() {
        let text = expr_sql(fragment, dialect);
        if i == 0 {
            out.push_str(&text);
            continue;
        }
        match (kind, fragment) {
            // implicit cross join
            (ClauseKind::From, Expr::Table { .. }) => out.push_str(", "),
            _ => out.push_str(&separator),
        }
        out.push_str(&text);
    }
    out
}

impl ToSql for Query {
    fn to_sql_with_dialect(&self, dialect: Dialect) -> String {
        query_sql(self, dialect, self.break_lines)
    }
}

impl ToSql for Cte {
    fn to_sql_with_dialect(&self, dialect: Dialect) -> String {
        let members: Vec<String> = self
            .members
            .iter()
            .map(|q| query_sql(q, dialect, false))
            .collect();
        let separator = if self.main.break_lines { "\n" } else { " " };
        format!(
            "WITH {}{} AS ({}){}{}",
            if self.recursive { "RECURSIVE " } else { "" },
            self.name,
            members.join(" UNION ALL "),
            separator,
            self.main.to_sql_with_dialect(dialect)
        )
    }
}
