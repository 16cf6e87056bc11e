// NoSQL renderers
pub mod mongo;
pub mod neo4j;

use crate::ast::{ClauseKind, Expr, Query, Value};

/// Field reference without its table qualifier.
pub(crate) fn bare_name(expr: &Expr) -> String {
    match expr.inner() {
        Expr::Column { name, .. } => name.clone(),
        Expr::Star => "*".to_string(),
        Expr::Having { group, .. } => bare_name(group),
        other => other.unqualified().to_string(),
    }
}

/// `(limit, skip)` from LIMIT/OFFSET fragments or a TOP prefix.
pub(crate) fn paging(query: &Query) -> (Option<u64>, Option<u64>) {
    let mut limit = None;
    let mut skip = None;
    for fragment in query.clause(ClauseKind::Limit) {
        match fragment {
            Expr::Literal(Value::Int(n)) => limit = u64::try_from(*n).ok(),
            Expr::Offset(n) => skip = Some(*n),
            _ => {}
        }
    }
    if let Some(Expr::Top { count, .. }) = query.clause(ClauseKind::Select).first() {
        limit = limit.or(Some(*count));
    }
    (limit, skip)
}

/// LIKE pattern as an anchored regular expression.
pub(crate) fn like_to_regex(pattern: &str) -> String {
    let body = pattern
        .trim_start_matches('%')
        .trim_end_matches('%')
        .replace('%', ".*");
    let start = if pattern.starts_with('%') { "" } else { "^" };
    let end = if pattern.ends_with('%') { "" } else { "$" };
    format!("{start}{body}{end}")
}

/// Inverse of [`like_to_regex`].
pub(crate) fn regex_to_like(pattern: &str) -> String {
    let start = if pattern.starts_with('^') { "" } else { "%" };
    let end = if pattern.ends_with('$') { "" } else { "%" };
    let body = pattern
        .trim_start_matches('^')
        .trim_end_matches('$')
        .replace(".*", "%");
    let mut like = format!("{start}{body}{end}");
    while like.contains("%%") {
        like = like.replace("%%", "%");
    }
    like
}
