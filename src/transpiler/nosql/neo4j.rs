use std::collections::BTreeMap;

use super::{like_to_regex, paging};
use crate::ast::{ClauseKind, Expr, LogicalOp, Operator, Query, Value};

pub trait ToCypher {
    fn to_cypher(&self) -> String;
}

impl ToCypher for Query {
    fn to_cypher(&self) -> String {
        build_cypher_match(self)
    }
}

/// `owner` holds the foreign key pointing at `referenced`.
struct Edge {
    owner: String,
    referenced: String,
}

fn build_cypher_match(query: &Query) -> String {
    let base = query.alias.as_str();
    let labels: BTreeMap<String, String> = query
        .tables()
        .into_iter()
        .map(|(table, alias)| (alias, table))
        .collect();
    let edges = collect_edges(query);

    let conditions = query.clause(ClauseKind::Where);
    let folded = fold_properties(conditions, base);
    let empty = BTreeMap::new();
    let props = folded.as_ref().unwrap_or(&empty);

    let mut parts = vec![format!(
        "MATCH {}",
        build_patterns(base, &labels, &edges, props)
    )];
    if folded.is_none() {
        let predicates: Vec<String> = conditions.iter().map(|c| predicate(c, base)).collect();
        parts.push(format!("WHERE {}", predicates.join(" AND ")));
    }

    let items: Vec<String> = query
        .clause(ClauseKind::Select)
        .iter()
        .map(|e| value_expr(e, base))
        .collect();
    parts.push(if items.is_empty() {
        "RETURN *".to_string()
    } else {
        format!("RETURN {}", items.join(", "))
    });

    let order: Vec<String> = query
        .clause(ClauseKind::OrderBy)
        .iter()
        .map(|e| value_expr(e, base))
        .collect();
    if !order.is_empty() {
        parts.push(format!("ORDER BY {}", order.join(", ")));
    }
    let (limit, skip) = paging(query);
    if let Some(n) = skip {
        parts.push(format!("SKIP {n}"));
    }
    if let Some(n) = limit {
        parts.push(format!("LIMIT {n}"));
    }
    parts.join(" ")
}

fn collect_edges(query: &Query) -> Vec<Edge> {
    query
        .clause(ClauseKind::From)
        .iter()
        .filter_map(|fragment| {
            let Expr::Join { alias, on, .. } = fragment else {
                return None;
            };
            let mut qualifiers = Vec::new();
            on.for_each_column(&mut |table, _| {
                if let Some(table) = table {
                    qualifiers.push(table.to_string());
                }
            });
            let owner = qualifiers.first()?.clone();
            let referenced = qualifiers.get(1).cloned().unwrap_or_else(|| alias.clone());
            Some(Edge { owner, referenced })
        })
        .collect()
}

/// Property maps per alias, when every condition is a plain equality.
fn fold_properties(conditions: &[Expr], base: &str) -> Option<BTreeMap<String, Vec<String>>> {
    let mut props: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for condition in conditions {
        let Expr::Compare {
            left,
            op: Operator::Eq,
            right: Some(right),
        } = condition
        else {
            return None;
        };
        let (Expr::Column { table, name }, Expr::Literal(value)) = (left.as_ref(), right.as_ref())
        else {
            return None;
        };
        let alias = table.as_deref().unwrap_or(base).to_string();
        props
            .entry(alias)
            .or_default()
            .push(format!("{}: {}", name, value.to_cypher()));
    }
    Some(props)
}

fn build_patterns(
    base: &str,
    labels: &BTreeMap<String, String>,
    edges: &[Edge],
    props: &BTreeMap<String, Vec<String>>,
) -> String {
    let mut seen: Vec<String> = Vec::new();
    let node = |alias: &str, seen: &mut Vec<String>| -> String {
        if seen.iter().any(|s| s == alias) {
            return format!("({alias})");
        }
        seen.push(alias.to_string());
        format!("({})", element(alias, labels, props))
    };

    let mut patterns = Vec::new();
    let mut pending: Vec<&Edge> = edges.iter().collect();

    // core relationship: one table owning keys to two others
    let core = pending.iter().find_map(|edge| {
        let owned: Vec<&&Edge> = pending.iter().filter(|e| e.owner == edge.owner).collect();
        (owned.len() >= 2).then(|| {
            (
                edge.owner.clone(),
                owned[0].referenced.clone(),
                owned[1].referenced.clone(),
            )
        })
    });
    if let Some((owner, left, right)) = core {
        let left_node = node(&left, &mut seen);
        seen.push(owner.clone());
        let right_node = node(&right, &mut seen);
        patterns.push(format!(
            "{}<-[{}]->{}",
            left_node,
            element(&owner, labels, props),
            right_node
        ));
        pending.retain(|e| !(e.owner == owner && (e.referenced == left || e.referenced == right)));
    }

    let mut chain = String::new();
    let mut tail = String::new();
    if patterns.is_empty() {
        chain = node(base, &mut seen);
        tail = base.to_string();
    }
    for edge in pending {
        if !chain.is_empty() && tail == edge.owner {
            chain.push_str(&format!("-->{}", node(&edge.referenced, &mut seen)));
            tail = edge.referenced.clone();
        } else if !chain.is_empty() && tail == edge.referenced {
            chain.push_str(&format!("<--{}", node(&edge.owner, &mut seen)));
            tail = edge.owner.clone();
        } else {
            if !chain.is_empty() {
                patterns.push(std::mem::take(&mut chain));
            }
            chain = format!(
                "{}-->{}",
                node(&edge.owner, &mut seen),
                node(&edge.referenced, &mut seen)
            );
            tail = edge.referenced.clone();
        }
    }
    if !chain.is_empty() {
        patterns.push(chain);
    }
    patterns.join(", ")
}

/// `alias:Label{props}` without the surrounding brackets.
fn element(alias: &str, labels: &BTreeMap<String, String>, props: &BTreeMap<String, Vec<String>>) -> String {
    let mut text = match labels.get(alias) {
        Some(label) => format!("{alias}:{label}"),
        None => alias.to_string(),
    };
    if let Some(items) = props.get(alias) {
        text.push_str(&format!("{{{}}}", items.join(", ")));
    }
    text
}

fn property(table: Option<&str>, name: &str, base: &str) -> String {
    format!("{}.{}", table.unwrap_or(base), name)
}

fn value_expr(expr: &Expr, base: &str) -> String {
    match expr {
        Expr::Star => "*".to_string(),
        Expr::Column { table, name } => property(table.as_deref(), name, base),
        Expr::Literal(value) => value.to_cypher(),
        Expr::Aliased { expr, alias } => format!("{} AS {}", value_expr(expr, base), alias),
        Expr::Distinct(inner) => format!("DISTINCT {}", value_expr(inner, base)),
        Expr::Top { expr, .. } => value_expr(expr, base),
        Expr::Sorted { expr, order } => format!("{}{}", value_expr(expr, base), order.suffix()),
        Expr::Function(call) => {
            let args: Vec<String> = call.args.iter().map(|a| value_expr(a, base)).collect();
            format!("{}({})", call.func.name(), args.join(", "))
        }
        Expr::Call { name, args } => {
            let args: Vec<String> = args.iter().map(|a| value_expr(a, base)).collect();
            format!("{}({})", name.to_lowercase(), args.join(", "))
        }
        Expr::Binary { left, op, right } => format!(
            "{} {} {}",
            value_expr(left, base),
            op.symbol(),
            value_expr(right, base)
        ),
        Expr::Having { group, .. } => value_expr(group, base),
        other => other.to_string(),
    }
}

fn predicate(expr: &Expr, base: &str) -> String {
    match expr {
        Expr::Compare { left, op, right } => {
            let left = value_expr(left, base);
            match (op, right.as_deref()) {
                (Operator::IsNull | Operator::IsNotNull, _) | (_, None) => {
                    format!("{} {}", left, op.sql_symbol())
                }
                (Operator::Like, Some(Expr::Literal(Value::String(p)))) => like(&left, p),
                (Operator::NotLike, Some(Expr::Literal(Value::String(p)))) => {
                    format!("NOT {}", like(&left, p))
                }
                (Operator::In | Operator::NotIn, Some(Expr::List(values))) => {
                    let values: Vec<String> = values.iter().map(Value::to_cypher).collect();
                    let list = format!("{} IN [{}]", left, values.join(", "));
                    if *op == Operator::NotIn {
                        format!("NOT {list}")
                    } else {
                        list
                    }
                }
                (op, Some(right)) => {
                    format!("{} {} {}", left, op.sql_symbol(), value_expr(right, base))
                }
            }
        }
        Expr::Group { op, items } => {
            let items: Vec<String> = items.iter().map(|e| predicate(e, base)).collect();
            let joiner = match op {
                LogicalOp::And => " AND ",
                LogicalOp::Or => " OR ",
            };
            format!("({})", items.join(joiner))
        }
        Expr::Not(inner) => format!("NOT {}", predicate(inner, base)),
        other => other.to_string(),
    }
}

fn like(left: &str, pattern: &str) -> String {
    let starts = pattern.starts_with('%');
    let ends = pattern.ends_with('%');
    let body = pattern.trim_matches('%');
    if body.contains('%') || body.contains('_') {
        return format!("{} =~ '{}'", left, like_to_regex(pattern));
    }
    let literal = Value::String(body.to_string()).to_cypher();
    match (starts, ends) {
        (false, true) => format!("{left} STARTS WITH {literal}"),
        (true, false) => format!("{left} ENDS WITH {literal}"),
        (true, true) => format!("{left} CONTAINS {literal}"),
        (false, false) => format!("{left} = {literal}"),
    }
}
