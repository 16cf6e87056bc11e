use std::slice;

use super::{bare_name, like_to_regex, paging};
use crate::ast::{ClauseKind, Expr, Func, FunctionCall, LogicalOp, Operator, Query, Value};

pub trait ToMongo {
    fn to_mongo(&self) -> String;
}

impl ToMongo for Query {
    fn to_mongo(&self) -> String {
        if !self.is_empty(ClauseKind::GroupBy) || self.has_aggregate() {
            build_aggregate(self)
        } else {
            build_find(self)
        }
    }
}

fn build_find(query: &Query) -> String {
    let filter = document(query.clause(ClauseKind::Where));
    let projection = build_projection(query);
    let mut mongo = match (filter.as_str(), projection) {
        ("{}", None) => format!("{}.find()", query.table_name),
        (_, None) => format!("{}.find({})", query.table_name, filter),
        (_, Some(projection)) => format!("{}.find({}, {})", query.table_name, filter, projection),
    };
    if let Some(sort) = build_sort(query) {
        mongo.push_str(&format!(".sort({sort})"));
    }
    let (limit, skip) = paging(query);
    if let Some(n) = skip {
        mongo.push_str(&format!(".skip({n})"));
    }
    if let Some(n) = limit {
        mongo.push_str(&format!(".limit({n})"));
    }
    mongo
}

/// One `$group` accumulator.
struct Accumulator {
    name: String,
    func: Func,
    field: String,
}

impl Accumulator {
    fn from_call(call: &FunctionCall, alias: Option<&str>) -> Self {
        let field = call.field().map(bare_name).unwrap_or_else(|| "*".to_string());
        let name = match alias {
            Some(alias) => alias.to_string(),
            None => format!("{}_{}", call.func.name(), field.replace('*', "all")),
        };
        Self {
            name,
            func: call.func,
            field,
        }
    }

    fn render(&self) -> String {
        let op = self.func.mongo_accumulator().unwrap_or("$first");
        if self.func == Func::Count {
            format!("{}:{{$sum:1}}", self.name)
        } else {
            format!("{}:{{{}:\"${}\"}}", self.name, op, self.field)
        }
    }
}

fn build_aggregate(query: &Query) -> String {
    let mut stages = Vec::new();

    let filter = document(query.clause(ClauseKind::Where));
    if filter != "{}" {
        stages.push(format!("{{$match:{filter}}}"));
    }

    let mut group_fields = Vec::new();
    let mut having = Vec::new();
    for fragment in query.clause(ClauseKind::GroupBy) {
        if let Expr::Having { conditions, .. } = fragment {
            having.extend(conditions.iter());
        }
        group_fields.push(bare_name(fragment));
    }

    let mut accumulators: Vec<Accumulator> = Vec::new();
    let mut plain = Vec::new();
    for item in query.clause(ClauseKind::Select) {
        match item.inner() {
            Expr::Function(call) if call.func.is_aggregate() => {
                let alias = match item {
                    Expr::Aliased { alias, .. } => Some(alias.as_str()),
                    _ => None,
                };
                accumulators.push(Accumulator::from_call(call, alias));
            }
            Expr::Star => {}
            _ => plain.push(bare_name(item)),
        }
    }

    // HAVING conditions reuse a selected accumulator or add their own
    let mut having_entries = Vec::new();
    for condition in having {
        let Expr::Compare { left, op, right } = condition else {
            continue;
        };
        let Expr::Function(call) = left.inner() else {
            continue;
        };
        let wanted = Accumulator::from_call(call, None);
        let name = match accumulators
            .iter()
            .find(|a| a.func == wanted.func && a.field == wanted.field)
        {
            Some(existing) => existing.name.clone(),
            None => {
                let name = wanted.name.clone();
                accumulators.push(wanted);
                name
            }
        };
        having_entries.push(compare_entry(&name, *op, right.as_deref()));
    }

    let id = match group_fields.as_slice() {
        [] => "null".to_string(),
        [single] => format!("\"${single}\""),
        many => {
            let keys: Vec<String> = many.iter().map(|f| format!("{f}:\"${f}\"")).collect();
            format!("{{{}}}", keys.join(","))
        }
    };
    let mut group = vec![format!("_id:{id}")];
    group.extend(accumulators.iter().map(Accumulator::render));
    stages.push(format!("{{$group:{{{}}}}}", group.join(",")));

    if !having_entries.is_empty() {
        stages.push(format!("{{$match:{{{}}}}}", having_entries.join(",")));
    }

    if !plain.is_empty() || !accumulators.is_empty() {
        let mut project = vec!["_id:0".to_string()];
        for field in &plain {
            if group_fields.len() > 1 {
                project.push(format!("{field}:\"$_id.{field}\""));
            } else {
                project.push(format!("{field}:\"$_id\""));
            }
        }
        project.extend(accumulators.iter().map(|a| format!("{}:1", a.name)));
        stages.push(format!("{{$project:{{{}}}}}", project.join(",")));
    }

    if let Some(sort) = build_sort(query) {
        stages.push(format!("{{$sort:{sort}}}"));
    }
    let (limit, skip) = paging(query);
    if let Some(n) = skip {
        stages.push(format!("{{$skip:{n}}}"));
    }
    if let Some(n) = limit {
        stages.push(format!("{{$limit:{n}}}"));
    }

    format!("{}.aggregate([{}])", query.table_name, stages.join(","))
}

fn build_projection(query: &Query) -> Option<String> {
    let entries: Vec<String> = query
        .clause(ClauseKind::Select)
        .iter()
        .filter_map(|item| match (item, item.inner()) {
            (_, Expr::Star) => None,
            (Expr::Aliased { alias, .. }, Expr::Column { name, .. }) => {
                Some(format!("{alias}:\"${name}\""))
            }
            (_, Expr::Column { name, .. }) => Some(format!("{name}:1")),
            _ => None,
        })
        .collect();
    (!entries.is_empty()).then(|| format!("{{{}}}", entries.join(",")))
}

fn build_sort(query: &Query) -> Option<String> {
    let keys: Vec<String> = query
        .clause(ClauseKind::OrderBy)
        .iter()
        .map(|item| {
            let order = match item {
                Expr::Sorted { order, .. } => *order,
                _ => Default::default(),
            };
            format!("{}:{}", bare_name(item), order.mongo())
        })
        .collect();
    (!keys.is_empty()).then(|| format!("{{{}}}", keys.join(",")))
}

/// Filter document for a list of AND-ed fragments.
fn document(fragments: &[Expr]) -> String {
    let mut entries = Vec::new();
    for fragment in fragments {
        filter_entries(fragment, &mut entries);
    }
    format!("{{{}}}", entries.join(","))
}

fn filter_entries(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Compare { left, op, right } => {
            if let (Expr::Column { .. }, Some(Expr::Column { .. })) =
                (left.inner(), right.as_deref())
            {
                let op = op.mongo_op().unwrap_or("$eq");
                let other = right.as_deref().map(bare_name).unwrap_or_default();
                out.push(format!(
                    "$expr:{{{}:[\"${}\",\"${}\"]}}",
                    op,
                    bare_name(left),
                    other
                ));
            } else {
                out.push(compare_entry(&bare_name(left), *op, right.as_deref()));
            }
        }
        Expr::Group { op, items } => {
            let docs: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Expr::Group {
                        op: LogicalOp::And,
                        items,
                    } => document(items),
                    single => document(slice::from_ref(single)),
                })
                .collect();
            let key = match op {
                LogicalOp::Or => "$or",
                LogicalOp::And => "$and",
            };
            out.push(format!("{}:[{}]", key, docs.join(",")));
        }
        Expr::Not(inner) => out.push(format!("$nor:[{}]", document(slice::from_ref(inner)))),
        other => out.push(where_text(other)),
    }
}

fn compare_entry(field: &str, op: Operator, right: Option<&Expr>) -> String {
    match (op, right) {
        (Operator::IsNull, _) => format!("{field}:null"),
        (Operator::IsNotNull, _) => format!("{field}:{{$ne:null}}"),
        (Operator::Like, Some(Expr::Literal(Value::String(pattern)))) => {
            format!("{field}:{{$regex:{}}}", regex_literal(pattern))
        }
        (Operator::NotLike, Some(Expr::Literal(Value::String(pattern)))) => {
            format!("{field}:{{$not:{{$regex:{}}}}}", regex_literal(pattern))
        }
        (Operator::Eq, Some(Expr::Literal(value))) => format!("{field}:{}", value.to_mongo()),
        (Operator::In | Operator::NotIn, Some(Expr::List(values))) => {
            let values: Vec<String> = values.iter().map(Value::to_mongo).collect();
            let key = op.mongo_op().unwrap_or("$in");
            format!("{field}:{{{}:[{}]}}", key, values.join(","))
        }
        (op, Some(Expr::Literal(value))) if op.mongo_op().is_some() => {
            format!(
                "{field}:{{{}:{}}}",
                op.mongo_op().unwrap_or("$eq"),
                value.to_mongo()
            )
        }
        (op, Some(right)) => format!(
            "$where:\"{} {} {}\"",
            field,
            op.sql_symbol(),
            escape(&right.unqualified().to_string())
        ),
        (op, None) => format!("$where:\"{} {}\"", field, op.sql_symbol()),
    }
}

fn regex_literal(pattern: &str) -> String {
    Value::String(like_to_regex(pattern)).to_mongo()
}

fn where_text(expr: &Expr) -> String {
    format!("$where:\"{}\"", escape(&expr.unqualified().to_string()))
}

fn escape(text: &str) -> String {
    text.replace('"', "\\\"")
}
