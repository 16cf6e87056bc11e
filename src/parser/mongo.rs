//! MongoDB shell call chains:
//! `db.movies.find({year: {$gt: 2000}}, {title: 1}).sort({year: -1}).limit(5)`
//! and `db.ratings.aggregate([{$group: ...}, {$match: ...}])`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::tokens::{Cursor, LexOptions, Token};
use super::{QueryParser, Syntax};
use crate::ast::builders::{Condition, Where};
use crate::ast::{ClauseKind, Expr, Func, FunctionCall, LogicalOp, Operator, Query, SortType, Value};
use crate::config::Context;
use crate::error::{QueryError, QueryResult};
use crate::transpiler::nosql::regex_to_like;
use crate::transpiler::Dialect;

static MONGO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*[\w$]+(\.[\w$]+)*\.(find|aggregate)\s*\(").unwrap());

pub struct MongoParser;

impl QueryParser for MongoParser {
    fn syntax(&self) -> Syntax {
        Syntax::Mongo
    }

    fn can_handle(&self, text: &str) -> bool {
        MONGO_RE.is_match(text)
    }

    fn parse(&self, text: &str, ctx: &mut Context) -> QueryResult<Vec<Query>> {
        let mut cursor = Cursor::new(text, LexOptions::mongo())?;
        let head = cursor.expect_word()?;
        let mut path: Vec<&str> = head.split('.').collect();
        let (Some(method), Some(collection)) = (path.pop(), path.pop()) else {
            return Err(QueryError::parse(0, "expected collection.method(...)"));
        };
        let mut calls = vec![(method.to_string(), arguments(&mut cursor)?)];
        while cursor.eat_symbol(".") {
            let method = cursor.expect_word()?;
            calls.push((method, arguments(&mut cursor)?));
        }
        cursor.eat_symbol(";");
        if !cursor.is_done() {
            return Err(cursor.error("unexpected trailing text"));
        }

        let mut builder = Builder::new(Query::from_table(collection, ctx));
        for (method, args) in calls {
            builder.call(&method, args)?;
        }
        Ok(vec![builder.finish(ctx)])
    }
}

/// JSON-like argument value.
#[derive(Debug, Clone, PartialEq)]
enum Doc {
    Object(Vec<(String, Doc)>),
    Array(Vec<Doc>),
    Scalar(Value),
    /// `"$name"` field reference
    Field(String),
}

impl Doc {
    fn entries(&self) -> &[(String, Doc)] {
        match self {
            Doc::Object(entries) => entries,
            _ => &[],
        }
    }

    fn as_u64(&self) -> Option<u64> {
        match self {
            Doc::Scalar(Value::Int(n)) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// `1` / `true` in a projection.
    fn is_included(&self) -> bool {
        matches!(self, Doc::Scalar(Value::Bool(true)))
            || matches!(self, Doc::Scalar(Value::Int(n)) if *n != 0)
    }

    fn value(&self) -> QueryResult<Value> {
        match self {
            Doc::Scalar(value) => Ok(value.clone()),
            Doc::Field(name) => Ok(Value::String(format!("${name}"))),
            other => Err(QueryError::parse(0, format!("expected a literal, found {:?}", other))),
        }
    }
}

fn arguments(cursor: &mut Cursor<'_>) -> QueryResult<Vec<Doc>> {
    cursor.expect_symbol("(")?;
    let mut args = Vec::new();
    while !cursor.eat_symbol(")") {
        args.push(doc(cursor)?);
        if !cursor.eat_symbol(",") {
            cursor.expect_symbol(")")?;
            break;
        }
    }
    Ok(args)
}

fn doc(cursor: &mut Cursor<'_>) -> QueryResult<Doc> {
    if cursor.eat_symbol("{") {
        let mut entries = Vec::new();
        while !cursor.eat_symbol("}") {
            let key = match cursor.next() {
                Some(Token::Word(w)) | Some(Token::Str(w)) | Some(Token::Number(w)) => w,
                _ => return Err(cursor.error("expected a key")),
            };
            cursor.expect_symbol(":")?;
            entries.push((key, doc(cursor)?));
            if !cursor.eat_symbol(",") {
                cursor.expect_symbol("}")?;
                break;
            }
        }
        return Ok(Doc::Object(entries));
    }
    if cursor.eat_symbol("[") {
        let mut items = Vec::new();
        while !cursor.eat_symbol("]") {
            items.push(doc(cursor)?);
            if !cursor.eat_symbol(",") {
                cursor.expect_symbol("]")?;
                break;
            }
        }
        return Ok(Doc::Array(items));
    }
    let negative = cursor.eat_symbol("-");
    match cursor.peek().cloned() {
        Some(Token::Number(n)) if negative => {
            cursor.next();
            Ok(Doc::Scalar(Value::infer(&format!("-{n}"))))
        }
        Some(Token::Number(n)) => {
            cursor.next();
            Ok(Doc::Scalar(Value::infer(&n)))
        }
        Some(Token::Str(s)) if !negative => {
            cursor.next();
            match s.strip_prefix('$') {
                Some(field) if !field.is_empty() => Ok(Doc::Field(field.to_string())),
                _ => Ok(Doc::Scalar(Value::String(s))),
            }
        }
        Some(Token::Word(w)) if !negative => match w.as_str() {
            "true" | "false" | "null" => {
                cursor.next();
                Ok(Doc::Scalar(Value::infer(&w)))
            }
            _ => Err(cursor.error("expected a value")),
        },
        _ => Err(cursor.error("expected a value")),
    }
}

/// `$group` accumulator: output name and the aggregate it computes.
struct Accumulator {
    name: String,
    call: Expr,
    default_name: bool,
}

struct Builder {
    query: Query,
    grouped: bool,
    group_fields: Vec<String>,
    accumulators: Vec<Accumulator>,
    projected: bool,
    limit: Option<u64>,
    skip: Option<u64>,
}

impl Builder {
    fn new(query: Query) -> Self {
        Self {
            query,
            grouped: false,
            group_fields: Vec::new(),
            accumulators: Vec::new(),
            projected: false,
            limit: None,
            skip: None,
        }
    }

    fn call(&mut self, method: &str, args: Vec<Doc>) -> QueryResult<()> {
        let mut args = args.into_iter();
        match method {
            "find" | "findOne" => {
                if let Some(filter) = args.next() {
                    self.match_stage(&filter)?;
                }
                if let Some(projection) = args.next() {
                    self.project(&projection)?;
                }
                if method == "findOne" {
                    self.limit = Some(1);
                }
            }
            "aggregate" => match args.next() {
                Some(Doc::Array(stages)) => {
                    for stage in &stages {
                        self.stage(stage)?;
                    }
                }
                _ => return Err(QueryError::parse(0, "aggregate expects a stage list")),
            },
            "sort" => {
                if let Some(sort) = args.next() {
                    self.sort(&sort);
                }
            }
            "skip" => self.skip = args.next().and_then(|d| d.as_u64()),
            "limit" => self.limit = args.next().and_then(|d| d.as_u64()),
            other => {
                return Err(QueryError::parse(0, format!("unsupported method '{other}'")));
            }
        }
        Ok(())
    }

    fn stage(&mut self, stage: &Doc) -> QueryResult<()> {
        for (name, body) in stage.entries() {
            match name.as_str() {
                "$match" => self.match_stage(body)?,
                "$group" => self.group(body)?,
                "$project" => self.project(body)?,
                "$sort" => self.sort(body),
                "$skip" => self.skip = body.as_u64(),
                "$limit" => self.limit = body.as_u64(),
                other => {
                    return Err(QueryError::parse(0, format!("unsupported stage '{other}'")));
                }
            }
        }
        Ok(())
    }

    /// WHERE before `$group`, HAVING after it.
    fn match_stage(&mut self, filter: &Doc) -> QueryResult<()> {
        let conditions = self.filter(filter.entries())?;
        if !self.grouped {
            for condition in conditions {
                self.query.add_clause(ClauseKind::Where, condition);
            }
            return Ok(());
        }
        let Some(last) = self.query.clause_mut(ClauseKind::GroupBy).last_mut() else {
            return Err(QueryError::config("$match on accumulators needs a $group _id"));
        };
        match last {
            Expr::Having { conditions: having, .. } => having.extend(conditions),
            group => {
                *group = Expr::Having {
                    group: Box::new(group.clone()),
                    conditions,
                }
            }
        }
        Ok(())
    }

    /// Left-hand side for a key: an accumulator after `$group`, else a column.
    fn operand(&self, key: &str) -> Expr {
        self.accumulators
            .iter()
            .find(|a| a.name == key)
            .map(|a| a.call.clone())
            .unwrap_or_else(|| self.query.qualify(key))
    }

    fn filter(&self, entries: &[(String, Doc)]) -> QueryResult<Vec<Expr>> {
        let mut conditions = Vec::new();
        for (key, value) in entries {
            match (key.as_str(), value) {
                ("$or" | "$and" | "$nor", Doc::Array(items)) => {
                    let items = items
                        .iter()
                        .map(|item| -> QueryResult<Expr> {
                            Ok(Expr::group(LogicalOp::And, self.filter(item.entries())?))
                        })
                        .collect::<QueryResult<Vec<_>>>()?;
                    conditions.push(match key.as_str() {
                        "$and" => Expr::group(LogicalOp::And, items),
                        "$or" => Expr::group(LogicalOp::Or, items),
                        _ => Expr::Not(Box::new(Expr::group(LogicalOp::Or, items))),
                    });
                }
                ("$expr", Doc::Object(ops)) => {
                    for (op, operands) in ops {
                        conditions.push(self.field_comparison(op, operands)?);
                    }
                }
                ("$where", Doc::Scalar(Value::String(text))) => {
                    conditions.push(Expr::raw(text.clone()));
                }
                (field, Doc::Object(ops)) if ops.iter().all(|(op, _)| op.starts_with('$')) => {
                    conditions.extend(self.field_operators(field, ops)?);
                }
                (field, Doc::Scalar(Value::Null)) => {
                    conditions.push(Where::is_null().apply_to(self.operand(field), &self.query)?);
                }
                (field, value) => {
                    conditions.push(Where::eq(value.value()?).apply_to(self.operand(field), &self.query)?);
                }
            }
        }
        Ok(conditions)
    }

    fn field_operators(&self, field: &str, ops: &[(String, Doc)]) -> QueryResult<Vec<Expr>> {
        let left = self.operand(field);
        let mut conditions = Vec::new();
        for (op, value) in ops {
            let condition = match (op.as_str(), value) {
                ("$regex", Doc::Scalar(Value::String(pattern))) => {
                    Where::like(&regex_to_like(pattern))
                }
                ("$options", _) => continue,
                ("$not", Doc::Object(inner)) => {
                    for condition in self.field_operators(field, inner)? {
                        conditions.push(negate(condition));
                    }
                    continue;
                }
                ("$exists", Doc::Scalar(Value::Bool(exists))) => {
                    let w = Where::is_null();
                    if *exists { w.negate() } else { w }
                }
                ("$eq", Doc::Scalar(Value::Null)) => Where::is_null(),
                ("$ne", Doc::Scalar(Value::Null)) => Where::is_null().negate(),
                ("$in" | "$nin", Doc::Array(items)) => {
                    let values = items.iter().map(Doc::value).collect::<QueryResult<Vec<_>>>()?;
                    let w = Where::inside(values);
                    if op == "$nin" { w.negate() } else { w }
                }
                (op, value) => match Operator::from_mongo(op) {
                    Some(op) => Where::new(Condition::Compare {
                        op,
                        value: value.value()?,
                    }),
                    None => {
                        return Err(QueryError::parse(0, format!("unsupported operator '{op}'")));
                    }
                },
            };
            conditions.push(condition.apply_to(left.clone(), &self.query)?);
        }
        Ok(conditions)
    }

    /// `$expr: {$gt: ["$a", "$b"]}`
    fn field_comparison(&self, op: &str, operands: &Doc) -> QueryResult<Expr> {
        let (Some(op), Doc::Array(items)) = (Operator::from_mongo(op), operands) else {
            return Err(QueryError::parse(0, format!("unsupported $expr operator '{op}'")));
        };
        let side = |doc: Option<&Doc>| -> QueryResult<Expr> {
            match doc {
                Some(Doc::Field(name)) => Ok(self.operand(name)),
                Some(other) => Ok(Expr::Literal(other.value()?)),
                None => Err(QueryError::parse(0, "$expr needs two operands")),
            }
        };
        Ok(Expr::compare(side(items.first())?, op, side(items.get(1))?))
    }

    fn group(&mut self, body: &Doc) -> QueryResult<()> {
        self.grouped = true;
        for (name, value) in body.entries() {
            if name == "_id" {
                let fields: Vec<String> = match value {
                    Doc::Field(field) => vec![field.clone()],
                    Doc::Object(entries) => entries
                        .iter()
                        .filter_map(|(_, v)| match v {
                            Doc::Field(field) => Some(field.clone()),
                            _ => None,
                        })
                        .collect(),
                    _ => Vec::new(),
                };
                for field in &fields {
                    let column = self.query.qualify(field);
                    self.query.add_clause(ClauseKind::GroupBy, column);
                }
                self.group_fields = fields;
                continue;
            }
            let Some((op, operand)) = value.entries().first() else {
                return Err(QueryError::parse(0, format!("accumulator '{name}' has no operator")));
            };
            let (func, field) = match (op.as_str(), operand) {
                ("$sum", Doc::Scalar(Value::Int(1))) => (Func::Count, "*".to_string()),
                (op, Doc::Field(field)) => match Func::from_mongo_accumulator(op) {
                    Some(func) => (func, field.clone()),
                    None => return Err(QueryError::UnknownFunction(op.to_string())),
                },
                (op, _) => return Err(QueryError::UnknownFunction(op.to_string())),
            };
            let call = Expr::function(FunctionCall::new(func, vec![self.query.qualify(&field)]));
            let default_name = format!("{}_{}", func.name(), field.replace('*', "all"));
            self.accumulators.push(Accumulator {
                default_name: *name == default_name,
                name: name.clone(),
                call,
            });
        }
        Ok(())
    }

    fn accumulator_item(accumulator: &Accumulator) -> Expr {
        if accumulator.default_name {
            accumulator.call.clone()
        } else {
            Expr::aliased(accumulator.call.clone(), accumulator.name.clone())
        }
    }

    fn project(&mut self, body: &Doc) -> QueryResult<()> {
        self.projected = true;
        for (name, value) in body.entries() {
            if name == "_id" {
                continue;
            }
            let item = match value {
                Doc::Field(reference) if reference == "_id" || reference.starts_with("_id.") => {
                    let field = reference
                        .strip_prefix("_id.")
                        .map(str::to_string)
                        .or_else(|| self.group_fields.first().cloned())
                        .unwrap_or_else(|| name.clone());
                    let column = self.query.qualify(&field);
                    if field == *name {
                        column
                    } else {
                        Expr::aliased(column, name.clone())
                    }
                }
                Doc::Field(reference) => Expr::aliased(self.query.qualify(reference), name.clone()),
                value if value.is_included() => match self.accumulators.iter().find(|a| a.name == *name) {
                    Some(accumulator) => Self::accumulator_item(accumulator),
                    None => self.query.qualify(name),
                },
                _ => continue,
            };
            self.query.add_clause(ClauseKind::Select, item);
        }
        Ok(())
    }

    fn sort(&mut self, body: &Doc) {
        for (name, direction) in body.entries() {
            let order = match direction {
                Doc::Scalar(Value::Int(n)) if *n < 0 => SortType::Desc,
                _ => SortType::Asc,
            };
            let item = Expr::sorted(self.operand(name), order);
            self.query.add_clause(ClauseKind::OrderBy, item);
        }
    }

    fn finish(mut self, ctx: &Context) -> Query {
        if self.grouped && !self.projected {
            for field in &self.group_fields {
                let column = self.query.qualify(field);
                self.query.add_clause(ClauseKind::Select, column);
            }
            for accumulator in &self.accumulators {
                self.query
                    .add_clause(ClauseKind::Select, Self::accumulator_item(accumulator));
            }
        }
        if self.limit.is_some() || self.skip.is_some() {
            let count = self.limit.unwrap_or(ctx.auto_limit);
            self.query.limit(count, self.skip.unwrap_or(0), Dialect::Ansi);
        }
        self.query
    }
}

fn negate(condition: Expr) -> Expr {
    match condition {
        Expr::Compare { left, op, right } => Expr::Compare {
            left,
            op: op.inverse(),
            right,
        },
        other => Expr::Not(Box::new(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_to_like() {
        assert_eq!(regex_to_like("^Star"), "Star%");
        assert_eq!(regex_to_like("Oscar"), "%Oscar%");
        assert_eq!(regex_to_like("^a.*b$"), "a%b");
    }

    #[test]
    fn test_doc_values() {
        let mut cursor = Cursor::new("{a: -1, b: [\"$x\", true], c: null}", LexOptions::mongo()).unwrap();
        let parsed = doc(&mut cursor).unwrap();
        assert_eq!(
            parsed,
            Doc::Object(vec![
                ("a".into(), Doc::Scalar(Value::Int(-1))),
                (
                    "b".into(),
                    Doc::Array(vec![Doc::Field("x".into()), Doc::Scalar(Value::Bool(true))])
                ),
                ("c".into(), Doc::Scalar(Value::Null)),
            ])
        );
    }
}
