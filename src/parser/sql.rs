//! Recursive-descent reader for the generic SQL subset.
//!
//! One query is produced per FROM table. Join predicates of the form
//! `a.f = b.g` (in `ON` or in `WHERE`) are not kept as fragments: they are
//! recorded in the registry so that combining the queries recreates the
//! join. Every other fragment goes to the table it mentions.

use once_cell::sync::Lazy;
use regex::Regex;

use super::scope::Scope;
use super::tokens::{Cursor, LexOptions, Token};
use super::{QueryParser, Syntax};
use crate::ast::{
    BinaryOp, ClauseKind, Expr, Frame, FrameBound, Func, FunctionCall, JoinType, LogicalOp,
    Operator, Query, SortType, Value,
};
use crate::config::Context;
use crate::error::{QueryError, QueryResult};
use crate::transpiler::Dialect;

static SQL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^\s*select\b.+\bfrom\b").unwrap());

/// Words that end an expression or a table reference.
const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "OFFSET", "JOIN", "INNER",
    "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "ON", "AS", "AND", "OR", "NOT", "ASC", "DESC",
    "WHEN", "THEN", "ELSE", "END", "IS", "IN", "LIKE", "BETWEEN", "OVER", "UNION", "ROWS",
];

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

pub struct SqlParser;

impl QueryParser for SqlParser {
    fn syntax(&self) -> Syntax {
        Syntax::Sql
    }

    fn can_handle(&self, text: &str) -> bool {
        SQL_RE.is_match(text)
    }

    fn parse(&self, text: &str, ctx: &mut Context) -> QueryResult<Vec<Query>> {
        let mut reader = Reader {
            cursor: Cursor::new(text, LexOptions::sql())?,
            ctx,
        };
        let statement = reader.statement()?;
        reader.cursor.eat_symbol(";");
        if !reader.cursor.is_done() {
            return Err(reader.cursor.error("unexpected trailing text"));
        }
        assemble(statement, reader.ctx)
    }
}

#[derive(Debug)]
struct TableRef {
    name: String,
    alias: Option<String>,
}

#[derive(Debug)]
struct JoinRef {
    join_type: JoinType,
    table: TableRef,
    on: Expr,
}

/// One SELECT statement before its fragments are distributed.
#[derive(Debug, Default)]
struct Statement {
    distinct: bool,
    top: Option<u64>,
    select: Vec<Expr>,
    from: Vec<TableRef>,
    joins: Vec<JoinRef>,
    conditions: Vec<Expr>,
    group: Vec<Expr>,
    having: Vec<Expr>,
    order: Vec<Expr>,
    limit: Option<u64>,
    offset: Option<u64>,
}

struct Reader<'a, 'c> {
    cursor: Cursor<'a>,
    ctx: &'c mut Context,
}

impl Reader<'_, '_> {
    fn statement(&mut self) -> QueryResult<Statement> {
        self.cursor.expect_keyword("SELECT")?;
        let mut stmt = Statement {
            distinct: self.cursor.eat_keyword("DISTINCT"),
            ..Statement::default()
        };
        if self.cursor.eat_keyword("TOP") {
            let parens = self.cursor.eat_symbol("(");
            stmt.top = Some(self.count()?);
            if parens {
                self.cursor.expect_symbol(")")?;
            }
        }
        if self.cursor.is_symbol("*") && self.cursor.is_keyword_at(1, "FROM") {
            self.cursor.next();
        } else {
            loop {
                stmt.select.push(self.select_item()?);
                if !self.cursor.eat_symbol(",") {
                    break;
                }
            }
        }

        self.cursor.expect_keyword("FROM")?;
        stmt.from.push(self.table_ref()?);
        loop {
            if self.cursor.eat_symbol(",") || self.cursor.eat_keywords(&["CROSS", "JOIN"]) {
                stmt.from.push(self.table_ref()?);
                continue;
            }
            let Some(join_type) = self.join_type() else {
                break;
            };
            let table = self.table_ref()?;
            self.cursor.expect_keyword("ON")?;
            let on = self.condition()?;
            stmt.joins.push(JoinRef {
                join_type,
                table,
                on,
            });
        }

        // clauses are accepted in any order
        let mut having_at = None;
        loop {
            if self.cursor.eat_keyword("WHERE") {
                let condition = self.condition()?;
                stmt.conditions.extend(flatten(condition));
            } else if self.cursor.eat_keywords(&["GROUP", "BY"]) {
                stmt.group = self.expr_list()?;
            } else if self.cursor.is_keyword("HAVING") {
                having_at = Some(self.cursor.offset());
                self.cursor.next();
                let condition = self.condition()?;
                stmt.having.extend(flatten(condition));
            } else if self.cursor.eat_keywords(&["ORDER", "BY"]) {
                stmt.order = self.order_list(true)?;
            } else if self.cursor.eat_keyword("LIMIT") {
                let first = self.count()?;
                if self.cursor.eat_symbol(",") {
                    stmt.offset = Some(first);
                    stmt.limit = Some(self.count()?);
                } else {
                    stmt.limit = Some(first);
                }
            } else if self.cursor.eat_keyword("OFFSET") {
                stmt.offset = Some(self.count()?);
                let _ = self.cursor.eat_keyword("ROWS") || self.cursor.eat_keyword("ROW");
            } else {
                break;
            }
        }
        if let Some(position) = having_at {
            if stmt.group.is_empty() {
                return Err(QueryError::parse(position, "HAVING needs a GROUP BY field"));
            }
        }
        Ok(stmt)
    }

    fn count(&mut self) -> QueryResult<u64> {
        let parsed = match self.cursor.peek() {
            Some(Token::Number(n)) => n.parse::<u64>().ok(),
            _ => None,
        };
        match parsed {
            Some(n) => {
                self.cursor.next();
                Ok(n)
            }
            None => Err(self.cursor.error("expected a row count")),
        }
    }

    fn join_type(&mut self) -> Option<JoinType> {
        let mark = self.cursor.mark();
        let join_type = if self.cursor.eat_keyword("LEFT") {
            JoinType::Left
        } else if self.cursor.eat_keyword("RIGHT") {
            JoinType::Right
        } else if self.cursor.eat_keyword("FULL") {
            JoinType::Full
        } else {
            self.cursor.eat_keyword("INNER");
            JoinType::Inner
        };
        self.cursor.eat_keyword("OUTER");
        if self.cursor.eat_keyword("JOIN") {
            Some(join_type)
        } else {
            self.cursor.reset(mark);
            None
        }
    }

    fn table_ref(&mut self) -> QueryResult<TableRef> {
        let name = match self.cursor.peek() {
            Some(Token::Word(w)) | Some(Token::Str(w)) => w.clone(),
            _ => return Err(self.cursor.error("expected a table name")),
        };
        self.cursor.next();
        Ok(TableRef {
            name,
            alias: self.alias()?,
        })
    }

    /// `AS name`, or a bare non-reserved word.
    fn alias(&mut self) -> QueryResult<Option<String>> {
        if self.cursor.eat_keyword("AS") {
            return match self.cursor.next() {
                Some(Token::Word(w)) | Some(Token::Str(w)) => Ok(Some(w)),
                _ => Err(self.cursor.error("expected an alias after AS")),
            };
        }
        match self.cursor.peek() {
            Some(Token::Word(w)) if !is_reserved(w) && !w.contains('.') => {
                let alias = w.clone();
                self.cursor.next();
                Ok(Some(alias))
            }
            _ => Ok(None),
        }
    }

    fn select_item(&mut self) -> QueryResult<Expr> {
        let expr = if self.cursor.eat_symbol("*") {
            Expr::Star
        } else {
            self.expr()?
        };
        Ok(match self.alias()? {
            Some(alias) => Expr::aliased(expr, alias),
            None => expr,
        })
    }

    fn expr_list(&mut self) -> QueryResult<Vec<Expr>> {
        let mut items = vec![self.expr()?];
        while self.cursor.eat_symbol(",") {
            items.push(self.expr()?);
        }
        Ok(items)
    }

    /// Sort keys. `always_sorted` wraps ascending keys too.
    fn order_list(&mut self, always_sorted: bool) -> QueryResult<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            let expr = self.expr()?;
            let order = if self.cursor.eat_keyword("DESC") {
                SortType::Desc
            } else {
                self.cursor.eat_keyword("ASC");
                SortType::Asc
            };
            items.push(if always_sorted || order == SortType::Desc {
                Expr::sorted(expr, order)
            } else {
                expr
            });
            if !self.cursor.eat_symbol(",") {
                return Ok(items);
            }
        }
    }

    fn condition(&mut self) -> QueryResult<Expr> {
        let mut items = vec![self.conjunction()?];
        while self.cursor.eat_keyword("OR") {
            items.push(self.conjunction()?);
        }
        Ok(Expr::group(LogicalOp::Or, items))
    }

    fn conjunction(&mut self) -> QueryResult<Expr> {
        let mut items = vec![self.negation()?];
        while self.cursor.eat_keyword("AND") {
            items.push(self.negation()?);
        }
        Ok(Expr::group(LogicalOp::And, items))
    }

    fn negation(&mut self) -> QueryResult<Expr> {
        if self.cursor.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.negation()?)));
        }
        self.predicate()
    }

    fn predicate(&mut self) -> QueryResult<Expr> {
        if self.cursor.is_symbol("(") && !self.cursor.is_keyword_at(1, "SELECT") {
            let mark = self.cursor.mark();
            self.cursor.next();
            if let Ok(inner) = self.condition() {
                if self.cursor.eat_symbol(")") && !self.continues_expression() {
                    return Ok(inner);
                }
            }
            // an arithmetic group such as `(a + b) > 3`
            self.cursor.reset(mark);
        }
        let left = self.expr()?;
        self.comparison(left)
    }

    fn continues_expression(&self) -> bool {
        match self.cursor.peek() {
            Some(Token::Symbol(s)) => {
                Operator::from_symbol(s).is_some() || BinaryOp::from_symbol(s).is_some()
            }
            Some(Token::Word(w)) => ["LIKE", "IN", "IS", "BETWEEN", "NOT"]
                .iter()
                .any(|kw| kw.eq_ignore_ascii_case(w)),
            _ => false,
        }
    }

    fn comparison(&mut self, left: Expr) -> QueryResult<Expr> {
        let op = match self.cursor.peek() {
            Some(Token::Symbol(s)) => Operator::from_symbol(s),
            _ => None,
        };
        if let Some(op) = op {
            self.cursor.next();
            let right = self.expr()?;
            return Ok(Expr::compare(left, op, right));
        }
        if self.cursor.eat_keyword("IS") {
            let negated = self.cursor.eat_keyword("NOT");
            self.cursor.expect_keyword("NULL")?;
            return Ok(Expr::is_null(left, negated));
        }

        let mark = self.cursor.mark();
        let negated = self.cursor.eat_keyword("NOT");
        if self.cursor.eat_keyword("LIKE") {
            let op = if negated { Operator::NotLike } else { Operator::Like };
            let pattern = self.expr()?;
            return Ok(Expr::compare(left, op, pattern));
        }
        if self.cursor.eat_keyword("IN") {
            let op = if negated { Operator::NotIn } else { Operator::In };
            let list = self.in_list()?;
            return Ok(Expr::compare(left, op, list));
        }
        if self.cursor.eat_keyword("BETWEEN") {
            let low = self.expr()?;
            self.cursor.expect_keyword("AND")?;
            let high = self.expr()?;
            let range = Expr::group(
                LogicalOp::And,
                vec![
                    Expr::compare(left.clone(), Operator::Gte, low),
                    Expr::compare(left, Operator::Lte, high),
                ],
            );
            return Ok(if negated {
                Expr::Not(Box::new(range))
            } else {
                range
            });
        }
        self.cursor.reset(mark);
        Ok(left)
    }

    fn in_list(&mut self) -> QueryResult<Expr> {
        self.cursor.expect_symbol("(")?;
        if self.cursor.is_keyword("SELECT") {
            let sub = self.subquery()?;
            self.cursor.expect_symbol(")")?;
            return Ok(Expr::Subquery(Box::new(sub)));
        }
        let mut values = Vec::new();
        loop {
            let position = self.cursor.offset();
            match self.expr()? {
                Expr::Literal(value) => values.push(value),
                other => {
                    return Err(QueryError::parse(
                        position,
                        format!("IN list expects literals, found {}", other),
                    ));
                }
            }
            if !self.cursor.eat_symbol(",") {
                break;
            }
        }
        self.cursor.expect_symbol(")")?;
        Ok(Expr::List(values))
    }

    /// Nested SELECT, combined into one query.
    fn subquery(&mut self) -> QueryResult<Query> {
        let stmt = self.statement()?;
        let queries = assemble(stmt, self.ctx)?;
        let mut sub = Query::combine_all(queries, &self.ctx.registry)?;
        sub.break_lines = false;
        Ok(sub)
    }

    fn expr(&mut self) -> QueryResult<Expr> {
        let mut left = self.term()?;
        while let Some(op) = self.binary_op(&["+", "-", "||"]) {
            let right = self.term()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> QueryResult<Expr> {
        let mut left = self.primary()?;
        while let Some(op) = self.binary_op(&["*", "/", "%"]) {
            let right = self.primary()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn binary_op(&mut self, symbols: &[&str]) -> Option<BinaryOp> {
        let op = match self.cursor.peek() {
            Some(Token::Symbol(s)) if symbols.contains(&s.as_str()) => BinaryOp::from_symbol(s),
            _ => None,
        };
        if op.is_some() {
            self.cursor.next();
        }
        op
    }

    fn primary(&mut self) -> QueryResult<Expr> {
        let start = self.cursor.mark();
        match self.cursor.next() {
            Some(Token::Number(n)) => Ok(Expr::Literal(Value::infer(&n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Symbol(s)) if s == "-" => match self.cursor.next() {
                Some(Token::Number(n)) => Ok(Expr::Literal(Value::infer(&format!("-{n}")))),
                _ => {
                    self.cursor.reset(start + 1);
                    let inner = self.primary()?;
                    Ok(Expr::raw(format!("-{}", inner)))
                }
            },
            Some(Token::Symbol(s)) if s == "(" => {
                if self.cursor.is_keyword("SELECT") {
                    let sub = self.subquery()?;
                    self.cursor.expect_symbol(")")?;
                    return Ok(Expr::Subquery(Box::new(sub)));
                }
                let inner = self.expr()?;
                self.cursor.expect_symbol(")")?;
                Ok(match inner {
                    // a call without a name renders plain parentheses
                    binary @ Expr::Binary { .. } => Expr::Call {
                        name: String::new(),
                        args: vec![binary],
                    },
                    other => other,
                })
            }
            Some(Token::Word(w)) => self.word(w, start),
            _ => {
                self.cursor.reset(start);
                Err(self.cursor.error("expected an expression"))
            }
        }
    }

    fn word(&mut self, word: String, start: usize) -> QueryResult<Expr> {
        let call = self.cursor.is_symbol("(");
        match word.to_ascii_uppercase().as_str() {
            "NULL" => Ok(Expr::Literal(Value::Null)),
            "TRUE" => Ok(Expr::Literal(Value::Bool(true))),
            "FALSE" => Ok(Expr::Literal(Value::Bool(false))),
            "CASE" => self.case_expr(),
            "CURRENT_DATE" | "SYSDATE" if !call => {
                Ok(Expr::function(FunctionCall::new(Func::CurrentDate, Vec::new())))
            }
            _ if call => self.call(word, start),
            _ if is_reserved(&word) => {
                self.cursor.reset(start);
                Err(self.cursor.error("expected an expression"))
            }
            _ => Ok(Expr::field(&word)),
        }
    }

    fn case_expr(&mut self) -> QueryResult<Expr> {
        let operand = if self.cursor.is_keyword("WHEN") {
            None
        } else {
            Some(self.expr()?)
        };
        let mut branches = Vec::new();
        while self.cursor.eat_keyword("WHEN") {
            let when = match &operand {
                Some(operand) => Expr::compare(operand.clone(), Operator::Eq, self.expr()?),
                None => self.condition()?,
            };
            self.cursor.expect_keyword("THEN")?;
            branches.push((when, self.expr()?));
        }
        if branches.is_empty() {
            return Err(self.cursor.error("expected WHEN"));
        }
        let default = if self.cursor.eat_keyword("ELSE") {
            Some(Box::new(self.expr()?))
        } else {
            None
        };
        self.cursor.expect_keyword("END")?;
        Ok(Expr::Case { branches, default })
    }

    fn call(&mut self, name: String, start: usize) -> QueryResult<Expr> {
        self.cursor.expect_symbol("(")?;
        let mut args = Vec::new();
        match name.to_ascii_uppercase().as_str() {
            "EXTRACT" => {
                let part = self.cursor.expect_word()?;
                self.cursor.expect_keyword("FROM")?;
                let field = self.expr()?;
                self.cursor.expect_symbol(")")?;
                if part.eq_ignore_ascii_case("YEAR") {
                    return self.finish_call(Func::Year, vec![field]);
                }
                return Ok(Expr::raw(self.cursor.slice(start)));
            }
            "DATE_PART" => {
                let part = self.expr()?;
                self.cursor.expect_symbol(",")?;
                let field = self.expr()?;
                self.cursor.expect_symbol(")")?;
                if matches!(&part, Expr::Literal(Value::String(p)) if p.eq_ignore_ascii_case("year"))
                {
                    return self.finish_call(Func::Year, vec![field]);
                }
                return Ok(Expr::raw(self.cursor.slice(start)));
            }
            "CAST" => {
                let field = self.expr()?;
                self.cursor.expect_keyword("AS")?;
                let from = self.cursor.mark();
                while !self.cursor.is_done() && !self.cursor.is_symbol(")") {
                    self.cursor.next();
                }
                let type_name = self.cursor.slice(from).to_string();
                self.cursor.expect_symbol(")")?;
                return self.finish_call(Func::Cast, vec![field, Expr::raw(type_name)]);
            }
            "COUNT" if self.cursor.eat_symbol("*") => args.push(Expr::Star),
            _ => {}
        }

        if args.is_empty() && !self.cursor.is_symbol(")") {
            let distinct = self.cursor.eat_keyword("DISTINCT");
            loop {
                args.push(self.expr()?);
                // SUBSTRING(x FROM a FOR b) reads like a comma list
                if self.cursor.eat_symbol(",")
                    || self.cursor.eat_keyword("FROM")
                    || self.cursor.eat_keyword("FOR")
                {
                    continue;
                }
                break;
            }
            if distinct {
                args[0] = Expr::Distinct(Box::new(args[0].clone()));
            }
        }
        self.cursor.expect_symbol(")")?;

        match Func::from_name(&name) {
            Some(Func::DateDiff) if args.len() == 3 => {
                // DATEDIFF(day, start, end)
                args.remove(0);
                args.reverse();
                self.finish_call(Func::DateDiff, args)
            }
            Some(func) => self.finish_call(func, args),
            None if self.cursor.is_keyword("OVER") => {
                self.cursor.next();
                self.window_frame()?;
                Ok(Expr::raw(self.cursor.slice(start)))
            }
            None => Ok(Expr::Call { name, args }),
        }
    }

    fn finish_call(&mut self, func: Func, args: Vec<Expr>) -> QueryResult<Expr> {
        let mut call = FunctionCall::new(func, args);
        if self.cursor.eat_keyword("OVER") {
            call.frame = Some(self.window_frame()?);
        }
        Ok(Expr::function(call))
    }

    fn window_frame(&mut self) -> QueryResult<Frame> {
        self.cursor.expect_symbol("(")?;
        let mut frame = Frame::default();
        if self.cursor.eat_keywords(&["PARTITION", "BY"]) {
            frame.partition = self.expr_list()?;
        }
        if self.cursor.eat_keywords(&["ORDER", "BY"]) {
            frame.order = self.order_list(false)?;
        }
        if self.cursor.eat_keyword("ROWS") {
            self.cursor.expect_keyword("BETWEEN")?;
            let start = self.bound()?;
            self.cursor.expect_keyword("AND")?;
            frame.rows = Some((start, self.bound()?));
        }
        self.cursor.expect_symbol(")")?;
        Ok(frame)
    }

    fn bound(&mut self) -> QueryResult<FrameBound> {
        if self.cursor.eat_keyword("UNBOUNDED") {
            if self.cursor.eat_keyword("PRECEDING") {
                return Ok(FrameBound::UnboundedPreceding);
            }
            self.cursor.expect_keyword("FOLLOWING")?;
            return Ok(FrameBound::UnboundedFollowing);
        }
        if self.cursor.eat_keyword("CURRENT") {
            self.cursor.expect_keyword("ROW")?;
            return Ok(FrameBound::CurrentRow);
        }
        let rows = u32::try_from(self.count()?)
            .map_err(|_| QueryError::parse(self.cursor.offset(), "frame bound too large"))?;
        if self.cursor.eat_keyword("PRECEDING") {
            return Ok(FrameBound::Preceding(rows));
        }
        self.cursor.expect_keyword("FOLLOWING")?;
        Ok(FrameBound::Following(rows))
    }
}

/// Top-level AND items of a condition.
fn flatten(condition: Expr) -> Vec<Expr> {
    match condition {
        Expr::Group {
            op: LogicalOp::And,
            items,
        } => items.into_iter().flat_map(flatten).collect(),
        other => vec![other],
    }
}

/// Turn `a.f = b.g` between two tables in scope into a registry binding.
/// `joined` is the table being attached, which is always the referenced side.
fn link_equality(scope: &mut Scope, ctx: &mut Context, condition: &Expr, joined: Option<usize>) -> bool {
    let Expr::Compare {
        left,
        op: Operator::Eq,
        right: Some(right),
    } = condition
    else {
        return false;
    };
    let (
        Expr::Column {
            table: Some(a),
            name: f,
        },
        Expr::Column {
            table: Some(b),
            name: g,
        },
    ) = (left.as_ref(), right.as_ref())
    else {
        return false;
    };
    let (Some(ia), Some(ib)) = (scope.lookup(a), scope.lookup(b)) else {
        return false;
    };
    if ia == ib {
        return false;
    }
    if joined == Some(ia) {
        scope.link(ctx, ib, ia, g, f);
    } else {
        scope.link(ctx, ia, ib, f, g);
    }
    true
}

fn assemble(stmt: Statement, ctx: &mut Context) -> QueryResult<Vec<Query>> {
    let mut scope = Scope::new();
    for table in &stmt.from {
        scope.enter(&table.name, table.alias.as_deref(), ctx);
    }

    let mut leftovers = Vec::new();
    for join in stmt.joins {
        let joined = scope.enter(&join.table.name, join.table.alias.as_deref(), ctx);
        if let Some(query) = scope.get_mut(joined) {
            query.join_type = join.join_type;
        }
        for condition in flatten(join.on) {
            if !link_equality(&mut scope, ctx, &condition, Some(joined)) {
                leftovers.push(condition);
            }
        }
    }
    for condition in stmt.conditions {
        if scope.queries.len() > 1 && link_equality(&mut scope, ctx, &condition, None) {
            continue;
        }
        leftovers.push(condition);
    }
    for condition in leftovers {
        scope.route(ClauseKind::Where, condition);
    }

    let mut select = stmt.select;
    if stmt.distinct {
        match select.first_mut() {
            Some(first) => *first = Expr::Distinct(Box::new(first.clone())),
            None => select.push(Expr::Distinct(Box::new(Expr::Star))),
        }
    }
    for item in select {
        scope.route(ClauseKind::Select, item);
    }

    let mut group = stmt.group;
    if !stmt.having.is_empty() {
        if let Some(last) = group.pop() {
            group.push(Expr::Having {
                group: Box::new(last),
                conditions: stmt.having,
            });
        }
    }
    for item in group {
        scope.route(ClauseKind::GroupBy, item);
    }
    for item in stmt.order {
        scope.route(ClauseKind::OrderBy, item);
    }

    if let Some(base) = scope.get_mut(0) {
        if let Some(count) = stmt.top {
            base.limit(count, 0, Dialect::SqlServer);
        }
        if stmt.limit.is_some() || stmt.offset.is_some() {
            let count = stmt.limit.unwrap_or(ctx.auto_limit);
            base.limit(count, stmt.offset.unwrap_or(0), Dialect::Ansi);
        }
    }
    Ok(scope.into_queries())
}
