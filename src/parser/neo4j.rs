//! Neo4j `MATCH ... RETURN` statements.
//!
//! Node labels are tables and node variables are aliases. A labelled
//! relationship (`<-[c:Cast]->`) is a table of its own holding a foreign
//! key to each neighbour; a bare edge (`-->`, `<--`) puts the key on the
//! node the arrow starts from.

use once_cell::sync::Lazy;
use regex::Regex;

use super::scope::Scope;
use super::tokens::{Cursor, LexOptions, Token};
use super::{QueryParser, Syntax};
use crate::ast::builders::Where;
use crate::ast::{
    BinaryOp, ClauseKind, Expr, Func, FunctionCall, LogicalOp, Operator, Query, SortType,
};
use crate::config::Context;
use crate::error::{QueryError, QueryResult};
use crate::transpiler::nosql::regex_to_like;
use crate::transpiler::Dialect;

static NEO4J_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^\s*match\b|\(\s*\w*\s*:\s*\w+").unwrap());

pub struct Neo4jParser;

impl QueryParser for Neo4jParser {
    fn syntax(&self) -> Syntax {
        Syntax::Neo4j
    }

    fn can_handle(&self, text: &str) -> bool {
        NEO4J_RE.is_match(text)
    }

    fn parse(&self, text: &str, ctx: &mut Context) -> QueryResult<Vec<Query>> {
        let mut reader = Reader {
            cursor: Cursor::new(text, LexOptions::pattern())?,
            scope: Scope::new(),
            ctx,
        };
        reader.statement()?;
        Ok(reader.scope.into_queries())
    }
}

/// Edge between two nodes of a path.
enum Link {
    /// `-->`: the left node holds the key
    Forward,
    /// `<--`: the right node holds the key
    Backward,
    /// `-[r:Type]-` in any direction: `r` holds both keys
    Table(usize),
}

struct Reader<'a, 'c> {
    cursor: Cursor<'a>,
    scope: Scope,
    ctx: &'c mut Context,
}

impl Reader<'_, '_> {
    fn statement(&mut self) -> QueryResult<()> {
        // `MATCH` may be left out before a bare pattern
        self.cursor.eat_keyword("OPTIONAL");
        self.cursor.eat_keyword("MATCH");
        loop {
            self.path()?;
            if !self.cursor.eat_symbol(",") {
                break;
            }
        }
        if self.cursor.eat_keyword("WHERE") {
            let condition = self.condition()?;
            for item in flatten(condition) {
                self.scope.route(ClauseKind::Where, item);
            }
        }
        self.cursor.expect_keyword("RETURN")?;
        self.return_items()?;
        if self.cursor.eat_keywords(&["ORDER", "BY"]) {
            loop {
                let expr = self.expr()?;
                let order = if self.cursor.eat_keyword("DESC") {
                    SortType::Desc
                } else {
                    self.cursor.eat_keyword("ASC");
                    SortType::Asc
                };
                self.scope.route(ClauseKind::OrderBy, Expr::sorted(expr, order));
                if !self.cursor.eat_symbol(",") {
                    break;
                }
            }
        }
        let skip = if self.cursor.eat_keyword("SKIP") { Some(self.count()?) } else { None };
        let limit = if self.cursor.eat_keyword("LIMIT") { Some(self.count()?) } else { None };
        if skip.is_some() || limit.is_some() {
            let count = limit.unwrap_or(self.ctx.auto_limit);
            if let Some(base) = self.scope.get_mut(0) {
                base.limit(count, skip.unwrap_or(0), Dialect::Ansi);
            }
        }
        self.cursor.eat_symbol(";");
        if !self.cursor.is_done() {
            return Err(self.cursor.error("unexpected trailing text"));
        }
        Ok(())
    }

    fn count(&mut self) -> QueryResult<u64> {
        match self.cursor.next() {
            Some(Token::Number(n)) => n
                .parse()
                .map_err(|_| QueryError::parse(self.cursor.offset(), "expected a row count")),
            _ => Err(self.cursor.error("expected a row count")),
        }
    }

    /// `(a:A)-[r:R]->(b:B)<--(c:C) ...`
    fn path(&mut self) -> QueryResult<()> {
        let mut left = self.node()?;
        while let Some(link) = self.link()? {
            let right = self.node()?;
            match link {
                Link::Forward => self.bind(left, right),
                Link::Backward => self.bind(right, left),
                Link::Table(owner) => {
                    self.bind(owner, left);
                    self.bind(owner, right);
                }
            }
            left = right;
        }
        Ok(())
    }

    /// `(alias:Label {prop: value})`; a known alias reuses its query.
    fn node(&mut self) -> QueryResult<usize> {
        self.cursor.expect_symbol("(")?;
        let position = self.element(")")?;
        self.cursor.expect_symbol(")")?;
        Ok(position)
    }

    fn element(&mut self, close: &str) -> QueryResult<usize> {
        let alias = match self.cursor.peek() {
            Some(Token::Word(w)) => {
                let w = w.clone();
                self.cursor.next();
                Some(w)
            }
            _ => None,
        };
        let label = if self.cursor.eat_symbol(":") {
            Some(self.cursor.expect_word()?)
        } else {
            None
        };
        let position = match (&alias, &label) {
            (Some(alias), None) => match self.scope.lookup(alias) {
                Some(position) => position,
                None => self.scope.enter(alias, Some(alias), self.ctx),
            },
            (alias, Some(label)) => self.scope.enter(label, alias.as_deref(), self.ctx),
            (None, None) => return Err(self.cursor.error(format!("expected a label before '{close}'"))),
        };
        if self.cursor.eat_symbol("{") {
            self.properties(position)?;
        }
        Ok(position)
    }

    /// Property map: equality conditions on the node.
    fn properties(&mut self, position: usize) -> QueryResult<()> {
        while !self.cursor.eat_symbol("}") {
            let key = self.cursor.expect_word()?;
            self.cursor.expect_symbol(":")?;
            let value = self
                .cursor
                .eat_literal()
                .ok_or_else(|| self.cursor.error("expected a property value"))?;
            if let Some(query) = self.scope.get_mut(position) {
                let condition = Where::eq(value).to_expr(&key, query)?;
                query.add_clause(ClauseKind::Where, condition);
            }
            if !self.cursor.eat_symbol(",") {
                self.cursor.expect_symbol("}")?;
                break;
            }
        }
        Ok(())
    }

    /// Relationship between two nodes, or `None` at the end of a path.
    fn link(&mut self) -> QueryResult<Option<Link>> {
        let backward = if self.cursor.eat_symbol("<-") {
            true
        } else if self.cursor.eat_symbol("-") {
            false
        } else {
            return Ok(None);
        };
        let mut table = None;
        if self.cursor.eat_symbol("[") {
            let labelled = self.cursor.is_symbol(":") || self.cursor.is_symbol_at(1, ":");
            if labelled {
                table = Some(self.element("]")?);
            } else {
                // `[r]`: a variable without a type is a plain edge
                while !self.cursor.is_symbol("]") && self.cursor.next().is_some() {}
            }
            self.cursor.expect_symbol("]")?;
        }
        let forward = if self.cursor.eat_symbol("->") {
            true
        } else {
            self.cursor.expect_symbol("-")?;
            false
        };
        Ok(Some(match table {
            Some(position) => Link::Table(position),
            None if backward && !forward => Link::Backward,
            None => Link::Forward,
        }))
    }

    /// Register `owner -> referenced`, keeping a binding the registry
    /// already knows.
    fn bind(&mut self, owner: usize, referenced: usize) {
        let owner_table = self.scope.queries[owner].table_name.clone();
        let target = &self.scope.queries[referenced];
        let (foreign_key, primary_key) = match self.ctx.registry.find(&owner_table, &target.table_name) {
            Some(rel) => (rel.foreign_key.clone(), rel.primary_key.clone()),
            None => (
                format!("{}_id", target.table_name.to_lowercase()),
                target.key_field.clone().unwrap_or_else(|| "id".to_string()),
            ),
        };
        tracing::trace!(owner = %owner_table, referenced = %target.table_name, %foreign_key, "edge");
        self.scope
            .link(self.ctx, owner, referenced, &foreign_key, &primary_key);
    }

    fn return_items(&mut self) -> QueryResult<()> {
        let distinct = self.cursor.eat_keyword("DISTINCT");
        let mut items = Vec::new();
        loop {
            if self.cursor.eat_symbol("*") {
                items.push(Expr::Star);
            } else {
                let expr = self.expr()?;
                items.push(if self.cursor.eat_keyword("AS") {
                    Expr::aliased(expr, self.cursor.expect_word()?)
                } else {
                    expr
                });
            }
            if !self.cursor.eat_symbol(",") {
                break;
            }
        }
        let aggregated = items
            .iter()
            .any(|e| matches!(e.inner(), Expr::Function(call) if call.func.is_aggregate()));
        for (i, item) in items.into_iter().enumerate() {
            if aggregated && !matches!(item.inner(), Expr::Function(_) | Expr::Star) {
                self.scope.route(ClauseKind::GroupBy, item.inner().clone());
            }
            let item = match item {
                // `RETURN *` is the empty projection
                Expr::Star if !distinct => continue,
                item if distinct && i == 0 => Expr::Distinct(Box::new(item)),
                item => item,
            };
            self.scope.route(ClauseKind::Select, item);
        }
        Ok(())
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
            return Ok(negate(self.negation()?));
        }
        if self.cursor.is_symbol("(") {
            let mark = self.cursor.mark();
            self.cursor.next();
            if let Ok(inner) = self.condition() {
                if self.cursor.eat_symbol(")") && !continues_expression(&self.cursor) {
                    return Ok(inner);
                }
            }
            self.cursor.reset(mark);
        }
        self.predicate()
    }

    fn predicate(&mut self) -> QueryResult<Expr> {
        let left = self.expr()?;
        let builder = if self.cursor.eat_keywords(&["STARTS", "WITH"]) {
            Where::starts_with(&self.text()?)
        } else if self.cursor.eat_keywords(&["ENDS", "WITH"]) {
            Where::ends_with(&self.text()?)
        } else if self.cursor.eat_keyword("CONTAINS") {
            Where::contains(&self.text()?)
        } else if self.cursor.is_symbol("=") && self.cursor.is_symbol_at(1, "~") {
            self.cursor.next();
            self.cursor.next();
            Where::like(&regex_to_like(&self.text()?))
        } else if self.cursor.eat_keyword("IN") {
            self.cursor.expect_symbol("[")?;
            let mut values = Vec::new();
            while let Some(value) = self.cursor.eat_literal() {
                values.push(value);
                if !self.cursor.eat_symbol(",") {
                    break;
                }
            }
            self.cursor.expect_symbol("]")?;
            Where::inside(values)
        } else if self.cursor.eat_keyword("IS") {
            let negated = self.cursor.eat_keyword("NOT");
            self.cursor.expect_keyword("NULL")?;
            return Ok(Expr::is_null(left, negated));
        } else {
            let op = match self.cursor.peek() {
                Some(Token::Symbol(symbol)) => Operator::from_symbol(symbol),
                _ => None,
            }
            .ok_or_else(|| self.cursor.error("expected a comparison"))?;
            self.cursor.next();
            let right = self.expr()?;
            return Ok(Expr::compare(left, op, right));
        };
        match self.scope.queries.first() {
            Some(base) => builder.apply_to(left, base),
            None => Err(self.cursor.error("condition before any node")),
        }
    }

    fn text(&mut self) -> QueryResult<String> {
        match self.cursor.next() {
            Some(Token::Str(s)) => Ok(s),
            _ => Err(self.cursor.error("expected a quoted string")),
        }
    }

    fn expr(&mut self) -> QueryResult<Expr> {
        let mut left = self.primary()?;
        loop {
            let op = match self.cursor.peek() {
                Some(Token::Symbol(s)) => BinaryOp::from_symbol(s),
                _ => None,
            };
            let Some(op) = op else {
                return Ok(left);
            };
            self.cursor.next();
            let right = self.primary()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
    }

    fn primary(&mut self) -> QueryResult<Expr> {
        if let Some(value) = self.cursor.eat_literal() {
            return Ok(Expr::Literal(value));
        }
        if self.cursor.eat_symbol("(") {
            let inner = self.expr()?;
            self.cursor.expect_symbol(")")?;
            return Ok(inner);
        }
        let name = self.cursor.expect_word()?;
        if !self.cursor.eat_symbol("(") {
            return Ok(match name.split_once('.') {
                Some(_) => Expr::field(&name),
                None if self.scope.lookup(&name).is_some() => Expr::qualified(&name, "*"),
                None => Expr::field(&name),
            });
        }
        let distinct = self.cursor.eat_keyword("DISTINCT");
        let mut args = Vec::new();
        while !self.cursor.eat_symbol(")") {
            args.push(if self.cursor.eat_symbol("*") { Expr::Star } else { self.expr()? });
            if !self.cursor.eat_symbol(",") {
                self.cursor.expect_symbol(")")?;
                break;
            }
        }
        if distinct {
            if let Some(first) = args.first_mut() {
                *first = Expr::Distinct(Box::new(first.clone()));
            }
        }
        Ok(match Func::from_name(&name) {
            Some(func) => Expr::function(FunctionCall::new(func, args)),
            None => Expr::Call { name, args },
        })
    }
}

fn continues_expression(cursor: &Cursor<'_>) -> bool {
    matches!(cursor.peek(), Some(Token::Symbol(s)) if BinaryOp::from_symbol(s).is_some() || Operator::from_symbol(s).is_some())
}

/// `NOT x IN [..]` and friends fold into the inverse operator.
fn negate(expr: Expr) -> Expr {
    match expr {
        Expr::Compare {
            left,
            op: op @ (Operator::Like | Operator::NotLike | Operator::In | Operator::NotIn | Operator::IsNull | Operator::IsNotNull),
            right,
        } => Expr::Compare {
            left,
            op: op.inverse(),
            right,
        },
        other => Expr::Not(Box::new(other)),
    }
}

fn flatten(condition: Expr) -> Vec<Expr> {
    match condition {
        Expr::Group {
            op: LogicalOp::And,
            items,
        } => items,
        other => vec![other],
    }
}
