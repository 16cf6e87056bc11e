//! Bracketed node patterns:
//! `Actor(name, id ?age = 40) <- Cast(actor_id, movie_id) -> Movie(id, title ^title)`.
//!
//! Inside a node, items are separated by `,` or introduced by a marker:
//!
//! | Item | Meaning |
//! |---|---|
//! | `field`, `*` | SELECT |
//! | `?cond` | WHERE (`AND`/`OR`, comparisons, `LIKE`, `IN`, `IS NULL`) |
//! | `^field` / `^!field` | ORDER BY (context sort / descending) |
//! | `@field` | GROUP BY and SELECT |
//! | `func$field` | aggregate in SELECT |
//!
//! `A(..) -> B(..)` means A holds the foreign key to B, `<-` the reverse.
//! An optional `[template]` after the arrow names the key (`{}` is the
//! referenced table); otherwise the fields next to the arrow are used.

use once_cell::sync::Lazy;
use regex::Regex;

use super::scope::Scope;
use super::tokens::{Cursor, LexOptions, Token};
use super::{QueryParser, Syntax};
use crate::ast::builders::{Condition, Where};
use crate::ast::{ClauseKind, Expr, Func, FunctionCall, LogicalOp, Operator, Query, SortType};
use crate::config::Context;
use crate::error::{QueryError, QueryResult};

static PATTERN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\w+(\s+\w+)?\s*\(").unwrap());

pub struct CypherParser;

impl QueryParser for CypherParser {
    fn syntax(&self) -> Syntax {
        Syntax::Cypher
    }

    fn can_handle(&self, text: &str) -> bool {
        PATTERN_RE.is_match(text)
    }

    fn parse(&self, text: &str, ctx: &mut Context) -> QueryResult<Vec<Query>> {
        let mut cursor = Cursor::new(text, LexOptions::pattern())?;
        let mut scope = Scope::new();
        let mut previous = node(&mut cursor, &mut scope, ctx)?;
        while let Some(edge) = arrow(&mut cursor)? {
            let mut current = node(&mut cursor, &mut scope, ctx)?;
            let (owner, referenced) = match edge.direction {
                Direction::Right => (&mut previous, &mut current),
                Direction::Left => (&mut current, &mut previous),
            };
            link(&mut scope, ctx, owner, referenced, &edge)?;
            previous = current;
        }
        cursor.eat_symbol(";");
        if !cursor.is_done() {
            return Err(cursor.error("expected '->' or '<-'"));
        }
        Ok(scope.into_queries())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Direction {
    /// `->`: the left node owns the key
    Right,
    /// `<-`: the right node owns the key
    Left,
}

struct Edge {
    direction: Direction,
    template: Option<String>,
}

/// A parsed node and the plain SELECT fields it can still give up as keys.
struct Node {
    position: usize,
    /// Plain fields in SELECT order
    fields: Vec<String>,
}

fn arrow(cursor: &mut Cursor<'_>) -> QueryResult<Option<Edge>> {
    let direction = if cursor.eat_symbol("->") {
        Direction::Right
    } else if cursor.eat_symbol("<-") {
        Direction::Left
    } else {
        return Ok(None);
    };
    let mut template = None;
    if cursor.eat_symbol("[") {
        let start = cursor.mark();
        while !cursor.is_symbol("]") {
            if cursor.next().is_none() {
                return Err(cursor.error("unclosed key template"));
            }
        }
        template = Some(cursor.slice(start).trim().to_string());
        cursor.expect_symbol("]")?;
    }
    Ok(Some(Edge {
        direction,
        template,
    }))
}

fn node(cursor: &mut Cursor<'_>, scope: &mut Scope, ctx: &Context) -> QueryResult<Node> {
    let table = cursor.expect_word()?;
    let alias = match cursor.peek() {
        Some(Token::Word(alias)) => {
            let alias = alias.clone();
            cursor.next();
            Some(alias)
        }
        _ => None,
    };
    cursor.expect_symbol("(")?;
    let position = scope.enter(&table, alias.as_deref(), ctx);
    let mut fields = Vec::new();
    loop {
        if cursor.eat_symbol(")") {
            break;
        }
        if cursor.eat_symbol(",") {
            continue;
        }
        let Some(query) = scope.get_mut(position) else {
            break;
        };
        item(cursor, query, ctx, &mut fields)?;
    }
    tracing::trace!(%table, fields = fields.len(), "pattern node");
    Ok(Node { position, fields })
}

fn item(
    cursor: &mut Cursor<'_>,
    query: &mut Query,
    ctx: &Context,
    fields: &mut Vec<String>,
) -> QueryResult<()> {
    if cursor.eat_symbol("?") {
        let condition = condition(cursor, query)?;
        query.add_clause(ClauseKind::Where, condition);
    } else if cursor.eat_symbol("^") {
        let order = if cursor.eat_symbol("!") {
            SortType::Desc
        } else {
            ctx.sort
        };
        let field = cursor.expect_word()?;
        let sorted = Expr::sorted(query.qualify(&field), order);
        query.add_clause(ClauseKind::OrderBy, sorted);
    } else if cursor.eat_symbol("@") {
        let field = cursor.expect_word()?;
        let column = query.qualify(&field);
        query.add_clause(ClauseKind::GroupBy, column.clone());
        query.add_clause(ClauseKind::Select, column);
    } else if cursor.eat_symbol("*") {
        query.add_clause(ClauseKind::Select, Expr::Star);
    } else {
        let name = cursor.expect_word()?;
        if cursor.eat_symbol("$") {
            let func = Func::from_name(&name).ok_or_else(|| QueryError::UnknownFunction(name.clone()))?;
            let field = if cursor.eat_symbol("*") {
                "*".to_string()
            } else {
                cursor.expect_word()?
            };
            let call = FunctionCall::new(func, vec![query.qualify(&field)]);
            query.add_clause(ClauseKind::Select, Expr::function(call));
        } else {
            query.add_clause(ClauseKind::Select, query.qualify(&name));
            fields.push(name);
        }
    }
    Ok(())
}

/// `a = 1 AND (b LIKE 'x%' OR c IS NULL)`
fn condition(cursor: &mut Cursor<'_>, query: &Query) -> QueryResult<Expr> {
    let mut items = vec![conjunction(cursor, query)?];
    while cursor.eat_keyword("OR") {
        items.push(conjunction(cursor, query)?);
    }
    Ok(Expr::group(LogicalOp::Or, items))
}

fn conjunction(cursor: &mut Cursor<'_>, query: &Query) -> QueryResult<Expr> {
    let mut items = vec![predicate(cursor, query)?];
    while cursor.eat_keyword("AND") {
        items.push(predicate(cursor, query)?);
    }
    Ok(Expr::group(LogicalOp::And, items))
}

fn predicate(cursor: &mut Cursor<'_>, query: &Query) -> QueryResult<Expr> {
    if cursor.eat_keyword("NOT") {
        return Ok(Expr::Not(Box::new(predicate(cursor, query)?)));
    }
    if cursor.eat_symbol("(") {
        let inner = condition(cursor, query)?;
        cursor.expect_symbol(")")?;
        return Ok(inner);
    }
    let field = cursor.expect_word()?;
    let negated = cursor.eat_keyword("NOT");
    let builder = if cursor.eat_keyword("LIKE") {
        match cursor.eat_literal() {
            Some(pattern) => Where::like(pattern.as_str().unwrap_or_default()),
            None => return Err(cursor.error("expected a LIKE pattern")),
        }
    } else if cursor.eat_keyword("IN") {
        cursor.expect_symbol("(")?;
        let mut values = Vec::new();
        while let Some(value) = cursor.eat_literal() {
            values.push(value);
            if !cursor.eat_symbol(",") {
                break;
            }
        }
        cursor.expect_symbol(")")?;
        Where::inside(values)
    } else if cursor.eat_keyword("IS") {
        let not_null = cursor.eat_keyword("NOT");
        cursor.expect_keyword("NULL")?;
        if not_null {
            Where::is_null().negate()
        } else {
            Where::is_null()
        }
    } else {
        let op = match cursor.next() {
            Some(Token::Symbol(symbol)) => Operator::from_symbol(&symbol),
            _ => None,
        }
        .ok_or_else(|| cursor.error("expected a comparison"))?;
        match cursor.eat_literal() {
            Some(value) => Where::new(Condition::Compare { op, value }),
            None => Where::new(Condition::Field {
                op,
                field: cursor.expect_word()?,
            }),
        }
    };
    let builder = if negated { builder.negate() } else { builder };
    builder.to_expr(&field, query)
}

/// Bind `owner -> referenced`, taking the key names from the template or
/// from the SELECT fields next to the arrow.
fn link(
    scope: &mut Scope,
    ctx: &mut Context,
    owner: &mut Node,
    referenced: &mut Node,
    edge: &Edge,
) -> QueryResult<()> {
    let owner_is_left = edge.direction == Direction::Right;
    let referenced_table = scope.queries[referenced.position].table_name.clone();
    let (foreign_key, primary_key) = match &edge.template {
        Some(template) => {
            let foreign_key = template.replace("{}", &referenced_table.to_lowercase());
            let primary_key = scope.queries[referenced.position]
                .key_field
                .clone()
                .unwrap_or_else(|| "id".to_string());
            (foreign_key, primary_key)
        }
        None => {
            let owner_table = &scope.queries[owner.position].table_name;
            let foreign_key = take_adjacent(&mut owner.fields, owner_is_left)
                .ok_or_else(|| QueryError::MissingKey(owner_table.clone()))?;
            let primary_key = match take_adjacent(&mut referenced.fields, !owner_is_left) {
                Some(field) => field,
                None => scope.queries[referenced.position]
                    .key_field
                    .clone()
                    .ok_or_else(|| QueryError::MissingKey(referenced_table.clone()))?,
            };
            retract(&mut scope.queries[owner.position], &foreign_key);
            retract(&mut scope.queries[referenced.position], &primary_key);
            (foreign_key, primary_key)
        }
    };
    scope.link(ctx, owner.position, referenced.position, &foreign_key, &primary_key);
    Ok(())
}

/// Last field of a left node, first field of a right node.
fn take_adjacent(fields: &mut Vec<String>, from_end: bool) -> Option<String> {
    if from_end {
        fields.pop()
    } else if fields.is_empty() {
        None
    } else {
        Some(fields.remove(0))
    }
}

fn retract(query: &mut Query, field: &str) {
    query.delete(field, &[ClauseKind::Select], true);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_handle() {
        assert!(CypherParser.can_handle("Movie(title)"));
        assert!(CypherParser.can_handle("Movie m (title)"));
        assert!(!CypherParser.can_handle("db.movies.find()"));
    }

    #[test]
    fn test_take_adjacent() {
        let mut fields = vec!["a".to_string(), "b".to_string()];
        assert_eq!(take_adjacent(&mut fields, true).as_deref(), Some("b"));
        assert_eq!(take_adjacent(&mut fields, false).as_deref(), Some("a"));
        assert_eq!(take_adjacent(&mut fields, false), None);
    }
}
