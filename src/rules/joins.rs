use super::{Rewrite, Rule};
use crate::ast::{ClauseKind, Expr, JoinType, Operator, Query, Registry};
use crate::config::Context;
use crate::error::QueryResult;
use crate::parser::{parse_with, Syntax};
use crate::transpiler::{Dialect, ToSql};

/// Replaces a join that only filters with an `IN (SELECT ...)` predicate.
///
/// The query is rendered and parsed back to recover one query per table.
/// A joined table is kept when it projects fields, has no WHERE of its
/// own, is not an inner join, has no known key to its neighbour, links to
/// more than one other table, or is mentioned by another table's fragments.
pub struct JoinToSubquery;

impl Rewrite for JoinToSubquery {
    fn rule(&self) -> Rule {
        Rule::JoinToSubquery
    }

    fn apply(&self, query: &mut Query, ctx: &Context) -> QueryResult<bool> {
        if query.tables().len() < 2 {
            return Ok(false);
        }
        let mut scratch = ctx.clone();
        let sql = query.to_sql_with_dialect(Dialect::Ansi);
        let mut parts = parse_with(Syntax::Sql, &sql, &mut scratch)?;

        let mut demoted = false;
        let mut index = 1;
        while index < parts.len() {
            let Some(link) = demotion(&parts, index, &scratch.registry) else {
                index += 1;
                continue;
            };
            let inner = parts.remove(index);
            let outer = if link.outer > index { link.outer - 1 } else { link.outer };
            tracing::debug!(table = %inner.table_name, into = %parts[outer].table_name, "join demoted");
            let condition = in_subquery(&parts[outer], inner, &link);
            parts[outer].add_clause(ClauseKind::Where, condition);
            demoted = true;
        }
        if !demoted {
            return Ok(false);
        }
        let mut rebuilt = Query::combine_all(parts, &scratch.registry)?;
        rebuilt.break_lines = query.break_lines;
        *query = rebuilt;
        Ok(true)
    }
}

/// `outer.outer_field IN (SELECT t.inner_field FROM T t ...)`
struct Link {
    outer: usize,
    outer_field: String,
    inner_field: String,
}

fn demotion(parts: &[Query], index: usize, registry: &Registry) -> Option<Link> {
    let part = &parts[index];
    let filtering_only = part.is_empty(ClauseKind::Select)
        && !part.is_empty(ClauseKind::Where)
        && part.is_empty(ClauseKind::GroupBy)
        && part.is_empty(ClauseKind::OrderBy)
        && part.join_type == JoinType::Inner;
    if !filtering_only {
        return None;
    }
    let others = || parts.iter().enumerate().filter(move |(i, _)| *i != index);
    let mentioned = others().any(|(_, q)| {
        ClauseKind::ALL
            .iter()
            .filter(|kind| **kind != ClauseKind::From)
            .flat_map(|kind| q.clause(*kind))
            .any(|e| e.qualifiers().contains(&part.alias))
    });
    if mentioned {
        return None;
    }

    let mut links = others().filter_map(|(i, q)| {
        let key = |pk: &str, fallback: Option<&String>| {
            if pk.is_empty() {
                fallback.cloned().unwrap_or_else(|| "id".to_string())
            } else {
                pk.to_string()
            }
        };
        if let Some(rel) = registry.find(&q.table_name, &part.table_name) {
            return Some(Link {
                outer: i,
                outer_field: rel.foreign_key.clone(),
                inner_field: key(&rel.primary_key, part.key_field.as_ref()),
            });
        }
        registry.find(&part.table_name, &q.table_name).map(|rel| Link {
            outer: i,
            outer_field: key(&rel.primary_key, q.key_field.as_ref()),
            inner_field: rel.foreign_key.clone(),
        })
    });
    let link = links.next()?;
    // a table between two others holds the path together
    if links.next().is_some() {
        return None;
    }
    Some(link)
}

fn in_subquery(outer: &Query, mut inner: Query, link: &Link) -> Expr {
    let column = inner.qualify(&link.inner_field);
    inner.clause_mut(ClauseKind::Select).clear();
    inner.add_clause(ClauseKind::Select, column);
    inner.break_lines = false;
    Expr::compare(
        outer.qualify(&link.outer_field),
        Operator::In,
        Expr::Subquery(Box::new(inner)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::*;

    fn movie_and_director(ctx: &mut Context, director: Select) -> Query {
        let movie = Select::from("Movie m").bind("title", Field).build(ctx).unwrap();
        let person = director.build(ctx).unwrap();
        movie.combine(person, &ctx.registry).unwrap()
    }

    fn ctx() -> Context {
        Context::builder()
            .relationship("Movie", "Person", "director", "id")
            .build()
    }

    #[test]
    fn test_filter_only_join_becomes_subquery() {
        let mut ctx = ctx();
        let mut q = movie_and_director(
            &mut ctx,
            Select::from("Person p").bind("name", Where::eq("Nolan")),
        );
        assert!(JoinToSubquery.apply(&mut q, &ctx).unwrap());
        assert_eq!(
            q.to_sql(),
            "SELECT m.title FROM Movie m WHERE m.director IN (SELECT p.id FROM Person p WHERE p.name = 'Nolan')"
        );
        assert!(!JoinToSubquery.apply(&mut q, &ctx).unwrap());
    }

    #[test]
    fn test_join_with_projection_is_kept() {
        let mut ctx = ctx();
        let mut q = movie_and_director(
            &mut ctx,
            Select::from("Person p")
                .bind("name", Field)
                .bind("name", Where::eq("Nolan")),
        );
        let before = q.clone();
        assert!(!JoinToSubquery.apply(&mut q, &ctx).unwrap());
        assert!(q.equals(&before));
    }

    #[test]
    fn test_outer_join_is_kept() {
        let mut ctx = Context::builder()
            .join_type(JoinType::Left)
            .relationship("Movie", "Person", "director", "id")
            .build();
        let mut q = movie_and_director(
            &mut ctx,
            Select::from("Person p").bind("name", Where::eq("Nolan")),
        );
        assert!(q.to_sql().contains("LEFT JOIN Person p"));
        assert!(!JoinToSubquery.apply(&mut q, &ctx).unwrap());
    }

    #[test]
    fn test_bridge_table_is_kept() {
        let mut ctx = Context::builder()
            .relationship("Cast", "Actor", "actor_id", "id")
            .relationship("Cast", "Movie", "movie_id", "id")
            .build();
        let actor = Select::from("Actor a").bind("name", Field).build(&mut ctx).unwrap();
        let cast = Select::from("Cast c").bind("role", Where::eq("Lead")).build(&mut ctx).unwrap();
        let movie = Select::from("Movie m").bind("title", Field).build(&mut ctx).unwrap();
        let mut q = Query::combine_all([actor, cast, movie], &ctx.registry).unwrap();
        assert!(!JoinToSubquery.apply(&mut q, &ctx).unwrap());
    }
}
