//! SQL layout tests.

use crate::ast::builders::*;
use crate::ast::{ClauseKind, Expr, JoinType, Query};
use crate::config::Context;
use crate::transpiler::{Dialect, Language, ToSql};

#[test]
fn test_empty_query_uses_defaults() {
    let ctx = Context::default();
    let q = Query::from_table("Movie m", &ctx);
    assert_eq!(q.to_sql(), "SELECT * FROM Movie m");
}

#[test]
fn test_pretty_layout() {
    let mut ctx = Context::default();
    let mut q = Select::from("Movie m")
        .bind("title", Field)
        .bind("genre", Field)
        .bind("year", Where::gt(2000))
        .bind("genre", Where::eq("Drama"))
        .build(&mut ctx)
        .unwrap();
    q.break_lines = true;
    assert_eq!(
        q.to_sql(),
        "SELECT\n\tm.title,\n\tm.genre\nFROM\n\tMovie m\nWHERE\n\tm.year > 2000\n\tAND m.genre = 'Drama'"
    );
}

#[test]
fn test_limit_and_offset_clause() {
    let ctx = Context::default();
    let mut q = Query::from_table("Movie m", &ctx);
    q.limit(10, 5, Dialect::Ansi);
    assert_eq!(q.to_sql(), "SELECT * FROM Movie m LIMIT 10 OFFSET 5");
}

#[test]
fn test_left_join_from_context() {
    let mut ctx = Context::builder()
        .join_type(JoinType::Left)
        .relationship("Cast", "Movie", "movie_id", "id")
        .build();
    let cast = Select::from("Cast c").bind("role", Field).build(&mut ctx).unwrap();
    let movie = Select::from("Movie m").bind("title", Field).build(&mut ctx).unwrap();
    let q = cast.combine(movie, &ctx.registry).unwrap();
    assert_eq!(
        q.to_sql(),
        "SELECT c.role, m.title FROM Cast c LEFT JOIN Movie m ON (c.movie_id = m.id)"
    );
}

#[test]
fn test_case_without_default() {
    let mut ctx = Context::default();
    let q = Select::from("Student s")
        .bind("grade", Case::new("score").when(Where::gte(90), "A"))
        .build(&mut ctx)
        .unwrap();
    assert_eq!(
        q.to_sql(),
        "SELECT CASE WHEN s.score >= 90 THEN 'A' END AS grade FROM Student s"
    );
}

#[test]
fn test_not_in_subquery() {
    let mut ctx = Context::default();
    let banned = Select::from("Blacklist b").bind("customer", Field).build(&mut ctx).unwrap();
    let q = Select::from("Customer c")
        .bind("name", Field)
        .bind("id", SubSelect::not(banned))
        .build(&mut ctx)
        .unwrap();
    assert_eq!(
        q.to_sql(),
        "SELECT c.name FROM Customer c WHERE c.id NOT IN (SELECT b.customer FROM Blacklist b)"
    );
    assert_eq!(q.subqueries().len(), 1);
}

#[test]
fn test_string_escaping() {
    let mut ctx = Context::default();
    let q = Select::from("Person p")
        .bind("name", Where::eq("O'Brien"))
        .build(&mut ctx)
        .unwrap();
    assert_eq!(q.to_sql(), "SELECT * FROM Person p WHERE p.name = 'O''Brien'");
}

#[test]
fn test_render_dispatch() {
    let mut ctx = Context::default();
    let q = Select::from("Movie m").bind("title", Field).build(&mut ctx).unwrap();
    assert_eq!(
        q.render(Language::Sql, Dialect::Ansi),
        "SELECT m.title FROM Movie m"
    );
    assert_eq!(q.render(Language::Mongo, Dialect::Ansi), "Movie.find({}, {title:1})");
    assert_eq!(
        q.render(Language::Cypher, Dialect::Ansi),
        "MATCH (m:Movie) RETURN m.title"
    );
    assert!("excel".parse::<Language>().is_err());
}

#[test]
fn test_cross_join_from_list() {
    let ctx = Context::default();
    let mut q = Query::from_table("Movie m", &ctx);
    q.set_table("Person p", &ctx);
    q.add_clause(
        ClauseKind::Where,
        Expr::compare(
            Expr::qualified("m", "director"),
            crate::ast::Operator::Eq,
            Expr::qualified("p", "id"),
        ),
    );
    assert_eq!(
        q.to_sql(),
        "SELECT * FROM Movie m, Person p WHERE m.director = p.id"
    );
}
