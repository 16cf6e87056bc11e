//! Parser tests across the four input syntaxes.

use super::*;
use crate::ast::builders::*;
use crate::ast::{ClauseKind, Expr, Operator};
use crate::transpiler::{Dialect, ToCypher, ToSql};

fn texts(query: &Query, kind: ClauseKind) -> Vec<String> {
    query.clause(kind).iter().map(|e| e.to_string()).collect()
}

#[test]
fn test_detection_order() {
    assert_eq!(parser_class("SELECT * FROM Movie").unwrap(), Syntax::Sql);
    assert_eq!(parser_class("db.movies.find({year: 2000})").unwrap(), Syntax::Mongo);
    assert_eq!(parser_class("Rating.aggregate([])").unwrap(), Syntax::Mongo);
    assert_eq!(parser_class("MATCH (m:Movie) RETURN m").unwrap(), Syntax::Neo4j);
    assert_eq!(parser_class("(m:Movie) RETURN m.title").unwrap(), Syntax::Neo4j);
    assert_eq!(parser_class("Movie(title, ^year)").unwrap(), Syntax::Cypher);
}

#[test]
fn test_unknown_dialect_fails_before_parsing() {
    let mut ctx = Context::default();
    let err = parse("hello world", &mut ctx).unwrap_err();
    assert!(matches!(err, QueryError::UnknownDialect(ref s) if s == "hello world"));
    assert!(ctx.registry.is_empty());
}

#[test]
fn test_syntax_from_str() {
    assert_eq!("MongoDB".parse::<Syntax>().unwrap(), Syntax::Mongo);
    assert_eq!("pattern".parse::<Syntax>().unwrap(), Syntax::Cypher);
    assert!("xml".parse::<Syntax>().is_err());
}

// ----- SQL -----

#[test]
fn test_sql_join_becomes_registry_entry() {
    let mut ctx = Context::default();
    let queries = parse(
        "SELECT m.title, p.name FROM Movie m JOIN Person p ON (m.director = p.id) WHERE m.year > 2000",
        &mut ctx,
    )
    .unwrap();
    assert_eq!(queries.len(), 2);
    let rel = ctx.registry.find("Movie", "Person").unwrap();
    assert_eq!(rel.foreign_key, "director");
    assert_eq!(rel.primary_key, "id");
    assert_eq!(texts(&queries[0], ClauseKind::Select), vec!["m.title"]);
    assert_eq!(texts(&queries[0], ClauseKind::Where), vec!["m.year > 2000"]);
    assert_eq!(texts(&queries[1], ClauseKind::Select), vec!["p.name"]);
    assert_eq!(queries[1].key_field.as_deref(), Some("id"));
}

#[test]
fn test_sql_implicit_join_in_where() {
    let mut ctx = Context::default();
    let queries = parse(
        "SELECT c.name FROM Customer c, Orders o WHERE o.customer_id = c.id AND o.total > 100",
        &mut ctx,
    )
    .unwrap();
    assert_eq!(queries.len(), 2);
    assert_eq!(ctx.registry.find("Orders", "Customer").unwrap().foreign_key, "customer_id");
    assert_eq!(texts(&queries[1], ClauseKind::Where), vec!["o.total > 100"]);
}

#[test]
fn test_sql_tables_with_the_same_derived_alias() {
    let mut ctx = Context::default();
    let queries = parse(
        "SELECT Movie.title, Movement.name FROM Movie, Movement WHERE Movie.id = Movement.movie_id",
        &mut ctx,
    )
    .unwrap();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].alias, "mov");
    assert_eq!(queries[1].alias, "mov2");
    assert_eq!(texts(&queries[0], ClauseKind::Select), vec!["mov.title"]);
    assert_eq!(texts(&queries[1], ClauseKind::Select), vec!["mov2.name"]);
    assert_eq!(ctx.registry.len(), 1);

    let combined = Query::combine_all(queries, &ctx.registry).unwrap();
    let aliases: Vec<String> = combined.tables().into_iter().map(|(_, alias)| alias).collect();
    assert_eq!(aliases.len(), 2);
    assert_ne!(aliases[0], aliases[1]);
}

#[test]
fn test_sql_round_trip_is_semantically_equal() {
    let mut ctx = Context::builder()
        .relationship("Movie", "Person", "director", "id")
        .build();
    let movie = Select::from("Movie m")
        .bind("title", Field)
        .bind("year", Where::gt(2000))
        .bind("year", OrderBy::desc())
        .build(&mut ctx)
        .unwrap();
    let person = Select::from("Person p").bind("name", Field).build(&mut ctx).unwrap();
    let original = movie.combine(person, &ctx.registry).unwrap();

    let mut fresh = Context::default();
    let reparsed = parse_combined(&original.to_sql(), &mut fresh).unwrap();
    assert!(reparsed.equals(&original));
}

#[test]
fn test_sql_clauses_in_any_order() {
    let mut ctx = Context::default();
    let a = parse_combined("SELECT name FROM Person ORDER BY name WHERE age > 30", &mut ctx).unwrap();
    let b = parse_combined("SELECT name FROM Person WHERE age > 30 ORDER BY name", &mut ctx).unwrap();
    assert!(a.equals(&b));
}

#[test]
fn test_sql_having_without_group_by() {
    let mut ctx = Context::default();
    let err = parse("SELECT name FROM Person HAVING count(*) > 1", &mut ctx).unwrap_err();
    assert!(matches!(err, QueryError::Parse { position: 24, .. }));
}

#[test]
fn test_sql_group_by_having() {
    let mut ctx = Context::default();
    let q = parse_combined(
        "SELECT movie, avg(rate) FROM Rating r GROUP BY movie HAVING avg(rate) > 4.5",
        &mut ctx,
    )
    .unwrap();
    let group = q.clause(ClauseKind::GroupBy);
    assert_eq!(group.len(), 1);
    assert!(matches!(&group[0], Expr::Having { conditions, .. } if conditions.len() == 1));
}

#[test]
fn test_sql_between_and_in_subquery() {
    let mut ctx = Context::default();
    let q = parse_combined(
        "SELECT title FROM Movie m WHERE year BETWEEN 1990 AND 1999 AND id NOT IN (SELECT movie_id FROM Award)",
        &mut ctx,
    )
    .unwrap();
    let wheres = q.clause(ClauseKind::Where);
    assert_eq!(wheres.len(), 3);
    assert_eq!(wheres[0].to_string(), "m.year >= 1990");
    assert_eq!(wheres[1].to_string(), "m.year <= 1999");
    assert!(matches!(&wheres[2], Expr::Compare { op: Operator::NotIn, .. }));
}

#[test]
fn test_sql_limit_offset() {
    let mut ctx = Context::default();
    let q = parse_combined("SELECT title FROM Movie LIMIT 5 OFFSET 10", &mut ctx).unwrap();
    let mut expected = Select::from("Movie").bind("title", Field).build(&mut ctx).unwrap();
    expected.limit(5, 10, Dialect::Ansi);
    assert!(q.equals(&expected));
}

#[test]
fn test_sql_trailing_text_is_an_error() {
    let mut ctx = Context::default();
    assert!(matches!(
        parse("SELECT a FROM t WHERE a = 1 )", &mut ctx),
        Err(QueryError::Parse { .. })
    ));
}

// ----- Mongo -----

#[test]
fn test_mongo_find_matches_builder() {
    let mut ctx = Context::default();
    let parsed = parse_combined(
        "Movie.find({genre:\"Drama\"}, {title:1}).sort({year:-1}).skip(10).limit(5)",
        &mut ctx,
    )
    .unwrap();
    let mut expected = Select::from("Movie")
        .bind("title", Field)
        .bind("genre", Where::eq("Drama"))
        .bind("year", OrderBy::desc())
        .build(&mut ctx)
        .unwrap();
    expected.limit(5, 10, Dialect::Ansi);
    assert!(parsed.equals(&expected));
}

#[test]
fn test_mongo_operators() {
    let mut ctx = Context::default();
    let q = parse_combined(
        "db.movies.find({$or:[{genre:\"Sci-Fi\"},{awards:{$regex:\"Oscar\"}}],status:{$in:[\"A\",\"B\"]},deleted_at:null,title:{$regex:\"^Star\"},year:{$gte:1990,$lt:2000}})",
        &mut ctx,
    )
    .unwrap();
    assert_eq!(q.table_name, "movies");
    assert_eq!(
        texts(&q, ClauseKind::Where),
        vec![
            "(mov.genre = 'Sci-Fi' OR mov.awards LIKE '%Oscar%')",
            "mov.status IN ('A','B')",
            "mov.deleted_at IS NULL",
            "mov.title LIKE 'Star%'",
            "mov.year >= 1990",
            "mov.year < 2000",
        ]
    );
}

#[test]
fn test_mongo_aggregate_with_having() {
    let mut ctx = Context::default();
    let parsed = parse_combined(
        "Rating.aggregate([{$group:{_id:\"$movie\",average:{$avg:\"$rate\"}}},{$match:{average:{$gt:4.5}}},{$project:{_id:0,movie:\"$_id\",average:1}}])",
        &mut ctx,
    )
    .unwrap();
    let expected = Select::from("Rating")
        .bind("movie", Field)
        .bind("movie", GroupBy)
        .bind("rate", NamedField::with("average", Function::avg()))
        .bind("rate", Having::avg(Where::gt(4.5)))
        .build(&mut ctx)
        .unwrap();
    assert!(parsed.equals(&expected));
}

#[test]
fn test_mongo_count_without_project() {
    let mut ctx = Context::default();
    let q = parse_combined(
        "Sales.aggregate([{$match:{year:2024}},{$group:{_id:\"$category\",count_all:{$sum:1}}}])",
        &mut ctx,
    )
    .unwrap();
    assert_eq!(texts(&q, ClauseKind::Where), vec!["sal.year = 2024"]);
    assert_eq!(q.clause(ClauseKind::Select).len(), 2);
    assert!(q.has_aggregate());
}

#[test]
fn test_mongo_unknown_accumulator() {
    let mut ctx = Context::default();
    let err = parse("Sales.aggregate([{$group:{_id:null,x:{$median:\"$v\"}}}])", &mut ctx).unwrap_err();
    assert!(matches!(err, QueryError::UnknownFunction(ref f) if f == "$median"));
}

// ----- pattern syntax -----

#[test]
fn test_pattern_infers_keys_from_adjacent_fields() {
    let mut ctx = Context::default();
    let queries = parse(
        "Actor a(name, id ?age = 40) <- Cast c(actor_id, movie_id) -> Movie m(id, title ^title)",
        &mut ctx,
    )
    .unwrap();
    assert_eq!(queries.len(), 3);
    let to_actor = ctx.registry.find("Cast", "Actor").unwrap();
    assert_eq!((to_actor.foreign_key.as_str(), to_actor.primary_key.as_str()), ("actor_id", "id"));
    let to_movie = ctx.registry.find("Cast", "Movie").unwrap();
    assert_eq!((to_movie.foreign_key.as_str(), to_movie.primary_key.as_str()), ("movie_id", "id"));

    assert_eq!(texts(&queries[0], ClauseKind::Select), vec!["a.name"]);
    assert_eq!(texts(&queries[0], ClauseKind::Where), vec!["a.age = 40"]);
    assert!(queries[1].is_empty(ClauseKind::Select));
    assert_eq!(texts(&queries[2], ClauseKind::Select), vec!["m.title"]);
    assert_eq!(texts(&queries[2], ClauseKind::OrderBy), vec!["m.title"]);

    let combined = Query::combine_all(queries, &ctx.registry).unwrap();
    assert_eq!(combined.clause(ClauseKind::From).len(), 3);
}

#[test]
fn test_pattern_markers() {
    let mut ctx = Context::default();
    let q = parse_combined("Rating r(@movie, avg$rate, ^!movie ?rate >= 3 OR rate IS NULL)", &mut ctx)
        .unwrap();
    assert_eq!(texts(&q, ClauseKind::GroupBy), vec!["r.movie"]);
    assert_eq!(q.clause(ClauseKind::Select).len(), 2);
    assert!(q.has_aggregate());
    assert_eq!(texts(&q, ClauseKind::OrderBy), vec!["r.movie DESC"]);
    assert_eq!(texts(&q, ClauseKind::Where), vec!["(r.rate >= 3 OR r.rate IS NULL)"]);
}

#[test]
fn test_pattern_template_edge() {
    let mut ctx = Context::default();
    let queries = parse("Movie m(title) ->[{}_id] Person p(name)", &mut ctx).unwrap();
    let rel = ctx.registry.find("Movie", "Person").unwrap();
    assert_eq!(rel.foreign_key, "person_id");
    assert_eq!(rel.primary_key, "id");
    assert_eq!(texts(&queries[0], ClauseKind::Select), vec!["m.title"]);
}

#[test]
fn test_pattern_missing_key() {
    let mut ctx = Context::default();
    let err = parse("Actor(@name) -> Movie(id)", &mut ctx).unwrap_err();
    assert!(matches!(err, QueryError::MissingKey(ref t) if t == "Actor"));

    let err = parse("Actor(name) -> Movie()", &mut ctx).unwrap_err();
    assert!(matches!(err, QueryError::MissingKey(ref t) if t == "Movie"));
}

#[test]
fn test_pattern_unknown_function() {
    let mut ctx = Context::default();
    let err = parse("Rating(median$rate)", &mut ctx).unwrap_err();
    assert!(matches!(err, QueryError::UnknownFunction(ref f) if f == "median"));
}

// ----- Neo4j -----

#[test]
fn test_neo4j_core_triple_round_trip() {
    let text = "MATCH (a:Actor{name: 'Tom Hanks'})<-[c:Cast]->(m:Movie) RETURN a.name, m.title";
    let mut ctx = Context::default();
    let queries = parse(text, &mut ctx).unwrap();
    assert_eq!(queries.len(), 3);
    assert_eq!(ctx.registry.find("Cast", "Actor").unwrap().foreign_key, "actor_id");
    assert_eq!(ctx.registry.find("Cast", "Movie").unwrap().foreign_key, "movie_id");
    let combined = Query::combine_all(queries, &ctx.registry).unwrap();
    assert_eq!(combined.to_cypher(), text);
}

#[test]
fn test_neo4j_edge_reuses_known_binding() {
    let text = "MATCH (m:Movie)-->(p:Person) WHERE m.title STARTS WITH 'Star' RETURN m.title, p.name";
    let mut ctx = Context::builder()
        .relationship("Movie", "Person", "director", "id")
        .build();
    let combined = parse_combined(text, &mut ctx).unwrap();
    assert_eq!(ctx.registry.len(), 1);
    assert_eq!(combined.to_cypher(), text);
}

#[test]
fn test_neo4j_backward_edge_and_predicates() {
    let mut ctx = Context::default();
    let queries = parse(
        "MATCH (p:Person)<--(m:Movie) WHERE NOT m.genre IN ['Horror'] AND (m.year < 1980 OR p.name ENDS WITH 'son') RETURN DISTINCT p.name",
        &mut ctx,
    )
    .unwrap();
    assert_eq!(ctx.registry.find("Movie", "Person").unwrap().foreign_key, "person_id");
    assert_eq!(texts(&queries[1], ClauseKind::Where), vec!["m.genre NOT IN ('Horror')"]);
    assert_eq!(
        texts(&queries[0], ClauseKind::Where),
        vec!["(m.year < 1980 OR p.name LIKE '%son')"]
    );
    assert_eq!(texts(&queries[0], ClauseKind::Select), vec!["DISTINCT p.name"]);
}

#[test]
fn test_neo4j_aggregate_groups_plain_items() {
    let text = "MATCH (r:Rating) RETURN r.movie, avg(r.rate) ORDER BY r.movie DESC LIMIT 3";
    let mut ctx = Context::default();
    let q = parse_combined(text, &mut ctx).unwrap();
    assert_eq!(texts(&q, ClauseKind::GroupBy), vec!["r.movie"]);
    assert_eq!(q.to_cypher(), text);
}
