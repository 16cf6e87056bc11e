//! Mongo and Cypher renderer tests.

use crate::ast::builders::*;
use crate::ast::Query;
use crate::config::Context;
use crate::transpiler::{Dialect, ToCypher, ToMongo};

#[test]
fn test_mongo_find_strips_aliases() {
    let mut ctx = Context::default();
    let q = Select::from("collection")
        .bind("age", Where::gt(45))
        .bind("age", Where::lt(69))
        .build(&mut ctx)
        .unwrap();
    assert_eq!(q.to_mongo(), "collection.find({age:{$gt:45},age:{$lt:69}})");
}

#[test]
fn test_mongo_find_projection_sort_paging() {
    let mut ctx = Context::default();
    let mut q = Select::from("Movie m")
        .bind("title", Field)
        .bind("genre", Where::eq("Drama"))
        .bind("year", OrderBy::desc())
        .build(&mut ctx)
        .unwrap();
    q.limit(5, 10, Dialect::Ansi);
    assert_eq!(
        q.to_mongo(),
        "Movie.find({genre:\"Drama\"}, {title:1}).sort({year:-1}).skip(10).limit(5)"
    );
}

#[test]
fn test_mongo_or_like_in_null() {
    let mut ctx = Context::default();
    let q = Select::from("Movie m")
        .bind(
            "OR",
            Options::new([("genre", Where::eq("Sci-Fi")), ("awards", Where::contains("Oscar"))]),
        )
        .bind("status", Where::inside(["A", "B"]))
        .bind("deleted_at", Where::is_null())
        .bind("title", Where::starts_with("Star"))
        .build(&mut ctx)
        .unwrap();
    assert_eq!(
        q.to_mongo(),
        "Movie.find({$or:[{genre:\"Sci-Fi\"},{awards:{$regex:\"Oscar\"}}],status:{$in:[\"A\",\"B\"]},deleted_at:null,title:{$regex:\"^Star\"}})"
    );
}

#[test]
fn test_mongo_aggregate_with_having() {
    let mut ctx = Context::default();
    let q = Select::from("Rating r")
        .bind("movie", Field)
        .bind("movie", GroupBy)
        .bind("rate", NamedField::with("average", Function::avg()))
        .bind("rate", Having::avg(Where::gt(4.5)))
        .build(&mut ctx)
        .unwrap();
    assert_eq!(
        q.to_mongo(),
        "Rating.aggregate([{$group:{_id:\"$movie\",average:{$avg:\"$rate\"}}},{$match:{average:{$gt:4.5}}},{$project:{_id:0,movie:\"$_id\",average:1}}])"
    );
}

#[test]
fn test_mongo_count_accumulator() {
    let mut ctx = Context::default();
    let q = Select::from("Sales s")
        .bind("category", GroupBy)
        .bind("category", Field)
        .bind("*", Function::count())
        .build(&mut ctx)
        .unwrap();
    assert_eq!(
        q.to_mongo(),
        "Sales.aggregate([{$group:{_id:\"$category\",count_all:{$sum:1}}},{$project:{_id:0,category:\"$_id\",count_all:1}}])"
    );
}

#[test]
fn test_mongo_render_leaves_query_untouched() {
    let mut ctx = Context::default();
    let q = Select::from("Movie m")
        .bind("title", Field)
        .bind("year", Where::gte(2000))
        .build(&mut ctx)
        .unwrap();
    let before = q.clone();
    let _ = q.to_mongo();
    assert!(q.equals(&before));
    assert_eq!(q.alias, before.alias);
}

fn movie_graph() -> (Context, Query) {
    let mut ctx = Context::builder()
        .relationship("Cast", "Actor", "actor_id", "id")
        .relationship("Cast", "Movie", "movie_id", "id")
        .build();
    let actor = Select::from("Actor a")
        .bind("name", Field)
        .bind("name", Where::eq("Tom Hanks"))
        .build(&mut ctx)
        .unwrap();
    let cast = Query::from_table("Cast c", &ctx);
    let movie = Select::from("Movie m").bind("title", Field).build(&mut ctx).unwrap();
    let q = Query::combine_all([actor, cast, movie], &ctx.registry).unwrap();
    (ctx, q)
}

#[test]
fn test_cypher_core_triple_with_folded_properties() {
    let (_, q) = movie_graph();
    assert_eq!(
        q.to_cypher(),
        "MATCH (a:Actor{name: 'Tom Hanks'})<-[c:Cast]->(m:Movie) RETURN a.name, m.title"
    );
}

#[test]
fn test_cypher_chain_and_where() {
    let mut ctx = Context::builder()
        .relationship("Movie", "Person", "director", "id")
        .build();
    let movie = Select::from("Movie m")
        .bind("title", Field)
        .bind("title", Where::starts_with("Star"))
        .build(&mut ctx)
        .unwrap();
    let person = Select::from("Person p").bind("name", Field).build(&mut ctx).unwrap();
    let q = movie.combine(person, &ctx.registry).unwrap();
    assert_eq!(
        q.to_cypher(),
        "MATCH (m:Movie)-->(p:Person) WHERE m.title STARTS WITH 'Star' RETURN m.title, p.name"
    );
}

#[test]
fn test_cypher_aggregate_order_limit() {
    let mut ctx = Context::default();
    let mut q = Select::from("Rating r")
        .bind("movie", Field)
        .bind("rate", Function::avg())
        .bind("movie", OrderBy::desc())
        .build(&mut ctx)
        .unwrap();
    q.limit(3, 0, Dialect::Ansi);
    assert_eq!(
        q.to_cypher(),
        "MATCH (r:Rating) RETURN r.movie, avg(r.rate) ORDER BY r.movie DESC LIMIT 3"
    );
    let empty = Query::from_table("Movie m", &ctx);
    assert_eq!(empty.to_cypher(), "MATCH (m:Movie) RETURN *");
}
