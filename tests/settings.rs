use pretty_assertions::assert_eq;
use sql_blocks::prelude::*;

const SETTINGS: &str = r#"
dialect = "sql_server"
auto_limit = 50

[[relationship]]
owner = "Movie"
referenced = "Person"
foreign_key = "director"
primary_key = "id"
"#;

#[test]
fn test_settings_feed_builders() {
    let mut ctx = Context::from_toml_str(SETTINGS).unwrap();
    assert_eq!(ctx.dialect, Dialect::SqlServer);
    assert_eq!(ctx.auto_limit, 50);

    let movie = Select::from("Movie m").bind("title", Field).build(&mut ctx).unwrap();
    let person = Select::from("Person p")
        .bind("name", Where::eq("Nolan"))
        .build(&mut ctx)
        .unwrap();
    let query = movie.combine(person, &ctx.registry).unwrap();
    assert_eq!(
        query.to_sql(),
        "SELECT m.title FROM Movie m JOIN Person p ON (m.director = p.id) WHERE p.name = 'Nolan'"
    );
}

#[test]
fn test_auto_limit_follows_settings() {
    let mut ctx = Context::from_toml_str(SETTINGS).unwrap();
    let mut query = parse_combined("SELECT * FROM Product p", &mut ctx).unwrap();
    query.optimize(&[Rule::AutoLimit], &ctx).unwrap();
    assert_eq!(
        query.to_sql_with_dialect(ctx.dialect),
        "SELECT TOP(50) * FROM Product p"
    );
}

#[test]
fn test_unknown_setting_is_rejected() {
    let err = Context::from_toml_str("colour = \"blue\"").unwrap_err();
    assert!(matches!(err, QueryError::Toml(_)));

    let err = Context::from_toml_str("dialect = \"cobol\"").unwrap_err();
    assert!(matches!(err, QueryError::Toml(_)));
}

#[test]
fn test_missing_settings_file() {
    let err = Context::load("does/not/exist.toml").unwrap_err();
    assert!(matches!(err, QueryError::Io(_)));
}

#[test]
fn test_context_defaults() {
    let ctx = Context::from_toml_str("").unwrap();
    assert_eq!(ctx.auto_limit, 100);
    assert_eq!(ctx.dialect, Dialect::Ansi);
    assert!(ctx.registry.is_empty());
}
