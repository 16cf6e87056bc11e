//! The query model: clause collections plus table, alias and key metadata.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::clause::ClauseKind;
use super::expr::{Expr, normalize};
use super::operators::{JoinType, Operator};
use super::registry::{Registry, Relationship};
use crate::config::Context;
use crate::error::{QueryError, QueryResult};
use crate::transpiler::{Dialect, LimitStyle};

const FILE_EXTENSIONS: &[&str] = &["csv", "tsv", "json", "parquet", "txt", "xlsx", "xml"];

/// One SELECT-shaped statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    pub table_name: String,
    pub alias: String,
    clauses: BTreeMap<ClauseKind, Vec<Expr>>,
    /// Primary key used when another query joins this one
    pub key_field: Option<String>,
    /// Join flavour used when this query is attached to another
    pub join_type: JoinType,
    /// Pretty multi-line SQL output
    pub break_lines: bool,
}

/// Split a table reference into `(table, explicit alias)`.
///
/// Accepts `Name`, `Name alias`, `Name AS alias` and file-like paths, whose
/// table name is the basename without extension.
pub fn parse_table_ref(reference: &str) -> (String, Option<String>) {
    let reference = reference.trim();
    let is_path = reference.contains('/')
        || reference.contains('\\')
        || reference
            .rsplit_once('.')
            .is_some_and(|(_, ext)| FILE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    if is_path && !reference.contains(' ') {
        let base = reference
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(reference);
        let stem = base.rsplit_once('.').map_or(base, |(stem, _)| stem);
        return (stem.to_string(), None);
    }
    let words: Vec<&str> = reference.split_whitespace().collect();
    match words.as_slice() {
        [name, kw, alias] if kw.eq_ignore_ascii_case("as") => {
            (name.to_string(), Some(alias.to_string()))
        }
        [name, alias, ..] => (name.to_string(), Some(alias.to_string())),
        [name] => (name.to_string(), None),
        [] => (String::new(), None),
    }
}

/// Constants and formulas are not qualified with the table alias.
fn is_expression(field: &str) -> bool {
    field.starts_with(|c: char| c.is_ascii_digit() || c == '\'' || c == '"' || c == '-')
        || field.contains(|c: char| "+-*/%() ".contains(c))
}

impl Query {
    pub fn new(ctx: &Context) -> Self {
        Self {
            join_type: ctx.join_type,
            ..Self::default()
        }
    }

    pub fn from_table(reference: &str, ctx: &Context) -> Self {
        let mut query = Self::new(ctx);
        query.set_table(reference, ctx);
        query
    }

    /// Add a table reference to FROM. The first call also names the query;
    /// later calls append implicit cross joins.
    pub fn set_table(&mut self, reference: &str, ctx: &Context) -> &mut Self {
        let (name, explicit) = parse_table_ref(reference);
        if name.is_empty() {
            return self;
        }
        let alias = explicit.unwrap_or_else(|| ctx.alias_for(&name));
        if self.table_name.is_empty() {
            self.table_name = name.clone();
            self.alias = alias.clone();
        }
        self.add_clause(ClauseKind::From, Expr::Table { name, alias });
        self
    }

    pub fn clause(&self, kind: ClauseKind) -> &[Expr] {
        self.clauses.get(&kind).map_or(&[], Vec::as_slice)
    }

    pub fn clause_mut(&mut self, kind: ClauseKind) -> &mut Vec<Expr> {
        self.clauses.entry(kind).or_default()
    }

    pub fn is_empty(&self, kind: ClauseKind) -> bool {
        self.clause(kind).is_empty()
    }

    /// Append a fragment unless an equivalent one is already present.
    pub fn add_clause(&mut self, kind: ClauseKind, fragment: Expr) -> bool {
        let signature = fragment.signature();
        let fragments = self.clause_mut(kind);
        if fragments.iter().any(|f| f.signature() == signature) {
            return false;
        }
        fragments.push(fragment);
        true
    }

    /// Remove fragments matching `search` from the given clause kinds.
    ///
    /// Loose mode matches a normalized substring; exact mode matches the
    /// fragment's field name (or its whole normalized text).
    pub fn delete(&mut self, search: &str, kinds: &[ClauseKind], exact: bool) -> usize {
        let needle = normalize(search);
        let mut removed = 0;
        for kind in kinds {
            let Some(fragments) = self.clauses.get_mut(kind) else {
                continue;
            };
            let before = fragments.len();
            fragments.retain(|f| {
                let signature = f.signature();
                let hit = if exact {
                    f.output_name()
                        .is_some_and(|name| name.eq_ignore_ascii_case(search.trim()))
                        || f.column_name()
                            .is_some_and(|name| name.eq_ignore_ascii_case(search.trim()))
                        || signature == needle
                } else {
                    signature.contains(&needle)
                };
                !hit
            });
            removed += before - fragments.len();
        }
        removed
    }

    /// Column reference for a builder field name, following the
    /// qualification rules of plain fields.
    pub fn qualify(&self, field: &str) -> Expr {
        let field = field.trim();
        if field == "_" || field == "*" {
            Expr::Star
        } else if is_expression(field) {
            Expr::Raw(field.to_string())
        } else if field.contains('.') || self.alias.is_empty() {
            Expr::field(field)
        } else {
            Expr::qualified(&self.alias, field)
        }
    }

    /// `(table, alias)` for every table in FROM, base table first.
    pub fn tables(&self) -> Vec<(String, String)> {
        self.clause(ClauseKind::From)
            .iter()
            .filter_map(|f| match f {
                Expr::Table { name, alias } | Expr::Join { table: name, alias, .. } => {
                    Some((name.clone(), alias.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn rename_alias(&mut self, from: &str, to: &str) {
        for fragments in self.clauses.values_mut() {
            for f in fragments.iter_mut() {
                f.rename_qualifier(from, to);
            }
        }
    }

    /// Merge with another query.
    ///
    /// Same table: clause-wise union. Otherwise the registry decides which
    /// side holds the foreign key; that side receives the JOIN.
    pub fn combine(self, other: Query, registry: &Registry) -> QueryResult<Query> {
        if self.table_name.eq_ignore_ascii_case(&other.table_name) {
            return Ok(self.merge_same_table(other));
        }
        if let Some((owner, rel)) = self.find_owner(&other.table_name, registry) {
            return Ok(self.attach(other, &owner, &rel));
        }
        if let Some((owner, rel)) = other.find_owner(&self.table_name, registry) {
            return Ok(other.attach(self, &owner, &rel));
        }
        Err(QueryError::RelationshipNotFound {
            left: self.table_name,
            right: other.table_name,
        })
    }

    /// Left fold of [`Query::combine`].
    pub fn combine_all(
        queries: impl IntoIterator<Item = Query>,
        registry: &Registry,
    ) -> QueryResult<Query> {
        let mut queries = queries.into_iter();
        let first = queries
            .next()
            .ok_or_else(|| QueryError::config("nothing to combine"))?;
        queries.try_fold(first, |acc, next| acc.combine(next, registry))
    }

    fn find_owner(&self, referenced: &str, registry: &Registry) -> Option<(String, Relationship)> {
        self.tables().into_iter().find_map(|(table, alias)| {
            registry
                .find(&table, referenced)
                .map(|rel| (alias, rel.clone()))
        })
    }

    fn attach(mut self, other: Query, owner_alias: &str, rel: &Relationship) -> Query {
        let primary_key = if rel.primary_key.is_empty() {
            other.key_field.clone().unwrap_or_else(|| "id".to_string())
        } else {
            rel.primary_key.clone()
        };
        tracing::debug!(
            owner = %owner_alias,
            table = %other.table_name,
            fk = %rel.foreign_key,
            pk = %primary_key,
            "synthesized join"
        );
        let on = Expr::compare(
            Expr::qualified(owner_alias, &rel.foreign_key),
            Operator::Eq,
            Expr::qualified(&other.alias, primary_key),
        );
        self.add_clause(
            ClauseKind::From,
            Expr::Join {
                join_type: other.join_type,
                table: other.table_name.clone(),
                alias: other.alias.clone(),
                on: Box::new(on),
            },
        );
        self.absorb(other);
        self
    }

    fn merge_same_table(mut self, mut other: Query) -> Query {
        let (from, to) = (other.alias.clone(), self.alias.clone());
        other.rename_alias(&from, &to);
        if self.key_field.is_none() {
            self.key_field = other.key_field.take();
        }
        self.absorb(other);
        self
    }

    fn absorb(&mut self, mut other: Query) {
        let from = other.clauses.remove(&ClauseKind::From).unwrap_or_default();
        for fragment in from.into_iter().skip(1) {
            self.add_clause(ClauseKind::From, fragment);
        }
        for kind in ClauseKind::USUAL {
            for fragment in other.clauses.remove(&kind).unwrap_or_default() {
                self.add_clause(kind, fragment);
            }
        }
        if self.is_empty(ClauseKind::Limit) {
            if let Some(limit) = other.clauses.remove(&ClauseKind::Limit) {
                self.clauses.insert(ClauseKind::Limit, limit);
            }
        }
    }

    /// Semantic equality: per clause kind, the normalized fragment sets match.
    pub fn equals(&self, other: &Query) -> bool {
        ClauseKind::ALL.iter().all(|kind| {
            let mine: BTreeSet<String> = self.clause(*kind).iter().map(Expr::signature).collect();
            let theirs: BTreeSet<String> =
                other.clause(*kind).iter().map(Expr::signature).collect();
            mine == theirs
        })
    }

    /// Cap the number of rows the way `dialect` expects.
    pub fn limit(&mut self, count: u64, offset: u64, dialect: Dialect) -> &mut Self {
        match dialect.limit_style() {
            LimitStyle::Top => {
                let select = self.clause_mut(ClauseKind::Select);
                match select.first_mut() {
                    Some(Expr::Top { count: current, .. }) => *current = count,
                    Some(first) => {
                        let expr = Box::new(first.clone());
                        *first = Expr::Top { count, expr };
                    }
                    None => select.push(Expr::Top {
                        count,
                        expr: Box::new(Expr::Star),
                    }),
                }
            }
            LimitStyle::RowNum => {
                let rownum = || Expr::column(None, "ROWNUM");
                let conditions = self.clause_mut(ClauseKind::Where);
                conditions.retain(|e| {
                    !matches!(e, Expr::Compare { left, .. }
                        if left.column_name().is_some_and(|n| n.eq_ignore_ascii_case("ROWNUM")))
                });
                conditions.push(Expr::compare(rownum(), Operator::Gt, Expr::literal(offset)));
                conditions.push(Expr::compare(
                    rownum(),
                    Operator::Lte,
                    Expr::literal(offset.saturating_add(count)),
                ));
            }
            LimitStyle::Clause => {
                let limit = self.clause_mut(ClauseKind::Limit);
                limit.clear();
                limit.push(Expr::literal(count));
                if offset > 0 {
                    limit.push(Expr::Offset(offset));
                }
            }
        }
        self
    }

    /// Subqueries embedded in WHERE, outermost first.
    pub fn subqueries(&self) -> Vec<&Query> {
        fn walk<'a>(expr: &'a Expr, out: &mut Vec<&'a Query>) {
            match expr {
                Expr::Subquery(q) => out.push(q),
                Expr::Compare { left, right, .. } => {
                    walk(left, out);
                    if let Some(right) = right {
                        walk(right, out);
                    }
                }
                Expr::Group { items, .. } => items.iter().for_each(|e| walk(e, out)),
                Expr::Not(inner) => walk(inner, out),
                _ => {}
            }
        }
        let mut found = Vec::new();
        for fragment in self.clause(ClauseKind::Where) {
            walk(fragment, &mut found);
        }
        found
    }

    /// True when SELECT holds an aggregate function.
    pub fn has_aggregate(&self) -> bool {
        self.clause(ClauseKind::Select).iter().any(|e| {
            matches!(e.inner(), Expr::Function(call) if call.func.is_aggregate())
        })
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Value;

    fn ctx() -> Context {
        Context::default()
    }

    #[test]
    fn test_set_table_aliases() {
        let c = ctx();
        assert_eq!(Query::from_table("user_account", &c).alias, "ua");
        assert_eq!(Query::from_table("product", &c).alias, "pro");
        let q = Query::from_table("Product p", &c);
        assert_eq!((q.table_name.as_str(), q.alias.as_str()), ("Product", "p"));
        let q = Query::from_table("http://datasets.com/ecommerce/data/Customers.csv", &c);
        assert_eq!((q.table_name.as_str(), q.alias.as_str()), ("Customers", "cus"));
    }

    #[test]
    fn test_first_from_is_table() {
        let c = ctx();
        let mut q = Query::from_table("Actor a", &c);
        q.set_table("Cast", &c);
        assert_eq!(q.alias, "a");
        assert_eq!(
            q.clause(ClauseKind::From)[0],
            Expr::Table {
                name: "Actor".into(),
                alias: "a".into()
            }
        );
        assert_eq!(q.tables().len(), 2);
    }

    #[test]
    fn test_add_clause_dedup() {
        let mut q = Query::from_table("Movie m", &ctx());
        assert!(q.add_clause(ClauseKind::Select, q.qualify("title")));
        assert!(!q.add_clause(ClauseKind::Select, Expr::field("TITLE")));
        assert_eq!(q.clause(ClauseKind::Select).len(), 1);
    }

    #[test]
    fn test_delete_exact_and_loose() {
        let mut q = Query::from_table("Cast c", &ctx());
        q.add_clause(ClauseKind::Select, q.qualify("actor_id"));
        q.add_clause(ClauseKind::Select, q.qualify("movie_id"));
        assert_eq!(q.delete("actor_id", &[ClauseKind::Select], true), 1);
        assert_eq!(q.delete("movie", &[ClauseKind::Select], false), 1);
        assert!(q.is_empty(ClauseKind::Select));
    }

    #[test]
    fn test_combine_synthesizes_join() {
        let mut c = ctx();
        c.registry.bind("A", "B", "b_id", "id");
        let a = Query::from_table("A a", &c);
        let b = Query::from_table("B b", &c);
        let joined = a.combine(b, &c.registry).unwrap();
        let joins: Vec<String> = joined.clause(ClauseKind::From)[1..]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(joins, vec!["JOIN B b ON (a.b_id = b.id)"]);
    }

    #[test]
    fn test_combine_reverse_direction_and_key_field() {
        let mut c = ctx();
        c.registry.bind("Cast", "Movie", "movie", "");
        let mut movie = Query::from_table("Movie m", &c);
        movie.key_field = Some("mid".into());
        let cast = Query::from_table("Cast c", &c);
        let joined = movie.combine(cast, &c.registry).unwrap();
        assert_eq!(joined.table_name, "Cast");
        assert_eq!(
            joined.clause(ClauseKind::From)[1].to_string(),
            "JOIN Movie m ON (c.movie = m.mid)"
        );
    }

    #[test]
    fn test_combine_without_binding() {
        let c = ctx();
        let err = Query::from_table("Actor", &c)
            .combine(Query::from_table("Genre", &c), &c.registry)
            .unwrap_err();
        match err {
            QueryError::RelationshipNotFound { left, right } => {
                assert_eq!((left.as_str(), right.as_str()), ("Actor", "Genre"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_same_table_merge_realiases() {
        let c = ctx();
        let mut p = Query::from_table("product p", &c);
        p.add_clause(ClauseKind::Select, p.qualify("name"));
        let mut upper = Query::from_table("PRODUCT", &c);
        upper.add_clause(ClauseKind::Select, upper.qualify("price"));
        upper.add_clause(ClauseKind::Select, upper.qualify("name"));
        let merged = p.combine(upper, &c.registry).unwrap();
        let select: Vec<String> = merged
            .clause(ClauseKind::Select)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(select, vec!["p.name", "p.price"]);
        assert_eq!(merged.clause(ClauseKind::From).len(), 1);
    }

    #[test]
    fn test_equality_is_semantic() {
        let c = ctx();
        let mut a = Query::from_table("Movie m", &c);
        a.add_clause(ClauseKind::Select, a.qualify("title"));
        a.add_clause(ClauseKind::Select, a.qualify("genre"));
        let mut b = Query::from_table("Movie mov", &c);
        b.add_clause(ClauseKind::Select, b.qualify("GENRE"));
        b.add_clause(ClauseKind::Select, b.qualify("title"));
        assert_eq!(a, b);
        b.add_clause(
            ClauseKind::Where,
            Expr::compare(b.qualify("year"), Operator::Gt, Expr::Literal(Value::Int(2000))),
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_limit_per_dialect() {
        let c = ctx();
        let mut q = Query::from_table("Movie m", &c);
        q.limit(10, 0, Dialect::Ansi);
        assert_eq!(q.clause(ClauseKind::Limit), &[Expr::literal(10u64)]);

        let mut q = Query::from_table("Movie m", &c);
        q.add_clause(ClauseKind::Select, q.qualify("title"));
        q.limit(10, 0, Dialect::SqlServer);
        assert_eq!(q.clause(ClauseKind::Select)[0].to_string(), "TOP(10) m.title");

        let mut q = Query::from_table("Movie m", &c);
        q.limit(10, 5, Dialect::Oracle).limit(10, 5, Dialect::Oracle);
        let conds: Vec<String> = q
            .clause(ClauseKind::Where)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(conds, vec!["ROWNUM > 5", "ROWNUM <= 15"]);
    }

    #[test]
    fn test_row_range_saturates() {
        let c = ctx();
        let mut q = Query::from_table("Movie m", &c);
        q.limit(u64::MAX, 5, Dialect::Oracle);
        let conds = q.clause(ClauseKind::Where);
        assert_eq!(conds[1].to_string(), "ROWNUM <= 18446744073709551615");

        let mut q = Query::from_table("Movie m", &c);
        q.limit(u64::MAX, 0, Dialect::Ansi);
        assert_eq!(q.clause(ClauseKind::Limit)[0].to_string(), "18446744073709551615");
    }
}
