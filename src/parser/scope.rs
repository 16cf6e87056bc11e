//! Tables seen while parsing one statement, and routing of fragments to
//! the query that owns them.

use std::collections::HashMap;

use crate::ast::{ClauseKind, Expr, Query};
use crate::config::Context;

#[derive(Debug, Default)]
pub(crate) struct Scope {
    pub queries: Vec<Query>,
    /// lower-cased alias and table name -> position in `queries`
    index: HashMap<String, usize>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a query for `table`. A derived alias gets a numeric suffix
    /// when another table in scope already answers to it.
    pub fn enter(&mut self, table: &str, alias: Option<&str>, ctx: &Context) -> usize {
        let reference = match alias {
            Some(alias) => format!("{table} {alias}"),
            None => table.to_string(),
        };
        let mut query = Query::from_table(&reference, ctx);
        if alias.is_none() && self.lookup(&query.alias).is_some() {
            let unique = (2..)
                .map(|n| format!("{}{n}", query.alias))
                .find(|candidate| self.lookup(candidate).is_none())
                .unwrap_or_default();
            query = Query::from_table(&format!("{} {unique}", query.table_name), ctx);
        }
        let position = self.queries.len();
        self.index.insert(query.alias.to_lowercase(), position);
        self.index
            .entry(query.table_name.to_lowercase())
            .or_insert(position);
        self.queries.push(query);
        position
    }

    pub fn lookup(&self, qualifier: &str) -> Option<usize> {
        self.index.get(&qualifier.to_lowercase()).copied()
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut Query> {
        self.queries.get_mut(position)
    }

    /// Query that should receive `expr`: the only table it mentions, else
    /// the base query.
    pub fn owner(&self, expr: &Expr) -> usize {
        let mut owners: Vec<usize> = expr
            .qualifiers()
            .iter()
            .filter_map(|q| self.lookup(q))
            .collect();
        owners.sort_unstable();
        owners.dedup();
        match owners.as_slice() {
            [single] => *single,
            _ => 0,
        }
    }

    /// Add `expr` to the owning query. Table-name qualifiers become the
    /// alias; bare columns are qualified when only one table is in scope.
    pub fn route(&mut self, kind: ClauseKind, mut expr: Expr) -> usize {
        if self.queries.is_empty() {
            return 0;
        }
        for qualifier in expr.qualifiers() {
            if let Some(i) = self.lookup(&qualifier) {
                let alias = self.queries[i].alias.clone();
                expr.rename_qualifier(&qualifier, &alias);
            }
        }
        let position = self.owner(&expr);
        if self.queries.len() == 1 {
            let alias = self.queries[0].alias.clone();
            expr.for_each_column_mut(&mut |table, name| {
                if table.is_none() && !name.eq_ignore_ascii_case("rownum") && name != "*" {
                    *table = Some(alias.clone());
                }
            });
        }
        tracing::trace!(%kind, table = %self.queries[position].table_name, "route fragment");
        self.queries[position].add_clause(kind, expr);
        position
    }

    /// Record `owner.foreign_key -> referenced.primary_key` and remember the
    /// key on the referenced query.
    pub fn link(
        &mut self,
        ctx: &mut Context,
        owner: usize,
        referenced: usize,
        foreign_key: &str,
        primary_key: &str,
    ) {
        let owner_table = self.queries[owner].table_name.clone();
        let target = &mut self.queries[referenced];
        ctx.registry
            .bind(&owner_table, &target.table_name, foreign_key, primary_key);
        target.key_field = Some(primary_key.to_string());
    }

    pub fn into_queries(self) -> Vec<Query> {
        self.queries
    }
}
