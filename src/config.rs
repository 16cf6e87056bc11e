//! Session context and settings.
//!
//! Everything that used to be process-wide (relationship registry, default
//! join type, default sort order, active dialect) lives in a [`Context`]
//! owned by the caller and passed to builders, parsers and rules.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ast::{JoinType, Registry, Relationship, SortType};
use crate::error::QueryResult;
use crate::transpiler::Dialect;

/// File name searched in the working directory by [`Context::discover`].
pub const LOCAL_SETTINGS: &str = "sql-blocks.toml";

/// Settings file contents.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub dialect: Dialect,

    #[serde(default)]
    pub join_type: JoinType,

    #[serde(default)]
    pub sort: SortType,

    /// Row cap used by the auto-limit rule
    #[serde(default = "default_auto_limit")]
    pub auto_limit: u64,

    #[serde(default, rename = "relationship")]
    pub relationships: Vec<Relationship>,
}

fn default_auto_limit() -> u64 {
    100
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            join_type: JoinType::default(),
            sort: SortType::default(),
            auto_limit: default_auto_limit(),
            relationships: Vec::new(),
        }
    }
}

/// Custom alias strategy, consulted before the built-in derivation.
pub type AliasFn = fn(&str) -> String;

/// Explicit session state threaded through construction, parsing and rewriting.
#[derive(Debug, Clone)]
pub struct Context {
    pub registry: Registry,
    pub join_type: JoinType,
    pub sort: SortType,
    pub dialect: Dialect,
    pub auto_limit: u64,
    alias_fn: Option<AliasFn>,
}

impl Default for Context {
    fn default() -> Self {
        Context::from(Settings::default())
    }
}

impl From<Settings> for Context {
    fn from(settings: Settings) -> Self {
        Self {
            registry: Registry::from(settings.relationships),
            join_type: settings.join_type,
            sort: settings.sort,
            dialect: settings.dialect,
            auto_limit: settings.auto_limit,
            alias_fn: None,
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub fn from_toml_str(text: &str) -> QueryResult<Self> {
        let settings: Settings = toml::from_str(text)?;
        Ok(Context::from(settings))
    }

    pub fn load(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading settings");
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Candidate settings files, in lookup order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_SETTINGS)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sql-blocks").join("config.toml"));
        }
        paths
    }

    /// Load the first settings file found, else defaults.
    pub fn discover() -> QueryResult<Self> {
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn with_alias_fn(mut self, alias_fn: AliasFn) -> Self {
        self.alias_fn = Some(alias_fn);
        self
    }

    /// Alias for a bare table name: custom strategy, else derived default.
    pub fn alias_for(&self, table: &str) -> String {
        match self.alias_fn {
            Some(f) => f(table),
            None => derive_alias(table),
        }
    }
}

/// Initials of underscore-separated words, else the first three characters,
/// lower-cased.
pub fn derive_alias(table: &str) -> String {
    if table.contains('_') {
        table
            .split('_')
            .filter_map(|word| word.chars().next())
            .collect::<String>()
            .to_lowercase()
    } else {
        table.chars().take(3).collect::<String>().to_lowercase()
    }
}

/// Builder for [`Context`].
#[derive(Debug, Default)]
pub struct ContextBuilder {
    context: Context,
}

impl ContextBuilder {
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.context.dialect = dialect;
        self
    }

    pub fn join_type(mut self, join_type: JoinType) -> Self {
        self.context.join_type = join_type;
        self
    }

    pub fn sort(mut self, sort: SortType) -> Self {
        self.context.sort = sort;
        self
    }

    pub fn auto_limit(mut self, rows: u64) -> Self {
        self.context.auto_limit = rows;
        self
    }

    pub fn alias_fn(mut self, alias_fn: AliasFn) -> Self {
        self.context.alias_fn = Some(alias_fn);
        self
    }

    /// Register `owner.foreign_key -> referenced.primary_key`.
    pub fn relationship(
        mut self,
        owner: &str,
        referenced: &str,
        foreign_key: &str,
        primary_key: &str,
    ) -> Self {
        self.context
            .registry
            .bind(owner, referenced, foreign_key, primary_key);
        self
    }

    pub fn build(self) -> Context {
        self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;

    #[test]
    fn test_derive_alias() {
        assert_eq!(derive_alias("user_account"), "ua");
        assert_eq!(derive_alias("product"), "pro");
        assert_eq!(derive_alias("Movie"), "mov");
    }

    #[test]
    fn test_settings_from_toml() {
        let ctx = Context::from_toml_str(
            r#"
            dialect = "postgres"
            join_type = "left"
            sort = "desc"

            [[relationship]]
            owner = "Actor"
            referenced = "Cast"
            foreign_key = "cast"
            primary_key = "id"
            "#,
        )
        .unwrap();
        assert_eq!(ctx.dialect, Dialect::Postgresql);
        assert_eq!(ctx.join_type, JoinType::Left);
        assert_eq!(ctx.sort, SortType::Desc);
        assert_eq!(ctx.auto_limit, 100);
        assert_eq!(ctx.registry.find("actor", "cast").unwrap().primary_key, "id");
    }

    #[test]
    fn test_bad_settings() {
        let err = Context::from_toml_str("dialect = \"sqlite\"").unwrap_err();
        assert!(matches!(err, QueryError::Toml(_)));
    }

    #[test]
    fn test_custom_alias_fn() {
        fn upper(t: &str) -> String {
            t.to_uppercase()
        }
        let ctx = Context::builder().alias_fn(upper).build();
        assert_eq!(ctx.alias_for("movie"), "MOVIE");
    }
}
