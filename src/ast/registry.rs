//! Relationship registry: which table holds a foreign key to which.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `owner.foreign_key` references `referenced.primary_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub owner: String,
    pub referenced: String,
    pub foreign_key: String,
    /// Empty when the referenced side's key field should be used.
    #[serde(default)]
    pub primary_key: String,
}

/// Table-pair to key binding map. Keys are table names compared
/// case-insensitively; the same table joined twice under different aliases
/// shares one binding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Relationship>", into = "Vec<Relationship>")]
pub struct Registry {
    bindings: BTreeMap<(String, String), Relationship>,
}

fn key(owner: &str, referenced: &str) -> (String, String) {
    (owner.to_lowercase(), referenced.to_lowercase())
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `owner.foreign_key` references `referenced.primary_key`.
    /// Last write wins.
    pub fn bind(
        &mut self,
        owner: &str,
        referenced: &str,
        foreign_key: impl Into<String>,
        primary_key: impl Into<String>,
    ) {
        let relationship = Relationship {
            owner: owner.to_string(),
            referenced: referenced.to_string(),
            foreign_key: foreign_key.into(),
            primary_key: primary_key.into(),
        };
        tracing::trace!(owner, referenced, fk = %relationship.foreign_key, "bind relationship");
        self.bindings.insert(key(owner, referenced), relationship);
    }

    pub fn find(&self, owner: &str, referenced: &str) -> Option<&Relationship> {
        self.bindings.get(&key(owner, referenced))
    }

    /// Number of relationships `table` takes part in, on either side.
    pub fn degree(&self, table: &str) -> usize {
        let table = table.to_lowercase();
        self.bindings
            .keys()
            .filter(|(owner, referenced)| *owner == table || *referenced == table)
            .count()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}

impl From<Vec<Relationship>> for Registry {
    fn from(items: Vec<Relationship>) -> Self {
        let mut registry = Registry::new();
        for r in items {
            registry.bind(&r.owner, &r.referenced, r.foreign_key, r.primary_key);
        }
        registry
    }
}

impl From<Registry> for Vec<Relationship> {
    fn from(registry: Registry) -> Self {
        registry.relationships().cloned().collect()
    }
}
