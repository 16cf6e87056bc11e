//! Rewrite rules applied after a query is built or parsed.
//!
//! Each [`Rule`] maps to a [`Rewrite`] pass over one query. Passes are
//! independent and idempotent: running a rule a second time leaves the
//! query as the first run did.
//!
//! ```text
//! Query → optimize(&[Rule]) → rule.rewrite().apply(query, ctx) ... → Query
//! ```

mod dates;
mod joins;
mod limits;
mod predicates;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ast::Query;
use crate::config::Context;
use crate::error::{QueryError, QueryResult};

pub use dates::YearRange;
pub use joins::JoinToSubquery;
pub use limits::AutoLimit;
pub use predicates::{FoldOr, InvertNot};

/// One rewrite pass.
pub trait Rewrite {
    fn rule(&self) -> Rule;

    /// Rewrite `query` in place. Returns whether anything changed.
    fn apply(&self, query: &mut Query, ctx: &Context) -> QueryResult<bool>;
}

/// Available rewrite rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Row cap on a query with neither projection nor filter
    AutoLimit,
    /// `f = 1 OR f = 2` into `f IN (1,2)`
    FoldOr,
    /// `NOT f > 1` into `f <= 1`
    InvertNot,
    /// `YEAR(f) = 2020` into a date range on `f`
    YearRange,
    /// Joined tables used only for filtering become `IN (SELECT ...)`
    JoinToSubquery,
}

impl Rule {
    pub const ALL: [Rule; 5] = [
        Rule::AutoLimit,
        Rule::FoldOr,
        Rule::InvertNot,
        Rule::YearRange,
        Rule::JoinToSubquery,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Rule::AutoLimit => "auto_limit",
            Rule::FoldOr => "fold_or",
            Rule::InvertNot => "invert_not",
            Rule::YearRange => "year_range",
            Rule::JoinToSubquery => "join_to_subquery",
        }
    }

    pub fn rewrite(&self) -> Box<dyn Rewrite> {
        match self {
            Rule::AutoLimit => Box::new(AutoLimit),
            Rule::FoldOr => Box::new(FoldOr),
            Rule::InvertNot => Box::new(InvertNot),
            Rule::YearRange => Box::new(YearRange),
            Rule::JoinToSubquery => Box::new(JoinToSubquery),
        }
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Rule {
    type Err = QueryError;

    /// Accepts `fold_or`, `fold-or` and `FoldOr`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        Rule::ALL
            .into_iter()
            .find(|rule| rule.name().replace('_', "") == wanted)
            .ok_or_else(|| QueryError::config(format!("unknown rule: {}", s.trim())))
    }
}

impl Query {
    /// Apply `rules` in order.
    pub fn optimize(&mut self, rules: &[Rule], ctx: &Context) -> QueryResult<&mut Self> {
        for rule in rules {
            if rule.rewrite().apply(self, ctx)? {
                tracing::debug!(%rule, table = %self.table_name, "rule applied");
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::*;
    use crate::ast::ClauseKind;

    #[test]
    fn test_rule_from_str() {
        assert_eq!("fold-or".parse::<Rule>().unwrap(), Rule::FoldOr);
        assert_eq!("JoinToSubquery".parse::<Rule>().unwrap(), Rule::JoinToSubquery);
        assert_eq!(" year_range ".parse::<Rule>().unwrap(), Rule::YearRange);
        assert!("vacuum".parse::<Rule>().is_err());
    }

    #[test]
    fn test_optimize_runs_rules_in_order() {
        let mut ctx = Context::default();
        let mut q = Select::from("Product p")
            .bind(
                "OR",
                Options::new([("status", Where::eq("A")), ("status", Where::eq("B"))]),
            )
            .build(&mut ctx)
            .unwrap();
        q.optimize(&[Rule::FoldOr, Rule::AutoLimit], &ctx).unwrap();
        let wheres: Vec<String> = q.clause(ClauseKind::Where).iter().map(|e| e.to_string()).collect();
        assert_eq!(wheres, vec!["p.status IN ('A','B')"]);
        // WHERE is no longer empty, so no implicit limit
        assert!(q.is_empty(ClauseKind::Limit));
    }

    #[test]
    fn test_every_rule_is_idempotent() {
        let mut ctx = Context::builder()
            .relationship("Movie", "Person", "director", "id")
            .build();
        let movie = Select::from("Movie m")
            .bind("title", Field)
            .bind(
                "OR",
                Options::new([("genre", Where::eq("Drama")), ("genre", Where::eq("War"))]),
            )
            .bind("budget", Where::gt(1000).negate())
            .build(&mut ctx)
            .unwrap();
        let person = Select::from("Person p")
            .bind("name", Where::eq("Nolan"))
            .build(&mut ctx)
            .unwrap();
        let base = movie.combine(person, &ctx.registry).unwrap();
        for rule in Rule::ALL {
            let mut once = base.clone();
            once.optimize(&[rule], &ctx).unwrap();
            let mut twice = once.clone();
            twice.optimize(&[rule], &ctx).unwrap();
            assert!(once.equals(&twice), "{rule} is not idempotent");
        }
    }
}
