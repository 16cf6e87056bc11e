//! `WITH [RECURSIVE]` composition.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Block, Where};
use crate::ast::{BinaryOp, ClauseKind, Expr, JoinType, Query};
use crate::config::Context;
use crate::error::{QueryError, QueryResult};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:([A-Za-z_][A-Za-z0-9_]*)\.)?\[(\d+)\]").unwrap());

/// A named common table expression whose members are UNION ALL joined,
/// followed by the outer query reading from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cte {
    pub name: String,
    pub recursive: bool,
    pub members: Vec<Query>,
    /// Outer `SELECT ... FROM <name> <alias>`
    pub main: Query,
}

impl Cte {
    /// `reference` is `"Name alias"` (or a bare name) for the outer query.
    pub fn new(reference: &str, members: Vec<Query>, ctx: &Context) -> QueryResult<Self> {
        if members.is_empty() {
            return Err(QueryError::config(format!(
                "CTE {reference} needs at least one member query"
            )));
        }
        let main = Query::from_table(reference, ctx);
        Ok(Self {
            name: main.table_name.clone(),
            recursive: false,
            members,
            main,
        })
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// Apply a builder to the outer query.
    pub fn bind(mut self, name: &str, block: impl Block, ctx: &mut Context) -> QueryResult<Self> {
        block.add(name, &mut self.main, ctx)?;
        Ok(self)
    }
}

/// Recursive CTE from one base query: a seeded anchor branch and a branch
/// joining the CTE back to the base through a recurrence formula.
///
/// In the formula `[k]` is the k-th SELECT field of the base (1-based,
/// qualified with the base alias) and `x.[k]` the same field name under
/// alias `x`.
#[derive(Debug, Clone)]
pub struct Recursive {
    reference: String,
    base: Query,
    seed: Option<(String, Where)>,
    recurrence: Option<String>,
    counter: Option<String>,
}

impl Recursive {
    pub fn new(reference: &str, base: Query) -> Self {
        Self {
            reference: reference.to_string(),
            base,
            seed: None,
            recurrence: None,
            counter: None,
        }
    }

    pub fn seed(mut self, field: &str, condition: Where) -> Self {
        self.seed = Some((field.to_string(), condition));
        self
    }

    pub fn recurrence(mut self, formula: &str) -> Self {
        self.recurrence = Some(formula.to_string());
        self
    }

    /// Running counter: `1` in the anchor branch, `<alias>.<name> + 1` after.
    pub fn counter(mut self, name: &str) -> Self {
        self.counter = Some(name.to_string());
        self
    }

    pub fn build(self, ctx: &mut Context) -> QueryResult<Cte> {
        let main = Query::from_table(&self.reference, ctx);
        let formula = self.recurrence.as_deref().ok_or_else(|| {
            QueryError::config(format!("recursive CTE {} needs a recurrence", main.table_name))
        })?;
        let on = resolve_placeholders(formula, &self.base)?;

        let mut anchor = self.base.clone();
        if let Some((field, condition)) = &self.seed {
            condition.add(field, &mut anchor, ctx)?;
        }
        let mut step = self.base.clone();
        step.add_clause(
            ClauseKind::From,
            Expr::Join {
                join_type: JoinType::Inner,
                table: main.table_name.clone(),
                alias: main.alias.clone(),
                on: Box::new(Expr::Raw(on)),
            },
        );
        if let Some(counter) = &self.counter {
            anchor.add_clause(
                ClauseKind::Select,
                Expr::aliased(Expr::literal(1), counter),
            );
            let next = Expr::Binary {
                left: Box::new(Expr::qualified(&main.alias, counter)),
                op: BinaryOp::Add,
                right: Box::new(Expr::literal(1)),
            };
            step.add_clause(ClauseKind::Select, Expr::aliased(next, counter));
        }
        anchor.break_lines = false;
        step.break_lines = false;
        Ok(Cte {
            name: main.table_name.clone(),
            recursive: true,
            members: vec![anchor, step],
            main,
        })
    }
}

fn resolve_placeholders(formula: &str, base: &Query) -> QueryResult<String> {
    let fields = base.clause(ClauseKind::Select);
    let mut out = String::new();
    let mut last = 0;
    for cap in PLACEHOLDER_RE.captures_iter(formula) {
        let Some(whole) = cap.get(0) else { continue };
        out.push_str(&formula[last..whole.start()]);
        let field = cap[2]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| fields.get(i))
            .ok_or_else(|| {
                QueryError::config(format!(
                    "placeholder {} is outside the {} fields of {}",
                    whole.as_str(),
                    fields.len(),
                    base.table_name
                ))
            })?;
        match cap.get(1) {
            Some(alias) => {
                let name = field.output_name().unwrap_or_default();
                out.push_str(&format!("{}.{}", alias.as_str(), name));
            }
            None => out.push_str(&field.inner().to_string()),
        }
        last = whole.end();
    }
    out.push_str(&formula[last..]);
    Ok(out)
}
