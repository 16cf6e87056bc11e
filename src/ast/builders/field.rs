//! Projection builders and table/key metadata builders.

use super::Block;
use crate::ast::{ClauseKind, Expr, Frame, FrameBound, Func, FunctionCall, Query, SortType, Value};
use crate::config::Context;
use crate::error::QueryResult;

/// Builders that produce a single SELECT expression.
pub trait Projection {
    fn project(&self, name: &str, query: &Query) -> QueryResult<Expr>;
}

fn select(projection: &dyn Projection, name: &str, query: &mut Query) -> QueryResult<()> {
    let expr = projection.project(name, query)?;
    query.add_clause(ClauseKind::Select, expr);
    Ok(())
}

/// Plain field, qualified with the query alias (`_` selects everything).
#[derive(Debug, Clone, Copy, Default)]
pub struct Field;

impl Field {
    /// Formula field; `%` stands for the qualified field.
    pub fn expression(template: &str) -> Expression {
        Expression {
            template: template.to_string(),
        }
    }
}

impl Projection for Field {
    fn project(&self, name: &str, query: &Query) -> QueryResult<Expr> {
        Ok(query.qualify(name))
    }
}

impl Block for Field {
    fn add(&self, name: &str, query: &mut Query, _ctx: &mut Context) -> QueryResult<()> {
        select(self, name, query)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Distinct;

impl Projection for Distinct {
    fn project(&self, name: &str, query: &Query) -> QueryResult<Expr> {
        Ok(Expr::Distinct(Box::new(query.qualify(name))))
    }
}

impl Block for Distinct {
    fn add(&self, name: &str, query: &mut Query, _ctx: &mut Context) -> QueryResult<()> {
        select(self, name, query)
    }
}

/// See [`Field::expression`].
#[derive(Debug, Clone)]
pub struct Expression {
    template: String,
}

impl Projection for Expression {
    fn project(&self, name: &str, query: &Query) -> QueryResult<Expr> {
        let field = query.qualify(name).to_string();
        Ok(Expr::Raw(self.template.replace('%', &field)))
    }
}

impl Block for Expression {
    fn add(&self, name: &str, query: &mut Query, _ctx: &mut Context) -> QueryResult<()> {
        select(self, name, query)
    }
}

/// Another projection followed by `AS alias`.
pub struct NamedField {
    alias: String,
    inner: Box<dyn Projection>,
}

impl NamedField {
    pub fn new(alias: &str) -> Self {
        Self::with(alias, Field)
    }

    pub fn with(alias: &str, inner: impl Projection + 'static) -> Self {
        Self {
            alias: alias.to_string(),
            inner: Box::new(inner),
        }
    }
}

impl Projection for NamedField {
    fn project(&self, name: &str, query: &Query) -> QueryResult<Expr> {
        Ok(Expr::aliased(self.inner.project(name, query)?, &self.alias))
    }
}

impl Block for NamedField {
    fn add(&self, name: &str, query: &mut Query, _ctx: &mut Context) -> QueryResult<()> {
        select(self, name, query)
    }
}

/// Window specification with field names still unqualified.
#[derive(Debug, Clone, Default)]
pub struct Over {
    partition: Vec<String>,
    order: Vec<(String, SortType)>,
    rows: Option<(FrameBound, FrameBound)>,
}

impl Over {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition(mut self, field: &str) -> Self {
        self.partition.push(field.to_string());
        self
    }

    pub fn order(mut self, field: &str) -> Self {
        self.order.push((field.to_string(), SortType::Asc));
        self
    }

    pub fn order_desc(mut self, field: &str) -> Self {
        self.order.push((field.to_string(), SortType::Desc));
        self
    }

    pub fn rows(mut self, start: FrameBound, end: FrameBound) -> Self {
        self.rows = Some((start, end));
        self
    }

    fn frame(&self, query: &Query) -> Frame {
        Frame {
            partition: self.partition.iter().map(|f| query.qualify(f)).collect(),
            order: self
                .order
                .iter()
                .map(|(f, sort)| match sort {
                    SortType::Asc => query.qualify(f),
                    SortType::Desc => Expr::sorted(query.qualify(f), SortType::Desc),
                })
                .collect(),
            rows: self.rows,
        }
    }
}

/// Known function wrapping the bound field.
#[derive(Debug, Clone)]
pub struct Function {
    func: Func,
    params: Vec<Expr>,
    over: Option<Over>,
}

impl Function {
    pub fn new(func: Func) -> Self {
        Self {
            func,
            params: Vec::new(),
            over: None,
        }
    }

    pub fn avg() -> Self {
        Self::new(Func::Avg)
    }

    pub fn min() -> Self {
        Self::new(Func::Min)
    }

    pub fn max() -> Self {
        Self::new(Func::Max)
    }

    pub fn sum() -> Self {
        Self::new(Func::Sum)
    }

    pub fn count() -> Self {
        Self::new(Func::Count)
    }

    pub fn year() -> Self {
        Self::new(Func::Year)
    }

    /// Literal parameter appended after the field.
    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(Expr::Literal(value.into()));
        self
    }

    /// Verbatim parameter, e.g. a type name for `Cast`.
    pub fn raw_param(mut self, text: &str) -> Self {
        self.params.push(Expr::raw(text));
        self
    }

    pub fn over(mut self, over: Over) -> Self {
        self.over = Some(over);
        self
    }

    pub fn call(&self, name: &str, query: &Query) -> FunctionCall {
        let mut args = Vec::new();
        if !self.func.is_niladic() {
            args.push(query.qualify(name));
        }
        args.extend(self.params.iter().cloned());
        FunctionCall {
            func: self.func,
            args,
            frame: self.over.as_ref().map(|o| o.frame(query)),
        }
    }
}

impl Projection for Function {
    fn project(&self, name: &str, query: &Query) -> QueryResult<Expr> {
        Ok(Expr::function(self.call(name, query)))
    }
}

impl Block for Function {
    fn add(&self, name: &str, query: &mut Query, _ctx: &mut Context) -> QueryResult<()> {
        select(self, name, query)
    }
}

/// Applies builders across a comma-separated field list.
///
/// By default every builder is applied to every field; zipped mode pairs
/// them positionally.
pub struct FieldList {
    fields: Vec<String>,
    blocks: Vec<Box<dyn Block>>,
    zipped: bool,
}

impl FieldList {
    pub fn new(fields: &str) -> Self {
        Self::of(fields, vec![Box::new(Field) as Box<dyn Block>])
    }

    pub fn of(fields: &str, blocks: Vec<Box<dyn Block>>) -> Self {
        Self {
            fields: fields
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect(),
            blocks,
            zipped: false,
        }
    }

    pub fn zipped(mut self) -> Self {
        self.zipped = true;
        self
    }
}

impl Block for FieldList {
    fn add(&self, _name: &str, query: &mut Query, ctx: &mut Context) -> QueryResult<()> {
        if self.zipped {
            for (field, block) in self.fields.iter().zip(&self.blocks) {
                block.add(field, query, ctx)?;
            }
        } else {
            for field in &self.fields {
                for block in &self.blocks {
                    block.add(field, query, ctx)?;
                }
            }
        }
        Ok(())
    }
}

/// A [`FieldList`] bound to a table name: sets the table, then the fields.
pub struct Table(FieldList);

impl Table {
    pub fn new(fields: &str) -> Self {
        Self(FieldList::new(fields))
    }

    pub fn of(fields: &str, blocks: Vec<Box<dyn Block>>) -> Self {
        Self(FieldList::of(fields, blocks))
    }

    pub fn zipped(self) -> Self {
        Self(self.0.zipped())
    }
}

impl Block for Table {
    fn add(&self, name: &str, query: &mut Query, ctx: &mut Context) -> QueryResult<()> {
        query.set_table(name, ctx);
        self.0.add(name, query, ctx)
    }
}

/// Marks the bound field as the query's key.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimaryKey;

impl Block for PrimaryKey {
    fn add(&self, name: &str, query: &mut Query, _ctx: &mut Context) -> QueryResult<()> {
        query.key_field = Some(name.to_string());
        Ok(())
    }
}

/// Records that the bound field references another table.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    referenced: String,
    primary_key: String,
}

impl ForeignKey {
    pub fn new(referenced: &str) -> Self {
        Self {
            referenced: referenced.to_string(),
            primary_key: String::new(),
        }
    }

    /// Explicit key on the referenced table instead of its key field.
    pub fn to(mut self, primary_key: &str) -> Self {
        self.primary_key = primary_key.to_string();
        self
    }
}

impl Block for ForeignKey {
    fn add(&self, name: &str, query: &mut Query, ctx: &mut Context) -> QueryResult<()> {
        ctx.registry
            .bind(&query.table_name, &self.referenced, name, &self.primary_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::Select;
    use crate::transpiler::{Dialect, ToSql};

    #[test]
    fn test_field_qualification() {
        let mut ctx = Context::default();
        let q = Select::from("Movie m")
            .bind("title", Field)
            .bind("x.genre", Field)
            .bind("1 + 1", Field)
            .build(&mut ctx)
            .unwrap();
        assert_eq!(q.to_sql(), "SELECT m.title, x.genre, 1 + 1 FROM Movie m");
        let q = Select::from("Movie m").bind("_", Field).build(&mut ctx).unwrap();
        assert_eq!(q.to_sql(), "SELECT * FROM Movie m");
    }

    #[test]
    fn test_functions_and_expressions() {
        let mut ctx = Context::default();
        let q = Select::from("Sales s")
            .bind("price", NamedField::with("total", Function::sum()))
            .bind("price", Function::new(Func::Round).param(2))
            .bind("sold_at", Field::expression("extract(year from %)"))
            .bind("category", Distinct)
            .build(&mut ctx)
            .unwrap();
        assert_eq!(
            q.to_sql(),
            "SELECT SUM(s.price) AS total, ROUND(s.price, 2), extract(year from s.sold_at), DISTINCT s.category FROM Sales s"
        );
    }

    #[test]
    fn test_window_function() {
        let mut ctx = Context::default();
        let q = Select::from("Employee e")
            .bind(
                "salary",
                NamedField::with(
                    "position",
                    Function::new(Func::RowNumber).over(Over::new().partition("dept").order_desc("salary")),
                ),
            )
            .build(&mut ctx)
            .unwrap();
        assert_eq!(
            q.to_sql(),
            "SELECT ROW_NUMBER() OVER(PARTITION BY e.dept ORDER BY e.salary DESC) AS position FROM Employee e"
        );
    }

    #[test]
    fn test_dialect_sensitive_year() {
        let mut ctx = Context::default();
        let q = Select::from("Movie m")
            .bind("release_date", Function::year())
            .build(&mut ctx)
            .unwrap();
        assert_eq!(
            q.to_sql_with_dialect(Dialect::Postgresql),
            "SELECT DATE_PART('year', m.release_date) FROM Movie m"
        );
        assert_eq!(
            q.to_sql_with_dialect(Dialect::Mysql),
            "SELECT YEAR(m.release_date) FROM Movie m"
        );
    }

    #[test]
    fn test_table_and_zipped_field_list() {
        let mut ctx = Context::default();
        let q = Select::new()
            .bind("Cast", Table::new("role, title"))
            .build(&mut ctx)
            .unwrap();
        assert_eq!(q.to_sql(), "SELECT cas.role, cas.title FROM Cast cas");

        let q = Select::from("Movie m")
            .bind(
                "",
                FieldList::of("title, budget", vec![Box::new(Field) as Box<dyn Block>, Box::new(Function::max())])
                    .zipped(),
            )
            .build(&mut ctx)
            .unwrap();
        assert_eq!(q.to_sql(), "SELECT m.title, MAX(m.budget) FROM Movie m");
    }

    #[test]
    fn test_keys_write_registry() {
        let mut ctx = Context::default();
        let q = Select::from("Actor a")
            .bind("id", PrimaryKey)
            .bind("cast", ForeignKey::new("Cast").to("cast_id"))
            .build(&mut ctx)
            .unwrap();
        assert_eq!(q.key_field.as_deref(), Some("id"));
        assert!(q.is_empty(ClauseKind::Select));
        let rel = ctx.registry.find("actor", "cast").unwrap();
        assert_eq!((rel.foreign_key.as_str(), rel.primary_key.as_str()), ("cast", "cast_id"));
    }
}
