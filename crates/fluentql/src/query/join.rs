use super::clause::{Boolean, JoinType};
use super::sub::IntoSubQuery;
use super::Builder;
use crate::bindings::BindingCategory;
use crate::error::QueryResult;
use crate::value::{Column, Expression, Value};
use std::ops::{Deref, DerefMut};

/// A join: its type, target table and a child builder holding the `on` and
/// `where` constraints (and their bindings).
///
/// Derefs to that child builder, so every where method works on a join.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub kind: JoinType,
    pub table: Column,
    pub lateral: bool,
    query: Builder,
}

impl JoinClause {
    pub(crate) fn new(parent: &Builder, kind: JoinType, table: Column) -> Self {
        Self {
            kind,
            table,
            lateral: false,
            query: parent.new_query(),
        }
    }

    pub(crate) fn lateral(parent: &Builder, kind: JoinType, table: Column) -> Self {
        Self {
            lateral: true,
            ..Self::new(parent, kind, table)
        }
    }

    /// The child builder carrying the constraints.
    pub fn query(&self) -> &Builder {
        &self.query
    }

    /// `first operator second`, comparing two columns.
    pub fn on(
        &mut self,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Column>,
    ) -> &mut Self {
        self.query
            .add_where_column(first.into(), operator, second.into(), Boolean::And);
        self
    }

    pub fn or_on(
        &mut self,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Column>,
    ) -> &mut Self {
        self.query
            .add_where_column(first.into(), operator, second.into(), Boolean::Or);
        self
    }

    /// A parenthesised group of constraints.
    pub fn on_nested<F>(&mut self, callback: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut JoinClause) -> QueryResult<()>,
    {
        self.add_on_nested(callback, Boolean::And)
    }

    pub fn or_on_nested<F>(&mut self, callback: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut JoinClause) -> QueryResult<()>,
    {
        self.add_on_nested(callback, Boolean::Or)
    }

    fn add_on_nested<F>(&mut self, callback: F, boolean: Boolean) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut JoinClause) -> QueryResult<()>,
    {
        let mut nested = JoinClause::new(&self.query, self.kind, self.table.clone());
        callback(&mut nested)?;
        self.query.add_nested_where_query(nested.query, boolean);
        Ok(self)
    }
}

impl Deref for JoinClause {
    type Target = Builder;

    fn deref(&self) -> &Builder {
        &self.query
    }
}

impl DerefMut for JoinClause {
    fn deref_mut(&mut self) -> &mut Builder {
        &mut self.query
    }
}

impl Builder {
    fn push_join(&mut self, join: JoinClause) -> &mut Self {
        let bindings = join.get_bindings();
        self.joins.push(join);
        self.extend_bindings(BindingCategory::Join, bindings);
        self
    }

    fn add_join(
        &mut self,
        kind: JoinType,
        table: Column,
        first: Column,
        operator: &str,
        second: Column,
    ) -> &mut Self {
        let mut join = JoinClause::new(self, kind, table);
        join.on(first, operator, second);
        self.push_join(join)
    }

    fn add_join_where(
        &mut self,
        kind: JoinType,
        table: Column,
        first: Column,
        operator: &str,
        second: Value,
    ) -> QueryResult<&mut Self> {
        let mut join = JoinClause::new(self, kind, table);
        join.where_(first, operator, second)?;
        Ok(self.push_join(join))
    }

    fn add_join_with<F>(&mut self, kind: JoinType, table: Column, callback: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut JoinClause) -> QueryResult<()>,
    {
        let mut join = JoinClause::new(self, kind, table);
        callback(&mut join)?;
        Ok(self.push_join(join))
    }

    /// Compile `query` to `(sql) as "alias"` and stash its bindings under `join`.
    fn join_sub_expression(&mut self, query: impl IntoSubQuery, alias: &str) -> QueryResult<Column> {
        let (sql, bindings) = self.create_sub(query)?;
        let expression = format!("({sql}) as {}", self.grammar().wrap_table_str(alias));
        self.extend_bindings(BindingCategory::Join, bindings);
        Ok(Column::Raw(Expression::new(expression)))
    }

    /// `inner join table on first operator second`.
    pub fn join(
        &mut self,
        table: impl Into<Column>,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Column>,
    ) -> &mut Self {
        self.add_join(JoinType::Inner, table.into(), first.into(), operator, second.into())
    }

    /// Inner join constrained by a bound value instead of a column.
    pub fn join_where(
        &mut self,
        table: impl Into<Column>,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_join_where(JoinType::Inner, table.into(), first.into(), operator, second.into())
    }

    /// Join of any type whose constraints are built by `callback`.
    pub fn join_with<F>(&mut self, table: impl Into<Column>, kind: JoinType, callback: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut JoinClause) -> QueryResult<()>,
    {
        self.add_join_with(kind, table.into(), callback)
    }

    pub fn left_join(
        &mut self,
        table: impl Into<Column>,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Column>,
    ) -> &mut Self {
        self.add_join(JoinType::Left, table.into(), first.into(), operator, second.into())
    }

    pub fn left_join_where(
        &mut self,
        table: impl Into<Column>,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_join_where(JoinType::Left, table.into(), first.into(), operator, second.into())
    }

    pub fn right_join(
        &mut self,
        table: impl Into<Column>,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Column>,
    ) -> &mut Self {
        self.add_join(JoinType::Right, table.into(), first.into(), operator, second.into())
    }

    pub fn right_join_where(
        &mut self,
        table: impl Into<Column>,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_join_where(JoinType::Right, table.into(), first.into(), operator, second.into())
    }

    /// `cross join table`.
    pub fn cross_join(&mut self, table: impl Into<Column>) -> &mut Self {
        let join = JoinClause::new(self, JoinType::Cross, table.into());
        self.push_join(join)
    }

    pub fn cross_join_sub(&mut self, query: impl IntoSubQuery, alias: &str) -> QueryResult<&mut Self> {
        let table = self.join_sub_expression(query, alias)?;
        let join = JoinClause::new(self, JoinType::Cross, table);
        Ok(self.push_join(join))
    }

    /// Join a sub-select aliased as `alias`.
    pub fn join_sub(
        &mut self,
        query: impl IntoSubQuery,
        alias: &str,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Column>,
    ) -> QueryResult<&mut Self> {
        self.add_join_sub(JoinType::Inner, query, alias, first.into(), operator, second.into())
    }

    pub fn left_join_sub(
        &mut self,
        query: impl IntoSubQuery,
        alias: &str,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Column>,
    ) -> QueryResult<&mut Self> {
        self.add_join_sub(JoinType::Left, query, alias, first.into(), operator, second.into())
    }

    pub fn right_join_sub(
        &mut self,
        query: impl IntoSubQuery,
        alias: &str,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Column>,
    ) -> QueryResult<&mut Self> {
        self.add_join_sub(JoinType::Right, query, alias, first.into(), operator, second.into())
    }

    fn add_join_sub(
        &mut self,
        kind: JoinType,
        query: impl IntoSubQuery,
        alias: &str,
        first: Column,
        operator: &str,
        second: Column,
    ) -> QueryResult<&mut Self> {
        let table = self.join_sub_expression(query, alias)?;
        Ok(self.add_join(kind, table, first, operator, second))
    }

    /// `inner join lateral (sub) as alias on true`.
    pub fn join_lateral(&mut self, query: impl IntoSubQuery, alias: &str) -> QueryResult<&mut Self> {
        self.add_join_lateral(JoinType::Inner, query, alias)
    }

    pub fn left_join_lateral(&mut self, query: impl IntoSubQuery, alias: &str) -> QueryResult<&mut Self> {
        self.add_join_lateral(JoinType::Left, query, alias)
    }

    fn add_join_lateral(&mut self, kind: JoinType, query: impl IntoSubQuery, alias: &str) -> QueryResult<&mut Self> {
        let table = self.join_sub_expression(query, alias)?;
        let join = JoinClause::lateral(self, kind, table);
        self.joins.push(join);
        Ok(self)
    }
}

