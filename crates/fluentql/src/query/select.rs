use super::clause::{Distinct, IndexHint, IndexHintKind};
use super::sub::IntoSubQuery;
use super::Builder;
use crate::bindings::BindingCategory;
use crate::error::QueryResult;
use crate::value::{Column, Expression, Value};

impl Builder {
    /// Replace the select list.
    pub fn select<C: Into<Column>>(&mut self, columns: impl IntoIterator<Item = C>) -> &mut Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self.clear_bindings(BindingCategory::Select);
        self
    }

    /// Select a sub-query as `alias`.
    pub fn select_sub(&mut self, query: impl IntoSubQuery, alias: &str) -> QueryResult<&mut Self> {
        let (sql, bindings) = self.create_sub(query)?;
        let expression = format!("({sql}) as {}", self.grammar().wrap_str(alias));
        Ok(self.select_raw(expression, bindings))
    }

    /// Add a raw select expression with its own bindings.
    pub fn select_raw(&mut self, expression: impl Into<String>, bindings: impl IntoIterator<Item = Value>) -> &mut Self {
        self.push_column(Column::Raw(Expression::new(expression)));
        self.extend_bindings(BindingCategory::Select, bindings);
        self
    }

    /// Add columns to the select list, skipping ones already there.
    pub fn add_select<C: Into<Column>>(&mut self, columns: impl IntoIterator<Item = C>) -> &mut Self {
        for column in columns {
            let column = column.into();
            let exists = self
                .columns
                .as_ref()
                .is_some_and(|existing| existing.contains(&column));
            if !exists {
                self.push_column(column);
            }
        }
        self
    }

    /// Add a sub-query to the select list as `alias`. A query still selecting
    /// `*` first switches to `from.*`.
    pub fn add_select_sub(&mut self, query: impl IntoSubQuery, alias: &str) -> QueryResult<&mut Self> {
        if self.columns.is_none() {
            let all = match &self.from {
                Some(from) => format!("{}.*", from.as_str()),
                None => "*".to_string(),
            };
            self.select([all]);
        }
        self.select_sub(query, alias)
    }

    fn push_column(&mut self, column: Column) {
        self.columns.get_or_insert_with(Vec::new).push(column);
    }

    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = Distinct::All;
        self
    }

    /// `distinct on (columns)`.
    pub fn distinct_on<C: Into<Column>>(&mut self, columns: impl IntoIterator<Item = C>) -> &mut Self {
        self.distinct = Distinct::On(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the table to select from.
    pub fn from(&mut self, table: impl Into<Column>) -> &mut Self {
        self.from = Some(table.into());
        self
    }

    /// `from table as alias`.
    pub fn from_as(&mut self, table: &str, alias: &str) -> &mut Self {
        self.from(format!("{table} as {alias}"))
    }

    /// Select from a sub-query aliased as `alias`.
    pub fn from_sub(&mut self, query: impl IntoSubQuery, alias: &str) -> QueryResult<&mut Self> {
        let (sql, bindings) = self.create_sub(query)?;
        let expression = format!("({sql}) as {}", self.grammar().wrap_table_str(alias));
        Ok(self.from_raw(expression, bindings))
    }

    /// Raw `from` SQL with its own bindings.
    pub fn from_raw(&mut self, expression: impl Into<String>, bindings: impl IntoIterator<Item = Value>) -> &mut Self {
        self.from = Some(Column::Raw(Expression::new(expression)));
        self.extend_bindings(BindingCategory::From, bindings);
        self
    }

    pub fn use_index(&mut self, index: impl Into<String>) -> &mut Self {
        self.set_index_hint(IndexHintKind::Use, index.into())
    }

    pub fn force_index(&mut self, index: impl Into<String>) -> &mut Self {
        self.set_index_hint(IndexHintKind::Force, index.into())
    }

    pub fn ignore_index(&mut self, index: impl Into<String>) -> &mut Self {
        self.set_index_hint(IndexHintKind::Ignore, index.into())
    }

    fn set_index_hint(&mut self, kind: IndexHintKind, index: String) -> &mut Self {
        self.index_hint = Some(IndexHint { kind, index });
        self
    }
}
