//! Sub-query composition.

use super::Builder;
use crate::error::QueryResult;
use crate::value::{Column, Value};

/// Something that can become a child query: a builder, or a closure that
/// fills in a fresh one.
pub trait IntoQuery {
    fn into_query(self, parent: &Builder) -> QueryResult<Builder>;
}

impl IntoQuery for Builder {
    fn into_query(self, _parent: &Builder) -> QueryResult<Builder> {
        Ok(self)
    }
}

impl IntoQuery for &Builder {
    fn into_query(self, _parent: &Builder) -> QueryResult<Builder> {
        Ok(self.clone())
    }
}

impl<F> IntoQuery for F
where
    F: FnOnce(&mut Builder) -> QueryResult<()>,
{
    fn into_query(self, parent: &Builder) -> QueryResult<Builder> {
        let mut query = parent.for_sub_query();
        self(&mut query)?;
        Ok(query)
    }
}

/// A sub-select source: a builder, a closure, or literal SQL.
pub enum SubQuery {
    Query(Builder),
    Raw(String),
}

pub trait IntoSubQuery {
    fn into_sub_query(self, parent: &Builder) -> QueryResult<SubQuery>;
}

impl IntoSubQuery for Builder {
    fn into_sub_query(self, _parent: &Builder) -> QueryResult<SubQuery> {
        Ok(SubQuery::Query(self))
    }
}

impl IntoSubQuery for &Builder {
    fn into_sub_query(self, _parent: &Builder) -> QueryResult<SubQuery> {
        Ok(SubQuery::Query(self.clone()))
    }
}

impl IntoSubQuery for &str {
    fn into_sub_query(self, _parent: &Builder) -> QueryResult<SubQuery> {
        Ok(SubQuery::Raw(self.to_string()))
    }
}

impl IntoSubQuery for String {
    fn into_sub_query(self, _parent: &Builder) -> QueryResult<SubQuery> {
        Ok(SubQuery::Raw(self))
    }
}

impl<F> IntoSubQuery for F
where
    F: FnOnce(&mut Builder) -> QueryResult<()>,
{
    fn into_sub_query(self, parent: &Builder) -> QueryResult<SubQuery> {
        let mut query = parent.for_sub_query();
        self(&mut query)?;
        Ok(SubQuery::Query(query))
    }
}

impl Builder {
    /// Compile a sub-select into its SQL and bindings.
    pub fn create_sub(&self, query: impl IntoSubQuery) -> QueryResult<(String, Vec<Value>)> {
        self.parse_sub(query.into_sub_query(self)?)
    }

    pub(crate) fn parse_sub(&self, query: SubQuery) -> QueryResult<(String, Vec<Value>)> {
        match query {
            SubQuery::Raw(sql) => Ok((sql, Vec::new())),
            SubQuery::Query(query) => {
                let mut query = self.prepend_database_name_if_cross_database_query(query);
                let sql = query.to_sql()?;
                Ok((sql, query.get_bindings()))
            }
        }
    }

    /// Qualify the child's `from` with its database when it runs against a
    /// different database than this builder.
    pub(crate) fn prepend_database_name_if_cross_database_query(&self, mut query: Builder) -> Builder {
        let database = query.connection().database_name().to_string();
        if database.is_empty() || database == self.connection().database_name() {
            return query;
        }
        if let Some(Column::Name(from)) = &query.from {
            if !from.starts_with(&database) && !from.contains('.') {
                query.from = Some(Column::Name(format!("{database}.{from}")));
            }
        }
        query
    }
}
