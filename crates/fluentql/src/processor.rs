//! Result post-processing.

use crate::error::QueryResult;
use crate::query::Builder;
use crate::row::Row;
use crate::value::Value;

/// Post-processes select results and resolves generated ids.
#[async_trait::async_trait]
pub trait Processor: Send + Sync {
    /// Adjust the rows of a select before the builder returns them.
    fn process_select(&self, query: &Builder, results: Vec<Row>) -> Vec<Row> {
        let _ = query;
        results
    }

    /// Run an insert compiled by `compile_insert_get_id` and return the new id.
    async fn process_insert_get_id(
        &self,
        query: &Builder,
        sql: &str,
        values: Vec<Value>,
        sequence: Option<&str>,
    ) -> QueryResult<Value>;
}

/// Numeric strings become integers; everything else is returned as is.
fn normalize_id(id: Value) -> Value {
    match &id {
        Value::Text(s) => s.trim().parse::<i64>().map(Value::Int).unwrap_or(id),
        _ => id,
    }
}

/// Inserts, then asks the connection for its last insert id.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardProcessor;

#[async_trait::async_trait]
impl Processor for StandardProcessor {
    async fn process_insert_get_id(
        &self,
        query: &Builder,
        sql: &str,
        values: Vec<Value>,
        sequence: Option<&str>,
    ) -> QueryResult<Value> {
        let connection = query.connection();
        connection.insert(sql, &values).await?;
        let id = connection.last_insert_id(sequence).await?;
        Ok(normalize_id(id))
    }
}

/// Reads the id from the `returning` column of the insert itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresProcessor;

#[async_trait::async_trait]
impl Processor for PostgresProcessor {
    async fn process_insert_get_id(
        &self,
        query: &Builder,
        sql: &str,
        values: Vec<Value>,
        sequence: Option<&str>,
    ) -> QueryResult<Value> {
        let rows = query
            .connection()
            .select_from_write_connection(sql, &values)
            .await?;
        let key = sequence.unwrap_or("id");
        let id = rows
            .first()
            .and_then(|row| row.get(key).or_else(|| row.first_value()))
            .cloned()
            .unwrap_or(Value::Null);
        Ok(normalize_id(id))
    }
}
