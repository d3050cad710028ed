//! Write terminals.

use super::clause::UpsertUpdate;
use super::sub::IntoSubQuery;
use super::Builder;
use crate::bindings::clean_bindings;
use crate::error::{QueryError, QueryResult};
use crate::value::{Column, Expression, Value};

/// One row of column/value pairs, in the order given.
pub type Record = Vec<(String, Value)>;

fn into_record<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Record
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

fn sorted(mut record: Record) -> Record {
    record.sort_by(|a, b| a.0.cmp(&b.0));
    record
}

/// Overlay `overrides` on `base`: a column already present keeps its
/// position and takes the new value, new columns are appended.
fn merge_records(mut base: Record, overrides: Record) -> Record {
    for (column, value) in overrides {
        match base.iter_mut().find(|(existing, _)| *existing == column) {
            Some(slot) => slot.1 = value,
            None => base.push((column, value)),
        }
    }
    base
}

fn record_values(records: &[Record]) -> Vec<Value> {
    clean_bindings(records.iter().flat_map(|record| record.iter().map(|(_, v)| v.clone())))
}

impl Builder {
    // ===== insert =====

    /// Insert one row. An empty record inserts nothing and reports success.
    pub async fn insert<K, V>(&mut self, record: impl IntoIterator<Item = (K, V)>) -> QueryResult<bool>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let record = into_record(record);
        if record.is_empty() {
            return Ok(true);
        }
        self.insert_records(vec![record]).await
    }

    /// Insert several rows in one statement. Each record's columns are
    /// sorted by name so the rows line up.
    pub async fn insert_many<R, K, V>(&mut self, records: impl IntoIterator<Item = R>) -> QueryResult<bool>
    where
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let records: Vec<Record> = records.into_iter().map(|r| sorted(into_record(r))).collect();
        if records.is_empty() {
            return Ok(true);
        }
        self.insert_records(records).await
    }

    async fn insert_records(&mut self, records: Vec<Record>) -> QueryResult<bool> {
        self.apply_before_query_callbacks();
        let sql = self.grammar().compile_insert(self, &records)?;
        self.connection().insert(&sql, &record_values(&records)).await
    }

    /// Insert one row, skipping it on conflict. Returns the rows inserted.
    pub async fn insert_or_ignore<K, V>(&mut self, record: impl IntoIterator<Item = (K, V)>) -> QueryResult<u64>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let record = into_record(record);
        if record.is_empty() {
            return Ok(0);
        }
        self.insert_or_ignore_records(vec![record]).await
    }

    pub async fn insert_or_ignore_many<R, K, V>(&mut self, records: impl IntoIterator<Item = R>) -> QueryResult<u64>
    where
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let records: Vec<Record> = records.into_iter().map(|r| sorted(into_record(r))).collect();
        if records.is_empty() {
            return Ok(0);
        }
        self.insert_or_ignore_records(records).await
    }

    async fn insert_or_ignore_records(&mut self, records: Vec<Record>) -> QueryResult<u64> {
        self.apply_before_query_callbacks();
        let sql = self.grammar().compile_insert_or_ignore(self, &records)?;
        self.connection()
            .affecting_statement(&sql, &record_values(&records))
            .await
    }

    /// Insert one row and return its generated key (`sequence`, default `id`).
    pub async fn insert_get_id<K, V>(
        &mut self,
        record: impl IntoIterator<Item = (K, V)>,
        sequence: Option<&str>,
    ) -> QueryResult<Value>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let record = into_record(record);
        self.apply_before_query_callbacks();
        let sql = self.grammar().compile_insert_get_id(self, &record, sequence)?;
        let values = clean_bindings(record.into_iter().map(|(_, v)| v));
        self.processor()
            .process_insert_get_id(self, &sql, values, sequence)
            .await
    }

    /// `insert into table (columns) select ...`. Returns the rows inserted.
    pub async fn insert_using(&mut self, columns: &[&str], query: impl IntoSubQuery) -> QueryResult<u64> {
        self.apply_before_query_callbacks();
        let (sub, bindings) = self.create_sub(query)?;
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let sql = self.grammar().compile_insert_using(self, &columns, &sub)?;
        self.connection()
            .affecting_statement(&sql, &clean_bindings(bindings))
            .await
    }

    pub async fn insert_or_ignore_using(&mut self, columns: &[&str], query: impl IntoSubQuery) -> QueryResult<u64> {
        self.apply_before_query_callbacks();
        let (sub, bindings) = self.create_sub(query)?;
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let sql = self.grammar().compile_insert_or_ignore_using(self, &columns, &sub)?;
        self.connection()
            .affecting_statement(&sql, &clean_bindings(bindings))
            .await
    }

    // ===== update =====

    /// Update the matching rows. Returns the rows affected.
    pub async fn update<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>) -> QueryResult<u64>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.update_record(into_record(values)).await
    }

    async fn update_record(&mut self, values: Record) -> QueryResult<u64> {
        self.apply_before_query_callbacks();
        let sql = self.grammar().compile_update(self, &values)?;
        let bindings = self
            .grammar()
            .prepare_bindings_for_update(self.get_raw_bindings(), &values);
        self.connection().update(&sql, &clean_bindings(bindings)).await
    }

    /// `update ... from` using the joined tables, where the grammar supports it.
    pub async fn update_from<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>) -> QueryResult<u64>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let values = into_record(values);
        self.apply_before_query_callbacks();
        let sql = self.grammar().compile_update_from(self, &values)?;
        let bindings = self
            .grammar()
            .prepare_bindings_for_update_from(self.get_raw_bindings(), &values);
        self.connection().update(&sql, &clean_bindings(bindings)).await
    }

    /// Update the row matching `attributes`, or insert `attributes` merged
    /// with `values` when there is none.
    pub async fn update_or_insert<K, V, K2, V2>(
        &mut self,
        attributes: impl IntoIterator<Item = (K, V)>,
        values: impl IntoIterator<Item = (K2, V2)>,
    ) -> QueryResult<bool>
    where
        K: Into<String>,
        V: Into<Value>,
        K2: Into<String>,
        V2: Into<Value>,
    {
        let attributes = into_record(attributes);
        let values = into_record(values);

        let exists = self
            .where_map(attributes.iter().map(|(k, v)| (k.as_str(), v.clone())))
            .exists()
            .await?;
        if !exists {
            return self.insert(merge_records(attributes, values)).await;
        }
        if values.is_empty() {
            return Ok(true);
        }
        Ok(self.limit(1).update_record(values).await? > 0)
    }

    /// Insert `records`, updating `update` columns of rows that collide on
    /// `unique_by`. `None` updates every inserted column; an empty list
    /// degrades to a plain insert. Returns the rows affected.
    pub async fn upsert<R, K, V>(
        &mut self,
        records: impl IntoIterator<Item = R>,
        unique_by: &[&str],
        update: Option<Vec<UpsertUpdate>>,
    ) -> QueryResult<u64>
    where
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let records: Vec<Record> = records.into_iter().map(|r| sorted(into_record(r))).collect();
        if records.is_empty() {
            return Ok(0);
        }
        let update = match update {
            Some(update) if update.is_empty() => {
                return Ok(u64::from(self.insert_records(records).await?));
            }
            Some(update) => update,
            None => records[0]
                .iter()
                .map(|(column, _)| UpsertUpdate::Column(column.clone()))
                .collect(),
        };

        self.apply_before_query_callbacks();
        let unique_by: Vec<String> = unique_by.iter().map(|c| c.to_string()).collect();
        let sql = self
            .grammar()
            .compile_upsert(self, &records, &unique_by, &update)?;
        let mut bindings: Vec<Value> = records
            .iter()
            .flat_map(|record| record.iter().map(|(_, v)| v.clone()))
            .collect();
        bindings.extend(update.iter().filter_map(|entry| match entry {
            UpsertUpdate::Value(_, value) => Some(value.clone()),
            UpsertUpdate::Column(_) => None,
        }));
        self.connection()
            .affecting_statement(&sql, &clean_bindings(bindings))
            .await
    }

    // ===== increment / decrement =====

    /// `column = column + amount`. Returns the rows affected.
    pub async fn increment(&mut self, column: &str, amount: impl Into<Value>) -> QueryResult<u64> {
        self.increment_each([(column, amount.into())], Vec::<(String, Value)>::new())
            .await
    }

    pub async fn decrement(&mut self, column: &str, amount: impl Into<Value>) -> QueryResult<u64> {
        self.decrement_each([(column, amount.into())], Vec::<(String, Value)>::new())
            .await
    }

    /// Increment several columns at once, also setting `extra` columns.
    pub async fn increment_each<K, V, K2, V2>(
        &mut self,
        columns: impl IntoIterator<Item = (K, V)>,
        extra: impl IntoIterator<Item = (K2, V2)>,
    ) -> QueryResult<u64>
    where
        K: Into<String>,
        V: Into<Value>,
        K2: Into<String>,
        V2: Into<Value>,
    {
        let values = self.arithmetic_assignments(into_record(columns), "+")?;
        self.update_record(merge_records(values, into_record(extra)))
            .await
    }

    pub async fn decrement_each<K, V, K2, V2>(
        &mut self,
        columns: impl IntoIterator<Item = (K, V)>,
        extra: impl IntoIterator<Item = (K2, V2)>,
    ) -> QueryResult<u64>
    where
        K: Into<String>,
        V: Into<Value>,
        K2: Into<String>,
        V2: Into<Value>,
    {
        let values = self.arithmetic_assignments(into_record(columns), "-")?;
        self.update_record(merge_records(values, into_record(extra)))
            .await
    }

    fn arithmetic_assignments(&self, columns: Record, sign: &str) -> QueryResult<Record> {
        columns
            .into_iter()
            .map(|(column, amount)| {
                if !amount.is_numeric() {
                    return Err(QueryError::NonNumericAmount(column));
                }
                let wrapped = self.grammar().wrap(&Column::Name(column.clone()));
                let expression = Expression::new(format!("{wrapped} {sign} {amount}"));
                Ok((column, Value::Expression(expression)))
            })
            .collect()
    }

    // ===== delete / truncate =====

    /// Delete the matching rows, or only the row with `id` when given.
    /// Returns the rows affected.
    pub async fn delete(&mut self, id: Option<Value>) -> QueryResult<u64> {
        if let Some(id) = id {
            let column = match &self.from {
                Some(from) => format!("{}.id", from.as_str()),
                None => "id".to_string(),
            };
            self.where_eq(column, id);
        }
        self.apply_before_query_callbacks();
        let sql = self.grammar().compile_delete(self)?;
        let bindings = self.grammar().prepare_bindings_for_delete(self.get_raw_bindings());
        self.connection().delete(&sql, &clean_bindings(bindings)).await
    }

    /// Empty the table.
    pub async fn truncate(&mut self) -> QueryResult<()> {
        self.apply_before_query_callbacks();
        for (sql, bindings) in self.grammar().compile_truncate(self)? {
            self.connection().statement(&sql, &bindings).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, i64)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), Value::Int(*v))).collect()
    }

    #[test]
    fn merge_keeps_first_position_and_last_value() {
        let merged = merge_records(record(&[("a", 1), ("b", 2)]), record(&[("b", 3), ("c", 4)]));
        assert_eq!(merged, record(&[("a", 1), ("b", 3), ("c", 4)]));
    }

    #[test]
    fn records_sort_by_column_name() {
        assert_eq!(sorted(record(&[("z", 1), ("a", 2)])), record(&[("a", 2), ("z", 1)]));
    }
}
