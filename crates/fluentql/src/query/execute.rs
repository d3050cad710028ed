//! Read terminals: selects, single-row reads, plucks and aggregates.

use super::clause::{Aggregate, Component};
use super::cursor::CallbackRowStream;
use super::Builder;
use crate::bindings::BindingCategory;
use crate::error::{QueryError, QueryResult};
use crate::row::{FromRow, Row};
use crate::value::{Column, Value};

/// Key under which a grouped-limit query reports each row's position.
const GROUP_ROW: &str = "group_row";

/// The part of a column reference a result row is keyed by: the alias after
/// ` as `, else the last dotted segment.
pub(crate) fn strip_table_for_pluck(column: &str) -> &str {
    let lower = column.to_ascii_lowercase();
    if let Some(pos) = lower.rfind(" as ") {
        return column[pos + 4..].trim();
    }
    column.rsplit('.').next().unwrap_or(column)
}

impl Builder {
    // ===== selects =====

    async fn run_select(&mut self) -> QueryResult<Vec<Row>> {
        let sql = self.to_sql()?;
        let bindings = self.get_bindings();
        let use_read = !self.use_write_connection;
        self.connection().select(&sql, &bindings, use_read).await
    }

    /// Run the select and return every row.
    pub async fn get(&mut self) -> QueryResult<Vec<Row>> {
        let rows = self.run_select().await?;
        let mut rows = self.processor().process_select(self, rows);
        if self.group_limit.is_some() {
            for row in &mut rows {
                row.remove(GROUP_ROW);
            }
        }
        Ok(self.apply_after_query_callbacks(rows))
    }

    /// [`get`](Self::get) selecting `columns` when no columns were chosen yet.
    /// The column list is restored afterwards.
    pub async fn get_columns<C: Into<Column>>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
    ) -> QueryResult<Vec<Row>> {
        let original = self.columns.clone();
        if original.is_none() {
            self.columns = Some(columns.into_iter().map(Into::into).collect());
        }
        let result = self.get().await;
        self.columns = original;
        result
    }

    /// Every row decoded into `T`.
    pub async fn get_as<T: FromRow>(&mut self) -> QueryResult<Vec<T>> {
        self.get().await?.iter().map(T::from_row).collect()
    }

    /// The first row, if any. Sets `limit 1`.
    pub async fn first(&mut self) -> QueryResult<Option<Row>> {
        Ok(self.take(1).get().await?.into_iter().next())
    }

    pub async fn first_columns<C: Into<Column>>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
    ) -> QueryResult<Option<Row>> {
        Ok(self.take(1).get_columns(columns).await?.into_iter().next())
    }

    pub async fn first_as<T: FromRow>(&mut self) -> QueryResult<Option<T>> {
        self.first().await?.as_ref().map(T::from_row).transpose()
    }

    /// The only matching row: [`QueryError::NotFound`] when there is none,
    /// [`QueryError::TooManyRows`] when there are several.
    pub async fn sole(&mut self) -> QueryResult<Row> {
        let rows = self.take(2).get().await?;
        Self::single(rows)
    }

    pub async fn sole_columns<C: Into<Column>>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
    ) -> QueryResult<Row> {
        let rows = self.take(2).get_columns(columns).await?;
        Self::single(rows)
    }

    fn single(rows: Vec<Row>) -> QueryResult<Row> {
        let count = rows.len();
        let mut rows = rows.into_iter();
        match (rows.next(), count) {
            (Some(row), 1) => Ok(row),
            (None, _) => Err(QueryError::not_found("no query results")),
            (Some(_), got) => Err(QueryError::too_many_rows(1, got)),
        }
    }

    /// The row whose `id` equals `id`.
    pub async fn find(&mut self, id: impl Into<Value>) -> QueryResult<Option<Row>> {
        self.where_eq("id", id).first().await
    }

    /// A single column of the first row.
    pub async fn value(&mut self, column: impl Into<Column>) -> QueryResult<Option<Value>> {
        let row = self.first_columns([column.into()]).await?;
        Ok(row.and_then(|row| row.into_values().into_iter().next()))
    }

    /// A single column of the only matching row.
    pub async fn sole_value(&mut self, column: impl Into<Column>) -> QueryResult<Value> {
        let row = self.sole_columns([column.into()]).await?;
        Ok(row.into_values().into_iter().next().unwrap_or(Value::Null))
    }

    /// The first column of the first row of `select <expression>`.
    pub async fn raw_value(
        &mut self,
        expression: impl Into<String>,
        bindings: impl IntoIterator<Item = Value>,
    ) -> QueryResult<Option<Value>> {
        let row = self.select_raw(expression, bindings).first().await?;
        Ok(row.and_then(|row| row.into_values().into_iter().next()))
    }

    // ===== pluck =====

    async fn pluck_rows(&mut self, columns: Vec<Column>) -> QueryResult<Vec<Row>> {
        let original = self.columns.clone();
        if original.is_none() {
            self.columns = Some(columns);
        }
        let result = self.run_select().await;
        self.columns = original;
        let rows = self.processor().process_select(self, result?);
        Ok(self.apply_after_query_callbacks(rows))
    }

    /// The values of one column.
    pub async fn pluck(&mut self, column: &str) -> QueryResult<Vec<Value>> {
        let rows = self.pluck_rows(vec![Column::Name(column.to_string())]).await?;
        let column = strip_table_for_pluck(column);
        Ok(rows
            .iter()
            .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// `(key, value)` pairs. A repeated key keeps its first position and its
    /// last value.
    pub async fn pluck_with_key(&mut self, column: &str, key: &str) -> QueryResult<Vec<(Value, Value)>> {
        let rows = self
            .pluck_rows(vec![
                Column::Name(column.to_string()),
                Column::Name(key.to_string()),
            ])
            .await?;
        let column = strip_table_for_pluck(column);
        let key = strip_table_for_pluck(key);

        let mut pairs: Vec<(Value, Value)> = Vec::with_capacity(rows.len());
        let mut positions = std::collections::HashMap::new();
        for row in &rows {
            let k = row.get(key).cloned().unwrap_or(Value::Null);
            let v = row.get(column).cloned().unwrap_or(Value::Null);
            match positions.get(&k.to_string()) {
                Some(&index) => pairs[index] = (k, v),
                None => {
                    positions.insert(k.to_string(), pairs.len());
                    pairs.push((k, v));
                }
            }
        }
        Ok(pairs)
    }

    /// The values of one column joined with `glue`.
    pub async fn implode(&mut self, column: &str, glue: &str) -> QueryResult<String> {
        let values = self.pluck(column).await?;
        Ok(values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(glue))
    }

    // ===== exists =====

    pub async fn exists(&mut self) -> QueryResult<bool> {
        self.apply_before_query_callbacks();
        let sql = self.grammar().compile_exists(self)?;
        let bindings = self.get_bindings();
        let rows = self
            .connection()
            .select(&sql, &bindings, !self.use_write_connection)
            .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("exists"))
            .is_some_and(Value::is_truthy))
    }

    pub async fn doesnt_exist(&mut self) -> QueryResult<bool> {
        Ok(!self.exists().await?)
    }

    // ===== aggregates =====

    pub async fn count(&mut self) -> QueryResult<i64> {
        self.count_columns(["*"]).await
    }

    pub async fn count_columns<C: Into<Column>>(&mut self, columns: impl IntoIterator<Item = C>) -> QueryResult<i64> {
        let value = self.aggregate("count", columns).await?;
        Ok(value.and_then(|v| v.as_i64()).unwrap_or(0))
    }

    pub async fn min(&mut self, column: impl Into<Column>) -> QueryResult<Option<Value>> {
        self.aggregate("min", [column.into()]).await
    }

    pub async fn max(&mut self, column: impl Into<Column>) -> QueryResult<Option<Value>> {
        self.aggregate("max", [column.into()]).await
    }

    /// Sum of `column`; zero when nothing matches.
    pub async fn sum(&mut self, column: impl Into<Column>) -> QueryResult<Value> {
        Ok(self
            .aggregate("sum", [column.into()])
            .await?
            .unwrap_or(Value::Int(0)))
    }

    pub async fn avg(&mut self, column: impl Into<Column>) -> QueryResult<Option<Value>> {
        self.aggregate("avg", [column.into()]).await
    }

    /// Run `function(columns)` on a copy of the query and read the scalar.
    ///
    /// The copy drops the column list and select bindings unless the query
    /// has unions or havings, which still need them.
    pub async fn aggregate<C: Into<Column>>(
        &mut self,
        function: &str,
        columns: impl IntoIterator<Item = C>,
    ) -> QueryResult<Option<Value>> {
        let columns: Vec<Column> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(QueryError::InvalidAggregateColumns(format!(
                "{function} needs at least one column"
            )));
        }

        let mut query = if self.unions.is_empty() && self.havings.is_empty() {
            self.clone_without(&[Component::Columns])
                .clone_without_bindings(&[BindingCategory::Select])
        } else {
            self.clone()
        };
        query.set_aggregate(function, columns.clone());
        let rows = query.get_columns(columns).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get_ignore_case("aggregate"))
            .filter(|value| !value.is_null())
            .cloned())
    }

    /// Mark the query as an aggregate read. Without groups the order is
    /// meaningless, so orders and order bindings are dropped.
    pub(crate) fn set_aggregate(&mut self, function: &str, columns: Vec<Column>) -> &mut Self {
        self.aggregate = Some(Aggregate {
            function: function.to_string(),
            columns,
        });
        if self.groups.is_empty() {
            self.orders.clear();
            self.clear_bindings(BindingCategory::Order);
        }
        self
    }

    // ===== streaming and chunking =====

    /// Stream the rows instead of buffering them. After-query callbacks run
    /// per row; rows they remove are skipped.
    pub async fn cursor(&mut self) -> QueryResult<CallbackRowStream> {
        let sql = self.to_sql()?;
        let bindings = self.get_bindings();
        let callbacks = self.take_after_query_callbacks();
        let stream = self
            .connection()
            .cursor(&sql, &bindings, !self.use_write_connection)
            .await?;
        Ok(CallbackRowStream::new(stream, callbacks))
    }

    fn enforce_order_by(&self) -> QueryResult<()> {
        if self.orders.is_empty() && self.union_orders.is_empty() {
            return Err(QueryError::MissingOrderBy);
        }
        Ok(())
    }

    /// Feed the results to `callback` in pages of `count` rows. Returns
    /// `false` when the callback stopped early by returning `false`.
    pub async fn chunk<F>(&mut self, count: u64, mut callback: F) -> QueryResult<bool>
    where
        F: FnMut(Vec<Row>, u64) -> bool,
    {
        self.enforce_order_by()?;
        if count == 0 {
            return Ok(true);
        }

        let mut page = 1;
        loop {
            let mut query = self.clone();
            let rows = query.for_page(page, count).get().await?;
            let fetched = rows.len() as u64;
            if fetched == 0 {
                break;
            }
            tracing::trace!(target: "fluentql.query", page, rows = fetched, "chunk");
            if !callback(rows, page) {
                return Ok(false);
            }
            if fetched != count {
                break;
            }
            page += 1;
        }
        Ok(true)
    }

    /// Call `callback` on every row, fetching `count` rows at a time.
    pub async fn each<F>(&mut self, count: u64, mut callback: F) -> QueryResult<bool>
    where
        F: FnMut(Row) -> bool,
    {
        self.chunk(count, |rows, _| rows.into_iter().all(&mut callback))
            .await
    }

    /// Page by `column` (default `id`) instead of by offset, so rows updated
    /// inside the callback do not shift later pages. `alias` names the
    /// result column carrying the key when it differs from `column`.
    pub async fn chunk_by_id<F>(
        &mut self,
        count: u64,
        mut callback: F,
        column: Option<&str>,
        alias: Option<&str>,
    ) -> QueryResult<bool>
    where
        F: FnMut(Vec<Row>, u64) -> bool,
    {
        let column = column.unwrap_or("id");
        let alias = alias.unwrap_or_else(|| strip_table_for_pluck(column));
        if count == 0 {
            return Ok(true);
        }

        let mut last_id: Option<Value> = None;
        let mut page = 1;
        loop {
            let mut query = self.clone();
            let rows = query.for_page_after_id(count, last_id.take(), column).get().await?;
            let fetched = rows.len() as u64;
            if fetched == 0 {
                break;
            }
            let next_id = rows
                .last()
                .and_then(|row| row.get(alias))
                .filter(|value| !value.is_null())
                .cloned();
            if !callback(rows, page) {
                return Ok(false);
            }
            let next_id = next_id.ok_or_else(|| QueryError::ChunkColumnMissing(alias.to_string()))?;
            if fetched != count {
                break;
            }
            last_id = Some(next_id);
            page += 1;
        }
        Ok(true)
    }

    pub async fn each_by_id<F>(
        &mut self,
        count: u64,
        mut callback: F,
        column: Option<&str>,
        alias: Option<&str>,
    ) -> QueryResult<bool>
    where
        F: FnMut(Row) -> bool,
    {
        self.chunk_by_id(count, |rows, _| rows.into_iter().all(&mut callback), column, alias)
            .await
    }
}
