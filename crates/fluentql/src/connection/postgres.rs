use super::config::ConnectionConfig;
use super::placeholders::{number_placeholders, truncate_sql_bytes};
use super::{Connection, RowStream};
use crate::error::{QueryError, QueryResult};
use crate::grammar::{Grammar, PostgresGrammar};
use crate::processor::{PostgresProcessor, Processor};
use crate::row::Row;
use crate::value::Value;
use futures_core::Stream;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio_postgres::types::ToSql;
use tracing::Level;

enum Backend {
    Client(tokio_postgres::Client),
    #[cfg(feature = "pool")]
    Pool(deadpool_postgres::Pool),
}

enum ClientRef<'a> {
    Borrowed(&'a tokio_postgres::Client),
    #[cfg(feature = "pool")]
    Pooled(deadpool_postgres::Object),
}

impl Deref for ClientRef<'_> {
    type Target = tokio_postgres::Client;

    fn deref(&self) -> &tokio_postgres::Client {
        match self {
            ClientRef::Borrowed(client) => client,
            #[cfg(feature = "pool")]
            ClientRef::Pooled(object) => object,
        }
    }
}

/// A [`Connection`] over `tokio-postgres`, compiling with [`PostgresGrammar`]
/// and processing with [`PostgresProcessor`].
///
/// # Example
///
/// ```ignore
/// let (client, connection) = tokio_postgres::connect(&url, tokio_postgres::NoTls).await?;
/// tokio::spawn(connection);
///
/// let conn: Arc<dyn Connection> = Arc::new(PgConnection::new(client));
/// let users = fluentql::table(&conn, "users").where_("votes", ">", 100).get().await?;
/// ```
pub struct PgConnection {
    backend: Backend,
    config: ConnectionConfig,
    grammar: Arc<dyn Grammar>,
    processor: Arc<dyn Processor>,
}

impl PgConnection {
    pub fn new(client: tokio_postgres::Client) -> Self {
        Self::with_config(client, ConnectionConfig::default())
    }

    pub fn with_config(client: tokio_postgres::Client, config: ConnectionConfig) -> Self {
        Self::from_backend(Backend::Client(client), config)
    }

    /// Run every statement on a connection checked out from `pool`.
    #[cfg(feature = "pool")]
    pub fn from_pool(pool: deadpool_postgres::Pool, config: ConnectionConfig) -> Self {
        Self::from_backend(Backend::Pool(pool), config)
    }

    fn from_backend(backend: Backend, config: ConnectionConfig) -> Self {
        let grammar = Arc::new(PostgresGrammar::new(config.grammar.clone()));
        Self {
            backend,
            config,
            grammar,
            processor: Arc::new(PostgresProcessor),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    async fn client(&self) -> QueryResult<ClientRef<'_>> {
        match &self.backend {
            Backend::Client(client) => Ok(ClientRef::Borrowed(client)),
            #[cfg(feature = "pool")]
            Backend::Pool(pool) => Ok(ClientRef::Pooled(pool.get().await?)),
        }
    }

    fn truncate_sql(&self, sql: &str) -> String {
        match self.config.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    fn log_statement(&self, kind: &'static str, sql: &str, bindings: usize, elapsed: Duration) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let slow = self
            .config
            .slow_query_threshold
            .is_some_and(|threshold| elapsed >= threshold);
        let level = if slow { Level::WARN } else { self.config.log_level };
        let sql = self.truncate_sql(sql);
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        emit_at_level!(
            level,
            target: "fluentql.sql",
            kind,
            bindings,
            elapsed_ms,
            slow,
            sql = %sql,
        );
    }

    async fn execute(&self, kind: &'static str, query: &str, bindings: &[Value]) -> QueryResult<u64> {
        let sql = number_placeholders(query);
        let params = params(bindings);
        let start = Instant::now();
        let client = self.client().await?;
        let result = client.execute(sql.as_str(), &params).await;
        self.log_statement(kind, &sql, bindings.len(), start.elapsed());
        Ok(result?)
    }
}

fn params(bindings: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    bindings.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

fn decode_row(row: &tokio_postgres::Row) -> QueryResult<Row> {
    let mut decoded = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value: Value = row
            .try_get(i)
            .map_err(|e| QueryError::decode(column.name(), e.to_string()))?;
        decoded.insert(column.name(), value);
    }
    Ok(decoded)
}

struct DecodeRowStream<S> {
    inner: Pin<Box<S>>,
}

impl<S> Stream for DecodeRowStream<S>
where
    S: Stream<Item = Result<tokio_postgres::Row, tokio_postgres::Error>> + Send + 'static,
{
    type Item = QueryResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(row))) => Poll::Ready(Some(decode_row(&row))),
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(QueryError::from(e)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[async_trait::async_trait]
impl Connection for PgConnection {
    fn database_name(&self) -> &str {
        &self.config.database
    }

    fn query_grammar(&self) -> Arc<dyn Grammar> {
        self.grammar.clone()
    }

    fn post_processor(&self) -> Arc<dyn Processor> {
        self.processor.clone()
    }

    async fn select(&self, query: &str, bindings: &[Value], _use_read: bool) -> QueryResult<Vec<Row>> {
        let sql = number_placeholders(query);
        let params = params(bindings);
        let start = Instant::now();
        let client = self.client().await?;
        let result = client.query(sql.as_str(), &params).await;
        self.log_statement("select", &sql, bindings.len(), start.elapsed());
        result?.iter().map(decode_row).collect()
    }

    async fn cursor(&self, query: &str, bindings: &[Value], _use_read: bool) -> QueryResult<RowStream> {
        let sql = number_placeholders(query);
        let start = Instant::now();
        let client = self.client().await?;
        let stream = client
            .query_raw(sql.as_str(), bindings.iter().map(|v| v as &(dyn ToSql + Sync)))
            .await;
        self.log_statement("cursor", &sql, bindings.len(), start.elapsed());
        Ok(RowStream::new(DecodeRowStream {
            inner: Box::pin(stream?),
        }))
    }

    async fn insert(&self, query: &str, bindings: &[Value]) -> QueryResult<bool> {
        self.execute("insert", query, bindings).await.map(|_| true)
    }

    async fn update(&self, query: &str, bindings: &[Value]) -> QueryResult<u64> {
        self.execute("update", query, bindings).await
    }

    async fn delete(&self, query: &str, bindings: &[Value]) -> QueryResult<u64> {
        self.execute("delete", query, bindings).await
    }

    async fn statement(&self, query: &str, bindings: &[Value]) -> QueryResult<bool> {
        self.execute("statement", query, bindings).await.map(|_| true)
    }

    async fn affecting_statement(&self, query: &str, bindings: &[Value]) -> QueryResult<u64> {
        self.execute("statement", query, bindings).await
    }

    /// `currval` of the given sequence, or `lastval()` of the session.
    ///
    /// With a pool, the session is whichever connection the next checkout
    /// yields; prefer `insert_get_id`, which reads a `returning` column.
    async fn last_insert_id(&self, sequence: Option<&str>) -> QueryResult<Value> {
        let rows = match sequence {
            Some(sequence) => {
                self.select("select currval(?::regclass)", &[Value::from(sequence)], false)
                    .await?
            }
            None => self.select("select lastval()", &[], false).await?,
        };
        Ok(rows
            .first()
            .and_then(Row::first_value)
            .cloned()
            .unwrap_or(Value::Null))
    }
}
