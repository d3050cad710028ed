//! Database connection contract.
//!
//! The builder never talks to a driver directly. It hands compiled SQL and
//! flattened bindings to a [`Connection`], which owns placeholder syntax, row
//! decoding and statement logging.

mod config;
mod placeholders;
mod postgres;

#[cfg(feature = "pool")]
mod pool;

pub use config::ConnectionConfig;
pub use placeholders::number_placeholders;
pub use postgres::PgConnection;

#[cfg(feature = "pool")]
pub use pool::{
    DEFAULT_POOL_SIZE, create_pool, create_pool_with_config, create_pool_with_manager_config,
};

use crate::error::{QueryError, QueryResult};
use crate::grammar::Grammar;
use crate::processor::Processor;
use crate::row::Row;
use crate::value::{Expression, Value};
use futures_core::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A database connection the builder runs its statements through.
///
/// Placeholders in the SQL handed to a connection are positional `?`; `??`
/// stands for a literal `?`.
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    /// Name of the database this connection talks to.
    fn database_name(&self) -> &str;

    /// The grammar new builders on this connection compile with.
    fn query_grammar(&self) -> Arc<dyn Grammar>;

    /// The processor new builders on this connection post-process with.
    fn post_processor(&self) -> Arc<dyn Processor>;

    /// Wrap a raw SQL fragment.
    fn raw(&self, value: &str) -> Expression {
        Expression::new(value)
    }

    /// Run a select and return all rows.
    async fn select(&self, query: &str, bindings: &[Value], use_read: bool)
    -> QueryResult<Vec<Row>>;

    /// Run a select against the write side of the connection.
    async fn select_from_write_connection(
        &self,
        query: &str,
        bindings: &[Value],
    ) -> QueryResult<Vec<Row>> {
        self.select(query, bindings, false).await
    }

    /// Run a select and stream the rows.
    async fn cursor(&self, query: &str, bindings: &[Value], use_read: bool) -> QueryResult<RowStream>;

    async fn insert(&self, query: &str, bindings: &[Value]) -> QueryResult<bool> {
        self.statement(query, bindings).await
    }

    async fn update(&self, query: &str, bindings: &[Value]) -> QueryResult<u64> {
        self.affecting_statement(query, bindings).await
    }

    async fn delete(&self, query: &str, bindings: &[Value]) -> QueryResult<u64> {
        self.affecting_statement(query, bindings).await
    }

    /// Execute a statement, reporting success.
    async fn statement(&self, query: &str, bindings: &[Value]) -> QueryResult<bool>;

    /// Execute a statement and return the number of affected rows.
    async fn affecting_statement(&self, query: &str, bindings: &[Value]) -> QueryResult<u64>;

    /// The id generated by the last insert on this connection.
    async fn last_insert_id(&self, sequence: Option<&str>) -> QueryResult<Value> {
        let _ = sequence;
        Err(QueryError::unsupported("reading the last insert id"))
    }
}

/// A stream of rows returned by [`Connection::cursor`].
pub struct RowStream {
    inner: Pin<Box<dyn Stream<Item = QueryResult<Row>> + Send>>,
}

impl RowStream {
    /// Create a new `RowStream` from any compatible stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = QueryResult<Row>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// A stream over rows already in memory.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::new(VecStream {
            rows: rows.into_iter(),
        })
    }
}

impl Stream for RowStream {
    type Item = QueryResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

struct VecStream {
    rows: std::vec::IntoIter<Row>,
}

impl Stream for VecStream {
    type Item = QueryResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.rows.next().map(Ok))
    }
}
