//! Recording connection for unit tests.

use crate::connection::{Connection, RowStream};
use crate::error::QueryResult;
use crate::grammar::{Grammar, PostgresGrammar, StandardGrammar};
use crate::processor::{PostgresProcessor, Processor, StandardProcessor};
use crate::query::Builder;
use crate::row::Row;
use crate::value::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One statement the fake was asked to run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Recorded {
    pub kind: &'static str,
    pub sql: String,
    pub bindings: Vec<Value>,
}

/// A connection that records every statement and answers selects from a
/// queue of canned results (empty once the queue runs dry).
pub(crate) struct FakeConnection {
    database: String,
    grammar: Arc<dyn Grammar>,
    processor: Arc<dyn Processor>,
    recorded: Mutex<Vec<Recorded>>,
    results: Mutex<VecDeque<Vec<Row>>>,
    affected: u64,
    last_insert_id: Value,
}

impl FakeConnection {
    pub fn postgres() -> Self {
        Self::with_parts(Arc::new(PostgresGrammar::default()), Arc::new(PostgresProcessor))
    }

    pub fn standard() -> Self {
        Self::with_parts(Arc::new(StandardGrammar::default()), Arc::new(StandardProcessor))
    }

    pub fn with_parts(grammar: Arc<dyn Grammar>, processor: Arc<dyn Processor>) -> Self {
        Self {
            database: "app".to_string(),
            grammar,
            processor,
            recorded: Mutex::new(Vec::new()),
            results: Mutex::new(VecDeque::new()),
            affected: 1,
            last_insert_id: Value::Int(1),
        }
    }

    pub fn with_database(mut self, name: &str) -> Self {
        self.database = name.to_string();
        self
    }

    pub fn with_affected(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }

    pub fn with_last_insert_id(mut self, id: impl Into<Value>) -> Self {
        self.last_insert_id = id.into();
        self
    }

    /// Queue the rows the next select returns.
    pub fn push_result(&self, rows: Vec<Row>) -> &Self {
        self.results.lock().unwrap().push_back(rows);
        self
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn last(&self) -> Recorded {
        self.recorded
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no statement recorded")
    }

    fn record(&self, kind: &'static str, sql: &str, bindings: &[Value]) {
        self.recorded.lock().unwrap().push(Recorded {
            kind,
            sql: sql.to_string(),
            bindings: bindings.to_vec(),
        });
    }

    fn next_result(&self) -> Vec<Row> {
        self.results.lock().unwrap().pop_front().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Connection for FakeConnection {
    fn database_name(&self) -> &str {
        &self.database
    }

    fn query_grammar(&self) -> Arc<dyn Grammar> {
        self.grammar.clone()
    }

    fn post_processor(&self) -> Arc<dyn Processor> {
        self.processor.clone()
    }

    async fn select(&self, query: &str, bindings: &[Value], _use_read: bool) -> QueryResult<Vec<Row>> {
        self.record("select", query, bindings);
        Ok(self.next_result())
    }

    async fn select_from_write_connection(&self, query: &str, bindings: &[Value]) -> QueryResult<Vec<Row>> {
        self.record("select_write", query, bindings);
        Ok(self.next_result())
    }

    async fn cursor(&self, query: &str, bindings: &[Value], _use_read: bool) -> QueryResult<RowStream> {
        self.record("cursor", query, bindings);
        Ok(RowStream::from_rows(self.next_result()))
    }

    async fn statement(&self, query: &str, bindings: &[Value]) -> QueryResult<bool> {
        self.record("statement", query, bindings);
        Ok(true)
    }

    async fn affecting_statement(&self, query: &str, bindings: &[Value]) -> QueryResult<u64> {
        self.record("affecting", query, bindings);
        Ok(self.affected)
    }

    async fn last_insert_id(&self, _sequence: Option<&str>) -> QueryResult<Value> {
        Ok(self.last_insert_id.clone())
    }
}

/// A builder over `connection` selecting from `table`, plus the shared handle
/// to inspect what ran.
pub(crate) fn table(connection: FakeConnection, table: &str) -> (Arc<FakeConnection>, Builder) {
    let fake = Arc::new(connection);
    let dyn_connection: Arc<dyn Connection> = fake.clone();
    let query = crate::query::table(&dyn_connection, table);
    (fake, query)
}

/// An empty postgres builder.
pub(crate) fn pg() -> Builder {
    table(FakeConnection::postgres(), "users").1.new_query()
}
