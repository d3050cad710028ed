use crate::grammar::GrammarConfig;
use std::time::Duration;
use tracing::Level;

/// Connection-level settings: database identity, grammar configuration and
/// statement logging.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Database name reported by the connection. Used to qualify sub-queries
    /// that run against a different database.
    pub database: String,
    /// Grammar configuration (table prefix, custom operators, truncate cascade).
    pub grammar: GrammarConfig,
    /// Tracing event level for executed statements.
    pub log_level: Level,
    /// Truncate logged SQL to this many bytes. `None` disables truncation.
    pub max_sql_length: Option<usize>,
    /// Statements slower than this are logged at WARN.
    pub slow_query_threshold: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            database: String::new(),
            grammar: GrammarConfig::default(),
            log_level: Level::DEBUG,
            max_sql_length: Some(200),
            slow_query_threshold: None,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from the environment.
    ///
    /// - `FLUENTQL_DATABASE`: database name
    /// - `FLUENTQL_TABLE_PREFIX`: table prefix applied by the grammar
    /// - `FLUENTQL_SLOW_QUERY_MS`: slow query threshold in milliseconds
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(database) = std::env::var("FLUENTQL_DATABASE") {
            config.database = database;
        }
        if let Ok(prefix) = std::env::var("FLUENTQL_TABLE_PREFIX") {
            config.grammar = config.grammar.with_table_prefix(prefix);
        }
        if let Some(ms) = std::env::var("FLUENTQL_SLOW_QUERY_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.slow_query_threshold = Some(Duration::from_millis(ms));
        }
        config
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_grammar(mut self, grammar: GrammarConfig) -> Self {
        self.grammar = grammar;
        self
    }

    pub fn with_log_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Log statements without truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }
}
