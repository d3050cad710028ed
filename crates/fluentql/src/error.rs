//! Error types for fluentql

use thiserror::Error;

/// Result type alias for fluentql operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Error types for building and running queries
#[derive(Debug, Error)]
pub enum QueryError {
    /// Binding category name is not one of the known clause categories
    #[error("Invalid binding type: {0}.")]
    InvalidBindingCategory(String),

    /// `NULL` compared with an operator that cannot express a null check
    #[error("Illegal operator and value combination: {operator} NULL.")]
    IllegalOperatorValueCombination { operator: String },

    /// A nested list was passed where a flat list of values is required
    #[error("Nested arrays may not be passed to whereIn method.")]
    NestedArrayNotAllowed,

    /// Row-value comparison with mismatched arity
    #[error("The number of columns must match the number of values ({columns} columns, {values} values)")]
    ColumnValueCountMismatch { columns: usize, values: usize },

    /// Order direction other than asc/desc
    #[error("Order direction must be \"asc\" or \"desc\", got {0:?}.")]
    InvalidOrderDirection(String),

    /// Aggregate requested with an unusable column list
    #[error("Invalid aggregate columns: {0}")]
    InvalidAggregateColumns(String),

    /// Increment/decrement amount is not numeric
    #[error("Non-numeric value passed as increment amount for column: '{0}'.")]
    NonNumericAmount(String),

    /// Malformed dynamic where method name or argument list
    #[error("Invalid dynamic where: {0}")]
    InvalidDynamicWhere(String),

    /// The grammar does not support the requested feature
    #[error("This database engine does not support {0}.")]
    Unsupported(String),

    /// An ordered query was required but no order exists
    #[error("You must specify an orderBy clause when using this function.")]
    MissingOrderBy,

    /// Query compiled without a FROM target
    #[error("No table was specified for the query (missing from).")]
    MissingFrom,

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Too many rows returned when a single row was required
    #[error("Too many rows: expected {expected}, got {got}")]
    TooManyRows { expected: usize, got: usize },

    /// Cursor does not carry a value for an ordered column
    #[error("Unable to find parameter [{0}] in pagination item.")]
    MissingCursorParameter(String),

    /// Cursor string could not be decoded
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// chunk_by_id could not read the key of the last row
    #[error("The chunkById operation was aborted because the [{0}] column is not present in the query result.")]
    ChunkColumnMissing(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error raised by the driver
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl QueryError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a too-many-rows error
    pub fn too_many_rows(expected: usize, got: usize) -> Self {
        Self::TooManyRows { expected, got }
    }

    /// Create an unsupported-feature error
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported(feature.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// SQLSTATE of a driver error, if any.
    ///
    /// Driver errors are never rewritten into other variants; callers inspect
    /// the code instead.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Query(err) => err.as_db_error().map(|db| db.code().code()),
            _ => None,
        }
    }

    /// Check if this is a unique constraint violation (SQLSTATE 23505)
    pub fn is_unique_violation(&self) -> bool {
        self.sql_state() == Some("23505")
    }

    /// Check if this is a foreign key violation (SQLSTATE 23503)
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sql_state() == Some("23503")
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for QueryError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
