//! Convenient imports for typical `fluentql` usage.
//!
//! ```ignore
//! use fluentql::prelude::*;
//! ```

pub use crate::{
    Builder, Column, Connection, ConnectionConfig, Cursor, Expression, FromRow, FromValue, PgConnection,
    QueryError, QueryResult, Record, Row, Value, raw, table,
};

pub use std::sync::Arc;

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};

#[cfg(feature = "derive")]
pub use crate::BindingEnum;
