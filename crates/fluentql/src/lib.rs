//! # fluentql
//!
//! A fluent SQL query builder with per-clause parameter bindings.
//!
//! ## Features
//!
//! - **Fluent construction**: chain `select`, `where_`, `join`, `order_by`, `limit` and friends on a [`Builder`]
//! - **Ordered bindings**: parameters are kept per clause so they always line up with the `?` placeholders
//! - **Pluggable grammars**: [`PostgresGrammar`] and [`StandardGrammar`] turn clause state into SQL
//! - **Async terminals**: `get`, `first`, `count`, `insert`, `update`, `delete`, `upsert` and pagination run on a [`Connection`]
//! - **Row mapping**: decode result rows into structs via the `FromRow` trait
//!
//! ## Example
//!
//! ```ignore
//! use fluentql::prelude::*;
//!
//! let connection: Arc<dyn Connection> =
//!     Arc::new(PgConnection::from_pool(pool, ConnectionConfig::default()));
//!
//! let users: Vec<User> = fluentql::table(&connection, "users")
//!     .where_("votes", ">", 100)?
//!     .or_where_eq("name", "John")
//!     .order_by_desc("created_at")
//!     .limit(10)
//!     .get_as()
//!     .await?;
//!
//! fluentql::table(&connection, "users")
//!     .where_eq("id", 1)
//!     .update([("votes", 1)])
//!     .await?;
//! ```

pub mod bindings;
pub mod connection;
pub mod error;
pub mod grammar;
pub mod pagination;
pub mod prelude;
pub mod processor;
pub mod query;
pub mod row;
pub mod value;

#[cfg(test)]
mod testing;

pub use bindings::{AsBindingCategory, BindingCategory, Bindings};
pub use connection::{Connection, ConnectionConfig, PgConnection, RowStream};
pub use error::{QueryError, QueryResult};
pub use grammar::{Grammar, GrammarConfig, PostgresGrammar, StandardGrammar};
pub use pagination::{Cursor, CursorPaginator, LengthAwarePaginator, Paginator};
pub use processor::{PostgresProcessor, Processor, StandardProcessor};
pub use query::{Builder, IntoQuery, IntoSubQuery, JoinClause, Record, SubQuery, table};
pub use row::{FromRow, Row};
pub use value::{Column, Expression, FromValue, Value, raw};

#[cfg(feature = "pool")]
pub use connection::{create_pool, create_pool_with_config, create_pool_with_manager_config};

#[cfg(feature = "derive")]
pub use fluentql_derive::{BindingEnum, FromRow};

// Re-export the driver so derived code and callers share one version
pub use tokio_postgres;
