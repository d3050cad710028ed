//! The fluent query builder.
//!
//! [`Builder`] methods are split across files by concern: `select` for the
//! column list and source, `wheres`/`having` for conditions, `join`,
//! `ordering` for order, grouping, limits, unions and locks, `execute` for
//! read terminals, `mutate` for writes and `paginate` for paging.

mod builder;
mod clause;
mod cursor;
mod dynamic;
mod execute;
mod having;
mod join;
mod mutate;
mod ordering;
mod paginate;
mod select;
mod sub;
mod wheres;

pub use builder::Builder;
pub use clause::{
    Aggregate, Boolean, Component, DatePart, Direction, Distinct, FulltextOptions, GroupLimit,
    IndexHint, IndexHintKind, JoinType, Lock, Order, Union, UpsertUpdate, Where,
};
pub use cursor::CallbackRowStream;
pub use join::JoinClause;
pub use mutate::Record;
pub use sub::{IntoQuery, IntoSubQuery, SubQuery};
pub use wheres::{BITWISE_OPERATORS, OPERATORS};

use crate::connection::Connection;
use crate::value::Column;
use std::sync::Arc;

/// A builder on `connection` selecting from `table`.
pub fn table(connection: &Arc<dyn Connection>, table: impl Into<Column>) -> Builder {
    let mut query = Builder::new(connection.clone());
    query.from(table);
    query
}

#[cfg(test)]
mod tests;
