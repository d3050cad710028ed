//! Ordering, grouping, limits, unions and locks.

use super::clause::{Boolean, Direction, GroupLimit, Lock, Order, Union};
use super::sub::{IntoQuery, IntoSubQuery};
use super::Builder;
use crate::bindings::BindingCategory;
use crate::error::QueryResult;
use crate::value::{Column, Expression, Value};

impl Builder {
    /// Order by `column` in `direction` (`asc`/`desc`, any case).
    ///
    /// Once the query has unions the order applies to the union as a whole.
    pub fn order_by(&mut self, column: impl Into<Column>, direction: &str) -> QueryResult<&mut Self> {
        let direction: Direction = direction.parse()?;
        Ok(self.push_order(Order::Column {
            column: column.into(),
            direction,
        }))
    }

    pub fn order_by_desc(&mut self, column: impl Into<Column>) -> &mut Self {
        self.push_order(Order::Column {
            column: column.into(),
            direction: Direction::Desc,
        })
    }

    /// Order by the result of a sub-select.
    pub fn order_by_sub(&mut self, query: impl IntoSubQuery, direction: &str) -> QueryResult<&mut Self> {
        let direction: Direction = direction.parse()?;
        let (sql, bindings) = self.create_sub(query)?;
        let category = self.order_binding_category();
        self.extend_bindings(category, bindings);
        Ok(self.push_order(Order::Column {
            column: Column::Raw(Expression::new(format!("({sql})"))),
            direction,
        }))
    }

    /// Raw order SQL with its own bindings.
    pub fn order_by_raw(&mut self, sql: impl Into<String>, bindings: impl IntoIterator<Item = Value>) -> &mut Self {
        let category = self.order_binding_category();
        self.push_order(Order::Raw { sql: sql.into() });
        self.extend_bindings(category, bindings);
        self
    }

    /// Newest first by `column` (`created_at` when `None`).
    pub fn latest(&mut self, column: Option<&str>) -> &mut Self {
        self.order_by_desc(column.unwrap_or("created_at"))
    }

    /// Oldest first by `column` (`created_at` when `None`).
    pub fn oldest(&mut self, column: Option<&str>) -> &mut Self {
        self.push_order(Order::Column {
            column: Column::Name(column.unwrap_or("created_at").to_string()),
            direction: Direction::Asc,
        })
    }

    /// Order randomly, seeded where the dialect supports it.
    pub fn in_random_order(&mut self, seed: &str) -> &mut Self {
        let sql = self.grammar().compile_random(seed);
        self.order_by_raw(sql, [])
    }

    /// Drop every order (and order binding).
    pub fn reorder(&mut self) -> &mut Self {
        self.orders.clear();
        self.union_orders.clear();
        self.clear_bindings(BindingCategory::Order);
        self.clear_bindings(BindingCategory::UnionOrder);
        self
    }

    /// Drop every order, then order by `column`.
    pub fn reorder_by(&mut self, column: impl Into<Column>, direction: &str) -> QueryResult<&mut Self> {
        self.reorder().order_by(column, direction)
    }

    fn push_order(&mut self, order: Order) -> &mut Self {
        if self.unions.is_empty() {
            self.orders.push(order);
        } else {
            self.union_orders.push(order);
        }
        self
    }

    fn order_binding_category(&self) -> BindingCategory {
        if self.unions.is_empty() {
            BindingCategory::Order
        } else {
            BindingCategory::UnionOrder
        }
    }

    // ===== grouping =====

    pub fn group_by<C: Into<Column>>(&mut self, columns: impl IntoIterator<Item = C>) -> &mut Self {
        self.groups.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Raw group-by SQL with its own bindings.
    pub fn group_by_raw(&mut self, sql: impl Into<String>, bindings: impl IntoIterator<Item = Value>) -> &mut Self {
        self.groups.push(Column::Raw(Expression::new(sql)));
        self.extend_bindings(BindingCategory::GroupBy, bindings);
        self
    }

    // ===== limits =====

    pub fn limit(&mut self, value: u64) -> &mut Self {
        if self.unions.is_empty() {
            self.limit = Some(value);
        } else {
            self.union_limit = Some(value);
        }
        self
    }

    pub fn take(&mut self, value: u64) -> &mut Self {
        self.limit(value)
    }

    pub fn offset(&mut self, value: u64) -> &mut Self {
        if self.unions.is_empty() {
            self.offset = Some(value);
        } else {
            self.union_offset = Some(value);
        }
        self
    }

    pub fn skip(&mut self, value: u64) -> &mut Self {
        self.offset(value)
    }

    /// Limit and offset for a 1-based page.
    pub fn for_page(&mut self, page: u64, per_page: u64) -> &mut Self {
        self.offset(page.saturating_sub(1).saturating_mul(per_page))
            .limit(per_page)
    }

    /// Keep the first `value` rows per `column` partition.
    pub fn group_limit(&mut self, value: u64, column: impl Into<Column>) -> &mut Self {
        self.group_limit = Some(GroupLimit {
            value,
            column: column.into(),
        });
        self
    }

    /// The next `per_page` rows with `column` above `last_id`, ascending.
    pub fn for_page_after_id(&mut self, per_page: u64, last_id: Option<Value>, column: &str) -> &mut Self {
        self.remove_existing_orders_for(column);
        if let Some(last_id) = last_id {
            self.push_where(Column::Name(column.to_string()), ">".to_string(), last_id, Boolean::And);
        }
        self.push_order(Order::Column {
            column: Column::Name(column.to_string()),
            direction: Direction::Asc,
        })
        .limit(per_page)
    }

    /// The next `per_page` rows with `column` below `last_id`, descending.
    pub fn for_page_before_id(&mut self, per_page: u64, last_id: Option<Value>, column: &str) -> &mut Self {
        self.remove_existing_orders_for(column);
        if let Some(last_id) = last_id {
            self.push_where(Column::Name(column.to_string()), "<".to_string(), last_id, Boolean::And);
        }
        self.push_order(Order::Column {
            column: Column::Name(column.to_string()),
            direction: Direction::Desc,
        })
        .limit(per_page)
    }

    /// Drops orders on `column` from whichever list [`Self::push_order`] targets.
    fn remove_existing_orders_for(&mut self, column: &str) {
        let orders = if self.unions.is_empty() {
            &mut self.orders
        } else {
            &mut self.union_orders
        };
        orders.retain(|order| order.column().is_none_or(|c| c.as_str() != column));
    }

    // ===== unions =====

    pub fn union(&mut self, query: impl IntoQuery) -> QueryResult<&mut Self> {
        self.add_union(query, false)
    }

    pub fn union_all(&mut self, query: impl IntoQuery) -> QueryResult<&mut Self> {
        self.add_union(query, true)
    }

    fn add_union(&mut self, query: impl IntoQuery, all: bool) -> QueryResult<&mut Self> {
        let query = query.into_query(self)?;
        let bindings = query.get_bindings();
        self.unions.push(Union {
            query: Box::new(query),
            all,
        });
        self.extend_bindings(BindingCategory::Union, bindings);
        Ok(self)
    }

    // ===== locks =====

    /// `for update` when `exclusive`, otherwise `for share`.
    pub fn lock(&mut self, exclusive: bool) -> &mut Self {
        self.set_lock(if exclusive { Lock::Update } else { Lock::Shared })
    }

    pub fn lock_raw(&mut self, sql: impl Into<String>) -> &mut Self {
        self.set_lock(Lock::Raw(sql.into()))
    }

    pub fn lock_for_update(&mut self) -> &mut Self {
        self.set_lock(Lock::Update)
    }

    pub fn shared_lock(&mut self) -> &mut Self {
        self.set_lock(Lock::Shared)
    }

    fn set_lock(&mut self, lock: Lock) -> &mut Self {
        self.lock = Some(lock);
        self.use_write_connection = true;
        self
    }
}
