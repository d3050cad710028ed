//! Page-based and cursor-based pagination.

use super::clause::{Boolean, Component, Direction, Order};
use super::Builder;
use crate::bindings::BindingCategory;
use crate::error::{QueryError, QueryResult};
use crate::pagination::{Cursor, CursorPaginator, DEFAULT_PER_PAGE, LengthAwarePaginator, Paginator};
use crate::value::{Column, Expression, Value};

const AGGREGATE_TABLE: &str = "aggregate_table";

/// One ordered column as cursor pagination sees it.
struct CursorOrder {
    /// Name the cursor stores the value under.
    name: String,
    /// What the comparison runs against: the aliased expression when the
    /// name is a select alias.
    original: Column,
    direction: Direction,
}

/// Drop a trailing ` as alias` from each column.
fn without_select_aliases(columns: Vec<Column>) -> Vec<Column> {
    columns
        .into_iter()
        .map(|column| match column {
            Column::Name(name) => match name.to_ascii_lowercase().find(" as ") {
                Some(pos) => Column::Name(name[..pos].to_string()),
                None => Column::Name(name),
            },
            raw => raw,
        })
        .collect()
}

/// The expression behind `parameter` when `query` selects something
/// `as parameter`; otherwise `parameter` itself.
fn original_column_name(query: &Builder, parameter: &str) -> String {
    if let Some(columns) = &query.columns {
        let wrapped = query.grammar().wrap_str(parameter);
        for column in columns {
            let column = column.as_str();
            if let Some(pos) = column.to_ascii_lowercase().rfind(" as ") {
                let alias = &column[pos + 4..];
                if alias == parameter || alias == wrapped {
                    return column[..pos].to_string();
                }
            }
        }
    }
    parameter.to_string()
}

fn cursor_column(original: String) -> Column {
    if original.contains(['(', ')']) {
        Column::Raw(Expression::new(original))
    } else {
        Column::Name(original)
    }
}

/// `(a > ? or (a = ? and (b > ? or ...)))` for the orders from `i` on.
fn add_cursor_conditions(
    query: &mut Builder,
    orders: &[CursorOrder],
    cursor: &Cursor,
    i: usize,
) -> QueryResult<()> {
    if i > 0 {
        let previous = &orders[i - 1];
        let value = cursor.parameter(&previous.name)?;
        query.push_where(previous.original.clone(), "=".to_string(), value, Boolean::And);
    }

    let order = &orders[i];
    let value = cursor.parameter(&order.name)?;
    let operator = match order.direction {
        Direction::Asc => ">",
        Direction::Desc => "<",
    };
    query.where_nested(|nested| {
        nested.push_where(order.original.clone(), operator.to_string(), value, Boolean::And);
        if i + 1 < orders.len() {
            nested.or_where_nested(|inner| add_cursor_conditions(inner, orders, cursor, i + 1))?;
        }
        Ok(())
    })?;
    Ok(())
}

impl Builder {
    /// Number of rows the query would return without its limit and offset.
    ///
    /// Grouped queries are counted as a derived table so each group counts
    /// once.
    pub async fn get_count_for_pagination<C: Into<Column>>(
        &self,
        columns: impl IntoIterator<Item = C>,
    ) -> QueryResult<u64> {
        let columns = without_select_aliases(columns.into_iter().map(Into::into).collect());

        let mut query = if !self.groups.is_empty() || !self.havings.is_empty() {
            let mut clone = self
                .clone_without(&[Component::Orders, Component::Limit, Component::Offset])
                .clone_without_bindings(&[BindingCategory::Order]);
            if clone.columns.is_none() && !self.joins.is_empty() {
                if let Some(from) = &self.from {
                    let all = format!("{}.*", from.as_str());
                    clone.select([all]);
                }
            }
            let sql = clone.to_sql()?;
            let derived = format!("({sql}) as {}", self.grammar().wrap_str(AGGREGATE_TABLE));
            let mut outer = self.new_query();
            outer.from(Expression::new(derived)).merge_bindings(&clone);
            outer
        } else if self.unions.is_empty() {
            self.clone_without(&[
                Component::Columns,
                Component::Orders,
                Component::Limit,
                Component::Offset,
            ])
            .clone_without_bindings(&[BindingCategory::Select, BindingCategory::Order])
        } else {
            self.clone_without(&[
                Component::UnionOrders,
                Component::UnionLimit,
                Component::UnionOffset,
            ])
            .clone_without_bindings(&[BindingCategory::UnionOrder])
        };

        query.set_aggregate("count", columns);
        let rows = query.get().await?;
        let total = rows
            .first()
            .and_then(|row| row.get_ignore_case("aggregate"))
            .map_or(0, Value::to_int_lossy);
        Ok(total.max(0) as u64)
    }

    /// One page plus the total row count. `per_page` 0 means 15, page 0
    /// means the first page.
    pub async fn paginate(&mut self, per_page: u64, page: u64) -> QueryResult<LengthAwarePaginator> {
        let per_page = if per_page == 0 { DEFAULT_PER_PAGE } else { per_page };
        let page = page.max(1);

        let total = self.get_count_for_pagination(["*"]).await?;
        let items = if total > 0 {
            self.for_page(page, per_page).get().await?
        } else {
            Vec::new()
        };
        tracing::trace!(target: "fluentql.query", page, per_page, total, "paginate");
        Ok(LengthAwarePaginator::new(items, total, per_page, page))
    }

    /// One page without a count; one extra row is fetched to tell whether
    /// another page follows.
    pub async fn simple_paginate(&mut self, per_page: u64, page: u64) -> QueryResult<Paginator> {
        let per_page = if per_page == 0 { DEFAULT_PER_PAGE } else { per_page };
        let page = page.max(1);

        let offset = (page - 1).saturating_mul(per_page);
        let items = self.offset(offset).limit(per_page.saturating_add(1)).get().await?;
        Ok(Paginator::new(items, per_page, page))
    }

    /// One page relative to `cursor`, compared on the ordered columns
    /// instead of an offset. The query must be ordered.
    pub async fn cursor_paginate(
        &mut self,
        per_page: u64,
        cursor: Option<Cursor>,
    ) -> QueryResult<CursorPaginator> {
        let per_page = if per_page == 0 { DEFAULT_PER_PAGE } else { per_page };
        let reverse = cursor.as_ref().is_some_and(Cursor::points_to_previous_items);
        let orders = self.ensure_order_for_cursor_pagination(reverse)?;
        let parameters: Vec<String> = orders
            .iter()
            .filter_map(|order| order.column().map(|c| c.as_str().to_string()))
            .collect();

        if let Some(cursor) = &cursor {
            if !orders.is_empty() {
                self.apply_cursor(&orders, cursor)?;
            }
        }

        let items = self.limit(per_page.saturating_add(1)).get().await?;
        Ok(CursorPaginator::new(items, per_page, cursor, parameters))
    }

    /// The column orders cursor pagination compares on, flipped when reading
    /// backwards. Union orders win over the query's own.
    pub fn ensure_order_for_cursor_pagination(&mut self, reverse: bool) -> QueryResult<Vec<Order>> {
        if self.orders.is_empty() && self.union_orders.is_empty() {
            return Err(QueryError::MissingOrderBy);
        }

        if reverse {
            for order in self.orders.iter_mut().chain(self.union_orders.iter_mut()) {
                if let Order::Column { direction, .. } = order {
                    *direction = direction.reverse();
                }
            }
        }

        let orders = if self.union_orders.is_empty() {
            &self.orders
        } else {
            &self.union_orders
        };
        Ok(orders
            .iter()
            .filter(|order| order.direction().is_some())
            .cloned()
            .collect())
    }

    fn apply_cursor(&mut self, orders: &[Order], cursor: &Cursor) -> QueryResult<()> {
        let resolve = |query: &Builder| -> Vec<CursorOrder> {
            orders
                .iter()
                .filter_map(|order| match order {
                    Order::Column { column, direction } => {
                        let name = column.as_str().to_string();
                        let original = cursor_column(original_column_name(query, &name));
                        Some(CursorOrder {
                            name,
                            original,
                            direction: *direction,
                        })
                    }
                    Order::Raw { .. } => None,
                })
                .collect()
        };

        let own = resolve(self);
        add_cursor_conditions(self, &own, cursor, 0)?;

        if self.unions.is_empty() {
            return Ok(());
        }
        let mut union_bindings = Vec::new();
        for union in &mut self.unions {
            let query: &mut Builder = &mut union.query;
            let union_orders = resolve(&*query);
            add_cursor_conditions(query, &union_orders, cursor, 0)?;
            union_bindings.extend(query.get_bindings());
        }
        self.set_bindings(union_bindings, BindingCategory::Union)?;
        Ok(())
    }
}
