use super::clause::{
    Aggregate, Component, Distinct, GroupLimit, IndexHint, Lock, Order, Union, Where,
};
use super::join::JoinClause;
use crate::bindings::{AsBindingCategory, BindingCategory, Bindings, clean_bindings};
use crate::connection::Connection;
use crate::error::QueryResult;
use crate::grammar::Grammar;
use crate::processor::Processor;
use crate::row::Row;
use crate::value::{Column, Expression, Value};
use std::fmt;
use std::sync::Arc;

pub(crate) type BeforeQueryCallback = Arc<dyn Fn(&mut Builder) + Send + Sync>;
pub(crate) type AfterQueryCallback = Arc<dyn Fn(Vec<Row>) -> Vec<Row> + Send + Sync>;

/// Fluent SQL query builder.
///
/// A builder accumulates clauses and their bindings, compiles them through the
/// connection's [`Grammar`] and runs the result on its [`Connection`].
///
/// ```ignore
/// let users = fluentql::table(&conn, "users")
///     .where_("votes", ">", 100)?
///     .or_where_eq("name", "John")
///     .get()
///     .await?;
/// ```
///
/// Clause state is public so grammars (and callers inspecting a query) can
/// read it; bindings are only reachable through the binding API so they stay
/// aligned with the placeholders.
#[derive(Clone)]
pub struct Builder {
    connection: Arc<dyn Connection>,
    grammar: Arc<dyn Grammar>,
    processor: Arc<dyn Processor>,
    bindings: Bindings,

    pub aggregate: Option<Aggregate>,
    /// `None` selects `*`.
    pub columns: Option<Vec<Column>>,
    pub distinct: Distinct,
    pub from: Option<Column>,
    pub index_hint: Option<IndexHint>,
    pub joins: Vec<JoinClause>,
    pub wheres: Vec<Where>,
    pub groups: Vec<Column>,
    pub havings: Vec<Where>,
    pub orders: Vec<Order>,
    pub limit: Option<u64>,
    pub group_limit: Option<GroupLimit>,
    pub offset: Option<u64>,
    pub unions: Vec<Union>,
    pub union_limit: Option<u64>,
    pub union_offset: Option<u64>,
    pub union_orders: Vec<Order>,
    pub lock: Option<Lock>,
    /// Run selects against the write side of the connection.
    pub use_write_connection: bool,

    before_query_callbacks: Vec<BeforeQueryCallback>,
    after_query_callbacks: Vec<AfterQueryCallback>,
}

impl Builder {
    /// A builder compiling with the connection's grammar and processor.
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        let grammar = connection.query_grammar();
        let processor = connection.post_processor();
        Self::with_parts(connection, grammar, processor)
    }

    /// A builder with an explicit grammar and processor.
    pub fn with_parts(
        connection: Arc<dyn Connection>,
        grammar: Arc<dyn Grammar>,
        processor: Arc<dyn Processor>,
    ) -> Self {
        Self {
            connection,
            grammar,
            processor,
            bindings: Bindings::new(),
            aggregate: None,
            columns: None,
            distinct: Distinct::None,
            from: None,
            index_hint: None,
            joins: Vec::new(),
            wheres: Vec::new(),
            groups: Vec::new(),
            havings: Vec::new(),
            orders: Vec::new(),
            limit: None,
            group_limit: None,
            offset: None,
            unions: Vec::new(),
            union_limit: None,
            union_offset: None,
            union_orders: Vec::new(),
            lock: None,
            use_write_connection: false,
            before_query_callbacks: Vec::new(),
            after_query_callbacks: Vec::new(),
        }
    }

    /// An empty builder on the same connection, grammar and processor.
    pub fn new_query(&self) -> Builder {
        Builder::with_parts(
            self.connection.clone(),
            self.grammar.clone(),
            self.processor.clone(),
        )
    }

    /// An empty builder for a sub-select.
    pub fn for_sub_query(&self) -> Builder {
        self.new_query()
    }

    /// An empty builder sharing this query's `from`, for nested where groups.
    pub fn for_nested_where(&self) -> Builder {
        let mut query = self.new_query();
        query.from = self.from.clone();
        query
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn grammar(&self) -> &Arc<dyn Grammar> {
        &self.grammar
    }

    pub fn processor(&self) -> &Arc<dyn Processor> {
        &self.processor
    }

    /// A raw SQL fragment, never bound.
    pub fn raw(&self, value: &str) -> Expression {
        self.connection.raw(value)
    }

    /// A copy without the given clause state.
    pub fn clone_without(&self, components: &[Component]) -> Builder {
        let mut clone = self.clone();
        for component in components {
            match component {
                Component::Aggregate => clone.aggregate = None,
                Component::Columns => clone.columns = None,
                Component::Distinct => clone.distinct = Distinct::None,
                Component::From => clone.from = None,
                Component::IndexHint => clone.index_hint = None,
                Component::Joins => clone.joins.clear(),
                Component::Wheres => clone.wheres.clear(),
                Component::Groups => clone.groups.clear(),
                Component::Havings => clone.havings.clear(),
                Component::Orders => clone.orders.clear(),
                Component::Limit => clone.limit = None,
                Component::GroupLimit => clone.group_limit = None,
                Component::Offset => clone.offset = None,
                Component::Unions => clone.unions.clear(),
                Component::UnionLimit => clone.union_limit = None,
                Component::UnionOffset => clone.union_offset = None,
                Component::UnionOrders => clone.union_orders.clear(),
                Component::Lock => clone.lock = None,
            }
        }
        clone
    }

    /// A copy without the given binding categories.
    pub fn clone_without_bindings(&self, categories: &[BindingCategory]) -> Builder {
        let mut clone = self.clone();
        for category in categories {
            clone.bindings.clear(*category);
        }
        clone
    }

    // ===== bindings =====

    /// Flattened bindings in placeholder order.
    ///
    /// A group-limited query moves its order bindings in front of everything
    /// but the select bindings, since the window clause carries the order.
    pub fn get_bindings(&self) -> Vec<Value> {
        if self.group_limit.is_none() {
            return self.bindings.flatten();
        }
        let mut bindings = self.bindings.get(BindingCategory::Select).to_vec();
        bindings.extend(self.bindings.get(BindingCategory::Order).iter().cloned());
        bindings.extend(
            self.bindings
                .flatten_except(&[BindingCategory::Select, BindingCategory::Order]),
        );
        bindings
    }

    pub fn get_raw_bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Replace one category verbatim.
    pub fn set_bindings(
        &mut self,
        values: Vec<Value>,
        category: impl AsBindingCategory,
    ) -> QueryResult<&mut Self> {
        let category = category.binding_category()?;
        self.bindings.set(category, values);
        Ok(self)
    }

    /// Cast and append one value.
    pub fn add_binding(
        &mut self,
        value: impl Into<Value>,
        category: impl AsBindingCategory,
    ) -> QueryResult<&mut Self> {
        let category = category.binding_category()?;
        self.bindings.push(category, value.into());
        Ok(self)
    }

    /// Merge a list into a category, recasting the merged list.
    pub fn add_bindings(
        &mut self,
        values: impl IntoIterator<Item = Value>,
        category: impl AsBindingCategory,
    ) -> QueryResult<&mut Self> {
        let category = category.binding_category()?;
        self.bindings.extend(category, values);
        Ok(self)
    }

    /// Append every binding of `query`, category by category.
    pub fn merge_bindings(&mut self, query: &Builder) -> &mut Self {
        self.bindings.merge(&query.bindings);
        self
    }

    pub(crate) fn push_binding(&mut self, category: BindingCategory, value: Value) {
        self.bindings.push(category, value);
    }

    pub(crate) fn extend_bindings(
        &mut self,
        category: BindingCategory,
        values: impl IntoIterator<Item = Value>,
    ) {
        self.bindings.extend(category, values);
    }

    pub(crate) fn clear_bindings(&mut self, category: BindingCategory) {
        self.bindings.clear(category);
    }

    /// Drop raw expressions from `values` and cast what remains.
    pub fn clean_bindings(&self, values: impl IntoIterator<Item = Value>) -> Vec<Value> {
        clean_bindings(values)
    }

    // ===== compilation =====

    /// Compile the select. Runs (and drains) the before-query callbacks.
    pub fn to_sql(&mut self) -> QueryResult<String> {
        self.apply_before_query_callbacks();
        self.grammar.compile_select(self)
    }

    /// The select with bindings inlined, for display only.
    pub fn to_raw_sql(&mut self) -> QueryResult<String> {
        let sql = self.to_sql()?;
        Ok(self
            .grammar
            .substitute_bindings_into_raw_sql(&sql, &self.get_bindings()))
    }

    /// Log the SQL and bindings at `DEBUG` on `fluentql.query`.
    pub fn dump(&mut self) -> QueryResult<&mut Self> {
        let sql = self.to_sql()?;
        let bindings = self.get_bindings();
        tracing::debug!(target: "fluentql.query", sql = %sql, bindings = ?bindings, "dump");
        Ok(self)
    }

    /// Log the SQL with inlined bindings at `DEBUG` on `fluentql.query`.
    pub fn dump_raw_sql(&mut self) -> QueryResult<&mut Self> {
        let sql = self.to_raw_sql()?;
        tracing::debug!(target: "fluentql.query", sql = %sql, "dump_raw_sql");
        Ok(self)
    }

    // ===== callbacks =====

    /// Run `callback` on the builder right before it next compiles.
    pub fn before_query<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&mut Builder) + Send + Sync + 'static,
    {
        self.before_query_callbacks.push(Arc::new(callback));
        self
    }

    /// Transform the rows of the next select.
    pub fn after_query<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(Vec<Row>) -> Vec<Row> + Send + Sync + 'static,
    {
        self.after_query_callbacks.push(Arc::new(callback));
        self
    }

    pub fn apply_before_query_callbacks(&mut self) {
        if self.before_query_callbacks.is_empty() {
            return;
        }
        let callbacks = std::mem::take(&mut self.before_query_callbacks);
        tracing::trace!(target: "fluentql.query", count = callbacks.len(), "before-query callbacks");
        for callback in callbacks {
            callback(self);
        }
    }

    pub fn apply_after_query_callbacks(&mut self, rows: Vec<Row>) -> Vec<Row> {
        if self.after_query_callbacks.is_empty() {
            return rows;
        }
        let callbacks = std::mem::take(&mut self.after_query_callbacks);
        tracing::trace!(target: "fluentql.query", count = callbacks.len(), "after-query callbacks");
        callbacks.iter().fold(rows, |rows, callback| callback(rows))
    }

    /// Take the pending after-query callbacks, leaving none behind.
    pub(crate) fn take_after_query_callbacks(&mut self) -> Vec<AfterQueryCallback> {
        std::mem::take(&mut self.after_query_callbacks)
    }

    // ===== conditionals =====

    /// Apply `callback` when `condition` holds.
    pub fn when<F>(&mut self, condition: bool, callback: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Builder) -> QueryResult<()>,
    {
        if condition {
            callback(self)?;
        }
        Ok(self)
    }

    /// Apply `callback` when `condition` holds, `default` otherwise.
    pub fn when_else<F, D>(&mut self, condition: bool, callback: F, default: D) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Builder) -> QueryResult<()>,
        D: FnOnce(&mut Builder) -> QueryResult<()>,
    {
        if condition {
            callback(self)?;
        } else {
            default(self)?;
        }
        Ok(self)
    }

    /// Apply `callback` unless `condition` holds.
    pub fn unless<F>(&mut self, condition: bool, callback: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Builder) -> QueryResult<()>,
    {
        self.when(!condition, callback)
    }

    /// Apply `callback` unconditionally.
    pub fn tap<F>(&mut self, callback: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Builder) -> QueryResult<()>,
    {
        self.when(true, callback)
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("aggregate", &self.aggregate)
            .field("columns", &self.columns)
            .field("distinct", &self.distinct)
            .field("from", &self.from)
            .field("joins", &self.joins)
            .field("wheres", &self.wheres)
            .field("groups", &self.groups)
            .field("havings", &self.havings)
            .field("orders", &self.orders)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("unions", &self.unions)
            .field("lock", &self.lock)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

/// Clause state and bindings compare; connection handles and callbacks don't.
impl PartialEq for Builder {
    fn eq(&self, other: &Self) -> bool {
        self.bindings == other.bindings
            && self.aggregate == other.aggregate
            && self.columns == other.columns
            && self.distinct == other.distinct
            && self.from == other.from
            && self.index_hint == other.index_hint
            && self.joins == other.joins
            && self.wheres == other.wheres
            && self.groups == other.groups
            && self.havings == other.havings
            && self.orders == other.orders
            && self.limit == other.limit
            && self.group_limit == other.group_limit
            && self.offset == other.offset
            && self.unions == other.unions
            && self.union_limit == other.union_limit
            && self.union_offset == other.union_offset
            && self.union_orders == other.union_orders
            && self.lock == other.lock
            && self.use_write_connection == other.use_write_connection
    }
}
