//! The where family.

use super::clause::{Boolean, DatePart, FulltextOptions, Where};
use super::sub::{IntoQuery, IntoSubQuery};
use super::Builder;
use crate::bindings::{BindingCategory, cast_binding, clean_bindings};
use crate::error::{QueryError, QueryResult};
use crate::value::{Column, Expression, Value};

/// Operators every builder accepts, whatever the grammar.
pub const OPERATORS: &[&str] = &[
    "=", "<", ">", "<=", ">=", "<>", "!=", "<=>", "like", "like binary", "not like", "ilike", "&",
    "|", "^", "<<", ">>", "&~", "is", "is not", "rlike", "not rlike", "regexp", "not regexp", "~",
    "~*", "!~", "!~*", "similar to", "not similar to", "not ilike", "~~*", "!~~*",
];

/// Operators compiled as bitwise comparisons.
pub const BITWISE_OPERATORS: &[&str] = &["&", "|", "^", "<<", ">>", "&~"];

/// First scalar of a (possibly nested) array, or the value itself.
pub(crate) fn flatten_value(value: Value) -> Value {
    match value {
        Value::Array(items) => items.into_iter().next().map(flatten_value).unwrap_or(Value::Null),
        other => other,
    }
}

/// Every scalar of a (possibly nested) array, in order.
pub(crate) fn flatten_values(values: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut flat = Vec::new();
    for value in values {
        match value {
            Value::Array(items) => flat.extend(flatten_values(items)),
            other => flat.push(other),
        }
    }
    flat
}

impl Builder {
    /// Neither the builder nor the grammar knows `operator`.
    pub(crate) fn invalid_operator(&self, operator: &str) -> bool {
        let operator = operator.to_lowercase();
        !OPERATORS.contains(&operator.as_str())
            && !self.grammar().operators().iter().any(|op| *op == operator)
    }

    pub(crate) fn is_bitwise_operator(&self, operator: &str) -> bool {
        let operator = operator.to_lowercase();
        BITWISE_OPERATORS.contains(&operator.as_str())
            || self.grammar().bitwise_operators().iter().any(|op| *op == operator)
    }

    /// `NULL` can only be compared for (in)equality.
    pub(crate) fn invalid_operator_and_value(&self, operator: &str, value: &Value) -> bool {
        value.is_null()
            && OPERATORS.contains(&operator)
            && !["=", "<=>", "<>", "!="].contains(&operator)
    }

    pub(crate) fn prepare_value_and_operator(&self, operator: &str, value: &Value) -> QueryResult<()> {
        if self.invalid_operator_and_value(operator, value) {
            return Err(QueryError::IllegalOperatorValueCombination {
                operator: operator.to_string(),
            });
        }
        Ok(())
    }

    fn add_where(
        &mut self,
        column: Column,
        operator: &str,
        value: Value,
        boolean: Boolean,
    ) -> QueryResult<&mut Self> {
        self.prepare_value_and_operator(operator, &value)?;
        if self.invalid_operator(operator) {
            return Ok(self.push_where(column, "=".to_string(), Value::Text(operator.to_string()), boolean));
        }
        Ok(self.push_where(column, operator.to_string(), value, boolean))
    }

    /// Append a comparison whose operator is already validated.
    pub(crate) fn push_where(
        &mut self,
        column: Column,
        operator: String,
        value: Value,
        boolean: Boolean,
    ) -> &mut Self {
        if value.is_null() {
            let not = operator != "=";
            return self.add_where_null(column, boolean, not);
        }

        let mut value = value;
        let mut json_boolean = false;
        if column.as_str().contains("->") {
            if let Value::Bool(b) = value {
                value = Value::Expression(Expression::new(if b { "true" } else { "false" }));
                json_boolean = matches!(column, Column::Name(_));
            }
        }

        let binding = (!value.is_expression()).then(|| flatten_value(value.clone()));
        let clause = if self.is_bitwise_operator(&operator) {
            Where::Bitwise {
                column,
                operator,
                value,
                boolean,
            }
        } else if json_boolean {
            Where::JsonBoolean {
                column,
                operator,
                value,
                boolean,
            }
        } else {
            Where::Basic {
                column,
                operator,
                value,
                boolean,
            }
        };
        self.wheres.push(clause);
        if let Some(binding) = binding {
            self.push_binding(BindingCategory::Where, binding);
        }
        self
    }

    /// `column operator value`.
    ///
    /// An operator neither the builder nor the grammar recognises is taken as
    /// the value, compared with `=`. A `NULL` value compiles to `is null` (or
    /// `is not null` for any operator but `=`).
    pub fn where_(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_where(column.into(), operator, value.into(), Boolean::And)
    }

    pub fn or_where(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_where(column.into(), operator, value.into(), Boolean::Or)
    }

    /// `column = value`.
    pub fn where_eq(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.push_where(column.into(), "=".to_string(), value.into(), Boolean::And)
    }

    pub fn or_where_eq(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.push_where(column.into(), "=".to_string(), value.into(), Boolean::Or)
    }

    /// `not (...)` around the group built by `callback`.
    pub fn where_not<F>(&mut self, callback: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Builder) -> QueryResult<()>,
    {
        self.add_where_nested(callback, Boolean::AndNot)
    }

    pub fn or_where_not<F>(&mut self, callback: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Builder) -> QueryResult<()>,
    {
        self.add_where_nested(callback, Boolean::OrNot)
    }

    /// A parenthesised group of equalities, one per pair.
    pub fn where_map<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<Column>,
        V: Into<Value>,
    {
        self.add_array_of_wheres(pairs, Boolean::And)
    }

    pub fn or_where_map<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<Column>,
        V: Into<Value>,
    {
        self.add_array_of_wheres(pairs, Boolean::Or)
    }

    fn add_array_of_wheres<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>, boolean: Boolean) -> &mut Self
    where
        K: Into<Column>,
        V: Into<Value>,
    {
        let mut query = self.for_nested_where();
        for (column, value) in pairs {
            query.push_where(column.into(), "=".to_string(), value.into(), boolean);
        }
        self.add_nested_where_query(query, boolean)
    }

    /// A parenthesised group built by `callback` on a fresh child query.
    /// An empty group adds nothing.
    pub fn where_nested<F>(&mut self, callback: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Builder) -> QueryResult<()>,
    {
        self.add_where_nested(callback, Boolean::And)
    }

    pub fn or_where_nested<F>(&mut self, callback: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Builder) -> QueryResult<()>,
    {
        self.add_where_nested(callback, Boolean::Or)
    }

    fn add_where_nested<F>(&mut self, callback: F, boolean: Boolean) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Builder) -> QueryResult<()>,
    {
        let mut query = self.for_nested_where();
        callback(&mut query)?;
        Ok(self.add_nested_where_query(query, boolean))
    }

    /// Attach `query`'s wheres as a group, copying its where bindings.
    pub fn add_nested_where_query(&mut self, query: Builder, boolean: Boolean) -> &mut Self {
        if query.wheres.is_empty() {
            return self;
        }
        let bindings = query.get_raw_bindings().get(BindingCategory::Where).to_vec();
        self.wheres.push(Where::Nested {
            query: Box::new(query),
            boolean,
        });
        self.extend_bindings(BindingCategory::Where, bindings);
        self
    }

    /// `column operator (sub-select)`.
    pub fn where_sub(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        query: impl IntoQuery,
    ) -> QueryResult<&mut Self> {
        self.add_where_sub(column.into(), operator, query, Boolean::And)
    }

    pub fn or_where_sub(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        query: impl IntoQuery,
    ) -> QueryResult<&mut Self> {
        self.add_where_sub(column.into(), operator, query, Boolean::Or)
    }

    fn add_where_sub(
        &mut self,
        column: Column,
        operator: &str,
        query: impl IntoQuery,
        boolean: Boolean,
    ) -> QueryResult<&mut Self> {
        let query = query.into_query(self)?;
        let bindings = query.get_bindings();
        self.wheres.push(Where::Sub {
            column,
            operator: operator.to_string(),
            query: Box::new(query),
            boolean,
        });
        self.extend_bindings(BindingCategory::Where, bindings);
        Ok(self)
    }

    /// `(sub-select) operator value`.
    pub fn where_column_sub(
        &mut self,
        query: impl IntoSubQuery,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_where_column_sub(query, operator, value.into(), Boolean::And)
    }

    pub fn or_where_column_sub(
        &mut self,
        query: impl IntoSubQuery,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_where_column_sub(query, operator, value.into(), Boolean::Or)
    }

    fn add_where_column_sub(
        &mut self,
        query: impl IntoSubQuery,
        operator: &str,
        value: Value,
        boolean: Boolean,
    ) -> QueryResult<&mut Self> {
        self.prepare_value_and_operator(operator, &value)?;
        let (sql, bindings) = self.create_sub(query)?;
        self.extend_bindings(BindingCategory::Where, bindings);
        let column = Column::Raw(Expression::new(format!("({sql})")));
        self.add_where(column, operator, value, boolean)
    }

    /// A complete condition expression, inlined as is.
    pub fn where_expression(&mut self, condition: Expression) -> &mut Self {
        self.wheres.push(Where::Expression {
            expression: condition,
            boolean: Boolean::And,
        });
        self
    }

    pub fn or_where_expression(&mut self, condition: Expression) -> &mut Self {
        self.wheres.push(Where::Expression {
            expression: condition,
            boolean: Boolean::Or,
        });
        self
    }

    /// Raw SQL with its own bindings.
    pub fn where_raw(&mut self, sql: impl Into<String>, bindings: impl IntoIterator<Item = Value>) -> &mut Self {
        self.add_where_raw(sql.into(), bindings, Boolean::And)
    }

    pub fn or_where_raw(&mut self, sql: impl Into<String>, bindings: impl IntoIterator<Item = Value>) -> &mut Self {
        self.add_where_raw(sql.into(), bindings, Boolean::Or)
    }

    fn add_where_raw(&mut self, sql: String, bindings: impl IntoIterator<Item = Value>, boolean: Boolean) -> &mut Self {
        self.wheres.push(Where::Raw { sql, boolean });
        self.extend_bindings(BindingCategory::Where, bindings);
        self
    }

    /// `first operator second`, comparing two columns.
    pub fn where_column(
        &mut self,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Column>,
    ) -> &mut Self {
        self.add_where_column(first.into(), operator, second.into(), Boolean::And)
    }

    pub fn or_where_column(
        &mut self,
        first: impl Into<Column>,
        operator: &str,
        second: impl Into<Column>,
    ) -> &mut Self {
        self.add_where_column(first.into(), operator, second.into(), Boolean::Or)
    }

    pub(crate) fn add_where_column(
        &mut self,
        first: Column,
        operator: &str,
        second: Column,
        boolean: Boolean,
    ) -> &mut Self {
        let (operator, second) = if self.invalid_operator(operator) {
            ("=".to_string(), Column::Name(operator.to_string()))
        } else {
            (operator.to_string(), second)
        };
        self.wheres.push(Where::Column {
            first,
            operator,
            second,
            boolean,
        });
        self
    }

    /// A parenthesised group of column equalities, one per pair.
    pub fn where_column_map<A, B>(&mut self, pairs: impl IntoIterator<Item = (A, B)>) -> &mut Self
    where
        A: Into<Column>,
        B: Into<Column>,
    {
        let mut query = self.for_nested_where();
        for (first, second) in pairs {
            query.add_where_column(first.into(), "=", second.into(), Boolean::And);
        }
        self.add_nested_where_query(query, Boolean::And)
    }

    // ===== in =====

    /// `column in (values)`. Array elements are rejected.
    pub fn where_in<V: Into<Value>>(
        &mut self,
        column: impl Into<Column>,
        values: impl IntoIterator<Item = V>,
    ) -> QueryResult<&mut Self> {
        self.add_where_in(column.into(), values, Boolean::And, false)
    }

    pub fn or_where_in<V: Into<Value>>(
        &mut self,
        column: impl Into<Column>,
        values: impl IntoIterator<Item = V>,
    ) -> QueryResult<&mut Self> {
        self.add_where_in(column.into(), values, Boolean::Or, false)
    }

    pub fn where_not_in<V: Into<Value>>(
        &mut self,
        column: impl Into<Column>,
        values: impl IntoIterator<Item = V>,
    ) -> QueryResult<&mut Self> {
        self.add_where_in(column.into(), values, Boolean::And, true)
    }

    pub fn or_where_not_in<V: Into<Value>>(
        &mut self,
        column: impl Into<Column>,
        values: impl IntoIterator<Item = V>,
    ) -> QueryResult<&mut Self> {
        self.add_where_in(column.into(), values, Boolean::Or, true)
    }

    fn add_where_in<V: Into<Value>>(
        &mut self,
        column: Column,
        values: impl IntoIterator<Item = V>,
        boolean: Boolean,
        not: bool,
    ) -> QueryResult<&mut Self> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.iter().any(Value::is_array) {
            return Err(QueryError::NestedArrayNotAllowed);
        }
        let bindings = clean_bindings(values.iter().cloned());
        self.wheres.push(Where::In {
            column,
            values,
            not,
            boolean,
        });
        self.extend_bindings(BindingCategory::Where, bindings);
        Ok(self)
    }

    /// `column in (sub-select)`.
    pub fn where_in_sub(&mut self, column: impl Into<Column>, query: impl IntoSubQuery) -> QueryResult<&mut Self> {
        self.add_where_in_sub(column.into(), query, Boolean::And, false)
    }

    pub fn or_where_in_sub(&mut self, column: impl Into<Column>, query: impl IntoSubQuery) -> QueryResult<&mut Self> {
        self.add_where_in_sub(column.into(), query, Boolean::Or, false)
    }

    pub fn where_not_in_sub(&mut self, column: impl Into<Column>, query: impl IntoSubQuery) -> QueryResult<&mut Self> {
        self.add_where_in_sub(column.into(), query, Boolean::And, true)
    }

    pub fn or_where_not_in_sub(
        &mut self,
        column: impl Into<Column>,
        query: impl IntoSubQuery,
    ) -> QueryResult<&mut Self> {
        self.add_where_in_sub(column.into(), query, Boolean::Or, true)
    }

    fn add_where_in_sub(
        &mut self,
        column: Column,
        query: impl IntoSubQuery,
        boolean: Boolean,
        not: bool,
    ) -> QueryResult<&mut Self> {
        let (sql, bindings) = self.create_sub(query)?;
        self.extend_bindings(BindingCategory::Where, bindings);
        self.wheres.push(Where::In {
            column,
            values: vec![Value::Expression(Expression::new(sql))],
            not,
            boolean,
        });
        Ok(self)
    }

    /// `column in (1, 2, 3)` with the integers inlined rather than bound.
    pub fn where_integer_in_raw<V: Into<Value>>(
        &mut self,
        column: impl Into<Column>,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.add_where_integer_in_raw(column.into(), values, Boolean::And, false)
    }

    pub fn or_where_integer_in_raw<V: Into<Value>>(
        &mut self,
        column: impl Into<Column>,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.add_where_integer_in_raw(column.into(), values, Boolean::Or, false)
    }

    pub fn where_integer_not_in_raw<V: Into<Value>>(
        &mut self,
        column: impl Into<Column>,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.add_where_integer_in_raw(column.into(), values, Boolean::And, true)
    }

    pub fn or_where_integer_not_in_raw<V: Into<Value>>(
        &mut self,
        column: impl Into<Column>,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.add_where_integer_in_raw(column.into(), values, Boolean::Or, true)
    }

    fn add_where_integer_in_raw<V: Into<Value>>(
        &mut self,
        column: Column,
        values: impl IntoIterator<Item = V>,
        boolean: Boolean,
        not: bool,
    ) -> &mut Self {
        let values = flatten_values(values.into_iter().map(Into::into))
            .into_iter()
            .map(|value| cast_binding(value).to_int_lossy())
            .collect();
        self.wheres.push(Where::InRaw {
            column,
            values,
            not,
            boolean,
        });
        self
    }

    // ===== null =====

    pub fn where_null(&mut self, column: impl Into<Column>) -> &mut Self {
        self.add_where_null(column.into(), Boolean::And, false)
    }

    pub fn or_where_null(&mut self, column: impl Into<Column>) -> &mut Self {
        self.add_where_null(column.into(), Boolean::Or, false)
    }

    pub fn where_not_null(&mut self, column: impl Into<Column>) -> &mut Self {
        self.add_where_null(column.into(), Boolean::And, true)
    }

    pub fn or_where_not_null(&mut self, column: impl Into<Column>) -> &mut Self {
        self.add_where_null(column.into(), Boolean::Or, true)
    }

    pub(crate) fn add_where_null(&mut self, column: Column, boolean: Boolean, not: bool) -> &mut Self {
        self.wheres.push(Where::Null {
            column,
            not,
            boolean,
        });
        self
    }

    // ===== between =====

    /// `column between min and max`.
    pub fn where_between<V: Into<Value>>(&mut self, column: impl Into<Column>, values: [V; 2]) -> &mut Self {
        self.add_where_between(column.into(), values, Boolean::And, false)
    }

    pub fn or_where_between<V: Into<Value>>(&mut self, column: impl Into<Column>, values: [V; 2]) -> &mut Self {
        self.add_where_between(column.into(), values, Boolean::Or, false)
    }

    pub fn where_not_between<V: Into<Value>>(&mut self, column: impl Into<Column>, values: [V; 2]) -> &mut Self {
        self.add_where_between(column.into(), values, Boolean::And, true)
    }

    pub fn or_where_not_between<V: Into<Value>>(
        &mut self,
        column: impl Into<Column>,
        values: [V; 2],
    ) -> &mut Self {
        self.add_where_between(column.into(), values, Boolean::Or, true)
    }

    fn add_where_between<V: Into<Value>>(
        &mut self,
        column: Column,
        values: [V; 2],
        boolean: Boolean,
        not: bool,
    ) -> &mut Self {
        let values = values.map(|value| flatten_value(value.into()));
        let bindings = clean_bindings(values.iter().cloned());
        self.wheres.push(Where::Between {
            column,
            values,
            not,
            boolean,
        });
        self.extend_bindings(BindingCategory::Where, bindings);
        self
    }

    /// `column between first_column and second_column`.
    pub fn where_between_columns<C: Into<Column>>(&mut self, column: impl Into<Column>, columns: [C; 2]) -> &mut Self {
        self.add_where_between_columns(column.into(), columns, Boolean::And, false)
    }

    pub fn or_where_between_columns<C: Into<Column>>(
        &mut self,
        column: impl Into<Column>,
        columns: [C; 2],
    ) -> &mut Self {
        self.add_where_between_columns(column.into(), columns, Boolean::Or, false)
    }

    pub fn where_not_between_columns<C: Into<Column>>(
        &mut self,
        column: impl Into<Column>,
        columns: [C; 2],
    ) -> &mut Self {
        self.add_where_between_columns(column.into(), columns, Boolean::And, true)
    }

    pub fn or_where_not_between_columns<C: Into<Column>>(
        &mut self,
        column: impl Into<Column>,
        columns: [C; 2],
    ) -> &mut Self {
        self.add_where_between_columns(column.into(), columns, Boolean::Or, true)
    }

    fn add_where_between_columns<C: Into<Column>>(
        &mut self,
        column: Column,
        columns: [C; 2],
        boolean: Boolean,
        not: bool,
    ) -> &mut Self {
        self.wheres.push(Where::BetweenColumns {
            column,
            values: columns.map(Into::into),
            not,
            boolean,
        });
        self
    }

    /// `value between first_column and second_column`.
    pub fn where_value_between<C: Into<Column>>(&mut self, value: impl Into<Value>, columns: [C; 2]) -> &mut Self {
        self.add_where_value_between(value.into(), columns, Boolean::And, false)
    }

    pub fn or_where_value_between<C: Into<Column>>(&mut self, value: impl Into<Value>, columns: [C; 2]) -> &mut Self {
        self.add_where_value_between(value.into(), columns, Boolean::Or, false)
    }

    pub fn where_value_not_between<C: Into<Column>>(&mut self, value: impl Into<Value>, columns: [C; 2]) -> &mut Self {
        self.add_where_value_between(value.into(), columns, Boolean::And, true)
    }

    pub fn or_where_value_not_between<C: Into<Column>>(
        &mut self,
        value: impl Into<Value>,
        columns: [C; 2],
    ) -> &mut Self {
        self.add_where_value_between(value.into(), columns, Boolean::Or, true)
    }

    fn add_where_value_between<C: Into<Column>>(
        &mut self,
        value: Value,
        columns: [C; 2],
        boolean: Boolean,
        not: bool,
    ) -> &mut Self {
        let binding = (!value.is_expression()).then(|| flatten_value(value.clone()));
        self.wheres.push(Where::ValueBetween {
            value,
            columns: columns.map(Into::into),
            not,
            boolean,
        });
        if let Some(binding) = binding {
            self.push_binding(BindingCategory::Where, binding);
        }
        self
    }

    // ===== dates =====

    /// Compare the date part of `column`. Dates and timestamps bind as
    /// `YYYY-MM-DD`.
    pub fn where_date(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_date_based_where(DatePart::Date, column.into(), operator, value.into(), Boolean::And)
    }

    pub fn or_where_date(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_date_based_where(DatePart::Date, column.into(), operator, value.into(), Boolean::Or)
    }

    /// Compare the time part of `column`. Times and timestamps bind as
    /// `HH:MM:SS`.
    pub fn where_time(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_date_based_where(DatePart::Time, column.into(), operator, value.into(), Boolean::And)
    }

    pub fn or_where_time(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_date_based_where(DatePart::Time, column.into(), operator, value.into(), Boolean::Or)
    }

    /// Compare the day of month, zero-padded to two digits.
    pub fn where_day(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_date_based_where(DatePart::Day, column.into(), operator, value.into(), Boolean::And)
    }

    pub fn or_where_day(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_date_based_where(DatePart::Day, column.into(), operator, value.into(), Boolean::Or)
    }

    /// Compare the month, zero-padded to two digits.
    pub fn where_month(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_date_based_where(DatePart::Month, column.into(), operator, value.into(), Boolean::And)
    }

    pub fn or_where_month(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_date_based_where(DatePart::Month, column.into(), operator, value.into(), Boolean::Or)
    }

    pub fn where_year(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_date_based_where(DatePart::Year, column.into(), operator, value.into(), Boolean::And)
    }

    pub fn or_where_year(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_date_based_where(DatePart::Year, column.into(), operator, value.into(), Boolean::Or)
    }

    fn add_date_based_where(
        &mut self,
        part: DatePart,
        column: Column,
        operator: &str,
        value: Value,
        boolean: Boolean,
    ) -> QueryResult<&mut Self> {
        self.prepare_value_and_operator(operator, &value)?;
        let value = normalize_date_part(part, flatten_value(value));
        let binding = (!value.is_expression()).then(|| value.clone());
        self.wheres.push(Where::Date {
            part,
            column,
            operator: operator.to_string(),
            value,
            boolean,
        });
        if let Some(binding) = binding {
            self.push_binding(BindingCategory::Where, binding);
        }
        Ok(self)
    }

    // ===== exists =====

    /// `exists (sub-select)`.
    pub fn where_exists(&mut self, query: impl IntoQuery) -> QueryResult<&mut Self> {
        self.add_where_exists(query, Boolean::And, false)
    }

    pub fn or_where_exists(&mut self, query: impl IntoQuery) -> QueryResult<&mut Self> {
        self.add_where_exists(query, Boolean::Or, false)
    }

    pub fn where_not_exists(&mut self, query: impl IntoQuery) -> QueryResult<&mut Self> {
        self.add_where_exists(query, Boolean::And, true)
    }

    pub fn or_where_not_exists(&mut self, query: impl IntoQuery) -> QueryResult<&mut Self> {
        self.add_where_exists(query, Boolean::Or, true)
    }

    fn add_where_exists(&mut self, query: impl IntoQuery, boolean: Boolean, not: bool) -> QueryResult<&mut Self> {
        let query = query.into_query(self)?;
        Ok(self.add_where_exists_query(query, boolean, not))
    }

    /// Attach an already built `exists` sub-select.
    pub fn add_where_exists_query(&mut self, query: Builder, boolean: Boolean, not: bool) -> &mut Self {
        let bindings = query.get_bindings();
        self.wheres.push(Where::Exists {
            query: Box::new(query),
            not,
            boolean,
        });
        self.extend_bindings(BindingCategory::Where, bindings);
        self
    }

    // ===== row values =====

    /// `(a, b) operator (?, ?)`.
    pub fn where_row_values<C, V>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
        operator: &str,
        values: impl IntoIterator<Item = V>,
    ) -> QueryResult<&mut Self>
    where
        C: Into<Column>,
        V: Into<Value>,
    {
        self.add_where_row_values(columns, operator, values, Boolean::And)
    }

    pub fn or_where_row_values<C, V>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
        operator: &str,
        values: impl IntoIterator<Item = V>,
    ) -> QueryResult<&mut Self>
    where
        C: Into<Column>,
        V: Into<Value>,
    {
        self.add_where_row_values(columns, operator, values, Boolean::Or)
    }

    fn add_where_row_values<C, V>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
        operator: &str,
        values: impl IntoIterator<Item = V>,
        boolean: Boolean,
    ) -> QueryResult<&mut Self>
    where
        C: Into<Column>,
        V: Into<Value>,
    {
        let columns: Vec<Column> = columns.into_iter().map(Into::into).collect();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if columns.len() != values.len() {
            return Err(QueryError::ColumnValueCountMismatch {
                columns: columns.len(),
                values: values.len(),
            });
        }
        let bindings = clean_bindings(values.iter().cloned());
        self.wheres.push(Where::RowValues {
            columns,
            operator: operator.to_string(),
            values,
            boolean,
        });
        self.extend_bindings(BindingCategory::Where, bindings);
        Ok(self)
    }

    // ===== json =====

    /// JSON containment. The value binds as JSON text.
    pub fn where_json_contains(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.add_where_json_contains(column.into(), value.into(), Boolean::And, false)
    }

    pub fn or_where_json_contains(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.add_where_json_contains(column.into(), value.into(), Boolean::Or, false)
    }

    pub fn where_json_doesnt_contain(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.add_where_json_contains(column.into(), value.into(), Boolean::And, true)
    }

    pub fn or_where_json_doesnt_contain(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.add_where_json_contains(column.into(), value.into(), Boolean::Or, true)
    }

    fn add_where_json_contains(&mut self, column: String, value: Value, boolean: Boolean, not: bool) -> &mut Self {
        let binding = (!value.is_expression()).then(|| self.grammar().prepare_binding_for_json_contains(&value));
        self.wheres.push(Where::JsonContains {
            column,
            value,
            not,
            boolean,
        });
        if let Some(binding) = binding {
            self.push_binding(BindingCategory::Where, binding);
        }
        self
    }

    /// JSON overlap. The value binds as JSON text.
    pub fn where_json_overlaps(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.add_where_json_overlaps(column.into(), value.into(), Boolean::And, false)
    }

    pub fn or_where_json_overlaps(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.add_where_json_overlaps(column.into(), value.into(), Boolean::Or, false)
    }

    pub fn where_json_doesnt_overlap(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.add_where_json_overlaps(column.into(), value.into(), Boolean::And, true)
    }

    pub fn or_where_json_doesnt_overlap(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.add_where_json_overlaps(column.into(), value.into(), Boolean::Or, true)
    }

    fn add_where_json_overlaps(&mut self, column: String, value: Value, boolean: Boolean, not: bool) -> &mut Self {
        let binding = (!value.is_expression()).then(|| self.grammar().prepare_binding_for_json_contains(&value));
        self.wheres.push(Where::JsonOverlaps {
            column,
            value,
            not,
            boolean,
        });
        if let Some(binding) = binding {
            self.push_binding(BindingCategory::Where, binding);
        }
        self
    }

    /// The JSON path (object key or array index) exists.
    pub fn where_json_contains_key(&mut self, column: impl Into<String>) -> &mut Self {
        self.add_where_json_contains_key(column.into(), Boolean::And, false)
    }

    pub fn or_where_json_contains_key(&mut self, column: impl Into<String>) -> &mut Self {
        self.add_where_json_contains_key(column.into(), Boolean::Or, false)
    }

    pub fn where_json_doesnt_contain_key(&mut self, column: impl Into<String>) -> &mut Self {
        self.add_where_json_contains_key(column.into(), Boolean::And, true)
    }

    pub fn or_where_json_doesnt_contain_key(&mut self, column: impl Into<String>) -> &mut Self {
        self.add_where_json_contains_key(column.into(), Boolean::Or, true)
    }

    fn add_where_json_contains_key(&mut self, column: String, boolean: Boolean, not: bool) -> &mut Self {
        self.wheres.push(Where::JsonContainsKey { column, not, boolean });
        self
    }

    /// Compare the length of a JSON array. The value binds as an integer.
    pub fn where_json_length(
        &mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_where_json_length(column.into(), operator, value.into(), Boolean::And)
    }

    pub fn or_where_json_length(
        &mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_where_json_length(column.into(), operator, value.into(), Boolean::Or)
    }

    fn add_where_json_length(
        &mut self,
        column: String,
        operator: &str,
        value: Value,
        boolean: Boolean,
    ) -> QueryResult<&mut Self> {
        self.prepare_value_and_operator(operator, &value)?;
        let binding = (!value.is_expression()).then(|| Value::Int(flatten_value(value.clone()).to_int_lossy()));
        self.wheres.push(Where::JsonLength {
            column,
            operator: operator.to_string(),
            value,
            boolean,
        });
        if let Some(binding) = binding {
            self.push_binding(BindingCategory::Where, binding);
        }
        Ok(self)
    }

    // ===== full text / like =====

    /// Full text search over `columns`.
    pub fn where_fulltext<C: Into<Column>>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
        value: impl Into<Value>,
        options: FulltextOptions,
    ) -> &mut Self {
        self.add_where_fulltext(columns, value.into(), options, Boolean::And)
    }

    pub fn or_where_fulltext<C: Into<Column>>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
        value: impl Into<Value>,
        options: FulltextOptions,
    ) -> &mut Self {
        self.add_where_fulltext(columns, value.into(), options, Boolean::Or)
    }

    fn add_where_fulltext<C: Into<Column>>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
        value: Value,
        options: FulltextOptions,
        boolean: Boolean,
    ) -> &mut Self {
        self.wheres.push(Where::Fulltext {
            columns: columns.into_iter().map(Into::into).collect(),
            value: value.clone(),
            options,
            boolean,
        });
        self.push_binding(BindingCategory::Where, value);
        self
    }

    /// `column like value`, optionally case sensitive.
    pub fn where_like(
        &mut self,
        column: impl Into<Column>,
        value: impl Into<Value>,
        case_sensitive: bool,
    ) -> &mut Self {
        self.add_where_like(column.into(), value.into(), case_sensitive, Boolean::And, false)
    }

    pub fn or_where_like(
        &mut self,
        column: impl Into<Column>,
        value: impl Into<Value>,
        case_sensitive: bool,
    ) -> &mut Self {
        self.add_where_like(column.into(), value.into(), case_sensitive, Boolean::Or, false)
    }

    pub fn where_not_like(
        &mut self,
        column: impl Into<Column>,
        value: impl Into<Value>,
        case_sensitive: bool,
    ) -> &mut Self {
        self.add_where_like(column.into(), value.into(), case_sensitive, Boolean::And, true)
    }

    pub fn or_where_not_like(
        &mut self,
        column: impl Into<Column>,
        value: impl Into<Value>,
        case_sensitive: bool,
    ) -> &mut Self {
        self.add_where_like(column.into(), value.into(), case_sensitive, Boolean::Or, true)
    }

    fn add_where_like(
        &mut self,
        column: Column,
        value: Value,
        case_sensitive: bool,
        boolean: Boolean,
        not: bool,
    ) -> &mut Self {
        self.wheres.push(Where::Like {
            column,
            value: value.clone(),
            case_sensitive,
            not,
            boolean,
        });
        self.push_binding(BindingCategory::Where, value);
        self
    }

    // ===== all / any / none =====

    /// Every column satisfies `operator value`.
    pub fn where_all<C: Into<Column>>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_where_columns_group(columns, operator, value.into(), Boolean::And, Boolean::And)
    }

    pub fn or_where_all<C: Into<Column>>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_where_columns_group(columns, operator, value.into(), Boolean::Or, Boolean::And)
    }

    /// At least one column satisfies `operator value`.
    pub fn where_any<C: Into<Column>>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_where_columns_group(columns, operator, value.into(), Boolean::And, Boolean::Or)
    }

    pub fn or_where_any<C: Into<Column>>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_where_columns_group(columns, operator, value.into(), Boolean::Or, Boolean::Or)
    }

    /// No column satisfies `operator value`.
    pub fn where_none<C: Into<Column>>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_where_columns_group(columns, operator, value.into(), Boolean::AndNot, Boolean::Or)
    }

    pub fn or_where_none<C: Into<Column>>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_where_columns_group(columns, operator, value.into(), Boolean::OrNot, Boolean::Or)
    }

    fn add_where_columns_group<C: Into<Column>>(
        &mut self,
        columns: impl IntoIterator<Item = C>,
        operator: &str,
        value: Value,
        boolean: Boolean,
        inner: Boolean,
    ) -> QueryResult<&mut Self> {
        self.prepare_value_and_operator(operator, &value)?;
        let mut query = self.for_nested_where();
        for column in columns {
            query.add_where(column.into(), operator, value.clone(), inner)?;
        }
        Ok(self.add_nested_where_query(query, boolean))
    }

    /// Append `wheres` and their where bindings.
    pub fn merge_wheres(&mut self, wheres: Vec<Where>, bindings: Vec<Value>) -> &mut Self {
        self.wheres.extend(wheres);
        self.extend_bindings(BindingCategory::Where, bindings);
        self
    }
}

/// Bring a date-part comparison value into the form the part compares with.
fn normalize_date_part(part: DatePart, value: Value) -> Value {
    match (part, value) {
        (_, value @ Value::Expression(_)) => value,
        (DatePart::Date, Value::DateTime(dt)) => Value::Text(dt.format("%Y-%m-%d").to_string()),
        (DatePart::Date, Value::Timestamp(ts)) => Value::Text(ts.format("%Y-%m-%d").to_string()),
        (DatePart::Date, Value::Date(d)) => Value::Text(d.format("%Y-%m-%d").to_string()),
        (DatePart::Time, Value::DateTime(dt)) => Value::Text(dt.format("%H:%M:%S").to_string()),
        (DatePart::Time, Value::Timestamp(ts)) => Value::Text(ts.format("%H:%M:%S").to_string()),
        (DatePart::Time, Value::Time(t)) => Value::Text(t.format("%H:%M:%S").to_string()),
        (DatePart::Day, value) => pad_two_digits(value, "%d"),
        (DatePart::Month, value) => pad_two_digits(value, "%m"),
        (DatePart::Year, Value::DateTime(dt)) => Value::Text(dt.format("%Y").to_string()),
        (DatePart::Year, Value::Timestamp(ts)) => Value::Text(ts.format("%Y").to_string()),
        (DatePart::Year, Value::Date(d)) => Value::Text(d.format("%Y").to_string()),
        (_, value) => value,
    }
}

fn pad_two_digits(value: Value, format: &str) -> Value {
    let number = match &value {
        Value::Date(d) => d.format(format).to_string().parse::<i64>().ok(),
        Value::DateTime(dt) => dt.format(format).to_string().parse::<i64>().ok(),
        Value::Timestamp(ts) => ts.format(format).to_string().parse::<i64>().ok(),
        Value::Int(i) => Some(*i),
        Value::Text(s) => s.trim().parse::<i64>().ok(),
        Value::Enum(inner) => inner.as_i64(),
        _ => None,
    };
    match number {
        Some(n) => Value::Text(format!("{n:02}")),
        None => value,
    }
}
