use super::clause::{Boolean, Where};
use super::wheres::flatten_value;
use super::Builder;
use crate::bindings::{BindingCategory, clean_bindings};
use crate::error::QueryResult;
use crate::value::{Column, Expression, Value};

impl Builder {
    /// `having column operator value`. Unknown operators are taken as the
    /// value, compared with `=`.
    pub fn having(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_having(column.into(), operator, value.into(), Boolean::And)
    }

    pub fn or_having(
        &mut self,
        column: impl Into<Column>,
        operator: &str,
        value: impl Into<Value>,
    ) -> QueryResult<&mut Self> {
        self.add_having(column.into(), operator, value.into(), Boolean::Or)
    }

    /// `having column = value`.
    pub fn having_eq(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.push_having(column.into(), "=".to_string(), value.into(), Boolean::And)
    }

    pub fn or_having_eq(&mut self, column: impl Into<Column>, value: impl Into<Value>) -> &mut Self {
        self.push_having(column.into(), "=".to_string(), value.into(), Boolean::Or)
    }

    fn add_having(
        &mut self,
        column: Column,
        operator: &str,
        value: Value,
        boolean: Boolean,
    ) -> QueryResult<&mut Self> {
        self.prepare_value_and_operator(operator, &value)?;
        if self.invalid_operator(operator) {
            return Ok(self.push_having(column, "=".to_string(), Value::Text(operator.to_string()), boolean));
        }
        Ok(self.push_having(column, operator.to_string(), value, boolean))
    }

    fn push_having(&mut self, column: Column, operator: String, value: Value, boolean: Boolean) -> &mut Self {
        let binding = (!value.is_expression()).then(|| flatten_value(value.clone()));
        let having = if self.is_bitwise_operator(&operator) {
            Where::Bitwise {
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
        self.havings.push(having);
        if let Some(binding) = binding {
            self.push_binding(BindingCategory::Having, binding);
        }
        self
    }

    /// A parenthesised group of having conditions built by `callback`.
    pub fn having_nested<F>(&mut self, callback: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Builder) -> QueryResult<()>,
    {
        self.add_having_nested(callback, Boolean::And)
    }

    pub fn or_having_nested<F>(&mut self, callback: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Builder) -> QueryResult<()>,
    {
        self.add_having_nested(callback, Boolean::Or)
    }

    fn add_having_nested<F>(&mut self, callback: F, boolean: Boolean) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Builder) -> QueryResult<()>,
    {
        let mut query = self.for_nested_where();
        callback(&mut query)?;
        if query.havings.is_empty() {
            return Ok(self);
        }
        let bindings = query.get_raw_bindings().get(BindingCategory::Having).to_vec();
        self.havings.push(Where::Nested {
            query: Box::new(query),
            boolean,
        });
        self.extend_bindings(BindingCategory::Having, bindings);
        Ok(self)
    }

    pub fn having_null(&mut self, column: impl Into<Column>) -> &mut Self {
        self.add_having_null(column.into(), Boolean::And, false)
    }

    pub fn or_having_null(&mut self, column: impl Into<Column>) -> &mut Self {
        self.add_having_null(column.into(), Boolean::Or, false)
    }

    pub fn having_not_null(&mut self, column: impl Into<Column>) -> &mut Self {
        self.add_having_null(column.into(), Boolean::And, true)
    }

    pub fn or_having_not_null(&mut self, column: impl Into<Column>) -> &mut Self {
        self.add_having_null(column.into(), Boolean::Or, true)
    }

    fn add_having_null(&mut self, column: Column, boolean: Boolean, not: bool) -> &mut Self {
        self.havings.push(Where::Null {
            column,
            not,
            boolean,
        });
        self
    }

    /// `having column between min and max`.
    pub fn having_between<V: Into<Value>>(&mut self, column: impl Into<Column>, values: [V; 2]) -> &mut Self {
        self.add_having_between(column.into(), values, Boolean::And, false)
    }

    pub fn or_having_between<V: Into<Value>>(&mut self, column: impl Into<Column>, values: [V; 2]) -> &mut Self {
        self.add_having_between(column.into(), values, Boolean::Or, false)
    }

    pub fn having_not_between<V: Into<Value>>(&mut self, column: impl Into<Column>, values: [V; 2]) -> &mut Self {
        self.add_having_between(column.into(), values, Boolean::And, true)
    }

    pub fn or_having_not_between<V: Into<Value>>(
        &mut self,
        column: impl Into<Column>,
        values: [V; 2],
    ) -> &mut Self {
        self.add_having_between(column.into(), values, Boolean::Or, true)
    }

    fn add_having_between<V: Into<Value>>(
        &mut self,
        column: Column,
        values: [V; 2],
        boolean: Boolean,
        not: bool,
    ) -> &mut Self {
        let values = values.map(|value| flatten_value(value.into()));
        let bindings = clean_bindings(values.iter().cloned());
        self.havings.push(Where::Between {
            column,
            values,
            not,
            boolean,
        });
        self.extend_bindings(BindingCategory::Having, bindings);
        self
    }

    /// Raw having SQL with its own bindings.
    pub fn having_raw(&mut self, sql: impl Into<String>, bindings: impl IntoIterator<Item = Value>) -> &mut Self {
        self.havings.push(Where::Raw {
            sql: sql.into(),
            boolean: Boolean::And,
        });
        self.extend_bindings(BindingCategory::Having, bindings);
        self
    }

    pub fn or_having_raw(&mut self, sql: impl Into<String>, bindings: impl IntoIterator<Item = Value>) -> &mut Self {
        self.havings.push(Where::Raw {
            sql: sql.into(),
            boolean: Boolean::Or,
        });
        self.extend_bindings(BindingCategory::Having, bindings);
        self
    }

    pub fn having_expression(&mut self, condition: Expression) -> &mut Self {
        self.havings.push(Where::Expression {
            expression: condition,
            boolean: Boolean::And,
        });
        self
    }

    pub fn or_having_expression(&mut self, condition: Expression) -> &mut Self {
        self.havings.push(Where::Expression {
            expression: condition,
            boolean: Boolean::Or,
        });
        self
    }
}
