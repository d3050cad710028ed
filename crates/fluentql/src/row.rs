//! Result rows and row mapping traits

use crate::error::{QueryError, QueryResult};
use crate::value::{FromValue, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One result record: ordered column names with their decoded values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut row = Self::new();
        for (column, value) in pairs {
            row.insert(column, value);
        }
        row
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a column by exact name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Look up a column ignoring ASCII case.
    pub fn get_ignore_case(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .map(|i| &self.values[i])
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// The first column's value.
    pub fn first_value(&self) -> Option<&Value> {
        self.values.first()
    }

    /// Set a column, replacing an existing value in place or appending.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter().position(|c| *c == column) {
            Some(i) => self.values[i] = value,
            None => {
                self.columns.push(column);
                self.values.push(value);
            }
        }
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let i = self.columns.iter().position(|c| c == column)?;
        self.columns.remove(i);
        Some(self.values.remove(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Decode a column into `T`, returning [`QueryError::Decode`] on failure.
    pub fn try_get<T: FromValue>(&self, column: &str) -> QueryResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| QueryError::decode(column, "column not found"))?;
        T::from_value(value).map_err(|message| QueryError::decode(column, message))
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::iter::Zip<std::vec::IntoIter<String>, std::vec::IntoIter<Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter().zip(self.values)
    }
}

/// Serializes as a JSON object in column order.
impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Trait for converting a result row into a Rust struct.
///
/// This trait should typically be derived using `#[derive(FromRow)]`.
///
/// # Example
///
/// ```ignore
/// use fluentql::FromRow;
///
/// #[derive(FromRow)]
/// struct User {
///     id: i64,
///     name: String,
///     email: Option<String>,
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a row into Self
    fn from_row(row: &Row) -> QueryResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> QueryResult<Self> {
        Ok(row.clone())
    }
}
