//! Per-clause parameter storage.
//!
//! Bindings are kept in one list per clause category. Flattening walks the
//! categories in the fixed order the compiled SQL emits placeholders, so the
//! n-th `?` always lines up with the n-th flattened value.

use crate::error::{QueryError, QueryResult};
use crate::value::Value;
use std::fmt;
use std::str::FromStr;

/// Clause categories, in placeholder order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingCategory {
    Select,
    From,
    Join,
    Where,
    GroupBy,
    Having,
    Order,
    Union,
    UnionOrder,
}

impl BindingCategory {
    pub const ALL: [BindingCategory; 9] = [
        BindingCategory::Select,
        BindingCategory::From,
        BindingCategory::Join,
        BindingCategory::Where,
        BindingCategory::GroupBy,
        BindingCategory::Having,
        BindingCategory::Order,
        BindingCategory::Union,
        BindingCategory::UnionOrder,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BindingCategory::Select => "select",
            BindingCategory::From => "from",
            BindingCategory::Join => "join",
            BindingCategory::Where => "where",
            BindingCategory::GroupBy => "groupBy",
            BindingCategory::Having => "having",
            BindingCategory::Order => "order",
            BindingCategory::Union => "union",
            BindingCategory::UnionOrder => "unionOrder",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for BindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BindingCategory {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BindingCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| QueryError::InvalidBindingCategory(s.to_string()))
    }
}

/// Anything that names a binding category: the enum itself, or its string name.
pub trait AsBindingCategory {
    fn binding_category(&self) -> QueryResult<BindingCategory>;
}

impl AsBindingCategory for BindingCategory {
    fn binding_category(&self) -> QueryResult<BindingCategory> {
        Ok(*self)
    }
}

impl AsBindingCategory for &str {
    fn binding_category(&self) -> QueryResult<BindingCategory> {
        self.parse()
    }
}

/// Cast a binding to the scalar the driver receives: backed enum cases become
/// their backing value.
pub fn cast_binding(value: Value) -> Value {
    match value {
        Value::Enum(inner) => cast_binding(*inner),
        other => other,
    }
}

/// Drop raw expressions and cast what remains.
pub fn clean_bindings(values: impl IntoIterator<Item = Value>) -> Vec<Value> {
    values
        .into_iter()
        .filter(|v| !v.is_expression())
        .map(cast_binding)
        .collect()
}

/// Binding lists for every clause category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    lists: [Vec<Value>; 9],
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single value after casting it.
    pub fn push(&mut self, category: BindingCategory, value: Value) {
        self.lists[category.index()].push(cast_binding(value));
    }

    /// Merge a list into the category, then recast the whole category.
    ///
    /// Values placed earlier with [`Bindings::set`] are uncast until the next
    /// merge touches their category.
    pub fn extend(&mut self, category: BindingCategory, values: impl IntoIterator<Item = Value>) {
        let list = &mut self.lists[category.index()];
        list.extend(values);
        let merged = std::mem::take(list);
        *list = merged.into_iter().map(cast_binding).collect();
    }

    /// Replace a category verbatim.
    pub fn set(&mut self, category: BindingCategory, values: Vec<Value>) {
        self.lists[category.index()] = values;
    }

    pub fn get(&self, category: BindingCategory) -> &[Value] {
        &self.lists[category.index()]
    }

    pub fn clear(&mut self, category: BindingCategory) {
        self.lists[category.index()].clear();
    }

    /// Append every category of `other` to the matching category here.
    pub fn merge(&mut self, other: &Bindings) {
        for (mine, theirs) in self.lists.iter_mut().zip(other.lists.iter()) {
            mine.extend(theirs.iter().cloned());
        }
    }

    /// All values in placeholder order.
    pub fn flatten(&self) -> Vec<Value> {
        self.lists.iter().flatten().cloned().collect()
    }

    /// All values in placeholder order, skipping the given categories.
    pub fn flatten_except(&self, except: &[BindingCategory]) -> Vec<Value> {
        BindingCategory::ALL
            .into_iter()
            .filter(|c| !except.contains(c))
            .flat_map(|c| self.get(c).iter().cloned())
            .collect()
    }

    /// Iterate `(category, values)` pairs in placeholder order.
    pub fn iter(&self) -> impl Iterator<Item = (BindingCategory, &[Value])> {
        BindingCategory::ALL
            .into_iter()
            .map(move |c| (c, self.get(c)))
    }

    pub fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backed(v: &str) -> Value {
        Value::Enum(Box::new(Value::Text(v.to_string())))
    }

    #[test]
    fn flatten_follows_category_order() {
        let mut b = Bindings::new();
        b.push(BindingCategory::Order, Value::Int(6));
        b.push(BindingCategory::Where, Value::Int(3));
        b.push(BindingCategory::Select, Value::Int(0));
        b.push(BindingCategory::Join, Value::Int(2));
        b.push(BindingCategory::UnionOrder, Value::Int(8));

        let flat = b.flatten();
        assert_eq!(
            flat,
            vec![
                Value::Int(0),
                Value::Int(2),
                Value::Int(3),
                Value::Int(6),
                Value::Int(8)
            ]
        );
        // Flattening is read-only.
        assert_eq!(b.flatten(), flat);
    }

    #[test]
    fn push_casts_backed_enums() {
        let mut b = Bindings::new();
        b.push(BindingCategory::Where, backed("active"));
        assert_eq!(b.get(BindingCategory::Where), [Value::Text("active".into())]);
    }

    #[test]
    fn extend_recasts_previously_set_values() {
        let mut b = Bindings::new();
        b.set(BindingCategory::Where, vec![backed("draft")]);
        assert_eq!(b.get(BindingCategory::Where), [backed("draft")]);

        b.extend(BindingCategory::Where, [backed("published")]);
        assert_eq!(
            b.get(BindingCategory::Where),
            [Value::Text("draft".into()), Value::Text("published".into())]
        );
    }

    #[test]
    fn flatten_except_skips_categories() {
        let mut b = Bindings::new();
        b.push(BindingCategory::Select, Value::Int(1));
        b.push(BindingCategory::Where, Value::Int(2));
        b.push(BindingCategory::Order, Value::Int(3));
        assert_eq!(
            b.flatten_except(&[BindingCategory::Select, BindingCategory::Order]),
            vec![Value::Int(2)]
        );
    }

    #[test]
    fn clean_bindings_drops_expressions() {
        let cleaned = clean_bindings([
            Value::Int(1),
            Value::Expression(crate::value::Expression::new("now()")),
            backed("x"),
        ]);
        assert_eq!(cleaned, vec![Value::Int(1), Value::Text("x".into())]);
    }

    #[test]
    fn category_names_parse() {
        assert_eq!("groupBy".parse::<BindingCategory>().unwrap(), BindingCategory::GroupBy);
        assert!(matches!(
            "bogus".parse::<BindingCategory>(),
            Err(QueryError::InvalidBindingCategory(name)) if name == "bogus"
        ));
    }
}
