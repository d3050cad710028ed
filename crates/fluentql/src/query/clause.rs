//! Clause tree node types.

use super::Builder;
use crate::error::QueryError;
use crate::value::{Column, Expression, Value};
use std::fmt;
use std::str::FromStr;

/// Connector placed before a where/having entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boolean {
    And,
    Or,
    AndNot,
    OrNot,
}

impl Boolean {
    pub fn as_str(self) -> &'static str {
        match self {
            Boolean::And => "and",
            Boolean::Or => "or",
            Boolean::AndNot => "and not",
            Boolean::OrNot => "or not",
        }
    }

    /// The negated connector (`and` → `and not`).
    pub fn not(self) -> Self {
        match self {
            Boolean::And | Boolean::AndNot => Boolean::AndNot,
            Boolean::Or | Boolean::OrNot => Boolean::OrNot,
        }
    }
}

impl fmt::Display for Boolean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Date part a date-based where compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Date,
    Time,
    Day,
    Month,
    Year,
}

impl DatePart {
    pub fn as_str(self) -> &'static str {
        match self {
            DatePart::Date => "date",
            DatePart::Time => "time",
            DatePart::Day => "day",
            DatePart::Month => "month",
            DatePart::Year => "year",
        }
    }
}

/// Full text search options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FulltextOptions {
    pub language: Option<String>,
    /// `plain` (default), `phrase` or `websearch`.
    pub mode: Option<String>,
}

impl FulltextOptions {
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }
}

/// One where (or having) entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    Basic {
        column: Column,
        operator: String,
        value: Value,
        boolean: Boolean,
    },
    Bitwise {
        column: Column,
        operator: String,
        value: Value,
        boolean: Boolean,
    },
    JsonBoolean {
        column: Column,
        operator: String,
        value: Value,
        boolean: Boolean,
    },
    Column {
        first: Column,
        operator: String,
        second: Column,
        boolean: Boolean,
    },
    In {
        column: Column,
        values: Vec<Value>,
        not: bool,
        boolean: Boolean,
    },
    InRaw {
        column: Column,
        values: Vec<i64>,
        not: bool,
        boolean: Boolean,
    },
    Null {
        column: Column,
        not: bool,
        boolean: Boolean,
    },
    Between {
        column: Column,
        values: [Value; 2],
        not: bool,
        boolean: Boolean,
    },
    BetweenColumns {
        column: Column,
        values: [Column; 2],
        not: bool,
        boolean: Boolean,
    },
    ValueBetween {
        value: Value,
        columns: [Column; 2],
        not: bool,
        boolean: Boolean,
    },
    RowValues {
        columns: Vec<Column>,
        operator: String,
        values: Vec<Value>,
        boolean: Boolean,
    },
    Sub {
        column: Column,
        operator: String,
        query: Box<Builder>,
        boolean: Boolean,
    },
    Exists {
        query: Box<Builder>,
        not: bool,
        boolean: Boolean,
    },
    JsonContains {
        column: String,
        value: Value,
        not: bool,
        boolean: Boolean,
    },
    JsonOverlaps {
        column: String,
        value: Value,
        not: bool,
        boolean: Boolean,
    },
    JsonContainsKey {
        column: String,
        not: bool,
        boolean: Boolean,
    },
    JsonLength {
        column: String,
        operator: String,
        value: Value,
        boolean: Boolean,
    },
    Fulltext {
        columns: Vec<Column>,
        value: Value,
        options: FulltextOptions,
        boolean: Boolean,
    },
    Like {
        column: Column,
        value: Value,
        case_sensitive: bool,
        not: bool,
        boolean: Boolean,
    },
    Nested {
        query: Box<Builder>,
        boolean: Boolean,
    },
    Raw {
        sql: String,
        boolean: Boolean,
    },
    Expression {
        expression: Expression,
        boolean: Boolean,
    },
    Date {
        part: DatePart,
        column: Column,
        operator: String,
        value: Value,
        boolean: Boolean,
    },
}

impl Where {
    pub fn boolean(&self) -> Boolean {
        match self {
            Where::Basic { boolean, .. }
            | Where::Bitwise { boolean, .. }
            | Where::JsonBoolean { boolean, .. }
            | Where::Column { boolean, .. }
            | Where::In { boolean, .. }
            | Where::InRaw { boolean, .. }
            | Where::Null { boolean, .. }
            | Where::Between { boolean, .. }
            | Where::BetweenColumns { boolean, .. }
            | Where::ValueBetween { boolean, .. }
            | Where::RowValues { boolean, .. }
            | Where::Sub { boolean, .. }
            | Where::Exists { boolean, .. }
            | Where::JsonContains { boolean, .. }
            | Where::JsonOverlaps { boolean, .. }
            | Where::JsonContainsKey { boolean, .. }
            | Where::JsonLength { boolean, .. }
            | Where::Fulltext { boolean, .. }
            | Where::Like { boolean, .. }
            | Where::Nested { boolean, .. }
            | Where::Raw { boolean, .. }
            | Where::Expression { boolean, .. }
            | Where::Date { boolean, .. } => *boolean,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

impl FromStr for Direction {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            _ => Err(QueryError::InvalidOrderDirection(s.to_string())),
        }
    }
}

/// An order-by entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    Column { column: Column, direction: Direction },
    Raw { sql: String },
}

impl Order {
    pub fn column(&self) -> Option<&Column> {
        match self {
            Order::Column { column, .. } => Some(column),
            Order::Raw { .. } => None,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Order::Column { direction, .. } => Some(*direction),
            Order::Raw { .. } => None,
        }
    }
}

/// A union member.
#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    pub query: Box<Builder>,
    pub all: bool,
}

/// Aggregate function and its columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub function: String,
    pub columns: Vec<Column>,
}

/// Row lock mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lock {
    /// `lock_for_update`
    Update,
    /// `shared_lock`
    Shared,
    /// Raw lock clause.
    Raw(String),
}

/// Index hint kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexHintKind {
    Use,
    Force,
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHint {
    pub kind: IndexHintKind,
    pub index: String,
}

/// Per-group row limit, compiled with a `row_number()` window.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupLimit {
    pub value: u64,
    pub column: Column,
}

/// `distinct` state.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Distinct {
    #[default]
    None,
    All,
    On(Vec<Column>),
}

impl Distinct {
    pub fn is_distinct(&self) -> bool {
        !matches!(self, Distinct::None)
    }
}

/// Builder state a derived query can drop with `clone_without`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Aggregate,
    Columns,
    Distinct,
    From,
    IndexHint,
    Joins,
    Wheres,
    Groups,
    Havings,
    Orders,
    Limit,
    GroupLimit,
    Offset,
    Unions,
    UnionLimit,
    UnionOffset,
    UnionOrders,
    Lock,
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinType {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Right => "right",
            JoinType::Cross => "cross",
        }
    }
}

/// A column assignment for `upsert`: either copy the incoming value
/// (`col = excluded.col`) or set an explicit value.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertUpdate {
    Column(String),
    Value(String, Value),
}

impl From<&str> for UpsertUpdate {
    fn from(value: &str) -> Self {
        UpsertUpdate::Column(value.to_string())
    }
}

impl From<String> for UpsertUpdate {
    fn from(value: String) -> Self {
        UpsertUpdate::Column(value)
    }
}

impl<V: Into<Value>> From<(&str, V)> for UpsertUpdate {
    fn from((column, value): (&str, V)) -> Self {
        UpsertUpdate::Value(column.to_string(), value.into())
    }
}
