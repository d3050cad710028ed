//! Paginated result sets and the opaque cursor used by cursor pagination.

use crate::error::{QueryError, QueryResult};
use crate::row::{FromRow, Row};
use crate::value::Value;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;

/// Page size used when a caller asks for zero rows per page.
pub const DEFAULT_PER_PAGE: u64 = 15;

const POINTS_TO_NEXT_ITEMS: &str = "_pointsToNextItems";

/// One page of results together with the total row count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LengthAwarePaginator<T = Row> {
    pub items: Vec<T>,
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
}

impl<T> LengthAwarePaginator<T> {
    pub fn new(items: Vec<T>, total: u64, per_page: u64, current_page: u64) -> Self {
        let per_page = per_page.max(1);
        Self {
            items,
            total,
            per_page,
            current_page: current_page.max(1),
            last_page: total.div_ceil(per_page).max(1),
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }

    pub fn on_first_page(&self) -> bool {
        self.current_page <= 1
    }

    /// 1-based position of the first item on this page.
    pub fn first_item(&self) -> Option<u64> {
        (!self.items.is_empty()).then(|| (self.current_page - 1) * self.per_page + 1)
    }

    pub fn last_item(&self) -> Option<u64> {
        self.first_item()
            .map(|first| first + self.items.len() as u64 - 1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> LengthAwarePaginator<U> {
        LengthAwarePaginator {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            last_page: self.last_page,
        }
    }
}

impl LengthAwarePaginator<Row> {
    /// Decode every item into `T`.
    pub fn into_as<T: FromRow>(self) -> QueryResult<LengthAwarePaginator<T>> {
        let items = self.items.iter().map(T::from_row).collect::<QueryResult<Vec<_>>>()?;
        Ok(LengthAwarePaginator {
            items,
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            last_page: self.last_page,
        })
    }
}

/// One page of results without a total; fetches one extra row to learn
/// whether another page follows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginator<T = Row> {
    pub items: Vec<T>,
    pub per_page: u64,
    pub current_page: u64,
    pub has_more: bool,
}

impl<T> Paginator<T> {
    /// Trim `items` (fetched with `per_page + 1`) to the page.
    pub fn new(mut items: Vec<T>, per_page: u64, current_page: u64) -> Self {
        let per_page = per_page.max(1);
        let has_more = items.len() as u64 > per_page;
        items.truncate(per_page as usize);
        Self {
            items,
            per_page,
            current_page: current_page.max(1),
            has_more,
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.has_more
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginator<U> {
        Paginator {
            items: self.items.into_iter().map(f).collect(),
            per_page: self.per_page,
            current_page: self.current_page,
            has_more: self.has_more,
        }
    }
}

/// Position in an ordered result: the values of the ordered columns on one
/// row, and which side of that row to read.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    parameters: Vec<(String, Value)>,
    points_to_next_items: bool,
}

impl Cursor {
    pub fn new(parameters: Vec<(String, Value)>, points_to_next_items: bool) -> Self {
        Self {
            parameters,
            points_to_next_items,
        }
    }

    pub fn parameters(&self) -> &[(String, Value)] {
        &self.parameters
    }

    /// The value recorded for `name`, or [`QueryError::MissingCursorParameter`].
    pub fn parameter(&self, name: &str) -> QueryResult<Value> {
        self.parameters
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| QueryError::MissingCursorParameter(name.to_string()))
    }

    pub fn points_to_next_items(&self) -> bool {
        self.points_to_next_items
    }

    pub fn points_to_previous_items(&self) -> bool {
        !self.points_to_next_items
    }

    /// URL-safe base64 of a JSON object holding the parameters and the
    /// direction flag.
    pub fn encode(&self) -> String {
        let mut object = serde_json::Map::new();
        for (name, value) in &self.parameters {
            object.insert(name.clone(), value.to_json());
        }
        object.insert(
            POINTS_TO_NEXT_ITEMS.to_string(),
            serde_json::Value::Bool(self.points_to_next_items),
        );
        URL_SAFE_NO_PAD.encode(serde_json::Value::Object(object).to_string())
    }

    /// Parse a string produced by [`encode`](Self::encode).
    pub fn decode(encoded: &str) -> QueryResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| QueryError::InvalidCursor(e.to_string()))?;
        let json: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| QueryError::InvalidCursor(e.to_string()))?;
        let serde_json::Value::Object(object) = json else {
            return Err(QueryError::InvalidCursor("expected a JSON object".to_string()));
        };

        let mut points_to_next_items = None;
        let mut parameters = Vec::with_capacity(object.len());
        for (name, value) in object {
            if name == POINTS_TO_NEXT_ITEMS {
                points_to_next_items = value.as_bool();
            } else {
                parameters.push((name, Value::from_json(value)));
            }
        }
        let points_to_next_items = points_to_next_items.ok_or_else(|| {
            QueryError::InvalidCursor(format!("missing {POINTS_TO_NEXT_ITEMS} flag"))
        })?;
        Ok(Self::new(parameters, points_to_next_items))
    }
}

/// One page of a cursor-paginated result.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorPaginator {
    pub items: Vec<Row>,
    pub per_page: u64,
    pub cursor: Option<Cursor>,
    has_more: bool,
    parameters: Vec<String>,
}

impl CursorPaginator {
    /// Build the page from `items` fetched with `per_page + 1`. Items read
    /// backwards (a cursor pointing to previous items) are put back in order.
    pub fn new(mut items: Vec<Row>, per_page: u64, cursor: Option<Cursor>, parameters: Vec<String>) -> Self {
        let per_page = per_page.max(1);
        let has_more = items.len() as u64 > per_page;
        items.truncate(per_page as usize);
        if cursor.as_ref().is_some_and(Cursor::points_to_previous_items) {
            items.reverse();
        }
        Self {
            items,
            per_page,
            cursor,
            has_more,
            parameters,
        }
    }

    pub fn has_more_pages(&self) -> bool {
        match &self.cursor {
            None => self.has_more,
            Some(cursor) if cursor.points_to_next_items() => self.has_more,
            Some(_) => true,
        }
    }

    pub fn on_first_page(&self) -> bool {
        match &self.cursor {
            None => true,
            Some(cursor) => cursor.points_to_previous_items() && !self.has_more,
        }
    }

    /// Cursor for the page after this one, if there is one.
    pub fn next_cursor(&self) -> QueryResult<Option<Cursor>> {
        let at_end = match &self.cursor {
            None => !self.has_more,
            Some(cursor) => cursor.points_to_next_items() && !self.has_more,
        };
        match self.items.last() {
            Some(item) if !at_end => self.cursor_for_item(item, true).map(Some),
            _ => Ok(None),
        }
    }

    /// Cursor for the page before this one, if there is one.
    pub fn previous_cursor(&self) -> QueryResult<Option<Cursor>> {
        let at_start = match &self.cursor {
            None => true,
            Some(cursor) => cursor.points_to_previous_items() && !self.has_more,
        };
        match self.items.first() {
            Some(item) if !at_start => self.cursor_for_item(item, false).map(Some),
            _ => Ok(None),
        }
    }

    /// A cursor positioned on `item`.
    pub fn cursor_for_item(&self, item: &Row, points_to_next_items: bool) -> QueryResult<Cursor> {
        Ok(Cursor::new(self.parameters_for_item(item)?, points_to_next_items))
    }

    fn parameters_for_item(&self, item: &Row) -> QueryResult<Vec<(String, Value)>> {
        self.parameters
            .iter()
            .filter(|name| !name.is_empty())
            .map(|name| {
                let unqualified = name.rsplit('.').next().unwrap_or(name);
                item.get(name)
                    .or_else(|| item.get(unqualified))
                    .map(|value| (name.clone(), value.clone()))
                    .ok_or_else(|| QueryError::MissingCursorParameter(name.clone()))
            })
            .collect()
    }
}
