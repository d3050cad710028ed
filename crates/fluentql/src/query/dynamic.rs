use super::clause::Boolean;
use super::Builder;
use crate::error::{QueryError, QueryResult};
use crate::value::{Column, Value};
use heck::ToSnakeCase;

/// Split `FirstNameAndLastNameOr...` into segments and the connector that
/// precedes each one. A connector only counts when followed by an uppercase
/// letter, so `Orders` or `Android` stay whole.
fn split_segments(finder: &str) -> Vec<(Boolean, String)> {
    let mut segments = Vec::new();
    let mut connector = Boolean::And;
    let mut current = String::new();
    let mut rest = finder;

    while !rest.is_empty() {
        let split = [("And", Boolean::And), ("Or", Boolean::Or)]
            .into_iter()
            .find(|(token, _)| {
                !current.is_empty()
                    && rest.starts_with(token)
                    && rest[token.len()..]
                        .chars()
                        .next()
                        .is_some_and(|c| c.is_ascii_uppercase())
            });
        match split {
            Some((token, next)) => {
                segments.push((connector, std::mem::take(&mut current)));
                connector = next;
                rest = &rest[token.len()..];
            }
            None => {
                let mut chars = rest.chars();
                if let Some(c) = chars.next() {
                    current.push(c);
                }
                rest = chars.as_str();
            }
        }
    }
    if !current.is_empty() {
        segments.push((connector, current));
    }
    segments
}

impl Builder {
    /// Apply a method name such as `whereFirstNameAndLastName` as equality
    /// wheres, one per segment, consuming `parameters` in order.
    pub fn dynamic_where(&mut self, method: &str, parameters: Vec<Value>) -> QueryResult<&mut Self> {
        let finder = method.strip_prefix("where").unwrap_or(method);
        let segments = split_segments(finder);
        if segments.is_empty() {
            return Err(QueryError::InvalidDynamicWhere(format!(
                "method [{method}] names no columns"
            )));
        }
        if parameters.len() < segments.len() {
            return Err(QueryError::InvalidDynamicWhere(format!(
                "method [{method}] expects {} parameters, got {}",
                segments.len(),
                parameters.len()
            )));
        }

        tracing::trace!(target: "fluentql.query", method, segments = segments.len(), "dynamic where");
        for ((boolean, segment), value) in segments.into_iter().zip(parameters) {
            let column = Column::Name(segment.to_snake_case());
            self.push_where(column, "=".to_string(), value, boolean);
        }
        Ok(self)
    }
}
