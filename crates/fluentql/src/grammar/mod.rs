//! SQL compilation.
//!
//! [`Grammar`] turns a [`Builder`]'s clause tree into SQL text with `?`
//! placeholders. Every method has a default implementation that speaks plain
//! ANSI SQL; dialects override what differs.

mod postgres;
mod standard;

pub use postgres::PostgresGrammar;
pub use standard::StandardGrammar;

use crate::bindings::{BindingCategory, Bindings};
use crate::error::{QueryError, QueryResult};
use crate::query::{
    Aggregate, Builder, DatePart, Distinct, FulltextOptions, GroupLimit, IndexHint,
    IndexHintKind, JoinClause, Lock, Order, Union, UpsertUpdate, Where,
};
use crate::value::{Column, Expression, Value};
use regex::Regex;
use std::sync::OnceLock;

/// Grammar settings shared by every dialect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrammarConfig {
    /// Prefix prepended to every wrapped table name.
    pub table_prefix: String,
    /// Extra operators the builder accepts as-is.
    pub custom_operators: Vec<String>,
    /// Whether `truncate` cascades to dependent tables.
    pub cascade_truncate: bool,
}

impl GrammarConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn with_custom_operators<I, S>(mut self, operators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_operators
            .extend(operators.into_iter().map(|op| op.into().to_lowercase()));
        self
    }

    pub fn with_cascade_truncate(mut self, cascade: bool) -> Self {
        self.cascade_truncate = cascade;
        self
    }
}

/// Compiled select clauses, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectComponents {
    pub aggregate: Option<String>,
    pub columns: Option<String>,
    pub from: Option<String>,
    pub index_hint: Option<String>,
    pub joins: Option<String>,
    pub wheres: Option<String>,
    pub groups: Option<String>,
    pub havings: Option<String>,
    pub orders: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub lock: Option<String>,
}

impl SelectComponents {
    /// Join the non-empty components with single spaces.
    pub fn concatenate(&self) -> String {
        [
            &self.aggregate,
            &self.columns,
            &self.from,
            &self.index_hint,
            &self.joins,
            &self.wheres,
            &self.groups,
            &self.havings,
            &self.orders,
            &self.limit,
            &self.offset,
            &self.lock,
        ]
        .into_iter()
        .flatten()
        .filter(|segment| !segment.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
    }
}

fn alias_regex() -> &'static Regex {
    static ALIAS_RE: OnceLock<Regex> = OnceLock::new();
    ALIAS_RE.get_or_init(|| Regex::new(r"(?i)\s+as\s+").expect("invalid built-in alias regex"))
}

fn json_array_keys_regex() -> &'static Regex {
    static KEYS_RE: OnceLock<Regex> = OnceLock::new();
    KEYS_RE.get_or_init(|| {
        Regex::new(r"(\[[^\]]+\])+$").expect("invalid built-in json path regex")
    })
}

fn json_array_key_regex() -> &'static Regex {
    static KEY_RE: OnceLock<Regex> = OnceLock::new();
    KEY_RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]").expect("invalid built-in json key regex"))
}

/// Whether `value` carries an ` as ` alias.
pub fn is_aliased(value: &str) -> bool {
    value.to_ascii_lowercase().contains(" as ")
}

/// Split `"expr as alias"` into its two halves.
pub fn split_alias(value: &str) -> Option<(&str, &str)> {
    let found = alias_regex().find(value)?;
    let alias = &value[found.end()..];
    let alias = match alias_regex().find(alias) {
        Some(next) => &alias[..next.start()],
        None => alias,
    };
    Some((&value[..found.start()], alias))
}

/// Strip the connector of the first clause (`and `/`or `).
pub fn remove_leading_boolean(value: &str) -> String {
    let lower = value.to_ascii_lowercase();
    let hit = [("and ", lower.find("and ")), ("or ", lower.find("or "))]
        .into_iter()
        .filter_map(|(token, pos)| pos.map(|p| (p, token.len())))
        .min_by_key(|(p, _)| *p);
    match hit {
        Some((pos, len)) => format!("{}{}", &value[..pos], &value[pos + len..]),
        None => value.to_string(),
    }
}

/// Split a JSON path attribute such as `items[0][1]` into `items`, `0`, `1`.
pub fn parse_json_path_array_keys(attribute: &str) -> Vec<String> {
    if let Some(found) = json_array_keys_regex().find(attribute) {
        let key = &attribute[..found.start()];
        let mut parts = vec![key.to_string()];
        parts.extend(
            json_array_key_regex()
                .captures_iter(found.as_str())
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string())),
        );
        parts.retain(|part| !part.is_empty());
        return parts;
    }
    vec![attribute.to_string()]
}

/// An operator as it appears in compiled SQL. `?` is doubled so placeholder
/// numbering keeps it literal.
pub fn escape_operator(operator: &str) -> String {
    operator.replace('?', "??")
}

/// Integer test matching how JSON path indices are recognised: an optional
/// sign followed by digits without leading zeros.
pub fn is_integer_literal(value: &str) -> bool {
    let digits = value
        .strip_prefix('-')
        .or_else(|| value.strip_prefix('+'))
        .unwrap_or(value);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'))
}

pub(crate) fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build an operator list from a dialect's base operators plus custom ones.
pub(crate) fn operator_list(base: &[&str], config: &GrammarConfig) -> Vec<String> {
    let mut operators: Vec<String> = base.iter().map(|op| op.to_string()).collect();
    for op in &config.custom_operators {
        if !operators.contains(op) {
            operators.push(op.clone());
        }
    }
    operators
}

/// Compiles builder state into SQL.
///
/// Implementations must be cheap to share (`Arc<dyn Grammar>`); all state is
/// read-only configuration.
pub trait Grammar: Send + Sync {
    fn config(&self) -> &GrammarConfig;

    /// Operators this dialect accepts in addition to the builder's own list.
    fn operators(&self) -> &[String];

    /// Operators this dialect compiles as bitwise comparisons.
    fn bitwise_operators(&self) -> &[String];

    // ===== select =====

    fn compile_select(&self, query: &Builder) -> QueryResult<String> {
        if (!query.unions.is_empty() || !query.havings.is_empty()) && query.aggregate.is_some() {
            return self.compile_union_aggregate(query);
        }
        if let Some(group_limit) = &query.group_limit {
            return self.compile_group_limit(query, group_limit);
        }

        let mut sql = self.compile_components(query)?.concatenate();
        if !query.unions.is_empty() {
            sql = format!("{} {}", self.wrap_union(&sql), self.compile_unions(query)?);
        }
        Ok(sql.trim().to_string())
    }

    fn compile_components(&self, query: &Builder) -> QueryResult<SelectComponents> {
        let from = query.from.as_ref().ok_or(QueryError::MissingFrom)?;
        let star = [Column::Name("*".to_string())];
        let columns = query.columns.as_deref().unwrap_or(&star);

        Ok(SelectComponents {
            aggregate: query
                .aggregate
                .as_ref()
                .map(|aggregate| self.compile_aggregate(query, aggregate)),
            columns: self.compile_columns(query, columns),
            from: Some(self.compile_from(query, from)),
            index_hint: query
                .index_hint
                .as_ref()
                .map(|hint| self.compile_index_hint(query, hint)),
            joins: Some(self.compile_joins(query, &query.joins)?),
            wheres: Some(self.compile_wheres(query)?),
            groups: (!query.groups.is_empty()).then(|| self.compile_groups(query, &query.groups)),
            havings: if query.havings.is_empty() {
                None
            } else {
                Some(self.compile_havings(query)?)
            },
            orders: Some(self.compile_orders(query, &query.orders)),
            limit: query.limit.map(|limit| self.compile_limit(query, limit)),
            offset: query.offset.map(|offset| self.compile_offset(query, offset)),
            lock: query.lock.as_ref().map(|lock| self.compile_lock(query, lock)),
        })
    }

    fn compile_aggregate(&self, query: &Builder, aggregate: &Aggregate) -> String {
        let mut column = self.columnize(&aggregate.columns);
        match &query.distinct {
            Distinct::On(columns) => column = format!("distinct {}", self.columnize(columns)),
            Distinct::All if column != "*" => column = format!("distinct {column}"),
            _ => {}
        }
        format!("select {}({}) as aggregate", aggregate.function, column)
    }

    fn compile_columns(&self, query: &Builder, columns: &[Column]) -> Option<String> {
        if query.aggregate.is_some() {
            return None;
        }
        let select = if query.distinct.is_distinct() {
            "select distinct "
        } else {
            "select "
        };
        Some(format!("{select}{}", self.columnize(columns)))
    }

    fn compile_from(&self, query: &Builder, table: &Column) -> String {
        let _ = query;
        format!("from {}", self.wrap_table(table))
    }

    fn compile_index_hint(&self, query: &Builder, hint: &IndexHint) -> String {
        let _ = query;
        match hint.kind {
            IndexHintKind::Use => format!("use index ({})", hint.index),
            IndexHintKind::Force => format!("force index ({})", hint.index),
            IndexHintKind::Ignore => format!("ignore index ({})", hint.index),
        }
    }

    fn compile_joins(&self, query: &Builder, joins: &[JoinClause]) -> QueryResult<String> {
        let mut compiled = Vec::with_capacity(joins.len());
        for join in joins {
            let table = self.wrap_table(&join.table);
            let table_and_nested = if join.joins.is_empty() {
                table
            } else {
                format!("({table} {})", self.compile_joins(query, &join.joins)?)
            };

            if join.lateral {
                compiled.push(self.compile_join_lateral(join, &table_and_nested)?);
                continue;
            }

            let constraints = self.compile_where_clauses(join, "on")?;
            compiled.push(
                format!("{} join {} {}", join.kind.as_str(), table_and_nested, constraints)
                    .trim()
                    .to_string(),
            );
        }
        Ok(compiled.join(" "))
    }

    fn compile_join_lateral(&self, join: &JoinClause, expression: &str) -> QueryResult<String> {
        let _ = (join, expression);
        Err(QueryError::unsupported("lateral joins"))
    }

    // ===== where =====

    fn compile_wheres(&self, query: &Builder) -> QueryResult<String> {
        self.compile_where_clauses(query, "where")
    }

    /// Compile `query.wheres` behind `conjunction` (`where` or `on`), or an
    /// empty string when there are none.
    fn compile_where_clauses(&self, query: &Builder, conjunction: &str) -> QueryResult<String> {
        Ok(match self.compile_where_body(query)? {
            Some(body) => format!("{conjunction} {body}"),
            None => String::new(),
        })
    }

    /// The where list without its conjunction and leading connector.
    fn compile_where_body(&self, query: &Builder) -> QueryResult<Option<String>> {
        if query.wheres.is_empty() {
            return Ok(None);
        }
        let mut parts = Vec::with_capacity(query.wheres.len());
        for clause in &query.wheres {
            parts.push(format!(
                "{} {}",
                clause.boolean().as_str(),
                self.compile_where(query, clause)?
            ));
        }
        Ok(Some(remove_leading_boolean(&parts.join(" "))))
    }

    fn compile_where(&self, query: &Builder, clause: &Where) -> QueryResult<String> {
        match clause {
            Where::Basic {
                column,
                operator,
                value,
                ..
            } => self.where_basic(query, column, operator, value),
            Where::Bitwise {
                column,
                operator,
                value,
                ..
            } => self.where_bitwise(query, column, operator, value),
            Where::JsonBoolean {
                column,
                operator,
                value,
                ..
            } => self.where_json_boolean(query, column, operator, value),
            Where::Column {
                first,
                operator,
                second,
                ..
            } => Ok(format!(
                "{} {} {}",
                self.wrap(first),
                escape_operator(operator),
                self.wrap(second)
            )),
            Where::In {
                column, values, not, ..
            } => self.where_in(query, column, values, *not),
            Where::InRaw {
                column, values, not, ..
            } => self.where_in_raw(query, column, values, *not),
            Where::Null { column, not, .. } => self.where_null(query, column, *not),
            Where::Between {
                column, values, not, ..
            } => {
                let between = if *not { "not between" } else { "between" };
                Ok(format!(
                    "{} {between} {} and {}",
                    self.wrap(column),
                    self.parameter(&values[0]),
                    self.parameter(&values[1])
                ))
            }
            Where::BetweenColumns {
                column, values, not, ..
            } => {
                let between = if *not { "not between" } else { "between" };
                Ok(format!(
                    "{} {between} {} and {}",
                    self.wrap(column),
                    self.wrap(&values[0]),
                    self.wrap(&values[1])
                ))
            }
            Where::ValueBetween {
                value, columns, not, ..
            } => {
                let between = if *not { "not between" } else { "between" };
                Ok(format!(
                    "{} {between} {} and {}",
                    self.parameter(value),
                    self.wrap(&columns[0]),
                    self.wrap(&columns[1])
                ))
            }
            Where::RowValues {
                columns,
                operator,
                values,
                ..
            } => Ok(format!(
                "({}) {} ({})",
                self.columnize(columns),
                escape_operator(operator),
                self.parameterize(values)
            )),
            Where::Sub {
                column,
                operator,
                query: sub,
                ..
            } => Ok(format!(
                "{} {} ({})",
                self.wrap(column),
                escape_operator(operator),
                self.compile_select(sub)?
            )),
            Where::Exists { query: sub, not, .. } => {
                let exists = if *not { "not exists" } else { "exists" };
                Ok(format!("{exists} ({})", self.compile_select(sub)?))
            }
            Where::JsonContains {
                column, value, not, ..
            } => {
                let not = if *not { "not " } else { "" };
                Ok(format!(
                    "{not}{}",
                    self.compile_json_contains(column, &self.parameter(value))?
                ))
            }
            Where::JsonOverlaps {
                column, value, not, ..
            } => {
                let not = if *not { "not " } else { "" };
                Ok(format!(
                    "{not}{}",
                    self.compile_json_overlaps(column, &self.parameter(value))?
                ))
            }
            Where::JsonContainsKey { column, not, .. } => {
                let not = if *not { "not " } else { "" };
                Ok(format!("{not}{}", self.compile_json_contains_key(column)?))
            }
            Where::JsonLength {
                column,
                operator,
                value,
                ..
            } => self.compile_json_length(column, operator, &self.parameter(value)),
            Where::Fulltext {
                columns,
                value,
                options,
                ..
            } => self.where_fulltext(query, columns, value, options),
            Where::Like {
                column,
                value,
                case_sensitive,
                not,
                ..
            } => self.where_like(query, column, value, *case_sensitive, *not),
            Where::Nested { query: nested, .. } => Ok(format!(
                "({})",
                self.compile_where_body(nested)?.unwrap_or_default()
            )),
            Where::Raw { sql, .. } => Ok(sql.clone()),
            Where::Expression { expression, .. } => Ok(self.get_value(expression)),
            Where::Date {
                part,
                column,
                operator,
                value,
                ..
            } => self.where_date(query, *part, column, operator, value),
        }
    }

    fn where_basic(
        &self,
        query: &Builder,
        column: &Column,
        operator: &str,
        value: &Value,
    ) -> QueryResult<String> {
        let _ = query;
        Ok(format!(
            "{} {} {}",
            self.wrap(column),
            escape_operator(operator),
            self.parameter(value)
        ))
    }

    fn where_bitwise(
        &self,
        query: &Builder,
        column: &Column,
        operator: &str,
        value: &Value,
    ) -> QueryResult<String> {
        self.where_basic(query, column, operator, value)
    }

    fn where_json_boolean(
        &self,
        query: &Builder,
        column: &Column,
        operator: &str,
        value: &Value,
    ) -> QueryResult<String> {
        let _ = query;
        let column = match column {
            Column::Name(name) => self.wrap_json_boolean_selector(name),
            raw => self.wrap(raw),
        };
        let value = self.wrap_json_boolean_value(self.parameter(value));
        Ok(format!("{column} {} {value}", escape_operator(operator)))
    }

    fn where_in(
        &self,
        query: &Builder,
        column: &Column,
        values: &[Value],
        not: bool,
    ) -> QueryResult<String> {
        let _ = query;
        Ok(match (values.is_empty(), not) {
            (true, false) => "0 = 1".to_string(),
            (true, true) => "1 = 1".to_string(),
            (false, false) => format!("{} in ({})", self.wrap(column), self.parameterize(values)),
            (false, true) => {
                format!("{} not in ({})", self.wrap(column), self.parameterize(values))
            }
        })
    }

    fn where_in_raw(
        &self,
        query: &Builder,
        column: &Column,
        values: &[i64],
        not: bool,
    ) -> QueryResult<String> {
        let _ = query;
        let list = values
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Ok(match (values.is_empty(), not) {
            (true, false) => "0 = 1".to_string(),
            (true, true) => "1 = 1".to_string(),
            (false, false) => format!("{} in ({list})", self.wrap(column)),
            (false, true) => format!("{} not in ({list})", self.wrap(column)),
        })
    }

    fn where_null(&self, query: &Builder, column: &Column, not: bool) -> QueryResult<String> {
        let _ = query;
        let null = if not { "is not null" } else { "is null" };
        Ok(format!("{} {null}", self.wrap(column)))
    }

    fn where_like(
        &self,
        query: &Builder,
        column: &Column,
        value: &Value,
        case_sensitive: bool,
        not: bool,
    ) -> QueryResult<String> {
        if case_sensitive {
            return Err(QueryError::unsupported("case sensitive like operations"));
        }
        let operator = if not { "not like" } else { "like" };
        self.where_basic(query, column, operator, value)
    }

    fn where_date(
        &self,
        query: &Builder,
        part: DatePart,
        column: &Column,
        operator: &str,
        value: &Value,
    ) -> QueryResult<String> {
        let _ = query;
        Ok(format!(
            "{}({}) {} {}",
            part.as_str(),
            self.wrap(column),
            escape_operator(operator),
            self.parameter(value)
        ))
    }

    fn where_fulltext(
        &self,
        query: &Builder,
        columns: &[Column],
        value: &Value,
        options: &FulltextOptions,
    ) -> QueryResult<String> {
        let _ = (query, columns, value, options);
        Err(QueryError::unsupported("fulltext search"))
    }

    fn compile_json_contains(&self, column: &str, value: &str) -> QueryResult<String> {
        let _ = (column, value);
        Err(QueryError::unsupported("JSON contains operations"))
    }

    fn compile_json_overlaps(&self, column: &str, value: &str) -> QueryResult<String> {
        let _ = (column, value);
        Err(QueryError::unsupported("JSON overlaps operations"))
    }

    fn compile_json_contains_key(&self, column: &str) -> QueryResult<String> {
        let _ = column;
        Err(QueryError::unsupported("JSON contains key operations"))
    }

    fn compile_json_length(&self, column: &str, operator: &str, value: &str) -> QueryResult<String> {
        let _ = (column, operator, value);
        Err(QueryError::unsupported("JSON length operations"))
    }

    /// Serialize a value for a JSON containment binding.
    fn prepare_binding_for_json_contains(&self, value: &Value) -> Value {
        Value::Text(value.to_json().to_string())
    }

    // ===== group / having / order =====

    fn compile_groups(&self, query: &Builder, groups: &[Column]) -> String {
        let _ = query;
        format!("group by {}", self.columnize(groups))
    }

    fn compile_havings(&self, query: &Builder) -> QueryResult<String> {
        Ok(format!("having {}", self.compile_having_body(query)?))
    }

    fn compile_having_body(&self, query: &Builder) -> QueryResult<String> {
        let mut parts = Vec::with_capacity(query.havings.len());
        for having in &query.havings {
            parts.push(format!(
                "{} {}",
                having.boolean().as_str(),
                self.compile_having(query, having)?
            ));
        }
        Ok(remove_leading_boolean(&parts.join(" ")))
    }

    fn compile_having(&self, query: &Builder, having: &Where) -> QueryResult<String> {
        match having {
            Where::Raw { sql, .. } => Ok(sql.clone()),
            Where::Expression { expression, .. } => Ok(self.get_value(expression)),
            Where::Basic {
                column,
                operator,
                value,
                ..
            } => Ok(format!(
                "{} {} {}",
                self.wrap(column),
                escape_operator(operator),
                self.parameter(value)
            )),
            Where::Bitwise {
                column,
                operator,
                value,
                ..
            } => Ok(format!(
                "({} {} {}) != 0",
                self.wrap(column),
                escape_operator(operator),
                self.parameter(value)
            )),
            Where::Null { column, not, .. } => {
                let null = if *not { "is not null" } else { "is null" };
                Ok(format!("{} {null}", self.wrap(column)))
            }
            Where::Between {
                column, values, not, ..
            } => {
                let between = if *not { "not between" } else { "between" };
                Ok(format!(
                    "{} {between} {} and {}",
                    self.wrap(column),
                    self.parameter(&values[0]),
                    self.parameter(&values[1])
                ))
            }
            Where::Nested { query: nested, .. } => {
                Ok(format!("({})", self.compile_having_body(nested)?))
            }
            other => self.compile_where(query, other),
        }
    }

    fn compile_orders(&self, query: &Builder, orders: &[Order]) -> String {
        let _ = query;
        if orders.is_empty() {
            return String::new();
        }
        let compiled = orders
            .iter()
            .map(|order| match order {
                Order::Column { column, direction } => {
                    format!("{} {}", self.wrap(column), direction.as_str())
                }
                Order::Raw { sql } => sql.clone(),
            })
            .collect::<Vec<_>>();
        format!("order by {}", compiled.join(", "))
    }

    fn compile_random(&self, seed: &str) -> String {
        let _ = seed;
        "RANDOM()".to_string()
    }

    fn compile_limit(&self, query: &Builder, limit: u64) -> String {
        let _ = query;
        format!("limit {limit}")
    }

    fn compile_offset(&self, query: &Builder, offset: u64) -> String {
        let _ = query;
        format!("offset {offset}")
    }

    /// Keep the first `value` rows of each `column` partition using a
    /// `row_number()` window over the query's order.
    fn compile_group_limit(&self, query: &Builder, group_limit: &GroupLimit) -> QueryResult<String> {
        let offset = query.offset;
        let limit = group_limit.value + offset.unwrap_or(0);

        let mut inner = query.clone();
        inner.offset = None;
        inner.group_limit = None;

        let mut components = self.compile_components(&inner)?;
        let orders = components.orders.take().unwrap_or_default();
        let row_number = self.compile_row_number(&group_limit.column, &orders);
        components.columns = components.columns.map(|columns| columns + &row_number);

        let table = self.wrap_str("limited_table");
        let row = self.wrap_str("group_row");
        let mut sql = format!(
            "select * from ({}) as {table} where {row} <= {limit}",
            components.concatenate()
        );
        if let Some(offset) = offset {
            sql.push_str(&format!(" and {row} > {offset}"));
        }
        sql.push_str(&format!(" order by {row}"));
        Ok(sql)
    }

    fn compile_row_number(&self, partition: &Column, orders: &str) -> String {
        let over = format!("partition by {} {orders}", self.wrap(partition));
        format!(
            ", row_number() over ({}) as {}",
            over.trim(),
            self.wrap_str("group_row")
        )
    }

    // ===== unions / lock =====

    fn compile_unions(&self, query: &Builder) -> QueryResult<String> {
        let mut sql = String::new();
        for union in &query.unions {
            sql.push_str(&self.compile_union(union)?);
        }
        if !query.union_orders.is_empty() {
            sql.push(' ');
            sql.push_str(&self.compile_orders(query, &query.union_orders));
        }
        if let Some(limit) = query.union_limit {
            sql.push(' ');
            sql.push_str(&self.compile_limit(query, limit));
        }
        if let Some(offset) = query.union_offset {
            sql.push(' ');
            sql.push_str(&self.compile_offset(query, offset));
        }
        Ok(sql.trim_start().to_string())
    }

    fn compile_union(&self, union: &Union) -> QueryResult<String> {
        let conjunction = if union.all { " union all " } else { " union " };
        Ok(format!(
            "{conjunction}{}",
            self.wrap_union(&self.compile_select(&union.query)?)
        ))
    }

    fn wrap_union(&self, sql: &str) -> String {
        format!("({sql})")
    }

    fn compile_union_aggregate(&self, query: &Builder) -> QueryResult<String> {
        let Some(aggregate) = &query.aggregate else {
            return self.compile_select(query);
        };
        let sql = self.compile_aggregate(query, aggregate);
        let mut inner = query.clone();
        inner.aggregate = None;
        Ok(format!(
            "{sql} from ({}) as {}",
            self.compile_select(&inner)?,
            self.wrap_table_str("temp_table")
        ))
    }

    fn compile_lock(&self, query: &Builder, lock: &Lock) -> String {
        let _ = query;
        match lock {
            Lock::Raw(sql) => sql.clone(),
            Lock::Update | Lock::Shared => String::new(),
        }
    }

    fn compile_exists(&self, query: &Builder) -> QueryResult<String> {
        let select = self.compile_select(query)?;
        Ok(format!("select exists({select}) as {}", self.wrap_str("exists")))
    }

    // ===== insert =====

    fn compile_insert(&self, query: &Builder, values: &[Vec<(String, Value)>]) -> QueryResult<String> {
        let table = self.wrap_from(query)?;
        let Some(first) = values.first() else {
            return Ok(format!("insert into {table} default values"));
        };
        let columns = first
            .iter()
            .map(|(column, _)| self.wrap_str(column))
            .collect::<Vec<_>>()
            .join(", ");
        let parameters = values
            .iter()
            .map(|record| {
                let row: Vec<Value> = record.iter().map(|(_, v)| v.clone()).collect();
                format!("({})", self.parameterize(&row))
            })
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("insert into {table} ({columns}) values {parameters}"))
    }

    fn compile_insert_or_ignore(
        &self,
        query: &Builder,
        values: &[Vec<(String, Value)>],
    ) -> QueryResult<String> {
        let _ = (query, values);
        Err(QueryError::unsupported("inserting while ignoring errors"))
    }

    fn compile_insert_get_id(
        &self,
        query: &Builder,
        values: &[(String, Value)],
        sequence: Option<&str>,
    ) -> QueryResult<String> {
        let _ = sequence;
        self.compile_insert(query, &[values.to_vec()])
    }

    fn compile_insert_using(&self, query: &Builder, columns: &[String], sql: &str) -> QueryResult<String> {
        let table = self.wrap_from(query)?;
        if columns.is_empty() || columns == ["*"] {
            return Ok(format!("insert into {table} {sql}"));
        }
        Ok(format!(
            "insert into {table} ({}) {sql}",
            self.columnize_str(columns)
        ))
    }

    fn compile_insert_or_ignore_using(
        &self,
        query: &Builder,
        columns: &[String],
        sql: &str,
    ) -> QueryResult<String> {
        let _ = (query, columns, sql);
        Err(QueryError::unsupported("inserting while ignoring errors"))
    }

    fn compile_upsert(
        &self,
        query: &Builder,
        values: &[Vec<(String, Value)>],
        unique_by: &[String],
        update: &[UpsertUpdate],
    ) -> QueryResult<String> {
        let _ = (query, values, unique_by, update);
        Err(QueryError::unsupported("upserts"))
    }

    // ===== update / delete / truncate =====

    fn compile_update(&self, query: &Builder, values: &[(String, Value)]) -> QueryResult<String> {
        default_compile_update(self, query, values)
    }

    fn compile_update_columns(&self, query: &Builder, values: &[(String, Value)]) -> String {
        let _ = query;
        values
            .iter()
            .map(|(column, value)| format!("{} = {}", self.wrap_str(column), self.parameter(value)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn compile_update_with_joins(
        &self,
        query: &Builder,
        table: &str,
        columns: &str,
        wheres: &str,
    ) -> QueryResult<String> {
        let joins = self.compile_joins(query, &query.joins)?;
        Ok(format!("update {table} {joins} set {columns} {wheres}"))
    }

    fn compile_update_from(&self, query: &Builder, values: &[(String, Value)]) -> QueryResult<String> {
        let _ = (query, values);
        Err(QueryError::unsupported("the update from method"))
    }

    /// Bindings for an update: join bindings, the new values, then the rest
    /// (select and join excluded).
    fn prepare_bindings_for_update(&self, bindings: &Bindings, values: &[(String, Value)]) -> Vec<Value> {
        let mut prepared = bindings.get(BindingCategory::Join).to_vec();
        prepared.extend(values.iter().map(|(_, v)| v.clone()));
        prepared.extend(bindings.flatten_except(&[BindingCategory::Select, BindingCategory::Join]));
        prepared
    }

    /// Bindings for an update-from: the new values, where bindings, then the rest.
    fn prepare_bindings_for_update_from(
        &self,
        bindings: &Bindings,
        values: &[(String, Value)],
    ) -> Vec<Value> {
        let mut prepared: Vec<Value> = values.iter().map(|(_, v)| v.clone()).collect();
        prepared.extend(bindings.get(BindingCategory::Where).iter().cloned());
        prepared.extend(bindings.flatten_except(&[BindingCategory::Select, BindingCategory::Where]));
        prepared
    }

    fn compile_delete(&self, query: &Builder) -> QueryResult<String> {
        default_compile_delete(self, query)
    }

    fn prepare_bindings_for_delete(&self, bindings: &Bindings) -> Vec<Value> {
        bindings.flatten_except(&[BindingCategory::Select])
    }

    /// Statements (with bindings) that truncate the query's table.
    fn compile_truncate(&self, query: &Builder) -> QueryResult<Vec<(String, Vec<Value>)>> {
        Ok(vec![(format!("truncate table {}", self.wrap_from(query)?), Vec::new())])
    }

    // ===== wrapping =====

    fn wrap(&self, column: &Column) -> String {
        match column {
            Column::Raw(expression) => self.get_value(expression),
            Column::Name(name) => self.wrap_str(name),
        }
    }

    fn wrap_str(&self, value: &str) -> String {
        if is_aliased(value) {
            return self.wrap_aliased_value(value);
        }
        if self.is_json_selector(value) {
            return self.wrap_json_selector(value);
        }
        self.wrap_segments(&value.split('.').collect::<Vec<_>>())
    }

    fn wrap_aliased_value(&self, value: &str) -> String {
        match split_alias(value) {
            Some((expr, alias)) => format!("{} as {}", self.wrap_str(expr), self.wrap_value(alias)),
            None => self.wrap_value(value),
        }
    }

    fn wrap_segments(&self, segments: &[&str]) -> String {
        segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                if i == 0 && segments.len() > 1 {
                    self.wrap_table_str(segment)
                } else {
                    self.wrap_value(segment)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn wrap_value(&self, value: &str) -> String {
        if value == "*" {
            return value.to_string();
        }
        format!("\"{}\"", value.replace('"', "\"\""))
    }

    fn wrap_table(&self, table: &Column) -> String {
        match table {
            Column::Raw(expression) => self.get_value(expression),
            Column::Name(name) => self.wrap_table_str(name),
        }
    }

    fn wrap_table_str(&self, table: &str) -> String {
        self.wrap_table_with_prefix(table, &self.config().table_prefix)
    }

    fn wrap_table_with_prefix(&self, table: &str, prefix: &str) -> String {
        if is_aliased(table) {
            if let Some((name, alias)) = split_alias(table) {
                return format!(
                    "{} as {}",
                    self.wrap_table_with_prefix(name, prefix),
                    self.wrap_value(&format!("{prefix}{alias}"))
                );
            }
        }
        if let Some(pos) = table.rfind('.') {
            let qualified = format!("{}.{prefix}{}", &table[..pos], &table[pos + 1..]);
            return qualified
                .split('.')
                .map(|segment| self.wrap_value(segment))
                .collect::<Vec<_>>()
                .join(".");
        }
        self.wrap_value(&format!("{prefix}{table}"))
    }

    /// The query's `from`, wrapped, or [`QueryError::MissingFrom`].
    fn wrap_from(&self, query: &Builder) -> QueryResult<String> {
        query
            .from
            .as_ref()
            .map(|from| self.wrap_table(from))
            .ok_or(QueryError::MissingFrom)
    }

    fn is_json_selector(&self, value: &str) -> bool {
        value.contains("->")
    }

    fn wrap_json_selector(&self, value: &str) -> String {
        let (field, path) = self.wrap_json_field_and_path(value);
        format!("json_value({field}{path})")
    }

    fn wrap_json_field_and_path(&self, column: &str) -> (String, String) {
        let (field, path) = match column.split_once("->") {
            Some((field, path)) => (field, Some(path)),
            None => (column, None),
        };
        let path = path
            .map(|path| format!(", {}", self.wrap_json_path(path, "->")))
            .unwrap_or_default();
        (self.wrap_str(field), path)
    }

    fn wrap_json_path(&self, value: &str, delimiter: &str) -> String {
        let value = value.replace("\\'", "'").replace('\'', "''");
        let json_path = value
            .split(delimiter)
            .map(|segment| self.wrap_json_path_segment(segment))
            .collect::<Vec<_>>()
            .join(".");
        let dot = if json_path.starts_with('[') { "" } else { "." };
        format!("'${dot}{json_path}'")
    }

    fn wrap_json_path_segment(&self, segment: &str) -> String {
        if let Some(found) = json_array_keys_regex().find(segment) {
            let key = &segment[..found.start()];
            if !key.is_empty() {
                return format!("\"{key}\"{}", found.as_str());
            }
            return found.as_str().to_string();
        }
        format!("\"{segment}\"")
    }

    /// Quote JSON path attributes, leaving integer indices bare.
    fn wrap_json_path_attributes(&self, path: &[&str], quote: &str) -> Vec<String> {
        path.iter()
            .flat_map(|attribute| parse_json_path_array_keys(attribute))
            .map(|attribute| {
                if is_integer_literal(&attribute) {
                    attribute
                } else {
                    format!("{quote}{attribute}{quote}")
                }
            })
            .collect()
    }

    fn wrap_json_boolean_selector(&self, value: &str) -> String {
        self.wrap_json_selector(value)
    }

    fn wrap_json_boolean_value(&self, value: String) -> String {
        value
    }

    fn columnize(&self, columns: &[Column]) -> String {
        columns
            .iter()
            .map(|column| self.wrap(column))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn columnize_str(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|column| self.wrap_str(column))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `?`, or the inlined SQL of an expression.
    fn parameter(&self, value: &Value) -> String {
        match value {
            Value::Expression(expression) => self.get_value(expression),
            _ => "?".to_string(),
        }
    }

    fn parameterize(&self, values: &[Value]) -> String {
        values
            .iter()
            .map(|value| self.parameter(value))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn get_value(&self, expression: &Expression) -> String {
        expression.value().to_string()
    }

    // ===== raw SQL =====

    /// Render a value as an SQL literal.
    fn escape(&self, value: &Value) -> String {
        default_escape(self, value)
    }

    /// Inline escaped bindings into `sql` for display. Quoted literals are
    /// left alone and `??` stays as is.
    fn substitute_bindings_into_raw_sql(&self, sql: &str, bindings: &[Value]) -> String {
        default_substitute_bindings(self, sql, bindings)
    }
}

pub(crate) fn default_compile_update<G: Grammar + ?Sized>(
    grammar: &G,
    query: &Builder,
    values: &[(String, Value)],
) -> QueryResult<String> {
    let table = grammar.wrap_from(query)?;
    let columns = grammar.compile_update_columns(query, values);
    let wheres = grammar.compile_wheres(query)?;
    let sql = if query.joins.is_empty() {
        format!("update {table} set {columns} {wheres}")
    } else {
        grammar.compile_update_with_joins(query, &table, &columns, &wheres)?
    };
    Ok(sql.trim().to_string())
}

pub(crate) fn default_compile_delete<G: Grammar + ?Sized>(
    grammar: &G,
    query: &Builder,
) -> QueryResult<String> {
    let table = grammar.wrap_from(query)?;
    let wheres = grammar.compile_wheres(query)?;
    let sql = if query.joins.is_empty() {
        format!("delete from {table} {wheres}")
    } else {
        let alias = table.rsplit(" as ").next().unwrap_or(&table);
        let joins = grammar.compile_joins(query, &query.joins)?;
        format!("delete {alias} from {table} {joins} {wheres}")
    };
    Ok(sql.trim().to_string())
}

pub(crate) fn default_escape<G: Grammar + ?Sized>(grammar: &G, value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bytes(bytes) => format!("x'{}'", hex(bytes)),
        Value::Array(items) => items
            .iter()
            .map(|item| grammar.escape(item))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Enum(inner) => grammar.escape(inner),
        Value::Expression(expression) => grammar.get_value(expression),
        other => quote_string(&other.to_string()),
    }
}

pub(crate) fn default_substitute_bindings<G: Grammar + ?Sized>(
    grammar: &G,
    sql: &str,
    bindings: &[Value],
) -> String {
    let mut values = bindings.iter().map(|value| grammar.escape(value));
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_literal = false;

    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        match (c, next) {
            ('\\', Some('\'')) | ('\'', Some('\'')) | ('?', Some('?')) => {
                out.push(c);
                out.extend(chars.next());
            }
            ('\'', _) => {
                out.push(c);
                in_literal = !in_literal;
            }
            ('?', _) if !in_literal => match values.next() {
                Some(value) => out.push_str(&value),
                None => out.push('?'),
            },
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests;
