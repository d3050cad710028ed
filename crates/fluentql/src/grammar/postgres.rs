use super::{
    Grammar, GrammarConfig, default_compile_delete, default_compile_update, default_escape,
    default_substitute_bindings, escape_operator, is_integer_literal, operator_list, quote_string,
    remove_leading_boolean, split_alias,
};
use crate::bindings::{BindingCategory, Bindings};
use crate::error::QueryResult;
use crate::query::{
    Builder, DatePart, Distinct, FulltextOptions, IndexHint, JoinClause, Lock, UpsertUpdate,
};
use crate::value::{Column, Value};

const OPERATORS: &[&str] = &[
    "=", "<", ">", "<=", ">=", "<>", "!=", "like", "not like", "between", "ilike", "not ilike",
    "~", "&", "|", "#", "<<", ">>", "<<=", ">>=", "&&", "@>", "<@", "?", "?|", "?&", "||", "-",
    "@?", "@@", "#-", "is distinct from", "is not distinct from",
];

const BITWISE_OPERATORS: &[&str] = &["~", "&", "|", "#", "<<", ">>", "<<=", ">>="];

const FULLTEXT_LANGUAGES: &[&str] = &[
    "simple", "arabic", "armenian", "basque", "catalan", "danish", "dutch", "english", "finnish",
    "french", "german", "greek", "hindi", "hungarian", "indonesian", "irish", "italian",
    "lithuanian", "nepali", "norwegian", "portuguese", "romanian", "russian", "serbian",
    "spanish", "swedish", "tamil", "turkish", "yiddish",
];

/// PostgreSQL grammar.
#[derive(Debug, Clone)]
pub struct PostgresGrammar {
    config: GrammarConfig,
    operators: Vec<String>,
    bitwise_operators: Vec<String>,
}

impl Default for PostgresGrammar {
    fn default() -> Self {
        Self::new(GrammarConfig::default())
    }
}

impl PostgresGrammar {
    pub fn new(config: GrammarConfig) -> Self {
        let operators = operator_list(OPERATORS, &config);
        let bitwise_operators = BITWISE_OPERATORS.iter().map(|op| op.to_string()).collect();
        Self {
            config,
            operators,
            bitwise_operators,
        }
    }

    /// Languages accepted by `where_fulltext`; anything else falls back to
    /// `english`.
    pub fn valid_fulltext_languages() -> &'static [&'static str] {
        FULLTEXT_LANGUAGES
    }

    fn is_json_column(&self, column: &Column) -> bool {
        matches!(column, Column::Name(name) if self.is_json_selector(name))
    }

    /// Alias of the `from` table, or the table itself.
    fn from_alias(query: &Builder) -> String {
        let from = query.from.as_ref().map(Column::as_str).unwrap_or_default();
        match split_alias(from) {
            Some((_, alias)) => alias.to_string(),
            None => from.to_string(),
        }
    }

    /// A copy of `query` selecting only `alias.ctid`, for rewriting joined or
    /// limited updates and deletes as `where ctid in (...)`.
    fn ctid_select(&self, query: &Builder) -> QueryResult<String> {
        let mut select = query.clone();
        select.columns = Some(vec![Column::Name(format!("{}.ctid", Self::from_alias(query)))]);
        self.compile_select(&select)
    }

    fn compile_json_update_column(&self, key: &str, value: &Value) -> String {
        let mut segments = key.split("->");
        let field = self.wrap_str(segments.next().unwrap_or_default());
        let rest: Vec<&str> = segments.collect();
        let path = format!("'{{{}}}'", self.wrap_json_path_attributes(&rest, "\"").join(","));
        format!(
            "{field} = jsonb_set({field}::jsonb, {path}, {})",
            self.parameter(value)
        )
    }

    fn compile_update_wheres(&self, query: &Builder) -> QueryResult<String> {
        let base = self.compile_wheres(query)?;
        if query.joins.is_empty() {
            return Ok(base);
        }
        let join_wheres = self.compile_update_join_wheres(query)?;
        if join_wheres.is_empty() {
            return Ok(base);
        }
        if base.trim().is_empty() {
            return Ok(format!("where {}", remove_leading_boolean(&join_wheres)));
        }
        Ok(format!("{base} {join_wheres}"))
    }

    fn compile_update_join_wheres(&self, query: &Builder) -> QueryResult<String> {
        let mut parts = Vec::new();
        for join in &query.joins {
            for clause in &join.wheres {
                parts.push(format!(
                    "{} {}",
                    clause.boolean().as_str(),
                    self.compile_where(query, clause)?
                ));
            }
        }
        Ok(parts.join(" "))
    }

    /// Values destined for JSON columns (or arrays) are bound as JSON text.
    fn prepare_update_values(&self, values: &[(String, Value)]) -> Vec<Value> {
        values
            .iter()
            .map(|(column, value)| {
                let json = value.is_array() || (self.is_json_selector(column) && !value.is_expression());
                if json {
                    Value::Text(value.to_json().to_string())
                } else {
                    value.clone()
                }
            })
            .collect()
    }
}

impl Grammar for PostgresGrammar {
    fn config(&self) -> &GrammarConfig {
        &self.config
    }

    fn operators(&self) -> &[String] {
        &self.operators
    }

    fn bitwise_operators(&self) -> &[String] {
        &self.bitwise_operators
    }

    fn compile_columns(&self, query: &Builder, columns: &[Column]) -> Option<String> {
        if query.aggregate.is_some() {
            return None;
        }
        let select = match &query.distinct {
            Distinct::On(on) => format!("select distinct on ({}) ", self.columnize(on)),
            Distinct::All => "select distinct ".to_string(),
            Distinct::None => "select ".to_string(),
        };
        Some(format!("{select}{}", self.columnize(columns)))
    }

    fn compile_index_hint(&self, _query: &Builder, _hint: &IndexHint) -> String {
        String::new()
    }

    fn compile_join_lateral(&self, join: &JoinClause, expression: &str) -> QueryResult<String> {
        Ok(format!("{} join lateral {expression} on true", join.kind.as_str())
            .trim()
            .to_string())
    }

    fn where_basic(
        &self,
        _query: &Builder,
        column: &Column,
        operator: &str,
        value: &Value,
    ) -> QueryResult<String> {
        if operator.to_lowercase().contains("like") {
            return Ok(format!(
                "{}::text {} {}",
                self.wrap(column),
                escape_operator(operator),
                self.parameter(value)
            ));
        }
        Ok(format!(
            "{} {} {}",
            self.wrap(column),
            escape_operator(operator),
            self.parameter(value)
        ))
    }

    fn where_bitwise(
        &self,
        _query: &Builder,
        column: &Column,
        operator: &str,
        value: &Value,
    ) -> QueryResult<String> {
        Ok(format!(
            "({} {} {})::bool",
            self.wrap(column),
            escape_operator(operator),
            self.parameter(value)
        ))
    }

    fn where_like(
        &self,
        query: &Builder,
        column: &Column,
        value: &Value,
        case_sensitive: bool,
        not: bool,
    ) -> QueryResult<String> {
        let operator = format!(
            "{}{}",
            if not { "not " } else { "" },
            if case_sensitive { "like" } else { "ilike" }
        );
        self.where_basic(query, column, &operator, value)
    }

    fn where_date(
        &self,
        _query: &Builder,
        part: DatePart,
        column: &Column,
        operator: &str,
        value: &Value,
    ) -> QueryResult<String> {
        let value = self.parameter(value);
        let operator = escape_operator(operator);
        let wrapped = self.wrap(column);
        let cast = match part {
            DatePart::Date => "date",
            DatePart::Time => "time",
            DatePart::Day | DatePart::Month | DatePart::Year => {
                return Ok(format!(
                    "extract({} from {wrapped}) {operator} {value}",
                    part.as_str()
                ));
            }
        };
        let wrapped = if self.is_json_column(column) {
            format!("({wrapped})")
        } else {
            wrapped
        };
        Ok(format!("{wrapped}::{cast} {operator} {value}"))
    }

    fn where_fulltext(
        &self,
        _query: &Builder,
        columns: &[Column],
        value: &Value,
        options: &FulltextOptions,
    ) -> QueryResult<String> {
        let language = options
            .language
            .as_deref()
            .filter(|language| FULLTEXT_LANGUAGES.contains(language))
            .unwrap_or("english");
        let vectors = columns
            .iter()
            .map(|column| format!("to_tsvector('{language}', {})", self.wrap(column)))
            .collect::<Vec<_>>()
            .join(" || ");
        let mode = match options.mode.as_deref() {
            Some("phrase") => "phraseto_tsquery",
            Some("websearch") => "websearch_to_tsquery",
            _ => "plainto_tsquery",
        };
        Ok(format!(
            "({vectors}) @@ {mode}('{language}', {})",
            self.parameter(value)
        ))
    }

    fn compile_json_contains(&self, column: &str, value: &str) -> QueryResult<String> {
        let column = self.wrap_str(column).replace("->>", "->");
        Ok(format!("({column})::jsonb @> {value}"))
    }

    fn compile_json_contains_key(&self, column: &str) -> QueryResult<String> {
        let mut segments: Vec<&str> = column.split("->").collect();
        let last = segments.pop().unwrap_or_default();
        let mut index: Option<i64> = None;

        if is_integer_literal(last) {
            index = last.parse().ok();
        } else if let Some(open) = last.rfind('[') {
            let inner = last[open + 1..].strip_suffix(']');
            if let Some(n) = inner.and_then(|inner| inner.parse::<i64>().ok()) {
                segments.push(&last[..open]);
                index = Some(n);
            }
        }

        let column = self.wrap_str(&segments.join("->")).replace("->>", "->");
        if let Some(i) = index {
            let length = if i < 0 { i.abs() } else { i + 1 };
            return Ok(format!(
                "case when jsonb_typeof(({column})::jsonb) = 'array' then jsonb_array_length(({column})::jsonb) >= {length} else false end"
            ));
        }
        Ok(format!(
            "coalesce(({column})::jsonb ?? {}, false)",
            quote_string(last)
        ))
    }

    fn compile_json_length(&self, column: &str, operator: &str, value: &str) -> QueryResult<String> {
        let column = self.wrap_str(column).replace("->>", "->");
        let operator = escape_operator(operator);
        Ok(format!("jsonb_array_length(({column})::jsonb) {operator} {value}"))
    }

    fn compile_random(&self, _seed: &str) -> String {
        "random()".to_string()
    }

    fn compile_lock(&self, _query: &Builder, lock: &Lock) -> String {
        match lock {
            Lock::Update => "for update".to_string(),
            Lock::Shared => "for share".to_string(),
            Lock::Raw(sql) => sql.clone(),
        }
    }

    fn compile_insert_or_ignore(
        &self,
        query: &Builder,
        values: &[Vec<(String, Value)>],
    ) -> QueryResult<String> {
        Ok(format!("{} on conflict do nothing", self.compile_insert(query, values)?))
    }

    fn compile_insert_or_ignore_using(
        &self,
        query: &Builder,
        columns: &[String],
        sql: &str,
    ) -> QueryResult<String> {
        Ok(format!(
            "{} on conflict do nothing",
            self.compile_insert_using(query, columns, sql)?
        ))
    }

    fn compile_insert_get_id(
        &self,
        query: &Builder,
        values: &[(String, Value)],
        sequence: Option<&str>,
    ) -> QueryResult<String> {
        Ok(format!(
            "{} returning {}",
            self.compile_insert(query, &[values.to_vec()])?,
            self.wrap_str(sequence.unwrap_or("id"))
        ))
    }

    fn compile_upsert(
        &self,
        query: &Builder,
        values: &[Vec<(String, Value)>],
        unique_by: &[String],
        update: &[UpsertUpdate],
    ) -> QueryResult<String> {
        let mut sql = self.compile_insert(query, values)?;
        sql.push_str(&format!(
            " on conflict ({}) do update set ",
            self.columnize_str(unique_by)
        ));
        let excluded = self.wrap_value("excluded");
        let columns = update
            .iter()
            .map(|entry| match entry {
                UpsertUpdate::Column(column) => {
                    let wrapped = self.wrap_str(column);
                    format!("{wrapped} = {excluded}.{wrapped}")
                }
                UpsertUpdate::Value(column, value) => {
                    format!("{} = {}", self.wrap_str(column), self.parameter(value))
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&columns);
        Ok(sql)
    }

    fn compile_update(&self, query: &Builder, values: &[(String, Value)]) -> QueryResult<String> {
        if !query.joins.is_empty() || query.limit.is_some() {
            let table = self.wrap_from(query)?;
            let columns = self.compile_update_columns(query, values);
            return Ok(format!(
                "update {table} set {columns} where {} in ({})",
                self.wrap_str("ctid"),
                self.ctid_select(query)?
            ));
        }
        default_compile_update(self, query, values)
    }

    fn compile_update_columns(&self, _query: &Builder, values: &[(String, Value)]) -> String {
        values
            .iter()
            .map(|(key, value)| {
                let column = key.rsplit('.').next().unwrap_or(key);
                if self.is_json_selector(key) {
                    self.compile_json_update_column(column, value)
                } else {
                    format!("{} = {}", self.wrap_str(column), self.parameter(value))
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn compile_update_from(&self, query: &Builder, values: &[(String, Value)]) -> QueryResult<String> {
        let table = self.wrap_from(query)?;
        let columns = self.compile_update_columns(query, values);
        let froms = query
            .joins
            .iter()
            .map(|join| self.wrap_table(&join.table))
            .collect::<Vec<_>>();
        let from = if froms.is_empty() {
            String::new()
        } else {
            format!(" from {}", froms.join(", "))
        };
        let wheres = self.compile_update_wheres(query)?;
        Ok(format!("update {table} set {columns}{from} {wheres}")
            .trim()
            .to_string())
    }

    fn prepare_bindings_for_update(&self, bindings: &Bindings, values: &[(String, Value)]) -> Vec<Value> {
        let mut prepared = self.prepare_update_values(values);
        prepared.extend(bindings.flatten_except(&[BindingCategory::Select]));
        prepared
    }

    fn prepare_bindings_for_update_from(
        &self,
        bindings: &Bindings,
        values: &[(String, Value)],
    ) -> Vec<Value> {
        let mut prepared = self.prepare_update_values(values);
        prepared.extend(bindings.get(BindingCategory::Where).iter().cloned());
        prepared.extend(bindings.flatten_except(&[BindingCategory::Select, BindingCategory::Where]));
        prepared
    }

    fn compile_delete(&self, query: &Builder) -> QueryResult<String> {
        if !query.joins.is_empty() || query.limit.is_some() {
            return Ok(format!(
                "delete from {} where {} in ({})",
                self.wrap_from(query)?,
                self.wrap_str("ctid"),
                self.ctid_select(query)?
            ));
        }
        default_compile_delete(self, query)
    }

    fn compile_truncate(&self, query: &Builder) -> QueryResult<Vec<(String, Vec<Value>)>> {
        let cascade = if self.config.cascade_truncate { " cascade" } else { "" };
        Ok(vec![(
            format!("truncate {} restart identity{cascade}", self.wrap_from(query)?),
            Vec::new(),
        )])
    }

    fn wrap_json_selector(&self, value: &str) -> String {
        let mut path = value.split("->");
        let field = self.wrap_segments(&path.next().unwrap_or_default().split('.').collect::<Vec<_>>());
        let rest: Vec<&str> = path.collect();
        let mut wrapped = self.wrap_json_path_attributes(&rest, "'");
        let Some(attribute) = wrapped.pop() else {
            return field;
        };
        if wrapped.is_empty() {
            return format!("{field}->>{attribute}");
        }
        format!("{field}->{}->>{attribute}", wrapped.join("->"))
    }

    fn wrap_json_boolean_selector(&self, value: &str) -> String {
        format!("({})::jsonb", self.wrap_json_selector(value).replace("->>", "->"))
    }

    fn wrap_json_boolean_value(&self, value: String) -> String {
        format!("'{value}'::jsonb")
    }

    fn escape(&self, value: &Value) -> String {
        match value {
            Value::Bool(b) => b.to_string(),
            Value::Bytes(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
                format!("'\\x{hex}'::bytea")
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.escape(item))
                .collect::<Vec<_>>()
                .join(", "),
            Value::Enum(inner) => self.escape(inner),
            other => default_escape(self, other),
        }
    }

    fn substitute_bindings_into_raw_sql(&self, sql: &str, bindings: &[Value]) -> String {
        let mut query = default_substitute_bindings(self, sql, bindings);
        for operator in &self.operators {
            if operator.contains('?') {
                query = query.replace(&escape_operator(operator), operator);
            }
        }
        query
    }
}
