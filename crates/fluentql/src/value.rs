//! Binding values, raw expressions and column references.
//!
//! [`Value`] is the single currency between the builder, the grammar and the
//! connection: every parameter a clause binds is a `Value`, and every column a
//! connection decodes comes back as one.

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::error::Error;
use std::fmt;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type};
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

/// A raw SQL fragment that is inlined verbatim and never parameterized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expression(String);

impl Expression {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    /// The raw SQL text.
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shorthand for [`Expression::new`].
pub fn raw(sql: impl Into<String>) -> Expression {
    Expression::new(sql)
}

/// A column (or table) reference: either a name to be quoted by the grammar or
/// a raw expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Column {
    Name(String),
    Raw(Expression),
}

impl Column {
    /// Textual form: the name itself, or the raw SQL of an expression.
    pub fn as_str(&self) -> &str {
        match self {
            Column::Name(name) => name,
            Column::Raw(expr) => expr.value(),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Column::Raw(_))
    }
}

impl From<&str> for Column {
    fn from(value: &str) -> Self {
        Column::Name(value.to_string())
    }
}

impl From<String> for Column {
    fn from(value: String) -> Self {
        Column::Name(value)
    }
}

impl From<&String> for Column {
    fn from(value: &String) -> Self {
        Column::Name(value.clone())
    }
}

impl From<Expression> for Column {
    fn from(value: Expression) -> Self {
        Column::Raw(value)
    }
}

impl From<&Column> for Column {
    fn from(value: &Column) -> Self {
        value.clone()
    }
}

/// A bindable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Array(Vec<Value>),
    /// A backed enum case; binds as its backing value.
    Enum(Box<Value>),
    /// Raw SQL, inlined by the grammar instead of bound.
    Expression(Expression),
}

impl Value {
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(bytes.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, Value::Expression(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn as_expression(&self) -> Option<&Expression> {
        match self {
            Value::Expression(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Enum(inner) => inner.as_str(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Enum(inner) => inner.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Enum(inner) => inner.as_f64(),
            _ => None,
        }
    }

    /// Whether the value is a number or a string holding one.
    pub fn is_numeric(&self) -> bool {
        match self {
            Value::Int(_) | Value::Float(_) => true,
            Value::Text(s) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
            _ => false,
        }
    }

    /// Loose truthiness used when reading boolean-ish results such as `exists`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !matches!(s.as_str(), "" | "0" | "f" | "false"),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// Coerce to an integer the way integer-only raw lists do: non-numeric
    /// input becomes zero.
    pub fn to_int_lossy(&self) -> i64 {
        match self {
            Value::Float(f) => f.trunc() as i64,
            Value::Text(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| s.trim().parse::<f64>().ok().map(|f| f.trunc() as i64))
                .unwrap_or(0),
            other => other.as_i64().unwrap_or(0),
        }
    }

    /// Short type label used in decode messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
            Value::Array(_) => "array",
            Value::Enum(_) => "enum",
            Value::Expression(_) => "expression",
        }
    }

    /// Convert to JSON. Dates and UUIDs become strings, bytes become an array
    /// of numbers, expressions become their SQL text.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Value::Text(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::from(b.clone()),
            Value::Json(j) => j.clone(),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Enum(inner) => inner.to_json(),
            other => Json::String(other.to_string()),
        }
    }

    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            Json::String(s) => Value::Text(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from_json).collect()),
            object @ Json::Object(_) => Value::Json(object),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::Json(j) => write!(f, "{j}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%:z")),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Enum(inner) => write!(f, "{inner}"),
            Value::Expression(expr) => f.write_str(expr.value()),
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.to_json(), serializer)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Json(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveTime> for Value {
    fn from(value: NaiveTime) -> Self {
        Value::Time(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<Expression> for Value {
    fn from(value: Expression) -> Self {
        Value::Expression(value)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(value: [T; N]) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

// ===== Encoding =====

fn parse_text<T: std::str::FromStr>(s: &str, ty: &Type) -> Result<T, BoxError>
where
    T::Err: fmt::Display,
{
    s.trim()
        .parse::<T>()
        .map_err(|e| format!("cannot bind {s:?} as {ty}: {e}").into())
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, BoxError> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|e| format!("cannot bind {s:?} as timestamp: {e}").into())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, BoxError> {
    match DateTime::parse_from_rfc3339(s.trim()) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(_) => Ok(parse_datetime(s)?.and_utc()),
    }
}

/// Write a decimal string in the binary `numeric` wire format.
fn encode_numeric(text: &str, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    let text = text.trim();
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if int_part.is_empty() && frac_part.is_empty()
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(format!("cannot bind {text:?} as numeric").into());
    }

    let dscale = u16::try_from(frac_part.len())?;
    let int_part = int_part.trim_start_matches('0');
    let int_pad = (4 - int_part.len() % 4) % 4;
    let frac_pad = (4 - frac_part.len() % 4) % 4;
    let digits_str = format!(
        "{}{}{}{}",
        "0".repeat(int_pad),
        int_part,
        frac_part,
        "0".repeat(frac_pad)
    );
    let mut groups: Vec<i16> = digits_str
        .as_bytes()
        .chunks(4)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0i16, |acc, b| acc * 10 + i16::from(b - b'0'))
        })
        .collect();

    let mut weight = i16::try_from((int_part.len() + int_pad) / 4)? - 1;
    let leading = groups.iter().take_while(|g| **g == 0).count();
    groups.drain(..leading);
    weight -= i16::try_from(leading)?;
    while groups.last() == Some(&0) {
        groups.pop();
    }
    if groups.is_empty() {
        weight = 0;
    }

    out.put_i16(i16::try_from(groups.len())?);
    out.put_i16(weight);
    out.put_u16(if negative && !groups.is_empty() { 0x4000 } else { 0x0000 });
    out.put_u16(dscale);
    for group in groups {
        out.put_i16(group);
    }
    Ok(IsNull::No)
}

fn decode_numeric(raw: &[u8]) -> Result<String, BoxError> {
    let read = |at: usize| -> Result<i16, BoxError> {
        raw.get(at..at + 2)
            .map(|b| i16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "numeric value truncated".into())
    };
    let ndigits = usize::try_from(read(0)?)?;
    let weight = read(2)?;
    let sign = read(4)? as u16;
    let dscale = usize::try_from(read(6)?)?;
    if sign == 0xC000 {
        return Ok("NaN".to_string());
    }
    let groups = (0..ndigits)
        .map(|i| read(8 + i * 2))
        .collect::<Result<Vec<_>, _>>()?;

    let mut int_part = String::new();
    let mut frac_part = String::new();
    for (i, group) in groups.iter().enumerate() {
        let position = i64::from(weight) - i as i64;
        if position >= 0 {
            if int_part.is_empty() {
                int_part.push_str(&group.to_string());
            } else {
                int_part.push_str(&format!("{group:04}"));
            }
        } else {
            frac_part.push_str(&format!("{group:04}"));
        }
    }
    // Groups skipped between the last stored digit and the decimal point.
    let trailing_int_groups = i64::from(weight) + 1 - ndigits as i64;
    if trailing_int_groups > 0 && !int_part.is_empty() {
        int_part.push_str(&"0000".repeat(trailing_int_groups as usize));
    }
    if weight < -1 {
        let leading = "0000".repeat(usize::try_from(-i64::from(weight) - 1)?);
        frac_part.insert_str(0, &leading);
    }
    if int_part.is_empty() {
        int_part.push('0');
    }
    frac_part.truncate(dscale);
    while frac_part.len() < dscale {
        frac_part.push('0');
    }

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }
    out.push_str(&int_part);
    if dscale > 0 {
        out.push('.');
        out.push_str(&frac_part);
    }
    Ok(out)
}

fn is_text_type(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Enum(inner) => inner.to_sql(ty, out),
            Value::Expression(expr) => Err(format!(
                "raw expression `{}` cannot be bound as a parameter",
                expr.value()
            )
            .into()),
            Value::Bool(b) => match *ty {
                Type::INT2 => i16::from(*b).to_sql(ty, out),
                Type::INT4 => i32::from(*b).to_sql(ty, out),
                Type::INT8 => i64::from(*b).to_sql(ty, out),
                _ if is_text_type(ty) => b.to_string().as_str().to_sql(ty, out),
                _ => b.to_sql(ty, out),
            },
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::NUMERIC => encode_numeric(&i.to_string(), out),
                Type::BOOL => (*i != 0).to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::Value::from(*i).to_sql(ty, out),
                _ if is_text_type(ty) => i.to_string().as_str().to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::NUMERIC => encode_numeric(&f.to_string(), out),
                Type::INT2 | Type::INT4 | Type::INT8 if f.fract() == 0.0 => {
                    Value::Int(*f as i64).to_sql(ty, out)
                }
                Type::JSON | Type::JSONB => self.to_json().to_sql(ty, out),
                _ if is_text_type(ty) => f.to_string().as_str().to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            Value::Text(s) => match *ty {
                Type::INT2 => parse_text::<i16>(s, ty)?.to_sql(ty, out),
                Type::INT4 => parse_text::<i32>(s, ty)?.to_sql(ty, out),
                Type::INT8 => parse_text::<i64>(s, ty)?.to_sql(ty, out),
                Type::FLOAT4 => parse_text::<f32>(s, ty)?.to_sql(ty, out),
                Type::FLOAT8 => parse_text::<f64>(s, ty)?.to_sql(ty, out),
                Type::NUMERIC => encode_numeric(s, out),
                Type::BOOL => match s.trim().to_ascii_lowercase().as_str() {
                    "1" | "t" | "true" | "yes" | "on" => true.to_sql(ty, out),
                    "0" | "f" | "false" | "no" | "off" | "" => false.to_sql(ty, out),
                    _ => Err(format!("cannot bind {s:?} as bool").into()),
                },
                Type::JSON | Type::JSONB => {
                    serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out)
                }
                Type::UUID => Uuid::parse_str(s.trim())?.to_sql(ty, out),
                Type::DATE => parse_text::<NaiveDate>(s, ty)?.to_sql(ty, out),
                Type::TIME => parse_text::<NaiveTime>(s, ty)?.to_sql(ty, out),
                Type::TIMESTAMP => parse_datetime(s)?.to_sql(ty, out),
                Type::TIMESTAMPTZ => parse_timestamp(s)?.to_sql(ty, out),
                _ => s.as_str().to_sql(ty, out),
            },
            Value::Bytes(b) => b.as_slice().to_sql(ty, out),
            Value::Json(j) => match *ty {
                Type::JSON | Type::JSONB => j.to_sql(ty, out),
                _ => j.to_string().as_str().to_sql(ty, out),
            },
            Value::Date(d) => match *ty {
                Type::TIMESTAMP => d.and_time(NaiveTime::MIN).to_sql(ty, out),
                Type::TIMESTAMPTZ => d.and_time(NaiveTime::MIN).and_utc().to_sql(ty, out),
                _ if is_text_type(ty) => self.to_string().as_str().to_sql(ty, out),
                _ => d.to_sql(ty, out),
            },
            Value::Time(t) => match *ty {
                _ if is_text_type(ty) => self.to_string().as_str().to_sql(ty, out),
                _ => t.to_sql(ty, out),
            },
            Value::DateTime(dt) => match *ty {
                Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
                Type::DATE => dt.date().to_sql(ty, out),
                _ if is_text_type(ty) => self.to_string().as_str().to_sql(ty, out),
                _ => dt.to_sql(ty, out),
            },
            Value::Timestamp(ts) => match *ty {
                Type::TIMESTAMP => ts.naive_utc().to_sql(ty, out),
                Type::DATE => ts.date_naive().to_sql(ty, out),
                _ if is_text_type(ty) => ts.to_rfc3339().as_str().to_sql(ty, out),
                _ => ts.to_sql(ty, out),
            },
            Value::Uuid(u) => match *ty {
                _ if is_text_type(ty) => u.to_string().as_str().to_sql(ty, out),
                _ => u.to_sql(ty, out),
            },
            Value::Array(items) => match ty.kind() {
                Kind::Array(_) => items.to_sql(ty, out),
                _ if matches!(*ty, Type::JSON | Type::JSONB) => self.to_json().to_sql(ty, out),
                _ => Err(format!("cannot bind an array as {ty}").into()),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        if let Kind::Array(_) = ty.kind() {
            return Ok(Value::Array(Vec::<Value>::from_sql(ty, raw)?));
        }
        if let Kind::Enum(_) = ty.kind() {
            return Ok(Value::Text(<&str>::from_sql(ty, raw)?.to_string()));
        }
        Ok(match *ty {
            Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
            Type::CHAR => Value::Int(i64::from(i8::from_sql(ty, raw)?)),
            Type::INT2 => Value::Int(i64::from(i16::from_sql(ty, raw)?)),
            Type::INT4 => Value::Int(i64::from(i32::from_sql(ty, raw)?)),
            Type::INT8 => Value::Int(i64::from_sql(ty, raw)?),
            Type::OID => Value::Int(i64::from(u32::from_sql(ty, raw)?)),
            Type::FLOAT4 => Value::Float(f64::from(f32::from_sql(ty, raw)?)),
            Type::FLOAT8 => Value::Float(f64::from_sql(ty, raw)?),
            Type::NUMERIC => Value::Text(decode_numeric(raw)?),
            Type::BYTEA => Value::Bytes(<&[u8]>::from_sql(ty, raw)?.to_vec()),
            Type::JSON | Type::JSONB => Value::Json(serde_json::Value::from_sql(ty, raw)?),
            Type::DATE => Value::Date(NaiveDate::from_sql(ty, raw)?),
            Type::TIME => Value::Time(NaiveTime::from_sql(ty, raw)?),
            Type::TIMESTAMP => Value::DateTime(NaiveDateTime::from_sql(ty, raw)?),
            Type::TIMESTAMPTZ => Value::Timestamp(DateTime::<Utc>::from_sql(ty, raw)?),
            Type::UUID => Value::Uuid(Uuid::from_sql(ty, raw)?),
            _ if is_text_type(ty) => Value::Text(<&str>::from_sql(ty, raw)?.to_string()),
            _ => match std::str::from_utf8(raw) {
                Ok(text) => Value::Text(text.to_string()),
                Err(_) => return Err(format!("unsupported column type {ty}").into()),
            },
        })
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(Value::Null)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

// ===== Decoding into Rust types =====

/// Conversion from a decoded [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T, String> {
    Err(format!("expected {expected}, found {}", value.type_name()))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            other => mismatch("bool", other),
        }
    }
}

macro_rules! impl_from_value_int {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> Result<Self, String> {
                    let wide = value
                        .as_i64()
                        .ok_or_else(|| format!("expected integer, found {}", value.type_name()))?;
                    <$t>::try_from(wide).map_err(|e| e.to_string())
                }
            }
        )*
    };
}

impl_from_value_int!(i16, i32, i64, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        value
            .as_f64()
            .ok_or_else(|| format!("expected float, found {}", value.type_name()))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null | Value::Bytes(_) | Value::Array(_) => mismatch("text", value),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.clone().into_bytes()),
            other => mismatch("bytes", other),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::Text(s) => serde_json::from_str(s).map_err(|e| e.to_string()),
            other => Ok(other.to_json()),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.date()),
            Value::Text(s) => s.parse().map_err(|e: chrono::ParseError| e.to_string()),
            other => mismatch("date", other),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Time(t) => Ok(*t),
            Value::Text(s) => s.parse().map_err(|e: chrono::ParseError| e.to_string()),
            other => mismatch("time", other),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::Timestamp(ts) => Ok(ts.naive_utc()),
            Value::Text(s) => parse_datetime(s).map_err(|e| e.to_string()),
            other => mismatch("datetime", other),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Timestamp(ts) => Ok(*ts),
            Value::DateTime(dt) => Ok(dt.and_utc()),
            Value::Text(s) => parse_timestamp(s).map_err(|e| e.to_string()),
            other => mismatch("timestamp", other),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::Text(s) => Uuid::parse_str(s).map_err(|e| e.to_string()),
            other => mismatch("uuid", other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            other => mismatch("array", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_roundtrip(text: &str) -> String {
        let mut buf = BytesMut::new();
        encode_numeric(text, &mut buf).unwrap();
        decode_numeric(&buf).unwrap()
    }

    #[test]
    fn numeric_wire_format_preserves_decimal_text() {
        assert_eq!(numeric_roundtrip("0"), "0");
        assert_eq!(numeric_roundtrip("12345.678"), "12345.678");
        assert_eq!(numeric_roundtrip("-0.0005"), "-0.0005");
        assert_eq!(numeric_roundtrip("100000000"), "100000000");
        assert_eq!(numeric_roundtrip("42.50"), "42.50");
    }

    #[test]
    fn numeric_rejects_garbage() {
        let mut buf = BytesMut::new();
        assert!(encode_numeric("1e5", &mut buf).is_err());
        assert!(encode_numeric("abc", &mut buf).is_err());
    }

    #[test]
    fn option_and_vec_conversions() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".into()));
        assert_eq!(
            Value::from(vec![1, 2]),
            Value::Array(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn truthiness_of_driver_results() {
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::Text("0".into()).is_truthy());
        assert!(!Value::Null.is_truthy());
    }

    #[test]
    fn json_conversion_keeps_numbers_typed() {
        let json = Value::Array(vec![Value::Int(3), Value::Text("x".into())]).to_json();
        assert_eq!(json, serde_json::json!([3, "x"]));
        assert_eq!(Value::from_json(serde_json::json!(1.5)), Value::Float(1.5));
    }

    #[test]
    fn from_value_reads_numeric_strings() {
        assert_eq!(i64::from_value(&Value::Text("17".into())), Ok(17));
        assert!(i32::from_value(&Value::Bool(true)).is_ok());
        assert!(Uuid::from_value(&Value::Int(1)).is_err());
    }
}
