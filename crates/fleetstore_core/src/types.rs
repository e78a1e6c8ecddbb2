//! Core type definitions for fleetstore.

use crate::error::{CoreError, CoreResult};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a transaction.
///
/// Transaction IDs are monotonically increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// A property value read from or written to an entity.
///
/// The derived ordering is total: values of different kinds order by
/// variant (`Null` first), values of the same kind by content. Text
/// compares bytewise, so ordering is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// UTF-8 text.
    Text(String),
    /// 128-bit identifier.
    Uuid(Uuid),
}

impl Value {
    /// Check if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as an integer, if it is one.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a string, if it is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a UUID, if it is one.
    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(id) => Some(*id),
            _ => None,
        }
    }

    fn kind(&self) -> Option<FieldKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(FieldKind::Bool),
            Value::Integer(_) => Some(FieldKind::Integer),
            Value::Text(_) => Some(FieldKind::Text),
            Value::Uuid(_) => Some(FieldKind::Uuid),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Uuid(id) => write!(f, "{id}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Uuid(id)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Storage kind of a mapped property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// `bool`
    Bool,
    /// Any integer width that fits in `i64`.
    Integer,
    /// `String`
    Text,
    /// `Uuid`
    Uuid,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Bool => "bool",
            FieldKind::Integer => "integer",
            FieldKind::Text => "text",
            FieldKind::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

/// Declared type of a mapped property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldType {
    /// Underlying kind, with any nullability unwrapped.
    pub kind: FieldKind,
    /// Whether `Value::Null` is a legal value.
    pub nullable: bool,
}

impl FieldType {
    /// Creates a non-nullable field type.
    #[must_use]
    pub const fn required(kind: FieldKind) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }

    /// Creates a nullable field type.
    #[must_use]
    pub const fn optional(kind: FieldKind) -> Self {
        Self {
            kind,
            nullable: true,
        }
    }

    /// Converts `value` to this type.
    ///
    /// Text is parsed into integers, UUIDs and booleans; integers and
    /// UUIDs render into text. `property` only labels the error.
    pub fn coerce(&self, property: &str, value: Value) -> CoreResult<Value> {
        let Some(kind) = value.kind() else {
            return if self.nullable {
                Ok(Value::Null)
            } else {
                Err(self.conversion_error(property, &value))
            };
        };

        if kind == self.kind {
            return Ok(value);
        }

        let converted = match (&value, self.kind) {
            (Value::Text(s), FieldKind::Integer) => s.trim().parse::<i64>().ok().map(Value::Integer),
            (Value::Text(s), FieldKind::Uuid) => Uuid::parse_str(s.trim()).ok().map(Value::Uuid),
            (Value::Text(s), FieldKind::Bool) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (Value::Integer(n), FieldKind::Text) => Some(Value::Text(n.to_string())),
            (Value::Uuid(id), FieldKind::Text) => Some(Value::Text(id.to_string())),
            (Value::Bool(b), FieldKind::Text) => Some(Value::Text(b.to_string())),
            _ => None,
        };

        converted.ok_or_else(|| self.conversion_error(property, &value))
    }

    /// Parses the string form of a key component.
    ///
    /// The bare literal `null` is the null component; anything else is
    /// treated as text and coerced.
    pub fn parse(&self, property: &str, component: &str) -> CoreResult<Value> {
        if component == "null" {
            return self.coerce(property, Value::Null);
        }
        self.coerce(property, Value::Text(component.to_string()))
    }

    fn conversion_error(&self, property: &str, value: &Value) -> CoreError {
        CoreError::conversion(property, value.to_string(), self.to_string())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "{}?", self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

/// Rust types that can back a mapped property.
pub trait FieldValue: Sized {
    /// Declared type reported to the metadata provider.
    const FIELD_TYPE: FieldType;

    /// Reads the current value.
    fn to_value(&self) -> Value;

    /// Builds the Rust value, or `None` if `value` does not fit.
    ///
    /// `value` has already been coerced to `FIELD_TYPE`.
    fn from_value(value: Value) -> Option<Self>;
}

impl FieldValue for bool {
    const FIELD_TYPE: FieldType = FieldType::required(FieldKind::Bool);

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl FieldValue for i64 {
    const FIELD_TYPE: FieldType = FieldType::required(FieldKind::Integer);

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_integer()
    }
}

impl FieldValue for i32 {
    const FIELD_TYPE: FieldType = FieldType::required(FieldKind::Integer);

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_integer().and_then(|n| i32::try_from(n).ok())
    }
}

impl FieldValue for u32 {
    const FIELD_TYPE: FieldType = FieldType::required(FieldKind::Integer);

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_integer().and_then(|n| u32::try_from(n).ok())
    }
}

impl FieldValue for String {
    const FIELD_TYPE: FieldType = FieldType::required(FieldKind::Text);

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl FieldValue for Uuid {
    const FIELD_TYPE: FieldType = FieldType::required(FieldKind::Uuid);

    fn to_value(&self) -> Value {
        Value::Uuid(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_uuid()
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const FIELD_TYPE: FieldType = FieldType::optional(T::FIELD_TYPE.kind);

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn from_value(value: Value) -> Option<Self> {
        if value.is_null() {
            return Some(None);
        }
        T::from_value(value).map(Some)
    }
}
