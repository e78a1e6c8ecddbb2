//! Composite primary keys.

use crate::entity::metadata::PropertyDescriptor;
use crate::error::{CoreError, CoreResult};
use crate::types::Value;
use std::fmt;
use uuid::Uuid;

/// Separator between components in the encoded form.
pub const KEY_DELIMITER: &str = "::";

/// Ordered tuple of primary-key values identifying one entity.
///
/// Maps and sets key on the structured tuple, never on the encoded string,
/// so component text containing the delimiter cannot collide. The
/// `Display` form joins components with `::`; `\` and `:` inside text are
/// escaped with `\`, and text equal to `null` is written `\null` so that
/// the bare literal stays reserved for `Value::Null`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeKey(Vec<Value>);

impl CompositeKey {
    /// Creates a key from its components in declared key order.
    #[must_use]
    pub fn new(components: Vec<Value>) -> Self {
        Self(components)
    }

    /// Returns the components.
    #[must_use]
    pub fn components(&self) -> &[Value] {
        &self.0
    }

    /// Returns the number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the key has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if any component is null.
    #[must_use]
    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }

    /// Returns the encoded string form.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Converts each component to the declared type of its key property.
    ///
    /// Fails with `Argument` on an arity mismatch and with `Conversion` on
    /// the first component that does not fit.
    pub fn coerce<T>(self, key_properties: &[&PropertyDescriptor<T>]) -> CoreResult<Self> {
        if self.0.len() != key_properties.len() {
            return Err(CoreError::argument(format!(
                "key {self} has {} components, expected {}",
                self.0.len(),
                key_properties.len()
            )));
        }

        self.0
            .into_iter()
            .zip(key_properties)
            .map(|(value, property)| property.field_type().coerce(property.name(), value))
            .collect::<CoreResult<Vec<_>>>()
            .map(Self)
    }

    /// Parses an encoded key and converts each component to the declared
    /// type of its key property.
    pub fn parse<T>(encoded: &str, key_properties: &[&PropertyDescriptor<T>]) -> CoreResult<Self> {
        let components = split_components(encoded)?;
        if components.len() != key_properties.len() {
            return Err(CoreError::argument(format!(
                "key '{encoded}' has {} components, expected {}",
                components.len(),
                key_properties.len()
            )));
        }

        components
            .into_iter()
            .zip(key_properties)
            .map(|(component, property)| match component {
                Component::Null => property.field_type().coerce(property.name(), Value::Null),
                Component::Text(text) => property
                    .field_type()
                    .coerce(property.name(), Value::Text(text)),
            })
            .collect::<CoreResult<Vec<_>>>()
            .map(Self)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(KEY_DELIMITER)?;
            }
            match component {
                Value::Text(text) if text == "null" => f.write_str("\\null")?,
                Value::Text(text) => {
                    for c in text.chars() {
                        if c == '\\' || c == ':' {
                            f.write_str("\\")?;
                        }
                        write!(f, "{c}")?;
                    }
                }
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

impl From<Value> for CompositeKey {
    fn from(value: Value) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<Value>> for CompositeKey {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl From<i64> for CompositeKey {
    fn from(n: i64) -> Self {
        Value::Integer(n).into()
    }
}

impl From<i32> for CompositeKey {
    fn from(n: i32) -> Self {
        Value::from(n).into()
    }
}

impl From<Uuid> for CompositeKey {
    fn from(id: Uuid) -> Self {
        Value::Uuid(id).into()
    }
}

impl From<&str> for CompositeKey {
    fn from(s: &str) -> Self {
        Value::from(s).into()
    }
}

enum Component {
    Null,
    Text(String),
}

fn split_components(encoded: &str) -> CoreResult<Vec<Component>> {
    let mut components = Vec::new();
    let mut current = String::new();
    let mut escaped_any = false;
    let mut chars = encoded.chars().peekable();

    let finish = |current: &mut String, escaped_any: &mut bool, out: &mut Vec<Component>| {
        let text = std::mem::take(current);
        if text == "null" && !*escaped_any {
            out.push(Component::Null);
        } else {
            out.push(Component::Text(text));
        }
        *escaped_any = false;
    };

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let next = chars.next().ok_or_else(|| {
                    CoreError::argument(format!("key '{encoded}' ends with a dangling escape"))
                })?;
                if next == 'n' {
                    // `\null` marks literal text "null"
                    let rest: String = chars.by_ref().take(3).collect();
                    if rest != "ull" {
                        return Err(CoreError::argument(format!(
                            "key '{encoded}' contains an invalid escape"
                        )));
                    }
                    current.push_str("null");
                } else {
                    current.push(next);
                }
                escaped_any = true;
            }
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                finish(&mut current, &mut escaped_any, &mut components);
            }
            ':' => {
                return Err(CoreError::argument(format!(
                    "key '{encoded}' contains an unescaped ':'"
                )));
            }
            other => current.push(other),
        }
    }
    finish(&mut current, &mut escaped_any, &mut components);

    Ok(components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::metadata::EntityMetadata;

    #[derive(Debug, Clone, Default)]
    struct Line {
        order_id: i64,
        sku: String,
        note: Option<String>,
    }

    fn metadata() -> EntityMetadata<Line> {
        EntityMetadata::builder("lines")
            .key("order_id", |l: &Line| &l.order_id, |l: &mut Line| &mut l.order_id)
            .key("sku", |l: &Line| &l.sku, |l: &mut Line| &mut l.sku)
            .property("note", |l: &Line| &l.note, |l: &mut Line| &mut l.note)
            .build()
    }

    #[test]
    fn encodes_with_delimiter() {
        let key = CompositeKey::new(vec![Value::Integer(7), Value::from("A-1")]);
        assert_eq!(key.encode(), "7::A-1");
    }

    #[test]
    fn delimiter_inside_text_does_not_collide() {
        let a = CompositeKey::new(vec![Value::from("x::y"), Value::from("z")]);
        let b = CompositeKey::new(vec![Value::from("x"), Value::from("y::z")]);
        assert_ne!(a, b);
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn parse_reverses_encode() {
        let meta = metadata();
        let key_props = meta.find_primary_key().unwrap();

        let key = CompositeKey::new(vec![Value::Integer(12), Value::from("a::b\\c")]);
        let parsed = CompositeKey::parse(&key.encode(), &key_props).unwrap();
        assert_eq!(parsed, key);

        let null_text = CompositeKey::new(vec![Value::Integer(1), Value::from("null")]);
        let parsed = CompositeKey::parse(&null_text.encode(), &key_props).unwrap();
        assert_eq!(parsed, null_text);
    }

    #[test]
    fn parse_converts_to_declared_types() {
        let meta = metadata();
        let key_props = meta.find_primary_key().unwrap();

        let err = CompositeKey::parse("abc::sku", &key_props).unwrap_err();
        assert!(matches!(err, CoreError::Conversion { ref property, .. } if property == "order_id"));

        let err = CompositeKey::parse("null::sku", &key_props).unwrap_err();
        assert!(matches!(err, CoreError::Conversion { .. }));
    }

    #[test]
    fn arity_mismatch_is_an_argument_error() {
        let meta = metadata();
        let key_props = meta.find_primary_key().unwrap();

        assert!(matches!(
            CompositeKey::parse("1", &key_props),
            Err(CoreError::Argument { .. })
        ));
        assert!(matches!(
            CompositeKey::from(1i64).coerce(&key_props),
            Err(CoreError::Argument { .. })
        ));
    }

    #[test]
    fn coerce_turns_text_into_integers() {
        let meta = metadata();
        let key_props = meta.find_primary_key().unwrap();

        let key = CompositeKey::new(vec![Value::from("5"), Value::from("s")])
            .coerce(&key_props)
            .unwrap();
        assert_eq!(key.components()[0], Value::Integer(5));
    }
}
