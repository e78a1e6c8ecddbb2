//! Entity metadata: the accessor table registered once per entity type.

use crate::entity::key::CompositeKey;
use crate::error::{CoreError, CoreResult};
use crate::query::Predicate;
use crate::types::{FieldType, FieldValue, Value};
use std::fmt;
use std::sync::Arc;

type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
type Setter<T> = Arc<dyn Fn(&mut T, Value) -> CoreResult<()> + Send + Sync>;

/// One mapped property of an entity type.
pub struct PropertyDescriptor<T> {
    name: &'static str,
    field_type: FieldType,
    is_key: bool,
    get: Getter<T>,
    set: Setter<T>,
}

impl<T> PropertyDescriptor<T> {
    /// Returns the property name as registered.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the declared type.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns true if the property is part of the primary key.
    #[must_use]
    pub fn is_key(&self) -> bool {
        self.is_key
    }

    /// Reads the property from `entity`.
    pub fn get(&self, entity: &T) -> Value {
        (self.get)(entity)
    }

    /// Writes `value` to the property, converting it to the declared type.
    pub fn set(&self, entity: &mut T, value: Value) -> CoreResult<()> {
        (self.set)(entity, value)
    }
}

impl<T> Clone for PropertyDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            field_type: self.field_type,
            is_key: self.is_key,
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<T> fmt::Debug for PropertyDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("is_key", &self.is_key)
            .finish_non_exhaustive()
    }
}

/// Mapping-layer description of an entity type.
///
/// Built once per type with [`EntityMetadata::builder`] and registered in a
/// [`Model`](crate::entity::Model). Queries resolve property names against
/// this table instead of inspecting `T` at run time.
///
/// # Example
///
/// ```rust,ignore
/// let meta = EntityMetadata::builder("parts")
///     .key("id", |p: &Part| &p.id, |p: &mut Part| &mut p.id)
///     .property("serial_number", |p: &Part| &p.serial_number, |p: &mut Part| &mut p.serial_number)
///     .build();
/// ```
pub struct EntityMetadata<T> {
    collection: &'static str,
    properties: Vec<PropertyDescriptor<T>>,
    query_filter: Option<Predicate<T>>,
}

impl<T: 'static> EntityMetadata<T> {
    /// Starts describing an entity stored in `collection`.
    #[must_use]
    pub fn builder(collection: &'static str) -> EntityMetadataBuilder<T> {
        EntityMetadataBuilder {
            collection,
            properties: Vec::new(),
            query_filter: None,
        }
    }

    /// Returns the collection name.
    #[must_use]
    pub fn collection(&self) -> &'static str {
        self.collection
    }

    /// Returns every mapped property in registration order.
    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor<T>] {
        &self.properties
    }

    /// Returns the primary-key properties in declared key order.
    ///
    /// Fails with `Schema` if the type declares no key.
    pub fn find_primary_key(&self) -> CoreResult<Vec<&PropertyDescriptor<T>>> {
        let key: Vec<_> = self.properties.iter().filter(|p| p.is_key).collect();
        if key.is_empty() {
            return Err(CoreError::schema::<T>("no primary key defined"));
        }
        Ok(key)
    }

    /// Looks up a property by name, ignoring ASCII case.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor<T>> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Returns the store-level default filter, if one was registered.
    #[must_use]
    pub fn query_filter(&self) -> Option<&Predicate<T>> {
        self.query_filter.as_ref()
    }

    /// Computes the composite key of `entity`.
    pub fn key_of(&self, entity: &T) -> CoreResult<CompositeKey> {
        let values = self
            .find_primary_key()?
            .into_iter()
            .map(|p| p.get(entity))
            .collect();
        Ok(CompositeKey::new(values))
    }

    /// Overwrites every mapped property of `target` with the value in
    /// `source`. Unmapped fields are left alone.
    ///
    /// Returns true if any property changed.
    pub fn copy_values(&self, source: &T, target: &mut T) -> CoreResult<bool> {
        let mut changed = false;
        for property in &self.properties {
            let value = property.get(source);
            if property.get(target) != value {
                property.set(target, value)?;
                changed = true;
            }
        }
        Ok(changed)
    }
}

impl<T> fmt::Debug for EntityMetadata<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMetadata")
            .field("collection", &self.collection)
            .field("properties", &self.properties)
            .field("query_filter", &self.query_filter.is_some())
            .finish()
    }
}

/// Builder for [`EntityMetadata`].
pub struct EntityMetadataBuilder<T> {
    collection: &'static str,
    properties: Vec<PropertyDescriptor<T>>,
    query_filter: Option<Predicate<T>>,
}

impl<T: 'static> EntityMetadataBuilder<T> {
    /// Registers a primary-key property. Key order follows call order.
    #[must_use]
    pub fn key<F, G, M>(self, name: &'static str, get: G, get_mut: M) -> Self
    where
        F: FieldValue + 'static,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        self.push(name, true, get, get_mut)
    }

    /// Registers a non-key property.
    #[must_use]
    pub fn property<F, G, M>(self, name: &'static str, get: G, get_mut: M) -> Self
    where
        F: FieldValue + 'static,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        self.push(name, false, get, get_mut)
    }

    /// Registers a default filter applied to every query of this type
    /// unless the query opts out.
    #[must_use]
    pub fn query_filter(mut self, filter: Predicate<T>) -> Self {
        self.query_filter = Some(filter);
        self
    }

    /// Finishes the description.
    #[must_use]
    pub fn build(self) -> EntityMetadata<T> {
        EntityMetadata {
            collection: self.collection,
            properties: self.properties,
            query_filter: self.query_filter,
        }
    }

    fn push<F, G, M>(mut self, name: &'static str, is_key: bool, get: G, get_mut: M) -> Self
    where
        F: FieldValue + 'static,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        let field_type = F::FIELD_TYPE;
        let set = move |entity: &mut T, value: Value| -> CoreResult<()> {
            let coerced = field_type.coerce(name, value)?;
            let rendered = coerced.to_string();
            let typed = F::from_value(coerced)
                .ok_or_else(|| CoreError::conversion(name, rendered, field_type.to_string()))?;
            *get_mut(entity) = typed;
            Ok(())
        };

        self.properties.push(PropertyDescriptor {
            name,
            field_type,
            is_key,
            get: Arc::new(move |entity: &T| get(entity).to_value()),
            set: Arc::new(set),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Claim {
        id: i64,
        status: String,
        mileage: Option<i32>,
        attachments: Vec<String>,
    }

    fn metadata() -> EntityMetadata<Claim> {
        EntityMetadata::builder("claims")
            .key("Id", |c: &Claim| &c.id, |c: &mut Claim| &mut c.id)
            .property("Status", |c: &Claim| &c.status, |c: &mut Claim| &mut c.status)
            .property("Mileage", |c: &Claim| &c.mileage, |c: &mut Claim| &mut c.mileage)
            .build()
    }

    #[test]
    fn property_lookup_ignores_case() {
        let meta = metadata();
        assert_eq!(meta.property("status").unwrap().name(), "Status");
        assert_eq!(meta.property("MILEAGE").unwrap().name(), "Mileage");
        assert!(meta.property("unknown").is_none());
    }

    #[test]
    fn missing_key_is_a_schema_error() {
        let meta: EntityMetadata<Claim> = EntityMetadata::builder("claims")
            .property("Status", |c: &Claim| &c.status, |c: &mut Claim| &mut c.status)
            .build();

        let err = meta.find_primary_key().unwrap_err();
        assert!(matches!(err, CoreError::Schema { .. }));
        assert!(meta.key_of(&Claim::default()).is_err());
    }

    #[test]
    fn setter_converts_values() {
        let meta = metadata();
        let mut claim = Claim::default();

        meta.property("mileage")
            .unwrap()
            .set(&mut claim, Value::from("1200"))
            .unwrap();
        assert_eq!(claim.mileage, Some(1200));

        meta.property("mileage")
            .unwrap()
            .set(&mut claim, Value::Null)
            .unwrap();
        assert_eq!(claim.mileage, None);

        let err = meta
            .property("mileage")
            .unwrap()
            .set(&mut claim, Value::Integer(i64::MAX))
            .unwrap_err();
        assert!(matches!(err, CoreError::Conversion { .. }));
    }

    #[test]
    fn copy_values_leaves_unmapped_fields() {
        let meta = metadata();
        let source = Claim {
            id: 1,
            status: "Accepted".into(),
            mileage: Some(10),
            attachments: vec![],
        };
        let mut target = Claim {
            id: 1,
            status: "Pending".into(),
            mileage: None,
            attachments: vec!["photo.png".into()],
        };

        assert!(meta.copy_values(&source, &mut target).unwrap());
        assert_eq!(target.status, "Accepted");
        assert_eq!(target.mileage, Some(10));
        assert_eq!(target.attachments, vec!["photo.png".to_string()]);

        assert!(!meta.copy_values(&source, &mut target).unwrap());
    }

    #[test]
    fn key_follows_declared_order() {
        let meta = metadata();
        let claim = Claim {
            id: 9,
            ..Claim::default()
        };
        assert_eq!(meta.key_of(&claim).unwrap(), CompositeKey::from(9i64));
    }
}
