//! Model: the entity metadata provider.

use crate::entity::codec::Entity;
use crate::entity::metadata::{EntityMetadata, PropertyDescriptor};
use crate::error::{CoreError, CoreResult};
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Registry from entity type to its metadata.
///
/// Built once at startup and shared read-only by every context.
#[derive(Default)]
pub struct Model {
    entities: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Model {
    /// Starts building a model.
    #[must_use]
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    /// Returns the metadata for `T`.
    ///
    /// Fails with `Schema` if `T` was never registered.
    pub fn entity<T: Entity>(&self) -> CoreResult<Arc<EntityMetadata<T>>> {
        self.entities
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|meta| meta.downcast::<EntityMetadata<T>>().ok())
            .ok_or_else(|| CoreError::schema::<T>("entity type is not mapped"))
    }

    /// Returns `T`'s primary-key property names and types in key order.
    pub fn find_primary_key<T: Entity>(&self) -> CoreResult<Vec<PropertyDescriptor<T>>> {
        let meta = self.entity::<T>()?;
        let key = meta.find_primary_key()?.into_iter().cloned().collect();
        Ok(key)
    }

    /// Returns the number of registered entity types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("entities", &self.entities.len())
            .finish()
    }
}

/// Builder for [`Model`].
#[derive(Default)]
pub struct ModelBuilder {
    entities: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    collections: HashSet<&'static str>,
    duplicate: Option<&'static str>,
}

impl ModelBuilder {
    /// Registers the metadata for `T`. A later registration for the same
    /// type replaces the earlier one.
    #[must_use]
    pub fn entity<T: Entity>(mut self, metadata: EntityMetadata<T>) -> Self {
        let collection = metadata.collection();
        let replaced = self
            .entities
            .insert(TypeId::of::<T>(), Arc::new(metadata))
            .is_some();
        if !replaced && !self.collections.insert(collection) {
            self.duplicate.get_or_insert(collection);
        }
        self
    }

    /// Finishes the model.
    ///
    /// Fails with `Schema` if two entity types share a collection name.
    pub fn build(self) -> CoreResult<Model> {
        if let Some(collection) = self.duplicate {
            return Err(CoreError::schema::<Model>(format!(
                "collection '{collection}' is mapped by more than one entity type"
            )));
        }
        Ok(Model {
            entities: self.entities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Customer {
        id: i64,
        name: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Unmapped {
        id: i64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Other {
        id: i64,
    }

    fn customers() -> EntityMetadata<Customer> {
        EntityMetadata::builder("customers")
            .key("id", |c: &Customer| &c.id, |c: &mut Customer| &mut c.id)
            .property("name", |c: &Customer| &c.name, |c: &mut Customer| &mut c.name)
            .build()
    }

    #[test]
    fn resolves_registered_types() {
        let model = Model::builder().entity(customers()).build().unwrap();
        assert_eq!(model.len(), 1);

        let meta = model.entity::<Customer>().unwrap();
        assert_eq!(meta.collection(), "customers");

        let key = model.find_primary_key::<Customer>().unwrap();
        assert_eq!(key.len(), 1);
        assert_eq!(key[0].name(), "id");
    }

    #[test]
    fn unmapped_type_is_a_schema_error() {
        let model = Model::builder().entity(customers()).build().unwrap();
        assert!(matches!(
            model.entity::<Unmapped>(),
            Err(CoreError::Schema { .. })
        ));
        assert!(matches!(
            model.find_primary_key::<Unmapped>(),
            Err(CoreError::Schema { .. })
        ));
    }

    #[test]
    fn shared_collection_names_are_rejected() {
        let other = EntityMetadata::builder("customers")
            .key("id", |o: &Other| &o.id, |o: &mut Other| &mut o.id)
            .build();

        let result = Model::builder().entity(customers()).entity(other).build();
        assert!(matches!(result, Err(CoreError::Schema { .. })));
    }
}
