//! Predicates over entities.

use crate::entity::{CompositeKey, PropertyDescriptor};
use crate::error::CoreResult;
use std::fmt;
use std::sync::Arc;

/// A boolean filter over entities of type `T`.
///
/// Predicates are cheap to clone and compose with [`and`](Self::and),
/// [`or`](Self::or) and [`not`](Self::not).
pub struct Predicate<T>(Arc<dyn Fn(&T) -> bool + Send + Sync>);

impl<T: 'static> Predicate<T> {
    /// Wraps a closure.
    pub fn new(f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// A predicate that accepts every entity.
    #[must_use]
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    /// A predicate that rejects every entity.
    #[must_use]
    pub fn never() -> Self {
        Self::new(|_| false)
    }

    /// Evaluates the predicate.
    pub fn matches(&self, entity: &T) -> bool {
        (self.0)(entity)
    }

    /// Both predicates must hold.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::new(move |e| self.matches(e) && other.matches(e))
    }

    /// Either predicate must hold.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::new(move |e| self.matches(e) || other.matches(e))
    }

    /// Negates the predicate.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::new(move |e| !self.matches(e))
    }

    /// Returns `filter`, or a predicate accepting everything if there is
    /// none.
    #[must_use]
    pub fn build_filter(filter: Option<Self>) -> Self {
        filter.unwrap_or_else(Self::always)
    }

    /// Builds an OR of per-key AND conjunctions: an entity matches if every
    /// key property equals the corresponding component of any one key.
    ///
    /// Each component is first converted to its property's declared type.
    /// The first component that does not convert fails the whole call.
    pub fn key_match<'k>(
        keys: impl IntoIterator<Item = &'k CompositeKey>,
        key_properties: &[&PropertyDescriptor<T>],
    ) -> CoreResult<Self> {
        let typed = keys
            .into_iter()
            .map(|key| key.clone().coerce(key_properties))
            .collect::<CoreResult<Vec<_>>>()?;
        let properties: Vec<PropertyDescriptor<T>> =
            key_properties.iter().map(|p| (*p).clone()).collect();

        Ok(Self::new(move |entity| {
            typed.iter().any(|key| {
                properties
                    .iter()
                    .zip(key.components())
                    .all(|(property, value)| property.get(entity) == *value)
            })
        }))
    }

    /// Like [`key_match`](Self::key_match), for keys in encoded string form.
    pub fn key_match_encoded<S: AsRef<str>>(
        encoded: impl IntoIterator<Item = S>,
        key_properties: &[&PropertyDescriptor<T>],
    ) -> CoreResult<Self> {
        let keys = encoded
            .into_iter()
            .map(|s| CompositeKey::parse(s.as_ref(), key_properties))
            .collect::<CoreResult<Vec<_>>>()?;
        Self::key_match(&keys, key_properties)
    }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityMetadata;
    use crate::error::CoreError;
    use crate::types::Value;

    #[derive(Debug, Clone, Default)]
    struct Part {
        vehicle_id: i64,
        slot: String,
        name: String,
    }

    fn metadata() -> EntityMetadata<Part> {
        EntityMetadata::builder("parts")
            .key("VehicleId", |p: &Part| &p.vehicle_id, |p: &mut Part| &mut p.vehicle_id)
            .key("Slot", |p: &Part| &p.slot, |p: &mut Part| &mut p.slot)
            .property("Name", |p: &Part| &p.name, |p: &mut Part| &mut p.name)
            .build()
    }

    fn part(vehicle_id: i64, slot: &str) -> Part {
        Part {
            vehicle_id,
            slot: slot.into(),
            name: String::new(),
        }
    }

    #[test]
    fn missing_filter_accepts_everything() {
        let filter = Predicate::<Part>::build_filter(None);
        assert!(filter.matches(&Part::default()));
    }

    #[test]
    fn combinators() {
        let even = Predicate::new(|p: &Part| p.vehicle_id % 2 == 0);
        let big = Predicate::new(|p: &Part| p.vehicle_id > 10);

        let both = even.clone().and(big.clone());
        assert!(both.matches(&part(12, "a")));
        assert!(!both.matches(&part(4, "a")));

        let either = even.clone().or(big);
        assert!(either.matches(&part(4, "a")));
        assert!(!either.matches(&part(3, "a")));

        assert!(even.not().matches(&part(3, "a")));
    }

    #[test]
    fn key_match_is_or_of_ands() {
        let meta = metadata();
        let key_props = meta.find_primary_key().unwrap();
        let keys = vec![
            CompositeKey::new(vec![Value::Integer(1), Value::from("front")]),
            CompositeKey::new(vec![Value::Integer(2), Value::from("rear")]),
        ];

        let predicate = Predicate::key_match(&keys, &key_props).unwrap();
        assert!(predicate.matches(&part(1, "front")));
        assert!(predicate.matches(&part(2, "rear")));
        assert!(!predicate.matches(&part(1, "rear")));
        assert!(!predicate.matches(&part(3, "front")));
    }

    #[test]
    fn encoded_keys_are_converted_to_property_types() {
        let meta = metadata();
        let key_props = meta.find_primary_key().unwrap();

        let predicate = Predicate::key_match_encoded(["7::left"], &key_props).unwrap();
        assert!(predicate.matches(&part(7, "left")));
    }

    #[test]
    fn one_bad_component_fails_the_whole_match() {
        let meta = metadata();
        let key_props = meta.find_primary_key().unwrap();

        let err = Predicate::key_match_encoded(["1::a", "x::b"], &key_props).unwrap_err();
        assert!(matches!(err, CoreError::Conversion { ref property, .. } if property == "VehicleId"));
    }
}
