//! Error types for fleetstore core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in fleetstore core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required argument was missing or invalid.
    #[error("invalid argument: {message}")]
    Argument {
        /// Description of the problem.
        message: String,
    },

    /// The entity type is unmapped or has no primary key.
    #[error("schema error for {entity}: {message}")]
    Schema {
        /// Rust type name of the entity.
        entity: String,
        /// Description of the problem.
        message: String,
    },

    /// A value could not be converted to the declared property type.
    #[error("cannot convert '{value}' to {target} for key '{property}'")]
    Conversion {
        /// Property the value was meant for.
        property: String,
        /// Display form of the rejected value.
        value: String,
        /// Declared target type.
        target: String,
    },

    /// No stored entity matches the key.
    #[error("entity with key {key} not found in {collection}")]
    NotFound {
        /// Collection searched.
        collection: String,
        /// Encoded composite key.
        key: String,
    },

    /// Insert of a key that is already present.
    #[error("duplicate key {key} in {collection}")]
    DuplicateKey {
        /// Collection written.
        collection: String,
        /// Encoded composite key.
        key: String,
    },

    /// A write targeted a row that no longer exists.
    #[error("concurrency conflict on {key} in {collection}: row no longer exists")]
    ConcurrencyConflict {
        /// Collection written.
        collection: String,
        /// Encoded composite key.
        key: String,
    },

    /// Transient store failure (connectivity, deadlock). Safe to retry.
    #[error("transient store error: {message}")]
    TransientStore {
        /// Description of the failure.
        message: String,
    },

    /// The execution strategy gave up after repeated transient failures.
    #[error("retry limit exceeded after {attempts} attempts: {last}")]
    RetryLimitExceeded {
        /// Number of attempts made.
        attempts: u32,
        /// The last transient error observed.
        last: Box<CoreError>,
    },

    /// Row payload could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// The context's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    /// Creates an argument error.
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument {
            message: message.into(),
        }
    }

    /// Creates a schema error for entity type `T`.
    pub fn schema<T: ?Sized>(message: impl Into<String>) -> Self {
        Self::Schema {
            entity: std::any::type_name::<T>().to_string(),
            message: message.into(),
        }
    }

    /// Creates a conversion error.
    pub fn conversion(
        property: impl Into<String>,
        value: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::Conversion {
            property: property.into(),
            value: value.into(),
            target: target.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Creates a concurrency conflict error.
    pub fn concurrency_conflict(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ConcurrencyConflict {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Creates a transient store error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientStore {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if the execution strategy may retry after this error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStore { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_store_errors_retry() {
        assert!(CoreError::transient("deadlock").is_transient());
        assert!(!CoreError::argument("x").is_transient());
        assert!(!CoreError::not_found("vehicles", "1").is_transient());
        assert!(!CoreError::Cancelled.is_transient());

        let exhausted = CoreError::RetryLimitExceeded {
            attempts: 3,
            last: Box::new(CoreError::transient("deadlock")),
        };
        assert!(!exhausted.is_transient());
    }

    #[test]
    fn not_found_names_the_key() {
        let err = CoreError::not_found("vehicles", "99");
        assert_eq!(err.to_string(), "entity with key 99 not found in vehicles");
    }

    #[test]
    fn schema_error_names_the_type() {
        struct Unmapped;
        let err = CoreError::schema::<Unmapped>("no primary key defined");
        assert!(err.to_string().contains("Unmapped"));
        assert!(err.to_string().contains("no primary key defined"));
    }
}
