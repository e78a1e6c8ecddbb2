//! Entity types, metadata and keys.

mod codec;
mod key;
mod metadata;
mod model;

pub use codec::{decode_row, encode_row, Entity};
pub use key::{CompositeKey, KEY_DELIMITER};
pub use metadata::{EntityMetadata, EntityMetadataBuilder, PropertyDescriptor};
pub use model::{Model, ModelBuilder};
