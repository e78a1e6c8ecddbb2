//! Row codec for stored entities.

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Types that can be stored in a collection.
///
/// Rows are the CBOR encoding of the entity's serde representation.
/// Navigation fields filled by includes should be `#[serde(skip)]` so
/// they never reach storage.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Entity for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Encodes an entity to its stored row payload.
pub fn encode_row<T: Serialize>(entity: &T) -> CoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(entity, &mut bytes).map_err(|e| CoreError::codec(e.to_string()))?;
    Ok(bytes)
}

/// Decodes an entity from a stored row payload.
pub fn decode_row<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Part {
        id: u32,
        name: String,
        #[serde(skip)]
        loaded: Option<String>,
    }

    #[test]
    fn skipped_fields_are_not_stored() {
        let part = Part {
            id: 1,
            name: "Brake pad".into(),
            loaded: Some("vehicle".into()),
        };

        let decoded: Part = decode_row(&encode_row(&part).unwrap()).unwrap();
        assert_eq!(decoded.name, "Brake pad");
        assert_eq!(decoded.loaded, None);
    }

    #[test]
    fn deterministic_encoding() {
        let part = Part {
            id: 7,
            name: "Filter".into(),
            loaded: None,
        };
        assert_eq!(encode_row(&part).unwrap(), encode_row(&part.clone()).unwrap());
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let err = decode_row::<Part>(&[0xff, 0x00]).unwrap_err();
        assert!(matches!(err, CoreError::Codec { .. }));
    }
}
