//! Module: db::store
//! Responsibility: per-entity row storage and the row codec.
//! Does not own: schema checks, relation constraints, or query semantics.
//! Boundary: raw `key -> bytes` rows; everything above decodes through here.

use crate::{db::ExecuteError, traits::Entity, value::Value};
use std::collections::BTreeMap;

///
/// RowStore
///
/// Ordered rows for a single entity type, keyed by primary key.
/// Values are CBOR-encoded entity rows.
///

#[derive(Debug, Default)]
pub struct RowStore {
    rows: BTreeMap<u64, Vec<u8>>,
}

impl RowStore {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: u64, bytes: Vec<u8>) -> Option<Vec<u8>> {
        self.rows.insert(key, bytes)
    }

    #[must_use]
    pub fn get(&self, key: u64) -> Option<&[u8]> {
        self.rows.get(&key).map(Vec::as_slice)
    }

    pub fn remove(&mut self, key: u64) -> Option<Vec<u8>> {
        self.rows.remove(&key)
    }

    #[must_use]
    pub fn contains_key(&self, key: u64) -> bool {
        self.rows.contains_key(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows in key order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[u8])> {
        self.rows.iter().map(|(key, bytes)| (*key, bytes.as_slice()))
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

/// Encode one entity row for storage.
pub fn encode<E: Entity>(entity: &E) -> Result<Vec<u8>, ExecuteError> {
    serde_cbor::to_vec(entity).map_err(|err| ExecuteError::Codec {
        message: err.to_string(),
    })
}

/// Decode one stored row back into its entity type.
pub fn decode<E: Entity>(bytes: &[u8]) -> Result<E, ExecuteError> {
    serde_cbor::from_slice(bytes).map_err(|err| ExecuteError::Codec {
        message: err.to_string(),
    })
}

/// Decode one stored row into its field `Value` projection.
///
/// Named-function form so entity models can carry it as a plain `fn` pointer
/// (`EntityModel::decode_values`).
pub fn decode_values_of<E: Entity>(bytes: &[u8]) -> Result<Vec<Value>, ExecuteError> {
    decode::<E>(bytes).map(|entity| entity.values())
}
