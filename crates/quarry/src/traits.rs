use crate::{
    db::{Db, ExecuteError},
    model::EntityModel,
    value::Value,
};
use serde::{Serialize, de::DeserializeOwned};

///
/// Entity
///
/// A storable record type with a static model, a `u64` primary key, and a
/// `Value` projection of each declared field (parallel to `model().fields`).
///
/// Rows are persisted CBOR-encoded; `Serialize`/`DeserializeOwned` is the
/// storage codec boundary, not a public wire format.
///

pub trait Entity: Clone + Serialize + DeserializeOwned + 'static {
    /// Static schema descriptor for this entity type.
    fn model() -> &'static EntityModel;

    /// Primary key. Unique per entity type.
    fn key(&self) -> u64;

    /// Project every declared field into a `Value`, in model field order.
    fn values(&self) -> Vec<Value>;

    /// Materialize one named relation handle from the store.
    ///
    /// Must be idempotent: hydrating an already-loaded handle is a no-op.
    /// Called by the executor for joins marked `fetch_join()`.
    fn hydrate(&mut self, relation: &str, db: &Db) -> Result<(), ExecuteError>;

    /// Look up a single field projection by name.
    fn field(&self, name: &str) -> Option<Value> {
        let index = Self::model().field_index(name)?;

        self.values().into_iter().nth(index)
    }
}
