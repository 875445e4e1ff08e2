mod session;
mod store;


use crate::{
    model::{EntityModel, RelationKind},
    traits::Entity,
    value::Value,
};
use std::{cell::RefCell, collections::BTreeMap};
use thiserror::Error as ThisError;

pub use session::Session;
pub use store::{RowStore, decode, decode_values_of, encode};

///
/// ExecuteError
///
/// Execution-time failure: store access, codec, or relation constraint.
/// Propagated to the caller unmodified; never retried.
///

#[derive(Debug, ThisError)]
pub enum ExecuteError {
    #[error("entity '{entity}' is not registered with this database")]
    UnregisteredEntity { entity: &'static str },

    #[error("row codec failure: {message}")]
    Codec { message: String },

    #[error("duplicate key {key} for entity '{entity}'")]
    DuplicateKey { entity: &'static str, key: u64 },

    #[error("key {key} not found for entity '{entity}'")]
    KeyNotFound { entity: &'static str, key: u64 },

    #[error("foreign key violation: {entity}.{field} references missing {target} row {key}")]
    ForeignKeyMissing {
        entity: &'static str,
        field: &'static str,
        target: &'static str,
        key: u64,
    },

    #[error("delete restricted: {target} row {key} is still referenced by {entity}.{field}")]
    ForeignKeyRestrict {
        entity: &'static str,
        field: &'static str,
        target: &'static str,
        key: u64,
    },

    #[error("unknown relation '{relation}' on entity '{entity}'")]
    UnknownRelation {
        entity: &'static str,
        relation: String,
    },

    #[error("executor invariant violated: {message}")]
    Invariant { message: String },
}

impl ExecuteError {
    /// Construct an executor-origin invariant violation.
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}

///
/// Db
///
/// Registry of per-entity row stores plus their models.
///
/// Interior mutability only; the handle is deliberately not `Sync`. Queries
/// run synchronously within the scope of one `Session` at a time.
///

#[derive(Debug, Default)]
pub struct Db {
    stores: RefCell<BTreeMap<&'static str, RowStore>>,
    models: Vec<&'static EntityModel>,
}

impl Db {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type, creating its (empty) row store.
    #[must_use]
    pub fn register<E: Entity>(mut self) -> Self {
        let model = E::model();

        self.stores.borrow_mut().insert(model.name, RowStore::new());
        self.models.push(model);
        self
    }

    /// Open a scoped session over this database.
    ///
    /// The session borrows the store registry and releases it when dropped,
    /// on every exit path.
    #[must_use]
    pub const fn session(&self) -> Session<'_> {
        Session::new(self)
    }

    #[must_use]
    pub fn models(&self) -> &[&'static EntityModel] {
        &self.models
    }

    // ---------------------------------------------------------------------
    // Store access
    // ---------------------------------------------------------------------

    pub(crate) fn with_store<R>(
        &self,
        entity: &'static str,
        f: impl FnOnce(&RowStore) -> Result<R, ExecuteError>,
    ) -> Result<R, ExecuteError> {
        let stores = self.stores.borrow();
        let store = stores
            .get(entity)
            .ok_or(ExecuteError::UnregisteredEntity { entity })?;

        f(store)
    }

    pub(crate) fn with_store_mut<R>(
        &self,
        entity: &'static str,
        f: impl FnOnce(&mut RowStore) -> Result<R, ExecuteError>,
    ) -> Result<R, ExecuteError> {
        let mut stores = self.stores.borrow_mut();
        let store = stores
            .get_mut(entity)
            .ok_or(ExecuteError::UnregisteredEntity { entity })?;

        f(store)
    }

    // ---------------------------------------------------------------------
    // Typed row access
    // ---------------------------------------------------------------------

    /// Load one row by primary key.
    pub fn get<E: Entity>(&self, key: u64) -> Result<Option<E>, ExecuteError> {
        self.with_store(E::model().name, |rows| {
            rows.get(key).map(decode::<E>).transpose()
        })
    }

    /// Decode every row of an entity type, in key order.
    pub fn scan<E: Entity>(&self) -> Result<Vec<E>, ExecuteError> {
        self.with_store(E::model().name, |rows| {
            rows.iter().map(|(_, bytes)| decode::<E>(bytes)).collect()
        })
    }

    /// Project every row of a model into `(key, field values)`, in key order.
    /// Used for join targets, whose Rust type the executor does not know.
    pub(crate) fn scan_values(
        &self,
        model: &'static EntityModel,
    ) -> Result<Vec<(u64, Vec<Value>)>, ExecuteError> {
        self.with_store(model.name, |rows| {
            rows.iter()
                .map(|(key, bytes)| Ok((key, (model.decode_values)(bytes)?)))
                .collect()
        })
    }

    // ---------------------------------------------------------------------
    // Writes (relation constraints enforced here, not in the session)
    // ---------------------------------------------------------------------

    pub(crate) fn insert_row<E: Entity>(&self, entity: &E) -> Result<(), ExecuteError> {
        let model = E::model();
        let key = entity.key();

        self.check_foreign_keys(entity)?;

        self.with_store_mut(model.name, |rows| {
            if rows.contains_key(key) {
                return Err(ExecuteError::DuplicateKey {
                    entity: model.name,
                    key,
                });
            }
            rows.insert(key, encode(entity)?);

            Ok(())
        })
    }

    pub(crate) fn delete_row<E: Entity>(&self, key: u64) -> Result<(), ExecuteError> {
        let model = E::model();

        self.check_restrict(model, key)?;

        self.with_store_mut(model.name, |rows| {
            rows.remove(key)
                .map(|_| ())
                .ok_or(ExecuteError::KeyNotFound {
                    entity: model.name,
                    key,
                })
        })
    }

    // Every belongs-to key on the new row must reference an existing target.
    fn check_foreign_keys<E: Entity>(&self, entity: &E) -> Result<(), ExecuteError> {
        let model = E::model();

        for relation in model.relations {
            if relation.kind != RelationKind::BelongsTo {
                continue;
            }
            let Some(Value::Int(fk)) = entity.field(relation.fk_field) else {
                continue;
            };
            let target = (relation.target)();
            let key = u64::try_from(fk).map_err(|_| ExecuteError::ForeignKeyMissing {
                entity: model.name,
                field: relation.fk_field,
                target: target.name,
                key: 0,
            })?;

            let exists = self.with_store(target.name, |rows| Ok(rows.contains_key(key)))?;
            if !exists {
                return Err(ExecuteError::ForeignKeyMissing {
                    entity: model.name,
                    field: relation.fk_field,
                    target: target.name,
                    key,
                });
            }
        }

        Ok(())
    }

    // Restrict semantics: a referenced row cannot be deleted while any
    // registered entity still holds its key in a belongs-to field.
    #[allow(clippy::cast_possible_wrap)]
    fn check_restrict(
        &self,
        target: &'static EntityModel,
        key: u64,
    ) -> Result<(), ExecuteError> {
        for model in &self.models {
            for relation in model.relations {
                if relation.kind != RelationKind::BelongsTo
                    || (relation.target)().name != target.name
                {
                    continue;
                }
                let Some(fk_index) = model.field_index(relation.fk_field) else {
                    continue;
                };

                let referenced = self.scan_values(model)?.into_iter().any(|(_, values)| {
                    values.get(fk_index) == Some(&Value::Int(key as i64))
                });
                if referenced {
                    return Err(ExecuteError::ForeignKeyRestrict {
                        entity: model.name,
                        field: relation.fk_field,
                        target: target.name,
                        key,
                    });
                }
            }
        }

        Ok(())
    }
}
