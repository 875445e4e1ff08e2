//! Module: relation
//! Responsibility: explicit lazy relation handles carried on entity values.
//! Does not own: join planning or store access; hydration is driven by the
//! owning entity's `Entity::hydrate`.
//!
//! A handle is either "not yet loaded" or holds materialized rows. There is
//! no on-access loading: resolution happens only through an explicit hydrate
//! call, so a serialized row never drags related rows with it.

use crate::traits::Entity;
use serde::{Deserialize, Serialize};

///
/// BelongsTo
///
/// Non-owning reference to at most one target row, keyed by the target's
/// primary key. Only the key is serialized; the loaded row is transient.
///

// Only the key crosses the codec; no serde bounds on `E`, which would be
// unsatisfiable for mutually-referencing schemas.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(bound = "")]
pub struct BelongsTo<E: Entity> {
    key: Option<u64>,
    #[serde(skip)]
    loaded: Option<Box<E>>,
}

impl<E: Entity> BelongsTo<E> {
    #[must_use]
    pub const fn new(key: Option<u64>) -> Self {
        Self { key, loaded: None }
    }

    #[must_use]
    pub const fn none() -> Self {
        Self::new(None)
    }

    #[must_use]
    pub const fn key(&self) -> Option<u64> {
        self.key
    }

    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// The loaded target row, or `None` when unloaded or keyless.
    #[must_use]
    pub fn get(&self) -> Option<&E> {
        self.loaded.as_deref()
    }

    /// Attach a materialized target row. Idempotent under repeated hydration.
    pub fn set_loaded(&mut self, entity: E) {
        self.loaded = Some(Box::new(entity));
    }
}

impl<E: Entity> From<u64> for BelongsTo<E> {
    fn from(key: u64) -> Self {
        Self::new(Some(key))
    }
}

///
/// HasMany
///
/// One-to-many back-reference. Membership is derived from the foreign key on
/// the target side, so nothing is serialized at all; the handle only caches
/// hydrated rows.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(bound = "")]
pub struct HasMany<E: Entity> {
    #[serde(skip)]
    loaded: Option<Vec<E>>,
}

impl<E: Entity> Default for HasMany<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> HasMany<E> {
    #[must_use]
    pub const fn new() -> Self {
        Self { loaded: None }
    }

    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// The loaded rows, or `None` when not yet hydrated.
    #[must_use]
    pub fn get(&self) -> Option<&[E]> {
        self.loaded.as_deref()
    }

    pub fn set_loaded(&mut self, rows: Vec<E>) {
        self.loaded = Some(rows);
    }
}
