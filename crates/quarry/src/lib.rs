//! Typed, fluent query engine over an in-memory relational store.
//!
//! Entities declare a static schema model; sessions expose a chainable
//! query surface (filter, join, group, order, window) whose intents are
//! validated in full before a single row is touched, then executed against
//! per-entity row stores.

pub mod db;
pub mod error;
pub mod model;
pub mod obs;
pub mod query;
pub mod relation;
pub mod response;
pub mod traits;
pub mod value;

pub(crate) mod executor;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use error::Error;

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        db::{Db, ExecuteError, Session},
        error::Error,
        model::{EntityModel, FieldModel, RelationKind, RelationModel},
        query::{
            ConstructError, SelectQuery,
            expr::{asc, avg, col, count, desc, max, min, sum},
            predicate::{
                Predicate, eq, eq_field, eq_sub, gt, gte, gte_sub, in_, is_not_null, is_null, lt,
                lte, ne, outer,
            },
            subquery::scalar,
        },
        relation::{BelongsTo, HasMany},
        response::{Page, ResponseError, Tuple},
        traits::Entity,
        value::{FieldKind, Float64, Value},
    };
}
