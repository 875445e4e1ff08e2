//! Module: model
//! Responsibility: static schema metadata for registered entities.
//! Does not own: row storage, query validation, or execution semantics.
//! Boundary: read-only descriptors consumed by validation and the executor.

use crate::{db::ExecuteError, value::FieldKind, value::Value};

///
/// FieldModel
///
/// One declared scalar field: name, kind, nullability.
///

#[derive(Clone, Copy, Debug)]
pub struct FieldModel {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldModel {
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

///
/// RelationKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelationKind {
    /// Non-owning reference to at most one target row.
    /// The foreign-key field lives on this entity.
    BelongsTo,
    /// Owning side of a one-to-many back-reference.
    /// The foreign-key field lives on the target entity.
    HasMany,
}

///
/// RelationModel
///
/// Named relation between two entity models. The target is reached through a
/// function pointer so mutually-referencing models stay const-constructible.
///

#[derive(Clone, Copy, Debug)]
pub struct RelationModel {
    pub name: &'static str,
    pub kind: RelationKind,
    pub target: fn() -> &'static EntityModel,
    /// Field holding the foreign key: on this entity for `BelongsTo`,
    /// on the target entity for `HasMany`.
    pub fk_field: &'static str,
}

///
/// EntityModel
///
/// Static descriptor of one entity type. `decode_values` lets the executor
/// project stored rows of *other* entity types into `Value` slots without
/// knowing their Rust type (join targets are dynamic, the source is typed).
///

#[derive(Clone, Copy, Debug)]
pub struct EntityModel {
    pub name: &'static str,
    pub fields: &'static [FieldModel],
    pub relations: &'static [RelationModel],
    pub decode_values: fn(&[u8]) -> Result<Vec<Value>, ExecuteError>,
}

impl EntityModel {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationModel> {
        self.relations.iter().find(|r| r.name == name)
    }
}
