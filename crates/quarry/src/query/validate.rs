//! Module: query::validate
//! Responsibility: bind a query intent to entity schemas and reject every
//! malformed construction before execution starts.
//! Does not own: row access. Binding is pure; it never touches the store.

use crate::{
    model::{EntityModel, RelationKind, RelationModel},
    query::{
        expr::{AggregateOp, FieldRef, Projection},
        intent::{JoinClause, JoinKind, JoinSource, Query},
        predicate::{Compare, CompareOp, Operand, Predicate},
        subquery::ScalarSubquery,
    },
    traits::Entity,
    value::{FieldKind, Value},
};
use thiserror::Error as ThisError;

///
/// ConstructError
///
/// Invalid query construction. Reported from the bind step every terminal
/// runs first; never reaches execution.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ConstructError {
    #[error("unknown alias '{alias}'")]
    UnknownAlias { alias: String },

    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    #[error("unknown relation '{relation}' on entity '{entity}'")]
    UnknownRelation {
        entity: &'static str,
        relation: String,
    },

    #[error("field '{field}' is {expected}, operand is {found}")]
    TypeMismatch {
        field: String,
        expected: FieldKind,
        found: String,
    },

    #[error("field '{field}' is not nullable; null checks are meaningless")]
    NotNullable { field: String },

    #[error("IN comparison on '{field}' requires a value list operand")]
    InListExpected { field: String },

    #[error("tuple projection requires at least one column")]
    EmptyProjection,

    #[error("column '{column}' is projected but not grouped")]
    UngroupedColumn { column: String },

    #[error("group_by requires tuple projections; use select(...)")]
    GroupRequiresProjection,

    #[error("'{field}' is not numeric; sum/avg require a numeric field")]
    NonNumericAggregate { field: String },

    #[error("tuple queries use canonical group-key order; order_by is not supported")]
    TupleOrderUnsupported,

    #[error("on(...) requires a preceding join clause")]
    OnWithoutJoin,

    #[error("fetch_join() requires a preceding join clause")]
    FetchJoinWithoutJoin,

    #[error("fetch_join() requires a relation join; entity joins have nothing to hydrate")]
    FetchJoinRequiresRelation,

    #[error("joining unrelated entity '{entity}' requires an on(...) predicate")]
    JoinRequiresOn { entity: &'static str },

    #[error("entity terminals cannot run tuple projections; use fetch_tuples()")]
    EntityTerminalOnTupleQuery,

    #[error("fetch_tuples() requires select(...) projections")]
    TupleTerminalWithoutProjection,

    #[error("outer('{field}') is only valid inside a subquery filter")]
    OuterOutsideSubquery { field: String },
}

///
/// JoinMatch
///
/// Natural foreign-key match of a bound relation join, pre-resolved to field
/// indices so the executor never re-derives schema positions.
///

#[derive(Clone, Copy, Debug)]
pub(crate) enum JoinMatch {
    /// `source[fk_index] == target key`
    BelongsTo { fk_index: usize },
    /// `target[fk_index] == source key`
    HasMany { fk_index: usize },
    /// Entity join: the `on` predicate is the sole constraint.
    Unconstrained,
}

///
/// BoundJoin
///

#[derive(Clone, Debug)]
pub(crate) struct BoundJoin {
    pub kind: JoinKind,
    pub matcher: JoinMatch,
    pub relation: Option<&'static RelationModel>,
    pub fetch: bool,
}

///
/// BoundSlot
///
/// One row slot of the bound query: slot 0 is the source entity, each join
/// adds one. The slot alias is the target entity name.
///

#[derive(Clone, Debug)]
pub(crate) struct BoundSlot {
    pub alias: &'static str,
    pub model: &'static EntityModel,
    pub join: Option<BoundJoin>,
}

///
/// Binding
///
/// Validated schema binding for one query intent. Produced by `bind`, the
/// pure construction-time boundary every terminal crosses first.
///

#[derive(Clone, Debug)]
pub(crate) struct Binding {
    pub slots: Vec<BoundSlot>,
}

impl Binding {
    fn source(model: &'static EntityModel) -> Self {
        Self {
            slots: vec![BoundSlot {
                alias: model.name,
                model,
                join: None,
            }],
        }
    }

    /// Resolve a field reference to `(slot index, field index)`.
    pub(crate) fn resolve(&self, field: &FieldRef) -> Result<(usize, usize), ConstructError> {
        let slot_index = match &field.alias {
            Some(alias) => self
                .slots
                .iter()
                .position(|slot| slot.alias == alias.as_str())
                .ok_or_else(|| ConstructError::UnknownAlias {
                    alias: alias.clone(),
                })?,
            None => 0,
        };

        let field_index = self.slots[slot_index]
            .model
            .field_index(&field.field)
            .ok_or_else(|| ConstructError::UnknownField {
                field: field.to_string(),
            })?;

        Ok((slot_index, field_index))
    }

    fn field_model(
        &self,
        field: &FieldRef,
    ) -> Result<&'static crate::model::FieldModel, ConstructError> {
        let (slot, index) = self.resolve(field)?;
        let fields: &'static [crate::model::FieldModel] = self.slots[slot].model.fields;

        Ok(&fields[index])
    }
}

/// Bind and validate one query intent. Pure; touches no rows.
pub(crate) fn bind<E: Entity>(query: &Query<E>) -> Result<Binding, ConstructError> {
    if let Some(defect) = &query.defect {
        return Err(defect.clone());
    }

    let binding = bind_joins(E::model(), &query.joins)?;

    // Join predicates may reference every slot bound so far.
    for join in &query.joins {
        if let Some(on) = &join.on {
            check_predicate(on, &binding, None)?;
        }
    }

    if let Some(predicate) = &query.predicate {
        check_predicate(predicate, &binding, None)?;
    }
    for expr in &query.order {
        binding.field_model(&expr.field)?;
    }

    check_projections(query, &binding)?;

    Ok(binding)
}

fn bind_joins(
    source: &'static EntityModel,
    joins: &[JoinClause],
) -> Result<Binding, ConstructError> {
    let mut binding = Binding::source(source);

    for join in joins {
        let slot = match &join.source {
            JoinSource::Relation(name) => {
                let relation =
                    source
                        .relation(name)
                        .ok_or_else(|| ConstructError::UnknownRelation {
                            entity: source.name,
                            relation: name.clone(),
                        })?;
                let target = (relation.target)();
                let matcher = match relation.kind {
                    RelationKind::BelongsTo => JoinMatch::BelongsTo {
                        fk_index: source.field_index(relation.fk_field).ok_or_else(|| {
                            ConstructError::UnknownField {
                                field: relation.fk_field.to_string(),
                            }
                        })?,
                    },
                    RelationKind::HasMany => JoinMatch::HasMany {
                        fk_index: target.field_index(relation.fk_field).ok_or_else(|| {
                            ConstructError::UnknownField {
                                field: relation.fk_field.to_string(),
                            }
                        })?,
                    },
                };

                BoundSlot {
                    alias: target.name,
                    model: target,
                    join: Some(BoundJoin {
                        kind: join.kind,
                        matcher,
                        relation: Some(relation),
                        fetch: join.fetch,
                    }),
                }
            }
            JoinSource::Entity(target) => {
                let target = target();
                if join.on.is_none() {
                    return Err(ConstructError::JoinRequiresOn {
                        entity: target.name,
                    });
                }
                if join.fetch {
                    return Err(ConstructError::FetchJoinRequiresRelation);
                }

                BoundSlot {
                    alias: target.name,
                    model: target,
                    join: Some(BoundJoin {
                        kind: join.kind,
                        matcher: JoinMatch::Unconstrained,
                        relation: None,
                        fetch: false,
                    }),
                }
            }
        };

        binding.slots.push(slot);
    }

    Ok(binding)
}

// ---------------------------------------------------------------------
// Predicate checking
// ---------------------------------------------------------------------

fn check_predicate(
    predicate: &Predicate,
    binding: &Binding,
    outer: Option<&Binding>,
) -> Result<(), ConstructError> {
    match predicate {
        Predicate::And(parts) | Predicate::Or(parts) => {
            for part in parts {
                check_predicate(part, binding, outer)?;
            }
            Ok(())
        }
        Predicate::Not(inner) => check_predicate(inner, binding, outer),
        Predicate::Compare(cmp) => check_compare(cmp, binding, outer),
        Predicate::IsNull(field) | Predicate::IsNotNull(field) => {
            let model = binding.field_model(field)?;
            if model.nullable {
                Ok(())
            } else {
                Err(ConstructError::NotNullable {
                    field: field.to_string(),
                })
            }
        }
    }
}

fn check_compare(
    cmp: &Compare,
    binding: &Binding,
    outer: Option<&Binding>,
) -> Result<(), ConstructError> {
    let lhs = binding.field_model(&cmp.field)?;

    if cmp.op == CompareOp::In {
        let Operand::Value(Value::List(items)) = &cmp.rhs else {
            return Err(ConstructError::InListExpected {
                field: cmp.field.to_string(),
            });
        };
        for item in items {
            check_value_operand(&cmp.field, lhs.kind, item)?;
        }

        return Ok(());
    }

    match &cmp.rhs {
        Operand::Value(value) => check_value_operand(&cmp.field, lhs.kind, value),
        Operand::Field(rhs) => {
            let rhs = binding.field_model(rhs)?;

            check_kinds(&cmp.field, lhs.kind, rhs.kind)
        }
        Operand::Outer(field) => {
            let Some(outer) = outer else {
                return Err(ConstructError::OuterOutsideSubquery {
                    field: field.to_string(),
                });
            };
            let rhs = outer.field_model(field)?;

            check_kinds(&cmp.field, lhs.kind, rhs.kind)
        }
        Operand::Subquery(sub) => {
            let result = check_subquery(sub, binding)?;

            check_kinds(&cmp.field, lhs.kind, result)
        }
    }
}

fn check_value_operand(
    field: &FieldRef,
    expected: FieldKind,
    value: &Value,
) -> Result<(), ConstructError> {
    let found = match value.kind() {
        Some(kind) => kind,
        None => {
            return Err(ConstructError::TypeMismatch {
                field: field.to_string(),
                expected,
                found: if value.is_null() { "null" } else { "list" }.to_string(),
            });
        }
    };

    check_kinds(field, expected, found)
}

fn check_kinds(
    field: &FieldRef,
    expected: FieldKind,
    found: FieldKind,
) -> Result<(), ConstructError> {
    if expected.comparable_with(found) {
        Ok(())
    } else {
        Err(ConstructError::TypeMismatch {
            field: field.to_string(),
            expected,
            found: found.to_string(),
        })
    }
}

/// Validate a scalar subquery and return its result kind.
fn check_subquery(
    sub: &ScalarSubquery,
    outer: &Binding,
) -> Result<FieldKind, ConstructError> {
    let target = (sub.target)();
    let binding = Binding::source(target);

    if let Some(predicate) = &sub.predicate {
        check_predicate(predicate, &binding, Some(outer))?;
    }

    let field_kind = match &sub.field {
        Some(name) => {
            let field_ref = FieldRef::parse(name);
            let model = binding.field_model(&field_ref)?;

            if matches!(sub.op, AggregateOp::Sum | AggregateOp::Avg) && !model.kind.is_numeric() {
                return Err(ConstructError::NonNumericAggregate {
                    field: field_ref.to_string(),
                });
            }

            Some(model.kind)
        }
        None => None,
    };

    Ok(aggregate_result_kind(sub.op, field_kind))
}

// ---------------------------------------------------------------------
// Projection checking
// ---------------------------------------------------------------------

fn check_projections<E: Entity>(
    query: &Query<E>,
    binding: &Binding,
) -> Result<(), ConstructError> {
    let Some(projections) = &query.projections else {
        if query.group_by.is_empty() {
            return Ok(());
        }

        return Err(ConstructError::GroupRequiresProjection);
    };

    if projections.is_empty() {
        return Err(ConstructError::EmptyProjection);
    }
    if !query.order.is_empty() {
        return Err(ConstructError::TupleOrderUnsupported);
    }

    for key in &query.group_by {
        binding.field_model(key)?;
    }

    for projection in projections {
        match projection {
            Projection::Column(field) => {
                binding.field_model(field)?;
                if !query.group_by.contains(field) {
                    return Err(ConstructError::UngroupedColumn {
                        column: field.to_string(),
                    });
                }
            }
            Projection::Aggregate { op, field } => {
                if let Some(field) = field {
                    let model = binding.field_model(field)?;
                    if matches!(op, AggregateOp::Sum | AggregateOp::Avg)
                        && !model.kind.is_numeric()
                    {
                        return Err(ConstructError::NonNumericAggregate {
                            field: field.to_string(),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}

/// Result kind of an aggregate: `count` is always int, `avg` always float,
/// extrema and `sum` keep the field kind.
pub(crate) const fn aggregate_result_kind(
    op: AggregateOp,
    field_kind: Option<FieldKind>,
) -> FieldKind {
    match op {
        AggregateOp::Count => FieldKind::Int,
        AggregateOp::Avg => FieldKind::Float,
        AggregateOp::Sum | AggregateOp::Max | AggregateOp::Min => match field_kind {
            Some(kind) => kind,
            None => FieldKind::Int,
        },
    }
}
