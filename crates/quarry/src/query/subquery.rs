//! Module: query::subquery
//! Responsibility: scalar aggregate subquery intent.
//! Does not own: evaluation; the executor computes the scalar at run time,
//! once per execution when uncorrelated, once per outer row when correlated.

use crate::{
    model::EntityModel,
    query::{
        expr::AggregateOp,
        predicate::{Operand, Predicate},
    },
    traits::Entity,
};

///
/// ScalarSubquery
///
/// A one-value query over another (or the same) entity: an aggregate over a
/// field, optionally filtered. Usable as the right-hand side of an outer
/// comparison. A filter referencing `outer(...)` fields makes it correlated.
///

#[derive(Clone, Debug)]
pub struct ScalarSubquery {
    pub target: fn() -> &'static EntityModel,
    pub op: AggregateOp,
    pub field: Option<String>,
    pub predicate: Option<Predicate>,
}

// Structural equality on the resolved target model, not the fn pointer;
// pointer identity is not stable across codegen units.
impl PartialEq for ScalarSubquery {
    fn eq(&self, other: &Self) -> bool {
        (self.target)().name == (other.target)().name
            && self.op == other.op
            && self.field == other.field
            && self.predicate == other.predicate
    }
}

impl ScalarSubquery {
    /// True when the filter references fields of the enclosing query.
    #[must_use]
    pub fn is_correlated(&self) -> bool {
        self.predicate.as_ref().is_some_and(references_outer)
    }
}

fn references_outer(predicate: &Predicate) -> bool {
    match predicate {
        Predicate::And(parts) | Predicate::Or(parts) => parts.iter().any(references_outer),
        Predicate::Not(inner) => references_outer(inner),
        Predicate::Compare(cmp) => matches!(cmp.rhs, Operand::Outer(_)),
        Predicate::IsNull(_) | Predicate::IsNotNull(_) => false,
    }
}

///
/// SubqueryBuilder
///
/// Fluent construction: `scalar::<Member>().filter(...).max("age")`.
///

#[derive(Debug)]
pub struct SubqueryBuilder {
    target: fn() -> &'static EntityModel,
    predicate: Option<Predicate>,
}

impl SubqueryBuilder {
    /// Add a filter, implicitly AND-ing with any existing filter.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = match self.predicate.take() {
            Some(existing) => Some(existing & predicate),
            None => Some(predicate),
        };
        self
    }

    #[must_use]
    pub fn max(self, field: impl Into<String>) -> ScalarSubquery {
        self.terminal(AggregateOp::Max, Some(field.into()))
    }

    #[must_use]
    pub fn min(self, field: impl Into<String>) -> ScalarSubquery {
        self.terminal(AggregateOp::Min, Some(field.into()))
    }

    #[must_use]
    pub fn avg(self, field: impl Into<String>) -> ScalarSubquery {
        self.terminal(AggregateOp::Avg, Some(field.into()))
    }

    #[must_use]
    pub fn sum(self, field: impl Into<String>) -> ScalarSubquery {
        self.terminal(AggregateOp::Sum, Some(field.into()))
    }

    #[must_use]
    pub fn count(self) -> ScalarSubquery {
        self.terminal(AggregateOp::Count, None)
    }

    fn terminal(self, op: AggregateOp, field: Option<String>) -> ScalarSubquery {
        ScalarSubquery {
            target: self.target,
            op,
            field,
            predicate: self.predicate,
        }
    }
}

/// Begin a scalar subquery over `E`.
#[must_use]
pub fn scalar<E: Entity>() -> SubqueryBuilder {
    SubqueryBuilder {
        target: E::model,
        predicate: None,
    }
}
