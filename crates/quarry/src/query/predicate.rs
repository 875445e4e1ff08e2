//! Module: query::predicate
//! Responsibility: pure predicate AST and its construction sugar.
//! Does not own: type validation or evaluation. All interpretation occurs in
//! later passes (validation, then execution).

use crate::{
    query::{expr::FieldRef, subquery::ScalarSubquery},
    value::Value,
};
use std::ops::{BitAnd, BitOr};

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
}

///
/// Operand
///
/// Right-hand side of a comparison: a literal, another field (theta joins),
/// an outer-query field (correlated subqueries only), or a scalar subquery.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Value(Value),
    Field(FieldRef),
    Outer(FieldRef),
    Subquery(Box<ScalarSubquery>),
}

/// Reference a field of the enclosing query from inside a subquery filter.
#[must_use]
pub fn outer(field: impl Into<FieldRef>) -> Operand {
    Operand::Outer(field.into())
}

///
/// Compare
///

#[derive(Clone, Debug, PartialEq)]
pub struct Compare {
    pub field: FieldRef,
    pub op: CompareOp,
    pub rhs: Operand,
}

///
/// Predicate
///
/// Immutable boolean expression tree over entity fields.
/// Built incrementally; evaluated only at query execution.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Compare(Compare),
    IsNull(FieldRef),
    IsNotNull(FieldRef),
}

impl Predicate {
    /// Conjoin with another predicate.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(vec![self, other])
    }

    /// Disjoin with another predicate.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(vec![self, other])
    }

    #[expect(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(pred: Self) -> Self {
        Self::Not(Box::new(pred))
    }

    /// General comparison form; the named constructors below cover the
    /// common literal cases.
    #[must_use]
    pub fn compare(field: impl Into<FieldRef>, op: CompareOp, rhs: Operand) -> Self {
        Self::Compare(Compare {
            field: field.into(),
            op,
            rhs,
        })
    }
}

impl BitAnd for Predicate {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::And(vec![self, rhs])
    }
}

impl BitOr for Predicate {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::Or(vec![self, rhs])
    }
}

// ---------------------------------------------------------------------
// Literal comparison constructors
// ---------------------------------------------------------------------

#[must_use]
pub fn eq(field: impl Into<FieldRef>, value: impl Into<Value>) -> Predicate {
    literal(field, CompareOp::Eq, value)
}

#[must_use]
pub fn ne(field: impl Into<FieldRef>, value: impl Into<Value>) -> Predicate {
    literal(field, CompareOp::Ne, value)
}

#[must_use]
pub fn lt(field: impl Into<FieldRef>, value: impl Into<Value>) -> Predicate {
    literal(field, CompareOp::Lt, value)
}

#[must_use]
pub fn lte(field: impl Into<FieldRef>, value: impl Into<Value>) -> Predicate {
    literal(field, CompareOp::Lte, value)
}

#[must_use]
pub fn gt(field: impl Into<FieldRef>, value: impl Into<Value>) -> Predicate {
    literal(field, CompareOp::Gt, value)
}

#[must_use]
pub fn gte(field: impl Into<FieldRef>, value: impl Into<Value>) -> Predicate {
    literal(field, CompareOp::Gte, value)
}

#[must_use]
pub fn in_(
    field: impl Into<FieldRef>,
    values: impl IntoIterator<Item = impl Into<Value>>,
) -> Predicate {
    let list = values.into_iter().map(Into::into).collect();

    Predicate::compare(field, CompareOp::In, Operand::Value(Value::List(list)))
}

#[must_use]
pub fn is_null(field: impl Into<FieldRef>) -> Predicate {
    Predicate::IsNull(field.into())
}

#[must_use]
pub fn is_not_null(field: impl Into<FieldRef>) -> Predicate {
    Predicate::IsNotNull(field.into())
}

// ---------------------------------------------------------------------
// Field and subquery comparison constructors
// ---------------------------------------------------------------------

/// Compare two fields for equality (theta-join form).
#[must_use]
pub fn eq_field(left: impl Into<FieldRef>, right: impl Into<FieldRef>) -> Predicate {
    Predicate::compare(left, CompareOp::Eq, Operand::Field(right.into()))
}

/// Compare a field against a scalar subquery result for equality.
#[must_use]
pub fn eq_sub(field: impl Into<FieldRef>, sub: ScalarSubquery) -> Predicate {
    Predicate::compare(field, CompareOp::Eq, Operand::Subquery(Box::new(sub)))
}

/// Compare a field as greater-or-equal to a scalar subquery result.
#[must_use]
pub fn gte_sub(field: impl Into<FieldRef>, sub: ScalarSubquery) -> Predicate {
    Predicate::compare(field, CompareOp::Gte, Operand::Subquery(Box::new(sub)))
}

fn literal(field: impl Into<FieldRef>, op: CompareOp, value: impl Into<Value>) -> Predicate {
    Predicate::compare(field, op, Operand::Value(value.into()))
}
