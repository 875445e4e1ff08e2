mod compare;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

pub use compare::compare_values;

///
/// Float64
///
/// Total-ordered wrapper around `f64` so `Value` can be `Eq`/`Ord`.
/// Ordering and equality follow IEEE-754 `total_cmp`.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct Float64(f64);

impl Float64 {
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for Float64 {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Float64 {}

impl PartialOrd for Float64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Float64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for Float64 {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Float64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

///
/// FieldKind
///
/// Declared scalar type of an entity field. Drives construction-time
/// operator/operand compatibility checks.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    Bool,
    Float,
    Int,
    Text,
}

impl FieldKind {
    /// True when values of both kinds may be compared with ordering
    /// operators. Int and Float form one numeric family.
    #[must_use]
    pub const fn comparable_with(self, other: Self) -> bool {
        match (self, other) {
            (Self::Int | Self::Float, Self::Int | Self::Float) => true,
            (a, b) => matches!((a, b), (Self::Bool, Self::Bool) | (Self::Text, Self::Text)),
        }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Bool => "bool",
            Self::Float => "float",
            Self::Int => "int",
            Self::Text => "text",
        };
        write!(f, "{label}")
    }
}

///
/// Value
///
/// Tagged scalar used for predicate operands, projections, and group keys.
///
/// Null → the field's value is `Option::None`.
/// List → ordered operand list for `In`; never stored in a field.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Value {
    Bool(bool),
    Float(Float64),
    Int(i64),
    List(Vec<Self>),
    Null,
    Text(String),
}

impl Value {
    /// Scalar kind of this value, if it has one.
    /// `Null` and `List` carry no field kind.
    #[must_use]
    pub const fn kind(&self) -> Option<FieldKind> {
        match self {
            Self::Bool(_) => Some(FieldKind::Bool),
            Self::Float(_) => Some(FieldKind::Float),
            Self::Int(_) => Some(FieldKind::Int),
            Self::Text(_) => Some(FieldKind::Text),
            Self::List(_) | Self::Null => None,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of this value, if it is numeric.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(f.get()),
            _ => None,
        }
    }

    // Type rank for the total order: Null < Bool < Int < Float < Text < List.
    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Float(_) => 3,
            Self::Text(_) => 4,
            Self::List(_) => 5,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        compare::total_cmp(self, other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Null => write!(f, "null"),
            Self::Text(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for Value {
    #[allow(clippy::cast_possible_wrap)]
    fn from(value: u64) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(Float64::new(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
