//! Module: query::expr
//! Responsibility: field references, orderings, and projection expressions.
//! Does not own: schema resolution or evaluation; both happen later.

use std::fmt;

///
/// FieldRef
///
/// Textual field reference, optionally alias-qualified (`"team.name"`).
/// Unqualified references resolve against the query's source entity.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldRef {
    pub alias: Option<String>,
    pub field: String,
}

impl FieldRef {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('.') {
            Some((alias, field)) => Self {
                alias: Some(alias.to_string()),
                field: field.to_string(),
            },
            None => Self {
                alias: None,
                field: raw.to_string(),
            },
        }
    }
}

impl From<&str> for FieldRef {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{alias}.{}", self.field),
            None => write!(f, "{}", self.field),
        }
    }
}

///
/// SortDir
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortDir {
    Asc,
    Desc,
}

///
/// NullOrder
///
/// Placement of null sort keys relative to all non-null keys.
/// Defaults to `First`, consistent with the canonical value order
/// where null ranks lowest.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NullOrder {
    First,
    Last,
}

///
/// OrderExpr
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderExpr {
    pub field: FieldRef,
    pub dir: SortDir,
    pub nulls: NullOrder,
}

impl OrderExpr {
    #[must_use]
    pub fn new(field: impl Into<FieldRef>, dir: SortDir) -> Self {
        Self {
            field: field.into(),
            dir,
            nulls: NullOrder::First,
        }
    }

    #[must_use]
    pub const fn nulls_first(mut self) -> Self {
        self.nulls = NullOrder::First;
        self
    }

    #[must_use]
    pub const fn nulls_last(mut self) -> Self {
        self.nulls = NullOrder::Last;
        self
    }
}

/// Ascending ordering on a field.
#[must_use]
pub fn asc(field: impl Into<FieldRef>) -> OrderExpr {
    OrderExpr::new(field, SortDir::Asc)
}

/// Descending ordering on a field.
#[must_use]
pub fn desc(field: impl Into<FieldRef>) -> OrderExpr {
    OrderExpr::new(field, SortDir::Desc)
}

///
/// AggregateOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AggregateOp {
    Avg,
    Count,
    Max,
    Min,
    Sum,
}

impl AggregateOp {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Count => "count",
            Self::Max => "max",
            Self::Min => "min",
            Self::Sum => "sum",
        }
    }
}

///
/// Projection
///
/// One output column of a tuple query: a grouped field or an aggregate.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Projection {
    Column(FieldRef),
    Aggregate {
        op: AggregateOp,
        field: Option<FieldRef>,
    },
}

impl Projection {
    /// Stable column label used to read the value back out of a `Tuple`.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Column(field) => field.to_string(),
            Self::Aggregate { op, field: None } => op.label().to_string(),
            Self::Aggregate {
                op,
                field: Some(field),
            } => format!("{}({field})", op.label()),
        }
    }
}

/// Project a (grouped) field column.
#[must_use]
pub fn col(field: impl Into<FieldRef>) -> Projection {
    Projection::Column(field.into())
}

/// Project the matching row count.
#[must_use]
pub const fn count() -> Projection {
    Projection::Aggregate {
        op: AggregateOp::Count,
        field: None,
    }
}

/// Project the sum of a numeric field over non-null values.
#[must_use]
pub fn sum(field: impl Into<FieldRef>) -> Projection {
    aggregate(AggregateOp::Sum, field)
}

/// Project the arithmetic mean of a numeric field over non-null values.
#[must_use]
pub fn avg(field: impl Into<FieldRef>) -> Projection {
    aggregate(AggregateOp::Avg, field)
}

/// Project the largest non-null value of a field.
#[must_use]
pub fn max(field: impl Into<FieldRef>) -> Projection {
    aggregate(AggregateOp::Max, field)
}

/// Project the smallest non-null value of a field.
#[must_use]
pub fn min(field: impl Into<FieldRef>) -> Projection {
    aggregate(AggregateOp::Min, field)
}

fn aggregate(op: AggregateOp, field: impl Into<FieldRef>) -> Projection {
    Projection::Aggregate {
        op,
        field: Some(field.into()),
    }
}
