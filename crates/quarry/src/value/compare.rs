use crate::value::Value;
use std::cmp::Ordering;

/// Total canonical comparator used for group keys and canonical tuple order.
///
/// Ordering rules:
/// 1. Variant rank (`Null < Bool < Int < Float < Text < List`)
/// 2. Variant-specific comparison for same-ranked values
///
/// Mixed-variant comparisons are rank-only and deterministic.
#[must_use]
pub(crate) fn total_cmp(left: &Value, right: &Value) -> Ordering {
    let rank = left.rank().cmp(&right.rank());
    if rank != Ordering::Equal {
        return rank;
    }

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::List(a), Value::List(b)) => cmp_lists(a, b),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        // Same rank implies same variant.
        _ => Ordering::Equal,
    }
}

/// Predicate-facing comparator.
///
/// Numeric values compare across `Int`/`Float` as one family. Any comparison
/// involving `Null` is undefined and yields `None`; predicate evaluation
/// treats that as a non-match.
#[must_use]
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        _ => {
            let (a, b) = (left.as_f64()?, right.as_f64()?);
            Some(a.total_cmp(&b))
        }
    }
}

fn cmp_lists(left: &[Value], right: &[Value]) -> Ordering {
    for (a, b) in left.iter().zip(right.iter()) {
        let ord = total_cmp(a, b);
        if ord != Ordering::Equal {
            return ord;
        }
    }

    left.len().cmp(&right.len())
}
