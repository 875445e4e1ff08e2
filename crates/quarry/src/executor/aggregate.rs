//! Module: executor::aggregate
//! Responsibility: folding field values into one scalar per aggregate op.
//! Null inputs are skipped for every op except `Count`, which counts rows.

use crate::{
    query::expr::AggregateOp,
    value::{Float64, Value},
};

/// Fold one aggregate over the values of a field across a row group.
///
/// `row_count` is the group's row count before null-skipping, which is what
/// `count` reports. An aggregate over zero non-null values yields `Null`
/// (`count` yields zero). `sum` stays integral for integer fields; `avg` is
/// always a float.
pub(crate) fn fold(op: AggregateOp, row_count: u64, values: &[Value]) -> Value {
    if op == AggregateOp::Count {
        return Value::Int(i64::try_from(row_count).unwrap_or(i64::MAX));
    }

    let present: Vec<&Value> = values.iter().filter(|value| !value.is_null()).collect();
    if present.is_empty() {
        return Value::Null;
    }

    match op {
        AggregateOp::Count => unreachable!("handled above"),
        AggregateOp::Sum => sum(&present),
        AggregateOp::Avg => {
            let total: f64 = present.iter().filter_map(|value| value.as_f64()).sum();

            Value::Float(Float64::new(total / present.len() as f64))
        }
        AggregateOp::Max => present.iter().max().map_or(Value::Null, |v| (*v).clone()),
        AggregateOp::Min => present.iter().min().map_or(Value::Null, |v| (*v).clone()),
    }
}

fn sum(present: &[&Value]) -> Value {
    let all_int = present.iter().all(|value| matches!(value, Value::Int(_)));

    if all_int {
        let total = present
            .iter()
            .map(|value| match value {
                Value::Int(n) => *n,
                _ => 0,
            })
            .fold(0_i64, i64::wrapping_add);

        Value::Int(total)
    } else {
        let total: f64 = present.iter().filter_map(|value| value.as_f64()).sum();

        Value::Float(Float64::new(total))
    }
}
