use super::*;
use std::cmp::Ordering;

#[test]
fn total_order_ranks_variants() {
    let mut values = vec![
        Value::Text("a".into()),
        Value::Int(3),
        Value::Null,
        Value::from(1.5),
        Value::Bool(true),
    ];
    values.sort();

    assert_eq!(
        values,
        vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(3),
            Value::from(1.5),
            Value::Text("a".into()),
        ]
    );
}

#[test]
fn numeric_family_compares_across_variants() {
    assert_eq!(
        compare_values(&Value::Int(2), &Value::from(2.0)),
        Some(Ordering::Equal)
    );
    assert_eq!(
        compare_values(&Value::Int(30), &Value::from(25.0)),
        Some(Ordering::Greater)
    );
}

#[test]
fn null_comparisons_are_undefined() {
    assert_eq!(compare_values(&Value::Null, &Value::Int(1)), None);
    assert_eq!(compare_values(&Value::Text("x".into()), &Value::Null), None);
}

#[test]
fn mismatched_scalar_kinds_do_not_compare() {
    assert_eq!(
        compare_values(&Value::Text("10".into()), &Value::Int(10)),
        None
    );
}

#[test]
fn option_conversion_maps_none_to_null() {
    assert_eq!(Value::from(None::<i64>), Value::Null);
    assert_eq!(Value::from(Some("ice")), Value::Text("ice".into()));
}

#[test]
fn field_kind_compatibility() {
    assert!(FieldKind::Int.comparable_with(FieldKind::Float));
    assert!(FieldKind::Text.comparable_with(FieldKind::Text));
    assert!(!FieldKind::Text.comparable_with(FieldKind::Int));
    assert!(!FieldKind::Bool.comparable_with(FieldKind::Float));
}
