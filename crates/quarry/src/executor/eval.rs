//! Module: executor::eval
//! Responsibility: row-level predicate evaluation, including subquery
//! operands. Comparisons involving null are non-matches; `Not` inverts the
//! boolean result of its inner predicate.

use crate::{
    db::{Db, ExecuteError},
    executor::aggregate,
    model::EntityModel,
    obs::{self, MetricsEvent},
    query::{
        expr::{AggregateOp, FieldRef},
        predicate::{Compare, CompareOp, Operand, Predicate},
        subquery::ScalarSubquery,
    },
    value::{Value, compare_values},
};
use std::{cell::RefCell, cmp::Ordering, collections::HashMap};

///
/// SlotView
///
/// One bound row slot during evaluation. `values` is `None` on a left-join
/// miss; every field of that slot then resolves to null.
///

#[derive(Clone, Copy, Debug)]
pub(crate) struct SlotView<'a> {
    pub alias: &'static str,
    pub model: &'static EntityModel,
    pub values: Option<&'a [Value]>,
}

///
/// RowCtx
///

#[derive(Clone, Copy, Debug)]
pub(crate) struct RowCtx<'a> {
    pub slots: &'a [SlotView<'a>],
}

impl RowCtx<'_> {
    /// Resolve a field reference against this row.
    ///
    /// Binding has already proven the reference; failures here are executor
    /// invariants, not user errors.
    pub(crate) fn resolve(&self, field: &FieldRef) -> Result<Value, ExecuteError> {
        let slot = match &field.alias {
            Some(alias) => self
                .slots
                .iter()
                .find(|slot| slot.alias == alias.as_str())
                .ok_or_else(|| {
                    ExecuteError::invariant(format!("unbound alias '{alias}' reached evaluation"))
                })?,
            None => self.slots.first().ok_or_else(|| {
                ExecuteError::invariant("row context has no source slot".to_string())
            })?,
        };

        let Some(values) = slot.values else {
            return Ok(Value::Null);
        };
        let index = slot.model.field_index(&field.field).ok_or_else(|| {
            ExecuteError::invariant(format!("unbound field '{field}' reached evaluation"))
        })?;

        Ok(values[index].clone())
    }
}

///
/// EvalEnv
///
/// Per-execution environment: store handle plus the uncorrelated-subquery
/// cache. Uncorrelated scalars are computed once per execution; correlated
/// ones are recomputed per outer row.
///

pub(crate) struct EvalEnv<'a> {
    pub db: &'a Db,
    cache: RefCell<HashMap<usize, Value>>,
}

impl<'a> EvalEnv<'a> {
    pub(crate) fn new(db: &'a Db) -> Self {
        Self {
            db,
            cache: RefCell::new(HashMap::new()),
        }
    }
}

/// Evaluate a predicate against one row.
pub(crate) fn eval_predicate(
    predicate: &Predicate,
    ctx: &RowCtx<'_>,
    env: &EvalEnv<'_>,
    outer: Option<&RowCtx<'_>>,
) -> Result<bool, ExecuteError> {
    match predicate {
        Predicate::And(parts) => {
            for part in parts {
                if !eval_predicate(part, ctx, env, outer)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(parts) => {
            for part in parts {
                if eval_predicate(part, ctx, env, outer)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::Not(inner) => Ok(!eval_predicate(inner, ctx, env, outer)?),
        Predicate::Compare(cmp) => eval_compare(cmp, ctx, env, outer),
        Predicate::IsNull(field) => Ok(ctx.resolve(field)?.is_null()),
        Predicate::IsNotNull(field) => Ok(!ctx.resolve(field)?.is_null()),
    }
}

fn eval_compare(
    cmp: &Compare,
    ctx: &RowCtx<'_>,
    env: &EvalEnv<'_>,
    outer: Option<&RowCtx<'_>>,
) -> Result<bool, ExecuteError> {
    let lhs = ctx.resolve(&cmp.field)?;

    if cmp.op == CompareOp::In {
        let Operand::Value(Value::List(items)) = &cmp.rhs else {
            return Err(ExecuteError::invariant(
                "IN operand is not a value list".to_string(),
            ));
        };

        return Ok(items.iter().any(|item| value_eq(&lhs, item)));
    }

    let rhs = resolve_operand(&cmp.rhs, ctx, env, outer)?;

    let result = match cmp.op {
        CompareOp::Eq => value_eq(&lhs, &rhs),
        CompareOp::Ne => !lhs.is_null() && !rhs.is_null() && !value_eq(&lhs, &rhs),
        CompareOp::Lt => ordered(&lhs, &rhs, |ord| ord == Ordering::Less),
        CompareOp::Lte => ordered(&lhs, &rhs, |ord| ord != Ordering::Greater),
        CompareOp::Gt => ordered(&lhs, &rhs, |ord| ord == Ordering::Greater),
        CompareOp::Gte => ordered(&lhs, &rhs, |ord| ord != Ordering::Less),
        CompareOp::In => unreachable!("handled above"),
    };

    Ok(result)
}

fn resolve_operand(
    operand: &Operand,
    ctx: &RowCtx<'_>,
    env: &EvalEnv<'_>,
    outer: Option<&RowCtx<'_>>,
) -> Result<Value, ExecuteError> {
    match operand {
        Operand::Value(value) => Ok(value.clone()),
        Operand::Field(field) => ctx.resolve(field),
        Operand::Outer(field) => match outer {
            Some(outer) => outer.resolve(field),
            None => Err(ExecuteError::invariant(format!(
                "outer reference '{field}' outside a subquery"
            ))),
        },
        Operand::Subquery(sub) => eval_subquery(sub, env, Some(ctx)),
    }
}

/// Compute one scalar subquery value.
pub(crate) fn eval_subquery(
    sub: &ScalarSubquery,
    env: &EvalEnv<'_>,
    outer: Option<&RowCtx<'_>>,
) -> Result<Value, ExecuteError> {
    let correlated = sub.is_correlated();
    let cache_key = std::ptr::from_ref(sub) as usize;

    if !correlated {
        if let Some(value) = env.cache.borrow().get(&cache_key) {
            return Ok(value.clone());
        }
    }

    let model = (sub.target)();
    let rows = env.db.scan_values(model)?;
    obs::emit(MetricsEvent::RowsScanned {
        entity: model.name,
        rows: rows.len() as u64,
    });

    let mut matched: Vec<&[Value]> = Vec::new();
    for (_, values) in &rows {
        let slots = [SlotView {
            alias: model.name,
            model,
            values: Some(values.as_slice()),
        }];
        let ctx = RowCtx { slots: &slots };

        let keep = match &sub.predicate {
            Some(predicate) => eval_predicate(predicate, &ctx, env, outer)?,
            None => true,
        };
        if keep {
            matched.push(values.as_slice());
        }
    }

    let result = match (&sub.field, sub.op) {
        (None, AggregateOp::Count) => Value::Int(i64::try_from(matched.len()).unwrap_or(i64::MAX)),
        (None, _) => {
            return Err(ExecuteError::invariant(
                "field-less aggregate other than count".to_string(),
            ));
        }
        (Some(field), op) => {
            let field_ref = FieldRef::parse(field);
            let index = model.field_index(&field_ref.field).ok_or_else(|| {
                ExecuteError::invariant(format!("unbound subquery field '{field_ref}'"))
            })?;
            let values: Vec<Value> = matched.iter().map(|row| row[index].clone()).collect();

            aggregate::fold(op, values.len() as u64, &values)
        }
    };

    if !correlated {
        env.cache.borrow_mut().insert(cache_key, result.clone());
    }

    Ok(result)
}

/// Null-rejecting equality with numeric widening.
pub(crate) fn value_eq(left: &Value, right: &Value) -> bool {
    compare_values(left, right) == Some(Ordering::Equal)
}

fn ordered(left: &Value, right: &Value, test: impl FnOnce(Ordering) -> bool) -> bool {
    compare_values(left, right).is_some_and(test)
}
