//! Module: executor
//! Responsibility: run one bound query intent over the store. Pipeline order
//! is fixed: scan, join expansion, filter, order, dedupe, window, hydrate.
//! Does not own: intent construction or validation; `bind` has already
//! proven every reference before a row is touched.

mod aggregate;
mod eval;

#[cfg(test)]
mod tests;

use crate::{
    db::{Db, ExecuteError},
    error::Error,
    executor::eval::{EvalEnv, RowCtx, SlotView, value_eq},
    obs::{self, ExecKind, MetricsEvent},
    query::{
        JoinKind, Query,
        expr::{NullOrder, OrderExpr, Projection, SortDir},
        predicate::Predicate,
        validate::{self, Binding, ConstructError, JoinMatch},
    },
    response::Tuple,
    traits::Entity,
    value::Value,
};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
};

///
/// JoinedRow
///
/// One expanded result row: a source row index plus, per join clause, the
/// matched target row index (`None` on a left-join miss).
///

#[derive(Clone, Debug)]
struct JoinedRow {
    src: usize,
    joined: Vec<Option<usize>>,
}

///
/// RowSet
///
/// Materialized working set of one execution: decoded source rows, their
/// projected field values, per-join target rows, and the surviving expanded
/// rows.
///

struct RowSet<E> {
    source: Vec<E>,
    source_keys: Vec<u64>,
    source_values: Vec<Vec<Value>>,
    targets: Vec<Vec<(u64, Vec<Value>)>>,
    rows: Vec<JoinedRow>,
}

fn slot_views<'a, E>(
    set: &'a RowSet<E>,
    binding: &Binding,
    row: &JoinedRow,
) -> Vec<SlotView<'a>> {
    let mut slots = Vec::with_capacity(binding.slots.len());
    slots.push(SlotView {
        alias: binding.slots[0].alias,
        model: binding.slots[0].model,
        values: Some(&set.source_values[row.src]),
    });
    for (j, slot) in binding.slots[1..].iter().enumerate() {
        // Slots beyond the expansion frontier read as null.
        let values = row
            .joined
            .get(j)
            .copied()
            .flatten()
            .map(|t| set.targets[j][t].1.as_slice());
        slots.push(SlotView {
            alias: slot.alias,
            model: slot.model,
            values,
        });
    }

    slots
}

///
/// LoadExecutor
///

pub(crate) struct LoadExecutor<'a> {
    db: &'a Db,
}

impl<'a> LoadExecutor<'a> {
    pub(crate) const fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Execute an entity-mode query: full ordered, deduplicated, windowed
    /// source entities, with fetch-joined relations hydrated.
    pub(crate) fn execute<E: Entity>(&self, query: &Query<E>) -> Result<Vec<E>, Error> {
        if query.has_projections() {
            return Err(ConstructError::EntityTerminalOnTupleQuery.into());
        }
        let binding = validate::bind(query)?;
        let name = binding.slots[0].model.name;

        obs::emit(MetricsEvent::ExecStart {
            kind: ExecKind::Load,
            entity: name,
        });

        let env = EvalEnv::new(self.db);
        let mut set = self.scan(query, &binding, &env)?;
        sort_rows(&mut set, &binding, &query.order)?;
        if !query.joins.is_empty() {
            dedupe_source(&mut set);
        }
        window(&mut set.rows, query.offset, query.limit);

        let mut out: Vec<E> = set
            .rows
            .iter()
            .map(|row| set.source[row.src].clone())
            .collect();
        self.hydrate(&binding, &mut out)?;

        obs::emit(MetricsEvent::ExecFinish {
            kind: ExecKind::Load,
            entity: name,
            rows: out.len() as u64,
        });

        Ok(out)
    }

    /// Count matching source entities, ignoring offset and limit.
    pub(crate) fn execute_count<E: Entity>(&self, query: &Query<E>) -> Result<u64, Error> {
        if query.has_projections() {
            return Err(ConstructError::EntityTerminalOnTupleQuery.into());
        }
        let binding = validate::bind(query)?;
        let name = binding.slots[0].model.name;

        obs::emit(MetricsEvent::ExecStart {
            kind: ExecKind::Load,
            entity: name,
        });

        let env = EvalEnv::new(self.db);
        let mut set = self.scan(query, &binding, &env)?;
        if !query.joins.is_empty() {
            dedupe_source(&mut set);
        }
        let total = set.rows.len() as u64;

        obs::emit(MetricsEvent::ExecFinish {
            kind: ExecKind::Load,
            entity: name,
            rows: total,
        });

        Ok(total)
    }

    /// Execute a tuple-mode query: group, fold aggregates, emit labelled
    /// tuples in canonical group-key order.
    pub(crate) fn execute_tuples<E: Entity>(&self, query: &Query<E>) -> Result<Vec<Tuple>, Error> {
        let Some(projections) = &query.projections else {
            return Err(ConstructError::TupleTerminalWithoutProjection.into());
        };
        let binding = validate::bind(query)?;
        let name = binding.slots[0].model.name;

        obs::emit(MetricsEvent::ExecStart {
            kind: ExecKind::Load,
            entity: name,
        });

        let env = EvalEnv::new(self.db);
        let set = self.scan(query, &binding, &env)?;

        // Canonical ordering falls out of the map: group keys sort by the
        // total value order, componentwise.
        let mut groups: BTreeMap<Vec<Value>, Vec<usize>> = BTreeMap::new();
        for (i, row) in set.rows.iter().enumerate() {
            let slots = slot_views(&set, &binding, row);
            let ctx = RowCtx { slots: &slots };
            let mut key = Vec::with_capacity(query.group_by.len());
            for field in &query.group_by {
                key.push(ctx.resolve(field)?);
            }
            groups.entry(key).or_default().push(i);
        }
        // A global aggregate over zero rows still yields one tuple.
        if query.group_by.is_empty() && groups.is_empty() {
            groups.insert(Vec::new(), Vec::new());
        }

        let mut tuples = Vec::with_capacity(groups.len());
        for (key, members) in &groups {
            let mut columns = Vec::with_capacity(projections.len());
            for projection in projections {
                let value = match projection {
                    Projection::Column(field) => {
                        let index = query
                            .group_by
                            .iter()
                            .position(|group| group == field)
                            .ok_or_else(|| {
                                ExecuteError::invariant(format!(
                                    "ungrouped column '{field}' reached execution"
                                ))
                            })?;

                        key[index].clone()
                    }
                    Projection::Aggregate { op, field } => {
                        let values = match field {
                            Some(field) => {
                                let mut values = Vec::with_capacity(members.len());
                                for &member in members {
                                    let slots = slot_views(&set, &binding, &set.rows[member]);
                                    let ctx = RowCtx { slots: &slots };
                                    values.push(ctx.resolve(field)?);
                                }
                                values
                            }
                            None => Vec::new(),
                        };

                        aggregate::fold(*op, members.len() as u64, &values)
                    }
                };
                columns.push((projection.label(), value));
            }
            tuples.push(Tuple::new(columns));
        }

        window(&mut tuples, query.offset, query.limit);

        obs::emit(MetricsEvent::ExecFinish {
            kind: ExecKind::Load,
            entity: name,
            rows: tuples.len() as u64,
        });

        Ok(tuples)
    }

    // ---------------------------------------------------------------------
    // Scan and join expansion
    // ---------------------------------------------------------------------

    fn scan<E: Entity>(
        &self,
        query: &Query<E>,
        binding: &Binding,
        env: &EvalEnv<'_>,
    ) -> Result<RowSet<E>, Error> {
        let source: Vec<E> = self.db.scan()?;
        obs::emit(MetricsEvent::RowsScanned {
            entity: binding.slots[0].model.name,
            rows: source.len() as u64,
        });

        let source_keys: Vec<u64> = source.iter().map(Entity::key).collect();
        let source_values: Vec<Vec<Value>> = source.iter().map(Entity::values).collect();

        let mut targets = Vec::with_capacity(binding.slots.len() - 1);
        for slot in &binding.slots[1..] {
            let rows = self.db.scan_values(slot.model)?;
            obs::emit(MetricsEvent::RowsScanned {
                entity: slot.model.name,
                rows: rows.len() as u64,
            });
            targets.push(rows);
        }

        let mut set = RowSet {
            source,
            source_keys,
            source_values,
            targets,
            rows: Vec::new(),
        };

        let mut rows: Vec<JoinedRow> = (0..set.source.len())
            .map(|src| JoinedRow {
                src,
                joined: Vec::new(),
            })
            .collect();

        for (j, slot) in binding.slots[1..].iter().enumerate() {
            let join = slot.join.as_ref().ok_or_else(|| {
                ExecuteError::invariant("join slot without join metadata".to_string())
            })?;
            let on = query.joins[j].on.as_ref();

            rows = expand_join(&set, binding, env, rows, j, join.matcher, join.kind, on)?;
        }

        if let Some(predicate) = &query.predicate {
            let mut kept = Vec::with_capacity(rows.len());
            for row in rows {
                let slots = slot_views(&set, binding, &row);
                let ctx = RowCtx { slots: &slots };
                if eval::eval_predicate(predicate, &ctx, env, None)? {
                    kept.push(row);
                }
            }
            rows = kept;
        }

        set.rows = rows;

        Ok(set)
    }

    // Eager-load fetch-joined relations onto the returned entities.
    fn hydrate<E: Entity>(&self, binding: &Binding, out: &mut [E]) -> Result<(), Error> {
        for slot in &binding.slots[1..] {
            let Some(join) = &slot.join else { continue };
            if !join.fetch {
                continue;
            }
            let relation = join.relation.ok_or_else(|| {
                ExecuteError::invariant("fetch join without relation metadata".to_string())
            })?;

            for entity in out.iter_mut() {
                entity.hydrate(relation.name, self.db)?;
            }
        }

        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn expand_join<E>(
    set: &RowSet<E>,
    binding: &Binding,
    env: &EvalEnv<'_>,
    rows: Vec<JoinedRow>,
    j: usize,
    matcher: JoinMatch,
    kind: JoinKind,
    on: Option<&Predicate>,
) -> Result<Vec<JoinedRow>, Error> {
    let mut next = Vec::with_capacity(rows.len());

    for row in rows {
        let mut matched = false;

        for (t, (tkey, tvalues)) in set.targets[j].iter().enumerate() {
            let natural = match matcher {
                JoinMatch::BelongsTo { fk_index } => {
                    value_eq(&set.source_values[row.src][fk_index], &Value::from(*tkey))
                }
                JoinMatch::HasMany { fk_index } => {
                    value_eq(&tvalues[fk_index], &Value::from(set.source_keys[row.src]))
                }
                JoinMatch::Unconstrained => true,
            };
            if !natural {
                continue;
            }

            let mut candidate = row.clone();
            candidate.joined.push(Some(t));

            if let Some(on) = on {
                let slots = slot_views(set, binding, &candidate);
                let ctx = RowCtx { slots: &slots };
                if !eval::eval_predicate(on, &ctx, env, None)? {
                    continue;
                }
            }

            matched = true;
            next.push(candidate);
        }

        if !matched && kind == JoinKind::Left {
            let mut miss = row;
            miss.joined.push(None);
            next.push(miss);
        }
    }

    Ok(next)
}

// ---------------------------------------------------------------------
// Ordering, dedupe, windowing
// ---------------------------------------------------------------------

fn sort_rows<E>(
    set: &mut RowSet<E>,
    binding: &Binding,
    order: &[OrderExpr],
) -> Result<(), ExecuteError> {
    if order.is_empty() {
        return Ok(());
    }

    let rows = std::mem::take(&mut set.rows);
    let mut keyed: Vec<(Vec<Value>, JoinedRow)> = Vec::with_capacity(rows.len());
    for row in rows {
        let slots = slot_views(set, binding, &row);
        let ctx = RowCtx { slots: &slots };
        let mut key = Vec::with_capacity(order.len());
        for expr in order {
            key.push(ctx.resolve(&expr.field)?);
        }
        keyed.push((key, row));
    }

    // Stable: rows equal under every expression keep scan order.
    keyed.sort_by(|a, b| order_cmp(&a.0, &b.0, order));
    set.rows = keyed.into_iter().map(|(_, row)| row).collect();

    Ok(())
}

fn order_cmp(a: &[Value], b: &[Value], order: &[OrderExpr]) -> Ordering {
    for (i, expr) in order.iter().enumerate() {
        let ord = one_cmp(&a[i], &b[i], expr);
        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

// Null placement is independent of direction: nulls_last puts nulls at the
// end under both asc and desc.
fn one_cmp(a: &Value, b: &Value, expr: &OrderExpr) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => match expr.nulls {
            NullOrder::First => Ordering::Less,
            NullOrder::Last => Ordering::Greater,
        },
        (false, true) => match expr.nulls {
            NullOrder::First => Ordering::Greater,
            NullOrder::Last => Ordering::Less,
        },
        (false, false) => {
            let ord = a.cmp(b);
            match expr.dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            }
        }
    }
}

// Joins multiply source rows; entity results collapse back to one row per
// source key, keeping the first occurrence in the effective order.
fn dedupe_source<E>(set: &mut RowSet<E>) {
    let mut seen = HashSet::new();
    let keys = &set.source_keys;
    set.rows.retain(|row| seen.insert(keys[row.src]));
}

fn window<T>(rows: &mut Vec<T>, offset: u64, limit: Option<u64>) {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    if offset >= rows.len() {
        rows.clear();
        return;
    }
    rows.drain(..offset);

    if let Some(limit) = limit {
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }
}
