use crate::{
    model::EntityModel,
    query::{
        expr::{FieldRef, OrderExpr, Projection},
        predicate::Predicate,
        validate::ConstructError,
    },
    traits::Entity,
};
use std::marker::PhantomData;

///
/// JoinKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinKind {
    Inner,
    Left,
}

///
/// JoinSource
///
/// How a join clause reaches its target: through a named relation on the
/// source entity (natural foreign-key match), or an unrelated entity that
/// must bring its own `on` predicate.
///

#[derive(Clone, Debug)]
pub(crate) enum JoinSource {
    Relation(String),
    Entity(fn() -> &'static EntityModel),
}

///
/// JoinClause
///

#[derive(Clone, Debug)]
pub(crate) struct JoinClause {
    pub kind: JoinKind,
    pub source: JoinSource,
    pub on: Option<Predicate>,
    pub fetch: bool,
}

///
/// Query
///
/// Typed, declarative query intent for a specific source entity type.
///
/// The intent is:
/// - schema-agnostic at construction
/// - validated only when a terminal binds it, before any row is touched
/// - never mutated by execution, so one intent can be executed repeatedly
///
/// Builder defects that cannot surface from an infallible fluent method
/// (`on` with no join, for instance) are parked on the intent and reported
/// at bind time.
///

#[derive(Clone, Debug)]
pub struct Query<E: Entity> {
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) predicate: Option<Predicate>,
    pub(crate) projections: Option<Vec<Projection>>,
    pub(crate) group_by: Vec<FieldRef>,
    pub(crate) order: Vec<OrderExpr>,
    pub(crate) offset: u64,
    pub(crate) limit: Option<u64>,
    pub(crate) defect: Option<ConstructError>,
    _marker: PhantomData<E>,
}

impl<E: Entity> Default for Query<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Query<E> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            joins: Vec::new(),
            predicate: None,
            projections: None,
            group_by: Vec::new(),
            order: Vec::new(),
            offset: 0,
            limit: None,
            defect: None,
            _marker: PhantomData,
        }
    }

    /// Add a predicate, implicitly AND-ing with any existing predicate.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = match self.predicate.take() {
            Some(existing) => Some(existing & predicate),
            None => Some(predicate),
        };
        self
    }

    /// Switch to tuple projection mode with explicit output columns.
    #[must_use]
    pub fn select(mut self, projections: impl IntoIterator<Item = Projection>) -> Self {
        self.projections = Some(projections.into_iter().collect());
        self
    }

    /// Join through a named relation on the source entity.
    #[must_use]
    pub fn join_relation(mut self, kind: JoinKind, relation: impl Into<String>) -> Self {
        self.joins.push(JoinClause {
            kind,
            source: JoinSource::Relation(relation.into()),
            on: None,
            fetch: false,
        });
        self
    }

    /// Join an unrelated entity; requires a subsequent `on`.
    #[must_use]
    pub fn join_entity<T: Entity>(mut self, kind: JoinKind) -> Self {
        self.joins.push(JoinClause {
            kind,
            source: JoinSource::Entity(T::model),
            on: None,
            fetch: false,
        });
        self
    }

    /// Attach an explicit join predicate to the most recent join clause.
    #[must_use]
    pub fn on(mut self, predicate: Predicate) -> Self {
        match self.joins.last_mut() {
            Some(join) => {
                join.on = Some(match join.on.take() {
                    Some(existing) => existing & predicate,
                    None => predicate,
                });
            }
            None => self.park(ConstructError::OnWithoutJoin),
        }
        self
    }

    /// Mark the most recent join for eager relation materialization.
    /// Idempotent per join clause.
    #[must_use]
    pub fn fetch_join(mut self) -> Self {
        match self.joins.last_mut() {
            Some(join) => join.fetch = true,
            None => self.park(ConstructError::FetchJoinWithoutJoin),
        }
        self
    }

    /// Append grouping key fields.
    #[must_use]
    pub fn group_by(mut self, fields: impl IntoIterator<Item = impl Into<FieldRef>>) -> Self {
        self.group_by.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Append ordering expressions.
    #[must_use]
    pub fn order_by(mut self, exprs: impl IntoIterator<Item = OrderExpr>) -> Self {
        self.order.extend(exprs);
        self
    }

    /// Skip rows in the effective result order. Defaults to 0.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Bound the number of returned rows. Absent means unbounded.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn has_projections(&self) -> bool {
        self.projections.is_some()
    }

    // First parked defect wins; it reproduces the earliest misuse.
    fn park(&mut self, defect: ConstructError) {
        if self.defect.is_none() {
            self.defect = Some(defect);
        }
    }
}
