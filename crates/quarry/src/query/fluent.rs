//! Module: query::fluent
//! Responsibility: the chainable query surface and its terminals.
//! Does not own: intent storage (`Query`), validation (`validate::bind`),
//! or row access (`executor`).
//! Boundary: terminals borrow; builders move. One built query can run any
//! number of terminals.

use crate::{
    db::Session,
    error::Error,
    executor::LoadExecutor,
    query::{
        JoinKind, Query,
        expr::{FieldRef, OrderExpr, Projection},
        predicate::Predicate,
    },
    response::{Page, ResponseError, Tuple},
    traits::Entity,
};

///
/// SelectQuery
///
/// Fluent read query over one source entity type, executed through the
/// session that created it.
///

pub struct SelectQuery<'a, E: Entity> {
    session: &'a Session<'a>,
    query: Query<E>,
}

impl<'a, E: Entity> SelectQuery<'a, E> {
    #[must_use]
    pub(crate) const fn new(session: &'a Session<'a>) -> Self {
        Self {
            session,
            query: Query::new(),
        }
    }

    #[must_use]
    pub const fn query(&self) -> &Query<E> {
        &self.query
    }

    fn map_query(mut self, f: impl FnOnce(Query<E>) -> Query<E>) -> Self {
        self.query = f(self.query);
        self
    }

    // ---------------------------------------------------------------------
    // Builder methods (moving)
    // ---------------------------------------------------------------------

    /// Restrict results; multiple calls AND together.
    #[must_use]
    pub fn filter(self, predicate: Predicate) -> Self {
        self.map_query(|q| q.filter(predicate))
    }

    /// Restrict results with every predicate in `predicates`.
    #[must_use]
    pub fn filter_all(self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.map_query(|q| predicates.into_iter().fold(q, Query::filter))
    }

    /// Switch to tuple projection mode with explicit output columns.
    #[must_use]
    pub fn select(self, projections: impl IntoIterator<Item = Projection>) -> Self {
        self.map_query(|q| q.select(projections))
    }

    /// Inner-join through a named relation on the source entity.
    #[must_use]
    pub fn join(self, relation: impl Into<String>) -> Self {
        self.map_query(|q| q.join_relation(JoinKind::Inner, relation))
    }

    /// Left-join through a named relation: unmatched source rows survive
    /// with the joined side reading as null.
    #[must_use]
    pub fn left_join(self, relation: impl Into<String>) -> Self {
        self.map_query(|q| q.join_relation(JoinKind::Left, relation))
    }

    /// Inner-join an unrelated entity; `on(...)` supplies the sole join
    /// constraint and is mandatory.
    #[must_use]
    pub fn inner_join<T: Entity>(self) -> Self {
        self.map_query(|q| q.join_entity::<T>(JoinKind::Inner))
    }

    /// Attach an explicit predicate to the most recent join.
    #[must_use]
    pub fn on(self, predicate: Predicate) -> Self {
        self.map_query(|q| q.on(predicate))
    }

    /// Eagerly hydrate the most recent relation join onto the results.
    #[must_use]
    pub fn fetch_join(self) -> Self {
        self.map_query(Query::fetch_join)
    }

    /// Group rows by key fields; requires tuple projections.
    #[must_use]
    pub fn group_by(self, fields: impl IntoIterator<Item = impl Into<FieldRef>>) -> Self {
        self.map_query(|q| q.group_by(fields))
    }

    /// Order results; later expressions break ties of earlier ones.
    #[must_use]
    pub fn order_by(self, exprs: impl IntoIterator<Item = OrderExpr>) -> Self {
        self.map_query(|q| q.order_by(exprs))
    }

    /// Skip rows in the effective result order.
    #[must_use]
    pub fn offset(self, offset: u64) -> Self {
        self.map_query(|q| q.offset(offset))
    }

    /// Bound the number of returned rows.
    #[must_use]
    pub fn limit(self, limit: u64) -> Self {
        self.map_query(|q| q.limit(limit))
    }

    // ---------------------------------------------------------------------
    // Terminals (borrowing; the query stays reusable)
    // ---------------------------------------------------------------------

    /// All matching entities, ordered, deduplicated, and windowed.
    pub fn fetch(&self) -> Result<Vec<E>, Error> {
        self.run(|exec| exec.execute(&self.query))
    }

    /// At most one matching entity; more than one is an error.
    pub fn fetch_one(&self) -> Result<Option<E>, Error> {
        let mut rows = self.fetch()?;

        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            count => Err(ResponseError::Ambiguous {
                entity: E::model().name,
                count,
            }
            .into()),
        }
    }

    /// The first matching entity in the effective order, if any.
    pub fn fetch_first(&self) -> Result<Option<E>, Error> {
        let query = self.query.clone().limit(1);

        let mut rows = self.run(|exec| exec.execute(&query))?;

        Ok(rows.pop())
    }

    /// The number of matching entities, ignoring offset and limit.
    pub fn fetch_count(&self) -> Result<u64, Error> {
        self.run(|exec| exec.execute_count(&self.query))
    }

    /// One page of results plus the total match count. Runs the intent
    /// twice: once for the count, once for the window.
    pub fn fetch_page(&self) -> Result<Page<E>, Error> {
        self.run(|exec| {
            let total = exec.execute_count(&self.query)?;
            let results = exec.execute(&self.query)?;

            Ok(Page::new(
                total,
                self.query.offset,
                self.query.limit,
                results,
            ))
        })
    }

    /// All projected tuples of a `select(...)` query, in canonical
    /// group-key order.
    pub fn fetch_tuples(&self) -> Result<Vec<Tuple>, Error> {
        self.run(|exec| exec.execute_tuples(&self.query))
    }

    fn run<T>(&self, f: impl FnOnce(&LoadExecutor<'_>) -> Result<T, Error>) -> Result<T, Error> {
        self.session
            .with_metrics(|| f(&LoadExecutor::new(self.session.db())))
    }
}
