//! Module: db::session
//! Responsibility: scoped database handle, execution policy, write facade.
//! Does not own: query intent construction or row-level evaluation.
//! Boundary: the only public entry point into reads and writes.

use crate::{
    db::Db,
    error::Error,
    obs::{self, ExecKind, MetricsEvent, MetricsSink},
    query::SelectQuery,
    traits::Entity,
};

///
/// Session
///
/// Session-scoped handle over one `Db` with execution policy (metrics).
///
/// The underlying store borrow is released when the session is dropped,
/// on every exit path, including error returns.
///

pub struct Session<'a> {
    db: &'a Db,
    metrics: Option<&'static dyn MetricsSink>,
}

impl<'a> Session<'a> {
    #[must_use]
    pub const fn new(db: &'a Db) -> Self {
        Self { db, metrics: None }
    }

    /// Route instrumentation for this session to `sink`.
    #[must_use]
    pub const fn metrics_sink(mut self, sink: &'static dyn MetricsSink) -> Self {
        self.metrics = Some(sink);
        self
    }

    #[must_use]
    pub(crate) const fn db(&self) -> &'a Db {
        self.db
    }

    pub(crate) fn with_metrics<T>(&self, f: impl FnOnce() -> T) -> T {
        match self.metrics {
            Some(sink) => obs::with_metrics_sink(sink, f),
            None => f(),
        }
    }

    // ---------------------------------------------------------------------
    // Query entry point (public, fluent)
    // ---------------------------------------------------------------------

    /// Begin a read query over `E` (the `selectFrom` form).
    #[must_use]
    pub const fn load<E>(&self) -> SelectQuery<'_, E>
    where
        E: Entity,
    {
        SelectQuery::new(self)
    }

    // ---------------------------------------------------------------------
    // Write facade
    // ---------------------------------------------------------------------

    /// Insert one row. Fails on duplicate key or dangling foreign key.
    pub fn insert<E: Entity>(&self, entity: E) -> Result<E, Error> {
        let name = E::model().name;

        self.with_metrics(|| {
            obs::emit(MetricsEvent::ExecStart {
                kind: ExecKind::Save,
                entity: name,
            });
            self.db.insert_row(&entity)?;
            obs::emit(MetricsEvent::ExecFinish {
                kind: ExecKind::Save,
                entity: name,
                rows: 1,
            });

            Ok(entity)
        })
    }

    /// Delete one row by key with restrict semantics: fails while any
    /// registered belongs-to relation still references it.
    pub fn delete<E: Entity>(&self, key: u64) -> Result<(), Error> {
        let name = E::model().name;

        self.with_metrics(|| {
            obs::emit(MetricsEvent::ExecStart {
                kind: ExecKind::Delete,
                entity: name,
            });
            self.db.delete_row::<E>(key)?;
            obs::emit(MetricsEvent::ExecFinish {
                kind: ExecKind::Delete,
                entity: name,
                rows: 1,
            });

            Ok(())
        })
    }

    /// Load one row by primary key, bypassing query construction.
    pub fn get<E: Entity>(&self, key: u64) -> Result<Option<E>, Error> {
        Ok(self.db.get::<E>(key)?)
    }
}
