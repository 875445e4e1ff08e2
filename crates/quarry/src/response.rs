//! Module: response
//! Responsibility: terminal result shapes and cardinality errors.
//! Does not own: execution; results arrive here already ordered and windowed.

use crate::value::Value;
use derive_more::{Deref, IntoIterator};
use thiserror::Error as ThisError;

///
/// ResponseError
///
/// A query executed fine but its result shape violates what the terminal
/// promised the caller.
///

#[derive(Debug, ThisError)]
pub enum ResponseError {
    #[error("expected at most one '{entity}' row, found {count}")]
    Ambiguous { entity: &'static str, count: usize },
}

///
/// Page
///
/// One window of a paginated result, plus the total match count before
/// windowing. Count and window are computed by two separate executions over
/// the same intent.
///

#[derive(Clone, Debug)]
pub struct Page<E> {
    total: u64,
    offset: u64,
    limit: Option<u64>,
    results: Vec<E>,
}

impl<E> Page<E> {
    #[must_use]
    pub(crate) const fn new(total: u64, offset: u64, limit: Option<u64>, results: Vec<E>) -> Self {
        Self {
            total,
            offset,
            limit,
            results,
        }
    }

    /// Total rows matching the query, ignoring offset and limit.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub const fn limit(&self) -> Option<u64> {
        self.limit
    }

    #[must_use]
    pub fn results(&self) -> &[E] {
        &self.results
    }

    #[must_use]
    pub fn into_results(self) -> Vec<E> {
        self.results
    }
}

///
/// Tuple
///
/// One labelled output row of a tuple query. Columns appear in projection
/// order; labels come from `Projection::label` ("team.name", "sum(age)").
///

#[derive(Clone, Debug, Deref, IntoIterator, PartialEq)]
pub struct Tuple {
    #[deref]
    #[into_iterator]
    columns: Vec<(String, Value)>,
}

impl Tuple {
    #[must_use]
    pub(crate) const fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    /// Look a column up by its projection label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, value)| value)
    }
}
