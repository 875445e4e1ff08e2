use crate::{db::ExecuteError, query::ConstructError, response::ResponseError};
use thiserror::Error as ThisError;

///
/// Error
///
/// Umbrella error surfaced by every terminal.
///
/// - `Construct`: invalid intent, caught before any row is touched.
/// - `Response`: result-cardinality failures (`fetch_one`).
/// - `Execute`: store/codec/constraint failures, propagated unmodified.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("{0}")]
    Construct(#[from] ConstructError),

    #[error("{0}")]
    Response(#[from] ResponseError),

    #[error("{0}")]
    Execute(#[from] ExecuteError),
}

impl Error {
    #[must_use]
    pub const fn is_construct(&self) -> bool {
        matches!(self, Self::Construct(_))
    }

    #[must_use]
    pub const fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Response(ResponseError::Ambiguous { .. }))
    }
}
