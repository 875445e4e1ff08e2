pub mod expr;
pub mod predicate;
pub mod subquery;

mod fluent;
mod intent;

pub(crate) mod validate;


pub use fluent::SelectQuery;
pub use intent::{JoinKind, Query};
pub use validate::ConstructError;
