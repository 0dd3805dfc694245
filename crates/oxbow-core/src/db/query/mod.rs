mod builder;
mod lazy;
mod property;
mod query;


pub use builder::{QueryBuilder, StringOrder};
pub use lazy::LazyList;
pub use property::{NullValue, PropertyQuery};
pub use query::Query;

use std::cmp::Ordering;

/// In-process predicate applied after engine-level selection.
pub(crate) type PostFilter<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// In-process total order applied after engine-level ordering.
pub(crate) type EntityComparator<E> = Box<dyn Fn(&E, &E) -> Ordering + Send + Sync>;
