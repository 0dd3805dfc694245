//! Core runtime for Oxbow: the value model, entity metadata, the storage
//! capability, and the query layer exported via the `prelude`.

pub mod db;
pub mod error;
pub mod model;
pub mod reactive;
pub mod types;
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains the domain vocabulary downstream code works with.
/// Engine-binding surfaces (handles, the backend trait) stay behind their
/// modules.
///

pub mod prelude {
    pub use crate::{
        db::{
            query::{LazyList, NullValue, PropertyQuery, Query, QueryBuilder, StringOrder},
            store::{Collection, Store, StoreOptions},
        },
        error::Error,
        model::{EagerSpec, EntityKind, PropertyRef, RelationDescriptor},
        reactive::{DataObserver, Subscription, SubscriptionList},
        types::{Date, Id},
        value::{TypeTag, Value},
    };
}
