//! Shared test doubles: the in-memory engine, entity fixtures, and
//! reactive stubs.


pub(crate) use fixtures::{
    Customer, Measurement, TShirt, customer, measurement, shirt, tshirt,
};
pub(crate) use memory::{Expr, Leaf, MemoryBackend};
pub(crate) use reactive::{CollectingObserver, CountingPublisher, ImmediatePool, NoopPublisher};
