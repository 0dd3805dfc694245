//! Oxbow: typed queries over embedded object stores.
//!
//! This is the public meta-crate. Downstream users depend on **oxbow**
//! only; it re-exports the stable API from `oxbow-core`.

pub use oxbow_core as core;

pub use oxbow_core::prelude::*;

/// Engine-binding surface: handles, order flags, and the storage
/// capability a backend implements.
pub use oxbow_core::db::backend;

/// Reactive seams: publisher, observer, worker pool, subscriptions.
pub use oxbow_core::reactive;
