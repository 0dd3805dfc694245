mod entity;
mod property;
mod relation;

pub use entity::EntityKind;
pub use property::{PropertyId, PropertyRef};
pub use relation::{EagerSpec, LazyCollection, LazyTarget, RelationAccess, RelationDescriptor};
