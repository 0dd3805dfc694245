use crate::{model::PropertyId, types::Id, value::Value};

///
/// EntityKind
///
/// Code-generated metadata contract for a stored entity type. The query
/// layer never inspects entity fields directly; everything goes through the
/// stable entity name, the engine-assigned id, and per-property access.
///

pub trait EntityKind: Clone + Send + Sized + 'static {
    /// Stable name the engine resolves to the entity's store.
    const ENTITY_NAME: &'static str;

    /// Engine-assigned 64-bit id.
    fn id(&self) -> Id;

    /// Runtime value of one property. `Value::Null` for absent values and
    /// unknown property ids.
    fn property_value(&self, property: PropertyId) -> Value;
}
