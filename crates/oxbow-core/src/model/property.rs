use crate::value::TypeTag;
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

///
/// PropertyId
///
/// Stable per-entity property id assigned by the schema.
///

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    From,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[repr(transparent)]
pub struct PropertyId(u32);

impl PropertyId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

///
/// PropertyRef
///
/// Immutable handle identifying a schema property: stable id, name, and the
/// declared type the engine honors at runtime. Generated alongside entity
/// metadata, so construction is `const`.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PropertyRef {
    id: PropertyId,
    name: &'static str,
    tag: TypeTag,
}

impl PropertyRef {
    #[must_use]
    pub const fn new(id: u32, name: &'static str, tag: TypeTag) -> Self {
        Self {
            id: PropertyId::new(id),
            name,
            tag,
        }
    }

    #[must_use]
    pub const fn id(self) -> PropertyId {
        self.id
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn tag(self) -> TypeTag {
        self.tag
    }
}
