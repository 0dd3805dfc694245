use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

///
/// Id
///
/// 64-bit entity id assigned by the storage engine. Zero is never a live id.
///

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
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
pub struct Id(u64);

impl Id {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}
