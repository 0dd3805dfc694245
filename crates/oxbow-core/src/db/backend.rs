//! Capability contract consumed from the storage engine.
//!
//! Everything here is handle-based: the engine owns each allocation behind
//! an opaque token, and this layer only pairs create/destroy calls and
//! threads handles through. Nothing in this module executes predicates.

use crate::{
    model::{EntityKind, PropertyId},
    types::Id,
};
use derive_more::{From, Into};
use serde::{Deserialize, Serialize};
use std::ops::BitOr;
use thiserror::Error as ThisError;

///
/// Handles
///
/// Engine-allocated tokens. Zero is never a live handle.
///

#[derive(Clone, Copy, Debug, Eq, From, Hash, Into, PartialEq)]
#[repr(transparent)]
pub struct StoreHandle(u64);

#[derive(Clone, Copy, Debug, Eq, From, Hash, Into, PartialEq)]
#[repr(transparent)]
pub struct BuilderHandle(u64);

#[derive(Clone, Copy, Debug, Eq, From, Hash, Into, PartialEq)]
#[repr(transparent)]
pub struct QueryHandle(u64);

#[derive(Clone, Copy, Debug, Eq, From, Hash, Into, PartialEq)]
#[repr(transparent)]
pub struct ConditionHandle(u64);

#[derive(Clone, Copy, Debug, Eq, From, Hash, Into, PartialEq)]
#[repr(transparent)]
pub struct TxHandle(u64);

#[derive(Clone, Copy, Debug, Eq, From, Hash, Into, PartialEq)]
#[repr(transparent)]
pub struct CursorHandle(u64);

///
/// TxMode
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxMode {
    Read,
    Write,
}

///
/// OrderFlags
///
/// Bitmask over engine ordering behavior. The bit values are part of the
/// engine contract and must stay stable.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[repr(transparent)]
pub struct OrderFlags(u32);

impl OrderFlags {
    pub const NONE: Self = Self(0);

    /// Reverts the order from ascending (the default) to descending.
    pub const DESCENDING: Self = Self(1);

    /// Makes upper case letters sort before lower case letters. The default
    /// is case insensitive for ASCII characters.
    pub const CASE_SENSITIVE: Self = Self(1 << 1);

    /// Null values are put last. The default puts them first.
    pub const NULLS_LAST: Self = Self(1 << 2);

    /// Null values are compared as zero (scalars only).
    pub const NULLS_ZERO: Self = Self(1 << 3);

    /// Unsigned comparison (scalars only; the default is signed).
    pub const UNSIGNED: Self = Self(1 << 4);

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, flags: Self) -> bool {
        self.0 & flags.0 == flags.0
    }
}

impl BitOr for OrderFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

///
/// UniqueOutcome
///
/// Result shape of engine primitives that can enforce uniqueness. The
/// `Ambiguous` variant is only produced when the caller asked for a unique
/// result and the engine saw more than one.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UniqueOutcome<T> {
    Empty,
    Unique(T),
    Ambiguous,
}

///
/// NullSlots
///
/// Typed slots carrying a configured null substitute across the capability
/// boundary for the numeric scalar primitive. The string slot travels
/// separately since it is not `Copy`.
///

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NullSlots {
    pub enabled: bool,
    pub long_value: i64,
    pub float_value: f32,
    pub double_value: f64,
}

///
/// BackendError
///
/// Engine failure. Transient failures may be retried by the caller's
/// transaction envelope; fatal ones surface immediately.
///

#[derive(Clone, Debug, ThisError)]
#[error("backend error: {message}")]
pub struct BackendError {
    pub transient: bool,
    pub message: String,
}

impl BackendError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            transient: false,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            transient: true,
            message: message.into(),
        }
    }
}

///
/// StorageBackend
///
/// The full engine surface this layer consumes. Implementations bind a
/// concrete engine; the crate itself ships none. Entity-returning methods
/// are generic over `EntityKind`, so the trait is consumed through a
/// concrete type parameter rather than a trait object.
///

pub trait StorageBackend: Send + Sync + 'static {
    // ------------------------------------------------------------------
    // Builder lifecycle
    // ------------------------------------------------------------------

    fn create_builder(
        &self,
        store: StoreHandle,
        entity_name: &str,
    ) -> Result<BuilderHandle, BackendError>;

    fn destroy_builder(&self, builder: BuilderHandle);

    /// Finalize a builder into an executable query handle. Root conditions
    /// left uncombined are conjoined implicitly.
    fn compile(&self, builder: BuilderHandle) -> Result<QueryHandle, BackendError>;

    fn destroy_query(&self, query: QueryHandle);

    // ------------------------------------------------------------------
    // Composition
    // ------------------------------------------------------------------

    fn add_order(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        flags: OrderFlags,
    ) -> Result<(), BackendError>;

    fn combine(
        &self,
        builder: BuilderHandle,
        first: ConditionHandle,
        second: ConditionHandle,
        use_or: bool,
    ) -> Result<ConditionHandle, BackendError>;

    // ------------------------------------------------------------------
    // Leaf predicates
    // ------------------------------------------------------------------

    fn cond_is_null(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_not_null(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_equal_long(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        value: i64,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_not_equal_long(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        value: i64,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_less_long(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        value: i64,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_greater_long(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        value: i64,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_between_long(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        low: i64,
        high: i64,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_in_longs(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        values: &[i64],
        negate: bool,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_in_ints(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        values: &[i32],
        negate: bool,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_equal_string(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        value: &str,
        case_sensitive: bool,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_not_equal_string(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        value: &str,
        case_sensitive: bool,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_contains(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        value: &str,
        case_sensitive: bool,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_starts_with(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        value: &str,
        case_sensitive: bool,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_ends_with(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        value: &str,
        case_sensitive: bool,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_less_double(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        value: f64,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_greater_double(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        value: f64,
    ) -> Result<ConditionHandle, BackendError>;

    fn cond_between_double(
        &self,
        builder: BuilderHandle,
        property: PropertyId,
        low: f64,
        high: f64,
    ) -> Result<ConditionHandle, BackendError>;

    // ------------------------------------------------------------------
    // Transactions & cursors
    // ------------------------------------------------------------------

    fn begin_tx(&self, store: StoreHandle, mode: TxMode) -> Result<TxHandle, BackendError>;

    fn commit_tx(&self, tx: TxHandle) -> Result<(), BackendError>;

    fn abort_tx(&self, tx: TxHandle);

    /// Acquire a cursor scoped to `tx`. Cursors die with their transaction.
    fn cursor(&self, tx: TxHandle, entity_name: &str) -> Result<CursorHandle, BackendError>;

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    fn find_first<E: EntityKind>(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
    ) -> Result<Option<E>, BackendError>;

    fn find_unique<E: EntityKind>(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
    ) -> Result<UniqueOutcome<E>, BackendError>;

    /// `offset == 0 && limit == 0` returns every match.
    fn find<E: EntityKind>(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<E>, BackendError>;

    /// Matching ids in storage order. Ignores ordering clauses.
    fn find_ids_unordered(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
    ) -> Result<Vec<Id>, BackendError>;

    fn get_entity<E: EntityKind>(
        &self,
        cursor: CursorHandle,
        id: Id,
    ) -> Result<Option<E>, BackendError>;

    fn count(&self, query: QueryHandle, cursor: CursorHandle) -> Result<u64, BackendError>;

    fn remove(&self, query: QueryHandle, cursor: CursorHandle) -> Result<u64, BackendError>;

    // ------------------------------------------------------------------
    // Property retrieval
    // ------------------------------------------------------------------

    fn find_strings(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
        distinct: bool,
        distinct_no_case: bool,
        null_value: Option<&str>,
    ) -> Result<Vec<String>, BackendError>;

    fn find_longs(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
        distinct: bool,
        null_value: Option<i64>,
    ) -> Result<Vec<i64>, BackendError>;

    fn find_ints(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
        distinct: bool,
        null_value: Option<i32>,
    ) -> Result<Vec<i32>, BackendError>;

    fn find_shorts(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
        distinct: bool,
        null_value: Option<i16>,
    ) -> Result<Vec<i16>, BackendError>;

    fn find_chars(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
        distinct: bool,
        null_value: Option<char>,
    ) -> Result<Vec<char>, BackendError>;

    fn find_bytes(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
        distinct: bool,
        null_value: Option<i8>,
    ) -> Result<Vec<i8>, BackendError>;

    fn find_floats(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
        distinct: bool,
        null_value: Option<f32>,
    ) -> Result<Vec<f32>, BackendError>;

    fn find_doubles(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
        distinct: bool,
        null_value: Option<f64>,
    ) -> Result<Vec<f64>, BackendError>;

    #[expect(clippy::too_many_arguments)]
    fn find_scalar_string(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
        unique: bool,
        distinct: bool,
        distinct_case: bool,
        null_value: Option<&str>,
    ) -> Result<UniqueOutcome<String>, BackendError>;

    /// Scalar retrieval for every non-string property type; the returned
    /// value carries the property's natural type.
    fn find_scalar_number(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
        unique: bool,
        distinct: bool,
        nulls: NullSlots,
    ) -> Result<UniqueOutcome<crate::value::Value>, BackendError>;

    // ------------------------------------------------------------------
    // Aggregates
    // ------------------------------------------------------------------

    fn sum(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
    ) -> Result<i64, BackendError>;

    fn sum_double(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
    ) -> Result<f64, BackendError>;

    fn min(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
    ) -> Result<i64, BackendError>;

    fn max(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
    ) -> Result<i64, BackendError>;

    fn min_double(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
    ) -> Result<f64, BackendError>;

    fn max_double(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
    ) -> Result<f64, BackendError>;

    fn avg(
        &self,
        query: QueryHandle,
        cursor: CursorHandle,
        property: PropertyId,
    ) -> Result<f64, BackendError>;

    // ------------------------------------------------------------------
    // Parameter rebinding
    // ------------------------------------------------------------------

    fn set_parameter_string(
        &self,
        query: QueryHandle,
        property: PropertyId,
        value: &str,
    ) -> Result<(), BackendError>;

    fn set_parameter_long(
        &self,
        query: QueryHandle,
        property: PropertyId,
        value: i64,
    ) -> Result<(), BackendError>;

    fn set_parameter_double(
        &self,
        query: QueryHandle,
        property: PropertyId,
        value: f64,
    ) -> Result<(), BackendError>;

    fn set_parameters_long(
        &self,
        query: QueryHandle,
        property: PropertyId,
        first: i64,
        second: i64,
    ) -> Result<(), BackendError>;

    fn set_parameters_double(
        &self,
        query: QueryHandle,
        property: PropertyId,
        first: f64,
        second: f64,
    ) -> Result<(), BackendError>;
}
