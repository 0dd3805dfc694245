use crate::{
    db::{
        backend::{BackendError, BuilderHandle, ConditionHandle, OrderFlags, StorageBackend},
        query::{EntityComparator, PostFilter, Query},
        store::Collection,
    },
    error::Error,
    model::{EagerSpec, EntityKind, PropertyRef, RelationDescriptor},
    types::Date,
};
use std::cmp::Ordering;
use tracing::debug;

///
/// StringOrder
///
/// Case mode for string predicates and distinct semantics. The engine
/// default is case-insensitive ASCII comparison.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum StringOrder {
    #[default]
    CaseInsensitive,
    CaseSensitive,
}

impl StringOrder {
    pub(crate) const fn case_sensitive(self) -> bool {
        matches!(self, Self::CaseSensitive)
    }
}

///
/// Operator
///
/// Pending combinator set by `and()`/`or()` and consumed by the next leaf
/// condition.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum Operator {
    #[default]
    None,
    And,
    Or,
}

///
/// QueryBuilder
///
/// Accumulates a logical expression over engine-compiled predicates plus
/// ordering, eager-load, and post-processing directives, then compiles the
/// lot into a repeatable [`Query`].
///
/// Conditions chain left to right: each new condition is combined with the
/// accumulated one, with AND unless an explicit `or()` is pending. So
/// `equal(color, "blue").equal(size, "XL").or().less(price, 30)` compiles
/// to `(color = "blue" AND size = "XL") OR price < 30`, and inserting an
/// explicit `and()` between the first two conditions yields the same
/// grouping.
///
/// Misuse (an operator without a preceding condition, a duplicate filter, a
/// failing engine call) is recorded and surfaced by `build()`; after the
/// first recorded error every following fluent call is a no-op.
///

pub struct QueryBuilder<E: EntityKind, B: StorageBackend> {
    collection: Collection<E, B>,
    handle: Option<BuilderHandle>,
    has_order: bool,
    last_condition: Option<ConditionHandle>,
    combine_next_with: Operator,
    eager: Vec<EagerSpec<E>>,
    filter: Option<PostFilter<E>>,
    comparator: Option<EntityComparator<E>>,
    deferred: Option<Error>,
}

impl<E: EntityKind, B: StorageBackend> QueryBuilder<E, B> {
    pub(crate) fn new(collection: Collection<E, B>) -> Result<Self, Error> {
        let handle = collection
            .store()
            .backend()
            .create_builder(collection.store().handle(), E::ENTITY_NAME)?;

        Ok(Self {
            collection,
            handle: Some(handle),
            has_order: false,
            last_condition: None,
            combine_next_with: Operator::None,
            eager: Vec::new(),
            filter: None,
            comparator: None,
            deferred: None,
        })
    }

    // ------------------------------------------------------------------
    // Combinators
    // ------------------------------------------------------------------

    /// Combine the previous condition with the following one using OR.
    #[must_use]
    pub fn or(self) -> Self {
        self.combine_operator(Operator::Or)
    }

    /// Combine the previous condition with the following one using AND.
    /// Adjacent conditions already combine with AND; the explicit form
    /// exists for readability in mixed chains.
    #[must_use]
    pub fn and(self) -> Self {
        self.combine_operator(Operator::And)
    }

    fn combine_operator(mut self, operator: Operator) -> Self {
        if self.deferred.is_some() {
            return self;
        }
        if self.last_condition.is_none() {
            self.deferred = Some(Error::illegal_state(
                "no previous condition; use and()/or() only between two conditions",
            ));
        } else if self.combine_next_with != Operator::None {
            self.deferred = Some(Error::illegal_state(
                "another operator is pending; use and()/or() only between two conditions",
            ));
        } else {
            self.combine_next_with = operator;
        }
        self
    }

    // ------------------------------------------------------------------
    // Nullness
    // ------------------------------------------------------------------

    #[must_use]
    pub fn is_null(self, property: PropertyRef) -> Self {
        self.push(|backend, handle| backend.cond_is_null(handle, property.id()))
    }

    #[must_use]
    pub fn not_null(self, property: PropertyRef) -> Self {
        self.push(|backend, handle| backend.cond_not_null(handle, property.id()))
    }

    // ------------------------------------------------------------------
    // Integers, booleans, dates
    // ------------------------------------------------------------------

    #[must_use]
    pub fn equal_long(self, property: PropertyRef, value: i64) -> Self {
        self.push(|backend, handle| backend.cond_equal_long(handle, property.id(), value))
    }

    #[must_use]
    pub fn equal_bool(self, property: PropertyRef, value: bool) -> Self {
        self.equal_long(property, i64::from(value))
    }

    #[must_use]
    pub fn equal_date(self, property: PropertyRef, value: Date) -> Self {
        self.equal_long(property, value.epoch_millis())
    }

    #[must_use]
    pub fn not_equal_long(self, property: PropertyRef, value: i64) -> Self {
        self.push(|backend, handle| backend.cond_not_equal_long(handle, property.id(), value))
    }

    #[must_use]
    pub fn not_equal_bool(self, property: PropertyRef, value: bool) -> Self {
        self.not_equal_long(property, i64::from(value))
    }

    #[must_use]
    pub fn not_equal_date(self, property: PropertyRef, value: Date) -> Self {
        self.not_equal_long(property, value.epoch_millis())
    }

    #[must_use]
    pub fn less_long(self, property: PropertyRef, value: i64) -> Self {
        self.push(|backend, handle| backend.cond_less_long(handle, property.id(), value))
    }

    #[must_use]
    pub fn less_date(self, property: PropertyRef, value: Date) -> Self {
        self.less_long(property, value.epoch_millis())
    }

    #[must_use]
    pub fn greater_long(self, property: PropertyRef, value: i64) -> Self {
        self.push(|backend, handle| backend.cond_greater_long(handle, property.id(), value))
    }

    #[must_use]
    pub fn greater_date(self, property: PropertyRef, value: Date) -> Self {
        self.greater_long(property, value.epoch_millis())
    }

    /// Inclusive range; `low == high` is plain equality.
    #[must_use]
    pub fn between_long(self, property: PropertyRef, low: i64, high: i64) -> Self {
        self.push(|backend, handle| backend.cond_between_long(handle, property.id(), low, high))
    }

    #[must_use]
    pub fn between_date(self, property: PropertyRef, low: Date, high: Date) -> Self {
        self.between_long(property, low.epoch_millis(), high.epoch_millis())
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    // Known engine defect: membership probes can fail with
    // "invalid unordered_map<K, T> key"; not compensated at this layer.

    #[must_use]
    pub fn one_of_longs(self, property: PropertyRef, values: &[i64]) -> Self {
        self.push(|backend, handle| backend.cond_in_longs(handle, property.id(), values, false))
    }

    #[must_use]
    pub fn not_one_of_longs(self, property: PropertyRef, values: &[i64]) -> Self {
        self.push(|backend, handle| backend.cond_in_longs(handle, property.id(), values, true))
    }

    #[must_use]
    pub fn one_of_ints(self, property: PropertyRef, values: &[i32]) -> Self {
        self.push(|backend, handle| backend.cond_in_ints(handle, property.id(), values, false))
    }

    #[must_use]
    pub fn not_one_of_ints(self, property: PropertyRef, values: &[i32]) -> Self {
        self.push(|backend, handle| backend.cond_in_ints(handle, property.id(), values, true))
    }

    // ------------------------------------------------------------------
    // Floating point
    // ------------------------------------------------------------------

    #[must_use]
    pub fn less_double(self, property: PropertyRef, value: f64) -> Self {
        self.push(|backend, handle| backend.cond_less_double(handle, property.id(), value))
    }

    #[must_use]
    pub fn greater_double(self, property: PropertyRef, value: f64) -> Self {
        self.push(|backend, handle| backend.cond_greater_double(handle, property.id(), value))
    }

    #[must_use]
    pub fn between_double(self, property: PropertyRef, low: f64, high: f64) -> Self {
        self.push(|backend, handle| backend.cond_between_double(handle, property.id(), low, high))
    }

    /// Floating point equality is non-trivial; this is a convenience for
    /// `between_double(property, value - tolerance, value + tolerance)`.
    /// When rebinding with `set_parameters_double`, the two parameters are
    /// the lower and upper bounds.
    #[must_use]
    pub fn equal_double(self, property: PropertyRef, value: f64, tolerance: f64) -> Self {
        self.between_double(property, value - tolerance, value + tolerance)
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    #[must_use]
    pub fn equal_string(self, property: PropertyRef, value: &str) -> Self {
        self.equal_string_with_order(property, value, StringOrder::default())
    }

    #[must_use]
    pub fn equal_string_with_order(
        self,
        property: PropertyRef,
        value: &str,
        order: StringOrder,
    ) -> Self {
        self.push(|backend, handle| {
            backend.cond_equal_string(handle, property.id(), value, order.case_sensitive())
        })
    }

    #[must_use]
    pub fn not_equal_string(self, property: PropertyRef, value: &str) -> Self {
        self.not_equal_string_with_order(property, value, StringOrder::default())
    }

    #[must_use]
    pub fn not_equal_string_with_order(
        self,
        property: PropertyRef,
        value: &str,
        order: StringOrder,
    ) -> Self {
        self.push(|backend, handle| {
            backend.cond_not_equal_string(handle, property.id(), value, order.case_sensitive())
        })
    }

    #[must_use]
    pub fn contains(self, property: PropertyRef, value: &str) -> Self {
        self.contains_with_order(property, value, StringOrder::default())
    }

    #[must_use]
    pub fn contains_with_order(
        self,
        property: PropertyRef,
        value: &str,
        order: StringOrder,
    ) -> Self {
        self.push(|backend, handle| {
            backend.cond_contains(handle, property.id(), value, order.case_sensitive())
        })
    }

    #[must_use]
    pub fn starts_with(self, property: PropertyRef, value: &str) -> Self {
        self.starts_with_order(property, value, StringOrder::default())
    }

    #[must_use]
    pub fn starts_with_order(
        self,
        property: PropertyRef,
        value: &str,
        order: StringOrder,
    ) -> Self {
        self.push(|backend, handle| {
            backend.cond_starts_with(handle, property.id(), value, order.case_sensitive())
        })
    }

    #[must_use]
    pub fn ends_with(self, property: PropertyRef, value: &str) -> Self {
        self.ends_with_order(property, value, StringOrder::default())
    }

    #[must_use]
    pub fn ends_with_order(self, property: PropertyRef, value: &str, order: StringOrder) -> Self {
        self.push(|backend, handle| {
            backend.cond_ends_with(handle, property.id(), value, order.case_sensitive())
        })
    }

    // ------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------

    /// Ascending sort on `property`. Chain multiple order calls to add
    /// tie-breakers: the first call is the most significant.
    #[must_use]
    pub fn order(self, property: PropertyRef) -> Self {
        self.order_with_flags(property, OrderFlags::NONE)
    }

    /// Descending sort on `property`.
    #[must_use]
    pub fn order_desc(self, property: PropertyRef) -> Self {
        self.order_with_flags(property, OrderFlags::DESCENDING)
    }

    #[must_use]
    pub fn order_with_flags(mut self, property: PropertyRef, flags: OrderFlags) -> Self {
        if self.deferred.is_some() {
            return self;
        }
        if self.combine_next_with != Operator::None {
            self.deferred = Some(Error::illegal_state(
                "an operator is pending; use and()/or() only between two conditions",
            ));
            return self;
        }

        let Some(handle) = self.handle else {
            return self;
        };
        match self
            .collection
            .store()
            .backend()
            .add_order(handle, property.id(), flags)
        {
            Ok(()) => self.has_order = true,
            Err(err) => self.deferred = Some(err.into()),
        }
        self
    }

    // ------------------------------------------------------------------
    // Eager relations, post-filter, comparator
    // ------------------------------------------------------------------

    /// Resolve `relation` eagerly for every result, caching the related
    /// data and avoiding further reads from the store.
    #[must_use]
    pub fn eager(self, relation: RelationDescriptor<E>) -> Self {
        self.eager_with_limit(0, relation)
    }

    /// Like [`Self::eager`], but only for the first `limit` results.
    /// A limit of zero resolves for every result.
    #[must_use]
    pub fn eager_with_limit(mut self, limit: u32, relation: RelationDescriptor<E>) -> Self {
        self.eager.push(EagerSpec::new(relation, limit));
        self
    }

    /// In-process predicate applied to primary results. Prefer engine
    /// conditions where possible: a filter forces full entity
    /// materialization first. Only `find()` and `for_each()` honor it;
    /// other finds reject it and aggregates silently ignore it.
    #[must_use]
    pub fn filter(mut self, filter: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        if self.deferred.is_some() {
            return self;
        }
        if self.filter.is_some() {
            self.deferred = Some(Error::illegal_state(
                "a filter was already defined; only one filter may be assigned",
            ));
        } else {
            self.filter = Some(Box::new(filter));
        }
        self
    }

    /// In-process comparator applied after engine ordering (stable). The
    /// last assignment wins.
    #[must_use]
    pub fn sort_by(
        mut self,
        comparator: impl Fn(&E, &E) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.comparator = Some(Box::new(comparator));
        self
    }

    // ------------------------------------------------------------------
    // Build
    // ------------------------------------------------------------------

    /// Compile the accumulated conditions into a repeatable [`Query`] and
    /// consume this builder. The builder's engine handle is released no
    /// matter the outcome.
    pub fn build(mut self) -> Result<Query<E, B>, Error> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        if self.combine_next_with != Operator::None {
            return Err(Error::illegal_state(
                "incomplete logic condition; use or()/and() between two conditions only",
            ));
        }

        let Some(handle) = self.handle.take() else {
            return Err(Error::illegal_state(
                "this query builder was already consumed",
            ));
        };

        let backend = self.collection.store().backend();
        let compiled = backend.compile(handle);
        backend.destroy_builder(handle);
        let query_handle = compiled?;
        debug!(entity = E::ENTITY_NAME, "query compiled");

        Ok(Query::new(
            self.collection.clone(),
            query_handle,
            self.has_order,
            std::mem::take(&mut self.eager),
            self.filter.take(),
            self.comparator.take(),
        ))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn push(
        mut self,
        make: impl FnOnce(&B, BuilderHandle) -> Result<ConditionHandle, BackendError>,
    ) -> Self {
        if self.deferred.is_some() {
            return self;
        }
        let Some(handle) = self.handle else {
            return self;
        };

        match make(self.collection.store().backend(), handle) {
            Ok(condition) => self.sink(handle, condition),
            Err(err) => self.deferred = Some(err.into()),
        }
        self
    }

    /// Combinator sink: fold the new condition into the accumulated one,
    /// left to right. AND unless an explicit `or()` is pending.
    fn sink(&mut self, handle: BuilderHandle, condition: ConditionHandle) {
        let use_or = self.combine_next_with == Operator::Or;
        self.combine_next_with = Operator::None;

        let Some(previous) = self.last_condition else {
            self.last_condition = Some(condition);
            return;
        };

        match self
            .collection
            .store()
            .backend()
            .combine(handle, previous, condition, use_or)
        {
            Ok(combined) => self.last_condition = Some(combined),
            Err(err) => self.deferred = Some(err.into()),
        }
    }
}

impl<E: EntityKind, B: StorageBackend> Drop for QueryBuilder<E, B> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.collection.store().backend().destroy_builder(handle);
        }
    }
}
