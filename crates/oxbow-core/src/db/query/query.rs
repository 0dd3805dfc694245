use crate::{
    db::{
        backend::{QueryHandle, StorageBackend, UniqueOutcome},
        query::{EntityComparator, LazyList, PostFilter, PropertyQuery},
        store::{Collection, Store},
    },
    error::Error,
    model::{EagerSpec, EntityKind, PropertyRef},
    reactive::SubscriptionBuilder,
    types::{Date, Id},
};
use parking_lot::Mutex;
use std::{ops::ControlFlow, sync::Arc};
use tracing::debug;

///
/// Query
///
/// A compiled, repeatable query returning entities. Obtained from
/// [`QueryBuilder::build`](crate::db::query::QueryBuilder::build); run as
/// often as needed. Every retrieval opens a read transaction with bounded
/// retry on transient engine failures; `remove` opens a write transaction.
///
/// The engine query handle is owned until [`Query::close`] or drop;
/// closing twice is a no-op. Parameter rebinding and close are serialized
/// through an internal lock, so sharing a query across threads is safe,
/// though rebinding is best driven from one thread at a time.
///

pub struct Query<E: EntityKind, B: StorageBackend> {
    collection: Collection<E, B>,
    handle: Mutex<Option<QueryHandle>>,
    has_order: bool,
    eager: Vec<EagerSpec<E>>,
    filter: Option<PostFilter<E>>,
    comparator: Option<EntityComparator<E>>,
}

impl<E: EntityKind, B: StorageBackend> Query<E, B> {
    pub(crate) fn new(
        collection: Collection<E, B>,
        handle: QueryHandle,
        has_order: bool,
        eager: Vec<EagerSpec<E>>,
        filter: Option<PostFilter<E>>,
        comparator: Option<EntityComparator<E>>,
    ) -> Self {
        Self {
            collection,
            handle: Mutex::new(Some(handle)),
            has_order,
            eager,
            filter,
            comparator,
        }
    }

    /// Release the engine handle now instead of waiting for drop.
    /// Idempotent and thread-safe.
    pub fn close(&self) {
        if let Some(handle) = self.handle.lock().take() {
            self.store().backend().destroy_query(handle);
            debug!(entity = E::ENTITY_NAME, "query handle released");
        }
    }

    #[must_use]
    pub const fn has_order(&self) -> bool {
        self.has_order
    }

    fn store(&self) -> &Arc<Store<B>> {
        self.collection.store()
    }

    fn handle(&self) -> Result<QueryHandle, Error> {
        self.handle
            .lock()
            .ok_or_else(|| Error::illegal_state("this query was already closed"))
    }

    // ------------------------------------------------------------------
    // Entity retrieval
    // ------------------------------------------------------------------

    /// First match, or `None`. Eager relations resolve on the result.
    pub fn find_first(&self) -> Result<Option<E>, Error> {
        self.ensure_no_filter_no_comparator()?;
        let handle = self.handle()?;

        self.store().call_in_read_tx(|scope| {
            let cursor = scope.cursor(E::ENTITY_NAME)?;
            let entity = self.store().backend().find_first::<E>(handle, cursor)?;
            if let Some(entity) = &entity {
                self.resolve_eager_all(entity);
            }
            Ok(entity)
        })
    }

    /// The only match, `None`, or [`Error::NotUnique`] when the engine
    /// reports more than one.
    pub fn find_unique(&self) -> Result<Option<E>, Error> {
        self.ensure_no_filter_no_comparator()?;
        let handle = self.handle()?;

        self.store().call_in_read_tx(|scope| {
            let cursor = scope.cursor(E::ENTITY_NAME)?;
            match self.store().backend().find_unique::<E>(handle, cursor)? {
                UniqueOutcome::Empty => Ok(None),
                UniqueOutcome::Unique(entity) => {
                    self.resolve_eager_all(&entity);
                    Ok(Some(entity))
                }
                UniqueOutcome::Ambiguous => Err(Error::NotUnique),
            }
        })
    }

    /// Every match: engine selection and ordering first, then the
    /// post-filter, then eager resolution, then the in-process comparator
    /// (stable).
    pub fn find(&self) -> Result<Vec<E>, Error> {
        let handle = self.handle()?;

        self.store().call_in_read_tx(|scope| {
            let cursor = scope.cursor(E::ENTITY_NAME)?;
            let mut entities = self.store().backend().find::<E>(handle, cursor, 0, 0)?;

            if let Some(filter) = &self.filter {
                entities.retain(|entity| filter(entity));
            }
            self.resolve_eager_indexed(&entities);
            if let Some(comparator) = &self.comparator {
                entities.sort_by(|a, b| comparator(a, b));
            }
            Ok(entities)
        })
    }

    /// Engine-level pagination. Not available with a post-filter or
    /// comparator, whose row accounting would be ambiguous.
    pub fn find_paged(&self, offset: u64, limit: u64) -> Result<Vec<E>, Error> {
        self.ensure_no_filter_no_comparator()?;
        let handle = self.handle()?;

        self.store().call_in_read_tx(|scope| {
            let cursor = scope.cursor(E::ENTITY_NAME)?;
            let entities = self
                .store()
                .backend()
                .find::<E>(handle, cursor, offset, limit)?;
            self.resolve_eager_indexed(&entities);
            Ok(entities)
        })
    }

    // ------------------------------------------------------------------
    // Id retrieval & lazy lists
    // ------------------------------------------------------------------

    /// Matching ids without materializing entities, in storage order.
    /// Only available for unordered queries; a post-filter is silently
    /// ignored.
    pub fn find_ids(&self) -> Result<Vec<Id>, Error> {
        self.ensure_unordered()?;
        let handle = self.handle()?;

        self.store()
            .call_with_reader_cursor(E::ENTITY_NAME, |cursor| {
                self.store()
                    .backend()
                    .find_ids_unordered(handle, cursor)
                    .map_err(Error::from)
            })
    }

    /// Matching entities without loading them: ids are fetched now,
    /// entities on access.
    pub fn find_lazy(&self) -> Result<LazyList<E, B>, Error> {
        self.ensure_no_filter_no_comparator()?;
        Ok(LazyList::new(
            self.collection.clone(),
            self.find_ids()?,
            false,
        ))
    }

    /// Like [`Self::find_lazy`], but entities stay cached once loaded.
    pub fn find_lazy_cached(&self) -> Result<LazyList<E, B>, Error> {
        self.ensure_no_filter_no_comparator()?;
        Ok(LazyList::new(
            self.collection.clone(),
            self.find_ids()?,
            true,
        ))
    }

    /// Stream matches one by one to `consumer` inside a single read
    /// transaction, so the consumer sees a consistent snapshot without the
    /// whole result set materializing at once. The post-filter applies;
    /// returning `ControlFlow::Break(())` stops the iteration cleanly.
    ///
    /// The consumer runs inside the read transaction and must not write to
    /// the store.
    pub fn for_each(
        &self,
        mut consumer: impl FnMut(&E) -> ControlFlow<()>,
    ) -> Result<(), Error> {
        self.ensure_no_comparator()?;
        let handle = self.handle()?;
        self.ensure_unordered()?;

        self.store().run_in_read_tx(|scope| {
            let cursor = scope.cursor(E::ENTITY_NAME)?;
            let backend = self.store().backend();
            let ids = backend.find_ids_unordered(handle, cursor)?;

            for (index, id) in ids.into_iter().enumerate() {
                let Some(entity) = backend.get_entity::<E>(cursor, id)? else {
                    return Err(Error::illegal_state(
                        "query result vanished during iteration",
                    ));
                };
                if let Some(filter) = &self.filter {
                    if !filter(&entity) {
                        continue;
                    }
                }
                self.resolve_eager_at(&entity, index);
                if consumer(&entity).is_break() {
                    break;
                }
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Count & mutation
    // ------------------------------------------------------------------

    /// Number of matches, counted on a bare reader cursor.
    pub fn count(&self) -> Result<u64, Error> {
        let handle = self.handle()?;
        self.store()
            .call_with_reader_cursor(E::ENTITY_NAME, |cursor| {
                self.store()
                    .backend()
                    .count(handle, cursor)
                    .map_err(Error::from)
            })
    }

    /// Delete every match inside a write transaction; returns the count.
    pub fn remove(&self) -> Result<u64, Error> {
        let handle = self.handle()?;
        self.store()
            .call_with_writer_cursor(E::ENTITY_NAME, |cursor| {
                self.store()
                    .backend()
                    .remove(handle, cursor)
                    .map_err(Error::from)
            })
    }

    // ------------------------------------------------------------------
    // Property queries & aggregate conveniences
    // ------------------------------------------------------------------

    /// Derive a query returning only `property`'s values. The property
    /// must belong to this query's entity.
    #[must_use]
    pub fn property(&self, property: PropertyRef) -> PropertyQuery<'_, E, B> {
        PropertyQuery::new(self, property)
    }

    pub fn sum(&self, property: PropertyRef) -> Result<i64, Error> {
        self.property(property).sum()
    }

    pub fn sum_double(&self, property: PropertyRef) -> Result<f64, Error> {
        self.property(property).sum_double()
    }

    pub fn min(&self, property: PropertyRef) -> Result<i64, Error> {
        self.property(property).min()
    }

    pub fn max(&self, property: PropertyRef) -> Result<i64, Error> {
        self.property(property).max()
    }

    pub fn min_double(&self, property: PropertyRef) -> Result<f64, Error> {
        self.property(property).min_double()
    }

    pub fn max_double(&self, property: PropertyRef) -> Result<f64, Error> {
        self.property(property).max_double()
    }

    pub fn avg(&self, property: PropertyRef) -> Result<f64, Error> {
        self.property(property).avg()
    }

    // ------------------------------------------------------------------
    // Parameter rebinding
    // ------------------------------------------------------------------

    /// Rebind a string parameter declared by the builder's conditions.
    /// Observers are not notified; call [`Self::publish`] to re-broadcast.
    pub fn set_parameter_string(&self, property: PropertyRef, value: &str) -> Result<(), Error> {
        self.with_handle(|handle| {
            self.store()
                .backend()
                .set_parameter_string(handle, property.id(), value)
        })
    }

    pub fn set_parameter_long(&self, property: PropertyRef, value: i64) -> Result<(), Error> {
        self.with_handle(|handle| {
            self.store()
                .backend()
                .set_parameter_long(handle, property.id(), value)
        })
    }

    pub fn set_parameter_double(&self, property: PropertyRef, value: f64) -> Result<(), Error> {
        self.with_handle(|handle| {
            self.store()
                .backend()
                .set_parameter_double(handle, property.id(), value)
        })
    }

    pub fn set_parameter_date(&self, property: PropertyRef, value: Date) -> Result<(), Error> {
        self.set_parameter_long(property, value.epoch_millis())
    }

    pub fn set_parameter_bool(&self, property: PropertyRef, value: bool) -> Result<(), Error> {
        self.set_parameter_long(property, i64::from(value))
    }

    /// Rebind a two-value parameter slot, e.g. the bounds of `between`.
    pub fn set_parameters_long(
        &self,
        property: PropertyRef,
        first: i64,
        second: i64,
    ) -> Result<(), Error> {
        self.with_handle(|handle| {
            self.store()
                .backend()
                .set_parameters_long(handle, property.id(), first, second)
        })
    }

    pub fn set_parameters_double(
        &self,
        property: PropertyRef,
        first: f64,
        second: f64,
    ) -> Result<(), Error> {
        self.with_handle(|handle| {
            self.store()
                .backend()
                .set_parameters_double(handle, property.id(), first, second)
        })
    }

    // ------------------------------------------------------------------
    // Reactive
    // ------------------------------------------------------------------

    /// Subscribe an observer to (potential) result changes. The observer
    /// immediately receives current results, delivered on the store's
    /// worker pool. Hold on to the returned subscription (or this query);
    /// dropping both makes the observer go stale.
    #[must_use]
    pub fn subscribe(&self) -> SubscriptionBuilder<E> {
        SubscriptionBuilder::new(
            Arc::clone(self.collection.publisher()),
            Arc::clone(self.store().worker_pool()),
        )
    }

    /// Re-broadcast current results to all subscribed observers. Useful
    /// after rebinding parameters, which by itself does not notify.
    pub fn publish(&self) {
        self.collection.publisher().publish();
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    pub(crate) fn run_property<R>(
        &self,
        op: impl FnMut(&B, QueryHandle, crate::db::backend::CursorHandle) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let handle = self.handle()?;
        let mut op = op;
        self.store().call_in_read_tx(move |scope| {
            let cursor = scope.cursor(E::ENTITY_NAME)?;
            op(self.store().backend(), handle, cursor)
        })
    }

    fn with_handle(
        &self,
        op: impl FnOnce(QueryHandle) -> Result<(), crate::db::backend::BackendError>,
    ) -> Result<(), Error> {
        let guard = self.handle.lock();
        let handle = guard.ok_or_else(|| Error::illegal_state("this query was already closed"))?;
        op(handle).map_err(Error::from)
    }

    fn ensure_unordered(&self) -> Result<(), Error> {
        if self.has_order {
            return Err(Error::unsupported(
                "id-based retrieval is only available for unordered queries",
            ));
        }
        Ok(())
    }

    fn ensure_no_filter_no_comparator(&self) -> Result<(), Error> {
        if self.filter.is_some() {
            return Err(Error::unsupported(
                "this retrieval does not support a post-filter; only find() and for_each() do",
            ));
        }
        self.ensure_no_comparator()
    }

    fn ensure_no_comparator(&self) -> Result<(), Error> {
        if self.comparator.is_some() {
            return Err(Error::unsupported(
                "this retrieval does not support a sorting comparator; only find() does",
            ));
        }
        Ok(())
    }

    fn resolve_eager_all(&self, entity: &E) {
        for spec in &self.eager {
            spec.relation().resolve(entity);
        }
    }

    fn resolve_eager_at(&self, entity: &E, index: usize) {
        for spec in &self.eager {
            if spec.applies_at(index) {
                spec.relation().resolve(entity);
            }
        }
    }

    fn resolve_eager_indexed(&self, entities: &[E]) {
        if self.eager.is_empty() {
            return;
        }
        for (index, entity) in entities.iter().enumerate() {
            self.resolve_eager_at(entity, index);
        }
    }
}

impl<E: EntityKind, B: StorageBackend> Drop for Query<E, B> {
    fn drop(&mut self) {
        self.close();
    }
}
