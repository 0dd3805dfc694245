//! Store entry point and transaction envelopes.
//!
//! A `Store` pairs an engine store handle with the backend capability that
//! owns it, plus the retry policy and the shared worker pool subscriptions
//! deliver on. `Collection` is the per-entity handle query builders hang off.

use crate::{
    db::{
        backend::{CursorHandle, StorageBackend, StoreHandle, TxHandle, TxMode},
        query::QueryBuilder,
    },
    error::Error,
    model::EntityKind,
    reactive::{Publisher, WorkerPool},
    types::Id,
};
use std::{sync::Arc, thread, time::Duration};
use tracing::warn;

///
/// StoreOptions
///
/// Execution policy for queries against one store. The retry parameters
/// bound the transaction envelope applied to every retrieval.
///

#[derive(Clone, Copy, Debug)]
pub struct StoreOptions {
    query_attempts: u32,
    initial_retry_backoff: Duration,
}

impl StoreOptions {
    pub const DEFAULT_QUERY_ATTEMPTS: u32 = 3;
    pub const DEFAULT_INITIAL_RETRY_BACKOFF: Duration = Duration::from_millis(10);

    #[must_use]
    pub const fn new() -> Self {
        Self {
            query_attempts: Self::DEFAULT_QUERY_ATTEMPTS,
            initial_retry_backoff: Self::DEFAULT_INITIAL_RETRY_BACKOFF,
        }
    }

    #[must_use]
    pub const fn with_query_attempts(mut self, attempts: u32) -> Self {
        self.query_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn with_initial_retry_backoff(mut self, backoff: Duration) -> Self {
        self.initial_retry_backoff = backoff;
        self
    }

    #[must_use]
    pub const fn query_attempts(&self) -> u32 {
        self.query_attempts
    }

    #[must_use]
    pub const fn initial_retry_backoff(&self) -> Duration {
        self.initial_retry_backoff
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new()
    }
}

///
/// TxScope
///
/// Borrow of an open transaction. Cursors acquired here are scoped to the
/// transaction and must not escape it; the closure-shaped envelope below
/// makes escaping impossible.
///

pub struct TxScope<'a, B: StorageBackend> {
    backend: &'a B,
    tx: TxHandle,
}

impl<B: StorageBackend> TxScope<'_, B> {
    pub fn cursor(&self, entity_name: &str) -> Result<CursorHandle, Error> {
        self.backend.cursor(self.tx, entity_name).map_err(Error::from)
    }
}

///
/// Store
///
/// Handle to one engine store. Shared by every collection, query, and
/// subscription derived from it.
///

pub struct Store<B: StorageBackend> {
    backend: Arc<B>,
    handle: StoreHandle,
    options: StoreOptions,
    pool: Arc<dyn WorkerPool>,
}

impl<B: StorageBackend> Store<B> {
    pub fn new(
        backend: Arc<B>,
        handle: StoreHandle,
        options: StoreOptions,
        pool: Arc<dyn WorkerPool>,
    ) -> Self {
        Self {
            backend,
            handle,
            options,
            pool,
        }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub const fn handle(&self) -> StoreHandle {
        self.handle
    }

    #[must_use]
    pub const fn options(&self) -> &StoreOptions {
        &self.options
    }

    #[must_use]
    pub fn worker_pool(&self) -> &Arc<dyn WorkerPool> {
        &self.pool
    }

    /// Run `op` inside a read transaction with bounded retry: transient
    /// backend failures are retried up to the configured attempt count,
    /// backoff doubling between tries. Logical errors surface immediately.
    pub(crate) fn call_in_read_tx<R>(
        &self,
        mut op: impl FnMut(&TxScope<'_, B>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let attempts = self.options.query_attempts.max(1);
        let mut backoff = self.options.initial_retry_backoff;
        let mut attempt = 1;

        loop {
            match self.run_tx(TxMode::Read, &mut op) {
                Err(err) if err.is_transient() && attempt < attempts => {
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        backoff = ?backoff,
                        error = %err,
                        "read transaction failed; retrying"
                    );
                    thread::sleep(backoff);
                    backoff *= 2;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    /// Run `op` inside a single read transaction, no retry. Used when the
    /// operation drives caller side effects that must not replay.
    pub(crate) fn run_in_read_tx<R>(
        &self,
        op: impl FnOnce(&TxScope<'_, B>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let mut op = Some(op);
        self.run_tx(TxMode::Read, &mut |scope| {
            let op = op.take().ok_or_else(|| {
                Error::illegal_state("single-shot transaction body invoked twice")
            })?;
            op(scope)
        })
    }

    /// Bare reader cursor for one entity, single attempt.
    pub(crate) fn call_with_reader_cursor<R>(
        &self,
        entity_name: &str,
        op: impl FnOnce(CursorHandle) -> Result<R, Error>,
    ) -> Result<R, Error> {
        self.run_in_read_tx(|scope| op(scope.cursor(entity_name)?))
    }

    /// Bare writer cursor for one entity, single write transaction.
    pub(crate) fn call_with_writer_cursor<R>(
        &self,
        entity_name: &str,
        op: impl FnOnce(CursorHandle) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let mut op = Some(op);
        self.run_tx(TxMode::Write, &mut |scope: &TxScope<'_, B>| {
            let op = op.take().ok_or_else(|| {
                Error::illegal_state("single-shot transaction body invoked twice")
            })?;
            op(scope.cursor(entity_name)?)
        })
    }

    fn run_tx<R>(
        &self,
        mode: TxMode,
        op: &mut dyn FnMut(&TxScope<'_, B>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let tx = self.backend.begin_tx(self.handle, mode)?;
        let scope = TxScope {
            backend: &*self.backend,
            tx,
        };

        match op(&scope) {
            Ok(value) => {
                self.backend.commit_tx(tx)?;
                Ok(value)
            }
            Err(err) => {
                self.backend.abort_tx(tx);
                Err(err)
            }
        }
    }
}

///
/// Collection
///
/// Per-entity handle over a store: creates query builders, carries the
/// entity's notification capability, and performs the id-based fetches the
/// lazy list relies on.
///

pub struct Collection<E: EntityKind, B: StorageBackend> {
    store: Arc<Store<B>>,
    publisher: Arc<dyn Publisher<E>>,
}

impl<E: EntityKind, B: StorageBackend> Collection<E, B> {
    pub fn new(store: Arc<Store<B>>, publisher: Arc<dyn Publisher<E>>) -> Self {
        Self { store, publisher }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<Store<B>> {
        &self.store
    }

    #[must_use]
    pub fn publisher(&self) -> &Arc<dyn Publisher<E>> {
        &self.publisher
    }

    /// Begin a query over this collection's entity.
    pub fn query(&self) -> Result<QueryBuilder<E, B>, Error> {
        QueryBuilder::new(self.clone())
    }

    /// Fetch one entity by id through a bare reader cursor.
    pub fn get(&self, id: Id) -> Result<Option<E>, Error> {
        self.store.call_with_reader_cursor(E::ENTITY_NAME, |cursor| {
            self.store
                .backend()
                .get_entity::<E>(cursor, id)
                .map_err(Error::from)
        })
    }
}

impl<E: EntityKind, B: StorageBackend> Clone for Collection<E, B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            publisher: Arc::clone(&self.publisher),
        }
    }
}
