use crate::{
    db::{backend::StorageBackend, store::Collection},
    error::Error,
    model::EntityKind,
    types::Id,
};
use parking_lot::Mutex;

///
/// LazyList
///
/// Query results as ids fetched up front, entities loaded on access. Each
/// `get` runs its own bare reader cursor, so accesses see the store as it
/// is now, not as it was when the list was created. The caching variant
/// keeps every loaded entity for repeat access.
///

pub struct LazyList<E: EntityKind, B: StorageBackend> {
    collection: Collection<E, B>,
    ids: Vec<Id>,
    cache: Option<Mutex<Vec<Option<E>>>>,
}

impl<E: EntityKind, B: StorageBackend> LazyList<E, B> {
    pub(crate) fn new(collection: Collection<E, B>, ids: Vec<Id>, cached: bool) -> Self {
        let cache = cached.then(|| Mutex::new(ids.iter().map(|_| None).collect()));
        Self {
            collection,
            ids,
            cache,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    /// Load the entity at `index`. `None` past the end or when the entity
    /// was removed since the ids were fetched.
    pub fn get(&self, index: usize) -> Result<Option<E>, Error> {
        let Some(id) = self.ids.get(index).copied() else {
            return Ok(None);
        };

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock()[index].clone() {
                return Ok(Some(hit));
            }
        }

        let loaded = self.collection.get(id)?;
        if let (Some(cache), Some(entity)) = (&self.cache, &loaded) {
            cache.lock()[index] = Some(entity.clone());
        }
        Ok(loaded)
    }
}
