///
/// LazyTarget
///
/// To-one relation endpoint that loads its target on demand. `materialize`
/// forces the load now, inside the caller's transaction.
///

pub trait LazyTarget {
    fn materialize(&self);
}

///
/// LazyCollection
///
/// To-many relation endpoint. `materialize` forces the collection to load
/// and reports its size, which is the load trigger the engine contract
/// relies on.
///

pub trait LazyCollection {
    fn materialize(&self) -> usize;
}

///
/// RelationAccess
///
/// How a relation is reached from an entity. The getter returns `None` when
/// the relation slot itself is absent on the instance.
///

pub enum RelationAccess<E> {
    ToOne(fn(&E) -> Option<&dyn LazyTarget>),
    ToMany(fn(&E) -> Option<&dyn LazyCollection>),
}

impl<E> Clone for RelationAccess<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RelationAccess<E> {}

///
/// RelationDescriptor
///
/// Identifies a declared relation and how to traverse it from a source
/// entity. Generated alongside entity metadata.
///

pub struct RelationDescriptor<E> {
    id: u32,
    name: &'static str,
    access: RelationAccess<E>,
}

impl<E> RelationDescriptor<E> {
    #[must_use]
    pub const fn to_one(id: u32, name: &'static str, getter: fn(&E) -> Option<&dyn LazyTarget>) -> Self {
        Self {
            id,
            name,
            access: RelationAccess::ToOne(getter),
        }
    }

    #[must_use]
    pub const fn to_many(
        id: u32,
        name: &'static str,
        getter: fn(&E) -> Option<&dyn LazyCollection>,
    ) -> Self {
        Self {
            id,
            name,
            access: RelationAccess::ToMany(getter),
        }
    }

    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn access(&self) -> RelationAccess<E> {
        self.access
    }

    /// Force the related data of `entity` to load now.
    pub(crate) fn resolve(&self, entity: &E) {
        match self.access {
            RelationAccess::ToOne(getter) => {
                if let Some(target) = getter(entity) {
                    target.materialize();
                }
            }
            RelationAccess::ToMany(getter) => {
                if let Some(collection) = getter(entity) {
                    collection.materialize();
                }
            }
        }
    }
}

impl<E> Clone for RelationDescriptor<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RelationDescriptor<E> {}

///
/// EagerSpec
///
/// One relation to resolve eagerly during a fetch, with an optional prefix
/// limit. A limit of zero resolves for every result.
///

pub struct EagerSpec<E> {
    relation: RelationDescriptor<E>,
    limit: u32,
}

impl<E> EagerSpec<E> {
    #[must_use]
    pub const fn new(relation: RelationDescriptor<E>, limit: u32) -> Self {
        Self { relation, limit }
    }

    #[must_use]
    pub const fn all(relation: RelationDescriptor<E>) -> Self {
        Self::new(relation, 0)
    }

    #[must_use]
    pub const fn relation(&self) -> &RelationDescriptor<E> {
        &self.relation
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Whether eager loading applies to the result at `index`.
    pub(crate) fn applies_at(&self, index: usize) -> bool {
        self.limit == 0 || (index as u64) < u64::from(self.limit)
    }
}

impl<E> Clone for EagerSpec<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for EagerSpec<E> {}
