use std::{
    fmt,
    hash::Hash,
    marker::PhantomData,
    num::NonZeroU32,
    ops::{Index, IndexMut},
};

/// Default number of nodes each arena of a compilation may hold.
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Storage is reserved upfront, but never more than this many slots.
const MAX_UPFRONT_RESERVATION: usize = 4 * 1024;

/// A handle to some value of type `T` allocated in an [`Arena<T>`].
pub struct Id<T> {
    // Here we use a NonZeroU32 to leverage niche layout optimization, which
    // keeps `Option<Id<T>>` as small as the handle itself.
    handle: NonZeroU32,
    _ty: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    const fn unchecked_new(handle: NonZeroU32) -> Self {
        Id {
            handle,
            _ty: PhantomData,
        }
    }

    fn index(self) -> usize {
        (self.handle.get() - 1) as usize
    }
}

impl<T> Copy for Id<T> {}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<T> Eq for Id<T> {}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.handle)
    }
}

/// Returned when an allocation would go past the arena's capacity.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CapacityExceeded {
    pub capacity: usize,
}

/// A bump allocator for nodes of a single type.
///
/// Values are never freed individually; they all go away when the arena is
/// dropped. The capacity is a hard limit: allocating past it fails instead of
/// growing the storage.
pub struct Arena<T> {
    nodes: Vec<T>,
    capacity: usize,
}

impl<T> Arena<T> {
    pub fn with_capacity(capacity: usize) -> Arena<T> {
        // Handles are stored as u32, so the capacity can't go past that.
        let capacity = capacity.min(u32::MAX as usize);
        Arena {
            nodes: Vec::with_capacity(capacity.min(MAX_UPFRONT_RESERVATION)),
            capacity,
        }
    }

    pub fn alloc(&mut self, value: T) -> Result<Id<T>, CapacityExceeded> {
        if self.nodes.len() >= self.capacity {
            return Err(CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.nodes.push(value);
        let handle = u32::try_from(self.nodes.len()).expect("bounded by capacity");
        // SAFETY: The length is at least one after the push above.
        Ok(Id::unchecked_new(unsafe { NonZeroU32::new_unchecked(handle) }))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<T> Index<Id<T>> for Arena<T> {
    type Output = T;

    fn index(&self, id: Id<T>) -> &T {
        &self.nodes[id.index()]
    }
}

impl<T> IndexMut<Id<T>> for Arena<T> {
    fn index_mut(&mut self, id: Id<T>) -> &mut T {
        &mut self.nodes[id.index()]
    }
}

impl<T: fmt::Debug> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (i, node) in self.nodes.iter().enumerate() {
            map.entry(&(i + 1), node);
        }
        map.finish()
    }
}
