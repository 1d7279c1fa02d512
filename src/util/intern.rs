use std::{collections::HashMap, fmt, hash::Hash, marker::PhantomData, num::NonZeroU32, rc::Rc};

/// A handle to an interned identifier. To retrieve the `&T`, use
/// [`Interner::get`].
///
/// Two handles from the same interner are equal iff their values are, so
/// symbol tables key on handles instead of strings.
pub struct Interned<T: ?Sized> {
    handle: NonZeroU32,
    _ty: PhantomData<T>,
}

impl<T: ?Sized> Interned<T> {
    const fn unchecked_new(handle: NonZeroU32) -> Self {
        Interned {
            handle,
            _ty: PhantomData,
        }
    }
}

impl<T: ?Sized> Copy for Interned<T> {}

impl<T: ?Sized> Clone for Interned<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Hash for Interned<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl<T: ?Sized> PartialEq for Interned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<T: ?Sized> Eq for Interned<T> {}

impl<T: ?Sized> fmt::Debug for Interned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interned({})", self.handle)
    }
}

impl<T: ?Sized> From<&Interned<T>> for Interned<T> {
    fn from(value: &Interned<T>) -> Self {
        *value
    }
}

pub struct Interner<T: ?Sized> {
    map: HashMap<Rc<T>, NonZeroU32>,
    vec: Vec<Rc<T>>,
}

impl fmt::Debug for Interner<str> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (i, interned) in self.vec.iter().enumerate() {
            map.entry(&(i + 1), interned);
        }
        map.finish()
    }
}

impl<T: ?Sized> Interner<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Interner {
            map: HashMap::with_capacity(capacity),
            vec: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Interns the provided value, returning a handle which can be used to
    /// retrieve it later.
    pub fn intern(&mut self, value: &T) -> Interned<T>
    where
        T: Eq + Hash,
        T: ToOwned,
        T::Owned: Into<Rc<T>>,
    {
        if let Some(handle) = self.lookup(value) {
            return handle;
        }
        let key: Rc<T> = value.to_owned().into();
        let len = u32::try_from(self.vec.len()).expect("interned out of capacity");
        let handle = NonZeroU32::MIN.saturating_add(len);
        self.vec.push(Rc::clone(&key));
        self.map.insert(key, handle);
        Interned::unchecked_new(handle)
    }

    /// Returns the handle of an already interned value.
    pub fn lookup(&self, value: &T) -> Option<Interned<T>>
    where
        T: Eq + Hash,
    {
        self.map.get(value).copied().map(Interned::unchecked_new)
    }

    /// Returns the corresponding value for the provided [`Interned`] handle.
    /// Panics if the handle comes from another interner.
    pub fn get(&self, handle: impl Into<Interned<T>>) -> &T {
        let handle: Interned<T> = handle.into();
        let index = handle.handle.get() - 1;
        &self.vec[index as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut i = Interner::<str>::with_capacity(2);

        let count1 = i.intern("count");
        let buf = i.intern("buf");
        let count2 = i.intern("count");

        assert_eq!(count1, count2);
        assert_ne!(count1, buf);
        assert_eq!(i.len(), 2);
        assert_eq!(i.get(count2), "count");
        assert_eq!(i.lookup("buf"), Some(buf));
        assert_eq!(i.lookup("missing"), None);
    }
}
