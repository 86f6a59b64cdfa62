use std::{collections::HashMap, ops::Index};

/* ---------------------------------- Index --------------------------------- */

pub use crate::new_key_type;

pub unsafe trait IndexLike: Clone + Copy + Eq + std::hash::Hash {
    type Meta;
    fn new(meta: Self::Meta, idx: usize) -> Self;
    fn index(&self) -> usize;
}

/* -------------------------------- Allocator ------------------------------- */

#[derive(Debug)]
pub struct IndexAlloc<Meta>(Meta, usize);
impl<Meta: Copy> Iterator for IndexAlloc<Meta> {
    type Item = (Meta, usize);
    fn next(&mut self) -> Option<Self::Item> {
        let IndexAlloc(meta, idx) = self;
        let old = *idx;
        *idx += 1;
        Some((*meta, old))
    }
}

pub struct GlobalAlloc(IndexAlloc<()>);
impl GlobalAlloc {
    pub fn new() -> Self {
        GlobalAlloc(IndexAlloc((), 0))
    }
    pub fn alloc(&mut self) -> IndexAlloc<usize> {
        IndexAlloc(self.0.next().unwrap().1, 0)
    }
}

/* ---------------------------------- Arena --------------------------------- */

#[derive(Debug)]
pub struct ArenaDense<Id, T, Meta = usize> {
    allocator: IndexAlloc<Meta>,
    vec: Vec<T>,
    _marker: std::marker::PhantomData<Id>,
}

/// A deduplicating arena; structurally equal values receive the same id, so id
/// equality coincides with structural equality and can be tested in O(1).
#[derive(Debug)]
pub struct ArenaIntern<Id, T, Meta = usize> {
    dense: ArenaDense<Id, T, Meta>,
    table: HashMap<T, Id>,
}

mod impls {
    use super::*;
    use std::hash::Hash;

    /* ------------------------------- ArenaDense ------------------------------- */

    impl<Id, T, Meta> Index<&Id> for ArenaDense<Id, T, Meta>
    where
        Meta: Copy,
        Id: IndexLike<Meta = Meta>,
    {
        type Output = T;
        fn index(&self, id: &Id) -> &Self::Output {
            self.get(id).unwrap()
        }
    }

    impl<Id, T, Meta> ArenaDense<Id, T, Meta>
    where
        Meta: Copy,
        Id: IndexLike<Meta = Meta>,
    {
        pub fn new(allocator: IndexAlloc<Meta>) -> Self {
            ArenaDense { allocator, vec: Vec::new(), _marker: std::marker::PhantomData }
        }
        pub fn alloc(&mut self, val: T) -> Id {
            let id = self.allocator.next().unwrap();
            self.vec.push(val);
            IndexLike::new(id.0, id.1)
        }
        pub fn get(&self, id: &Id) -> Option<&T> {
            self.vec.get(id.index())
        }
        pub fn len(&self) -> usize {
            self.vec.len()
        }
        pub fn is_empty(&self) -> bool {
            self.vec.is_empty()
        }
    }

    /* ------------------------------- ArenaIntern ------------------------------ */

    impl<Id, T, Meta> Index<&Id> for ArenaIntern<Id, T, Meta>
    where
        Meta: Copy,
        Id: IndexLike<Meta = Meta>,
        T: Clone + Eq + Hash,
    {
        type Output = T;
        fn index(&self, id: &Id) -> &Self::Output {
            self.get(id).unwrap()
        }
    }

    impl<Id, T, Meta> ArenaIntern<Id, T, Meta>
    where
        Meta: Copy,
        Id: IndexLike<Meta = Meta>,
        T: Clone + Eq + Hash,
    {
        pub fn new(allocator: IndexAlloc<Meta>) -> Self {
            ArenaIntern { dense: ArenaDense::new(allocator), table: HashMap::new() }
        }
        /// Returns the existing id for a known value, a fresh one otherwise.
        pub fn intern(&mut self, val: T) -> Id {
            if let Some(id) = self.table.get(&val) {
                return *id;
            }
            let id = self.dense.alloc(val.clone());
            self.table.insert(val, id);
            id
        }
        pub fn get(&self, id: &Id) -> Option<&T> {
            self.dense.get(id)
        }
        pub fn len(&self) -> usize {
            self.dense.len()
        }
        pub fn is_empty(&self) -> bool {
            self.dense.is_empty()
        }
    }
}

#[macro_export]
macro_rules! new_key_type {
    ( $(#[$outer:meta])* $vis:vis struct $name:ident < $meta:ty > ; $($rest:tt)* ) => {
        $(#[$outer])*
        #[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
        $vis struct $name($meta, usize);

        unsafe impl $crate::arena::IndexLike for $name {
            type Meta = $meta;
            fn new(meta: Self::Meta, idx: usize) -> Self {
                Self(meta, idx)
            }
            fn index(&self) -> usize {
                self.1
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({:?}, {})", stringify!($name), self.0, self.1)
            }
        }

        impl $name {
            pub fn concise(&self) -> String {
                format!("[{:?}#{:?}]", self.0, self.1)
            }
        }

        $crate::new_key_type!($($rest)*);
    };

    // meta defaults to the arena index minted by `GlobalAlloc`
    ( $(#[$outer:meta])* $vis:vis struct $name:ident ; $($rest:tt)* ) => {
        $crate::new_key_type!( $(#[$outer])* $vis struct $name<usize> ; $($rest)* );
    };

    () => {}
}
