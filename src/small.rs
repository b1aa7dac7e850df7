//! ## Small set
//! Exact representation of [`HyperLogLogWithSmallSet`](crate::hyperloglog::HyperLogLogWithSmallSet)
//! holding up to `N` distinct 64-bit keys inline.
//!
//! Lookups are a linear scan over the whole array, which the compiler vectorizes for the
//! small fixed sizes used here.

/// Small set container
#[derive(Clone, Copy, Debug)]
pub(crate) struct SmallSet<const N: usize> {
    items: [u64; N],
    len: usize,
}

impl<const N: usize> SmallSet<N> {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            items: [0; N],
            len: 0,
        }
    }

    /// Return number of distinct keys
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn contains(&self, key: u64) -> bool {
        contains_vectorized(&self.items[..self.len], key)
    }

    /// Insert key into `SmallSet`.
    /// Returns true on success (including already present keys), false when full.
    #[inline]
    pub(crate) fn insert(&mut self, key: u64) -> bool {
        if self.contains(key) {
            return true;
        }
        if self.len == N {
            return false;
        }
        self.items[self.len] = key;
        self.len += 1;
        true
    }

    /// Return keys stored within `SmallSet`
    #[inline]
    pub(crate) fn items(&self) -> &[u64] {
        &self.items[..self.len]
    }
}

impl<const N: usize> PartialEq for SmallSet<N> {
    /// Sets are equal when they hold the same keys in any order
    fn eq(&self, rhs: &Self) -> bool {
        self.len == rhs.len && self.items().iter().all(|&key| rhs.contains(key))
    }
}

/// Linear search without early exit, friendly to auto-vectorization
#[inline]
fn contains_vectorized(a: &[u64], v: u64) -> bool {
    let mut res = false;
    for &x in a {
        res |= x == v
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_set() {
        let mut set = SmallSet::<4>::new();
        assert_eq!(set.len(), 0);
        assert!(set.insert(0));
        assert!(set.insert(0));
        assert!(set.insert(10));
        assert!(set.insert(20));
        assert!(set.insert(30));
        assert_eq!(set.len(), 4);
        assert!(set.insert(20));
        assert!(!set.insert(40));
        assert_eq!(set.items(), &[0, 10, 20, 30]);
        assert!(set.contains(0));
        assert!(!set.contains(40));

        let mut other = SmallSet::<4>::new();
        for key in [30, 20, 10, 0] {
            other.insert(key);
        }
        assert_eq!(set, other);
        other = SmallSet::new();
        assert_ne!(set, other);
    }
}
