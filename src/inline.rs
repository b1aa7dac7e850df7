//! ## Inline cell buffer
//! Cell storage of the open-addressing sets.
//!
//! The first `N` cells live inside the set itself, so a state holding a handful of values
//! never touches the allocator. Once a set outgrows them, the cells move to a heap-allocated
//! power-of-two slice.

use std::mem::size_of_val;
use std::ops::{Deref, DerefMut};

#[derive(Clone, Debug)]
pub(crate) enum InlineBuffer<T, const N: usize> {
    Inline([T; N]),
    Heap(Box<[T]>),
}

impl<T: Copy + Default, const N: usize> InlineBuffer<T, N> {
    /// Create buffer of `N` default cells
    #[inline]
    pub(crate) fn new() -> Self {
        Self::Inline([T::default(); N])
    }

    /// Create buffer of `len` default cells, stored inline when `len == N`
    #[inline]
    pub(crate) fn with_len(len: usize) -> Self {
        if len == N {
            Self::new()
        } else {
            Self::Heap(vec![T::default(); len].into_boxed_slice())
        }
    }

    #[inline]
    pub(crate) fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }

    /// Return number of heap allocated bytes
    #[inline]
    pub(crate) fn heap_size(&self) -> usize {
        match self {
            Self::Inline(_) => 0,
            Self::Heap(cells) => size_of_val(&**cells),
        }
    }
}

impl<T, const N: usize> Deref for InlineBuffer<T, N> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        match self {
            Self::Inline(cells) => cells,
            Self::Heap(cells) => cells,
        }
    }
}

impl<T, const N: usize> DerefMut for InlineBuffer<T, N> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        match self {
            Self::Inline(cells) => cells,
            Self::Heap(cells) => cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_buffer() {
        let mut buf = InlineBuffer::<u64, 8>::new();
        assert!(buf.is_inline());
        assert_eq!(buf.len(), 8);
        assert_eq!(buf.heap_size(), 0);
        buf[3] = 7;
        assert_eq!(buf.iter().sum::<u64>(), 7);

        let buf = InlineBuffer::<u64, 8>::with_len(32);
        assert!(!buf.is_inline());
        assert_eq!(buf.len(), 32);
        assert_eq!(buf.heap_size(), 256);

        assert!(InlineBuffer::<u128, 8>::with_len(8).is_inline());
    }
}
