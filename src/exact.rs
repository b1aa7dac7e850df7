//! ## Exact hash set
//! Open-addressing set with linear probing used by `uniqExact`.
//!
//! Cell value `0` marks an empty cell, so key `0` is tracked by a separate flag. The set
//! starts with `N` inline cells and keeps at most half of its cells occupied. Past that it
//! moves to the heap, growing 4x at a time while below 2^23 cells and 2x afterwards.
//!
//! Serialized format:
//! - varuint number of keys `N`
//! - `N` keys, little-endian, in unspecified order

use std::fmt::{Debug, Formatter};
use std::io::{self, Read, Write};
use std::mem::size_of;

use crate::error::UniqError;
use crate::hash::{hash128_to_64, int_hash64, Key};
use crate::inline::InlineBuffer;
use crate::state::DistinctSet;
use crate::wire::{read_u128, read_u64, read_var_uint, write_var_uint};

/// Size degree from which the set grows 2x instead of 4x
const SLOW_GROWTH_DEGREE: u8 = 23;

/// Exact set over 64-bit keys: numbers up to 64 bits wide
pub type ExactSet64 = ExactHashSet<u64, 16>;
/// Exact set over 128-bit keys: wide numbers, strings and multi-column keys
pub type ExactSet128 = ExactHashSet<u128, 8>;

/// Key stored in a cell of [`ExactHashSet`].
pub trait CellKey: Copy + Default + Eq + Debug {
    /// Hash selecting the first cell to look at
    fn bucket_hash(self) -> u64;
    fn from_key(key: Key) -> Self;
    fn write_le<W: Write + ?Sized>(self, w: &mut W) -> io::Result<()>;
    fn read_le<R: Read + ?Sized>(r: &mut R) -> Result<Self, UniqError>;
}

impl CellKey for u64 {
    #[inline]
    fn bucket_hash(self) -> u64 {
        int_hash64(self)
    }

    #[inline]
    fn from_key(key: Key) -> Self {
        key.to_u64()
    }

    fn write_le<W: Write + ?Sized>(self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.to_le_bytes())
    }

    fn read_le<R: Read + ?Sized>(r: &mut R) -> Result<Self, UniqError> {
        read_u64(r)
    }
}

impl CellKey for u128 {
    /// Raw 128-bit numbers may differ only in the high half, so both halves are mixed
    #[inline]
    fn bucket_hash(self) -> u64 {
        hash128_to_64(self as u64, (self >> 64) as u64)
    }

    #[inline]
    fn from_key(key: Key) -> Self {
        key.to_u128()
    }

    fn write_le<W: Write + ?Sized>(self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.to_le_bytes())
    }

    fn read_le<R: Read + ?Sized>(r: &mut R) -> Result<Self, UniqError> {
        read_u128(r)
    }
}

#[derive(Clone)]
pub struct ExactHashSet<K: CellKey, const N: usize> {
    cells: InlineBuffer<K, N>,
    /// Number of cells is `1 << size_degree`
    size_degree: u8,
    /// Number of occupied cells
    occupied: usize,
    has_zero: bool,
}

impl<K: CellKey, const N: usize> ExactHashSet<K, N> {
    /// Ensure that inline capacity is a power of two at compile time
    const VALID_PARAMS: () = assert!(N.is_power_of_two() && N >= 4);

    /// Creates new empty set using inline storage
    #[inline]
    pub fn new() -> Self {
        // compile time check of params
        _ = Self::VALID_PARAMS;

        Self {
            cells: InlineBuffer::new(),
            size_degree: N.trailing_zeros() as u8,
            occupied: 0,
            has_zero: false,
        }
    }

    /// Insert key, duplicates are ignored
    #[inline]
    pub fn insert(&mut self, key: K) {
        if key == K::default() {
            self.has_zero = true;
            return;
        }
        if self.insert_cell(key) && self.occupied > self.max_fill() {
            self.grow();
        }
    }

    /// Return whether `key` is present
    pub fn contains(&self, key: K) -> bool {
        if key == K::default() {
            return self.has_zero;
        }
        let mask = self.cells.len() - 1;
        let mut place = key.bucket_hash() as usize & mask;
        loop {
            let cell = self.cells[place];
            if cell == key {
                return true;
            }
            if cell == K::default() {
                return false;
            }
            place = (place + 1) & mask;
        }
    }

    /// Return number of distinct keys
    #[inline]
    pub fn len(&self) -> usize {
        self.occupied + usize::from(self.has_zero)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return whether cells are still stored inline
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.cells.is_inline()
    }

    /// Return keys in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        let zero = self.has_zero.then(K::default);
        zero.into_iter()
            .chain(self.cells.iter().copied().filter(|&k| k != K::default()))
    }

    /// Union `rhs` into `self`
    pub fn merge(&mut self, rhs: &Self) {
        for key in rhs.iter() {
            self.insert(key);
        }
    }

    /// Write set in binary format
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        write_var_uint(w, self.len() as u64)?;
        for key in self.iter() {
            key.write_le(w)?;
        }
        Ok(())
    }

    /// Read set written by [`Self::write`]
    ///
    /// Keys are inserted as they are read, so a count larger than the actual payload ends
    /// with an EOF error instead of a large allocation.
    pub fn read<R: Read + ?Sized>(r: &mut R) -> Result<Self, UniqError> {
        let expected = read_var_uint(r)?;
        let mut set = Self::new();
        for _ in 0..expected {
            set.insert(K::read_le(r)?);
        }
        let actual = set.len() as u64;
        if actual != expected {
            return Err(UniqError::DuplicateKeys { expected, actual });
        }
        Ok(set)
    }

    /// Return memory size of the set
    pub fn size_of(&self) -> usize {
        size_of::<Self>() + self.cells.heap_size()
    }

    #[inline]
    fn max_fill(&self) -> usize {
        self.cells.len() / 2
    }

    /// Insert non-zero key into cells, returns whether the key was new
    #[inline]
    fn insert_cell(&mut self, key: K) -> bool {
        let mask = self.cells.len() - 1;
        let mut place = key.bucket_hash() as usize & mask;
        loop {
            let cell = self.cells[place];
            if cell == key {
                return false;
            }
            if cell == K::default() {
                self.cells[place] = key;
                self.occupied += 1;
                return true;
            }
            place = (place + 1) & mask;
        }
    }

    /// Move cells into a larger heap buffer
    fn grow(&mut self) {
        let step = if self.size_degree >= SLOW_GROWTH_DEGREE { 1 } else { 2 };
        let new_degree = self.size_degree + step;
        let old = std::mem::replace(&mut self.cells, InlineBuffer::with_len(1 << new_degree));
        self.size_degree = new_degree;
        self.occupied = 0;
        for &key in old.iter() {
            if key != K::default() {
                self.insert_cell(key);
            }
        }
        log::trace!(
            "exact set grown to {} cells holding {} keys",
            self.cells.len(),
            self.len()
        );
    }
}

impl<K: CellKey, const N: usize> Default for ExactHashSet<K, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: CellKey, const N: usize> FromIterator<K> for ExactHashSet<K, N> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

impl<K: CellKey, const N: usize> PartialEq for ExactHashSet<K, N> {
    /// Sets are equal when they hold the same keys, regardless of cell layout
    fn eq(&self, rhs: &Self) -> bool {
        self.len() == rhs.len() && self.iter().all(|key| rhs.contains(key))
    }
}

impl<K: CellKey, const N: usize> Debug for ExactHashSet<K, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&DistinctSet::to_string(self))
    }
}

impl<K: CellKey, const N: usize> DistinctSet for ExactHashSet<K, N> {
    #[inline]
    fn insert_key(&mut self, key: Key) {
        self.insert(K::from_key(key));
    }

    #[inline]
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn size_of(&self) -> usize {
        ExactHashSet::size_of(self)
    }

    fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        self.write(w)
    }

    fn read_from(&mut self, r: &mut dyn Read) -> Result<(), UniqError> {
        *self = Self::read(r)?;
        Ok(())
    }

    fn representation(&self) -> &'static str {
        if self.is_inline() {
            "Inline"
        } else {
            "Heap"
        }
    }
}
