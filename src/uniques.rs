//! ## Adaptive sampling set
//! Estimator behind `uniq`.
//!
//! Keeps 32-bit hashes of the inserted keys in an open-addressing table of at most 2^17
//! cells. While the number of stored hashes stays within [`MAX_SIZE`] the count is exact.
//! Past that the set starts sampling: only hashes whose low `skip_degree` bits are zero are
//! kept, so each stored hash stands for `2^skip_degree` distinct keys. Every time the
//! stored count exceeds [`MAX_SIZE`] again `skip_degree` is incremented and the hashes which
//! no longer match are evicted.
//!
//! Buckets are chosen by the hash bits above the low [`BITS_FOR_SKIP`], which sampling
//! never looks at.
//!
//! Serialized format:
//! - `u8` skip degree
//! - varuint number of stored hashes
//! - stored hashes, `u32` little-endian, zero hash first when present

use std::fmt::{Debug, Formatter};
use std::io::{self, Read, Write};
use std::mem::size_of;

use crate::error::UniqError;
use crate::hash::{int_hash64, Key};
use crate::inline::InlineBuffer;
use crate::state::DistinctSet;
use crate::wire::{read_u32, read_u8, read_var_uint, write_var_uint};

/// Maximum size degree of the table
pub const MAX_SIZE_DEGREE: u8 = 17;
/// Maximum number of stored hashes
pub const MAX_SIZE: usize = 1 << (MAX_SIZE_DEGREE - 1);
/// Low hash bits reserved for sampling, never used for bucket selection
pub const BITS_FOR_SKIP: u32 = 32 - MAX_SIZE_DEGREE as u32;
const INITIAL_SIZE_DEGREE: u8 = 4;
const INITIAL_SIZE: usize = 1 << INITIAL_SIZE_DEGREE;
/// Size of the hash space
const HASH_SPACE: u64 = 1 << 32;

#[derive(Clone)]
pub struct UniquesHashSet {
    cells: InlineBuffer<u32, INITIAL_SIZE>,
    /// Number of cells is `1 << size_degree`
    size_degree: u8,
    /// Number of low bits which must be zero for a hash to be stored
    skip_degree: u8,
    /// Number of stored hashes, including the zero hash
    count: usize,
    has_zero: bool,
}

impl UniquesHashSet {
    #[inline]
    pub fn new() -> Self {
        Self {
            cells: InlineBuffer::new(),
            size_degree: INITIAL_SIZE_DEGREE,
            skip_degree: 0,
            count: 0,
            has_zero: false,
        }
    }

    /// Insert key into the set
    #[inline]
    pub fn insert(&mut self, key: u64) {
        let hash = int_hash64(key) as u32;
        if !self.good(hash) {
            return;
        }
        self.insert_hash(hash);
        self.shrink_if_needed();
    }

    /// Return exact count while not sampling, estimate otherwise
    pub fn size(&self) -> u64 {
        if self.skip_degree == 0 {
            return self.count as u64;
        }

        let count = self.count as u64;
        let skip_mask = (1u64 << self.skip_degree) - 1;
        // deterministic pseudo-random low bits
        let res = (count << self.skip_degree) + (int_hash64(count) & skip_mask);
        if res >= HASH_SPACE {
            return res;
        }

        // correction for collisions of 32-bit hashes
        let p32 = HASH_SPACE as f64;
        (p32 * (p32.ln() - (p32 - res as f64).ln())).round() as u64
    }

    /// Number of low hash bits which must be zero for a hash to be sampled
    #[inline]
    pub fn skip_degree(&self) -> u8 {
        self.skip_degree
    }

    /// Union `rhs` into `self`
    pub fn merge(&mut self, rhs: &Self) {
        if rhs.skip_degree > self.skip_degree {
            self.skip_degree = rhs.skip_degree;
            self.rehash();
        }

        if rhs.has_zero && !self.has_zero {
            self.has_zero = true;
            self.count += 1;
            self.shrink_if_needed();
        }

        for &hash in rhs.cells.iter() {
            if hash != 0 && self.good(hash) {
                self.insert_hash(hash);
                self.shrink_if_needed();
            }
        }
    }

    /// Write set in binary format
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&[self.skip_degree])?;
        write_var_uint(w, self.count as u64)?;
        if self.has_zero {
            w.write_all(&0u32.to_le_bytes())?;
        }
        for &hash in self.cells.iter().filter(|&&hash| hash != 0) {
            w.write_all(&hash.to_le_bytes())?;
        }
        Ok(())
    }

    /// Read set written by [`Self::write`]
    pub fn read<R: Read + ?Sized>(r: &mut R) -> Result<Self, UniqError> {
        let skip_degree = read_u8(r)?;
        if skip_degree > 32 {
            return Err(UniqError::InvalidSkipDegree(skip_degree));
        }
        let expected = read_var_uint(r)?;
        if expected > MAX_SIZE as u64 {
            return Err(UniqError::TooLarge {
                size: expected,
                max: MAX_SIZE as u64,
            });
        }

        let mut set = Self::new();
        set.skip_degree = skip_degree;
        set.resize(read_size_degree(expected as usize));

        for _ in 0..expected {
            let hash = read_u32(r)?;
            if !set.good(hash) {
                return Err(UniqError::InvalidHash { hash, skip_degree });
            }
            set.insert_hash(hash);
        }
        let actual = set.count as u64;
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
    fn good(&self, hash: u32) -> bool {
        u64::from(hash) & ((1u64 << self.skip_degree) - 1) == 0
    }

    #[inline]
    fn max_fill(&self) -> usize {
        1 << (self.size_degree - 1)
    }

    #[inline]
    fn place(&self, hash: u32) -> usize {
        (hash >> BITS_FOR_SKIP) as usize & (self.cells.len() - 1)
    }

    fn contains_hash(&self, hash: u32) -> bool {
        let mask = self.cells.len() - 1;
        let mut place = self.place(hash);
        loop {
            match self.cells[place] {
                cell if cell == hash => return true,
                0 => return false,
                _ => place = (place + 1) & mask,
            }
        }
    }

    /// Insert sampled hash, returns whether the hash was new
    #[inline]
    fn insert_hash(&mut self, hash: u32) -> bool {
        if hash == 0 {
            let new = !self.has_zero;
            self.count += usize::from(new);
            self.has_zero = true;
            return new;
        }

        let mask = self.cells.len() - 1;
        let mut place = self.place(hash);
        loop {
            let cell = self.cells[place];
            if cell == hash {
                return false;
            }
            if cell == 0 {
                self.cells[place] = hash;
                self.count += 1;
                return true;
            }
            place = (place + 1) & mask;
        }
    }

    fn shrink_if_needed(&mut self) {
        if self.count <= self.max_fill() {
            return;
        }
        if self.count > MAX_SIZE {
            while self.count > MAX_SIZE {
                self.skip_degree += 1;
                self.rehash();
            }
            log::debug!(
                "uniques set sampling with skip degree {}, {} hashes kept",
                self.skip_degree,
                self.count
            );
        } else {
            self.resize(self.size_degree + 1);
        }
    }

    /// Move hashes into a table of `1 << size_degree` cells
    fn resize(&mut self, size_degree: u8) {
        let old = std::mem::replace(&mut self.cells, InlineBuffer::with_len(1 << size_degree));
        self.size_degree = size_degree;
        self.reinsert(&old);
    }

    /// Evict hashes which no longer match `skip_degree`
    fn rehash(&mut self) {
        let len = 1 << self.size_degree;
        let old = std::mem::replace(&mut self.cells, InlineBuffer::with_len(len));
        self.reinsert(&old);
    }

    fn reinsert(&mut self, old: &[u32]) {
        self.count = usize::from(self.has_zero);
        for &hash in old {
            if hash != 0 && self.good(hash) {
                self.insert_hash(hash);
            }
        }
    }
}

/// Size degree holding `count` hashes read from a serialized set
fn read_size_degree(count: usize) -> u8 {
    if count <= 1 {
        INITIAL_SIZE_DEGREE
    } else {
        INITIAL_SIZE_DEGREE.max((count - 1).ilog2() as u8 + 2)
    }
}

impl Default for UniquesHashSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for UniquesHashSet {
    /// Sets are equal when they sample the same hashes, regardless of cell layout
    fn eq(&self, rhs: &Self) -> bool {
        self.skip_degree == rhs.skip_degree
            && self.count == rhs.count
            && self.has_zero == rhs.has_zero
            && self
                .cells
                .iter()
                .filter(|&&hash| hash != 0)
                .all(|&hash| rhs.contains_hash(hash))
    }
}

impl Debug for UniquesHashSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&DistinctSet::to_string(self))
    }
}

impl DistinctSet for UniquesHashSet {
    #[inline]
    fn insert_key(&mut self, key: Key) {
        self.insert(key.to_u64());
    }

    #[inline]
    fn size(&self) -> u64 {
        UniquesHashSet::size(self)
    }

    fn size_of(&self) -> usize {
        UniquesHashSet::size_of(self)
    }

    fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        self.write(w)
    }

    fn read_from(&mut self, r: &mut dyn Read) -> Result<(), UniqError> {
        *self = Self::read(r)?;
        Ok(())
    }

    fn representation(&self) -> &'static str {
        if self.skip_degree == 0 {
            "Exact"
        } else {
            "Sampled"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn build(keys: impl IntoIterator<Item = u64>) -> UniquesHashSet {
        let mut set = UniquesHashSet::new();
        for key in keys {
            set.insert(key);
        }
        set
    }

    fn describe(set: &UniquesHashSet) -> String {
        format!(
            "skip_degree: {}, cells: {}, inline: {}",
            set.skip_degree,
            set.cells.len(),
            set.cells.is_inline()
        )
    }

    #[test_case(0 => "skip_degree: 0, cells: 16, inline: true")]
    #[test_case(8 => "skip_degree: 0, cells: 16, inline: true")]
    #[test_case(9 => "skip_degree: 0, cells: 32, inline: false")]
    #[test_case(1000 => "skip_degree: 0, cells: 2048, inline: false")]
    #[test_case(65_536 => "skip_degree: 0, cells: 131072, inline: false")]
    #[test_case(200_000 => "skip_degree: 2, cells: 131072, inline: false")]
    fn test_growth(n: u64) -> String {
        describe(&build(1..=n))
    }

    #[test_case(0)]
    #[test_case(1)]
    #[test_case(16)]
    #[test_case(17)]
    #[test_case(1000)]
    fn test_exact_while_not_sampling(n: u64) {
        let set = build((0..n).chain(0..n));
        assert_eq!(set.size(), n);
    }

    #[test]
    fn test_full_set_without_sampling_is_uncorrected() {
        let mut set = UniquesHashSet::new();
        for i in 1..=MAX_SIZE as u32 {
            set.insert_hash(i << BITS_FOR_SKIP);
            set.shrink_if_needed();
        }
        assert_eq!(set.skip_degree, 0);
        assert_eq!(set.size(), MAX_SIZE as u64);

        // the collision correction would add one at this size
        let p32 = 2f64.powi(32);
        let corrected = (-p32 * (-(MAX_SIZE as f64) / p32).ln_1p()).round() as u64;
        assert_eq!(corrected, MAX_SIZE as u64 + 1);
    }

    #[test]
    fn test_zero_key() {
        // int_hash64(0) is the zero hash
        let set = build([0, 0, 1]);
        assert!(set.has_zero);
        assert_eq!(set.size(), 2);
    }

    #[test_case(100_000)]
    #[test_case(1_000_000)]
    fn test_accuracy(n: u64) {
        let set = build(0..n);
        assert!(set.skip_degree > 0);
        let err = (set.size() as f64 - n as f64).abs() / n as f64;
        assert!(err < 0.05, "relative error {err:.4} for {n} keys");
    }

    #[test_case(10, 20)]
    #[test_case(0, 70_000)]
    #[test_case(70_000, 5)]
    #[test_case(300_000, 100_000)]
    fn test_merge(lhs_n: u64, rhs_n: u64) {
        let lhs = build(0..lhs_n);
        let rhs = build(lhs_n / 2..lhs_n / 2 + rhs_n);

        let mut ab = lhs.clone();
        ab.merge(&rhs);
        let mut ba = rhs.clone();
        ba.merge(&lhs);

        assert_eq!(ab, ba);
        assert_eq!(ab.size(), ba.size());
        assert_eq!(ab, build((0..lhs_n).chain(lhs_n / 2..lhs_n / 2 + rhs_n)));
    }

    #[test]
    fn test_merge_associativity() {
        let a = build(0..50_000);
        let b = build(40_000..90_000);
        let c = build(85_000..200_000);

        let mut left = a.clone();
        left.merge(&b);
        left.merge(&c);

        let mut bc = b.clone();
        bc.merge(&c);
        let mut right = a.clone();
        right.merge(&bc);

        assert_eq!(left, right);
        assert_eq!(left.size(), right.size());
    }

    #[test_case(0)]
    #[test_case(1)]
    #[test_case(33)]
    #[test_case(500_000)]
    fn test_write_read(n: u64) {
        let set = build(0..n);
        let mut buf = Vec::new();
        set.write(&mut buf).unwrap();
        let restored = UniquesHashSet::read(&mut buf.as_slice()).unwrap();
        assert_eq!(restored, set);
        assert_eq!(restored.size(), set.size());

        let other = build(n..n + 1000);
        let mut a = set.clone();
        a.merge(&other);
        let mut b = restored;
        b.merge(&other);
        assert_eq!(a.size(), b.size());
    }

    #[test_case(0 => 4)]
    #[test_case(1 => 4)]
    #[test_case(8 => 4)]
    #[test_case(9 => 5)]
    #[test_case(65_536 => 17)]
    fn test_read_size_degree(count: usize) -> u8 {
        read_size_degree(count)
    }

    #[test]
    fn test_read_corrupted() {
        assert!(matches!(
            UniquesHashSet::read(&mut [33u8, 0].as_slice()),
            Err(UniqError::InvalidSkipDegree(33))
        ));

        let mut buf = vec![0u8];
        write_var_uint(&mut buf, MAX_SIZE as u64 + 1).unwrap();
        assert!(matches!(
            UniquesHashSet::read(&mut buf.as_slice()),
            Err(UniqError::TooLarge { .. })
        ));

        let mut buf = vec![1u8, 1];
        buf.extend_from_slice(&3u32.to_le_bytes());
        assert!(matches!(
            UniquesHashSet::read(&mut buf.as_slice()),
            Err(UniqError::InvalidHash {
                hash: 3,
                skip_degree: 1
            })
        ));

        let mut buf = vec![0u8, 2];
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            UniquesHashSet::read(&mut buf.as_slice()),
            Err(UniqError::DuplicateKeys {
                expected: 2,
                actual: 1
            })
        ));

        assert!(matches!(
            UniquesHashSet::read(&mut [0u8, 2, 1, 0].as_slice()),
            Err(UniqError::Io(_))
        ));
    }
}
