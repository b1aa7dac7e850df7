//! ## HyperLogLog with small set optimization
//! Estimator behind `uniqHLL12`.
//!
//! Up to `SMALL` distinct keys are kept exactly in a [`SmallSet`]. Inserting one more
//! distinct key promotes the set to a HyperLogLog sketch with `M = 2^P` registers of `W` bits
//! each; the exact keys are folded into the sketch and the set never goes back.
//!
//! Sketch registers are addressed by the low `P` bits of a 32-bit hash of the key and store
//! the maximum rank (trailing zeros + 1) of the remaining bits. The number of zero registers
//! and the harmonic sum of the registers are updated on every change, so estimating is O(1).
//!
//! Register slice encoding:
//! - data[0..M * W / 32]   - register ranks using `W` bits per each register.
//! - data[M * W / 32]      - one extra element for branchless register updates.
//!
//! Serialized format:
//! - `u8` flag: `0` small, `1` sketch
//! - small: varuint number of keys, then `u64` little-endian keys
//! - sketch: `ceil(M * W / 32)` register words, `u32` little-endian

use std::fmt::{Debug, Formatter};
use std::io::{self, Read, Write};
use std::mem::{size_of, size_of_val};

use crate::error::UniqError;
use crate::hash::{int_hash32, Key};
use crate::small::SmallSet;
use crate::state::DistinctSet;
use crate::wire::{read_u32, read_u64, read_u8, read_var_uint, write_var_uint};

const FLAG_SMALL: u8 = 0;
const FLAG_LARGE: u8 = 1;
/// Size of the hash space addressed by the sketch
const HASH_SPACE: f64 = 4_294_967_296.0;

/// HyperLogLog sketch over 32-bit hashes
#[derive(Clone)]
pub(crate) struct HyperLogLog<const P: usize, const W: usize> {
    data: Box<[u32]>,
    /// Number of registers set to 0
    zeros: u32,
    /// Harmonic sum of registers: sum of `2^-rank`
    sum: f64,
}

impl<const P: usize, const W: usize> HyperLogLog<P, W> {
    /// Number of HyperLogLog registers
    const M: usize = 1 << P;
    /// Register slice length, including one extra element (see `set_register`)
    const SLICE_LEN: usize = Self::M * W / 32 + 1;
    /// Number of `u32` words holding register bits
    const SERIALIZED_LEN: usize = (Self::M * W).div_ceil(32);
    /// Rank of a hash whose bits above the register index are all zero
    const MAX_RANK: u32 = (32 - P + 1) as u32;

    /// Create new sketch with all registers set to 0
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            data: vec![0u32; Self::SLICE_LEN].into_boxed_slice(),
            zeros: Self::M as u32,
            sum: Self::M as f64,
        }
    }

    /// Insert key into the sketch
    #[inline]
    pub(crate) fn insert(&mut self, key: u64) {
        let h = int_hash32(key);
        let idx = h & ((1 << P) - 1);
        let rest = h >> P;
        let rank = if rest == 0 {
            Self::MAX_RANK
        } else {
            rest.trailing_zeros() + 1
        };
        self.update_rank(idx, rank);
    }

    /// Keep the larger of the current and `new_rank` in register `idx`
    #[inline]
    fn update_rank(&mut self, idx: u32, new_rank: u32) {
        let old_rank = self.get_register(idx);
        if new_rank > old_rank {
            self.set_register(idx, old_rank, new_rank);
        }
    }

    /// Get HyperLogLog `idx` register
    #[inline]
    fn get_register(&self, idx: u32) -> u32 {
        let bit_idx = (idx as usize) * W;
        let u32_idx = bit_idx / 32;
        let bit_pos = bit_idx % 32;
        let bits = &self.data[u32_idx..u32_idx + 2];
        let bits_1 = W.min(32 - bit_pos);
        let bits_2 = W - bits_1;
        let mask_1 = (1 << bits_1) - 1;
        let mask_2 = (1 << bits_2) - 1;

        ((bits[0] >> bit_pos) & mask_1) | ((bits[1] & mask_2) << bits_1)
    }

    /// Set HyperLogLog `idx` register to new value `rank`
    #[inline]
    fn set_register(&mut self, idx: u32, old_rank: u32, new_rank: u32) {
        let bit_idx = (idx as usize) * W;
        let u32_idx = bit_idx / 32;
        let bit_pos = bit_idx % 32;
        let bits = &mut self.data[u32_idx..u32_idx + 2];
        let bits_1 = W.min(32 - bit_pos);
        let bits_2 = W - bits_1;
        let mask_1 = (1 << bits_1) - 1;
        let mask_2 = (1 << bits_2) - 1;

        // Unconditionally update two `u32` elements based on `new_rank` bits and masks
        bits[0] &= !(mask_1 << bit_pos);
        bits[0] |= (new_rank & mask_1) << bit_pos;
        bits[1] &= !mask_2;
        bits[1] |= (new_rank >> bits_1) & mask_2;

        self.zeros -= u32::from(old_rank == 0);
        self.sum -= 1.0 / ((1u64 << old_rank) as f64);
        self.sum += 1.0 / ((1u64 << new_rank) as f64);
    }

    /// Merge two `HyperLogLog` sketches taking the maximum of each register
    #[inline]
    pub(crate) fn merge(&mut self, rhs: &Self) {
        for idx in 0..Self::M as u32 {
            self.update_rank(idx, rhs.get_register(idx));
        }
    }

    /// Return cardinality estimate with small and large range corrections
    pub(crate) fn estimate(&self) -> u64 {
        let m = Self::M as f64;
        let raw = alpha(Self::M) * m * m / self.sum;
        let estimate = if raw <= 2.5 * m && self.zeros > 0 {
            // linear counting
            m * (m / f64::from(self.zeros)).ln()
        } else if raw > HASH_SPACE / 30.0 && raw < HASH_SPACE {
            -HASH_SPACE * (1.0 - raw / HASH_SPACE).ln()
        } else {
            raw
        };
        (estimate + 0.5) as u64
    }

    fn write<T: Write + ?Sized>(&self, out: &mut T) -> io::Result<()> {
        for word in &self.data[..Self::SERIALIZED_LEN] {
            out.write_all(&word.to_le_bytes())?;
        }
        Ok(())
    }

    fn read<R: Read + ?Sized>(r: &mut R) -> Result<Self, UniqError> {
        let mut data = vec![0u32; Self::SLICE_LEN].into_boxed_slice();
        for word in &mut data[..Self::SERIALIZED_LEN] {
            *word = read_u32(r)?;
        }
        // bits past the last register are not part of the sketch
        let used_bits = Self::M * W - (Self::SERIALIZED_LEN - 1) * 32;
        if used_bits < 32 {
            data[Self::SERIALIZED_LEN - 1] &= (1 << used_bits) - 1;
        }

        let mut hll = Self {
            data,
            zeros: 0,
            sum: 0.0,
        };
        for idx in 0..Self::M as u32 {
            let rank = hll.get_register(idx);
            hll.zeros += u32::from(rank == 0);
            hll.sum += 1.0 / ((1u64 << rank) as f64);
        }
        Ok(hll)
    }
}

impl<const P: usize, const W: usize> PartialEq for HyperLogLog<P, W> {
    fn eq(&self, rhs: &Self) -> bool {
        self.data == rhs.data
    }
}

/// Representation types supported by `HyperLogLogWithSmallSet`
#[derive(Clone, PartialEq)]
enum Representation<const P: usize, const W: usize, const SMALL: usize> {
    Small(SmallSet<SMALL>),
    Large(HyperLogLog<P, W>),
}

/// Approximate distinct set which is exact up to `SMALL` keys.
///
/// Defined with const parameters:
/// - `P`: precision in [4..16] range, `2^P` registers are used once promoted.
/// - `W`: register width in [4..6] range, must hold rank `32 - P + 1`.
/// - `SMALL`: number of keys counted exactly before promotion.
///
/// Expected relative error of the sketch is `1.04 / sqrt(2^P)`, 1.63% for `P = 12`.
#[derive(Clone, PartialEq)]
pub struct HyperLogLogWithSmallSet<const P: usize = 12, const W: usize = 5, const SMALL: usize = 16>
{
    repr: Representation<P, W, SMALL>,
}

impl<const P: usize, const W: usize, const SMALL: usize> HyperLogLogWithSmallSet<P, W, SMALL> {
    /// Ensure that `P`, `W` and `SMALL` are in correct range at compile time
    const VALID_PARAMS: () = assert!(
        P >= 4 && P <= 16 && W >= 4 && W <= 6 && (1 << W) > 33 - P && SMALL > 0
    );

    /// Creates new empty set in small representation
    #[inline]
    pub fn new() -> Self {
        // compile time check of params
        _ = Self::VALID_PARAMS;

        Self {
            repr: Representation::Small(SmallSet::new()),
        }
    }

    /// Return whether the set was promoted to the HyperLogLog sketch
    #[inline]
    pub fn is_large(&self) -> bool {
        matches!(self.repr, Representation::Large(_))
    }

    /// Insert key, promoting to the sketch when the small set is full
    #[inline]
    pub fn insert(&mut self, key: u64) {
        match &mut self.repr {
            Representation::Small(small) => {
                if !small.insert(key) {
                    self.promote().insert(key);
                }
            }
            Representation::Large(hll) => hll.insert(key),
        }
    }

    /// Return exact count in small representation, estimate otherwise
    #[inline]
    pub fn size(&self) -> u64 {
        match &self.repr {
            Representation::Small(small) => small.len() as u64,
            Representation::Large(hll) => hll.estimate(),
        }
    }

    /// Merge `rhs` into `self`.
    ///
    /// Small sides are promoted before being merged with a sketch, sketches are merged by
    /// register-wise maximum.
    pub fn merge(&mut self, rhs: &Self) {
        match &rhs.repr {
            Representation::Small(rhs_small) => {
                for &key in rhs_small.items() {
                    self.insert(key);
                }
            }
            Representation::Large(rhs_hll) => match &mut self.repr {
                Representation::Small(small) => {
                    let small = *small;
                    let mut hll = rhs_hll.clone();
                    for &key in small.items() {
                        hll.insert(key);
                    }
                    self.repr = Representation::Large(hll);
                }
                Representation::Large(hll) => hll.merge(rhs_hll),
            },
        }
    }

    /// Write set in binary format
    pub fn write<T: Write + ?Sized>(&self, out: &mut T) -> io::Result<()> {
        match &self.repr {
            Representation::Small(small) => {
                out.write_all(&[FLAG_SMALL])?;
                write_var_uint(out, small.len() as u64)?;
                for key in small.items() {
                    out.write_all(&key.to_le_bytes())?;
                }
                Ok(())
            }
            Representation::Large(hll) => {
                out.write_all(&[FLAG_LARGE])?;
                hll.write(out)
            }
        }
    }

    /// Read set written by [`Self::write`]
    pub fn read<R: Read + ?Sized>(r: &mut R) -> Result<Self, UniqError> {
        match read_u8(r)? {
            FLAG_SMALL => {
                let expected = read_var_uint(r)?;
                if expected > SMALL as u64 {
                    return Err(UniqError::TooLarge {
                        size: expected,
                        max: SMALL as u64,
                    });
                }
                let mut small = SmallSet::new();
                for _ in 0..expected {
                    small.insert(read_u64(r)?);
                }
                let actual = small.len() as u64;
                if actual != expected {
                    return Err(UniqError::DuplicateKeys { expected, actual });
                }
                Ok(Self {
                    repr: Representation::Small(small),
                })
            }
            FLAG_LARGE => Ok(Self {
                repr: Representation::Large(HyperLogLog::read(r)?),
            }),
            flag => Err(UniqError::InvalidFlag(flag)),
        }
    }

    /// Return memory size of the set
    pub fn size_of(&self) -> usize {
        match &self.repr {
            Representation::Small(_) => size_of::<Self>(),
            Representation::Large(hll) => size_of::<Self>() + size_of_val(&*hll.data),
        }
    }

    /// Replace small representation by a sketch holding the same keys
    fn promote(&mut self) -> &mut HyperLogLog<P, W> {
        if let Representation::Small(small) = &self.repr {
            let mut hll = HyperLogLog::new();
            for &key in small.items() {
                hll.insert(key);
            }
            log::debug!(
                "promoting small set of {} keys to HyperLogLog with {} registers",
                small.len(),
                HyperLogLog::<P, W>::M
            );
            self.repr = Representation::Large(hll);
        }
        match &mut self.repr {
            Representation::Large(hll) => hll,
            Representation::Small(_) => unreachable!("small set was just promoted"),
        }
    }
}

impl<const P: usize, const W: usize, const SMALL: usize> Default
    for HyperLogLogWithSmallSet<P, W, SMALL>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const P: usize, const W: usize, const SMALL: usize> Debug
    for HyperLogLogWithSmallSet<P, W, SMALL>
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&DistinctSet::to_string(self))
    }
}

impl<const P: usize, const W: usize, const SMALL: usize> DistinctSet
    for HyperLogLogWithSmallSet<P, W, SMALL>
{
    #[inline]
    fn insert_key(&mut self, key: Key) {
        self.insert(key.to_u64());
    }

    #[inline]
    fn size(&self) -> u64 {
        HyperLogLogWithSmallSet::size(self)
    }

    fn size_of(&self) -> usize {
        HyperLogLogWithSmallSet::size_of(self)
    }

    fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        self.write(w)
    }

    fn read_from(&mut self, r: &mut dyn Read) -> Result<(), UniqError> {
        *self = Self::read(r)?;
        Ok(())
    }

    fn representation(&self) -> &'static str {
        if self.is_large() {
            "HyperLogLog"
        } else {
            "Small"
        }
    }
}

/// Parameter for bias correction
#[inline]
fn alpha(m: usize) -> f64 {
    match m {
        16 => 0.673,
        32 => 0.697,
        64 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / (m as f64)),
    }
}
