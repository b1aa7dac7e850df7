//! ## Short-string keys
//! 128-bit keys for exact string deduplication.
//!
//! Strings of at most 15 bytes are stored in the key itself: the bytes are packed into the
//! low bytes of a `u128` (unused bytes zeroed), the length goes to byte 15 and the low half
//! is mixed with a bijective murmur-like finalizer, because the exact set buckets keys by
//! their low 64 bits only. A length below 16 never reaches the top bit of the key.
//!
//! Longer strings are hashed with SipHash-2-4 (128-bit output) and the top bit of the key is
//! forced to 1. Packed and hashed keys therefore never collide with each other.
//!
//! On x86_64 with SSSE3 the packing is a single `pshufb` over 16 bytes loaded from the
//! string start, which requires the string to be followed by readable padding
//! ([`StrRef::padded`]). Without padding or SSSE3 the bytes are copied, giving the same key.

use std::hash::Hasher;

use once_cell::sync::Lazy;
use siphasher::sip128::{Hasher128, SipHasher24};

use crate::column::StrRef;

/// Maximum length of a string packed into its key
pub const MAX_PACKED_LEN: usize = 15;
/// Partition bit set for hashed strings
pub const HASHED_FLAG: u128 = 1 << 127;

/// SSSE3 support, detected once per process
static HAS_SSSE3: Lazy<bool> = Lazy::new(detect_ssse3);

#[cfg(target_arch = "x86_64")]
fn detect_ssse3() -> bool {
    std::arch::is_x86_feature_detected!("ssse3")
}

#[cfg(not(target_arch = "x86_64"))]
fn detect_ssse3() -> bool {
    false
}

/// Return whether the vectorized packing path is available
#[inline]
pub fn has_ssse3() -> bool {
    *HAS_SSSE3
}

/// Shuffle masks keeping the first `len` bytes and zeroing the rest, indexed by `len`
#[cfg_attr(
    any(not(target_arch = "x86_64"), feature = "hash_all_strings"),
    allow(dead_code)
)]
static SHUFFLE_MASKS: [[i8; 16]; 16] = build_masks();

const fn build_masks() -> [[i8; 16]; 16] {
    let mut masks = [[-1i8; 16]; 16];
    let mut len = 0;
    while len < 16 {
        let mut i = 0;
        while i < len {
            masks[len][i] = i as i8;
            i += 1;
        }
        len += 1;
    }
    masks
}

/// Compute 128-bit key of a string
#[inline]
pub fn string_key(s: StrRef<'_>) -> u128 {
    #[cfg(not(feature = "hash_all_strings"))]
    {
        if s.len() <= MAX_PACKED_LEN {
            return mix_packed(pack(s), s.len());
        }
        sip_hash128(s.as_bytes()) | HASHED_FLAG
    }

    #[cfg(feature = "hash_all_strings")]
    {
        sip_hash128(s.as_bytes())
    }
}

/// SipHash-2-4 128-bit digest of `bytes` with zero keys
#[inline]
pub fn sip_hash128(bytes: &[u8]) -> u128 {
    let mut hasher = SipHasher24::new();
    hasher.write(bytes);
    hasher.finish128().as_u128()
}

/// Pack a string of at most 15 bytes into the low bytes of a little-endian block
#[cfg_attr(feature = "hash_all_strings", allow(dead_code))]
#[inline]
fn pack(s: StrRef<'_>) -> [u8; 16] {
    debug_assert!(s.len() <= MAX_PACKED_LEN);
    #[cfg(target_arch = "x86_64")]
    if let Some(block) = s.block16() {
        if has_ssse3() {
            // SAFETY: SSSE3 support was checked at runtime.
            return unsafe { shuffle_ssse3(block, s.len()) };
        }
    }
    pack_scalar(s.as_bytes())
}

#[cfg_attr(feature = "hash_all_strings", allow(dead_code))]
#[inline]
fn pack_scalar(bytes: &[u8]) -> [u8; 16] {
    let mut block = [0u8; 16];
    block[..bytes.len()].copy_from_slice(bytes);
    block
}

#[cfg_attr(feature = "hash_all_strings", allow(dead_code))]
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "ssse3")]
unsafe fn shuffle_ssse3(block: &[u8; 16], len: usize) -> [u8; 16] {
    use std::arch::x86_64::{__m128i, _mm_loadu_si128, _mm_shuffle_epi8, _mm_storeu_si128};

    let data = _mm_loadu_si128(block.as_ptr() as *const __m128i);
    let mask = _mm_loadu_si128(SHUFFLE_MASKS[len].as_ptr() as *const __m128i);
    let mut out = [0u8; 16];
    _mm_storeu_si128(out.as_mut_ptr() as *mut __m128i, _mm_shuffle_epi8(data, mask));
    out
}

/// Store `len` in byte 15, then mix the low half bijectively folding in the untouched high half
#[cfg_attr(feature = "hash_all_strings", allow(dead_code))]
#[inline]
fn mix_packed(block: [u8; 16], len: usize) -> u128 {
    let key = u128::from_le_bytes(block);
    let mut low = key as u64;
    let high = ((key >> 64) as u64) | ((len as u64) << 56);

    low ^= low >> 33;
    low = low.wrapping_mul(0xff51_afd7_ed55_8ccd);
    low ^= high;
    low ^= low >> 33;
    low = low.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    low ^= low >> 33;

    (u128::from(high) << 64) | u128::from(low)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &[u8]) -> u128 {
        string_key(StrRef::new(s))
    }

    fn padded_key(s: &[u8]) -> u128 {
        let mut buf = s.to_vec();
        buf.extend_from_slice(&[0xaa; 16]);
        string_key(StrRef::padded(&buf, s.len()))
    }

    #[test]
    fn test_masks() {
        assert_eq!(SHUFFLE_MASKS[0], [-1; 16]);
        assert_eq!(SHUFFLE_MASKS[3][..4], [0, 1, 2, -1]);
        assert_eq!(SHUFFLE_MASKS[15][14..], [14, -1]);
    }

    #[test]
    fn test_padded_and_unpadded_keys_match() {
        for len in 0..=32 {
            let s: Vec<u8> = (0..len as u8).map(|b| b.wrapping_mul(31).wrapping_add(7)).collect();
            assert_eq!(key(&s), padded_key(&s), "length {len}");
        }
    }

    #[cfg(not(feature = "hash_all_strings"))]
    #[test]
    fn test_partition_bit() {
        let s14 = b"abcdefghijklmn";
        let s15 = b"abcdefghijklmno";
        let s16 = b"abcdefghijklmnop";
        assert_eq!(key(s14) & HASHED_FLAG, 0);
        assert_eq!(key(s15) & HASHED_FLAG, 0);
        assert_eq!(key(s16) & HASHED_FLAG, HASHED_FLAG);
        assert_ne!(key(s15), key(s16));
        assert_ne!(key(s14), key(s15));
    }

    #[cfg(not(feature = "hash_all_strings"))]
    #[test]
    fn test_packed_keys_are_injective() {
        let mut keys = std::collections::HashSet::new();
        let mut count = 0;
        for len in 0..=MAX_PACKED_LEN {
            for b in 0..=255u8 {
                let s = vec![b; len];
                assert_eq!(key(&s) >> 120, len as u128);
                keys.insert(key(&s));
                count += 1;
                if len == 0 {
                    break;
                }
            }
        }
        assert_eq!(keys.len(), count);
    }

    #[cfg(not(feature = "hash_all_strings"))]
    #[test]
    fn test_trailing_zero_bytes_differ() {
        assert_ne!(key(b"a"), key(b"a\0"));
        assert_ne!(key(b""), key(b"\0"));
        assert_ne!(key(b"ab"), key(b"ba"));
        assert_eq!(key(b""), 0);
    }

    #[test]
    fn test_long_strings_hash() {
        let a = vec![b'x'; 100];
        let mut b = a.clone();
        b[99] = b'y';
        assert_ne!(key(&a), key(&b));
        assert_eq!(key(&a), key(&a.clone()));
    }
}
