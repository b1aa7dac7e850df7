//! ## Fingerprints
//! Maps a single column value to the fixed-width key inserted into a distinct set.
//!
//! - Integers up to 64 bits are used as is (signed values are sign-extended).
//! - Floats use their bit pattern, so `0.0` and `-0.0`, as well as NaNs with different
//!   payloads, are different values.
//! - 128-bit integers and strings are hashed with `wyhash` on the approximate path.
//!   On the exact path 128-bit integers are kept as is and strings go through
//!   [`string_key`](crate::short_string::string_key).
//! - Tuples are folded element by element (see [`combinator`](crate::combinator)).

use wyhash::wyhash;

use crate::column::Value;
use crate::combinator::{combine128, combine64};
use crate::short_string::string_key;

/// Key inserted into a distinct set.
///
/// Every set converts the key to its own width: 128-bit keys are folded by xor of the two
/// halves, 64-bit keys are zero-extended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Hash64(u64),
    Hash128(u128),
}

impl Key {
    #[inline]
    pub fn to_u64(self) -> u64 {
        match self {
            Key::Hash64(x) => x,
            Key::Hash128(x) => (x as u64) ^ ((x >> 64) as u64),
        }
    }

    #[inline]
    pub fn to_u128(self) -> u128 {
        match self {
            Key::Hash64(x) => u128::from(x),
            Key::Hash128(x) => x,
        }
    }
}

impl From<u64> for Key {
    #[inline]
    fn from(x: u64) -> Self {
        Key::Hash64(x)
    }
}

impl From<u128> for Key {
    #[inline]
    fn from(x: u128) -> Self {
        Key::Hash128(x)
    }
}

/// 64-bit fingerprint of `value` used by the approximate sets
#[inline]
pub fn fingerprint64(value: Value<'_>) -> u64 {
    match value {
        Value::UInt8(x) => u64::from(x),
        Value::UInt16(x) => u64::from(x),
        Value::UInt32(x) => u64::from(x),
        Value::UInt64(x) => x,
        Value::Int8(x) => i64::from(x) as u64,
        Value::Int16(x) => i64::from(x) as u64,
        Value::Int32(x) => i64::from(x) as u64,
        Value::Int64(x) => x as u64,
        Value::Float32(x) => u64::from(x.to_bits()),
        Value::Float64(x) => x.to_bits(),
        Value::UInt128(x) => wyhash(&x.to_le_bytes(), 0),
        Value::Int128(x) => wyhash(&x.to_le_bytes(), 0),
        Value::String(s) => wyhash(s.as_bytes(), 0),
        Value::Tuple(t) => combine64(t.values()),
    }
}

/// Key of `value` used by the exact sets
#[inline]
pub fn exact_key(value: Value<'_>) -> Key {
    match value {
        Value::UInt128(x) => Key::Hash128(x),
        Value::Int128(x) => Key::Hash128(x as u128),
        Value::String(s) => Key::Hash128(string_key(s)),
        Value::Tuple(t) => Key::Hash128(combine128(t.values())),
        _ => Key::Hash64(fingerprint64(value)),
    }
}

/// Murmur3 64-bit finalizer
#[inline]
pub fn int_hash64(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^= x >> 33;
    x
}

/// Thomas Wang's 64 to 32 bit integer mix
#[inline]
pub fn int_hash32(mut key: u64) -> u32 {
    key = (!key).wrapping_add(key << 18);
    key ^= key.rotate_right(31);
    key = key.wrapping_mul(21);
    key ^= key.rotate_right(11);
    key = key.wrapping_add(key << 6);
    key ^= key.rotate_right(22);
    key as u32
}

/// Fold a 128-bit value into 64 bits (CityHash `Hash128to64`)
#[inline]
pub fn hash128_to_64(low: u64, high: u64) -> u64 {
    const K_MUL: u64 = 0x9ddf_ea08_eb38_2d69;
    let mut a = (low ^ high).wrapping_mul(K_MUL);
    a ^= a >> 47;
    let mut b = (high ^ a).wrapping_mul(K_MUL);
    b ^= b >> 47;
    b.wrapping_mul(K_MUL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::StrRef;
    use test_case::test_case;

    #[test_case(Value::UInt8(7) => 7)]
    #[test_case(Value::UInt16(65535) => 65535)]
    #[test_case(Value::UInt32(1 << 31) => 1 << 31)]
    #[test_case(Value::UInt64(u64::MAX) => u64::MAX)]
    #[test_case(Value::Int8(-1) => u64::MAX)]
    #[test_case(Value::Int32(-2) => u64::MAX - 1)]
    #[test_case(Value::Int64(42) => 42)]
    #[test_case(Value::Float32(1.0) => 0x3f80_0000)]
    #[test_case(Value::Float64(1.0) => 0x3ff0_0000_0000_0000)]
    #[test_case(Value::Float64(-0.0) => 0x8000_0000_0000_0000)]
    fn test_fingerprint64_identity(value: Value) -> u64 {
        fingerprint64(value)
    }

    #[test]
    fn test_float_bit_patterns_are_distinct() {
        assert_ne!(
            fingerprint64(Value::Float64(0.0)),
            fingerprint64(Value::Float64(-0.0))
        );
        let nan1 = f64::from_bits(0x7ff8_0000_0000_0001);
        let nan2 = f64::from_bits(0x7ff8_0000_0000_0002);
        assert_ne!(
            fingerprint64(Value::Float64(nan1)),
            fingerprint64(Value::Float64(nan2))
        );
        assert_ne!(
            exact_key(Value::Float32(0.0)),
            exact_key(Value::Float32(-0.0))
        );
    }

    #[test]
    fn test_wide_values_are_hashed() {
        let a = fingerprint64(Value::UInt128(1));
        let b = fingerprint64(Value::UInt128(1 << 64));
        assert_ne!(a, b);
        assert_eq!(a, fingerprint64(Value::UInt128(1)));
        assert_eq!(
            fingerprint64(Value::Int128(-1)),
            fingerprint64(Value::UInt128(u128::MAX))
        );
    }

    #[test]
    fn test_string_fingerprint_is_deterministic() {
        let padded = b"abc\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0";
        let a = fingerprint64(Value::String(StrRef::new(b"abc")));
        let b = fingerprint64(Value::String(StrRef::padded(padded, 3)));
        assert_eq!(a, b);
        assert_ne!(a, fingerprint64(Value::String(StrRef::new(b"abd"))));
    }

    #[test]
    fn test_exact_key_width() {
        assert_eq!(exact_key(Value::UInt32(5)), Key::Hash64(5));
        assert_eq!(exact_key(Value::UInt128(5)), Key::Hash128(5));
        assert!(matches!(
            exact_key(Value::String(StrRef::new(b"x"))),
            Key::Hash128(_)
        ));
    }

    #[test]
    fn test_key_conversions() {
        assert_eq!(Key::Hash64(7).to_u128(), 7);
        assert_eq!(Key::Hash128((3u128 << 64) | 5).to_u64(), 3 ^ 5);
        assert_eq!(Key::from(9u64), Key::Hash64(9));
    }

    #[test]
    fn test_mixers() {
        assert_eq!(int_hash64(0), 0);
        assert_ne!(int_hash64(1), 1);
        assert_ne!(int_hash32(1), int_hash32(2));
        assert_ne!(hash128_to_64(1, 2), hash128_to_64(2, 1));
    }
}
