//! Little-endian and LEB128 helpers for the binary state format.
//!
//! Every set writes its payload with these helpers so states spilled to disk or sent over the
//! network read back identically on any platform.

use std::io::{self, Read, Write};

use crate::error::UniqError;

/// Maximum encoded length of a `u64` varuint
const MAX_VAR_UINT_LEN: usize = 10;

/// Write `x` as LEB128 varuint
#[inline]
pub(crate) fn write_var_uint<W: Write + ?Sized>(w: &mut W, mut x: u64) -> io::Result<()> {
    let mut buf = [0u8; MAX_VAR_UINT_LEN];
    let mut len = 0;
    loop {
        let byte = (x & 0x7f) as u8;
        x >>= 7;
        if x == 0 {
            buf[len] = byte;
            len += 1;
            break;
        }
        buf[len] = byte | 0x80;
        len += 1;
    }
    w.write_all(&buf[..len])
}

/// Read LEB128 varuint
#[inline]
pub(crate) fn read_var_uint<R: Read + ?Sized>(r: &mut R) -> Result<u64, UniqError> {
    let mut x = 0u64;
    for i in 0..MAX_VAR_UINT_LEN {
        let byte = read_u8(r)?;
        x |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(x);
        }
    }
    Err(UniqError::VarUIntOverflow)
}

#[inline]
pub(crate) fn read_u8<R: Read + ?Sized>(r: &mut R) -> Result<u8, UniqError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

#[inline]
pub(crate) fn read_u32<R: Read + ?Sized>(r: &mut R) -> Result<u32, UniqError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

#[inline]
pub(crate) fn read_u64<R: Read + ?Sized>(r: &mut R) -> Result<u64, UniqError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[inline]
pub(crate) fn read_u128<R: Read + ?Sized>(r: &mut R) -> Result<u128, UniqError> {
    let mut buf = [0u8; 16];
    r.read_exact(&mut buf)?;
    Ok(u128::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0 => vec![0x00])]
    #[test_case(1 => vec![0x01])]
    #[test_case(127 => vec![0x7f])]
    #[test_case(128 => vec![0x80, 0x01])]
    #[test_case(300 => vec![0xac, 0x02])]
    #[test_case(u64::MAX => vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01])]
    fn test_write_var_uint(x: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        write_var_uint(&mut buf, x).unwrap();
        assert_eq!(read_var_uint(&mut buf.as_slice()).unwrap(), x);
        buf
    }

    #[test]
    fn test_read_var_uint_overflow() {
        let buf = [0xffu8; 11];
        let result = read_var_uint(&mut buf.as_slice());
        assert!(matches!(result, Err(UniqError::VarUIntOverflow)));
    }

    #[test]
    fn test_read_truncated() {
        let buf = [0x80u8];
        let result = read_var_uint(&mut buf.as_slice());
        assert!(matches!(result, Err(UniqError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof));

        let buf = [1u8, 2, 3];
        assert!(read_u32(&mut buf.as_slice()).is_err());
    }
}
