/*
# Bits Reader Module

 Big-endian primitive readers over any `Read` implementation. These are the leaves of the
 box codec: every box payload is decoded through them, usually via `BoxReader` which
 forwards to these functions while tracking its position.

 Key components:
 - Integers: `read_u8()`, `read_u16_be()`, `read_u24()`, `read_u32_be()`, `read_u64_be()`
   and their signed counterparts
 - Tags: `read_fourcc()` (4-byte box and brand tags), `read_uuid()` (16-byte extended types)
 - Strings: `read_fixed_string()` (padded fields), `read_cstring()` (null terminated)
*/

use std::io::{self, Read};

/// Read one byte from a `Read` implementation.
pub fn read_u8<R: Read>(r: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a 16-bit big endian value from `r`.
pub fn read_u16_be<R: Read>(r: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

/// Read a 24-bit big endian value from `r`.
pub fn read_u24<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 3];
    r.read_exact(&mut buf)?;
    Ok(((buf[0] as u32) << 16) | ((buf[1] as u32) << 8) | buf[2] as u32)
}

/// Read a 32-bit big endian value from `r`.
pub fn read_u32_be<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Read a 64-bit big endian value from `r`.
pub fn read_u64_be<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

/// Read a signed 16-bit big endian value from `r`.
pub fn read_i16_be<R: Read>(r: &mut R) -> io::Result<i16> {
    Ok(read_u16_be(r)? as i16)
}

/// Read a signed 32-bit big endian value from `r`.
pub fn read_i32_be<R: Read>(r: &mut R) -> io::Result<i32> {
    Ok(read_u32_be(r)? as i32)
}

/// Read a signed 64-bit big endian value from `r`.
pub fn read_i64_be<R: Read>(r: &mut R) -> io::Result<i64> {
    Ok(read_u64_be(r)? as i64)
}

/// Read a four character code.
pub fn read_fourcc<R: Read>(r: &mut R) -> io::Result<[u8; 4]> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read a 16-byte extended type.
pub fn read_uuid<R: Read>(r: &mut R) -> io::Result<[u8; 16]> {
    let mut buf = [0u8; 16];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read exactly `len` bytes.
pub fn read_bytes<R: Read>(r: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read a fixed-length string field, dropping trailing padding.
pub fn read_fixed_string<R: Read>(r: &mut R, len: usize) -> io::Result<String> {
    let buf = read_bytes(r, len)?;
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

/// Read a null-terminated string of at most `max_len` bytes (terminator included).
///
/// Returns the string and the number of bytes consumed. A string that runs to
/// `max_len` without a terminator is accepted as is.
pub fn read_cstring<R: Read>(r: &mut R, max_len: usize) -> io::Result<(String, usize)> {
    let mut buf = Vec::new();
    let mut consumed = 0;
    while consumed < max_len {
        let b = read_u8(r)?;
        consumed += 1;
        if b == 0 {
            break;
        }
        buf.push(b);
    }
    Ok((String::from_utf8_lossy(&buf).into_owned(), consumed))
}

/// Read the version byte and 24-bit flags of a full box.
pub fn read_version_flags<R: Read>(r: &mut R) -> io::Result<(u8, u32)> {
    let version = read_u8(r)?;
    let flags = read_u24(r)?;
    Ok((version, flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_integers() {
        let data = [
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
            0x0f,
        ];
        let mut r = Cursor::new(&data[..]);
        assert_eq!(read_u8(&mut r).unwrap(), 0x01);
        assert_eq!(read_u16_be(&mut r).unwrap(), 0x0203);
        assert_eq!(read_u24(&mut r).unwrap(), 0x040506);
        assert_eq!(read_u32_be(&mut r).unwrap(), 0x0708090a);
        assert!(read_u64_be(&mut r).is_err());
    }

    #[test]
    fn test_read_signed() {
        let data = [0xff, 0xfe, 0xff, 0xff, 0xff, 0xfd];
        let mut r = Cursor::new(&data[..]);
        assert_eq!(read_i16_be(&mut r).unwrap(), -2);
        assert_eq!(read_i32_be(&mut r).unwrap(), -3);
    }

    #[test]
    fn test_read_strings() {
        let data = b"vide\0\0\0\0Handler\0rest";
        let mut r = Cursor::new(&data[..]);
        assert_eq!(read_fixed_string(&mut r, 8).unwrap(), "vide");
        let (name, consumed) = read_cstring(&mut r, 64).unwrap();
        assert_eq!(name, "Handler");
        assert_eq!(consumed, 8);
        let (rest, consumed) = read_cstring(&mut r, 4).unwrap();
        assert_eq!(rest, "rest");
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_read_version_flags() {
        let data = [0x01, 0x02, 0x00, 0x01];
        let mut r = Cursor::new(&data[..]);
        assert_eq!(read_version_flags(&mut r).unwrap(), (1, 0x020001));
    }
}
