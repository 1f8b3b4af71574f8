//! Big-endian primitive writers, the counterpart of `bits::reader`.

use std::io::{self, Write};

/// Write one byte.
pub fn write_u8<W: Write>(w: &mut W, value: u8) -> io::Result<()> {
    w.write_all(&[value])
}

/// Write a 16-bit big endian value.
pub fn write_u16_be<W: Write>(w: &mut W, value: u16) -> io::Result<()> {
    w.write_all(&value.to_be_bytes())
}

/// Write the low 24 bits of `value` big endian.
pub fn write_u24<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
    w.write_all(&value.to_be_bytes()[1..])
}

/// Write a 32-bit big endian value.
pub fn write_u32_be<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
    w.write_all(&value.to_be_bytes())
}

/// Write a 64-bit big endian value.
pub fn write_u64_be<W: Write>(w: &mut W, value: u64) -> io::Result<()> {
    w.write_all(&value.to_be_bytes())
}

pub fn write_i16_be<W: Write>(w: &mut W, value: i16) -> io::Result<()> {
    w.write_all(&value.to_be_bytes())
}

pub fn write_i32_be<W: Write>(w: &mut W, value: i32) -> io::Result<()> {
    w.write_all(&value.to_be_bytes())
}

pub fn write_i64_be<W: Write>(w: &mut W, value: i64) -> io::Result<()> {
    w.write_all(&value.to_be_bytes())
}

/// Write a string into a fixed-length field, truncating or zero padding it.
pub fn write_fixed_string<W: Write>(w: &mut W, value: &str, len: usize) -> io::Result<()> {
    let mut buf = vec![0u8; len];
    let bytes = value.as_bytes();
    let n = bytes.len().min(len);
    buf[..n].copy_from_slice(&bytes[..n]);
    w.write_all(&buf)
}

/// Write a string followed by a null terminator.
pub fn write_cstring<W: Write>(w: &mut W, value: &str) -> io::Result<()> {
    w.write_all(value.as_bytes())?;
    w.write_all(&[0])
}

/// Write the version byte and 24-bit flags of a full box.
pub fn write_version_flags<W: Write>(w: &mut W, version: u8, flags: u32) -> io::Result<()> {
    write_u8(w, version)?;
    write_u24(w, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::reader;
    use std::io::Cursor;

    #[test]
    fn test_write_integers() {
        let mut out = Vec::new();
        write_u8(&mut out, 1).unwrap();
        write_u16_be(&mut out, 0x0203).unwrap();
        write_u24(&mut out, 0xff040506).unwrap();
        write_i32_be(&mut out, -1).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_fixed_string_padding() {
        let mut out = Vec::new();
        write_fixed_string(&mut out, "avc", 6).unwrap();
        write_fixed_string(&mut out, "truncated", 4).unwrap();
        assert_eq!(&out, b"avc\0\0\0trun");
        let mut r = Cursor::new(&out[..]);
        assert_eq!(reader::read_fixed_string(&mut r, 6).unwrap(), "avc");
    }

    #[test]
    fn test_cstring() {
        let mut out = Vec::new();
        write_cstring(&mut out, "SoundHandler").unwrap();
        assert_eq!(out.len(), 13);
        assert_eq!(out.last(), Some(&0));
    }
}
