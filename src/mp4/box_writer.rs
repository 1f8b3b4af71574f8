//! Scoped box writer.
//!
//! `begin` emits a header for a box whose size is known up front and `end` checks that
//! exactly that many bytes were written. `begin_open` is for boxes whose size is only
//! known afterwards (`mdat`): it writes a 64-bit placeholder which `end` patches.

use crate::bits::writer::write_u64_be;
use crate::errors::{FramingError, MediaRecodeResult};
use crate::mp4::r#box::{BoxHeader, BoxType};
use log::debug;
use std::io::{self, Seek, SeekFrom, Write};

struct Scope {
    box_type: BoxType,
    start: u64,
    declared: Option<u64>,
}

/// Writer that tracks open boxes and verifies their sizes
pub struct BoxWriter<W: Write + Seek> {
    inner: W,
    position: u64,
    scopes: Vec<Scope>,
}

impl<W: Write + Seek> BoxWriter<W> {
    pub fn new(mut inner: W) -> MediaRecodeResult<Self> {
        let position = inner.stream_position()?;
        Ok(Self {
            inner,
            position,
            scopes: Vec::new(),
        })
    }

    /// Absolute offset of the next byte written.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Write the header of a box of known total `size` and open a scope.
    pub fn begin(&mut self, box_type: BoxType, size: u64) -> MediaRecodeResult<()> {
        let header = BoxHeader::for_size(box_type, size);
        let start = self.position;
        header.write(self)?;
        self.scopes.push(Scope {
            box_type,
            start,
            declared: Some(size),
        });
        Ok(())
    }

    /// Write a 64-bit size placeholder header; the size is patched by `end`.
    pub fn begin_open(&mut self, box_type: BoxType) -> MediaRecodeResult<()> {
        let header = BoxHeader::for_size(box_type, u64::MAX);
        let start = self.position;
        header.write(self)?;
        self.scopes.push(Scope {
            box_type,
            start,
            declared: None,
        });
        Ok(())
    }

    /// Close the innermost box and return its size.
    pub fn end(&mut self) -> MediaRecodeResult<u64> {
        let scope = self.scopes.pop().ok_or_else(|| FramingError::Unbalanced {
            message: "end without a matching begin".to_string(),
        })?;
        let actual = self.position - scope.start;
        match scope.declared {
            Some(declared) if declared != actual => {
                return Err(FramingError::SizeMismatch {
                    box_type: scope.box_type.to_string(),
                    declared,
                    actual,
                }
                .into());
            }
            Some(_) => {}
            None => self.patch_u64(scope.start + 8, actual)?,
        }
        debug!(
            "wrote {} box ({} bytes) at {}",
            scope.box_type, actual, scope.start
        );
        Ok(actual)
    }

    /// Overwrite a 64-bit field already written at `offset`.
    pub fn patch_u64(&mut self, offset: u64, value: u64) -> MediaRecodeResult<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        write_u64_be(&mut self.inner, value)?;
        self.inner.seek(SeekFrom::Start(self.position))?;
        Ok(())
    }

    /// Overwrite a 32-bit field already written at `offset`.
    pub fn patch_u32(&mut self, offset: u64, value: u32) -> MediaRecodeResult<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.write_all(&value.to_be_bytes())?;
        self.inner.seek(SeekFrom::Start(self.position))?;
        Ok(())
    }

    /// Flush and return the underlying writer. Fails while boxes are open.
    pub fn into_inner(mut self) -> MediaRecodeResult<W> {
        if let Some(scope) = self.scopes.last() {
            return Err(FramingError::Unbalanced {
                message: format!("{} box still open", scope.box_type),
            }
            .into());
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write + Seek> Write for BoxWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MediaRecodeError;
    use std::io::Cursor;

    #[test]
    fn test_begin_end_verifies_size() {
        let mut w = BoxWriter::new(Cursor::new(Vec::new())).unwrap();
        w.begin(BoxType::fourcc(b"mfhd"), 16).unwrap();
        w.write_all(&[0, 0, 0, 0, 0, 0, 0, 1]).unwrap();
        assert_eq!(w.end().unwrap(), 16);
        let out = w.into_inner().unwrap().into_inner();
        assert_eq!(&out[..8], &[0, 0, 0, 16, b'm', b'f', b'h', b'd']);
    }

    #[test]
    fn test_size_mismatch_is_reported() {
        let mut w = BoxWriter::new(Cursor::new(Vec::new())).unwrap();
        w.begin(BoxType::fourcc(b"free"), 12).unwrap();
        w.write_all(&[1, 2]).unwrap();
        assert!(matches!(
            w.end(),
            Err(MediaRecodeError::Framing(FramingError::SizeMismatch {
                declared: 12,
                actual: 10,
                ..
            }))
        ));
    }

    #[test]
    fn test_open_box_is_patched() {
        let mut w = BoxWriter::new(Cursor::new(Vec::new())).unwrap();
        w.begin_open(BoxType::fourcc(b"mdat")).unwrap();
        w.write_all(&[0xaa; 5]).unwrap();
        assert_eq!(w.end().unwrap(), 21);
        let out = w.into_inner().unwrap().into_inner();
        assert_eq!(&out[..4], &[0, 0, 0, 1]);
        assert_eq!(&out[8..16], &21u64.to_be_bytes());
        assert_eq!(out.len(), 21);
    }

    #[test]
    fn test_into_inner_rejects_open_boxes() {
        let mut w = BoxWriter::new(Cursor::new(Vec::new())).unwrap();
        w.begin(BoxType::fourcc(b"moov"), 8).unwrap();
        assert!(w.into_inner().is_err());
    }
}
