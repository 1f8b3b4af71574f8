//! Scoped box reader.
//!
//! `enter` reads a header and opens a scope, `exit` closes it and checks that exactly the
//! declared number of bytes was consumed. Scopes opened for sample descriptions may be
//! marked tolerant: some legacy encoders write `stsd` entries whose declared size does
//! not match their content, and for those the observed length is adopted instead.

use crate::bits::reader;
use crate::errors::{FramingError, MediaRecodeError, MediaRecodeResult};
use crate::mp4::r#box::{read_box_header, BoxHeader, BoxType};
use crate::streams::SeekableStream;
use log::warn;
use std::io::{self, SeekFrom};

struct Scope {
    header: BoxHeader,
    tolerant: bool,
}

/// Reader that tracks box scopes over a seekable stream
pub struct BoxReader<R> {
    inner: R,
    position: u64,
    len: u64,
    scopes: Vec<Scope>,
}

macro_rules! read_field {
    ($name:ident, $func:path, $ty:ty, $width:expr) => {
        pub fn $name(&mut self) -> MediaRecodeResult<$ty> {
            let value = $func(&mut self.inner).map_err(|e| self.truncated(e))?;
            self.position += $width;
            Ok(value)
        }
    };
}

impl<R: SeekableStream> BoxReader<R> {
    pub fn new(mut inner: R) -> MediaRecodeResult<Self> {
        let len = inner.byte_len()?;
        let position = inner.stream_position()?;
        Ok(Self {
            inner,
            position,
            len,
            scopes: Vec::new(),
        })
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total stream length.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of open scopes.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// End of the innermost open box, or of the stream.
    pub fn limit(&self) -> u64 {
        self.scopes
            .last()
            .map(|s| s.header.end())
            .unwrap_or(self.len)
    }

    /// Bytes left in the innermost open box.
    pub fn remaining(&self) -> u64 {
        self.limit().saturating_sub(self.position)
    }

    /// True while another box header fits in the innermost scope.
    pub fn has_child(&self) -> bool {
        self.remaining() >= 8
    }

    pub fn current_type(&self) -> Option<BoxType> {
        self.scopes.last().map(|s| s.header.box_type)
    }

    fn truncated(&self, e: io::Error) -> MediaRecodeError {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            MediaRecodeError::Framing(FramingError::Truncated {
                box_type: self
                    .current_type()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "(top level)".to_string()),
                message: format!("stream ended at offset {}", self.position),
            })
        } else {
            MediaRecodeError::Other(e)
        }
    }

    /// Move to an absolute offset.
    pub fn seek_to(&mut self, offset: u64) -> MediaRecodeResult<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        Ok(())
    }

    /// Read the next header without consuming it.
    pub fn peek(&mut self) -> MediaRecodeResult<BoxHeader> {
        let start = self.position;
        let limit = self.limit();
        let header = read_box_header(&mut self.inner, start, limit);
        self.seek_to(start)?;
        header
    }

    /// Read a header and open a scope for the box.
    pub fn enter(&mut self) -> MediaRecodeResult<BoxHeader> {
        let start = self.position;
        let limit = self.limit();
        let header = read_box_header(&mut self.inner, start, limit)?;
        self.position = start + header.header_size;
        self.scopes.push(Scope {
            header: header.clone(),
            tolerant: false,
        });
        Ok(header)
    }

    /// Enter a box that must be of type `expected`.
    pub fn enter_expect(&mut self, expected: BoxType) -> MediaRecodeResult<BoxHeader> {
        let header = self.peek()?;
        if header.box_type != expected {
            return Err(FramingError::UnexpectedType {
                expected: expected.to_string(),
                found: header.box_type.to_string(),
            }
            .into());
        }
        self.enter()
    }

    /// Accept a size mismatch on the innermost scope when it is closed.
    pub fn tolerate_legacy_size(&mut self) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.tolerant = true;
        }
    }

    /// Close the innermost scope, verifying the consumed length.
    pub fn exit(&mut self) -> MediaRecodeResult<()> {
        let scope = self.scopes.pop().ok_or_else(|| FramingError::Unbalanced {
            message: "exit without a matching enter".to_string(),
        })?;
        let header = scope.header;
        let consumed = self.position - header.offset;
        if consumed == header.size {
            return Ok(());
        }
        if !scope.tolerant {
            return Err(FramingError::SizeMismatch {
                box_type: header.box_type.to_string(),
                declared: header.size,
                actual: consumed,
            }
            .into());
        }
        if consumed > header.size {
            warn!(
                "{} box at {} declares {} bytes but holds {}, adopting observed size",
                header.box_type, header.offset, header.size, consumed
            );
        } else {
            warn!(
                "{} box at {} declares {} bytes but only {} were parsed, skipping the rest",
                header.box_type, header.offset, header.size, consumed
            );
            self.seek_to(header.end())?;
        }
        Ok(())
    }

    /// Skip the next box entirely and return its header.
    pub fn skip_box(&mut self) -> MediaRecodeResult<BoxHeader> {
        let header = self.peek()?;
        self.seek_to(header.end())?;
        Ok(header)
    }

    /// Skip whatever is left in the innermost scope.
    pub fn skip_remaining(&mut self) -> MediaRecodeResult<()> {
        let limit = self.limit();
        self.seek_to(limit)
    }

    read_field!(read_u8, reader::read_u8, u8, 1);
    read_field!(read_u16, reader::read_u16_be, u16, 2);
    read_field!(read_u24, reader::read_u24, u32, 3);
    read_field!(read_u32, reader::read_u32_be, u32, 4);
    read_field!(read_u64, reader::read_u64_be, u64, 8);
    read_field!(read_i16, reader::read_i16_be, i16, 2);
    read_field!(read_i32, reader::read_i32_be, i32, 4);
    read_field!(read_i64, reader::read_i64_be, i64, 8);
    read_field!(read_fourcc, reader::read_fourcc, [u8; 4], 4);
    read_field!(read_uuid, reader::read_uuid, [u8; 16], 16);

    pub fn read_version_flags(&mut self) -> MediaRecodeResult<(u8, u32)> {
        let version = self.read_u8()?;
        let flags = self.read_u24()?;
        Ok((version, flags))
    }

    /// Read `len` bytes; fails before allocating when the stream cannot hold them.
    pub fn read_bytes(&mut self, len: u64) -> MediaRecodeResult<Vec<u8>> {
        if self.position + len > self.len {
            return Err(self.truncated(io::ErrorKind::UnexpectedEof.into()));
        }
        let data = reader::read_bytes(&mut self.inner, len as usize).map_err(|e| self.truncated(e))?;
        self.position += len;
        Ok(data)
    }

    pub fn read_fixed_string(&mut self, len: usize) -> MediaRecodeResult<String> {
        let value = reader::read_fixed_string(&mut self.inner, len).map_err(|e| self.truncated(e))?;
        self.position += len as u64;
        Ok(value)
    }

    /// Read a null-terminated string bounded by the innermost scope.
    pub fn read_cstring(&mut self) -> MediaRecodeResult<String> {
        let max = self.remaining() as usize;
        let (value, consumed) =
            reader::read_cstring(&mut self.inner, max).map_err(|e| self.truncated(e))?;
        self.position += consumed as u64;
        Ok(value)
    }

    /// Read the rest of the innermost scope.
    pub fn read_remaining(&mut self) -> MediaRecodeResult<Vec<u8>> {
        let len = self.remaining();
        self.read_bytes(len)
    }

    /// Read the range `[offset, offset + len)` without disturbing the scope position.
    pub fn read_at(&mut self, offset: u64, len: u64) -> MediaRecodeResult<Vec<u8>> {
        let saved = self.position;
        self.seek_to(offset)?;
        let data = self.read_bytes(len);
        self.seek_to(saved)?;
        data
    }
}
