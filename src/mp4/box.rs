use crate::bits::reader::{read_fourcc, read_u32_be, read_u64_be, read_uuid};
use crate::bits::writer::{write_u32_be, write_u64_be};
use crate::errors::{FramingError, MediaRecodeError, MediaRecodeResult};
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::streams::SeekableStream;
use std::fmt;
use std::io::{self, Read, Seek, Write};

/// Four character code used for box types and brands
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(code: &[u8; 4]) -> Self {
        FourCC(*code)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(code: &[u8; 4]) -> Self {
        FourCC(*code)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({})", self)
    }
}

/// Parser-internal wildcard; never valid on the wire.
pub const ANY: FourCC = FourCC::new(b"????");
const UUID: FourCC = FourCC::new(b"uuid");

/// Box type: a four character code or a 16-byte extended (`uuid`) type
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxType {
    FourCC(FourCC),
    Uuid([u8; 16]),
}

impl BoxType {
    pub const fn fourcc(code: &[u8; 4]) -> Self {
        BoxType::FourCC(FourCC::new(code))
    }

    /// Wire tag: the four character code, or `uuid` for extended types.
    pub fn code(&self) -> [u8; 4] {
        match self {
            BoxType::FourCC(c) => c.0,
            BoxType::Uuid(_) => UUID.0,
        }
    }

    pub fn is(&self, code: &[u8; 4]) -> bool {
        matches!(self, BoxType::FourCC(c) if &c.0 == code)
    }

    /// Bytes taken by the type in the header, past the size field.
    fn header_len(&self) -> u64 {
        match self {
            BoxType::FourCC(_) => 4,
            BoxType::Uuid(_) => 20,
        }
    }
}

impl fmt::Display for BoxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxType::FourCC(code) => write!(f, "{}", code),
            BoxType::Uuid(uuid) => {
                write!(f, "uuid:")?;
                for (i, b) in uuid.iter().enumerate() {
                    if matches!(i, 4 | 6 | 8 | 10) {
                        write!(f, "-")?;
                    }
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for BoxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoxType({})", self)
    }
}

/// Box header information
#[derive(Debug, Clone, PartialEq)]
pub struct BoxHeader {
    pub box_type: BoxType,
    /// Total size including the header
    pub size: u64,
    pub header_size: u64,
    /// Absolute offset of the first header byte
    pub offset: u64,
}

impl BoxHeader {
    /// Header for a box of `box_type` carrying `payload` bytes. The 64-bit size form is
    /// chosen only when the total does not fit the 32-bit field.
    pub fn for_payload(box_type: BoxType, payload: u64) -> Self {
        let mut header_size = 4 + box_type.header_len();
        if payload + header_size > u32::MAX as u64 {
            header_size += 8;
        }
        BoxHeader {
            box_type,
            size: payload + header_size,
            header_size,
            offset: 0,
        }
    }

    /// Header for a box whose total size is already known.
    pub fn for_size(box_type: BoxType, size: u64) -> Self {
        let mut header_size = 4 + box_type.header_len();
        if size > u32::MAX as u64 {
            header_size += 8;
        }
        BoxHeader {
            box_type,
            size,
            header_size,
            offset: 0,
        }
    }

    pub fn payload_size(&self) -> u64 {
        self.size.saturating_sub(self.header_size)
    }

    pub fn payload_offset(&self) -> u64 {
        self.offset + self.header_size
    }

    /// Absolute offset of the first byte after the box.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    pub fn is_large(&self) -> bool {
        self.header_size == 16 || self.header_size == 32
    }

    /// Serialize the header.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        if self.is_large() {
            write_u32_be(w, 1)?;
        } else {
            write_u32_be(w, self.size as u32)?;
        }
        match self.box_type {
            BoxType::FourCC(code) => w.write_all(&code.0)?,
            BoxType::Uuid(uuid) => {
                w.write_all(&UUID.0)?;
                if self.is_large() {
                    write_u64_be(w, self.size)?;
                }
                return w.write_all(&uuid);
            }
        }
        if self.is_large() {
            write_u64_be(w, self.size)?;
        }
        Ok(())
    }
}

fn truncated(box_type: &str, e: io::Error) -> MediaRecodeError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        MediaRecodeError::Framing(FramingError::Truncated {
            box_type: box_type.to_string(),
            message: "stream ended inside box header".to_string(),
        })
    } else {
        MediaRecodeError::Other(e)
    }
}

/// Read a box header at `offset`. `limit` is the end of the enclosing box (or the
/// stream), which resolves size 0 and bounds the box.
pub fn read_box_header<R: Read>(r: &mut R, offset: u64, limit: u64) -> MediaRecodeResult<BoxHeader> {
    let size32 = read_u32_be(r).map_err(|e| truncated("(header)", e))?;
    let code = FourCC(read_fourcc(r).map_err(|e| truncated("(header)", e))?);
    if code == ANY {
        return Err(FramingError::UnexpectedType {
            expected: "a concrete box type".to_string(),
            found: code.to_string(),
        }
        .into());
    }
    let mut header_size = 8u64;
    let mut size = size32 as u64;
    if size32 == 1 {
        size = read_u64_be(r).map_err(|e| truncated(&code.to_string(), e))?;
        header_size = 16;
    } else if size32 == 0 {
        size = limit.saturating_sub(offset);
    }
    let box_type = if code == UUID {
        header_size += 16;
        BoxType::Uuid(read_uuid(r).map_err(|e| truncated("uuid", e))?)
    } else {
        BoxType::FourCC(code)
    };
    if size < header_size || offset + size > limit {
        return Err(FramingError::InvalidSize {
            box_type: box_type.to_string(),
            size,
        }
        .into());
    }
    Ok(BoxHeader {
        box_type,
        size,
        header_size,
        offset,
    })
}

/// A box that can be parsed from a [`BoxReader`] and serialized through a [`BoxWriter`].
///
/// `payload_size` must match what `write_payload` emits; `write_box` relies on it for the
/// header and the writer verifies it when the box is closed.
pub trait Mp4Box: Sized {
    const TYPE: BoxType;

    fn box_type(&self) -> BoxType {
        Self::TYPE
    }

    /// Whether a header of this type can be parsed by `read_payload`.
    fn accepts(box_type: &BoxType) -> bool {
        *box_type == Self::TYPE
    }

    fn payload_size(&self) -> u64;

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()>;

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        header: &BoxHeader,
    ) -> MediaRecodeResult<Self>;

    fn box_size(&self) -> u64 {
        BoxHeader::for_payload(self.box_type(), self.payload_size()).size
    }

    fn write_box<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.begin(self.box_type(), self.box_size())?;
        self.write_payload(w)?;
        w.end()?;
        Ok(())
    }

    fn read_box<R: SeekableStream>(r: &mut BoxReader<R>) -> MediaRecodeResult<Self> {
        let header = r.peek()?;
        if !Self::accepts(&header.box_type) {
            return Err(FramingError::UnexpectedType {
                expected: Self::TYPE.to_string(),
                found: header.box_type.to_string(),
            }
            .into());
        }
        let header = r.enter()?;
        let parsed = Self::read_payload(r, &header)?;
        r.exit()?;
        Ok(parsed)
    }
}

/// Sum of the serialized sizes of `boxes`.
pub fn boxes_size<'a, B: Mp4Box + 'a>(boxes: impl IntoIterator<Item = &'a B>) -> u64 {
    boxes.into_iter().map(|b| b.box_size()).sum()
}

/// Serialize `b` into a fresh byte vector.
pub fn to_bytes<B: Mp4Box>(b: &B) -> MediaRecodeResult<Vec<u8>> {
    let mut w = BoxWriter::new(io::Cursor::new(Vec::new()))?;
    b.write_box(&mut w)?;
    Ok(w.into_inner()?.into_inner())
}

/// Parse a single box of type `B` from `data`.
pub fn from_bytes<B: Mp4Box>(data: &[u8]) -> MediaRecodeResult<B> {
    let mut r = BoxReader::new(io::Cursor::new(data))?;
    B::read_box(&mut r)
}
