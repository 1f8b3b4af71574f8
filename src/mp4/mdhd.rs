use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{BoxHeader, BoxType, Mp4Box};
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

/// Media header box
#[derive(Debug, Clone, PartialEq)]
pub struct MdhdBox {
    pub version: u8,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    /// In `timescale` units
    pub duration: u64,
    /// ISO 639-2/T code, `und` when unset
    pub language: String,
}

impl MdhdBox {
    pub fn new(timescale: u32, duration: u64, language: &str) -> Self {
        Self {
            version: if duration > u32::MAX as u64 { 1 } else { 0 },
            creation_time: 0,
            modification_time: 0,
            timescale,
            duration,
            language: language.to_string(),
        }
    }
}

/// Decode the packed language code - each character is stored in 5 bits
/// Format: [pad bit][char1: 5 bits][char2: 5 bits][char3: 5 bits]
pub fn unpack_language(code: u16) -> String {
    if code == 0 {
        return "und".to_string();
    }
    let chars = [
        ((code >> 10) & 0x1F) as u8 + 0x60,
        ((code >> 5) & 0x1F) as u8 + 0x60,
        (code & 0x1F) as u8 + 0x60,
    ];
    if chars.iter().all(|c| c.is_ascii_lowercase()) {
        chars.iter().map(|c| *c as char).collect()
    } else {
        "und".to_string()
    }
}

/// Pack a three letter language code; anything else becomes `und`.
pub fn pack_language(language: &str) -> u16 {
    let bytes = language.as_bytes();
    let valid = bytes.len() == 3 && bytes.iter().all(|c| c.is_ascii_lowercase());
    let bytes = if valid { bytes } else { b"und" };
    bytes
        .iter()
        .fold(0u16, |acc, c| (acc << 5) | (c - 0x60) as u16)
}

impl Mp4Box for MdhdBox {
    const TYPE: BoxType = BoxType::fourcc(b"mdhd");

    fn payload_size(&self) -> u64 {
        if self.version == 1 {
            36
        } else {
            24
        }
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[self.version, 0, 0, 0])?;
        if self.version == 1 {
            w.write_all(&self.creation_time.to_be_bytes())?;
            w.write_all(&self.modification_time.to_be_bytes())?;
            w.write_all(&self.timescale.to_be_bytes())?;
            w.write_all(&self.duration.to_be_bytes())?;
        } else {
            w.write_all(&(self.creation_time as u32).to_be_bytes())?;
            w.write_all(&(self.modification_time as u32).to_be_bytes())?;
            w.write_all(&self.timescale.to_be_bytes())?;
            w.write_all(&(self.duration as u32).to_be_bytes())?;
        }
        w.write_all(&pack_language(&self.language).to_be_bytes())?;
        w.write_all(&[0u8; 2])?;
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let (version, _) = r.read_version_flags()?;
        let (creation_time, modification_time, timescale, duration) = if version == 1 {
            (r.read_u64()?, r.read_u64()?, r.read_u32()?, r.read_u64()?)
        } else {
            (
                r.read_u32()? as u64,
                r.read_u32()? as u64,
                r.read_u32()?,
                r.read_u32()? as u64,
            )
        };
        let language = unpack_language(r.read_u16()?);
        r.read_u16()?;
        Ok(Self {
            version,
            creation_time,
            modification_time,
            timescale,
            duration,
            language,
        })
    }
}
