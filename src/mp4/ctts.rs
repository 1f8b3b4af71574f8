use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{BoxHeader, BoxType, Mp4Box};
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CttsEntry {
    pub sample_count: u32,
    /// Unsigned on the wire for version 0, signed for version 1
    pub sample_offset: i64,
}

/// Composition time-to-sample box
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CttsBox {
    pub version: u8,
    pub entries: Vec<CttsEntry>,
}

impl CttsBox {
    pub fn size_for(entry_count: u64) -> u64 {
        16 + 8 * entry_count
    }

    pub fn write_entry<W: Write>(w: &mut W, version: u8, entry: &CttsEntry) -> MediaRecodeResult<()> {
        w.write_all(&entry.sample_count.to_be_bytes())?;
        if version == 0 {
            w.write_all(&(entry.sample_offset as u32).to_be_bytes())?;
        } else {
            w.write_all(&(entry.sample_offset as i32).to_be_bytes())?;
        }
        Ok(())
    }

    pub fn sample_count(&self) -> u64 {
        self.entries.iter().map(|e| e.sample_count as u64).sum()
    }
}

impl Mp4Box for CttsBox {
    const TYPE: BoxType = BoxType::fourcc(b"ctts");

    fn payload_size(&self) -> u64 {
        Self::size_for(self.entries.len() as u64) - 8
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[self.version, 0, 0, 0])?;
        w.write_all(&(self.entries.len() as u32).to_be_bytes())?;
        for entry in &self.entries {
            Self::write_entry(w, self.version, entry)?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let (version, _) = r.read_version_flags()?;
        let count = r.read_u32()?;
        let mut entries = Vec::with_capacity((r.remaining() / 8).min(count as u64) as usize);
        for _ in 0..count {
            let sample_count = r.read_u32()?;
            let sample_offset = if version == 0 {
                r.read_u32()? as i64
            } else {
                r.read_i32()? as i64
            };
            entries.push(CttsEntry {
                sample_count,
                sample_offset,
            });
        }
        Ok(Self { version, entries })
    }
}
