use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{BoxHeader, BoxType, Mp4Box};
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

pub const STCO: BoxType = BoxType::fourcc(b"stco");
pub const CO64: BoxType = BoxType::fourcc(b"co64");

/// Chunk offset table, written as `stco` or as `co64` when offsets need 64 bits
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChunkOffsetBox {
    pub offsets: Vec<u64>,
    pub large: bool,
}

impl ChunkOffsetBox {
    pub fn new(offsets: Vec<u64>) -> Self {
        let large = offsets.iter().any(|o| *o > u32::MAX as u64);
        Self { offsets, large }
    }

    pub fn size_for(entry_count: u64, large: bool) -> u64 {
        16 + entry_count * if large { 8 } else { 4 }
    }

    pub fn type_for(large: bool) -> BoxType {
        if large {
            CO64
        } else {
            STCO
        }
    }

    pub fn write_entry<W: Write>(w: &mut W, large: bool, offset: u64) -> MediaRecodeResult<()> {
        if large {
            w.write_all(&offset.to_be_bytes())?;
        } else {
            w.write_all(&(offset as u32).to_be_bytes())?;
        }
        Ok(())
    }
}

impl Mp4Box for ChunkOffsetBox {
    const TYPE: BoxType = STCO;

    fn box_type(&self) -> BoxType {
        Self::type_for(self.large)
    }

    fn accepts(box_type: &BoxType) -> bool {
        *box_type == STCO || *box_type == CO64
    }

    fn payload_size(&self) -> u64 {
        Self::size_for(self.offsets.len() as u64, self.large) - 8
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[0u8; 4])?;
        w.write_all(&(self.offsets.len() as u32).to_be_bytes())?;
        for offset in &self.offsets {
            Self::write_entry(w, self.large, *offset)?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let large = header.box_type == CO64;
        r.read_version_flags()?;
        let count = r.read_u32()?;
        let width = if large { 8 } else { 4 };
        let mut offsets = Vec::with_capacity((r.remaining() / width).min(count as u64) as usize);
        for _ in 0..count {
            offsets.push(if large {
                r.read_u64()?
            } else {
                r.read_u32()? as u64
            });
        }
        Ok(Self { offsets, large })
    }
}
