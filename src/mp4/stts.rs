use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{BoxHeader, BoxType, Mp4Box};
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SttsEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

/// Decoding time-to-sample box: run-length encoded sample durations
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SttsBox {
    pub entries: Vec<SttsEntry>,
}

impl SttsBox {
    /// Box size for `entry_count` entries.
    pub fn size_for(entry_count: u64) -> u64 {
        16 + 8 * entry_count
    }

    pub fn write_entry<W: Write>(w: &mut W, entry: &SttsEntry) -> MediaRecodeResult<()> {
        w.write_all(&entry.sample_count.to_be_bytes())?;
        w.write_all(&entry.sample_delta.to_be_bytes())?;
        Ok(())
    }

    pub fn sample_count(&self) -> u64 {
        self.entries.iter().map(|e| e.sample_count as u64).sum()
    }

    /// Sum of `count * delta` over all runs, in track units.
    pub fn total_duration(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| e.sample_count as u64 * e.sample_delta as u64)
            .sum()
    }
}

impl Mp4Box for SttsBox {
    const TYPE: BoxType = BoxType::fourcc(b"stts");

    fn payload_size(&self) -> u64 {
        Self::size_for(self.entries.len() as u64) - 8
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[0u8; 4])?;
        w.write_all(&(self.entries.len() as u32).to_be_bytes())?;
        for entry in &self.entries {
            Self::write_entry(w, entry)?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        r.read_version_flags()?;
        let count = r.read_u32()?;
        let mut entries = Vec::with_capacity((r.remaining() / 8).min(count as u64) as usize);
        for _ in 0..count {
            entries.push(SttsEntry {
                sample_count: r.read_u32()?,
                sample_delta: r.read_u32()?,
            });
        }
        Ok(Self { entries })
    }
}
