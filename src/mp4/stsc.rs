use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{BoxHeader, BoxType, Mp4Box};
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StscEntry {
    /// 1-based index of the first chunk of this group
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// Sample-to-chunk box
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StscBox {
    pub entries: Vec<StscEntry>,
}

impl StscBox {
    pub fn size_for(entry_count: u64) -> u64 {
        16 + 12 * entry_count
    }

    /// Table for the one-sample-per-chunk layout.
    pub fn one_sample_per_chunk(sample_count: u64) -> Self {
        let entries = if sample_count == 0 {
            Vec::new()
        } else {
            vec![StscEntry {
                first_chunk: 1,
                samples_per_chunk: 1,
                sample_description_index: 1,
            }]
        };
        Self { entries }
    }

    /// Number of samples addressed when the table covers `chunk_count` chunks.
    pub fn addressed_samples(&self, chunk_count: u64) -> u64 {
        let mut total = 0u64;
        for (i, entry) in self.entries.iter().enumerate() {
            let first = entry.first_chunk as u64;
            let next = self
                .entries
                .get(i + 1)
                .map(|e| e.first_chunk as u64)
                .unwrap_or(chunk_count + 1);
            total += next.saturating_sub(first) * entry.samples_per_chunk as u64;
        }
        total
    }
}

impl Mp4Box for StscBox {
    const TYPE: BoxType = BoxType::fourcc(b"stsc");

    fn payload_size(&self) -> u64 {
        Self::size_for(self.entries.len() as u64) - 8
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[0u8; 4])?;
        w.write_all(&(self.entries.len() as u32).to_be_bytes())?;
        for e in &self.entries {
            w.write_all(&e.first_chunk.to_be_bytes())?;
            w.write_all(&e.samples_per_chunk.to_be_bytes())?;
            w.write_all(&e.sample_description_index.to_be_bytes())?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        r.read_version_flags()?;
        let count = r.read_u32()?;
        let mut entries = Vec::with_capacity((r.remaining() / 12).min(count as u64) as usize);
        for _ in 0..count {
            entries.push(StscEntry {
                first_chunk: r.read_u32()?,
                samples_per_chunk: r.read_u32()?,
                sample_description_index: r.read_u32()?,
            });
        }
        Ok(Self { entries })
    }
}
