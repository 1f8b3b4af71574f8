use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{BoxHeader, BoxType, Mp4Box};
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

/// Sample size box. A non-zero `sample_size` means every sample has that size.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StszBox {
    pub sample_size: u32,
    pub sample_count: u32,
    pub entry_sizes: Vec<u32>,
}

impl StszBox {
    pub fn size_for(sample_count: u64, constant: bool) -> u64 {
        if constant {
            20
        } else {
            20 + 4 * sample_count
        }
    }

    /// Size of the 0-based sample `index`.
    pub fn size_of(&self, index: usize) -> Option<u32> {
        if self.sample_size != 0 {
            Some(self.sample_size)
        } else {
            self.entry_sizes.get(index).copied()
        }
    }
}

impl Mp4Box for StszBox {
    const TYPE: BoxType = BoxType::fourcc(b"stsz");

    fn payload_size(&self) -> u64 {
        Self::size_for(self.entry_sizes.len() as u64, self.sample_size != 0) - 8
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[0u8; 4])?;
        w.write_all(&self.sample_size.to_be_bytes())?;
        w.write_all(&self.sample_count.to_be_bytes())?;
        if self.sample_size == 0 {
            for size in &self.entry_sizes {
                w.write_all(&size.to_be_bytes())?;
            }
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        r.read_version_flags()?;
        let sample_size = r.read_u32()?;
        let sample_count = r.read_u32()?;
        let mut entry_sizes = Vec::new();
        if sample_size == 0 {
            entry_sizes.reserve((r.remaining() / 4).min(sample_count as u64) as usize);
            for _ in 0..sample_count {
                entry_sizes.push(r.read_u32()?);
            }
        }
        Ok(Self {
            sample_size,
            sample_count,
            entry_sizes,
        })
    }
}
