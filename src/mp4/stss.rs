use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{BoxHeader, BoxType, Mp4Box};
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

/// Sync sample box: 1-based numbers of the key frames
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StssBox {
    pub sample_numbers: Vec<u32>,
}

impl StssBox {
    pub fn size_for(entry_count: u64) -> u64 {
        16 + 4 * entry_count
    }
}

impl Mp4Box for StssBox {
    const TYPE: BoxType = BoxType::fourcc(b"stss");

    fn payload_size(&self) -> u64 {
        Self::size_for(self.sample_numbers.len() as u64) - 8
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[0u8; 4])?;
        w.write_all(&(self.sample_numbers.len() as u32).to_be_bytes())?;
        for n in &self.sample_numbers {
            w.write_all(&n.to_be_bytes())?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        r.read_version_flags()?;
        let count = r.read_u32()?;
        let mut sample_numbers = Vec::with_capacity((r.remaining() / 4).min(count as u64) as usize);
        for _ in 0..count {
            sample_numbers.push(r.read_u32()?);
        }
        Ok(Self { sample_numbers })
    }
}
