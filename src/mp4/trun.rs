use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{BoxHeader, BoxType, Mp4Box};
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

pub const TRUN_DATA_OFFSET: u32 = 0x000001;
pub const TRUN_FIRST_SAMPLE_FLAGS: u32 = 0x000004;
pub const TRUN_SAMPLE_DURATION: u32 = 0x000100;
pub const TRUN_SAMPLE_SIZE: u32 = 0x000200;
pub const TRUN_SAMPLE_FLAGS: u32 = 0x000400;
pub const TRUN_SAMPLE_COMPOSITION_OFFSET: u32 = 0x000800;

/// Sample flags of an independently decodable sample (also used for audio).
pub const SAMPLE_FLAGS_SYNC: u32 = 0x0200_0000;
/// Sample flags of a referenced, non-sync sample.
pub const SAMPLE_FLAGS_DELTA: u32 = 0x0101_0000;
/// Sample flags of a disposable, non-sync sample.
pub const SAMPLE_FLAGS_DISPOSABLE: u32 = 0x0181_0000;
/// `sample_is_non_sync_sample` bit.
pub const SAMPLE_IS_NON_SYNC: u32 = 0x0001_0000;

pub fn sample_is_sync(flags: u32) -> bool {
    flags & SAMPLE_IS_NON_SYNC == 0
}

/// `sample_is_depended_on`: 2 means no other sample references this one.
pub fn sample_is_disposable(flags: u32) -> bool {
    (flags >> 22) & 0x3 == 2
}

/// One sample of a track run. Fields not flagged in the run are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrunSample {
    pub duration: u32,
    pub size: u32,
    pub flags: u32,
    pub composition_offset: i64,
}

/// Track fragment run box
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrunBox {
    pub version: u8,
    pub flags: u32,
    /// Relative to the base data offset of the track fragment
    pub data_offset: Option<i32>,
    pub first_sample_flags: Option<u32>,
    pub samples: Vec<TrunSample>,
}

impl TrunBox {
    fn per_sample_size(&self) -> u64 {
        [
            TRUN_SAMPLE_DURATION,
            TRUN_SAMPLE_SIZE,
            TRUN_SAMPLE_FLAGS,
            TRUN_SAMPLE_COMPOSITION_OFFSET,
        ]
        .iter()
        .filter(|f| self.flags & **f != 0)
        .count() as u64
            * 4
    }

    /// Offset of the data offset field from the start of the box.
    pub const DATA_OFFSET_FIELD: u64 = 16;
}

impl Mp4Box for TrunBox {
    const TYPE: BoxType = BoxType::fourcc(b"trun");

    fn payload_size(&self) -> u64 {
        let mut size = 8;
        if self.flags & TRUN_DATA_OFFSET != 0 {
            size += 4;
        }
        if self.flags & TRUN_FIRST_SAMPLE_FLAGS != 0 {
            size += 4;
        }
        size + self.per_sample_size() * self.samples.len() as u64
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[self.version])?;
        w.write_all(&self.flags.to_be_bytes()[1..])?;
        w.write_all(&(self.samples.len() as u32).to_be_bytes())?;
        if self.flags & TRUN_DATA_OFFSET != 0 {
            w.write_all(&self.data_offset.unwrap_or(0).to_be_bytes())?;
        }
        if self.flags & TRUN_FIRST_SAMPLE_FLAGS != 0 {
            w.write_all(&self.first_sample_flags.unwrap_or(0).to_be_bytes())?;
        }
        for s in &self.samples {
            if self.flags & TRUN_SAMPLE_DURATION != 0 {
                w.write_all(&s.duration.to_be_bytes())?;
            }
            if self.flags & TRUN_SAMPLE_SIZE != 0 {
                w.write_all(&s.size.to_be_bytes())?;
            }
            if self.flags & TRUN_SAMPLE_FLAGS != 0 {
                w.write_all(&s.flags.to_be_bytes())?;
            }
            if self.flags & TRUN_SAMPLE_COMPOSITION_OFFSET != 0 {
                if self.version == 0 {
                    w.write_all(&(s.composition_offset as u32).to_be_bytes())?;
                } else {
                    w.write_all(&(s.composition_offset as i32).to_be_bytes())?;
                }
            }
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let (version, flags) = r.read_version_flags()?;
        let count = r.read_u32()?;
        let mut trun = TrunBox {
            version,
            flags,
            ..Default::default()
        };
        if flags & TRUN_DATA_OFFSET != 0 {
            trun.data_offset = Some(r.read_i32()?);
        }
        if flags & TRUN_FIRST_SAMPLE_FLAGS != 0 {
            trun.first_sample_flags = Some(r.read_u32()?);
        }
        let width = trun.per_sample_size().max(1);
        trun.samples
            .reserve((r.remaining() / width).min(count as u64) as usize);
        for _ in 0..count {
            let mut s = TrunSample::default();
            if flags & TRUN_SAMPLE_DURATION != 0 {
                s.duration = r.read_u32()?;
            }
            if flags & TRUN_SAMPLE_SIZE != 0 {
                s.size = r.read_u32()?;
            }
            if flags & TRUN_SAMPLE_FLAGS != 0 {
                s.flags = r.read_u32()?;
            }
            if flags & TRUN_SAMPLE_COMPOSITION_OFFSET != 0 {
                s.composition_offset = if version == 0 {
                    r.read_u32()? as i64
                } else {
                    r.read_i32()? as i64
                };
            }
            trun.samples.push(s);
        }
        Ok(trun)
    }
}
