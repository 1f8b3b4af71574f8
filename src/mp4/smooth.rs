//! Smooth Streaming extended-type boxes carried in each track fragment.

use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{BoxHeader, BoxType, Mp4Box};
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

/// 6d1d9b05-42d5-44e6-80e2-141daff757b2
pub const TFXD_UUID: [u8; 16] = [
    0x6d, 0x1d, 0x9b, 0x05, 0x42, 0xd5, 0x44, 0xe6, 0x80, 0xe2, 0x14, 0x1d, 0xaf, 0xf7, 0x57, 0xb2,
];

/// d4807ef2-ca39-4695-8e54-26cb9e46a79f
pub const TFRF_UUID: [u8; 16] = [
    0xd4, 0x80, 0x7e, 0xf2, 0xca, 0x39, 0x46, 0x95, 0x8e, 0x54, 0x26, 0xcb, 0x9e, 0x46, 0xa7, 0x9f,
];

/// Fragment absolute time and duration, in track timescale
#[derive(Debug, Clone, PartialEq)]
pub struct TfxdBox {
    pub version: u8,
    pub fragment_time: u64,
    pub fragment_duration: u64,
}

impl TfxdBox {
    pub fn new(fragment_time: u64, fragment_duration: u64) -> Self {
        Self {
            version: 1,
            fragment_time,
            fragment_duration,
        }
    }
}

impl Mp4Box for TfxdBox {
    const TYPE: BoxType = BoxType::Uuid(TFXD_UUID);

    fn payload_size(&self) -> u64 {
        if self.version == 1 {
            4 + 16
        } else {
            4 + 8
        }
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[self.version, 0, 0, 0])?;
        if self.version == 1 {
            w.write_all(&self.fragment_time.to_be_bytes())?;
            w.write_all(&self.fragment_duration.to_be_bytes())?;
        } else {
            w.write_all(&(self.fragment_time as u32).to_be_bytes())?;
            w.write_all(&(self.fragment_duration as u32).to_be_bytes())?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let (version, _) = r.read_version_flags()?;
        let (fragment_time, fragment_duration) = if version == 1 {
            (r.read_u64()?, r.read_u64()?)
        } else {
            (r.read_u32()? as u64, r.read_u32()? as u64)
        };
        Ok(Self {
            version,
            fragment_time,
            fragment_duration,
        })
    }
}

/// Look-ahead references to the fragments that follow, used by live encoders
#[derive(Debug, Clone, PartialEq)]
pub struct TfrfBox {
    pub version: u8,
    /// `(fragment_time, fragment_duration)` pairs
    pub entries: Vec<(u64, u64)>,
}

impl Mp4Box for TfrfBox {
    const TYPE: BoxType = BoxType::Uuid(TFRF_UUID);

    fn payload_size(&self) -> u64 {
        let width = if self.version == 1 { 16 } else { 8 };
        5 + width * self.entries.len() as u64
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[self.version, 0, 0, 0])?;
        w.write_all(&[self.entries.len() as u8])?;
        for (time, duration) in &self.entries {
            if self.version == 1 {
                w.write_all(&time.to_be_bytes())?;
                w.write_all(&duration.to_be_bytes())?;
            } else {
                w.write_all(&(*time as u32).to_be_bytes())?;
                w.write_all(&(*duration as u32).to_be_bytes())?;
            }
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let (version, _) = r.read_version_flags()?;
        let count = r.read_u8()?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(if version == 1 {
                (r.read_u64()?, r.read_u64()?)
            } else {
                (r.read_u32()? as u64, r.read_u32()? as u64)
            });
        }
        Ok(Self { version, entries })
    }
}
