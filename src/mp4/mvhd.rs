use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{BoxHeader, BoxType, Mp4Box};
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

/// Unity transformation matrix shared by mvhd and tkhd.
pub const UNITY_MATRIX: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

/// Movie header box
#[derive(Debug, Clone, PartialEq)]
pub struct MvhdBox {
    pub version: u8,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub rate: u32,
    pub volume: u16,
    pub matrix: [u32; 9],
    pub next_track_id: u32,
}

impl MvhdBox {
    pub fn new(timescale: u32, duration: u64, next_track_id: u32) -> Self {
        Self {
            version: if duration > u32::MAX as u64 { 1 } else { 0 },
            creation_time: 0,
            modification_time: 0,
            timescale,
            duration,
            rate: 0x0001_0000,
            volume: 0x0100,
            matrix: UNITY_MATRIX,
            next_track_id,
        }
    }

    /// Offset of the duration field from the start of the box.
    pub fn duration_field_offset(&self) -> u64 {
        if self.version == 1 {
            8 + 4 + 8 + 8 + 4
        } else {
            8 + 4 + 4 + 4 + 4
        }
    }
}

impl Mp4Box for MvhdBox {
    const TYPE: BoxType = BoxType::fourcc(b"mvhd");

    fn payload_size(&self) -> u64 {
        if self.version == 1 {
            112
        } else {
            100
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
        w.write_all(&self.rate.to_be_bytes())?;
        w.write_all(&self.volume.to_be_bytes())?;
        w.write_all(&[0u8; 10])?;
        for m in self.matrix {
            w.write_all(&m.to_be_bytes())?;
        }
        w.write_all(&[0u8; 24])?;
        w.write_all(&self.next_track_id.to_be_bytes())?;
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
        let rate = r.read_u32()?;
        let volume = r.read_u16()?;
        r.read_bytes(10)?;
        let mut matrix = [0u32; 9];
        for m in matrix.iter_mut() {
            *m = r.read_u32()?;
        }
        r.read_bytes(24)?;
        let next_track_id = r.read_u32()?;
        Ok(Self {
            version,
            creation_time,
            modification_time,
            timescale,
            duration,
            rate,
            volume,
            matrix,
            next_track_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mp4::r#box::{from_bytes, to_bytes};

    #[test]
    fn test_mvhd_versions() {
        let short = MvhdBox::new(1000, 60_000, 3);
        assert_eq!(short.version, 0);
        let bytes = to_bytes(&short).unwrap();
        assert_eq!(bytes.len(), 108);
        assert_eq!(&bytes[24..28], &60_000u32.to_be_bytes());
        assert_eq!(from_bytes::<MvhdBox>(&bytes).unwrap(), short);

        let long = MvhdBox::new(10_000_000, 1 << 40, 2);
        assert_eq!(long.version, 1);
        let bytes = to_bytes(&long).unwrap();
        assert_eq!(bytes.len(), 120);
        let offset = long.duration_field_offset() as usize;
        assert_eq!(&bytes[offset..offset + 8], &(1u64 << 40).to_be_bytes());
        assert_eq!(from_bytes::<MvhdBox>(&bytes).unwrap(), long);
    }
}
