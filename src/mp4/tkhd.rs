use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::mvhd::UNITY_MATRIX;
use crate::mp4::r#box::{BoxHeader, BoxType, Mp4Box};
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

pub const TRACK_ENABLED: u32 = 0x1;
pub const TRACK_IN_MOVIE: u32 = 0x2;

/// Track header box
#[derive(Debug, Clone, PartialEq)]
pub struct TkhdBox {
    pub version: u8,
    pub flags: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    /// In movie timescale
    pub duration: u64,
    pub layer: i16,
    pub alternate_group: i16,
    pub volume: u16,
    pub matrix: [u32; 9],
    /// 16.16 fixed point
    pub width: u32,
    /// 16.16 fixed point
    pub height: u32,
}

impl TkhdBox {
    pub fn new(track_id: u32, duration: u64) -> Self {
        Self {
            version: if duration > u32::MAX as u64 { 1 } else { 0 },
            flags: TRACK_ENABLED | TRACK_IN_MOVIE,
            creation_time: 0,
            modification_time: 0,
            track_id,
            duration,
            layer: 0,
            alternate_group: 0,
            volume: 0,
            matrix: UNITY_MATRIX,
            width: 0,
            height: 0,
        }
    }

    pub fn pixel_width(&self) -> u32 {
        self.width >> 16
    }

    pub fn pixel_height(&self) -> u32 {
        self.height >> 16
    }
}

impl Mp4Box for TkhdBox {
    const TYPE: BoxType = BoxType::fourcc(b"tkhd");

    fn payload_size(&self) -> u64 {
        if self.version == 1 {
            96
        } else {
            84
        }
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[self.version])?;
        w.write_all(&self.flags.to_be_bytes()[1..])?;
        if self.version == 1 {
            w.write_all(&self.creation_time.to_be_bytes())?;
            w.write_all(&self.modification_time.to_be_bytes())?;
            w.write_all(&self.track_id.to_be_bytes())?;
            w.write_all(&[0u8; 4])?;
            w.write_all(&self.duration.to_be_bytes())?;
        } else {
            w.write_all(&(self.creation_time as u32).to_be_bytes())?;
            w.write_all(&(self.modification_time as u32).to_be_bytes())?;
            w.write_all(&self.track_id.to_be_bytes())?;
            w.write_all(&[0u8; 4])?;
            w.write_all(&(self.duration as u32).to_be_bytes())?;
        }
        w.write_all(&[0u8; 8])?;
        w.write_all(&self.layer.to_be_bytes())?;
        w.write_all(&self.alternate_group.to_be_bytes())?;
        w.write_all(&self.volume.to_be_bytes())?;
        w.write_all(&[0u8; 2])?;
        for m in self.matrix {
            w.write_all(&m.to_be_bytes())?;
        }
        w.write_all(&self.width.to_be_bytes())?;
        w.write_all(&self.height.to_be_bytes())?;
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let (version, flags) = r.read_version_flags()?;
        let (creation_time, modification_time, track_id, duration) = if version == 1 {
            let c = r.read_u64()?;
            let m = r.read_u64()?;
            let id = r.read_u32()?;
            r.read_u32()?;
            (c, m, id, r.read_u64()?)
        } else {
            let c = r.read_u32()? as u64;
            let m = r.read_u32()? as u64;
            let id = r.read_u32()?;
            r.read_u32()?;
            (c, m, id, r.read_u32()? as u64)
        };
        r.read_bytes(8)?;
        let layer = r.read_i16()?;
        let alternate_group = r.read_i16()?;
        let volume = r.read_u16()?;
        r.read_u16()?;
        let mut matrix = [0u32; 9];
        for m in matrix.iter_mut() {
            *m = r.read_u32()?;
        }
        let width = r.read_u32()?;
        let height = r.read_u32()?;
        Ok(Self {
            version,
            flags,
            creation_time,
            modification_time,
            track_id,
            duration,
            layer,
            alternate_group,
            volume,
            matrix,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mp4::r#box::{from_bytes, to_bytes};

    #[test]
    fn test_tkhd_round_trip() {
        let mut tkhd = TkhdBox::new(2, 90_000);
        tkhd.width = 1280 << 16;
        tkhd.height = 720 << 16;
        let bytes = to_bytes(&tkhd).unwrap();
        assert_eq!(bytes.len(), 92);
        assert_eq!(bytes[11], 0x03);
        let parsed: TkhdBox = from_bytes(&bytes).unwrap();
        assert_eq!(parsed.pixel_width(), 1280);
        assert_eq!(parsed.pixel_height(), 720);
        assert_eq!(parsed, tkhd);
    }
}
