use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{boxes_size, BoxHeader, BoxType, Mp4Box};
use crate::mp4::unknown::UnknownBox;
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

/// Movie extends header: total duration of a fragmented movie
#[derive(Debug, Clone, PartialEq)]
pub struct MehdBox {
    pub version: u8,
    /// In movie timescale
    pub fragment_duration: u64,
}

impl MehdBox {
    /// Offset of the duration field from the start of the box.
    pub const DURATION_OFFSET: u64 = 12;
}

impl Mp4Box for MehdBox {
    const TYPE: BoxType = BoxType::fourcc(b"mehd");

    fn payload_size(&self) -> u64 {
        if self.version == 1 {
            12
        } else {
            8
        }
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[self.version, 0, 0, 0])?;
        if self.version == 1 {
            w.write_all(&self.fragment_duration.to_be_bytes())?;
        } else {
            w.write_all(&(self.fragment_duration as u32).to_be_bytes())?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let (version, _) = r.read_version_flags()?;
        let fragment_duration = if version == 1 {
            r.read_u64()?
        } else {
            r.read_u32()? as u64
        };
        Ok(Self {
            version,
            fragment_duration,
        })
    }
}

/// Track extends box: per-track sample defaults for fragments
#[derive(Debug, Clone, PartialEq)]
pub struct TrexBox {
    pub track_id: u32,
    pub default_sample_description_index: u32,
    pub default_sample_duration: u32,
    pub default_sample_size: u32,
    pub default_sample_flags: u32,
}

impl TrexBox {
    pub fn new(track_id: u32) -> Self {
        Self {
            track_id,
            default_sample_description_index: 1,
            default_sample_duration: 0,
            default_sample_size: 0,
            default_sample_flags: 0,
        }
    }
}

impl Mp4Box for TrexBox {
    const TYPE: BoxType = BoxType::fourcc(b"trex");

    fn payload_size(&self) -> u64 {
        24
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[0u8; 4])?;
        for v in [
            self.track_id,
            self.default_sample_description_index,
            self.default_sample_duration,
            self.default_sample_size,
            self.default_sample_flags,
        ] {
            w.write_all(&v.to_be_bytes())?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        r.read_version_flags()?;
        Ok(Self {
            track_id: r.read_u32()?,
            default_sample_description_index: r.read_u32()?,
            default_sample_duration: r.read_u32()?,
            default_sample_size: r.read_u32()?,
            default_sample_flags: r.read_u32()?,
        })
    }
}

/// Movie extends box; its presence marks a fragmented movie
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MvexBox {
    pub mehd: Option<MehdBox>,
    pub trexs: Vec<TrexBox>,
    pub unknown: Vec<UnknownBox>,
}

impl MvexBox {
    pub fn trex(&self, track_id: u32) -> Option<&TrexBox> {
        self.trexs.iter().find(|t| t.track_id == track_id)
    }
}

impl Mp4Box for MvexBox {
    const TYPE: BoxType = BoxType::fourcc(b"mvex");

    fn payload_size(&self) -> u64 {
        self.mehd.as_ref().map_or(0, |b| b.box_size())
            + boxes_size(&self.trexs)
            + boxes_size(&self.unknown)
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        if let Some(mehd) = &self.mehd {
            mehd.write_box(w)?;
        }
        for b in &self.trexs {
            b.write_box(w)?;
        }
        for b in &self.unknown {
            b.write_box(w)?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let mut mvex = MvexBox::default();
        while r.has_child() {
            let header = r.peek()?;
            match &header.box_type.code() {
                b"mehd" => mvex.mehd = Some(MehdBox::read_box(r)?),
                b"trex" => mvex.trexs.push(TrexBox::read_box(r)?),
                _ => mvex.unknown.push(UnknownBox::read_box(r)?),
            }
        }
        Ok(mvex)
    }
}
