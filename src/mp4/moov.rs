use crate::errors::{IntegrityError, MediaRecodeResult};
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::mvex::MvexBox;
use crate::mp4::mvhd::MvhdBox;
use crate::mp4::r#box::{boxes_size, BoxHeader, BoxType, Mp4Box};
use crate::mp4::trak::TrakBox;
use crate::mp4::unknown::UnknownBox;
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

/// Movie box
#[derive(Debug, Clone, PartialEq)]
pub struct MoovBox {
    pub mvhd: MvhdBox,
    pub traks: Vec<TrakBox>,
    pub mvex: Option<MvexBox>,
    pub unknown: Vec<UnknownBox>,
}

impl MoovBox {
    pub fn is_fragmented(&self) -> bool {
        self.mvex.is_some()
    }

    pub fn track(&self, track_id: u32) -> Option<&TrakBox> {
        self.traks.iter().find(|t| t.track_id() == track_id)
    }
}

impl Mp4Box for MoovBox {
    const TYPE: BoxType = BoxType::fourcc(b"moov");

    fn payload_size(&self) -> u64 {
        self.mvhd.box_size()
            + boxes_size(&self.traks)
            + self.mvex.as_ref().map_or(0, |b| b.box_size())
            + boxes_size(&self.unknown)
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        self.mvhd.write_box(w)?;
        for trak in &self.traks {
            trak.write_box(w)?;
        }
        if let Some(mvex) = &self.mvex {
            mvex.write_box(w)?;
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
        let mut mvhd = None;
        let mut traks = Vec::new();
        let mut mvex = None;
        let mut unknown = Vec::new();
        while r.has_child() {
            let header = r.peek()?;
            match &header.box_type.code() {
                b"mvhd" => mvhd = Some(MvhdBox::read_box(r)?),
                b"trak" => traks.push(TrakBox::read_box(r)?),
                b"mvex" => mvex = Some(MvexBox::read_box(r)?),
                _ => unknown.push(UnknownBox::read_box(r)?),
            }
        }
        Ok(Self {
            mvhd: mvhd.ok_or_else(|| IntegrityError::new("moov box without mvhd"))?,
            traks,
            mvex,
            unknown,
        })
    }
}
