use crate::errors::{IntegrityError, MediaRecodeResult};
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::ctts::CttsBox;
use crate::mp4::r#box::{boxes_size, BoxHeader, BoxType, Mp4Box};
use crate::mp4::sdtp::SdtpBox;
use crate::mp4::stco::ChunkOffsetBox;
use crate::mp4::stsc::StscBox;
use crate::mp4::stsd::StsdBox;
use crate::mp4::stss::StssBox;
use crate::mp4::stsz::StszBox;
use crate::mp4::stts::SttsBox;
use crate::mp4::unknown::UnknownBox;
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

/// Sample table box. Every table is optional on read; `SampleTable` decides which are
/// required.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StblBox {
    pub stsd: StsdBox,
    pub stts: Option<SttsBox>,
    pub ctts: Option<CttsBox>,
    pub stss: Option<StssBox>,
    pub sdtp: Option<SdtpBox>,
    pub stsc: Option<StscBox>,
    pub stsz: Option<StszBox>,
    pub stco: Option<ChunkOffsetBox>,
    pub unknown: Vec<UnknownBox>,
}

impl StblBox {
    /// Empty tables, as carried by the tracks of a fragmented movie.
    pub fn empty(stsd: StsdBox) -> Self {
        Self {
            stsd,
            stts: Some(SttsBox::default()),
            stsc: Some(StscBox::default()),
            stsz: Some(StszBox::default()),
            stco: Some(ChunkOffsetBox::default()),
            ..Default::default()
        }
    }
}

impl Mp4Box for StblBox {
    const TYPE: BoxType = BoxType::fourcc(b"stbl");

    fn payload_size(&self) -> u64 {
        self.stsd.box_size()
            + self.stts.as_ref().map_or(0, |b| b.box_size())
            + self.ctts.as_ref().map_or(0, |b| b.box_size())
            + self.stss.as_ref().map_or(0, |b| b.box_size())
            + self.sdtp.as_ref().map_or(0, |b| b.box_size())
            + self.stsc.as_ref().map_or(0, |b| b.box_size())
            + self.stsz.as_ref().map_or(0, |b| b.box_size())
            + self.stco.as_ref().map_or(0, |b| b.box_size())
            + boxes_size(&self.unknown)
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        self.stsd.write_box(w)?;
        if let Some(b) = &self.stts {
            b.write_box(w)?;
        }
        if let Some(b) = &self.ctts {
            b.write_box(w)?;
        }
        if let Some(b) = &self.stss {
            b.write_box(w)?;
        }
        if let Some(b) = &self.sdtp {
            b.write_box(w)?;
        }
        if let Some(b) = &self.stsc {
            b.write_box(w)?;
        }
        if let Some(b) = &self.stsz {
            b.write_box(w)?;
        }
        if let Some(b) = &self.stco {
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
        let mut stsd = None;
        let mut stbl = StblBox::default();
        while r.has_child() {
            let header = r.peek()?;
            match &header.box_type.code() {
                b"stsd" => stsd = Some(StsdBox::read_box(r)?),
                b"stts" => stbl.stts = Some(SttsBox::read_box(r)?),
                b"ctts" => stbl.ctts = Some(CttsBox::read_box(r)?),
                b"stss" => stbl.stss = Some(StssBox::read_box(r)?),
                b"sdtp" => stbl.sdtp = Some(SdtpBox::read_box(r)?),
                b"stsc" => stbl.stsc = Some(StscBox::read_box(r)?),
                b"stsz" => stbl.stsz = Some(StszBox::read_box(r)?),
                b"stco" | b"co64" => stbl.stco = Some(ChunkOffsetBox::read_box(r)?),
                _ => stbl.unknown.push(UnknownBox::read_box(r)?),
            }
        }
        stbl.stsd = stsd.ok_or_else(|| IntegrityError::new("stbl box without stsd"))?;
        Ok(stbl)
    }
}
