use crate::errors::{IntegrityError, MediaRecodeResult};
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::hdlr::HdlrBox;
use crate::mp4::mdhd::MdhdBox;
use crate::mp4::minf::MinfBox;
use crate::mp4::r#box::{boxes_size, BoxHeader, BoxType, Mp4Box};
use crate::mp4::stbl::StblBox;
use crate::mp4::stsd::SampleEntry;
use crate::mp4::tkhd::TkhdBox;
use crate::mp4::unknown::UnknownBox;
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

/// Media box
#[derive(Debug, Clone, PartialEq)]
pub struct MdiaBox {
    pub mdhd: MdhdBox,
    pub hdlr: HdlrBox,
    pub minf: MinfBox,
    pub unknown: Vec<UnknownBox>,
}

impl Mp4Box for MdiaBox {
    const TYPE: BoxType = BoxType::fourcc(b"mdia");

    fn payload_size(&self) -> u64 {
        self.mdhd.box_size() + self.hdlr.box_size() + self.minf.box_size() + boxes_size(&self.unknown)
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        self.mdhd.write_box(w)?;
        self.hdlr.write_box(w)?;
        self.minf.write_box(w)?;
        for b in &self.unknown {
            b.write_box(w)?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let mut mdhd = None;
        let mut hdlr = None;
        let mut minf = None;
        let mut unknown = Vec::new();
        while r.has_child() {
            let header = r.peek()?;
            match &header.box_type.code() {
                b"mdhd" => mdhd = Some(MdhdBox::read_box(r)?),
                b"hdlr" => hdlr = Some(HdlrBox::read_box(r)?),
                b"minf" => minf = Some(MinfBox::read_box(r)?),
                _ => unknown.push(UnknownBox::read_box(r)?),
            }
        }
        Ok(Self {
            mdhd: mdhd.ok_or_else(|| IntegrityError::new("mdia box without mdhd"))?,
            hdlr: hdlr.ok_or_else(|| IntegrityError::new("mdia box without hdlr"))?,
            minf: minf.ok_or_else(|| IntegrityError::new("mdia box without minf"))?,
            unknown,
        })
    }
}

/// Track box
#[derive(Debug, Clone, PartialEq)]
pub struct TrakBox {
    pub tkhd: TkhdBox,
    pub mdia: MdiaBox,
    pub unknown: Vec<UnknownBox>,
}

/// Sizes of the boxes enclosing a sample table that is streamed after the sample
/// description.
struct StreamedSizes {
    trak: u64,
    mdia: u64,
    minf: u64,
    stbl: u64,
}

fn enclosing(box_type: BoxType, payload: u64) -> u64 {
    BoxHeader::for_payload(box_type, payload).size
}

impl TrakBox {
    pub fn track_id(&self) -> u32 {
        self.tkhd.track_id
    }

    pub fn handler(&self) -> [u8; 4] {
        self.mdia.hdlr.handler_type.0
    }

    pub fn timescale(&self) -> u32 {
        self.mdia.mdhd.timescale
    }

    pub fn stbl(&self) -> &StblBox {
        &self.mdia.minf.stbl
    }

    /// First sample entry of the track, if it has one.
    pub fn sample_entry(&self) -> Option<&SampleEntry> {
        self.stbl().stsd.entries.first()
    }

    fn streamed_sizes(&self, tables: u64) -> StreamedSizes {
        let stbl = enclosing(StblBox::TYPE, self.stbl().payload_size() + tables);
        let minf_payload = self.mdia.minf.payload_size() - self.stbl().box_size() + stbl;
        let minf = enclosing(MinfBox::TYPE, minf_payload);
        let mdia_payload = self.mdia.payload_size() - self.mdia.minf.box_size() + minf;
        let mdia = enclosing(MdiaBox::TYPE, mdia_payload);
        let trak_payload = self.payload_size() - self.mdia.box_size() + mdia;
        StreamedSizes {
            trak: enclosing(TrakBox::TYPE, trak_payload),
            mdia,
            minf,
            stbl,
        }
    }

    /// Total size of this track once `tables` bytes of sample tables are appended to
    /// its sample table box.
    pub fn size_with_tables(&self, tables: u64) -> u64 {
        self.streamed_sizes(tables).trak
    }

    /// Write the track, calling `write_tables` inside `stbl` right after the boxes it
    /// already holds. `write_tables` must emit exactly `tables` bytes.
    pub fn write_with_tables<W, F>(
        &self,
        w: &mut BoxWriter<W>,
        tables: u64,
        write_tables: F,
    ) -> MediaRecodeResult<()>
    where
        W: Write + Seek,
        F: FnOnce(&mut BoxWriter<W>) -> MediaRecodeResult<()>,
    {
        let sizes = self.streamed_sizes(tables);
        let minf = &self.mdia.minf;
        w.begin(TrakBox::TYPE, sizes.trak)?;
        self.tkhd.write_box(w)?;
        w.begin(MdiaBox::TYPE, sizes.mdia)?;
        self.mdia.mdhd.write_box(w)?;
        self.mdia.hdlr.write_box(w)?;
        w.begin(MinfBox::TYPE, sizes.minf)?;
        minf.write_headers(w)?;
        w.begin(StblBox::TYPE, sizes.stbl)?;
        minf.stbl.write_payload(w)?;
        write_tables(w)?;
        w.end()?;
        for b in &minf.unknown {
            b.write_box(w)?;
        }
        w.end()?;
        for b in &self.mdia.unknown {
            b.write_box(w)?;
        }
        w.end()?;
        for b in &self.unknown {
            b.write_box(w)?;
        }
        w.end()?;
        Ok(())
    }
}

impl Mp4Box for TrakBox {
    const TYPE: BoxType = BoxType::fourcc(b"trak");

    fn payload_size(&self) -> u64 {
        self.tkhd.box_size() + self.mdia.box_size() + boxes_size(&self.unknown)
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        self.tkhd.write_box(w)?;
        self.mdia.write_box(w)?;
        for b in &self.unknown {
            b.write_box(w)?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let mut tkhd = None;
        let mut mdia = None;
        let mut unknown = Vec::new();
        while r.has_child() {
            let header = r.peek()?;
            match &header.box_type.code() {
                b"tkhd" => tkhd = Some(TkhdBox::read_box(r)?),
                b"mdia" => mdia = Some(MdiaBox::read_box(r)?),
                _ => unknown.push(UnknownBox::read_box(r)?),
            }
        }
        Ok(Self {
            tkhd: tkhd.ok_or_else(|| IntegrityError::new("trak box without tkhd"))?,
            mdia: mdia.ok_or_else(|| IntegrityError::new("trak box without mdia"))?,
            unknown,
        })
    }
}
