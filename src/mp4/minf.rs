use crate::errors::{IntegrityError, MediaRecodeResult};
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{boxes_size, BoxHeader, BoxType, Mp4Box};
use crate::mp4::stbl::StblBox;
use crate::mp4::unknown::UnknownBox;
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

/// Video media header
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VmhdBox {
    pub graphics_mode: u16,
    pub opcolor: [u16; 3],
}

impl Mp4Box for VmhdBox {
    const TYPE: BoxType = BoxType::fourcc(b"vmhd");

    fn payload_size(&self) -> u64 {
        12
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[0, 0, 0, 1])?;
        w.write_all(&self.graphics_mode.to_be_bytes())?;
        for c in self.opcolor {
            w.write_all(&c.to_be_bytes())?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        r.read_version_flags()?;
        let graphics_mode = r.read_u16()?;
        let opcolor = [r.read_u16()?, r.read_u16()?, r.read_u16()?];
        Ok(Self {
            graphics_mode,
            opcolor,
        })
    }
}

/// Sound media header
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SmhdBox {
    pub balance: i16,
}

impl Mp4Box for SmhdBox {
    const TYPE: BoxType = BoxType::fourcc(b"smhd");

    fn payload_size(&self) -> u64 {
        8
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[0u8; 4])?;
        w.write_all(&self.balance.to_be_bytes())?;
        w.write_all(&[0u8; 2])?;
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        r.read_version_flags()?;
        let balance = r.read_i16()?;
        r.read_u16()?;
        Ok(Self { balance })
    }
}

/// Data reference box; entries are kept opaque
#[derive(Debug, Clone, PartialEq)]
pub struct DrefBox {
    pub entries: Vec<UnknownBox>,
}

impl Default for DrefBox {
    /// A single self-contained `url ` entry.
    fn default() -> Self {
        Self {
            entries: vec![UnknownBox::new(BoxType::fourcc(b"url "), vec![0, 0, 0, 1])],
        }
    }
}

impl Mp4Box for DrefBox {
    const TYPE: BoxType = BoxType::fourcc(b"dref");

    fn payload_size(&self) -> u64 {
        8 + boxes_size(&self.entries)
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[0u8; 4])?;
        w.write_all(&(self.entries.len() as u32).to_be_bytes())?;
        for entry in &self.entries {
            entry.write_box(w)?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        r.read_version_flags()?;
        let count = r.read_u32()?;
        let mut entries = Vec::new();
        for _ in 0..count {
            entries.push(UnknownBox::read_box(r)?);
        }
        Ok(Self { entries })
    }
}

/// Data information box
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DinfBox {
    pub dref: DrefBox,
}

impl Mp4Box for DinfBox {
    const TYPE: BoxType = BoxType::fourcc(b"dinf");

    fn payload_size(&self) -> u64 {
        self.dref.box_size()
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        self.dref.write_box(w)
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let mut dref = None;
        while r.has_child() {
            if r.peek()?.box_type == DrefBox::TYPE {
                dref = Some(DrefBox::read_box(r)?);
            } else {
                r.skip_box()?;
            }
        }
        Ok(Self {
            dref: dref.unwrap_or_default(),
        })
    }
}

/// Media information box
#[derive(Debug, Clone, PartialEq)]
pub struct MinfBox {
    pub vmhd: Option<VmhdBox>,
    pub smhd: Option<SmhdBox>,
    pub dinf: DinfBox,
    pub stbl: StblBox,
    pub unknown: Vec<UnknownBox>,
}

impl MinfBox {
    /// Size of everything except the sample table.
    pub fn size_without_stbl(&self) -> u64 {
        8 + self.vmhd.as_ref().map_or(0, |b| b.box_size())
            + self.smhd.as_ref().map_or(0, |b| b.box_size())
            + self.dinf.box_size()
            + boxes_size(&self.unknown)
    }

    /// Write the media header and data information children.
    pub fn write_headers<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        if let Some(vmhd) = &self.vmhd {
            vmhd.write_box(w)?;
        }
        if let Some(smhd) = &self.smhd {
            smhd.write_box(w)?;
        }
        self.dinf.write_box(w)
    }
}

impl Mp4Box for MinfBox {
    const TYPE: BoxType = BoxType::fourcc(b"minf");

    fn payload_size(&self) -> u64 {
        self.size_without_stbl() - 8 + self.stbl.box_size()
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        self.write_headers(w)?;
        self.stbl.write_box(w)?;
        for b in &self.unknown {
            b.write_box(w)?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let mut vmhd = None;
        let mut smhd = None;
        let mut dinf = None;
        let mut stbl = None;
        let mut unknown = Vec::new();
        while r.has_child() {
            let header = r.peek()?;
            match &header.box_type.code() {
                b"vmhd" => vmhd = Some(VmhdBox::read_box(r)?),
                b"smhd" => smhd = Some(SmhdBox::read_box(r)?),
                b"dinf" => dinf = Some(DinfBox::read_box(r)?),
                b"stbl" => stbl = Some(StblBox::read_box(r)?),
                _ => unknown.push(UnknownBox::read_box(r)?),
            }
        }
        let stbl = stbl.ok_or_else(|| IntegrityError::new("minf box without stbl"))?;
        Ok(Self {
            vmhd,
            smhd,
            dinf: dinf.unwrap_or_default(),
            stbl,
            unknown,
        })
    }
}
