//! Movie fragment random access index, written at the end of a fragmented file.

use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{boxes_size, BoxHeader, BoxType, Mp4Box};
use crate::mp4::unknown::UnknownBox;
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TfraEntry {
    /// Presentation time of the random access sample, in track timescale
    pub time: u64,
    /// Offset of the moof holding it
    pub moof_offset: u64,
    pub traf_number: u32,
    pub trun_number: u32,
    pub sample_number: u32,
}

/// Track fragment random access box
#[derive(Debug, Clone, PartialEq)]
pub struct TfraBox {
    pub version: u8,
    pub track_id: u32,
    /// Field widths in bytes minus one, two bits each
    pub length_size_of_traf_num: u8,
    pub length_size_of_trun_num: u8,
    pub length_size_of_sample_num: u8,
    pub entries: Vec<TfraEntry>,
}

impl TfraBox {
    pub fn new(track_id: u32) -> Self {
        Self {
            version: 1,
            track_id,
            length_size_of_traf_num: 0,
            length_size_of_trun_num: 0,
            length_size_of_sample_num: 0,
            entries: Vec::new(),
        }
    }

    fn entry_size(&self) -> u64 {
        let times = if self.version == 1 { 16 } else { 8 };
        times
            + self.length_size_of_traf_num as u64
            + 1
            + self.length_size_of_trun_num as u64
            + 1
            + self.length_size_of_sample_num as u64
            + 1
    }
}

fn write_sized<W: Write>(w: &mut W, value: u32, length_minus_one: u8) -> MediaRecodeResult<()> {
    let bytes = value.to_be_bytes();
    w.write_all(&bytes[3 - length_minus_one as usize..])?;
    Ok(())
}

fn read_sized<R: SeekableStream>(r: &mut BoxReader<R>, length_minus_one: u8) -> MediaRecodeResult<u32> {
    Ok(match length_minus_one {
        0 => r.read_u8()? as u32,
        1 => r.read_u16()? as u32,
        2 => r.read_u24()?,
        _ => r.read_u32()?,
    })
}

impl Mp4Box for TfraBox {
    const TYPE: BoxType = BoxType::fourcc(b"tfra");

    fn payload_size(&self) -> u64 {
        4 + 12 + self.entry_size() * self.entries.len() as u64
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[self.version, 0, 0, 0])?;
        w.write_all(&self.track_id.to_be_bytes())?;
        let lengths = ((self.length_size_of_traf_num as u32 & 0x3) << 4)
            | ((self.length_size_of_trun_num as u32 & 0x3) << 2)
            | (self.length_size_of_sample_num as u32 & 0x3);
        w.write_all(&lengths.to_be_bytes())?;
        w.write_all(&(self.entries.len() as u32).to_be_bytes())?;
        for e in &self.entries {
            if self.version == 1 {
                w.write_all(&e.time.to_be_bytes())?;
                w.write_all(&e.moof_offset.to_be_bytes())?;
            } else {
                w.write_all(&(e.time as u32).to_be_bytes())?;
                w.write_all(&(e.moof_offset as u32).to_be_bytes())?;
            }
            write_sized(w, e.traf_number, self.length_size_of_traf_num)?;
            write_sized(w, e.trun_number, self.length_size_of_trun_num)?;
            write_sized(w, e.sample_number, self.length_size_of_sample_num)?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let (version, _) = r.read_version_flags()?;
        let track_id = r.read_u32()?;
        let lengths = r.read_u32()?;
        let mut tfra = TfraBox {
            version,
            track_id,
            length_size_of_traf_num: ((lengths >> 4) & 0x3) as u8,
            length_size_of_trun_num: ((lengths >> 2) & 0x3) as u8,
            length_size_of_sample_num: (lengths & 0x3) as u8,
            entries: Vec::new(),
        };
        let count = r.read_u32()?;
        tfra.entries
            .reserve((r.remaining() / tfra.entry_size()).min(count as u64) as usize);
        for _ in 0..count {
            let (time, moof_offset) = if version == 1 {
                (r.read_u64()?, r.read_u64()?)
            } else {
                (r.read_u32()? as u64, r.read_u32()? as u64)
            };
            tfra.entries.push(TfraEntry {
                time,
                moof_offset,
                traf_number: read_sized(r, tfra.length_size_of_traf_num)?,
                trun_number: read_sized(r, tfra.length_size_of_trun_num)?,
                sample_number: read_sized(r, tfra.length_size_of_sample_num)?,
            });
        }
        Ok(tfra)
    }
}

/// Movie fragment random access offset: size of the enclosing mfra
#[derive(Debug, Clone, PartialEq)]
pub struct MfroBox {
    pub size: u32,
}

impl Mp4Box for MfroBox {
    const TYPE: BoxType = BoxType::fourcc(b"mfro");

    fn payload_size(&self) -> u64 {
        8
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[0u8; 4])?;
        w.write_all(&self.size.to_be_bytes())?;
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        r.read_version_flags()?;
        Ok(Self {
            size: r.read_u32()?,
        })
    }
}

/// Movie fragment random access box
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MfraBox {
    pub tfras: Vec<TfraBox>,
    pub mfro: Option<MfroBox>,
    pub unknown: Vec<UnknownBox>,
}

impl MfraBox {
    /// Index with a trailing mfro holding the final size.
    pub fn new(tfras: Vec<TfraBox>) -> Self {
        let mut mfra = Self {
            tfras,
            mfro: Some(MfroBox { size: 0 }),
            unknown: Vec::new(),
        };
        let size = mfra.box_size() as u32;
        mfra.mfro = Some(MfroBox { size });
        mfra
    }

    pub fn tfra(&self, track_id: u32) -> Option<&TfraBox> {
        self.tfras.iter().find(|t| t.track_id == track_id)
    }
}

impl Mp4Box for MfraBox {
    const TYPE: BoxType = BoxType::fourcc(b"mfra");

    fn payload_size(&self) -> u64 {
        boxes_size(&self.tfras)
            + boxes_size(&self.unknown)
            + self.mfro.as_ref().map_or(0, |b| b.box_size())
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        for tfra in &self.tfras {
            tfra.write_box(w)?;
        }
        for b in &self.unknown {
            b.write_box(w)?;
        }
        if let Some(mfro) = &self.mfro {
            mfro.write_box(w)?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let mut mfra = MfraBox::default();
        while r.has_child() {
            let header = r.peek()?;
            match &header.box_type.code() {
                b"tfra" => mfra.tfras.push(TfraBox::read_box(r)?),
                b"mfro" => mfra.mfro = Some(MfroBox::read_box(r)?),
                _ => mfra.unknown.push(UnknownBox::read_box(r)?),
            }
        }
        Ok(mfra)
    }
}
