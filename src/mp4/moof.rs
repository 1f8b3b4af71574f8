use crate::errors::{IntegrityError, MediaRecodeResult};
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{boxes_size, BoxHeader, BoxType, Mp4Box};
use crate::mp4::sdtp::SdtpBox;
use crate::mp4::smooth::{TfrfBox, TfxdBox};
use crate::mp4::trun::TrunBox;
use crate::mp4::unknown::UnknownBox;
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

pub const TFHD_BASE_DATA_OFFSET: u32 = 0x000001;
pub const TFHD_SAMPLE_DESCRIPTION_INDEX: u32 = 0x000002;
pub const TFHD_DEFAULT_SAMPLE_DURATION: u32 = 0x000008;
pub const TFHD_DEFAULT_SAMPLE_SIZE: u32 = 0x000010;
pub const TFHD_DEFAULT_SAMPLE_FLAGS: u32 = 0x000020;
pub const TFHD_DURATION_IS_EMPTY: u32 = 0x010000;
pub const TFHD_DEFAULT_BASE_IS_MOOF: u32 = 0x020000;

/// Movie fragment header
#[derive(Debug, Clone, PartialEq)]
pub struct MfhdBox {
    pub sequence_number: u32,
}

impl Mp4Box for MfhdBox {
    const TYPE: BoxType = BoxType::fourcc(b"mfhd");

    fn payload_size(&self) -> u64 {
        8
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[0u8; 4])?;
        w.write_all(&self.sequence_number.to_be_bytes())?;
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        r.read_version_flags()?;
        Ok(Self {
            sequence_number: r.read_u32()?,
        })
    }
}

/// Track fragment header. Optional fields are present on the wire when their flag is set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TfhdBox {
    pub flags: u32,
    pub track_id: u32,
    pub base_data_offset: Option<u64>,
    pub sample_description_index: Option<u32>,
    pub default_sample_duration: Option<u32>,
    pub default_sample_size: Option<u32>,
    pub default_sample_flags: Option<u32>,
}

impl TfhdBox {
    pub fn new(track_id: u32, flags: u32) -> Self {
        Self {
            flags,
            track_id,
            ..Default::default()
        }
    }

    pub fn default_base_is_moof(&self) -> bool {
        self.flags & TFHD_DEFAULT_BASE_IS_MOOF != 0
    }

    pub fn duration_is_empty(&self) -> bool {
        self.flags & TFHD_DURATION_IS_EMPTY != 0
    }
}

impl Mp4Box for TfhdBox {
    const TYPE: BoxType = BoxType::fourcc(b"tfhd");

    fn payload_size(&self) -> u64 {
        let mut size = 8;
        if self.flags & TFHD_BASE_DATA_OFFSET != 0 {
            size += 8;
        }
        for flag in [
            TFHD_SAMPLE_DESCRIPTION_INDEX,
            TFHD_DEFAULT_SAMPLE_DURATION,
            TFHD_DEFAULT_SAMPLE_SIZE,
            TFHD_DEFAULT_SAMPLE_FLAGS,
        ] {
            if self.flags & flag != 0 {
                size += 4;
            }
        }
        size
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&self.flags.to_be_bytes())?;
        w.write_all(&self.track_id.to_be_bytes())?;
        if self.flags & TFHD_BASE_DATA_OFFSET != 0 {
            w.write_all(&self.base_data_offset.unwrap_or(0).to_be_bytes())?;
        }
        if self.flags & TFHD_SAMPLE_DESCRIPTION_INDEX != 0 {
            w.write_all(&self.sample_description_index.unwrap_or(1).to_be_bytes())?;
        }
        if self.flags & TFHD_DEFAULT_SAMPLE_DURATION != 0 {
            w.write_all(&self.default_sample_duration.unwrap_or(0).to_be_bytes())?;
        }
        if self.flags & TFHD_DEFAULT_SAMPLE_SIZE != 0 {
            w.write_all(&self.default_sample_size.unwrap_or(0).to_be_bytes())?;
        }
        if self.flags & TFHD_DEFAULT_SAMPLE_FLAGS != 0 {
            w.write_all(&self.default_sample_flags.unwrap_or(0).to_be_bytes())?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let (_, flags) = r.read_version_flags()?;
        let mut tfhd = TfhdBox::new(r.read_u32()?, flags);
        if flags & TFHD_BASE_DATA_OFFSET != 0 {
            tfhd.base_data_offset = Some(r.read_u64()?);
        }
        if flags & TFHD_SAMPLE_DESCRIPTION_INDEX != 0 {
            tfhd.sample_description_index = Some(r.read_u32()?);
        }
        if flags & TFHD_DEFAULT_SAMPLE_DURATION != 0 {
            tfhd.default_sample_duration = Some(r.read_u32()?);
        }
        if flags & TFHD_DEFAULT_SAMPLE_SIZE != 0 {
            tfhd.default_sample_size = Some(r.read_u32()?);
        }
        if flags & TFHD_DEFAULT_SAMPLE_FLAGS != 0 {
            tfhd.default_sample_flags = Some(r.read_u32()?);
        }
        Ok(tfhd)
    }
}

/// Track fragment decode time, in track timescale
#[derive(Debug, Clone, PartialEq)]
pub struct TfdtBox {
    pub version: u8,
    pub base_media_decode_time: u64,
}

impl TfdtBox {
    pub fn new(base_media_decode_time: u64) -> Self {
        Self {
            version: 1,
            base_media_decode_time,
        }
    }
}

impl Mp4Box for TfdtBox {
    const TYPE: BoxType = BoxType::fourcc(b"tfdt");

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
            w.write_all(&self.base_media_decode_time.to_be_bytes())?;
        } else {
            w.write_all(&(self.base_media_decode_time as u32).to_be_bytes())?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let (version, _) = r.read_version_flags()?;
        let base_media_decode_time = if version == 1 {
            r.read_u64()?
        } else {
            r.read_u32()? as u64
        };
        Ok(Self {
            version,
            base_media_decode_time,
        })
    }
}

/// Track fragment box
#[derive(Debug, Clone, PartialEq)]
pub struct TrafBox {
    pub tfhd: TfhdBox,
    pub tfdt: Option<TfdtBox>,
    pub truns: Vec<TrunBox>,
    pub sdtp: Option<SdtpBox>,
    pub tfxd: Option<TfxdBox>,
    pub tfrf: Option<TfrfBox>,
    pub unknown: Vec<UnknownBox>,
}

impl TrafBox {
    pub fn new(tfhd: TfhdBox) -> Self {
        Self {
            tfhd,
            tfdt: None,
            truns: Vec::new(),
            sdtp: None,
            tfxd: None,
            tfrf: None,
            unknown: Vec::new(),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.truns.iter().map(|t| t.samples.len()).sum()
    }

    /// Offset of the first trun from the start of the traf box.
    pub fn trun_offset(&self) -> u64 {
        8 + self.tfhd.box_size() + self.tfdt.as_ref().map_or(0, |b| b.box_size())
    }
}

impl Mp4Box for TrafBox {
    const TYPE: BoxType = BoxType::fourcc(b"traf");

    fn payload_size(&self) -> u64 {
        self.tfhd.box_size()
            + self.tfdt.as_ref().map_or(0, |b| b.box_size())
            + boxes_size(&self.truns)
            + self.sdtp.as_ref().map_or(0, |b| b.box_size())
            + self.tfxd.as_ref().map_or(0, |b| b.box_size())
            + self.tfrf.as_ref().map_or(0, |b| b.box_size())
            + boxes_size(&self.unknown)
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        self.tfhd.write_box(w)?;
        if let Some(tfdt) = &self.tfdt {
            tfdt.write_box(w)?;
        }
        for trun in &self.truns {
            trun.write_box(w)?;
        }
        if let Some(sdtp) = &self.sdtp {
            sdtp.write_box(w)?;
        }
        if let Some(tfxd) = &self.tfxd {
            tfxd.write_box(w)?;
        }
        if let Some(tfrf) = &self.tfrf {
            tfrf.write_box(w)?;
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
        let mut tfhd = None;
        let mut tfdt = None;
        let mut truns = Vec::new();
        let mut sdtp = None;
        let mut tfxd = None;
        let mut tfrf = None;
        let mut unknown = Vec::new();
        while r.has_child() {
            let header = r.peek()?;
            match header.box_type {
                t if t == TfxdBox::TYPE => tfxd = Some(TfxdBox::read_box(r)?),
                t if t == TfrfBox::TYPE => tfrf = Some(TfrfBox::read_box(r)?),
                t => match &t.code() {
                    b"tfhd" => tfhd = Some(TfhdBox::read_box(r)?),
                    b"tfdt" => tfdt = Some(TfdtBox::read_box(r)?),
                    b"trun" => truns.push(TrunBox::read_box(r)?),
                    b"sdtp" => sdtp = Some(SdtpBox::read_box(r)?),
                    _ => unknown.push(UnknownBox::read_box(r)?),
                },
            }
        }
        Ok(Self {
            tfhd: tfhd.ok_or_else(|| IntegrityError::new("traf box without tfhd"))?,
            tfdt,
            truns,
            sdtp,
            tfxd,
            tfrf,
            unknown,
        })
    }
}

/// Movie fragment box
#[derive(Debug, Clone, PartialEq)]
pub struct MoofBox {
    pub mfhd: MfhdBox,
    pub trafs: Vec<TrafBox>,
    pub unknown: Vec<UnknownBox>,
}

impl Mp4Box for MoofBox {
    const TYPE: BoxType = BoxType::fourcc(b"moof");

    fn payload_size(&self) -> u64 {
        self.mfhd.box_size() + boxes_size(&self.trafs) + boxes_size(&self.unknown)
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        self.mfhd.write_box(w)?;
        for traf in &self.trafs {
            traf.write_box(w)?;
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
        let mut mfhd = None;
        let mut trafs = Vec::new();
        let mut unknown = Vec::new();
        while r.has_child() {
            let header = r.peek()?;
            match &header.box_type.code() {
                b"mfhd" => mfhd = Some(MfhdBox::read_box(r)?),
                b"traf" => trafs.push(TrafBox::read_box(r)?),
                _ => unknown.push(UnknownBox::read_box(r)?),
            }
        }
        Ok(Self {
            mfhd: mfhd.ok_or_else(|| IntegrityError::new("moof box without mfhd"))?,
            trafs,
            unknown,
        })
    }
}
