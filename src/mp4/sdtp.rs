use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{BoxHeader, BoxType, Mp4Box};
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

/// Key frame: depends on no other sample.
pub const SDTP_KEY_FRAME: u8 = 0x20;
/// Delta frame: depends on others, may be referenced.
pub const SDTP_DELTA_FRAME: u8 = 0x10;
/// B-frame: depends on others, never referenced.
pub const SDTP_B_FRAME: u8 = 0x18;

/// `sample_depends_on` field: 1 depends on others, 2 independent.
pub fn depends_on(flags: u8) -> u8 {
    (flags >> 4) & 0x3
}

/// `sample_is_depended_on` field: 2 means no other sample references this one.
pub fn is_depended_on(flags: u8) -> u8 {
    (flags >> 2) & 0x3
}

pub fn is_disposable(flags: u8) -> bool {
    is_depended_on(flags) == 2
}

/// Independent and disposable samples box, one byte per sample
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SdtpBox {
    pub flags: Vec<u8>,
}

impl SdtpBox {
    pub fn size_for(sample_count: u64) -> u64 {
        12 + sample_count
    }
}

impl Mp4Box for SdtpBox {
    const TYPE: BoxType = BoxType::fourcc(b"sdtp");

    fn payload_size(&self) -> u64 {
        4 + self.flags.len() as u64
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[0u8; 4])?;
        w.write_all(&self.flags)?;
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        r.read_version_flags()?;
        // sample count comes from the box size
        Ok(Self {
            flags: r.read_remaining()?,
        })
    }
}
