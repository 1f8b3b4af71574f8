use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{BoxHeader, BoxType, FourCC, Mp4Box};
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

/// Handler reference box
#[derive(Debug, Clone, PartialEq)]
pub struct HdlrBox {
    pub handler_type: FourCC,
    pub name: String,
}

impl HdlrBox {
    pub fn new(handler_type: FourCC, name: &str) -> Self {
        Self {
            handler_type,
            name: name.to_string(),
        }
    }
}

impl Mp4Box for HdlrBox {
    const TYPE: BoxType = BoxType::fourcc(b"hdlr");

    fn payload_size(&self) -> u64 {
        4 + 4 + 4 + 12 + self.name.len() as u64 + 1
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[0u8; 8])?;
        w.write_all(&self.handler_type.0)?;
        w.write_all(&[0u8; 12])?;
        w.write_all(self.name.as_bytes())?;
        w.write_all(&[0])?;
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        r.read_version_flags()?;
        r.read_u32()?;
        let handler_type = FourCC(r.read_fourcc()?);
        r.read_bytes(12)?;
        let name = r.read_cstring()?;
        // QuickTime writers pad the name; anything past the terminator is ignored
        r.skip_remaining()?;
        Ok(Self { handler_type, name })
    }
}
