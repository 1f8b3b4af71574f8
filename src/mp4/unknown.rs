use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{BoxHeader, BoxType, Mp4Box, ANY};
use crate::streams::SeekableStream;
use log::debug;
use std::io::{Seek, Write};

/// Opaque box kept verbatim: unrecognised children and codec configuration records
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownBox {
    pub box_type: BoxType,
    pub payload: Vec<u8>,
}

impl UnknownBox {
    pub fn new(box_type: BoxType, payload: Vec<u8>) -> Self {
        Self { box_type, payload }
    }
}

impl Mp4Box for UnknownBox {
    const TYPE: BoxType = BoxType::FourCC(ANY);

    fn box_type(&self) -> BoxType {
        self.box_type
    }

    fn accepts(_box_type: &BoxType) -> bool {
        true
    }

    fn payload_size(&self) -> u64 {
        self.payload.len() as u64
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&self.payload)?;
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        debug!(
            "keeping {} box ({} bytes) at {} as opaque payload",
            header.box_type, header.size, header.offset
        );
        Ok(Self {
            box_type: header.box_type,
            payload: r.read_remaining()?,
        })
    }
}
