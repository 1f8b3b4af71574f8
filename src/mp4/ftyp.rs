use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{BoxHeader, BoxType, FourCC, Mp4Box};
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

/// File type box
#[derive(Debug, Clone, PartialEq)]
pub struct FtypBox {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

impl FtypBox {
    /// Brands for a flat MP4 destination.
    pub fn mp4() -> Self {
        Self {
            major_brand: FourCC::new(b"isom"),
            minor_version: 512,
            compatible_brands: vec![
                FourCC::new(b"isom"),
                FourCC::new(b"iso2"),
                FourCC::new(b"avc1"),
                FourCC::new(b"mp41"),
            ],
        }
    }

    /// Brands for a smooth-streaming (ISMV) destination.
    pub fn smooth() -> Self {
        Self {
            major_brand: FourCC::new(b"isml"),
            minor_version: 1,
            compatible_brands: vec![FourCC::new(b"piff"), FourCC::new(b"iso2")],
        }
    }

    /// True when the major or any compatible brand marks a smooth-streaming file.
    pub fn is_smooth(&self) -> bool {
        let smooth = |b: &FourCC| matches!(&b.0, b"isml" | b"piff");
        smooth(&self.major_brand) || self.compatible_brands.iter().any(smooth)
    }
}

impl Mp4Box for FtypBox {
    const TYPE: BoxType = BoxType::fourcc(b"ftyp");

    fn payload_size(&self) -> u64 {
        8 + 4 * self.compatible_brands.len() as u64
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&self.major_brand.0)?;
        w.write_all(&self.minor_version.to_be_bytes())?;
        for brand in &self.compatible_brands {
            w.write_all(&brand.0)?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        let major_brand = FourCC(r.read_fourcc()?);
        let minor_version = r.read_u32()?;
        let mut compatible_brands = Vec::new();
        while r.remaining() >= 4 {
            compatible_brands.push(FourCC(r.read_fourcc()?));
        }
        Ok(Self {
            major_brand,
            minor_version,
            compatible_brands,
        })
    }
}
