//! Sample description box and its sample entries.
//!
//! Sample entries are kept structurally: the fixed visual or audio fields are decoded and
//! the child boxes (codec configuration, pixel aspect, bitrate, ...) are kept opaque so an
//! entry can be copied from a source to a destination untouched.

use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::r#box::{boxes_size, BoxHeader, BoxType, FourCC, Mp4Box};
use crate::mp4::unknown::UnknownBox;
use crate::streams::SeekableStream;
use std::io::{Seek, Write};

/// Configuration record boxes that carry codec private data.
const CONFIG_BOXES: [&[u8; 4]; 8] = [
    b"avcC", b"hvcC", b"av1C", b"vpcC", b"esds", b"dOps", b"dac3", b"dec3",
];

#[derive(Debug, Clone, PartialEq)]
pub struct VisualFields {
    pub width: u16,
    pub height: u16,
    pub horizontal_resolution: u32,
    pub vertical_resolution: u32,
    pub frame_count: u16,
    pub compressor_name: String,
    pub depth: u16,
}

impl VisualFields {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            horizontal_resolution: 0x0048_0000,
            vertical_resolution: 0x0048_0000,
            frame_count: 1,
            compressor_name: String::new(),
            depth: 0x0018,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioFields {
    /// QuickTime sound description version (0, 1 or 2)
    pub version: u16,
    pub channel_count: u16,
    pub sample_size: u16,
    /// 16.16 fixed point
    pub sample_rate: u32,
    /// Extra fields of QuickTime v1/v2 sound descriptions, kept verbatim
    pub extension: Vec<u8>,
}

impl AudioFields {
    pub fn new(channel_count: u16, sample_rate: u32) -> Self {
        Self {
            version: 0,
            channel_count,
            sample_size: 16,
            sample_rate: sample_rate << 16,
            extension: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryFields {
    Visual(VisualFields),
    Audio(AudioFields),
    /// Anything else: bytes after the data reference index
    Other(Vec<u8>),
}

/// One sample entry: codec format tag, fixed fields and child boxes
#[derive(Debug, Clone, PartialEq)]
pub struct SampleEntry {
    pub format: FourCC,
    pub data_reference_index: u16,
    pub fields: EntryFields,
    pub children: Vec<UnknownBox>,
}

fn is_visual(format: &FourCC) -> bool {
    matches!(
        &format.0,
        b"avc1" | b"avc3" | b"hev1" | b"hvc1" | b"mp4v" | b"av01" | b"vp08" | b"vp09" | b"encv"
    )
}

fn is_audio(format: &FourCC) -> bool {
    matches!(
        &format.0,
        b"mp4a" | b"ac-3" | b"ec-3" | b"Opus" | b"fLaC" | b"enca" | b"alac" | b"samr"
    )
}

impl SampleEntry {
    pub fn visual(format: FourCC, fields: VisualFields, children: Vec<UnknownBox>) -> Self {
        Self {
            format,
            data_reference_index: 1,
            fields: EntryFields::Visual(fields),
            children,
        }
    }

    pub fn audio(format: FourCC, fields: AudioFields, children: Vec<UnknownBox>) -> Self {
        Self {
            format,
            data_reference_index: 1,
            fields: EntryFields::Audio(fields),
            children,
        }
    }

    /// Payload of the codec configuration child (avcC, esds, ...), if any.
    pub fn codec_private(&self) -> Option<&[u8]> {
        self.children
            .iter()
            .find(|c| CONFIG_BOXES.iter().any(|t| c.box_type.is(t)))
            .map(|c| c.payload.as_slice())
    }

    pub fn child(&self, code: &[u8; 4]) -> Option<&UnknownBox> {
        self.children.iter().find(|c| c.box_type.is(code))
    }

    /// Human readable codec name.
    pub fn codec_name(&self) -> String {
        match &self.format.0 {
            b"avc1" | b"avc3" => "H.264/AVC".to_string(),
            b"hev1" | b"hvc1" => "H.265/HEVC".to_string(),
            b"mp4v" => "MPEG-4 Visual".to_string(),
            b"av01" => "AV1".to_string(),
            b"vp09" => "VP9".to_string(),
            b"mp4a" => "AAC".to_string(),
            b"ac-3" => "AC-3".to_string(),
            b"ec-3" => "E-AC-3".to_string(),
            b"Opus" => "Opus".to_string(),
            b"tx3g" => "3GPP Timed Text".to_string(),
            b"wvtt" => "WebVTT".to_string(),
            b"stpp" => "XML Subtitle".to_string(),
            _ => self.format.to_string(),
        }
    }

    fn fields_size(&self) -> u64 {
        match &self.fields {
            EntryFields::Visual(_) => 70,
            EntryFields::Audio(a) => 20 + a.extension.len() as u64,
            EntryFields::Other(data) => data.len() as u64,
        }
    }

    pub fn box_size(&self) -> u64 {
        BoxHeader::for_payload(
            BoxType::FourCC(self.format),
            8 + self.fields_size() + boxes_size(&self.children),
        )
        .size
    }

    pub fn write<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.begin(BoxType::FourCC(self.format), self.box_size())?;
        w.write_all(&[0u8; 6])?;
        w.write_all(&self.data_reference_index.to_be_bytes())?;
        match &self.fields {
            EntryFields::Visual(v) => {
                w.write_all(&[0u8; 16])?;
                w.write_all(&v.width.to_be_bytes())?;
                w.write_all(&v.height.to_be_bytes())?;
                w.write_all(&v.horizontal_resolution.to_be_bytes())?;
                w.write_all(&v.vertical_resolution.to_be_bytes())?;
                w.write_all(&[0u8; 4])?;
                w.write_all(&v.frame_count.to_be_bytes())?;
                // Pascal string in a 32-byte field
                let name = v.compressor_name.as_bytes();
                let n = name.len().min(31);
                let mut field = [0u8; 32];
                field[0] = n as u8;
                field[1..=n].copy_from_slice(&name[..n]);
                w.write_all(&field)?;
                w.write_all(&v.depth.to_be_bytes())?;
                w.write_all(&(-1i16).to_be_bytes())?;
            }
            EntryFields::Audio(a) => {
                w.write_all(&a.version.to_be_bytes())?;
                w.write_all(&[0u8; 6])?;
                w.write_all(&a.channel_count.to_be_bytes())?;
                w.write_all(&a.sample_size.to_be_bytes())?;
                w.write_all(&[0u8; 4])?;
                w.write_all(&a.sample_rate.to_be_bytes())?;
                w.write_all(&a.extension)?;
            }
            EntryFields::Other(data) => w.write_all(data)?,
        }
        for child in &self.children {
            child.write_box(w)?;
        }
        w.end()?;
        Ok(())
    }

    pub fn read<R: SeekableStream>(r: &mut BoxReader<R>) -> MediaRecodeResult<Self> {
        let header = r.enter()?;
        r.tolerate_legacy_size();
        let format = FourCC(header.box_type.code());
        r.read_bytes(6)?;
        let data_reference_index = r.read_u16()?;
        let fields = if is_visual(&format) {
            r.read_bytes(16)?;
            let width = r.read_u16()?;
            let height = r.read_u16()?;
            let horizontal_resolution = r.read_u32()?;
            let vertical_resolution = r.read_u32()?;
            r.read_u32()?;
            let frame_count = r.read_u16()?;
            let name = r.read_bytes(32)?;
            let n = (name[0] as usize).min(31);
            let compressor_name = String::from_utf8_lossy(&name[1..=n]).into_owned();
            let depth = r.read_u16()?;
            r.read_i16()?;
            EntryFields::Visual(VisualFields {
                width,
                height,
                horizontal_resolution,
                vertical_resolution,
                frame_count,
                compressor_name,
                depth,
            })
        } else if is_audio(&format) {
            let version = r.read_u16()?;
            r.read_bytes(6)?;
            let channel_count = r.read_u16()?;
            let sample_size = r.read_u16()?;
            r.read_u32()?;
            let sample_rate = r.read_u32()?;
            let extension = match version {
                1 => r.read_bytes(16)?,
                2 => r.read_bytes(36)?,
                _ => Vec::new(),
            };
            EntryFields::Audio(AudioFields {
                version,
                channel_count,
                sample_size,
                sample_rate,
                extension,
            })
        } else {
            EntryFields::Other(r.read_remaining()?)
        };
        let mut children = Vec::new();
        while r.has_child() {
            children.push(UnknownBox::read_box(r)?);
        }
        r.exit()?;
        Ok(Self {
            format,
            data_reference_index,
            fields,
            children,
        })
    }
}

/// Sample description box
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StsdBox {
    pub entries: Vec<SampleEntry>,
}

impl Mp4Box for StsdBox {
    const TYPE: BoxType = BoxType::fourcc(b"stsd");

    fn payload_size(&self) -> u64 {
        8 + self.entries.iter().map(SampleEntry::box_size).sum::<u64>()
    }

    fn write_payload<W: Write + Seek>(&self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        w.write_all(&[0u8; 4])?;
        w.write_all(&(self.entries.len() as u32).to_be_bytes())?;
        for entry in &self.entries {
            entry.write(w)?;
        }
        Ok(())
    }

    fn read_payload<R: SeekableStream>(
        r: &mut BoxReader<R>,
        _header: &BoxHeader,
    ) -> MediaRecodeResult<Self> {
        r.tolerate_legacy_size();
        r.read_version_flags()?;
        let count = r.read_u32()?;
        let mut entries = Vec::with_capacity(count.min(16) as usize);
        for _ in 0..count {
            if !r.has_child() {
                break;
            }
            entries.push(SampleEntry::read(r)?);
        }
        Ok(Self { entries })
    }
}
