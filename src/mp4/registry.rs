//! Dispatch of top-level boxes by type tag, and a generic box tree walk.

use crate::errors::MediaRecodeResult;
use crate::mp4::box_reader::BoxReader;
use crate::mp4::ftyp::FtypBox;
use crate::mp4::mdat::MdatExtent;
use crate::mp4::mfra::MfraBox;
use crate::mp4::moof::MoofBox;
use crate::mp4::moov::MoovBox;
use crate::mp4::r#box::{BoxHeader, Mp4Box};
use crate::mp4::unknown::UnknownBox;
use crate::streams::SeekableStream;
use std::fmt;

/// Any box that can appear at the top level of a file
#[derive(Debug, Clone, PartialEq)]
pub enum AnyBox {
    Ftyp(FtypBox),
    Moov(MoovBox),
    Moof(MoofBox),
    Mfra(MfraBox),
    /// Media data is located, not loaded
    Mdat(MdatExtent),
    Unknown(UnknownBox),
}

/// Read the next box, dispatching on the type resolved through `peek`.
pub fn read_any_box<R: SeekableStream>(
    r: &mut BoxReader<R>,
) -> MediaRecodeResult<(BoxHeader, AnyBox)> {
    let header = r.peek()?;
    let parsed = match &header.box_type.code() {
        b"ftyp" => AnyBox::Ftyp(FtypBox::read_box(r)?),
        b"moov" => AnyBox::Moov(MoovBox::read_box(r)?),
        b"moof" => AnyBox::Moof(MoofBox::read_box(r)?),
        b"mfra" => AnyBox::Mfra(MfraBox::read_box(r)?),
        b"mdat" => {
            r.skip_box()?;
            AnyBox::Mdat(MdatExtent::from_header(&header))
        }
        // free, skip, uuid, ...
        _ => AnyBox::Unknown(UnknownBox::read_box(r)?),
    };
    Ok((header, parsed))
}

/// Boxes whose payload is nothing but child boxes.
fn is_container(header: &BoxHeader) -> bool {
    matches!(
        &header.box_type.code(),
        b"moov"
            | b"trak"
            | b"mdia"
            | b"minf"
            | b"dinf"
            | b"stbl"
            | b"edts"
            | b"udta"
            | b"mvex"
            | b"moof"
            | b"traf"
            | b"mfra"
    )
}

/// A box header with the headers of its children
#[derive(Debug, Clone, PartialEq)]
pub struct BoxNode {
    pub header: BoxHeader,
    pub children: Vec<BoxNode>,
}

impl BoxNode {
    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(
            f,
            "{}{} [size: {}, pos: {}-{}]",
            "  ".repeat(depth),
            self.header.box_type,
            self.header.size,
            self.header.offset,
            self.header.end()
        )?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for BoxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

fn walk_scope<R: SeekableStream>(r: &mut BoxReader<R>) -> MediaRecodeResult<Vec<BoxNode>> {
    let mut nodes = Vec::new();
    while r.has_child() {
        let header = r.peek()?;
        let children = if is_container(&header) {
            r.enter()?;
            let children = walk_scope(r)?;
            r.exit()?;
            children
        } else {
            r.skip_box()?;
            Vec::new()
        };
        nodes.push(BoxNode { header, children });
    }
    Ok(nodes)
}

/// Walk every box from the reader's position to the end of the stream, descending into
/// pure container boxes. Payloads are not read.
pub fn walk_boxes<R: SeekableStream>(r: &mut BoxReader<R>) -> MediaRecodeResult<Vec<BoxNode>> {
    walk_scope(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mp4::r#box::{to_bytes, BoxType};
    use std::io::Cursor;

    fn sample_file() -> Vec<u8> {
        let mut data = to_bytes(&FtypBox::mp4()).unwrap();
        data.extend_from_slice(
            &to_bytes(&UnknownBox::new(BoxType::fourcc(b"free"), vec![0; 4])).unwrap(),
        );
        data.extend_from_slice(&[0, 0, 0, 12, b'm', b'd', b'a', b't', 1, 2, 3, 4]);
        data
    }

    #[test]
    fn test_read_any_box_dispatch() {
        let data = sample_file();
        let mut r = BoxReader::new(Cursor::new(data)).unwrap();
        let (_, first) = read_any_box(&mut r).unwrap();
        assert_eq!(first, AnyBox::Ftyp(FtypBox::mp4()));
        let (header, second) = read_any_box(&mut r).unwrap();
        assert!(header.box_type.is(b"free"));
        assert!(matches!(second, AnyBox::Unknown(_)));
        let (header, third) = read_any_box(&mut r).unwrap();
        assert_eq!(
            third,
            AnyBox::Mdat(MdatExtent {
                data_offset: header.offset + 8,
                data_size: 4
            })
        );
        assert!(!r.has_child());
    }

    #[test]
    fn test_walk_boxes_lists_top_level() {
        let data = sample_file();
        let mut r = BoxReader::new(Cursor::new(data)).unwrap();
        let nodes = walk_boxes(&mut r).unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(nodes[2].header.box_type.is(b"mdat"));
        assert!(nodes[0].to_string().starts_with("ftyp [size: "));
    }
}
