//! Reader for flat (non-fragmented) MP4 files.

use crate::errors::{IntegrityError, MediaRecodeResult};
use crate::media::container::StreamFormat;
use crate::media::slice::Slice;
use crate::media::track::{CodecDescriptor, SliceCursor, TrackInfo, TrackKind};
use crate::media::{MediaTrack, SourceStream};
use crate::mp4::box_reader::BoxReader;
use crate::mp4::ftyp::FtypBox;
use crate::mp4::mdat::MdatExtent;
use crate::mp4::moov::MoovBox;
use crate::mp4::r#box::BoxHeader;
use crate::mp4::registry::{read_any_box, AnyBox};
use crate::mp4::sample_table::SampleTable;
use crate::mp4::stsd::EntryFields;
use crate::mp4::trak::TrakBox;
use crate::streams::SeekableStream;
use log::debug;
use std::rc::Rc;

/// Static description of a `trak`, with `duration` in reference units.
pub(crate) fn track_info(trak: &TrakBox, duration: u64) -> MediaRecodeResult<TrackInfo> {
    let kind = TrackKind::from_handler(&trak.handler());
    let entry = trak.sample_entry().cloned().ok_or_else(|| {
        IntegrityError::new(format!("track {} has no sample description", trak.track_id()))
    })?;
    let (width, height) = match &entry.fields {
        EntryFields::Visual(v) if trak.tkhd.width == 0 => (v.width as u32, v.height as u32),
        _ => (trak.tkhd.pixel_width(), trak.tkhd.pixel_height()),
    };
    Ok(TrackInfo {
        id: trak.track_id(),
        codec: CodecDescriptor { kind, entry },
        timescale: trak.timescale(),
        duration,
        language: trak.mdia.mdhd.language.clone(),
        handler_name: trak.mdia.hdlr.name.clone(),
        width,
        height,
        volume: trak.tkhd.volume,
    })
}

/// A track whose samples are described by its sample table
#[derive(Debug)]
pub struct Mp4Track {
    info: TrackInfo,
    table: Rc<SampleTable>,
}

impl Mp4Track {
    pub fn new(trak: &TrakBox) -> MediaRecodeResult<Self> {
        let kind = TrackKind::from_handler(&trak.handler());
        let table = SampleTable::new(trak.stbl(), trak.timescale(), kind)?;
        let info = track_info(trak, table.duration())?;
        debug!(
            "track {}: {} {} samples, timescale {}",
            info.id,
            table.sample_count(),
            info.kind(),
            info.timescale
        );
        Ok(Self {
            info,
            table: Rc::new(table),
        })
    }

    pub fn table(&self) -> &SampleTable {
        &self.table
    }

    /// Samples of `[start, end]` widened to key-frame boundaries.
    pub fn locate_samples(&self, start: u64, end: u64) -> Vec<Slice> {
        self.table.locate_samples(start, end)
    }
}

impl MediaTrack for Mp4Track {
    fn info(&self) -> &TrackInfo {
        &self.info
    }

    fn cursor(&self) -> SliceCursor {
        let table = Rc::clone(&self.table);
        SliceCursor::new(Rc::new(move || {
            Box::new(table.iter()) as Box<dyn Iterator<Item = Slice>>
        }))
    }

    fn sync_times(&self) -> Vec<u64> {
        self.table.sync_times()
    }

    fn sample_count(&self) -> u64 {
        self.table.sample_count()
    }
}

/// A flat MP4 file: one `moov` describing samples stored in one or more `mdat` boxes
pub struct Mp4Source<R> {
    reader: BoxReader<R>,
    ftyp: Option<FtypBox>,
    movie_timescale: u32,
    tracks: Vec<Mp4Track>,
    mdats: Vec<MdatExtent>,
}

impl<R: SeekableStream> Mp4Source<R> {
    pub fn open(stream: R) -> MediaRecodeResult<Self> {
        let mut reader = BoxReader::new(stream)?;
        let mut boxes = Vec::new();
        while reader.has_child() {
            boxes.push(read_any_box(&mut reader)?);
        }
        Self::from_boxes(reader, boxes)
    }

    /// Build from top-level boxes already read from `reader`.
    pub fn from_boxes(
        reader: BoxReader<R>,
        boxes: Vec<(BoxHeader, AnyBox)>,
    ) -> MediaRecodeResult<Self> {
        let mut ftyp = None;
        let mut moov: Option<MoovBox> = None;
        let mut mdats = Vec::new();
        for (_, b) in boxes {
            match b {
                AnyBox::Ftyp(b) => ftyp = Some(b),
                AnyBox::Moov(b) => moov = Some(b),
                AnyBox::Mdat(extent) => mdats.push(extent),
                _ => {}
            }
        }
        let moov = moov.ok_or_else(|| IntegrityError::new("no moov box found"))?;
        let tracks = moov
            .traks
            .iter()
            .map(Mp4Track::new)
            .collect::<MediaRecodeResult<Vec<_>>>()?;
        Ok(Self {
            reader,
            ftyp,
            movie_timescale: moov.mvhd.timescale,
            tracks,
            mdats,
        })
    }

    pub fn ftyp(&self) -> Option<&FtypBox> {
        self.ftyp.as_ref()
    }

    pub fn mp4_tracks(&self) -> &[Mp4Track] {
        &self.tracks
    }
}

impl<R: SeekableStream> SourceStream for Mp4Source<R> {
    fn format(&self) -> StreamFormat {
        StreamFormat::Mp4
    }

    fn is_fragmented(&self) -> bool {
        false
    }

    fn movie_timescale(&self) -> u32 {
        self.movie_timescale
    }

    fn tracks(&self) -> Vec<&dyn MediaTrack> {
        self.tracks.iter().map(|t| t as &dyn MediaTrack).collect()
    }

    fn read_slice(&mut self, slice: &Slice) -> MediaRecodeResult<Vec<u8>> {
        let len = slice.length as u64;
        if !self.mdats.is_empty() && !self.mdats.iter().any(|m| m.contains(slice.offset, len)) {
            return Err(IntegrityError::new(format!(
                "sample {} at {}+{} lies outside every mdat box",
                slice.index, slice.offset, len
            ))
            .into());
        }
        self.reader.read_at(slice.offset, len)
    }
}
