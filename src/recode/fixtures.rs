//! In-memory tracks, sources and destinations for recode tests.

use crate::errors::{DomainError, MediaRecodeResult};
use crate::media::{
    CodecDescriptor, DestinationStream, MediaTrack, Slice, SliceCursor, SliceType, SourceStream,
    StreamFormat, TrackInfo, TrackKind,
};
use crate::mp4::r#box::FourCC;
use crate::mp4::stsd::{AudioFields, SampleEntry, VisualFields};
use crate::time::ClockRate;
use std::rc::Rc;

pub const FRAME: u64 = 400_000;
pub const AUDIO_FRAME: u64 = 200_000;

pub fn video_info(id: u32) -> TrackInfo {
    TrackInfo {
        id,
        codec: CodecDescriptor {
            kind: TrackKind::Video,
            entry: SampleEntry::visual(FourCC::new(b"avc1"), VisualFields::new(640, 360), vec![]),
        },
        timescale: 90_000,
        duration: 0,
        language: "und".to_string(),
        handler_name: String::new(),
        width: 640,
        height: 360,
        volume: 0,
    }
}

pub fn audio_info(id: u32) -> TrackInfo {
    TrackInfo {
        id,
        codec: CodecDescriptor {
            kind: TrackKind::Audio,
            entry: SampleEntry::audio(FourCC::new(b"mp4a"), AudioFields::new(2, 48_000), vec![]),
        },
        timescale: 48_000,
        duration: 0,
        language: "eng".to_string(),
        handler_name: String::new(),
        width: 0,
        height: 0,
        volume: 0x0100,
    }
}

pub fn data_info(id: u32) -> TrackInfo {
    let mut info = audio_info(id);
    info.codec.kind = TrackKind::Data;
    info
}

/// `count` frames at 25 fps in groups of `gop`: a key frame, two B-frames, then delta
/// frames. B-frames carry no timestamp.
pub fn video_slices(count: u64, gop: u64) -> Rc<[Slice]> {
    (0..count)
        .map(|index| {
            let slice_type = match index % gop {
                0 => SliceType::KeyFrame,
                1 | 2 => SliceType::BFrame,
                _ => SliceType::DeltaFrame,
            };
            Slice {
                index,
                offset: index * 1000,
                length: 16,
                duration: FRAME,
                timestamp: (slice_type != SliceType::BFrame).then_some(index * FRAME),
                composition: None,
                slice_type,
            }
        })
        .collect::<Vec<_>>()
        .into()
}

pub fn audio_slices(count: u64) -> Rc<[Slice]> {
    (0..count)
        .map(|index| Slice {
            index,
            offset: index * 100,
            length: 8,
            duration: AUDIO_FRAME,
            timestamp: Some(index * AUDIO_FRAME),
            composition: None,
            slice_type: SliceType::Audio,
        })
        .collect::<Vec<_>>()
        .into()
}

#[derive(Debug)]
pub struct MemoryTrack {
    info: TrackInfo,
    slices: Rc<[Slice]>,
}

impl MemoryTrack {
    pub fn new(mut info: TrackInfo, slices: Rc<[Slice]>) -> Self {
        info.duration = slices.iter().map(|s| s.duration).sum();
        Self { info, slices }
    }
}

impl MediaTrack for MemoryTrack {
    fn info(&self) -> &TrackInfo {
        &self.info
    }

    fn cursor(&self) -> SliceCursor {
        SliceCursor::from_slices(Rc::clone(&self.slices))
    }

    fn sync_times(&self) -> Vec<u64> {
        self.slices
            .iter()
            .filter(|s| s.slice_type.is_sync())
            .filter_map(|s| s.timestamp)
            .collect()
    }

    fn sample_count(&self) -> u64 {
        self.slices.len() as u64
    }
}

/// Source whose payloads are the sample index repeated over the sample length
#[derive(Debug, Default)]
pub struct MemorySource {
    pub tracks: Vec<MemoryTrack>,
    pub reads: usize,
}

impl MemorySource {
    pub fn new(tracks: Vec<MemoryTrack>) -> Self {
        Self { tracks, reads: 0 }
    }
}

impl SourceStream for MemorySource {
    fn format(&self) -> StreamFormat {
        StreamFormat::Mp4
    }

    fn is_fragmented(&self) -> bool {
        false
    }

    fn movie_timescale(&self) -> u32 {
        1000
    }

    fn tracks(&self) -> Vec<&dyn MediaTrack> {
        self.tracks.iter().map(|t| t as &dyn MediaTrack).collect()
    }

    fn read_slice(&mut self, slice: &Slice) -> MediaRecodeResult<Vec<u8>> {
        self.reads += 1;
        Ok(vec![slice.index as u8; slice.length as usize])
    }
}

/// Destination that records what it is asked to do
#[derive(Debug)]
pub struct RecordingDestination {
    pub format: StreamFormat,
    pub composition_offsets: bool,
    pub tracks: Vec<TrackInfo>,
    pub clocks: Vec<(u32, ClockRate)>,
    pub writes: Vec<(u32, Slice, Vec<u8>)>,
    pub finalized: bool,
}

impl RecordingDestination {
    pub fn new(format: StreamFormat) -> Self {
        Self {
            format,
            composition_offsets: false,
            tracks: Vec::new(),
            clocks: Vec::new(),
            writes: Vec::new(),
            finalized: false,
        }
    }

    pub fn writes_for(&self, track_id: u32) -> Vec<&Slice> {
        self.writes
            .iter()
            .filter(|(id, _, _)| *id == track_id)
            .map(|(_, slice, _)| slice)
            .collect()
    }
}

impl DestinationStream for RecordingDestination {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn enable_composition_offsets(&mut self) -> MediaRecodeResult<()> {
        if self.format != StreamFormat::Mp4 {
            return Err(DomainError::new("composition offsets need MP4 output").into());
        }
        self.composition_offsets = true;
        Ok(())
    }

    fn add_track(&mut self, info: &TrackInfo) -> MediaRecodeResult<u32> {
        self.tracks.push(info.clone());
        Ok(self.tracks.len() as u32)
    }

    fn select_clock(&mut self, track_id: u32, rate: ClockRate) -> MediaRecodeResult<()> {
        self.clocks.push((track_id, rate));
        Ok(())
    }

    fn write_slice(&mut self, track_id: u32, slice: &Slice, data: &[u8]) -> MediaRecodeResult<()> {
        self.writes.push((track_id, slice.clone(), data.to_vec()));
        Ok(())
    }

    fn data_offset(&self) -> u64 {
        self.writes.iter().map(|(_, _, d)| d.len() as u64).sum()
    }

    fn finalize(&mut self) -> MediaRecodeResult<()> {
        self.finalized = true;
        Ok(())
    }
}
