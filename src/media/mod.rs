//! Container-independent view of tracks and streams.
//!
//! Sources expose tracks as cursors over [`Slice`]s and hand out payload bytes on
//! request; destinations accept slices track by track and build whatever container
//! structure their format needs.

pub mod slice;
pub use slice::{CompositionOffset, Slice, SliceType, StreamDataBlockInfo};
pub mod track;
pub use track::{CodecDescriptor, SliceCursor, TrackInfo, TrackKind};

pub mod container;
pub use container::{create_destination, open_source, open_source_from, SinkOptions, StreamFormat};
pub mod describe;
pub use describe::{describe, StreamSummary, TrackSummary};
pub mod fragmented_source;
pub use fragmented_source::{FragmentTrack, FragmentedSource};
pub mod mp4_sink;
pub use mp4_sink::Mp4Sink;
pub mod mp4_source;
pub use mp4_source::{Mp4Source, Mp4Track};
pub mod smooth_sink;
pub use smooth_sink::SmoothSink;


use crate::errors::{DomainError, MediaRecodeResult};
use crate::time::ClockRate;

/// One track of a source stream
pub trait MediaTrack {
    fn info(&self) -> &TrackInfo;

    /// A fresh cursor positioned on the first slice.
    fn cursor(&self) -> SliceCursor;

    /// Decode times of the key frames, increasing.
    fn sync_times(&self) -> Vec<u64>;

    fn sample_count(&self) -> u64;
}

/// A container that can be read track by track
pub trait SourceStream {
    fn format(&self) -> StreamFormat;

    fn is_fragmented(&self) -> bool;

    fn movie_timescale(&self) -> u32;

    fn tracks(&self) -> Vec<&dyn MediaTrack>;

    /// Duration of the longest track, in reference units.
    fn duration(&self) -> u64 {
        self.tracks()
            .iter()
            .map(|t| t.info().duration)
            .max()
            .unwrap_or(0)
    }

    fn track(&self, track_id: u32) -> Option<&dyn MediaTrack> {
        self.tracks().into_iter().find(|t| t.info().id == track_id)
    }

    /// Payload bytes of `slice`.
    fn read_slice(&mut self, slice: &Slice) -> MediaRecodeResult<Vec<u8>>;
}

/// A container being written
pub trait DestinationStream {
    fn format(&self) -> StreamFormat;

    /// Record composition offsets for every track. Only flat MP4 output supports them.
    fn enable_composition_offsets(&mut self) -> MediaRecodeResult<()> {
        Err(DomainError::new(format!(
            "composition offsets are not supported for {} output",
            self.format()
        ))
        .into())
    }

    /// Declare a track shaped like `info`; returns the destination track id.
    fn add_track(&mut self, info: &TrackInfo) -> MediaRecodeResult<u32>;

    /// Retime a destination track to `rate` instead of its native clock. Must happen
    /// before its first slice.
    fn select_clock(&mut self, track_id: u32, rate: ClockRate) -> MediaRecodeResult<()>;

    fn write_slice(&mut self, track_id: u32, slice: &Slice, data: &[u8])
        -> MediaRecodeResult<()>;

    /// Offset at which the next media byte will land.
    fn data_offset(&self) -> u64;

    /// Write the trailing structures. Fails when called twice.
    fn finalize(&mut self) -> MediaRecodeResult<()>;
}
