use crate::mp4::sdtp::{SDTP_B_FRAME, SDTP_DELTA_FRAME, SDTP_KEY_FRAME};
use crate::mp4::trun::{SAMPLE_FLAGS_DELTA, SAMPLE_FLAGS_DISPOSABLE, SAMPLE_FLAGS_SYNC};
use serde::Serialize;

/// What a slice holds, as far as cutting and dependency flags are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SliceType {
    KeyFrame,
    DeltaFrame,
    /// Never referenced by another frame; carries no independent timestamp
    BFrame,
    Audio,
    Data,
}

impl SliceType {
    /// True when the slice can start a decode.
    pub fn is_sync(self) -> bool {
        matches!(self, SliceType::KeyFrame | SliceType::Audio | SliceType::Data)
    }

    /// Byte for the `sdtp` box.
    pub fn sdtp_flags(self) -> u8 {
        match self {
            SliceType::DeltaFrame => SDTP_DELTA_FRAME,
            SliceType::BFrame => SDTP_B_FRAME,
            _ => SDTP_KEY_FRAME,
        }
    }

    /// Sample flags for a track fragment run.
    pub fn fragment_flags(self) -> u32 {
        match self {
            SliceType::DeltaFrame => SAMPLE_FLAGS_DELTA,
            SliceType::BFrame => SAMPLE_FLAGS_DISPOSABLE,
            _ => SAMPLE_FLAGS_SYNC,
        }
    }
}

/// Composition time offset of a slice, in reference units and in the clock of the box
/// it was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionOffset {
    pub reference: i64,
    pub native: i64,
}

/// One sample of a track: where its bytes are and when it plays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    /// Zero-based, track-local
    pub index: u64,
    /// Byte offset in the backing stream
    pub offset: u64,
    pub length: u32,
    /// Reference units
    pub duration: u64,
    /// Decode time in reference units; `None` for B-frames
    pub timestamp: Option<u64>,
    pub composition: Option<CompositionOffset>,
    pub slice_type: SliceType,
}

/// Name used by the sample table for the slices it locates.
pub type StreamDataBlockInfo = Slice;
