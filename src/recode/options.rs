use crate::errors::{DomainError, MediaRecodeResult};
use crate::media::container::SinkOptions;
use crate::time::ClockRate;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shortest window a recode accepts, reference units (1 s).
pub const DEFAULT_MIN_WINDOW: u64 = 10_000_000;

/// Which kinds of tracks take part in a recode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TrackSelection {
    #[default]
    All,
    AudioOnly,
    VideoOnly,
}

/// Parameters of one recode run. Times are reference units.
#[derive(Debug, Clone)]
pub struct RecodeOptions {
    pub start: u64,
    pub end: u64,
    /// Video track that drives synchronization; the first video track when `None`
    pub video_track: Option<u32>,
    pub selection: TrackSelection,
    /// Write composition offsets (`ctts`); flat MP4 output only
    pub composition_offsets: bool,
    /// Retime video tracks to this clock
    pub clock: Option<ClockRate>,
    pub min_window: u64,
    pub sink: SinkOptions,
    /// Checked between sync points; a set flag stops the run without finalizing
    pub cancel: Option<Arc<AtomicBool>>,
}

impl RecodeOptions {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            video_track: None,
            selection: TrackSelection::All,
            composition_offsets: false,
            clock: None,
            min_window: DEFAULT_MIN_WINDOW,
            sink: SinkOptions::default(),
            cancel: None,
        }
    }

    pub fn with_video_track(mut self, track_id: u32) -> Self {
        self.video_track = Some(track_id);
        self
    }

    pub fn with_selection(mut self, selection: TrackSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_composition_offsets(mut self, enabled: bool) -> Self {
        self.composition_offsets = enabled;
        self
    }

    pub fn with_clock(mut self, clock: ClockRate) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_min_window(mut self, min_window: u64) -> Self {
        self.min_window = min_window;
        self
    }

    pub fn with_sink(mut self, sink: SinkOptions) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Length of the requested window.
    pub fn window(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    /// Reject windows that are empty or shorter than `min_window`.
    pub fn validate(&self) -> MediaRecodeResult<()> {
        if self.end <= self.start {
            return Err(DomainError::new(format!(
                "window end {} is not after its start {}",
                self.end, self.start
            ))
            .into());
        }
        if self.window() < self.min_window {
            return Err(DomainError::new(format!(
                "window of {} is shorter than the minimum of {}",
                self.window(),
                self.min_window
            ))
            .into());
        }
        if self.video_track.is_some() && self.selection == TrackSelection::AudioOnly {
            return Err(DomainError::new("a video track was named for an audio-only recode").into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MediaRecodeError;

    #[test]
    fn test_window_validation() {
        assert!(RecodeOptions::new(0, 10_000_000).validate().is_ok());
        assert!(matches!(
            RecodeOptions::new(0, 9_999_999).validate(),
            Err(MediaRecodeError::Domain(_))
        ));
        assert!(RecodeOptions::new(5, 5).validate().is_err());
        assert!(RecodeOptions::new(20, 10).validate().is_err());
        assert!(RecodeOptions::new(0, 100).with_min_window(100).validate().is_ok());
    }

    #[test]
    fn test_audio_only_rejects_video_track() {
        let options = RecodeOptions::new(0, 20_000_000)
            .with_selection(TrackSelection::AudioOnly)
            .with_video_track(1);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let options = RecodeOptions::new(0, 1).with_cancel_flag(Arc::clone(&flag));
        assert!(!options.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(options.is_cancelled());
    }
}
