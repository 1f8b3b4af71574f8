//! Per-track state of a recode.
//!
//! Every participating track walks its own cursor. Before the window starts the cursor
//! is moved to the first timed sample at or after a sync point and that sample becomes
//! the track's origin; after that, samples are drained segment by segment and rebased so
//! the origin plays at time zero.

use crate::errors::{IntegrityError, MediaRecodeResult};
use crate::media::{MediaTrack, Slice, SliceCursor, TrackInfo};

/// Key-frame times of `track` plus the time of its last timed sample, increasing and
/// without duplicates. The last entry is the terminal sync point.
pub fn sync_points(track: &dyn MediaTrack) -> Vec<u64> {
    let mut points = track.sync_times();
    let mut cursor = track.cursor();
    let mut last = None;
    while let Some(slice) = cursor.advance() {
        if let Some(ts) = slice.timestamp {
            last = Some(ts);
        }
    }
    points.extend(last);
    points.sort_unstable();
    points.dedup();
    points
}

/// Time and index of the first sample a track emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Origin {
    time: u64,
    index: u64,
}

/// One source track being copied to one destination track
#[derive(Debug)]
pub struct TrackSync {
    /// Position of the owning source in the source list
    pub source: usize,
    pub info: TrackInfo,
    pub destination: u32,
    cursor: SliceCursor,
    origin: Option<Origin>,
    samples: u64,
    duration: u64,
    position: Option<u64>,
}

impl TrackSync {
    pub fn new(source: usize, info: TrackInfo, destination: u32, cursor: SliceCursor) -> Self {
        Self {
            source,
            info,
            destination,
            cursor,
            origin: None,
            samples: 0,
            duration: 0,
            position: None,
        }
    }

    /// Skip untimed samples and samples before `sync_point`; the sample left under the
    /// cursor becomes the origin.
    pub fn skip_to(&mut self, sync_point: u64) {
        while let Some(slice) = self.cursor.current() {
            match slice.timestamp {
                Some(ts) if ts >= sync_point => break,
                _ => {
                    self.cursor.advance();
                }
            }
        }
        self.origin = self.cursor.current().and_then(|slice| {
            slice.timestamp.map(|time| Origin {
                time,
                index: slice.index,
            })
        });
    }

    /// Next sample of the segment ending at `sync_point`, as read from the source and as
    /// rebased for the destination. Untimed samples travel with the segment; the terminal
    /// segment takes everything left.
    pub fn next_until(
        &mut self,
        sync_point: u64,
        terminal: bool,
    ) -> MediaRecodeResult<Option<(Slice, Slice)>> {
        let origin = match self.origin {
            Some(origin) => origin,
            None => return Ok(None),
        };
        let take = match self.cursor.current() {
            Some(slice) => terminal || slice.timestamp.map_or(true, |ts| ts <= sync_point),
            None => false,
        };
        if !take {
            return Ok(None);
        }
        let source = match self.cursor.advance() {
            Some(slice) => slice,
            None => return Ok(None),
        };
        let rebased = self.rebase(&source, origin)?;
        self.samples += 1;
        self.duration += source.duration;
        if let Some(ts) = rebased.timestamp {
            self.position = Some(self.position.map_or(ts, |p| p.max(ts)));
        }
        Ok(Some((source, rebased)))
    }

    fn rebase(&self, slice: &Slice, origin: Origin) -> MediaRecodeResult<Slice> {
        let timestamp = match slice.timestamp {
            Some(ts) => Some(ts.checked_sub(origin.time).ok_or_else(|| {
                IntegrityError::new(format!(
                    "track {}: sample {} at {} precedes the origin at {}",
                    self.info.id, slice.index, ts, origin.time
                ))
            })?),
            None => None,
        };
        let index = slice.index.checked_sub(origin.index).ok_or_else(|| {
            IntegrityError::new(format!(
                "track {}: sample {} precedes the origin sample {}",
                self.info.id, slice.index, origin.index
            ))
        })?;
        Ok(Slice {
            index,
            timestamp,
            ..slice.clone()
        })
    }

    /// Samples emitted so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Sum of emitted durations, reference units.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Latest rebased timestamp emitted.
    pub fn position(&self) -> Option<u64> {
        self.position
    }

    pub fn origin_time(&self) -> Option<u64> {
        self.origin.map(|o| o.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::SliceType;
    use crate::recode::fixtures::{video_info, video_slices, MemoryTrack};
    use std::rc::Rc;

    fn gop_track() -> MemoryTrack {
        // K B B D D K B B D D ... at 25 fps
        MemoryTrack::new(video_info(1), video_slices(15, 5))
    }

    #[test]
    fn test_sync_points_end_with_last_timed_sample() {
        let track = gop_track();
        assert_eq!(
            sync_points(&track),
            vec![0, 2_000_000, 4_000_000, 5_600_000]
        );
    }

    #[test]
    fn test_sync_points_deduplicate_last_key_frame() {
        let slices = video_slices(6, 5);
        let track = MemoryTrack::new(video_info(1), slices);
        // last timed sample is the key frame at 2 s
        assert_eq!(sync_points(&track), vec![0, 2_000_000]);
    }

    #[test]
    fn test_skip_sets_origin_on_timed_sample() {
        let track = gop_track();
        let mut sync = TrackSync::new(0, video_info(1), 1, track.cursor());
        sync.skip_to(1_000_000);
        // first timed sample at or after 1 s is the delta frame at 1.2 s
        assert_eq!(sync.origin_time(), Some(1_200_000));
        sync.skip_to(2_000_000);
        assert_eq!(sync.origin_time(), Some(2_000_000));
    }

    #[test]
    fn test_drain_rebases_and_keeps_b_frames() {
        let track = gop_track();
        let mut sync = TrackSync::new(0, video_info(1), 3, track.cursor());
        sync.skip_to(2_000_000);
        let mut drained = Vec::new();
        while let Some((source, rebased)) = sync.next_until(4_000_000, false).unwrap() {
            drained.push((source.index, rebased));
        }
        let indices: Vec<u64> = drained.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(drained[0].1.index, 0);
        assert_eq!(drained[0].1.timestamp, Some(0));
        assert_eq!(drained[1].1.slice_type, SliceType::BFrame);
        assert_eq!(drained[1].1.timestamp, None);
        assert_eq!(drained[5].1.timestamp, Some(2_000_000));
        assert_eq!(sync.samples(), 8);
        assert_eq!(sync.duration(), 8 * 400_000);
        assert_eq!(sync.position(), Some(2_000_000));
    }

    #[test]
    fn test_terminal_segment_takes_everything() {
        let track = gop_track();
        let mut sync = TrackSync::new(0, video_info(1), 1, track.cursor());
        sync.skip_to(0);
        let mut count = 0;
        while sync.next_until(0, true).unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 15);
    }

    #[test]
    fn test_exhausted_track_emits_nothing() {
        let track = gop_track();
        let mut sync = TrackSync::new(0, video_info(1), 1, track.cursor());
        sync.skip_to(60_000_000);
        assert_eq!(sync.origin_time(), None);
        assert!(sync.next_until(u64::MAX, true).unwrap().is_none());
    }

    #[test]
    fn test_sample_before_origin_is_an_integrity_error() {
        let mut slices = video_slices(5, 5).to_vec();
        // decode times go backwards after the origin
        slices[4].timestamp = Some(100);
        let track = MemoryTrack::new(video_info(1), Rc::from(slices));
        let mut sync = TrackSync::new(0, video_info(1), 1, track.cursor());
        sync.skip_to(1_000_000);
        assert_eq!(sync.origin_time(), Some(1_200_000));
        assert!(sync.next_until(u64::MAX, true).unwrap().is_some());
        assert!(sync.next_until(u64::MAX, true).is_err());
    }
}
