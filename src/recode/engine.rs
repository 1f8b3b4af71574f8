//! Key-frame synchronized copy of a time window from one or more sources into one
//! destination.
//!
//! The driver track (the chosen video track, else the first audio track) supplies the
//! sync points. While the previous sync point is still before the window start, every
//! track skips forward to the current one; after that every track drains the samples of
//! each segment, rebased to its own origin, until a sync point past the window end has
//! been passed.

use crate::errors::{DomainError, MediaRecodeResult};
use crate::media::{DestinationStream, SliceCursor, SourceStream, TrackInfo, TrackKind};
use crate::recode::options::{RecodeOptions, TrackSelection};
use crate::recode::progress::ProgressSink;
use crate::recode::sync::{sync_points, TrackSync};
use log::{debug, info, warn};
use serde::Serialize;

/// How a recode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecodeOutcome {
    /// Samples were copied and the destination finalized
    Finalized,
    /// The window selected no samples; the destination was left untouched
    EmptySelection,
    /// Stopped on request before finalizing
    Cancelled,
}

/// What was copied for one track
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecodedTrack {
    /// Position of the source in the list passed to [`recode`]
    pub source: usize,
    pub source_track: u32,
    pub destination_track: u32,
    pub kind: TrackKind,
    pub samples: u64,
    /// Reference units
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecodeSummary {
    pub outcome: RecodeOutcome,
    pub tracks: Vec<RecodedTrack>,
    /// Last fraction reported
    pub progress: f64,
}

impl RecodeSummary {
    pub fn samples(&self) -> u64 {
        self.tracks.iter().map(|t| t.samples).sum()
    }
}

struct Selected {
    source: usize,
    info: TrackInfo,
}

struct Selection {
    tracks: Vec<Selected>,
    sync_points: Vec<u64>,
}

fn participates(info: &TrackInfo, options: &RecodeOptions) -> bool {
    match info.kind() {
        TrackKind::Video => {
            options.selection != TrackSelection::AudioOnly
                && options.video_track.map_or(true, |id| id == info.id)
        }
        TrackKind::Audio => options.selection != TrackSelection::VideoOnly,
        TrackKind::Data => {
            debug!("track {}: data tracks are not recoded", info.id);
            false
        }
    }
}

fn select(
    sources: &[&mut dyn SourceStream],
    options: &RecodeOptions,
) -> MediaRecodeResult<Selection> {
    if let Some(id) = options.video_track {
        let found = sources
            .iter()
            .flat_map(|s| s.tracks())
            .any(|t| t.info().id == id && t.info().is_video());
        if !found {
            return Err(DomainError::new(format!("no video track with id {}", id)).into());
        }
    }

    let mut tracks = Vec::new();
    let mut driver: Option<(usize, u32, TrackKind)> = None;
    for (index, source) in sources.iter().enumerate() {
        for track in source.tracks() {
            let info = track.info();
            if !participates(info, options) {
                continue;
            }
            let replaces = match driver {
                None => true,
                Some((_, _, kind)) => kind != TrackKind::Video && info.is_video(),
            };
            if replaces {
                driver = Some((index, info.id, info.kind()));
            }
            tracks.push(Selected {
                source: index,
                info: info.clone(),
            });
        }
    }

    let (source, id, _) =
        driver.ok_or_else(|| DomainError::new("no tracks selected for recoding"))?;
    let sync_points = sources[source]
        .track(id)
        .map(|t| sync_points(t))
        .unwrap_or_default();
    info!(
        "{} tracks selected, track {} of source {} drives {} sync points",
        tracks.len(),
        id,
        source,
        sync_points.len()
    );
    Ok(Selection {
        tracks,
        sync_points,
    })
}

fn cursor_for(
    sources: &[&mut dyn SourceStream],
    selected: &Selected,
) -> MediaRecodeResult<SliceCursor> {
    sources[selected.source]
        .track(selected.info.id)
        .map(|t| t.cursor())
        .ok_or_else(|| {
            DomainError::new(format!("track {} disappeared from its source", selected.info.id))
                .into()
        })
}

fn fraction(tracks: &[TrackSync], window: u64) -> f64 {
    let position = tracks.iter().filter_map(|t| t.position()).max().unwrap_or(0);
    if window == 0 {
        return 0.0;
    }
    (position as f64 / window as f64).clamp(0.0, 1.0)
}

fn summarize(tracks: &[TrackSync], outcome: RecodeOutcome, progress: f64) -> RecodeSummary {
    RecodeSummary {
        outcome,
        tracks: tracks
            .iter()
            .map(|t| RecodedTrack {
                source: t.source,
                source_track: t.info.id,
                destination_track: t.destination,
                kind: t.info.kind(),
                samples: t.samples(),
                duration: t.duration(),
            })
            .collect(),
        progress,
    }
}

/// Copy the window `[options.start, options.end]` of the selected tracks of `sources`
/// into `destination`.
///
/// Nothing is written to the destination when the window selects no samples; the
/// outcome is then [`RecodeOutcome::EmptySelection`] and the caller decides what to do
/// with the output.
pub fn recode(
    sources: &mut [&mut dyn SourceStream],
    destination: &mut dyn DestinationStream,
    options: &RecodeOptions,
    progress: &mut dyn ProgressSink,
) -> MediaRecodeResult<RecodeSummary> {
    options.validate()?;
    let selection = select(sources, options)?;

    if options.composition_offsets {
        destination.enable_composition_offsets()?;
    }
    let mut tracks = Vec::with_capacity(selection.tracks.len());
    for selected in &selection.tracks {
        let cursor = cursor_for(sources, selected)?;
        let destination_id = destination.add_track(&selected.info)?;
        if let Some(clock) = options.clock.filter(|_| selected.info.is_video()) {
            destination.select_clock(destination_id, clock)?;
        }
        debug!(
            "source {} track {} -> destination track {}",
            selected.source, selected.info.id, destination_id
        );
        tracks.push(TrackSync::new(
            selected.source,
            selected.info.clone(),
            destination_id,
            cursor,
        ));
    }

    let points = &selection.sync_points;
    let window = options.window();
    let mut prev: Option<u64> = None;
    let mut reported = 0.0;
    for (i, &sync_point) in points.iter().enumerate() {
        if options.is_cancelled() {
            warn!("recode cancelled at sync point {}", sync_point);
            return Ok(summarize(&tracks, RecodeOutcome::Cancelled, reported));
        }
        if prev.map_or(false, |p| p > options.end) && sync_point > options.end {
            break;
        }
        if prev.map_or(true, |p| options.start > p) {
            for track in tracks.iter_mut() {
                track.skip_to(sync_point);
            }
            reported = 0.0;
        } else {
            let terminal = i + 1 == points.len();
            for track in tracks.iter_mut() {
                while let Some((source, rebased)) = track.next_until(sync_point, terminal)? {
                    let data = sources[track.source].read_slice(&source)?;
                    destination.write_slice(track.destination, &rebased, &data)?;
                }
            }
            reported = fraction(&tracks, window);
        }
        progress.report(reported);
        prev = Some(sync_point);
    }

    if tracks.iter().all(|t| t.samples() == 0) {
        info!("window selects no samples, nothing written");
        progress.report(0.0);
        return Ok(summarize(&tracks, RecodeOutcome::EmptySelection, 0.0));
    }

    destination.finalize()?;
    progress.report(1.0);
    for track in &tracks {
        info!(
            "track {}: {} samples copied to track {}",
            track.info.id,
            track.samples(),
            track.destination
        );
    }
    Ok(summarize(&tracks, RecodeOutcome::Finalized, 1.0))
}
