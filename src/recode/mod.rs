//! Cutting a time window out of one or more sources into a new container.

pub mod engine;
pub use engine::{recode, RecodeOutcome, RecodeSummary, RecodedTrack};
pub mod options;
pub use options::{RecodeOptions, TrackSelection, DEFAULT_MIN_WINDOW};
pub mod progress;
pub use progress::{LogProgress, NoProgress, ProgressSink};
pub mod sync;
pub use sync::{sync_points, TrackSync};

#[cfg(test)]
mod fixtures;

mod engine_test;
