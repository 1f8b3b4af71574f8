pub mod bits;

pub mod errors;
pub use errors::{
    DomainError, FramingError, IntegrityError, MediaRecodeError, MediaRecodeResult, ResourceError,
};

pub mod time;
pub use time::{ClockRate, REFERENCE_TIMESCALE};

pub mod scratch;
pub use scratch::ScratchConfig;

pub mod streams;
pub use streams::{seekable_stream, LocalSeekableStream, SeekableStream};

pub mod mp4;
pub use mp4::{walk_boxes, AvccConfig, BoxNode, BoxReader};

pub mod media;
pub use media::{
    create_destination, describe, open_source, DestinationStream, MediaTrack, SinkOptions, Slice,
    SliceType, SourceStream, StreamFormat, StreamSummary, TrackInfo, TrackKind,
};

pub mod recode;
pub use recode::{
    recode, LogProgress, NoProgress, ProgressSink, RecodeOptions, RecodeOutcome, RecodeSummary,
    TrackSelection, DEFAULT_MIN_WINDOW,
};

use log::{info, warn};
use std::path::Path;

/// Open `path` and summarize its tracks.
pub fn describe_file<P: AsRef<Path>>(path: P) -> MediaRecodeResult<StreamSummary> {
    let source = open_source(path)?;
    Ok(describe(source.as_ref()))
}

/// Box tree of the file at `path`, without reading payloads.
pub fn box_tree<P: AsRef<Path>>(path: P) -> MediaRecodeResult<Vec<BoxNode>> {
    let mut reader = BoxReader::new(LocalSeekableStream::open(path)?)?;
    walk_boxes(&mut reader)
}

/// Recode the window of `options` from the files `sources` into a new file at
/// `destination`, its format chosen by extension. The destination file is removed again
/// unless the run finalizes it.
pub fn recode_file<P: AsRef<Path>, Q: AsRef<Path>>(
    sources: &[P],
    destination: Q,
    options: &RecodeOptions,
    progress: &mut dyn ProgressSink,
) -> MediaRecodeResult<RecodeSummary> {
    let destination = destination.as_ref();
    // check the extension before creating anything
    StreamFormat::from_path(destination)?;
    let mut opened = sources
        .iter()
        .map(open_source)
        .collect::<MediaRecodeResult<Vec<_>>>()?;
    let mut refs: Vec<&mut dyn SourceStream> = Vec::with_capacity(opened.len());
    for source in opened.iter_mut() {
        refs.push(source.as_mut());
    }

    let mut sink = create_destination(destination, &options.sink)?;
    let result = recode(&mut refs, sink.as_mut(), options, progress);
    drop(sink);

    let finalized = matches!(
        &result,
        Ok(summary) if summary.outcome == RecodeOutcome::Finalized
    );
    if !finalized {
        match std::fs::remove_file(destination) {
            Ok(()) => info!("removed unfinished output {}", destination.display()),
            Err(e) => warn!("could not remove {}: {}", destination.display(), e),
        }
    }
    result
}
