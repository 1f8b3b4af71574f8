use crate::errors::{DomainError, IntegrityError, MediaRecodeResult};
use crate::media::fragmented_source::FragmentedSource;
use crate::media::mp4_sink::Mp4Sink;
use crate::media::mp4_source::Mp4Source;
use crate::media::smooth_sink::SmoothSink;
use crate::media::{DestinationStream, SourceStream};
use crate::mp4::box_reader::BoxReader;
use crate::mp4::registry::{read_any_box, AnyBox};
use crate::mp4::r#box::BoxHeader;
use crate::scratch::ScratchConfig;
use crate::streams::{LocalSeekableStream, SeekableStream};
use log::{debug, info};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Default movie timescale of flat MP4 output.
pub const DEFAULT_MOVIE_TIMESCALE: u32 = 1000;

/// Default length of a non-video fragment, in reference units (2 s).
pub const DEFAULT_FRAGMENT_DURATION: u64 = 20_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamFormat {
    /// Flat ISO base media file
    Mp4,
    /// Fragmented smooth-streaming file (ISMV/ISMA/PIFF)
    Smooth,
}

impl StreamFormat {
    /// Pick the format from a file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> MediaRecodeResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("mp4" | "m4v" | "m4a" | "mov") => Ok(StreamFormat::Mp4),
            Some("ismv" | "isma" | "piff") => Ok(StreamFormat::Smooth),
            _ => Err(DomainError::new(format!(
                "cannot tell the output format of {}",
                path.display()
            ))
            .into()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            StreamFormat::Mp4 => "MP4",
            StreamFormat::Smooth => "Smooth Streaming",
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Layout settings of destination containers
#[derive(Debug, Clone)]
pub struct SinkOptions {
    /// Timescale of `mvhd` and `tkhd` durations in flat output
    pub movie_timescale: u32,
    /// Cut point for non-video fragments, reference units
    pub fragment_duration: u64,
    pub scratch: ScratchConfig,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            movie_timescale: DEFAULT_MOVIE_TIMESCALE,
            fragment_duration: DEFAULT_FRAGMENT_DURATION,
            scratch: ScratchConfig::default(),
        }
    }
}

impl SinkOptions {
    pub fn with_movie_timescale(mut self, timescale: u32) -> Self {
        self.movie_timescale = timescale;
        self
    }

    pub fn with_fragment_duration(mut self, duration: u64) -> Self {
        self.fragment_duration = duration;
        self
    }

    pub fn with_scratch(mut self, scratch: ScratchConfig) -> Self {
        self.scratch = scratch;
        self
    }
}

/// Open a file and read its structure.
pub fn open_source<P: AsRef<Path>>(path: P) -> MediaRecodeResult<Box<dyn SourceStream>> {
    let path = path.as_ref();
    info!("opening {}", path.display());
    open_source_from(LocalSeekableStream::open(path)?)
}

/// Read the top-level boxes of `stream` and pick the flat or the fragmented reader.
pub fn open_source_from<R: SeekableStream + 'static>(
    stream: R,
) -> MediaRecodeResult<Box<dyn SourceStream>> {
    let mut reader = BoxReader::new(stream)?;
    let mut boxes: Vec<(BoxHeader, AnyBox)> = Vec::new();
    while reader.has_child() {
        boxes.push(read_any_box(&mut reader)?);
    }
    debug!("read {} top-level boxes", boxes.len());

    let has_moov = boxes.iter().any(|(_, b)| matches!(b, AnyBox::Moov(_)));
    if !has_moov {
        return Err(IntegrityError::new("no moov box found").into());
    }
    let fragmented = boxes.iter().any(|(_, b)| match b {
        AnyBox::Moof(_) => true,
        AnyBox::Moov(moov) => moov.is_fragmented(),
        _ => false,
    });
    if fragmented {
        Ok(Box::new(FragmentedSource::from_boxes(reader, boxes)?))
    } else {
        Ok(Box::new(Mp4Source::from_boxes(reader, boxes)?))
    }
}

/// Create the destination file, its format chosen by extension. Nothing is written
/// until the first slice arrives.
pub fn create_destination<P: AsRef<Path>>(
    path: P,
    options: &SinkOptions,
) -> MediaRecodeResult<Box<dyn DestinationStream>> {
    let path = path.as_ref();
    let format = StreamFormat::from_path(path)?;
    let file = BufWriter::new(File::create(path)?);
    info!("writing {} output to {}", format, path.display());
    Ok(match format {
        StreamFormat::Mp4 => Box::new(Mp4Sink::new(file, options.clone())?),
        StreamFormat::Smooth => Box::new(SmoothSink::new(file, options.clone())?),
    })
}
