use crate::media::container::StreamFormat;
use crate::media::track::TrackKind;
use crate::media::{MediaTrack, SourceStream};
use crate::mp4::avcc::AvccConfig;
use crate::time::REFERENCE_TIMESCALE;
use base64::{engine::general_purpose, Engine as _};
use log::warn;
use serde::Serialize;
use std::fmt;

/// Summary of one track
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TrackSummary {
    pub id: u32,
    pub kind: TrackKind,
    /// Sample entry type, e.g. `avc1`
    pub codec: String,
    pub codec_name: String,
    /// RFC 6381 codec string when the configuration can be parsed
    pub codec_string: Option<String>,
    pub timescale: u32,
    /// Reference units
    pub duration: u64,
    pub samples: u64,
    pub key_frames: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub channels: Option<u16>,
    pub sample_rate: Option<u32>,
    pub language: String,
    /// Base64 of the decoder configuration
    pub private_data: Option<String>,
}

/// Summary of a whole stream, as printed by the describe command
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StreamSummary {
    pub format: StreamFormat,
    pub fragmented: bool,
    /// Duration of the longest track, reference units
    pub duration: u64,
    pub tracks: Vec<TrackSummary>,
}

fn codec_string(track: &dyn MediaTrack) -> Option<String> {
    let entry = &track.info().codec.entry;
    let avcc = entry.child(b"avcC")?;
    match AvccConfig::parse(&avcc.payload) {
        Ok(config) => Some(config.codec_string(&entry.format.to_string())),
        Err(e) => {
            warn!("track {}: {}", track.info().id, e);
            None
        }
    }
}

fn summarize_track(track: &dyn MediaTrack) -> TrackSummary {
    let info = track.info();
    let visual = info.is_video();
    TrackSummary {
        id: info.id,
        kind: info.kind(),
        codec: info.codec.format().to_string(),
        codec_name: info.codec.name(),
        codec_string: codec_string(track),
        timescale: info.timescale,
        duration: info.duration,
        samples: track.sample_count(),
        key_frames: track.sync_times().len() as u64,
        width: visual.then_some(info.width),
        height: visual.then_some(info.height),
        channels: info.codec.channel_count(),
        sample_rate: info.codec.sample_rate(),
        language: info.language.clone(),
        private_data: info
            .codec
            .private_data()
            .map(|data| general_purpose::STANDARD.encode(data)),
    }
}

/// Describe every track of `source`.
pub fn describe(source: &dyn SourceStream) -> StreamSummary {
    StreamSummary {
        format: source.format(),
        fragmented: source.is_fragmented(),
        duration: source.duration(),
        tracks: source.tracks().into_iter().map(summarize_track).collect(),
    }
}

fn seconds(reference: u64) -> f64 {
    reference as f64 / REFERENCE_TIMESCALE as f64
}

impl fmt::Display for TrackSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Track {}: {} {} ({}",
            self.id, self.kind, self.codec, self.codec_name
        )?;
        if let Some(codec_string) = &self.codec_string {
            write!(f, ", {}", codec_string)?;
        }
        write!(f, ")")?;
        if let (Some(w), Some(h)) = (self.width, self.height) {
            write!(f, ", {}x{}", w, h)?;
        }
        if let (Some(ch), Some(rate)) = (self.channels, self.sample_rate) {
            write!(f, ", {} ch @ {} Hz", ch, rate)?;
        }
        write!(
            f,
            ", timescale {}, {} samples, {} key frames, {:.3} s, language {}",
            self.timescale,
            self.samples,
            self.key_frames,
            seconds(self.duration),
            self.language
        )
    }
}

impl fmt::Display for StreamSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Format: {} ({})",
            self.format,
            if self.fragmented { "fragmented" } else { "flat" }
        )?;
        writeln!(f, "Duration: {:.3} s", seconds(self.duration))?;
        for track in &self.tracks {
            writeln!(f, "{}", track)?;
        }
        Ok(())
    }
}
