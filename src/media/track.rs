use crate::media::slice::Slice;
use crate::mp4::r#box::FourCC;
use crate::mp4::stsd::{EntryFields, SampleEntry};
use serde::Serialize;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Data,
}

impl TrackKind {
    pub fn from_handler(handler: &[u8; 4]) -> Self {
        match handler {
            b"vide" => TrackKind::Video,
            b"soun" => TrackKind::Audio,
            _ => TrackKind::Data,
        }
    }

    pub fn handler(self) -> FourCC {
        match self {
            TrackKind::Video => FourCC::new(b"vide"),
            TrackKind::Audio => FourCC::new(b"soun"),
            TrackKind::Data => FourCC::new(b"data"),
        }
    }

    pub fn handler_name(self) -> &'static str {
        match self {
            TrackKind::Video => "VideoHandler",
            TrackKind::Audio => "SoundHandler",
            TrackKind::Data => "DataHandler",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
            TrackKind::Data => "data",
        };
        write!(f, "{}", name)
    }
}

/// Codec of a track: its kind and the sample entry that configures the decoder
#[derive(Debug, Clone, PartialEq)]
pub struct CodecDescriptor {
    pub kind: TrackKind,
    pub entry: SampleEntry,
}

impl CodecDescriptor {
    pub fn format(&self) -> FourCC {
        self.entry.format
    }

    pub fn name(&self) -> String {
        self.entry.codec_name()
    }

    /// Opaque decoder configuration (avcC, esds, ...).
    pub fn private_data(&self) -> Option<&[u8]> {
        self.entry.codec_private()
    }

    pub fn channel_count(&self) -> Option<u16> {
        match &self.entry.fields {
            EntryFields::Audio(audio) => Some(audio.channel_count),
            _ => None,
        }
    }

    pub fn sample_rate(&self) -> Option<u32> {
        match &self.entry.fields {
            EntryFields::Audio(audio) => Some(audio.sample_rate >> 16),
            _ => None,
        }
    }
}

/// Static description of a track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub id: u32,
    pub codec: CodecDescriptor,
    /// Native clock rate of the track
    pub timescale: u32,
    /// Reference units
    pub duration: u64,
    pub language: String,
    pub handler_name: String,
    /// Pixels, zero for non-visual tracks
    pub width: u32,
    pub height: u32,
    /// 8.8 fixed point
    pub volume: u16,
}

impl TrackInfo {
    pub fn kind(&self) -> TrackKind {
        self.codec.kind
    }

    pub fn is_video(&self) -> bool {
        self.codec.kind == TrackKind::Video
    }

    pub fn is_audio(&self) -> bool {
        self.codec.kind == TrackKind::Audio
    }
}

type SliceSource = Rc<dyn Fn() -> Box<dyn Iterator<Item = Slice>>>;

/// Ordered, forward-only cursor over the slices of a track. `rewind` restarts it.
pub struct SliceCursor {
    source: SliceSource,
    iter: Box<dyn Iterator<Item = Slice>>,
    current: Option<Slice>,
}

impl SliceCursor {
    pub fn new(source: SliceSource) -> Self {
        let mut iter = source();
        let current = iter.next();
        Self {
            source,
            iter,
            current,
        }
    }

    /// Cursor over a fixed list of slices.
    pub fn from_slices(slices: Rc<[Slice]>) -> Self {
        Self::new(Rc::new(move || {
            let slices = Rc::clone(&slices);
            Box::new((0..slices.len()).map(move |i| slices[i].clone()))
        }))
    }

    /// The slice under the cursor, `None` once exhausted.
    pub fn current(&self) -> Option<&Slice> {
        self.current.as_ref()
    }

    /// Take the current slice and move to the next one.
    pub fn advance(&mut self) -> Option<Slice> {
        let next = self.iter.next();
        std::mem::replace(&mut self.current, next)
    }

    pub fn is_exhausted(&self) -> bool {
        self.current.is_none()
    }

    pub fn rewind(&mut self) {
        self.iter = (self.source)();
        self.current = self.iter.next();
    }
}

impl fmt::Debug for SliceCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceCursor")
            .field("current", &self.current)
            .finish()
    }
}
