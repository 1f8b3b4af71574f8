//! Flat MP4 writer.
//!
//! Media data is streamed into a single large-size `mdat` while every track records its
//! tables in a [`TableBuilder`]. `finalize` closes the `mdat` and writes the `moov` after
//! it, replaying each track's tables straight out of scratch storage.

use crate::errors::{DomainError, MediaRecodeResult, ResourceError};
use crate::media::container::{SinkOptions, StreamFormat};
use crate::media::slice::Slice;
use crate::media::track::{TrackInfo, TrackKind};
use crate::media::DestinationStream;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::ftyp::FtypBox;
use crate::mp4::hdlr::HdlrBox;
use crate::mp4::mdat::MDAT;
use crate::mp4::mdhd::MdhdBox;
use crate::mp4::minf::{DinfBox, MinfBox, SmhdBox, VmhdBox};
use crate::mp4::moov::MoovBox;
use crate::mp4::mvhd::MvhdBox;
use crate::mp4::r#box::{BoxHeader, Mp4Box};
use crate::mp4::stbl::StblBox;
use crate::mp4::stsd::StsdBox;
use crate::mp4::table_builder::{TableBuilder, TableOptions};
use crate::mp4::tkhd::TkhdBox;
use crate::mp4::trak::{MdiaBox, TrakBox};
use crate::time::{to_scale, ClockRate, TrackClock};
use log::{debug, info};
use std::io::{Seek, Write};

/// Track box for a destination track, around the sample table `stbl`.
/// `movie_duration` is in movie units, `media_duration` in `timescale` units.
pub(crate) fn destination_trak(
    track_id: u32,
    info: &TrackInfo,
    timescale: u32,
    movie_duration: u64,
    media_duration: u64,
    stbl: StblBox,
) -> TrakBox {
    let mut tkhd = TkhdBox::new(track_id, movie_duration);
    tkhd.width = info.width << 16;
    tkhd.height = info.height << 16;
    tkhd.volume = match info.kind() {
        TrackKind::Audio if info.volume == 0 => 0x0100,
        TrackKind::Audio => info.volume,
        _ => 0,
    };
    let handler_name = if info.handler_name.is_empty() {
        info.kind().handler_name()
    } else {
        info.handler_name.as_str()
    };
    TrakBox {
        tkhd,
        mdia: MdiaBox {
            mdhd: MdhdBox::new(timescale, media_duration, &info.language),
            hdlr: HdlrBox::new(info.kind().handler(), handler_name),
            minf: MinfBox {
                vmhd: (info.kind() == TrackKind::Video).then(VmhdBox::default),
                smhd: (info.kind() == TrackKind::Audio).then(SmhdBox::default),
                dinf: DinfBox::default(),
                stbl,
                unknown: Vec::new(),
            },
            unknown: Vec::new(),
        },
        unknown: Vec::new(),
    }
}

pub(crate) fn sample_descriptions(info: &TrackInfo) -> StsdBox {
    StsdBox {
        entries: vec![info.codec.entry.clone()],
    }
}

struct SinkTrack {
    id: u32,
    info: TrackInfo,
    clock: TrackClock,
    builder: Option<TableBuilder>,
}

/// Destination writing a flat MP4 file
pub struct Mp4Sink<W: Write + Seek> {
    writer: BoxWriter<W>,
    options: SinkOptions,
    table_options: TableOptions,
    tracks: Vec<SinkTrack>,
    started: bool,
    finalized: bool,
}

impl<W: Write + Seek> Mp4Sink<W> {
    pub fn new(inner: W, options: SinkOptions) -> MediaRecodeResult<Self> {
        Ok(Self {
            writer: BoxWriter::new(inner)?,
            options,
            table_options: TableOptions::default(),
            tracks: Vec::new(),
            started: false,
            finalized: false,
        })
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> MediaRecodeResult<W> {
        self.writer.into_inner()
    }

    fn start(&mut self) -> MediaRecodeResult<()> {
        if !self.started {
            FtypBox::mp4().write_box(&mut self.writer)?;
            self.writer.begin_open(MDAT)?;
            self.started = true;
        }
        Ok(())
    }

    fn track_mut(&mut self, track_id: u32) -> MediaRecodeResult<&mut SinkTrack> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == track_id)
            .ok_or_else(|| DomainError::new(format!("no destination track {}", track_id)).into())
    }

    fn write_moov(&mut self) -> MediaRecodeResult<()> {
        let movie_timescale = self.options.movie_timescale;
        let mut traks = Vec::new();
        let mut movie_duration = 0;
        for track in self.tracks.drain(..) {
            let timescale = track.clock.rate_or(track.info.timescale);
            let builder = match track.builder {
                Some(builder) => builder,
                None => TableBuilder::new(timescale, self.table_options, &self.options.scratch),
            };
            let duration = to_scale(movie_timescale, builder.reference_duration());
            movie_duration = movie_duration.max(duration);
            let built = builder.finish()?;
            debug!(
                "track {}: {} samples, duration {}",
                track.id,
                built.sample_count(),
                built.native_duration()
            );
            let stbl = StblBox {
                stsd: sample_descriptions(&track.info),
                ..Default::default()
            };
            let trak = destination_trak(
                track.id,
                &track.info,
                timescale,
                duration,
                built.native_duration(),
                stbl,
            );
            traks.push((trak, built));
        }

        let next_track_id = traks.iter().map(|(t, _)| t.track_id()).max().unwrap_or(0) + 1;
        let mvhd = MvhdBox::new(movie_timescale, movie_duration, next_track_id);
        let payload = mvhd.box_size()
            + traks
                .iter()
                .map(|(trak, built)| trak.size_with_tables(built.size()))
                .sum::<u64>();
        let w = &mut self.writer;
        w.begin(MoovBox::TYPE, BoxHeader::for_payload(MoovBox::TYPE, payload).size)?;
        mvhd.write_box(w)?;
        for (trak, built) in traks {
            trak.write_with_tables(w, built.size(), |w| built.write(w))?;
        }
        w.end()?;
        Ok(())
    }
}

impl<W: Write + Seek> DestinationStream for Mp4Sink<W> {
    fn format(&self) -> StreamFormat {
        StreamFormat::Mp4
    }

    fn enable_composition_offsets(&mut self) -> MediaRecodeResult<()> {
        if self.tracks.iter().any(|t| t.builder.is_some()) {
            return Err(ResourceError::new("samples were already written").into());
        }
        self.table_options.composition_offsets = true;
        Ok(())
    }

    fn add_track(&mut self, info: &TrackInfo) -> MediaRecodeResult<u32> {
        if self.finalized {
            return Err(ResourceError::new("destination already finalized").into());
        }
        let id = self.tracks.len() as u32 + 1;
        self.tracks.push(SinkTrack {
            id,
            info: info.clone(),
            clock: TrackClock::new(),
            builder: None,
        });
        Ok(id)
    }

    fn select_clock(&mut self, track_id: u32, rate: ClockRate) -> MediaRecodeResult<()> {
        let track = self.track_mut(track_id)?;
        if track.builder.is_some() {
            return Err(DomainError::new(format!(
                "track {} already has samples, its clock cannot change",
                track_id
            ))
            .into());
        }
        track.clock.select(rate)
    }

    fn write_slice(
        &mut self,
        track_id: u32,
        slice: &Slice,
        data: &[u8],
    ) -> MediaRecodeResult<()> {
        if self.finalized {
            return Err(ResourceError::new("destination already finalized").into());
        }
        self.start()?;
        let offset = self.writer.position();
        let scratch = self.options.scratch.clone();
        let mut table_options = self.table_options;
        let track = self.track_mut(track_id)?;
        table_options.dependencies = track.info.is_video();
        let timescale = track.clock.rate_or(track.info.timescale);
        let builder = track
            .builder
            .get_or_insert_with(|| TableBuilder::new(timescale, table_options, &scratch));
        builder.push(slice, offset)?;
        self.writer.write_all(data)?;
        Ok(())
    }

    fn data_offset(&self) -> u64 {
        self.writer.position()
    }

    fn finalize(&mut self) -> MediaRecodeResult<()> {
        if self.finalized {
            return Err(ResourceError::new("destination already finalized").into());
        }
        self.start()?;
        let mdat_size = self.writer.end()?;
        info!("media data complete, {} bytes", mdat_size);
        self.write_moov()?;
        self.writer.flush()?;
        self.finalized = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MediaRecodeError;
    use crate::media::mp4_source::Mp4Source;
    use crate::media::slice::SliceType;
    use crate::media::track::CodecDescriptor;
    use crate::media::{MediaTrack, SourceStream};
    use crate::mp4::r#box::FourCC;
    use crate::mp4::stsd::{AudioFields, SampleEntry};
    use std::io::Cursor;

    fn audio_info() -> TrackInfo {
        TrackInfo {
            id: 7,
            codec: CodecDescriptor {
                kind: TrackKind::Audio,
                entry: SampleEntry::audio(FourCC::new(b"mp4a"), AudioFields::new(2, 48_000), vec![]),
            },
            timescale: 48_000,
            duration: 0,
            language: "eng".to_string(),
            handler_name: String::new(),
            width: 0,
            height: 0,
            volume: 0x0100,
        }
    }

    fn audio_slice(index: u64) -> Slice {
        Slice {
            index,
            offset: 0,
            length: 4,
            duration: 213_333,
            timestamp: Some(index * 213_333),
            composition: None,
            slice_type: SliceType::Audio,
        }
    }

    #[test]
    fn test_nothing_written_before_first_slice() {
        let mut sink = Mp4Sink::new(Cursor::new(Vec::new()), SinkOptions::default()).unwrap();
        sink.add_track(&audio_info()).unwrap();
        assert_eq!(sink.data_offset(), 0);
        assert!(sink.into_inner().unwrap().into_inner().is_empty());
    }

    #[test]
    fn test_written_file_reads_back() {
        let mut sink = Mp4Sink::new(Cursor::new(Vec::new()), SinkOptions::default()).unwrap();
        let id = sink.add_track(&audio_info()).unwrap();
        assert_eq!(id, 1);
        for i in 0..5u8 {
            sink.write_slice(id, &audio_slice(i as u64), &[i; 4]).unwrap();
        }
        sink.finalize().unwrap();
        assert!(matches!(
            sink.finalize(),
            Err(MediaRecodeError::Resource(_))
        ));
        let bytes = sink.into_inner().unwrap().into_inner();

        let mut source = Mp4Source::open(Cursor::new(bytes)).unwrap();
        assert_eq!(source.movie_timescale(), 1000);
        let track = source.track(1).unwrap();
        assert_eq!(track.info().language, "eng");
        assert_eq!(track.info().handler_name, "SoundHandler");
        assert_eq!(track.sample_count(), 5);
        let mut cursor = track.cursor();
        let mut slices = Vec::new();
        while let Some(s) = cursor.advance() {
            slices.push(s);
        }
        assert_eq!(source.read_slice(&slices[3]).unwrap(), vec![3u8; 4]);
        assert_eq!(slices[4].timestamp, Some(853_333));

        let located = source.mp4_tracks()[0].locate_samples(400_000, 700_000);
        let indices: Vec<u64> = located.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![2, 3]);
        assert_eq!(source.read_slice(&located[0]).unwrap(), vec![2u8; 4]);
    }

    #[test]
    fn test_clock_is_fixed_once_samples_exist() {
        let mut sink = Mp4Sink::new(Cursor::new(Vec::new()), SinkOptions::default()).unwrap();
        let id = sink.add_track(&audio_info()).unwrap();
        sink.select_clock(id, ClockRate::Mpeg).unwrap();
        sink.write_slice(id, &audio_slice(0), &[0; 4]).unwrap();
        assert!(sink.select_clock(id, ClockRate::HighFrameRate).is_err());
        assert!(sink.write_slice(9, &audio_slice(1), &[0; 4]).is_err());
    }
}
