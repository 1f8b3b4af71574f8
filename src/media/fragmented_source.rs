//! Reader for fragmented files (smooth streaming, fragmented MP4).
//!
//! The `moov` only describes the tracks; samples live in `moof`+`mdat` pairs. Every
//! track fragment is resolved into slices when the file is opened:
//!
//! * data base offset: the `tfhd` base offset when present, else the start of the `moof`
//!   (default-base-is-moof, or the first `traf`), else where the previous `traf`'s data
//!   ended;
//! * decode time: `tfdt`, else the smooth `tfxd` time, else the running track time;
//! * sample flags: `first_sample_flags`, per-sample flags, `tfhd` default, `trex`
//!   default. Without any, audio is all sync and the first video sample of a fragment is
//!   a key frame. `sdtp` marks disposable frames.

use crate::errors::{IntegrityError, MediaRecodeResult};
use crate::media::container::StreamFormat;
use crate::media::mp4_source::track_info;
use crate::media::slice::{CompositionOffset, Slice, SliceType};
use crate::media::track::{SliceCursor, TrackInfo, TrackKind};
use crate::media::{MediaTrack, SourceStream};
use crate::mp4::box_reader::BoxReader;
use crate::mp4::ftyp::FtypBox;
use crate::mp4::mdat::MdatExtent;
use crate::mp4::mfra::MfraBox;
use crate::mp4::moof::{MoofBox, TrafBox};
use crate::mp4::moov::MoovBox;
use crate::mp4::mvex::TrexBox;
use crate::mp4::r#box::BoxHeader;
use crate::mp4::registry::{read_any_box, AnyBox};
use crate::mp4::sdtp::is_disposable;
use crate::mp4::trak::TrakBox;
use crate::mp4::trun::{
    sample_is_disposable, sample_is_sync, TRUN_SAMPLE_COMPOSITION_OFFSET, TRUN_SAMPLE_DURATION,
    TRUN_SAMPLE_FLAGS, TRUN_SAMPLE_SIZE,
};
use crate::streams::SeekableStream;
use crate::time::{from_scale, from_scale_signed};
use log::{debug, warn};
use std::rc::Rc;

/// A track whose samples were gathered from movie fragments
#[derive(Debug)]
pub struct FragmentTrack {
    info: TrackInfo,
    slices: Rc<[Slice]>,
    fragment_count: usize,
}

impl FragmentTrack {
    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub fn fragment_count(&self) -> usize {
        self.fragment_count
    }
}

impl MediaTrack for FragmentTrack {
    fn info(&self) -> &TrackInfo {
        &self.info
    }

    fn cursor(&self) -> SliceCursor {
        SliceCursor::from_slices(Rc::clone(&self.slices))
    }

    fn sync_times(&self) -> Vec<u64> {
        self.slices
            .iter()
            .filter(|s| s.slice_type.is_sync())
            .filter_map(|s| s.timestamp)
            .collect()
    }

    fn sample_count(&self) -> u64 {
        self.slices.len() as u64
    }
}

struct TrackFragments<'a> {
    trak: &'a TrakBox,
    kind: TrackKind,
    timescale: u32,
    trex: Option<&'a TrexBox>,
    slices: Vec<Slice>,
    first_time: Option<u64>,
    native_time: u64,
    last_sequence: Option<u32>,
    fragment_count: usize,
}

impl<'a> TrackFragments<'a> {
    fn new(trak: &'a TrakBox, trex: Option<&'a TrexBox>) -> Self {
        Self {
            trak,
            kind: TrackKind::from_handler(&trak.handler()),
            timescale: trak.timescale(),
            trex,
            slices: Vec::new(),
            first_time: None,
            native_time: 0,
            last_sequence: None,
            fragment_count: 0,
        }
    }

    fn check_sequence(&mut self, sequence_number: u32) -> MediaRecodeResult<()> {
        if let Some(last) = self.last_sequence {
            if sequence_number <= last {
                return Err(IntegrityError::new(format!(
                    "fragment sequence number {} of track {} does not follow {}",
                    sequence_number,
                    self.trak.track_id(),
                    last
                ))
                .into());
            }
        }
        self.last_sequence = Some(sequence_number);
        Ok(())
    }

    fn video_type(&self, flags: Option<u32>, first_in_traf: bool, disposable: bool) -> SliceType {
        match flags {
            Some(f) if sample_is_sync(f) => SliceType::KeyFrame,
            Some(f) if sample_is_disposable(f) || disposable => SliceType::BFrame,
            Some(_) => SliceType::DeltaFrame,
            None if first_in_traf => SliceType::KeyFrame,
            None if disposable => SliceType::BFrame,
            None => SliceType::DeltaFrame,
        }
    }

    /// Append the samples of `traf` whose data starts at `base`. Returns the offset just
    /// past its data.
    fn add(&mut self, traf: &TrafBox, base: u64) -> MediaRecodeResult<u64> {
        let tfhd = &traf.tfhd;
        if let Some(tfdt) = &traf.tfdt {
            self.native_time = tfdt.base_media_decode_time;
        } else if let Some(tfxd) = &traf.tfxd {
            self.native_time = tfxd.fragment_time;
        }
        let default_duration = tfhd
            .default_sample_duration
            .or(self.trex.map(|t| t.default_sample_duration))
            .unwrap_or(0);
        let default_size = tfhd
            .default_sample_size
            .or(self.trex.map(|t| t.default_sample_size))
            .unwrap_or(0);
        // zero trex flags are treated as absent
        let default_flags = tfhd.default_sample_flags.or(self
            .trex
            .map(|t| t.default_sample_flags)
            .filter(|f| *f != 0));

        let mut offset = base;
        let mut in_traf = 0usize;
        for trun in &traf.truns {
            if let Some(data_offset) = trun.data_offset {
                offset = base.checked_add_signed(data_offset as i64).ok_or_else(|| {
                    IntegrityError::new(format!(
                        "trun data offset {} points before the file start",
                        data_offset
                    ))
                })?;
            }
            for (k, s) in trun.samples.iter().enumerate() {
                let duration = if trun.flags & TRUN_SAMPLE_DURATION != 0 {
                    s.duration
                } else {
                    default_duration
                };
                let size = if trun.flags & TRUN_SAMPLE_SIZE != 0 {
                    s.size
                } else {
                    default_size
                };
                let flags = match trun.first_sample_flags {
                    Some(first) if k == 0 => Some(first),
                    _ if trun.flags & TRUN_SAMPLE_FLAGS != 0 => Some(s.flags),
                    _ => default_flags,
                };
                let composition = (trun.flags & TRUN_SAMPLE_COMPOSITION_OFFSET != 0)
                    .then_some(s.composition_offset);
                let disposable = traf
                    .sdtp
                    .as_ref()
                    .and_then(|sdtp| sdtp.flags.get(in_traf))
                    .map_or(false, |f| is_disposable(*f));
                let slice_type = match self.kind {
                    TrackKind::Audio => SliceType::Audio,
                    TrackKind::Data => SliceType::Data,
                    TrackKind::Video => self.video_type(flags, in_traf == 0, disposable),
                };

                let start = from_scale(self.timescale, self.native_time);
                let end = from_scale(self.timescale, self.native_time + duration as u64);
                self.first_time.get_or_insert(start);
                self.slices.push(Slice {
                    index: self.slices.len() as u64,
                    offset,
                    length: size,
                    duration: end - start,
                    timestamp: (slice_type != SliceType::BFrame).then_some(start),
                    composition: composition.map(|native| CompositionOffset {
                        reference: from_scale_signed(self.timescale, native),
                        native,
                    }),
                    slice_type,
                });
                self.native_time += duration as u64;
                offset += size as u64;
                in_traf += 1;
            }
        }
        self.fragment_count += 1;
        Ok(offset)
    }

    fn finish(self) -> MediaRecodeResult<FragmentTrack> {
        let end = from_scale(self.timescale, self.native_time);
        let duration = end - self.first_time.unwrap_or(end).min(end);
        debug!(
            "track {}: {} samples in {} fragments",
            self.trak.track_id(),
            self.slices.len(),
            self.fragment_count
        );
        Ok(FragmentTrack {
            info: track_info(self.trak, duration)?,
            slices: self.slices.into(),
            fragment_count: self.fragment_count,
        })
    }
}

/// A fragmented file
pub struct FragmentedSource<R> {
    reader: BoxReader<R>,
    ftyp: Option<FtypBox>,
    movie_timescale: u32,
    tracks: Vec<FragmentTrack>,
    mdats: Vec<MdatExtent>,
    mfra: Option<MfraBox>,
}

impl<R: SeekableStream> FragmentedSource<R> {
    pub fn open(stream: R) -> MediaRecodeResult<Self> {
        let mut reader = BoxReader::new(stream)?;
        let mut boxes = Vec::new();
        while reader.has_child() {
            boxes.push(read_any_box(&mut reader)?);
        }
        Self::from_boxes(reader, boxes)
    }

    /// Build from top-level boxes already read from `reader`.
    pub fn from_boxes(
        reader: BoxReader<R>,
        boxes: Vec<(BoxHeader, AnyBox)>,
    ) -> MediaRecodeResult<Self> {
        let mut ftyp = None;
        let mut moov: Option<MoovBox> = None;
        let mut fragments: Vec<(u64, MoofBox)> = Vec::new();
        let mut mdats = Vec::new();
        let mut mfra = None;
        for (header, b) in boxes {
            match b {
                AnyBox::Ftyp(b) => ftyp = Some(b),
                AnyBox::Moov(b) => moov = Some(b),
                AnyBox::Moof(b) => fragments.push((header.offset, b)),
                AnyBox::Mdat(extent) => mdats.push(extent),
                AnyBox::Mfra(b) => mfra = Some(b),
                AnyBox::Unknown(_) => {}
            }
        }
        let moov = moov.ok_or_else(|| IntegrityError::new("no moov box found"))?;

        let mut tracks: Vec<TrackFragments> = moov
            .traks
            .iter()
            .map(|trak| {
                let trex = moov.mvex.as_ref().and_then(|m| m.trex(trak.track_id()));
                TrackFragments::new(trak, trex)
            })
            .collect();

        for (moof_offset, moof) in &fragments {
            let mut data_end = *moof_offset;
            for (i, traf) in moof.trafs.iter().enumerate() {
                let track_id = traf.tfhd.track_id;
                let Some(track) = tracks.iter_mut().find(|t| t.trak.track_id() == track_id)
                else {
                    warn!("fragment for unknown track {} ignored", track_id);
                    continue;
                };
                track.check_sequence(moof.mfhd.sequence_number)?;
                let base = match traf.tfhd.base_data_offset {
                    Some(offset) => offset,
                    None if traf.tfhd.default_base_is_moof() || i == 0 => *moof_offset,
                    None => data_end,
                };
                data_end = track.add(traf, base)?;
            }
        }
        if let Some(mfra) = &mfra {
            debug!(
                "random access index with {} entries",
                mfra.tfras.iter().map(|t| t.entries.len()).sum::<usize>()
            );
        }

        let tracks = tracks
            .into_iter()
            .map(TrackFragments::finish)
            .collect::<MediaRecodeResult<Vec<_>>>()?;
        Ok(Self {
            reader,
            ftyp,
            movie_timescale: moov.mvhd.timescale,
            tracks,
            mdats,
            mfra,
        })
    }

    pub fn ftyp(&self) -> Option<&FtypBox> {
        self.ftyp.as_ref()
    }

    pub fn fragment_tracks(&self) -> &[FragmentTrack] {
        &self.tracks
    }

    /// The trailing `mfra` index, when the file has one.
    pub fn random_access_index(&self) -> Option<&MfraBox> {
        self.mfra.as_ref()
    }
}

impl<R: SeekableStream> SourceStream for FragmentedSource<R> {
    fn format(&self) -> StreamFormat {
        StreamFormat::Smooth
    }

    fn is_fragmented(&self) -> bool {
        true
    }

    fn movie_timescale(&self) -> u32 {
        self.movie_timescale
    }

    fn tracks(&self) -> Vec<&dyn MediaTrack> {
        self.tracks.iter().map(|t| t as &dyn MediaTrack).collect()
    }

    fn read_slice(&mut self, slice: &Slice) -> MediaRecodeResult<Vec<u8>> {
        let len = slice.length as u64;
        if !self.mdats.is_empty() && !self.mdats.iter().any(|m| m.contains(slice.offset, len)) {
            return Err(IntegrityError::new(format!(
                "sample {} at {}+{} lies outside every mdat box",
                slice.index, slice.offset, len
            ))
            .into());
        }
        self.reader.read_at(slice.offset, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MediaRecodeError;
    use crate::media::container::SinkOptions;
    use crate::media::mp4_sink::destination_trak;
    use crate::media::smooth_sink::SmoothSink;
    use crate::media::track::CodecDescriptor;
    use crate::media::DestinationStream;
    use crate::mp4::moof::{MfhdBox, TfhdBox, TFHD_DEFAULT_SAMPLE_DURATION, TFHD_DEFAULT_SAMPLE_SIZE};
    use crate::mp4::mvex::MvexBox;
    use crate::mp4::mvhd::MvhdBox;
    use crate::mp4::r#box::{to_bytes, FourCC, Mp4Box};
    use crate::mp4::stbl::StblBox;
    use crate::mp4::stsd::{AudioFields, SampleEntry, StsdBox, VisualFields};
    use crate::mp4::trun::{TrunBox, TrunSample, TRUN_DATA_OFFSET};
    use std::io::Cursor;

    fn info(kind: TrackKind) -> TrackInfo {
        let entry = match kind {
            TrackKind::Video => {
                SampleEntry::visual(FourCC::new(b"avc1"), VisualFields::new(32, 32), vec![])
            }
            _ => SampleEntry::audio(FourCC::new(b"mp4a"), AudioFields::new(1, 44_100), vec![]),
        };
        TrackInfo {
            id: 1,
            codec: CodecDescriptor { kind, entry },
            timescale: 90_000,
            duration: 0,
            language: "und".to_string(),
            handler_name: String::new(),
            width: 32,
            height: 32,
            volume: 0,
        }
    }

    fn frame(index: u64, slice_type: SliceType) -> Slice {
        Slice {
            index,
            offset: 0,
            length: 2,
            duration: 400_000,
            timestamp: Some(index * 400_000),
            composition: None,
            slice_type,
        }
    }

    fn smooth_file() -> Vec<u8> {
        let mut sink = SmoothSink::new(Cursor::new(Vec::new()), SinkOptions::default()).unwrap();
        let id = sink.add_track(&info(TrackKind::Video)).unwrap();
        let types = [
            SliceType::KeyFrame,
            SliceType::DeltaFrame,
            SliceType::BFrame,
            SliceType::KeyFrame,
            SliceType::DeltaFrame,
        ];
        for (i, t) in types.iter().enumerate() {
            sink.write_slice(id, &frame(i as u64, *t), &[i as u8, 0xee]).unwrap();
        }
        sink.finalize().unwrap();
        sink.into_inner().unwrap().into_inner()
    }

    #[test]
    fn test_reads_smooth_output() {
        let mut source = FragmentedSource::open(Cursor::new(smooth_file())).unwrap();
        assert!(source.is_fragmented());
        assert_eq!(source.movie_timescale(), 10_000_000);
        let mfra = source.random_access_index().unwrap();
        assert_eq!(mfra.tfra(1).unwrap().entries.len(), 2);

        let track = &source.fragment_tracks()[0];
        assert_eq!(track.fragment_count(), 2);
        assert_eq!(track.info().duration, 2_000_000);
        let types: Vec<SliceType> = track.slices().iter().map(|s| s.slice_type).collect();
        assert_eq!(
            types,
            vec![
                SliceType::KeyFrame,
                SliceType::DeltaFrame,
                SliceType::BFrame,
                SliceType::KeyFrame,
                SliceType::DeltaFrame
            ]
        );
        assert_eq!(track.sync_times(), vec![0, 1_200_000]);
        let fourth = track.slices()[3].clone();
        assert_eq!(source.read_slice(&fourth).unwrap(), vec![3, 0xee]);
    }

    #[test]
    fn test_repeated_sequence_number_is_rejected() {
        let mut bytes = smooth_file();
        let mut r = BoxReader::new(Cursor::new(bytes.clone())).unwrap();
        let moofs: Vec<u64> = crate::mp4::registry::walk_boxes(&mut r)
            .unwrap()
            .iter()
            .filter(|n| n.header.box_type.is(b"moof"))
            .map(|n| n.header.offset)
            .collect();
        // moof header, mfhd header, version and flags
        let field = (moofs[1] + 8 + 8 + 4) as usize;
        bytes[field..field + 4].copy_from_slice(&1u32.to_be_bytes());
        assert!(matches!(
            FragmentedSource::open(Cursor::new(bytes)),
            Err(MediaRecodeError::Integrity(_))
        ));
    }

    fn empty_trak(id: u32, kind: TrackKind) -> TrakBox {
        let info = info(kind);
        let stbl = StblBox::empty(StsdBox {
            entries: vec![info.codec.entry.clone()],
        });
        destination_trak(id, &info, 1000, 0, 0, stbl)
    }

    #[test]
    fn test_second_traf_continues_after_first() {
        let moov = MoovBox {
            mvhd: MvhdBox::new(1000, 0, 3),
            traks: vec![empty_trak(1, TrackKind::Video), empty_trak(2, TrackKind::Audio)],
            mvex: Some(MvexBox {
                mehd: None,
                trexs: vec![TrexBox::new(1), TrexBox::new(2)],
                unknown: Vec::new(),
            }),
            unknown: Vec::new(),
        };
        let defaults = TFHD_DEFAULT_SAMPLE_DURATION | TFHD_DEFAULT_SAMPLE_SIZE;
        let mut video = TrafBox::new(TfhdBox::new(1, defaults));
        video.tfhd.default_sample_duration = Some(40);
        video.tfhd.default_sample_size = Some(3);
        video.truns.push(TrunBox {
            version: 0,
            flags: TRUN_DATA_OFFSET,
            data_offset: Some(0),
            first_sample_flags: None,
            samples: vec![TrunSample::default(); 2],
        });
        let mut audio = TrafBox::new(TfhdBox::new(2, defaults));
        audio.tfhd.default_sample_duration = Some(20);
        audio.tfhd.default_sample_size = Some(1);
        audio.truns.push(TrunBox {
            version: 0,
            flags: 0,
            data_offset: None,
            first_sample_flags: None,
            samples: vec![TrunSample::default(); 4],
        });
        let mut moof = MoofBox {
            mfhd: MfhdBox { sequence_number: 1 },
            trafs: vec![video, audio],
            unknown: Vec::new(),
        };

        let mut bytes = to_bytes(&FtypBox::mp4()).unwrap();
        bytes.extend(to_bytes(&moov).unwrap());
        let moof_offset = bytes.len() as u64;
        let data_offset = (moof.box_size() + 8) as i32;
        moof.trafs[0].truns[0].data_offset = Some(data_offset);
        bytes.extend(to_bytes(&moof).unwrap());
        bytes.extend_from_slice(&[0, 0, 0, 18, b'm', b'd', b'a', b't']);
        bytes.extend_from_slice(&[1, 1, 1, 2, 2, 2, 9, 8, 7, 6]);

        let mut source = FragmentedSource::open(Cursor::new(bytes)).unwrap();
        let video_slices = source.fragment_tracks()[0].slices().to_vec();
        let audio_slices = source.fragment_tracks()[1].slices().to_vec();
        assert_eq!(video_slices[0].offset, moof_offset + data_offset as u64);
        assert_eq!(video_slices[0].slice_type, SliceType::KeyFrame);
        assert_eq!(video_slices[1].slice_type, SliceType::DeltaFrame);
        assert_eq!(video_slices[1].timestamp, Some(400_000));
        assert_eq!(audio_slices.len(), 4);
        assert!(audio_slices.iter().all(|s| s.slice_type == SliceType::Audio));
        assert_eq!(source.read_slice(&video_slices[1]).unwrap(), vec![2, 2, 2]);
        assert_eq!(source.read_slice(&audio_slices[0]).unwrap(), vec![9]);
        assert_eq!(source.read_slice(&audio_slices[3]).unwrap(), vec![6]);
    }
}
