//! Fragmented (smooth streaming) writer.
//!
//! The header (`ftyp` and a `moov` with empty sample tables and an `mvex`) goes out with
//! the first slice, which fixes the track list. Slices are then buffered per track and
//! written as one `moof`+`mdat` pair per track fragment. Video fragments start on key
//! frames; other tracks are cut once the buffered duration reaches the configured
//! fragment duration. `finalize` flushes the buffers, appends an `mfra` index and patches
//! the movie duration into `mvhd` and `mehd`.

use crate::errors::{DomainError, IntegrityError, MediaRecodeResult, ResourceError};
use crate::media::container::{SinkOptions, StreamFormat};
use crate::media::mp4_sink::{destination_trak, sample_descriptions};
use crate::media::slice::{Slice, SliceType};
use crate::media::track::TrackInfo;
use crate::media::DestinationStream;
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::ftyp::FtypBox;
use crate::mp4::mdat::MDAT;
use crate::mp4::mfra::{MfraBox, TfraBox, TfraEntry};
use crate::mp4::moof::{MfhdBox, MoofBox, TfdtBox, TfhdBox, TrafBox, TFHD_DEFAULT_BASE_IS_MOOF};
use crate::mp4::moov::MoovBox;
use crate::mp4::mvex::{MehdBox, MvexBox, TrexBox};
use crate::mp4::mvhd::MvhdBox;
use crate::mp4::r#box::{boxes_size, BoxHeader, Mp4Box};
use crate::mp4::sdtp::SdtpBox;
use crate::mp4::smooth::TfxdBox;
use crate::mp4::stbl::StblBox;
use crate::mp4::trun::{
    TrunBox, TrunSample, TRUN_DATA_OFFSET, TRUN_SAMPLE_DURATION, TRUN_SAMPLE_FLAGS,
    TRUN_SAMPLE_SIZE,
};
use crate::time::{interval_to_scale, to_scale, ClockRate, TrackClock, REFERENCE_TIMESCALE};
use log::{debug, info};
use std::io::{Seek, Write};

struct SmoothTrack {
    id: u32,
    info: TrackInfo,
    clock: TrackClock,
    timescale: u32,
    pending: Vec<Slice>,
    pending_data: Vec<u8>,
    pending_duration: u64,
    /// Reference units, start of the pending fragment
    decode_time: u64,
    tfra: TfraBox,
}

impl SmoothTrack {
    fn fragment_due(&self, slice: &Slice, fragment_duration: u64) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        if self.info.is_video() {
            slice.slice_type == SliceType::KeyFrame
        } else {
            self.pending_duration >= fragment_duration
        }
    }
}

/// Write the pending slices of `track` as one fragment.
fn write_fragment<W: Write + Seek>(
    w: &mut BoxWriter<W>,
    track: &mut SmoothTrack,
    sequence_number: u32,
) -> MediaRecodeResult<()> {
    let ts = track.timescale;
    let start = track.decode_time;
    let mut time = start;
    let mut samples = Vec::with_capacity(track.pending.len());
    for slice in &track.pending {
        let duration = interval_to_scale(ts, time, slice.duration);
        time += slice.duration;
        samples.push(TrunSample {
            duration: u32::try_from(duration).map_err(|_| {
                IntegrityError::new(format!("sample {} is too long for a fragment", slice.index))
            })?,
            size: slice.length,
            flags: slice.slice_type.fragment_flags(),
            composition_offset: 0,
        });
    }
    let base_time = to_scale(ts, start);
    let fragment_duration = to_scale(ts, time) - base_time;

    let mut traf = TrafBox::new(TfhdBox::new(track.id, TFHD_DEFAULT_BASE_IS_MOOF));
    traf.tfdt = Some(TfdtBox::new(base_time));
    traf.truns.push(TrunBox {
        version: 0,
        flags: TRUN_DATA_OFFSET | TRUN_SAMPLE_DURATION | TRUN_SAMPLE_SIZE | TRUN_SAMPLE_FLAGS,
        data_offset: Some(0),
        first_sample_flags: None,
        samples,
    });
    traf.sdtp = Some(SdtpBox {
        flags: track.pending.iter().map(|s| s.slice_type.sdtp_flags()).collect(),
    });
    traf.tfxd = Some(TfxdBox::new(base_time, fragment_duration));
    let mut moof = MoofBox {
        mfhd: MfhdBox { sequence_number },
        trafs: vec![traf],
        unknown: Vec::new(),
    };

    let mdat = BoxHeader::for_payload(MDAT, track.pending_data.len() as u64);
    let data_offset = i32::try_from(moof.box_size() + mdat.header_size)
        .map_err(|_| IntegrityError::new("fragment header too large"))?;
    moof.trafs[0].truns[0].data_offset = Some(data_offset);

    let moof_offset = w.position();
    moof.write_box(w)?;
    w.begin(MDAT, mdat.size)?;
    w.write_all(&track.pending_data)?;
    w.end()?;
    debug!(
        "fragment {} of track {}: {} samples at {}",
        sequence_number,
        track.id,
        track.pending.len(),
        moof_offset
    );

    track.tfra.entries.push(TfraEntry {
        time: base_time,
        moof_offset,
        traf_number: 1,
        trun_number: 1,
        sample_number: 1,
    });
    track.decode_time += track.pending_duration;
    track.pending.clear();
    track.pending_data.clear();
    track.pending_duration = 0;
    Ok(())
}

/// Destination writing a fragmented smooth-streaming file
pub struct SmoothSink<W: Write + Seek> {
    writer: BoxWriter<W>,
    options: SinkOptions,
    tracks: Vec<SmoothTrack>,
    next_sequence: u32,
    started: bool,
    finalized: bool,
    mvhd_duration_offset: u64,
    mehd_duration_offset: u64,
}

impl<W: Write + Seek> SmoothSink<W> {
    pub fn new(inner: W, options: SinkOptions) -> MediaRecodeResult<Self> {
        Ok(Self {
            writer: BoxWriter::new(inner)?,
            options,
            tracks: Vec::new(),
            next_sequence: 1,
            started: false,
            finalized: false,
            mvhd_duration_offset: 0,
            mehd_duration_offset: 0,
        })
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> MediaRecodeResult<W> {
        self.writer.into_inner()
    }

    fn start(&mut self) -> MediaRecodeResult<()> {
        if self.started {
            return Ok(());
        }
        let mut traks = Vec::new();
        for track in &mut self.tracks {
            track.timescale = track.clock.rate_or(REFERENCE_TIMESCALE);
            let stbl = StblBox::empty(sample_descriptions(&track.info));
            traks.push(destination_trak(track.id, &track.info, track.timescale, 0, 0, stbl));
        }
        let next_track_id = self.tracks.len() as u32 + 1;
        let mut mvhd = MvhdBox::new(REFERENCE_TIMESCALE, 0, next_track_id);
        mvhd.version = 1;
        let mvex = MvexBox {
            mehd: Some(MehdBox {
                version: 1,
                fragment_duration: 0,
            }),
            trexs: self.tracks.iter().map(|t| TrexBox::new(t.id)).collect(),
            unknown: Vec::new(),
        };
        let moov = MoovBox {
            mvhd,
            traks,
            mvex: Some(mvex),
            unknown: Vec::new(),
        };

        FtypBox::smooth().write_box(&mut self.writer)?;
        let moov_start = self.writer.position();
        moov.write_box(&mut self.writer)?;

        let mvhd_start =
            moov_start + BoxHeader::for_payload(MoovBox::TYPE, moov.payload_size()).header_size;
        self.mvhd_duration_offset = mvhd_start + moov.mvhd.duration_field_offset();
        if let Some(mvex) = &moov.mvex {
            let mvex_start = mvhd_start + moov.mvhd.box_size() + boxes_size(&moov.traks);
            self.mehd_duration_offset = mvex_start
                + BoxHeader::for_payload(MvexBox::TYPE, mvex.payload_size()).header_size
                + MehdBox::DURATION_OFFSET;
        }
        self.started = true;
        Ok(())
    }

    fn track_index(&self, track_id: u32) -> MediaRecodeResult<usize> {
        self.tracks
            .iter()
            .position(|t| t.id == track_id)
            .ok_or_else(|| DomainError::new(format!("no destination track {}", track_id)).into())
    }

    fn flush(&mut self, index: usize) -> MediaRecodeResult<()> {
        if self.tracks[index].pending.is_empty() {
            return Ok(());
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        write_fragment(&mut self.writer, &mut self.tracks[index], sequence)
    }
}

impl<W: Write + Seek> DestinationStream for SmoothSink<W> {
    fn format(&self) -> StreamFormat {
        StreamFormat::Smooth
    }

    fn add_track(&mut self, info: &TrackInfo) -> MediaRecodeResult<u32> {
        if self.started {
            return Err(ResourceError::new(
                "the fragmented header is already written, no tracks can be added",
            )
            .into());
        }
        let id = self.tracks.len() as u32 + 1;
        self.tracks.push(SmoothTrack {
            id,
            info: info.clone(),
            clock: TrackClock::new(),
            timescale: REFERENCE_TIMESCALE,
            pending: Vec::new(),
            pending_data: Vec::new(),
            pending_duration: 0,
            decode_time: 0,
            tfra: TfraBox::new(id),
        });
        Ok(id)
    }

    fn select_clock(&mut self, track_id: u32, rate: ClockRate) -> MediaRecodeResult<()> {
        if self.started {
            return Err(DomainError::new(format!(
                "track {} is already described, its clock cannot change",
                track_id
            ))
            .into());
        }
        let index = self.track_index(track_id)?;
        self.tracks[index].clock.select(rate)
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
        let index = self.track_index(track_id)?;
        self.start()?;
        if self.tracks[index].fragment_due(slice, self.options.fragment_duration) {
            self.flush(index)?;
        }
        let track = &mut self.tracks[index];
        track.pending.push(slice.clone());
        track.pending_data.extend_from_slice(data);
        track.pending_duration += slice.duration;
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
        for index in 0..self.tracks.len() {
            self.flush(index)?;
        }
        let duration = self.tracks.iter().map(|t| t.decode_time).max().unwrap_or(0);
        let tfras = self.tracks.iter().map(|t| t.tfra.clone()).collect();
        MfraBox::new(tfras).write_box(&mut self.writer)?;
        self.writer.patch_u64(self.mvhd_duration_offset, duration)?;
        self.writer.patch_u64(self.mehd_duration_offset, duration)?;
        self.writer.flush()?;
        info!(
            "wrote {} fragments, duration {}",
            self.next_sequence - 1,
            duration
        );
        self.finalized = true;
        Ok(())
    }
}
