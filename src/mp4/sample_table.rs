//! Decoding of a track's sample table into slices.
//!
//! The tables are run-length encoded and parallel: `stts` gives decode durations, `ctts`
//! composition offsets, `stsz` sizes, and `stsc` with `stco` where the samples live. They
//! are walked in lock-step; a sample's byte offset is the offset of its chunk plus the
//! sizes of the samples before it in that chunk.

use crate::errors::{IntegrityError, MediaRecodeResult};
use crate::media::slice::{CompositionOffset, SliceType, StreamDataBlockInfo};
use crate::media::track::TrackKind;
use crate::mp4::ctts::CttsEntry;
use crate::mp4::sdtp::is_disposable;
use crate::mp4::stbl::StblBox;
use crate::mp4::stsc::StscEntry;
use crate::mp4::stsz::StszBox;
use crate::mp4::stts::SttsEntry;
use crate::time::{from_scale, from_scale_signed};
use log::warn;
use std::rc::Rc;

/// Validated sample table of one track
#[derive(Debug, Clone)]
pub struct SampleTable {
    kind: TrackKind,
    timescale: u32,
    stts: Vec<SttsEntry>,
    ctts: Option<Vec<CttsEntry>>,
    stss: Option<Vec<u32>>,
    sdtp: Option<Vec<u8>>,
    stsc: Vec<StscEntry>,
    stsz: StszBox,
    chunk_offsets: Vec<u64>,
    sample_count: u64,
}

fn missing(name: &str) -> IntegrityError {
    IntegrityError::new(format!("sample table without {}", name))
}

impl SampleTable {
    /// Take the tables out of `stbl` and check that they describe the same samples.
    pub fn new(stbl: &StblBox, timescale: u32, kind: TrackKind) -> MediaRecodeResult<Self> {
        let stts = stbl.stts.as_ref().ok_or_else(|| missing("stts"))?;
        let stsz = stbl.stsz.as_ref().ok_or_else(|| missing("stsz"))?;
        let stsc = stbl.stsc.as_ref().ok_or_else(|| missing("stsc"))?;
        let stco = stbl.stco.as_ref().ok_or_else(|| missing("stco"))?;

        let sample_count = stts.sample_count();
        if sample_count != stsz.sample_count as u64 {
            return Err(IntegrityError::new(format!(
                "stts describes {} samples but stsz {}",
                sample_count, stsz.sample_count
            ))
            .into());
        }
        if stsc
            .entries
            .windows(2)
            .any(|w| w[0].first_chunk >= w[1].first_chunk)
            || stsc.entries.first().map_or(false, |e| e.first_chunk == 0)
        {
            return Err(IntegrityError::new("stsc chunk numbers are not increasing").into());
        }
        let chunk_count = stco.offsets.len() as u64;
        if let Some(entry) = stsc
            .entries
            .iter()
            .find(|e| e.first_chunk as u64 > chunk_count)
        {
            return Err(IntegrityError::new(format!(
                "stsc refers to chunk {} but only {} chunks exist",
                entry.first_chunk, chunk_count
            ))
            .into());
        }
        let addressed = stsc.addressed_samples(chunk_count);
        if addressed != sample_count {
            return Err(IntegrityError::new(format!(
                "chunk tables address {} samples but stts describes {}",
                addressed, sample_count
            ))
            .into());
        }
        if let Some(ctts) = &stbl.ctts {
            if ctts.sample_count() != sample_count {
                return Err(IntegrityError::new(format!(
                    "ctts describes {} samples but stts {}",
                    ctts.sample_count(),
                    sample_count
                ))
                .into());
            }
        }
        if let Some(sdtp) = &stbl.sdtp {
            if (sdtp.flags.len() as u64) < sample_count {
                return Err(IntegrityError::new(format!(
                    "sdtp describes {} samples but stts {}",
                    sdtp.flags.len(),
                    sample_count
                ))
                .into());
            }
        }
        let stss = stbl.stss.as_ref().map(|b| {
            let mut numbers = b.sample_numbers.clone();
            if numbers.windows(2).any(|w| w[0] >= w[1]) {
                warn!("stss sample numbers out of order, sorting");
                numbers.sort_unstable();
                numbers.dedup();
            }
            numbers
        });

        Ok(Self {
            kind,
            timescale,
            stts: stts.entries.clone(),
            ctts: stbl.ctts.as_ref().map(|b| b.entries.clone()),
            stss,
            sdtp: stbl.sdtp.as_ref().map(|b| b.flags.clone()),
            stsc: stsc.entries.clone(),
            stsz: stsz.clone(),
            chunk_offsets: stco.offsets.clone(),
            sample_count,
        })
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn timescale(&self) -> u32 {
        self.timescale
    }

    pub fn has_sync_table(&self) -> bool {
        self.stss.is_some()
    }

    /// Total duration in native units.
    pub fn native_duration(&self) -> u64 {
        self.stts
            .iter()
            .map(|e| e.sample_count as u64 * e.sample_delta as u64)
            .sum()
    }

    /// Total duration in reference units.
    pub fn duration(&self) -> u64 {
        from_scale(self.timescale, self.native_duration())
    }

    /// Iterate every sample in decode order.
    pub fn iter(self: &Rc<Self>) -> SampleIter {
        SampleIter::new(Rc::clone(self))
    }

    /// Decode times of the sync samples, in reference units.
    pub fn sync_times(self: &Rc<Self>) -> Vec<u64> {
        self.iter()
            .filter(|s| s.slice_type.is_sync())
            .filter_map(|s| s.timestamp)
            .collect()
    }

    /// Samples of the window `[start, end]` (reference units), widened to sync
    /// boundaries: the first sample is the first sync sample at or after `start`, and the
    /// window stops before the first sync sample past `end`.
    pub fn locate_samples(self: &Rc<Self>, start: u64, end: u64) -> Vec<StreamDataBlockInfo> {
        let mut located = Vec::new();
        let mut started = false;
        for (slice, decode_time) in self.iter().with_decode_times() {
            let sync = slice.slice_type.is_sync();
            if !started {
                if decode_time >= start && sync {
                    started = true;
                } else {
                    continue;
                }
            } else if decode_time > end && sync {
                break;
            }
            located.push(slice);
        }
        located
    }
}

/// Iterator over the samples of a [`SampleTable`]
pub struct SampleIter {
    table: Rc<SampleTable>,
    index: u64,
    native_time: u64,
    stts_index: usize,
    stts_left: u32,
    ctts_index: usize,
    ctts_left: u32,
    stss_index: usize,
    stsc_index: usize,
    chunk: u64,
    chunk_left: u32,
    next_offset: u64,
}

impl SampleIter {
    fn new(table: Rc<SampleTable>) -> Self {
        let stts_left = table.stts.first().map_or(0, |e| e.sample_count);
        let ctts_left = table
            .ctts
            .as_ref()
            .and_then(|c| c.first())
            .map_or(0, |e| e.sample_count);
        Self {
            table,
            index: 0,
            native_time: 0,
            stts_index: 0,
            stts_left,
            ctts_index: 0,
            ctts_left,
            stss_index: 0,
            stsc_index: 0,
            chunk: 0,
            chunk_left: 0,
            next_offset: 0,
        }
    }

    /// Pair every slice with its decode time, including B-frames.
    pub fn with_decode_times(mut self) -> impl Iterator<Item = (StreamDataBlockInfo, u64)> {
        std::iter::from_fn(move || {
            let time = from_scale(self.table.timescale, self.native_time);
            self.next().map(|s| (s, time))
        })
    }

    fn next_delta(&mut self) -> u32 {
        let stts = &self.table.stts;
        while self.stts_left == 0 && self.stts_index + 1 < stts.len() {
            self.stts_index += 1;
            self.stts_left = stts[self.stts_index].sample_count;
        }
        self.stts_left = self.stts_left.saturating_sub(1);
        stts.get(self.stts_index).map_or(0, |e| e.sample_delta)
    }

    fn next_composition(&mut self) -> Option<i64> {
        let ctts = self.table.ctts.as_ref()?;
        while self.ctts_left == 0 && self.ctts_index + 1 < ctts.len() {
            self.ctts_index += 1;
            self.ctts_left = ctts[self.ctts_index].sample_count;
        }
        self.ctts_left = self.ctts_left.saturating_sub(1);
        ctts.get(self.ctts_index).map(|e| e.sample_offset)
    }

    fn is_sync(&mut self, number: u32) -> bool {
        let Some(stss) = self.table.stss.as_ref() else {
            return true;
        };
        while self.stss_index < stss.len() && stss[self.stss_index] < number {
            self.stss_index += 1;
        }
        stss.get(self.stss_index) == Some(&number)
    }

    /// Byte offset of the next sample, moving to the next chunk when needed.
    fn next_offset(&mut self, size: u32) -> u64 {
        let stsc = &self.table.stsc;
        while self.chunk_left == 0 {
            self.chunk += 1;
            while self.stsc_index + 1 < stsc.len()
                && stsc[self.stsc_index + 1].first_chunk as u64 <= self.chunk
            {
                self.stsc_index += 1;
            }
            self.chunk_left = stsc.get(self.stsc_index).map_or(1, |e| e.samples_per_chunk);
            self.next_offset = self
                .table
                .chunk_offsets
                .get(self.chunk as usize - 1)
                .copied()
                .unwrap_or(0);
        }
        self.chunk_left -= 1;
        let offset = self.next_offset;
        self.next_offset += size as u64;
        offset
    }
}

impl Iterator for SampleIter {
    type Item = StreamDataBlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.table.sample_count {
            return None;
        }
        let table = Rc::clone(&self.table);
        let index = self.index;
        let number = index as u32 + 1;
        let size = table.stsz.size_of(index as usize).unwrap_or(0);
        let delta = self.next_delta();
        let composition = self.next_composition();
        let sync = self.is_sync(number);
        let offset = self.next_offset(size);

        let start = from_scale(table.timescale, self.native_time);
        let end = from_scale(table.timescale, self.native_time + delta as u64);
        self.native_time += delta as u64;
        self.index += 1;

        let disposable = table
            .sdtp
            .as_ref()
            .and_then(|f| f.get(index as usize))
            .map_or(false, |f| is_disposable(*f));
        let slice_type = match table.kind {
            TrackKind::Audio => SliceType::Audio,
            TrackKind::Data => SliceType::Data,
            TrackKind::Video if sync => SliceType::KeyFrame,
            TrackKind::Video if disposable => SliceType::BFrame,
            TrackKind::Video => SliceType::DeltaFrame,
        };
        let timestamp = if slice_type == SliceType::BFrame {
            None
        } else {
            Some(start)
        };
        Some(StreamDataBlockInfo {
            index,
            offset,
            length: size,
            duration: end - start,
            timestamp,
            composition: composition.map(|native| CompositionOffset {
                reference: from_scale_signed(table.timescale, native),
                native,
            }),
            slice_type,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.table.sample_count - self.index) as usize;
        (n, Some(n))
    }
}
