//! Incremental construction of the sample tables of one destination track.
//!
//! Every sample appends to scratch sequences as it is written: duration runs, sizes,
//! sync sample numbers, chunk offsets, and (only once needed) composition offset runs and
//! dependency flags. `finish` flushes the open runs and hands back [`BuiltTables`], which
//! knows its serialized size up front and streams the tables out of scratch storage.

use crate::errors::MediaRecodeResult;
use crate::media::slice::{Slice, SliceType};
use crate::mp4::box_writer::BoxWriter;
use crate::mp4::ctts::{CttsBox, CttsEntry};
use crate::mp4::r#box::Mp4Box;
use crate::mp4::sdtp::SdtpBox;
use crate::mp4::stco::ChunkOffsetBox;
use crate::mp4::stsc::StscBox;
use crate::mp4::stss::StssBox;
use crate::mp4::stsz::StszBox;
use crate::mp4::stts::{SttsBox, SttsEntry};
use crate::scratch::{FixedRecord, Replay, ScratchConfig, ScratchSequence};
use crate::time::{interval_to_scale, to_scale_signed};
use log::debug;
use std::io::{Seek, Write};

/// A run of `count` equal values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Run {
    pub count: u32,
    pub value: i64,
}

impl FixedRecord for Run {
    const WIDTH: usize = 12;

    fn encode(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.count.to_be_bytes());
        out[4..12].copy_from_slice(&self.value.to_be_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        let count = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let mut value = [0u8; 8];
        value.copy_from_slice(&bytes[4..12]);
        Run {
            count,
            value: i64::from_be_bytes(value),
        }
    }
}

/// Extend `run` with `value`, pushing the finished run to `seq` when a new one starts.
/// Without a sequence the run is only counted.
fn extend_run(
    seq: Option<&mut ScratchSequence<Run>>,
    run: &mut Run,
    value: i64,
) -> MediaRecodeResult<()> {
    if run.count > 0 && run.value == value && run.count < u32::MAX {
        run.count += 1;
        return Ok(());
    }
    if run.count > 0 {
        if let Some(seq) = seq {
            seq.push(run)?;
        }
    }
    *run = Run { count: 1, value };
    Ok(())
}

/// Which optional tables a track records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableOptions {
    /// Record composition offsets (`ctts`)
    pub composition_offsets: bool,
    /// Record dependency flags (`sdtp`); emitted only when the track has B-frames
    pub dependencies: bool,
}

/// Append-only builder for one track's tables
pub struct TableBuilder {
    timescale: u32,
    options: TableOptions,
    config: ScratchConfig,
    durations: ScratchSequence<Run>,
    duration_run: Run,
    sizes: ScratchSequence<u32>,
    first_size: Option<u32>,
    constant_size: bool,
    sync_samples: ScratchSequence<u32>,
    offsets: ScratchSequence<u64>,
    large_offsets: bool,
    compositions: Option<ScratchSequence<Run>>,
    composition_run: Run,
    negative_composition: bool,
    dependencies: Option<ScratchSequence<u8>>,
    has_b_frames: bool,
    b_frame_elapsed: u64,
    sample_count: u64,
    reference_time: u64,
    native_duration: u64,
}

impl TableBuilder {
    pub fn new(timescale: u32, options: TableOptions, config: &ScratchConfig) -> Self {
        Self {
            timescale,
            options,
            config: config.clone(),
            durations: ScratchSequence::new(config),
            duration_run: Run::default(),
            sizes: ScratchSequence::new(config),
            first_size: None,
            constant_size: true,
            sync_samples: ScratchSequence::new(config),
            offsets: ScratchSequence::new(config),
            large_offsets: false,
            compositions: None,
            composition_run: Run::default(),
            negative_composition: false,
            dependencies: options.dependencies.then(|| ScratchSequence::new(config)),
            has_b_frames: false,
            b_frame_elapsed: 0,
            sample_count: 0,
            reference_time: 0,
            native_duration: 0,
        }
    }

    pub fn timescale(&self) -> u32 {
        self.timescale
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Duration written so far, in native units.
    pub fn native_duration(&self) -> u64 {
        self.native_duration
    }

    /// Duration written so far, in reference units.
    pub fn reference_duration(&self) -> u64 {
        self.reference_time
    }

    /// Composition offset in native units. Key and delta frames reset the B-frame
    /// accumulator; a B-frame adds its duration to it and uses the sum. An offset
    /// carried over from the source wins over the accumulator.
    fn composition_offset(&mut self, slice: &Slice) -> i64 {
        if slice.slice_type == SliceType::BFrame {
            self.b_frame_elapsed += slice.duration;
        } else {
            self.b_frame_elapsed = 0;
        }
        match slice.composition {
            Some(c) => to_scale_signed(self.timescale, c.reference),
            None if slice.slice_type == SliceType::BFrame => {
                to_scale_signed(self.timescale, self.b_frame_elapsed as i64)
            }
            None => 0,
        }
    }

    fn push_composition(&mut self, offset: i64, b_frame: bool) -> MediaRecodeResult<()> {
        if self.compositions.is_none() && (offset != 0 || b_frame) {
            debug!(
                "starting composition offsets at sample {}",
                self.sample_count
            );
            self.compositions = Some(ScratchSequence::new(&self.config));
        }
        if offset < 0 {
            self.negative_composition = true;
        }
        extend_run(self.compositions.as_mut(), &mut self.composition_run, offset)
    }

    /// Record one sample written at `offset` in the destination.
    pub fn push(&mut self, slice: &Slice, offset: u64) -> MediaRecodeResult<()> {
        let delta = interval_to_scale(self.timescale, self.reference_time, slice.duration);
        self.reference_time += slice.duration;
        self.native_duration += delta;
        extend_run(Some(&mut self.durations), &mut self.duration_run, delta as i64)?;

        self.sizes.push(&slice.length)?;
        match self.first_size {
            None => self.first_size = Some(slice.length),
            Some(first) if first != slice.length => self.constant_size = false,
            Some(_) => {}
        }

        if slice.slice_type.is_sync() {
            self.sync_samples.push(&(self.sample_count as u32 + 1))?;
        }

        self.offsets.push(&offset)?;
        if offset > u32::MAX as u64 {
            self.large_offsets = true;
        }

        let b_frame = slice.slice_type == SliceType::BFrame;
        if self.options.composition_offsets {
            let composition = self.composition_offset(slice);
            self.push_composition(composition, b_frame)?;
        }
        if let Some(dependencies) = self.dependencies.as_mut() {
            dependencies.push(&slice.slice_type.sdtp_flags())?;
        }
        self.has_b_frames |= b_frame;
        self.sample_count += 1;
        Ok(())
    }

    /// Flush the open runs. Consuming the builder guarantees this happens once.
    pub fn finish(mut self) -> MediaRecodeResult<BuiltTables> {
        if self.duration_run.count > 0 {
            self.durations.push(&self.duration_run)?;
        }
        if let Some(compositions) = self.compositions.as_mut() {
            if self.composition_run.count > 0 {
                compositions.push(&self.composition_run)?;
            }
        }
        let sample_count = self.sample_count;
        let sync = if self.sync_samples.len() == sample_count {
            None
        } else {
            Some(counted(self.sync_samples)?)
        };
        let dependencies = match self.dependencies {
            Some(seq) if self.has_b_frames => Some(counted(seq)?),
            _ => None,
        };
        let sizes = match self.first_size {
            Some(size) if self.constant_size => SizeTable::Constant(size),
            _ => SizeTable::Varying(self.sizes.replay()?),
        };
        Ok(BuiltTables {
            sample_count,
            native_duration: self.native_duration,
            durations: counted(self.durations)?,
            compositions: self.compositions.map(counted).transpose()?,
            composition_version: if self.negative_composition { 1 } else { 0 },
            sync,
            dependencies,
            sizes,
            offsets: self.offsets.replay()?,
            large_offsets: self.large_offsets,
        })
    }
}

struct Counted<T: FixedRecord> {
    len: u64,
    records: Replay<T>,
}

fn counted<T: FixedRecord>(seq: ScratchSequence<T>) -> MediaRecodeResult<Counted<T>> {
    Ok(Counted {
        len: seq.len(),
        records: seq.replay()?,
    })
}

enum SizeTable {
    Constant(u32),
    Varying(Replay<u32>),
}

/// Finished tables of one track, ready to be streamed into its `stbl`
pub struct BuiltTables {
    sample_count: u64,
    native_duration: u64,
    durations: Counted<Run>,
    compositions: Option<Counted<Run>>,
    composition_version: u8,
    sync: Option<Counted<u32>>,
    dependencies: Option<Counted<u8>>,
    sizes: SizeTable,
    offsets: Replay<u64>,
    large_offsets: bool,
}

impl BuiltTables {
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn native_duration(&self) -> u64 {
        self.native_duration
    }

    pub fn has_composition_offsets(&self) -> bool {
        self.compositions.is_some()
    }

    pub fn has_sync_table(&self) -> bool {
        self.sync.is_some()
    }

    pub fn has_dependencies(&self) -> bool {
        self.dependencies.is_some()
    }

    fn chunk_table(&self) -> StscBox {
        StscBox::one_sample_per_chunk(self.sample_count)
    }

    /// Serialized size of all tables.
    pub fn size(&self) -> u64 {
        let n = self.sample_count;
        SttsBox::size_for(self.durations.len)
            + self.compositions.as_ref().map_or(0, |c| CttsBox::size_for(c.len))
            + self.sync.as_ref().map_or(0, |s| StssBox::size_for(s.len))
            + self.dependencies.as_ref().map_or(0, |d| SdtpBox::size_for(d.len))
            + self.chunk_table().box_size()
            + StszBox::size_for(n, matches!(self.sizes, SizeTable::Constant(_)))
            + ChunkOffsetBox::size_for(n, self.large_offsets)
    }

    /// Stream the tables, in `stbl` order, consuming the scratch storage.
    pub fn write<W: Write + Seek>(self, w: &mut BoxWriter<W>) -> MediaRecodeResult<()> {
        let n = self.sample_count;
        let chunk_table = self.chunk_table();

        w.begin(SttsBox::TYPE, SttsBox::size_for(self.durations.len))?;
        w.write_all(&[0u8; 4])?;
        w.write_all(&(self.durations.len as u32).to_be_bytes())?;
        for run in self.durations.records {
            let run = run?;
            SttsBox::write_entry(
                w,
                &SttsEntry {
                    sample_count: run.count,
                    sample_delta: run.value as u32,
                },
            )?;
        }
        w.end()?;

        if let Some(compositions) = self.compositions {
            let version = self.composition_version;
            w.begin(CttsBox::TYPE, CttsBox::size_for(compositions.len))?;
            w.write_all(&[version, 0, 0, 0])?;
            w.write_all(&(compositions.len as u32).to_be_bytes())?;
            for run in compositions.records {
                let run = run?;
                CttsBox::write_entry(
                    w,
                    version,
                    &CttsEntry {
                        sample_count: run.count,
                        sample_offset: run.value,
                    },
                )?;
            }
            w.end()?;
        }

        if let Some(sync) = self.sync {
            w.begin(StssBox::TYPE, StssBox::size_for(sync.len))?;
            w.write_all(&[0u8; 4])?;
            w.write_all(&(sync.len as u32).to_be_bytes())?;
            for number in sync.records {
                w.write_all(&number?.to_be_bytes())?;
            }
            w.end()?;
        }

        if let Some(dependencies) = self.dependencies {
            w.begin(SdtpBox::TYPE, SdtpBox::size_for(dependencies.len))?;
            w.write_all(&[0u8; 4])?;
            for flags in dependencies.records {
                w.write_all(&[flags?])?;
            }
            w.end()?;
        }

        chunk_table.write_box(w)?;

        match self.sizes {
            SizeTable::Constant(size) => StszBox {
                sample_size: size,
                sample_count: n as u32,
                entry_sizes: Vec::new(),
            }
            .write_box(w)?,
            SizeTable::Varying(sizes) => {
                w.begin(StszBox::TYPE, StszBox::size_for(n, false))?;
                w.write_all(&[0u8; 4])?;
                w.write_all(&0u32.to_be_bytes())?;
                w.write_all(&(n as u32).to_be_bytes())?;
                for size in sizes {
                    w.write_all(&size?.to_be_bytes())?;
                }
                w.end()?;
            }
        }

        w.begin(
            ChunkOffsetBox::type_for(self.large_offsets),
            ChunkOffsetBox::size_for(n, self.large_offsets),
        )?;
        w.write_all(&[0u8; 4])?;
        w.write_all(&(n as u32).to_be_bytes())?;
        for offset in self.offsets {
            ChunkOffsetBox::write_entry(w, self.large_offsets, offset?)?;
        }
        w.end()?;
        Ok(())
    }
}
