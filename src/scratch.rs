//! Append-only scratch sequences of fixed-width records.
//!
//! Sample tables of long tracks are built incrementally: records are appended while
//! samples are written and replayed exactly once when the table is serialized. Small
//! sequences stay in memory; once a sequence grows past the configured threshold it
//! spills to an anonymous temporary file which the OS removes when it is closed.

use crate::errors::{MediaRecodeResult, ResourceError};
use log::debug;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

/// Bytes kept in memory per sequence before spilling to disk.
pub const DEFAULT_SPILL_THRESHOLD: usize = 1 << 20;

/// Where and when scratch sequences spill to disk.
#[derive(Debug, Clone)]
pub struct ScratchConfig {
    pub spill_threshold: usize,
    /// Directory for spilled files, the system temp directory when `None`
    pub directory: Option<PathBuf>,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            directory: None,
        }
    }
}

impl ScratchConfig {
    pub fn with_spill_threshold(mut self, bytes: usize) -> Self {
        self.spill_threshold = bytes;
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    fn create_file(&self) -> MediaRecodeResult<File> {
        let file = match &self.directory {
            Some(dir) => tempfile::tempfile_in(dir),
            None => tempfile::tempfile(),
        };
        file.map_err(|e| ResourceError::new(format!("cannot create scratch file: {}", e)).into())
    }
}

/// A record with a fixed serialized width.
pub trait FixedRecord: Sized {
    const WIDTH: usize;
    fn encode(&self, out: &mut [u8]);
    fn decode(bytes: &[u8]) -> Self;
}

impl FixedRecord for u8 {
    const WIDTH: usize = 1;
    fn encode(&self, out: &mut [u8]) {
        out[0] = *self;
    }
    fn decode(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl FixedRecord for u32 {
    const WIDTH: usize = 4;
    fn encode(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_be_bytes());
    }
    fn decode(bytes: &[u8]) -> Self {
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl FixedRecord for u64 {
    const WIDTH: usize = 8;
    fn encode(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_be_bytes());
    }
    fn decode(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[..8]);
        u64::from_be_bytes(buf)
    }
}

/// Append-only sequence of `T`, replayed sequentially once.
pub struct ScratchSequence<T: FixedRecord> {
    config: ScratchConfig,
    buffer: Vec<u8>,
    file: Option<BufWriter<File>>,
    len: u64,
    _record: PhantomData<T>,
}

impl<T: FixedRecord> ScratchSequence<T> {
    pub fn new(config: &ScratchConfig) -> Self {
        Self {
            config: config.clone(),
            buffer: Vec::new(),
            file: None,
            len: 0,
            _record: PhantomData,
        }
    }

    /// Number of records appended so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_spilled(&self) -> bool {
        self.file.is_some()
    }

    pub fn push(&mut self, record: &T) -> MediaRecodeResult<()> {
        let start = self.buffer.len();
        self.buffer.resize(start + T::WIDTH, 0);
        record.encode(&mut self.buffer[start..]);
        self.len += 1;
        if self.buffer.len() >= self.config.spill_threshold {
            self.spill()?;
        }
        Ok(())
    }

    fn spill(&mut self) -> MediaRecodeResult<()> {
        if self.file.is_none() {
            debug!(
                "spilling scratch sequence of {} records to disk",
                self.len
            );
            self.file = Some(BufWriter::new(self.config.create_file()?));
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(&self.buffer)?;
        }
        self.buffer.clear();
        Ok(())
    }

    /// Consume the sequence and iterate its records in append order.
    pub fn replay(self) -> MediaRecodeResult<Replay<T>> {
        let source = match self.file {
            None => ReplaySource::Memory {
                data: self.buffer,
                pos: 0,
            },
            Some(writer) => {
                let mut file = writer.into_inner().map_err(|e| e.into_error())?;
                file.write_all(&self.buffer)?;
                file.seek(SeekFrom::Start(0))?;
                ReplaySource::File(BufReader::new(file))
            }
        };
        Ok(Replay {
            source,
            remaining: self.len,
            _record: PhantomData,
        })
    }
}

enum ReplaySource {
    Memory { data: Vec<u8>, pos: usize },
    File(BufReader<File>),
}

/// Sequential reader over a consumed [`ScratchSequence`].
pub struct Replay<T: FixedRecord> {
    source: ReplaySource,
    remaining: u64,
    _record: PhantomData<T>,
}

impl<T: FixedRecord> Iterator for Replay<T> {
    type Item = MediaRecodeResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        match &mut self.source {
            ReplaySource::Memory { data, pos } => {
                let record = T::decode(&data[*pos..*pos + T::WIDTH]);
                *pos += T::WIDTH;
                Some(Ok(record))
            }
            ReplaySource::File(reader) => {
                let mut buf = vec![0u8; T::WIDTH];
                match reader.read_exact(&mut buf) {
                    Ok(()) => Some(Ok(T::decode(&buf))),
                    Err(e) => {
                        self.remaining = 0;
                        Some(Err(e.into()))
                    }
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}
