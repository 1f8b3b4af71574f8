use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// A seekable byte source with a known length
pub trait SeekableStream: Read + Seek {
    /// Total length in bytes. The current position is preserved.
    fn byte_len(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let len = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(len)
    }
}

/// Local file wrapper
pub struct LocalSeekableStream {
    inner: BufReader<File>,
    len: u64,
}

impl LocalSeekableStream {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(LocalSeekableStream {
            inner: BufReader::new(file),
            len,
        })
    }
}

impl Read for LocalSeekableStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for LocalSeekableStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl SeekableStream for LocalSeekableStream {
    fn byte_len(&mut self) -> io::Result<u64> {
        Ok(self.len)
    }
}

impl<T: AsRef<[u8]>> SeekableStream for Cursor<T> {
    fn byte_len(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().as_ref().len() as u64)
    }
}

impl SeekableStream for File {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_local_stream_length() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 37]).unwrap();
        let mut stream = LocalSeekableStream::open(file.path()).unwrap();
        assert_eq!(stream.byte_len().unwrap(), 37);
        stream.seek(SeekFrom::Start(30)).unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest.len(), 7);
    }

    #[test]
    fn test_default_length_keeps_position() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[1u8; 10]).unwrap();
        file.seek(SeekFrom::Start(4)).unwrap();
        assert_eq!(file.byte_len().unwrap(), 10);
        assert_eq!(file.stream_position().unwrap(), 4);
    }
}
