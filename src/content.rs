//! Re-readable document content.
//!
//! Several handlers inspect the same document content one after the other,
//! so content is cached once and can be opened any number of times. Small
//! content stays in memory; anything larger than the configured threshold
//! spills to a temporary file that is removed when the last handle drops.

use bytes::Bytes;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, Write};
use std::sync::Arc;
use tempfile::NamedTempFile;

use crate::error::Result;

/// Default number of bytes kept in memory before spilling to disk (1 MiB).
pub const DEFAULT_MAX_MEMORY_CACHE_SIZE: usize = 1024 * 1024;

/// Readable and seekable content stream.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

#[derive(Clone)]
enum Storage {
    Memory(Bytes),
    File { file: Arc<NamedTempFile>, len: u64 },
}

/// Cached, re-readable byte content of a document.
#[derive(Clone)]
pub struct CachedContent {
    storage: Storage,
}

impl fmt::Debug for CachedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.storage {
            Storage::Memory(bytes) => f
                .debug_struct("CachedContent")
                .field("memory", &bytes.len())
                .finish(),
            Storage::File { file, len } => f
                .debug_struct("CachedContent")
                .field("file", &file.path())
                .field("len", len)
                .finish(),
        }
    }
}

impl CachedContent {
    /// Content held entirely in memory.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            storage: Storage::Memory(bytes.into()),
        }
    }

    /// Empty content.
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// Cache everything `reader` yields, spilling to disk past the cache limit.
    pub fn from_reader<R: Read + ?Sized>(reader: &mut R, cache: &ContentCache) -> Result<Self> {
        let mut writer = cache.writer();
        io::copy(reader, &mut writer)?;
        writer.finish()
    }

    /// Open a fresh stream positioned at the start of the content.
    pub fn open(&self) -> Result<Box<dyn ReadSeek + Send>> {
        match &self.storage {
            Storage::Memory(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            Storage::File { file, .. } => {
                let reopened = File::open(file.path())?;
                Ok(Box::new(BufReader::new(reopened)))
            },
        }
    }

    /// Content length in bytes.
    pub fn len(&self) -> u64 {
        match &self.storage {
            Storage::Memory(bytes) => bytes.len() as u64,
            Storage::File { len, .. } => *len,
        }
    }

    /// Whether the content has zero bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the content is held in memory rather than in a temp file.
    pub fn is_in_memory(&self) -> bool {
        matches!(self.storage, Storage::Memory(_))
    }

    /// Read the first `max` bytes (fewer if the content is shorter).
    pub fn head(&self, max: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(max.min(self.len() as usize));
        self.open()?.take(max as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Read the whole content as a (lossy) UTF-8 string.
    ///
    /// Meant for tests and small documents; handlers stream instead.
    pub fn read_to_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.open()?.read_to_end(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Byte-for-byte comparison of two contents, streamed.
    pub fn content_eq(&self, other: &CachedContent) -> Result<bool> {
        if self.len() != other.len() {
            return Ok(false);
        }
        let mut a = self.open()?;
        let mut b = other.open()?;
        let mut buf_a = [0u8; 8192];
        let mut buf_b = [0u8; 8192];
        loop {
            let n = read_full(&mut a, &mut buf_a)?;
            let m = read_full(&mut b, &mut buf_b)?;
            if n != m || buf_a[..n] != buf_b[..m] {
                return Ok(false);
            }
            if n == 0 {
                return Ok(true);
            }
        }
    }
}

impl Default for CachedContent {
    fn default() -> Self {
        Self::empty()
    }
}

fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}

/// Creates content buffers sharing one memory threshold.
#[derive(Debug, Clone, Copy)]
pub struct ContentCache {
    max_memory_size: usize,
}

impl ContentCache {
    /// Cache keeping at most `max_memory_size` bytes in memory per buffer.
    pub fn new(max_memory_size: usize) -> Self {
        Self { max_memory_size }
    }

    /// Maximum bytes kept in memory per buffer.
    pub fn max_memory_size(&self) -> usize {
        self.max_memory_size
    }

    /// New output sink producing a [`CachedContent`].
    pub fn writer(&self) -> CachedContentWriter {
        CachedContentWriter {
            max_memory_size: self.max_memory_size,
            memory: Vec::new(),
            file: None,
            len: 0,
        }
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEMORY_CACHE_SIZE)
    }
}

/// Output sink that becomes [`CachedContent`] once finished.
pub struct CachedContentWriter {
    max_memory_size: usize,
    memory: Vec<u8>,
    file: Option<NamedTempFile>,
    len: u64,
}

impl CachedContentWriter {
    fn spill(&mut self) -> io::Result<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(&self.memory)?;
        log::debug!("Content exceeded {} bytes, spilled to {:?}", self.max_memory_size, file.path());
        self.memory = Vec::new();
        self.file = Some(file);
        Ok(())
    }

    /// Bytes written so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether nothing was written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Seal the sink into re-readable content.
    pub fn finish(mut self) -> Result<CachedContent> {
        match self.file.take() {
            Some(mut file) => {
                file.flush()?;
                Ok(CachedContent {
                    storage: Storage::File {
                        file: Arc::new(file),
                        len: self.len,
                    },
                })
            },
            None => Ok(CachedContent::from_bytes(std::mem::take(&mut self.memory))),
        }
    }
}

impl Write for CachedContentWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.file.is_none() && self.memory.len() + buf.len() > self.max_memory_size {
            self.spill()?;
        }
        match self.file.as_mut() {
            Some(file) => file.write_all(buf)?,
            None => self.memory.extend_from_slice(buf),
        }
        self.len += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}
