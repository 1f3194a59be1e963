//! Hybrid memory/file context buffer
//!
//! A [`ContextBuffer`] starts in memory and moves to a file under the shared
//! directory the first time a write would push it past its memory limit. The
//! move is one-way and invisible to callers of [`ContextBuffer::write`] and
//! [`ContextBuffer::read`].

use crate::error::{DistributedError, Result};
use crate::spill::TransactionContext;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// What actually travels to the workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchedContext {
    /// The whole stream, sent along with the plan
    Inline(Vec<u8>),
    /// Stream spilled to shared storage
    Shared(PathBuf),
}

impl DispatchedContext {
    pub fn is_shared(&self) -> bool {
        matches!(self, DispatchedContext::Shared(_))
    }
}

/// Where the bytes currently live
#[derive(Debug)]
enum Mode {
    /// Bytes held in process memory
    Memory {
        /// Everything written so far
        data: Vec<u8>,
        /// Offset of the next byte to read
        read_pos: usize,
    },
    /// Bytes spilled to the file at the buffer's path
    File {
        /// Open while the producer is still appending
        writer: Option<BufWriter<File>>,
        /// Opened lazily on the first read
        reader: Option<BufReader<File>>,
    },
}

/// Query context byte stream, in memory or spilled to shared storage
#[derive(Debug)]
pub struct ContextBuffer {
    /// Spill file location, empty for contexts received inline
    path: PathBuf,
    /// Current storage of the bytes
    mode: Mode,
    /// Largest number of bytes kept in memory before spilling
    memory_limit: usize,
    /// Total bytes written, or the file length for shared contexts
    size: u64,
    /// Bytes handed out by `read` so far
    consumed: u64,
}

/// `{dir}/session_{session}_id_{counter}_query_context`
pub fn context_path(dir: &Path, session_id: u32, counter: u32) -> PathBuf {
    dir.join(format!(
        "session_{}_id_{}_query_context",
        session_id, counter
    ))
}

impl ContextBuffer {
    /// Empty in-memory buffer whose spill file would be placed under `dir`
    pub fn create(dir: &Path, session_id: u32, counter: u32, memory_limit: usize) -> Self {
        Self {
            path: context_path(dir, session_id, counter),
            mode: Mode::Memory {
                data: Vec::new(),
                read_pos: 0,
            },
            memory_limit,
            size: 0,
            consumed: 0,
        }
    }

    /// Open a context another process spilled to shared storage
    pub fn open_shared(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            mode: Mode::File {
                writer: None,
                reader: Some(BufReader::new(file)),
            },
            memory_limit: 0,
            size,
            consumed: 0,
        })
    }

    /// Wrap a context received inline
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self {
            path: PathBuf::new(),
            mode: Mode::Memory { data, read_pos: 0 },
            memory_limit: usize::MAX,
            size,
            consumed: 0,
        }
    }

    /// Worker-side entry point for whatever the coordinator shipped
    pub fn from_dispatched(context: DispatchedContext) -> Result<Self> {
        match context {
            DispatchedContext::Inline(data) => Ok(Self::from_bytes(data)),
            DispatchedContext::Shared(path) => Self::open_shared(path),
        }
    }

    /// Spill file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total bytes written
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes not yet read
    pub fn remaining(&self) -> u64 {
        self.size.saturating_sub(self.consumed)
    }

    /// Whether the bytes have moved to a file
    pub fn is_spilled(&self) -> bool {
        matches!(self.mode, Mode::File { .. })
    }

    /// Append `bytes`, spilling to file if the memory limit would be exceeded
    pub fn write(&mut self, bytes: &[u8], txn: &mut TransactionContext) -> Result<()> {
        if let Mode::Memory { data, .. } = &mut self.mode {
            if data.len() + bytes.len() <= self.memory_limit {
                grow(data, bytes.len(), self.memory_limit);
                data.extend_from_slice(bytes);
                self.size += bytes.len() as u64;
                return Ok(());
            }
            self.spill(txn)?;
        }

        match &mut self.mode {
            Mode::File {
                writer: Some(writer),
                ..
            } => {
                writer.write_all(bytes)?;
                self.size += bytes.len() as u64;
                Ok(())
            }
            _ => Err(DistributedError::IoError(std::io::Error::new(
                ErrorKind::Other,
                format!("query context {} is not open for writing", self.path.display()),
            ))),
        }
    }

    fn spill(&mut self, txn: &mut TransactionContext) -> Result<()> {
        self.spill_with(txn, |path| {
            OpenOptions::new().write(true).create_new(true).open(path)
        })
    }

    /// The file is registered with `txn` as soon as it exists, so a failed
    /// flush still leaves it to the transaction's cleanup.
    fn spill_with<F>(&mut self, txn: &mut TransactionContext, open: F) -> Result<()>
    where
        F: FnOnce(&Path) -> std::io::Result<File>,
    {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = open(&self.path)?;
        txn.register(&self.path);

        let data = match std::mem::replace(
            &mut self.mode,
            Mode::File {
                writer: None,
                reader: None,
            },
        ) {
            Mode::Memory { data, .. } => data,
            other => {
                self.mode = other;
                return Ok(());
            }
        };
        let mut writer = BufWriter::new(file);
        let flushed = writer.write_all(&data);
        self.mode = Mode::File {
            writer: Some(writer),
            reader: None,
        };
        flushed?;

        tracing::info!(
            "Query context exceeded {} bytes in memory, spilled to {}",
            self.memory_limit,
            self.path.display()
        );
        Ok(())
    }

    /// Read exactly `n` bytes. `Ok(None)` only when `error_on_eof` is false
    /// and the stream is exactly at its end.
    pub fn read(&mut self, n: usize, error_on_eof: bool) -> Result<Option<Vec<u8>>> {
        let available = self.remaining();
        if available == 0 && n > 0 && !error_on_eof {
            return Ok(None);
        }
        if n as u64 > available {
            return Err(unexpected_eof(n, available));
        }
        self.consumed += n as u64;

        match &mut self.mode {
            Mode::Memory { data, read_pos } => {
                let out = data[*read_pos..*read_pos + n].to_vec();
                *read_pos += n;
                Ok(Some(out))
            }
            Mode::File { writer, reader } => {
                if reader.is_none() {
                    if let Some(mut w) = writer.take() {
                        w.flush()?;
                    }
                    *reader = Some(BufReader::new(File::open(&self.path)?));
                }
                let reader = reader.as_mut().ok_or_else(|| {
                    std::io::Error::new(ErrorKind::Other, "query context reader is closed")
                })?;
                let mut out = vec![0u8; n];
                let mut filled = 0;
                while filled < n {
                    match reader.read(&mut out[filled..]) {
                        Ok(0) => break,
                        Ok(k) => filled += k,
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                if filled < n {
                    return Err(unexpected_eof(n, filled as u64));
                }
                Ok(Some(out))
            }
        }
    }

    /// Release the file handle. Safe to call more than once. A later read
    /// starts again from the beginning of the file.
    pub fn close(&mut self) -> Result<()> {
        if let Mode::File { writer, reader } = &mut self.mode {
            if let Some(mut w) = writer.take() {
                w.flush()?;
            }
            if reader.take().is_some() {
                self.consumed = 0;
            }
        }
        Ok(())
    }

    /// Hand the finished context over for dispatch
    pub fn into_dispatched(mut self) -> Result<DispatchedContext> {
        self.close()?;
        let size = self.size;
        match std::mem::replace(
            &mut self.mode,
            Mode::File {
                writer: None,
                reader: None,
            },
        ) {
            Mode::Memory { data, .. } => {
                tracing::debug!("Query context {} bytes, passed by dispatching", size);
                Ok(DispatchedContext::Inline(data))
            }
            Mode::File { .. } => {
                tracing::debug!("Query context {} bytes, passed by shared storage", size);
                Ok(DispatchedContext::Shared(std::mem::take(&mut self.path)))
            }
        }
    }

    /// Close and release everything the buffer holds
    pub fn drop_context(mut self) -> Result<()> {
        self.close()
    }
}

/// Grow capacity by doubling, bounded by `limit`, never short of what is needed
fn grow(data: &mut Vec<u8>, additional: usize, limit: usize) {
    let needed = data.len() + additional;
    if needed <= data.capacity() {
        return;
    }
    let doubled = (1 + data.capacity()).saturating_mul(2);
    let target = doubled.min(limit).max(needed);
    data.reserve_exact(target - data.len());
}

fn unexpected_eof(wanted: usize, got: u64) -> DistributedError {
    DistributedError::IoError(std::io::Error::new(
        ErrorKind::UnexpectedEof,
        format!(
            "unexpected end of query context: wanted {} bytes, {} available",
            wanted, got
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(buffer: &mut ContextBuffer) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = buffer.read(1, false).unwrap() {
            out.extend(chunk);
        }
        out
    }

    #[test]
    fn test_context_path() {
        let path = context_path(Path::new("/data/seg-1"), 12, 3);
        assert_eq!(
            path,
            PathBuf::from("/data/seg-1/session_12_id_3_query_context")
        );
    }

    #[test]
    fn test_memory_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut txn = TransactionContext::new(1);
        let mut buffer = ContextBuffer::create(dir.path(), 1, 1, 1024);
        buffer.write(b"hello ", &mut txn).unwrap();
        buffer.write(b"world", &mut txn).unwrap();

        assert!(!buffer.is_spilled());
        assert_eq!(buffer.size(), 11);
        assert!(txn.pending().is_empty());
        assert_eq!(buffer.read(5, true).unwrap().unwrap(), b"hello");
        assert_eq!(buffer.read(6, true).unwrap().unwrap(), b" world");
        assert_eq!(buffer.read(1, false).unwrap(), None);
        assert!(buffer.read(1, true).unwrap_err().is_io_error());
    }

    #[test]
    fn test_spill_transition_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut txn = TransactionContext::new(2);
        let mut buffer = ContextBuffer::create(&dir.path().join("seg-1"), 7, 1, 16);

        let mut expected = Vec::new();
        for i in 0..10u8 {
            let chunk = [i; 5];
            buffer.write(&chunk, &mut txn).unwrap();
            expected.extend_from_slice(&chunk);
        }

        assert!(buffer.is_spilled());
        assert_eq!(txn.pending().len(), 1);
        assert_eq!(txn.pending()[0], buffer.path());
        assert_eq!(buffer.size(), 50);
        assert_eq!(read_all(&mut buffer), expected);

        buffer.close().unwrap();
        assert_eq!(std::fs::read(buffer.path()).unwrap(), expected);
        txn.finish(true);
        assert!(!buffer.path().exists());
    }

    #[test]
    fn test_exact_limit_stays_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let mut txn = TransactionContext::new(3);
        let mut buffer = ContextBuffer::create(dir.path(), 1, 2, 8);
        buffer.write(&[1; 8], &mut txn).unwrap();
        assert!(!buffer.is_spilled());
        buffer.write(&[2], &mut txn).unwrap();
        assert!(buffer.is_spilled());
    }

    #[test]
    fn test_truncated_read_fails() {
        let mut buffer = ContextBuffer::from_bytes(vec![1, 2, 3]);
        let err = buffer.read(4, false).unwrap_err();
        assert!(err.is_io_error());
    }

    #[test]
    fn test_shared_open_and_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut txn = TransactionContext::new(4);
        let mut buffer = ContextBuffer::create(dir.path(), 5, 9, 4);
        buffer.write(b"abcdefgh", &mut txn).unwrap();

        let dispatched = buffer.into_dispatched().unwrap();
        assert!(dispatched.is_shared());

        let mut reader = ContextBuffer::from_dispatched(dispatched).unwrap();
        assert_eq!(reader.size(), 8);
        assert_eq!(reader.read(8, true).unwrap().unwrap(), b"abcdefgh");
        assert_eq!(reader.read(4, false).unwrap(), None);
        reader.close().unwrap();
        reader.close().unwrap();
    }

    #[test]
    fn test_inline_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut txn = TransactionContext::new(5);
        let mut buffer = ContextBuffer::create(dir.path(), 5, 10, 1024);
        buffer.write(b"xyz", &mut txn).unwrap();
        let dispatched = buffer.into_dispatched().unwrap();
        assert_eq!(dispatched, DispatchedContext::Inline(b"xyz".to_vec()));
    }

    #[test]
    fn test_spill_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut txn = TransactionContext::new(6);
        std::fs::write(context_path(dir.path(), 1, 1), b"stale").unwrap();
        let mut buffer = ContextBuffer::create(dir.path(), 1, 1, 2);
        assert!(buffer.write(b"too big", &mut txn).unwrap_err().is_io_error());
    }

    #[test]
    fn test_growth_bounded_by_limit() {
        let mut data = Vec::new();
        grow(&mut data, 3, 10);
        assert!(data.capacity() >= 3);
        data.extend_from_slice(&[0; 3]);
        grow(&mut data, 7, 10);
        assert!(data.capacity() >= 10);
    }

    #[test]
    fn test_failed_spill_flush_is_still_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut txn = TransactionContext::new(7);
        let mut buffer = ContextBuffer::create(dir.path(), 1, 1, 20_000);
        buffer.write(&[7; 16_000], &mut txn).unwrap();
        assert!(!buffer.is_spilled());

        // A read-only handle makes the first flush fail
        let err = buffer
            .spill_with(&mut txn, |path| {
                File::create(path)?;
                File::open(path)
            })
            .unwrap_err();
        assert!(err.is_io_error());
        assert!(buffer.is_spilled());
        assert_eq!(txn.pending(), &[buffer.path().to_path_buf()]);
        assert!(buffer.path().exists());

        let path = buffer.path().to_path_buf();
        drop(buffer);
        assert_eq!(txn.finish(false), 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_oversized_read_fails_before_allocating() {
        let mut buffer = ContextBuffer::from_bytes(vec![1, 2, 3, 4]);
        assert_eq!(buffer.read(2, true).unwrap().unwrap(), vec![1, 2]);
        assert_eq!(buffer.remaining(), 2);

        let err = buffer.read(usize::MAX, true).unwrap_err();
        assert!(err.is_io_error());
        assert_eq!(buffer.read(2, true).unwrap().unwrap(), vec![3, 4]);
        assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn test_shared_remaining_tracks_file_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session_3_id_1_query_context");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut buffer = ContextBuffer::open_shared(&path).unwrap();
        assert_eq!(buffer.remaining(), 10);
        assert_eq!(buffer.read(4, true).unwrap().unwrap(), b"0123");
        assert_eq!(buffer.remaining(), 6);
        assert!(buffer.read(7, true).unwrap_err().is_io_error());
    }
}
