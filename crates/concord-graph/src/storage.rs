//! Durable storage for sealed commands
//!
//! Storage only ever sees sealed envelopes, in append order. Because a command
//! is only appended after its parents, replaying records in stored order
//! rebuilds the graph without orphans.

use concord_core::ConcordError;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Largest sealed record the file log accepts
pub const MAX_RECORD_LEN: u64 = 16 * 1024 * 1024;

const LEN_PREFIX: u64 = 8;

/// Append-only record store for sealed commands
pub trait CommandStorage: Send + Sync {
    /// Persist one sealed command
    fn persist(&mut self, sealed: &[u8]) -> Result<(), ConcordError>;

    /// All persisted records in append order
    fn load(&mut self) -> Result<Vec<Vec<u8>>, ConcordError>;

    /// Make persisted records durable
    fn flush(&mut self) -> Result<(), ConcordError>;
}

/// In-memory storage, lost when dropped
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    records: Vec<Vec<u8>>,
}

impl MemoryStorage {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CommandStorage for MemoryStorage {
    fn persist(&mut self, sealed: &[u8]) -> Result<(), ConcordError> {
        self.records.push(sealed.to_vec());
        Ok(())
    }

    fn load(&mut self) -> Result<Vec<Vec<u8>>, ConcordError> {
        Ok(self.records.clone())
    }

    fn flush(&mut self) -> Result<(), ConcordError> {
        Ok(())
    }
}

/// File-backed append-only log
///
/// Each record is the bincode encoding of the sealed bytes: an 8-byte
/// little-endian length followed by the bytes themselves. A truncated final
/// record (torn write) is dropped on load. A length above
/// [`MAX_RECORD_LEN`] cannot come from [`FileStorage::persist`] and is
/// reported as a serialization error.
pub struct FileStorage {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileStorage {
    /// Open or create the log at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConcordError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!(path = %path.display(), "Opened command log");
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Location of the log
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn warn_truncated(&self, recovered: usize) {
        tracing::warn!(
            path = %self.path.display(),
            recovered,
            "Dropping truncated trailing record in command log"
        );
    }
}

impl CommandStorage for FileStorage {
    fn persist(&mut self, sealed: &[u8]) -> Result<(), ConcordError> {
        if sealed.len() as u64 > MAX_RECORD_LEN {
            return Err(ConcordError::invalid(format!(
                "sealed command of {} bytes exceeds the {MAX_RECORD_LEN} byte record limit",
                sealed.len()
            )));
        }
        bincode::serialize_into(&mut self.writer, sealed)
            .map_err(|e| ConcordError::storage(e.to_string()))
    }

    fn load(&mut self) -> Result<Vec<Vec<u8>>, ConcordError> {
        self.writer.flush()?;
        let file = File::open(&self.path)?;
        let size = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut offset = 0u64;
        while offset < size {
            let remaining = size - offset;
            if remaining < LEN_PREFIX {
                self.warn_truncated(records.len());
                break;
            }
            let mut len_bytes = [0u8; LEN_PREFIX as usize];
            reader.read_exact(&mut len_bytes)?;
            let len: u64 = bincode::deserialize(&len_bytes)
                .map_err(|e| ConcordError::serialization(e.to_string()))?;
            if len > MAX_RECORD_LEN {
                return Err(ConcordError::serialization(format!(
                    "record at offset {offset} declares {len} bytes"
                )));
            }
            if len > remaining - LEN_PREFIX {
                self.warn_truncated(records.len());
                break;
            }
            let mut record = vec![0u8; len as usize];
            match reader.read_exact(&mut record) {
                Ok(()) => records.push(record),
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    self.warn_truncated(records.len());
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            offset += LEN_PREFIX + len;
        }
        Ok(records)
    }

    fn flush(&mut self) -> Result<(), ConcordError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

impl std::fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_log_roundtrips_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.log");

        let mut storage = FileStorage::open(&path).unwrap();
        storage.persist(b"first").unwrap();
        storage.persist(b"").unwrap();
        storage.persist(b"third record").unwrap();
        storage.flush().unwrap();
        drop(storage);

        let mut reopened = FileStorage::open(&path).unwrap();
        let records = reopened.load().unwrap();
        assert_eq!(
            records,
            vec![b"first".to_vec(), Vec::new(), b"third record".to_vec()]
        );
    }

    #[test]
    fn truncated_tail_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.log");
        {
            let mut storage = FileStorage::open(&path).unwrap();
            storage.persist(b"intact").unwrap();
            storage.flush().unwrap();
        }
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&100u64.to_le_bytes()).unwrap();
            file.write_all(b"short").unwrap();
        }

        let records = FileStorage::open(&path).unwrap().load().unwrap();
        assert_eq!(records, vec![b"intact".to_vec()]);
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.log");
        {
            let mut file = File::create(&path).unwrap();
            file.write_all(&u64::MAX.to_le_bytes()).unwrap();
            file.write_all(b"payload").unwrap();
        }

        let err = FileStorage::open(&path).unwrap().load().unwrap_err();
        assert!(matches!(err, ConcordError::Serialization { .. }), "{err}");
    }

    #[test]
    fn persisted_frames_are_bincode_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.log");
        let mut storage = FileStorage::open(&path).unwrap();
        storage.persist(b"abc").unwrap();
        storage.flush().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, bincode::serialize(&b"abc"[..]).unwrap());
        assert_eq!(&bytes[..8], &3u64.to_le_bytes());
    }
}
