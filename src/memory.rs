//! In-memory archive driver
//!
//! A complete implementation of the archive contract backed by plain maps,
//! including the optional verification capability. It keeps the recorded
//! checksum of every file separate from the stored bytes, so tests can
//! simulate bit-rot and loss without touching the metadata: exactly the
//! situations the verification job exists to catch.
//!
//! The driver upholds the same guarantees expected of real drivers:
//! `save_file` refuses occupied destinations and is atomic-or-absent,
//! `move_file` refuses occupied targets, and the persisted verification
//! checkpoint round-trips through its JSON serialization.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use crate::archive::{ArchiveReader, ArchiveWriter, VerifiableArchive};
use crate::error::{ArchiveError, Result};
use crate::types::{sha256_hex, FileInfo};
use crate::verification::VerificationState;

#[derive(Debug, Default)]
struct Inner {
    /// Stored bytes by path
    contents: BTreeMap<String, Vec<u8>>,
    /// Recorded checksum by path, written at save time
    checksums: BTreeMap<String, String>,
    /// Persisted verification checkpoint, in its serialized form
    verification_state: Option<String>,
}

/// Archive held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryArchive {
    inner: Mutex<Inner>,
}

impl MemoryArchive {
    /// Create an empty archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a file directly, recording its checksum
    pub fn add(&self, path: &str, content: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.contents.contains_key(path) {
            return Err(ArchiveError::DestinationExists {
                path: path.to_string(),
            });
        }

        inner
            .checksums
            .insert(path.to_string(), sha256_hex(content));
        inner.contents.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    /// Replace stored bytes without touching the recorded checksum,
    /// simulating silent corruption
    pub fn corrupt_file(&self, path: &str, content: &[u8]) {
        self.inner
            .lock()
            .contents
            .insert(path.to_string(), content.to_vec());
    }

    /// Drop stored bytes while keeping the recorded checksum, simulating
    /// content loss
    pub fn lose_file(&self, path: &str) {
        self.inner.lock().contents.remove(path);
    }

    /// Sorted paths of files whose bytes are present
    pub fn paths(&self) -> Vec<String> {
        self.inner.lock().contents.keys().cloned().collect()
    }

    /// Stored bytes at a path, if present
    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.lock().contents.get(path).cloned()
    }

    fn file_info(inner: &Inner, path: &str) -> Result<FileInfo> {
        let content = inner
            .contents
            .get(path)
            .ok_or_else(|| ArchiveError::FileNotFound {
                path: path.to_string(),
            })?;

        let mut info = FileInfo::for_content(path, content);
        if let Some(recorded) = inner.checksums.get(path) {
            info.digest
                .insert(crate::types::DIGEST_SHA256.to_string(), recorded.clone());
        }
        Ok(info)
    }
}

impl ArchiveReader for MemoryArchive {
    fn list_files(&self) -> Result<Vec<FileInfo>> {
        let inner = self.inner.lock();
        inner
            .contents
            .keys()
            .map(|path| Self::file_info(&inner, path))
            .collect()
    }

    fn open_file(&self, path: &str) -> Result<(FileInfo, Box<dyn Read + Send + '_>)> {
        let inner = self.inner.lock();
        let info = Self::file_info(&inner, path)?;
        let content = inner.contents.get(path).cloned().unwrap_or_default();

        Ok((info, Box::new(Cursor::new(content))))
    }

    fn stored_files(&self) -> Result<Vec<String>> {
        Ok(self.inner.lock().checksums.keys().cloned().collect())
    }

    fn file_checksum(&self, path: &str) -> Result<String> {
        self.inner
            .lock()
            .checksums
            .get(path)
            .cloned()
            .ok_or_else(|| ArchiveError::FileNotFound {
                path: path.to_string(),
            })
    }

    fn as_verifiable(&self) -> Option<&dyn VerifiableArchive> {
        Some(self)
    }
}

impl ArchiveWriter for MemoryArchive {
    fn save_file(&self, reader: &mut dyn Read, info: &FileInfo) -> Result<()> {
        // Read the full stream before taking the lock or touching state, so
        // a failed transfer leaves nothing behind.
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;

        let checksum = sha256_hex(&content);
        if let Some(declared) = info.sha256() {
            if declared != checksum {
                return Err(ArchiveError::integrity(format!(
                    "transferred content of {} does not match its declared digest",
                    info.path
                )));
            }
        }

        let mut inner = self.inner.lock();
        if inner.contents.contains_key(&info.path) || inner.checksums.contains_key(&info.path) {
            return Err(ArchiveError::DestinationExists {
                path: info.path.clone(),
            });
        }

        inner.checksums.insert(info.path.clone(), checksum);
        inner.contents.insert(info.path.clone(), content);
        Ok(())
    }

    fn move_file(&self, from: &str, to: &str) -> Result<()> {
        let mut inner = self.inner.lock();

        if inner.contents.contains_key(to) || inner.checksums.contains_key(to) {
            return Err(ArchiveError::DestinationExists {
                path: to.to_string(),
            });
        }

        let content = inner
            .contents
            .remove(from)
            .ok_or_else(|| ArchiveError::FileNotFound {
                path: from.to_string(),
            })?;
        let checksum = inner.checksums.remove(from).unwrap_or_else(|| sha256_hex(&content));

        inner.contents.insert(to.to_string(), content);
        inner.checksums.insert(to.to_string(), checksum);
        Ok(())
    }

    fn delete_file(&self, path: &str) -> Result<()> {
        let mut inner = self.inner.lock();

        if inner.contents.remove(path).is_none() {
            return Err(ArchiveError::FileNotFound {
                path: path.to_string(),
            });
        }
        inner.checksums.remove(path);
        Ok(())
    }
}

impl VerifiableArchive for MemoryArchive {
    fn verify_file_integrity(&self, path: &str) -> Result<()> {
        let inner = self.inner.lock();

        let recorded = inner
            .checksums
            .get(path)
            .ok_or_else(|| ArchiveError::FileNotFound {
                path: path.to_string(),
            })?;

        let Some(content) = inner.contents.get(path) else {
            return Err(ArchiveError::integrity("file was deleted"));
        };

        if &sha256_hex(content) != recorded {
            return Err(ArchiveError::integrity("file was modified"));
        }

        Ok(())
    }

    fn load_verification_state(&self) -> Result<VerificationState> {
        match &self.inner.lock().verification_state {
            Some(serialized) => Ok(serde_json::from_str(serialized)?),
            None => Ok(VerificationState::default()),
        }
    }

    fn save_verification_state(&self, state: &VerificationState) -> Result<()> {
        let serialized = serde_json::to_string(state)?;
        self.inner.lock().verification_state = Some(serialized);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_refuses_existing_destination() {
        let archive = MemoryArchive::new();
        archive.add("file", b"original").unwrap();

        let info = FileInfo::for_content("file", b"replacement");
        let err = archive
            .save_file(&mut Cursor::new(b"replacement".to_vec()), &info)
            .unwrap_err();

        assert!(matches!(err, ArchiveError::DestinationExists { .. }));
        assert_eq!(archive.content("file").unwrap(), b"original");
    }

    #[test]
    fn test_save_validates_declared_digest() {
        let archive = MemoryArchive::new();

        let info = FileInfo::for_content("file", b"expected bytes");
        let err = archive
            .save_file(&mut Cursor::new(b"other bytes".to_vec()), &info)
            .unwrap_err();

        assert!(err.is_corruption());
        assert!(archive.paths().is_empty());
    }

    #[test]
    fn test_move_refuses_existing_target() {
        let archive = MemoryArchive::new();
        archive.add("a", b"1").unwrap();
        archive.add("b", b"2").unwrap();

        let err = archive.move_file("a", "b").unwrap_err();
        assert!(matches!(err, ArchiveError::DestinationExists { .. }));
        assert_eq!(archive.paths(), vec!["a", "b"]);
    }

    #[test]
    fn test_verify_distinguishes_modified_from_deleted() {
        let archive = MemoryArchive::new();
        archive.add("modified", b"original").unwrap();
        archive.add("deleted", b"original").unwrap();
        archive.add("intact", b"original").unwrap();

        archive.corrupt_file("modified", b"tampered");
        archive.lose_file("deleted");

        archive.verify_file_integrity("intact").unwrap();
        assert_eq!(
            archive.verify_file_integrity("modified").unwrap_err().to_string(),
            "file was modified"
        );
        assert_eq!(
            archive.verify_file_integrity("deleted").unwrap_err().to_string(),
            "file was deleted"
        );
    }

    #[test]
    fn test_verification_state_round_trip() {
        let archive = MemoryArchive::new();

        assert_eq!(
            archive.load_verification_state().unwrap(),
            VerificationState::default()
        );

        let mut state = VerificationState::default();
        state.correct_files.insert(
            "file".to_string(),
            crate::verification::SuccessRecord {
                verified_at: chrono::Utc::now(),
            },
        );
        archive.save_verification_state(&state).unwrap();

        assert_eq!(archive.load_verification_state().unwrap(), state);
    }
}
