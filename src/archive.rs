//! Archive contract consumed by every core operation
//!
//! Concrete storage drivers (plain filesystem, encrypted vault, remote
//! transport) sit behind these traits; the core never touches storage
//! directly. [`ArchiveReader`] covers listing and content access,
//! [`ArchiveWriter`] covers mutations, and [`VerifiableArchive`] is an
//! optional capability a driver may additionally implement to support
//! integrity verification with a persisted checkpoint.
//!
//! All methods are blocking calls. Nothing here is retried or timed out
//! internally; deadlines and cancellation are supplied by the caller at the
//! operation entry points.

use std::io::Read;

use crate::error::Result;
use crate::types::FileInfo;
use crate::verification::VerificationState;

/// Read access to an archive's listing and content
pub trait ArchiveReader: Send + Sync {
    /// List metadata of every stored file
    fn list_files(&self) -> Result<Vec<FileInfo>>;

    /// Open a stored file for sequential reading
    fn open_file(&self, path: &str) -> Result<(FileInfo, Box<dyn Read + Send + '_>)>;

    /// Paths of all stored files
    fn stored_files(&self) -> Result<Vec<String>>;

    /// The recorded SHA-256 digest for a stored path
    fn file_checksum(&self, path: &str) -> Result<String>;

    /// Query the optional verification capability
    ///
    /// Drivers that can verify stored content against recorded checksums and
    /// persist a [`VerificationState`] checkpoint return `Some(self)`. The
    /// default is `None`; the verification entry point reports that as a
    /// capability-unsupported error instead of attempting the operation.
    fn as_verifiable(&self) -> Option<&dyn VerifiableArchive> {
        None
    }
}

/// Mutating access to an archive
pub trait ArchiveWriter: Send + Sync {
    /// Store a new file from a stream
    ///
    /// Must fail with a destination-exists error if `info.path` is already
    /// occupied, and must not leave a partially-written file visible on
    /// failure (atomic-or-absent).
    fn save_file(&self, reader: &mut dyn Read, info: &FileInfo) -> Result<()>;

    /// Atomically rename a stored file; must fail if `to` already exists
    fn move_file(&self, from: &str, to: &str) -> Result<()>;

    /// Remove a stored file
    fn delete_file(&self, path: &str) -> Result<()>;
}

/// Optional capability: integrity verification with checkpointing
pub trait VerifiableArchive: ArchiveReader {
    /// Re-read a stored file and check it against its recorded checksum
    ///
    /// The error distinguishes content that no longer exists ("file was
    /// deleted") from content whose digest changed ("file was modified").
    fn verify_file_integrity(&self, path: &str) -> Result<()>;

    /// Load the persisted verification checkpoint, empty if none exists
    fn load_verification_state(&self) -> Result<VerificationState>;

    /// Persist the verification checkpoint
    ///
    /// Drivers write to a temporary location and atomically rename into
    /// place, so a crash never leaves a half-written checkpoint.
    fn save_verification_state(&self, state: &VerificationState) -> Result<()>;
}
