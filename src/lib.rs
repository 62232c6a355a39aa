//! # ArchiveKeep core - content-addressed archive consistency
//!
//! ArchiveKeep keeps collections of files consistent across multiple storage
//! locations using content hashes rather than timestamps. This crate is the
//! comparison, synchronization and integrity-verification engine: it decides
//! *what* differs between two archives, *how* to reconcile that difference
//! safely, and *whether* stored content is still intact.
//!
//! ## Overview
//!
//! - **Content indexing**: an archive's listing becomes a checksum-indexed
//!   structure; identity is the SHA-256 digest of a file's bytes, paths are
//!   labels
//! - **Comparison**: two indices diff into relocations, duplicate-count
//!   changes, unmatched extras and overwrite conflicts
//! - **Synchronization**: a comparison plus explicit policy flags turns into
//!   an ordered sequence of copy/move/delete calls, gated so that nothing
//!   destructive happens without being asked for
//! - **Verification**: a resumable, checkpointed audit re-confirms stored
//!   content against recorded checksums, oldest-confirmation first
//!
//! Storage drivers (plain filesystem, encrypted vault, remote transport)
//! live behind the [`archive`] traits and are not part of this crate; the
//! bundled [`memory`] driver is a complete reference implementation.
//!
//! ## Quick Start
//!
//! ```rust
//! use archivekeep::comparison::compare;
//! use archivekeep::memory::MemoryArchive;
//! use archivekeep::sync::{perform_sync, SyncOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # fn main() -> archivekeep::Result<()> {
//! let laptop = MemoryArchive::new();
//! laptop.add("photos/a.jpg", b"...")?;
//!
//! let backup = MemoryArchive::new();
//!
//! // What differs?
//! let result = compare(&laptop, &backup)?;
//!
//! // Reconcile the backup, additions only.
//! perform_sync(
//!     &CancellationToken::new(),
//!     &SyncOptions::default(),
//!     &result,
//!     &laptop,
//!     &backup,
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Safety model
//!
//! A wrong decision here silently corrupts user data, so the engine is
//! conservative throughout:
//!
//! - saving never overwrites: an occupied destination is a hard error
//! - detected relocations are never acted on implicitly; the caller must
//!   choose a reconciliation mode, and duplicate-count changes each need
//!   their own enabling flag
//! - sync aborts on the first error, leaving prior transfers committed;
//!   because identity is content-addressed, re-running simply picks up the
//!   remaining delta
//! - verification returns its accumulated state even when it also returns
//!   an error, so partial audit results are never discarded
//!
//! ## Error Handling
//!
//! All operations return `Result<T, ArchiveError>`; every propagated error
//! is wrapped with the operation and path that produced it. Nothing in this
//! crate retries automatically.

pub mod archive;
pub mod comparison;
pub mod error;
pub mod index;
pub mod logger;
pub mod memory;
pub mod sync;
pub mod types;
pub mod verification;

pub use archive::{ArchiveReader, ArchiveWriter, VerifiableArchive};
pub use comparison::{compare, CompareResult, ExtraGroup, Relocation};
pub use error::{ArchiveError, Result};
pub use index::{build_index, ArchiveIndex};
pub use logger::{BufferLogger, NoopLogger, ProgressLogger, TerminalLogger};
pub use sync::{perform_sync, SyncOptions};
pub use types::FileInfo;
pub use verification::{VerificationJob, VerificationState};
