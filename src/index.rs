//! Content index building
//!
//! Turns an archive's file listing into a checksum-indexed structure the
//! comparator works over. The index is ephemeral: rebuilt for every
//! comparison, never persisted, never mutated after construction.

use std::collections::BTreeMap;
use tracing::debug;

use crate::archive::ArchiveReader;
use crate::error::{Result, ResultExt};
use crate::types::DIGEST_SHA256;

/// Checksum-indexed view of one archive's listing
///
/// Invariant: every path in `all_files` appears exactly once in
/// `file_checksum` and exactly once across all `files_by_checksum` buckets.
/// A bucket with more than one path means duplicate content.
///
/// All path lists are sorted lexicographically. Driver enumeration order is
/// not part of any contract, so the index imposes a canonical order itself;
/// without it, relocation detection over same-checksum duplicates would
/// depend on which order two drivers happen to list identical content.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    /// All stored paths, sorted
    pub all_files: Vec<String>,
    /// Path to its content checksum
    pub file_checksum: BTreeMap<String, String>,
    /// Checksum to the sorted list of paths holding that content
    pub files_by_checksum: BTreeMap<String, Vec<String>>,
}

/// Build the content index of an archive
///
/// Listing failures are propagated wrapped with the operation that failed.
/// An archive with zero files yields an index with empty maps.
pub fn build_index(archive: &dyn ArchiveReader) -> Result<ArchiveIndex> {
    let listing = archive.list_files().context("list archive files")?;

    let mut all_files = Vec::with_capacity(listing.len());
    let mut file_checksum = BTreeMap::new();
    let mut files_by_checksum: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for info in listing {
        let checksum = info.digest.get(DIGEST_SHA256).cloned().unwrap_or_default();

        all_files.push(info.path.clone());
        file_checksum.insert(info.path.clone(), checksum.clone());
        files_by_checksum.entry(checksum).or_default().push(info.path);
    }

    all_files.sort();
    for paths in files_by_checksum.values_mut() {
        paths.sort();
    }

    debug!(
        files = all_files.len(),
        distinct_contents = files_by_checksum.len(),
        "built archive index"
    );

    Ok(ArchiveIndex {
        all_files,
        file_checksum,
        files_by_checksum,
    })
}
