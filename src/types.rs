//! Common types and data structures
//!
//! The central type here is [`FileInfo`]: the metadata record an archive
//! driver reports for each stored file. Content identity is defined entirely
//! by the file's SHA-256 digest; the path is a label, not identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;

use crate::error::Result;

/// Name of the only digest algorithm populated today
pub const DIGEST_SHA256: &str = "SHA256";

/// Metadata of a single archived file
///
/// Paths are archive-root-relative and `/`-separated regardless of platform.
/// The digest map is keyed by algorithm name; only `"SHA256"` is populated
/// today, but the map form keeps the stored metadata forward-compatible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Archive-root-relative path, `/`-separated
    pub path: String,
    /// Content length in bytes
    pub length: u64,
    /// Algorithm name to lowercase hex digest
    pub digest: BTreeMap<String, String>,
}

impl FileInfo {
    /// Construct metadata for content bytes, computing the SHA-256 digest
    pub fn for_content(path: impl Into<String>, content: &[u8]) -> Self {
        let mut digest = BTreeMap::new();
        digest.insert(DIGEST_SHA256.to_string(), sha256_hex(content));

        FileInfo {
            path: path.into(),
            length: content.len() as u64,
            digest,
        }
    }

    /// The SHA-256 digest defining this file's content identity, if recorded
    pub fn sha256(&self) -> Option<&str> {
        self.digest.get(DIGEST_SHA256).map(String::as_str)
    }
}

/// Compute the lowercase hex SHA-256 digest of a byte slice
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Compute the lowercase hex SHA-256 digest of a reader's remaining bytes
pub fn sha256_hex_from_reader(reader: &mut dyn Read) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
