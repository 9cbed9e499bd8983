/*!
Object sidecar metadata.

Every governed object carries a small JSON record alongside it describing its
at-rest state: whether it is currently compressed, with what, and the size
and checksum of its raw content. The pipeline updates the record after each
successful replace and consults it on the way in: `is_compressed` short-
circuits a redundant compress, and the checksum lets a decompress prove it
recovered the exact bytes that were originally ingested.
*/

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// Notice attached to compressed objects for operators browsing the store.
const COMPRESSED_NOTE: &str = "Stored compressed at rest; decompressed automatically on retrieval.";

/// At-rest state of a governed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Whether the object's stored bytes are currently in compressed form
    pub is_compressed: bool,
    /// Codec name when compressed (e.g. "gzip")
    pub compression_method: Option<String>,
    /// Size of the raw content in bytes
    pub uncompressed_size: u64,
    /// SHA-256 of the raw content, hex-encoded
    pub uncompressed_checksum: String,
    /// Operator-facing notice about the object's storage form
    pub note: Option<String>,
    /// When this record was last written
    pub updated_at: DateTime<Utc>,
}

impl ObjectMeta {
    /// Record for an object just compressed at rest.
    pub fn compressed<S: Into<String>>(method: S, raw_size: u64, raw_checksum: String) -> Self {
        Self {
            is_compressed: true,
            compression_method: Some(method.into()),
            uncompressed_size: raw_size,
            uncompressed_checksum: raw_checksum,
            note: Some(COMPRESSED_NOTE.to_string()),
            updated_at: Utc::now(),
        }
    }

    /// Record for an object restored to raw form.
    pub fn raw(raw_size: u64, raw_checksum: String) -> Self {
        Self {
            is_compressed: false,
            compression_method: None,
            uncompressed_size: raw_size,
            uncompressed_checksum: raw_checksum,
            note: None,
            updated_at: Utc::now(),
        }
    }

    /// Check recovered raw content against this record. A record with an
    /// empty checksum (written before checksumming existed) matches
    /// anything, so old objects stay readable.
    pub fn matches_raw(&self, size: u64, checksum: &str) -> bool {
        if self.uncompressed_checksum.is_empty() {
            return true;
        }
        self.uncompressed_size == size && self.uncompressed_checksum == checksum
    }
}

/// Streaming SHA-256 of a file's contents, hex-encoded.
pub fn file_checksum<P: AsRef<Path>>(path: P) -> Result<(u64, String)> {
    let mut file = File::open(path.as_ref())?;
    let mut hasher = Sha256::new();
    let bytes = io::copy(&mut file, &mut hasher)?;
    Ok((bytes, format!("{:x}", hasher.finalize())))
}
