//! Fingerprints used to detect a stale index.
//!
//! An index is up to date when both of its stamped fingerprints equal the
//! fingerprints computed from the truth:
//! - [`SchemaFingerprint`]: digest over the ordered column ids
//! - [`VersionFingerprint`]: last change number (row tables) or a content
//!   CRC over the replicated rows in scope (views)

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Digest over an ordered list of column ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaFingerprint(String);

impl SchemaFingerprint {
    /// Computes the fingerprint of an ordered column id list.
    ///
    /// Order matters: reordering columns changes the fingerprint.
    pub fn of_columns<S: AsRef<str>>(column_ids: &[S]) -> Self {
        let mut hasher = Sha256::new();
        for (i, id) in column_ids.iter().enumerate() {
            if i > 0 {
                hasher.update(b",");
            }
            hasher.update(id.as_ref().as_bytes());
        }
        Self(hex(&hasher.finalize()))
    }

    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The content version an index was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionFingerprint {
    /// Last applied change number of a row table; `None` when it has no changes.
    ChangeSequence(Option<u64>),
    /// CRC over the replicated rows within a view's container set.
    ContentCrc(u64),
}

impl fmt::Display for VersionFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionFingerprint::ChangeSequence(Some(seq)) => write!(f, "seq:{seq}"),
            VersionFingerprint::ChangeSequence(None) => write!(f, "seq:-1"),
            VersionFingerprint::ContentCrc(crc) => write!(f, "crc:{crc:016x}"),
        }
    }
}

/// Order-independent content CRC accumulator.
///
/// Each row contributes the CRC-32 of `"{id}-{etag}-{benefactor_id}"`; the
/// contributions are summed with wrapping, so row order never matters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentCrc {
    sum: u64,
    rows: u64,
}

impl ContentCrc {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one replicated row.
    pub fn add_row(&mut self, id: u64, etag: &str, benefactor_id: u64) {
        let key = format!("{id}-{etag}-{benefactor_id}");
        self.sum = self.sum.wrapping_add(u64::from(compute_crc32(key.as_bytes())));
        self.rows += 1;
    }

    /// Number of rows added.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Finishes into a version fingerprint.
    pub fn finish(&self) -> VersionFingerprint {
        VersionFingerprint::ContentCrc(self.sum)
    }
}

/// Computes CRC-32 (IEEE polynomial).
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    crc ^ 0xFFFF_FFFF
}

fn hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(DIGITS[(b >> 4) as usize] as char);
        out.push(DIGITS[(b & 0x0F) as usize] as char);
    }
    out
}
