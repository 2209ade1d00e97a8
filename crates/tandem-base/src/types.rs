//! Value types used in [`BaseProvider`](crate::BaseProvider) signatures.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BaseError;

// ---------------------------------------------------------------------------
// Oid
// ---------------------------------------------------------------------------

/// A content identifier for a base snapshot (20 bytes).
///
/// Stored as raw bytes for cheap comparison and `Copy` semantics. Displays and
/// serializes as 40 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid([u8; 20]);

impl Oid {
    /// The zero OID, never produced by a real commit.
    pub const ZERO: Self = Self([0; 20]);

    /// Create an `Oid` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Return `true` if this is the zero OID.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Abbreviated hex form for log lines (first 12 characters).
    #[must_use]
    pub fn short(&self) -> String {
        let mut full = self.to_string();
        full.truncate(12);
        full
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.short())
    }
}

impl FromStr for Oid {
    type Err = BaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(BaseError::InvalidOid {
                value: s.to_owned(),
                reason: format!("expected 40 hex characters, got {}", s.len()),
            });
        }
        let mut bytes = [0u8; 20];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let digit = |b: u8| {
                hex_digit(b).ok_or_else(|| BaseError::InvalidOid {
                    value: s.to_owned(),
                    reason: format!("invalid hex digit '{}'", b as char),
                })
            };
            bytes[i] = (digit(chunk[0])? << 4) | digit(chunk[1])?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Oid {
    type Error = BaseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.to_string()
    }
}

const fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// FileType
// ---------------------------------------------------------------------------

/// Kind of a tree entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// A directory that may hold children.
    Directory,
    /// A UTF-8 text file.
    Text,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => f.write_str("directory"),
            Self::Text => f.write_str("text"),
        }
    }
}

// ---------------------------------------------------------------------------
// BaseEntry
// ---------------------------------------------------------------------------

/// One entry of a base snapshot in depth-first pre-order.
///
/// `depth` is 1 for children of the root. An entry's parent is the nearest
/// preceding directory entry whose depth is `depth - 1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseEntry {
    /// 1-based nesting depth.
    pub depth: usize,
    /// Final path component.
    pub name: String,
    /// Entry kind.
    pub file_type: FileType,
}

impl BaseEntry {
    /// Convenience constructor.
    #[must_use]
    pub fn new(depth: usize, name: impl Into<String>, file_type: FileType) -> Self {
        Self {
            depth,
            name: name.into(),
            file_type,
        }
    }
}
