//! Stable file identity.
//!
//! A [`FileId`] never changes once assigned, even across renames, removals,
//! and rebases:
//!
//! | Origin             | Identity                                         |
//! |--------------------|--------------------------------------------------|
//! | The tree root      | [`FileId::Root`]                                 |
//! | A base entry       | hash of `(file type, base path)`: same on every replica and in every snapshot |
//! | A created file     | the [`LocalTimestamp`] of the creating operation |
//!
//! Serialized as a short tagged string for canonical JSON: `"root"`,
//! `"b:<32 hex>"`, `"n:<replica>.<seq>"`.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tandem_base::FileType;

use crate::error::TreeError;
use crate::model::clock::{LocalTimestamp, ReplicaId};

/// Identity of a node in the replicated tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FileId {
    /// The implicit root directory.
    Root,
    /// An entry that came from a base snapshot.
    Base(u128),
    /// An entry created by an operation.
    New(LocalTimestamp),
}

impl FileId {
    /// Derive the identity of a base entry from its type and path.
    ///
    /// Path components are joined with `/` before hashing so the result does
    /// not depend on the host separator.
    #[must_use]
    pub fn base(file_type: FileType, path: &Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(match file_type {
            FileType::Directory => b"d:",
            FileType::Text => b"t:",
        });
        for (i, component) in path.components().enumerate() {
            if i > 0 {
                hasher.update(b"/");
            }
            hasher.update(component.as_os_str().as_encoded_bytes());
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self::Base(u128::from_be_bytes(bytes))
    }

    /// Whether this id names a base entry.
    #[must_use]
    pub const fn is_base(self) -> bool {
        matches!(self, Self::Base(_))
    }

    fn parse(s: &str) -> Option<Self> {
        if s == "root" {
            return Some(Self::Root);
        }
        if let Some(hex) = s.strip_prefix("b:") {
            if hex.len() != 32 {
                return None;
            }
            return u128::from_str_radix(hex, 16).ok().map(Self::Base);
        }
        let rest = s.strip_prefix("n:")?;
        let (replica, seq) = rest.split_once('.')?;
        let replica = ReplicaId::new(replica.parse().ok()?);
        Some(Self::New(LocalTimestamp::new(replica, seq.parse().ok()?)))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::Base(hash) => write!(f, "b:{hash:032x}"),
            Self::New(ts) => write!(f, "n:{}.{}", ts.replica, ts.seq),
        }
    }
}

impl TryFrom<String> for FileId {
    type Error = TreeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| TreeError::MalformedOperation {
            reason: format!("invalid file id `{s}`"),
        })
    }
}

impl From<FileId> for String {
    fn from(id: FileId) -> Self {
        id.to_string()
    }
}
