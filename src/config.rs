//! Work tree configuration (`tandem.toml`).
//!
//! Every field has a default, so an empty or missing file is a valid
//! configuration.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// WorkTreeConfig
// ---------------------------------------------------------------------------

/// Tunables for a [`WorkTree`](crate::WorkTree).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkTreeConfig {
    /// Deferred operation count above which each `apply_ops` call logs a
    /// warning (default: 1024).
    #[serde(default = "default_deferred_warn_threshold")]
    pub deferred_warn_threshold: usize,

    /// Emit fixup moves when concurrent moves form a cycle (default: true).
    ///
    /// The projection ignores the offending move either way; the fixup makes
    /// the resolution explicit in the operation history.
    #[serde(default = "default_cycle_fixups")]
    pub cycle_fixups: bool,
}

impl Default for WorkTreeConfig {
    fn default() -> Self {
        Self {
            deferred_warn_threshold: default_deferred_warn_threshold(),
            cycle_fixups: default_cycle_fixups(),
        }
    }
}

const fn default_deferred_warn_threshold() -> usize {
    1024
}

const fn default_cycle_fixups() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("{}: could not read file: {source}", path.display())]
    Read {
        /// The configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The contents are not valid TOML or name an unknown field.
    #[error("{}{message}", Location(path.as_deref(), *line))]
    Invalid {
        /// The configuration file, when parsed from one.
        path: Option<PathBuf>,
        /// 1-based line of the offending value, when known.
        line: Option<usize>,
        /// What the TOML parser reported.
        message: String,
    },
}

/// `path: line N: ` prefix of a [`ConfigError::Invalid`] message.
struct Location<'a>(Option<&'a Path>, Option<usize>);

impl fmt::Display for Location<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self(Some(path), Some(line)) => write!(f, "{}: line {line}: ", path.display()),
            Self(Some(path), None) => write!(f, "{}: ", path.display()),
            Self(None, Some(line)) => write!(f, "line {line}: "),
            Self(None, None) => Ok(()),
        }
    }
}

impl WorkTreeConfig {
    /// Load configuration from a TOML file. A missing file yields the
    /// defaults.
    ///
    /// # Errors
    /// [`ConfigError::Read`] if the file exists but cannot be read,
    /// [`ConfigError::Invalid`] if it does not parse.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents).map_err(|e| match e {
                ConfigError::Invalid { line, message, .. } => ConfigError::Invalid {
                    path: Some(path.to_owned()),
                    line,
                    message,
                },
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_owned(),
                source,
            }),
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] on malformed TOML or unknown fields.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Invalid {
            path: None,
            line: e
                .span()
                .map(|span| contents[..span.start].matches('\n').count() + 1),
            message: e.message().to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = WorkTreeConfig::default();
        assert_eq!(cfg.deferred_warn_threshold, 1024);
        assert!(cfg.cycle_fixups);
    }

    #[test]
    fn parse_empty_string() {
        assert_eq!(
            WorkTreeConfig::parse("").unwrap(),
            WorkTreeConfig::default()
        );
    }

    #[test]
    fn parse_partial_config_uses_defaults() {
        let cfg = WorkTreeConfig::parse("cycle_fixups = false\n").unwrap();
        assert!(!cfg.cycle_fixups);
        assert_eq!(cfg.deferred_warn_threshold, 1024);
    }

    #[test]
    fn parse_rejects_unknown_field() {
        let err = WorkTreeConfig::parse("\nbogus = 1\n").unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { path: None, line: Some(2), .. }),
            "{err:?}"
        );
        assert!(err.to_string().starts_with("line 2: "), "{err}");
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let cfg = WorkTreeConfig::load(Path::new("/nonexistent/tandem.toml")).unwrap();
        assert_eq!(cfg, WorkTreeConfig::default());
    }

    #[test]
    fn load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tandem.toml");
        std::fs::write(&path, "deferred_warn_threshold = 8\n").unwrap();
        let cfg = WorkTreeConfig::load(&path).unwrap();
        assert_eq!(cfg.deferred_warn_threshold, 8);
    }

    #[test]
    fn load_invalid_file_shows_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid [[[toml").unwrap();
        let err = WorkTreeConfig::load(&path).unwrap_err();
        assert!(err.to_string().starts_with(&format!("{}: ", path.display())), "{err}");
    }

    #[test]
    fn unreadable_path_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = WorkTreeConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }), "{err:?}");
    }
}
