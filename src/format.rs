use std::fmt::Write as _;

use anyhow::{Result, bail};
use serde::Serialize;
use std::str::FromStr;

use tandem::Entry;

/// Output format for structured data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text, one item per line
    #[default]
    Text,
    /// JSON - machine-parseable
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => bail!("Invalid format '{s}'. Use: text or json"),
        }
    }
}

impl OutputFormat {
    /// Serialize data to the requested format
    pub fn serialize<T: Serialize>(self, data: &T) -> Result<String> {
        match self {
            Self::Json => serde_json::to_string_pretty(data)
                .map_err(|e| anyhow::anyhow!("JSON serialization failed: {e}")),
            Self::Text => {
                // Text output is rendered by the caller
                bail!("Text format should not use serialize()")
            }
        }
    }
}

/// Render entries as an indented listing.
pub fn entries_text(entries: &[Entry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let indent = "  ".repeat(entry.depth.saturating_sub(1));
        let slash = if entry.file_type == tandem::FileType::Directory {
            "/"
        } else {
            ""
        };
        let hidden = if entry.visible { "" } else { " (deleted)" };
        let _ = writeln!(
            out,
            "{indent}{}{slash}  [{}]{hidden}",
            entry.name,
            entry.status.label()
        );
    }
    out
}
