//! Output formatting for CLI commands.
//!
//! Provides abstraction layer for outputting results in text or JSON format.

use anyhow::Result;
use chrono::{DateTime, Utc};
use hashfind_core::{ContentHash, Hash128, PublishedIndex, ResolveFailure};
use serde::Serialize;
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    /// Create a new OutputWriter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Write output using the configured format.
    ///
    /// The `data` parameter must be a serializable struct that includes
    /// `success: bool` and `result_code: u8` fields.
    ///
    /// The `text_fn` closure is called only in text mode to generate the
    /// human-readable output.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    /// In text mode, writes the error chain directly.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `init` command.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub result_code: u8,
    pub root: String,
    pub jobs: usize,
    pub timeout_secs: u64,
    pub cache: bool,
}

/// Output for `build` command.
#[derive(Debug, Serialize)]
pub struct BuildOutput {
    pub success: bool,
    pub result_code: u8,
    pub repository: String,
    pub root_hash: ContentHash,
    pub reused: bool,
    pub records: usize,
    pub index_path: String,
}

/// A candidate or record whose path could not be resolved.
#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedInfo {
    pub path_hash: Hash128,
    pub name: String,
    pub error: String,
}

impl From<&ResolveFailure> for UnresolvedInfo {
    fn from(failure: &ResolveFailure) -> Self {
        Self {
            path_hash: failure.record.path_hash,
            name: failure.record.name.clone(),
            error: failure.error.to_string(),
        }
    }
}

/// Output for `find` command.
#[derive(Debug, Serialize)]
pub struct FindOutput {
    pub success: bool,
    pub result_code: u8,
    pub target: ContentHash,
    pub root_hash: ContentHash,
    pub paths: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<UnresolvedInfo>,
}

/// Published index information for `ls` command.
#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub root_hash: ContentHash,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    pub path: String,
}

impl From<PublishedIndex> for IndexInfo {
    fn from(published: PublishedIndex) -> Self {
        Self {
            root_hash: published.root,
            size: published.size,
            modified: published.modified.map(DateTime::<Utc>::from),
            path: published.path.display().to_string(),
        }
    }
}

/// Output for `ls` command.
#[derive(Debug, Serialize)]
pub struct LsOutput {
    pub success: bool,
    pub result_code: u8,
    pub indexes: Vec<IndexInfo>,
}

/// Output for `verify` command.
#[derive(Debug, Serialize)]
pub struct VerifyOutput {
    pub success: bool,
    pub result_code: u8,
    pub root_hash: ContentHash,
    pub records: usize,
    pub directories: usize,
    pub files: usize,
    pub failures: Vec<UnresolvedInfo>,
}
