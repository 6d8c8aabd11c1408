use crate::services::synthesis::RegexBlock;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fmt;
use std::fs;
use thiserror::Error;

/// Result of merging a block into the rules file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The existing block already matched; nothing was written
    Unchanged,
    /// The first managed block was replaced
    Replaced,
    /// No managed block existed; the block was prepended
    Inserted,
    /// Nothing was done
    Skipped(SkipReason),
}

impl MergeOutcome {
    /// Whether the rules file was rewritten
    pub fn wrote_file(&self) -> bool {
        matches!(self, MergeOutcome::Replaced | MergeOutcome::Inserted)
    }
}

impl fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeOutcome::Unchanged => f.write_str("unchanged"),
            MergeOutcome::Replaced => f.write_str("replaced"),
            MergeOutcome::Inserted => f.write_str("inserted"),
            MergeOutcome::Skipped(SkipReason::FileAbsent) => f.write_str("skipped (file absent)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The rules file does not exist and is never created
    FileAbsent,
}

/// New file content produced by [`RulesMerger::apply_block`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentMerge {
    Unchanged,
    Replaced(String),
    Inserted(String),
}

/// Errors reading or writing the rules file
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Failed to read rules file {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write rules file {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Merges a managed block into an existing rules file.
///
/// Only the first marker-delimited region is ever touched; every other byte of
/// the file is preserved. The file is written only when its content would
/// change, so repeated merges of the same block settle on
/// [`MergeOutcome::Unchanged`].
#[derive(Debug, Clone)]
pub struct RulesMerger {
    block_pattern: Regex,
}

impl RulesMerger {
    /// Create a merger for blocks delimited by `marker` lines
    pub fn new(marker: &str) -> Result<Self, regex::Error> {
        let marker = regex::escape(marker);
        // Both marker lines must be whole lines; the capture excludes the line ending
        let block_pattern = Regex::new(&format!(
            r"(?ms)^({marker}\r?\n.*?\r?\n{marker})\r?$"
        ))?;
        Ok(Self { block_pattern })
    }

    /// Compute the merged content without touching the filesystem
    pub fn apply_block(&self, content: &str, block: &RegexBlock) -> ContentMerge {
        let existing = self
            .block_pattern
            .captures(content)
            .and_then(|captures| captures.get(1));

        match existing {
            Some(existing) if existing.as_str() == block.as_str() => ContentMerge::Unchanged,
            Some(existing) => ContentMerge::Replaced(format!(
                "{}{}{}",
                &content[..existing.start()],
                block.as_str(),
                &content[existing.end()..]
            )),
            None => ContentMerge::Inserted(format!("{}\n{}", block.as_str(), content)),
        }
    }

    /// Merge `block` into the rules file at `path`.
    ///
    /// A missing file yields [`MergeOutcome::Skipped`]; the file is never
    /// created here.
    pub fn merge(&self, path: &Utf8Path, block: &RegexBlock) -> Result<MergeOutcome, MergeError> {
        if !path.exists() {
            tracing::info!("Rules file {} does not exist, skipping merge", path);
            return Ok(MergeOutcome::Skipped(SkipReason::FileAbsent));
        }

        let content = fs::read_to_string(path).map_err(|source| MergeError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let (outcome, new_content) = match self.apply_block(&content, block) {
            ContentMerge::Unchanged => {
                tracing::debug!("Managed block in {} is up to date", path);
                return Ok(MergeOutcome::Unchanged);
            }
            ContentMerge::Replaced(new_content) => (MergeOutcome::Replaced, new_content),
            ContentMerge::Inserted(new_content) => (MergeOutcome::Inserted, new_content),
        };

        fs::write(path, new_content).map_err(|source| MergeError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!("Rules file {}: managed block {}", path, outcome);
        Ok(outcome)
    }
}
