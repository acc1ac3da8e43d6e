//! Structured error types for counter-file decoding.
//!
//! [`FormatError`] covers everything that can be wrong with the bytes of a
//! counter file or with a pair of snapshots under comparison;
//! [`ReadError`] attaches the file path and separates I/O failures from
//! format failures so callers can apply the per-file recovery policy
//! (skip the file for this round, keep aggregating the rest).

use std::path::PathBuf;

use thiserror::Error;

use super::header::STAT_FILE_MAGIC;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("bad magic {found:#010x} (expected {STAT_FILE_MAGIC:#010x})")]
    BadMagic { found: u32 },

    #[error("file holds {actual} bytes but the header claims {needed}")]
    Truncated { needed: u64, actual: u64 },

    #[error("row stride of {column_count} items cannot hold a marker plus {item_count} counters")]
    BadStride { column_count: u32, item_count: u32 },

    #[error("row size {item_size} bytes does not match a stride of {column_count} items")]
    BadItemSize { item_size: u32, column_count: u32 },

    #[error("column schema mismatch: {left:?} vs {right:?}")]
    SchemaMismatch { left: Vec<String>, right: Vec<String> },
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read counter file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("counter file `{path}` is malformed: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
}

impl ReadError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ReadError::Io { path, .. } => path,
            ReadError::Format { path, .. } => path,
        }
    }
}
