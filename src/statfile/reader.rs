//! Reads one counter file into a validated [`Snapshot`].
//!
//! The whole file is read in one call and decoded from the in-memory copy,
//! which keeps the window for producer overwrites as small as ordinary
//! blocking I/O allows. No cross-process locking exists; see the module
//! docs on [`crate::statfile::snapshot`] for the torn-read policy.

use std::fs;
use std::path::Path;

use super::error::{FormatError, ReadError};
use super::header::{self, FileLayout, StatHeader};
use super::snapshot::Snapshot;

/// Reads and decodes a counter file, detecting its layout.
///
/// # Errors
///
/// [`ReadError::Io`] if the file cannot be read, [`ReadError::Format`] if
/// its bytes do not form a valid counter file. Callers are expected to skip
/// the file for the current poll and keep going; neither failure is fatal
/// to the collector.
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<Snapshot, ReadError> {
    let path = path.as_ref();
    let buf = read_bytes(path)?;
    decode(&buf).map_err(|source| ReadError::Format {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and decodes a counter file with a caller-pinned layout.
///
/// # Errors
///
/// As [`read_snapshot`].
pub fn read_snapshot_with(
    path: impl AsRef<Path>,
    layout: FileLayout,
) -> Result<Snapshot, ReadError> {
    let path = path.as_ref();
    let buf = read_bytes(path)?;
    decode_with(&buf, layout).map_err(|source| ReadError::Format {
        path: path.to_path_buf(),
        source,
    })
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ReadError> {
    fs::read(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn decode(buf: &[u8]) -> Result<Snapshot, FormatError> {
    decode_with(buf, FileLayout::detect(buf)?)
}

pub(crate) fn decode_with(buf: &[u8], layout: FileLayout) -> Result<Snapshot, FormatError> {
    let header = StatHeader::decode(buf, layout)?;
    let specs = header::decode_specs(buf, &header)?;
    let items = decode_items(buf, &header)?;
    Ok(Snapshot::new(header, specs, items))
}

/// Copies the written portion of the row buffer out of `buf`.
///
/// The extent is validated against the actual file length before anything
/// is allocated, so a header claiming absurd counts fails cleanly instead
/// of driving an allocation.
fn decode_items(buf: &[u8], header: &StatHeader) -> Result<Vec<u64>, FormatError> {
    let end = header
        .item_off
        .checked_add(header.row_buffer_len())
        .ok_or(FormatError::Truncated {
            needed: u64::MAX,
            actual: buf.len() as u64,
        })?;
    if header.item_off < header.spec_table_end() || end > buf.len() as u64 {
        return Err(FormatError::Truncated {
            needed: end,
            actual: buf.len() as u64,
        });
    }

    let slots = header.row_max as usize * header.column_count as usize;
    let mut items = Vec::with_capacity(slots);
    let mut off = header.item_off as usize;
    for _ in 0..slots {
        items.push(header::read_item(buf, off));
        off += header::ITEM_LEN;
    }
    Ok(items)
}
