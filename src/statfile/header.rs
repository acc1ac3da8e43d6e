//! Fixed-offset decoding of the counter-file header and column-spec table.
//!
//! Producer daemons overwrite these files in place through a shared mapping,
//! so every field is read at its fixed offset in native byte order and every
//! header-declared count is validated against the real byte length before it
//! is trusted. Two wire layouts exist:
//!
//! - **Extended**: 88-byte header carrying an explicit row stride
//!   (`column_count`, cache-line rounded by the producer) and an explicit
//!   row-buffer offset (`item_off`).
//! - **Compact**: 80-byte header without the stride and reserved words; the
//!   stride is implicitly `item_count + 1` and the row buffer follows the
//!   spec table directly.
//!
//! Neither layout supersedes the other; [`FileLayout::detect`] tells them
//! apart and [`StatHeader::decode`] accepts an explicit choice.

use super::error::FormatError;

/// Magic word every counter file starts with.
pub const STAT_FILE_MAGIC: u32 = 0x5354_4132;

/// Fixed width of the producer name field.
pub const PRODUCER_NAME_LEN: usize = 32;

/// Fixed width of a column name within a spec entry.
pub const COLUMN_NAME_LEN: usize = 31;

/// Bytes per column-spec entry (name plus one type tag byte).
pub const COLUMN_SPEC_LEN: usize = COLUMN_NAME_LEN + 1;

/// Bytes per counter slot in the row buffer.
pub const ITEM_LEN: usize = 8;

/// The two on-disk header layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLayout {
    /// Header with explicit `column_count` stride and `item_off` fields.
    Extended,
    /// Shorter header; stride and row-buffer offset are implicit.
    Compact,
}

impl FileLayout {
    /// Byte length of the header for this layout.
    pub const fn header_len(self) -> usize {
        match self {
            FileLayout::Extended => 88,
            FileLayout::Compact => 80,
        }
    }

    /// Decides which layout a raw file uses.
    ///
    /// Both layouts share their first 24 bytes. An extended header is
    /// recognizable because its stride field leaves room for the per-row
    /// marker and its row-buffer offset points past the spec table yet
    /// inside the file; a compact file read that way lands on its start
    /// timestamp and name bytes instead, which fail those checks.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Truncated`] if `buf` is shorter than the
    /// compact header.
    pub fn detect(buf: &[u8]) -> Result<FileLayout, FormatError> {
        if buf.len() >= FileLayout::Extended.header_len() {
            let item_count = read_u32(buf, 4);
            let column_count = read_u32(buf, 24);
            let item_off = read_u64(buf, 48);
            let spec_end = FileLayout::Extended.header_len() as u64
                + u64::from(item_count) * COLUMN_SPEC_LEN as u64;
            if column_count > item_count && item_off >= spec_end && item_off <= buf.len() as u64 {
                return Ok(FileLayout::Extended);
            }
        }
        if buf.len() >= FileLayout::Compact.header_len() {
            return Ok(FileLayout::Compact);
        }
        Err(FormatError::Truncated {
            needed: FileLayout::Compact.header_len() as u64,
            actual: buf.len() as u64,
        })
    }
}

/// Decoded counter-file header.
///
/// Field names follow the wire format. Note the producer's slot accounting:
/// `row_count` is the number of row slots allocated in the file, while
/// `row_max` is the high-water mark of slots actually written so far; it
/// starts at 0 on a fresh file and grows as producer connections appear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatHeader {
    pub layout: FileLayout,
    pub magic: u32,
    /// Number of counter columns (spec-table entries).
    pub item_count: u32,
    /// Row slots allocated by the producer.
    pub row_count: u32,
    /// Producer's current write position.
    pub row_cursor: u32,
    /// Highest row index written so far, plus one.
    pub row_max: u32,
    /// Row stride in bytes (extended layout; see [`StatHeader::decode`]).
    pub item_size: u32,
    /// Row stride in 8-byte items, marker slot included.
    pub column_count: u32,
    /// Producer start time, seconds since the epoch.
    pub start_sec: u64,
    /// Last producer update, seconds since the epoch.
    pub update_sec: u64,
    /// Byte offset of the row buffer.
    pub item_off: u64,
    /// Producer identifier, NUL-trimmed.
    pub name: String,
}

impl StatHeader {
    /// Decodes a header of the given layout from the start of `buf`.
    ///
    /// For the compact layout the stride is derived as `item_count + 1` and
    /// the row-buffer offset as header plus spec table: compact producers
    /// lay rows out sequentially, and their stored offset field is not
    /// consulted.
    ///
    /// # Errors
    ///
    /// [`FormatError::BadMagic`] on a magic mismatch,
    /// [`FormatError::Truncated`] if `buf` cannot hold the header,
    /// [`FormatError::BadStride`] / [`FormatError::BadItemSize`] if the
    /// extended stride fields are inconsistent with `item_count`.
    pub fn decode(buf: &[u8], layout: FileLayout) -> Result<StatHeader, FormatError> {
        let header_len = layout.header_len();
        if buf.len() < header_len {
            return Err(FormatError::Truncated {
                needed: header_len as u64,
                actual: buf.len() as u64,
            });
        }

        let magic = read_u32(buf, 0);
        if magic != STAT_FILE_MAGIC {
            return Err(FormatError::BadMagic { found: magic });
        }

        let item_count = read_u32(buf, 4);
        let row_count = read_u32(buf, 8);
        let row_cursor = read_u32(buf, 12);
        let row_max = read_u32(buf, 16);
        let item_size = read_u32(buf, 20);

        let spec_table_len = u64::from(item_count) * COLUMN_SPEC_LEN as u64;
        let (column_count, start_sec, update_sec, item_off, name) = match layout {
            FileLayout::Extended => {
                let column_count = read_u32(buf, 24);
                if column_count <= item_count {
                    return Err(FormatError::BadStride {
                        column_count,
                        item_count,
                    });
                }
                // the producer rounds the stride up to a cache line, so only
                // consistency with the byte size is required
                if u64::from(item_size) != u64::from(column_count) * ITEM_LEN as u64 {
                    return Err(FormatError::BadItemSize {
                        item_size,
                        column_count,
                    });
                }
                (
                    column_count,
                    read_u64(buf, 32),
                    read_u64(buf, 40),
                    read_u64(buf, 48),
                    read_text(buf, 56, PRODUCER_NAME_LEN),
                )
            }
            FileLayout::Compact => (
                item_count.saturating_add(1),
                read_u64(buf, 24),
                read_u64(buf, 32),
                header_len as u64 + spec_table_len,
                read_text(buf, 48, PRODUCER_NAME_LEN),
            ),
        };

        Ok(StatHeader {
            layout,
            magic,
            item_count,
            row_count,
            row_cursor,
            row_max,
            item_size,
            column_count,
            start_sec,
            update_sec,
            item_off,
            name,
        })
    }

    /// Byte offset just past the column-spec table.
    pub fn spec_table_end(&self) -> u64 {
        self.layout.header_len() as u64 + u64::from(self.item_count) * COLUMN_SPEC_LEN as u64
    }

    /// Byte length of the row buffer declared by this header.
    pub fn row_buffer_len(&self) -> u64 {
        u64::from(self.row_max) * u64::from(self.column_count) * ITEM_LEN as u64
    }
}

/// Column type tag carried in each spec entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Unsigned running total, the only tag current producers emit.
    Counter,
    /// Unrecognized tag, preserved as-is.
    Other(i8),
}

impl ColumnKind {
    pub fn from_raw(raw: i8) -> ColumnKind {
        match raw {
            0 => ColumnKind::Counter,
            other => ColumnKind::Other(other),
        }
    }
}

/// One column-spec table entry: a counter name and its type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// Decodes the `item_count` spec entries following the header.
///
/// # Errors
///
/// Returns [`FormatError::Truncated`] if the declared table overruns `buf`.
pub(super) fn decode_specs(buf: &[u8], header: &StatHeader) -> Result<Vec<ColumnSpec>, FormatError> {
    let end = header.spec_table_end();
    if end > buf.len() as u64 {
        return Err(FormatError::Truncated {
            needed: end,
            actual: buf.len() as u64,
        });
    }

    let mut specs = Vec::with_capacity(header.item_count as usize);
    let mut off = header.layout.header_len();
    for _ in 0..header.item_count {
        specs.push(ColumnSpec {
            name: read_text(buf, off, COLUMN_NAME_LEN),
            kind: ColumnKind::from_raw(buf[off + COLUMN_NAME_LEN] as i8),
        });
        off += COLUMN_SPEC_LEN;
    }
    Ok(specs)
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_ne_bytes(out)
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_ne_bytes(out)
}

pub(super) fn read_item(buf: &[u8], offset: usize) -> u64 {
    read_u64(buf, offset)
}

fn read_text(buf: &[u8], offset: usize, width: usize) -> String {
    let field = &buf[offset..offset + width];
    let end = field.iter().position(|&b| b == 0).unwrap_or(width);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statfile::testutil::StatFileBuilder;

    #[test]
    fn detects_extended_layout() {
        let buf = StatFileBuilder::new(FileLayout::Extended)
            .columns(&["rcount", "wcount"])
            .push_row(1, &[10, 20])
            .build();
        assert_eq!(FileLayout::detect(&buf).unwrap(), FileLayout::Extended);
    }

    #[test]
    fn detects_compact_layout() {
        let buf = StatFileBuilder::new(FileLayout::Compact)
            .columns(&["ntran"])
            .push_row(1, &[5])
            .build();
        assert_eq!(FileLayout::detect(&buf).unwrap(), FileLayout::Compact);
    }

    #[test]
    fn detect_rejects_short_input() {
        let err = FileLayout::detect(&[0u8; 40]).unwrap_err();
        assert_eq!(
            err,
            FormatError::Truncated {
                needed: 80,
                actual: 40
            }
        );
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let buf = StatFileBuilder::new(FileLayout::Compact)
            .columns(&["ntran"])
            .magic(0xdead_beef)
            .build();
        let err = StatHeader::decode(&buf, FileLayout::Compact).unwrap_err();
        assert_eq!(err, FormatError::BadMagic { found: 0xdead_beef });
    }

    #[test]
    fn decode_rejects_stride_without_marker_room() {
        let buf = StatFileBuilder::new(FileLayout::Extended)
            .columns(&["rcount", "wcount"])
            .column_count(2)
            .build();
        let err = StatHeader::decode(&buf, FileLayout::Extended).unwrap_err();
        assert_eq!(
            err,
            FormatError::BadStride {
                column_count: 2,
                item_count: 2
            }
        );
    }

    #[test]
    fn decode_accepts_cache_rounded_stride() {
        // producers round the stride up; 2 counters may arrive with stride 8
        let buf = StatFileBuilder::new(FileLayout::Extended)
            .columns(&["rcount", "wcount"])
            .column_count(8)
            .push_row(1, &[3, 4])
            .build();
        let header = StatHeader::decode(&buf, FileLayout::Extended).unwrap();
        assert_eq!(header.column_count, 8);
        assert_eq!(header.item_size, 64);
    }

    #[test]
    fn decode_trims_producer_name_at_nul() {
        let buf = StatFileBuilder::new(FileLayout::Extended)
            .columns(&["ntran"])
            .name("gateway")
            .build();
        let header = StatHeader::decode(&buf, FileLayout::Extended).unwrap();
        assert_eq!(header.name, "gateway");
    }

    #[test]
    fn compact_offset_is_derived_from_spec_table() {
        let buf = StatFileBuilder::new(FileLayout::Compact)
            .columns(&["rcount", "wcount", "rbytes", "wbytes"])
            .build();
        let header = StatHeader::decode(&buf, FileLayout::Compact).unwrap();
        assert_eq!(header.item_off, 80 + 4 * 32);
        assert_eq!(header.column_count, 5);
    }
}
