//! Test-only builder producing byte-exact synthetic counter files.

use std::path::Path;

use super::header::{
    COLUMN_NAME_LEN, COLUMN_SPEC_LEN, FileLayout, ITEM_LEN, PRODUCER_NAME_LEN, STAT_FILE_MAGIC,
};

/// Producers cache-align the row buffer; the builder mimics that for the
/// extended layout.
const LINE: u64 = 64;

/// Builds counter files in either layout, with overridable header fields
/// for malformed-input tests.
pub(crate) struct StatFileBuilder {
    layout: FileLayout,
    magic: u32,
    name: String,
    start_sec: u64,
    update_sec: u64,
    columns: Vec<String>,
    rows: Vec<(u64, Vec<u64>)>,
    row_count: Option<u32>,
    column_count: Option<u32>,
    item_count: Option<u32>,
}

impl StatFileBuilder {
    pub fn new(layout: FileLayout) -> StatFileBuilder {
        StatFileBuilder {
            layout,
            magic: STAT_FILE_MAGIC,
            name: String::new(),
            start_sec: 1_600_000_000,
            update_sec: 1_600_000_000,
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: None,
            column_count: None,
            item_count: None,
        }
    }

    pub fn columns(mut self, names: &[&str]) -> StatFileBuilder {
        self.columns = names.iter().map(|name| (*name).to_owned()).collect();
        self
    }

    pub fn push_row(mut self, marker: u64, values: &[u64]) -> StatFileBuilder {
        assert_eq!(values.len(), self.columns.len(), "row width");
        self.rows.push((marker, values.to_vec()));
        self
    }

    pub fn name(mut self, name: &str) -> StatFileBuilder {
        self.name = name.to_owned();
        self
    }

    pub fn start_sec(mut self, sec: u64) -> StatFileBuilder {
        self.start_sec = sec;
        self
    }

    pub fn update_sec(mut self, sec: u64) -> StatFileBuilder {
        self.update_sec = sec;
        self
    }

    pub fn magic(mut self, magic: u32) -> StatFileBuilder {
        self.magic = magic;
        self
    }

    /// Overrides the allocated-slot count (defaults to the written rows).
    pub fn row_count(mut self, count: u32) -> StatFileBuilder {
        self.row_count = Some(count);
        self
    }

    /// Overrides the row stride (defaults to `columns + 1`).
    pub fn column_count(mut self, count: u32) -> StatFileBuilder {
        self.column_count = Some(count);
        self
    }

    /// Overrides the declared column count without changing the spec table.
    pub fn item_count(mut self, count: u32) -> StatFileBuilder {
        self.item_count = Some(count);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let header_len = self.layout.header_len() as u64;
        let stride = self
            .column_count
            .unwrap_or(self.columns.len() as u32 + 1) as u64;
        let spec_end = header_len + self.columns.len() as u64 * COLUMN_SPEC_LEN as u64;
        let item_off = match self.layout {
            FileLayout::Extended => spec_end.div_ceil(LINE) * LINE,
            FileLayout::Compact => spec_end,
        };
        let item_size = match self.layout {
            FileLayout::Extended => stride as u32 * ITEM_LEN as u32,
            FileLayout::Compact => ITEM_LEN as u32,
        };

        let total = item_off + self.rows.len() as u64 * stride * ITEM_LEN as u64;
        let mut buf = vec![0u8; total as usize];

        put_u32(&mut buf, 0, self.magic);
        put_u32(&mut buf, 4, self.item_count.unwrap_or(self.columns.len() as u32));
        put_u32(&mut buf, 8, self.row_count.unwrap_or(self.rows.len() as u32));
        put_u32(&mut buf, 12, self.rows.len() as u32);
        put_u32(&mut buf, 16, self.rows.len() as u32);
        put_u32(&mut buf, 20, item_size);
        match self.layout {
            FileLayout::Extended => {
                put_u32(&mut buf, 24, stride as u32);
                put_u64(&mut buf, 32, self.start_sec);
                put_u64(&mut buf, 40, self.update_sec);
                put_u64(&mut buf, 48, item_off);
                put_text(&mut buf, 56, PRODUCER_NAME_LEN, &self.name);
            }
            FileLayout::Compact => {
                put_u64(&mut buf, 24, self.start_sec);
                put_u64(&mut buf, 32, self.update_sec);
                put_u64(&mut buf, 40, item_off);
                put_text(&mut buf, 48, PRODUCER_NAME_LEN, &self.name);
            }
        }

        let mut off = self.layout.header_len();
        for column in &self.columns {
            put_text(&mut buf, off, COLUMN_NAME_LEN, column);
            // spec type tag: unsigned running total
            buf[off + COLUMN_NAME_LEN] = 0;
            off += COLUMN_SPEC_LEN;
        }

        let mut off = item_off as usize;
        for (marker, values) in &self.rows {
            put_u64(&mut buf, off, *marker);
            for (k, value) in values.iter().enumerate() {
                put_u64(&mut buf, off + (k + 1) * ITEM_LEN, *value);
            }
            off += (stride as usize) * ITEM_LEN;
        }
        buf
    }

    pub fn write_to(&self, path: impl AsRef<Path>) {
        std::fs::write(path, self.build()).expect("write counter file");
    }
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
}

fn put_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_ne_bytes());
}

fn put_text(buf: &mut [u8], offset: usize, width: usize, text: &str) {
    let bytes = text.as_bytes();
    assert!(bytes.len() <= width, "text field overflow");
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}
