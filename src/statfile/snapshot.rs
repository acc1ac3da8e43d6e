//! In-memory, point-in-time parse of one counter file.
//!
//! A [`Snapshot`] owns the decoded header, the column-spec table, and the
//! written portion of the row buffer. It is created fresh on every poll,
//! diffed against its predecessor, and discarded. Reads are best-effort: the
//! producer may overwrite the file mid-read, and a torn copy that still
//! passes the magic and length checks is accepted as valid.

use super::error::FormatError;
use super::header::{ColumnSpec, StatHeader};

/// One parsed row: the producer's marker slot plus one value per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Row<'a> {
    /// Slot marker; a producer connection id, or 0 for a cleared slot.
    pub marker: u64,
    /// Counter values, one per [`ColumnSpec`].
    pub values: &'a [u64],
}

/// Immutable parse of one counter file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    header: StatHeader,
    specs: Vec<ColumnSpec>,
    /// `row_max × column_count` slots, marker first within each row.
    items: Vec<u64>,
}

impl Snapshot {
    pub(super) fn new(header: StatHeader, specs: Vec<ColumnSpec>, items: Vec<u64>) -> Snapshot {
        Snapshot {
            header,
            specs,
            items,
        }
    }

    pub fn header(&self) -> &StatHeader {
        &self.header
    }

    pub fn specs(&self) -> &[ColumnSpec] {
        &self.specs
    }

    /// Number of counter columns per row.
    pub fn item_count(&self) -> usize {
        self.specs.len()
    }

    /// Column names in spec-table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.specs.iter().map(|spec| spec.name.as_str()).collect()
    }

    /// Number of rows the parsed buffer holds (the producer's high-water
    /// mark at read time).
    pub fn rows_written(&self) -> usize {
        let stride = self.header.column_count as usize;
        if stride == 0 {
            return 0;
        }
        self.items.len() / stride
    }

    /// Returns row `i`, or `None` when `i` is outside the allocated slots or
    /// the parsed buffer.
    pub fn row_at(&self, i: usize) -> Option<Row<'_>> {
        if i >= self.header.row_count as usize {
            return None;
        }
        let stride = self.header.column_count as usize;
        let start = i.checked_mul(stride)?;
        let end = start.checked_add(1 + self.item_count())?;
        if end > self.items.len() {
            return None;
        }
        Some(Row {
            marker: self.items[start],
            values: &self.items[start + 1..end],
        })
    }

    /// Elementwise sum of every written row from `start_row` up to the
    /// high-water mark. Unwritten slots contribute nothing.
    ///
    /// This is the full cumulative total when `start_row` is 0, used as the
    /// interval value whenever no prior baseline exists (new entity, or a
    /// producer restart).
    pub fn sum_from(&self, start_row: usize) -> Vec<i64> {
        let mut total = vec![0i64; self.item_count()];
        for i in start_row..self.rows_written() {
            if let Some(row) = self.row_at(i) {
                for (slot, value) in total.iter_mut().zip(row.values) {
                    *slot += *value as i64;
                }
            }
        }
        total
    }

    /// Verifies that `other` counts the same columns as `self`.
    ///
    /// Two snapshots are comparable only when their item counts and column
    /// names match; anything else must fail fast rather than be zipped to
    /// the shorter length.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::SchemaMismatch`] naming both schemas.
    pub fn check_comparable(&self, other: &Snapshot) -> Result<(), FormatError> {
        let ours = self.column_names();
        let theirs = other.column_names();
        if ours != theirs {
            return Err(FormatError::SchemaMismatch {
                left: ours.into_iter().map(str::to_owned).collect(),
                right: theirs.into_iter().map(str::to_owned).collect(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::statfile::header::FileLayout;
    use crate::statfile::testutil::StatFileBuilder;

    use super::*;

    fn snapshot(builder: StatFileBuilder) -> Snapshot {
        crate::statfile::reader::decode(&builder.build()).unwrap()
    }

    #[test]
    fn row_access_is_bounds_checked() {
        let snap = snapshot(
            StatFileBuilder::new(FileLayout::Extended)
                .columns(&["rcount", "wcount"])
                .push_row(7, &[1, 2])
                .push_row(8, &[3, 4]),
        );

        let row = snap.row_at(1).unwrap();
        assert_eq!(row.marker, 8);
        assert_eq!(row.values, &[3, 4]);
        assert!(snap.row_at(2).is_none());
        assert!(snap.row_at(usize::MAX).is_none());
    }

    #[test]
    fn sum_from_covers_the_written_tail() {
        let snap = snapshot(
            StatFileBuilder::new(FileLayout::Compact)
                .columns(&["rcount", "wcount"])
                .push_row(1, &[1, 10])
                .push_row(2, &[2, 20])
                .push_row(3, &[3, 30]),
        );

        assert_eq!(snap.sum_from(0), vec![6, 60]);
        assert_eq!(snap.sum_from(1), vec![5, 50]);
        assert_eq!(snap.sum_from(3), vec![0, 0]);
    }

    #[test]
    fn unwritten_slots_do_not_contribute() {
        // allocated capacity exceeds the high-water mark on real files
        let snap = snapshot(
            StatFileBuilder::new(FileLayout::Extended)
                .columns(&["ntran"])
                .push_row(1, &[41])
                .row_count(16),
        );

        assert_eq!(snap.rows_written(), 1);
        assert_eq!(snap.sum_from(0), vec![41]);
        assert!(snap.row_at(1).is_none());
    }

    #[test]
    fn differing_schemas_are_not_comparable() {
        let a = snapshot(StatFileBuilder::new(FileLayout::Compact).columns(&["rcount", "wcount"]));
        let b = snapshot(StatFileBuilder::new(FileLayout::Compact).columns(&["rcount", "rbytes"]));

        let err = a.check_comparable(&b).unwrap_err();
        assert_eq!(
            err,
            FormatError::SchemaMismatch {
                left: vec!["rcount".into(), "wcount".into()],
                right: vec!["rcount".into(), "rbytes".into()],
            }
        );
        assert!(a.check_comparable(&a).is_ok());
    }
}
