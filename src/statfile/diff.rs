//! Interval differencing between two snapshots of the same counter file.
//!
//! The producer accumulates one row per connection instead of exposing a
//! single running counter, so the interval delta is reconstructed row by
//! row, tolerating producer restarts and row-buffer growth between polls.

use super::error::FormatError;
use super::snapshot::Snapshot;

/// Computes the per-column counter delta from `old` to `new`.
///
/// In order:
///
/// 1. A larger `start_sec` in `new` means the producer restarted and all
///    prior history is gone; the delta is `new`'s full cumulative total and
///    `old` is ignored.
/// 2. If `new` has written rows past `old`'s high-water mark, those rows had
///    no baseline and count at face value.
/// 3. Every row index both snapshots cover contributes `new − old`
///    elementwise. A slot unwritten on one side counts as zero for that
///    side, so a row that appeared (or was cleared) between polls still
///    contributes its face value.
///
/// Deltas are signed and never clamped: a producer that rewinds a single
/// row without restarting shows up as a negative contribution, which the
/// caller must be able to see.
///
/// # Errors
///
/// Returns [`FormatError::SchemaMismatch`] when the snapshots do not count
/// the same columns.
pub fn interval_diff(old: &Snapshot, new: &Snapshot) -> Result<Vec<i64>, FormatError> {
    old.check_comparable(new)?;

    if new.header().start_sec > old.header().start_sec {
        return Ok(new.sum_from(0));
    }

    let old_rows = old.header().row_max as usize;
    let new_rows = new.header().row_max as usize;
    let upto = old_rows.min(new_rows);

    let mut delta = if new_rows > old_rows {
        new.sum_from(old_rows)
    } else {
        vec![0i64; new.item_count()]
    };

    for i in 0..upto {
        if let Some(row) = new.row_at(i) {
            for (slot, value) in delta.iter_mut().zip(row.values) {
                *slot += *value as i64;
            }
        }
        if let Some(row) = old.row_at(i) {
            for (slot, value) in delta.iter_mut().zip(row.values) {
                *slot -= *value as i64;
            }
        }
    }
    Ok(delta)
}
