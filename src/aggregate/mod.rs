//! Aggregates a directory of per-entity counter files into one logical
//! counter set.
//!
//! Each producer instance keeps one counter file per connection inside its
//! own directory. The aggregator remembers the previous poll's snapshot per
//! entity, diffs every entity that is still present, counts newly appeared
//! entities at their full cumulative total, and lets vanished entities drop
//! out (their history was already counted in earlier intervals). A sweep is
//! partial-failure-tolerant: one unreadable or mismatched file is skipped
//! with a warning while the rest still aggregate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ResultOkLogExt;
use crate::fsutil::{self, ListDirError};
use crate::statfile::{self, Snapshot, interval_diff};

/// Labeled elementwise totals for one refresh of one directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupDiff {
    /// Column names, in the order of the round's reference schema.
    pub labels: Vec<String>,
    /// Summed per-entity interval deltas, one per label.
    pub totals: Vec<i64>,
}

/// Tracks one directory of entity files across polls.
#[derive(Debug)]
pub struct DirectoryAggregator {
    dir: PathBuf,
    /// Previous poll's snapshot per entity file name.
    entities: HashMap<String, Snapshot>,
}

impl DirectoryAggregator {
    pub fn new(dir: impl Into<PathBuf>) -> DirectoryAggregator {
        DirectoryAggregator {
            dir: dir.into(),
            entities: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Re-reads every entity file and returns the interval totals since the
    /// previous refresh.
    ///
    /// The first readable entity (in name order) fixes the round's schema;
    /// entities counting different columns are skipped for the round. The
    /// prior snapshot map is replaced in a single assignment once the sweep
    /// is complete.
    ///
    /// # Errors
    ///
    /// Only a failure to list the directory itself is returned; per-entity
    /// failures are logged and skipped.
    pub fn refresh(&mut self) -> Result<GroupDiff, ListDirError> {
        let names = fsutil::list_dir_names(&self.dir)?;

        let mut current: HashMap<String, Snapshot> = HashMap::with_capacity(names.len());
        let mut diff = GroupDiff::default();
        for name in names {
            let Some(snapshot) = statfile::read_snapshot(self.dir.join(&name)).ok_log() else {
                continue;
            };

            if diff.labels.is_empty() {
                diff.labels = snapshot
                    .column_names()
                    .into_iter()
                    .map(str::to_owned)
                    .collect();
                diff.totals = vec![0i64; diff.labels.len()];
            } else if snapshot.column_names() != diff.labels {
                log::warn!(
                    "skipping entity `{}` in `{}`: columns {:?} do not match {:?}",
                    name,
                    self.dir.display(),
                    snapshot.column_names(),
                    diff.labels
                );
                current.insert(name, snapshot);
                continue;
            }

            let entity_diff = match self.entities.get(&name) {
                Some(prior) => interval_diff(prior, &snapshot),
                // no prior baseline: the full total is this interval's share
                None => Ok(snapshot.sum_from(0)),
            };
            match entity_diff {
                Ok(values) => {
                    for (total, value) in diff.totals.iter_mut().zip(values) {
                        *total += value;
                    }
                }
                Err(err) => {
                    log::warn!(
                        "skipping entity `{}` in `{}`: {}",
                        name,
                        self.dir.display(),
                        err
                    );
                }
            }
            current.insert(name, snapshot);
        }

        self.entities = current;
        Ok(diff)
    }
}

#[cfg(test)]
mod tests {
    use crate::statfile::FileLayout;
    use crate::statfile::testutil::StatFileBuilder;

    use super::*;

    fn write_entity(dir: &Path, name: &str, start_sec: u64, rows: &[[u64; 2]]) {
        let mut builder = StatFileBuilder::new(FileLayout::Extended)
            .columns(&["rcount", "wcount"])
            .name(name)
            .start_sec(start_sec);
        for (i, row) in rows.iter().enumerate() {
            builder = builder.push_row(i as u64 + 1, row);
        }
        builder.write_to(dir.join(name));
    }

    #[test]
    fn first_refresh_counts_full_totals() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_entity(dir.path(), "conn-1", 1000, &[[5, 10]]);
        write_entity(dir.path(), "conn-2", 1000, &[[1, 2], [3, 4]]);

        let mut agg = DirectoryAggregator::new(dir.path());
        let diff = agg.refresh().expect("refresh");
        assert_eq!(diff.labels, vec!["rcount", "wcount"]);
        assert_eq!(diff.totals, vec![9, 16]);
    }

    #[test]
    fn appearing_entities_count_at_face_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_entity(dir.path(), "conn-a", 1000, &[[5, 10]]);

        let mut agg = DirectoryAggregator::new(dir.path());
        agg.refresh().expect("baseline");

        write_entity(dir.path(), "conn-a", 1000, &[[8, 15]]);
        write_entity(dir.path(), "conn-b", 1000, &[[3, 4]]);
        let diff = agg.refresh().expect("refresh");
        // conn-a advanced by [3, 5]; conn-b has no baseline: [3, 4]
        assert_eq!(diff.totals, vec![6, 9]);
    }

    #[test]
    fn vanished_entities_contribute_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_entity(dir.path(), "conn-a", 1000, &[[5, 10]]);
        write_entity(dir.path(), "conn-b", 1000, &[[100, 100]]);

        let mut agg = DirectoryAggregator::new(dir.path());
        agg.refresh().expect("baseline");

        std::fs::remove_file(dir.path().join("conn-b")).expect("remove");
        write_entity(dir.path(), "conn-a", 1000, &[[6, 11]]);
        let diff = agg.refresh().expect("refresh");
        assert_eq!(diff.totals, vec![1, 1]);

        // and a reappearance later counts in full again
        write_entity(dir.path(), "conn-b", 1000, &[[2, 3]]);
        let diff = agg.refresh().expect("refresh");
        assert_eq!(diff.totals, vec![2, 3]);
    }

    #[test]
    fn unreadable_entities_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_entity(dir.path(), "conn-a", 1000, &[[5, 10]]);
        std::fs::write(dir.path().join("conn-bad"), b"not a counter file at all")
            .expect("write");

        let mut agg = DirectoryAggregator::new(dir.path());
        let diff = agg.refresh().expect("refresh");
        assert_eq!(diff.totals, vec![5, 10]);
    }

    #[test]
    fn mismatched_schema_is_skipped_for_the_round() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_entity(dir.path(), "conn-a", 1000, &[[5, 10]]);
        StatFileBuilder::new(FileLayout::Extended)
            .columns(&["ntran"])
            .push_row(1, &[7])
            .write_to(dir.path().join("conn-odd"));

        let mut agg = DirectoryAggregator::new(dir.path());
        let diff = agg.refresh().expect("refresh");
        assert_eq!(diff.labels, vec!["rcount", "wcount"]);
        assert_eq!(diff.totals, vec![5, 10]);
    }

    #[test]
    fn restarted_entity_counts_in_full() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_entity(dir.path(), "conn-a", 1000, &[[500, 500]]);

        let mut agg = DirectoryAggregator::new(dir.path());
        agg.refresh().expect("baseline");

        write_entity(dir.path(), "conn-a", 2000, &[[3, 4]]);
        let diff = agg.refresh().expect("refresh");
        assert_eq!(diff.totals, vec![3, 4]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let mut agg = DirectoryAggregator::new("/definitely/does/not/exist");
        assert!(agg.refresh().is_err());
    }
}
