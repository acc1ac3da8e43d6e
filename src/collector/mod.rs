//! Poll-cycle-gated collection over a set of counter directories.
//!
//! The external scheduler queries named metrics one at a time, cycling
//! through a fixed registry once per collection round with no explicit
//! begin-of-round signal. [`Collector::on_query`] therefore counts calls
//! and performs one full refresh (re-reading every entity file of every
//! group) exactly when the call counter wraps the registry size, so a
//! round of N queries costs one sweep instead of N.
//!
//! All mutable collection state (last-seen snapshots, cumulative counters,
//! registry) lives in the [`Collector`] value, so independent collectors
//! for different producer roles can coexist and be tested in isolation.

mod descriptor;

pub use descriptor::{LabelSpec, MetricDescriptor, Role, build_registry};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::aggregate::{DirectoryAggregator, GroupDiff};
use crate::fsutil::{self, ListDirError};

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("counter directory `{path}` does not exist")]
    MissingDirectory { path: PathBuf },

    #[error("no `{prefix}` counter directories found under `{path}`")]
    NoTargets { path: PathBuf, prefix: String },

    #[error(transparent)]
    ListDir(#[from] ListDirError),
}

/// Lookup failure for a queried metric name. Never crosses the scheduler
/// boundary; [`Collector::on_query`] converts it to a warning and a zero.
#[derive(Debug, thiserror::Error)]
enum LookupError {
    #[error("metric name `{0}` has no target prefix")]
    BadName(String),

    #[error("no value for metric `{0}`")]
    Unknown(String),
}

/// Cumulative counter values for one target, by label.
type Counts = HashMap<String, u64>;

#[derive(Debug)]
struct Group {
    /// Target name, equal to the counter subdirectory name.
    name: String,
    aggregator: DirectoryAggregator,
}

/// Collects interval deltas across every producer directory of one role and
/// answers the scheduler's per-metric queries.
#[derive(Debug)]
pub struct Collector {
    groups: Vec<Group>,
    /// Combined target accumulating the grand total, present when more than
    /// one group existed at startup.
    alias: Option<String>,
    registry: Vec<MetricDescriptor>,
    /// Cumulative values per target and label, folded as
    /// `previous + interval diff`; reset only on collector restart.
    counts: HashMap<String, Counts>,
    calls: u64,
}

impl Collector {
    /// Scans `counter_dir` for the role's producer directories and builds
    /// the fixed metric registry.
    ///
    /// Each group is primed with an initial snapshot sweep so the first
    /// round reports the delta since collector startup rather than the
    /// producers' full history.
    ///
    /// # Errors
    ///
    /// Fails when the counter directory does not exist, cannot be listed,
    /// or holds no directory matching the role's prefix. These are the only
    /// fatal conditions; everything later is recovered per poll.
    pub fn new(
        counter_dir: impl AsRef<Path>,
        role: Role,
        cluster_label: Option<&str>,
    ) -> Result<Collector, InitError> {
        let counter_dir = counter_dir.as_ref();
        if !counter_dir.exists() {
            return Err(InitError::MissingDirectory {
                path: counter_dir.to_path_buf(),
            });
        }

        let prefix = role.dir_prefix();
        let names: Vec<String> = fsutil::list_dir_names(counter_dir)?
            .into_iter()
            .filter(|name| name.starts_with(&prefix))
            .collect();
        if names.is_empty() {
            return Err(InitError::NoTargets {
                path: counter_dir.to_path_buf(),
                prefix,
            });
        }

        let alias = (names.len() > 1).then(|| match cluster_label {
            Some(label) if !label.is_empty() => format!("{prefix}-{label}"),
            _ => prefix.clone(),
        });

        let mut targets = names.clone();
        targets.extend(alias.clone());
        let registry = build_registry(role, &targets);

        let mut groups: Vec<Group> = names
            .into_iter()
            .map(|name| {
                let aggregator = DirectoryAggregator::new(counter_dir.join(&name));
                Group { name, aggregator }
            })
            .collect();

        // baseline sweep; failures here only mean the first round counts in
        // full for the affected group
        for group in &mut groups {
            if let Err(err) = group.aggregator.refresh() {
                log::warn!("initial sweep of `{}` failed: {}", group.name, err);
            }
        }

        Ok(Collector {
            groups,
            alias,
            registry,
            counts: HashMap::new(),
            calls: 0,
        })
    }

    /// The fixed, stable-ordered metric registry.
    pub fn registry(&self) -> &[MetricDescriptor] {
        &self.registry
    }

    /// Answers one scheduler query.
    ///
    /// Triggers a full refresh when the call counter wraps the registry
    /// size, then resolves the name against the cumulative counters. An
    /// unknown name, or any internal failure, yields 0 with a warning; the
    /// scheduler has no error channel.
    pub fn on_query(&mut self, name: &str) -> u64 {
        if self.calls % self.registry.len() as u64 == 0 {
            self.refresh_all();
        }
        self.calls += 1;

        match self.lookup(name) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("{err}");
                0
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<u64, LookupError> {
        let (target, label) = name
            .rsplit_once('_')
            .ok_or_else(|| LookupError::BadName(name.to_owned()))?;
        self.counts
            .get(target)
            .and_then(|counts| counts.get(label))
            .copied()
            .ok_or_else(|| LookupError::Unknown(name.to_owned()))
    }

    fn refresh_all(&mut self) {
        log::debug!("refreshing {} counter groups", self.groups.len());

        let mut grand: HashMap<String, i64> = HashMap::new();
        let mut next: HashMap<String, Counts> = HashMap::with_capacity(self.groups.len() + 1);
        for group in &mut self.groups {
            match group.aggregator.refresh() {
                Ok(diff) => {
                    for (label, value) in diff.labels.iter().zip(&diff.totals) {
                        *grand.entry(label.clone()).or_insert(0) += value;
                    }
                    let folded = fold(self.counts.get(&group.name), &diff);
                    next.insert(group.name.clone(), folded);
                }
                Err(err) => {
                    log::warn!("skipping group `{}` this round: {}", group.name, err);
                    // carry the previous values so queries stay answerable
                    if let Some(previous) = self.counts.get(&group.name) {
                        next.insert(group.name.clone(), previous.clone());
                    }
                }
            }
        }

        if let Some(alias) = &self.alias {
            let previous = self.counts.get(alias);
            let mut folded = previous.cloned().unwrap_or_default();
            for (label, delta) in grand {
                let slot = folded.entry(label).or_insert(0);
                *slot = slot.wrapping_add_signed(delta);
            }
            next.insert(alias.clone(), folded);
        }

        self.counts = next;
    }
}

/// `previous + diff` per label; absent previous values start from zero.
fn fold(previous: Option<&Counts>, diff: &GroupDiff) -> Counts {
    let mut counts = Counts::with_capacity(diff.labels.len());
    for (label, delta) in diff.labels.iter().zip(&diff.totals) {
        let base = previous
            .and_then(|counts| counts.get(label))
            .copied()
            .unwrap_or(0);
        counts.insert(label.clone(), base.wrapping_add_signed(*delta));
    }
    counts
}
