use std::path::PathBuf;
use std::time::Duration;

use crate::collector::{Collector, Role};
use crate::error::ResultOkLogExt;
use crate::submit::{MetricSample, Submitter};

/// Ringstat Monitor: a collector for the ring-buffer counter files that
/// storage-cluster daemons keep per connection.
///
/// This library parses the binary counter-file format (both header
/// layouts), reconstructs per-interval deltas across producer restarts and
/// buffer growth, aggregates a directory of per-connection files into one
/// logical counter set, and amortizes the file sweeps across a round of
/// one-metric-at-a-time scheduler queries.
pub mod aggregate;
pub mod collector;
pub mod error;
pub mod fsutil;
pub mod statfile;
pub mod submit;

/// Collector runtime settings, assembled by the binary's option parser.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the producers' `iostat-<role>` subdirectories.
    pub counter_dir: PathBuf,
    pub role: Role,
    /// Optional cluster label suffixed to the combined target name.
    pub cluster_label: Option<String>,
    /// Seconds to sleep between collection rounds.
    pub step: u64,
    /// Transport binary; submission is enabled by its presence.
    pub submit_bin: Option<PathBuf>,
    /// Configuration path handed to the transport via `--conf=`.
    pub submit_conf: Option<PathBuf>,
    /// Print samples as JSON lines instead of the human-readable form.
    pub json: bool,
}

/// Runs the collector loop.
///
/// Queries every registered metric once per round in registry order, prints
/// each sample (optionally submitting it through the external transport),
/// and sleeps between rounds.
///
/// # Errors
///
/// Returns an error only for the fatal startup conditions: a missing
/// counter directory or an empty target list. Once the loop is running,
/// every failure is logged and recovered.
pub fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut collector = Collector::new(
        &config.counter_dir,
        config.role,
        config.cluster_label.as_deref(),
    )?;
    log::debug!(
        "collecting {} metrics from `{}`",
        collector.registry().len(),
        config.counter_dir.display()
    );

    let submitter = config
        .submit_bin
        .map(|bin| Submitter::new(bin, config.submit_conf));

    loop {
        let descriptors = collector.registry().to_vec();
        for descriptor in &descriptors {
            let value = collector.on_query(&descriptor.name);
            let sample = MetricSample {
                name: &descriptor.name,
                value,
                units: descriptor.units,
            };

            if config.json {
                println!("{}", serde_json::to_string(&sample)?);
            } else {
                println!(
                    " {}: {} {} [{}]",
                    sample.name, sample.value, sample.units, descriptor.description
                );
            }
            if let Some(submitter) = &submitter {
                submitter.submit(&sample).ok_log();
            }
        }

        log::trace!("sleeping {} seconds until the next round", config.step);
        std::thread::sleep(Duration::from_secs(config.step));
    }
}
