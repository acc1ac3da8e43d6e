use std::path::PathBuf;

use clap::Parser;

use ringstat_monitor::collector::Role;

/// Collects interval deltas from daemon counter files and reports them as
/// named metrics, once per poll round.
#[derive(Debug, Parser)]
#[command(name = "ringstat-monitor", version, about)]
struct Args {
    /// Directory holding the producers' counter subdirectories
    #[arg(short = 'd', long, default_value = "/var/ringstat")]
    counter_dir: PathBuf,

    /// Producer role to collect from
    #[arg(short, long, value_enum, default_value_t = Role::Metadata)]
    target: Role,

    /// Cluster label suffixed to the combined target name
    #[arg(short, long)]
    label: Option<String>,

    /// Seconds to sleep between collection rounds
    #[arg(short, long, default_value_t = 5)]
    step: u64,

    /// Submit each sample by running this transport binary
    #[arg(short = 'b', long)]
    submit_bin: Option<PathBuf>,

    /// Configuration file handed to the transport binary via --conf=
    #[arg(short = 'c', long, requires = "submit_bin")]
    submit_conf: Option<PathBuf>,

    /// Print samples as JSON lines instead of the human-readable form
    #[arg(long)]
    json: bool,
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    ringstat_monitor::run(ringstat_monitor::Config {
        counter_dir: args.counter_dir,
        role: args.target,
        cluster_label: args.label,
        step: args.step,
        submit_bin: args.submit_bin,
        submit_conf: args.submit_conf,
        json: args.json,
    })
}
