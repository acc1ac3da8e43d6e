//! Hands finished samples to an external submission command.
//!
//! The transport is a separate binary that accepts one name/value/units
//! tuple per invocation; this module only builds and runs the command line.
//! Submission failures are reported to the caller, which logs and moves on;
//! a dead transport must never stall collection.

use std::path::PathBuf;
use std::process::{Command, ExitStatus};

/// One collected metric value, as printed and as submitted.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MetricSample<'a> {
    pub name: &'a str,
    pub value: u64,
    pub units: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("failed to run `{bin}`: {source}")]
    Spawn {
        bin: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{bin}` exited with {status}")]
    Failed { bin: PathBuf, status: ExitStatus },
}

/// Runs the transport binary once per sample.
#[derive(Debug)]
pub struct Submitter {
    bin: PathBuf,
    conf: Option<PathBuf>,
}

impl Submitter {
    pub fn new(bin: PathBuf, conf: Option<PathBuf>) -> Submitter {
        Submitter { bin, conf }
    }

    /// Submits one sample.
    ///
    /// # Errors
    ///
    /// [`SubmitError::Spawn`] when the binary cannot be executed,
    /// [`SubmitError::Failed`] when it exits non-zero.
    pub fn submit(&self, sample: &MetricSample<'_>) -> Result<(), SubmitError> {
        let mut command = Command::new(&self.bin);
        if let Some(conf) = &self.conf {
            command.arg(format!("--conf={}", conf.display()));
        }
        command
            .arg(format!("--name={}", sample.name))
            .arg(format!("--value={}", sample.value))
            .arg(format!("--units={}", sample.units))
            .arg("--type=uint32")
            .arg("--slope=positive");

        let status = command.status().map_err(|source| SubmitError::Spawn {
            bin: self.bin.clone(),
            source,
        })?;
        if !status.success() {
            return Err(SubmitError::Failed {
                bin: self.bin.clone(),
                status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MetricSample<'static> {
        MetricSample {
            name: "iostat-storage-1_rcount",
            value: 42,
            units: "counts",
        }
    }

    #[test]
    fn successful_transport_run() {
        let submitter = Submitter::new(PathBuf::from("true"), None);
        submitter.submit(&sample()).expect("submit");
    }

    #[test]
    fn failing_transport_is_reported() {
        let submitter = Submitter::new(PathBuf::from("false"), None);
        assert!(matches!(
            submitter.submit(&sample()),
            Err(SubmitError::Failed { .. })
        ));
    }

    #[test]
    fn missing_transport_is_a_spawn_error() {
        let submitter = Submitter::new(PathBuf::from("/definitely/does/not/exist"), None);
        assert!(matches!(
            submitter.submit(&sample()),
            Err(SubmitError::Spawn { .. })
        ));
    }

    #[test]
    fn samples_serialize_as_flat_objects() {
        let json = serde_json::to_string(&sample()).expect("serialize");
        assert_eq!(
            json,
            r#"{"name":"iostat-storage-1_rcount","value":42,"units":"counts"}"#
        );
    }
}
