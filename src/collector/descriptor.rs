//! Producer roles and the metric registry queried by the scheduler.

/// The two producer roles, each with its own counter vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Role {
    /// Metadata servers count transactions only.
    Metadata,
    /// Storage servers count read/write operations and byte totals.
    Storage,
}

/// One label a role's counter files carry, with its reporting metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSpec {
    pub label: &'static str,
    pub units: &'static str,
    pub description: &'static str,
}

const METADATA_LABELS: &[LabelSpec] = &[LabelSpec {
    label: "ntran",
    units: "transactions",
    description: "The number of transactions received",
}];

const STORAGE_LABELS: &[LabelSpec] = &[
    LabelSpec {
        label: "rcount",
        units: "counts",
        description: "The number of read transactions received",
    },
    LabelSpec {
        label: "wcount",
        units: "counts",
        description: "The number of write transactions received",
    },
    LabelSpec {
        label: "rbytes",
        units: "bytes",
        description: "The total bytes read",
    },
    LabelSpec {
        label: "wbytes",
        units: "bytes",
        description: "The total bytes written",
    },
];

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Metadata => "metadata",
            Role::Storage => "storage",
        }
    }

    /// Counter-directory prefix the role's producers use.
    pub fn dir_prefix(self) -> String {
        format!("iostat-{}", self.as_str())
    }

    /// The labels this role's counter files carry, in wire order.
    pub fn labels(self) -> &'static [LabelSpec] {
        match self {
            Role::Metadata => METADATA_LABELS,
            Role::Storage => STORAGE_LABELS,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One queryable metric: a target (producer directory or the combined
/// alias) paired with a counter label.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MetricDescriptor {
    /// Scheduler-facing name, `<target>_<label>`.
    pub name: String,
    pub label: &'static str,
    pub units: &'static str,
    pub description: &'static str,
}

/// Builds the fixed registry: every role label crossed with every target,
/// in stable order.
pub fn build_registry(role: Role, targets: &[String]) -> Vec<MetricDescriptor> {
    let mut registry = Vec::with_capacity(role.labels().len() * targets.len());
    for spec in role.labels() {
        for target in targets {
            registry.push(MetricDescriptor {
                name: format!("{}_{}", target, spec.label),
                label: spec.label,
                units: spec.units,
                description: spec.description,
            });
        }
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_crosses_labels_with_targets() {
        let targets = vec!["iostat-storage-a".to_owned(), "iostat-storage".to_owned()];
        let registry = build_registry(Role::Storage, &targets);
        assert_eq!(registry.len(), 8);
        assert_eq!(registry[0].name, "iostat-storage-a_rcount");
        assert_eq!(registry[1].name, "iostat-storage_rcount");
        assert_eq!(registry[7].name, "iostat-storage_wbytes");
    }

    #[test]
    fn metadata_role_has_a_single_label() {
        let registry = build_registry(Role::Metadata, &["iostat-metadata-x".to_owned()]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry[0].name, "iostat-metadata-x_ntran");
        assert_eq!(registry[0].units, "transactions");
    }
}
