use std::collections::HashMap;

/// Cache tier for on-demand nodes and the fallback for unknown keys.
pub const DEFAULT_TIER: &str = "default";
pub const SPOT_TIER: &str = "default,spot";
pub const GPU_TIER: &str = "default,gpu";

const REGION_LABELS: &[&str] = &[
    "topology.kubernetes.io/region",
    "failure-domain.beta.kubernetes.io/region",
];

/// How a node key matches against a pricing table.
pub trait Key {
    /// Exact match identifier, empty when a provider has none.
    fn id(&self) -> &str;
    /// Comma separated node metadata used for fallback matching.
    fn features(&self) -> String;
    /// GPU type from the node labels, empty if the node has no GPU.
    fn gpu_type(&self) -> &str;
}

/// How a persistent volume matches against a pricing table.
pub trait PvKey {
    fn features(&self) -> String;
    fn storage_class(&self) -> &str;
}

/// Which node labels mark a node as spot or GPU capacity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelConfig {
    pub spot_label: String,
    pub spot_label_value: String,
    pub gpu_label: String,
    pub gpu_label_value: String,
}

/// Key for the custom provider: only spot and GPU tiers are told apart.
#[derive(Debug, Clone)]
pub struct NodeKey {
    labels_config: LabelConfig,
    labels: HashMap<String, String>,
}

impl NodeKey {
    pub fn new(labels_config: LabelConfig, labels: HashMap<String, String>) -> Self {
        Self {
            labels_config,
            labels,
        }
    }
}

impl Key for NodeKey {
    fn id(&self) -> &str {
        ""
    }

    fn features(&self) -> String {
        let spot = self
            .labels
            .get(&self.labels_config.spot_label)
            .map(String::as_str)
            .unwrap_or("");
        if !spot.is_empty() && spot == self.labels_config.spot_label_value {
            SPOT_TIER.to_string()
        } else {
            DEFAULT_TIER.to_string()
        }
    }

    fn gpu_type(&self) -> &str {
        self.labels
            .get(&self.labels_config.gpu_label)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Volume key built from the region label and storage class.
#[derive(Debug, Clone)]
pub struct VolumeKey {
    labels: HashMap<String, String>,
    storage_class: String,
}

impl VolumeKey {
    pub fn new(labels: HashMap<String, String>, storage_class: impl Into<String>) -> Self {
        Self {
            labels,
            storage_class: storage_class.into(),
        }
    }

    fn region(&self) -> &str {
        REGION_LABELS
            .iter()
            .find_map(|l| self.labels.get(*l))
            .map(String::as_str)
            .unwrap_or("")
    }
}

impl PvKey for VolumeKey {
    fn features(&self) -> String {
        format!("{},{}", self.region(), self.storage_class)
    }

    fn storage_class(&self) -> &str {
        &self.storage_class
    }
}
