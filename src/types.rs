use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Node prices handed to the cost model. Providers fill in what they
/// know; empty strings mean "unknown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "hourlyCost")]
    pub cost: String,
    #[serde(rename = "CPU")]
    pub vcpu: String,
    #[serde(rename = "CPUHourlyCost")]
    pub vcpu_cost: String,
    #[serde(rename = "RAM")]
    pub ram: String,
    #[serde(rename = "RAMBytes")]
    pub ram_bytes: String,
    #[serde(rename = "RAMGBHourlyCost")]
    pub ram_cost: String,
    #[serde(rename = "storage")]
    pub storage: String,
    #[serde(rename = "storageHourlyCost")]
    pub storage_cost: String,
    #[serde(rename = "usesDefaultPrice")]
    pub uses_base_cpu_price: bool,
    /// Used to compute an implicit RAM GB/hr price when RAM pricing is missing.
    #[serde(rename = "baseCPUPrice")]
    pub base_cpu_price: String,
    #[serde(rename = "baseRAMPrice")]
    pub base_ram_price: String,
    #[serde(rename = "baseGPUPrice")]
    pub base_gpu_price: String,
    #[serde(rename = "usageType")]
    pub usage_type: String,
    /// Number of GPUs on the instance.
    #[serde(rename = "gpu")]
    pub gpu: String,
    #[serde(rename = "gpuName")]
    pub gpu_name: String,
    #[serde(rename = "gpuCost")]
    pub gpu_cost: String,
}

/// Persistent volume prices, best effort like [`Node`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pv {
    #[serde(rename = "hourlyCost")]
    pub cost: String,
    #[serde(rename = "costPerIOOperation")]
    pub cost_per_io: String,
    #[serde(rename = "storageClass")]
    pub class: String,
    pub size: String,
    pub region: String,
    pub parameters: HashMap<String, String>,
}

/// Network egress prices per GB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Network {
    pub zone_network_egress_cost: f64,
    pub region_network_egress_cost: f64,
    pub internet_network_egress_cost: f64,
}

/// One pricing tier in a provider's cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct NodePrice {
    pub cpu: String,
    pub ram: String,
    pub gpu: String,
}

/// Cloud spend not tied to anything running in the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutOfClusterAllocation {
    pub aggregator: String,
    pub environment: String,
    pub service: String,
    pub cost: f64,
    pub cluster: String,
}

/// A node as observed through the Kubernetes API: only the bits the
/// selector and key derivation look at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedNode {
    pub name: String,
    pub provider_id: String,
    pub labels: HashMap<String, String>,
}

/// A persistent volume as observed through the Kubernetes API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedVolume {
    pub name: String,
    pub storage_class: String,
    pub labels: HashMap<String, String>,
}
