pub mod custom;
pub mod select;

use std::collections::{BTreeMap, HashMap};

use crate::error::Result;
use crate::keys::{Key, PvKey};
use crate::pricing::PricingRecord;
use crate::types::{Network, Node, NodePrice, ObservedVolume, OutOfClusterAllocation, Pv};

pub use custom::CustomProvider;
pub use select::{select_provider, ProviderKind};

/// A pricing backend for one kind of cluster.
///
/// Lookups are best effort: a backend that cannot price a key falls back
/// to coarser data rather than failing the caller.
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Identity of the cluster as known to this backend (`name`, `provider`, ...).
    fn cluster_info(&self) -> Result<BTreeMap<String, String>>;

    fn add_service_key(&self, params: &HashMap<String, String>) -> Result<()>;

    /// Raw disk inventory, if the backend can list it.
    fn get_disks(&self) -> Result<Option<Vec<u8>>>;

    fn node_pricing(&self, key: &dyn Key) -> Result<Node>;

    fn pv_pricing(&self, key: &dyn PvKey) -> Result<Pv>;

    fn network_pricing(&self) -> Result<Network>;

    /// Snapshot of every cached tier.
    fn all_node_pricing(&self) -> Result<HashMap<String, NodePrice>>;

    /// Reload pricing data into the cache. Must run before the first lookup.
    fn download_pricing_data(&self) -> Result<()>;

    fn get_key(&self, labels: &HashMap<String, String>) -> Box<dyn Key>;

    fn get_pv_key(
        &self,
        volume: &ObservedVolume,
        parameters: &HashMap<String, String>,
    ) -> Box<dyn PvKey>;

    /// Apply a JSON patch to the pricing record, persist it and refresh.
    fn update_config(&self, payload: &str) -> Result<PricingRecord>;

    fn get_config(&self) -> Result<PricingRecord>;

    fn get_management_platform(&self) -> Result<String>;

    fn get_local_storage_query(&self) -> Result<String>;

    /// Tagged spend outside the cluster between `start` and `end`
    /// (`YYYY-MM-DD`), allocated by `aggregator`.
    fn external_allocations(
        &self,
        start: &str,
        end: &str,
        aggregator: &str,
    ) -> Result<Vec<OutOfClusterAllocation>>;
}
