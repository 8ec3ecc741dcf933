pub mod sqlite_store;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use sqlite_store::SqliteClusterStore;

/// Display name registered for a cluster id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMeta {
    pub cluster_id: String,
    pub cluster_name: Option<String>,
}

/// Durable `cluster_id -> cluster_name` records.
///
/// Implementations open a connection per call; nothing is held between
/// calls.
pub trait ClusterStore {
    /// Absent ids are `Ok(None)`, not an error.
    fn lookup(&self, cluster_id: &str) -> Result<Option<ClusterMeta>>;

    /// Insert a new record. Fails if the id is already registered.
    fn create(&self, cluster_id: &str, cluster_name: &str) -> Result<ClusterMeta>;

    /// Set the name of an existing record. Returns false if no record matched.
    fn update(&self, cluster_id: &str, cluster_name: &str) -> Result<bool>;

    /// Return the stored record, creating it if absent. An existing record
    /// is returned as is, its name is never overwritten.
    fn get_or_create(&self, cluster_id: &str, cluster_name: &str) -> Result<ClusterMeta>;
}
