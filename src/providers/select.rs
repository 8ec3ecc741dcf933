use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use super::{CustomProvider, Provider};
use crate::error::{Error, Result};
use crate::pricing::PricingStore;
use crate::types::ObservedNode;

const GCE_METADATA_IP: &str = "169.254.169.254";
const GCE_PROBE_TIMEOUT: Duration = Duration::from_millis(750);

/// Lists the nodes of the cluster being priced.
pub trait NodeLister {
    fn list_nodes(&self) -> Result<Vec<ObservedNode>>;
}

/// Tells whether we run on the reference cloud's own compute.
pub trait MetadataProbe {
    fn on_gce(&self) -> bool;
}

/// Detects GCE by asking its metadata server.
///
/// A configured metadata host counts as being on GCE without probing,
/// the same shortcut the GCP client libraries take.
#[derive(Debug, Clone, Default)]
pub struct GceMetadataProbe {
    host_override: Option<String>,
}

impl GceMetadataProbe {
    pub fn new(host_override: Option<String>) -> Self {
        Self { host_override }
    }
}

impl MetadataProbe for GceMetadataProbe {
    fn on_gce(&self) -> bool {
        if self.host_override.as_deref().is_some_and(|h| !h.is_empty()) {
            return true;
        }

        let config = ureq::Agent::config_builder()
            .timeout_global(Some(GCE_PROBE_TIMEOUT))
            .http_status_as_error(false)
            .build();
        let agent = ureq::Agent::new_with_config(config);
        match agent
            .get(format!("http://{GCE_METADATA_IP}"))
            .header("Metadata-Flavor", "Google")
            .call()
        {
            Ok(resp) => resp
                .headers()
                .get("Metadata-Flavor")
                .and_then(|v| v.to_str().ok())
                == Some("Google"),
            Err(e) => {
                tracing::trace!(error = %e, "GCE metadata server not reachable");
                false
            }
        }
    }
}

#[derive(Deserialize)]
struct NodeList {
    #[serde(default)]
    items: Vec<NodeItem>,
}

#[derive(Deserialize)]
struct NodeItem {
    #[serde(default)]
    metadata: NodeMeta,
    #[serde(default)]
    spec: NodeSpec,
}

#[derive(Deserialize, Default)]
struct NodeMeta {
    #[serde(default)]
    name: String,
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[derive(Deserialize, Default)]
struct NodeSpec {
    #[serde(rename = "providerID", default)]
    provider_id: String,
}

/// Node list read from `kubectl get nodes -o json` output.
#[derive(Debug, Clone)]
pub struct NodeListFile {
    path: PathBuf,
}

impl NodeListFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub fn parse_node_list(data: &str) -> Result<Vec<ObservedNode>> {
    let list: NodeList = serde_json::from_str(data)?;
    Ok(list
        .items
        .into_iter()
        .map(|item| ObservedNode {
            name: item.metadata.name,
            provider_id: item.spec.provider_id,
            labels: item.metadata.labels,
        })
        .collect())
}

impl NodeLister for NodeListFile {
    fn list_nodes(&self) -> Result<Vec<ObservedNode>> {
        let data = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        parse_node_list(&data)
    }
}

/// The pricing backend a cluster should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    Gcp { api_key: String },
    Aws,
    Azure,
    Custom,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Gcp { .. } => "gcp",
            ProviderKind::Aws => "aws",
            ProviderKind::Azure => "azure",
            ProviderKind::Custom => "custom",
        }
    }

    /// Build the provider. Cloud billing backends live outside this
    /// crate, so only the custom provider can be constructed here.
    pub fn into_provider(self, store: PricingStore) -> Result<Box<dyn Provider>> {
        match self {
            ProviderKind::Custom => Ok(Box::new(CustomProvider::new(store))),
            other => Err(Error::UnsupportedBackend(other.name())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decide which backend prices this cluster.
///
/// GCE metadata wins, then the first node's provider id prefix; anything
/// unrecognised, including an empty cluster, gets the custom provider.
/// Only a failing node listing is an error.
pub fn select_provider(
    nodes: &dyn NodeLister,
    probe: &dyn MetadataProbe,
    api_key: Option<&str>,
) -> Result<ProviderKind> {
    if probe.on_gce() {
        tracing::debug!("metadata reports we are in GCE");
        return match api_key.filter(|k| !k.is_empty()) {
            Some(k) => Ok(ProviderKind::Gcp {
                api_key: k.to_string(),
            }),
            None => Err(Error::MissingCredential),
        };
    }

    let nodes = nodes.list_nodes()?;
    let provider_id = nodes
        .first()
        .map(|n| n.provider_id.to_lowercase())
        .unwrap_or_default();

    if provider_id.starts_with("aws") {
        tracing::debug!("found provider id starting with \"aws\", using AWS provider");
        Ok(ProviderKind::Aws)
    } else if provider_id.starts_with("azure") {
        tracing::debug!("found provider id starting with \"azure\", using Azure provider");
        Ok(ProviderKind::Azure)
    } else {
        tracing::debug!(provider_id = %provider_id, "unsupported provider, falling back to default");
        Ok(ProviderKind::Custom)
    }
}
