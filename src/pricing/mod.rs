pub mod patch;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// File name of the authoritative pricing record inside the config dir.
pub const DEFAULT_RECORD: &str = "default.json";

/// Baseline prices and backend settings for one deployment.
///
/// Every value is a string: monetary values stay decimal strings so
/// nothing is lost to float rounding between the file and the cost model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingRecord {
    pub provider: String,
    pub description: String,
    #[serde(rename = "CPU")]
    pub cpu: String,
    #[serde(rename = "spotCPU")]
    pub spot_cpu: String,
    #[serde(rename = "RAM")]
    pub ram: String,
    #[serde(rename = "spotRAM")]
    pub spot_ram: String,
    #[serde(rename = "GPU")]
    pub gpu: String,
    #[serde(rename = "spotGPU")]
    pub spot_gpu: String,
    pub storage: String,
    #[serde(rename = "zoneNetworkEgress")]
    pub zone_network_egress: String,
    #[serde(rename = "regionNetworkEgress")]
    pub region_network_egress: String,
    #[serde(rename = "internetNetworkEgress")]
    pub internet_network_egress: String,
    #[serde(rename = "spotLabel", skip_serializing_if = "String::is_empty")]
    pub spot_label: String,
    #[serde(rename = "spotLabelValue", skip_serializing_if = "String::is_empty")]
    pub spot_label_value: String,
    #[serde(rename = "gpuLabel", skip_serializing_if = "String::is_empty")]
    pub gpu_label: String,
    #[serde(rename = "gpuLabelValue", skip_serializing_if = "String::is_empty")]
    pub gpu_label_value: String,
    #[serde(rename = "awsServiceKeyName", skip_serializing_if = "String::is_empty")]
    pub service_key_name: String,
    #[serde(rename = "awsServiceKeySecret", skip_serializing_if = "String::is_empty")]
    pub service_key_secret: String,
    #[serde(rename = "awsSpotDataRegion", skip_serializing_if = "String::is_empty")]
    pub spot_data_region: String,
    #[serde(rename = "awsSpotDataBucket", skip_serializing_if = "String::is_empty")]
    pub spot_data_bucket: String,
    #[serde(rename = "awsSpotDataPrefix", skip_serializing_if = "String::is_empty")]
    pub spot_data_prefix: String,
    #[serde(rename = "projectID", skip_serializing_if = "String::is_empty")]
    pub project_id: String,
    #[serde(rename = "athenaBucketName")]
    pub athena_bucket_name: String,
    #[serde(rename = "athenaRegion")]
    pub athena_region: String,
    #[serde(rename = "athenaDatabase")]
    pub athena_database: String,
    #[serde(rename = "athenaTable")]
    pub athena_table: String,
    #[serde(rename = "billingDataDataset", skip_serializing_if = "String::is_empty")]
    pub billing_data_dataset: String,
    #[serde(rename = "customPricesEnabled")]
    pub custom_prices_enabled: String,
    #[serde(rename = "azureSubscriptionID")]
    pub azure_subscription_id: String,
    #[serde(rename = "azureClientID")]
    pub azure_client_id: String,
    #[serde(rename = "azureClientSecret")]
    pub azure_client_secret: String,
    #[serde(rename = "azureTenantID")]
    pub azure_tenant_id: String,
    #[serde(rename = "currencyCode")]
    pub currency_code: String,
    pub discount: String,
    #[serde(rename = "clusterName")]
    pub cluster_name: String,
}

impl PricingRecord {
    /// Baseline prices for GCP us-central1, used when no record exists yet.
    pub fn seed(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            description: "Default prices based on GCP us-central1".to_string(),
            cpu: "0.031611".to_string(),
            spot_cpu: "0.006655".to_string(),
            ram: "0.004237".to_string(),
            spot_ram: "0.000892".to_string(),
            gpu: "0.95".to_string(),
            storage: "0.00005479452".to_string(),
            zone_network_egress: "0.01".to_string(),
            region_network_egress: "0.01".to_string(),
            internet_network_egress: "0.12".to_string(),
            custom_prices_enabled: "false".to_string(),
            ..Default::default()
        }
    }
}

/// Reads and writes pricing records under one config directory.
#[derive(Debug, Clone)]
pub struct PricingStore {
    dir: PathBuf,
}

impl PricingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Load the named record, seeding and persisting the defaults if the
    /// file does not exist yet. A malformed file is an error, not a reseed.
    pub fn load_or_seed(&self, name: &str) -> Result<PricingRecord> {
        let path = self.path(name);
        match fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data)
                .map_err(|source| Error::MalformedRecord { path, source }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no pricing record found, writing defaults");
                let record = PricingRecord::seed(name);
                self.save(name, &record)?;
                Ok(record)
            }
            Err(e) => Err(Error::io(path, e)),
        }
    }

    /// Write the record to a temp file in the same directory and rename it
    /// into place, so concurrent readers see either the old or the new
    /// record, never a truncated one.
    pub fn save(&self, name: &str, record: &PricingRecord) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let path = self.path(name);
        let data = serde_json::to_vec(record)?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        tmp.write_all(&data)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| Error::io(tmp.path(), e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))
                .map_err(|e| Error::io(tmp.path(), e))?;
        }
        tmp.persist(&path).map_err(|e| Error::io(path, e.error))?;
        Ok(())
    }
}
