//! Partial updates to a [`PricingRecord`].
//!
//! A patch is a JSON object of field name to value. Names are matched
//! against the record's canonical field names after upper-casing the
//! first letter, so `spotCPU` and `SpotCPU` both address the same field
//! while `cpu` does not match `CPU`.

use serde_json::{Map, Value};

use super::PricingRecord;
use crate::error::{Error, Result};

type Slot = fn(&mut PricingRecord) -> &mut String;

struct Field {
    name: &'static str,
    writable: bool,
    slot: Slot,
}

macro_rules! fields {
    (@writable) => { true };
    (@writable ro) => { false };
    ($($name:literal => $field:ident $([$access:ident])?),* $(,)?) => {
        &[$(Field {
            name: $name,
            writable: fields!(@writable $($access)?),
            slot: {
                fn slot(r: &mut PricingRecord) -> &mut String {
                    &mut r.$field
                }
                slot
            },
        }),*]
    };
}

const FIELDS: &[Field] = fields! {
    "Provider" => provider,
    "Description" => description,
    "CPU" => cpu,
    "SpotCPU" => spot_cpu,
    "RAM" => ram,
    "SpotRAM" => spot_ram,
    "GPU" => gpu,
    "SpotGPU" => spot_gpu,
    "Storage" => storage,
    "ZoneNetworkEgress" => zone_network_egress,
    "RegionNetworkEgress" => region_network_egress,
    "InternetNetworkEgress" => internet_network_egress,
    "SpotLabel" => spot_label,
    "SpotLabelValue" => spot_label_value,
    "GpuLabel" => gpu_label,
    "GpuLabelValue" => gpu_label_value,
    "ServiceKeyName" => service_key_name,
    "ServiceKeySecret" => service_key_secret,
    "SpotDataRegion" => spot_data_region,
    "SpotDataBucket" => spot_data_bucket,
    "SpotDataPrefix" => spot_data_prefix,
    "ProjectID" => project_id,
    "AthenaBucketName" => athena_bucket_name,
    "AthenaRegion" => athena_region,
    "AthenaDatabase" => athena_database,
    "AthenaTable" => athena_table,
    "BillingDataDataset" => billing_data_dataset,
    "CustomPricesEnabled" => custom_prices_enabled,
    "AzureSubscriptionID" => azure_subscription_id,
    "AzureClientID" => azure_client_id,
    "AzureClientSecret" => azure_client_secret,
    "AzureTenantID" => azure_tenant_id,
    "CurrencyCode" => currency_code,
    "Discount" => discount,
    "ClusterName" => cluster_name,
};

fn canonical_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Decode a patch payload. Anything but a JSON object is rejected.
pub fn parse(payload: &str) -> Result<Map<String, Value>> {
    serde_json::from_str(payload).map_err(Error::InvalidPatch)
}

/// Set a single field by name.
pub fn set_field(record: &mut PricingRecord, name: &str, value: &Value) -> Result<()> {
    set_field_in(FIELDS, record, name, value)
}

fn set_field_in(
    table: &[Field],
    record: &mut PricingRecord,
    name: &str,
    value: &Value,
) -> Result<()> {
    let key = canonical_name(name);
    let field = table
        .iter()
        .find(|f| f.name == key)
        .ok_or_else(|| Error::NoSuchField(key.clone()))?;

    if !field.writable {
        return Err(Error::CannotSet(key));
    }

    let Value::String(s) = value else {
        return Err(Error::TypeMismatch(key));
    };

    *(field.slot)(record) = s.clone();
    Ok(())
}

/// Apply every entry of `patch` to a copy of `record`.
///
/// All-or-nothing: the first failing entry aborts and the caller's record
/// is left as it was.
pub fn apply(record: &PricingRecord, patch: &Map<String, Value>) -> Result<PricingRecord> {
    let mut updated = record.clone();
    for (name, value) in patch {
        set_field(&mut updated, name, value)?;
    }
    Ok(updated)
}
