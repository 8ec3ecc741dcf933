use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use parking_lot::RwLock;

use super::Provider;
use crate::error::{Error, Result};
use crate::keys::{Key, LabelConfig, NodeKey, PvKey, VolumeKey, DEFAULT_TIER, GPU_TIER, SPOT_TIER};
use crate::pricing::{patch, PricingRecord, PricingStore, DEFAULT_RECORD};
use crate::types::{Network, Node, NodePrice, ObservedVolume, OutOfClusterAllocation, Pv};

/// Only single-GPU nodes of one custom GPU type are priced.
const GPU_COUNT: &str = "1";

#[derive(Debug, Default)]
struct PricingState {
    pricing: HashMap<String, NodePrice>,
    labels: LabelConfig,
}

/// Reference provider that prices everything from the pricing record in
/// the config directory. Used whenever no cloud-specific backend applies.
pub struct CustomProvider {
    store: PricingStore,
    state: RwLock<PricingState>,
}

impl CustomProvider {
    pub fn new(store: PricingStore) -> Self {
        Self {
            store,
            state: RwLock::new(PricingState::default()),
        }
    }

    fn record(&self) -> Result<PricingRecord> {
        self.store.load_or_seed(DEFAULT_RECORD)
    }
}

fn parse_price(field: &'static str, value: &str) -> Result<f64> {
    value.parse().map_err(|source| Error::InvalidPrice {
        field,
        value: value.to_string(),
        source,
    })
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| Error::InvalidDate(s.to_string()))
}

/// Replace the label config and the three standard tiers from `record`.
/// Other tiers already in the cache are kept.
fn rebuild(state: &mut PricingState, record: PricingRecord) {
    state.labels = LabelConfig {
        spot_label: record.spot_label,
        spot_label_value: record.spot_label_value,
        gpu_label: record.gpu_label,
        gpu_label_value: record.gpu_label_value,
    };
    state.pricing.insert(
        DEFAULT_TIER.to_string(),
        NodePrice {
            cpu: record.cpu.clone(),
            ram: record.ram.clone(),
            gpu: String::new(),
        },
    );
    state.pricing.insert(
        SPOT_TIER.to_string(),
        NodePrice {
            cpu: record.spot_cpu,
            ram: record.spot_ram,
            gpu: String::new(),
        },
    );
    state.pricing.insert(
        GPU_TIER.to_string(),
        NodePrice {
            cpu: record.cpu,
            ram: record.ram,
            gpu: record.gpu,
        },
    );

    tracing::info!(tiers = state.pricing.len(), "custom pricing refreshed");
}

impl Provider for CustomProvider {
    fn name(&self) -> &str {
        "custom"
    }

    fn cluster_info(&self) -> Result<BTreeMap<String, String>> {
        let conf = self.get_config()?;
        let mut m = BTreeMap::new();
        if !conf.cluster_name.is_empty() {
            m.insert("name".to_string(), conf.cluster_name);
        }
        m.insert("provider".to_string(), self.name().to_string());
        Ok(m)
    }

    fn add_service_key(&self, _params: &HashMap<String, String>) -> Result<()> {
        Ok(())
    }

    fn get_disks(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn node_pricing(&self, key: &dyn Key) -> Result<Node> {
        let state = self.state.read();

        let mut tier = key.features();
        if !state.pricing.contains_key(&tier) {
            tier = DEFAULT_TIER.to_string();
        }

        let mut gpu = String::new();
        if !key.gpu_type().is_empty() {
            let gpu_tier = format!("{tier},gpu");
            tier = if state.pricing.contains_key(&gpu_tier) {
                gpu_tier
            } else {
                GPU_TIER.to_string()
            };
            gpu = GPU_COUNT.to_string();
        }

        let price = state
            .pricing
            .get(&tier)
            .ok_or_else(|| Error::PricingNotLoaded(tier.clone()))?;

        Ok(Node {
            vcpu_cost: price.cpu.clone(),
            ram_cost: price.ram.clone(),
            gpu_cost: price.gpu.clone(),
            gpu,
            ..Default::default()
        })
    }

    fn pv_pricing(&self, _key: &dyn PvKey) -> Result<Pv> {
        let record = self.record()?;
        Ok(Pv {
            cost: record.storage,
            ..Default::default()
        })
    }

    fn network_pricing(&self) -> Result<Network> {
        let record = self.record()?;
        Ok(Network {
            zone_network_egress_cost: parse_price(
                "zoneNetworkEgress",
                &record.zone_network_egress,
            )?,
            region_network_egress_cost: parse_price(
                "regionNetworkEgress",
                &record.region_network_egress,
            )?,
            internet_network_egress_cost: parse_price(
                "internetNetworkEgress",
                &record.internet_network_egress,
            )?,
        })
    }

    fn all_node_pricing(&self) -> Result<HashMap<String, NodePrice>> {
        Ok(self.state.read().pricing.clone())
    }

    fn download_pricing_data(&self) -> Result<()> {
        // The record is read under the write lock so lookups never see
        // tiers from two different records.
        let mut state = self.state.write();
        let record = self.record()?;
        rebuild(&mut state, record);
        Ok(())
    }

    fn get_key(&self, labels: &HashMap<String, String>) -> Box<dyn Key> {
        let config = self.state.read().labels.clone();
        Box::new(NodeKey::new(config, labels.clone()))
    }

    fn get_pv_key(
        &self,
        volume: &ObservedVolume,
        _parameters: &HashMap<String, String>,
    ) -> Box<dyn PvKey> {
        Box::new(VolumeKey::new(
            volume.labels.clone(),
            volume.storage_class.clone(),
        ))
    }

    fn update_config(&self, payload: &str) -> Result<PricingRecord> {
        let changes = patch::parse(payload)?;

        // Held from load to rebuild so concurrent patches apply in turn.
        let mut state = self.state.write();
        let current = self.record()?;
        let updated = patch::apply(&current, &changes)?;
        self.store.save(DEFAULT_RECORD, &updated)?;
        rebuild(&mut state, updated.clone());
        Ok(updated)
    }

    fn get_config(&self) -> Result<PricingRecord> {
        self.record()
    }

    fn get_management_platform(&self) -> Result<String> {
        Ok(String::new())
    }

    fn get_local_storage_query(&self) -> Result<String> {
        Ok(String::new())
    }

    fn external_allocations(
        &self,
        start: &str,
        end: &str,
        aggregator: &str,
    ) -> Result<Vec<OutOfClusterAllocation>> {
        parse_date(start)?;
        parse_date(end)?;
        tracing::debug!(aggregator, "custom provider has no out-of-cluster spend");
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn provider(dir: &std::path::Path) -> CustomProvider {
        CustomProvider::new(PricingStore::new(dir))
    }

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn spot_gpu_record() -> PricingRecord {
        let mut record = PricingRecord::seed(DEFAULT_RECORD);
        record.spot_label = "lifecycle".into();
        record.spot_label_value = "spot".into();
        record.gpu_label = "accelerator".into();
        record
    }

    #[test]
    fn lookup_before_download_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(dir.path());
        let key = NodeKey::new(LabelConfig::default(), HashMap::new());
        assert!(matches!(
            p.node_pricing(&key),
            Err(Error::PricingNotLoaded(t)) if t == DEFAULT_TIER
        ));
    }

    #[test]
    fn download_seeds_three_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(dir.path());
        p.download_pricing_data().unwrap();

        let all = p.all_node_pricing().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[DEFAULT_TIER].cpu, "0.031611");
        assert_eq!(all[SPOT_TIER].ram, "0.000892");
        assert_eq!(all[GPU_TIER].gpu, "0.95");
        assert_eq!(all[DEFAULT_TIER].gpu, "");
    }

    #[test]
    fn unknown_features_fall_back_to_default() {
        struct Odd;
        impl Key for Odd {
            fn id(&self) -> &str {
                "m5.24xlarge"
            }
            fn features(&self) -> String {
                "us-east-1,m5.24xlarge,linux".into()
            }
            fn gpu_type(&self) -> &str {
                ""
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let p = provider(dir.path());
        p.download_pricing_data().unwrap();
        let node = p.node_pricing(&Odd).unwrap();
        assert_eq!(node.vcpu_cost, "0.031611");
        assert_eq!(node.ram_cost, "0.004237");
        assert_eq!(node.gpu, "");
    }

    #[test]
    fn spot_node_resolves_spot_tier() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(dir.path());
        PricingStore::new(dir.path())
            .save(DEFAULT_RECORD, &spot_gpu_record())
            .unwrap();
        p.download_pricing_data().unwrap();

        let key = p.get_key(&labels(&[("lifecycle", "spot")]));
        let node = p.node_pricing(key.as_ref()).unwrap();
        assert_eq!(node.vcpu_cost, "0.006655");

        let key = p.get_key(&labels(&[("lifecycle", "on-demand")]));
        assert_eq!(p.node_pricing(key.as_ref()).unwrap().vcpu_cost, "0.031611");
    }

    #[test]
    fn gpu_node_gets_one_gpu_whatever_the_type() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(dir.path());
        PricingStore::new(dir.path())
            .save(DEFAULT_RECORD, &spot_gpu_record())
            .unwrap();
        p.download_pricing_data().unwrap();

        for gpu in ["nvidia-tesla-k80", "a100"] {
            let key = p.get_key(&labels(&[("accelerator", gpu)]));
            let node = p.node_pricing(key.as_ref()).unwrap();
            assert_eq!(node.gpu, "1");
            assert_eq!(node.gpu_cost, "0.95");
        }
    }

    #[test]
    fn spot_gpu_node_without_spot_gpu_tier_uses_gpu_tier() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(dir.path());
        PricingStore::new(dir.path())
            .save(DEFAULT_RECORD, &spot_gpu_record())
            .unwrap();
        p.download_pricing_data().unwrap();

        let key = p.get_key(&labels(&[("lifecycle", "spot"), ("accelerator", "t4")]));
        let node = p.node_pricing(key.as_ref()).unwrap();
        assert_eq!(node.gpu_cost, "0.95");
        assert_eq!(node.vcpu_cost, "0.031611");
    }

    #[test]
    fn unknown_patch_field_leaves_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(dir.path());
        p.download_pricing_data().unwrap();
        let path = PricingStore::new(dir.path()).path(DEFAULT_RECORD);
        let before = std::fs::read(&path).unwrap();

        let err = p
            .update_config(r#"{"CPU": "1.0", "notAField": "x"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("NotAField"));
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(
            p.all_node_pricing().unwrap()[DEFAULT_TIER].cpu,
            "0.031611"
        );
    }

    #[test]
    fn patch_persists_and_refreshes_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(dir.path());
        p.download_pricing_data().unwrap();

        let updated = p
            .update_config(r#"{"CPU": "0.05", "spotLabel": "pool", "spotLabelValue": "pre"}"#)
            .unwrap();
        assert_eq!(updated.cpu, "0.05");
        assert_eq!(p.get_config().unwrap(), updated);

        let key = p.get_key(&labels(&[("pool", "pre")]));
        assert_eq!(key.features(), SPOT_TIER);
        assert_eq!(p.all_node_pricing().unwrap()[DEFAULT_TIER].cpu, "0.05");
    }

    #[test]
    fn refresh_keeps_unrelated_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(dir.path());
        p.state
            .write()
            .pricing
            .insert("default,preemptible".into(), NodePrice::default());
        p.download_pricing_data().unwrap();
        p.download_pricing_data().unwrap();
        assert_eq!(p.all_node_pricing().unwrap().len(), 4);
    }

    #[test]
    fn cluster_info_reports_name_when_set() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(dir.path());
        let info = p.cluster_info().unwrap();
        assert_eq!(info.get("provider").map(String::as_str), Some("custom"));
        assert!(!info.contains_key("name"));

        p.update_config(r#"{"clusterName": "prod"}"#).unwrap();
        assert_eq!(p.cluster_info().unwrap()["name"], "prod");
    }

    #[test]
    fn network_and_volume_prices_come_from_record() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(dir.path());
        let net = p.network_pricing().unwrap();
        assert_eq!(net.zone_network_egress_cost, 0.01);
        assert_eq!(net.internet_network_egress_cost, 0.12);

        let volume = ObservedVolume {
            storage_class: "standard".into(),
            ..Default::default()
        };
        let key = p.get_pv_key(&volume, &HashMap::new());
        assert_eq!(p.pv_pricing(key.as_ref()).unwrap().cost, "0.00005479452");

        p.update_config(r#"{"zoneNetworkEgress": "free"}"#).unwrap();
        assert!(matches!(
            p.network_pricing(),
            Err(Error::InvalidPrice { field: "zoneNetworkEgress", .. })
        ));
    }

    #[test]
    fn external_allocations_validate_dates() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(dir.path());
        assert!(p
            .external_allocations("2024-01-01", "2024-01-31", "namespace")
            .unwrap()
            .is_empty());
        assert!(matches!(
            p.external_allocations("01/01/2024", "2024-01-31", "namespace"),
            Err(Error::InvalidDate(_))
        ));
    }

    #[test]
    fn concurrent_refresh_never_mixes_records() {
        let dir = tempfile::tempdir().unwrap();
        let p = Arc::new(provider(dir.path()));
        p.download_pricing_data().unwrap();

        let writer = {
            let p = Arc::clone(&p);
            let store = PricingStore::new(dir.path());
            thread::spawn(move || {
                for i in 0..50 {
                    let mut record = PricingRecord::seed(DEFAULT_RECORD);
                    let v = format!("{i}.0");
                    record.cpu = v.clone();
                    record.spot_cpu = v.clone();
                    record.ram = v;
                    store.save(DEFAULT_RECORD, &record).unwrap();
                    p.download_pricing_data().unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let p = Arc::clone(&p);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let all = p.all_node_pricing().unwrap();
                        assert_eq!(all[DEFAULT_TIER].cpu, all[GPU_TIER].cpu);
                        assert_eq!(all[DEFAULT_TIER].ram, all[GPU_TIER].ram);
                        if all[DEFAULT_TIER].cpu != "0.031611" {
                            assert_eq!(all[DEFAULT_TIER].cpu, all[SPOT_TIER].cpu);
                        }
                        let key = NodeKey::new(LabelConfig::default(), HashMap::new());
                        p.node_pricing(&key).unwrap();
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }

    #[test]
    fn concurrent_patches_of_different_fields_both_land() {
        const ROUNDS: usize = 200;
        let dir = tempfile::tempdir().unwrap();
        let p = Arc::new(provider(dir.path()));
        p.download_pricing_data().unwrap();

        let patcher = |field: &'static str| {
            let p = Arc::clone(&p);
            thread::spawn(move || {
                for i in 0..ROUNDS {
                    p.update_config(&format!(r#"{{"{field}": "{i}"}}"#)).unwrap();
                }
            })
        };
        let cpu = patcher("spotCPU");
        let ram = patcher("spotRAM");
        cpu.join().unwrap();
        ram.join().unwrap();

        let last = (ROUNDS - 1).to_string();
        let record = p.get_config().unwrap();
        assert_eq!(record.spot_cpu, last);
        assert_eq!(record.spot_ram, last);
        let spot = &p.all_node_pricing().unwrap()[SPOT_TIER];
        assert_eq!(spot.cpu, last);
        assert_eq!(spot.ram, last);
    }

    #[test]
    fn refresh_while_patching_always_reads_a_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let p = Arc::new(provider(dir.path()));
        p.download_pricing_data().unwrap();

        let patcher = {
            let p = Arc::clone(&p);
            thread::spawn(move || {
                for i in 0..500 {
                    p.update_config(&format!(r#"{{"discount": "{i}"}}"#)).unwrap();
                }
            })
        };

        // Bypasses the provider lock so reads race the file writes directly.
        let store = PricingStore::new(dir.path());
        while !patcher.is_finished() {
            p.download_pricing_data().unwrap();
            store.load_or_seed(DEFAULT_RECORD).unwrap();
        }
        patcher.join().unwrap();
        assert_eq!(p.get_config().unwrap().discount, "499");
    }
}
