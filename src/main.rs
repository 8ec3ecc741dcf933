mod cli;
mod output;
mod watch;

use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Context, Result};
use clap::Parser;
use rayon::prelude::*;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use cli::{Cli, ClusterAction, Command, ConfigAction, OutputFormat};
use cloudcost::config::Settings;
use cloudcost::pricing::PricingStore;
use cloudcost::providers::select::{GceMetadataProbe, NodeListFile, NodeLister};
use cloudcost::providers::{select_provider, CustomProvider, Provider, ProviderKind};
use cloudcost::storage::{ClusterStore, SqliteClusterStore};
use cloudcost::types::ObservedVolume;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn select(cli: &Cli, settings: &Settings) -> Result<ProviderKind> {
    let Some(path) = &cli.nodes else {
        bail!("--nodes <file> is required to select a provider");
    };
    let nodes = NodeListFile::new(path);
    let probe = GceMetadataProbe::new(settings.gce_metadata_host.clone());
    let kind = select_provider(&nodes, &probe, settings.api_key.as_deref())?;
    Ok(kind)
}

fn open_provider(cli: &Cli, settings: &Settings, store: &PricingStore) -> Result<Box<dyn Provider>> {
    if cli.nodes.is_none() {
        return Ok(Box::new(CustomProvider::new(store.clone())));
    }
    let kind = select(cli, settings)?;
    tracing::info!(provider = %kind, "selected pricing provider");
    kind.into_provider(store.clone())
        .context("selected backend cannot price locally")
}

fn labels_map(labels: &[(String, String)]) -> HashMap<String, String> {
    labels.iter().cloned().collect()
}

fn cluster(action: &ClusterAction, settings: &Settings, format: &OutputFormat) -> Result<()> {
    let store = SqliteClusterStore::new(&settings.metadata_db);
    let resolve_id = |id: &Option<String>| -> Result<String> {
        id.clone()
            .or_else(|| settings.cluster_id.clone())
            .context("no cluster id: pass --id or set CLUSTER_ID")
    };

    let meta = match action {
        ClusterAction::Get { id } => {
            let id = resolve_id(id)?;
            match store.lookup(&id)? {
                Some(meta) => meta,
                None => bail!("cluster {id} is not registered"),
            }
        }
        ClusterAction::GetOrCreate { id, name } => store.get_or_create(&resolve_id(id)?, name)?,
        ClusterAction::Update { id, name } => {
            let id = resolve_id(id)?;
            if !store.update(&id, name)? {
                bail!("cluster {id} is not registered");
            }
            store
                .lookup(&id)?
                .with_context(|| format!("cluster {id} vanished after rename"))?
        }
    };

    match format {
        OutputFormat::Json => output::print_json(&meta)?,
        OutputFormat::Table => {
            let mut m = BTreeMap::new();
            m.insert("cluster_id".to_string(), meta.cluster_id);
            m.insert("cluster_name".to_string(), meta.cluster_name.unwrap_or_default());
            output::print_map(&m);
        }
    }
    Ok(())
}

fn config(action: &ConfigAction, provider: &dyn Provider) -> Result<()> {
    let record = match action {
        ConfigAction::Show => provider.get_config()?,
        ConfigAction::Set { fields } => {
            let patch: Map<String, Value> = fields
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            provider.update_config(&serde_json::to_string(&patch)?)?
        }
        ConfigAction::Patch { json } => provider.update_config(json)?,
    };
    output::print_json(&record)
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut settings = Settings::load();
    if let Some(dir) = &cli.config_dir {
        settings.config_dir = dir.clone();
    }
    let store = PricingStore::new(&settings.config_dir);

    match &cli.command {
        Command::Select => {
            let kind = select(&cli, &settings)?;
            match cli.format {
                OutputFormat::Json => output::print_json(&serde_json::json!({ "provider": kind.name() }))?,
                OutputFormat::Table => println!("{kind}"),
            }
            return Ok(());
        }
        Command::Cluster { action } => return cluster(action, &settings, &cli.format),
        _ => {}
    }

    let provider = open_provider(&cli, &settings, &store)?;

    match &cli.command {
        Command::Pricing => {
            provider.download_pricing_data()?;
            let pricing = provider.all_node_pricing()?;
            match cli.format {
                OutputFormat::Json => output::print_json(&pricing)?,
                OutputFormat::Table => output::print_tiers(&pricing),
            }
        }
        Command::Node { labels } => {
            provider.download_pricing_data()?;
            let key = provider.get_key(&labels_map(labels));
            output::print_json(&provider.node_pricing(key.as_ref())?)?;
        }
        Command::PriceNodes => {
            let path = cli.nodes.as_ref().context("price-nodes needs --nodes <file>")?;
            let nodes = NodeListFile::new(path).list_nodes()?;
            provider.download_pricing_data()?;

            let provider = provider.as_ref();
            let rows = nodes
                .par_iter()
                .map(|n| {
                    let key = provider.get_key(&n.labels);
                    provider
                        .node_pricing(key.as_ref())
                        .map(|price| (n.name.clone(), price))
                })
                .collect::<cloudcost::Result<Vec<_>>>()?;

            match cli.format {
                OutputFormat::Json => {
                    let by_node: BTreeMap<_, _> = rows.into_iter().collect();
                    output::print_json(&by_node)?;
                }
                OutputFormat::Table => output::print_node_prices(&rows),
            }
        }
        Command::Pv {
            storage_class,
            labels,
        } => {
            let volume = ObservedVolume {
                storage_class: storage_class.clone(),
                labels: labels_map(labels),
                ..Default::default()
            };
            let key = provider.get_pv_key(&volume, &HashMap::new());
            output::print_json(&provider.pv_pricing(key.as_ref())?)?;
        }
        Command::Network => output::print_json(&provider.network_pricing()?)?,
        Command::Config { action } => config(action, provider.as_ref())?,
        Command::Watch { interval } => watch::run(provider.as_ref(), &store, *interval)?,
        Command::Select | Command::Cluster { .. } => unreachable!(),
    }

    Ok(())
}
