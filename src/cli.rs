use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "cloudcost",
    about = "Hourly prices for Kubernetes nodes, volumes and network egress"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format: table (default), json
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Node list (`kubectl get nodes -o json`) used to pick the provider.
    /// Without it the custom provider is used.
    #[arg(long, global = true)]
    pub nodes: Option<PathBuf>,

    /// Directory holding default.json (overrides CONFIG_PATH)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show which pricing backend applies to the cluster
    Select,
    /// Show every cached pricing tier
    Pricing,
    /// Price a single node from its labels
    Node {
        /// Node label as key=value, repeatable
        #[arg(long = "label", value_parser = parse_key_value)]
        labels: Vec<(String, String)>,
    },
    /// Price every node in the --nodes list
    PriceNodes,
    /// Price a persistent volume
    Pv {
        #[arg(long)]
        storage_class: String,
        /// Volume label as key=value, repeatable
        #[arg(long = "label", value_parser = parse_key_value)]
        labels: Vec<(String, String)>,
    },
    /// Show network egress prices
    Network,
    /// Show or change the pricing record
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Cluster id to name registry
    Cluster {
        #[command(subcommand)]
        action: ClusterAction,
    },
    /// Refresh and print pricing whenever the pricing record changes
    Watch {
        /// Debounce interval in seconds
        #[arg(long, default_value_t = 1)]
        interval: u64,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the current pricing record
    Show,
    /// Set fields, e.g. `config set CPU=0.04 spotLabel=lifecycle`
    Set {
        #[arg(required = true, value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },
    /// Apply a raw JSON patch object
    Patch { json: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ClusterAction {
    /// Look up the registered name
    Get {
        /// Cluster id (defaults to CLUSTER_ID)
        #[arg(long)]
        id: Option<String>,
    },
    /// Register the cluster unless it already is
    GetOrCreate {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        name: String,
    },
    /// Change the registered name
    Update {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        name: String,
    },
}

#[derive(ValueEnum, Debug, Clone, PartialEq)]
pub enum OutputFormat {
    Table,
    Json,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    if k.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((k.to_string(), v.to_string()))
}
