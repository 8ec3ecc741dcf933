use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};
use serde::Serialize;

use cloudcost::types::{Node, NodePrice};

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header.iter().map(|h| Cell::new(*h)));
    table
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One row per cached tier, sorted by tier name.
pub fn print_tiers(pricing: &HashMap<String, NodePrice>) {
    let sorted: BTreeMap<_, _> = pricing.iter().collect();
    let mut table = new_table(&["Tier", "CPU/hr", "RAM GB/hr", "GPU/hr"]);
    for (tier, price) in sorted {
        table.add_row(vec![
            Cell::new(tier),
            Cell::new(or_dash(&price.cpu)),
            Cell::new(or_dash(&price.ram)),
            Cell::new(or_dash(&price.gpu)),
        ]);
    }
    println!("{table}");
}

pub fn print_node_prices(rows: &[(String, Node)]) {
    let mut table = new_table(&["Node", "CPU/hr", "RAM GB/hr", "GPUs", "GPU/hr"]);
    for (name, node) in rows {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(or_dash(&node.vcpu_cost)),
            Cell::new(or_dash(&node.ram_cost)),
            Cell::new(or_dash(&node.gpu)),
            Cell::new(or_dash(&node.gpu_cost)),
        ]);
    }
    println!("{table}");
}

pub fn print_map(map: &BTreeMap<String, String>) {
    let mut table = new_table(&["Key", "Value"]);
    for (k, v) in map {
        table.add_row(vec![Cell::new(k), Cell::new(or_dash(v))]);
    }
    println!("{table}");
}
