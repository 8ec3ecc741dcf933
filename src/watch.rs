use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::{EventKind, RecursiveMode, Watcher};

use cloudcost::pricing::{PricingStore, DEFAULT_RECORD};
use cloudcost::providers::Provider;

pub fn run(provider: &dyn Provider, store: &PricingStore, interval: u64) -> Result<()> {
    let interval = Duration::from_secs(interval);

    provider.download_pricing_data()?;
    render(provider)?;

    let record = store.path(DEFAULT_RECORD);
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res {
            let touches_record = event.paths.iter().any(|p| p.ends_with(DEFAULT_RECORD));
            match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) if touches_record => {
                    let _ = tx.send(());
                }
                _ => {}
            }
        }
    })?;

    // Watch the directory: editors often replace the file instead of writing in place.
    watcher
        .watch(store.dir(), RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", store.dir().display()))?;
    tracing::info!(path = %record.display(), "watching pricing record");

    while let Ok(()) = rx.recv() {
        let deadline = Instant::now() + interval;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match rx.recv_timeout(remaining) {
                Ok(()) => continue,
                Err(mpsc::RecvTimeoutError::Timeout) => break,
                Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }

        // A half-written or invalid record keeps the last good prices.
        match provider.download_pricing_data() {
            Ok(()) => render(provider)?,
            Err(e) => tracing::warn!(error = %e, "refresh failed, keeping previous prices"),
        }
    }

    Ok(())
}

fn render(provider: &dyn Provider) -> Result<()> {
    let pricing = provider.all_node_pricing()?;
    crate::output::print_tiers(&pricing);
    Ok(())
}
