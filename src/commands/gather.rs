//! Gather command implementation
//!
//! Builds one [`HttpInput`] per configured input and prints collected metrics
//! to stdout, one line per metric.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

use http_input::{
    config::{self, Config},
    fetcher::HttpInput,
    metric::MemoryAccumulator,
};

/// Run a single collection pass
///
/// Fails if any URL could not be gathered.
pub async fn once(config_path: &Path) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    let inputs = build_inputs(&cfg)?;

    let failures = collect(&inputs).await;
    if failures > 0 {
        anyhow::bail!("{} URL(s) failed to gather", failures);
    }

    Ok(())
}

/// Collect every interval until Ctrl-C
pub async fn run(config_path: &Path, interval_override: Option<u64>) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    let inputs = build_inputs(&cfg)?;

    let interval_secs = interval_override.unwrap_or(cfg.agent.interval_seconds);
    if interval_secs == 0 {
        anyhow::bail!("Interval must be greater than zero");
    }

    info!(
        inputs = inputs.len(),
        interval_secs, "Starting collection loop"
    );
    let mut ticker = interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let failures = collect(&inputs).await;
                if failures > 0 {
                    warn!(failures, "Collection pass finished with errors");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, stopping collection");
                break;
            }
        }
    }

    Ok(())
}

fn build_inputs(cfg: &Config) -> Result<Vec<HttpInput>> {
    cfg.inputs
        .iter()
        .enumerate()
        .map(|(idx, input)| {
            HttpInput::new(input.clone()).with_context(|| format!("Input #{}", idx + 1))
        })
        .collect()
}

/// Gather all inputs and print their metrics; returns the number of failed URLs
async fn collect(inputs: &[HttpInput]) -> usize {
    let acc = MemoryAccumulator::new();

    let mut failures = 0;
    for input in inputs {
        failures += input.gather(&acc).await;
    }

    for metric in acc.take_metrics() {
        println!("{}", metric);
    }
    for error in acc.take_errors() {
        eprintln!("error: {}", error);
    }

    failures
}
