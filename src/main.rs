use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use mini_metric::prelude::*;
use mini_metric::{server, util};
use prometheus::Registry;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "mini-metric", version, about = "Expose shell commands and files as Prometheus metrics")]
struct Args {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0:7002")]
    listen_addr: SocketAddr,

    /// Rule file
    #[arg(long, default_value = "mini-metric.toml")]
    config_file: PathBuf,

    /// Logging level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Seconds a command may run before it is terminated
    #[arg(long, default_value = "30")]
    command_timeout: u64,

    /// Do not export the battery gauges
    #[arg(long)]
    no_battery: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    util::logging::init(&args.log_level);
    info!("mini-metric {}", mini_metric::VERSION);

    let rules = load_rules(&args.config_file).inspect_err(|e| {
        error!("Cannot decode config file {}: {}", args.config_file.display(), e);
    })?;

    let registry = Registry::new();
    let exec = ExecConfig::with_timeout(Duration::from_secs(args.command_timeout));
    let scraper = Scraper::load(rules, &exec, registry.clone());

    register_battery(&registry, args.no_battery);

    server::serve(args.listen_addr, Arc::new(scraper))
        .await
        .context("Error while listening")
}

#[cfg(feature = "battery")]
fn register_battery(registry: &Registry, disabled: bool) {
    if disabled {
        return;
    }
    if let Err(e) = mini_metric::battery::BatteryCollector::register(registry) {
        error!("Cannot register battery metrics: {}", e);
    }
}

#[cfg(not(feature = "battery"))]
fn register_battery(_registry: &Registry, _disabled: bool) {}
