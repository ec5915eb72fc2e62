//! Headless runner for the analog input monitor.
//!
//! Activates the plugin from configuration and logs every display update.
//!
//! ```bash
//! daq-monitor --synthetic --ticks 5
//! daq-monitor --config monitor.toml
//! RUST_LOG=daq_monitor=debug daq-monitor
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use daq_monitor::{LogSink, MonitorConfig, MonitorPlugin};

#[derive(Parser, Debug)]
#[command(name = "daq-monitor", version, about = "Periodic analog input monitor")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Force synthetic (random) readings
    #[arg(long)]
    synthetic: bool,

    /// Stop after this many ticks instead of running until Ctrl-C
    #[arg(long)]
    ticks: Option<u64>,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        MonitorConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.synthetic {
        config.device.synthetic = true;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    if cli.dump_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    // No vendor binding ships with this binary; hardware mode reports a
    // configuration error during activation.
    let plugin = MonitorPlugin::activate(&config, None)
        .await
        .context("Monitor plugin activation failed")?;

    plugin.start(Arc::new(LogSink), cli.ticks).await?;
    info!(device = plugin.device_name(), "Monitoring; press Ctrl-C to stop");

    tokio::select! {
        ticks = plugin.join() => {
            info!(ticks = ticks.unwrap_or(0), "Tick limit reached");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Interrupted");
        }
    }

    plugin.close().await?;
    Ok(())
}
