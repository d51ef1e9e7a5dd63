//! shaper - Hardware shaper management tool
//!
//! Configures queue, netdev and detached shapers of simulated devices
//! through the net-shaper transport.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use nshaper::netlink::genl::shaper::{ShaperConnection, ShaperServer};
use nshaper::output::{OutputFormat, OutputOptions};
use nshaper::shaper::{DeviceTable, SimConfig};

mod commands;

use commands::{Command, Context};

#[derive(Parser)]
#[command(name = "shaper")]
#[command(about = "Hardware shaper management tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Output JSON
    #[arg(short = 'j', long, global = true)]
    json: bool,

    /// Pretty print JSON
    #[arg(short = 'p', long, global = true)]
    pretty: bool,

    /// Show zero-valued fields
    #[arg(short = 'd', long, global = true)]
    details: bool,

    /// Print raw rates and sizes
    #[arg(short = 'n', long, global = true)]
    numeric: bool,

    /// Simulated device configuration (JSON)
    #[arg(short = 'c', long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of transmit queues of the simulated device
    #[arg(short = 'q', long, global = true)]
    queues: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

fn load_config(path: Option<&Path>, queues: Option<u32>) -> anyhow::Result<SimConfig> {
    let mut config = match path {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<SimConfig>(&data)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        }
        None => SimConfig::new(),
    };
    if let Some(n) = queues {
        config.queues = n;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let opts = OutputOptions {
        details: cli.details,
        numeric: cli.numeric,
        pretty: cli.pretty,
    };

    let config = load_config(cli.config.as_deref(), cli.queues)?;
    let ifindex = config.ifindex;

    let table = Arc::new(DeviceTable::new());
    let (dev, _) = table.register_sim(config)?;
    tracing::debug!(dev = dev.name(), ifindex, "simulated device ready");

    let ctx = Context {
        conn: ShaperConnection::new(ShaperServer::new(table)),
        ifindex,
        format,
        opts,
    };

    cli.command.run(&ctx).await
}
