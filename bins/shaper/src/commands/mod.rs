//! Subcommand implementations.

pub mod batch;
pub mod caps;
pub mod delete;
pub mod group;
pub mod set;
pub mod show;

use anyhow::{Context as _, bail};
use clap::{Args, Subcommand};
use nshaper::netlink::genl::shaper::ShaperConnection;
use nshaper::output::{OutputFormat, OutputOptions};
use nshaper::shaper::{Handle, Metric, ShaperPatch};
use nshaper::util::{get_pkt_rate, get_rate, get_size, get_u32};

/// State shared by every subcommand.
pub struct Context {
    pub conn: ShaperConnection,
    pub ifindex: u32,
    pub format: OutputFormat,
    pub opts: OutputOptions,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show shapers
    #[command(visible_alias = "list", visible_alias = "ls")]
    Show(show::ShowCmd),

    /// Create or update a shaper
    Set(set::SetCmd),

    /// Delete a shaper
    #[command(visible_alias = "del")]
    Delete(delete::DeleteCmd),

    /// Nest shapers under an output shaper
    Group(group::GroupCmd),

    /// Show per-scope capabilities
    #[command(visible_alias = "capabilities")]
    Caps(caps::CapsCmd),

    /// Run commands from a file, one per line
    Batch(batch::BatchCmd),
}

impl Command {
    pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
        match self {
            Command::Batch(cmd) => cmd.run(ctx).await,
            other => other.run_single(ctx).await,
        }
    }

    /// Run any command except `batch`.
    pub async fn run_single(self, ctx: &Context) -> anyhow::Result<()> {
        match self {
            Command::Show(cmd) => cmd.run(ctx).await,
            Command::Set(cmd) => cmd.run(ctx).await,
            Command::Delete(cmd) => cmd.run(ctx).await,
            Command::Group(cmd) => cmd.run(ctx).await,
            Command::Caps(cmd) => cmd.run(ctx).await,
            Command::Batch(_) => bail!("batch files can't be nested"),
        }
    }
}

/// Parse a `scope[:id]` handle argument.
pub fn parse_handle(s: &str) -> anyhow::Result<Handle> {
    s.parse()
        .with_context(|| format!("invalid handle '{}'", s))
}

/// Shaper parameters, as given on the command line.
#[derive(Args, Debug, Default)]
pub struct ShaperParams {
    /// Rate unit: bps or pps
    #[arg(long)]
    pub metric: Option<String>,

    /// Minimum guaranteed rate
    #[arg(long, value_name = "RATE")]
    pub bw_min: Option<String>,

    /// Maximum rate
    #[arg(long, value_name = "RATE")]
    pub bw_max: Option<String>,

    /// Burst size
    #[arg(long, value_name = "SIZE")]
    pub burst: Option<String>,

    /// Strict priority
    #[arg(long)]
    pub priority: Option<String>,

    /// Round robin weight
    #[arg(long)]
    pub weight: Option<String>,
}

impl ShaperParams {
    /// Collect `key value` pairs, iproute2 style.
    pub fn from_keywords(words: &[String]) -> anyhow::Result<Self> {
        let mut params = Self::default();
        let mut iter = words.iter();

        while let Some(key) = iter.next() {
            let Some(value) = iter.next() else {
                bail!("missing value for '{}'", key);
            };
            let slot = match key.as_str() {
                "metric" => &mut params.metric,
                "bw-min" | "min" => &mut params.bw_min,
                "bw-max" | "max" | "rate" => &mut params.bw_max,
                "burst" => &mut params.burst,
                "priority" | "prio" => &mut params.priority,
                "weight" => &mut params.weight,
                other => bail!("unknown parameter '{}'", other),
            };
            if slot.replace(value.clone()).is_some() {
                bail!("'{}' given twice", key);
            }
        }

        Ok(params)
    }

    /// Build a patch for `handle`.
    ///
    /// Rates are parsed as packet rates when the metric is `pps`.
    pub fn to_patch(&self, handle: Handle) -> anyhow::Result<ShaperPatch> {
        let mut patch = ShaperPatch::new(handle);

        let metric = match &self.metric {
            Some(m) => Some(m.parse::<Metric>()?),
            None => None,
        };
        if let Some(m) = metric {
            patch = patch.metric(m);
        }

        let rate = |s: &str| -> anyhow::Result<u64> {
            let v = if metric == Some(Metric::Pps) {
                get_pkt_rate(s)
            } else {
                get_rate(s)
            };
            v.with_context(|| format!("invalid rate '{}'", s))
        };

        if let Some(s) = &self.bw_min {
            patch = patch.bw_min(rate(s)?);
        }
        if let Some(s) = &self.bw_max {
            patch = patch.bw_max(rate(s)?);
        }
        if let Some(s) = &self.burst {
            patch = patch.burst(get_size(s).with_context(|| format!("invalid burst '{}'", s))?);
        }
        if let Some(s) = &self.priority {
            patch = patch.priority(get_u32(s).with_context(|| format!("invalid priority '{}'", s))?);
        }
        if let Some(s) = &self.weight {
            patch = patch.weight(get_u32(s).with_context(|| format!("invalid weight '{}'", s))?);
        }

        Ok(patch)
    }
}
