//! `shaper set` command implementation.

use clap::Args;

use super::{Context, ShaperParams, parse_handle};

#[derive(Args)]
pub struct SetCmd {
    /// Shaper handle (scope[:id])
    handle: String,

    /// Parameters: metric bps|pps, bw-min RATE, bw-max RATE, burst SIZE,
    /// priority N, weight N
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    params: Vec<String>,
}

impl SetCmd {
    pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
        let handle = parse_handle(&self.handle)?;
        let patch = ShaperParams::from_keywords(&self.params)?.to_patch(handle)?;
        ctx.conn.set(ctx.ifindex, &patch).await?;
        Ok(())
    }
}
