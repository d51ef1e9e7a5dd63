//! `shaper delete` command implementation.

use clap::Args;

use super::{Context, parse_handle};

#[derive(Args)]
pub struct DeleteCmd {
    /// Shaper handle (scope[:id])
    handle: String,
}

impl DeleteCmd {
    pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
        let handle = parse_handle(&self.handle)?;
        ctx.conn.delete(ctx.ifindex, handle).await?;
        Ok(())
    }
}
