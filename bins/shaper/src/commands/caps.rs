//! `shaper caps` command implementation.

use std::io;

use anyhow::Context as _;
use clap::Args;
use nshaper::output::{Printable, PrintableList};
use nshaper::shaper::Scope;

use super::Context;

#[derive(Args)]
pub struct CapsCmd {
    /// Scope to query (netdev, queue, detached); every scope if omitted
    scope: Option<String>,
}

impl CapsCmd {
    pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
        match self.scope {
            Some(s) => {
                let scope: Scope = s.parse().with_context(|| format!("invalid scope '{}'", s))?;
                let caps = ctx.conn.capabilities(ctx.ifindex, scope).await?;
                caps.print(&mut io::stdout().lock(), ctx.format, &ctx.opts)?;
            }
            None => {
                let caps = ctx.conn.capabilities_dump(ctx.ifindex).await?;
                caps.print(&mut io::stdout().lock(), ctx.format, &ctx.opts)?;
            }
        }
        Ok(())
    }
}
