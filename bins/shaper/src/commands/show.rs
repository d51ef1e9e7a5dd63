//! `shaper show` command implementation.

use std::io;

use clap::Args;
use nshaper::output::{Printable, PrintableList};

use super::{Context, parse_handle};

#[derive(Args)]
pub struct ShowCmd {
    /// Shaper handle (scope[:id]); every shaper if omitted
    handle: Option<String>,
}

impl ShowCmd {
    pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
        match self.handle {
            Some(h) => {
                let shaper = ctx.conn.get(ctx.ifindex, parse_handle(&h)?).await?;
                shaper.print(&mut io::stdout().lock(), ctx.format, &ctx.opts)?;
            }
            None => {
                let shapers = ctx.conn.dump(ctx.ifindex).await?;
                shapers.print(&mut io::stdout().lock(), ctx.format, &ctx.opts)?;
            }
        }
        Ok(())
    }
}
