//! `shaper group` command implementation.

use clap::Args;
use nshaper::output::OutputFormat;
use nshaper::shaper::ShaperPatch;

use super::{Context, ShaperParams, parse_handle};

#[derive(Args)]
pub struct GroupCmd {
    /// Output shaper; a bare `detached` creates a new one
    #[arg(short, long, default_value = "detached")]
    output: String,

    /// Parent of the output shaper
    #[arg(long)]
    parent: Option<String>,

    #[command(flatten)]
    params: ShaperParams,

    /// Input shapers (queue:N or detached:N)
    #[arg(required = true)]
    inputs: Vec<String>,
}

impl GroupCmd {
    pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
        let mut output = self.params.to_patch(parse_handle(&self.output)?)?;
        if let Some(parent) = &self.parent {
            output = output.parent(parse_handle(parent)?);
        }

        let inputs = self
            .inputs
            .iter()
            .map(|s| parse_handle(s).map(ShaperPatch::new))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let handle = ctx.conn.group(ctx.ifindex, &inputs, &output).await?;

        match ctx.format {
            OutputFormat::Json => {
                let obj = serde_json::json!({
                    "handle": {
                        "scope": handle.scope().name(),
                        "id": handle.id(),
                    },
                });
                let out = if ctx.opts.pretty {
                    serde_json::to_string_pretty(&obj)?
                } else {
                    serde_json::to_string(&obj)?
                };
                println!("{}", out);
            }
            OutputFormat::Text => println!("{}", handle),
        }
        Ok(())
    }
}
