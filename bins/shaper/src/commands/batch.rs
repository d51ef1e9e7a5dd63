//! `shaper batch` command implementation.
//!
//! Every line is a subcommand as it would follow `shaper` on the command
//! line. Blank lines and lines starting with `#` are skipped. All lines
//! run against the same devices, so state carries over.

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context as _, bail};
use clap::{Args, Parser};

use super::{Command, Context};

#[derive(Args)]
pub struct BatchCmd {
    /// Command file, `-` for stdin
    file: PathBuf,

    /// Keep going after a failed line
    #[arg(short, long)]
    force: bool,
}

#[derive(Parser)]
#[command(no_binary_name = true)]
struct BatchLine {
    #[command(subcommand)]
    command: Command,
}

impl BatchCmd {
    pub async fn run(self, ctx: &Context) -> anyhow::Result<()> {
        let script = if self.file.as_os_str() == "-" {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(&self.file)
                .with_context(|| format!("failed to read {}", self.file.display()))?
        };

        let mut failed = 0usize;
        for (n, line) in script.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let result = match BatchLine::try_parse_from(line.split_whitespace()) {
                Ok(parsed) => parsed.command.run_single(ctx).await,
                Err(e) => Err(e.into()),
            };

            if let Err(e) = result {
                eprintln!("line {}: {}: {:#}", n + 1, line, e);
                if !self.force {
                    bail!("batch aborted at line {}", n + 1);
                }
                failed += 1;
            }
        }

        if failed > 0 {
            bail!("{} batch line(s) failed", failed);
        }
        Ok(())
    }
}
