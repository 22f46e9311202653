//! `tessera`: issue, attenuate and check Kubernetes capability tokens, and
//! run the webhook server that verifies them.
//!
//! Every flag can also be set through a `TESSERA_*` environment variable,
//! e.g. `TESSERA_TOKEN` or `TESSERA_PUBLIC_KEY_FILE`. Log output is
//! controlled by `RUST_LOG` (default `info`); `--verbose` forces `debug`.

mod args;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Command};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = match &cli.command {
        Command::Genkey(args) => commands::genkey(args)?,
        Command::Gentoken(args) => commands::gentoken(args)?,
        Command::Attenuate(args) => commands::attenuate(args)?,
        Command::Authorize(args) => commands::authorize_request(args)?,
        Command::Inspect(args) => commands::inspect(args)?,
        Command::Run(args) => {
            commands::run(args).await?;
            return Ok(());
        }
    };
    println!("{}", output.trim_end());
    Ok(())
}
