//! # airfare command-line entry point
//!
//! ```bash
//! airfare run --config config/default-config.yaml
//! airfare clean --output clean_data.csv
//! airfare features --input clean_data.csv --output features.csv
//! airfare predict --models runs/1718000000/models \
//!     --request '{"Model": "random_forest", "Data": {"airline": "Vistara", ...}}'
//! ```
//!
//! Pass `--log-level debug` (or set `RUST_LOG`) for detailed logs.

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // Allow println! in main binary

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    airfare::logging::init(cli.log_level.as_deref())?;

    if let Err(e) = cli::run_command(cli.command) {
        tracing::error!("{e:#}");
        return Err(e);
    }
    Ok(())
}
