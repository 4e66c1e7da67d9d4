//! s2mosaic CLI entrypoint.
//!
//! Provides a thin wrapper over the `cli` module: parse args, dispatch to
//! product inspection, single export or batch export, and exit with the
//! appropriate status. For programmatic use, prefer the library API
//! (`s2mosaic::api`).

use clap::Parser;

mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::CliArgs::parse();
    cli::run(args)
}
