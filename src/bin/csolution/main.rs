//! csolution/cbuildgen CLI entry point.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use csolution::util::GlobalContext;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("csolution=debug")
    } else if cli.verbose {
        EnvFilter::new("csolution=info")
    } else {
        EnvFilter::new("csolution=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let mut gctx = GlobalContext::from_env()?;
    gctx.set_verbose(cli.verbose || cli.debug);
    gctx.set_quiet(cli.quiet);

    match &cli.command {
        Commands::Convert(args) => commands::convert::execute(&cli, args, &gctx),
        Commands::UpdateRte(args) => commands::update_rte::execute(&cli, args, &gctx),
        Commands::Run(args) => commands::run::execute(&cli, args, &gctx),
        Commands::Rpc => commands::rpc::execute(&gctx),
        Commands::List(args) => commands::list::execute(args, &gctx),
        Commands::Completions(args) => {
            commands::completions::execute(args)?;
            Ok(0)
        }
    }
}

/// Resolve the `*.csolution.yml` to operate on: the explicit path if given,
/// otherwise the single solution file found in the current directory.
pub fn find_solution(explicit: Option<&Path>, gctx: &GlobalContext) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => csolution::loader::yaml::find_solution_file(gctx.cwd()),
    }
}
