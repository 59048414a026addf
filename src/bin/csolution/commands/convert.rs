//! `csolution convert` - resolve a solution and write its lock/build-plan files.

use anyhow::{Context, Result};

use csolution::core::PackLoadingPolicy;
use csolution::ops::{run_solution, RunOptions};
use csolution::util::GlobalContext;

use crate::cli::{Cli, ConvertArgs, LoadPolicy};
use crate::find_solution;

pub fn execute(cli: &Cli, args: &ConvertArgs, gctx: &GlobalContext) -> Result<i32> {
    let solution_path = find_solution(args.solution.as_deref(), gctx)?;

    let options = RunOptions {
        policy: map_policy(cli.load),
        frozen: cli.frozen_packs,
        strict: cli.strict,
        filter: cli.filter.clone(),
        diag_suppress: cli.diag_suppress.clone(),
    };

    let report = run_solution(&solution_path, gctx, &options)
        .with_context(|| format!("resolving {}", solution_path.display()))?;

    report.diagnostics.emit_all(gctx.color());
    if !cli.quiet {
        for context in &report.contexts {
            println!(
                "{}: {} component(s), {} layer(s)",
                context.name,
                context.components.len(),
                context.layers.len()
            );
        }
        println!("{} pack(s) locked", report.pack_lock.packs.len());
    }

    Ok(report.diagnostics.exit_code())
}

pub fn map_policy(policy: LoadPolicy) -> PackLoadingPolicy {
    match policy {
        LoadPolicy::Latest => PackLoadingPolicy::Latest,
        LoadPolicy::All => PackLoadingPolicy::All,
        LoadPolicy::Required => PackLoadingPolicy::Required,
    }
}
