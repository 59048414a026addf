//! `csolution run` - resolve and report without the book-keeping `convert`
//! prints (pack counts, lock-file line); useful for scripting against a
//! single context's resolved component list.

use anyhow::{Context, Result};

use csolution::ops::{run_solution, RunOptions};
use csolution::util::GlobalContext;

use crate::cli::{Cli, RunArgs};
use crate::commands::convert::map_policy;
use crate::find_solution;

pub fn execute(cli: &Cli, args: &RunArgs, gctx: &GlobalContext) -> Result<i32> {
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
            println!("context {}", context.name);
            for component in &context.components {
                println!("  {} ({})", component.id, component.pack);
            }
            for (layer_type, layer_name) in &context.layers {
                println!("  layer[{layer_type}] = {layer_name}");
            }
        }
    }

    Ok(report.diagnostics.exit_code())
}
