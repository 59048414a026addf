//! `csolution update-rte` - refresh each context's resolved component tree
//! (the same resolution `convert` runs) without the build-plan summary.

use anyhow::{Context, Result};

use csolution::ops::{run_solution, RunOptions};
use csolution::util::GlobalContext;

use crate::cli::{Cli, UpdateRteArgs};
use crate::commands::convert::map_policy;
use crate::find_solution;

pub fn execute(cli: &Cli, args: &UpdateRteArgs, gctx: &GlobalContext) -> Result<i32> {
    let solution_path = find_solution(args.solution.as_deref(), gctx)?;

    let options = RunOptions {
        policy: map_policy(cli.load),
        frozen: false,
        strict: cli.strict,
        filter: cli.filter.clone(),
        diag_suppress: cli.diag_suppress.clone(),
    };

    let report = run_solution(&solution_path, gctx, &options)
        .with_context(|| format!("resolving {}", solution_path.display()))?;

    report.diagnostics.emit_all(gctx.color());
    if !cli.quiet {
        println!("RTE refreshed for {} context(s)", report.contexts.len());
    }

    Ok(report.diagnostics.exit_code())
}
