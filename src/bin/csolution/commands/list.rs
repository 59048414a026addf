//! `csolution list` - inventory reports over a solution's declared and
//! resolved state. Each subcommand is read-only: none of them write a lock
//! file or build-plan output.

use std::collections::BTreeSet;

use anyhow::{Context, Result};

use csolution::context_factory::enumerate_contexts;
use csolution::loader::yaml;
use csolution::resolver::encode::PackLock;
use csolution::sources::cache::PackCache;
use csolution::sources::path::PackRepoSource;
use csolution::sources::source::PackSource;
use csolution::util::GlobalContext;

use crate::cli::{ListArgs, ListSolutionArgs, ListWhat};
use crate::find_solution;

pub fn execute(args: &ListArgs, gctx: &GlobalContext) -> Result<i32> {
    match &args.what {
        ListWhat::Packs(a) => packs(a, gctx),
        ListWhat::Boards(a) => boards(a, gctx),
        ListWhat::Configs(a) => configs(a, gctx),
        ListWhat::Contexts(a) => contexts(a, gctx),
        ListWhat::Components(a) => components(a, gctx),
        ListWhat::Dependencies(a) => dependencies(a, gctx),
        ListWhat::Devices(a) => devices(a, gctx),
        ListWhat::Environment => environment(gctx),
        ListWhat::Examples(a) => examples(a, gctx),
        ListWhat::Generators(a) => generators(a, gctx),
        ListWhat::Layers(a) => layers(a, gctx),
        ListWhat::TargetSets(a) => target_sets(a, gctx),
        ListWhat::Toolchains => toolchains(gctx),
    }
}

/// Resolved/installed packs: the lock file next to the solution if one has
/// already been written by `convert`, otherwise every pack currently
/// installed under `CMSIS_PACK_ROOT`.
fn packs(args: &ListSolutionArgs, gctx: &GlobalContext) -> Result<i32> {
    let solution_path = find_solution(args.solution.as_deref(), gctx)?;
    let solution = yaml::load_solution(&solution_path)?;
    let lock_path = solution_path
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .join(format!("{}.cbuild-pack.yml", solution.name));

    if let Ok(lock) = PackLock::load(&lock_path) {
        for pack in &lock.packs {
            println!("{}@{}", pack.pack, pack.version);
        }
        return Ok(0);
    }

    let mut source = PackRepoSource::new(gctx.pack_root().to_path_buf());
    let installed = source.list_installed().context("listing installed packs")?;
    for summary in installed {
        println!("{}@{}", summary.pack_id().family(), summary.version());
    }
    Ok(0)
}

fn contexts(args: &ListSolutionArgs, gctx: &GlobalContext) -> Result<i32> {
    let solution_path = find_solution(args.solution.as_deref(), gctx)?;
    let solution = yaml::load_solution(&solution_path)?;
    for context in enumerate_contexts(&solution) {
        println!("{}", context.name);
    }
    Ok(0)
}

fn boards(args: &ListSolutionArgs, gctx: &GlobalContext) -> Result<i32> {
    let solution_path = find_solution(args.solution.as_deref(), gctx)?;
    let solution = yaml::load_solution(&solution_path)?;
    let mut seen = BTreeSet::new();
    for target in &solution.target_types {
        if let Some(board) = &target.board {
            seen.insert(board.clone());
        }
    }
    for board in seen {
        println!("{board}");
    }
    Ok(0)
}

/// Devices named by a target-type's `device:` selector. Installed packs'
/// own device declarations aren't modeled in the catalog loader, so this
/// reports what the solution asks for rather than a pack-wide device
/// catalog.
fn devices(args: &ListSolutionArgs, gctx: &GlobalContext) -> Result<i32> {
    let solution_path = find_solution(args.solution.as_deref(), gctx)?;
    let solution = yaml::load_solution(&solution_path)?;
    let mut seen = BTreeSet::new();
    for target in &solution.target_types {
        if let Some(device) = &target.device {
            seen.insert(device.clone());
        }
    }
    for device in seen {
        println!("{device}");
    }
    Ok(0)
}

fn configs(args: &ListSolutionArgs, gctx: &GlobalContext) -> Result<i32> {
    let solution_path = find_solution(args.solution.as_deref(), gctx)?;
    let solution = yaml::load_solution(&solution_path)?;
    for build_type in &solution.build_types {
        println!("{}", build_type.name);
    }
    let cdefault = gctx.cdefault_path();
    if cdefault.exists() {
        println!("cdefault: {}", cdefault.display());
    }
    Ok(0)
}

/// Components resolved per context; runs the full pipeline (in-memory
/// only, no files written) to get the solver's output.
fn components(args: &ListSolutionArgs, gctx: &GlobalContext) -> Result<i32> {
    let solution_path = find_solution(args.solution.as_deref(), gctx)?;
    let report = csolution::ops::run_solution(&solution_path, gctx, &csolution::ops::RunOptions::default())?;
    report.diagnostics.emit_all(gctx.color());
    for context in &report.contexts {
        println!("{}:", context.name);
        for component in &context.components {
            println!("  {} ({})", component.id, component.pack);
        }
    }
    Ok(report.diagnostics.exit_code())
}

/// API/bundle dependency report: which pack each resolved component came
/// from and, where applicable, the generator that produces its files.
fn dependencies(args: &ListSolutionArgs, gctx: &GlobalContext) -> Result<i32> {
    let solution_path = find_solution(args.solution.as_deref(), gctx)?;
    let report = csolution::ops::run_solution(&solution_path, gctx, &csolution::ops::RunOptions::default())?;
    report.diagnostics.emit_all(gctx.color());
    for context in &report.contexts {
        println!("{}:", context.name);
        for component in &context.components {
            let generator = component.generator.as_deref().unwrap_or("-");
            println!("  {} <- {} (generator: {generator})", component.id, component.pack);
        }
    }
    Ok(report.diagnostics.exit_code())
}

fn generators(args: &ListSolutionArgs, gctx: &GlobalContext) -> Result<i32> {
    let solution_path = find_solution(args.solution.as_deref(), gctx)?;
    let report = csolution::ops::run_solution(&solution_path, gctx, &csolution::ops::RunOptions::default())?;
    report.diagnostics.emit_all(gctx.color());
    let mut seen = BTreeSet::new();
    for context in &report.contexts {
        for component in &context.components {
            if let Some(generator) = &component.generator {
                seen.insert(generator.clone());
            }
        }
    }
    for generator in seen {
        println!("{generator}");
    }
    Ok(report.diagnostics.exit_code())
}

/// Layer types any project requires, and the candidate layer files
/// available to fill each one.
fn layers(args: &ListSolutionArgs, gctx: &GlobalContext) -> Result<i32> {
    let solution_path = find_solution(args.solution.as_deref(), gctx)?;
    let solution = yaml::load_solution(&solution_path)?;
    let solution_dir = solution_path.parent().unwrap_or_else(|| std::path::Path::new("."));

    let mut by_type: std::collections::BTreeMap<String, BTreeSet<String>> = std::collections::BTreeMap::new();
    for project in &solution.projects {
        for layer_ref in &project.layers {
            let path = solution_dir.join(&layer_ref.path);
            if let Ok(layer) = yaml::load_layer(&path) {
                by_type.entry(layer.layer_type.clone()).or_default().insert(layer.name.clone());
            }
        }
    }
    for (layer_type, names) in &by_type {
        println!("{layer_type}:");
        for name in names {
            println!("  {name}");
        }
    }
    Ok(0)
}

fn target_sets(args: &ListSolutionArgs, gctx: &GlobalContext) -> Result<i32> {
    let solution_path = find_solution(args.solution.as_deref(), gctx)?;
    let solution = yaml::load_solution(&solution_path)?;
    for target in &solution.target_types {
        if target.target_sets.is_empty() {
            println!("{}", target.name);
        } else {
            for set in &target.target_sets {
                println!("{}@{}", target.name, set);
            }
        }
    }
    Ok(0)
}

fn environment(gctx: &GlobalContext) -> Result<i32> {
    println!("CMSIS_PACK_ROOT={}", gctx.pack_root().display());
    match gctx.compiler_root() {
        Some(root) => println!("CMSIS_COMPILER_ROOT={}", root.display()),
        None => println!("CMSIS_COMPILER_ROOT=<unset>"),
    }
    println!("cwd={}", gctx.cwd().display());
    Ok(0)
}

/// Reference examples bundled with installed packs. The catalog loader
/// doesn't model a PDSC's `<examples>` section, so this reports which
/// installed packs exist (an example's owning pack) rather than fabricate
/// per-example metadata that isn't parsed.
fn examples(_args: &ListSolutionArgs, gctx: &GlobalContext) -> Result<i32> {
    let mut source = PackRepoSource::new(gctx.pack_root().to_path_buf());
    let installed = source.list_installed().context("listing installed packs")?;
    let mut cache = PackCache::new(source);
    for summary in installed {
        let _ = cache.load_catalog(summary.pack_id());
        println!("{} (no bundled-example metadata modeled)", summary.pack_id().family());
    }
    Ok(0)
}

fn toolchains(gctx: &GlobalContext) -> Result<i32> {
    let Some(root) = gctx.compiler_root() else {
        println!("CMSIS_COMPILER_ROOT is not set; no toolchain registry to list");
        return Ok(0);
    };
    if !root.exists() {
        println!("{} does not exist", root.display());
        return Ok(0);
    }
    let mut names: Vec<String> = std::fs::read_dir(root)
        .with_context(|| format!("reading {}", root.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|ext| ext == "yml").unwrap_or(false))
        .filter_map(|e| e.path().file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    for name in names {
        println!("{name}");
    }
    Ok(0)
}
