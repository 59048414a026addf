//! The solution-to-build-plan pipeline.
//!
//! One synchronous entry point, `run_solution`, drives load -> enumerate
//! contexts -> select -> resolve layers -> resolve packs -> solve
//! components, with every stage feeding a shared `DiagnosticContext`
//! instead of aborting the whole run on the first recoverable error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::components::solver::{self, CatalogEntry, ResolvedComponent};
use crate::context_factory::enumerate_contexts;
use crate::core::model::{
    ActiveEnvironment, ComponentSelector, Context as SolutionContext, Layer, PackConstraint,
    PackLoadingPolicy, Solution,
};
use crate::core::pack_id::PackId;
use crate::core::ContextName;
use crate::layers::connect::{self, LayerSlot};
use crate::loader::xml_pdsc::{ApiEntry, PdscPackage};
use crate::loader::yaml;
use crate::resolver::encode::PackLock;
use crate::resolver::pack_resolver::{self, ConstraintStrength, PackRequest, ResolvedPack};
use crate::sources::cache::PackCache;
use crate::sources::path::PackRepoSource;
use crate::util::context::GlobalContext;
use crate::util::diagnostic::{DiagnosticContext, Location};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub policy: PackLoadingPolicy,
    /// Frozen mode: an existing `*.cbuild-pack.yml` must already pin the
    /// exact pack set a fresh resolution would produce.
    pub frozen: bool,
    pub strict: bool,
    /// Context-selector glob filters; empty selects
    /// every enumerated context.
    pub filter: Vec<String>,
    /// Diagnostic codes to suppress (`!<code>` re-enables one), applied
    /// before the pipeline emits its first diagnostic.
    pub diag_suppress: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            policy: PackLoadingPolicy::default(),
            frozen: false,
            strict: false,
            filter: Vec::new(),
            diag_suppress: Vec::new(),
        }
    }
}

/// One context's resolved state: the components the solver chose and the
/// layer picked for each layer type the connection resolver filled.
pub struct ContextResult {
    pub name: ContextName,
    pub components: Vec<ResolvedComponent>,
    pub layers: BTreeMap<String, String>,
}

pub struct RunReport {
    pub pack_lock: PackLock,
    pub contexts: Vec<ContextResult>,
    pub diagnostics: DiagnosticContext,
}

/// Drive the full pipeline for a solution file, writing its
/// `*.cbuild-pack.yml` lock alongside it.
pub fn run_solution(solution_path: &Path, gctx: &GlobalContext, options: &RunOptions) -> Result<RunReport> {
    let solution = yaml::load_solution(solution_path).context("loading solution")?;
    let solution_dir = solution_path.parent().unwrap_or_else(|| Path::new("."));
    let mut diagnostics = DiagnosticContext::new(options.strict);
    for entry in &options.diag_suppress {
        diagnostics.set_suppress(entry);
    }

    let contexts = select_contexts(&solution, &options.filter, &mut diagnostics);

    let mut layer_cache: BTreeMap<PathBuf, Layer> = BTreeMap::new();
    let mut per_context_layers = Vec::new();
    for context in &contexts {
        let assignment = resolve_context_layers(context, solution_dir, &mut layer_cache, &mut diagnostics);
        per_context_layers.push(assignment);
    }

    let mut requests = Vec::new();
    for (context, layers) in contexts.iter().zip(&per_context_layers) {
        let owner = context.name.to_string();
        for constraint in context.effective_pack_constraints(&solution) {
            requests.push(PackRequest { owner: owner.clone(), constraint });
        }
        for (_, layer_name) in &layers.by_type {
            if let Some(layer) = layer_cache.values().find(|l| &l.name == layer_name) {
                for constraint in &layer.packs {
                    requests.push(PackRequest {
                        owner: format!("{owner} (layer {layer_name})"),
                        constraint: constraint.clone(),
                    });
                }
            }
        }
    }

    let mut source = PackRepoSource::new(gctx.pack_root().to_path_buf());
    let installed = source.list_installed().context("listing installed packs")?;
    let mut cache = PackCache::new(source);

    let lock_path = solution_dir.join(format!("{}.cbuild-pack.yml", solution.name));
    if options.frozen {
        let existing = PackLock::load(&lock_path)
            .with_context(|| format!("frozen mode requires an existing lock at {}", lock_path.display()))?;
        let resolved = pack_resolver::resolve(&installed, &requests, options.policy, &mut diagnostics);
        if !existing.matches_resolution(&resolved) {
            anyhow::bail!(
                "frozen mode: {} no longer matches the current resolution; re-run without --frozen to update it",
                lock_path.display()
            );
        }
        return finish(&solution, &contexts, per_context_layers, resolved, existing, &mut cache, diagnostics, gctx);
    }

    let resolved = pack_resolver::resolve(&installed, &requests, options.policy, &mut diagnostics);
    let lock = PackLock::from_resolved(&resolved);
    lock.save(&lock_path)?;

    finish(&solution, &contexts, per_context_layers, resolved, lock, &mut cache, diagnostics, gctx)
}

#[allow(clippy::too_many_arguments)]
fn finish(
    solution: &Solution,
    contexts: &[SolutionContext],
    per_context_layers: Vec<connect::LayerAssignmentOwned>,
    resolved: Vec<ResolvedPack>,
    lock: PackLock,
    cache: &mut PackCache<PackRepoSource>,
    mut diagnostics: DiagnosticContext,
    _gctx: &GlobalContext,
) -> Result<RunReport> {
    let mut catalogs: Vec<(PackId, ConstraintStrength, PdscPackage)> = Vec::new();
    for pack in &resolved {
        let catalog = cache
            .load_catalog(pack.pack_id)
            .with_context(|| format!("loading catalog for {}", pack.pack_id))?
            .clone();
        catalogs.push((pack.pack_id, pack.strength, catalog));
    }

    let catalog_refs: Vec<(PackId, ConstraintStrength, &PdscPackage)> =
        catalogs.iter().map(|(id, s, pkg)| (*id, *s, pkg)).collect();
    let flat_catalog = solver::build_catalog(&catalog_refs);
    let apis: Vec<(PackId, &ApiEntry)> = catalogs
        .iter()
        .flat_map(|(id, _, pkg)| pkg.apis.iter().map(move |a| (*id, a)))
        .collect();

    let mut results = Vec::new();
    for (context, layers) in contexts.iter().zip(per_context_layers) {
        let env = active_environment(context);
        let mut selectors: Vec<ComponentSelector> = context.project.components.clone();
        selectors.extend(layers.components.clone());

        match solver::resolve_components(&selectors, &flat_catalog, &apis, &env, &mut diagnostics) {
            Ok(components) => results.push(ContextResult {
                name: context.name,
                components,
                layers: layers.by_type,
            }),
            Err(err) => {
                diagnostics.error(
                    "M206",
                    &[("context", &context.name.to_string()), ("detail", &err.to_string())],
                    Location::none(),
                );
            }
        }
    }

    let _ = solution;
    Ok(RunReport { pack_lock: lock, contexts: results, diagnostics })
}

/// Apply the context-selector glob filter. A filter
/// that matches nothing is reported verbatim rather than silently dropped.
fn select_contexts(solution: &Solution, filter: &[String], diagnostics: &mut DiagnosticContext) -> Vec<SolutionContext> {
    let all = enumerate_contexts(solution);
    if filter.is_empty() {
        return all;
    }
    let mut out = Vec::new();
    for pattern in filter {
        let matcher = glob::Pattern::new(pattern);
        let matched: Vec<&SolutionContext> = all
            .iter()
            .filter(|c| {
                let name = c.name.to_string();
                matcher.as_ref().map(|p| p.matches(&name)).unwrap_or(name == *pattern)
            })
            .collect();
        if matched.is_empty() {
            diagnostics.error("M205", &[("pattern", pattern)], Location::none());
        }
        out.extend(matched.into_iter().cloned());
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out.dedup_by(|a, b| a.name == b.name);
    out
}

/// Build the immutable environment condition evaluation runs against
/// (§4.4): device/board identity, processor attributes, toolchain, and the
/// project's output type. A project-level `device`/`board` override
/// shadows the target-type's (§3 "device/board override").
fn active_environment(context: &SolutionContext) -> ActiveEnvironment {
    let mut env = ActiveEnvironment::default();

    let device = context.project.device.as_deref().or(context
        .target_type
        .as_ref()
        .and_then(|t| t.device.as_deref()));
    let (dvendor, dname) = crate::core::model::split_vendor_name(device);
    if let Some(v) = dvendor {
        env.set("Dvendor", v);
    }
    if let Some(v) = dname {
        env.set("Dname", v);
    }

    let board = context.project.board.as_deref().or(context
        .target_type
        .as_ref()
        .and_then(|t| t.board.as_deref()));
    let (bvendor, bname, brevision) = crate::core::model::split_board(board);
    if let Some(v) = bvendor {
        env.set("Bvendor", v);
    }
    if let Some(v) = bname {
        env.set("Bname", v);
    }
    if let Some(v) = brevision {
        env.set("Brevision", v);
    }

    if let Some(target) = &context.target_type {
        set_processor_attrs(&mut env, &target.processor);
    }
    if let Some(build) = &context.build_type {
        set_processor_attrs(&mut env, &build.processor);
        let (compiler, version) = build.compiler_name_version();
        if let Some(compiler) = compiler {
            env.set("Tcompiler", compiler);
        }
        if let Some(version) = version {
            env.set("Tcompiler-version", version);
        }
    }

    if let Some(output_type) = context.project.output.as_ref().and_then(|o| o.primary_type()) {
        env.set("Coutput-type", output_type);
    }

    env
}

/// Merge one set of processor attributes into `env`, letting a later
/// (more specific) call overwrite an earlier one — build-type processor
/// attributes are applied after target-type's, so a build-type can narrow
/// what the target-type declares (e.g. forcing `Dtz=TrustZone-off` for a
/// non-secure build variant of an otherwise TrustZone-capable target).
fn set_processor_attrs(env: &mut ActiveEnvironment, attrs: &crate::core::model::ProcessorAttributes) {
    if let Some(v) = &attrs.fpu {
        env.set("Dfpu", v.clone());
    }
    if let Some(v) = &attrs.dsp {
        env.set("Ddsp", v.clone());
    }
    if let Some(v) = &attrs.mve {
        env.set("Dmve", v.clone());
    }
    if let Some(v) = &attrs.endian {
        env.set("Dendian", v.clone());
    }
    if let Some(v) = &attrs.trustzone {
        env.set("Dtz", v.clone());
    }
    if let Some(v) = &attrs.branch_protection {
        env.set("DbranchProt", v.clone());
    }
}

/// Load every layer a project references, group the applicable ones by
/// their declared `type`, and run the connection resolver over the
/// resulting slots. A ref whose `for-type`/`not-for-type`
/// filter excludes this context's build/target type is skipped entirely,
/// the same way `context_factory::is_excluded` filters whole contexts.
fn resolve_context_layers(
    context: &SolutionContext,
    solution_dir: &Path,
    layer_cache: &mut BTreeMap<PathBuf, Layer>,
    diagnostics: &mut DiagnosticContext,
) -> connect::LayerAssignmentOwned {
    let build_name = context.build_type.as_ref().map(|b| b.name.as_str()).unwrap_or("");
    let target_name = context.target_type.as_ref().map(|t| t.name.as_str()).unwrap_or("");

    let mut loaded_paths = Vec::new();
    for layer_ref in &context.project.layers {
        if let Some(for_type) = &layer_ref.for_type {
            if for_type != build_name && for_type != target_name {
                continue;
            }
        }
        if let Some(not_for) = &layer_ref.not_for_type {
            if not_for == build_name || not_for == target_name {
                continue;
            }
        }
        let path = solution_dir.join(&layer_ref.path);
        if !layer_cache.contains_key(&path) {
            match yaml::load_layer(&path) {
                Ok(layer) => {
                    layer_cache.insert(path.clone(), layer);
                }
                Err(err) => {
                    if !layer_ref.optional {
                        diagnostics.error(
                            "M207",
                            &[("detail", &err.to_string())],
                            Location::file(path.clone()),
                        );
                    }
                    continue;
                }
            }
        }
        loaded_paths.push(path);
    }

    let mut by_type: BTreeMap<String, Vec<&Layer>> = BTreeMap::new();
    for path in &loaded_paths {
        if let Some(layer) = layer_cache.get(path) {
            by_type.entry(layer.layer_type.clone()).or_default().push(layer);
        }
    }

    if by_type.is_empty() {
        return connect::LayerAssignmentOwned::default();
    }

    let slots: Vec<LayerSlot> = by_type
        .into_iter()
        .map(|(layer_type, candidates)| LayerSlot { layer_type, candidates })
        .collect();

    match connect::resolve(&slots) {
        Ok(assignment) => connect::LayerAssignmentOwned::from_borrowed(&assignment),
        Err(failures) => {
            for failure in &failures {
                diagnostics.error(
                    "M208",
                    &[("consumer", &failure.consumer_layer), ("key", &failure.key)],
                    Location::none(),
                );
            }
            connect::LayerAssignmentOwned::default()
        }
    }
}
