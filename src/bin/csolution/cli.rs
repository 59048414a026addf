//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Pack loading policy, as named on the `-l/--load` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LoadPolicy {
    #[default]
    Latest,
    All,
    Required,
}

/// csolution - Solution/Context resolver and Pack/Component model for
/// CMSIS-based embedded projects.
#[derive(Parser)]
#[command(name = "csolution")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Context name(s) to operate on (repeatable); glob segments allowed.
    #[arg(short = 'c', long = "context", global = true)]
    pub context: Vec<String>,

    /// Path to a `*.cbuild-idx.yml`/context-set file narrowing the context list.
    #[arg(short = 'S', long = "context-set", global = true)]
    pub context_set: Option<PathBuf>,

    /// Narrow to one active target, optionally `@<target-set>`.
    #[arg(short = 'a', long = "active", global = true)]
    pub active: Option<String>,

    /// Toolchain override.
    #[arg(short = 't', long = "toolchain", global = true)]
    pub toolchain: Option<String>,

    /// Pack loading policy.
    #[arg(short = 'l', long = "load", global = true, default_value = "latest")]
    pub load: LoadPolicy,

    /// Additional clayer search path(s).
    #[arg(short = 'L', long = "clayer-path", global = true)]
    pub clayer_path: Vec<PathBuf>,

    /// Output directory.
    #[arg(short = 'o', long = "output", global = true)]
    pub output: Option<PathBuf>,

    /// Context-selector glob filter(s).
    #[arg(short = 'f', long = "filter", global = true)]
    pub filter: Vec<String>,

    /// Generator id to invoke.
    #[arg(short = 'g', long = "generator", global = true)]
    pub generator: Option<String>,

    /// Skip XML schema validation.
    #[arg(short = 'n', long = "no-check-schema", global = true)]
    pub no_check_schema: bool,

    /// Skip the RTE component-tree refresh.
    #[arg(short = 'N', long = "no-update-rte", global = true)]
    pub no_update_rte: bool,

    /// Emit output paths relative to the output directory.
    #[arg(short = 'R', long = "relative-paths", global = true)]
    pub relative_paths: bool,

    /// Refuse any resolution that would change a prior `cbuild-pack.yml`.
    #[arg(long = "frozen-packs", global = true)]
    pub frozen_packs: bool,

    /// Suppress non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (info-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug-level diagnostic detail.
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Show what would be produced without writing any files.
    #[arg(short = 'D', long = "dry-run", global = true)]
    pub dry_run: bool,

    /// Treat elevated-severity warnings as errors (strict mode).
    #[arg(long, global = true)]
    pub strict: bool,

    /// Suppress/show specific diagnostic codes (`!<code>` re-enables one).
    #[arg(long = "diag-suppress", global = true)]
    pub diag_suppress: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a solution and emit `cbuild-pack`/`cbuild-set`/`cbuild.yml`.
    Convert(ConvertArgs),

    /// Refresh the per-context RTE component tree without emitting output.
    UpdateRte(UpdateRteArgs),

    /// Resolve and report, without writing lock or build-plan files.
    Run(RunArgs),

    /// Run a single JSON-RPC request read from stdin.
    Rpc,

    /// List solution/pack/component/device inventory.
    List(ListArgs),

    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Path to the `*.csolution.yml` file (defaults to the one found in cwd).
    pub solution: Option<PathBuf>,
}

#[derive(Args)]
pub struct UpdateRteArgs {
    pub solution: Option<PathBuf>,
}

#[derive(Args)]
pub struct RunArgs {
    pub solution: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    #[arg(value_enum)]
    pub shell: Shell,
}

#[derive(Args)]
pub struct ListArgs {
    #[command(subcommand)]
    pub what: ListWhat,
}

#[derive(Subcommand)]
pub enum ListWhat {
    /// Packs resolved/installed for this solution.
    Packs(ListSolutionArgs),
    /// Boards referenced by any target-type in the solution.
    Boards(ListSolutionArgs),
    /// Available `cdefault.yml`/build configuration names.
    Configs(ListSolutionArgs),
    /// Every enumerated `<project>.<build>+<target>` context.
    Contexts(ListSolutionArgs),
    /// Components resolved per context.
    Components(ListSolutionArgs),
    /// API/bundle dependency report per context.
    Dependencies(ListSolutionArgs),
    /// Devices declared by installed packs.
    Devices(ListSolutionArgs),
    /// Effective `CMSIS_PACK_ROOT`/`CMSIS_COMPILER_ROOT` environment.
    Environment,
    /// Reference examples bundled with installed packs.
    Examples(ListSolutionArgs),
    /// Generator ids referenced by resolved components.
    Generators(ListSolutionArgs),
    /// Layer types required and the candidates available for each.
    Layers(ListSolutionArgs),
    /// Named target-sets declared by target-types.
    TargetSets(ListSolutionArgs),
    /// Toolchain definitions under `CMSIS_COMPILER_ROOT`.
    Toolchains,
}

#[derive(Args)]
pub struct ListSolutionArgs {
    pub solution: Option<PathBuf>,
}
