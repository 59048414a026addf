//! Global process context: environment variables, paths, and output mode.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::ProjectDirs;

static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "cmsis", "csolution"));

/// Process-wide context: the installed pack repository root, the compiler
/// registry root, the invocation cwd, and output verbosity/color.
///
/// Exactly one `GlobalContext` is constructed per CLI invocation and threaded
/// explicitly through every operation — there is no ambient singleton, per
/// the single-threaded/non-reentrant concurrency model.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    cwd: PathBuf,
    pack_root: PathBuf,
    compiler_root: Option<PathBuf>,
    verbose: bool,
    quiet: bool,
    color: bool,
}

impl GlobalContext {
    /// Build a context from the process environment and cwd.
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;

        let pack_root = std::env::var_os("CMSIS_PACK_ROOT")
            .map(PathBuf::from)
            .or_else(|| PROJECT_DIRS.as_ref().map(|d| d.data_dir().join("Packs")))
            .unwrap_or_else(|| PathBuf::from(".cmsis/Packs"));

        let compiler_root = std::env::var_os("CMSIS_COMPILER_ROOT").map(PathBuf::from);

        Ok(GlobalContext {
            cwd,
            pack_root,
            compiler_root,
            verbose: false,
            quiet: false,
            color: true,
        })
    }

    /// Build a context with an explicit cwd and pack root, for tests.
    pub fn with_paths(cwd: PathBuf, pack_root: PathBuf) -> Self {
        GlobalContext {
            cwd,
            pack_root,
            compiler_root: None,
            verbose: false,
            quiet: false,
            color: true,
        }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    pub fn set_pack_root(&mut self, root: PathBuf) {
        self.pack_root = root;
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn pack_root(&self) -> &Path {
        &self.pack_root
    }

    pub fn compiler_root(&self) -> Option<&Path> {
        self.compiler_root.as_deref()
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn color(&self) -> bool {
        self.color
    }

    /// Path to the solution-repo-wide defaults file, if one is adjacent to
    /// the invocation's cwd.
    pub fn cdefault_path(&self) -> PathBuf {
        self.cwd.join("cdefault.yml")
    }

    pub fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::create_dir_all(path)
                .with_context(|| format!("failed to create directory: {}", path.display()))?;
        }
        Ok(())
    }
}
