//! Solution-repo-wide defaults (`cdefault.yml`).
//!
//! `cdefault.yml` sits beside a solution and carries repo-wide settings
//! (default compiler, a pack-root override, a default code generator) that
//! every solution/project/layer in the tree inherits unless a more specific
//! document overrides the same key. Precedence is explicit-value-wins:
//! project overrides solution overrides `cdefault.yml` overrides built-in
//! default.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Repo-wide defaults loaded from `cdefault.yml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default toolchain/compiler identifier (e.g. `AC6`, `GCC`).
    pub compiler: Option<String>,

    /// Default code generator identifier.
    pub generator: Option<String>,

    /// Default pack loading policy, overridable per-solution.
    pub pack_root: Option<String>,

    /// Misc settings passed through to the loader without interpretation.
    #[serde(flatten)]
    pub extra: std::collections::BTreeMap<String, serde_yaml::Value>,
}

impl Config {
    /// Load configuration from a `cdefault.yml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is absent.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one; `other`'s explicit values win.
    pub fn merge(&mut self, other: Config) {
        if other.compiler.is_some() {
            self.compiler = other.compiler;
        }
        if other.generator.is_some() {
            self.generator = other.generator;
        }
        if other.pack_root.is_some() {
            self.pack_root = other.pack_root;
        }
        self.extra.extend(other.extra);
    }
}

/// Load the single `cdefault.yml` next to a solution, if present.
pub fn load_cdefault(solution_dir: &Path) -> Config {
    Config::load_or_default(&solution_dir.join("cdefault.yml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_no_overrides() {
        let config = Config::default();
        assert!(config.compiler.is_none());
        assert!(config.generator.is_none());
    }

    #[test]
    fn load_parses_yaml_document() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cdefault.yml");
        std::fs::write(&path, "compiler: AC6\ngenerator: CubeMX\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.compiler.as_deref(), Some("AC6"));
        assert_eq!(config.generator.as_deref(), Some("CubeMX"));
    }

    #[test]
    fn merge_prefers_explicit_values_from_other() {
        let mut base = Config {
            compiler: Some("GCC".into()),
            ..Default::default()
        };
        let override_cfg = Config {
            compiler: Some("AC6".into()),
            ..Default::default()
        };
        base.merge(override_cfg);
        assert_eq!(base.compiler.as_deref(), Some("AC6"));
    }
}
