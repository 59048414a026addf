//! Pack lock file encoding and decoding.
//!
//! `*.cbuild-pack.yml` is the canonical record of which pack versions a
//! resolution settled on: a YAML document keyed by `vendor::name`, with a
//! `selectedBy` list recording which contexts (or other packs, for
//! transitive requirements) pulled each pack in. Sorted deterministically
//! so re-running resolution against an unchanged pack repository
//! reproduces byte-identical output.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::pack_id::PackId;
use crate::resolver::pack_resolver::ResolvedPack;

/// Top-level `*.cbuild-pack.yml` document.
#[derive(Debug, Serialize, Deserialize)]
pub struct PackLock {
    #[serde(rename = "generated-by", default)]
    pub generated_by: String,

    #[serde(rename = "packs", default)]
    pub packs: Vec<LockedPack>,
}

/// One resolved pack entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockedPack {
    pub pack: String,
    pub version: String,

    #[serde(rename = "selected-by", default, skip_serializing_if = "Vec::is_empty")]
    pub selected_by: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl PackLock {
    pub fn from_resolved(resolved: &[ResolvedPack]) -> Self {
        let mut packs: Vec<LockedPack> = resolved
            .iter()
            .map(|r| {
                let mut selected_by = r.selected_by.clone();
                selected_by.sort();
                selected_by.dedup();
                LockedPack {
                    pack: r.pack_id.family(),
                    version: r.pack_id.version().to_string(),
                    selected_by,
                    checksum: None,
                }
            })
            .collect();
        packs.sort_by(|a, b| a.pack.cmp(&b.pack).then_with(|| a.version.cmp(&b.version)));

        PackLock {
            generated_by: "csolution".to_string(),
            packs,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = crate::util::fs::read_to_string(path)
            .with_context(|| format!("reading pack lock {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing pack lock {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_yaml::to_string(self).context("serializing pack lock")?;
        crate::util::fs::atomic_write(path, &text)
            .with_context(|| format!("writing pack lock {}", path.display()))
    }

    /// The `vendor::name@version` identifiers this lock pins, for drift
    /// detection against a fresh resolution (frozen-mode check).
    pub fn pinned_families(&self) -> Vec<&str> {
        self.packs.iter().map(|p| p.pack.as_str()).collect()
    }

    /// Whether this lock still pins the same set of pack ids a fresh
    /// resolution produced (frozen mode must report a mismatch as an error
    /// rather than silently re-resolving).
    pub fn matches_resolution(&self, resolved: &[ResolvedPack]) -> bool {
        let mut locked: Vec<(String, String)> =
            self.packs.iter().map(|p| (p.pack.clone(), p.version.clone())).collect();
        let mut fresh: Vec<(String, String)> = resolved
            .iter()
            .map(|r| (r.pack_id.family(), r.pack_id.version().to_string()))
            .collect();
        locked.sort();
        fresh.sort();
        locked == fresh
    }
}

/// Parse a lock entry's `vendor::name` back into the parts `PackId::new`
/// needs, given the matching resolved version.
pub fn pack_id_from_locked(entry: &LockedPack) -> Result<PackId> {
    let (vendor, name) = entry
        .pack
        .split_once("::")
        .with_context(|| format!("malformed pack family '{}', expected 'Vendor::Name'", entry.pack))?;
    let version = crate::resolver::version::parse_version_lenient(&entry.version)
        .with_context(|| format!("malformed version '{}' for pack '{}'", entry.version, entry.pack))?;
    Ok(PackId::new(vendor, name, version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::pack_resolver::ConstraintStrength;
    use semver::Version;

    fn resolved(vendor: &str, name: &str, version: (u64, u64, u64), owners: &[&str]) -> ResolvedPack {
        ResolvedPack {
            pack_id: PackId::new(vendor, name, Version::new(version.0, version.1, version.2)),
            selected_by: owners.iter().map(|s| s.to_string()).collect(),
            strength: ConstraintStrength::Bounded,
        }
    }

    #[test]
    fn from_resolved_sorts_packs_and_dedups_selected_by() {
        let resolved_packs = vec![
            resolved("Keil", "ARM_Compiler", (1, 7, 2), &["proj.Debug+Board"]),
            resolved("ARM", "CMSIS", (5, 9, 0), &["proj.Release+Board", "proj.Debug+Board", "proj.Debug+Board"]),
        ];
        let lock = PackLock::from_resolved(&resolved_packs);
        assert_eq!(lock.packs[0].pack, "ARM::CMSIS");
        assert_eq!(lock.packs[1].pack, "Keil::ARM_Compiler");
        assert_eq!(lock.packs[0].selected_by, vec!["proj.Debug+Board", "proj.Release+Board"]);
    }

    #[test]
    fn matches_resolution_detects_drift() {
        let resolved_packs = vec![resolved("ARM", "CMSIS", (5, 9, 0), &["proj.Debug+Board"])];
        let lock = PackLock::from_resolved(&resolved_packs);
        assert!(lock.matches_resolution(&resolved_packs));

        let drifted = vec![resolved("ARM", "CMSIS", (5, 8, 0), &["proj.Debug+Board"])];
        assert!(!lock.matches_resolution(&drifted));
    }

    #[test]
    fn pack_id_from_locked_round_trips_family_and_version() {
        let entry = LockedPack {
            pack: "ARM::CMSIS".to_string(),
            version: "5.9.0".to_string(),
            selected_by: vec![],
            checksum: None,
        };
        let id = pack_id_from_locked(&entry).unwrap();
        assert_eq!(id.family(), "ARM::CMSIS");
        assert_eq!(*id.version(), Version::new(5, 9, 0));
    }
}
