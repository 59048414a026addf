//! `PackRepoSource` - the installed-pack repository under
//! `CMSIS_PACK_ROOT`, laid out as `<vendor>/<name>/<version>/` per pack.
//! Walks the whole tree of pack versions with `walkdir`.
//!
//! Each pack version directory holds exactly one `<vendor>.<name>.pdsc`
//! manifest at its root; `list_installed` only reads that manifest's
//! identity/version/requirements (via `PackSummary`), while
//! `load_catalog` re-parses it fully for components/conditions/APIs --
//! the two-phase split the resolver relies on (cheap summary pass, then
//! full catalog load only for packs actually selected).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::core::pack_id::PackId;
use crate::core::pack_summary::PackSummary;
use crate::loader::xml_pdsc::{self, PdscPackage};
use crate::resolver::version::parse_version_lenient;
use crate::sources::source::PackSource;

pub struct PackRepoSource {
    root: PathBuf,
    manifests: HashMap<PackId, PathBuf>,
}

impl PackRepoSource {
    pub fn new(root: PathBuf) -> Self {
        PackRepoSource {
            root,
            manifests: HashMap::new(),
        }
    }

    fn discover(&self) -> Result<Vec<(PackId, PathBuf)>> {
        let mut found = Vec::new();
        if !self.root.exists() {
            return Ok(found);
        }
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(3) {
            let entry = entry.context("walking CMSIS_PACK_ROOT")?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().ends_with(".pdsc") {
                if let Some(pack_id) = pack_id_from_manifest_path(entry.path()) {
                    found.push((pack_id, entry.path().to_path_buf()));
                }
            }
        }
        found.sort_by_key(|(id, _)| id.to_string());
        Ok(found)
    }
}

/// `<root>/<vendor>/<name>/<version>/<vendor>.<name>.pdsc` -> its `PackId`.
fn pack_id_from_manifest_path(path: &Path) -> Option<PackId> {
    let version_dir = path.parent()?;
    let name_dir = version_dir.parent()?;
    let vendor_dir = name_dir.parent()?;

    let version = parse_version_lenient(&version_dir.file_name()?.to_string_lossy())?;
    let name = name_dir.file_name()?.to_string_lossy().to_string();
    let vendor = vendor_dir.file_name()?.to_string_lossy().to_string();
    Some(PackId::new(vendor, name, version))
}

impl PackSource for PackRepoSource {
    fn name(&self) -> &str {
        "pack-root"
    }

    fn list_installed(&mut self) -> Result<Vec<PackSummary>> {
        let discovered = self.discover()?;
        let mut summaries = Vec::new();
        for (pack_id, manifest_path) in discovered {
            let pkg = xml_pdsc::load_file(&manifest_path)
                .with_context(|| format!("parsing {}", manifest_path.display()))?;
            self.manifests.insert(pack_id, manifest_path);
            summaries.push(PackSummary::new(pack_id, pkg.requirements, None));
        }
        Ok(summaries)
    }

    fn load_catalog(&mut self, pack_id: PackId) -> Result<PdscPackage> {
        let path = match self.manifests.get(&pack_id).cloned() {
            Some(path) => path,
            None => {
                let found = self.discover()?;
                let (_, path) = found
                    .into_iter()
                    .find(|(id, _)| *id == pack_id)
                    .with_context(|| format!("pack '{pack_id}' is not installed under {}", self.root.display()))?;
                self.manifests.insert(pack_id, path.clone());
                path
            }
        };
        xml_pdsc::load_file(&path).with_context(|| format!("parsing {}", path.display()))
    }

    fn pack_dir(&self, pack_id: PackId) -> Result<PathBuf> {
        let manifest = match self.manifests.get(&pack_id) {
            Some(path) => path.clone(),
            None => {
                let found = self.discover()?;
                found
                    .into_iter()
                    .find(|(id, _)| *id == pack_id)
                    .map(|(_, path)| path)
                    .with_context(|| format!("pack '{pack_id}' is not installed under {}", self.root.display()))?
            }
        };
        Ok(manifest.parent().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PDSC: &str = r#"
<package>
  <vendor>ARM</vendor>
  <name>CMSIS</name>
  <releases><release version="5.9.0">current</release></releases>
</package>
"#;

    fn install_pack(root: &Path, vendor: &str, name: &str, version: &str) {
        let dir = root.join(vendor).join(name).join(version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{vendor}.{name}.pdsc")), PDSC).unwrap();
    }

    #[test]
    fn discovers_every_installed_pack_version() {
        let tmp = TempDir::new().unwrap();
        install_pack(tmp.path(), "ARM", "CMSIS", "5.8.0");
        install_pack(tmp.path(), "ARM", "CMSIS", "5.9.0");

        let mut source = PackRepoSource::new(tmp.path().to_path_buf());
        let summaries = source.list_installed().unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.vendor().as_str() == "ARM"));
    }

    #[test]
    fn missing_pack_root_yields_empty_list_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let mut source = PackRepoSource::new(tmp.path().join("does-not-exist"));
        assert!(source.list_installed().unwrap().is_empty());
    }

    #[test]
    fn load_catalog_reads_full_component_list() {
        let tmp = TempDir::new().unwrap();
        install_pack(tmp.path(), "ARM", "CMSIS", "5.9.0");
        let mut source = PackRepoSource::new(tmp.path().to_path_buf());
        source.list_installed().unwrap();
        let pack_id = PackId::new("ARM", "CMSIS", semver::Version::new(5, 9, 0));
        let catalog = source.load_catalog(pack_id).unwrap();
        assert_eq!(catalog.name, "CMSIS");
    }

    #[test]
    fn pack_dir_resolves_to_the_version_directory() {
        let tmp = TempDir::new().unwrap();
        install_pack(tmp.path(), "ARM", "CMSIS", "5.9.0");
        let mut source = PackRepoSource::new(tmp.path().to_path_buf());
        source.list_installed().unwrap();
        let pack_id = PackId::new("ARM", "CMSIS", semver::Version::new(5, 9, 0));
        let dir = source.pack_dir(pack_id).unwrap();
        assert_eq!(dir, tmp.path().join("ARM").join("CMSIS").join("5.9.0"));
    }
}
