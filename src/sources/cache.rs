//! `PackCache` - memoizes `PackSource` lookups so a resolver run doesn't
//! re-read installed-pack state it already read this session. Only one
//! source exists (the installed pack repository; no network source is
//! supported), so this collapses to memoizing that source's two
//! expensive calls: `list_installed` (one repo walk) and `load_catalog`
//! (one XML parse per pack actually selected).

use std::collections::HashMap;

use anyhow::Result;

use crate::core::pack_id::PackId;
use crate::core::pack_summary::PackSummary;
use crate::loader::xml_pdsc::PdscPackage;
use crate::sources::source::PackSource;

pub struct PackCache<S: PackSource> {
    source: S,
    installed: Option<Vec<PackSummary>>,
    catalogs: HashMap<PackId, PdscPackage>,
}

impl<S: PackSource> PackCache<S> {
    pub fn new(source: S) -> Self {
        PackCache {
            source,
            installed: None,
            catalogs: HashMap::new(),
        }
    }

    /// Every installed pack summary, fetched once and reused.
    pub fn list_installed(&mut self) -> Result<&[PackSummary]> {
        if self.installed.is_none() {
            self.installed = Some(self.source.list_installed()?);
        }
        Ok(self.installed.as_deref().unwrap())
    }

    /// A pack's full catalog, parsed once and reused.
    pub fn load_catalog(&mut self, pack_id: PackId) -> Result<&PdscPackage> {
        if !self.catalogs.contains_key(&pack_id) {
            let catalog = self.source.load_catalog(pack_id)?;
            self.catalogs.insert(pack_id, catalog);
        }
        Ok(self.catalogs.get(&pack_id).unwrap())
    }

    pub fn pack_dir(&self, pack_id: PackId) -> Result<std::path::PathBuf> {
        self.source.pack_dir(pack_id)
    }

    /// Drop the cached installed-pack list, forcing the next
    /// `list_installed` call to re-walk the pack root.
    pub fn invalidate(&mut self) {
        self.installed = None;
        self.catalogs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::path::PackRepoSource;
    use tempfile::TempDir;

    const PDSC: &str = r#"
<package>
  <vendor>ARM</vendor>
  <name>CMSIS</name>
  <releases><release version="5.9.0">current</release></releases>
</package>
"#;

    #[test]
    fn list_installed_is_memoized_across_calls() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("ARM").join("CMSIS").join("5.9.0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("ARM.CMSIS.pdsc"), PDSC).unwrap();

        let mut cache = PackCache::new(PackRepoSource::new(tmp.path().to_path_buf()));
        let first = cache.list_installed().unwrap().to_vec();
        let second = cache.list_installed().unwrap().to_vec();
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn catalog_is_parsed_once_and_reused() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("ARM").join("CMSIS").join("5.9.0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("ARM.CMSIS.pdsc"), PDSC).unwrap();

        let mut cache = PackCache::new(PackRepoSource::new(tmp.path().to_path_buf()));
        cache.list_installed().unwrap();
        let pack_id = crate::core::pack_id::PackId::new("ARM", "CMSIS", semver::Version::new(5, 9, 0));
        let first = cache.load_catalog(pack_id).unwrap().name.clone();
        let second = cache.load_catalog(pack_id).unwrap().name.clone();
        assert_eq!(first, second);
    }
}
