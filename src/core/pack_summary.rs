//! PackSummary - lightweight manifest for pack resolution.
//!
//! Enough information to run the resolver without loading a pack's full
//! component catalog: identity, inter-pack dependencies (a PDSC's
//! `<packages>` requirement list), and the checksum used to detect a
//! corrupted or partially-installed pack directory.

use std::sync::Arc;

use semver::Version;

use crate::core::model::PackConstraint;
use crate::core::PackId;
use crate::util::InternedString;

#[derive(Clone)]
pub struct PackSummary {
    inner: Arc<PackSummaryInner>,
}

#[derive(Clone)]
struct PackSummaryInner {
    pack_id: PackId,
    requires: Vec<PackConstraint>,
    checksum: Option<String>,
}

impl PackSummary {
    pub fn new(pack_id: PackId, requires: Vec<PackConstraint>, checksum: Option<String>) -> Self {
        PackSummary {
            inner: Arc::new(PackSummaryInner {
                pack_id,
                requires,
                checksum,
            }),
        }
    }

    pub fn pack_id(&self) -> PackId {
        self.inner.pack_id
    }

    pub fn vendor(&self) -> InternedString {
        self.inner.pack_id.vendor()
    }

    pub fn name(&self) -> InternedString {
        self.inner.pack_id.name()
    }

    pub fn version(&self) -> &Version {
        self.inner.pack_id.version()
    }

    pub fn requires(&self) -> &[PackConstraint] {
        &self.inner.requires
    }

    pub fn checksum(&self) -> Option<&str> {
        self.inner.checksum.as_deref()
    }
}

impl std::fmt::Debug for PackSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackSummary")
            .field("pack_id", &self.inner.pack_id)
            .field("requires", &self.inner.requires.len())
            .finish()
    }
}

impl PartialEq for PackSummary {
    fn eq(&self, other: &Self) -> bool {
        self.inner.pack_id == other.inner.pack_id
    }
}
impl Eq for PackSummary {}

impl std::hash::Hash for PackSummary {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.pack_id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloning_a_summary_shares_the_arc() {
        let id = PackId::new("ARM", "CMSIS", Version::new(5, 9, 0));
        let a = PackSummary::new(id, vec![], Some("deadbeef".into()));
        let b = a.clone();
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
    }
}
