//! `PackSource` trait - a pluggable-source abstraction over pack
//! identities. Only one implementation (`PackRepoSource`) exists because
//! non-network local installation is the only pack provenance this crate
//! supports, but the trait stays so a future read-only mirror source
//! slots in without touching the resolver.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::pack_id::PackId;
use crate::core::pack_summary::PackSummary;
use crate::loader::xml_pdsc::PdscPackage;

/// A provider of installed pack summaries and their full catalogs.
pub trait PackSource {
    /// Display name for diagnostics (e.g. `"pack-root"`).
    fn name(&self) -> &str;

    /// Enumerate every pack version this source can see.
    fn list_installed(&mut self) -> Result<Vec<PackSummary>>;

    /// Load the full component/condition/API catalog for one pack.
    fn load_catalog(&mut self, pack_id: PackId) -> Result<PdscPackage>;

    /// The on-disk directory holding `pack_id`'s files, for resolving a
    /// component's relative `files:` entries.
    fn pack_dir(&self, pack_id: PackId) -> Result<PathBuf>;
}
