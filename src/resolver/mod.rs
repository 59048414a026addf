//! Pack resolution.
//!
//! Resolves the `packs:` constraints gathered from a solution and its
//! contexts against the packs actually installed under `CMSIS_PACK_ROOT`,
//! producing a `PackLock` (`*.cbuild-pack.yml`). See `pack_resolver` for the
//! algorithm and `version` for the constraint-intersection algebra it folds
//! over; `errors` carries this module's diagnostics.

pub mod encode;
pub mod errors;
pub mod pack_resolver;
pub mod version;

pub use encode::{LockedPack, PackLock};
pub use errors::ResolveError;
pub use pack_resolver::{resolve, ConstraintStrength, PackRequest, ResolvedPack};
