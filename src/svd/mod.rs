//! Device-tree (SVD) model: arena-based tree, `derivedFrom` resolution,
//! dimension expansion, effective-property inheritance, and validation.
//!
//! The parse step itself lives in `crate::loader::svd_xml` and builds a
//! `Device` via `svd::model::Device::push_child`, then runs the three
//! passes here in order: `derive::resolve_all`, `dimension` expansion,
//! `effective::resolve_all`, and finally `check::run_all`.

pub mod check;
pub mod derive;
pub mod dimension;
pub mod disable_condition;
pub mod effective;
pub mod model;

pub use model::{Access, Device, DimensionSpec, InheritableProps, NodeId, NodeKind, SvdNode};

use crate::util::DiagnosticContext;

/// Run the full post-parse pipeline over a freshly loaded `Device`: resolve
/// `derivedFrom` references, expand `dim` arrays, propagate inheritable
/// properties, then validate. Diagnostics from every pass accumulate in
/// `diagnostics` rather than stopping at the first failing pass, so a
/// single `csolution` invocation reports every device-description problem
/// it finds in one run.
pub fn process_device(device: &mut Device, diagnostics: &mut DiagnosticContext) {
    derive::resolve_all(device, diagnostics);
    dimension::expand_all(device, diagnostics);
    effective::resolve_all(device);
    disable_condition::link_all(device, diagnostics);
    check::run_all(device, diagnostics);
}
