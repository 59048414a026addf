//! Core data structures.
//!
//! This module contains the foundational types used throughout the crate:
//! interned identity (`PackId`, `ComponentId`, `ContextName`), the
//! normalized solution/project/layer document model, and the lightweight
//! `PackSummary` used by the pack resolver.

pub mod component_id;
pub mod context_name;
pub mod model;
pub mod pack_id;
pub mod pack_summary;

pub use component_id::{ComponentAttributes, ComponentId};
pub use context_name::ContextName;
pub use model::{
    ActiveEnvironment, BuildType, ComponentSelector, ConnectionEntry, ConnectionSet, Context,
    Layer, LayerRef, PackConstraint, PackLoadingPolicy, Project, Solution, TargetType,
};
pub use pack_id::PackId;
pub use pack_summary::PackSummary;
