//! csolution - a Solution/Context resolver and Pack/Component model for
//! CMSIS-based embedded projects.
//!
//! This crate provides the core library functionality: pack dependency
//! resolution, component/condition solving, layer connection matching,
//! device (SVD) model construction, and the `csolution`/`cbuildgen`
//! command-line drivers built on top of it.

pub mod components;
pub mod context_factory;
pub mod core;
pub mod layers;
pub mod loader;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod svd;
pub mod util;

pub use core::{ComponentId, Context, ContextName, PackId, PackSummary, Solution};
pub use util::context::GlobalContext;
