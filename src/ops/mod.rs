//! High-level operations.
//!
//! This module contains the solution-to-build-plan driver consumed by the
//! `csolution`/`cbuildgen` command-line frontends.

pub mod pipeline;

pub use pipeline::{run_solution, ContextResult, RunOptions, RunReport};
