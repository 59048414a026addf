//! Component selection and condition evaluation: turning a project's
//! `components:` selector list plus the active pack catalog into a
//! concrete, conflict-free set of `ComponentId`s.

pub mod condition;
pub mod solver;

pub use condition::{evaluate, ConditionOutcome};
pub use solver::{resolve_components, ResolvedComponent, SolverError};
