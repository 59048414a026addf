//! Layer connection resolution: a constraint solver picking one
//! candidate layer per required layer type such that the union of
//! `provides` across the chosen layers satisfies every chosen layer's
//! `consumes`, with no two chosen layers providing conflicting values for
//! the same key.

pub mod connect;

pub use connect::{resolve, LayerAssignment, LayerSlot, Unsatisfied};
