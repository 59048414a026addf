//! Shared utilities.

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod fs;
pub mod hash;
pub mod interning;

pub use config::Config;
pub use context::GlobalContext;
pub use diagnostic::{Diagnostic, DiagnosticContext, Location, Severity};
pub use interning::InternedString;
