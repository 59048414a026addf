//! Pack sources.
//!
//! A source is responsible for enumerating installed packs and loading
//! their catalogs. The only implementation is the local installed-pack
//! repository (`path::PackRepoSource`); the `PackSource` trait stays
//! separate from it so a future read-only mirror can slot in without
//! touching the resolver.

pub mod cache;
pub mod path;
pub mod source;

pub use cache::PackCache;
pub use path::PackRepoSource;
pub use source::PackSource;
