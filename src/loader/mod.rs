//! Document loaders: YAML (`*.csolution.yml`, `*.cproject.yml`,
//! `*.clayer.yml`, `cdefault.yml`) and XML (PDSC, SVD).
//!
//! Every loader follows the same two-stage shape: a `Raw*` struct that
//! mirrors the on-disk document exactly (so `serde` does the parsing),
//! converted by a `TryFrom`/`from_raw` step into the normalized
//! `core::model` types that carry interned ids and resolved defaults.

pub mod xml;
pub mod xml_pdsc;
pub mod svd_xml;
pub mod yaml;
