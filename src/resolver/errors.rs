//! Resolution error types and diagnostics.

use thiserror::Error;

use crate::util::diagnostic::{Diagnostic, Severity};

/// Error during pack resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no installed version of `{family}` satisfies the requested range")]
    NoMatchingVersion { family: String, requested: String },

    #[error("conflicting version constraints on `{family}`")]
    VersionConflict {
        family: String,
        requirers: Vec<(String, String)>,
    },

    #[error("pack `{family}` is not installed under CMSIS_PACK_ROOT")]
    PackNotFound { family: String },

    #[error("`packs: required` needs an exact version for `{family}`")]
    RequiredPolicyNeedsExactVersion { family: String },
}

impl ResolveError {
    /// Convert to a coded diagnostic consistent with `util::diagnostic`'s
    /// table-driven message rendering.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let (code, message) = match self {
            ResolveError::NoMatchingVersion { family, requested } => (
                "M204",
                format!("no installed version of '{family}' satisfies '{requested}'"),
            ),
            ResolveError::VersionConflict { family, requirers } => {
                let detail = requirers
                    .iter()
                    .map(|(owner, req)| format!("{owner} requires {req}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                ("M204", format!("conflicting constraints on '{family}': {detail}"))
            }
            ResolveError::PackNotFound { family } => {
                ("M204", format!("pack '{family}' not found in any installed repository"))
            }
            ResolveError::RequiredPolicyNeedsExactVersion { family } => (
                "M204",
                format!("'{family}' has no exact version pinned, required by the 'required' load policy"),
            ),
        };

        Diagnostic {
            code: code.to_string(),
            severity: Severity::Error,
            message,
            file: None,
            line: None,
            column: None,
        }
    }
}
