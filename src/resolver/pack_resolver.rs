//! Pack version resolution.
//!
//! A simple fixed-point closure: CMSIS packs don't have alternative
//! dependency sets that can conflict and need SAT-style backtracking, just
//! a flat `requires:` list of additional version constraints, so gathering
//! every constraint that touches a `(vendor, name)` family and intersecting
//! them (`resolver::version`) already produces a unique answer when one
//! exists. The fixed point comes from requirements pulling in further
//! requirements: resolving pack A may add new constraints on pack B, so
//! `resolve` keeps folding newly resolved packs' `requires()` back in until
//! no new family appears.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::model::PackLoadingPolicy;
use crate::core::pack_id::PackId;
use crate::core::pack_summary::PackSummary;
use crate::util::diagnostic::{DiagnosticContext, Location};

use super::version::{intersect_all, VersionRange};

/// How firmly a resolved pack's version was pinned, used by
/// `components::solver`'s candidate tie-break as a proxy for "how much
/// room is left to prefer other attributes."
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConstraintStrength {
    /// No contributing constraint narrowed the version at all; the newest
    /// installed version was picked by default.
    Latest,
    /// At least one `min`/`max` bound narrowed the candidate set.
    Bounded,
    /// An exact version was pinned.
    Exact,
}

/// One request for a pack, tagged with who asked for it (a context name, a
/// layer path, or a pack id for transitively-required packs) so the
/// resulting lock file can record `selectedBy`.
#[derive(Debug, Clone)]
pub struct PackRequest {
    pub owner: String,
    pub constraint: crate::core::model::PackConstraint,
}

#[derive(Debug, Clone)]
pub struct ResolvedPack {
    pub pack_id: PackId,
    pub selected_by: Vec<String>,
    pub strength: ConstraintStrength,
}

/// Resolve every `(vendor, name)` family touched by `requests` against the
/// packs installed locally, expanding transitively through resolved packs'
/// own `requires()` until a fixed point is reached.
pub fn resolve(
    installed: &[PackSummary],
    requests: &[PackRequest],
    policy: PackLoadingPolicy,
    diagnostics: &mut DiagnosticContext,
) -> Vec<ResolvedPack> {
    let mut pending: Vec<PackRequest> = requests.to_vec();
    let mut resolved: BTreeMap<(String, String), ResolvedPack> = BTreeMap::new();
    let mut seen_families: BTreeSet<(String, String)> = BTreeSet::new();

    loop {
        let families = group_by_family(installed, &pending);
        let mut added_new_family = false;

        for (family, entries) in &families {
            if seen_families.contains(family) {
                continue;
            }
            seen_families.insert(family.clone());
            added_new_family = true;

            if let Some(r) = resolve_family(installed, family, entries, policy, diagnostics) {
                // Fold the resolved pack's own requirements back into the
                // pending queue so transitively-required packs are found.
                if let Some(summary) = installed.iter().find(|p| p.pack_id() == r.pack_id) {
                    for req in summary.requires() {
                        pending.push(PackRequest {
                            owner: format!("{}::{} (required)", family.0, family.1),
                            constraint: req.clone(),
                        });
                    }
                }
                resolved.insert(family.clone(), r);
            }
        }

        if !added_new_family {
            break;
        }
    }

    resolved.into_values().collect()
}

fn group_by_family(
    installed: &[PackSummary],
    requests: &[PackRequest],
) -> BTreeMap<(String, String), Vec<PackRequest>> {
    let mut families: BTreeMap<(String, String), Vec<PackRequest>> = BTreeMap::new();
    for req in requests {
        let c = &req.constraint;
        let matching: BTreeSet<(String, String)> = installed
            .iter()
            .filter(|p| {
                p.vendor().as_str() == c.vendor
                    && c.name.as_deref().map(|n| p.name().as_str() == n).unwrap_or(true)
            })
            .map(|p| (p.vendor().to_string(), p.name().to_string()))
            .collect();
        for family in matching {
            families.entry(family).or_default().push(req.clone());
        }
    }
    families
}

fn resolve_family(
    installed: &[PackSummary],
    family: &(String, String),
    entries: &[PackRequest],
    policy: PackLoadingPolicy,
    diagnostics: &mut DiagnosticContext,
) -> Option<ResolvedPack> {
    let (vendor, name) = family;
    let candidates: Vec<&PackSummary> = installed
        .iter()
        .filter(|p| p.vendor().as_str() == vendor && p.name().as_str() == name)
        .collect();
    let owners: Vec<String> = entries.iter().map(|e| e.owner.clone()).collect();

    match policy {
        PackLoadingPolicy::Required => {
            let constraints: Vec<_> = entries.iter().map(|e| e.constraint.clone()).collect();
            let Some(range) = intersect_all(&constraints) else {
                diagnostics.error(
                    "M204",
                    &[("pack", &format!("{vendor}::{name}")), ("version", "conflicting constraints")],
                    Location::none(),
                );
                return None;
            };
            let strength = if range.is_exact() {
                ConstraintStrength::Exact
            } else if range.is_bounded() {
                ConstraintStrength::Bounded
            } else {
                diagnostics.error(
                    "M204",
                    &[("pack", &format!("{vendor}::{name}")), ("version", "unconstrained")],
                    Location::none(),
                );
                return None;
            };
            // `required` loads only versions named by a declared constraint,
            // narrowest first -- unlike `latest`/`default`/`all`, which pick
            // the newest candidate in range, it picks the oldest one so a
            // range like `>=5.8.0` resolves to 5.8.0, not whatever happens
            // to be newest installed.
            match candidates
                .iter()
                .filter(|p| range.contains(p.version()))
                .min_by(|a, b| a.version().cmp(b.version()))
            {
                Some(p) => Some(ResolvedPack {
                    pack_id: p.pack_id(),
                    selected_by: owners,
                    strength,
                }),
                None => {
                    diagnostics.error(
                        "M204",
                        &[("pack", &format!("{vendor}::{name}")), ("version", "no installed version satisfies range")],
                        Location::none(),
                    );
                    None
                }
            }
        }
        PackLoadingPolicy::Latest => candidates
            .iter()
            .max_by(|a, b| a.version().cmp(b.version()))
            .map(|p| ResolvedPack {
                pack_id: p.pack_id(),
                selected_by: owners,
                strength: ConstraintStrength::Latest,
            }),
        PackLoadingPolicy::All => {
            // `All` doesn't produce one ResolvedPack per family; the caller
            // walks `installed` directly for that policy. Returning the
            // newest match keeps `resolve`'s single-result-per-family shape
            // usable by callers that don't special-case the policy.
            let constraints: Vec<_> = entries.iter().map(|e| e.constraint.clone()).collect();
            let range = intersect_all(&constraints).unwrap_or_else(VersionRange::full);
            candidates
                .iter()
                .filter(|p| range.contains(p.version()))
                .max_by(|a, b| a.version().cmp(b.version()))
                .map(|p| ResolvedPack {
                    pack_id: p.pack_id(),
                    selected_by: owners,
                    strength: if range.is_bounded() {
                        ConstraintStrength::Bounded
                    } else {
                        ConstraintStrength::Latest
                    },
                })
        }
        PackLoadingPolicy::Default => {
            let constraints: Vec<_> = entries.iter().map(|e| e.constraint.clone()).collect();
            let Some(range) = intersect_all(&constraints) else {
                diagnostics.error(
                    "M204",
                    &[("pack", &format!("{vendor}::{name}")), ("version", "conflicting constraints")],
                    Location::none(),
                );
                return None;
            };
            let strength = if range.is_exact() {
                ConstraintStrength::Exact
            } else if range.is_bounded() {
                ConstraintStrength::Bounded
            } else {
                ConstraintStrength::Latest
            };
            match candidates
                .iter()
                .filter(|p| range.contains(p.version()))
                .max_by(|a, b| a.version().cmp(b.version()))
            {
                Some(p) => Some(ResolvedPack {
                    pack_id: p.pack_id(),
                    selected_by: owners,
                    strength,
                }),
                None => {
                    diagnostics.error(
                        "M204",
                        &[("pack", &format!("{vendor}::{name}")), ("version", "no installed version satisfies range")],
                        Location::none(),
                    );
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::PackConstraint;
    use semver::Version;

    fn pack(vendor: &str, name: &str, version: (u64, u64, u64), requires: Vec<PackConstraint>) -> PackSummary {
        PackSummary::new(
            PackId::new(vendor, name, Version::new(version.0, version.1, version.2)),
            requires,
            None,
        )
    }

    #[test]
    fn default_policy_picks_newest_version_in_range() {
        let installed = vec![
            pack("ARM", "CMSIS", (5, 8, 0), vec![]),
            pack("ARM", "CMSIS", (5, 9, 0), vec![]),
        ];
        let requests = vec![PackRequest {
            owner: "proj.Debug+Board".into(),
            constraint: PackConstraint { vendor: "ARM".into(), name: Some("CMSIS".into()), exact: None, min: None, max: None },
        }];
        let mut diags = DiagnosticContext::new(false);
        let resolved = resolve(&installed, &requests, PackLoadingPolicy::Default, &mut diags);
        assert_eq!(resolved.len(), 1);
        assert_eq!(*resolved[0].pack_id.version(), Version::new(5, 9, 0));
        assert_eq!(diags.error_count(), 0);
    }

    #[test]
    fn conflicting_constraints_report_m204_and_resolve_nothing() {
        let installed = vec![pack("ARM", "CMSIS", (5, 9, 0), vec![])];
        let requests = vec![
            PackRequest {
                owner: "a".into(),
                constraint: PackConstraint { vendor: "ARM".into(), name: Some("CMSIS".into()), exact: None, min: None, max: Some(Version::new(5, 0, 0)) },
            },
            PackRequest {
                owner: "b".into(),
                constraint: PackConstraint { vendor: "ARM".into(), name: Some("CMSIS".into()), exact: None, min: Some(Version::new(6, 0, 0)), max: None },
            },
        ];
        let mut diags = DiagnosticContext::new(false);
        let resolved = resolve(&installed, &requests, PackLoadingPolicy::Default, &mut diags);
        assert!(resolved.is_empty());
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn transitive_requirements_pull_in_additional_packs() {
        let installed = vec![
            pack(
                "ARM",
                "CMSIS",
                (5, 9, 0),
                vec![PackConstraint { vendor: "Keil".into(), name: Some("ARM_Compiler".into()), exact: None, min: None, max: None }],
            ),
            pack("Keil", "ARM_Compiler", (1, 7, 2), vec![]),
        ];
        let requests = vec![PackRequest {
            owner: "proj.Debug+Board".into(),
            constraint: PackConstraint { vendor: "ARM".into(), name: Some("CMSIS".into()), exact: None, min: None, max: None },
        }];
        let mut diags = DiagnosticContext::new(false);
        let resolved = resolve(&installed, &requests, PackLoadingPolicy::Default, &mut diags);
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().any(|r| r.pack_id.name().as_str() == "ARM_Compiler"));
    }

    #[test]
    fn required_policy_picks_minimum_version_satisfying_the_range() {
        let installed = vec![
            pack("ARM", "CMSIS", (5, 7, 0), vec![]),
            pack("ARM", "CMSIS", (5, 8, 0), vec![]),
            pack("ARM", "CMSIS", (5, 9, 0), vec![]),
            pack("ARM", "CMSIS", (6, 0, 0), vec![]),
        ];
        let requests = vec![PackRequest {
            owner: "proj.Debug+Board".into(),
            constraint: PackConstraint { vendor: "ARM".into(), name: Some("CMSIS".into()), exact: None, min: Some(Version::new(5, 8, 0)), max: None },
        }];
        let mut diags = DiagnosticContext::new(false);
        let resolved = resolve(&installed, &requests, PackLoadingPolicy::Required, &mut diags);
        assert_eq!(resolved.len(), 1);
        assert_eq!(*resolved[0].pack_id.version(), Version::new(5, 8, 0));
        assert_eq!(diags.error_count(), 0);
    }

    #[test]
    fn required_policy_errors_when_no_constraint_is_declared() {
        let installed = vec![pack("ARM", "CMSIS", (5, 9, 0), vec![])];
        let requests = vec![PackRequest {
            owner: "proj.Debug+Board".into(),
            constraint: PackConstraint { vendor: "ARM".into(), name: Some("CMSIS".into()), exact: None, min: None, max: None },
        }];
        let mut diags = DiagnosticContext::new(false);
        let resolved = resolve(&installed, &requests, PackLoadingPolicy::Required, &mut diags);
        assert!(resolved.is_empty());
        assert_eq!(diags.error_count(), 1);
    }
}
