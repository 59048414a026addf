//! Pack version-constraint algebra.
//!
//! A `packs:` entry constrains a pack to an exact version, a half-open
//! minimum (`@>=a.b.c`), or a closed `min:max` interval; several entries
//! naming the same `(vendor, name)` must all hold simultaneously. This
//! module reduces any such set to a single `VersionRange` by repeated
//! pairwise `intersect`, which is associative and commutative by
//! construction (greatest-of-minimums, least-of-maximums):
//! `intersect(intersect(a,b),c) == intersect(a,intersect(b,c))`.
//!
//! A pack's `<requirements>` are a flat set of additional constraints, not
//! alternative version sets that can conflict and need backtracking, so
//! plain interval intersection already gives a deterministic, unique
//! answer without pulling in SAT machinery (see `resolver::pack_resolver`
//! for where the fixed-point closure over those requirements happens).

use semver::{Version, VersionReq};

use crate::core::model::PackConstraint;

/// A closed or half-open version interval, or "no constraint" when both
/// bounds are absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub min: Option<Version>,
    pub max: Option<Version>,
}

impl VersionRange {
    pub fn full() -> Self {
        VersionRange { min: None, max: None }
    }

    pub fn from_constraint(c: &PackConstraint) -> Self {
        if let Some(exact) = &c.exact {
            VersionRange {
                min: Some(exact.clone()),
                max: Some(exact.clone()),
            }
        } else {
            VersionRange {
                min: c.min.clone(),
                max: c.max.clone(),
            }
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!((&self.min, &self.max), (Some(a), Some(b)) if a == b)
    }

    pub fn is_bounded(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn contains(&self, v: &Version) -> bool {
        if let Some(min) = &self.min {
            if v < min {
                return false;
            }
        }
        if let Some(max) = &self.max {
            if v > max {
                return false;
            }
        }
        true
    }

    /// Intersect two ranges. `None` means the intersection is empty (the
    /// caller should report a version conflict).
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let min = match (&self.min, &other.min) {
            (Some(a), Some(b)) => Some(a.max(b).clone()),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };
        let max = match (&self.max, &other.max) {
            (Some(a), Some(b)) => Some(a.min(b).clone()),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };
        if let (Some(min), Some(max)) = (&min, &max) {
            if min > max {
                return None;
            }
        }
        Some(VersionRange { min, max })
    }
}

/// Intersect a whole slice of constraints for one `(vendor, name)` family.
/// Returns `None` if the set is empty, or if any pairwise intersection is
/// empty (a version conflict).
pub fn intersect_all(constraints: &[PackConstraint]) -> Option<VersionRange> {
    let mut iter = constraints.iter().map(VersionRange::from_constraint);
    let first = iter.next()?;
    iter.try_fold(first, |acc, next| acc.intersect(&next))
}

/// Whether a component selector's `@<VersionReq>` suffix matches a
/// catalog component's `Cversion` (plain semver matching, unrelated to the
/// pack `min:max` range form above).
pub fn component_version_matches(req: &VersionReq, version: &Version) -> bool {
    req.matches(version)
}

/// Parse a version string, allowing a bare major or major.minor (packs and
/// components both write `5.6` for `5.6.0` in places).
pub fn parse_version_lenient(s: &str) -> Option<Version> {
    if let Ok(v) = s.parse() {
        return Some(v);
    }
    let parts: Vec<&str> = s.split('.').collect();
    match parts.len() {
        1 => Some(Version::new(parts[0].parse().ok()?, 0, 0)),
        2 => Some(Version::new(parts[0].parse().ok()?, parts[1].parse().ok()?, 0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(min: Option<(u64, u64, u64)>, max: Option<(u64, u64, u64)>) -> PackConstraint {
        PackConstraint {
            vendor: "ARM".into(),
            name: Some("CMSIS".into()),
            exact: None,
            min: min.map(|(a, b, c)| Version::new(a, b, c)),
            max: max.map(|(a, b, c)| Version::new(a, b, c)),
        }
    }

    #[test]
    fn intersection_narrows_to_tightest_bounds() {
        let a = VersionRange::from_constraint(&c(Some((5, 0, 0)), None));
        let b = VersionRange::from_constraint(&c(None, Some((5, 9, 0))));
        let merged = a.intersect(&b).unwrap();
        assert_eq!(merged.min, Some(Version::new(5, 0, 0)));
        assert_eq!(merged.max, Some(Version::new(5, 9, 0)));
    }

    #[test]
    fn disjoint_ranges_have_no_intersection() {
        let a = VersionRange::from_constraint(&c(None, Some((5, 0, 0))));
        let b = VersionRange::from_constraint(&c(Some((6, 0, 0)), None));
        assert!(a.intersect(&b).is_none());
    }

    #[test]
    fn intersection_is_associative() {
        let a = VersionRange::from_constraint(&c(Some((5, 0, 0)), None));
        let b = VersionRange::from_constraint(&c(None, Some((6, 0, 0))));
        let d = VersionRange::from_constraint(&c(Some((5, 5, 0)), None));

        let left = a.intersect(&b).unwrap().intersect(&d).unwrap();
        let right = a.intersect(&b.intersect(&d).unwrap()).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn intersect_all_folds_every_constraint_in_the_family() {
        let constraints = vec![
            c(Some((5, 0, 0)), None),
            c(None, Some((5, 9, 0))),
            c(Some((5, 5, 0)), None),
        ];
        let range = intersect_all(&constraints).unwrap();
        assert_eq!(range.min, Some(Version::new(5, 5, 0)));
        assert_eq!(range.max, Some(Version::new(5, 9, 0)));
    }

    #[test]
    fn parse_lenient_fills_missing_components() {
        assert_eq!(parse_version_lenient("5"), Some(Version::new(5, 0, 0)));
        assert_eq!(parse_version_lenient("5.6"), Some(Version::new(5, 6, 0)));
    }
}
