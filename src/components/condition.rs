//! Condition evaluation: `require`/`accept`/`deny` rule trees evaluated
//! against the active device/board/toolchain environment.
//!
//! Evaluation is an ordered-precedence ladder of checks evaluated in a
//! fixed order, short-circuiting on the first disqualifying entry: `require`
//! (must all hold) -> `deny` (none may hold) -> `accept` (at least one must
//! hold, if any are present).
//!
//! The rule tree is a small tagged-variant shape: `Require(attrs) |
//! Accept(attrs) | Deny(attrs)`, each carrying either plain attribute
//! comparisons or a reference to another named condition (`condition=<Id>`),
//! evaluated by a pure function over an immutable environment map.

use std::collections::HashSet;

use crate::core::model::ActiveEnvironment;
use crate::loader::xml_pdsc::{ConditionDef, ConditionRule, ConditionRuleKind};

/// The result of evaluating one named condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionOutcome {
    Pass,
    /// Carries the reasons the condition failed, most specific first, for
    /// diagnostic reporting.
    Fail(Vec<String>),
}

impl ConditionOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, ConditionOutcome::Pass)
    }
}

/// Evaluate the condition named `condition_id` against `env`, looking up
/// nested `condition=` references in `table` and guarding against cycles.
pub fn evaluate(condition_id: &str, table: &[ConditionDef], env: &ActiveEnvironment) -> ConditionOutcome {
    let mut visiting = HashSet::new();
    evaluate_inner(condition_id, table, env, &mut visiting)
}

fn evaluate_inner(
    condition_id: &str,
    table: &[ConditionDef],
    env: &ActiveEnvironment,
    visiting: &mut HashSet<String>,
) -> ConditionOutcome {
    if !visiting.insert(condition_id.to_string()) {
        return ConditionOutcome::Fail(vec![format!(
            "condition '{condition_id}' is defined in terms of itself"
        )]);
    }

    let Some(def) = table.iter().find(|c| c.id == condition_id) else {
        visiting.remove(condition_id);
        return ConditionOutcome::Fail(vec![format!("condition '{condition_id}' is not defined")]);
    };

    let requires: Vec<&ConditionRule> = def
        .rules
        .iter()
        .filter(|r| r.kind == ConditionRuleKind::Require)
        .collect();
    let denies: Vec<&ConditionRule> = def
        .rules
        .iter()
        .filter(|r| r.kind == ConditionRuleKind::Deny)
        .collect();
    let accepts: Vec<&ConditionRule> = def
        .rules
        .iter()
        .filter(|r| r.kind == ConditionRuleKind::Accept)
        .collect();

    let mut reasons = Vec::new();

    for rule in &requires {
        if !rule_matches(rule, table, env, visiting) {
            reasons.push(format!("require '{}' did not hold", rule.expr));
        }
    }

    for rule in &denies {
        if rule_matches(rule, table, env, visiting) {
            reasons.push(format!("deny '{}' matched", rule.expr));
        }
    }

    if !accepts.is_empty() && !accepts.iter().any(|r| rule_matches(r, table, env, visiting)) {
        reasons.push(format!(
            "none of {} accept alternatives matched",
            accepts.len()
        ));
    }

    visiting.remove(condition_id);

    if reasons.is_empty() {
        ConditionOutcome::Pass
    } else {
        ConditionOutcome::Fail(reasons)
    }
}

/// A rule matches when every `key=value` token in its expression matches
/// the environment (a `condition=<Id>` token recurses into another named
/// condition instead of a plain attribute comparison).
fn rule_matches(
    rule: &ConditionRule,
    table: &[ConditionDef],
    env: &ActiveEnvironment,
    visiting: &mut HashSet<String>,
) -> bool {
    rule.expr
        .split_whitespace()
        .all(|token| token_matches(token, table, env, visiting))
}

fn token_matches(
    token: &str,
    table: &[ConditionDef],
    env: &ActiveEnvironment,
    visiting: &mut HashSet<String>,
) -> bool {
    let Some((key, value)) = token.split_once('=') else {
        return true;
    };

    if key == "condition" {
        return evaluate_inner(value, table, env, visiting).is_pass();
    }

    match env.get(key) {
        Some(actual) => attribute_matches(key, actual, value),
        None => false,
    }
}

/// `Cversion`/`Tcompiler` attributes compare by range (`>=a.b.c`,
/// `a.b.c:d.e.f`); every other attribute compares by plain string equality.
fn attribute_matches(key: &str, actual: &str, expected: &str) -> bool {
    if key == "Cversion" || key == "Tcompiler-version" {
        return version_in_range(actual, expected);
    }
    actual == expected
}

fn version_in_range(actual: &str, expected: &str) -> bool {
    let Ok(actual_version) = semver::Version::parse(actual) else {
        return actual == expected;
    };
    if let Some(rest) = expected.strip_prefix(">=") {
        return semver::Version::parse(rest)
            .map(|min| actual_version >= min)
            .unwrap_or(false);
    }
    if let Some((min, max)) = expected.split_once(':') {
        let min = semver::Version::parse(min);
        let max = semver::Version::parse(max);
        return match (min, max) {
            (Ok(min), Ok(max)) => actual_version >= min && actual_version <= max,
            _ => false,
        };
    }
    semver::Version::parse(expected)
        .map(|exact| actual_version == exact)
        .unwrap_or_else(|_| actual == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> ActiveEnvironment {
        let mut env = ActiveEnvironment::default();
        for (k, v) in pairs {
            env.set(*k, *v);
        }
        env
    }

    fn table() -> Vec<ConditionDef> {
        vec![
            ConditionDef {
                id: "ARMv7-M Device".into(),
                rules: vec![
                    ConditionRule { kind: ConditionRuleKind::Accept, expr: "Dcore=Cortex-M3".into() },
                    ConditionRule { kind: ConditionRuleKind::Accept, expr: "Dcore=Cortex-M4".into() },
                ],
            },
            ConditionDef {
                id: "RTOS2 + M4".into(),
                rules: vec![
                    ConditionRule { kind: ConditionRuleKind::Require, expr: "condition=ARMv7-M Device".into() },
                    ConditionRule { kind: ConditionRuleKind::Deny, expr: "Dsecure=Secure".into() },
                ],
            },
        ]
    }

    #[test]
    fn accept_passes_when_one_sibling_matches() {
        let outcome = evaluate("ARMv7-M Device", &table(), &env(&[("Dcore", "Cortex-M4")]));
        assert_eq!(outcome, ConditionOutcome::Pass);
    }

    #[test]
    fn accept_fails_when_no_sibling_matches() {
        let outcome = evaluate("ARMv7-M Device", &table(), &env(&[("Dcore", "Cortex-M0")]));
        assert!(!outcome.is_pass());
    }

    #[test]
    fn require_recurses_into_nested_condition() {
        let outcome = evaluate("RTOS2 + M4", &table(), &env(&[("Dcore", "Cortex-M4")]));
        assert_eq!(outcome, ConditionOutcome::Pass);
    }

    #[test]
    fn deny_matching_environment_fails_the_condition() {
        let outcome = evaluate(
            "RTOS2 + M4",
            &table(),
            &env(&[("Dcore", "Cortex-M4"), ("Dsecure", "Secure")]),
        );
        assert!(!outcome.is_pass());
    }

    #[test]
    fn cversion_attribute_compares_by_minimum_range() {
        let table = vec![ConditionDef {
            id: "Needs5.6".into(),
            rules: vec![ConditionRule {
                kind: ConditionRuleKind::Require,
                expr: "Cversion=>=5.6.0".into(),
            }],
        }];
        assert!(evaluate("Needs5.6", &table, &env(&[("Cversion", "5.9.0")])).is_pass());
        assert!(!evaluate("Needs5.6", &table, &env(&[("Cversion", "5.0.0")])).is_pass());
    }

    #[test]
    fn undefined_condition_reference_fails_rather_than_panics() {
        let outcome = evaluate("does-not-exist", &table(), &env(&[]));
        assert!(!outcome.is_pass());
    }

    #[test]
    fn self_referential_condition_fails_instead_of_recursing_forever() {
        let table = vec![ConditionDef {
            id: "Cyclic".into(),
            rules: vec![ConditionRule { kind: ConditionRuleKind::Require, expr: "condition=Cyclic".into() }],
        }];
        let outcome = evaluate("Cyclic", &table, &env(&[]));
        assert!(!outcome.is_pass());
    }

    #[test]
    fn adding_a_matching_deny_cannot_turn_a_failing_condition_into_a_passing_one() {
        // Property test S6 (condition monotonicity): start from a failing
        // condition and add a deny that also matches; it must still fail.
        let base = vec![ConditionDef {
            id: "NeedsM4".into(),
            rules: vec![ConditionRule { kind: ConditionRuleKind::Require, expr: "Dcore=Cortex-M4".into() }],
        }];
        let env = env(&[("Dcore", "Cortex-M0")]);
        assert!(!evaluate("NeedsM4", &base, &env).is_pass());

        let mut with_deny = base.clone();
        with_deny[0].rules.push(ConditionRule {
            kind: ConditionRuleKind::Deny,
            expr: "Dsecure=Secure".into(),
        });
        assert!(!evaluate("NeedsM4", &with_deny, &env).is_pass());
    }
}
