//! Context enumeration: the cartesian product of a solution's projects,
//! build types, and target types, filtered by each project's `for-context`/
//! `not-for-context` rules.
//!
//! A context name has the form `<project>.<build-type>+<target-type>`; any
//! of the three segments may be elided when the solution defines no build
//! types or no target types, producing `<project>` alone, `<project>.<build-type>`,
//! or `<project>+<target-type>`.
//!
//! `for-context`/`not-for-context` entries accept a bare name (matches any
//! one of the three segments), a dotted tuple (`project.build+target`, with
//! missing segments acting as wildcards), or a regex matched against the
//! full context string. This is distinct from the CLI's `-c` context
//! selector (`ops::pipeline::select_contexts`), which is a shell-style glob
//! over already-enumerated context names.

use regex::Regex;

use crate::core::{Context, ContextName, Solution};

/// Enumerate every context implied by `solution`, applying each project's
/// `for_context`/`not_for_context` filters.
pub fn enumerate_contexts(solution: &Solution) -> Vec<Context> {
    let mut out = Vec::new();

    for project in &solution.projects {
        let build_types: Vec<Option<&crate::core::BuildType>> = if solution.build_types.is_empty() {
            vec![None]
        } else {
            solution.build_types.iter().map(Some).collect()
        };
        let target_types: Vec<Option<&crate::core::model::TargetType>> = if solution.target_types.is_empty()
        {
            vec![None]
        } else {
            solution.target_types.iter().map(Some).collect()
        };

        for build_type in &build_types {
            for target_type in &target_types {
                let name = ContextName::new(
                    project.name.clone(),
                    build_type.map(|b| b.name.clone()).unwrap_or_default(),
                    target_type.map(|t| t.name.clone()).unwrap_or_default(),
                );

                if is_excluded(project, &name) || !is_included(project, &name) {
                    continue;
                }

                out.push(Context {
                    name,
                    project: project.clone(),
                    build_type: build_type.cloned(),
                    target_type: target_type.cloned(),
                });
            }
        }
    }

    out
}

/// A context is excluded when it matches any of the project's
/// `not_for_context` entries.
fn is_excluded(project: &crate::core::Project, name: &ContextName) -> bool {
    project
        .not_for_context
        .iter()
        .any(|pattern| matches_context_filter(pattern, name))
}

/// A context is included when `for_context` is empty (no restriction), or
/// it matches at least one of its entries.
fn is_included(project: &crate::core::Project, name: &ContextName) -> bool {
    project.for_context.is_empty()
        || project
            .for_context
            .iter()
            .any(|pattern| matches_context_filter(pattern, name))
}

fn matches_context_filter(pattern: &str, name: &ContextName) -> bool {
    if is_bare_name(pattern) {
        return pattern == name.project().as_str()
            || pattern == name.build_type().as_str()
            || pattern == name.target_type().as_str();
    }
    if is_dotted_tuple(pattern) {
        let parsed = ContextName::parse(pattern);
        return (parsed.project().is_empty() || parsed.project() == name.project())
            && (parsed.build_type().is_empty() || parsed.build_type() == name.build_type())
            && (parsed.target_type().is_empty() || parsed.target_type() == name.target_type());
    }
    match Regex::new(pattern) {
        Ok(re) => re.is_match(&name.to_string()),
        Err(_) => pattern == name.to_string(),
    }
}

fn is_bare_name(pattern: &str) -> bool {
    !pattern.is_empty()
        && !pattern.contains('.')
        && !pattern.contains('+')
        && pattern.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

fn is_dotted_tuple(pattern: &str) -> bool {
    !pattern.is_empty()
        && pattern
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == '+')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{BuildType, Project, TargetType};
    use std::path::PathBuf;

    fn solution_with(build_types: Vec<&str>, target_types: Vec<&str>, not_for: Vec<&str>) -> Solution {
        solution_with_filters(build_types, target_types, not_for, vec![])
    }

    fn solution_with_filters(
        build_types: Vec<&str>,
        target_types: Vec<&str>,
        not_for: Vec<&str>,
        for_context: Vec<&str>,
    ) -> Solution {
        Solution {
            name: "demo".to_string(),
            path: PathBuf::from("demo.csolution.yml"),
            projects: vec![Project {
                name: "app".to_string(),
                path: PathBuf::from("app.cproject.yml"),
                output: None,
                device: None,
                board: None,
                components: vec![],
                layers: vec![],
                packs: vec![],
                not_for_context: not_for.into_iter().map(String::from).collect(),
                for_context: for_context.into_iter().map(String::from).collect(),
            }],
            build_types: build_types
                .into_iter()
                .map(|t| BuildType {
                    name: t.to_string(),
                    optimize: None,
                    debug: None,
                    compiler: None,
                    warnings: None,
                    lto: None,
                    language_c: None,
                    language_cpp: None,
                    defines: vec![],
                    undefines: vec![],
                    add_include_paths: vec![],
                    misc: vec![],
                    processor: Default::default(),
                })
                .collect(),
            target_types: target_types
                .into_iter()
                .map(|t| TargetType {
                    name: t.to_string(),
                    board: None,
                    device: None,
                    packs: vec![],
                    processor: Default::default(),
                    target_sets: vec![],
                })
                .collect(),
            packs: vec![],
        }
    }

    #[test]
    fn cartesian_product_covers_every_build_target_pair() {
        let solution = solution_with(vec!["Debug", "Release"], vec!["Board"], vec![]);
        let contexts = enumerate_contexts(&solution);
        assert_eq!(contexts.len(), 2);
    }

    #[test]
    fn missing_build_or_target_types_still_produce_one_context() {
        let solution = solution_with(vec![], vec![], vec![]);
        let contexts = enumerate_contexts(&solution);
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].name.to_string(), "app");
    }

    #[test]
    fn not_for_context_bare_name_excludes_matching_contexts() {
        let solution = solution_with(vec!["Debug", "Release"], vec!["Board"], vec!["Release"]);
        let contexts = enumerate_contexts(&solution);
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].build_type.as_ref().unwrap().name, "Debug");
    }

    #[test]
    fn not_for_context_regex_excludes_matching_contexts() {
        let solution = solution_with(vec!["Debug", "Release"], vec!["Board"], vec![r"^app\.Release\+"]);
        let contexts = enumerate_contexts(&solution);
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].build_type.as_ref().unwrap().name, "Debug");
    }

    #[test]
    fn not_for_context_dotted_tuple_matches_partial_path() {
        let solution = solution_with(vec!["Debug", "Release"], vec!["Board"], vec!["app.Release"]);
        let contexts = enumerate_contexts(&solution);
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].build_type.as_ref().unwrap().name, "Debug");
    }

    #[test]
    fn for_context_restricts_to_matching_contexts_only() {
        let solution =
            solution_with_filters(vec!["Debug", "Release"], vec!["Board"], vec![], vec!["Debug"]);
        let contexts = enumerate_contexts(&solution);
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].build_type.as_ref().unwrap().name, "Debug");
    }
}
