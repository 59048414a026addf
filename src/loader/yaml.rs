//! YAML document loaders for `*.csolution.yml`, `*.cproject.yml`, and
//! `*.clayer.yml`.
//!
//! Each document wraps its payload under a single top-level key
//! (`solution:`, `project:`, `layer:`), so the wrapper structs here exist
//! only to peel that key off before handing the payload to `serde_yaml`,
//! which deserializes straight into the `core::model` types — those
//! already carry the `#[serde(rename = ..., default)]` annotations needed
//! to match the on-disk field names, so no separate `Raw*` staging type is
//! needed for this document family (contrast `loader::svd_xml`, whose XML
//! shape differs enough from `svd::model::SvdNode` to need one).

use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;

use crate::core::model::{Layer, Project, Solution};

#[derive(Debug, Deserialize)]
struct SolutionDocument {
    solution: Solution,
}

#[derive(Debug, Deserialize)]
struct ProjectDocument {
    project: Project,
}

#[derive(Debug, Deserialize)]
struct LayerDocument {
    layer: Layer,
}

pub fn load_solution(path: &Path) -> anyhow::Result<Solution> {
    let text = crate::util::fs::retry_read(path, 2, std::time::Duration::from_millis(20))?;
    let doc: SolutionDocument = serde_yaml::from_str(&text)
        .with_context(|| format!("failed to parse solution file: {}", path.display()))?;
    let mut solution = doc.solution;
    solution.path = path.to_path_buf();
    Ok(solution)
}

pub fn load_project(path: &Path) -> anyhow::Result<Project> {
    let text = crate::util::fs::retry_read(path, 2, std::time::Duration::from_millis(20))?;
    let doc: ProjectDocument = serde_yaml::from_str(&text)
        .with_context(|| format!("failed to parse project file: {}", path.display()))?;
    let mut project = doc.project;
    project.path = path.to_path_buf();
    Ok(project)
}

pub fn load_layer(path: &Path) -> anyhow::Result<Layer> {
    let text = crate::util::fs::retry_read(path, 2, std::time::Duration::from_millis(20))?;
    let doc: LayerDocument = serde_yaml::from_str(&text)
        .with_context(|| format!("failed to parse layer file: {}", path.display()))?;
    let mut layer = doc.layer;
    layer.path = path.to_path_buf();
    Ok(layer)
}

/// Discover the single `*.csolution.yml` file in `dir`, per the "run from
/// the solution directory" convention.
pub fn find_solution_file(dir: &Path) -> anyhow::Result<std::path::PathBuf> {
    let mut candidates: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".csolution.yml") || n.ends_with(".csolution.yaml"))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();

    match candidates.len() {
        0 => anyhow::bail!(
            "no *.csolution.yml file found in {}\n{}",
            dir.display(),
            crate::util::diagnostic::suggestions::NO_SOLUTION
        ),
        1 => Ok(candidates.remove(0)),
        _ => anyhow::bail!(
            "multiple *.csolution.yml files found in {}; pass --solution explicitly",
            dir.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_minimal_solution_document() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("demo.csolution.yml");
        std::fs::write(
            &path,
            r#"
solution:
  name: demo
  path: demo.csolution.yml
  projects:
    - name: app
      path: app.cproject.yml
  build-types:
    - type: Debug
      optimize: none
  target-types:
    - type: Board
      device: ARM::STM32F103RB
"#,
        )
        .unwrap();

        let solution = load_solution(&path).unwrap();
        assert_eq!(solution.name, "demo");
        assert_eq!(solution.projects.len(), 1);
        assert_eq!(solution.build_types.len(), 1);
        assert_eq!(solution.target_types[0].device.as_deref(), Some("ARM::STM32F103RB"));
    }

    #[test]
    fn find_solution_file_errors_when_absent() {
        let tmp = TempDir::new().unwrap();
        let err = find_solution_file(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("no *.csolution.yml"));
    }
}
