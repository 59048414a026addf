//! PDSC (pack description) loader.
//!
//! Reads a `<vendor>.<name>.pdsc` file into a `PdscPackage`: the pack's own
//! identity/version history, its `<requirements>` on other packs, the flat
//! component catalog (`<components>/<component>`), and the condition
//! catalog (`<conditions>/<condition>`) that `components::condition`
//! evaluates against, following the CMSIS-Pack PDSC schema's
//! component/condition attribute set. `quick_xml` plus the shared
//! `loader::xml::parse_tree` tree walker does the actual parsing, same as
//! `loader::svd_xml`.

use std::path::{Path, PathBuf};

use semver::{Version, VersionReq};

use crate::core::component_id::ComponentAttributes;
use crate::core::model::PackConstraint;
use crate::loader::xml::parse_tree;

#[derive(Debug, Clone)]
pub struct PdscPackage {
    pub vendor: String,
    pub name: String,
    pub versions: Vec<Version>,
    pub requirements: Vec<PackConstraint>,
    pub components: Vec<ComponentEntry>,
    pub conditions: Vec<ConditionDef>,
    pub apis: Vec<ApiEntry>,
}

#[derive(Debug, Clone)]
pub struct ComponentEntry {
    pub attributes: ComponentAttributes,
    pub condition: Option<String>,
    pub files: Vec<PathBuf>,
    pub is_default_variant: bool,
    /// `instances="N"` expands this catalog entry into N logical
    /// components numbered `0..N-1` at selection time.
    pub instances: u32,
    /// A bound generator id, if this component's files are produced by a
    /// code generator rather than shipped verbatim in the pack.
    pub generator: Option<String>,
    /// Instantiated unconditionally once its condition (if any) passes,
    /// without needing to be named by a user selector.
    pub bootstrap: bool,
    /// `Capiversion="<VersionReq>"` binds this component to the API sharing
    /// its own `Cclass`/`Cgroup`, requiring the resolved API version to
    /// satisfy this range.
    pub api_version_req: Option<VersionReq>,
}

/// One `<apis>/<api>` entry: the API a component may bind to via matching
/// `Cclass`/`Cgroup`. Two components sharing an API must agree on a single
/// resolved `Cversion`.
#[derive(Debug, Clone)]
pub struct ApiEntry {
    pub cclass: String,
    pub cgroup: String,
    pub cversion: Version,
    pub exclusive: bool,
    pub files: Vec<PathBuf>,
}

/// One accept/require/deny rule inside a `<condition>` definition. `expr`
/// is the component-attribute expression text (e.g. `Cclass=CMSIS
/// Cgroup=CORE`); `kind` says how the solver treats a match.
#[derive(Debug, Clone)]
pub struct ConditionRule {
    pub kind: ConditionRuleKind,
    pub expr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionRuleKind {
    Accept,
    Require,
    Deny,
}

#[derive(Debug, Clone)]
pub struct ConditionDef {
    pub id: String,
    pub rules: Vec<ConditionRule>,
}

pub fn load_file(path: &Path) -> anyhow::Result<PdscPackage> {
    let text = crate::util::fs::read_to_string(path)?;
    load_str(&text)
}

pub fn load_str(text: &str) -> anyhow::Result<PdscPackage> {
    let root = parse_tree(text)?;

    let vendor = root.child("vendor").map(|e| e.text.trim().to_string()).unwrap_or_default();
    let name = root.child("name").map(|e| e.text.trim().to_string()).unwrap_or_default();

    let mut versions = Vec::new();
    if let Some(releases) = root.child("releases") {
        for release in releases.children_named("release") {
            if let Some(v) = release.attr("version").and_then(|v| normalize_version(v)) {
                versions.push(v);
            }
        }
    }
    versions.sort();

    let mut requirements = Vec::new();
    if let Some(reqs) = root.child("requirements") {
        if let Some(packages) = reqs.child("packages") {
            for pkg in packages.children_named("package") {
                let vendor = pkg.attr("vendor").unwrap_or_default().to_string();
                let pack_name = pkg.attr("name").map(str::to_string);
                let exact = pkg.attr("version").and_then(normalize_version);
                requirements.push(PackConstraint {
                    vendor,
                    name: pack_name,
                    exact,
                    min: None,
                    max: None,
                });
            }
        }
    }

    let mut conditions = Vec::new();
    if let Some(conds) = root.child("conditions") {
        for cond in conds.children_named("condition") {
            let id = cond.attr("id").unwrap_or_default().to_string();
            let mut rules = Vec::new();
            for rule in &cond.children {
                let kind = match rule.name.as_str() {
                    "accept" => ConditionRuleKind::Accept,
                    "require" => ConditionRuleKind::Require,
                    "deny" => ConditionRuleKind::Deny,
                    _ => continue,
                };
                let expr = rule
                    .attributes
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                rules.push(ConditionRule { kind, expr });
            }
            conditions.push(ConditionDef { id, rules });
        }
    }

    let mut components = Vec::new();
    if let Some(comps) = root.child("components") {
        for comp in comps.children_named("component") {
            components.push(parse_component(comp));
        }
        for bundle in comps.children_named("bundle") {
            let cbundle = bundle.attr("Cbundle").map(str::to_string);
            for comp in bundle.children_named("component") {
                let mut entry = parse_component(comp);
                if entry.attributes.cbundle.is_none() {
                    entry.attributes.cbundle = cbundle.clone();
                }
                components.push(entry);
            }
        }
    }

    let mut apis = Vec::new();
    if let Some(apis_elem) = root.child("apis") {
        for api in apis_elem.children_named("api") {
            let cversion = api.attr("Cversion").and_then(normalize_version).unwrap_or_else(|| Version::new(0, 0, 0));
            let mut files = Vec::new();
            if let Some(files_elem) = api.child("files") {
                for file in files_elem.children_named("file") {
                    if let Some(name) = file.attr("name") {
                        files.push(PathBuf::from(name));
                    }
                }
            }
            apis.push(ApiEntry {
                cclass: api.attr("Cclass").unwrap_or_default().to_string(),
                cgroup: api.attr("Cgroup").unwrap_or_default().to_string(),
                cversion,
                exclusive: api.attr("exclusive").map(|v| v == "1" || v == "true").unwrap_or(false),
                files,
            });
        }
    }

    Ok(PdscPackage {
        vendor,
        name,
        versions,
        requirements,
        components,
        conditions,
        apis,
    })
}

fn parse_component(elem: &crate::loader::xml::XmlElement) -> ComponentEntry {
    let cversion = elem
        .attr("Cversion")
        .and_then(normalize_version)
        .unwrap_or_else(|| Version::new(0, 0, 0));

    let attributes = ComponentAttributes {
        cvendor: elem.attr("Cvendor").map(str::to_string),
        cclass: elem.attr("Cclass").unwrap_or_default().to_string(),
        cbundle: elem.attr("Cbundle").map(str::to_string),
        cgroup: elem.attr("Cgroup").unwrap_or_default().to_string(),
        csub: elem.attr("Csub").map(str::to_string),
        cvariant: elem.attr("Cvariant").map(str::to_string),
        cversion,
    };

    let condition = elem.attr("condition").map(str::to_string);
    let is_default_variant = elem.attr("isDefaultVariant").map(|v| v == "true").unwrap_or(false);
    let instances = elem.attr("instances").and_then(|v| v.parse().ok()).unwrap_or(1);
    let generator = elem.attr("generator").map(str::to_string).or_else(|| {
        elem.child("generator").and_then(|g| g.attr("Cgenerator")).map(str::to_string)
    });
    let bootstrap = elem.attr("bootstrap").map(|v| v == "1" || v == "true").unwrap_or(false);
    let api_version_req = elem.attr("Capiversion").and_then(|v| VersionReq::parse(v).ok());

    let mut files = Vec::new();
    if let Some(files_elem) = elem.child("files") {
        for file in files_elem.children_named("file") {
            if let Some(name) = file.attr("name") {
                files.push(PathBuf::from(name));
            }
        }
    }

    ComponentEntry {
        attributes,
        condition,
        files,
        is_default_variant,
        instances,
        generator,
        bootstrap,
        api_version_req,
    }
}

fn normalize_version(text: &str) -> Option<Version> {
    let cleaned = text.trim();
    Version::parse(cleaned).ok().or_else(|| {
        let parts: Vec<&str> = cleaned.split('.').collect();
        match parts.len() {
            1 => Version::parse(&format!("{}.0.0", parts[0])).ok(),
            2 => Version::parse(&format!("{}.{}.0", parts[0], parts[1])).ok(),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
<package>
  <vendor>ARM</vendor>
  <name>CMSIS</name>
  <releases>
    <release version="5.9.0">current</release>
    <release version="5.8.0">previous</release>
  </releases>
  <conditions>
    <condition id="ARMv7-M Device">
      <accept Dcore="Cortex-M3"/>
      <accept Dcore="Cortex-M4"/>
    </condition>
  </conditions>
  <components>
    <component Cclass="CMSIS" Cgroup="CORE" Cversion="5.6.0" condition="ARMv7-M Device">
      <files>
        <file category="header" name="Include/core_cm4.h"/>
      </files>
    </component>
  </components>
</package>
"#;

    #[test]
    fn parses_pack_identity_and_releases() {
        let pkg = load_str(SAMPLE).unwrap();
        assert_eq!(pkg.vendor, "ARM");
        assert_eq!(pkg.name, "CMSIS");
        assert_eq!(pkg.versions, vec![Version::new(5, 8, 0), Version::new(5, 9, 0)]);
    }

    #[test]
    fn parses_component_with_condition_and_files() {
        let pkg = load_str(SAMPLE).unwrap();
        assert_eq!(pkg.components.len(), 1);
        let comp = &pkg.components[0];
        assert_eq!(comp.attributes.cclass, "CMSIS");
        assert_eq!(comp.attributes.cgroup, "CORE");
        assert_eq!(comp.condition.as_deref(), Some("ARMv7-M Device"));
        assert_eq!(comp.files, vec![PathBuf::from("Include/core_cm4.h")]);
    }

    #[test]
    fn parses_condition_accept_rules() {
        let pkg = load_str(SAMPLE).unwrap();
        assert_eq!(pkg.conditions.len(), 1);
        assert_eq!(pkg.conditions[0].rules.len(), 2);
        assert_eq!(pkg.conditions[0].rules[0].kind, ConditionRuleKind::Accept);
    }
}
