//! The normalized in-memory data model: Solution, Project, Layer,
//! BuildType, TargetType, Context, Pack reference, Component selector,
//! Condition reference, and Connection (provides/consumes) declarations.
//!
//! These types are the converted (non-`Raw`) form produced by `loader::yaml`
//! — see that module for the raw-document shape they are built from.

use std::collections::BTreeMap;
use std::path::PathBuf;

use semver::VersionReq;
use serde::{Deserialize, Serialize};

use crate::core::component_id::ComponentAttributes;
use crate::util::InternedString;

/// A version constraint on a pack, as written in a `packs:` entry.
///
/// `exact` pins one version; `min`/`max` bound an inclusive range; both may
/// be absent, meaning "any installed version of this pack".
///
/// On the wire this is a `{ pack: "Vendor::Name@constraint" }` mapping, not
/// a struct of its own fields, so `Serialize`/`Deserialize` are implemented
/// by hand in terms of `parse`/`Display` rather than derived.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackConstraint {
    pub vendor: String,
    pub name: Option<String>,
    pub exact: Option<semver::Version>,
    pub min: Option<semver::Version>,
    pub max: Option<semver::Version>,
}

impl PackConstraint {
    /// Parse `Vendor::Name@1.2.3`, `Vendor::Name@>=1.2.3`,
    /// `Vendor::Name@1.0.0:2.0.0`, or a bare `Vendor::Name`.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let (head, version_part) = match s.split_once('@') {
            Some((h, v)) => (h, Some(v)),
            None => (s, None),
        };
        let (vendor, name) = match head.split_once("::") {
            Some((v, n)) => (v.to_string(), Some(n.to_string())),
            None => (head.to_string(), None),
        };

        let mut constraint = PackConstraint {
            vendor,
            name,
            ..Default::default()
        };

        if let Some(v) = version_part {
            if let Some((min, max)) = v.split_once(':') {
                constraint.min = Some(min.parse()?);
                constraint.max = Some(max.parse()?);
            } else if let Some(rest) = v.strip_prefix(">=") {
                constraint.min = Some(rest.parse()?);
            } else {
                constraint.exact = Some(v.parse()?);
            }
        }

        Ok(constraint)
    }

    pub fn matches(&self, version: &semver::Version) -> bool {
        if let Some(exact) = &self.exact {
            return version == exact;
        }
        if let Some(min) = &self.min {
            if version < min {
                return false;
            }
        }
        if let Some(max) = &self.max {
            if version > max {
                return false;
            }
        }
        true
    }
}

impl std::fmt::Display for PackConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.vendor)?;
        if let Some(name) = &self.name {
            write!(f, "::{name}")?;
        }
        if let Some(exact) = &self.exact {
            write!(f, "@{exact}")?;
        } else {
            match (&self.min, &self.max) {
                (Some(min), Some(max)) => write!(f, "@{min}:{max}")?,
                (Some(min), None) => write!(f, "@>={min}")?,
                (None, Some(max)) => write!(f, "@:{max}")?,
                (None, None) => {}
            }
        }
        Ok(())
    }
}

impl Serialize for PackConstraint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut out = serializer.serialize_struct("PackConstraint", 1)?;
        out.serialize_field("pack", &self.to_string())?;
        out.end()
    }
}

impl<'de> Deserialize<'de> for PackConstraint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            pack: String,
        }
        let raw = Raw::deserialize(deserializer)?;
        PackConstraint::parse(&raw.pack).map_err(serde::de::Error::custom)
    }
}

/// Pack loading policy, selected per-context or solution-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackLoadingPolicy {
    /// Use the newest installed version satisfying constraints (default).
    #[default]
    Default,
    /// Always use the single newest installed version regardless of
    /// constraints from other contexts.
    Latest,
    /// Load every installed version that satisfies some constraint.
    All,
    /// Only the exact versions named by `packs:` entries; error if any
    /// entry has no exact version pinned.
    Required,
}

/// A component selector as written under a project's `components:` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSelector {
    /// Raw selector text, e.g. `ARM::CMSIS:CORE@5.6.0` or `Device:Startup`.
    #[serde(rename = "component")]
    pub selector: String,
    #[serde(default)]
    pub condition: Option<String>,
}

impl ComponentSelector {
    /// Split the selector text into attribute components. Absent optional
    /// attributes (Cvendor/Cbundle/Csub/Cvariant) come back as `None`;
    /// an absent Cversion comes back as `None` (meaning "any").
    pub fn parse_attributes(&self) -> anyhow::Result<(ComponentAttributes, Option<VersionReq>)> {
        let (head, version_req) = match self.selector.split_once('@') {
            Some((h, v)) => (h, Some(VersionReq::parse(v)?)),
            None => (self.selector.as_str(), None),
        };
        let (head, cvariant) = split_amp_suffix(head);
        let (head, csub) = split_colon_suffix(head);
        let (head, cgroup) = split_colon_suffix(head);
        let cgroup = cgroup.ok_or_else(|| {
            anyhow::anyhow!("component selector `{}` is missing a Cgroup", self.selector)
        })?;
        let (cvendor, cclass_and_bundle) = match head.split_once("::") {
            Some((v, rest)) => (Some(v.to_string()), rest),
            None => (None, head),
        };
        let (cclass, cbundle) = split_amp_suffix(cclass_and_bundle);
        let cclass = cclass.ok_or_else(|| {
            anyhow::anyhow!("component selector `{}` is missing a Cclass", self.selector)
        })?;

        Ok((
            ComponentAttributes {
                cvendor,
                cclass,
                cbundle,
                cgroup,
                csub,
                cvariant,
                cversion: semver::Version::new(0, 0, 0),
            },
            version_req,
        ))
    }
}

fn split_colon_suffix(s: &str) -> (String, Option<String>) {
    match s.rsplit_once(':') {
        Some((head, tail)) => (head.to_string(), Some(tail.to_string())),
        None => (s.to_string(), None),
    }
}

fn split_amp_suffix(s: &str) -> (Option<String>, Option<String>) {
    match s.rsplit_once('&') {
        Some((head, tail)) => (Some(head.to_string()), Some(tail.to_string())),
        None => (Some(s.to_string()), None),
    }
}

/// A layer reference inside a project or solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRef {
    pub path: PathBuf,
    #[serde(rename = "for-type", default)]
    pub for_type: Option<String>,
    #[serde(rename = "not-for-type", default)]
    pub not_for_type: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

/// A single `provides:`/`consumes:` entry: a key with an optional value.
/// Two entries satisfy each other when the keys match and either side
/// has no value (wildcard) or both values are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl ConnectionEntry {
    pub fn satisfies(&self, consumer: &ConnectionEntry) -> bool {
        if self.key != consumer.key {
            return false;
        }
        match (&self.value, &consumer.value) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

/// A named `connections:` block inside a layer, grouping a set of
/// provides/consumes entries that must all be satisfied together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSet {
    pub connect: String,
    #[serde(default)]
    pub provides: Vec<ConnectionEntry>,
    #[serde(default)]
    pub consumes: Vec<ConnectionEntry>,
}

/// A reusable layer fragment: a set of components plus a connection
/// contract describing what it provides and what it still needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub path: PathBuf,
    /// The identifier a consuming project names in a `for-type` filter.
    /// Distinct from `name`: many layer files can share
    /// one `type`, which is exactly what gives the connection resolver a
    /// choice of candidates for a slot.
    #[serde(rename = "type", default)]
    pub layer_type: String,
    #[serde(rename = "for-board", default)]
    pub for_board: Option<String>,
    #[serde(rename = "for-device", default)]
    pub for_device: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentSelector>,
    #[serde(default)]
    pub connections: Vec<ConnectionSet>,
    #[serde(default)]
    pub packs: Vec<PackConstraint>,
}

/// The processor attributes §3 lists for build-types and target-types:
/// fpu/dsp/mve presence, byte order, TrustZone mode, and branch-protection
/// scheme. Each is free-form text matched verbatim by condition evaluation
/// (`Dfpu`, `Ddsp`, `Dmve`, `Dendian`, `Dtz`, `DbranchProt`), not parsed
/// into an enum, since the pack catalog itself treats them as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorAttributes {
    #[serde(default)]
    pub fpu: Option<String>,
    #[serde(default)]
    pub dsp: Option<String>,
    #[serde(default)]
    pub mve: Option<String>,
    #[serde(default)]
    pub endian: Option<String>,
    #[serde(default)]
    pub trustzone: Option<String>,
    #[serde(rename = "branch-protection", default)]
    pub branch_protection: Option<String>,
}

/// A build type: a named set of compiler/optimization overrides. Only the
/// name and the free-form `misc`/`define`/`optimize` overlays the resolver
/// must be aware of are modeled here; backend-specific fields pass through
/// as opaque YAML values at the loader boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildType {
    #[serde(rename = "type")]
    pub name: String,
    #[serde(default)]
    pub optimize: Option<String>,
    #[serde(default)]
    pub debug: Option<String>,
    /// `Name@Version`, e.g. `GCC@12.2.0` — split into `Tcompiler`/
    /// `Tcompiler-version` for condition evaluation.
    #[serde(default)]
    pub compiler: Option<String>,
    #[serde(default)]
    pub warnings: Option<String>,
    #[serde(default)]
    pub lto: Option<bool>,
    #[serde(rename = "languageC", default)]
    pub language_c: Option<String>,
    #[serde(rename = "languageCpp", default)]
    pub language_cpp: Option<String>,
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub undefines: Vec<String>,
    #[serde(rename = "add-path", default)]
    pub add_include_paths: Vec<String>,
    #[serde(default)]
    pub misc: Vec<String>,
    #[serde(default)]
    pub processor: ProcessorAttributes,
}

impl BuildType {
    /// Split `compiler: "GCC@12.2.0"` into `(Tcompiler, Tcompiler-version)`.
    pub fn compiler_name_version(&self) -> (Option<&str>, Option<&str>) {
        match &self.compiler {
            None => (None, None),
            Some(c) => match c.split_once('@') {
                Some((name, version)) => (Some(name), Some(version)),
                None => (Some(c.as_str()), None),
            },
        }
    }
}

/// A target type: a named device/board selection plus its packs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetType {
    #[serde(rename = "type")]
    pub name: String,
    #[serde(default)]
    pub board: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub packs: Vec<PackConstraint>,
    #[serde(default)]
    pub processor: ProcessorAttributes,
    /// Named groupings within this target-type, each selecting one or more
    /// firmware images plus debugger/telnet configuration; activated by
    /// `--active <target>@<set>`. Only the name is modeled here — the
    /// per-image debugger config is an external-collaborator concern
    /// (§6 persisted state, consumed by the build-plan emitter).
    #[serde(rename = "target-set", default)]
    pub target_sets: Vec<String>,
}

impl TargetType {
    /// Split `device: "Vendor::Dname"` into `(Dvendor, Dname)`.
    pub fn device_vendor_name(&self) -> (Option<&str>, Option<&str>) {
        split_vendor_name(self.device.as_deref())
    }

    /// Split `board: "Vendor::Bname@Brevision"` into
    /// `(Bvendor, Bname, Brevision)`.
    pub fn board_vendor_name_revision(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        split_board(self.board.as_deref())
    }
}

/// Split a `device:` value `"Vendor::Dname"` into `(Dvendor, Dname)`; a
/// value with no `::` separator is a bare device name with no vendor.
pub fn split_vendor_name(s: Option<&str>) -> (Option<&str>, Option<&str>) {
    match s {
        None => (None, None),
        Some(s) => match s.split_once("::") {
            Some((vendor, name)) => (Some(vendor), Some(name)),
            None => (None, Some(s)),
        },
    }
}

/// Split a `board:` value `"Vendor::Bname@Brevision"` into
/// `(Bvendor, Bname, Brevision)`.
pub fn split_board(s: Option<&str>) -> (Option<&str>, Option<&str>, Option<&str>) {
    let (head, revision) = match s {
        None => return (None, None, None),
        Some(b) => match b.split_once('@') {
            Some((h, r)) => (h, Some(r)),
            None => (b, None),
        },
    };
    let (vendor, name) = split_vendor_name(Some(head));
    (vendor, name, revision)
}

/// The output artifact set a project builds, e.g. `bin`+`elf`+`map` named
/// `MyApp`. Consumed by the build-plan emitter (external collaborator) and
/// by condition evaluation's `Coutput-type` attribute, which is the first
/// type in `types` (a project's primary output kind).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectOutput {
    #[serde(default)]
    pub base_name: Option<String>,
    #[serde(rename = "type", default)]
    pub types: Vec<String>,
}

impl ProjectOutput {
    pub fn primary_type(&self) -> Option<&str> {
        self.types.first().map(String::as_str)
    }
}

/// A project: one compiled output, selecting components and layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Project {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub output: Option<ProjectOutput>,
    /// Overrides the active target-type's device/board for this project
    /// only, e.g. a project that tests one variant of a multi-device
    /// target-type.
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub board: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentSelector>,
    #[serde(default)]
    pub layers: Vec<LayerRef>,
    #[serde(default)]
    pub packs: Vec<PackConstraint>,
    #[serde(default)]
    pub not_for_context: Vec<String>,
    /// Inclusion counterpart of `not_for_context`: when non-empty, a context
    /// must match at least one entry here (in addition to matching none of
    /// `not_for_context`) to be kept.
    #[serde(default)]
    pub for_context: Vec<String>,
}

/// The top-level solution: a set of projects sharing build/target types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Solution {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub build_types: Vec<BuildType>,
    #[serde(default)]
    pub target_types: Vec<TargetType>,
    #[serde(default)]
    pub packs: Vec<PackConstraint>,
}

/// One enumerated `<project>.<build-type>+<target-type>` context, after
/// expansion by `context_factory` but before pack/component resolution.
#[derive(Debug, Clone)]
pub struct Context {
    pub name: crate::core::ContextName,
    pub project: Project,
    pub build_type: Option<BuildType>,
    pub target_type: Option<TargetType>,
}

impl Context {
    /// Pack constraints visible to this context: solution-wide, then
    /// target-type, then project, in increasing specificity so later
    /// entries may narrow earlier ones during resolution.
    pub fn effective_pack_constraints(&self, solution: &Solution) -> Vec<PackConstraint> {
        let mut out = solution.packs.clone();
        if let Some(tt) = &self.target_type {
            out.extend(tt.packs.clone());
        }
        out.extend(self.project.packs.clone());
        out
    }
}

/// Device attributes read from a target-type's `device:` selector, used as
/// the active environment for condition evaluation.
#[derive(Debug, Clone, Default)]
pub struct ActiveEnvironment {
    pub attributes: BTreeMap<String, String>,
}

impl ActiveEnvironment {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }
}

pub type Attr = InternedString;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_constraint_parses_exact_version() {
        let c = PackConstraint::parse("ARM::CMSIS@5.9.0").unwrap();
        assert_eq!(c.vendor, "ARM");
        assert_eq!(c.name.as_deref(), Some("CMSIS"));
        assert_eq!(c.exact, Some(semver::Version::new(5, 9, 0)));
    }

    #[test]
    fn pack_constraint_parses_min_max_range() {
        let c = PackConstraint::parse("ARM::CMSIS@5.0.0:5.9.0").unwrap();
        assert_eq!(c.min, Some(semver::Version::new(5, 0, 0)));
        assert_eq!(c.max, Some(semver::Version::new(5, 9, 0)));
        assert!(c.matches(&semver::Version::new(5, 5, 0)));
        assert!(!c.matches(&semver::Version::new(6, 0, 0)));
    }

    #[test]
    fn pack_constraint_round_trips_through_yaml() {
        let c = PackConstraint::parse("ARM::CMSIS@>=5.8.0").unwrap();
        let yaml = serde_yaml::to_string(&c).unwrap();
        assert!(yaml.contains("pack: ARM::CMSIS@>=5.8.0"), "got: {yaml}");
        let back: PackConstraint = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn component_selector_parses_full_attribute_set() {
        let sel = ComponentSelector {
            selector: "ARM::CMSIS&Core:CORE:Cortex-M&Generic@5.6.0".to_string(),
            condition: None,
        };
        let (attrs, req) = sel.parse_attributes().unwrap();
        assert_eq!(attrs.cvendor.as_deref(), Some("ARM"));
        assert_eq!(attrs.cclass, "CMSIS");
        assert_eq!(attrs.cbundle.as_deref(), Some("Core"));
        assert_eq!(attrs.cgroup, "CORE");
        assert_eq!(attrs.csub.as_deref(), Some("Cortex-M"));
        assert_eq!(attrs.cvariant.as_deref(), Some("Generic"));
        assert!(req.is_some());
    }

    #[test]
    fn connection_entry_wildcard_matches_any_value() {
        let provided = ConnectionEntry {
            key: "CMSIS-RTOS2".into(),
            value: None,
        };
        let consumed = ConnectionEntry {
            key: "CMSIS-RTOS2".into(),
            value: Some("Keil RTX5".into()),
        };
        assert!(provided.satisfies(&consumed));
    }

    #[test]
    fn split_vendor_name_splits_on_double_colon() {
        assert_eq!(split_vendor_name(Some("ARM::Cortex-M4")), (Some("ARM"), Some("Cortex-M4")));
        assert_eq!(split_vendor_name(Some("Cortex-M4")), (None, Some("Cortex-M4")));
        assert_eq!(split_vendor_name(None), (None, None));
    }

    #[test]
    fn split_board_splits_vendor_name_and_revision() {
        assert_eq!(
            split_board(Some("Keil::MCB1800@2.0.0")),
            (Some("Keil"), Some("MCB1800"), Some("2.0.0"))
        );
        assert_eq!(split_board(Some("MCB1800")), (None, Some("MCB1800"), None));
    }

    #[test]
    fn build_type_compiler_name_version_splits_on_at() {
        let mut bt = BuildType {
            name: "Debug".into(),
            optimize: None,
            debug: None,
            compiler: Some("GCC@12.2.0".into()),
            warnings: None,
            lto: None,
            language_c: None,
            language_cpp: None,
            defines: vec![],
            undefines: vec![],
            add_include_paths: vec![],
            misc: vec![],
            processor: ProcessorAttributes::default(),
        };
        assert_eq!(bt.compiler_name_version(), (Some("GCC"), Some("12.2.0")));
        bt.compiler = Some("AC6".into());
        assert_eq!(bt.compiler_name_version(), (Some("AC6"), None));
        bt.compiler = None;
        assert_eq!(bt.compiler_name_version(), (None, None));
    }

    #[test]
    fn project_output_primary_type_is_first_declared_type() {
        let out = ProjectOutput { base_name: Some("app".into()), types: vec!["elf".into(), "hex".into()] };
        assert_eq!(out.primary_type(), Some("elf"));
        let empty = ProjectOutput { base_name: None, types: vec![] };
        assert_eq!(empty.primary_type(), None);
    }
}
