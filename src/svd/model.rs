//! Arena-based SVD device tree.
//!
//! Every node lives in one `Vec<SvdNode>` inside `Device`; cross-references
//! (`derivedFrom`, dimension-expansion siblings, the parent link used for
//! effective-property lookup) are `NodeId` indices rather than borrowed
//! references. Stable indices are what let `svd::derive` deep-copy a
//! subtree and `svd::dimension` expand one without aliasing the arena
//! while it mutates it.

use std::collections::BTreeMap;

use crate::util::Location;

/// An index into `Device::nodes`. `NodeId(u32::MAX)` is never issued and is
/// used internally to mean "no parent" for the device root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

pub const NO_PARENT: NodeId = NodeId(u32::MAX);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Device,
    Peripheral,
    Cluster,
    Register,
    Field,
    EnumeratedValue,
}

/// Register/field access qualifier, used by the field-overlap checker to
/// decide whether two fields are allowed to share bits (one read-only, the
/// other write-only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    ReadWrite,
    ReadOnly,
    WriteOnly,
    WriteOnce,
    ReadWriteOnce,
}

/// Properties that bubble down from an ancestor when a node doesn't set
/// them itself (`svd::effective`).
#[derive(Debug, Clone, Default)]
pub struct InheritableProps {
    pub size: Option<u32>,
    pub access: Option<Access>,
    pub reset_value: Option<u64>,
    pub reset_mask: Option<u64>,
    pub protection: Option<String>,
}

/// A dimension declaration (`dim`/`dimIncrement`/`dimIndex`/`dimName`/
/// `dimArrayIndex`), present on peripherals, clusters, registers, and
/// (extend-only) fields.
#[derive(Debug, Clone, Default)]
pub struct DimensionSpec {
    pub dim: Option<u32>,
    pub dim_increment: Option<u64>,
    pub dim_index: Option<String>,
    pub dim_name: Option<String>,
    pub dim_array_index: Option<Vec<String>>,
}

/// One arena entry. Fields not meaningful for a given `kind` stay at their
/// default value rather than being modeled as a separate struct per kind —
/// a single tagged node type for the whole device/peripheral/register/field
/// hierarchy.
#[derive(Debug, Clone)]
pub struct SvdNode {
    pub kind: NodeKind,
    pub parent: NodeId,
    pub children: Vec<NodeId>,

    pub name: String,
    pub description: Option<String>,
    pub derived_from: Option<String>,

    /// `<alternatePeripheral>`: names another peripheral this one is
    /// explicitly known to share an address range with. Exempts the pair
    /// from the cross-peripheral overlap check.
    pub alternate_peripheral: Option<String>,
    /// `<alternateRegister>`/`<alternateGroup>`: names another
    /// register/cluster (or a group) this one is explicitly known to share
    /// an offset with. Exempts the pair from the within-peripheral overlap
    /// check.
    pub alternate_register: Option<String>,
    pub alternate_group: Option<String>,

    pub base_address: Option<u64>,
    pub address_offset: Option<u64>,
    pub bit_offset: Option<u32>,
    pub bit_width: Option<u32>,

    pub value: Option<u64>,
    pub is_default: bool,

    pub dim: DimensionSpec,
    pub props: InheritableProps,

    /// `<disableCondition>` raw expression text, lexed/parsed/linked by
    /// `svd::disable_condition` after dimension expansion.
    pub disable_condition: Option<String>,
    pub disable_condition_tokens: Option<Vec<crate::svd::disable_condition::LinkedToken>>,

    pub location: Location,
    pub invalid: bool,
}

impl SvdNode {
    fn new(kind: NodeKind, name: impl Into<String>, parent: NodeId, location: Location) -> Self {
        SvdNode {
            kind,
            parent,
            children: Vec::new(),
            name: name.into(),
            description: None,
            derived_from: None,
            alternate_peripheral: None,
            alternate_register: None,
            alternate_group: None,
            base_address: None,
            address_offset: None,
            bit_offset: None,
            bit_width: None,
            value: None,
            is_default: false,
            dim: DimensionSpec::default(),
            props: InheritableProps::default(),
            disable_condition: None,
            disable_condition_tokens: None,
            location,
            invalid: false,
        }
    }
}

/// A device tree: the arena plus the root node id.
#[derive(Debug, Clone)]
pub struct Device {
    pub nodes: Vec<SvdNode>,
    pub root: NodeId,
    /// name -> NodeId, scoped by parent, for `derivedFrom` sibling lookup.
    pub name_index: BTreeMap<(NodeId, String), NodeId>,
    /// `<addressUnitBits>`, declared once on the device root (SVD schema
    /// default 8 when absent). Register/cluster dimension offsets step by
    /// `dimIncrement * addressUnitBits / 8`; peripheral base addresses
    /// always step by the raw `dimIncrement` regardless of this value.
    pub address_unit_bits: u32,
}

impl Device {
    pub fn new(name: &str, location: Location) -> Self {
        let mut nodes = Vec::new();
        nodes.push(SvdNode::new(NodeKind::Device, name, NO_PARENT, location));
        Device {
            nodes,
            root: NodeId(0),
            name_index: BTreeMap::new(),
            address_unit_bits: 8,
        }
    }

    pub fn get(&self, id: NodeId) -> &SvdNode {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut SvdNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Append a new child node under `parent`, returning its id.
    pub fn push_child(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: impl Into<String>,
        location: Location,
    ) -> NodeId {
        let name = name.into();
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(SvdNode::new(kind, name.clone(), parent, location));
        if parent != NO_PARENT {
            self.get_mut(parent).children.push(id);
        }
        self.name_index.insert((parent, name), id);
        id
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        &self.get(id).children
    }

    /// Look up a sibling (or ancestor-scope sibling) by dotted path, as
    /// `derivedFrom` references do — searched starting at `scope`, then
    /// each ancestor of `scope`, outward, nearest-enclosing-scope first.
    pub fn resolve_path(&self, scope: NodeId, path: &str) -> Option<NodeId> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut search_scope = scope;
        loop {
            if let Some(found) = self.resolve_from(search_scope, &segments) {
                return Some(found);
            }
            let parent = self.get(search_scope).parent;
            if parent == NO_PARENT {
                return None;
            }
            search_scope = parent;
        }
    }

    fn resolve_from(&self, scope: NodeId, segments: &[&str]) -> Option<NodeId> {
        let mut current_parent = self.get(scope).parent;
        let mut current = scope;
        for (i, seg) in segments.iter().enumerate() {
            let parent_for_lookup = if i == 0 { current_parent } else { current };
            current = *self.name_index.get(&(parent_for_lookup, seg.to_string()))?;
            current_parent = current;
        }
        Some(current)
    }

    pub fn iter_subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.get(id).children.iter().rev());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_child_links_parent_and_index() {
        let mut device = Device::new("STM32F1", Location::none());
        let periph = device.push_child(device.root, NodeKind::Peripheral, "GPIOA", Location::none());
        let reg = device.push_child(periph, NodeKind::Register, "CRL", Location::none());

        assert_eq!(device.children_of(device.root), &[periph]);
        assert_eq!(device.children_of(periph), &[reg]);
        assert_eq!(device.get(reg).parent, periph);
    }

    #[test]
    fn resolve_path_finds_sibling_by_name() {
        let mut device = Device::new("STM32F1", Location::none());
        let periph_a = device.push_child(device.root, NodeKind::Peripheral, "GPIOA", Location::none());
        let _periph_b = device.push_child(device.root, NodeKind::Peripheral, "GPIOB", Location::none());

        let found = device.resolve_path(periph_a, "GPIOB");
        assert_eq!(found, Some(_periph_b));
    }

    #[test]
    fn resolve_path_follows_dotted_register_field_path() {
        let mut device = Device::new("STM32F1", Location::none());
        let periph = device.push_child(device.root, NodeKind::Peripheral, "GPIOA", Location::none());
        let reg = device.push_child(periph, NodeKind::Register, "CRL", Location::none());
        let field = device.push_child(reg, NodeKind::Field, "MODE0", Location::none());

        let found = device.resolve_path(periph, "CRL.MODE0");
        assert_eq!(found, Some(field));
    }

    #[test]
    fn iter_subtree_visits_all_descendants() {
        let mut device = Device::new("STM32F1", Location::none());
        let periph = device.push_child(device.root, NodeKind::Peripheral, "GPIOA", Location::none());
        let reg = device.push_child(periph, NodeKind::Register, "CRL", Location::none());
        let _field = device.push_child(reg, NodeKind::Field, "MODE0", Location::none());

        let subtree = device.iter_subtree(periph);
        assert_eq!(subtree.len(), 3);
    }
}
