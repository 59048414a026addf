//! Dimension expansion (`dim`/`dimIncrement`/`dimIndex`/`dimName`/
//! `dimArrayIndex`).
//!
//! Generalizes `SvdDimension.cpp`'s per-level allowed-tag table and index
//! generation: a peripheral/cluster/register may expand into an array (one
//! sibling node per index). A peripheral's base address steps by the raw
//! `dimIncrement`; a register/cluster's address offset steps by
//! `dimIncrement * addressUnitBits / 8` since the increment is given in
//! address units, not bytes. A field may only use the "extend" form — a
//! single field whose bit offset steps by `dimIncrement` per index, never a
//! named array of sibling fields (mirrored by `allows_array_form` below).

use crate::svd::model::{Device, DimensionSpec, NodeId, NodeKind, NO_PARENT};
use crate::util::{DiagnosticContext, Location};

/// Which dim-related tags are legal at a given node kind, mirroring
/// `SvdDimension::m_allowedTagsDim`.
pub fn allowed_dim_tags(kind: NodeKind) -> &'static [&'static str] {
    match kind {
        NodeKind::Peripheral => &["dim", "dimIncrement", "dimArrayIndex"],
        NodeKind::Cluster => &["dim", "dimIncrement", "dimIndex", "dimName"],
        NodeKind::Register => &["dim", "dimIncrement", "dimIndex", "dimArrayIndex"],
        NodeKind::Field => &["dim", "dimIncrement", "dimIndex", "dimName"],
        NodeKind::Device | NodeKind::EnumeratedValue => &[],
    }
}

pub fn is_tag_allowed(kind: NodeKind, tag: &str) -> bool {
    allowed_dim_tags(kind).contains(&tag)
}

/// Only peripherals/clusters/registers may expand into an array of sibling
/// nodes; a field's `dim` only extends the field's own bit-range across
/// `dim` repetitions.
pub fn allows_array_form(kind: NodeKind) -> bool {
    matches!(kind, NodeKind::Peripheral | NodeKind::Cluster | NodeKind::Register)
}

/// One generated index suffix and the `%s`-substitution text derived from
/// it (the name insert position is always the single `%s` marker in the
/// base name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimIndexEntry {
    pub suffix: String,
    pub array_index_name: Option<String>,
}

/// Generate the list of index substitutions for a `dim`/`dimIndex` pair.
///
/// `dimIndex` supports three forms:
/// - a numeric range `0-3` -> `0,1,2,3`
/// - a comma list `A,B,C` -> `A,B,C`
/// - a character range `A-D` -> `A,B,C,D`
/// - absent -> `0..dim-1`
pub fn generate_indices(dim: u32, dim_index: Option<&str>) -> Vec<DimIndexEntry> {
    let suffixes = match dim_index {
        None => (0..dim).map(|i| i.to_string()).collect::<Vec<_>>(),
        Some(spec) if spec.contains(',') => {
            spec.split(',').map(|s| s.trim().to_string()).collect()
        }
        Some(spec) if spec.contains('-') => expand_range(spec),
        Some(spec) => vec![spec.to_string()],
    };

    suffixes
        .into_iter()
        .take(dim as usize)
        .map(|suffix| DimIndexEntry {
            suffix,
            array_index_name: None,
        })
        .collect()
}

fn expand_range(spec: &str) -> Vec<String> {
    let Some((start, end)) = spec.split_once('-') else {
        return vec![spec.to_string()];
    };
    if let (Ok(lo), Ok(hi)) = (start.parse::<u32>(), end.parse::<u32>()) {
        return (lo..=hi).map(|n| n.to_string()).collect();
    }
    if start.len() == 1 && end.len() == 1 {
        let lo = start.chars().next().unwrap() as u32;
        let hi = end.chars().next().unwrap() as u32;
        if lo <= hi {
            return (lo..=hi)
                .filter_map(char::from_u32)
                .map(|c| c.to_string())
                .collect();
        }
    }
    vec![spec.to_string()]
}

/// Substitute the `%s` marker in a dim-expanded name/description template.
pub fn substitute(template: &str, suffix: &str) -> String {
    template.replacen("%s", suffix, 1)
}

/// Report an out-of-place dim-related tag at load time, matching `M240`.
pub fn check_tag_allowed(
    diagnostics: &mut DiagnosticContext,
    kind: NodeKind,
    tag: &str,
    location: Location,
) -> bool {
    if is_tag_allowed(kind, tag) {
        true
    } else {
        diagnostics.error(
            "M240",
            &[("tag", tag)],
            location,
        );
        false
    }
}

/// Expand every `dim`-bearing node in `device` into its sibling instances,
/// in arena order so a cluster's own `dim` is expanded before its
/// dim-bearing children are visited (each expanded clone is walked again,
/// so a nested register's `dim` still gets its own pass).
///
/// Called between `derive::resolve_all` and `effective::resolve_all` per
/// `svd::mod`'s pass ordering: `derivedFrom` has already copied in whatever
/// structure the dim-bearing node inherited, and inheritable properties
/// haven't propagated yet, so there's nothing for this pass to disturb.
pub fn expand_all(device: &mut Device, diagnostics: &mut DiagnosticContext) {
    let root = device.root;
    expand_children(device, root, diagnostics);
}

fn expand_children(device: &mut Device, parent: NodeId, diagnostics: &mut DiagnosticContext) {
    let children = device.children_of(parent).to_vec();
    for child in children {
        expand_one(device, child, diagnostics);
    }
}

fn expand_one(device: &mut Device, id: NodeId, diagnostics: &mut DiagnosticContext) {
    let kind = device.get(id).kind;
    let Some(dim_count) = device.get(id).dim.dim else {
        expand_children(device, id, diagnostics);
        return;
    };

    if allows_array_form(kind) {
        expand_into_siblings(device, id, dim_count, diagnostics, StepTarget::Address);
    } else if kind == NodeKind::Field {
        expand_into_siblings(device, id, dim_count, diagnostics, StepTarget::BitOffset);
    } else {
        expand_children(device, id, diagnostics);
    }
}

/// Whether a generated sibling's stepped quantity is its base address /
/// address offset (peripheral, cluster, register) or its bit offset
/// (field's "extend" form — fields never get a second address space).
#[derive(Clone, Copy)]
enum StepTarget {
    Address,
    BitOffset,
}

/// Replace `id` with `dim_count` sibling clones of its subtree, named and
/// stepped per `generate_indices`/`target`, then mark `id` itself invalid
/// so later passes (which walk `device.nodes` directly rather than only
/// through `children_of`) skip the now-superseded template node.
fn expand_into_siblings(
    device: &mut Device,
    id: NodeId,
    dim_count: u32,
    diagnostics: &mut DiagnosticContext,
    target: StepTarget,
) {
    let node = device.get(id).clone();
    let parent = node.parent;
    let entries = generate_indices(dim_count, node.dim.dim_index.as_deref());
    if entries.is_empty() {
        diagnostics.error(
            "M240",
            &[("node", &node.name)],
            node.location.clone(),
        );
        return;
    }

    let increment = node.dim.dim_increment.unwrap_or(0);
    // Register/cluster offsets scale by addressUnitBits/8 (SVD schema: the
    // increment is given in address units, not bytes); a peripheral's own
    // base address always steps by the raw increment, which is already
    // byte-granular.
    let address_unit_bits = device.address_unit_bits.max(1) as u64;
    let offset_increment = increment.saturating_mul(address_unit_bits) / 8;
    let mut new_ids = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let new_name = expand_name(&node.name, &entry.suffix);
        let new_id = clone_subtree(device, id, parent);
        {
            let clone = device.get_mut(new_id);
            clone.name = new_name.clone();
            clone.description = clone.description.take().map(|d| substitute(&d, &entry.suffix));
            clone.dim = DimensionSpec::default();
            match target {
                StepTarget::Address => {
                    let index = index as u64;
                    if clone.base_address.is_some() {
                        let step = increment.saturating_mul(index);
                        clone.base_address = node.base_address.map(|b| b + step);
                    }
                    if clone.address_offset.is_some() {
                        let step = offset_increment.saturating_mul(index);
                        clone.address_offset = node.address_offset.map(|o| o + step);
                    }
                }
                StepTarget::BitOffset => {
                    let step = increment.saturating_mul(index as u64);
                    if let Some(offset) = node.bit_offset {
                        clone.bit_offset = Some(offset + step as u32);
                    }
                }
            }
        }
        device.name_index.insert((parent, new_name), new_id);
        new_ids.push(new_id);
    }

    remove_child(device, parent, id);
    device.get_mut(id).invalid = true;

    for new_id in new_ids {
        expand_children(device, new_id, diagnostics);
    }
}

fn expand_name(template: &str, suffix: &str) -> String {
    if template.contains("%s") {
        substitute(template, suffix)
    } else {
        format!("{template}{suffix}")
    }
}

fn remove_child(device: &mut Device, parent: NodeId, child: NodeId) {
    if parent == NO_PARENT {
        return;
    }
    device.get_mut(parent).children.retain(|c| *c != child);
}

/// Deep-copy `source`'s subtree as a new child of `new_parent`, same
/// field-for-field copy `svd::derive::deep_copy_node` performs for
/// `derivedFrom` (kept as a separate copy here since the two passes run at
/// different points in the pipeline and mutate the clone differently
/// afterward).
fn clone_subtree(device: &mut Device, source: NodeId, new_parent: NodeId) -> NodeId {
    let node = device.get(source).clone();
    let new_id = device.push_child(new_parent, node.kind, node.name.clone(), node.location.clone());
    {
        let clone = device.get_mut(new_id);
        clone.description = node.description.clone();
        clone.derived_from = node.derived_from.clone();
        clone.alternate_peripheral = node.alternate_peripheral.clone();
        clone.alternate_register = node.alternate_register.clone();
        clone.alternate_group = node.alternate_group.clone();
        clone.base_address = node.base_address;
        clone.address_offset = node.address_offset;
        clone.bit_offset = node.bit_offset;
        clone.bit_width = node.bit_width;
        clone.value = node.value;
        clone.is_default = node.is_default;
        clone.dim = node.dim.clone();
        clone.props = node.props.clone();
        clone.disable_condition = node.disable_condition.clone();
        clone.disable_condition_tokens = node.disable_condition_tokens.clone();
    }
    for child in node.children.clone() {
        clone_subtree(device, child, new_id);
    }
    new_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_range_expands_in_order() {
        let entries = generate_indices(4, Some("0-3"));
        let suffixes: Vec<_> = entries.into_iter().map(|e| e.suffix).collect();
        assert_eq!(suffixes, vec!["0", "1", "2", "3"]);
    }

    #[test]
    fn character_range_expands_alphabetically() {
        let entries = generate_indices(4, Some("A-D"));
        let suffixes: Vec<_> = entries.into_iter().map(|e| e.suffix).collect();
        assert_eq!(suffixes, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn comma_list_is_used_verbatim() {
        let entries = generate_indices(3, Some("FOO,BAR,BAZ"));
        let suffixes: Vec<_> = entries.into_iter().map(|e| e.suffix).collect();
        assert_eq!(suffixes, vec!["FOO", "BAR", "BAZ"]);
    }

    #[test]
    fn absent_dim_index_defaults_to_numeric_from_zero() {
        let entries = generate_indices(3, None);
        let suffixes: Vec<_> = entries.into_iter().map(|e| e.suffix).collect();
        assert_eq!(suffixes, vec!["0", "1", "2"]);
    }

    #[test]
    fn field_never_allows_array_form() {
        assert!(!allows_array_form(NodeKind::Field));
        assert!(allows_array_form(NodeKind::Register));
    }

    #[test]
    fn dim_array_index_is_rejected_on_fields() {
        assert!(!is_tag_allowed(NodeKind::Field, "dimArrayIndex"));
        assert!(is_tag_allowed(NodeKind::Peripheral, "dimArrayIndex"));
    }

    #[test]
    fn substitute_replaces_first_percent_s_only() {
        assert_eq!(substitute("GPIO%s_BASE", "A"), "GPIOA_BASE");
    }

    #[test]
    fn expand_all_replaces_dim_peripheral_with_stepped_siblings() {
        let mut device = Device::new("TESTMCU", Location::none());
        let root = device.root;
        let periph = device.push_child(root, NodeKind::Peripheral, "TIM%s", Location::none());
        {
            let node = device.get_mut(periph);
            node.base_address = Some(0x4000_0000);
            node.dim.dim = Some(3);
            node.dim.dim_increment = Some(0x400);
        }

        let mut diagnostics = DiagnosticContext::new(false);
        expand_all(&mut device, &mut diagnostics);

        assert!(!diagnostics.has_errors());
        assert!(device.get(periph).invalid);
        let siblings: Vec<_> = device
            .children_of(root)
            .iter()
            .map(|id| device.get(*id))
            .filter(|n| !n.invalid)
            .collect();
        assert_eq!(siblings.len(), 3);
        assert_eq!(siblings[0].name, "TIM0");
        assert_eq!(siblings[0].base_address, Some(0x4000_0000));
        assert_eq!(siblings[2].name, "TIM2");
        assert_eq!(siblings[2].base_address, Some(0x4000_0800));
    }

    #[test]
    fn expand_all_steps_register_address_offset_inside_parent() {
        let mut device = Device::new("TESTMCU", Location::none());
        let root = device.root;
        let periph = device.push_child(root, NodeKind::Peripheral, "GPIOA", Location::none());
        let reg = device.push_child(periph, NodeKind::Register, "DATA%s", Location::none());
        {
            let node = device.get_mut(reg);
            node.address_offset = Some(0x10);
            node.dim.dim = Some(2);
            node.dim.dim_increment = Some(4);
        }

        let mut diagnostics = DiagnosticContext::new(false);
        expand_all(&mut device, &mut diagnostics);

        let siblings: Vec<_> = device
            .children_of(periph)
            .iter()
            .map(|id| device.get(*id))
            .filter(|n| !n.invalid)
            .collect();
        assert_eq!(siblings.len(), 2);
        assert_eq!(siblings[0].name, "DATA0");
        assert_eq!(siblings[0].address_offset, Some(0x10));
        assert_eq!(siblings[1].name, "DATA1");
        assert_eq!(siblings[1].address_offset, Some(0x14));
    }

    #[test]
    fn expand_all_steps_field_bit_offset_without_new_addresses() {
        let mut device = Device::new("TESTMCU", Location::none());
        let root = device.root;
        let periph = device.push_child(root, NodeKind::Peripheral, "GPIOA", Location::none());
        let reg = device.push_child(periph, NodeKind::Register, "CR", Location::none());
        let field = device.push_child(reg, NodeKind::Field, "CH%s", Location::none());
        {
            let node = device.get_mut(field);
            node.bit_offset = Some(0);
            node.dim.dim = Some(4);
            node.dim.dim_increment = Some(2);
        }

        let mut diagnostics = DiagnosticContext::new(false);
        expand_all(&mut device, &mut diagnostics);

        let siblings: Vec<_> = device
            .children_of(reg)
            .iter()
            .map(|id| device.get(*id))
            .filter(|n| !n.invalid)
            .collect();
        assert_eq!(siblings.len(), 4);
        assert_eq!(siblings[0].bit_offset, Some(0));
        assert_eq!(siblings[3].bit_offset, Some(6));
    }

    #[test]
    fn register_offset_scales_by_address_unit_bits_but_peripheral_base_does_not() {
        let mut device = Device::new("TESTMCU", Location::none());
        device.address_unit_bits = 16;
        let root = device.root;
        let periph = device.push_child(root, NodeKind::Peripheral, "TIM%s", Location::none());
        {
            let node = device.get_mut(periph);
            node.base_address = Some(0x4000_0000);
            node.dim.dim = Some(2);
            node.dim.dim_increment = Some(0x100);
        }
        let reg = device.push_child(periph, NodeKind::Register, "DATA%s", Location::none());
        {
            let node = device.get_mut(reg);
            node.address_offset = Some(0x10);
            node.dim.dim = Some(2);
            node.dim.dim_increment = Some(4);
        }

        let mut diagnostics = DiagnosticContext::new(false);
        expand_all(&mut device, &mut diagnostics);

        let periphs: Vec<_> = device
            .children_of(root)
            .iter()
            .map(|id| device.get(*id))
            .filter(|n| !n.invalid)
            .collect();
        // peripheral base address steps by the raw increment (0x100), not
        // scaled by addressUnitBits.
        assert_eq!(periphs[1].base_address, Some(0x4000_0100));

        let regs: Vec<_> = device
            .children_of(periphs[0].children[0])
            .iter()
            .map(|id| device.get(*id))
            .filter(|n| !n.invalid)
            .collect();
        // register offset steps by dimIncrement * addressUnitBits / 8 = 4*16/8 = 8.
        assert_eq!(regs[0].address_offset, Some(0x10));
        assert_eq!(regs[1].address_offset, Some(0x18));
    }

    #[test]
    fn expand_all_leaves_non_dim_nodes_untouched() {
        let mut device = Device::new("TESTMCU", Location::none());
        let root = device.root;
        let periph = device.push_child(root, NodeKind::Peripheral, "GPIOA", Location::none());
        let reg = device.push_child(periph, NodeKind::Register, "CR", Location::none());

        let mut diagnostics = DiagnosticContext::new(false);
        expand_all(&mut device, &mut diagnostics);

        assert!(!diagnostics.has_errors());
        assert_eq!(device.children_of(periph), &[reg]);
        assert!(!device.get(reg).invalid);
    }
}
