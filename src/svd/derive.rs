//! `derivedFrom` resolution.
//!
//! A node that sets `derivedFrom` inherits every field its source node has
//! that it doesn't itself override, recursively through the source's own
//! subtree. Implemented as a deep copy of the source subtree under the
//! derived node's parent, with the derived node's own explicit fields
//! re-applied on top — copy-then-override, chosen specifically so the
//! expansion can run before dimension/effective-property passes without a
//! second parse.

use std::collections::HashSet;

use crate::svd::model::{Device, NodeId};
use crate::util::{DiagnosticContext, Location};

/// Resolve every `derivedFrom` reference in `device`, replacing each
/// derived node's children with a deep copy of its source's children.
/// Processes nodes in arena order but re-resolves dependencies on demand,
/// so a chain `A derivedFrom B derivedFrom C` resolves correctly regardless
/// of declaration order.
pub fn resolve_all(device: &mut Device, diagnostics: &mut DiagnosticContext) {
    let ids: Vec<NodeId> = (0..device.nodes.len() as u32).map(NodeId).collect();
    let mut resolved = HashSet::new();
    for id in ids {
        resolve_one(device, id, &mut resolved, &mut HashSet::new(), diagnostics);
    }
}

fn resolve_one(
    device: &mut Device,
    id: NodeId,
    resolved: &mut HashSet<NodeId>,
    in_progress: &mut HashSet<NodeId>,
    diagnostics: &mut DiagnosticContext,
) {
    if resolved.contains(&id) {
        return;
    }
    let Some(derived_from) = device.get(id).derived_from.clone() else {
        resolved.insert(id);
        return;
    };

    if in_progress.contains(&id) {
        diagnostics.error(
            "M241",
            &[("node", &device.get(id).name)],
            device.get(id).location.clone(),
        );
        resolved.insert(id);
        return;
    }

    let Some(source_id) = device.resolve_path(id, &derived_from) else {
        diagnostics.error(
            "M242",
            &[("node", &device.get(id).name), ("reference", &derived_from)],
            device.get(id).location.clone(),
        );
        resolved.insert(id);
        return;
    };

    in_progress.insert(id);
    resolve_one(device, source_id, resolved, in_progress, diagnostics);
    in_progress.remove(&id);

    copy_subtree_children(device, source_id, id);
    resolved.insert(id);
}

/// Deep-copy every child of `source` as a new child of `target`, preserving
/// the source's own explicit overrides. `target`'s own fields (name,
/// address, description, ...) are left untouched — only structure and
/// inherited scalar properties not already set are pulled in.
fn copy_subtree_children(device: &mut Device, source: NodeId, target: NodeId) {
    let source_node = device.get(source).clone();

    if device.get(target).description.is_none() {
        device.get_mut(target).description = source_node.description.clone();
    }
    if device.get(target).props.size.is_none() {
        device.get_mut(target).props.size = source_node.props.size;
    }
    if device.get(target).props.access.is_none() {
        device.get_mut(target).props.access = source_node.props.access;
    }
    if device.get(target).props.reset_value.is_none() {
        device.get_mut(target).props.reset_value = source_node.props.reset_value;
    }
    if device.get(target).props.reset_mask.is_none() {
        device.get_mut(target).props.reset_mask = source_node.props.reset_mask;
    }
    if device.get(target).props.protection.is_none() {
        device.get_mut(target).props.protection = source_node.props.protection.clone();
    }
    if device.get(target).bit_width.is_none() {
        device.get_mut(target).bit_width = source_node.bit_width;
    }

    let children = source_node.children.clone();
    for child_id in children {
        deep_copy_node(device, child_id, target);
    }
}

fn deep_copy_node(device: &mut Device, source: NodeId, new_parent: NodeId) -> NodeId {
    let source_node = device.get(source).clone();
    let new_id = device.push_child(
        new_parent,
        source_node.kind,
        source_node.name.clone(),
        source_node.location.clone(),
    );
    {
        let new_node = device.get_mut(new_id);
        new_node.description = source_node.description.clone();
        new_node.derived_from = source_node.derived_from.clone();
        new_node.alternate_peripheral = source_node.alternate_peripheral.clone();
        new_node.alternate_register = source_node.alternate_register.clone();
        new_node.alternate_group = source_node.alternate_group.clone();
        new_node.base_address = source_node.base_address;
        new_node.address_offset = source_node.address_offset;
        new_node.bit_offset = source_node.bit_offset;
        new_node.bit_width = source_node.bit_width;
        new_node.value = source_node.value;
        new_node.is_default = source_node.is_default;
        new_node.dim = source_node.dim.clone();
        new_node.props = source_node.props.clone();
        new_node.disable_condition = source_node.disable_condition.clone();
        new_node.disable_condition_tokens = source_node.disable_condition_tokens.clone();
    }
    for child_id in source_node.children.clone() {
        deep_copy_node(device, child_id, new_id);
    }
    new_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svd::model::NodeKind;

    fn make_device() -> Device {
        Device::new("TESTMCU", Location::none())
    }

    #[test]
    fn derived_peripheral_copies_source_registers() {
        let mut device = make_device();
        let root = device.root;
        let source = device.push_child(root, NodeKind::Peripheral, "UART0", Location::none());
        let reg = device.push_child(source, NodeKind::Register, "DR", Location::none());
        device.get_mut(reg).bit_width = Some(32);

        let derived = device.push_child(root, NodeKind::Peripheral, "UART1", Location::none());
        device.get_mut(derived).derived_from = Some("UART0".to_string());

        let mut diagnostics = DiagnosticContext::new(false);
        resolve_all(&mut device, &mut diagnostics);

        assert!(!diagnostics.has_errors());
        let derived_children = device.children_of(derived);
        assert_eq!(derived_children.len(), 1);
        let copied_reg = derived_children[0];
        assert_eq!(device.get(copied_reg).name, "DR");
        assert_eq!(device.get(copied_reg).bit_width, Some(32));
    }

    #[test]
    fn unresolvable_reference_reports_m242() {
        let mut device = make_device();
        let root = device.root;
        let derived = device.push_child(root, NodeKind::Peripheral, "UART1", Location::none());
        device.get_mut(derived).derived_from = Some("NOPE".to_string());

        let mut diagnostics = DiagnosticContext::new(false);
        resolve_all(&mut device, &mut diagnostics);

        assert!(diagnostics.has_errors());
    }

    #[test]
    fn chain_of_derived_from_resolves_transitively() {
        let mut device = make_device();
        let root = device.root;
        let base = device.push_child(root, NodeKind::Peripheral, "BASE", Location::none());
        let reg = device.push_child(base, NodeKind::Register, "CTRL", Location::none());
        device.get_mut(reg).bit_width = Some(16);

        let mid = device.push_child(root, NodeKind::Peripheral, "MID", Location::none());
        device.get_mut(mid).derived_from = Some("BASE".to_string());

        let top = device.push_child(root, NodeKind::Peripheral, "TOP", Location::none());
        device.get_mut(top).derived_from = Some("MID".to_string());

        let mut diagnostics = DiagnosticContext::new(false);
        resolve_all(&mut device, &mut diagnostics);

        assert!(!diagnostics.has_errors());
        let top_children = device.children_of(top);
        assert_eq!(top_children.len(), 1);
        assert_eq!(device.get(top_children[0]).name, "CTRL");
    }
}
