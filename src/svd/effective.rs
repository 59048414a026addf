//! Effective-property resolution.
//!
//! `size`/`access`/`resetValue`/`resetMask`/`protection` are inheritable:
//! a register or field that doesn't set one of them takes the nearest
//! ancestor's value (device -> peripheral -> cluster -> register -> field).
//! This pass bubbles each property down the tree once `derivedFrom` has
//! already been resolved, so every node ends up with a fully-populated
//! `InheritableProps` regardless of how much it set explicitly.

use crate::svd::model::{Access, Device, InheritableProps, NodeId};

/// Walk the tree from `root` down, filling each node's unset properties
/// from its parent's already-resolved effective values.
pub fn resolve_all(device: &mut Device) {
    let root = device.root;
    let defaults = InheritableProps {
        size: Some(32),
        access: Some(Access::ReadWrite),
        reset_value: Some(0),
        reset_mask: Some(0xFFFF_FFFF),
        protection: None,
    };
    propagate(device, root, &defaults);
}

fn propagate(device: &mut Device, id: NodeId, inherited: &InheritableProps) {
    let effective = {
        let node = device.get_mut(id);
        if node.props.size.is_none() {
            node.props.size = inherited.size;
        }
        if node.props.access.is_none() {
            node.props.access = inherited.access;
        }
        if node.props.reset_value.is_none() {
            node.props.reset_value = inherited.reset_value;
        }
        if node.props.reset_mask.is_none() {
            node.props.reset_mask = inherited.reset_mask;
        }
        if node.props.protection.is_none() {
            node.props.protection = inherited.protection.clone();
        }
        node.props.clone()
    };

    let children = device.children_of(id).to_vec();
    for child in children {
        propagate(device, child, &effective);
    }
}

/// Effective bit range for a field, computed from its own `bitOffset`/
/// `bitWidth` (both required at the field level by the time this runs, so
/// this is a straight readback rather than an inheritance lookup).
pub fn field_bit_range(device: &Device, field: NodeId) -> Option<(u32, u32)> {
    let node = device.get(field);
    Some((node.bit_offset?, node.bit_width?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svd::model::NodeKind;
    use crate::util::Location;

    #[test]
    fn register_inherits_device_level_size() {
        let mut device = Device::new("TESTMCU", Location::none());
        device.get_mut(device.root).props.size = Some(16);
        let periph = device.push_child(device.root, NodeKind::Peripheral, "TIM0", Location::none());
        let reg = device.push_child(periph, NodeKind::Register, "CR", Location::none());

        resolve_all(&mut device);

        assert_eq!(device.get(reg).props.size, Some(16));
    }

    #[test]
    fn explicit_register_size_overrides_inherited_value() {
        let mut device = Device::new("TESTMCU", Location::none());
        device.get_mut(device.root).props.size = Some(16);
        let periph = device.push_child(device.root, NodeKind::Peripheral, "TIM0", Location::none());
        let reg = device.push_child(periph, NodeKind::Register, "CR", Location::none());
        device.get_mut(reg).props.size = Some(32);

        resolve_all(&mut device);

        assert_eq!(device.get(reg).props.size, Some(32));
    }

    #[test]
    fn device_without_explicit_defaults_still_resolves() {
        let mut device = Device::new("TESTMCU", Location::none());
        let periph = device.push_child(device.root, NodeKind::Peripheral, "TIM0", Location::none());

        resolve_all(&mut device);

        assert_eq!(device.get(periph).props.size, Some(32));
        assert_eq!(device.get(periph).props.access, Some(Access::ReadWrite));
    }
}
