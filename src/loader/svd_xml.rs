//! SVD document loader: builds a `svd::Device` arena from a parsed XML tree.
//!
//! Walks the parsed tree top-down (device -> peripherals ->
//! registers/clusters -> fields -> enumeratedValues), building against the
//! arena `Device` instead of a parent-pointer object tree. Numeric fields
//! (`baseAddress`, `bitOffset`, ...) accept both decimal and `0x`-prefixed
//! hex text, matching the SVD schema's `scaledNonNegativeInteger`.

use std::path::Path;

use crate::loader::xml::{parse_tree, LineIndex, XmlElement};
use crate::svd::model::{Access, Device, DimensionSpec, NodeKind};
use crate::util::{DiagnosticContext, Location};

pub fn load_file(path: &Path, diagnostics: &mut DiagnosticContext) -> anyhow::Result<Device> {
    let text = crate::util::fs::read_to_string(path)?;
    load_str(&text, path, diagnostics)
}

pub fn load_str(text: &str, path: &Path, diagnostics: &mut DiagnosticContext) -> anyhow::Result<Device> {
    let index = LineIndex::new(path, text);
    let root_elem = parse_tree(text)?;

    let device_name = root_elem
        .child("name")
        .map(|e| e.text.trim().to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string());

    let mut device = Device::new(&device_name, index.location(root_elem.offset));
    device.address_unit_bits = root_elem
        .child("addressUnitBits")
        .and_then(|e| parse_number(&e.text))
        .map(|v| v as u32)
        .unwrap_or(8);
    apply_inheritable(&mut device, device.root, &root_elem);
    device.get_mut(device.root).description = root_elem.child("description").map(text_of);

    if let Some(peripherals_elem) = root_elem.child("peripherals") {
        for peripheral in peripherals_elem.children_named("peripheral") {
            load_peripheral(&mut device, device.root, peripheral, &index, diagnostics);
        }
    }

    Ok(device)
}

fn load_peripheral(
    device: &mut Device,
    parent: crate::svd::model::NodeId,
    elem: &XmlElement,
    index: &LineIndex,
    diagnostics: &mut DiagnosticContext,
) {
    let name = elem
        .child("name")
        .map(text_of)
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let id = device.push_child(parent, NodeKind::Peripheral, name, index.location(elem.offset));

    device.get_mut(id).description = elem.child("description").map(text_of);
    device.get_mut(id).derived_from = elem.attr("derivedFrom").map(str::to_string);
    device.get_mut(id).alternate_peripheral = elem.child("alternatePeripheral").map(text_of);
    device.get_mut(id).base_address = elem.child("baseAddress").and_then(|e| parse_number(&e.text));
    apply_inheritable(device, id, elem);
    apply_dimension(device, id, elem);

    if let Some(registers_elem) = elem.child("registers") {
        for reg in registers_elem.children_named("register") {
            load_register_or_cluster(device, id, reg, index, diagnostics, NodeKind::Register);
        }
        for cluster in registers_elem.children_named("cluster") {
            load_register_or_cluster(device, id, cluster, index, diagnostics, NodeKind::Cluster);
        }
    }
}

fn load_register_or_cluster(
    device: &mut Device,
    parent: crate::svd::model::NodeId,
    elem: &XmlElement,
    index: &LineIndex,
    diagnostics: &mut DiagnosticContext,
    kind: NodeKind,
) {
    let name = elem
        .child("name")
        .map(text_of)
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let id = device.push_child(parent, kind, name, index.location(elem.offset));

    device.get_mut(id).description = elem.child("description").map(text_of);
    device.get_mut(id).derived_from = elem.attr("derivedFrom").map(str::to_string);
    device.get_mut(id).alternate_register = elem.child("alternateRegister").map(text_of);
    device.get_mut(id).alternate_group = elem.child("alternateGroup").map(text_of);
    device.get_mut(id).address_offset = elem.child("addressOffset").and_then(|e| parse_number(&e.text));
    device.get_mut(id).disable_condition = elem.child("disableCondition").map(text_of);
    apply_inheritable(device, id, elem);
    apply_dimension(device, id, elem);

    if kind == NodeKind::Register {
        if let Some(fields_elem) = elem.child("fields") {
            for field in fields_elem.children_named("field") {
                load_field(device, id, field, index, diagnostics);
            }
        }
    } else {
        for reg in elem.children_named("register") {
            load_register_or_cluster(device, id, reg, index, diagnostics, NodeKind::Register);
        }
        for nested in elem.children_named("cluster") {
            load_register_or_cluster(device, id, nested, index, diagnostics, NodeKind::Cluster);
        }
    }
}

fn load_field(
    device: &mut Device,
    parent: crate::svd::model::NodeId,
    elem: &XmlElement,
    index: &LineIndex,
    _diagnostics: &mut DiagnosticContext,
) {
    let name = elem
        .child("name")
        .map(text_of)
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let id = device.push_child(parent, NodeKind::Field, name, index.location(elem.offset));

    device.get_mut(id).description = elem.child("description").map(text_of);
    device.get_mut(id).derived_from = elem.attr("derivedFrom").map(str::to_string);

    if let Some(lsb) = elem.child("lsb").and_then(|e| parse_number(&e.text)) {
        let msb = elem.child("msb").and_then(|e| parse_number(&e.text)).unwrap_or(lsb);
        device.get_mut(id).bit_offset = Some(lsb as u32);
        device.get_mut(id).bit_width = Some((msb - lsb + 1) as u32);
    } else {
        device.get_mut(id).bit_offset = elem.child("bitOffset").and_then(|e| parse_number(&e.text)).map(|v| v as u32);
        device.get_mut(id).bit_width = elem.child("bitWidth").and_then(|e| parse_number(&e.text)).map(|v| v as u32);
    }

    if let Some(access) = elem.child("access").map(|e| e.text.trim().to_string()) {
        device.get_mut(id).props.access = Some(parse_access(&access));
    }
    device.get_mut(id).disable_condition = elem.child("disableCondition").map(text_of);
    apply_dimension(device, id, elem);

    if let Some(evs_elem) = elem.child("enumeratedValues") {
        for ev in evs_elem.children_named("enumeratedValue") {
            load_enumerated_value(device, id, ev, index);
        }
    }
}

fn load_enumerated_value(
    device: &mut Device,
    parent: crate::svd::model::NodeId,
    elem: &XmlElement,
    index: &LineIndex,
) {
    let name = elem
        .child("name")
        .map(text_of)
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let id = device.push_child(parent, NodeKind::EnumeratedValue, name, index.location(elem.offset));

    device.get_mut(id).description = elem.child("description").map(text_of);
    device.get_mut(id).value = elem.child("value").and_then(|e| parse_number(&e.text));
    device.get_mut(id).is_default = elem.child("isDefault").map(|e| e.text.trim() == "true").unwrap_or(false);
}

fn apply_inheritable(device: &mut Device, id: crate::svd::model::NodeId, elem: &XmlElement) {
    let node = device.get_mut(id);
    node.props.size = elem.child("size").and_then(|e| parse_number(&e.text)).map(|v| v as u32);
    node.props.access = elem.child("access").map(|e| e.text.trim().to_string()).as_deref().map(parse_access);
    node.props.reset_value = elem.child("resetValue").and_then(|e| parse_number(&e.text));
    node.props.reset_mask = elem.child("resetMask").and_then(|e| parse_number(&e.text));
    node.props.protection = elem.child("protection").map(text_of);
}

fn apply_dimension(device: &mut Device, id: crate::svd::model::NodeId, elem: &XmlElement) {
    let dim = DimensionSpec {
        dim: elem.child("dim").and_then(|e| parse_number(&e.text)).map(|v| v as u32),
        dim_increment: elem.child("dimIncrement").and_then(|e| parse_number(&e.text)),
        dim_index: elem.child("dimIndex").map(text_of),
        dim_name: elem.child("dimName").map(text_of),
        dim_array_index: None,
    };
    device.get_mut(id).dim = dim;
}

fn text_of(elem: &XmlElement) -> String {
    elem.text.trim().to_string()
}

fn parse_access(text: &str) -> Access {
    match text.trim() {
        "read-only" => Access::ReadOnly,
        "write-only" => Access::WriteOnly,
        "writeOnce" => Access::WriteOnce,
        "read-writeOnce" => Access::ReadWriteOnce,
        _ => Access::ReadWrite,
    }
}

/// Parse a `scaledNonNegativeInteger`: decimal, `0x`/`0X` hex, or a trailing
/// scale suffix (`k`/`M`) is not used by SVD and is intentionally not
/// supported here.
fn parse_number(text: &str) -> Option<u64> {
    let t = text.trim();
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        t.parse::<u64>().ok()
    }
}
