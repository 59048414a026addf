//! Post-expansion validation passes.
//!
//! Runs after `derive::resolve_all`, `dimension` expansion, and
//! `effective::resolve_all` so every node carries its final name, address,
//! and properties. Each check emits coded diagnostics rather than failing
//! fast, so one run reports every problem instead of stopping at the first.

use std::collections::HashMap;

use crate::svd::model::{Access, Device, NodeId, NodeKind};
use crate::util::DiagnosticContext;

pub fn run_all(device: &Device, diagnostics: &mut DiagnosticContext) {
    check_name_uniqueness(device, diagnostics);
    check_field_overlaps(device, diagnostics);
    check_address_block_overlaps(device, diagnostics);
    check_register_offset_overlaps(device, diagnostics);
    check_enumerated_value_ranges(device, diagnostics);
    check_identifier_rules(device, diagnostics);
}

const RESERVED_WORDS: &[&str] = &[
    "reserved", "auto", "break", "case", "char", "const", "continue", "default", "do", "double",
    "else", "enum", "extern", "float", "for", "goto", "if", "int", "long", "register", "return",
    "short", "signed", "sizeof", "static", "struct", "switch", "typedef", "union", "unsigned",
    "void", "volatile", "while",
];

/// Name and identifier rules: no reserved word (case-insensitive), no
/// leading underscore, names at most 32 characters (warning), no `%`
/// outside a dim-expansion template.
fn check_identifier_rules(device: &Device, diagnostics: &mut DiagnosticContext) {
    for id in device.iter_subtree(device.root) {
        let node = device.get(id);
        if node.kind == NodeKind::Device {
            continue;
        }
        let name = node.name.as_str();
        let lower = name.to_ascii_lowercase();

        if RESERVED_WORDS.contains(&lower.as_str()) {
            diagnostics.error("M280", &[("name", name)], node.location.clone());
        }
        if name.starts_with('_') {
            diagnostics.error("M281", &[("name", name)], node.location.clone());
        }
        if name.len() > 32 {
            diagnostics.warn("M282", &[("name", name)], node.location.clone());
        }
        if name.contains('%') {
            diagnostics.error("M283", &[("name", name)], node.location.clone());
        }
        if name.contains('\\') {
            diagnostics.error("M284", &[("name", name)], node.location.clone());
        }
    }
}

/// Sibling names must be unique within their parent scope (peripherals
/// under the device, registers under a peripheral/cluster, fields under a
/// register).
fn check_name_uniqueness(device: &Device, diagnostics: &mut DiagnosticContext) {
    for id in device.iter_subtree(device.root) {
        let mut seen: HashMap<&str, NodeId> = HashMap::new();
        for &child in device.children_of(id) {
            let name = device.get(child).name.as_str();
            if let Some(&prev) = seen.get(name) {
                let _ = prev;
                diagnostics.error(
                    "M250",
                    &[("name", name)],
                    device.get(child).location.clone(),
                );
            } else {
                seen.insert(name, child);
            }
        }
    }
}

/// Two fields in the same register may not share bits unless one is
/// read-only and the other write-only (the hardware convention for
/// shadowed read/write registers at the same address).
fn check_field_overlaps(device: &Device, diagnostics: &mut DiagnosticContext) {
    for id in device.iter_subtree(device.root) {
        if device.get(id).kind != NodeKind::Register {
            continue;
        }
        let fields: Vec<NodeId> = device
            .children_of(id)
            .iter()
            .copied()
            .filter(|&c| device.get(c).kind == NodeKind::Field)
            .collect();

        for i in 0..fields.len() {
            for j in (i + 1)..fields.len() {
                let a = device.get(fields[i]);
                let b = device.get(fields[j]);
                let (Some(a_off), Some(a_width)) = (a.bit_offset, a.bit_width) else {
                    continue;
                };
                let (Some(b_off), Some(b_width)) = (b.bit_offset, b.bit_width) else {
                    continue;
                };
                if !ranges_overlap(a_off, a_width, b_off, b_width) {
                    continue;
                }
                if is_read_write_shadow_pair(a.props.access, b.props.access) {
                    continue;
                }
                diagnostics.error(
                    "CV_H001",
                    &[
                        ("register", &device.get(id).name),
                        ("field", &a.name),
                        ("other", &b.name),
                    ],
                    a.location.clone(),
                );
            }
        }
    }
}

fn ranges_overlap(a_off: u32, a_width: u32, b_off: u32, b_width: u32) -> bool {
    let a_end = a_off + a_width;
    let b_end = b_off + b_width;
    a_off < b_end && b_off < a_end
}

fn is_read_write_shadow_pair(a: Option<Access>, b: Option<Access>) -> bool {
    matches!(
        (a, b),
        (Some(Access::ReadOnly), Some(Access::WriteOnly))
            | (Some(Access::WriteOnly), Some(Access::ReadOnly))
    )
}

/// Peripheral base addresses (plus their size) may not overlap another
/// peripheral's address range. A pair is exempt when either side names the
/// other via `<alternatePeripheral>` — that's how SVD documents an
/// intentional address-space alias (e.g. a peripheral accessible through
/// two bus bridges). Flagged as a warning rather than an error: an
/// undeclared overlap may still be a deliberate alias the vendor's SVD
/// simply didn't annotate.
fn check_address_block_overlaps(device: &Device, diagnostics: &mut DiagnosticContext) {
    let peripherals: Vec<NodeId> = device
        .children_of(device.root)
        .iter()
        .copied()
        .filter(|&c| device.get(c).kind == NodeKind::Peripheral)
        .collect();

    for i in 0..peripherals.len() {
        for j in (i + 1)..peripherals.len() {
            let a = device.get(peripherals[i]);
            let b = device.get(peripherals[j]);
            let (Some(a_base), Some(b_base)) = (a.base_address, b.base_address) else {
                continue;
            };
            if is_alternate_pair(a.alternate_peripheral.as_deref(), &a.name, b.alternate_peripheral.as_deref(), &b.name) {
                continue;
            }
            let a_size = a.props.size.unwrap_or(32) as u64 / 8;
            let b_size = b.props.size.unwrap_or(32) as u64 / 8;
            if a_base < b_base + b_size.max(1) && b_base < a_base + a_size.max(1) {
                diagnostics.warn(
                    "M260",
                    &[("peripheral", &a.name), ("other", &b.name)],
                    a.location.clone(),
                );
            }
        }
    }
}

/// Two registers/clusters within the same peripheral may not share an
/// address offset, unless one names the other via `<alternateRegister>` or
/// both share an `<alternateGroup>` value (the SVD idiom for registers that
/// are deliberately aliased, e.g. byte/halfword/word views of one address).
fn check_register_offset_overlaps(device: &Device, diagnostics: &mut DiagnosticContext) {
    let peripherals: Vec<NodeId> = device
        .children_of(device.root)
        .iter()
        .copied()
        .filter(|&c| device.get(c).kind == NodeKind::Peripheral)
        .collect();

    for periph in peripherals {
        let regs: Vec<NodeId> = device
            .children_of(periph)
            .iter()
            .copied()
            .filter(|&c| matches!(device.get(c).kind, NodeKind::Register | NodeKind::Cluster))
            .collect();

        for i in 0..regs.len() {
            for j in (i + 1)..regs.len() {
                let a = device.get(regs[i]);
                let b = device.get(regs[j]);
                let (Some(a_off), Some(b_off)) = (a.address_offset, b.address_offset) else {
                    continue;
                };
                if is_alternate_pair(a.alternate_register.as_deref(), &a.name, b.alternate_register.as_deref(), &b.name) {
                    continue;
                }
                if let (Some(ga), Some(gb)) = (&a.alternate_group, &b.alternate_group) {
                    if ga == gb {
                        continue;
                    }
                }
                let a_size = a.props.size.unwrap_or(32) as u64 / 8;
                let b_size = b.props.size.unwrap_or(32) as u64 / 8;
                if a_off < b_off + b_size.max(1) && b_off < a_off + a_size.max(1) {
                    diagnostics.error(
                        "M261",
                        &[
                            ("register", &a.name),
                            ("other", &b.name),
                            ("peripheral", &device.get(periph).name),
                        ],
                        a.location.clone(),
                    );
                }
            }
        }
    }
}

fn is_alternate_pair(a_alt: Option<&str>, a_name: &str, b_alt: Option<&str>, b_name: &str) -> bool {
    a_alt == Some(b_name) || b_alt == Some(a_name)
}

/// An enumerated value's numeric `value` must fit within the owning
/// field's bit width.
fn check_enumerated_value_ranges(device: &Device, diagnostics: &mut DiagnosticContext) {
    for id in device.iter_subtree(device.root) {
        if device.get(id).kind != NodeKind::Field {
            continue;
        }
        let Some(width) = device.get(id).bit_width else {
            continue;
        };
        let max_value: u64 = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };

        for &ev in device.children_of(id) {
            if device.get(ev).kind != NodeKind::EnumeratedValue {
                continue;
            }
            if let Some(value) = device.get(ev).value {
                if value > max_value {
                    diagnostics.error(
                        "M270",
                        &[("field", &device.get(id).name), ("name", &device.get(ev).name)],
                        device.get(ev).location.clone(),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Location;

    fn field_with(device: &mut Device, reg: NodeId, name: &str, off: u32, width: u32, access: Access) -> NodeId {
        let id = device.push_child(reg, NodeKind::Field, name, Location::none());
        device.get_mut(id).bit_offset = Some(off);
        device.get_mut(id).bit_width = Some(width);
        device.get_mut(id).props.access = Some(access);
        id
    }

    #[test]
    fn duplicate_sibling_names_are_flagged() {
        let mut device = Device::new("MCU", Location::none());
        device.push_child(device.root, NodeKind::Peripheral, "GPIOA", Location::none());
        device.push_child(device.root, NodeKind::Peripheral, "GPIOA", Location::none());

        let mut diagnostics = DiagnosticContext::new(false);
        check_name_uniqueness(&device, &mut diagnostics);
        assert_eq!(diagnostics.error_count(), 1);
    }

    #[test]
    fn overlapping_read_write_fields_are_flagged() {
        let mut device = Device::new("MCU", Location::none());
        let periph = device.push_child(device.root, NodeKind::Peripheral, "UART0", Location::none());
        let reg = device.push_child(periph, NodeKind::Register, "SR", Location::none());
        field_with(&mut device, reg, "A", 0, 4, Access::ReadWrite);
        field_with(&mut device, reg, "B", 2, 4, Access::ReadWrite);

        let mut diagnostics = DiagnosticContext::new(false);
        check_field_overlaps(&device, &mut diagnostics);
        assert_eq!(diagnostics.error_count(), 1);
    }

    #[test]
    fn read_only_write_only_shadow_pair_does_not_overlap() {
        let mut device = Device::new("MCU", Location::none());
        let periph = device.push_child(device.root, NodeKind::Peripheral, "UART0", Location::none());
        let reg = device.push_child(periph, NodeKind::Register, "DR", Location::none());
        field_with(&mut device, reg, "RXD", 0, 8, Access::ReadOnly);
        field_with(&mut device, reg, "TXD", 0, 8, Access::WriteOnly);

        let mut diagnostics = DiagnosticContext::new(false);
        check_field_overlaps(&device, &mut diagnostics);
        assert_eq!(diagnostics.error_count(), 0);
    }

    #[test]
    fn enumerated_value_exceeding_field_width_is_flagged() {
        let mut device = Device::new("MCU", Location::none());
        let periph = device.push_child(device.root, NodeKind::Peripheral, "UART0", Location::none());
        let reg = device.push_child(periph, NodeKind::Register, "CR", Location::none());
        let field = field_with(&mut device, reg, "MODE", 0, 2, Access::ReadWrite);
        let ev = device.push_child(field, NodeKind::EnumeratedValue, "BAD", Location::none());
        device.get_mut(ev).value = Some(7);

        let mut diagnostics = DiagnosticContext::new(false);
        check_enumerated_value_ranges(&device, &mut diagnostics);
        assert_eq!(diagnostics.error_count(), 1);
    }

    #[test]
    fn reserved_word_and_leading_underscore_names_are_flagged() {
        let mut device = Device::new("MCU", Location::none());
        device.push_child(device.root, NodeKind::Peripheral, "Reserved", Location::none());
        device.push_child(device.root, NodeKind::Peripheral, "_Private", Location::none());
        device.push_child(device.root, NodeKind::Peripheral, "GPIOA", Location::none());

        let mut diagnostics = DiagnosticContext::new(false);
        check_identifier_rules(&device, &mut diagnostics);
        assert_eq!(diagnostics.error_count(), 2);
    }

    #[test]
    fn overlapping_peripherals_warn_unless_declared_alternates() {
        let mut device = Device::new("MCU", Location::none());
        let a = device.push_child(device.root, NodeKind::Peripheral, "UART0", Location::none());
        device.get_mut(a).base_address = Some(0x4000_0000);
        device.get_mut(a).props.size = Some(32);
        let b = device.push_child(device.root, NodeKind::Peripheral, "UART0_ALIAS", Location::none());
        device.get_mut(b).base_address = Some(0x4000_0000);
        device.get_mut(b).props.size = Some(32);

        let mut diagnostics = DiagnosticContext::new(false);
        check_address_block_overlaps(&device, &mut diagnostics);
        assert_eq!(diagnostics.error_count(), 0);
        assert_eq!(diagnostics.warning_count(), 1);

        device.get_mut(b).alternate_peripheral = Some("UART0".to_string());
        let mut diagnostics = DiagnosticContext::new(false);
        check_address_block_overlaps(&device, &mut diagnostics);
        assert_eq!(diagnostics.warning_count(), 0);
    }

    #[test]
    fn overlapping_registers_in_the_same_peripheral_are_flagged_unless_alternates() {
        let mut device = Device::new("MCU", Location::none());
        let periph = device.push_child(device.root, NodeKind::Peripheral, "TIM0", Location::none());
        let a = device.push_child(periph, NodeKind::Register, "CNT", Location::none());
        device.get_mut(a).address_offset = Some(0x10);
        device.get_mut(a).props.size = Some(32);
        let b = device.push_child(periph, NodeKind::Register, "CNT_BYTE", Location::none());
        device.get_mut(b).address_offset = Some(0x10);
        device.get_mut(b).props.size = Some(32);

        let mut diagnostics = DiagnosticContext::new(false);
        check_register_offset_overlaps(&device, &mut diagnostics);
        assert_eq!(diagnostics.error_count(), 1);

        device.get_mut(b).alternate_register = Some("CNT".to_string());
        let mut diagnostics = DiagnosticContext::new(false);
        check_register_offset_overlaps(&device, &mut diagnostics);
        assert_eq!(diagnostics.error_count(), 0);
    }

    #[test]
    fn overlong_name_warns_but_percent_and_backslash_error() {
        let mut device = Device::new("MCU", Location::none());
        device.push_child(device.root, NodeKind::Peripheral, &"A".repeat(40), Location::none());
        device.push_child(device.root, NodeKind::Peripheral, "GPIO%s", Location::none());
        device.push_child(device.root, NodeKind::Peripheral, "GPIO\\A", Location::none());

        let mut diagnostics = DiagnosticContext::new(false);
        check_identifier_rules(&device, &mut diagnostics);
        assert_eq!(diagnostics.warning_count(), 1);
        assert_eq!(diagnostics.error_count(), 2);
    }
}
