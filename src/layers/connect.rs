//! Backtracking search over layer-type slots.
//!
//! Each `provides` entry is tagged with the layer that contributed it
//! (`Provided`) so a contradiction can name the offending layers, not just
//! the key.

use std::collections::BTreeMap;

use crate::core::model::{ComponentSelector, ConnectionEntry, ConnectionSet, Layer};

/// One required layer type and the candidate layers that can fill it.
#[derive(Debug, Clone)]
pub struct LayerSlot<'a> {
    pub layer_type: String,
    pub candidates: Vec<&'a Layer>,
}

/// A value provided by one chosen layer, tagged with that layer's name for
/// diagnostics.
#[derive(Debug, Clone)]
struct Provided<'a> {
    value: Option<String>,
    layer: &'a str,
}

/// A complete, valid pick of one layer per slot.
#[derive(Debug, Clone)]
pub struct LayerAssignment<'a> {
    pub by_type: BTreeMap<String, &'a Layer>,
}

/// An owned copy of a [`LayerAssignment`], detached from the candidate
/// layers' borrows so a per-context pipeline stage can carry it across a
/// loop iteration: the assigned layer name per type, plus the flattened
/// component selectors every chosen layer contributes.
#[derive(Debug, Clone, Default)]
pub struct LayerAssignmentOwned {
    pub by_type: BTreeMap<String, String>,
    pub components: Vec<ComponentSelector>,
}

impl LayerAssignmentOwned {
    pub fn from_borrowed(assignment: &LayerAssignment<'_>) -> Self {
        let by_type = assignment
            .by_type
            .iter()
            .map(|(ty, layer)| (ty.clone(), layer.name.clone()))
            .collect();
        let components = assignment
            .by_type
            .values()
            .flat_map(|layer| layer.components.iter().cloned())
            .collect();
        LayerAssignmentOwned { by_type, components }
    }
}

/// One consume that no combination in the search could satisfy.
#[derive(Debug, Clone)]
pub struct Unsatisfied {
    pub consumer_layer: String,
    pub key: String,
}

fn flat_provides(layer: &Layer) -> Vec<&ConnectionEntry> {
    layer.connections.iter().flat_map(|c: &ConnectionSet| c.provides.iter()).collect()
}

fn flat_consumes(layer: &Layer) -> Vec<&ConnectionEntry> {
    layer.connections.iter().flat_map(|c: &ConnectionSet| c.consumes.iter()).collect()
}

/// Resolve one valid assignment: first found, by declaration order, over
/// slots ordered rarity-first then candidate-count-second. On failure,
/// reports every consume that the exhaustive search could not satisfy
/// anywhere in the search space.
pub fn resolve<'a>(slots: &[LayerSlot<'a>]) -> Result<LayerAssignment<'a>, Vec<Unsatisfied>> {
    let ordered = order_slots(slots);
    let mut chosen: Vec<(&str, &Layer)> = Vec::new();
    let mut failures = Vec::new();
    if search(&ordered, 0, &mut chosen, &mut failures) {
        let by_type = chosen.iter().map(|(t, l)| (t.to_string(), *l)).collect();
        return Ok(LayerAssignment { by_type });
    }
    dedup_failures(&mut failures);
    Err(failures)
}

/// `--update-idx` mode: enumerate every valid assignment.
pub fn resolve_all<'a>(slots: &[LayerSlot<'a>]) -> Vec<LayerAssignment<'a>> {
    let ordered = order_slots(slots);
    let mut chosen: Vec<(&str, &Layer)> = Vec::new();
    let mut found = Vec::new();
    let mut ignored = Vec::new();
    search_collect(&ordered, 0, &mut chosen, &mut found, usize::MAX, &mut ignored);
    found
}

fn dedup_failures(failures: &mut Vec<Unsatisfied>) {
    failures.sort_by(|a, b| (a.consumer_layer.as_str(), a.key.as_str()).cmp(&(b.consumer_layer.as_str(), b.key.as_str())));
    failures.dedup_by(|a, b| a.consumer_layer == b.consumer_layer && a.key == b.key);
}

/// Rarity-first (fewest candidates) then candidate-count-second ordering,
/// stable on ties so declaration order still governs within a tie.
fn order_slots<'a, 'b>(slots: &'b [LayerSlot<'a>]) -> Vec<&'b LayerSlot<'a>> {
    let mut ordered: Vec<&LayerSlot> = slots.iter().collect();
    ordered.sort_by_key(|s| s.candidates.len());
    ordered
}

fn search<'a>(
    ordered: &[&LayerSlot<'a>],
    idx: usize,
    chosen: &mut Vec<(&'a str, &'a Layer)>,
    failure: &mut Vec<Unsatisfied>,
) -> bool {
    if idx == ordered.len() {
        return check_consumes(chosen, failure);
    }
    let slot = ordered[idx];
    for candidate in &slot.candidates {
        if has_identity_conflict(chosen, candidate) {
            continue;
        }
        chosen.push((slot.layer_type.as_str(), candidate));
        if search(ordered, idx + 1, chosen, failure) {
            return true;
        }
        chosen.pop();
    }
    false
}

fn search_collect<'a>(
    ordered: &[&LayerSlot<'a>],
    idx: usize,
    chosen: &mut Vec<(&'a str, &'a Layer)>,
    found: &mut Vec<LayerAssignment<'a>>,
    limit: usize,
    failure: &mut Vec<Unsatisfied>,
) {
    if found.len() >= limit {
        return;
    }
    if idx == ordered.len() {
        if check_consumes(chosen, failure) {
            let mut by_type = BTreeMap::new();
            for (t, l) in chosen.iter() {
                by_type.insert(t.to_string(), *l);
            }
            found.push(LayerAssignment { by_type });
        }
        return;
    }
    let slot = ordered[idx];
    for candidate in &slot.candidates {
        if has_identity_conflict(chosen, candidate) {
            continue;
        }
        chosen.push((slot.layer_type.as_str(), candidate));
        search_collect(ordered, idx + 1, chosen, found, limit, failure);
        chosen.pop();
        if found.len() >= limit {
            return;
        }
    }
}

/// No two chosen layers may `provide` the same key with different values.
fn has_identity_conflict(chosen: &[(&str, &Layer)], candidate: &Layer) -> bool {
    let mut by_key: BTreeMap<&str, Vec<&Provided>> = BTreeMap::new();
    let existing: Vec<(&str, Provided)> = chosen
        .iter()
        .flat_map(|(_, l)| {
            flat_provides(l).into_iter().map(|e| {
                (
                    e.key.as_str(),
                    Provided { value: e.value.clone(), layer: l.name.as_str() },
                )
            })
        })
        .collect();
    for (key, provided) in &existing {
        by_key.entry(key).or_default().push(provided);
    }

    for entry in flat_provides(candidate) {
        if let Some(others) = by_key.get(entry.key.as_str()) {
            for other in others {
                if let (Some(a), Some(b)) = (&entry.value, &other.value) {
                    if a != b {
                        return true;
                    }
                }
            }
        }
    }
    false
}

/// Every chosen layer's `consumes` must be satisfied by some *other* chosen
/// layer's `provides` (wildcard-or-equal value match).
fn check_consumes(chosen: &[(&str, &Layer)], failure: &mut Vec<Unsatisfied>) -> bool {
    let provides: Vec<(&str, &ConnectionEntry)> = chosen
        .iter()
        .flat_map(|(_, l)| flat_provides(l).into_iter().map(move |e| (l.name.as_str(), e)))
        .collect();

    let mut ok = true;
    for (_, layer) in chosen {
        for consume in flat_consumes(layer) {
            let satisfied = provides.iter().any(|(_, p)| p.satisfies(consume));
            if !satisfied {
                ok = false;
                failure.push(Unsatisfied {
                    consumer_layer: layer.name.clone(),
                    key: consume.key.clone(),
                });
            }
        }
    }
    ok
}
