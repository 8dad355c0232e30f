#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

use qsa_interface::{carrier_layout, slot_assignments, WorkflowResult};
use serde::{Deserialize, Serialize};

/// One line of an operator's selection: a SKU and how many of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Module SKU.
    pub sku: String,
    /// Host order the modules belong to.
    pub order_id: i64,
    /// How many modules of this line to engrave.
    pub quantity: u32,
    /// Source production batch in the host catalog.
    pub production_batch_id: i64,
    /// LED component codes fitted on this module, in component order.
    pub led_codes: Vec<String>,
}

/// One physical module awaiting engraving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInstance {
    /// Module SKU.
    pub module_sku: String,
    /// Host order it belongs to.
    pub order_id: i64,
    /// Source production batch.
    pub production_batch_id: i64,
    /// LED component codes, in component order.
    pub led_codes: Vec<String>,
}

/// A module with its assigned carrier slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedModule {
    /// The module.
    pub module: ModuleInstance,
    /// Slot on its carrier, 1-8.
    pub array_position: u8,
}

/// Expands selections into one instance per physical module, preserving
/// selection order.
pub fn expand(selections: &[Selection]) -> Vec<ModuleInstance> {
    selections
        .iter()
        .flat_map(|selection| {
            (0..selection.quantity).map(|_| ModuleInstance {
                module_sku: selection.sku.clone(),
                order_id: selection.order_id,
                production_batch_id: selection.production_batch_id,
                led_codes: selection.led_codes.clone(),
            })
        })
        .collect()
}

/// Stable-sorts instances to minimize LED-code transitions between
/// neighbors: by LED-code tuple, then SKU, then order. A greedy
/// lexicographic sort keeps equal tuples adjacent, which is all the
/// rework station needs, and stays deterministic.
pub fn sort(mut instances: Vec<ModuleInstance>) -> Vec<ModuleInstance> {
    instances.sort_by(|a, b| {
        a.led_codes
            .cmp(&b.led_codes)
            .then_with(|| a.module_sku.cmp(&b.module_sku))
            .then_with(|| a.order_id.cmp(&b.order_id))
    });
    instances
}

/// Slices sorted instances into carriers using the shared layout rule.
pub fn assign_to_carriers(
    sorted: &[ModuleInstance],
    start_position: u8,
) -> WorkflowResult<Vec<Vec<PlacedModule>>> {
    let spans = carrier_layout(sorted.len(), start_position)?;
    let assignments = slot_assignments(&spans);
    let mut carriers: Vec<Vec<PlacedModule>> = vec![Vec::new(); spans.len()];
    for (module, assignment) in sorted.iter().zip(assignments) {
        carriers[assignment.carrier_index].push(PlacedModule {
            module: module.clone(),
            array_position: assignment.array_position,
        });
    }
    Ok(carriers)
}

/// Number of adjacent pairs whose LED-code tuples differ.
pub fn count_transitions(sorted: &[ModuleInstance]) -> usize {
    sorted
        .windows(2)
        .filter(|pair| pair[0].led_codes != pair[1].led_codes)
        .count()
}

/// All distinct LED codes across the instances, sorted.
pub fn distinct_led_codes(instances: &[ModuleInstance]) -> Vec<String> {
    let mut codes: Vec<String> = instances
        .iter()
        .flat_map(|m| m.led_codes.iter().cloned())
        .collect();
    codes.sort_unstable();
    codes.dedup();
    codes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(sku: &str, order: i64, qty: u32, leds: &[&str]) -> Selection {
        Selection {
            sku: sku.to_string(),
            order_id: order,
            quantity: qty,
            production_batch_id: 500,
            led_codes: leds.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn expand_multiplies_quantities_in_order() {
        let instances = expand(&[
            selection("CUBE-00001", 1, 3, &["W2A"]),
            selection("STAR-00002", 2, 1, &["R1B"]),
        ]);
        assert_eq!(instances.len(), 4);
        assert!(instances[..3].iter().all(|m| m.module_sku == "CUBE-00001"));
        assert_eq!(instances[3].module_sku, "STAR-00002");
    }

    #[test]
    fn sort_groups_equal_led_tuples() {
        let instances = expand(&[
            selection("AAA-1", 1, 2, &["W2A"]),
            selection("BBB-1", 2, 2, &["R1B"]),
            selection("CCC-1", 3, 2, &["W2A"]),
        ]);
        let sorted = sort(instances);
        assert_eq!(count_transitions(&sorted), 1);
        // R1B group first (lexicographic), then both W2A groups together.
        assert_eq!(sorted[0].led_codes, vec!["R1B"]);
        assert_eq!(sorted[2].led_codes, vec!["W2A"]);
        assert_eq!(sorted[2].module_sku, "AAA-1");
        assert_eq!(sorted[4].module_sku, "CCC-1");
    }

    #[test]
    fn unsorted_input_has_more_transitions() {
        let interleaved = vec![
            expand(&[selection("A", 1, 1, &["W2A"])]),
            expand(&[selection("B", 1, 1, &["R1B"])]),
            expand(&[selection("C", 1, 1, &["W2A"])]),
            expand(&[selection("D", 1, 1, &["R1B"])]),
        ]
        .concat();
        assert_eq!(count_transitions(&interleaved), 3);
        assert_eq!(count_transitions(&sort(interleaved)), 1);
    }

    #[test]
    fn assignment_respects_start_position() {
        let instances = sort(expand(&[selection("CUBE-00001", 1, 10, &["W2A"])]));
        let carriers = assign_to_carriers(&instances, 6).unwrap();
        assert_eq!(carriers.len(), 2);
        assert_eq!(carriers[0].len(), 3);
        assert_eq!(carriers[0][0].array_position, 6);
        assert_eq!(carriers[0][2].array_position, 8);
        assert_eq!(carriers[1].len(), 7);
        assert_eq!(carriers[1][0].array_position, 1);
    }

    #[test]
    fn distinct_codes_are_sorted_and_deduped() {
        let instances = expand(&[
            selection("A", 1, 1, &["W2A", "R1B"]),
            selection("B", 2, 1, &["R1B", "G3C"]),
        ]);
        assert_eq!(distinct_led_codes(&instances), vec!["G3C", "R1B", "W2A"]);
    }

    #[test]
    fn empty_selection_yields_empty_everything() {
        let instances = expand(&[]);
        assert!(instances.is_empty());
        assert_eq!(count_transitions(&instances), 0);
        assert!(assign_to_carriers(&instances, 1).unwrap().is_empty());
    }
}
