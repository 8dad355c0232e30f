use serde::{Deserialize, Serialize};

use crate::{ErrorCode, WorkflowError};

/// Number of module slots on one physical carrier.
pub const CARRIER_SLOTS: u8 = 8;

/// One physical carrier's share of a row: a run of consecutive slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierSpan {
    /// First occupied slot, 1-based.
    pub start_slot: u8,
    /// Number of occupied slots starting at `start_slot`.
    pub count: usize,
}

impl CarrierSpan {
    /// The occupied slot numbers in order.
    pub fn slots(&self) -> impl Iterator<Item = u8> + '_ {
        self.start_slot..self.start_slot + self.count as u8
    }
}

/// A module's place after layout: which carrier (0-based) and which slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    /// Index of the carrier within the row, 0-based.
    pub carrier_index: usize,
    /// Slot on that carrier, 1-based.
    pub array_position: u8,
}

/// Slices `module_count` modules into physical carriers starting at
/// `start_position`.
///
/// The first carrier holds `min(N, 9 - start_position)` modules at slots
/// `start_position..=8`; the remainder fills full carriers of eight from
/// slot 1, the last possibly partial. This is the single layout rule shared
/// by batch redistribution and carrier assignment.
pub fn carrier_layout(
    module_count: usize,
    start_position: u8,
) -> Result<Vec<CarrierSpan>, WorkflowError> {
    if start_position == 0 || start_position > CARRIER_SLOTS {
        return Err(WorkflowError::validation(
            ErrorCode::InvalidPosition,
            format!("start position {} outside [1, {}]", start_position, CARRIER_SLOTS),
        ));
    }
    let mut spans = Vec::new();
    let mut remaining = module_count;

    let first = remaining.min((CARRIER_SLOTS - start_position + 1) as usize);
    if first > 0 {
        spans.push(CarrierSpan {
            start_slot: start_position,
            count: first,
        });
        remaining -= first;
    }
    while remaining > 0 {
        let count = remaining.min(CARRIER_SLOTS as usize);
        spans.push(CarrierSpan {
            start_slot: 1,
            count,
        });
        remaining -= count;
    }
    Ok(spans)
}

/// Flattens a layout into one assignment per module, in module order.
pub fn slot_assignments(spans: &[CarrierSpan]) -> Vec<SlotAssignment> {
    spans
        .iter()
        .enumerate()
        .flat_map(|(carrier_index, span)| {
            span.slots().map(move |array_position| SlotAssignment {
                carrier_index,
                array_position,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_carriers_from_slot_one() {
        let spans = carrier_layout(24, 1).unwrap();
        assert_eq!(spans.len(), 3);
        assert!(spans.iter().all(|s| s.start_slot == 1 && s.count == 8));
    }

    #[test]
    fn shifted_start_adds_a_carrier() {
        // 24 modules from slot 6: 3 + 8 + 8 + 5
        let spans = carrier_layout(24, 6).unwrap();
        assert_eq!(
            spans,
            vec![
                CarrierSpan { start_slot: 6, count: 3 },
                CarrierSpan { start_slot: 1, count: 8 },
                CarrierSpan { start_slot: 1, count: 8 },
                CarrierSpan { start_slot: 1, count: 5 },
            ]
        );
        assert_eq!(spans.iter().map(|s| s.count).sum::<usize>(), 24);
    }

    #[test]
    fn short_row_fits_first_carrier() {
        let spans = carrier_layout(2, 7).unwrap();
        assert_eq!(spans, vec![CarrierSpan { start_slot: 7, count: 2 }]);
    }

    #[test]
    fn empty_row_has_no_carriers() {
        assert!(carrier_layout(0, 3).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_start_position() {
        assert!(carrier_layout(8, 0).is_err());
        assert!(carrier_layout(8, 9).is_err());
    }

    #[test]
    fn assignments_follow_module_order() {
        let spans = carrier_layout(10, 8).unwrap();
        let assignments = slot_assignments(&spans);
        assert_eq!(assignments.len(), 10);
        assert_eq!(assignments[0].carrier_index, 0);
        assert_eq!(assignments[0].array_position, 8);
        assert_eq!(assignments[1].carrier_index, 1);
        assert_eq!(assignments[1].array_position, 1);
        assert_eq!(assignments[9].carrier_index, 2);
        assert_eq!(assignments[9].array_position, 1);
    }
}
