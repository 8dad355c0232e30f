use qsa_db::EngraveDb;
use qsa_interface::{ErrorCode, SerialStatus};

use crate::{CapacityThresholds, ModuleSlot, SerialStore};

fn store() -> SerialStore {
    SerialStore::new(EngraveDb::in_memory().unwrap(), CapacityThresholds::default())
}

fn slots(count: usize) -> Vec<ModuleSlot> {
    (0..count)
        .map(|i| ModuleSlot {
            module_sku: "CUBE-00001".to_string(),
            array_position: (i % 8 + 1) as u8,
        })
        .collect()
}

#[test]
fn reservations_are_monotonic_and_contiguous() {
    let store = store();

    let first = store.reserve(1, 1, &slots(8), "operator").unwrap();
    let integers: Vec<u32> = first.iter().map(|r| r.serial.get()).collect();
    assert_eq!(integers, (1..=8).collect::<Vec<_>>());
    assert_eq!(first[0].serial.padded(), "00000001");
    assert_eq!(first[7].serial.padded(), "00000008");

    let second = store.reserve(2, 1, &slots(3), "operator").unwrap();
    let integers: Vec<u32> = second.iter().map(|r| r.serial.get()).collect();
    assert_eq!(integers, vec![9, 10, 11]);
}

#[test]
fn next_free_tracks_the_high_water_mark() {
    let store = store();
    assert_eq!(store.next_free().unwrap().get(), 1);
    store.reserve(1, 1, &slots(5), "operator").unwrap();
    assert_eq!(store.next_free().unwrap().get(), 6);
}

#[test]
fn commit_is_terminal() {
    let store = store();
    store.reserve(1, 1, &slots(5), "operator").unwrap();

    assert_eq!(store.commit(1, 1).unwrap(), 5);
    assert_eq!(store.count_engraved(1, 1).unwrap(), 5);
    assert_eq!(store.count_committable(1, 1).unwrap(), 0);

    // A second commit and a late void both find nothing to transition.
    assert_eq!(store.commit(1, 1).unwrap(), 0);
    assert_eq!(store.void(1, 1).unwrap(), 0);
    assert_eq!(store.count_engraved(1, 1).unwrap(), 5);
}

#[test]
fn retry_voids_and_reallocates_fresh_integers() {
    let store = store();
    store.reserve(1, 1, &slots(5), "operator").unwrap();

    assert_eq!(store.void(1, 1).unwrap(), 5);
    let again = store.reserve(1, 1, &slots(5), "operator").unwrap();
    let integers: Vec<u32> = again.iter().map(|r| r.serial.get()).collect();
    // Voided integers are burned, not recycled.
    assert_eq!(integers, vec![6, 7, 8, 9, 10]);
    assert_eq!(store.capacity().unwrap().highest_assigned, 10);
}

#[test]
fn void_leaves_engraved_rows_alone() {
    let store = store();
    store.reserve(1, 1, &slots(3), "operator").unwrap();
    store.commit(1, 1).unwrap();

    assert_eq!(store.void(1, 1).unwrap(), 0);
    let record = store
        .find("00000001".parse().unwrap())
        .unwrap()
        .expect("serial 1 exists");
    assert_eq!(record.status, SerialStatus::Engraved);
    assert!(record.engraved_at.is_some());
    assert!(record.voided_at.is_none());
}

#[test]
fn rows_do_not_interfere() {
    let store = store();
    store.reserve(1, 1, &slots(4), "operator").unwrap();
    store.reserve(1, 2, &slots(4), "operator").unwrap();

    assert_eq!(store.commit(1, 1).unwrap(), 4);
    assert_eq!(store.count_committable(1, 2).unwrap(), 4);
    assert_eq!(store.count_engraved(1, 2).unwrap(), 0);
}

#[test]
fn empty_reservation_is_rejected() {
    let store = store();
    let err = store.reserve(1, 1, &[], "operator").unwrap_err();
    assert_eq!(err.code, ErrorCode::NoModules);
}

#[test]
fn capacity_flags_follow_thresholds() {
    let store = store();
    let capacity = store.capacity().unwrap();
    assert_eq!(capacity.highest_assigned, 0);
    assert_eq!(capacity.remaining, qsa_interface::SERIAL_MAX);
    assert!(!capacity.warning);
    assert!(!capacity.critical);

    store.reserve(1, 1, &slots(4), "operator").unwrap();
    let capacity = store.capacity().unwrap();
    assert_eq!(capacity.highest_assigned, 4);
    assert_eq!(capacity.remaining, qsa_interface::SERIAL_MAX - 4);
}

#[test]
fn find_returns_traceability_fields() {
    let store = store();
    store
        .reserve(
            7,
            3,
            &[ModuleSlot {
                module_sku: "STARa-34924".to_string(),
                array_position: 5,
            }],
            "jane",
        )
        .unwrap();

    let record = store.find("00000001".parse().unwrap()).unwrap().unwrap();
    assert_eq!(record.batch_id, 7);
    assert_eq!(record.module_sku, "STARa-34924");
    assert_eq!(record.qsa_sequence, 3);
    assert_eq!(record.array_position, 5);
    assert_eq!(record.created_by, "jane");
    assert_eq!(record.status, SerialStatus::Reserved);

    assert!(store.find("00009999".parse().unwrap()).unwrap().is_none());
}

#[test]
fn reserved_for_row_is_slot_ordered() {
    let store = store();
    let modules = vec![
        ModuleSlot {
            module_sku: "CUBE-00001".into(),
            array_position: 3,
        },
        ModuleSlot {
            module_sku: "CUBE-00001".into(),
            array_position: 1,
        },
    ];
    store.reserve(1, 2, &modules, "operator").unwrap();

    let rows = store.reserved_for_row(1, 2).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].array_position, 1);
    assert_eq!(rows[1].array_position, 3);
}
