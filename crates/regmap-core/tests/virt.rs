//! Integration tests for virtual devices
//!
//! Follows a virtual device through map reloads and verifies the shadow
//! buffer, the physical buffer, and the loader call sequence at every step.

use std::cell::RefCell;
use std::rc::Rc;

use regmap_core::{Device, Field, FieldMap, Flags, MapLoader, MemTransport, RegmapError, Result, VirtualDevice};

static MAP1: &[Field] = &[
    Field::new("A", 0, 0, 8, Flags::empty()),
    Field::new("B", 0, 8, 8, Flags::empty()),
    Field::new("C", 1, 0, 16, Flags::empty()),
];

static MAP2: &[Field] = &[
    Field::new("P", 0, 0, 8, Flags::empty()),
    Field::new("Q", 0, 8, 8, Flags::NORESET),
    Field::new("A", 1, 0, 16, Flags::empty()),
];

static MAPS: &[FieldMap] = &[FieldMap::new(MAP1), FieldMap::new(MAP2)];

static NAMES: &[&str] = &["A", "B", "C", "P", "Q"];

/// Loader that records every configuration id it is asked to load.
fn recording_loader(log: Rc<RefCell<Vec<usize>>>) -> impl MapLoader {
    move |id: usize| -> Result<()> {
        log.borrow_mut().push(id);
        Ok(())
    }
}

fn vdev(log: Rc<RefCell<Vec<usize>>>) -> VirtualDevice<MemTransport, impl MapLoader> {
    let base = Device::unmapped(16, 2, MemTransport::new(2)).unwrap();
    let mut v = VirtualDevice::new(NAMES, MAPS, base, recording_loader(log));
    v.verify().unwrap();
    v
}

#[test]
fn test_verify_checks_every_map_without_hardware_traffic() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let v = vdev(Rc::clone(&log));

    // verify exercises the maps with NOCOMM forced and never calls the loader
    assert!(v.base().transport().journal().is_empty());
    assert!(log.borrow().is_empty());
    assert!(v.active_map().is_none());
}

#[test]
fn test_verify_rejects_unmapped_names() {
    static BAD_NAMES: &[&str] = &["A", "MISSING"];
    let base = Device::unmapped(16, 2, MemTransport::new(2)).unwrap();
    let mut v = VirtualDevice::new(BAD_NAMES, MAPS, base, |_: usize| Ok(()));
    assert!(matches!(v.verify(), Err(RegmapError::UnmappedField("MISSING"))));
}

#[test]
fn test_verify_accepts_purely_virtual_names() {
    static VIRT_NAMES: &[&str] = &["A", "_NOTE"];
    let base = Device::unmapped(16, 2, MemTransport::new(2)).unwrap();
    let mut v = VirtualDevice::new(VIRT_NAMES, MAPS, base, |_: usize| Ok(()));
    v.verify().unwrap();
}

#[test]
fn test_reload_sequence_and_reset_pass() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut v = vdev(Rc::clone(&log));

    // map 1 is installed lazily and serves A directly
    v.adjust("A", 0xFF).unwrap();
    assert_eq!(v.active_map(), Some(0));
    assert_eq!(v.base().data(), &[0x00FF, 0x0000]);

    // P lives in map 2: reload, re-materialize A, then write P
    v.adjust("P", 0xFF).unwrap();
    assert_eq!(v.active_map(), Some(1));
    assert_eq!(v.base().data(), &[0x00FF, 0x00FF]);

    // Q is in the active map; no reload
    v.adjust("Q", 0x67).unwrap();
    assert_eq!(v.base().data(), &[0x67FF, 0x00FF]);

    // B forces a reload back to map 1; Q has NORESET and is not
    // re-materialized when map 2 is left later, nor does it exist in map 1
    v.adjust("B", 0xFF).unwrap();
    assert_eq!(v.active_map(), Some(0));

    // the shadow buffer remembers everything ever adjusted
    for (name, value) in [("A", 0xFF), ("B", 0xFF), ("C", 0), ("P", 0xFF), ("Q", 0x67)] {
        assert_eq!(v.obtain(name).unwrap(), value, "shadow slot {name}");
    }

    // physical side: A and B re-materialized, C reset to zero
    assert_eq!(v.base().data(), &[0xFFFF, 0x0000]);

    // loader saw: lazy install, switch to map 2, switch back to map 1
    assert_eq!(log.borrow().as_slice(), &[0, 1, 0]);
}

#[test]
fn test_value_narrowing_selects_wider_map() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut v = vdev(Rc::clone(&log));

    v.adjust("A", 0xFF).unwrap();
    v.adjust("P", 0xFF).unwrap();
    v.adjust("Q", 0x67).unwrap();
    v.adjust("B", 0xFF).unwrap();

    // A no longer fits its 8-bit slot in map 1; map 2 carries it at 16 bits
    v.adjust("A", 0xFFFF).unwrap();
    assert_eq!(v.active_map(), Some(1));
    assert_eq!(log.borrow().last(), Some(&1));
    assert_eq!(v.obtain("A").unwrap(), 0xFFFF);
    assert_eq!(v.base().data()[1], 0xFFFF);

    // B and C are dropped from the physical side but stay in the shadow
    assert_eq!(v.base_mut().get("A").unwrap(), 0xFFFF);
    assert!(v.base_mut().get("B").is_err());
    assert_eq!(v.obtain("B").unwrap(), 0xFF);

    // P is re-materialized by the reset pass, Q is NORESET and is not
    assert_eq!(v.base().data()[0], 0x00FF);
    assert_eq!(v.base_mut().get("Q").unwrap(), 0);
    assert_eq!(v.obtain("Q").unwrap(), 0x67);
}

#[test]
fn test_noreset_divergence_heals_on_adjust() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut v = vdev(Rc::clone(&log));

    v.adjust("Q", 0x67).unwrap();
    v.adjust("B", 0x12).unwrap(); // leaves map 2
    v.adjust("P", 0x34).unwrap(); // back to map 2; Q not re-materialized

    assert_eq!(v.base_mut().get("Q").unwrap(), 0);
    assert_eq!(v.obtain("Q").unwrap(), 0x67);

    // an explicit adjust re-synchronizes the two views
    v.adjust("Q", 0x67).unwrap();
    assert_eq!(v.base_mut().get("Q").unwrap(), 0x67);
}

#[test]
fn test_device_level_noreset_skips_every_field() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut v = vdev(Rc::clone(&log));
    v.base_mut().set_flags(Flags::NORESET);

    v.adjust("A", 0xFF).unwrap();
    v.adjust("P", 0x12).unwrap(); // reload to map 2; nothing re-materialized

    // A is in map 2 but the device-wide NORESET kept it out of the pass
    assert_eq!(v.base().data(), &[0x0012, 0x0000]);
    assert_eq!(v.obtain("A").unwrap(), 0xFF);
}

#[test]
fn test_loader_failure_leaves_old_map_active() {
    let calls = Rc::new(RefCell::new(0usize));
    let calls_in_loader = Rc::clone(&calls);
    let loader = move |id: usize| -> Result<()> {
        *calls_in_loader.borrow_mut() += 1;
        if id == 1 {
            return Err(RegmapError::transport("configuration bus stuck"));
        }
        Ok(())
    };

    let base = Device::unmapped(16, 2, MemTransport::new(2)).unwrap();
    let mut v = VirtualDevice::new(NAMES, MAPS, base, loader);
    v.verify().unwrap();

    v.adjust("A", 0x11).unwrap();
    assert!(matches!(v.adjust("P", 1), Err(RegmapError::Transport(_))));

    // the reload never happened; map 1 is still active and serving
    assert_eq!(v.active_map(), Some(0));
    v.adjust("B", 0x22).unwrap();
    assert_eq!(v.base().data()[0], 0x2211);
    assert_eq!(*calls.borrow(), 2);
}
