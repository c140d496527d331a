// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the copying scavenger.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::space_index;
use crate::object::well_known;
use crate::oop::Oop;
use crate::testkit;

/// Park an object in a well-known slot so the scavenger treats it as a
/// root, and answer the slot for later re-reads.
const SCRATCH_SLOT: u64 = well_known::BYTECODE_TABLE;

#[test]
fn live_eden_object_moves_to_survivor() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);
    let object = mem
        .new_instance_of(array_class, 2, space_index::EDEN)
        .unwrap();
    mem.inst_var_put(object, 0, Oop::small_int(123));
    mem.set_known(SCRATCH_SLOT, object);
    let hash = mem.identity_hash(object);

    mem.scavenge().unwrap();

    let moved = mem.known(SCRATCH_SLOT);
    assert_ne!(moved, object);
    assert!(mem.is_object_in_space(moved, mem.active_survivor));
    assert_eq!(mem.identity_hash(moved), hash);
    assert_eq!(mem.inst_var(moved, 0), Oop::small_int(123));
    assert_eq!(mem.class_of(moved), array_class);

    // Eden is empty again.
    assert_eq!(mem.spaces[space_index::EDEN].first_free_block, 0);
    mem.audit_image().unwrap();
}

#[test]
fn garbage_does_not_survive() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);
    let _garbage = mem
        .new_instance_of(array_class, 64, space_index::EDEN)
        .unwrap();

    let survivor_used_before = mem.spaces[mem.inactive_survivor].first_free_block;
    mem.scavenge().unwrap();
    // Nothing rooted the garbage, so the (now active) survivor space
    // holds no copies.
    assert_eq!(mem.spaces[mem.active_survivor].first_free_block, survivor_used_before);
}

#[test]
fn reachable_graph_survives_through_slots() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);

    let inner = mem
        .new_instance_of(array_class, 1, space_index::EDEN)
        .unwrap();
    mem.inst_var_put(inner, 0, Oop::small_int(7));
    let outer = mem
        .new_instance_of(array_class, 1, space_index::EDEN)
        .unwrap();
    mem.inst_var_put(outer, 0, inner);
    mem.set_known(SCRATCH_SLOT, outer);
    let inner_hash = mem.identity_hash(inner);

    mem.scavenge().unwrap();

    let outer = mem.known(SCRATCH_SLOT);
    let inner = mem.inst_var(outer, 0);
    assert!(mem.is_object_in_space(inner, mem.active_survivor));
    assert_eq!(mem.identity_hash(inner), inner_hash);
    assert_eq!(mem.inst_var(inner, 0), Oop::small_int(7));

    // No slot may point at a forwarded header after the collection.
    assert!(!mem.is_relocated(outer));
    assert!(!mem.is_relocated(inner));
}

#[test]
fn remembered_set_tracks_old_to_new_across_scavenge() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);

    let old_holder = mem
        .new_instance_of(array_class, 1, space_index::OLD)
        .unwrap();
    mem.set_known(SCRATCH_SLOT, old_holder);
    let young = mem
        .new_instance_of(array_class, 1, space_index::EDEN)
        .unwrap();
    mem.inst_var_put(old_holder, 0, young);
    assert!(mem.find_remembered(old_holder));

    mem.scavenge().unwrap();

    // The holder stayed put, the young object moved, the slot follows.
    let old_holder = mem.known(SCRATCH_SLOT);
    let moved = mem.inst_var(old_holder, 0);
    assert!(mem.is_object_in_space(moved, mem.active_survivor));
    assert!(mem.find_remembered(old_holder));

    // Severing the reference drops the holder from the set at the next
    // scavenge.
    let nil = mem.nil();
    mem.inst_var_put(old_holder, 0, nil);
    mem.scavenge().unwrap();
    let old_holder = mem.known(SCRATCH_SLOT);
    assert!(!mem.find_remembered(old_holder));
}

#[test]
fn identity_hash_stable_across_many_scavenges() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);
    let object = mem
        .new_instance_of(array_class, 1, space_index::EDEN)
        .unwrap();
    mem.inst_var_put(object, 0, Oop::small_int(5));
    mem.set_known(SCRATCH_SLOT, object);
    let hash = mem.identity_hash(object);

    for _ in 0..50 {
        mem.scavenge().unwrap();
        let current = mem.known(SCRATCH_SLOT);
        assert_eq!(mem.identity_hash(current), hash);
    }
}

#[test]
fn survivors_tenure_to_old_space_after_enough_flips() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);
    let object = mem
        .new_instance_of(array_class, 1, space_index::EDEN)
        .unwrap();
    mem.inst_var_put(object, 0, Oop::small_int(9));
    mem.set_known(SCRATCH_SLOT, object);
    let hash = mem.identity_hash(object);

    for _ in 0..400 {
        mem.scavenge().unwrap();
    }

    let tenured = mem.known(SCRATCH_SLOT);
    assert!(mem.is_in_old_space(tenured));
    assert_eq!(mem.identity_hash(tenured), hash);
    assert_eq!(mem.inst_var(tenured, 0), Oop::small_int(9));
    mem.audit_image().unwrap();
}

#[test]
fn context_tagged_slots_are_retagged_after_tracing() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);

    // A holder whose slot carries a context-tagged pointer to a heap
    // object; the tag must survive the move.
    let target = mem
        .new_instance_of(array_class, 0, space_index::EDEN)
        .unwrap();
    let holder = mem
        .new_instance_of(array_class, 1, space_index::EDEN)
        .unwrap();
    mem.basic_inst_var_put(holder, 0, target.as_context_pointer());
    mem.set_known(SCRATCH_SLOT, holder);
    let target_hash = mem.identity_hash(target);

    mem.scavenge().unwrap();

    let holder = mem.known(SCRATCH_SLOT);
    let slot = mem.inst_var(holder, 0);
    assert!(slot.is_context_pointer());
    let moved = slot.strip_tags();
    assert!(mem.is_object_in_space(moved, mem.active_survivor));
    assert_eq!(mem.identity_hash(moved), target_hash);
}

#[test]
fn scavenge_inside_allocation_when_eden_fills() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);
    let keeper = mem
        .new_instance_of(array_class, 4, space_index::EDEN)
        .unwrap();
    mem.set_known(SCRATCH_SLOT, keeper);
    let hash = mem.identity_hash(keeper);

    // Push far more garbage through Eden than it can hold; implicit
    // scavenges must keep the rooted object alive throughout.
    for _ in 0..2000 {
        mem.new_instance_of(array_class, 16, space_index::EDEN)
            .unwrap();
    }

    let keeper = mem.known(SCRATCH_SLOT);
    assert_eq!(mem.identity_hash(keeper), hash);
    mem.audit_image().unwrap();
}
