// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for spaces, allocation and the remembered set.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::space_index;
use crate::image::bootstrap::{class_named, new_identity_dictionary, identity_dictionary_at_put};
use crate::object::{self, well_known};
use crate::oop::Oop;
use crate::testkit;

#[test]
fn bootstrap_world_audits_clean() {
    let mem = testkit::small_world();
    mem.audit_image().unwrap();
    assert!(!mem.nil().is_null());
    assert_ne!(mem.true_oop(), mem.false_oop());
}

#[test]
fn allocation_maintains_back_pointer() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);
    let object = mem
        .new_instance_of(array_class, 5, space_index::EDEN)
        .unwrap();

    assert_eq!(mem.body_header_pointer(object), object.bits());
    assert_eq!(mem.total_object_size(object), 5);
    assert_eq!(mem.indexed_object_size(object), 5);
    assert!(mem.is_in_eden(object));
    assert!(mem.is_body_in_space(object, space_index::EDEN));
}

#[test]
fn new_instances_are_nil_filled() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);
    let object = mem
        .new_instance_of(array_class, 3, space_index::EDEN)
        .unwrap();

    let nil = mem.nil();
    for i in 0..3 {
        assert_eq!(mem.inst_var(object, i), nil);
    }
    assert_eq!(mem.class_of(object), array_class);
    assert_eq!(mem.flips(object), 0);
}

#[test]
fn byte_instances_are_zero_filled() {
    let mut mem = testkit::small_world();
    let string_class = mem.known(well_known::BYTE_STRING_CLASS);
    let object = mem
        .new_instance_of(string_class, 11, space_index::EDEN)
        .unwrap();

    assert!(mem.is_bytes(object));
    assert_eq!(mem.basic_byte_size(object), 11);
    for i in 0..11 {
        assert_eq!(mem.body_byte(object, i), 0);
    }
    assert_eq!(mem.named_inst_vars(object), 0);
}

#[test]
fn identity_hash_is_sixty_bits() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);
    for _ in 0..64 {
        let object = mem
            .new_instance_of(array_class, 0, space_index::EDEN)
            .unwrap();
        assert!(mem.identity_hash(object) <= super::IDENTITY_HASH_MASK);
    }
}

#[test]
fn class_of_immediates() {
    let mem = testkit::small_world();
    assert_eq!(
        mem.class_of(Oop::small_int(7)),
        mem.known(well_known::SMALL_INTEGER_CLASS)
    );
    assert_eq!(
        mem.class_of(Oop::character(65)),
        mem.known(well_known::CHARACTER_CLASS)
    );
    assert_eq!(
        mem.class_of(Oop::float(1.5)),
        mem.known(well_known::FLOAT_CLASS)
    );
    // Context pointers answer SmallInteger.
    assert_eq!(
        mem.class_of(Oop::pointer(0x100).as_context_pointer()),
        mem.known(well_known::SMALL_INTEGER_CLASS)
    );
}

#[test]
fn remembered_set_register_find_unregister() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);
    let object = mem
        .new_instance_of(array_class, 0, space_index::OLD)
        .unwrap();

    assert!(!mem.find_remembered(object));
    mem.register_remembered(object);
    assert!(mem.find_remembered(object));

    // Registering twice keeps a single entry.
    mem.register_remembered(object);
    assert!(mem.unregister_remembered(object));
    assert!(!mem.find_remembered(object));
    assert!(!mem.unregister_remembered(object));
}

#[test]
fn old_to_new_store_registers_in_remembered_set() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);
    let old_holder = mem
        .new_instance_of(array_class, 1, space_index::OLD)
        .unwrap();
    let young = mem
        .new_instance_of(array_class, 0, space_index::EDEN)
        .unwrap();

    mem.inst_var_put(old_holder, 0, young);
    assert!(mem.find_remembered(old_holder));

    // New-to-new stores stay out of the set.
    let young_holder = mem
        .new_instance_of(array_class, 1, space_index::EDEN)
        .unwrap();
    let other = mem
        .new_instance_of(array_class, 0, space_index::EDEN)
        .unwrap();
    mem.inst_var_put(young_holder, 0, other);
    assert!(!mem.find_remembered(young_holder));
}

#[test]
fn rehash_keeps_every_entry() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);
    let mut objects = Vec::new();
    for _ in 0..16 {
        let object = mem
            .new_instance_of(array_class, 0, space_index::OLD)
            .unwrap();
        mem.register_remembered(object);
        objects.push(object);
    }

    mem.rehash_remembered_set();
    for object in objects {
        assert!(mem.find_remembered(object));
    }
}

#[test]
fn identity_dictionary_lookup() {
    let mut mem = testkit::small_world();
    let dictionary_class = class_named(&mem, "IdentityDictionary").unwrap();
    let dictionary = new_identity_dictionary(&mut mem, dictionary_class, 8).unwrap();

    let key = crate::image::bootstrap::new_symbol(&mut mem, "key").unwrap();
    let value = Oop::small_int(99);
    identity_dictionary_at_put(&mut mem, dictionary, key, value).unwrap();

    assert_eq!(mem.identity_dictionary_at(dictionary, key), value);
    assert_eq!(mem.identity_dictionary_key_at_value(dictionary, value), key);

    let missing = crate::image::bootstrap::new_symbol(&mut mem, "missing").unwrap();
    assert_eq!(mem.identity_dictionary_at(dictionary, missing), mem.nil());
}

#[test]
fn global_variables_resolve_through_the_system_dictionary() {
    let mem = testkit::small_world();
    let array_class = mem.known(crate::object::well_known::ARRAY_CLASS);
    let name = mem.inst_var(array_class, object::class::NAME);

    assert_eq!(mem.global_variable_at(name), array_class);
}

#[test]
fn eval_stack_keeps_heap_in_lockstep() {
    let mut mem = testkit::small_world();
    let context_class = mem.known(well_known::CODE_CONTEXT_CLASS);
    let context = mem
        .new_instance_of(context_class, 0, space_index::STACK)
        .unwrap();
    mem.basic_inst_var_put(context, object::context::STACK_OFFSET, Oop::small_int(0));
    mem.current_context = context;

    let before_free = mem.spaces[space_index::STACK].first_free_block;
    let before_size = mem.mem_size(context);

    mem.eval_push(Oop::small_int(41));
    assert_eq!(
        mem.inst_var(context, object::context::STACK_OFFSET),
        Oop::small_int(1)
    );
    assert_eq!(mem.mem_size(context), before_size + 8);
    assert_eq!(mem.spaces[space_index::STACK].first_free_block, before_free + 1);

    let popped = mem.eval_pop();
    assert_eq!(popped, Oop::small_int(41));
    assert_eq!(
        mem.inst_var(context, object::context::STACK_OFFSET),
        Oop::small_int(0)
    );
    assert_eq!(mem.mem_size(context), before_size);
    assert_eq!(mem.spaces[space_index::STACK].first_free_block, before_free);
}

#[test]
fn stack_space_headers_grow_downward() {
    let mut mem = testkit::small_world();
    let context_class = mem.known(well_known::CODE_CONTEXT_CLASS);
    let first = mem
        .new_instance_of(context_class, 0, space_index::STACK)
        .unwrap();
    let second = mem
        .new_instance_of(context_class, 0, space_index::STACK)
        .unwrap();

    assert!(second.bits() < first.bits());
    assert!(mem.body_pointer(second) > mem.body_pointer(first));
    assert!(mem.is_in_stack_space(first));
    assert!(mem.is_in_stack_space(second));
}

#[test]
fn check_object_accepts_live_rejects_wild() {
    let mut mem = testkit::small_world();
    let array_class = mem.known(well_known::ARRAY_CLASS);
    let object = mem
        .new_instance_of(array_class, 1, space_index::EDEN)
        .unwrap();

    assert!(mem.check_object(object));
    assert!(mem.check_object(Oop::small_int(5)));
    assert!(mem.is_valid_oop(object));
    assert!(!mem.is_valid_oop(Oop::pointer(8)));
}

#[test]
fn space_allocation_fails_past_arena() {
    let mut mem = super::ObjectMemory::new(4096);
    let result = mem.allocate_space(
        1024 * 1024,
        super::SpaceType::Eden,
        super::SpaceFlags::IS_OBJECT_SPACE,
    );
    assert!(matches!(
        result,
        Err(crate::error::VmError::OutOfMemory { .. })
    ));
}
