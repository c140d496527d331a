// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Memory-management primitives: audits, space reallocation, become:,
//! allInstances, walkbacks, image save, and the global collector.

use crate::error::VmError;
use crate::interp::Interpreter;
use crate::memory::space_index;
use crate::object::{ObjectFlags, well_known};
use crate::oop::Oop;
use log::warn;

pub const PRIM_AUDIT_IMAGE: u16 = 300;
pub const PRIM_REALLOCATE_OBJECT_SPACES: u16 = 301;
pub const PRIM_SET_SYSTEM: u16 = 302;
pub const PRIM_REALLOCATE_SPACE: u16 = 303;

pub const PRIM_BECOME: u16 = 555;
pub const PRIM_ALL_INSTANCES: u16 = 556;
pub const PRIM_WALKBACK: u16 = 557;
pub const PRIM_SAVE_IMAGE: u16 = 558;
pub const PRIM_GLOBAL_GC: u16 = 559;

pub fn prim_audit_image(interp: &mut Interpreter) -> Result<(), VmError> {
    interp.mem.audit_image()?;
    interp.push(Oop::small_int(0));
    interp.push(Oop::small_int(0));
    Ok(())
}

pub fn prim_reallocate_object_spaces(interp: &mut Interpreter) -> Result<(), VmError> {
    for space in [
        space_index::EDEN,
        space_index::SURVIVOR1,
        space_index::SURVIVOR2,
        space_index::OLD,
    ] {
        let size = interp.mem.spaces[space].space_size;
        interp.mem.reallocate_space(space, size)?;
    }
    interp.mem.audit_image()?;
    interp.capture_fast_context();
    interp.push(Oop::small_int(0));
    interp.push(Oop::small_int(0));
    Ok(())
}

pub fn prim_set_system(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    interp.mem.set_known(well_known::SYSTEM_CLASS, receiver);
    interp.push(Oop::small_int(0));
    interp.push(Oop::small_int(0));
    Ok(())
}

pub fn prim_reallocate_space(interp: &mut Interpreter) -> Result<(), VmError> {
    let space_number = interp.local(0);
    let size = interp.local(1);

    if !space_number.is_small_int() {
        interp.push(Oop::small_int(1));
        let receiver = interp.receiver();
        interp.push(receiver);
        return Ok(());
    }
    let space_number = space_number.as_small_int();
    if !(0..=255).contains(&space_number) || space_number as usize >= interp.mem.spaces.len() {
        interp.push(Oop::small_int(2));
        let receiver = interp.receiver();
        interp.push(receiver);
        return Ok(());
    }
    if !size.is_small_int() {
        interp.push(Oop::small_int(3));
        let receiver = interp.receiver();
        interp.push(receiver);
        return Ok(());
    }
    let size = size.as_small_int();
    if size < 0 {
        interp.push(Oop::small_int(4));
        let receiver = interp.receiver();
        interp.push(receiver);
        return Ok(());
    }

    interp
        .mem
        .reallocate_space(space_number as usize, size as u64)?;
    interp.mem.audit_image()?;
    interp.capture_fast_context();

    interp.push(Oop::small_int(0));
    interp.push(Oop::small_int(0));
    Ok(())
}

/// Exchange two headers in place: every header field including the
/// identity hash moves, the body back-pointers are repaired, and
/// remembered-set registrations follow the headers.
fn swap_headers(interp: &mut Interpreter, object1: Oop, object2: Oop) {
    let mem = &mut interp.mem;
    let registered1 = mem.unregister_remembered(object1);
    let registered2 = mem.unregister_remembered(object2);

    for field in 0..crate::object::HEADER_WORDS {
        let word1 = mem.word(object1.bits() + field * 8);
        let word2 = mem.word(object2.bits() + field * 8);
        mem.set_word(object1.bits() + field * 8, word2);
        mem.set_word(object2.bits() + field * 8, word1);
    }

    mem.set_body_header_pointer(object1);
    mem.set_body_header_pointer(object2);

    if registered1 {
        mem.register_remembered(object2);
    }
    if registered2 {
        mem.register_remembered(object1);
    }
}

/// become: swap the receiver's and the argument's headers so every
/// reference to one now reaches the other. Objects still in new space
/// are forced through tenure first so both sit in a compactable space.
pub fn prim_become(interp: &mut Interpreter) -> Result<(), VmError> {
    interp.mem.scavenge()?;

    let receiver = interp.receiver();
    let arg = interp.local(0);

    if receiver.is_immediate() || arg.is_immediate() {
        interp.push(Oop::small_int(1));
        interp.push(Oop::small_int(1));
        return Ok(());
    }

    let survivor = interp.mem.active_survivor;
    if (interp.mem.is_object_in_space(receiver, survivor)
        && interp.mem.is_object_in_space(arg, survivor))
        || (interp.mem.is_in_old_space(receiver) && interp.mem.is_in_old_space(arg))
    {
        swap_headers(interp, receiver, arg);
        interp.push(Oop::small_int(0));
        interp.push(Oop::small_int(1));
        return Ok(());
    }

    if interp.mem.is_object_in_space(receiver, survivor) {
        interp.mem.set_flips(receiver, u16::MAX);
    }
    if interp.mem.is_object_in_space(arg, survivor) {
        interp.mem.set_flips(arg, u16::MAX);
    }

    interp.mem.scavenge()?;

    // The locals were traced by the scavenge; re-read the moved oops.
    let receiver = interp.receiver();
    let arg = interp.local(0);

    if interp.mem.is_in_old_space(receiver) && interp.mem.is_in_old_space(arg) {
        swap_headers(interp, receiver, arg);
        interp.push(Oop::small_int(0));
        interp.push(Oop::small_int(1));
        return Ok(());
    }

    interp.push(Oop::small_int(1));
    interp.push(Oop::small_int(1));
    Ok(())
}

/// Collect every instance of the receiver class into an array grown in
/// place at the allocation edge of Eden.
pub fn prim_all_instances(interp: &mut Interpreter) -> Result<(), VmError> {
    interp.mem.scavenge()?;

    let array_class = interp.mem.known(well_known::ARRAY_CLASS);
    let array = interp
        .mem
        .new_instance_of(array_class, 1, space_index::EDEN)?;

    // Shrink to zero elements; the collection loop grows the body
    // downward into Eden's free space, one element at a time.
    let size = interp.mem.mem_size(array);
    interp.mem.set_mem_size(array, size - 8);
    let body = interp.mem.body_pointer(array);
    interp.mem.set_body_pointer(array, body + 8);

    let receiver = interp.receiver();
    let mut instances = 0u64;

    for space in [interp.mem.active_survivor, space_index::OLD] {
        for object in interp.mem.object_headers(space) {
            if interp.mem.is_free(object)
                || interp.mem.flags(object).contains(ObjectFlags::RELOCATED)
            {
                continue;
            }
            if interp.mem.class_field(object) == receiver {
                let size = interp.mem.mem_size(array);
                interp.mem.set_mem_size(array, size + 8);
                let body = interp.mem.body_pointer(array);
                interp.mem.set_body_pointer(array, body - 8);
                interp.mem.inst_var_put(array, 0, object);
                interp.mem.spaces[space_index::EDEN].last_free_block -= 1;
                instances += 1;
            }
        }
    }

    let sentinel = interp
        .mem
        .space_word_addr(space_index::EDEN, interp.mem.spaces[space_index::EDEN].last_free_block);
    interp.mem.set_word(sentinel, 0);
    if instances == 0 {
        interp.mem.set_body_pointer(array, 0);
    }

    interp.push(Oop::small_int(0));
    interp.push(array);
    Ok(())
}

pub fn prim_walkback(interp: &mut Interpreter) -> Result<(), VmError> {
    interp.dump_walkback("Walkback primitive");
    let dump = interp.walkback_dump.clone();
    let string = crate::image::bootstrap::new_string(&mut interp.mem, &dump)?;
    interp.push(Oop::small_int(0));
    interp.push(string);
    Ok(())
}

pub fn prim_save_image(interp: &mut Interpreter) -> Result<(), VmError> {
    let path = interp.local(0);
    let mut file_name = interp.mem.string_of(path);
    file_name.push_str(".im");

    let mut bytes = Vec::new();
    crate::image::save_image(&mut interp.mem, &mut bytes)?;
    if let Err(message) = interp.platform.write_image(&file_name, &bytes) {
        warn!("image save failed: {message}");
    }

    interp.push(Oop::small_int(0));
    interp.push(Oop::small_int(0));
    Ok(())
}

pub fn prim_global_garbage_collect(interp: &mut Interpreter) -> Result<(), VmError> {
    interp.mem.global_garbage_collect()?;
    interp.capture_fast_context();
    interp.push(Oop::small_int(0));
    interp.push(Oop::small_int(0));
    Ok(())
}
