// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The primitive function table.
//!
//! Primitives are VM operations the image calls by number through the
//! primitive-call bytecode. The calling convention: on entry the operand
//! stack holds the receiver and arguments (reachable through the locals
//! window); the primitive pops nothing and pushes `[rcode, result]`.
//! An rcode of zero means success and the primitive-return bytecode
//! propagates the result; anything else leaves the rcode for the
//! method's fallback bytecodes.
//!
//! The table has 2048 slots. Unassigned numbers (including the file and
//! socket adapters, which live outside the core) resolve to a not-found
//! handler that records an event for the embedder.

#[cfg(test)]
mod integer_test;

pub mod float;
pub mod integer;
pub mod memory;

use crate::error::VmError;
use crate::interp::Interpreter;
use crate::memory::space_index;
use crate::object::{self, well_known};
use crate::oop::Oop;

/// A VM-callable operation.
pub type PrimitiveFn = fn(&mut Interpreter) -> Result<(), VmError>;

/// Table capacity; primitive numbers are stable image contracts.
pub const PRIMITIVE_TABLE_SIZE: usize = 2048;

pub const PRIM_BASIC_AT: u16 = 60;
pub const PRIM_BASIC_AT_PUT: u16 = 61;
pub const PRIM_BASIC_SIZE: u16 = 62;
pub const PRIM_BYTESTRING_BASIC_AT: u16 = 63;
pub const PRIM_BYTESTRING_BASIC_AT_PUT: u16 = 64;
pub const PRIM_NEW: u16 = 70;
pub const PRIM_NEW_COLON: u16 = 71;
pub const PRIM_IDENTITY_HASH: u16 = 75;
pub const PRIM_IDENTICAL: u16 = 110;
pub const PRIM_CLASS: u16 = 111;
pub const PRIM_SUSPEND: u16 = 405;
pub const PRIM_LOG: u16 = 406;
pub const PRIM_HALT: u16 = 407;
pub const PRIM_MILLISECONDS: u16 = 408;
pub const PRIM_FINISH: u16 = 409;
pub const PRIM_CHARACTER_AS_INTEGER: u16 = 410;
pub const PRIM_CHARACTER_NEW_COLON: u16 = 411;
pub const PRIM_INST_VAR_AT: u16 = 420;
pub const PRIM_INST_VAR_AT_PUT: u16 = 421;
pub const PRIM_VALUE: u16 = 501;
pub const PRIM_VALUE_COLON: u16 = 502;
pub const PRIM_VALUE_VALUE: u16 = 503;
pub const PRIM_FLOAT_AT: u16 = 548;
pub const PRIM_FLOAT_AT_PUT: u16 = 549;
pub const PRIM_UNINTERPRETED_BYTES_COPY: u16 = 550;
pub const PRIM_SYMBOL_TABLE: u16 = 551;
pub const PRIM_PERFORM_WITH_ARGS: u16 = 552;
pub const PRIM_SYSTEM_DICTIONARY: u16 = 553;
pub const PRIM_EXCEPTION_HANDLERS: u16 = 554;
pub const PRIM_IS_WASM: u16 = 600;
pub const PRIM_WELL_KNOWN_AT: u16 = 610;
pub const PRIM_WELL_KNOWN_AT_PUT: u16 = 611;
pub const PRIM_WELL_KNOWN_LAST: u16 = 612;
pub const PRIM_SYSTEM_CURRENT_DATE_AND_TIME: u16 = 700;
pub const PRIM_MARK_VM_MIGRATION_NEW: u16 = 701;
pub const PRIM_UNMARK_VM_MIGRATION_NEW: u16 = 702;
pub const PRIM_IS_VM_MIGRATION_NEW: u16 = 703;
pub const PRIM_PLATFORM: u16 = 2000;

/// Build the populated table.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn build_table() -> Vec<Option<PrimitiveFn>> {
    let mut table: Vec<Option<PrimitiveFn>> = vec![None; PRIMITIVE_TABLE_SIZE];
    let mut set = |number: u16, function: PrimitiveFn| {
        table[number as usize] = Some(function);
    };

    set(PRIM_BASIC_AT, prim_basic_at);
    set(PRIM_BASIC_AT_PUT, prim_basic_at_put);
    set(PRIM_BASIC_SIZE, prim_basic_size);
    set(PRIM_BYTESTRING_BASIC_AT, prim_byte_string_basic_at);
    set(PRIM_BYTESTRING_BASIC_AT_PUT, prim_byte_string_basic_at_put);
    set(PRIM_NEW, prim_new);
    set(PRIM_NEW_COLON, prim_new_colon);
    set(PRIM_IDENTITY_HASH, prim_identity_hash);
    set(PRIM_IDENTICAL, prim_identical);
    set(PRIM_CLASS, prim_class);
    set(PRIM_SUSPEND, prim_suspend);
    set(PRIM_LOG, prim_log);
    set(PRIM_HALT, prim_halt);
    set(PRIM_MILLISECONDS, prim_milliseconds);
    set(PRIM_FINISH, prim_finish);
    set(PRIM_CHARACTER_AS_INTEGER, prim_character_as_integer);
    set(PRIM_CHARACTER_NEW_COLON, prim_character_new_colon);
    set(PRIM_INST_VAR_AT, prim_inst_var_at);
    set(PRIM_INST_VAR_AT_PUT, prim_inst_var_at_put);
    set(PRIM_VALUE, prim_block_value);
    set(PRIM_VALUE_COLON, prim_block_value_colon);
    set(PRIM_VALUE_VALUE, prim_block_value_value);
    set(PRIM_FLOAT_AT, prim_float_at);
    set(PRIM_FLOAT_AT_PUT, prim_float_at_put);
    set(PRIM_UNINTERPRETED_BYTES_COPY, prim_uninterpreted_bytes_copy);
    set(PRIM_SYMBOL_TABLE, prim_symbol_table);
    set(PRIM_PERFORM_WITH_ARGS, prim_perform_with_args);
    set(PRIM_SYSTEM_DICTIONARY, prim_system_dictionary);
    set(PRIM_EXCEPTION_HANDLERS, prim_exception_handlers);
    set(PRIM_IS_WASM, prim_is_wasm);
    set(PRIM_WELL_KNOWN_AT, prim_well_known_at);
    set(PRIM_WELL_KNOWN_AT_PUT, prim_well_known_at_put);
    set(PRIM_WELL_KNOWN_LAST, prim_well_known_last);
    set(
        PRIM_SYSTEM_CURRENT_DATE_AND_TIME,
        prim_system_current_date_and_time,
    );
    set(PRIM_MARK_VM_MIGRATION_NEW, prim_mark_vm_migration_new);
    set(PRIM_UNMARK_VM_MIGRATION_NEW, prim_unmark_vm_migration_new);
    set(PRIM_IS_VM_MIGRATION_NEW, prim_is_vm_migration_new);
    set(PRIM_PLATFORM, prim_platform);

    set(integer::PRIM_SMALLINTEGER_PLUS, integer::prim_small_integer_plus);
    set(integer::PRIM_SMALLINTEGER_MINUS, integer::prim_small_integer_minus);
    set(
        integer::PRIM_SMALLINTEGER_LESS_THAN,
        integer::prim_small_integer_less_than,
    );
    set(
        integer::PRIM_SMALLINTEGER_GREATER_THAN,
        integer::prim_small_integer_greater_than,
    );
    set(
        integer::PRIM_SMALLINTEGER_LESS_THAN_OR_EQUAL,
        integer::prim_small_integer_less_than_or_equal,
    );
    set(
        integer::PRIM_SMALLINTEGER_GREATER_THAN_OR_EQUAL,
        integer::prim_small_integer_greater_than_or_equal,
    );
    set(integer::PRIM_SMALLINTEGER_EQUAL, integer::prim_small_integer_equal);
    set(
        integer::PRIM_SMALLINTEGER_NOT_EQUAL,
        integer::prim_small_integer_not_equal,
    );
    set(integer::PRIM_SMALLINTEGER_TIMES, integer::prim_small_integer_times);
    set(integer::PRIM_SMALLINTEGER_DIVIDE, integer::prim_small_integer_divide);
    set(integer::PRIM_SMALLINTEGER_MODULO, integer::prim_small_integer_modulo);
    set(
        integer::PRIM_SMALLINTEGER_INT_DIVIDE,
        integer::prim_small_integer_int_divide,
    );
    set(
        integer::PRIM_SMALLINTEGER_AS_FLOAT,
        integer::prim_small_integer_as_float,
    );
    set(integer::PRIM_BITSHIFT, integer::prim_bit_shift);

    set(integer::PRIM_AS_LARGEINTEGER, integer::prim_as_large_integer);
    set(integer::PRIM_LARGEINTEGER_PLUS, integer::prim_large_integer_plus);
    set(integer::PRIM_LARGEINTEGER_MINUS, integer::prim_large_integer_minus);
    set(
        integer::PRIM_LARGEINTEGER_LESS_THAN,
        integer::prim_large_integer_less_than,
    );
    set(
        integer::PRIM_LARGEINTEGER_GREATER_THAN,
        integer::prim_large_integer_greater_than,
    );
    set(
        integer::PRIM_LARGEINTEGER_LESS_THAN_OR_EQUAL,
        integer::prim_large_integer_less_than_or_equal,
    );
    set(
        integer::PRIM_LARGEINTEGER_GREATER_THAN_OR_EQUAL,
        integer::prim_large_integer_greater_than_or_equal,
    );
    set(integer::PRIM_LARGEINTEGER_EQUAL, integer::prim_large_integer_equal);
    set(
        integer::PRIM_LARGEINTEGER_NOT_EQUAL,
        integer::prim_large_integer_not_equal,
    );
    set(integer::PRIM_LARGEINTEGER_TIMES, integer::prim_large_integer_times);
    set(integer::PRIM_LARGEINTEGER_DIVIDE, integer::prim_large_integer_divide);
    set(integer::PRIM_LARGEINTEGER_MODULO, integer::prim_large_integer_modulo);
    set(
        integer::PRIM_LARGEINTEGER_INT_DIVIDE,
        integer::prim_large_integer_int_divide,
    );
    set(
        integer::PRIM_LARGEINTEGER_DIVIDE_WITH_REMAINDER,
        integer::prim_large_integer_divide_with_remainder,
    );
    set(
        integer::PRIM_LARGEINTEGER_TIMES_FAST,
        integer::prim_large_integer_times_fast,
    );
    set(
        integer::PRIM_LARGEINTEGER_AS_FLOAT,
        integer::prim_large_integer_as_float,
    );

    set(integer::PRIM_BIT_AND, integer::prim_bit_and);
    set(integer::PRIM_BIT_OR, integer::prim_bit_or);
    set(integer::PRIM_BIT_XOR, integer::prim_bit_xor);
    set(integer::PRIM_BIT_INVERT, integer::prim_bit_invert);

    set(float::PRIM_FLOAT_PLUS, float::prim_float_plus);
    set(float::PRIM_FLOAT_MINUS, float::prim_float_minus);
    set(float::PRIM_FLOAT_TIMES, float::prim_float_times);
    set(float::PRIM_FLOAT_DIVIDE, float::prim_float_divide);
    set(float::PRIM_FLOAT_LESS_THAN, float::prim_float_less_than);
    set(float::PRIM_FLOAT_GREATER_THAN, float::prim_float_greater_than);
    set(float::PRIM_FLOAT_EQUALS, float::prim_float_equals);
    set(float::PRIM_FLOAT_TRUNCATED, float::prim_float_truncated);
    set(float::PRIM_FLOAT_SQRT, float::prim_float_sqrt);
    set(float::PRIM_FLOAT_SIN, float::prim_float_sin);
    set(float::PRIM_FLOAT_COS, float::prim_float_cos);
    set(float::PRIM_FLOAT_TAN, float::prim_float_tan);
    set(float::PRIM_FLOAT_ATAN2, float::prim_float_atan2);
    set(float::PRIM_FLOAT_LOG, float::prim_float_log);
    set(float::PRIM_FLOAT_ARCSIN, float::prim_float_arcsin);
    set(float::PRIM_FLOAT_ARCCOS, float::prim_float_arccos);
    set(float::PRIM_FLOAT_EXP, float::prim_float_exp);

    set(memory::PRIM_AUDIT_IMAGE, memory::prim_audit_image);
    set(
        memory::PRIM_REALLOCATE_OBJECT_SPACES,
        memory::prim_reallocate_object_spaces,
    );
    set(memory::PRIM_SET_SYSTEM, memory::prim_set_system);
    set(memory::PRIM_REALLOCATE_SPACE, memory::prim_reallocate_space);
    set(memory::PRIM_BECOME, memory::prim_become);
    set(memory::PRIM_ALL_INSTANCES, memory::prim_all_instances);
    set(memory::PRIM_WALKBACK, memory::prim_walkback);
    set(memory::PRIM_SAVE_IMAGE, memory::prim_save_image);
    set(memory::PRIM_GLOBAL_GC, memory::prim_global_garbage_collect);

    table
}

/// Push the primitive-failure pair: rcode 1 and the receiver.
pub(crate) fn fail_with_receiver(interp: &mut Interpreter) {
    let receiver = interp.receiver();
    interp.push(Oop::small_int(1));
    interp.push(receiver);
}

/// Push the success pair: rcode 0 and the result.
pub(crate) fn succeed(interp: &mut Interpreter, result: Oop) {
    interp.push(Oop::small_int(0));
    interp.push(result);
}

// ----------------------------------------------------------------------
// Object primitives

/// basicAt: indexed slot or byte read, one-based.
fn prim_basic_at(interp: &mut Interpreter) -> Result<(), VmError> {
    let index = interp.local(0);
    let receiver = interp.receiver();

    if !index.is_small_int() || index.as_small_int() <= 0 {
        fail_with_receiver(interp);
        return Ok(());
    }
    let index = index.as_small_int() as u64;

    if interp.mem.is_bytes(receiver) {
        if index > interp.mem.basic_byte_size(receiver) {
            fail_with_receiver(interp);
        } else {
            let byte = interp.mem.body_byte(receiver, index - 1);
            succeed(interp, Oop::small_int(i64::from(byte)));
        }
    } else if index > interp.mem.indexed_object_size(receiver) {
        fail_with_receiver(interp);
    } else {
        let named = interp.mem.named_inst_vars(receiver);
        let value = interp.mem.inst_var(receiver, named + index - 1);
        succeed(interp, value);
    }
    Ok(())
}

fn prim_basic_at_put(interp: &mut Interpreter) -> Result<(), VmError> {
    let value = interp.local(1);
    let index = interp.local(0);
    let receiver = interp.receiver();

    if !index.is_small_int() || index.as_small_int() <= 0 {
        fail_with_receiver(interp);
        return Ok(());
    }
    let index = index.as_small_int() as u64;

    if interp.mem.is_bytes(receiver) {
        if index > interp.mem.basic_byte_size(receiver) {
            fail_with_receiver(interp);
        } else {
            interp
                .mem
                .set_body_byte(receiver, index - 1, value.as_small_int() as u8);
            succeed(interp, value);
        }
    } else if index > interp.mem.indexed_object_size(receiver) {
        fail_with_receiver(interp);
    } else {
        let named = interp.mem.named_inst_vars(receiver);
        interp.mem.inst_var_put(receiver, named + index - 1, value);
        succeed(interp, value);
    }
    Ok(())
}

fn prim_basic_size(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let size = if interp.mem.is_bytes(receiver) {
        interp.mem.basic_byte_size(receiver)
    } else {
        interp.mem.indexed_object_size(receiver)
    };
    succeed(interp, Oop::small_int(size as i64));
    Ok(())
}

/// String at: answers a character rather than an integer.
fn prim_byte_string_basic_at(interp: &mut Interpreter) -> Result<(), VmError> {
    let index = interp.local(0);
    let receiver = interp.receiver();

    if !index.is_small_int()
        || index.as_small_int() <= 0
        || !interp.mem.is_bytes(receiver)
        || index.as_small_int() as u64 > interp.mem.basic_byte_size(receiver)
    {
        fail_with_receiver(interp);
        return Ok(());
    }

    let byte = interp
        .mem
        .body_byte(receiver, index.as_small_int() as u64 - 1);
    succeed(interp, Oop::character(u64::from(byte)));
    Ok(())
}

fn prim_byte_string_basic_at_put(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let index = interp.local(0);
    let value = interp.local(1);

    interp.mem.set_body_byte(
        receiver,
        index.as_small_int() as u64 - 1,
        value.as_small_int() as u8,
    );
    succeed(interp, receiver);
    Ok(())
}

fn prim_new(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let object = interp
        .mem
        .new_instance_of(receiver, 0, space_index::EDEN)?;
    succeed(interp, object);
    Ok(())
}

fn prim_new_colon(interp: &mut Interpreter) -> Result<(), VmError> {
    let size = interp.local(0);
    let receiver = interp.receiver();

    if !size.is_small_int() {
        fail_with_receiver(interp);
        return Ok(());
    }

    let object =
        interp
            .mem
            .new_instance_of(receiver, size.as_small_int() as u64, space_index::EDEN)?;
    succeed(interp, object);
    Ok(())
}

fn prim_identity_hash(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let hash = if receiver.is_immediate() {
        receiver.as_small_int()
    } else {
        interp.mem.identity_hash(receiver) as i64
    };
    succeed(interp, Oop::small_int(hash));
    Ok(())
}

fn prim_identical(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let arg = interp.local(0);
    let result = if receiver == arg {
        interp.mem.true_oop()
    } else {
        interp.mem.false_oop()
    };
    succeed(interp, result);
    Ok(())
}

fn prim_class(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let class = interp.mem.class_of(receiver);
    succeed(interp, class);
    Ok(())
}

fn prim_character_as_integer(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    if !receiver.is_character() {
        fail_with_receiver(interp);
        return Ok(());
    }
    succeed(interp, Oop::small_int(receiver.as_code_point() as i64));
    Ok(())
}

fn prim_character_new_colon(interp: &mut Interpreter) -> Result<(), VmError> {
    let value = interp.local(0);
    if !value.is_small_int() {
        fail_with_receiver(interp);
        return Ok(());
    }
    succeed(interp, Oop::character(value.as_small_int() as u64));
    Ok(())
}

fn prim_inst_var_at(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let index = interp.local(0);

    if !index.is_small_int()
        || index.as_small_int() as u64 > interp.mem.total_object_size(receiver)
    {
        fail_with_receiver(interp);
        return Ok(());
    }

    let value = interp
        .mem
        .inst_var(receiver, index.as_small_int() as u64 - 1);
    succeed(interp, value);
    Ok(())
}

fn prim_inst_var_at_put(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let index = interp.local(0);
    let value = interp.local(1);

    if !index.is_small_int()
        || index.as_small_int() as u64 > interp.mem.total_object_size(receiver)
    {
        fail_with_receiver(interp);
        return Ok(());
    }

    interp
        .mem
        .inst_var_put(receiver, index.as_small_int() as u64 - 1, value);
    succeed(interp, value);
    Ok(())
}

// ----------------------------------------------------------------------
// Block invocation

fn prim_block_value(interp: &mut Interpreter) -> Result<(), VmError> {
    let closure = interp.receiver();
    interp.push(Oop::small_int(0));
    interp.push(closure);
    interp.invoke_block(closure, 0)
}

fn prim_block_value_colon(interp: &mut Interpreter) -> Result<(), VmError> {
    let closure = interp.receiver();
    interp.push(Oop::small_int(0));
    interp.push(closure);
    let arg = interp.local(0);
    interp.push(arg);
    interp.invoke_block(closure, 1)
}

fn prim_block_value_value(interp: &mut Interpreter) -> Result<(), VmError> {
    let closure = interp.receiver();
    interp.push(Oop::small_int(0));
    interp.push(closure);
    let arg = interp.local(0);
    interp.push(arg);
    let arg = interp.local(1);
    interp.push(arg);
    interp.invoke_block(closure, 2)
}

// ----------------------------------------------------------------------
// System primitives

fn prim_suspend(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    interp.wakeup_time = interp
        .mem
        .inst_var(receiver, object::system::WAKEUP_TIME)
        .as_small_int();

    interp.suspended = true;
    interp.event_waiting = true;
    succeed(interp, Oop::small_int(1));
    Ok(())
}

fn prim_log(interp: &mut Interpreter) -> Result<(), VmError> {
    let value = interp.local(0);
    let message = interp.mem.string_of(value);
    interp.platform.log_line(&message);
    succeed(interp, Oop::small_int(1));
    Ok(())
}

fn prim_halt(interp: &mut Interpreter) -> Result<(), VmError> {
    log::info!("VM halt");
    interp.breakpoint_hit = true;
    interp.event_waiting = true;
    succeed(interp, Oop::small_int(1));
    Ok(())
}

fn prim_milliseconds(interp: &mut Interpreter) -> Result<(), VmError> {
    let millis = interp.platform.now_millis();
    succeed(interp, Oop::small_int(millis));
    Ok(())
}

fn prim_finish(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    interp.finish_requested = true;
    interp.event_waiting = true;
    succeed(interp, receiver);
    Ok(())
}

fn prim_float_at(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let index = interp.local(0).as_small_int() as u64;

    let mut bytes = [0u8; 8];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = interp.mem.body_byte(receiver, index * 8 + i as u64);
    }
    succeed(interp, Oop::float(f64::from_le_bytes(bytes)));
    Ok(())
}

fn prim_float_at_put(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let index = interp.local(0).as_small_int() as u64;
    let value = interp.local(1).as_float();

    for (i, byte) in value.to_le_bytes().iter().enumerate() {
        interp.mem.set_body_byte(receiver, index * 8 + i as u64, *byte);
    }
    succeed(interp, Oop::float(value));
    Ok(())
}

fn prim_uninterpreted_bytes_copy(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let class = interp.mem.class_field(receiver);
    let size = interp.mem.basic_byte_size(receiver);
    let copy = interp.mem.new_instance_of(class, size, space_index::EDEN)?;

    let receiver = interp.receiver();
    for i in 0..size {
        let byte = interp.mem.body_byte(receiver, i);
        interp.mem.set_body_byte(copy, i, byte);
    }
    succeed(interp, copy);
    Ok(())
}

fn prim_symbol_table(interp: &mut Interpreter) -> Result<(), VmError> {
    let table = interp.mem.known(well_known::SYMBOL_TABLE);
    succeed(interp, table);
    Ok(())
}

fn prim_system_dictionary(interp: &mut Interpreter) -> Result<(), VmError> {
    let dictionary = interp.mem.known(well_known::SYSTEM_DICTIONARY);
    succeed(interp, dictionary);
    Ok(())
}

fn prim_exception_handlers(interp: &mut Interpreter) -> Result<(), VmError> {
    let handlers = interp.mem.known(well_known::EXCEPTION_HANDLERS);
    succeed(interp, handlers);
    Ok(())
}

/// perform:withArguments: runs the send to completion inside the
/// primitive, bracketed by a stop frame so control comes back here.
fn prim_perform_with_args(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let selector = interp.local(0);
    let args = interp.local(1);

    let selector_bytes = interp.mem.bytes_of(selector);
    let mut arg_count = selector_bytes.iter().filter(|&&b| b == b':').count() as u64;
    if let Some(&first) = selector_bytes.first() {
        if !first.is_ascii_alphanumeric() {
            arg_count += 1;
        }
    }

    let supplied = interp.mem.indexed_object_size(args);
    if arg_count != supplied {
        interp.push(Oop::small_int(1));
        interp.push(Oop::small_int(0));
        return Ok(());
    }

    interp.push(receiver);
    for i in 0..supplied {
        let value = interp.mem.inst_var(args, i);
        interp.push(value);
    }

    let saved_stop_frame = interp.stop_frame;
    interp.stop_frame = interp.mem.current_context;
    interp.dispatch(selector, supplied)?;
    interp.basic_interpret(0)?;
    interp.stop_frame = saved_stop_frame;

    let result = interp.pop();
    succeed(interp, result);
    Ok(())
}

fn prim_is_wasm(interp: &mut Interpreter) -> Result<(), VmError> {
    let result = interp.mem.false_oop();
    succeed(interp, result);
    Ok(())
}

fn prim_well_known_at(interp: &mut Interpreter) -> Result<(), VmError> {
    let index = interp.local(0);
    if !index.is_small_int() || index.as_small_int() as u64 > well_known::LAST {
        let value = interp.local(0);
        interp.push(Oop::small_int(1));
        interp.push(value);
        return Ok(());
    }

    let value = interp.mem.known(index.as_small_int() as u64);
    succeed(interp, value);
    Ok(())
}

fn prim_well_known_at_put(interp: &mut Interpreter) -> Result<(), VmError> {
    let index = interp.local(0);
    let value = interp.local(1);
    if !index.is_small_int() || index.as_small_int() as u64 > well_known::LAST {
        interp.push(Oop::small_int(1));
        let index = interp.local(0);
        interp.push(index);
        return Ok(());
    }

    interp.mem.set_known(index.as_small_int() as u64, value);
    succeed(interp, value);
    Ok(())
}

fn prim_well_known_last(interp: &mut Interpreter) -> Result<(), VmError> {
    succeed(interp, Oop::small_int(well_known::LAST as i64));
    Ok(())
}

fn prim_system_current_date_and_time(interp: &mut Interpreter) -> Result<(), VmError> {
    let now = interp.platform.current_date_and_time();
    succeed(interp, Oop::small_int(now));
    Ok(())
}

fn prim_mark_vm_migration_new(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    interp
        .mem
        .add_flags(receiver, object::ObjectFlags::VM_MIGRATION_NEW);
    succeed(interp, Oop::small_int(0));
    Ok(())
}

fn prim_unmark_vm_migration_new(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    interp
        .mem
        .remove_flags(receiver, object::ObjectFlags::VM_MIGRATION_NEW);
    succeed(interp, Oop::small_int(0));
    Ok(())
}

fn prim_is_vm_migration_new(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let result = if interp
        .mem
        .flags(receiver)
        .contains(object::ObjectFlags::VM_MIGRATION_NEW)
    {
        interp.mem.true_oop()
    } else {
        interp.mem.false_oop()
    };
    succeed(interp, result);
    Ok(())
}

fn prim_platform(interp: &mut Interpreter) -> Result<(), VmError> {
    let id = interp.platform.platform_id();
    succeed(interp, Oop::small_int(id));
    Ok(())
}
