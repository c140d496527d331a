// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the dispatch loop: stack discipline, bytecode fetch,
//! jumps, and the primitive-return protocol.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::image::bootstrap::class_named;
use crate::object::{self, well_known};
use crate::oop::Oop;
use crate::testkit::{self, MethodBuilder, run_method};

#[test]
fn push_and_pop_stay_in_lockstep_with_the_heap() {
    let mut interp = testkit::interpreter();
    interp.setup_interpreter().unwrap();

    interp.push(Oop::small_int(1));
    interp.push(Oop::small_int(2));

    let ctx = interp.mem.current_context;
    assert_eq!(
        interp.mem.inst_var(ctx, object::context::STACK_OFFSET),
        Oop::small_int(2)
    );
    assert_eq!(interp.top(), Oop::small_int(2));

    assert_eq!(interp.pop(), Oop::small_int(2));
    assert_eq!(interp.pop(), Oop::small_int(1));
    assert_eq!(
        interp.mem.inst_var(ctx, object::context::STACK_OFFSET),
        Oop::small_int(0)
    );
}

#[test]
fn small_integer_push_opcodes() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    // push 3; push -2; pop; return (leaving 3)
    let method = MethodBuilder::new()
        .op(0x62)
        .op(0x72)
        .op(0xAC)
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    let nil = interp.mem.nil();
    let result = run_method(&mut interp, method, nil, &[]);
    assert_eq!(result, Oop::small_int(3));
}

#[test]
fn wide_integer_push_opcodes() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    // push int8 -5; return
    let method = MethodBuilder::new()
        .op(0x9E)
        .op(0xFB)
        .op(0xDC)
        .build(&mut interp.mem, object_class);
    let nil = interp.mem.nil();
    assert_eq!(run_method(&mut interp, method, nil, &[]), Oop::small_int(-5));

    // push int16 0x1234; return
    let method = MethodBuilder::new()
        .op(0x9F)
        .bytes(&[0x12, 0x34])
        .op(0xDC)
        .build(&mut interp.mem, object_class);
    assert_eq!(
        run_method(&mut interp, method, nil, &[]),
        Oop::small_int(0x1234)
    );

    // push int32 -1; return
    let method = MethodBuilder::new()
        .op(0xA0)
        .bytes(&[0xFF, 0xFF, 0xFF, 0xFF])
        .op(0xDC)
        .build(&mut interp.mem, object_class);
    assert_eq!(run_method(&mut interp, method, nil, &[]), Oop::small_int(-1));
}

#[test]
fn push_constants_and_self() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    let method = MethodBuilder::new()
        .op(0x90)
        .op(0xDC)
        .build(&mut interp.mem, object_class);
    let nil = interp.mem.nil();
    let result = run_method(&mut interp, method, nil, &[]);
    assert_eq!(result, interp.mem.true_oop());

    let method = MethodBuilder::new()
        .op(0x93)
        .op(0xDC)
        .build(&mut interp.mem, object_class);
    let receiver = Oop::small_int(64);
    assert_eq!(run_method(&mut interp, method, receiver, &[]), receiver);
}

#[test]
fn literal_push_and_duplicate() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    let mut builder = MethodBuilder::new();
    let literal = builder.literal(Oop::small_int(777));
    let method = builder
        .op(0x80 + literal)
        .op(0xAD) // dup
        .op(0xAC) // pop
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    let nil = interp.mem.nil();
    assert_eq!(run_method(&mut interp, method, nil, &[]), Oop::small_int(777));
}

#[test]
fn locals_read_arguments_and_temporaries() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    // One argument, one temp: temp := arg; push temp; return.
    let method = MethodBuilder::new()
        .arguments(1)
        .temporaries(1)
        .op(0x20) // push local 1 (the argument)
        .op(0x31) // store local 2 (the temp)
        .op(0xAC) // pop
        .op(0x21) // push local 2
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    let nil = interp.mem.nil();
    let result = run_method(&mut interp, method, nil, &[Oop::small_int(5)]);
    assert_eq!(result, Oop::small_int(5));
}

#[test]
fn jumps_move_the_pc_consistently() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    // push true; jump-if-true over the push of 1; push 2; return
    let method = MethodBuilder::new()
        .op(0x90) // push true
        .op(0xB2) // jump if true
        .op(0x01) // skip one byte
        .op(0x60) // push 1 (skipped)
        .op(0x61) // push 2
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    let nil = interp.mem.nil();
    assert_eq!(run_method(&mut interp, method, nil, &[]), Oop::small_int(2));
}

#[test]
fn backward_jumps_loop() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    // temp := 0; [temp = 3] whileFalse: [temp := temp + 1]; ^temp
    // Hand-scheduled with a backward jump.
    let method = MethodBuilder::new()
        .temporaries(1)
        .op(0x70) // push 0
        .op(0x30) // store temp
        .op(0xAC) // pop
        // loop:
        .op(0x20) // push temp
        .op(0x60) // push 1
        .op(0xD6) // well-known +
        .op(object::special::PLUS)
        .op(0x30) // store temp
        .op(0xAC) // pop
        .op(0x20) // push temp
        .op(0x62) // push 3
        .op(0xD6) // well-known <
        .op(object::special::LESS_THAN)
        .op(0xB2) // jump if true back to loop
        .op(0xF4) // -12
        .op(0x20) // push temp
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    let nil = interp.mem.nil();
    assert_eq!(run_method(&mut interp, method, nil, &[]), Oop::small_int(3));
}

#[test]
fn pc_offset_matches_bytecodes_consumed() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    let method = MethodBuilder::new()
        .op(0x60)
        .op(0x61)
        .op(0xAC)
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    interp.setup_interpreter().unwrap();
    let nil = interp.mem.nil();
    interp.push(nil);
    interp.invoke(method, 0).unwrap();

    for expected in 1..=3u64 {
        interp.basic_interpret(1).unwrap();
        let ctx = interp.mem.current_context;
        let pc = interp
            .mem
            .inst_var(ctx, object::context::PC_OFFSET)
            .as_small_int();
        assert_eq!(pc as u64, expected);
    }
}

#[test]
fn unknown_primitive_reports_an_event() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    // Unassigned primitive 1999: the not-found handler sets the error
    // string, then the fallback code runs.
    let method = MethodBuilder::new()
        .op(0xDB)
        .bytes(&[0x07, 0xCF]) // primitive 1999
        .op(0xDF)
        .op(0x64) // fallback pushes 5
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    interp.setup_interpreter().unwrap();
    let nil = interp.mem.nil();
    interp.push(nil);
    interp.invoke(method, 0).unwrap();
    interp.basic_interpret(0).unwrap();
    assert!(interp.error_string.contains("Primitive not found"));
}

#[test]
fn primitive_return_protocol_success_and_failure() {
    let mut interp = testkit::interpreter();

    // Success: 3 identityHash answers 3 through the 0xDF protocol.
    let result = testkit::call_primitive(
        &mut interp,
        crate::primitives::PRIM_IDENTITY_HASH,
        Oop::small_int(3),
        &[],
    );
    assert_eq!(result, Oop::small_int(3));

    // Failure: basicAt with a bad index leaves rcode 1 for the
    // fallback, which the stub method returns.
    let array_class = interp.mem.known(well_known::ARRAY_CLASS);
    let array = interp
        .mem
        .new_instance_of(array_class, 2, crate::memory::space_index::OLD)
        .unwrap();
    let result = testkit::call_primitive(
        &mut interp,
        crate::primitives::PRIM_BASIC_AT,
        array,
        &[Oop::small_int(99)],
    );
    assert_eq!(result, Oop::small_int(1));
}

#[test]
fn store_new_array_builds_closure_cells() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    // temp := Array new: 2; ^temp
    let method = MethodBuilder::new()
        .temporaries(1)
        .op(0xAB)
        .bytes(&[2, 0]) // two slots into local 0
        .op(0x20)
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    let nil = interp.mem.nil();
    let result = run_method(&mut interp, method, nil, &[]);
    assert_eq!(
        interp.mem.class_of(result),
        interp.mem.known(well_known::ARRAY_CLASS)
    );
    assert_eq!(interp.mem.indexed_object_size(result), 2);
}

#[test]
fn bad_bytecode_is_fatal() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    let method = MethodBuilder::new()
        .op(0xBB) // unassigned opcode
        .build(&mut interp.mem, object_class);

    interp.setup_interpreter().unwrap();
    let nil = interp.mem.nil();
    interp.push(nil);
    interp.invoke(method, 0).unwrap();
    let result = interp.basic_interpret(0);
    assert!(matches!(
        result,
        Err(crate::error::VmError::BadBytecode(0xBB))
    ));
}

#[test]
fn byte_budget_stops_the_loop() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    let method = MethodBuilder::new()
        .op(0x60)
        .op(0xAC)
        .op(0x60)
        .op(0xAC)
        .op(0x60)
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    interp.setup_interpreter().unwrap();
    let nil = interp.mem.nil();
    interp.push(nil);
    interp.invoke(method, 0).unwrap();

    interp.basic_interpret(2).unwrap();
    let ctx = interp.mem.current_context;
    let pc = interp
        .mem
        .inst_var(ctx, object::context::PC_OFFSET)
        .as_small_int();
    assert_eq!(pc, 2);
}
