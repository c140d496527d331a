// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for block closures, block invocation and non-local return.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::image::bootstrap::class_named;
use crate::object::{self, well_known};
use crate::oop::Oop;
use crate::primitives;
use crate::testkit::{self, MethodBuilder, run_method};

#[test]
fn copying_block_captures_values() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    // The captured value arrives as the block's first local.
    let block = MethodBuilder::new()
        .op(0x20)
        .op(0xDD)
        .build_block(&mut interp.mem, object_class);

    // Driver: push 41, make a copying block capturing it, run it with
    // the value primitive.
    let mut driver = MethodBuilder::new();
    let block_literal = driver.literal(block);
    let driver = driver
        .op(0x9E)
        .op(41) // the captured value
        .op(0xA1) // push copying block
        .bytes(&[block_literal, 1])
        .primitive(primitives::PRIM_VALUE)
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    let nil = interp.mem.nil();
    assert_eq!(run_method(&mut interp, driver, nil, &[]), Oop::small_int(41));
}

#[test]
fn closure_carries_its_compiled_block() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    let block = MethodBuilder::new()
        .op(0x64)
        .op(0xDD)
        .build_block(&mut interp.mem, object_class);

    let mut driver = MethodBuilder::new();
    let block_literal = driver.literal(block);
    let driver = driver
        .op(0xA1)
        .bytes(&[block_literal, 0])
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    let nil = interp.mem.nil();
    let closure = run_method(&mut interp, driver, nil, &[]);
    assert_eq!(
        interp.mem.class_of(closure),
        interp.mem.known(well_known::BLOCK_CLOSURE_CLASS)
    );
    assert_eq!(
        interp.mem.inst_var(closure, object::closure::METHOD),
        block
    );
    assert_eq!(
        interp.mem.inst_var(closure, object::closure::METHOD_CONTEXT),
        interp.mem.nil()
    );
}

#[test]
fn block_value_runs_the_block() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    let block = MethodBuilder::new()
        .op(0x64)
        .op(0xDD)
        .build_block(&mut interp.mem, object_class);

    // Driver: make the block, send value through the primitive.
    let mut driver = MethodBuilder::new();
    let block_literal = driver.literal(block);
    let driver = driver
        .op(0xA1)
        .bytes(&[block_literal, 0])
        .primitive(primitives::PRIM_VALUE)
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    let nil = interp.mem.nil();
    assert_eq!(run_method(&mut interp, driver, nil, &[]), Oop::small_int(5));
}

#[test]
fn block_arguments_arrive_as_locals() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    // [:x | x] with argument 23.
    let block = MethodBuilder::new()
        .arguments(1)
        .op(0x20)
        .op(0xDD)
        .build_block(&mut interp.mem, object_class);

    let mut driver = MethodBuilder::new();
    let block_literal = driver.literal(block);
    let driver = driver
        .op(0xA1)
        .bytes(&[block_literal, 0])
        .op(0x9E)
        .op(23)
        .primitive(primitives::PRIM_VALUE_COLON)
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    let nil = interp.mem.nil();
    assert_eq!(run_method(&mut interp, driver, nil, &[]), Oop::small_int(23));
}

#[test]
fn full_block_captures_the_home_context() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    let block = MethodBuilder::new()
        .op(0x64)
        .op(0xDD)
        .build_block(&mut interp.mem, object_class);

    let mut driver = MethodBuilder::new();
    let block_literal = driver.literal(block);
    let driver = driver
        .op(0xA2) // push full block
        .bytes(&[block_literal, 0])
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    interp.setup_interpreter().unwrap();
    let nil = interp.mem.nil();
    interp.push(nil);
    interp.invoke(driver, 0).unwrap();

    // Step until the closure exists but the driver frame is still live.
    interp.basic_interpret(1).unwrap();
    let closure = interp.top();
    let home = interp
        .mem
        .inst_var(closure, object::closure::METHOD_CONTEXT);
    assert!(home.is_context_pointer());
    assert_eq!(home.strip_tags(), interp.mem.current_context);
}

#[test]
fn non_local_return_unwinds_to_the_home_caller() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    // Block body: ^9 (non-local).
    let block = MethodBuilder::new()
        .op(0x69)
        .op(0xDE)
        .build_block(&mut interp.mem, object_class);

    // Home method: runs the block, then would answer 1 if the block
    // returned normally.
    let mut home = MethodBuilder::new();
    let block_literal = home.literal(block);
    let home = home
        .op(0xA2)
        .bytes(&[block_literal, 0])
        .primitive(primitives::PRIM_VALUE)
        .op(0xAC) // drop the block result
        .op(0x60) // push 1
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    // The non-local return must bypass the home method's tail and hand
    // 9 to the home's caller directly.
    let nil = interp.mem.nil();
    assert_eq!(run_method(&mut interp, home, nil, &[]), Oop::small_int(9));
}

#[test]
fn non_local_return_past_a_dead_home_raises() {
    let mut interp = testkit::interpreter();
    testkit::install_raise_signal_halt(&mut interp);
    let object_class = class_named(&interp.mem, "Object").unwrap();

    let block = MethodBuilder::new()
        .op(0x69)
        .op(0xDE)
        .build_block(&mut interp.mem, object_class);

    // The escaping method answers the full block itself; its frame is
    // dead by the time the block runs.
    let mut escape = MethodBuilder::new();
    let block_literal = escape.literal(block);
    let escape = escape
        .op(0xA2)
        .bytes(&[block_literal, 0])
        .op(0xDC)
        .build(&mut interp.mem, object_class);
    let escape_selector =
        crate::testkit::install(&mut interp.mem, object_class, "escapeBlock", escape);

    // One send of depth so the home frame sits below any frame the
    // later block run will occupy.
    let mut outer = MethodBuilder::new();
    let selector_literal = outer.literal(escape_selector);
    let outer = outer
        .op(0x93)
        .op(0xC0 + selector_literal)
        .op(0x00)
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    let nil = interp.mem.nil();
    let closure = run_method(&mut interp, outer, nil, &[]);
    assert_eq!(
        interp.mem.class_of(closure),
        interp.mem.known(well_known::BLOCK_CLOSURE_CLASS)
    );

    // Now invoke the orphaned block directly: the home frame is gone,
    // so the non-local return raises instead of unwinding into dead
    // stack.
    interp.push(closure);
    interp.invoke_block(closure, 0).unwrap();
    interp.basic_interpret(0).unwrap();

    assert!(interp.breakpoint_hit);
    let exception = interp.receiver();
    assert_eq!(
        interp.mem.class_of(exception),
        interp.mem.known(well_known::ERROR_CLASS)
    );
    let message = interp
        .mem
        .string_of(interp.mem.inst_var(exception, object::exception::MESSAGE));
    assert_eq!(message, "Block context expired");
}

#[test]
fn this_context_reifies_an_inert_copy() {
    let mut interp = testkit::interpreter();
    let object_class = class_named(&interp.mem, "Object").unwrap();

    let method = MethodBuilder::new()
        .op(0x60) // some stack content
        .op(0xB6) // thisContext
        .op(0xDC)
        .build(&mut interp.mem, object_class);

    let nil = interp.mem.nil();
    let copy = run_method(&mut interp, method, nil, &[]);

    assert_eq!(
        interp.mem.class_of(copy),
        interp.mem.known(well_known::CODE_CONTEXT_CLASS)
    );
    // The copy's id is retagged as a small integer so the scavenger
    // treats the chain as plain data.
    let id = interp.mem.inst_var(copy, object::context::CONTEXT_ID);
    assert!(id.is_small_int());
    assert_eq!(
        interp.mem.inst_var(copy, object::context::METHOD),
        method
    );
    // The copied frame chain is detached from the live stack.
    assert!(!interp.mem.is_in_stack_space(copy));
}
