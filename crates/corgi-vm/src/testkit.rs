// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Test support: a small bootstrapped world, a hand assembler for
//! compiled methods, and harness helpers for running them.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::image::bootstrap::{
    Bootstrap, BootstrapConfig, class_named, install_method, new_symbol,
};
use crate::interp::Interpreter;
use crate::memory::{ObjectMemory, space_index};
use crate::object::{self, well_known};
use crate::oop::Oop;
use crate::platform::MockPlatform;
use crate::primitives::integer;
use num_bigint::{BigInt, Sign};

/// A bootstrap world small enough for fast collection tests.
pub(crate) fn small_world() -> ObjectMemory {
    Bootstrap::with_config(BootstrapConfig {
        eden_bytes: 128 * 1024,
        survivor_bytes: 96 * 1024,
        old_bytes: 1024 * 1024,
        stack_bytes: 96 * 1024,
        remembered_set_bytes: 16 * 1024,
    })
    .expect("bootstrap failed")
    .mem
}

/// An interpreter over a small world with a mock platform.
pub(crate) fn interpreter() -> Interpreter {
    Interpreter::new(small_world(), Box::new(MockPlatform::new()))
}

/// Like [`interpreter`], but keeps a handle on the mock platform's
/// recordings.
pub(crate) fn interpreter_with_platform() -> (Interpreter, MockPlatform) {
    let mock = MockPlatform::new();
    let handle = mock.clone();
    (
        Interpreter::new(small_world(), Box::new(mock)),
        handle,
    )
}

/// Hand assembler for compiled methods.
pub(crate) struct MethodBuilder {
    bytecodes: Vec<u8>,
    literals: Vec<Oop>,
    arguments: i64,
    temporaries: i64,
}

impl MethodBuilder {
    pub fn new() -> Self {
        Self {
            bytecodes: Vec::new(),
            literals: Vec::new(),
            arguments: 0,
            temporaries: 0,
        }
    }

    pub fn arguments(mut self, count: i64) -> Self {
        self.arguments = count;
        self
    }

    pub fn temporaries(mut self, count: i64) -> Self {
        self.temporaries = count;
        self
    }

    pub fn op(mut self, byte: u8) -> Self {
        self.bytecodes.push(byte);
        self
    }

    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.bytecodes.extend_from_slice(bytes);
        self
    }

    /// Add a literal and emit nothing; answers its index.
    pub fn literal(&mut self, value: Oop) -> u8 {
        self.literals.push(value);
        (self.literals.len() - 1) as u8
    }

    /// Emit a primitive call followed by the primitive-return protocol.
    pub fn primitive(self, number: u16) -> Self {
        self.op(0xDB)
            .op((number >> 8) as u8)
            .op(number as u8)
            .op(0xDF)
    }

    /// Assemble into a compiled method owned by `mclass`.
    pub fn build(self, mem: &mut ObjectMemory, mclass: Oop) -> Oop {
        let byte_array_class = mem.known(well_known::BYTE_ARRAY_CLASS);
        let bytecodes = mem
            .new_instance_of(byte_array_class, self.bytecodes.len() as u64, space_index::OLD)
            .unwrap();
        for (i, byte) in self.bytecodes.iter().enumerate() {
            mem.set_body_byte(bytecodes, i as u64, *byte);
        }

        let method_class = class_named(mem, "CompiledMethod").unwrap();
        let method = mem
            .new_instance_of(method_class, self.literals.len() as u64, space_index::OLD)
            .unwrap();

        mem.inst_var_put(method, object::method::BYTECODES, bytecodes);
        mem.inst_var_put(
            method,
            object::method::NUMBER_OF_ARGUMENTS,
            Oop::small_int(self.arguments),
        );
        mem.inst_var_put(
            method,
            object::method::NUMBER_OF_TEMPORARIES,
            Oop::small_int(self.temporaries),
        );
        mem.inst_var_put(method, object::method::STACK_NEEDED, Oop::small_int(16));
        mem.inst_var_put(method, object::method::MCLASS, mclass);

        for (i, literal) in self.literals.iter().enumerate() {
            mem.inst_var_put(method, object::method::LITERALS + i as u64, *literal);
        }
        method
    }

    /// Assemble as a compiled block instead.
    pub fn build_block(self, mem: &mut ObjectMemory, mclass: Oop) -> Oop {
        let block_class = class_named(mem, "CompiledBlock").unwrap();
        let method = self.build(mem, mclass);
        mem.set_class_field(method, block_class);
        method
    }
}

/// Install `method` on `class` under a fresh selector symbol; answers
/// the selector.
pub(crate) fn install(
    mem: &mut ObjectMemory,
    class: Oop,
    selector_name: &str,
    method: Oop,
) -> Oop {
    let selector = new_symbol(mem, selector_name).unwrap();
    install_method(mem, class, selector, method).unwrap();
    mem.inst_var_put(method, object::method::SELECTOR, selector);
    selector
}

/// Run a method against a receiver and answer the value it returns.
///
/// The receiver and arguments are parked in an old-space array first:
/// the interpreter setup scavenges, and raw oops into new space would
/// not survive it.
pub(crate) fn run_method(
    interp: &mut Interpreter,
    method: Oop,
    receiver: Oop,
    args: &[Oop],
) -> Oop {
    let array_class = interp.mem.known(well_known::ARRAY_CLASS);
    let parked = interp
        .mem
        .new_instance_of(array_class, args.len() as u64 + 1, space_index::OLD)
        .unwrap();
    interp.mem.inst_var_put(parked, 0, receiver);
    for (i, arg) in args.iter().enumerate() {
        interp.mem.inst_var_put(parked, i as u64 + 1, *arg);
    }

    interp.setup_interpreter().unwrap();

    let receiver = interp.mem.inst_var(parked, 0);
    interp.push(receiver);
    for i in 0..args.len() {
        let arg = interp.mem.inst_var(parked, i as u64 + 1);
        interp.push(arg);
    }
    interp.invoke(method, args.len() as u64).unwrap();
    interp.basic_interpret(0).unwrap();
    interp.top()
}

/// Invoke a primitive through a stub method whose fallback returns the
/// failure code. Answers the result on success and the rcode on failure.
pub(crate) fn call_primitive(
    interp: &mut Interpreter,
    number: u16,
    receiver: Oop,
    args: &[Oop],
) -> Oop {
    let object_class = class_named(&interp.mem, "Object").unwrap();
    let method = MethodBuilder::new()
        .arguments(args.len() as i64)
        .primitive(number)
        .op(0xDC)
        .build(&mut interp.mem, object_class);
    run_method(interp, method, receiver, args)
}

/// Give the world a `raiseSignal` handler that halts the interpreter,
/// so error paths surface as breakpoints the tests can assert on.
pub(crate) fn install_raise_signal_halt(interp: &mut Interpreter) {
    let object_class = class_named(&interp.mem, "Object").unwrap();
    let method = MethodBuilder::new()
        .op(0xD6)
        .op(object::special::HALT)
        .op(0x93)
        .op(0xDC)
        .build(&mut interp.mem, object_class);
    let selector = crate::image::bootstrap::special_selector(&interp.mem, 0x10);
    install_method(&mut interp.mem, object_class, selector, method).unwrap();
}

/// Build a large integer from a `BigInt` (test oracle direction).
pub(crate) fn large_int_from(interp: &mut Interpreter, value: &BigInt) -> Oop {
    let (sign, digits) = value.to_u32_digits();
    let components: Vec<u32> = if digits.is_empty() { vec![0] } else { digits };

    let words = (components.len() as u64 + 1) / 2 + 1;
    let result = integer::allocate_large_integer(
        interp,
        words,
        if sign == Sign::Minus { -1 } else { 1 },
    )
    .unwrap();

    for (i, component) in components.iter().enumerate() {
        integer::component_at_put(&mut interp.mem, result, i as u64, u64::from(*component));
    }
    result
}

/// Read any Smalltalk integer back into a `BigInt`.
pub(crate) fn int_to_bigint(mem: &ObjectMemory, value: Oop) -> BigInt {
    if value.is_small_int() {
        return BigInt::from(value.as_small_int());
    }

    let size = integer::component_size(mem, value);
    let digits: Vec<u32> = (0..size)
        .map(|i| integer::component_at(mem, value, i) as u32)
        .collect();
    let sign = if integer::is_large_positive(mem, value) {
        Sign::Plus
    } else {
        Sign::Minus
    };
    let magnitude = BigInt::from_slice(Sign::Plus, &digits);
    if sign == Sign::Minus {
        -magnitude
    } else {
        magnitude
    }
}
