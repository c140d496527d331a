// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The bytecode set.
//!
//! One-byte opcodes with zero to five operand bytes. The low nibble of
//! the range opcodes (0x00-0x8F, 0xC0-0xCF) selects an index; dedicated
//! extended forms carry one- or two-byte operands. Opcodes 0xE0-0xFF
//! alias 0xC0-0xDF bit-for-bit (the high bit is a source-file hint the
//! compiler emits; execution ignores it).

/// Opcode values and range bases.
pub mod op {
    /// 0x00-0x0F: push named instance variable n of the receiver.
    pub const PUSH_INST_VAR: u8 = 0x00;
    /// 0x10-0x1F: store top into named instance variable n (no pop).
    pub const STORE_INST_VAR: u8 = 0x10;
    /// 0x20-0x2F: push local n+1 (receiver is local slot zero).
    pub const PUSH_LOCAL: u8 = 0x20;
    /// 0x30-0x3F: store top into local n+1 (no pop).
    pub const STORE_LOCAL: u8 = 0x30;
    /// 0x40-0x4F: push the value of the association at literal n.
    pub const PUSH_GLOBAL: u8 = 0x40;
    /// 0x50-0x5F: store top into the association at literal n.
    pub const STORE_GLOBAL: u8 = 0x50;
    /// 0x60-0x6F: push small integer n+1.
    pub const PUSH_SMALL_POSITIVE: u8 = 0x60;
    /// 0x70-0x7F: push small integer -n.
    pub const PUSH_SMALL_NEGATIVE: u8 = 0x70;
    /// 0x80-0x8F: push literal n.
    pub const PUSH_LITERAL: u8 = 0x80;

    pub const PUSH_TRUE: u8 = 0x90;
    pub const PUSH_FALSE: u8 = 0x91;
    pub const PUSH_NIL: u8 = 0x92;
    pub const PUSH_SELF: u8 = 0x93;

    pub const PUSH_INST_VAR_EXT1: u8 = 0x94;
    pub const PUSH_INST_VAR_EXT2: u8 = 0x95;
    pub const PUSH_LOCAL_EXT1: u8 = 0x96;
    pub const PUSH_LOCAL_EXT2: u8 = 0x97;
    pub const PUSH_LOCAL_INDIRECT: u8 = 0x98;
    pub const PUSH_LOCAL_INDIRECT_EXT: u8 = 0x99;
    pub const PUSH_GLOBAL_EXT1: u8 = 0x9A;
    pub const PUSH_GLOBAL_EXT2: u8 = 0x9B;
    pub const PUSH_LITERAL_EXT1: u8 = 0x9C;
    pub const PUSH_LITERAL_EXT2: u8 = 0x9D;
    pub const PUSH_INT8: u8 = 0x9E;
    pub const PUSH_INT16: u8 = 0x9F;
    pub const PUSH_INT32: u8 = 0xA0;

    /// Copying block: captures values, no home context.
    pub const PUSH_COPYING_BLOCK: u8 = 0xA1;
    /// Full block: captures values and the home context for `^`.
    pub const PUSH_FULL_BLOCK: u8 = 0xA2;

    pub const STORE_INST_VAR_EXT1: u8 = 0xA3;
    pub const STORE_INST_VAR_EXT2: u8 = 0xA4;
    pub const STORE_LOCAL_EXT1: u8 = 0xA5;
    pub const STORE_LOCAL_EXT2: u8 = 0xA6;
    pub const STORE_LOCAL_INDIRECT: u8 = 0xA7;
    pub const STORE_LOCAL_INDIRECT_EXT: u8 = 0xA8;
    pub const STORE_GLOBAL_EXT1: u8 = 0xA9;
    pub const STORE_GLOBAL_EXT2: u8 = 0xAA;
    /// Allocate a fresh array into a local (closure temp cells).
    pub const STORE_NEW_ARRAY: u8 = 0xAB;

    pub const POP: u8 = 0xAC;
    pub const DUP: u8 = 0xAD;
    pub const DROP_CASCADE_RECEIVER: u8 = 0xAE;

    pub const JUMP: u8 = 0xB0;
    pub const JUMP_EXT: u8 = 0xB1;
    pub const JUMP_IF_TRUE: u8 = 0xB2;
    pub const JUMP_IF_TRUE_EXT: u8 = 0xB3;
    pub const JUMP_IF_FALSE: u8 = 0xB4;
    pub const JUMP_IF_FALSE_EXT: u8 = 0xB5;

    /// Push a deep copy of the live frame chain.
    pub const THIS_CONTEXT: u8 = 0xB6;

    /// 0xB7-0xBA: instance-variable access through a captured-array
    /// local; same handlers as the local-indirect forms.
    pub const PUSH_SELF_INDIRECT: u8 = 0xB7;
    pub const PUSH_SELF_INDIRECT_EXT: u8 = 0xB8;
    pub const STORE_SELF_INDIRECT: u8 = 0xB9;
    pub const STORE_SELF_INDIRECT_EXT: u8 = 0xBA;

    /// 0xC0-0xCF: send literal n; argument count byte follows.
    pub const SEND_LITERAL: u8 = 0xC0;
    /// 0xD0-0xD5: super-send literal n; argument count byte follows.
    pub const SUPER_SEND_LITERAL: u8 = 0xD0;

    /// Special-selector dispatch; selector number byte follows.
    pub const CALL_WELL_KNOWN: u8 = 0xD6;

    pub const SEND_EXT1: u8 = 0xD7;
    pub const SEND_EXT2: u8 = 0xD8;
    pub const SUPER_SEND_EXT1: u8 = 0xD9;
    pub const SUPER_SEND_EXT2: u8 = 0xDA;

    /// Primitive call; two-byte primitive number follows.
    pub const PRIMITIVE_CALL: u8 = 0xDB;

    pub const RETURN: u8 = 0xDC;
    pub const BLOCK_RETURN: u8 = 0xDD;
    pub const NON_LOCAL_RETURN: u8 = 0xDE;
    /// Primitive result protocol: rcode then value on the stack.
    pub const PRIMITIVE_RETURN: u8 = 0xDF;
}

/// Fold the 0xE0-0xFF alias range onto 0xC0-0xDF.
#[inline]
#[must_use]
pub const fn normalize(bytecode: u8) -> u8 {
    if bytecode >= 0xE0 {
        bytecode - 0x20
    } else {
        bytecode
    }
}
