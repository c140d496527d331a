// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Object header and body layouts.
//!
//! Objects are split in two: a fixed-size header (five arena words) and a
//! variable-size body the header points at. The header stores size, flag
//! bits, the survivor flip counter, the named-slot count, the class, the
//! identity hash, and the body pointer. For object spaces the word
//! directly after a body holds the header address, which is what makes
//! header compaction possible.
//!
//! The VM knows the body shape of a handful of classes (contexts,
//! compiled methods, block closures, behaviors, ...). Those shapes are
//! expressed here as named word offsets rather than structs: all body
//! access goes through the object memory by slot index.

#[cfg(test)]
mod object_test;

use bitflags::bitflags;

/// Words in an object header.
pub const HEADER_WORDS: u64 = 5;
/// Bytes in an object header.
pub const HEADER_BYTES: u64 = HEADER_WORDS * 8;

/// Header word offsets (in words from the header address).
pub mod header {
    /// Total size in bytes, including the header itself.
    pub const SIZE: u64 = 0;
    /// Packed word: `flags | flips << 16 | named_inst_vars << 32`.
    pub const PACKED: u64 = 1;
    /// Class oop. Doubles as the forwarding pointer once RELOCATED is set.
    pub const CLASS: u64 = 2;
    /// Immutable 60-bit identity hash, assigned at allocation.
    pub const IDENTITY_HASH: u64 = 3;
    /// Byte address of the body, 0 for bodiless objects.
    pub const BODY_POINTER: u64 = 4;
}

bitflags! {
    /// Object header flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ObjectFlags: u16 {
        /// Body holds raw bytes, not oops.
        const BYTES = 1;
        /// Body carries indexed slots after the named ones.
        const INDEXED = 2;
        /// Header has been forwarded; `class` holds the new address.
        const RELOCATED = 4;
        /// Header is dead and reusable.
        const FREE = 8;
        /// Reached during the current global mark phase.
        const MARK = 16;
        /// Sitting in the mark queue.
        const QUEUED_FOR_MARK = 32;
        /// The object wraps a memory space; collectors leave it alone.
        const SPACE_OBJECT = 64;
        /// Shape-migration marker managed from the image.
        const VM_MIGRATION_NEW = 128;
    }
}

bitflags! {
    /// Behavior (class) layout flag bits, the low byte of the behavior
    /// flags word. The named instance variable count occupies bits 16 up.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BehaviorFlags: u8 {
        /// Instances are byte objects.
        const BYTES = 1;
        /// Instances carry indexed slots.
        const INDEXED = 2;
    }
}

/// Context (activation record) body slots.
pub mod context {
    /// Caller context, or nil at the bottom frame.
    pub const FRAME: u64 = 0;
    /// Operand stack depth, a small integer in oop-slot units.
    pub const STACK_OFFSET: u64 = 1;
    /// Byte index into the current method's bytecodes, a small integer.
    pub const PC_OFFSET: u64 = 2;
    /// Executing compiled method or compiled block.
    pub const METHOD: u64 = 3;
    /// Home context for non-local return (blocks only, else nil).
    pub const METHOD_CONTEXT: u64 = 4;
    /// Context-tagged self-reference; retagged small integer in copies.
    pub const CONTEXT_ID: u64 = 5;
    /// First operand stack slot; the stack is open-ended from here.
    pub const STACK_BODY: u64 = 6;
}

/// Compiled method (and compiled block) body slots. The two shapes are
/// identical so the interpreter can treat them interchangeably.
pub mod method {
    pub const BYTECODES: u64 = 0;
    pub const NUMBER_OF_ARGUMENTS: u64 = 1;
    pub const NUMBER_OF_TEMPORARIES: u64 = 2;
    pub const LOCAL_VARIABLE_NAMES: u64 = 3;
    pub const STACK_NEEDED: u64 = 4;
    pub const POLYMORPHIC_INLINE_CACHE: u64 = 5;
    pub const SOURCE_OFFSETS: u64 = 6;
    /// The class the method is installed in.
    pub const MCLASS: u64 = 7;
    pub const SELECTOR: u64 = 8;
    pub const KIT: u64 = 9;
    /// First literal; literals are the indexed tail.
    pub const LITERALS: u64 = 10;
}

/// Block closure body slots.
pub mod closure {
    /// The compiled block.
    pub const METHOD: u64 = 0;
    /// Home frame for non-local return; nil for clean blocks.
    pub const METHOD_CONTEXT: u64 = 1;
    /// Array of captured variables.
    pub const COPIED_VALUES: u64 = 2;
}

/// Behavior body slots, the common prefix of classes and metaclasses.
pub mod behavior {
    pub const SUPERCLASS: u64 = 0;
    /// Identity dictionary mapping selectors to compiled methods.
    pub const METHOD_DICTIONARY: u64 = 1;
    /// Packed flags word (see `BehaviorFlags`), a small integer.
    pub const FLAGS: u64 = 2;
    pub const SUBCLASSES: u64 = 3;
    pub const INST_VAR_NAMES: u64 = 4;
}

/// Class body slots (behavior prefix included).
pub mod class {
    pub const ORGANIZATION: u64 = 5;
    pub const NAME: u64 = 6;
    pub const KIT: u64 = 7;
    pub const ENVIRONMENT: u64 = 8;
    /// Named slot count of a class object.
    pub const NAMED_SLOTS: u64 = 9;
}

/// Metaclass body slots (behavior prefix included).
pub mod metaclass {
    pub const ORGANIZATION: u64 = 5;
    /// The class this metaclass describes.
    pub const THIS_CLASS: u64 = 6;
    /// Named slot count of a metaclass object.
    pub const NAMED_SLOTS: u64 = 7;
}

/// The System class carries extra class-side slots after the class shape.
pub mod system_class {
    pub const CURRENT: u64 = 9;
    pub const IMAGE_NAME: u64 = 10;
    pub const SOURCE_FILES: u64 = 11;
    pub const SOURCE_FILE_NAMES: u64 = 12;
    /// Array of (selector symbol, argument count) pairs the interpreter
    /// consults for the special-selector opcode.
    pub const SPECIAL_SELECTORS: u64 = 13;
    /// Named slot count of the System class object.
    pub const NAMED_SLOTS: u64 = 14;
}

/// System instance body slots.
pub mod system {
    pub const EVENT: u64 = 0;
    pub const CONTEXT: u64 = 1;
    pub const APPLICATION: u64 = 2;
    pub const WAKEUP_TIME: u64 = 3;
    pub const WAKEUP_SEMAPHORE: u64 = 4;
    pub const IDLE_SEMAPHORE: u64 = 5;
    pub const IN_APP_TRANSACTION_FILER: u64 = 6;
    pub const RUNNING: u64 = 7;
    pub const EVENT_QUEUE: u64 = 8;
}

/// Association body slots (dictionary entries and global variable cells).
pub mod association {
    pub const KEY: u64 = 0;
    pub const VALUE: u64 = 1;
}

/// Identity dictionary body slots.
pub mod dictionary {
    /// Open-addressed array of associations.
    pub const VALUES: u64 = 0;
    pub const TALLY: u64 = 1;
}

/// Large integer body slots.
pub mod large_integer {
    /// Byte array of little-endian 32-bit components.
    pub const BYTES: u64 = 0;
    /// Live component count, a small integer.
    pub const COMPONENT_SIZE: u64 = 1;
}

/// Exception body slots.
pub mod exception {
    pub const MESSAGE: u64 = 0;
    pub const ACTION: u64 = 1;
    pub const RESULT: u64 = 2;
}

/// Well-known object indices. The image and the VM must agree on these
/// exactly; they are the VM's only named entry points into the heap.
pub mod well_known {
    pub const NIL: u64 = 0;
    pub const TRUE: u64 = 1;
    pub const FALSE: u64 = 2;
    pub const SYSTEM_DICTIONARY: u64 = 3;
    pub const SYMBOL_TABLE: u64 = 4;
    pub const START_OBJECT: u64 = 5;
    pub const START_SELECTOR: u64 = 6;
    pub const START_CONTEXT: u64 = 7;
    pub const SMALL_INTEGER_CLASS: u64 = 8;
    pub const CHARACTER_CLASS: u64 = 9;
    pub const BLOCK_CLOSURE_CLASS: u64 = 10;
    pub const ARRAY_CLASS: u64 = 11;
    pub const FLOAT_CLASS: u64 = 12;
    pub const OBSOLETE_CLASS: u64 = 13;
    pub const LARGE_POSITIVE_INTEGER_CLASS: u64 = 14;
    pub const LARGE_NEGATIVE_INTEGER_CLASS: u64 = 15;
    pub const OS_HANDLE_CLASS: u64 = 16;
    pub const BYTE_STRING_CLASS: u64 = 17;
    pub const BYTE_SYMBOL_CLASS: u64 = 18;
    pub const UNINTERPRETED_BYTES_CLASS: u64 = 19;
    pub const SYSTEM_CLASS: u64 = 20;
    pub const CLASS_CLASS: u64 = 21;
    pub const METACLASS_CLASS: u64 = 22;
    pub const COMPILED_BLOCK_CLASS: u64 = 23;
    pub const ASSOCIATION_CLASS: u64 = 24;
    pub const CODE_CONTEXT_CLASS: u64 = 25;
    pub const BYTE_ARRAY_CLASS: u64 = 26;
    pub const BYTECODE_TABLE: u64 = 27;
    pub const SMALLTALK_PARSER_CLASS: u64 = 28;
    pub const EXCEPTION_HANDLERS: u64 = 29;
    pub const MESSAGE_NOT_UNDERSTOOD_CLASS: u64 = 30;
    pub const ERROR_CLASS: u64 = 31;
    pub const JSON_PARSER_CLASS: u64 = 32;
    pub const MEMORY_SPACE_CLASS: u64 = 33;
    /// Highest assigned index.
    pub const LAST: u64 = 33;
}

/// Special selector numbers for the call-well-known opcode. The symbols
/// and argument counts live in the System class special-selector table,
/// two slots per entry.
pub mod special {
    pub const PLUS: u8 = 0x00;
    pub const MINUS: u8 = 0x01;
    pub const TIMES: u8 = 0x02;
    pub const NOT: u8 = 0x03;
    pub const IDENTICAL: u8 = 0x04;
    pub const NOT_IDENTICAL: u8 = 0x05;
    pub const EQUALS: u8 = 0x06;
    pub const NOT_EQUALS: u8 = 0x07;
    pub const IS_NIL: u8 = 0x08;
    pub const NOT_NIL: u8 = 0x09;
    pub const GREATER_THAN: u8 = 0x0a;
    pub const LESS_THAN: u8 = 0x0b;
    pub const GREATER_THAN_OR_EQUAL: u8 = 0x0c;
    pub const LESS_THAN_OR_EQUAL: u8 = 0x0d;
    pub const EVALUATE: u8 = 0x0e;
    pub const PRINT_STRING: u8 = 0x0f;
    pub const RAISE_SIGNAL: u8 = 0x10;
    pub const PERFORM_WITH_ARGUMENTS: u8 = 0x11;
    pub const HALT: u8 = 0x12;
    pub const DEBUGIT: u8 = 0x13;
    pub const EVALUATE_JSON: u8 = 0x14;
}

/// Pack the header's flags/flips/named-slots word.
#[inline]
#[must_use]
pub const fn pack_header_word(flags: u16, flips: u16, named_inst_vars: u32) -> u64 {
    (flags as u64) | ((flips as u64) << 16) | ((named_inst_vars as u64) << 32)
}

/// Flags field of a packed header word.
#[inline]
#[must_use]
pub const fn packed_flags(word: u64) -> u16 {
    word as u16
}

/// Flips field of a packed header word.
#[inline]
#[must_use]
pub const fn packed_flips(word: u64) -> u16 {
    (word >> 16) as u16
}

/// Named instance variable count of a packed header word.
#[inline]
#[must_use]
pub const fn packed_named_inst_vars(word: u64) -> u32 {
    (word >> 32) as u32
}

/// Layout flags of a behavior flags word (low byte).
#[inline]
#[must_use]
pub const fn behavior_layout_flags(flags_word: i64) -> BehaviorFlags {
    BehaviorFlags::from_bits_truncate((flags_word & 0xFF) as u8)
}

/// Named instance variable count of a behavior flags word (bits 16 up).
#[inline]
#[must_use]
pub const fn behavior_named_inst_vars(flags_word: i64) -> u64 {
    (flags_word >> 16) as u64
}

/// Build a behavior flags word from layout flags and a slot count.
#[inline]
#[must_use]
pub const fn behavior_flags_word(flags: BehaviorFlags, named_inst_vars: u64) -> i64 {
    (flags.bits() as i64) | ((named_inst_vars as i64) << 16)
}
