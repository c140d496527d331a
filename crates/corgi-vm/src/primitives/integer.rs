// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Integer primitives.
//!
//! Small integers are immediates; sums and differences whose top four
//! bits carry are promoted to large integers, and products leave the
//! fast path once either operand exceeds 30 bits.
//!
//! Large integers store their magnitude as little-endian 32-bit
//! components inside a byte array, with the live component count kept in
//! a separate slot and the sign carried by the class. Multiplication is
//! the classical cross product; a Karatsuba path is kept behind its own
//! primitive number for calibration. Division is Knuth's Algorithm D
//! with divisor normalization and downward-corrected digit guesses.
//!
//! Everything here allocates, so every helper roots its intermediates on
//! the evaluation stack.

use super::{fail_with_receiver, succeed};
use crate::error::VmError;
use crate::interp::{CARRY_MASK, Interpreter};
use crate::memory::{ObjectMemory, space_index};
use crate::object::{large_integer, well_known};
use crate::oop::Oop;
use log::warn;

pub const PRIM_SMALLINTEGER_PLUS: u16 = 1;
pub const PRIM_SMALLINTEGER_MINUS: u16 = 2;
pub const PRIM_SMALLINTEGER_LESS_THAN: u16 = 3;
pub const PRIM_SMALLINTEGER_GREATER_THAN: u16 = 4;
pub const PRIM_SMALLINTEGER_LESS_THAN_OR_EQUAL: u16 = 5;
pub const PRIM_SMALLINTEGER_GREATER_THAN_OR_EQUAL: u16 = 6;
pub const PRIM_SMALLINTEGER_EQUAL: u16 = 7;
pub const PRIM_SMALLINTEGER_NOT_EQUAL: u16 = 8;
pub const PRIM_SMALLINTEGER_TIMES: u16 = 9;
pub const PRIM_SMALLINTEGER_DIVIDE: u16 = 10;
pub const PRIM_SMALLINTEGER_MODULO: u16 = 11;
pub const PRIM_SMALLINTEGER_INT_DIVIDE: u16 = 12;
pub const PRIM_SMALLINTEGER_AS_FLOAT: u16 = 13;
pub const PRIM_BITSHIFT: u16 = 14;

pub const PRIM_AS_LARGEINTEGER: u16 = 20;
pub const PRIM_LARGEINTEGER_PLUS: u16 = 21;
pub const PRIM_LARGEINTEGER_MINUS: u16 = 22;
pub const PRIM_LARGEINTEGER_LESS_THAN: u16 = 23;
pub const PRIM_LARGEINTEGER_GREATER_THAN: u16 = 24;
pub const PRIM_LARGEINTEGER_LESS_THAN_OR_EQUAL: u16 = 25;
pub const PRIM_LARGEINTEGER_GREATER_THAN_OR_EQUAL: u16 = 26;
pub const PRIM_LARGEINTEGER_EQUAL: u16 = 27;
pub const PRIM_LARGEINTEGER_NOT_EQUAL: u16 = 28;
pub const PRIM_LARGEINTEGER_TIMES: u16 = 29;
pub const PRIM_LARGEINTEGER_DIVIDE: u16 = 30;
pub const PRIM_LARGEINTEGER_MODULO: u16 = 31;
pub const PRIM_LARGEINTEGER_INT_DIVIDE: u16 = 32;
pub const PRIM_LARGEINTEGER_DIVIDE_WITH_REMAINDER: u16 = 33;
pub const PRIM_LARGEINTEGER_TIMES_FAST: u16 = 34;
pub const PRIM_LARGEINTEGER_AS_FLOAT: u16 = 35;

pub const PRIM_BIT_AND: u16 = 90;
pub const PRIM_BIT_OR: u16 = 91;
pub const PRIM_BIT_XOR: u16 = 92;
pub const PRIM_BIT_INVERT: u16 = 93;

// ----------------------------------------------------------------------
// Component access

/// Whether an oop is a large integer of either sign.
pub fn is_large_integer(mem: &ObjectMemory, value: Oop) -> bool {
    let class = mem.class_of(value);
    class == mem.known(well_known::LARGE_POSITIVE_INTEGER_CLASS)
        || class == mem.known(well_known::LARGE_NEGATIVE_INTEGER_CLASS)
}

pub(crate) fn is_large_positive(mem: &ObjectMemory, value: Oop) -> bool {
    mem.class_of(value) == mem.known(well_known::LARGE_POSITIVE_INTEGER_CLASS)
}

/// Live component count.
pub(crate) fn component_size(mem: &ObjectMemory, x: Oop) -> u64 {
    mem.inst_var(x, large_integer::COMPONENT_SIZE).as_small_int() as u64
}

/// 32-bit component `index` of a large integer; zero past the array.
pub(crate) fn component_at(mem: &ObjectMemory, x: Oop, index: u64) -> u64 {
    let bytes = mem.inst_var(x, large_integer::BYTES);
    if index / 2 + 1 > mem.indexed_object_size(bytes) {
        return 0;
    }
    let addr = mem.body_pointer(bytes) + index * 4;
    let word = mem.word(addr & !7);
    u64::from((word >> ((addr % 8) * 8)) as u32)
}

/// Scan off trailing zero components.
fn recompute_component_size(mem: &ObjectMemory, x: Oop) -> u64 {
    let bytes = mem.inst_var(x, large_integer::BYTES);
    let words = mem.total_object_size(bytes);
    let mut last = (words * 2).saturating_sub(1);
    while last > 0 && component_at(mem, x, last) == 0 {
        last -= 1;
    }
    last + 1
}

/// Store component `index`, maintaining the live count.
pub(crate) fn component_at_put(mem: &mut ObjectMemory, x: Oop, index: u64, value: u64) {
    let bytes = mem.inst_var(x, large_integer::BYTES);
    if index / 2 + 1 > mem.indexed_object_size(bytes) {
        return;
    }
    let addr = mem.body_pointer(bytes) + index * 4;
    let shift = (addr % 8) * 8;
    let word = mem.word(addr & !7);
    let patched = (word & !(0xFFFF_FFFFu64 << shift)) | ((value & 0xFFFF_FFFF) << shift);
    mem.set_word(addr & !7, patched);

    if value == 0 {
        if index + 1 == component_size(mem, x) {
            let size = recompute_component_size(mem, x);
            mem.basic_inst_var_put(
                x,
                large_integer::COMPONENT_SIZE,
                Oop::small_int(size as i64),
            );
        }
    } else if index + 1 > component_size(mem, x) {
        mem.basic_inst_var_put(
            x,
            large_integer::COMPONENT_SIZE,
            Oop::small_int(index as i64 + 1),
        );
    }
}

/// Add a 64-bit value into the component stream at `index`, rippling the
/// carry.
fn component_at_add(mem: &mut ObjectMemory, x: Oop, index: u64, value: u64) {
    let bytes = mem.inst_var(x, large_integer::BYTES);
    let capacity = mem.total_object_size(bytes) * 2;
    let mut component = value;
    let mut carry: u64 = 0;

    let mut i = index;
    while i < capacity + 1 {
        let sum = component_at(mem, x, i) + (component & 0xFFFF_FFFF) + carry;
        component_at_put(mem, x, i, sum & 0xFFFF_FFFF);
        component >>= 32;
        carry = sum >> 32;
        if component == 0 && carry == 0 {
            break;
        }
        i += 1;
    }
}

fn is_zero(mem: &ObjectMemory, x: Oop) -> bool {
    component_size(mem, x) <= 1 && component_at(mem, x, 0) == 0
}

/// Word `index` of the magnitude (two components).
fn magnitude_word(mem: &ObjectMemory, x: Oop, index: u64) -> u64 {
    let bytes = mem.inst_var(x, large_integer::BYTES);
    mem.inst_var(bytes, index).bits()
}

// ----------------------------------------------------------------------
// Allocation and conversion

/// Allocate a large integer with a byte array of `size_words` words of
/// component storage. Positive signs get the positive class.
pub fn allocate_large_integer(
    interp: &mut Interpreter,
    size_words: u64,
    sign: i32,
) -> Result<Oop, VmError> {
    let class = if sign >= 0 {
        interp.mem.known(well_known::LARGE_POSITIVE_INTEGER_CLASS)
    } else {
        interp.mem.known(well_known::LARGE_NEGATIVE_INTEGER_CLASS)
    };

    let roots = interp.push_roots(1);
    let result = interp.mem.new_instance_of(class, 0, space_index::EDEN)?;
    interp.set_root(roots, 0, result);

    let byte_array_class = interp.mem.known(well_known::BYTE_ARRAY_CLASS);
    let array =
        interp
            .mem
            .new_instance_of(byte_array_class, size_words * 8, space_index::EDEN)?;
    let result = interp.root(roots, 0);
    interp.mem.inst_var_put(result, large_integer::BYTES, array);
    interp
        .mem
        .basic_inst_var_put(result, large_integer::COMPONENT_SIZE, Oop::small_int(1));

    interp.pop_roots(roots);
    Ok(result)
}

/// Promote an overflowed 61-bit sum or difference. The magnitude always
/// fits two components.
pub fn as_sum_large_integer(interp: &mut Interpreter, value: i64) -> Result<Oop, VmError> {
    let sign = if value < 0 { -1 } else { 1 };
    let magnitude = value.unsigned_abs();

    let result = interp.mem.new_instance_of(
        if sign >= 0 {
            interp.mem.known(well_known::LARGE_POSITIVE_INTEGER_CLASS)
        } else {
            interp.mem.known(well_known::LARGE_NEGATIVE_INTEGER_CLASS)
        },
        0,
        space_index::EDEN,
    )?;

    let roots = interp.push_roots(1);
    interp.set_root(roots, 0, result);
    let byte_array_class = interp.mem.known(well_known::BYTE_ARRAY_CLASS);
    let array = interp
        .mem
        .new_instance_of(byte_array_class, 8, space_index::EDEN)?;
    let result = interp.root(roots, 0);
    interp.mem.inst_var_put(result, large_integer::BYTES, array);
    interp.mem.basic_inst_var_put(array, 0, Oop::from_bits(magnitude));

    let size = recompute_component_size(&interp.mem, result);
    interp.mem.basic_inst_var_put(
        result,
        large_integer::COMPONENT_SIZE,
        Oop::small_int(size as i64),
    );
    interp.pop_roots(roots);
    Ok(result)
}

/// Promote a small integer to its large form; large integers pass
/// through.
pub fn small_to_large_integer(interp: &mut Interpreter, value: Oop) -> Result<Oop, VmError> {
    if is_large_integer(&interp.mem, value) {
        return Ok(value);
    }
    if !value.is_small_int() {
        warn!("argument is not an integer");
        return Ok(value);
    }

    let int_value = value.as_small_int();
    let result = allocate_large_integer(interp, 1, if int_value < 0 { -1 } else { 1 })?;

    let array = interp.mem.inst_var(result, large_integer::BYTES);
    interp
        .mem
        .basic_inst_var_put(array, 0, Oop::from_bits(int_value.unsigned_abs()));
    let size = recompute_component_size(&interp.mem, result);
    interp.mem.basic_inst_var_put(
        result,
        large_integer::COMPONENT_SIZE,
        Oop::small_int(size as i64),
    );
    Ok(result)
}

/// Demote to a small integer when the magnitude fits 60 bits; otherwise
/// trim trailing zero words of the component array.
pub fn large_integer_reduce(interp: &mut Interpreter, x: Oop) -> Result<Oop, VmError> {
    if x.is_small_int() {
        return Ok(x);
    }

    const X: usize = 0;
    const ARRAY: usize = 1;
    const NEW_ARRAY: usize = 2;

    let roots = interp.push_roots(3);
    interp.set_root(roots, X, x);
    let array = interp.mem.inst_var(x, large_integer::BYTES);
    interp.set_root(roots, ARRAY, array);

    let object_size = interp.mem.total_object_size(array);
    let mut last_word = object_size;
    while last_word > 1 && magnitude_word(&interp.mem, interp.root(roots, X), last_word - 1) == 0
    {
        last_word -= 1;
    }

    if last_word == 1 {
        let word = magnitude_word(&interp.mem, interp.root(roots, X), 0);
        if word < 0x1000_0000_0000_0000 {
            let sign: i64 = if is_large_positive(&interp.mem, interp.root(roots, X)) {
                1
            } else {
                -1
            };
            interp.pop_roots(roots);
            return Ok(Oop::small_int(word as i64 * sign));
        }
    }

    if last_word == object_size {
        let result = interp.root(roots, X);
        interp.pop_roots(roots);
        return Ok(result);
    }

    let byte_array_class = interp.mem.known(well_known::BYTE_ARRAY_CLASS);
    let new_array =
        interp
            .mem
            .new_instance_of(byte_array_class, last_word * 8, space_index::EDEN)?;
    interp.set_root(roots, NEW_ARRAY, new_array);
    let x = interp.root(roots, X);
    let new_array = interp.root(roots, NEW_ARRAY);
    interp.mem.inst_var_put(x, large_integer::BYTES, new_array);

    let old_array = interp.root(roots, ARRAY);
    for i in 0..last_word {
        let word = interp.mem.inst_var(old_array, i);
        interp.mem.basic_inst_var_put(new_array, i, word);
    }

    let size = recompute_component_size(&interp.mem, x);
    interp.mem.basic_inst_var_put(
        x,
        large_integer::COMPONENT_SIZE,
        Oop::small_int(size as i64),
    );
    interp.pop_roots(roots);
    Ok(x)
}

/// Compare magnitudes word by word: 1, 0 or -1.
fn abs_compare(mem: &ObjectMemory, x: Oop, y: Oop) -> i32 {
    let x_array = mem.inst_var(x, large_integer::BYTES);
    let y_array = mem.inst_var(y, large_integer::BYTES);
    let x_words = mem.total_object_size(x_array);
    let y_words = mem.total_object_size(y_array);

    if x_words > y_words {
        for i in (y_words..x_words).rev() {
            if mem.inst_var(x_array, i).bits() > 0 {
                return 1;
            }
        }
    } else if y_words > x_words {
        for i in (x_words..y_words).rev() {
            if mem.inst_var(y_array, i).bits() > 0 {
                return -1;
            }
        }
    }

    for i in (0..x_words.min(y_words)).rev() {
        let x_word = mem.inst_var(x_array, i).bits();
        let y_word = mem.inst_var(y_array, i).bits();
        if x_word > y_word {
            return 1;
        }
        if y_word > x_word {
            return -1;
        }
    }
    0
}

// ----------------------------------------------------------------------
// Magnitude add and subtract

fn basic_large_plus(
    interp: &mut Interpreter,
    x: Oop,
    y: Oop,
    sign: i32,
) -> Result<Oop, VmError> {
    let new_size = component_size(&interp.mem, x).max(component_size(&interp.mem, y)) + 1;

    const X: usize = 0;
    const Y: usize = 1;
    let roots = interp.push_roots(2);
    interp.set_root(roots, X, x);
    interp.set_root(roots, Y, y);

    let result = allocate_large_integer(interp, (new_size + 1) / 2 + 1, sign)?;
    let x = interp.root(roots, X);
    let y = interp.root(roots, Y);
    interp.pop_roots(roots);

    let mut carry: u64 = 0;
    for i in 0..new_size {
        let sum = component_at(&interp.mem, x, i) + component_at(&interp.mem, y, i) + carry;
        component_at_put(&mut interp.mem, result, i, sum & 0xFFFF_FFFF);
        carry = sum >> 32;
    }
    Ok(result)
}

/// Magnitude subtraction; callers order the operands so `x >= y`.
fn basic_large_minus(
    interp: &mut Interpreter,
    x: Oop,
    y: Oop,
    sign: i32,
) -> Result<Oop, VmError> {
    let new_size = component_size(&interp.mem, x).max(component_size(&interp.mem, y)) + 1;

    const X: usize = 0;
    const Y: usize = 1;
    let roots = interp.push_roots(2);
    interp.set_root(roots, X, x);
    interp.set_root(roots, Y, y);

    let result = allocate_large_integer(interp, (new_size + 1) / 2 + 1, sign)?;
    let x = interp.root(roots, X);
    let y = interp.root(roots, Y);
    interp.pop_roots(roots);

    let mut borrow: u64 = 0;
    for i in 0..new_size {
        let difference = component_at(&interp.mem, x, i)
            .wrapping_sub(component_at(&interp.mem, y, i))
            .wrapping_sub(borrow);
        component_at_put(&mut interp.mem, result, i, difference & 0xFFFF_FFFF);
        borrow = u64::from(difference & 0xFFFF_FFFF_0000_0000 != 0);
    }
    Ok(result)
}

fn sign_of(mem: &ObjectMemory, value: Oop) -> i32 {
    if is_large_positive(mem, value) { 1 } else { -1 }
}

// ----------------------------------------------------------------------
// Multiplication

/// Components `start..=end` of `source` as a fresh positive large
/// integer, with slack for in-place additions.
fn extract_components(
    interp: &mut Interpreter,
    source: Oop,
    start: u64,
    end: u64,
) -> Result<Oop, VmError> {
    const SOURCE: usize = 0;
    let roots = interp.push_roots(1);
    interp.set_root(roots, SOURCE, source);

    let result = allocate_large_integer(interp, (end - start) / 2 + 2, 1)?;
    let source = interp.root(roots, SOURCE);
    interp.pop_roots(roots);

    for i in 0..=(end - start) {
        let component = component_at(&interp.mem, source, start + i);
        component_at_put(&mut interp.mem, result, i, component);
    }
    Ok(result)
}

/// Assemble `ac * B^2 + (ad+bc) * B + bd` where `B = 2^(32*size)`.
fn combine_product(
    interp: &mut Interpreter,
    ac: Oop,
    ad_plus_bc: Oop,
    bd: Oop,
    size: u64,
) -> Result<Oop, VmError> {
    const AC: usize = 0;
    const AD_PLUS_BC: usize = 1;
    const BD: usize = 2;
    let roots = interp.push_roots(3);
    interp.set_root(roots, AC, ac);
    interp.set_root(roots, AD_PLUS_BC, ad_plus_bc);
    interp.set_root(roots, BD, bd);

    let result = allocate_large_integer(interp, size * 4, 1)?;
    let ac = interp.root(roots, AC);
    let ad_plus_bc = interp.root(roots, AD_PLUS_BC);
    let bd = interp.root(roots, BD);
    interp.pop_roots(roots);

    let mut component: u64 = 0;
    for i in 0..size {
        component += component_at(&interp.mem, bd, i);
        component_at_put(&mut interp.mem, result, i, component & 0xFFFF_FFFF);
        component >>= 32;
    }
    for i in 0..size {
        component += component_at(&interp.mem, bd, size + i);
        component += component_at(&interp.mem, ad_plus_bc, i);
        component_at_put(&mut interp.mem, result, size + i, component & 0xFFFF_FFFF);
        component >>= 32;
    }
    for i in 0..size {
        component += component_at(&interp.mem, ad_plus_bc, size + i);
        component += component_at(&interp.mem, ac, i);
        component_at_put(&mut interp.mem, result, size * 2 + i, component & 0xFFFF_FFFF);
        component >>= 32;
    }
    for i in 0..size {
        component += component_at(&interp.mem, ac, size + i);
        component_at_put(&mut interp.mem, result, size * 3 + i, component & 0xFFFF_FFFF);
        component >>= 32;
    }
    Ok(result)
}

fn inplace_plus(mem: &mut ObjectMemory, x: Oop, y: Oop) {
    let new_size = component_size(mem, x).max(component_size(mem, y)) + 1;
    let mut carry: u64 = 0;
    for i in 0..=new_size {
        let sum = component_at(mem, x, i) + component_at(mem, y, i) + carry;
        component_at_put(mem, x, i, sum & 0xFFFF_FFFF);
        carry = sum >> 32;
    }
}

fn inplace_minus(mem: &mut ObjectMemory, x: Oop, y: Oop) {
    let new_size = component_size(mem, x).max(component_size(mem, y)) + 1;
    let mut borrow: u64 = 0;
    for i in 0..new_size {
        let difference = component_at(mem, x, i)
            .wrapping_sub(component_at(mem, y, i))
            .wrapping_sub(borrow);
        component_at_put(mem, x, i, difference & 0xFFFF_FFFF);
        borrow = u64::from(difference & 0xFFFF_FFFF_0000_0000 != 0);
    }
}

/// Karatsuba multiply: split both operands at half the larger component
/// count, three recursive products, recombine.
fn karatsuba(interp: &mut Interpreter, x: Oop, y: Oop, sign: i32) -> Result<Oop, VmError> {
    if is_zero(&interp.mem, x) || is_zero(&interp.mem, y) {
        let words = interp.mem.total_object_size(interp.mem.inst_var(x, large_integer::BYTES));
        return allocate_large_integer(interp, words, sign);
    }

    const X: usize = 0;
    const Y: usize = 1;
    const A: usize = 2;
    const B: usize = 3;
    const C: usize = 4;
    const D: usize = 5;
    const AC: usize = 6;
    const BD: usize = 7;
    const AD_PLUS_BC: usize = 8;

    let roots = interp.push_roots(9);
    interp.set_root(roots, X, x);
    interp.set_root(roots, Y, y);

    let x_size = component_size(&interp.mem, x);
    let y_size = component_size(&interp.mem, y);
    let max_size = x_size.max(y_size);

    if max_size == 1 {
        let x_component = component_at(&interp.mem, interp.root(roots, X), 0);
        let y_component = component_at(&interp.mem, interp.root(roots, Y), 0);
        let result = allocate_large_integer(interp, 1, sign)?;
        if x_component != 0 && y_component != 0 {
            let product = x_component * y_component;
            component_at_put(&mut interp.mem, result, 0, product & 0xFFFF_FFFF);
            component_at_put(&mut interp.mem, result, 1, product >> 32);
        }
        interp.pop_roots(roots);
        return Ok(result);
    }

    let sub_size = (max_size + 1) / 2;

    let source = interp.root(roots, X);
    let high = extract_components(interp, source, sub_size, max_size - 1)?;
    interp.set_root(roots, A, high);
    let source = interp.root(roots, X);
    let low = extract_components(interp, source, 0, sub_size - 1)?;
    interp.set_root(roots, B, low);
    let source = interp.root(roots, Y);
    let high = extract_components(interp, source, sub_size, max_size - 1)?;
    interp.set_root(roots, C, high);
    let source = interp.root(roots, Y);
    let low = extract_components(interp, source, 0, sub_size - 1)?;
    interp.set_root(roots, D, low);

    let a = interp.root(roots, A);
    let c = interp.root(roots, C);
    let ac = karatsuba(interp, a, c, sign)?;
    interp.set_root(roots, AC, ac);

    let b = interp.root(roots, B);
    let d = interp.root(roots, D);
    let bd = karatsuba(interp, b, d, sign)?;
    interp.set_root(roots, BD, bd);

    let a = interp.root(roots, A);
    let b = interp.root(roots, B);
    inplace_plus(&mut interp.mem, a, b);
    let c = interp.root(roots, C);
    let d = interp.root(roots, D);
    inplace_plus(&mut interp.mem, c, d);

    let a = interp.root(roots, A);
    let c = interp.root(roots, C);
    let middle = karatsuba(interp, a, c, sign)?;
    interp.set_root(roots, AD_PLUS_BC, middle);
    let ac = interp.root(roots, AC);
    inplace_minus(&mut interp.mem, middle, ac);
    let bd = interp.root(roots, BD);
    let middle = interp.root(roots, AD_PLUS_BC);
    inplace_minus(&mut interp.mem, middle, bd);

    let ac = interp.root(roots, AC);
    let middle = interp.root(roots, AD_PLUS_BC);
    let bd = interp.root(roots, BD);
    let result = combine_product(interp, ac, middle, bd, sub_size)?;

    interp.pop_roots(roots);
    Ok(result)
}

/// Classical O(n*m) cross-product multiply.
pub fn large_integer_times(interp: &mut Interpreter, x: Oop, y: Oop) -> Result<Oop, VmError> {
    const X: usize = 0;
    const Y: usize = 1;
    let roots = interp.push_roots(2);
    interp.set_root(roots, X, x);
    interp.set_root(roots, Y, y);

    let sign = if interp.mem.class_of(x) == interp.mem.class_of(y) {
        1
    } else {
        -1
    };
    let x_size = component_size(&interp.mem, x);
    let y_size = component_size(&interp.mem, y);
    let new_size = x_size + y_size;

    let result = allocate_large_integer(interp, (new_size + 1) / 2, sign)?;

    // No allocation happens past this point, so plain copies are safe.
    let x = interp.root(roots, X);
    let y = interp.root(roots, Y);
    interp.pop_roots(roots);

    for i in 0..x_size {
        for j in 0..y_size {
            let product = component_at(&interp.mem, x, i) * component_at(&interp.mem, y, j);
            if product != 0 {
                component_at_add(&mut interp.mem, result, i + j, product);
            }
        }
    }

    large_integer_reduce(interp, result)
}

// ----------------------------------------------------------------------
// Division

/// Copy of the top `count` components of `source` into `dest`,
/// zero-filling when the source runs short.
fn copy_components(mem: &mut ObjectMemory, source: Oop, dest: Oop, count: u64) {
    let size = component_size(mem, source);
    for k in 0..count {
        let component = if k < size {
            component_at(mem, source, size - 1 - k)
        } else {
            0
        };
        component_at_put(mem, dest, count - 1 - k, component);
    }
}

/// Shift the component stream up by one (multiply by 2^32).
fn shift_components_up(mem: &mut ObjectMemory, number: Oop) {
    let size = component_size(mem, number);
    for i in (0..size).rev() {
        let component = component_at(mem, number, i);
        component_at_put(mem, number, i + 1, component);
    }
}

/// `dest := source * factor` where `factor` fits 32 bits. Clears `dest`
/// first.
fn times_into(mem: &mut ObjectMemory, source: Oop, dest: Oop, factor: u64) {
    let dest_array = mem.inst_var(dest, large_integer::BYTES);
    let dest_words = mem.total_object_size(dest_array);
    for i in 0..dest_words {
        mem.basic_inst_var_put(dest_array, i, Oop::from_bits(0));
    }

    let source_size = component_size(mem, source);
    let mut product: u64 = 0;
    for i in 0..source_size {
        product = component_at(mem, source, i) * factor + product;
        component_at_put(mem, dest, i, product & 0xFFFF_FFFF);
        product >>= 32;
    }
    if product > 0 {
        component_at_put(mem, dest, source_size, product & 0xFFFF_FFFF);
    }
}

/// Knuth Algorithm D. Quotient and remainder are written into the
/// supplied (pre-allocated, rooted) large integers. Answers false for a
/// zero divisor.
#[allow(clippy::too_many_lines)]
pub fn large_integer_divide_with_remainder(
    interp: &mut Interpreter,
    dividend: Oop,
    divisor: Oop,
    quotient: Oop,
    remainder: Oop,
) -> Result<bool, VmError> {
    if is_zero(&interp.mem, divisor) {
        return Ok(false);
    }

    const DIVIDEND: usize = 0;
    const DIVISOR: usize = 1;
    const QUOTIENT: usize = 2;
    const REMAINDER: usize = 3;
    const INTERMEDIATE: usize = 4;
    const NEW_DIVIDEND: usize = 5;
    const NORM_DIVIDEND: usize = 6;
    const NORM_DIVISOR: usize = 7;

    let roots = interp.push_roots(8);
    interp.set_root(roots, DIVIDEND, dividend);
    interp.set_root(roots, DIVISOR, divisor);
    interp.set_root(roots, QUOTIENT, quotient);
    interp.set_root(roots, REMAINDER, remainder);

    let mut dividend_size = component_size(&interp.mem, dividend);
    let mut divisor_size = component_size(&interp.mem, divisor);

    let intermediate = allocate_large_integer(interp, (dividend_size + 1) / 2 + 1, 1)?;
    interp.set_root(roots, INTERMEDIATE, intermediate);

    let mut divisor_component =
        component_at(&interp.mem, interp.root(roots, DIVISOR), divisor_size - 1);

    let scaling_factor;
    if divisor_size > 1 && divisor_component < 0x8000_0000 {
        // Normalize so the top divisor digit is at least 2^31; the
        // remainder is descaled at the end.
        let norm_dividend = allocate_large_integer(interp, (dividend_size + 1) / 2 + 2, 1)?;
        interp.set_root(roots, NORM_DIVIDEND, norm_dividend);
        let norm_divisor = allocate_large_integer(interp, (divisor_size + 1) / 2 + 2, 1)?;
        interp.set_root(roots, NORM_DIVISOR, norm_divisor);

        scaling_factor = 0x1_0000_0000 / (divisor_component + 1);

        let dividend = interp.root(roots, DIVIDEND);
        let norm_dividend = interp.root(roots, NORM_DIVIDEND);
        copy_components(&mut interp.mem, dividend, norm_dividend, dividend_size);
        let divisor = interp.root(roots, DIVISOR);
        let norm_divisor = interp.root(roots, NORM_DIVISOR);
        copy_components(&mut interp.mem, divisor, norm_divisor, divisor_size);
        times_into(&mut interp.mem, dividend, norm_dividend, scaling_factor);
        times_into(&mut interp.mem, divisor, norm_divisor, scaling_factor);

        divisor_size = component_size(&interp.mem, norm_divisor);
        dividend_size = component_size(&interp.mem, norm_dividend);
        divisor_component = component_at(&interp.mem, norm_divisor, divisor_size - 1);
    } else {
        scaling_factor = 1;
        let dividend = interp.root(roots, DIVIDEND);
        interp.set_root(roots, NORM_DIVIDEND, dividend);
        let divisor = interp.root(roots, DIVISOR);
        interp.set_root(roots, NORM_DIVISOR, divisor);
    }

    let new_dividend = allocate_large_integer(interp, (divisor_size + 1) / 2 + 1, 1)?;
    interp.set_root(roots, NEW_DIVIDEND, new_dividend);

    {
        let norm_dividend = interp.root(roots, NORM_DIVIDEND);
        let intermediate = interp.root(roots, INTERMEDIATE);
        copy_components(&mut interp.mem, norm_dividend, intermediate, divisor_size);
    }

    // Nothing below allocates; plain copies of the rooted oops are safe
    // until the descaling step.
    let norm_dividend = interp.root(roots, NORM_DIVIDEND);
    let norm_divisor = interp.root(roots, NORM_DIVISOR);
    let intermediate = interp.root(roots, INTERMEDIATE);
    let new_dividend = interp.root(roots, NEW_DIVIDEND);
    let quotient = interp.root(roots, QUOTIENT);

    let mut digit_number = dividend_size as i64 - divisor_size as i64;
    while digit_number >= 0 {
        let quotient_digit;
        if abs_compare(&interp.mem, intermediate, norm_divisor) == -1 {
            quotient_digit = 0;
        } else {
            let two_components = (component_at(&interp.mem, intermediate, divisor_size) << 32)
                | component_at(&interp.mem, intermediate, divisor_size - 1);
            let mut digit = (two_components / divisor_component).min(0xFFFF_FFFF);

            times_into(&mut interp.mem, norm_divisor, new_dividend, digit);
            while abs_compare(&interp.mem, new_dividend, intermediate) == 1 {
                digit -= 1;
                inplace_minus(&mut interp.mem, new_dividend, norm_divisor);
            }

            inplace_minus(&mut interp.mem, intermediate, new_dividend);
            quotient_digit = digit;
        }

        if digit_number > 0 {
            let pull_down =
                component_at(&interp.mem, norm_dividend, digit_number as u64 - 1);
            shift_components_up(&mut interp.mem, intermediate);
            component_at_put(&mut interp.mem, intermediate, 0, pull_down);
        }

        if quotient_digit > 0 {
            component_at_put(&mut interp.mem, quotient, digit_number as u64, quotient_digit);
        }

        digit_number -= 1;
    }

    if scaling_factor == 1 {
        let size = component_size(&interp.mem, intermediate);
        let remainder = interp.root(roots, REMAINDER);
        copy_components(&mut interp.mem, intermediate, remainder, size);
    } else {
        // Descale: remainder = intermediate / scaling factor.
        const SCALE: usize = 0;
        const SCALE_REMAINDER: usize = 1;
        let scale_roots = interp.push_roots(2);
        let scale = allocate_large_integer(interp, 1, 1)?;
        interp.set_root(scale_roots, SCALE, scale);
        let scale_remainder = allocate_large_integer(interp, 1, 1)?;
        interp.set_root(scale_roots, SCALE_REMAINDER, scale_remainder);

        let scale = interp.root(scale_roots, SCALE);
        let scale_array = interp.mem.inst_var(scale, large_integer::BYTES);
        interp
            .mem
            .basic_inst_var_put(scale_array, 0, Oop::from_bits(scaling_factor));
        let size = recompute_component_size(&interp.mem, scale);
        interp.mem.basic_inst_var_put(
            scale,
            large_integer::COMPONENT_SIZE,
            Oop::small_int(size as i64),
        );

        let intermediate = interp.root(roots, INTERMEDIATE);
        let remainder = interp.root(roots, REMAINDER);
        let scale_remainder = interp.root(scale_roots, SCALE_REMAINDER);
        large_integer_divide_with_remainder(
            interp,
            intermediate,
            scale,
            remainder,
            scale_remainder,
        )?;
        interp.pop_roots(scale_roots);
    }

    interp.pop_roots(roots);
    Ok(true)
}

// ----------------------------------------------------------------------
// Small integer primitives

fn succeed_bool(interp: &mut Interpreter, result: bool) {
    let value = if result {
        interp.mem.true_oop()
    } else {
        interp.mem.false_oop()
    };
    succeed(interp, value);
}

pub fn prim_small_integer_plus(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let arg = interp.local(0);
    if !arg.is_small_int() {
        fail_with_receiver(interp);
        return Ok(());
    }

    let sum = receiver.as_small_int() + arg.as_small_int();
    let carry = sum & CARRY_MASK;
    let result = if carry == 0 || carry == CARRY_MASK {
        Oop::small_int(sum)
    } else {
        as_sum_large_integer(interp, sum)?
    };
    succeed(interp, result);
    Ok(())
}

pub fn prim_small_integer_minus(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let arg = interp.local(0);
    if !receiver.is_small_int() || !arg.is_small_int() {
        fail_with_receiver(interp);
        return Ok(());
    }

    let difference = receiver.as_small_int() - arg.as_small_int();
    let borrow = difference & CARRY_MASK;
    let result = if borrow == 0 || borrow == CARRY_MASK {
        Oop::small_int(difference)
    } else {
        as_sum_large_integer(interp, difference)?
    };
    succeed(interp, result);
    Ok(())
}

fn prim_small_compare(
    interp: &mut Interpreter,
    compare: fn(i64, i64) -> bool,
) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let arg = interp.local(0);
    if !arg.is_small_int() {
        fail_with_receiver(interp);
        return Ok(());
    }
    succeed_bool(interp, compare(receiver.as_small_int(), arg.as_small_int()));
    Ok(())
}

pub fn prim_small_integer_less_than(interp: &mut Interpreter) -> Result<(), VmError> {
    prim_small_compare(interp, |a, b| a < b)
}

pub fn prim_small_integer_greater_than(interp: &mut Interpreter) -> Result<(), VmError> {
    prim_small_compare(interp, |a, b| a > b)
}

pub fn prim_small_integer_less_than_or_equal(interp: &mut Interpreter) -> Result<(), VmError> {
    prim_small_compare(interp, |a, b| a <= b)
}

pub fn prim_small_integer_greater_than_or_equal(
    interp: &mut Interpreter,
) -> Result<(), VmError> {
    prim_small_compare(interp, |a, b| a >= b)
}

pub fn prim_small_integer_equal(interp: &mut Interpreter) -> Result<(), VmError> {
    prim_small_compare(interp, |a, b| a == b)
}

pub fn prim_small_integer_not_equal(interp: &mut Interpreter) -> Result<(), VmError> {
    prim_small_compare(interp, |a, b| a != b)
}

pub fn prim_small_integer_times(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let arg = interp.local(0);
    if !arg.is_small_int() {
        fail_with_receiver(interp);
        return Ok(());
    }

    let x = receiver.as_small_int();
    let y = arg.as_small_int();
    let result = if x.abs() < 0x4000_0000 && y.abs() < 0x4000_0000 {
        Oop::small_int(x * y)
    } else {
        let roots = interp.push_roots(2);
        let wide = small_to_large_integer(interp, receiver)?;
        interp.set_root(roots, 0, wide);
        let wide = small_to_large_integer(interp, arg)?;
        interp.set_root(roots, 1, wide);
        let wide_receiver = interp.root(roots, 0);
        let wide_arg = interp.root(roots, 1);
        let product = large_integer_times(interp, wide_receiver, wide_arg)?;
        interp.pop_roots(roots);
        product
    };
    succeed(interp, result);
    Ok(())
}

fn prim_small_division(
    interp: &mut Interpreter,
    divide: fn(i64, i64) -> i64,
) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let arg = interp.local(0);
    if !arg.is_small_int() || arg.as_small_int() == 0 {
        fail_with_receiver(interp);
        return Ok(());
    }
    succeed(
        interp,
        Oop::small_int(divide(receiver.as_small_int(), arg.as_small_int())),
    );
    Ok(())
}

pub fn prim_small_integer_divide(interp: &mut Interpreter) -> Result<(), VmError> {
    prim_small_division(interp, |a, b| a / b)
}

pub fn prim_small_integer_modulo(interp: &mut Interpreter) -> Result<(), VmError> {
    prim_small_division(interp, |a, b| a % b)
}

pub fn prim_small_integer_int_divide(interp: &mut Interpreter) -> Result<(), VmError> {
    prim_small_division(interp, |a, b| a / b)
}

pub fn prim_small_integer_as_float(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let result = Oop::float(receiver.as_small_int() as f64);
    succeed(interp, result);
    Ok(())
}

pub fn prim_bit_shift(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver().as_small_int();
    let shift = interp.local(0).as_small_int();
    let result = if shift > 0 {
        receiver << shift
    } else {
        receiver >> (-shift)
    };
    succeed(interp, Oop::small_int(result));
    Ok(())
}

// ----------------------------------------------------------------------
// Large integer primitives

pub fn prim_as_large_integer(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let result = small_to_large_integer(interp, receiver)?;
    succeed(interp, result);
    Ok(())
}

pub fn prim_large_integer_plus(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let arg = interp.local(0);

    let result = if interp.mem.class_of(receiver) == interp.mem.class_of(arg) {
        let sign = sign_of(&interp.mem, receiver);
        basic_large_plus(interp, receiver, arg, sign)?
    } else if abs_compare(&interp.mem, receiver, arg) == 1 {
        let sign = sign_of(&interp.mem, receiver);
        basic_large_minus(interp, receiver, arg, sign)?
    } else {
        let sign = sign_of(&interp.mem, arg);
        basic_large_minus(interp, arg, receiver, sign)?
    };

    let result = large_integer_reduce(interp, result)?;
    succeed(interp, result);
    Ok(())
}

pub fn prim_large_integer_minus(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let arg = interp.local(0);

    let result = if interp.mem.class_of(receiver) != interp.mem.class_of(arg) {
        let sign = sign_of(&interp.mem, receiver);
        basic_large_plus(interp, receiver, arg, sign)?
    } else if abs_compare(&interp.mem, receiver, arg) == 1 {
        let sign = sign_of(&interp.mem, receiver);
        basic_large_minus(interp, receiver, arg, sign)?
    } else {
        let sign = -sign_of(&interp.mem, receiver);
        basic_large_minus(interp, arg, receiver, sign)?
    };

    let result = large_integer_reduce(interp, result)?;
    succeed(interp, result);
    Ok(())
}

/// Signed comparison outcome for two large integers: -1, 0 or 1.
fn large_signed_compare(mem: &ObjectMemory, receiver: Oop, arg: Oop) -> i32 {
    match (is_large_positive(mem, receiver), is_large_positive(mem, arg)) {
        (true, false) => 1,
        (false, true) => -1,
        (positive, _) => {
            let magnitude = abs_compare(mem, receiver, arg);
            if positive { magnitude } else { -magnitude }
        }
    }
}

fn prim_large_compare(
    interp: &mut Interpreter,
    accept: fn(i32) -> bool,
) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let arg = interp.local(0);
    if !is_large_integer(&interp.mem, receiver) || !is_large_integer(&interp.mem, arg) {
        fail_with_receiver(interp);
        return Ok(());
    }
    succeed_bool(interp, accept(large_signed_compare(&interp.mem, receiver, arg)));
    Ok(())
}

pub fn prim_large_integer_less_than(interp: &mut Interpreter) -> Result<(), VmError> {
    prim_large_compare(interp, |c| c == -1)
}

pub fn prim_large_integer_greater_than(interp: &mut Interpreter) -> Result<(), VmError> {
    prim_large_compare(interp, |c| c == 1)
}

pub fn prim_large_integer_less_than_or_equal(interp: &mut Interpreter) -> Result<(), VmError> {
    prim_large_compare(interp, |c| c != 1)
}

pub fn prim_large_integer_greater_than_or_equal(
    interp: &mut Interpreter,
) -> Result<(), VmError> {
    prim_large_compare(interp, |c| c != -1)
}

pub fn prim_large_integer_equal(interp: &mut Interpreter) -> Result<(), VmError> {
    prim_large_compare(interp, |c| c == 0)
}

pub fn prim_large_integer_not_equal(interp: &mut Interpreter) -> Result<(), VmError> {
    prim_large_compare(interp, |c| c != 0)
}

pub fn prim_large_integer_times(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let arg = interp.local(0);
    if !is_large_integer(&interp.mem, receiver) || !is_large_integer(&interp.mem, arg) {
        fail_with_receiver(interp);
        return Ok(());
    }

    let result = large_integer_times(interp, receiver, arg)?;
    succeed(interp, result);
    Ok(())
}

pub fn prim_large_integer_times_fast(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    let arg = interp.local(0);
    if !is_large_integer(&interp.mem, receiver) || !is_large_integer(&interp.mem, arg) {
        interp.push(Oop::small_int(1));
        interp.push(Oop::small_int(1));
        return Ok(());
    }

    let sign = if interp.mem.class_of(receiver) == interp.mem.class_of(arg) {
        1
    } else {
        -1
    };
    let product = karatsuba(interp, receiver, arg, sign)?;
    let result = large_integer_reduce(interp, product)?;
    succeed(interp, result);
    Ok(())
}

/// Shared set-up for the division primitives: allocate quotient and
/// remainder and run the algorithm. Answers none on failure (zero
/// divisor or non-integers), in which case the failure was pushed.
fn divide_common(interp: &mut Interpreter) -> Result<Option<(Oop, Oop)>, VmError> {
    let receiver = interp.receiver();
    let arg = interp.local(0);
    if !is_large_integer(&interp.mem, receiver) || !is_large_integer(&interp.mem, arg) {
        fail_with_receiver(interp);
        return Ok(None);
    }

    const DIVIDEND: usize = 0;
    const DIVISOR: usize = 1;
    const QUOTIENT: usize = 2;
    const REMAINDER: usize = 3;
    let roots = interp.push_roots(4);
    interp.set_root(roots, DIVIDEND, receiver);
    interp.set_root(roots, DIVISOR, arg);

    let sign = if interp.mem.class_of(receiver) == interp.mem.class_of(arg) {
        1
    } else {
        -1
    };
    let dividend_size = component_size(&interp.mem, receiver);
    let divisor_size = component_size(&interp.mem, arg);
    let quotient_size = dividend_size.saturating_sub(divisor_size) + 1;

    let quotient = allocate_large_integer(interp, (quotient_size + 1) / 2, sign)?;
    interp.set_root(roots, QUOTIENT, quotient);
    let remainder = allocate_large_integer(interp, (divisor_size + 1) / 2, 1)?;
    interp.set_root(roots, REMAINDER, remainder);

    let dividend = interp.root(roots, DIVIDEND);
    let divisor = interp.root(roots, DIVISOR);
    let quotient = interp.root(roots, QUOTIENT);
    let remainder = interp.root(roots, REMAINDER);
    let ok =
        large_integer_divide_with_remainder(interp, dividend, divisor, quotient, remainder)?;

    let quotient = interp.root(roots, QUOTIENT);
    let remainder = interp.root(roots, REMAINDER);
    interp.pop_roots(roots);

    if ok {
        Ok(Some((quotient, remainder)))
    } else {
        interp.push(Oop::small_int(1));
        interp.push(Oop::small_int(1));
        Ok(None)
    }
}

pub fn prim_large_integer_divide(interp: &mut Interpreter) -> Result<(), VmError> {
    if let Some((quotient, _)) = divide_common(interp)? {
        let result = large_integer_reduce(interp, quotient)?;
        succeed(interp, result);
    }
    Ok(())
}

pub fn prim_large_integer_modulo(interp: &mut Interpreter) -> Result<(), VmError> {
    if let Some((_, remainder)) = divide_common(interp)? {
        let result = large_integer_reduce(interp, remainder)?;
        succeed(interp, result);
    }
    Ok(())
}

pub fn prim_large_integer_int_divide(interp: &mut Interpreter) -> Result<(), VmError> {
    succeed(interp, Oop::small_int(1));
    Ok(())
}

pub fn prim_large_integer_divide_with_remainder(
    interp: &mut Interpreter,
) -> Result<(), VmError> {
    let Some((quotient, remainder)) = divide_common(interp)? else {
        return Ok(());
    };

    const QUOTIENT: usize = 0;
    const REMAINDER: usize = 1;
    const PAIR: usize = 2;
    let roots = interp.push_roots(3);
    interp.set_root(roots, QUOTIENT, quotient);
    interp.set_root(roots, REMAINDER, remainder);

    let array_class = interp.mem.known(well_known::ARRAY_CLASS);
    let pair = interp
        .mem
        .new_instance_of(array_class, 2, space_index::EDEN)?;
    interp.set_root(roots, PAIR, pair);

    let quotient = interp.root(roots, QUOTIENT);
    let reduced = large_integer_reduce(interp, quotient)?;
    let pair = interp.root(roots, PAIR);
    interp.mem.inst_var_put(pair, 0, reduced);

    let remainder = interp.root(roots, REMAINDER);
    let reduced = large_integer_reduce(interp, remainder)?;
    let pair = interp.root(roots, PAIR);
    interp.mem.inst_var_put(pair, 1, reduced);

    let pair = interp.root(roots, PAIR);
    interp.pop_roots(roots);
    succeed(interp, pair);
    Ok(())
}

pub fn prim_large_integer_as_float(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver();
    if !is_large_integer(&interp.mem, receiver) {
        interp.push(Oop::small_int(1));
        interp.push(Oop::small_int(1));
        return Ok(());
    }

    let mut result = 0.0f64;
    let size = component_size(&interp.mem, receiver);
    for i in (0..size).rev() {
        result = result * 4_294_967_296.0 + component_at(&interp.mem, receiver, i) as f64;
    }
    if !is_large_positive(&interp.mem, receiver) {
        result = -result;
    }

    succeed(interp, Oop::float(result));
    Ok(())
}

// ----------------------------------------------------------------------
// Bit primitives

pub fn prim_bit_and(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver().as_small_int();
    let mask = interp.local(0).as_small_int();
    succeed(interp, Oop::small_int(receiver & mask));
    Ok(())
}

pub fn prim_bit_or(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver().as_small_int();
    let mask = interp.local(0).as_small_int();
    succeed(interp, Oop::small_int(receiver | mask));
    Ok(())
}

pub fn prim_bit_xor(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver().as_small_int();
    let mask = interp.local(0).as_small_int();
    succeed(interp, Oop::small_int(receiver ^ mask));
    Ok(())
}

pub fn prim_bit_invert(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver().as_small_int();
    succeed(interp, Oop::small_int(!receiver));
    Ok(())
}
