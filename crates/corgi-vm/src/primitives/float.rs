// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Float primitives.
//!
//! Floats are immediates, so none of these allocate. Arithmetic and
//! comparisons fail over to the image when the argument is not a float;
//! the transcendentals never fail and surface domain errors as NaN,
//! which the image handles.

use crate::error::VmError;
use crate::interp::Interpreter;
use crate::oop::Oop;

pub const PRIM_FLOAT_PLUS: u16 = 41;
pub const PRIM_FLOAT_MINUS: u16 = 42;
pub const PRIM_FLOAT_LESS_THAN: u16 = 43;
pub const PRIM_FLOAT_GREATER_THAN: u16 = 44;
pub const PRIM_FLOAT_EQUALS: u16 = 45;
pub const PRIM_FLOAT_TIMES: u16 = 49;
pub const PRIM_FLOAT_DIVIDE: u16 = 50;
pub const PRIM_FLOAT_TRUNCATED: u16 = 51;
pub const PRIM_FLOAT_SQRT: u16 = 52;
pub const PRIM_FLOAT_SIN: u16 = 53;
pub const PRIM_FLOAT_COS: u16 = 54;
pub const PRIM_FLOAT_TAN: u16 = 55;
pub const PRIM_FLOAT_ATAN2: u16 = 56;
pub const PRIM_FLOAT_LOG: u16 = 57;
pub const PRIM_FLOAT_ARCSIN: u16 = 58;
pub const PRIM_FLOAT_ARCCOS: u16 = 59;
pub const PRIM_FLOAT_EXP: u16 = 65;

fn binary_op(interp: &mut Interpreter, op: fn(f64, f64) -> f64) {
    let receiver = interp.receiver();
    let arg = interp.local(0);
    if !arg.is_float() {
        interp.push(Oop::small_int(1));
        interp.push(receiver);
        return;
    }

    interp.push(Oop::small_int(0));
    interp.push(Oop::float(op(receiver.as_float(), arg.as_float())));
}

fn binary_compare(interp: &mut Interpreter, op: fn(f64, f64) -> bool) {
    let receiver = interp.receiver();
    let arg = interp.local(0);
    if !arg.is_float() {
        interp.push(Oop::small_int(1));
        interp.push(receiver);
        return;
    }

    interp.push(Oop::small_int(0));
    let result = if op(receiver.as_float(), arg.as_float()) {
        interp.mem.true_oop()
    } else {
        interp.mem.false_oop()
    };
    interp.push(result);
}

fn unary_op(interp: &mut Interpreter, op: fn(f64) -> f64) {
    let receiver = interp.receiver();
    interp.push(Oop::small_int(0));
    interp.push(Oop::float(op(receiver.as_float())));
}

pub fn prim_float_plus(interp: &mut Interpreter) -> Result<(), VmError> {
    binary_op(interp, |a, b| a + b);
    Ok(())
}

pub fn prim_float_minus(interp: &mut Interpreter) -> Result<(), VmError> {
    binary_op(interp, |a, b| a - b);
    Ok(())
}

pub fn prim_float_times(interp: &mut Interpreter) -> Result<(), VmError> {
    binary_op(interp, |a, b| a * b);
    Ok(())
}

pub fn prim_float_divide(interp: &mut Interpreter) -> Result<(), VmError> {
    binary_op(interp, |a, b| a / b);
    Ok(())
}

pub fn prim_float_less_than(interp: &mut Interpreter) -> Result<(), VmError> {
    binary_compare(interp, |a, b| a < b);
    Ok(())
}

pub fn prim_float_greater_than(interp: &mut Interpreter) -> Result<(), VmError> {
    binary_compare(interp, |a, b| a > b);
    Ok(())
}

pub fn prim_float_equals(interp: &mut Interpreter) -> Result<(), VmError> {
    binary_compare(interp, |a, b| a == b);
    Ok(())
}

pub fn prim_float_truncated(interp: &mut Interpreter) -> Result<(), VmError> {
    let value = interp.receiver().as_float() as i64;
    interp.push(Oop::small_int(0));
    interp.push(Oop::small_int(value));
    Ok(())
}

pub fn prim_float_sqrt(interp: &mut Interpreter) -> Result<(), VmError> {
    unary_op(interp, f64::sqrt);
    Ok(())
}

pub fn prim_float_sin(interp: &mut Interpreter) -> Result<(), VmError> {
    unary_op(interp, f64::sin);
    Ok(())
}

pub fn prim_float_cos(interp: &mut Interpreter) -> Result<(), VmError> {
    unary_op(interp, f64::cos);
    Ok(())
}

pub fn prim_float_tan(interp: &mut Interpreter) -> Result<(), VmError> {
    unary_op(interp, f64::tan);
    Ok(())
}

pub fn prim_float_log(interp: &mut Interpreter) -> Result<(), VmError> {
    unary_op(interp, f64::ln);
    Ok(())
}

pub fn prim_float_arcsin(interp: &mut Interpreter) -> Result<(), VmError> {
    unary_op(interp, f64::asin);
    Ok(())
}

pub fn prim_float_arccos(interp: &mut Interpreter) -> Result<(), VmError> {
    unary_op(interp, f64::acos);
    Ok(())
}

pub fn prim_float_exp(interp: &mut Interpreter) -> Result<(), VmError> {
    unary_op(interp, f64::exp);
    Ok(())
}

pub fn prim_float_atan2(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.receiver().as_float();
    let arg = interp.local(0).as_float();
    interp.push(Oop::small_int(0));
    interp.push(Oop::float(receiver.atan2(arg)));
    Ok(())
}
