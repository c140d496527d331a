// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the integer primitives, with `num-bigint` as the oracle
//! for the multi-precision laws.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::integer;
use crate::interp::Interpreter;
use crate::oop::Oop;
use crate::testkit::{self, call_primitive, int_to_bigint, large_int_from};
use num_bigint::BigInt;
use num_traits::Zero;
use proptest::prelude::*;

fn large_binary(interp: &mut Interpreter, number: u16, x: &BigInt, y: &BigInt) -> Oop {
    // Keep both operands rooted in the receiver/argument slots of the
    // stub frame; building the second may collect.
    let roots_x = large_int_from(interp, x);
    let scratch = crate::object::well_known::BYTECODE_TABLE;
    interp.mem.set_known(scratch, roots_x);
    let arg = large_int_from(interp, y);
    let receiver = interp.mem.known(scratch);
    let nil = interp.mem.nil();
    interp.mem.set_known(scratch, nil);
    call_primitive(interp, number, receiver, &[arg])
}

#[test]
fn small_integer_arithmetic() {
    let mut interp = testkit::interpreter();
    assert_eq!(
        call_primitive(
            &mut interp,
            integer::PRIM_SMALLINTEGER_PLUS,
            Oop::small_int(3),
            &[Oop::small_int(4)]
        ),
        Oop::small_int(7)
    );
    assert_eq!(
        call_primitive(
            &mut interp,
            integer::PRIM_SMALLINTEGER_MINUS,
            Oop::small_int(3),
            &[Oop::small_int(10)]
        ),
        Oop::small_int(-7)
    );
    assert_eq!(
        call_primitive(
            &mut interp,
            integer::PRIM_SMALLINTEGER_TIMES,
            Oop::small_int(-12),
            &[Oop::small_int(12)]
        ),
        Oop::small_int(-144)
    );
    assert_eq!(
        call_primitive(
            &mut interp,
            integer::PRIM_SMALLINTEGER_DIVIDE,
            Oop::small_int(84),
            &[Oop::small_int(2)]
        ),
        Oop::small_int(42)
    );
}

#[test]
fn small_integer_comparison_and_failure() {
    let mut interp = testkit::interpreter();
    let true_oop = interp.mem.true_oop();

    assert_eq!(
        call_primitive(
            &mut interp,
            integer::PRIM_SMALLINTEGER_LESS_THAN,
            Oop::small_int(1),
            &[Oop::small_int(2)]
        ),
        true_oop
    );

    // A non-integer argument fails the primitive; the stub answers the
    // failure code.
    let nil = interp.mem.nil();
    assert_eq!(
        call_primitive(
            &mut interp,
            integer::PRIM_SMALLINTEGER_PLUS,
            Oop::small_int(1),
            &[nil]
        ),
        Oop::small_int(1)
    );

    // Division by zero fails rather than trapping.
    assert_eq!(
        call_primitive(
            &mut interp,
            integer::PRIM_SMALLINTEGER_DIVIDE,
            Oop::small_int(1),
            &[Oop::small_int(0)]
        ),
        Oop::small_int(1)
    );
}

#[test]
fn bit_primitives() {
    let mut interp = testkit::interpreter();
    assert_eq!(
        call_primitive(
            &mut interp,
            integer::PRIM_BIT_AND,
            Oop::small_int(0b1100),
            &[Oop::small_int(0b1010)]
        ),
        Oop::small_int(0b1000)
    );
    assert_eq!(
        call_primitive(
            &mut interp,
            integer::PRIM_BIT_OR,
            Oop::small_int(0b1100),
            &[Oop::small_int(0b1010)]
        ),
        Oop::small_int(0b1110)
    );
    assert_eq!(
        call_primitive(
            &mut interp,
            integer::PRIM_BITSHIFT,
            Oop::small_int(1),
            &[Oop::small_int(8)]
        ),
        Oop::small_int(256)
    );
    assert_eq!(
        call_primitive(
            &mut interp,
            integer::PRIM_BITSHIFT,
            Oop::small_int(256),
            &[Oop::small_int(-8)]
        ),
        Oop::small_int(1)
    );
}

#[test]
fn as_large_integer_and_reduce_round_trip() {
    let mut interp = testkit::interpreter();

    let promoted = call_primitive(
        &mut interp,
        integer::PRIM_AS_LARGEINTEGER,
        Oop::small_int(123_456_789),
        &[],
    );
    assert!(integer::is_large_integer(&interp.mem, promoted));
    assert_eq!(int_to_bigint(&interp.mem, promoted), BigInt::from(123_456_789));

    let reduced = integer::large_integer_reduce(&mut interp, promoted).unwrap();
    assert_eq!(reduced, Oop::small_int(123_456_789));
}

#[test]
fn one_shifted_sixty_two_plus_one() {
    let mut interp = testkit::interpreter();

    // (1 bitShift: 62) + 1 as large integers.
    let shifted = BigInt::from(1u64 << 62);
    let result = large_binary(
        &mut interp,
        integer::PRIM_LARGEINTEGER_PLUS,
        &shifted,
        &BigInt::from(1),
    );

    assert!(integer::is_large_integer(&interp.mem, result));
    assert_eq!(
        interp
            .mem
            .inst_var(result, crate::object::large_integer::COMPONENT_SIZE),
        Oop::small_int(2)
    );
    assert_eq!(
        int_to_bigint(&interp.mem, result),
        BigInt::from((1u64 << 62) + 1)
    );

    // The float view of the reduced value.
    let as_float = call_primitive(
        &mut interp,
        integer::PRIM_LARGEINTEGER_AS_FLOAT,
        result,
        &[],
    );
    assert_eq!(as_float.as_float(), 4.611_686_018_427_388e18);
}

#[test]
fn large_multiplication_matches_bigint() {
    let mut interp = testkit::interpreter();
    let x = BigInt::parse_bytes(b"123456789012345678901234567890", 10).unwrap();
    let y = BigInt::parse_bytes(b"987654321098765432109876543210", 10).unwrap();

    let product = large_binary(&mut interp, integer::PRIM_LARGEINTEGER_TIMES, &x, &y);
    assert_eq!(int_to_bigint(&interp.mem, product), &x * &y);
}

#[test]
fn karatsuba_agrees_with_classical_multiply() {
    let mut interp = testkit::interpreter();
    let x = BigInt::parse_bytes(b"340282366920938463463374607431768211297", 10).unwrap();
    let y = BigInt::parse_bytes(b"170141183460469231731687303715884105727", 10).unwrap();

    let classical = large_binary(&mut interp, integer::PRIM_LARGEINTEGER_TIMES, &x, &y);
    let fast = large_binary(&mut interp, integer::PRIM_LARGEINTEGER_TIMES_FAST, &x, &y);

    assert_eq!(
        int_to_bigint(&interp.mem, classical),
        int_to_bigint(&interp.mem, fast)
    );
    assert_eq!(int_to_bigint(&interp.mem, classical), &x * &y);
}

#[test]
fn division_with_normalization() {
    let mut interp = testkit::interpreter();
    // A divisor whose top component is small forces the scaling path.
    let x = BigInt::parse_bytes(b"123456789012345678901234567890123456789", 10).unwrap();
    let y = BigInt::parse_bytes(b"12345678901", 10).unwrap();

    let quotient = large_binary(&mut interp, integer::PRIM_LARGEINTEGER_DIVIDE, &x, &y);
    assert_eq!(int_to_bigint(&interp.mem, quotient), &x / &y);

    let remainder = large_binary(&mut interp, integer::PRIM_LARGEINTEGER_MODULO, &x, &y);
    assert_eq!(int_to_bigint(&interp.mem, remainder), &x % &y);
}

#[test]
fn division_by_zero_fails() {
    let mut interp = testkit::interpreter();
    let x = BigInt::from(u128::MAX);
    let rcode = large_binary(
        &mut interp,
        integer::PRIM_LARGEINTEGER_DIVIDE,
        &x,
        &BigInt::zero(),
    );
    assert_eq!(rcode, Oop::small_int(1));
}

#[test]
fn large_comparisons_respect_sign() {
    let mut interp = testkit::interpreter();
    let positive = BigInt::from(u128::MAX);
    let negative = -BigInt::from(u128::MAX - 1);
    let true_oop = interp.mem.true_oop();
    let false_oop = interp.mem.false_oop();

    assert_eq!(
        large_binary(
            &mut interp,
            integer::PRIM_LARGEINTEGER_LESS_THAN,
            &negative,
            &positive
        ),
        true_oop
    );
    assert_eq!(
        large_binary(
            &mut interp,
            integer::PRIM_LARGEINTEGER_GREATER_THAN,
            &negative,
            &positive
        ),
        false_oop
    );
    assert_eq!(
        large_binary(
            &mut interp,
            integer::PRIM_LARGEINTEGER_EQUAL,
            &positive,
            &positive
        ),
        true_oop
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_addition_is_associative_and_matches_bigint(
        a in any::<[u64; 3]>(),
        b in any::<[u64; 3]>(),
    ) {
        let mut interp = testkit::interpreter();
        let x = BigInt::from(a[0]) * BigInt::from(a[1]) + BigInt::from(a[2]);
        let y = BigInt::from(b[0]) * BigInt::from(b[1]) + BigInt::from(b[2]);

        let sum = large_binary(&mut interp, integer::PRIM_LARGEINTEGER_PLUS, &x, &y);
        prop_assert_eq!(int_to_bigint(&interp.mem, sum), &x + &y);
    }

    #[test]
    fn prop_multiplication_commutes(
        a in any::<[u64; 2]>(),
        b in any::<[u64; 2]>(),
    ) {
        let mut interp = testkit::interpreter();
        let x = BigInt::from(a[0]) * BigInt::from(a[1]);
        let y = BigInt::from(b[0]) * BigInt::from(b[1]);

        let xy = large_binary(&mut interp, integer::PRIM_LARGEINTEGER_TIMES, &x, &y);
        let yx = large_binary(&mut interp, integer::PRIM_LARGEINTEGER_TIMES, &y, &x);
        prop_assert_eq!(
            int_to_bigint(&interp.mem, xy),
            int_to_bigint(&interp.mem, yx)
        );
        prop_assert_eq!(int_to_bigint(&interp.mem, xy), &x * &y);
    }

    #[test]
    fn prop_division_reconstructs_the_dividend(
        a in any::<[u64; 3]>(),
        b in 1u64..,
        c in 1u32..,
    ) {
        let mut interp = testkit::interpreter();
        let x = BigInt::from(a[0]) * BigInt::from(a[1]) + BigInt::from(a[2]);
        let y = BigInt::from(b) * BigInt::from(c);

        let quotient = large_binary(&mut interp, integer::PRIM_LARGEINTEGER_DIVIDE, &x, &y);
        let remainder = large_binary(&mut interp, integer::PRIM_LARGEINTEGER_MODULO, &x, &y);

        let q = int_to_bigint(&interp.mem, quotient);
        let r = int_to_bigint(&interp.mem, remainder);
        prop_assert_eq!(&q * &y + &r, x);
        prop_assert!(r >= BigInt::from(0));
        prop_assert!(r < y);
    }

    #[test]
    fn prop_small_round_trip_through_large(
        v in (-(1i64 << 60) + 1)..(1i64 << 60),
    ) {
        let mut interp = testkit::interpreter();
        let promoted = call_primitive(
            &mut interp,
            integer::PRIM_AS_LARGEINTEGER,
            Oop::small_int(v),
            &[],
        );
        let reduced = integer::large_integer_reduce(&mut interp, promoted).unwrap();
        prop_assert_eq!(reduced, Oop::small_int(v));
    }
}
