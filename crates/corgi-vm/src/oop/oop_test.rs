// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for tagged oop encoding.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{CONTEXT_POINTER_TAG, FLOAT_TAG, Oop};
use proptest::prelude::*;

#[test]
fn small_int_round_trip_edges() {
    for v in [
        0,
        1,
        -1,
        super::SMALL_INT_MAX,
        super::SMALL_INT_MIN,
        42,
        -1_000_000_007,
    ] {
        let oop = Oop::small_int(v);
        assert!(oop.is_small_int());
        assert!(!oop.is_pointer());
        assert_eq!(oop.as_small_int(), v);
    }
}

#[test]
fn character_round_trip() {
    for c in ['a', 'Z', '\0', '\u{1F415}'] {
        let oop = Oop::character(u64::from(u32::from(c)));
        assert!(oop.is_character());
        assert_eq!(oop.as_code_point(), u64::from(u32::from(c)));
    }
}

#[test]
fn zero_float_is_bare_tag() {
    assert_eq!(Oop::float(0.0).bits(), FLOAT_TAG);
    assert_eq!(Oop::float(0.0).as_float(), 0.0);
}

#[test]
fn float_round_trip_simple() {
    for d in [1.0, -1.0, 0.5, 3.25, -1234.5678, 1.0e10, 4.611686018427388e18] {
        let oop = Oop::float(d);
        assert!(oop.is_float());
        assert_eq!(oop.as_float(), d);
    }
}

#[test]
fn context_pointer_tagging() {
    let ptr = Oop::pointer(0x1000);
    let tagged = ptr.as_context_pointer();
    assert!(tagged.is_context_pointer());
    assert!(tagged.is_immediate());
    assert_eq!(tagged.bits() & 7, CONTEXT_POINTER_TAG);
    assert_eq!(tagged.strip_tags(), ptr);
}

#[test]
fn null_is_a_pointer() {
    assert!(Oop::NULL.is_pointer());
    assert!(Oop::NULL.is_null());
    assert!(!Oop::small_int(0).is_null());
}

proptest! {
    #[test]
    fn prop_small_int_round_trip(v in super::SMALL_INT_MIN..=super::SMALL_INT_MAX) {
        prop_assert_eq!(Oop::small_int(v).as_small_int(), v);
    }

    #[test]
    fn prop_float_round_trip(
        mantissa in 0u64..(1 << 52),
        exponent in 897u64..=1150,
        negative in proptest::bool::ANY,
    ) {
        // Finite, non-subnormal doubles inside the 8-bit exponent window.
        let sign = u64::from(negative) << 63;
        let d = f64::from_bits(sign | (exponent << 52) | mantissa);
        prop_assert_eq!(Oop::float(d).as_float(), d);
    }
}
