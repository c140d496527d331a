// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for header word packing.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{
    BehaviorFlags, ObjectFlags, behavior_flags_word, behavior_layout_flags,
    behavior_named_inst_vars, pack_header_word, packed_flags, packed_flips,
    packed_named_inst_vars,
};

#[test]
fn header_word_packs_all_fields() {
    let word = pack_header_word(
        (ObjectFlags::BYTES | ObjectFlags::MARK).bits(),
        301,
        7,
    );
    assert_eq!(packed_flags(word), 17);
    assert_eq!(packed_flips(word), 301);
    assert_eq!(packed_named_inst_vars(word), 7);
}

#[test]
fn header_word_fields_are_independent() {
    let word = pack_header_word(0xFFFF, 0xFFFF, 0xFFFF_FFFF);
    assert_eq!(packed_flags(word), 0xFFFF);
    assert_eq!(packed_flips(word), 0xFFFF);
    assert_eq!(packed_named_inst_vars(word), 0xFFFF_FFFF);
}

#[test]
fn behavior_flags_round_trip() {
    let word = behavior_flags_word(BehaviorFlags::BYTES, 0);
    assert_eq!(behavior_layout_flags(word), BehaviorFlags::BYTES);
    assert_eq!(behavior_named_inst_vars(word), 0);

    let word = behavior_flags_word(BehaviorFlags::INDEXED, 6);
    assert_eq!(behavior_layout_flags(word), BehaviorFlags::INDEXED);
    assert_eq!(behavior_named_inst_vars(word), 6);
}
