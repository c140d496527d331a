// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Memory space bookkeeping.
//!
//! A space is a contiguous run of arena words plus the free-list cursors
//! that carve it up. Object spaces grow headers upward from word zero and
//! bodies downward from the top; the stack space does the reverse.

use bitflags::bitflags;
use num_enum::TryFromPrimitive;

/// The role a space plays in the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u16)]
pub enum SpaceType {
    /// Allocation nursery.
    Eden = 0,
    /// First survivor space.
    Survivor1 = 1,
    /// Second survivor space.
    Survivor2 = 2,
    /// Open-addressed set of old-space objects referencing new space.
    RememberedSet = 3,
    /// Fixed-index objects the interpreter needs by name.
    WellKnownObjects = 4,
    /// Tenured generation, mark-sweep-compact managed.
    Old = 5,
    /// Activation records.
    Stack = 6,
}

bitflags! {
    /// Space behavior flags, persisted in the image.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpaceFlags: u16 {
        /// Headers live at the top of the space.
        const HAS_TOP_HEADERS = 1;
        /// Holds header/body objects.
        const IS_OBJECT_SPACE = 2;
        /// Holds bare oops (well-known objects, remembered set).
        const IS_POINTER_SPACE = 4;
        /// Collected by the scavenger.
        const IS_SCAVENGED = 8;
        /// Grows and shrinks with the call stack.
        const IS_STACK_MANAGED = 16;
        /// Collected by the global mark-sweep.
        const IS_MARK_SWEEP_MANAGED = 32;
        /// Contains a MemorySpace object describing itself.
        const HAS_SPACE_OBJECT = 64;
        /// Marks the active survivor space.
        const IS_CURRENT = 128;
    }
}

/// Fixed space numbers, matching the serialized image order.
pub mod space_index {
    pub const EDEN: usize = 0;
    pub const SURVIVOR1: usize = 1;
    pub const SURVIVOR2: usize = 2;
    pub const REMEMBERED_SET: usize = 3;
    pub const WELL_KNOWN: usize = 4;
    /// Reserved slot kept for image compatibility.
    pub const RESERVED: usize = 5;
    pub const STACK: usize = 6;
    pub const OLD: usize = 7;
    /// First index available for extra spaces.
    pub const FIRST_EXTRA: usize = 8;
}

/// One memory space: a region of the arena plus its cursors.
#[derive(Debug, Clone)]
pub struct Space {
    /// Arena word index of this space's first word.
    pub base: u64,
    /// Size in bytes.
    pub space_size: u64,
    /// Word index of the highest free word (bodies grow down to it).
    pub last_free_block: u64,
    /// Word index of the next free header word (headers grow up from 0).
    pub first_free_block: u64,
    /// Collector role.
    pub space_type: SpaceType,
    /// Position in the space table.
    pub space_number: u16,
    /// Behavior flags.
    pub space_flags: SpaceFlags,
    /// Space number of the remembered set tracking this space, or 0.
    pub remembered_set_space_number: u16,
}

impl Space {
    /// Size in words.
    #[inline]
    #[must_use]
    pub const fn size_words(&self) -> u64 {
        self.space_size / 8
    }

    #[inline]
    #[must_use]
    pub const fn is_object_space(&self) -> bool {
        self.space_flags.contains(SpaceFlags::IS_OBJECT_SPACE)
    }

    #[inline]
    #[must_use]
    pub const fn is_pointer_space(&self) -> bool {
        self.space_flags.contains(SpaceFlags::IS_POINTER_SPACE)
    }

    #[inline]
    #[must_use]
    pub fn is_stack_space(&self) -> bool {
        self.space_type == SpaceType::Stack
    }

    /// Spaces whose headers sit at the top: the stack space and the
    /// pointer spaces (which have no headers at all but share the
    /// enumeration convention).
    #[inline]
    #[must_use]
    pub fn is_top_header_space(&self) -> bool {
        self.is_stack_space() || self.is_pointer_space()
    }

    #[inline]
    #[must_use]
    pub const fn is_current(&self) -> bool {
        self.space_flags.contains(SpaceFlags::IS_CURRENT)
    }

    #[inline]
    #[must_use]
    pub const fn has_space_object(&self) -> bool {
        self.space_flags.contains(SpaceFlags::HAS_SPACE_OBJECT)
    }

    pub fn mark_current(&mut self) {
        self.space_flags |= SpaceFlags::IS_CURRENT;
    }

    pub fn mark_not_current(&mut self) {
        self.space_flags.remove(SpaceFlags::IS_CURRENT);
    }
}
