// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The copying scavenger.
//!
//! A scavenge copies every live object out of Eden and the active
//! survivor space into the inactive survivor space, then swaps the two
//! survivor roles and clears Eden. Roots are the well-known objects, the
//! frame chain of the current context, and the remembered set. Objects
//! whose flip counter passed the tenure threshold are copied to old
//! space instead and registered in the remembered set.
//!
//! A copied object leaves a forwarding pointer in its `class` header
//! field with the RELOCATED flag set; every referring slot met later in
//! the trace is rewritten through that pointer, so no depth-two chains
//! survive the collection.

use super::{ObjectMemory, space_index};
use crate::error::VmError;
use crate::object::{self, HEADER_BYTES, HEADER_WORDS, ObjectFlags};
use crate::oop::Oop;
use log::trace;

/// Survivor copies an object endures before being tenured to old space.
pub const TENURE_THRESHOLD: u16 = 300;

impl ObjectMemory {
    /// Run a scavenge. Invalidates cached context state (the epoch is
    /// bumped so the interpreter recaptures).
    pub fn scavenge(&mut self) -> Result<(), VmError> {
        trace!("scavenging into space {}", self.inactive_survivor);

        self.copy_roots_to_inactive()?;
        self.flip_survivor_spaces();
        self.clear_eden();
        self.gc_epoch += 1;
        Ok(())
    }

    fn copy_roots_to_inactive(&mut self) -> Result<(), VmError> {
        // Well-known objects.
        let slots = self.pointer_slots(space_index::WELL_KNOWN);
        for slot in slots {
            self.copy_to_inactive_pointer(slot)?;
        }

        // Every frame of the live stack.
        let mut frame = self.current_context;
        while !frame.is_null() && frame != self.nil() {
            self.copy_to_inactive_object_contents(frame)?;
            frame = self.inst_var(frame, object::context::FRAME);
        }

        // Remembered-set entries; entries that no longer reference new
        // space drop out of the set here.
        let max = self.spaces[space_index::REMEMBERED_SET].size_words();
        for i in 0..max {
            let slot = self.space_word_addr(space_index::REMEMBERED_SET, i);
            let entry = self.word(slot);
            if entry != 0 && self.copy_to_inactive_object_contents(Oop::pointer(entry))? == 0 {
                self.set_word(slot, 0);
            }
        }

        // Breadth-first sweep over the objects just copied; the loop
        // bound grows as copies land.
        let mut index = 0;
        while index < self.spaces[self.inactive_survivor].first_free_block {
            let object = Oop::pointer(self.space_word_addr(self.inactive_survivor, index));
            if self.mem_size(object) == 0 {
                break;
            }
            self.copy_to_inactive_object_contents(object)?;
            index += HEADER_WORDS;
        }

        self.rehash_remembered_set();
        Ok(())
    }

    /// Trace one object's class and slots. Answers how many traced slots
    /// still point into the survivor spaces (zero means the object keeps
    /// no new-space references).
    pub(crate) fn copy_to_inactive_object_contents(
        &mut self,
        object: Oop,
    ) -> Result<u64, VmError> {
        if object.is_immediate() {
            return Ok(0);
        }

        let class_slot = object.bits() + object::header::CLASS * 8;
        if self.is_bytes(object) {
            return self.copy_to_inactive_pointer(class_slot);
        }

        let mut count = self.copy_to_inactive_pointer(class_slot)?;
        let body = self.body_pointer(object);
        let size = self.total_object_size(object);
        for i in 0..size {
            count += self.copy_to_inactive_pointer(body + i * 8)?;
        }
        Ok(count)
    }

    /// Trace the oop stored at an arena slot: copy the target out of new
    /// space if needed and rewrite the slot through the forwarding
    /// pointer. Context-tagged pointers are stripped for the trace and
    /// re-tagged afterwards.
    fn copy_to_inactive_pointer(&mut self, slot: u64) -> Result<u64, VmError> {
        let value = self.oop_at(slot);
        let was_context_pointer = value.is_context_pointer();
        let stripped = value.strip_tags();

        if value.is_immediate() && !was_context_pointer {
            return Ok(0);
        }
        if stripped.is_null() {
            return Ok(0);
        }
        if self.is_object_in_space(stripped, self.inactive_survivor) {
            return Ok(1);
        }
        if !self.is_in_new_space(stripped) {
            return Ok(0);
        }
        if self.is_space_object(stripped) {
            return Ok(0);
        }

        if !self.is_relocated(stripped) {
            self.copy_to_inactive_survivor(stripped)?;
        }

        // The class field of the old header carries the forwarding
        // pointer now.
        let mut forwarded = self.class_field(stripped);
        if was_context_pointer {
            forwarded = forwarded.as_context_pointer();
        }
        self.set_oop_at(slot, forwarded);

        Ok(u64::from(
            self.is_object_in_space(forwarded.strip_tags(), self.inactive_survivor),
        ))
    }

    /// Copy one live object out of new space: into the inactive survivor
    /// normally, into old space once its flips pass the threshold.
    fn copy_to_inactive_survivor(&mut self, object: Oop) -> Result<(), VmError> {
        if self.flips(object) > TENURE_THRESHOLD {
            let new_object = self.allocate_object_in(self.mem_size(object), space_index::OLD)?;
            self.copy_object_to(object, new_object);
            // Old space is not swept by this scavenge, so trace the
            // tenured copy now and remember it.
            self.copy_to_inactive_object_contents(new_object)?;
            self.register_remembered(new_object);
        } else {
            let new_object =
                self.allocate_object_in(self.mem_size(object), self.inactive_survivor)?;
            self.copy_object_to(object, new_object);
            let flips = self.flips(new_object) + 1;
            self.set_flips(new_object, flips);
        }
        Ok(())
    }

    /// Copy header (except the body pointer) and body, then turn the old
    /// header into a forwarding pointer.
    pub(crate) fn copy_object_to(&mut self, old_object: Oop, new_object: Oop) {
        // Header words before the body pointer: size, packed, class, hash.
        for i in 0..(HEADER_WORDS - 1) {
            let word = self.word(old_object.bits() + i * 8);
            self.set_word(new_object.bits() + i * 8, word);
        }

        let words = self.total_object_size(old_object);
        let old_body = self.body_pointer(old_object);
        let new_body = self.body_pointer(new_object);
        for i in 0..words {
            let word = self.word(old_body + i * 8);
            self.set_word(new_body + i * 8, word);
        }

        self.set_class_field(old_object, new_object);
        self.add_flags(old_object, ObjectFlags::RELOCATED);
    }

    /// Move one object into another space (space reallocation support).
    pub(crate) fn move_object_to_space(
        &mut self,
        object: Oop,
        space: usize,
    ) -> Result<(), VmError> {
        let new_object = self.allocate_object_in(self.mem_size(object), space)?;
        self.copy_object_to(object, new_object);
        Ok(())
    }

    /// Exchange the active and inactive survivor roles.
    pub(crate) fn flip_survivor_spaces(&mut self) {
        core::mem::swap(&mut self.active_survivor, &mut self.inactive_survivor);
        self.spaces[self.active_survivor].mark_current();
        self.spaces[self.inactive_survivor].mark_not_current();
    }

    /// Reset a space's cursors, keeping room for its space object when it
    /// has one.
    pub(crate) fn clear_space(&mut self, space: usize) {
        let s = &mut self.spaces[space];
        if s.has_space_object() {
            if s.is_top_header_space() {
                // |space object body|other bodies...|headers|space object header|
                s.first_free_block = 0;
                s.last_free_block = (s.space_size - HEADER_BYTES) / 8 - 1;
            } else {
                // |space object header|other headers|...|bodies|
                s.first_free_block = HEADER_WORDS;
                s.last_free_block = s.size_words() - 1;
            }
        } else {
            s.first_free_block = 0;
            s.last_free_block = s.size_words() - 1;
        }
    }

    /// Empty Eden and the (new) inactive survivor space.
    pub(crate) fn clear_eden(&mut self) {
        self.clear_space(self.inactive_survivor);
        self.clear_space(space_index::EDEN);
        self.eden_used_for_gc = false;
    }
}
