// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The global mark-sweep-compact collector.
//!
//! Three phases over old space (plus sweeps of the active survivor and
//! stack spaces):
//!
//! 1. *Mark.* Eden is emptied by a leading scavenge and repurposed as a
//!    FIFO mark queue. Queue entries carry QUEUED_FOR_MARK; popping an
//!    entry marks it and queues its class and slots. Cycles terminate
//!    because a queued or marked object is never queued again.
//! 2. *Sweep.* Headers that are neither marked nor space objects become
//!    FREE and leave the remembered set.
//! 3. *Compact.* Old-space bodies slide to the top of the space (the
//!    back-pointer word after each body finds its header), then headers
//!    slide to the bottom, leaving RELOCATED forwarding headers behind.
//!    A final pass rewrites every pointer in every space through the
//!    forwarding headers and rehashes the remembered set.

use super::{ObjectMemory, space_index};
use crate::error::VmError;
use crate::object::{self, HEADER_BYTES, HEADER_WORDS, ObjectFlags};
use crate::oop::Oop;
use log::info;

impl ObjectMemory {
    /// Run a full collection of old space.
    pub fn global_garbage_collect(&mut self) -> Result<(), VmError> {
        info!("starting global garbage collection");

        self.scavenge()?;
        self.unmark_space(space_index::OLD);
        self.unmark_space(self.active_survivor);
        self.unmark_space(space_index::STACK);

        self.prepare_eden_for_gc();

        self.queue_mark_stack(self.current_context)?;
        self.queue_mark_pointer_space(space_index::WELL_KNOWN)?;

        self.propagate_marks()?;

        self.sweep_space(space_index::OLD);
        self.sweep_space(self.active_survivor);
        self.sweep_space(space_index::STACK);

        self.compact_space(space_index::OLD);

        self.clear_eden();
        self.unmark_space(space_index::OLD);
        self.unmark_space(self.active_survivor);
        self.unmark_space(space_index::STACK);

        self.audit_image()?;
        self.gc_epoch += 1;
        Ok(())
    }

    fn unmark_space(&mut self, space: usize) {
        for object in self.object_headers(space) {
            self.remove_flags(object, ObjectFlags::MARK);
        }
    }

    fn prepare_eden_for_gc(&mut self) {
        let eden = &mut self.spaces[space_index::EDEN];
        eden.first_free_block = 0;
        eden.last_free_block = 0;
        self.eden_used_for_gc = true;
    }

    /// Append an object to the mark queue unless it is already marked,
    /// queued, or not a heap object at all.
    fn queue_mark_object(&mut self, object: Oop) -> Result<(), VmError> {
        if object.is_null() || object.is_immediate() {
            return Ok(());
        }
        if self.is_marked(object) || self.is_queued_for_mark(object) {
            return Ok(());
        }

        self.add_flags(object, ObjectFlags::QUEUED_FOR_MARK);

        let eden = &self.spaces[space_index::EDEN];
        let write = eden.first_free_block;
        let size = eden.size_words();
        let slot = self.space_word_addr(space_index::EDEN, write);
        self.set_word(slot, object.bits());

        let eden = &mut self.spaces[space_index::EDEN];
        eden.first_free_block = (write + 1) % size;
        if eden.first_free_block == eden.last_free_block {
            return Err(VmError::MarkQueueOverflow);
        }
        Ok(())
    }

    fn queue_mark_stack(&mut self, context: Oop) -> Result<(), VmError> {
        let mut frame = context;
        while !frame.is_null() && frame != self.nil() {
            self.queue_mark_object(frame)?;
            frame = self.inst_var(frame, object::context::FRAME);
        }
        Ok(())
    }

    fn queue_mark_pointer_space(&mut self, space: usize) -> Result<(), VmError> {
        for slot in self.pointer_slots(space) {
            let value = self.oop_at(slot);
            self.queue_mark_object(value)?;
        }
        Ok(())
    }

    /// Mark one object and queue everything it references.
    fn mark_object(&mut self, object: Oop) -> Result<(), VmError> {
        if object.is_immediate() || self.is_marked(object) {
            return Ok(());
        }

        self.add_flags(object, ObjectFlags::MARK);
        self.remove_flags(object, ObjectFlags::QUEUED_FOR_MARK);

        self.queue_mark_object(self.class_field(object))?;

        if !self.is_bytes(object) {
            for i in 0..self.total_object_size(object) {
                let slot_value = self.inst_var(object, i);
                self.queue_mark_object(slot_value)?;
            }
        }
        Ok(())
    }

    /// Drain the queue until it empties.
    fn propagate_marks(&mut self) -> Result<(), VmError> {
        loop {
            let eden = &self.spaces[space_index::EDEN];
            if eden.last_free_block == eden.first_free_block {
                return Ok(());
            }
            let read = eden.last_free_block;
            let size = eden.size_words();
            let value = Oop::pointer(self.word(self.space_word_addr(space_index::EDEN, read)));
            self.spaces[space_index::EDEN].last_free_block = (read + 1) % size;
            self.mark_object(value)?;
        }
    }

    /// Free every unmarked, non-space object in a space.
    fn sweep_space(&mut self, space: usize) {
        for object in self.object_headers(space) {
            if self.is_free(object) || self.is_marked(object) || self.is_space_object(object) {
                continue;
            }
            self.unregister_remembered(object);
            self.add_flags(object, ObjectFlags::FREE);
        }
    }

    // ------------------------------------------------------------------
    // Compaction

    fn compact_space(&mut self, space: usize) {
        self.compact_bodies(space);
        self.compact_headers(space);
    }

    /// Slide a body (and its back-pointer word) up against the previous
    /// live body. Answers the new body address.
    fn copy_body(&mut self, object: Oop, last_body_pointer: u64) -> u64 {
        let words = self.total_object_size(object);
        let start_of_body = last_body_pointer - words * 8;

        if self.body_pointer(object) == start_of_body {
            return start_of_body;
        }

        self.move_words(self.body_pointer(object), start_of_body, words + 1);
        self.set_body_pointer(object, start_of_body);
        start_of_body
    }

    /// Walk bodies from the top of the space downward, packing live ones
    /// against the top. The word at the top of every body region is the
    /// back-pointer that identifies its header.
    fn compact_bodies(&mut self, space: usize) {
        let s = &self.spaces[space];
        let top = self.space_word_addr(space, s.size_words() - 1);
        let limit = self.space_word_addr(space, s.last_free_block);

        let mut copy_to = top;
        let mut copy_from = top;

        while copy_from > limit {
            let header = Oop::pointer(self.word(copy_from));
            if !self.is_object_in_space(header, space) {
                info!("object {:#x} isn't in the compacted space", header.bits());
            }
            if self.body_pointer(header) == 0 {
                info!("object has empty body: {:#x}", header.bits());
                return;
            }

            // Capture the next back-pointer now; the move may overwrite it.
            let next_copy_from = copy_from - (self.total_object_size(header) + 1) * 8;

            if !self.is_free(header) {
                copy_to = self.copy_body(header, copy_to) - 8;
            }
            copy_from = next_copy_from;
        }

        let base = self.space_word_addr(space, 0);
        self.spaces[space].last_free_block = (copy_to - base) / 8;
    }

    fn find_first_free_header(&self, space: usize, from: u64) -> Option<Oop> {
        let s = &self.spaces[space];
        let end = self.space_word_addr(space, s.first_free_block);
        let mut addr = from;
        while addr < end {
            let header = Oop::pointer(addr);
            if self.is_free(header) {
                return Some(header);
            }
            addr += HEADER_BYTES;
        }
        None
    }

    fn find_last_used_header(&self, space: usize, from: u64) -> Option<Oop> {
        let base = self.space_word_addr(space, 0);
        let mut addr = from;
        while addr >= base {
            let header = Oop::pointer(addr);
            if !self.is_free(header) {
                return Some(header);
            }
            if addr < base + HEADER_BYTES {
                break;
            }
            addr -= HEADER_BYTES;
        }
        None
    }

    /// Move used headers from the top of the header region into free
    /// slots at the bottom, leaving forwarding headers behind, until the
    /// two cursors cross. Then fix every pointer in the system.
    fn compact_headers(&mut self, space: usize) {
        let base = self.space_word_addr(space, 0);
        let first_free_block = self.spaces[space].first_free_block;

        let mut first_free = self.find_first_free_header(space, base);
        let mut last_used = if first_free_block == 0 {
            None
        } else {
            let top = base + first_free_block * 8 - HEADER_BYTES;
            self.find_last_used_header(space, top)
        };

        while let (Some(free), Some(used)) = (first_free, last_used) {
            if free.bits() >= used.bits() {
                break;
            }

            let was_registered = self.unregister_remembered(used);
            for i in 0..HEADER_WORDS {
                let word = self.word(used.bits() + i * 8);
                self.set_word(free.bits() + i * 8, word);
            }
            if was_registered {
                self.register_remembered(free);
            }

            self.add_flags(used, ObjectFlags::RELOCATED | ObjectFlags::FREE);
            self.set_class_field(used, free);
            self.set_body_header_pointer(free);

            first_free = self.find_first_free_header(space, free.bits());
            last_used = self.find_last_used_header(space, used.bits());
        }

        let first_free_block = self.spaces[space].first_free_block;
        let last_used = if first_free_block == 0 {
            None
        } else {
            let top = base + first_free_block * 8 - HEADER_BYTES;
            self.find_last_used_header(space, top)
        };
        self.spaces[space].first_free_block = match last_used {
            None => 0,
            Some(header) => (header.bits() + HEADER_BYTES - base) / 8,
        };

        self.clear_eden();
        self.relocate_all_object_pointers();
    }

    // ------------------------------------------------------------------
    // Pointer relocation

    /// Rewrite a slot through the forwarding header it points at, if any.
    fn relocate_object_pointer(&mut self, slot: u64) {
        let value = self.oop_at(slot);
        if value.is_null() || value.is_immediate() {
            return;
        }
        if self.is_in_stack_space(value) {
            return;
        }
        if self.is_relocated(value) {
            let forwarded = self.class_field(value);
            self.set_oop_at(slot, forwarded);
        }
    }

    fn relocate_object_variables(&mut self, object: Oop) {
        if object.is_null() || object.is_immediate() {
            return;
        }
        if self.is_free(object) || self.is_relocated(object) {
            return;
        }

        self.relocate_object_pointer(object.bits() + object::header::CLASS * 8);
        if self.is_bytes(object) {
            return;
        }

        let body = self.body_pointer(object);
        for i in 0..self.total_object_size(object) {
            self.relocate_object_pointer(body + i * 8);
        }
    }

    fn relocate_object_pointers_in_object_space(&mut self, space: usize) {
        for object in self.object_headers(space) {
            self.relocate_object_variables(object);
        }
    }

    fn relocate_object_pointers_in_pointer_space(&mut self, space: usize) {
        for slot in self.pointer_slots(space) {
            self.relocate_object_pointer(slot);
        }
    }

    /// Fix every pointer in every space after a header move.
    pub(crate) fn relocate_all_object_pointers(&mut self) {
        self.relocate_object_pointers_in_object_space(space_index::OLD);
        self.relocate_object_pointers_in_object_space(space_index::EDEN);
        self.relocate_object_pointers_in_object_space(self.active_survivor);
        self.relocate_object_pointers_in_pointer_space(space_index::WELL_KNOWN);
        self.relocate_object_pointers_in_object_space(space_index::STACK);
        self.relocate_object_pointers_in_pointer_space(space_index::REMEMBERED_SET);
        self.rehash_remembered_set();
    }

    // ------------------------------------------------------------------
    // Space reallocation

    /// Replace a space with a freshly allocated one of `bytes`, migrating
    /// its contents and fixing every pointer. The replacement carries a
    /// MemorySpace object describing itself.
    pub fn reallocate_space(&mut self, index: usize, bytes: u64) -> Result<(), VmError> {
        let source_flags = self.spaces[index].space_flags;
        let source_type = self.spaces[index].space_type;

        let temp = self.allocate_space(bytes + HEADER_BYTES, source_type, source_flags)?;

        let space_class = self.known(object::well_known::MEMORY_SPACE_CLASS);
        let space_object = self.new_instance_of(space_class, 0, temp)?;
        let base_addr = self.space_word_addr(temp, 0);
        self.set_body_pointer(space_object, base_addr);
        self.set_mem_size(space_object, self.spaces[temp].space_size + HEADER_BYTES);
        self.add_flags(space_object, ObjectFlags::SPACE_OBJECT);
        self.spaces[temp].space_flags |= super::SpaceFlags::HAS_SPACE_OBJECT;

        if self.spaces[index].is_object_space() {
            let mut header_index = 0;
            while header_index < self.spaces[index].first_free_block {
                let object = Oop::pointer(self.space_word_addr(index, header_index));
                self.move_object_to_space(object, temp)?;
                header_index += HEADER_WORDS;
            }
            self.relocate_all_object_pointers();
            self.relocate_object_pointers_in_object_space(temp);
        } else {
            for i in 0..self.spaces[index].first_free_block {
                let word = self.word(self.space_word_addr(index, i));
                let slot = self.space_word_addr(temp, i);
                self.set_word(slot, word);
                self.spaces[temp].first_free_block += 1;
            }
        }

        // Swap the replacement into the table slot; the vacated arena
        // region of the source space is abandoned.
        let mut replacement = self.spaces[temp].clone();
        replacement.space_number = index as u16;
        self.spaces[index] = replacement;
        self.spaces.truncate(temp);

        self.gc_epoch += 1;
        Ok(())
    }
}
