// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The partitioned object memory.
//!
//! All object storage lives in a single word arena. Spaces are carved out
//! of the arena and never move; objects move between spaces under the
//! collectors. A pointer oop is a byte address into the arena, so tag
//! arithmetic, forwarding pointers and image relocation all operate on
//! plain integers. Arena address zero is reserved as the null pointer.
//!
//! An object is five header words plus a body elsewhere in the same
//! space. In object spaces the word after the body points back at the
//! header (`body[total_words] == header`), which is what lets the
//! compactor find headers from bodies.

#[cfg(test)]
mod memory_test;

#[cfg(test)]
mod scavenge_test;


mod audit;
mod global_gc;
mod scavenge;
mod space;

pub use space::{Space, SpaceFlags, SpaceType, space_index};

use crate::error::VmError;
use crate::object::{self, HEADER_BYTES, HEADER_WORDS, ObjectFlags, header, well_known};
use crate::oop::Oop;
use log::warn;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Free words kept between the header and body cursors of a space. An
/// allocation that would close the gap below this margin fails (or, in
/// Eden, scavenges first).
pub const ALLOCATION_MARGIN: u64 = 64;

/// Identity hashes are 60-bit values.
pub const IDENTITY_HASH_MASK: u64 = 0x0FFF_FFFF_FFFF_FFFF;

/// The object memory: arena, space table, remembered set and the
/// collector state shared by the scavenger and the global collector.
pub struct ObjectMemory {
    words: Vec<u64>,
    /// Next free arena word for carving new spaces.
    arena_next: u64,
    /// The space table, indexed by space number.
    pub spaces: Vec<Space>,
    /// Space number of the active survivor space.
    pub active_survivor: usize,
    /// Space number of the inactive survivor space.
    pub inactive_survivor: usize,
    /// Space number the interpreter allocates contexts in.
    pub current_stack_space: usize,
    /// The live frame, or nil between images.
    pub current_context: Oop,
    /// Set while Eden doubles as the global-GC mark queue.
    pub eden_used_for_gc: bool,
    /// Incremented by every scavenge and global collection so cached
    /// context state can be recaptured lazily.
    pub gc_epoch: u64,
    /// Escalate audit findings to fatal errors.
    pub exit_on_audit_fail: bool,
    /// Development flag from the image header.
    pub development: bool,
    rng: SmallRng,
}

impl ObjectMemory {
    /// Create an empty memory with an arena of `arena_bytes`.
    #[must_use]
    pub fn new(arena_bytes: u64) -> Self {
        Self {
            words: vec![0; (arena_bytes / 8) as usize],
            // Word zero is reserved so that address 0 is never an object.
            arena_next: 1,
            spaces: Vec::new(),
            active_survivor: space_index::SURVIVOR1,
            inactive_survivor: space_index::SURVIVOR2,
            current_stack_space: space_index::STACK,
            current_context: Oop::NULL,
            eden_used_for_gc: false,
            gc_epoch: 0,
            exit_on_audit_fail: false,
            development: false,
            rng: SmallRng::from_entropy(),
        }
    }

    // ------------------------------------------------------------------
    // Raw arena access

    /// Read the arena word at a byte address.
    #[inline]
    #[must_use]
    pub fn word(&self, addr: u64) -> u64 {
        self.words[(addr / 8) as usize]
    }

    /// Write the arena word at a byte address.
    #[inline]
    pub fn set_word(&mut self, addr: u64, value: u64) {
        self.words[(addr / 8) as usize] = value;
    }

    /// Read an oop-valued arena word.
    #[inline]
    #[must_use]
    pub fn oop_at(&self, addr: u64) -> Oop {
        Oop::from_bits(self.word(addr))
    }

    /// Write an oop-valued arena word.
    #[inline]
    pub fn set_oop_at(&mut self, addr: u64, value: Oop) {
        self.set_word(addr, value.bits());
    }

    /// Read a byte out of the arena.
    #[inline]
    #[must_use]
    pub fn byte(&self, addr: u64) -> u8 {
        let word = self.words[(addr / 8) as usize];
        (word >> ((addr % 8) * 8)) as u8
    }

    /// Write a byte into the arena.
    #[inline]
    pub fn set_byte(&mut self, addr: u64, value: u8) {
        let index = (addr / 8) as usize;
        let shift = (addr % 8) * 8;
        let word = self.words[index];
        self.words[index] = (word & !(0xFFu64 << shift)) | (u64::from(value) << shift);
    }

    /// Overlapping-safe word move inside the arena (used by the body
    /// compactor).
    pub fn move_words(&mut self, src_addr: u64, dst_addr: u64, count: u64) {
        let src = (src_addr / 8) as usize;
        let dst = (dst_addr / 8) as usize;
        self.words.copy_within(src..src + count as usize, dst);
    }

    /// Byte address of a word inside a space.
    #[inline]
    #[must_use]
    pub fn space_word_addr(&self, space: usize, word_index: u64) -> u64 {
        (self.spaces[space].base + word_index) * 8
    }

    // ------------------------------------------------------------------
    // Header fields

    /// Total size of an object in bytes, header included.
    #[inline]
    #[must_use]
    pub fn mem_size(&self, object: Oop) -> u64 {
        self.word(object.bits() + header::SIZE * 8)
    }

    #[inline]
    pub fn set_mem_size(&mut self, object: Oop, size: u64) {
        self.set_word(object.bits() + header::SIZE * 8, size);
    }

    #[inline]
    #[must_use]
    pub fn flags(&self, object: Oop) -> ObjectFlags {
        ObjectFlags::from_bits_truncate(object::packed_flags(
            self.word(object.bits() + header::PACKED * 8),
        ))
    }

    pub fn set_flags(&mut self, object: Oop, flags: ObjectFlags) {
        let addr = object.bits() + header::PACKED * 8;
        let word = self.word(addr);
        self.set_word(addr, (word & !0xFFFF) | u64::from(flags.bits()));
    }

    pub fn add_flags(&mut self, object: Oop, flags: ObjectFlags) {
        self.set_flags(object, self.flags(object) | flags);
    }

    pub fn remove_flags(&mut self, object: Oop, flags: ObjectFlags) {
        let mut current = self.flags(object);
        current.remove(flags);
        self.set_flags(object, current);
    }

    #[inline]
    #[must_use]
    pub fn flips(&self, object: Oop) -> u16 {
        object::packed_flips(self.word(object.bits() + header::PACKED * 8))
    }

    pub fn set_flips(&mut self, object: Oop, flips: u16) {
        let addr = object.bits() + header::PACKED * 8;
        let word = self.word(addr);
        self.set_word(addr, (word & !0xFFFF_0000) | (u64::from(flips) << 16));
    }

    #[inline]
    #[must_use]
    pub fn named_inst_vars(&self, object: Oop) -> u64 {
        u64::from(object::packed_named_inst_vars(
            self.word(object.bits() + header::PACKED * 8),
        ))
    }

    pub fn set_named_inst_vars(&mut self, object: Oop, count: u32) {
        let addr = object.bits() + header::PACKED * 8;
        let word = self.word(addr);
        self.set_word(addr, (word & 0xFFFF_FFFF) | (u64::from(count) << 32));
    }

    /// The raw class field (a forwarding pointer once RELOCATED is set).
    #[inline]
    #[must_use]
    pub fn class_field(&self, object: Oop) -> Oop {
        self.oop_at(object.bits() + header::CLASS * 8)
    }

    #[inline]
    pub fn set_class_field(&mut self, object: Oop, class: Oop) {
        self.set_oop_at(object.bits() + header::CLASS * 8, class);
    }

    #[inline]
    #[must_use]
    pub fn identity_hash(&self, object: Oop) -> u64 {
        self.word(object.bits() + header::IDENTITY_HASH * 8)
    }

    #[inline]
    pub fn set_identity_hash(&mut self, object: Oop, hash: u64) {
        self.set_word(object.bits() + header::IDENTITY_HASH * 8, hash);
    }

    #[inline]
    #[must_use]
    pub fn body_pointer(&self, object: Oop) -> u64 {
        self.word(object.bits() + header::BODY_POINTER * 8)
    }

    #[inline]
    pub fn set_body_pointer(&mut self, object: Oop, body: u64) {
        self.set_word(object.bits() + header::BODY_POINTER * 8, body);
    }

    #[inline]
    #[must_use]
    pub fn is_bytes(&self, object: Oop) -> bool {
        self.flags(object).contains(ObjectFlags::BYTES)
    }

    #[inline]
    #[must_use]
    pub fn is_relocated(&self, object: Oop) -> bool {
        self.flags(object).contains(ObjectFlags::RELOCATED)
    }

    #[inline]
    #[must_use]
    pub fn is_free(&self, object: Oop) -> bool {
        !object.is_immediate() && self.flags(object).contains(ObjectFlags::FREE)
    }

    #[inline]
    #[must_use]
    pub fn is_space_object(&self, object: Oop) -> bool {
        self.flags(object).contains(ObjectFlags::SPACE_OBJECT)
    }

    #[inline]
    #[must_use]
    pub fn is_marked(&self, object: Oop) -> bool {
        self.flags(object).contains(ObjectFlags::MARK)
    }

    #[inline]
    #[must_use]
    pub fn is_queued_for_mark(&self, object: Oop) -> bool {
        self.flags(object).contains(ObjectFlags::QUEUED_FOR_MARK)
    }

    /// Body size in bytes (without the header).
    #[inline]
    #[must_use]
    pub fn basic_byte_size(&self, object: Oop) -> u64 {
        self.mem_size(object) - HEADER_BYTES
    }

    /// Body size in whole oop slots.
    #[inline]
    #[must_use]
    pub fn total_object_size(&self, object: Oop) -> u64 {
        (self.basic_byte_size(object) + 7) / 8
    }

    /// Indexed slot count (slots past the named ones).
    #[inline]
    #[must_use]
    pub fn indexed_object_size(&self, object: Oop) -> u64 {
        self.total_object_size(object) - self.named_inst_vars(object)
    }

    /// The word after the body, which holds the header address.
    #[inline]
    #[must_use]
    pub fn body_header_pointer(&self, object: Oop) -> u64 {
        self.word(self.body_pointer(object) + self.total_object_size(object) * 8)
    }

    /// Re-write the body's back-pointer to this header.
    pub fn set_body_header_pointer(&mut self, object: Oop) {
        if self.body_pointer(object) != 0 {
            let slot = self.body_pointer(object) + self.total_object_size(object) * 8;
            self.set_word(slot, object.bits());
        }
    }

    // ------------------------------------------------------------------
    // Instance variables

    /// Read slot `index` (named and indexed slots share one numbering).
    #[inline]
    #[must_use]
    pub fn inst_var(&self, object: Oop, index: u64) -> Oop {
        self.oop_at(self.body_pointer(object) + index * 8)
    }

    /// Write slot `index` without remembered-set accounting. Collector
    /// and codec use only.
    #[inline]
    pub fn basic_inst_var_put(&mut self, object: Oop, index: u64, value: Oop) {
        let addr = self.body_pointer(object) + index * 8;
        self.set_oop_at(addr, value);
    }

    /// Write slot `index`, registering the object in the remembered set
    /// when an old-space object starts referencing new space.
    #[inline]
    pub fn inst_var_put(&mut self, object: Oop, index: u64, value: Oop) {
        self.register_if_needed(object, value);
        self.basic_inst_var_put(object, index, value);
    }

    /// Read body byte `index` (zero-based).
    #[inline]
    #[must_use]
    pub fn body_byte(&self, object: Oop, index: u64) -> u8 {
        self.byte(self.body_pointer(object) + index)
    }

    /// Write body byte `index` (zero-based).
    #[inline]
    pub fn set_body_byte(&mut self, object: Oop, index: u64, value: u8) {
        self.set_byte(self.body_pointer(object) + index, value);
    }

    /// Copy a byte object's body into a `Vec`.
    #[must_use]
    pub fn bytes_of(&self, object: Oop) -> Vec<u8> {
        let size = self.basic_byte_size(object);
        (0..size).map(|i| self.body_byte(object, i)).collect()
    }

    /// Read a byte string into a Rust `String` (lossy; strings are byte
    /// sequences, not Unicode).
    #[must_use]
    pub fn string_of(&self, object: Oop) -> String {
        String::from_utf8_lossy(&self.bytes_of(object)).into_owned()
    }

    // ------------------------------------------------------------------
    // Well-known objects

    /// Read a well-known object by index.
    #[inline]
    #[must_use]
    pub fn known(&self, index: u64) -> Oop {
        self.oop_at(self.space_word_addr(space_index::WELL_KNOWN, index))
    }

    /// Write a well-known object by index.
    pub fn set_known(&mut self, index: u64, value: Oop) {
        let space = &mut self.spaces[space_index::WELL_KNOWN];
        if space.first_free_block <= index {
            space.first_free_block = index + 1;
        }
        let addr = self.space_word_addr(space_index::WELL_KNOWN, index);
        self.set_oop_at(addr, value);
    }

    #[inline]
    #[must_use]
    pub fn nil(&self) -> Oop {
        self.known(well_known::NIL)
    }

    #[inline]
    #[must_use]
    pub fn true_oop(&self) -> Oop {
        self.known(well_known::TRUE)
    }

    #[inline]
    #[must_use]
    pub fn false_oop(&self) -> Oop {
        self.known(well_known::FALSE)
    }

    /// Class of any value, immediates included. Context pointers answer
    /// SmallInteger so reified context ids print as integers.
    #[must_use]
    pub fn class_of(&self, value: Oop) -> Oop {
        if value.is_small_int() || value.is_context_pointer() {
            self.known(well_known::SMALL_INTEGER_CLASS)
        } else if value.is_character() {
            self.known(well_known::CHARACTER_CLASS)
        } else if value.is_float() {
            self.known(well_known::FLOAT_CLASS)
        } else {
            self.class_field(value)
        }
    }

    // ------------------------------------------------------------------
    // Space membership

    /// Whether a header address lies in the live header region of a space.
    #[must_use]
    pub fn is_object_in_space(&self, object: Oop, space: usize) -> bool {
        if object.is_immediate() || object.is_null() {
            return false;
        }
        let s = &self.spaces[space];
        let addr = object.bits();
        if s.is_stack_space() {
            addr >= self.space_word_addr(space, s.last_free_block + 1)
                && addr < self.space_word_addr(space, s.size_words())
        } else {
            addr >= self.space_word_addr(space, 0)
                && addr < self.space_word_addr(space, s.first_free_block)
        }
    }

    #[must_use]
    pub fn is_body_in_space(&self, object: Oop, space: usize) -> bool {
        if object.is_immediate() {
            return false;
        }
        let s = &self.spaces[space];
        let body = self.body_pointer(object);
        body >= self.space_word_addr(space, s.last_free_block + 1)
            && body < self.space_word_addr(space, s.size_words())
    }

    #[inline]
    #[must_use]
    pub fn is_in_eden(&self, object: Oop) -> bool {
        self.is_object_in_space(object, space_index::EDEN)
    }

    #[inline]
    #[must_use]
    pub fn is_in_new_space(&self, object: Oop) -> bool {
        self.is_in_eden(object) || self.is_object_in_space(object, self.active_survivor)
    }

    #[inline]
    #[must_use]
    pub fn is_in_old_space(&self, object: Oop) -> bool {
        self.is_object_in_space(object, space_index::OLD)
    }

    #[inline]
    #[must_use]
    pub fn is_in_stack_space(&self, object: Oop) -> bool {
        self.is_object_in_space(object, space_index::STACK)
    }

    /// Member of a space the collectors manage right now.
    #[must_use]
    pub fn is_valid_pointer(&self, object: Oop) -> bool {
        self.is_in_new_space(object)
            || self.is_in_old_space(object)
            || self.is_in_stack_space(object)
    }

    /// Any representable value: immediates, space objects and live
    /// pointers.
    #[must_use]
    pub fn is_valid_oop(&self, value: Oop) -> bool {
        value.is_immediate()
            || (!value.is_null() && self.is_space_object(value))
            || self.is_valid_pointer(value)
    }

    // ------------------------------------------------------------------
    // Space and object allocation

    /// Carve a fresh space of `bytes` out of the arena.
    pub fn allocate_space(
        &mut self,
        bytes: u64,
        space_type: SpaceType,
        space_flags: SpaceFlags,
    ) -> Result<usize, VmError> {
        let words = bytes / 8;
        if self.arena_next + words > self.words.len() as u64 {
            return Err(VmError::OutOfMemory { requested: bytes });
        }

        let base = self.arena_next;
        self.arena_next += words;

        let number = self.spaces.len();
        self.spaces.push(Space {
            base,
            space_size: bytes,
            last_free_block: words.saturating_sub(1),
            first_free_block: 0,
            space_type,
            space_number: number as u16,
            space_flags,
            remembered_set_space_number: 0,
        });
        Ok(number)
    }

    /// Allocate an object in a top-header space (the stack): header grows
    /// down from the top, body up from the bottom.
    fn allocate_object_in_stack_space(
        &mut self,
        size: u64,
        space: usize,
    ) -> Result<Oop, VmError> {
        let body_words = ((size + 7) & !7).saturating_sub(HEADER_BYTES) / 8;
        let s = &self.spaces[space];

        if s.is_stack_space()
            && s.first_free_block + body_words + ALLOCATION_MARGIN >= s.last_free_block
        {
            return Err(VmError::OutOfStackSpace);
        }

        let s = &mut self.spaces[space];
        s.last_free_block -= HEADER_WORDS;
        let header_addr = (s.base + s.last_free_block + 1) * 8;
        let body_addr = (s.base + s.first_free_block) * 8;
        s.first_free_block += body_words;

        let object = Oop::pointer(header_addr);
        self.set_body_pointer(object, body_addr);
        self.set_mem_size(object, size);
        self.set_flags(object, ObjectFlags::empty());
        Ok(object)
    }

    /// Allocate `size` bytes (header included, rounded to 8) in a space.
    ///
    /// In Eden a failed allocation scavenges once and retries; running
    /// out of memory after that is fatal.
    pub fn allocate_object_in(&mut self, size: u64, space: usize) -> Result<Oop, VmError> {
        if self.spaces[space].is_top_header_space() {
            return self.allocate_object_in_stack_space(size, space);
        }

        let body_words = ((size + 7) & !7).saturating_sub(HEADER_BYTES) / 8;

        let s = &self.spaces[space];
        if s.is_object_space()
            && s.first_free_block + body_words + ALLOCATION_MARGIN >= s.last_free_block
        {
            if space == space_index::EDEN {
                self.scavenge()?;
            }
            let s = &self.spaces[space];
            if s.first_free_block + body_words + ALLOCATION_MARGIN >= s.last_free_block {
                return Err(if space == space_index::EDEN {
                    VmError::OutOfEden
                } else {
                    VmError::OutOfObjectSpace
                });
            }
        }

        let s = &mut self.spaces[space];
        let header_addr = (s.base + s.first_free_block) * 8;
        s.first_free_block += HEADER_WORDS;

        let object = Oop::pointer(header_addr);
        if body_words != 0 {
            let s = &mut self.spaces[space];
            // The word above the body holds the header address.
            let back_pointer_addr = (s.base + s.last_free_block) * 8;
            s.last_free_block -= body_words + 1;
            let body_addr = (s.base + s.last_free_block + 1) * 8;
            self.set_word(back_pointer_addr, header_addr);
            self.set_body_pointer(object, body_addr);
        } else {
            self.set_body_pointer(object, 0);
        }

        self.set_mem_size(object, size);
        self.set_flags(object, ObjectFlags::empty());
        Ok(object)
    }

    /// Push a value on the current context's evaluation stack, keeping
    /// the context header and the stack space cursors in lockstep. This
    /// is the rooting mechanism: anything pushed here survives a
    /// collection and comes back (possibly forwarded) on pop.
    pub fn eval_push(&mut self, value: Oop) {
        let ctx = self.current_context;
        self.spaces[self.current_stack_space].first_free_block += 1;
        self.set_mem_size(ctx, self.mem_size(ctx) + 8);

        let offset = self.inst_var(ctx, object::context::STACK_OFFSET).as_small_int() as u64;
        self.basic_inst_var_put(ctx, object::context::STACK_BODY + offset, value);
        self.basic_inst_var_put(
            ctx,
            object::context::STACK_OFFSET,
            Oop::small_int(offset as i64 + 1),
        );
    }

    /// Pop a value off the current context's evaluation stack.
    pub fn eval_pop(&mut self) -> Oop {
        let ctx = self.current_context;
        self.spaces[self.current_stack_space].first_free_block -= 1;
        self.set_mem_size(ctx, self.mem_size(ctx) - 8);

        let offset =
            self.inst_var(ctx, object::context::STACK_OFFSET).as_small_int() as u64 - 1;
        self.basic_inst_var_put(
            ctx,
            object::context::STACK_OFFSET,
            Oop::small_int(offset as i64),
        );
        self.inst_var(ctx, object::context::STACK_BODY + offset)
    }

    /// Create an instance of `behavior` with `indexed_vars` indexed slots.
    ///
    /// The behavior oop is rooted on the evaluation stack across the
    /// allocation: Eden pressure may scavenge, and a raw oop held over a
    /// collection is the one broken pattern this VM forbids.
    pub fn new_instance_of(
        &mut self,
        behavior: Oop,
        indexed_vars: u64,
        space: usize,
    ) -> Result<Oop, VmError> {
        let flags_word = self.inst_var(behavior, object::behavior::FLAGS).as_small_int();
        let named = object::behavior_named_inst_vars(flags_word);
        let layout = object::behavior_layout_flags(flags_word);
        let is_bytes = layout.contains(crate::object::BehaviorFlags::BYTES);

        let size = if is_bytes {
            indexed_vars + HEADER_BYTES
        } else {
            (named + indexed_vars) * 8 + HEADER_BYTES
        };

        let must_root = !self.current_context.is_null()
            && self.current_context != self.nil()
            && !self.spaces[space].is_stack_space();

        if must_root {
            self.eval_push(behavior);
        }

        let object = self.allocate_object_in(size, space)?;

        let behavior = if must_root { self.eval_pop() } else { behavior };

        self.set_flips(object, 0);
        self.set_class_field(object, behavior);
        self.set_flags(
            object,
            ObjectFlags::from_bits_truncate(u16::from(layout.bits())),
        );
        self.set_named_inst_vars(object, if is_bytes { 0 } else { named as u32 });
        let hash = self.next_identity_hash();
        self.set_identity_hash(object, hash);

        if is_bytes {
            for i in 0..self.total_object_size(object) {
                self.basic_inst_var_put(object, i, Oop::NULL);
            }
        } else {
            let nil = self.nil();
            for i in 0..(named + indexed_vars) {
                self.inst_var_put(object, i, nil);
            }
        }

        Ok(object)
    }

    /// Draw a fresh 60-bit identity hash.
    pub fn next_identity_hash(&mut self) -> u64 {
        self.rng.r#gen::<u64>() & IDENTITY_HASH_MASK
    }

    // ------------------------------------------------------------------
    // Remembered set

    /// Register an old-space object as referencing new space when the
    /// written value requires it.
    pub fn register_if_needed(&mut self, object: Oop, value: Oop) {
        if !self.is_in_new_space(object) && self.is_in_new_space(value) {
            self.register_remembered(object);
        }
    }

    /// Add an object to the remembered set (open addressing by identity
    /// hash, linear probing).
    pub fn register_remembered(&mut self, object: Oop) {
        let max = self.spaces[space_index::REMEMBERED_SET].size_words();
        let mut index = self.identity_hash(object) % max;
        let start = index;

        loop {
            let slot = self.space_word_addr(space_index::REMEMBERED_SET, index);
            let entry = self.word(slot);
            if entry == 0 {
                self.set_word(slot, object.bits());
                return;
            }
            if entry == object.bits() {
                return;
            }
            index = (index + 1) % max;
            if index == start {
                warn!("remembered set is full");
                return;
            }
        }
    }

    /// Remove an object from the remembered set. Answers whether it was
    /// registered.
    pub fn unregister_remembered(&mut self, object: Oop) -> bool {
        let max = self.spaces[space_index::REMEMBERED_SET].size_words();
        let mut index = self.identity_hash(object) % max;
        let start = index;

        loop {
            let slot = self.space_word_addr(space_index::REMEMBERED_SET, index);
            let entry = self.word(slot);
            if entry == 0 {
                return false;
            }
            if entry == object.bits() {
                self.set_word(slot, 0);
                return true;
            }
            index = (index + 1) % max;
            if index == start {
                warn!("remembered set is full");
                return false;
            }
        }
    }

    /// Whether an object is in the remembered set.
    #[must_use]
    pub fn find_remembered(&self, object: Oop) -> bool {
        let max = self.spaces[space_index::REMEMBERED_SET].size_words();
        let mut index = self.identity_hash(object) % max;
        let start = index;

        loop {
            let slot = self.space_word_addr(space_index::REMEMBERED_SET, index);
            let entry = self.word(slot);
            if entry == 0 {
                return false;
            }
            if entry == object.bits() {
                return true;
            }
            index = (index + 1) % max;
            if index == start {
                warn!("remembered set is full");
                return false;
            }
        }
    }

    /// Re-insert every entry. Entries hash by identity hash, which is
    /// stable, but clearing and re-adding compacts probe chains after
    /// unregistrations and moves.
    pub fn rehash_remembered_set(&mut self) {
        let max = self.spaces[space_index::REMEMBERED_SET].size_words();
        for i in 0..max {
            let slot = self.space_word_addr(space_index::REMEMBERED_SET, i);
            let entry = self.word(slot);
            if entry != 0 {
                self.set_word(slot, 0);
                self.register_remembered(Oop::pointer(entry));
            }
        }
    }

    // ------------------------------------------------------------------
    // Enumeration

    /// Header addresses of every object slot in a space, respecting the
    /// top-vs-bottom header convention. Free and relocated headers are
    /// included; callers filter.
    #[must_use]
    pub fn object_headers(&self, space: usize) -> Vec<Oop> {
        let s = &self.spaces[space];
        let mut result = Vec::new();
        if s.is_top_header_space() {
            let mut index = s.last_free_block + 1;
            while index < s.size_words() {
                result.push(Oop::pointer((s.base + index) * 8));
                index += HEADER_WORDS;
            }
        } else {
            let mut index = 0;
            while index < s.first_free_block {
                result.push(Oop::pointer((s.base + index) * 8));
                index += HEADER_WORDS;
            }
        }
        result
    }

    /// Word addresses of every live pointer slot in a pointer space.
    #[must_use]
    pub fn pointer_slots(&self, space: usize) -> Vec<u64> {
        let s = &self.spaces[space];
        (0..s.first_free_block)
            .map(|i| (s.base + i) * 8)
            .collect()
    }

    // ------------------------------------------------------------------
    // Identity dictionaries

    /// Look up `key` in an identity dictionary (open addressing by
    /// identity hash, linear probing over association entries). Answers
    /// nil when absent.
    #[must_use]
    pub fn identity_dictionary_at(&self, dictionary: Oop, key: Oop) -> Oop {
        let values = self.inst_var(dictionary, object::dictionary::VALUES);
        let size = self.indexed_object_size(values);
        if size == 0 {
            return self.nil();
        }

        let mut index = self.identity_hash(key) % size;
        let start = index;
        loop {
            let assoc = self.inst_var(values, index);
            if assoc == self.nil() {
                return self.nil();
            }
            if self.inst_var(assoc, object::association::KEY) == key {
                return self.inst_var(assoc, object::association::VALUE);
            }
            index = (index + 1) % size;
            if index == start {
                return self.nil();
            }
        }
    }

    /// Reverse lookup: the key whose association holds `value`, or nil.
    /// Used to recover selectors from method dictionaries for walkbacks.
    #[must_use]
    pub fn identity_dictionary_key_at_value(&self, dictionary: Oop, value: Oop) -> Oop {
        let values = self.inst_var(dictionary, object::dictionary::VALUES);
        let size = self.indexed_object_size(values);

        for i in 0..size {
            let assoc = self.inst_var(values, i);
            if assoc != self.nil()
                && self.inst_var(assoc, object::association::VALUE) == value
            {
                return self.inst_var(assoc, object::association::KEY);
            }
        }
        self.nil()
    }

    /// Look a global up in the system dictionary.
    #[must_use]
    pub fn global_variable_at(&self, symbol: Oop) -> Oop {
        self.identity_dictionary_at(self.known(well_known::SYSTEM_DICTIONARY), symbol)
    }

    /// Validity check used by the auditor: the body must live in the
    /// same space as its header.
    #[must_use]
    pub fn check_object(&self, pointer: Oop) -> bool {
        if pointer.is_immediate() {
            return true;
        }
        if self.is_space_object(pointer) {
            return true;
        }
        for space in [
            space_index::EDEN,
            self.active_survivor,
            self.inactive_survivor,
            space_index::OLD,
        ] {
            if self.is_object_in_space(pointer, space) {
                return self.is_body_in_space(pointer, space);
            }
        }
        self.is_in_stack_space(pointer)
    }
}
