// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Heap invariant auditing.
//!
//! The auditor walks every space and verifies the structural invariants:
//! headers in their space, bodies behind their back-pointers, classes in
//! live spaces, old-to-new references covered by the remembered set.
//! Findings are logged; with `exit_on_audit_fail` set they become fatal.
//! The walk is O(heap) and cheap enough to run between the sensitive
//! steps of space reallocation and become:.

use super::{ObjectMemory, space_index};
use crate::error::VmError;
use crate::object::{self, HEADER_BYTES, HEADER_WORDS};
use crate::oop::Oop;
use log::warn;

impl ObjectMemory {
    fn audit_finding(&self, finding: &str) -> Result<(), VmError> {
        warn!("audit: {finding}");
        if self.exit_on_audit_fail {
            return Err(VmError::AuditFailed(finding.to_string()));
        }
        Ok(())
    }

    fn audit_pointer(&self, pointer: Oop, owner: Oop) -> Result<(), VmError> {
        if !pointer.is_null() && !self.is_valid_oop(pointer) {
            return self.audit_finding(&format!(
                "invalid object pointer {:#x} owner {:#x}",
                pointer.bits(),
                owner.bits()
            ));
        }
        Ok(())
    }

    fn audit_object(&self, object: Oop, space: usize) -> Result<(), VmError> {
        if object.is_immediate() || self.is_free(object) || self.is_space_object(object) {
            return Ok(());
        }

        if self.is_relocated(object) {
            self.audit_finding(&format!(
                "object {:#x} relocated in space {space}",
                object.bits()
            ))?;
        }

        if !self.is_object_in_space(object, space) {
            self.audit_finding(&format!(
                "object {:#x} not in space {space}",
                object.bits()
            ))?;
        }

        let size = self.mem_size(object);
        if size > self.spaces[space].space_size {
            self.audit_finding(&format!("object {:#x} too large {size:#x}", object.bits()))?;
        }
        if size < HEADER_BYTES {
            self.audit_finding(&format!("object {:#x} too small {size:#x}", object.bits()))?;
        }

        let class = self.class_field(object);
        if !self.is_in_old_space(class) && !self.is_in_new_space(class) {
            self.audit_finding(&format!(
                "object {:#x} class {:#x} not in a valid space",
                object.bits(),
                class.bits()
            ))?;
        }
        if self.is_free(class) {
            self.audit_finding(&format!(
                "object {:#x} class {:#x} is free",
                object.bits(),
                class.bits()
            ))?;
        }

        if self.named_inst_vars(object) > 64 {
            self.audit_finding(&format!(
                "too many named inst vars on {:#x}: {}",
                object.bits(),
                self.named_inst_vars(object)
            ))?;
        }

        if !self.is_in_stack_space(object)
            && self.body_pointer(object) != 0
            && self.body_header_pointer(object) != object.bits()
        {
            self.audit_finding(&format!(
                "body back-pointer {:#x} doesn't point to object {:#x}",
                self.body_header_pointer(object),
                object.bits()
            ))?;
        }

        if !self.is_bytes(object) {
            for i in 0..self.total_object_size(object) {
                let slot_value = self.inst_var(object, i);
                if self.is_in_old_space(object)
                    && self.is_in_new_space(slot_value)
                    && !self.find_remembered(object)
                {
                    self.audit_finding(&format!(
                        "object {:#x} not in remembered set for slot {:#x}",
                        object.bits(),
                        slot_value.bits()
                    ))?;
                }
                self.audit_pointer(slot_value, object)?;
            }
        }
        Ok(())
    }

    fn audit_object_space(&self, space: usize) -> Result<(), VmError> {
        let s = &self.spaces[space];
        let mut index = 0;
        while index < s.first_free_block {
            let object = Oop::pointer(self.space_word_addr(space, index));
            self.audit_object(object, space)?;
            index += HEADER_WORDS;
        }
        Ok(())
    }

    fn audit_stack_space(&self, context: Oop, space: usize) -> Result<(), VmError> {
        if context.is_null() || context == self.nil() {
            return Ok(());
        }

        let mut frame = context;
        while !frame.is_null() && frame != self.nil() {
            self.audit_object(frame, space)?;
            frame = self.inst_var(frame, object::context::FRAME);
        }
        Ok(())
    }

    fn audit_pointer_space(&self, space: usize) -> Result<(), VmError> {
        for slot in self.pointer_slots(space) {
            self.audit_pointer(self.oop_at(slot), Oop::pointer(slot))?;
        }
        Ok(())
    }

    /// Walk bodies from the top of a space and confirm each back-pointer
    /// names a header in the same space.
    fn audit_back_pointers(&self, space: usize) -> Result<(), VmError> {
        let s = &self.spaces[space];
        if s.size_words() == 0 {
            return Ok(());
        }
        let limit = self.space_word_addr(space, s.last_free_block);
        let mut cursor = self.space_word_addr(space, s.size_words() - 1);

        while cursor > limit {
            let header = Oop::pointer(self.word(cursor));
            if self.body_pointer(header) == 0 {
                return self
                    .audit_finding(&format!("object has empty body: {:#x}", header.bits()));
            }
            if !self.is_object_in_space(header, space) {
                return self.audit_finding(&format!(
                    "back-pointer {:#x} names an object outside space {space}",
                    header.bits()
                ));
            }
            cursor -= (self.total_object_size(header) + 1) * 8;
        }
        Ok(())
    }

    /// Verify the whole image. Silent when everything holds.
    pub fn audit_image(&self) -> Result<(), VmError> {
        if !self.eden_used_for_gc {
            self.audit_object_space(space_index::EDEN)?;
            self.audit_back_pointers(space_index::EDEN)?;
        }
        self.audit_object_space(space_index::SURVIVOR1)?;
        self.audit_object_space(space_index::SURVIVOR2)?;
        self.audit_object_space(space_index::OLD)?;
        self.audit_stack_space(self.current_context, self.current_stack_space)?;
        self.audit_pointer_space(space_index::REMEMBERED_SET)?;
        self.audit_pointer_space(space_index::WELL_KNOWN)?;
        self.audit_back_pointers(space_index::SURVIVOR1)?;
        self.audit_back_pointers(space_index::SURVIVOR2)?;
        self.audit_back_pointers(space_index::OLD)?;
        Ok(())
    }
}
