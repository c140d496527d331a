// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Walkback formatting.
//!
//! A walkback is a textual dump of the frame chain, one frame per line,
//! topmost first: `Class >> selector (pcOffset)`, or
//! `ReceiverClass(DefiningClass) >> selector` when the method is
//! inherited, or `Block` for block frames. The dump is prefixed by a
//! decimal line count and the VM version, and is both logged and kept
//! for the walkback primitive and for exception messages.

use super::Interpreter;
use crate::object;
use crate::oop::Oop;
use log::warn;

impl Interpreter {
    /// Printable name of a class or metaclass oop.
    #[must_use]
    pub fn class_name_of(&self, class: Oop) -> String {
        let metaclass_class = self.mem.known(object::well_known::METACLASS_CLASS);
        if self.mem.class_of(class) == metaclass_class {
            let this_class = self.mem.inst_var(class, object::metaclass::THIS_CLASS);
            let name = self.mem.inst_var(this_class, object::class::NAME);
            return format!("{} class", self.mem.string_of(name));
        }

        let name = self.mem.inst_var(class, object::class::NAME);
        let symbol_class = self.mem.known(object::well_known::BYTE_SYMBOL_CLASS);
        if self.mem.class_of(name) == symbol_class {
            self.mem.string_of(name)
        } else {
            "No class name".to_string()
        }
    }

    fn walkback_frame_line(&self, frame: Oop) -> String {
        let pc_offset = self
            .mem
            .inst_var(frame, object::context::PC_OFFSET)
            .as_small_int();
        let method = self.mem.inst_var(frame, object::context::METHOD);

        let compiled_block_class = self.mem.known(object::well_known::COMPILED_BLOCK_CLASS);
        if self.mem.class_of(method) == compiled_block_class {
            return format!("\tBlock ({pc_offset:x})\r");
        }

        let receiver = self.receiver_of_frame(frame);
        let receiver_class = self.mem.class_of(receiver);
        let receiver_class_name = self.class_name_of(receiver_class);

        let mclass = self.mem.inst_var(method, object::method::MCLASS);
        let class_name = self.class_name_of(mclass);

        let dictionary = self.mem.inst_var(mclass, object::behavior::METHOD_DICTIONARY);
        let selector = self.mem.identity_dictionary_key_at_value(dictionary, method);
        let selector_name = self.mem.string_of(selector);

        if mclass == receiver_class {
            format!("\t{class_name} >> {selector_name} ({pc_offset:x})\r")
        } else {
            format!("\t{receiver_class_name}({class_name}) >> {selector_name} ({pc_offset:x})\r")
        }
    }

    /// Format and stash the walkback for the current frame chain.
    pub fn dump_walkback(&mut self, message: &str) {
        let mut body = String::from(" \r==========\r");
        let mut lines = 2;

        body.push_str(crate::VERSION);
        body.push('\r');
        lines += 1;

        if !message.is_empty() {
            body.push_str(message);
            body.push('\r');
            lines += 1;
        }

        if self.mem.current_context.is_null() || self.mem.current_context == self.mem.nil() {
            body.push_str("No current context\r");
            lines += 1;
            self.walkback_dump = format!("{lines}{body}");
            warn!("walkback: {message}");
            return;
        }

        let mut frame = self.mem.current_context;
        while self.mem.inst_var(frame, object::context::METHOD) != self.mem.nil() {
            body.push_str(&self.walkback_frame_line(frame));
            lines += 1;
            frame = self.mem.inst_var(frame, object::context::FRAME);
        }

        self.walkback_dump = format!("{lines}{body}");
        warn!("walkback: {message}");
    }
}
