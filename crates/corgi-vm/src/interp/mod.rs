// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The bytecode interpreter.
//!
//! Execution state is a chain of context objects in the stack space; the
//! interpreter itself holds a small cache of absolute addresses into the
//! current context (stack top, locals base, bytecode cursor) and keeps
//! the on-heap `stackOffset`/`pcOffset` small integers in lockstep with
//! every push, pop, and fetch, so a collection in the middle of a
//! bytecode always sees a consistent frame. The cache is recaptured
//! after every context switch and whenever the memory's collection
//! epoch moves.
//!
//! The evaluation stack doubles as the GC root set for temporaries:
//! any oop that must survive an allocation is pushed before and popped
//! after (`StackRoots` wraps the pattern for primitives).

#[cfg(test)]
mod block_test;
#[cfg(test)]
mod interp_test;

pub mod bytecode;
mod walkback;

use crate::error::VmError;
use crate::memory::ObjectMemory;
use crate::object::{self, HEADER_BYTES, special, well_known};
use crate::oop::Oop;
use crate::platform::Platform;
use crate::primitives::{self, PrimitiveFn};
use bytecode::{normalize, op};
use log::{info, trace, warn};

/// Bytes of stack headroom required before a call is allowed.
pub const STACK_THRESHOLD: u64 = 2048;

/// Mask of the top four bits of a sum; a carry into them means the
/// result left the immediate integer range.
pub(crate) const CARRY_MASK: i64 = 0xF000_0000_0000_0000_u64 as i64;

/// Roots frame for primitives: slots on the evaluation stack that the
/// scavenger can see. Create with [`Interpreter::push_roots`], address
/// by index, and release in reverse order of creation.
#[derive(Clone, Copy)]
pub struct StackRoots {
    base: u64,
    count: usize,
}

/// The VM interpreter: object memory, platform, primitive table, and
/// the fast-context cache.
pub struct Interpreter {
    /// The object memory under interpretation.
    pub mem: ObjectMemory,
    /// Host services.
    pub platform: Box<dyn Platform>,
    primitive_table: Vec<Option<PrimitiveFn>>,

    // Fast-context cache: absolute arena byte addresses.
    stack_top: u64,
    stack_offset_addr: u64,
    locals_base: u64,
    pc: u64,
    pc_offset_addr: u64,
    seen_epoch: u64,

    /// Returning into this frame suspends the interpreter.
    pub stop_frame: Oop,
    /// A halt was hit; the debugger collaborator takes over.
    pub breakpoint_hit: bool,
    /// The suspend primitive ran.
    pub suspended: bool,
    /// Checked between bytecodes; set by suspension, breakpoints,
    /// errors, and the byte budget.
    pub event_waiting: bool,
    /// The finish primitive ran; the embedder should exit.
    pub finish_requested: bool,
    /// Non-empty when a primitive wants the embedder's attention.
    pub error_string: String,
    /// Requested wakeup time of the suspend primitive.
    pub wakeup_time: i64,
    /// The last formatted walkback.
    pub walkback_dump: String,
    /// Dump every dispatch; slow, for low-level debugging.
    pub tracing: bool,
}

impl Interpreter {
    /// Wrap a populated memory and a platform.
    #[must_use]
    pub fn new(mem: ObjectMemory, platform: Box<dyn Platform>) -> Self {
        Self {
            mem,
            platform,
            primitive_table: primitives::build_table(),
            stack_top: 0,
            stack_offset_addr: 0,
            locals_base: 0,
            pc: 0,
            pc_offset_addr: 0,
            seen_epoch: 0,
            stop_frame: Oop::NULL,
            breakpoint_hit: false,
            suspended: false,
            event_waiting: false,
            finish_requested: false,
            error_string: String::new(),
            wakeup_time: 0,
            walkback_dump: String::new(),
            tracing: false,
        }
    }

    // ------------------------------------------------------------------
    // Fast context

    /// Recapture the cached addresses from the current context.
    pub fn capture_fast_context(&mut self) {
        let ctx = self.mem.current_context;
        if ctx.is_null() || ctx == self.mem.nil() {
            return;
        }

        let body = self.mem.body_pointer(ctx);
        self.stack_offset_addr = body + object::context::STACK_OFFSET * 8;
        let offset = self.mem.oop_at(self.stack_offset_addr).as_small_int() as u64;
        self.stack_top = body + (object::context::STACK_BODY + offset) * 8;

        let frame = self.mem.inst_var(ctx, object::context::FRAME);
        if frame != self.mem.nil() && !frame.is_null() {
            let frame_body = self.mem.body_pointer(frame);
            let frame_offset = self
                .mem
                .inst_var(frame, object::context::STACK_OFFSET)
                .as_small_int() as u64;
            self.locals_base = frame_body + (object::context::STACK_BODY + frame_offset) * 8;
        }

        let method = self.mem.inst_var(ctx, object::context::METHOD);
        if method != self.mem.nil() && !method.is_null() {
            self.pc_offset_addr = body + object::context::PC_OFFSET * 8;
            let pc_offset = self.mem.oop_at(self.pc_offset_addr).as_small_int() as u64;
            let bytecodes = self.mem.inst_var(method, object::method::BYTECODES);
            self.pc = self.mem.body_pointer(bytecodes) + pc_offset;
        }

        self.seen_epoch = self.mem.gc_epoch;
    }

    /// Recapture lazily after a collection moved method bodies.
    #[inline]
    fn sync(&mut self) {
        if self.seen_epoch != self.mem.gc_epoch {
            self.capture_fast_context();
        }
    }

    // ------------------------------------------------------------------
    // Operand stack

    /// Push on the operand stack, keeping the heap context in lockstep.
    pub fn push(&mut self, value: Oop) {
        let ctx = self.mem.current_context;
        self.mem.spaces[self.mem.current_stack_space].first_free_block += 1;
        let size = self.mem.mem_size(ctx);
        self.mem.set_mem_size(ctx, size + 8);
        self.mem.set_oop_at(self.stack_top, value);
        self.stack_top += 8;
        let offset_word = self.mem.word(self.stack_offset_addr);
        self.mem.set_word(self.stack_offset_addr, offset_word + 8);
    }

    /// Pop off the operand stack.
    pub fn pop(&mut self) -> Oop {
        let ctx = self.mem.current_context;
        self.mem.spaces[self.mem.current_stack_space].first_free_block -= 1;
        let size = self.mem.mem_size(ctx);
        self.mem.set_mem_size(ctx, size - 8);
        self.stack_top -= 8;
        let offset_word = self.mem.word(self.stack_offset_addr);
        self.mem.set_word(self.stack_offset_addr, offset_word - 8);
        self.mem.oop_at(self.stack_top)
    }

    /// The value on top of the operand stack.
    #[must_use]
    pub fn top(&self) -> Oop {
        self.mem.oop_at(self.stack_top - 8)
    }

    /// Locals window of the executing method: slot 0 is the receiver,
    /// then arguments, then temporaries.
    #[must_use]
    pub fn stack_at(&self, index: u64) -> Oop {
        self.mem.oop_at(self.locals_base + index * 8)
    }

    fn stack_at_put(&mut self, index: u64, value: Oop) {
        self.mem.set_oop_at(self.locals_base + index * 8, value);
    }

    /// The receiver of the executing method.
    #[must_use]
    pub fn receiver(&self) -> Oop {
        self.stack_at(0)
    }

    /// Argument or temporary `index` of the executing method.
    #[must_use]
    pub fn local(&self, index: u64) -> Oop {
        self.stack_at(1 + index)
    }

    fn set_local(&mut self, index: u64, value: Oop) {
        self.stack_at_put(1 + index, value);
    }

    /// Receiver of an arbitrary frame (for walkbacks).
    #[must_use]
    pub fn receiver_of_frame(&self, frame: Oop) -> Oop {
        let caller = self.mem.inst_var(frame, object::context::FRAME);
        if caller.is_null() || caller == self.mem.nil() {
            return self.mem.nil();
        }
        let offset = self
            .mem
            .inst_var(caller, object::context::STACK_OFFSET)
            .as_small_int() as u64;
        self.mem
            .inst_var(caller, object::context::STACK_BODY + offset)
    }

    // ------------------------------------------------------------------
    // Stack-rooted locals for primitives

    /// Reserve `count` rooted slots on the evaluation stack.
    pub fn push_roots(&mut self, count: usize) -> StackRoots {
        let base = self.stack_top;
        let nil = self.mem.nil();
        for _ in 0..count {
            self.push(nil);
        }
        StackRoots { base, count }
    }

    /// Read a rooted slot.
    #[must_use]
    pub fn root(&self, roots: StackRoots, index: usize) -> Oop {
        self.mem.oop_at(roots.base + index as u64 * 8)
    }

    /// Write a rooted slot.
    pub fn set_root(&mut self, roots: StackRoots, index: usize, value: Oop) {
        self.mem.set_oop_at(roots.base + index as u64 * 8, value);
    }

    /// Release a roots frame.
    pub fn pop_roots(&mut self, roots: StackRoots) {
        for _ in 0..roots.count {
            self.pop();
        }
    }

    // ------------------------------------------------------------------
    // Bytecode fetch

    fn next_bytecode(&mut self) -> u8 {
        let offset_word = self.mem.word(self.pc_offset_addr);
        self.mem.set_word(self.pc_offset_addr, offset_word + 8);
        let byte = self.mem.byte(self.pc);
        self.pc += 1;
        byte
    }

    fn next_u16(&mut self) -> u16 {
        u16::from(self.next_bytecode()) * 256 + u16::from(self.next_bytecode())
    }

    /// Relative jump in the bytecode stream.
    fn jump(&mut self, offset: i64) {
        let offset_word = self.mem.word(self.pc_offset_addr);
        self.mem
            .set_word(self.pc_offset_addr, offset_word.wrapping_add_signed(offset * 8));
        self.pc = self.pc.wrapping_add_signed(offset);
    }

    /// Literal `index` of a compiled method or block.
    #[must_use]
    pub fn literal(&self, method: Oop, index: u64) -> Oop {
        self.mem.inst_var(method, object::method::LITERALS + index)
    }

    fn current_method(&self) -> Oop {
        self.mem
            .inst_var(self.mem.current_context, object::context::METHOD)
    }

    // ------------------------------------------------------------------
    // Dispatch

    /// Locate `selector` in one class's method dictionary.
    #[must_use]
    pub fn find_compiled_method(&self, selector: Oop, class: Oop) -> Oop {
        let dictionary = self.mem.inst_var(class, object::behavior::METHOD_DICTIONARY);
        if dictionary == self.mem.nil() || dictionary.is_null() {
            return self.mem.nil();
        }
        self.mem.identity_dictionary_at(dictionary, selector)
    }

    // The polymorphic inline cache is a placeholder: lookup always
    // misses and registration drops the entry.

    fn pic_lookup(&self, _method: Oop, _pc: i64, _class: Oop) -> Oop {
        self.mem.nil()
    }

    fn pic_register(&mut self, _method: Oop, _pc: i64, _class: Oop, _found: Oop) {}

    fn out_of_stack(&self) -> Result<(), VmError> {
        let stack = &self.mem.spaces[self.mem.current_stack_space];
        let end = (stack.base + stack.size_words()) * 8;
        if self.stack_top + STACK_THRESHOLD > end {
            return Err(VmError::OutOfStackSpace);
        }
        Ok(())
    }

    /// Activate a compiled method: reserve temporaries, build the new
    /// context, and hand the receiver and arguments over as locals by
    /// rewinding the caller's stack offset.
    pub fn invoke(&mut self, method: Oop, num_args: u64) -> Result<(), VmError> {
        self.out_of_stack()?;

        let caller = self.mem.current_context;
        let caller_offset = self
            .mem
            .inst_var(caller, object::context::STACK_OFFSET)
            .as_small_int()
            - 1
            - num_args as i64;

        let temporaries = self
            .mem
            .inst_var(method, object::method::NUMBER_OF_TEMPORARIES)
            .as_small_int();
        let nil = self.mem.nil();
        for _ in 0..temporaries {
            self.push(nil);
        }

        let context_class = self.mem.known(well_known::CODE_CONTEXT_CLASS);
        let stack_space = self.mem.current_stack_space;
        let new_context = self.mem.new_instance_of(context_class, 0, stack_space)?;

        self.mem
            .basic_inst_var_put(new_context, object::context::FRAME, caller);
        self.mem.basic_inst_var_put(
            new_context,
            object::context::STACK_OFFSET,
            Oop::small_int(0),
        );
        self.mem
            .basic_inst_var_put(new_context, object::context::PC_OFFSET, Oop::small_int(0));
        self.mem
            .basic_inst_var_put(new_context, object::context::METHOD, method);
        self.mem
            .basic_inst_var_put(new_context, object::context::METHOD_CONTEXT, nil);
        self.mem.basic_inst_var_put(
            new_context,
            object::context::CONTEXT_ID,
            new_context.as_context_pointer(),
        );

        self.mem.current_context = new_context;
        self.mem.basic_inst_var_put(
            caller,
            object::context::STACK_OFFSET,
            Oop::small_int(caller_offset),
        );
        self.capture_fast_context();
        Ok(())
    }

    /// Activate a block closure: captured values first, then
    /// temporaries, then the context with the closure's home frame.
    pub fn invoke_block(&mut self, closure: Oop, num_args: u64) -> Result<(), VmError> {
        self.out_of_stack()?;

        let caller = self.mem.current_context;
        let caller_offset = self
            .mem
            .inst_var(caller, object::context::STACK_OFFSET)
            .as_small_int()
            - 1
            - num_args as i64;

        let copied_values = self.mem.inst_var(closure, object::closure::COPIED_VALUES);
        if copied_values != self.mem.nil() {
            let count = self.mem.indexed_object_size(copied_values);
            for i in 0..count {
                let value = self.mem.inst_var(copied_values, i);
                self.push(value);
            }
        }

        let method = self.mem.inst_var(closure, object::closure::METHOD);
        let temporaries = self
            .mem
            .inst_var(method, object::method::NUMBER_OF_TEMPORARIES)
            .as_small_int();
        let nil = self.mem.nil();
        for _ in 0..temporaries {
            self.push(nil);
        }

        let context_class = self.mem.known(well_known::CODE_CONTEXT_CLASS);
        let stack_space = self.mem.current_stack_space;
        let new_context = self.mem.new_instance_of(context_class, 0, stack_space)?;

        self.mem
            .basic_inst_var_put(new_context, object::context::FRAME, caller);
        self.mem.basic_inst_var_put(
            new_context,
            object::context::STACK_OFFSET,
            Oop::small_int(0),
        );
        self.mem
            .basic_inst_var_put(new_context, object::context::PC_OFFSET, Oop::small_int(0));
        self.mem
            .basic_inst_var_put(new_context, object::context::METHOD, method);
        self.mem.basic_inst_var_put(
            new_context,
            object::context::CONTEXT_ID,
            new_context.as_context_pointer(),
        );

        let home = self.mem.inst_var(closure, object::closure::METHOD_CONTEXT);
        self.mem
            .basic_inst_var_put(new_context, object::context::METHOD_CONTEXT, home);

        self.mem.current_context = new_context;
        self.mem.basic_inst_var_put(
            caller,
            object::context::STACK_OFFSET,
            Oop::small_int(caller_offset),
        );
        self.capture_fast_context();
        Ok(())
    }

    /// Pop the return value, drop the current frame, truncate the stack
    /// space, and push the value in the caller. Answers false when the
    /// stop frame was reached.
    fn return_from_context(&mut self) -> bool {
        let return_value = self.pop();

        let dying = self.mem.current_context;
        let caller = self.mem.inst_var(dying, object::context::FRAME);
        // Neuter the dying frame's self-reference so a non-local return
        // through a stale home pointer can recognize the corpse.
        self.mem
            .basic_inst_var_put(dying, object::context::CONTEXT_ID, Oop::small_int(0));
        self.mem.current_context = caller;

        let stack_space = self.mem.current_stack_space;
        let base = self.mem.spaces[stack_space].base * 8;
        self.mem.spaces[stack_space].last_free_block = (caller.bits() - base) / 8 - 1;

        let caller_body = self.mem.body_pointer(caller);
        let caller_offset = self
            .mem
            .inst_var(caller, object::context::STACK_OFFSET)
            .as_small_int() as u64;
        let caller_top = caller_body + (object::context::STACK_BODY + caller_offset) * 8;
        self.mem.spaces[stack_space].first_free_block = (caller_top - base) / 8;

        self.mem.set_mem_size(
            caller,
            HEADER_BYTES + (object::context::STACK_BODY + caller_offset) * 8,
        );
        self.capture_fast_context();
        self.push(return_value);

        if self.tracing {
            trace!("return from context");
        }

        if self.mem.current_context == self.stop_frame {
            self.event_waiting = true;
            false
        } else {
            true
        }
    }

    /// Send `selector` to the receiver sitting below `num_args`
    /// arguments: walk the class chain, then activate the found method.
    /// An unresolved selector raises `MessageNotUnderstood` in the
    /// image.
    pub fn dispatch(&mut self, selector: Oop, num_args: u64) -> Result<(), VmError> {
        let ctx = self.mem.current_context;
        let offset = self
            .mem
            .inst_var(ctx, object::context::STACK_OFFSET)
            .as_small_int() as u64;
        let receiver = self
            .mem
            .inst_var(ctx, object::context::STACK_BODY + offset - 1 - num_args);

        let receiver_class = self.mem.class_of(receiver);
        let mut class = receiver_class;

        let current_pc = self
            .mem
            .inst_var(ctx, object::context::PC_OFFSET)
            .as_small_int();
        let pic_found = self.pic_lookup(self.current_method(), current_pc, class);

        let mut method = pic_found;
        if pic_found == self.mem.nil() || pic_found == self.mem.true_oop() {
            loop {
                method = self.find_compiled_method(selector, class);
                if method != self.mem.nil() {
                    break;
                }
                let superclass = self.mem.inst_var(class, object::behavior::SUPERCLASS);
                if superclass == self.mem.nil() {
                    return self.message_not_understood(receiver, selector);
                }
                class = superclass;
            }
            if pic_found == self.mem.nil() {
                self.pic_register(self.current_method(), current_pc, receiver_class, method);
            }
        }

        if self.tracing {
            trace!("dispatch {}", self.mem.string_of(selector));
        }

        self.invoke(method, num_args)
    }

    /// Super-send: identical to `dispatch`, but the lookup starts at the
    /// superclass of the class popped off the operand stack.
    pub fn dispatch_super(&mut self, selector: Oop, num_args: u64) -> Result<(), VmError> {
        let ctx = self.mem.current_context;
        let offset = self
            .mem
            .inst_var(ctx, object::context::STACK_OFFSET)
            .as_small_int() as u64;
        let receiver = self
            .mem
            .inst_var(ctx, object::context::STACK_BODY + offset - 2 - num_args);

        let start = self.pop();
        let mut class = self.mem.inst_var(start, object::behavior::SUPERCLASS);

        let mut method;
        loop {
            method = self.find_compiled_method(selector, class);
            if method != self.mem.nil() {
                break;
            }
            let superclass = self.mem.inst_var(class, object::behavior::SUPERCLASS);
            if superclass == self.mem.nil() {
                return self.message_not_understood(receiver, selector);
            }
            class = superclass;
        }

        if self.tracing {
            trace!("dispatch super {}", self.mem.string_of(selector));
        }

        self.invoke(method, num_args)
    }

    fn message_not_understood(&mut self, receiver: Oop, selector: Oop) -> Result<(), VmError> {
        let selector_name = self.mem.string_of(selector);
        let class_name = self.class_name_of(self.mem.class_of(receiver));

        warn!("{class_name} does not understand \"{selector_name}\"");
        self.error_string = format!("{class_name} does not understand \"{selector_name}\"");

        let message = self.error_string.clone();
        self.dump_walkback(&message);

        let mnu_class = self.mem.known(well_known::MESSAGE_NOT_UNDERSTOOD_CLASS);
        let walkback = self.walkback_dump.clone();
        self.raise_error(mnu_class, &walkback)?;
        self.error_string.clear();
        Ok(())
    }

    /// Raise a Smalltalk exception: build the instance, stash the
    /// message text, and send `raiseSignal` through the special-selector
    /// path so image-level handlers take over.
    pub fn raise_error(&mut self, error_class: Oop, message: &str) -> Result<(), VmError> {
        self.push(error_class);
        let st_message = crate::image::bootstrap::new_string(&mut self.mem, message)?;
        self.sync();
        let recovered_class = self.pop();

        self.push(st_message);
        let exception = self
            .mem
            .new_instance_of(recovered_class, 0, crate::memory::space_index::EDEN)?;
        self.sync();
        let recovered_message = self.pop();

        self.mem
            .inst_var_put(exception, object::exception::MESSAGE, recovered_message);
        self.push(exception);
        self.dispatch_special0(special::RAISE_SIGNAL, exception)
    }

    // ------------------------------------------------------------------
    // Special selectors

    fn special_selector(&self, number: u8) -> (Oop, u64) {
        let system_class = self.mem.known(well_known::SYSTEM_CLASS);
        let table = self
            .mem
            .inst_var(system_class, object::system_class::SPECIAL_SELECTORS);
        let selector = self.mem.inst_var(table, u64::from(number) * 2);
        let args = self
            .mem
            .inst_var(table, u64::from(number) * 2 + 1)
            .as_small_int() as u64;
        (selector, args)
    }

    pub(crate) fn dispatch_special0(&mut self, number: u8, receiver: Oop) -> Result<(), VmError> {
        self.push(receiver);
        let (selector, args) = self.special_selector(number);
        self.dispatch(selector, args)
    }

    pub(crate) fn dispatch_special1(
        &mut self,
        number: u8,
        receiver: Oop,
        arg: Oop,
    ) -> Result<(), VmError> {
        self.push(receiver);
        self.push(arg);
        let (selector, args) = self.special_selector(number);
        self.dispatch(selector, args)
    }

    /// Immediate sum/difference, promoted to a large integer when the
    /// top four bits carry.
    fn sum_to_oop(&mut self, result: i64) -> Result<Oop, VmError> {
        let carry = result & CARRY_MASK;
        if carry == 0 || carry == CARRY_MASK {
            Ok(Oop::small_int(result))
        } else {
            primitives::integer::as_sum_large_integer(self, result)
        }
    }

    fn well_known_compare(
        &mut self,
        number: u8,
        int_op: fn(i64, i64) -> bool,
        float_op: fn(f64, f64) -> bool,
    ) -> Result<(), VmError> {
        let arg = self.pop();
        let receiver = self.pop();
        if receiver.is_small_int() && arg.is_small_int() {
            let result = int_op(receiver.as_small_int(), arg.as_small_int());
            let boolean = if result {
                self.mem.true_oop()
            } else {
                self.mem.false_oop()
            };
            self.push(boolean);
            Ok(())
        } else if receiver.is_float() && arg.is_float() {
            let result = float_op(receiver.as_float(), arg.as_float());
            let boolean = if result {
                self.mem.true_oop()
            } else {
                self.mem.false_oop()
            };
            self.push(boolean);
            Ok(())
        } else {
            self.dispatch_special1(number, receiver, arg)
        }
    }

    /// The special-selector opcode: 21 selectors the interpreter inlines
    /// with immediate fast paths, falling back to a full send.
    #[allow(clippy::too_many_lines)]
    fn call_well_known(&mut self) -> Result<(), VmError> {
        let number = self.next_bytecode();
        match number {
            special::PLUS => {
                let arg = self.pop();
                let receiver = self.pop();
                if receiver.is_small_int() && arg.is_small_int() {
                    let sum = receiver.as_small_int() + arg.as_small_int();
                    let result = self.sum_to_oop(sum)?;
                    self.sync();
                    self.push(result);
                } else if receiver.is_float() && arg.is_float() {
                    let result = Oop::float(receiver.as_float() + arg.as_float());
                    self.push(result);
                } else {
                    self.dispatch_special1(special::PLUS, receiver, arg)?;
                }
            }

            special::MINUS => {
                let arg = self.pop();
                let receiver = self.pop();
                if receiver.is_small_int() && arg.is_small_int() {
                    let difference = receiver.as_small_int() - arg.as_small_int();
                    let result = self.sum_to_oop(difference)?;
                    self.sync();
                    self.push(result);
                } else if receiver.is_float() && arg.is_float() {
                    let result = Oop::float(receiver.as_float() - arg.as_float());
                    self.push(result);
                } else {
                    self.dispatch_special1(special::MINUS, receiver, arg)?;
                }
            }

            special::TIMES => {
                let arg = self.pop();
                let receiver = self.pop();
                if receiver.is_small_int() && arg.is_small_int() {
                    let x = receiver.as_small_int();
                    let y = arg.as_small_int();
                    if x.abs() < 0x4000_0000 && y.abs() < 0x4000_0000 {
                        self.push(Oop::small_int(x * y));
                    } else {
                        // Promote both operands and let the image's
                        // large-integer code take it.
                        let roots = self.push_roots(2);
                        let wide = primitives::integer::small_to_large_integer(self, receiver)?;
                        self.set_root(roots, 0, wide);
                        let wide = primitives::integer::small_to_large_integer(self, arg)?;
                        self.set_root(roots, 1, wide);
                        let wide_receiver = self.root(roots, 0);
                        let wide_arg = self.root(roots, 1);
                        self.pop_roots(roots);
                        self.dispatch_special1(special::TIMES, wide_receiver, wide_arg)?;
                    }
                } else if receiver.is_float() && arg.is_float() {
                    let result = Oop::float(receiver.as_float() * arg.as_float());
                    self.push(result);
                } else {
                    self.dispatch_special1(special::TIMES, receiver, arg)?;
                }
            }

            special::NOT => {
                let receiver = self.pop();
                if receiver == self.mem.true_oop() {
                    let value = self.mem.false_oop();
                    self.push(value);
                } else if receiver == self.mem.false_oop() {
                    let value = self.mem.true_oop();
                    self.push(value);
                } else {
                    self.dispatch_special0(special::NOT, receiver)?;
                }
            }

            special::IDENTICAL => {
                let arg = self.pop();
                let receiver = self.pop();
                let value = if arg == receiver {
                    self.mem.true_oop()
                } else {
                    self.mem.false_oop()
                };
                self.push(value);
            }

            special::NOT_IDENTICAL => {
                let arg = self.pop();
                let receiver = self.pop();
                let value = if arg == receiver {
                    self.mem.false_oop()
                } else {
                    self.mem.true_oop()
                };
                self.push(value);
            }

            special::EQUALS => {
                self.well_known_compare(special::EQUALS, |a, b| a == b, |a, b| a == b)?;
            }

            special::NOT_EQUALS => {
                self.well_known_compare(special::NOT_EQUALS, |a, b| a != b, |a, b| a != b)?;
            }

            special::IS_NIL => {
                let receiver = self.pop();
                let value = if receiver == self.mem.nil() {
                    self.mem.true_oop()
                } else {
                    self.mem.false_oop()
                };
                self.push(value);
            }

            special::NOT_NIL => {
                let receiver = self.pop();
                let value = if receiver == self.mem.nil() {
                    self.mem.false_oop()
                } else {
                    self.mem.true_oop()
                };
                self.push(value);
            }

            special::GREATER_THAN => {
                self.well_known_compare(special::GREATER_THAN, |a, b| a > b, |a, b| a > b)?;
            }

            special::LESS_THAN => {
                self.well_known_compare(special::LESS_THAN, |a, b| a < b, |a, b| a < b)?;
            }

            special::GREATER_THAN_OR_EQUAL => {
                self.well_known_compare(
                    special::GREATER_THAN_OR_EQUAL,
                    |a, b| a >= b,
                    |a, b| a >= b,
                )?;
            }

            special::LESS_THAN_OR_EQUAL => {
                self.well_known_compare(
                    special::LESS_THAN_OR_EQUAL,
                    |a, b| a <= b,
                    |a, b| a <= b,
                )?;
            }

            special::EVALUATE | special::DEBUGIT | special::EVALUATE_JSON => {
                let arg = self.pop();
                let receiver = self.pop();
                self.dispatch_special1(number, receiver, arg)?;
            }

            special::PRINT_STRING | special::RAISE_SIGNAL => {
                let receiver = self.pop();
                self.dispatch_special0(number, receiver)?;
            }

            special::PERFORM_WITH_ARGUMENTS => {
                let args = self.pop();
                let selector = self.pop();
                let receiver = self.pop();

                let arg_count = selector_argument_count(&self.mem, selector);
                let supplied = self.mem.indexed_object_size(args);
                if arg_count != supplied {
                    warn!(
                        "perform:withArguments: called with {supplied} arguments when it expected {arg_count}"
                    );
                } else {
                    self.push(receiver);
                    for i in 0..supplied {
                        let value = self.mem.inst_var(args, i);
                        self.push(value);
                    }
                    self.dispatch(selector, supplied)?;
                }
            }

            special::HALT => {
                self.breakpoint_hit = true;
                self.event_waiting = true;
            }

            _ => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Context reification

    /// Deep-copy the live frame chain (`thisContext`). Copies carry
    /// their ids retagged as plain small integers, so the scavenger
    /// treats them as inert data rather than live stack.
    pub fn context_copy(&mut self, context: Oop) -> Result<Oop, VmError> {
        const PARENT: usize = 0;
        const OLD_FRAME: usize = 1;
        const TOP_FRAME: usize = 2;

        let nil = self.mem.nil();
        let context_class = self.mem.known(well_known::CODE_CONTEXT_CLASS);
        let roots = self.push_roots(3);
        self.set_root(roots, PARENT, nil);
        self.set_root(roots, OLD_FRAME, context);

        loop {
            let old_frame = self.root(roots, OLD_FRAME);
            if self.mem.inst_var(old_frame, object::context::METHOD) == nil {
                break;
            }

            let depth = self.mem.indexed_object_size(old_frame);
            let new_frame = self
                .mem
                .new_instance_of(context_class, depth, crate::memory::space_index::EDEN)?;
            self.sync();
            let old_frame = self.root(roots, OLD_FRAME);

            for field in [
                object::context::STACK_OFFSET,
                object::context::PC_OFFSET,
                object::context::METHOD,
                object::context::METHOD_CONTEXT,
            ] {
                let value = self.mem.inst_var(old_frame, field);
                self.mem.inst_var_put(new_frame, field, value);
            }
            let old_id = self.mem.inst_var(old_frame, object::context::CONTEXT_ID);
            self.mem.inst_var_put(
                new_frame,
                object::context::CONTEXT_ID,
                old_id.strip_tags().as_tagged_small_int(),
            );
            self.mem
                .inst_var_put(new_frame, object::context::FRAME, nil);

            for i in 0..depth {
                let value = self.mem.inst_var(old_frame, object::context::STACK_BODY + i);
                self.mem
                    .inst_var_put(new_frame, object::context::STACK_BODY + i, value);
            }

            let parent = self.root(roots, PARENT);
            if parent == nil {
                self.set_root(roots, TOP_FRAME, new_frame);
            } else {
                self.mem
                    .inst_var_put(parent, object::context::FRAME, new_frame);
            }

            self.set_root(roots, PARENT, new_frame);
            let next = self.mem.inst_var(old_frame, object::context::FRAME);
            self.set_root(roots, OLD_FRAME, next);
        }

        let top = self.root(roots, TOP_FRAME);
        self.pop_roots(roots);
        Ok(top)
    }

    // ------------------------------------------------------------------
    // Primitive invocation

    /// Call primitive `number`; an unassigned slot records the event and
    /// returns control to the embedder.
    pub fn invoke_primitive(&mut self, number: u16) -> Result<(), VmError> {
        match self.primitive_table.get(number as usize).copied().flatten() {
            None => {
                warn!("primitive not found - {number}");
                self.error_string = format!("Primitive not found - {number:x}");
                self.event_waiting = true;
                Ok(())
            }
            Some(primitive) => primitive(self),
        }
    }

    // ------------------------------------------------------------------
    // The dispatch loop

    /// Create the bottom context and root the interpreter state on it.
    pub fn setup_interpreter(&mut self) -> Result<(), VmError> {
        let context_class = self.mem.known(well_known::CODE_CONTEXT_CLASS);
        let stack_space = self.mem.current_stack_space;
        let context = self.mem.new_instance_of(context_class, 0, stack_space)?;

        self.stop_frame = self.mem.nil();

        let nil = self.mem.nil();
        self.mem
            .basic_inst_var_put(context, object::context::FRAME, nil);
        self.mem
            .basic_inst_var_put(context, object::context::STACK_OFFSET, Oop::small_int(0));
        self.mem
            .basic_inst_var_put(context, object::context::PC_OFFSET, Oop::small_int(0));
        self.mem
            .basic_inst_var_put(context, object::context::METHOD, nil);
        self.mem
            .basic_inst_var_put(context, object::context::METHOD_CONTEXT, nil);
        self.mem.basic_inst_var_put(
            context,
            object::context::CONTEXT_ID,
            context.as_context_pointer(),
        );

        self.mem.current_context = context;
        self.error_string.clear();
        self.capture_fast_context();
        self.mem.scavenge()?;
        self.sync();
        self.mem.audit_image()?;
        Ok(())
    }

    /// Send the start selector to the start object.
    pub fn launch(&mut self) -> Result<(), VmError> {
        {
            let stack = &mut self.mem.spaces[self.mem.current_stack_space];
            stack.last_free_block = stack.size_words() - 1;
        }
        self.setup_interpreter()?;

        let start_object = self.mem.known(well_known::START_OBJECT);
        let start_selector = self.mem.known(well_known::START_SELECTOR);
        self.push(start_object);
        self.dispatch(start_selector, 0)
    }

    /// Run until the image exits or suspends.
    pub fn interpret(&mut self) -> Result<(), VmError> {
        self.suspended = false;
        self.basic_interpret(0)
    }

    /// The dispatch loop. With `max_bytecodes` of zero, runs until the
    /// image exits, suspends, hits a breakpoint, or raises an embedder
    /// event; with a positive budget, additionally returns after that
    /// many bytecodes (the debugger's single-step).
    #[allow(clippy::too_many_lines)]
    pub fn basic_interpret(&mut self, max_bytecodes: u64) -> Result<(), VmError> {
        let mut count = 0u64;
        self.suspended = false;
        self.breakpoint_hit = false;
        self.error_string.clear();
        self.event_waiting = max_bytecodes > 0;

        loop {
            self.sync();

            if self.current_method() == self.mem.nil() {
                trace!("interpreter exited");
                return Ok(());
            }

            let raw = self.next_bytecode();
            let bytecode = normalize(raw);

            match bytecode {
                // Push named instance variable 0-15.
                0x00..=0x0F => {
                    let value = self.mem.inst_var(self.receiver(), u64::from(bytecode));
                    self.push(value);
                }

                // Store named instance variable 0-15 in place.
                0x10..=0x1F => {
                    let value = self.top();
                    let receiver = self.receiver();
                    self.store_inst_var(receiver, u64::from(bytecode & 0x0F), value)?;
                }

                // Push local 1-16.
                0x20..=0x2F => {
                    let value = self.local(u64::from(bytecode & 0x0F));
                    self.push(value);
                }

                // Store local 1-16 in place.
                0x30..=0x3F => {
                    let value = self.top();
                    self.set_local(u64::from(bytecode & 0x0F), value);
                }

                // Push global (association value at literal 0-15).
                0x40..=0x4F => {
                    let association =
                        self.literal(self.current_method(), u64::from(bytecode & 0x0F));
                    let value = self.mem.inst_var(association, object::association::VALUE);
                    self.push(value);
                }

                // Store global in place.
                0x50..=0x5F => {
                    let association =
                        self.literal(self.current_method(), u64::from(bytecode & 0x0F));
                    let value = self.top();
                    self.mem
                        .inst_var_put(association, object::association::VALUE, value);
                }

                // Push small integers 1..16 and 0..-15.
                0x60..=0x6F => self.push(Oop::small_int(i64::from(bytecode & 0x0F) + 1)),
                0x70..=0x7F => self.push(Oop::small_int(-i64::from(bytecode & 0x0F))),

                // Push literal 0-15.
                0x80..=0x8F => {
                    let value = self.literal(self.current_method(), u64::from(bytecode & 0x0F));
                    self.push(value);
                }

                op::PUSH_TRUE => {
                    let value = self.mem.true_oop();
                    self.push(value);
                }
                op::PUSH_FALSE => {
                    let value = self.mem.false_oop();
                    self.push(value);
                }
                op::PUSH_NIL => {
                    let value = self.mem.nil();
                    self.push(value);
                }
                op::PUSH_SELF => {
                    let value = self.receiver();
                    self.push(value);
                }

                op::PUSH_INST_VAR_EXT1 => {
                    let index = u64::from(self.next_bytecode());
                    let value = self.mem.inst_var(self.receiver(), index);
                    self.push(value);
                }
                op::PUSH_INST_VAR_EXT2 => {
                    let index = u64::from(self.next_u16());
                    let value = self.mem.inst_var(self.receiver(), index);
                    self.push(value);
                }

                op::PUSH_LOCAL_EXT1 => {
                    let index = u64::from(self.next_bytecode());
                    let value = self.local(index);
                    self.push(value);
                }
                op::PUSH_LOCAL_EXT2 => {
                    let index = u64::from(self.next_u16());
                    let value = self.local(index);
                    self.push(value);
                }

                op::PUSH_LOCAL_INDIRECT | op::PUSH_SELF_INDIRECT => {
                    let local = u64::from(self.next_bytecode());
                    let var = u64::from(self.next_bytecode());
                    let captured = self.local(local);
                    let value = self.mem.inst_var(captured, var);
                    self.push(value);
                }
                op::PUSH_LOCAL_INDIRECT_EXT | op::PUSH_SELF_INDIRECT_EXT => {
                    let local = u64::from(self.next_u16());
                    let var = u64::from(self.next_u16());
                    let captured = self.local(local);
                    let value = self.mem.inst_var(captured, var);
                    self.push(value);
                }

                op::PUSH_GLOBAL_EXT1 => {
                    let index = u64::from(self.next_bytecode());
                    let association = self.literal(self.current_method(), index);
                    let value = self.mem.inst_var(association, object::association::VALUE);
                    self.push(value);
                }
                op::PUSH_GLOBAL_EXT2 => {
                    let index = u64::from(self.next_u16());
                    let association = self.literal(self.current_method(), index);
                    let value = self.mem.inst_var(association, object::association::VALUE);
                    self.push(value);
                }

                op::PUSH_LITERAL_EXT1 => {
                    let index = u64::from(self.next_bytecode());
                    let value = self.literal(self.current_method(), index);
                    self.push(value);
                }
                op::PUSH_LITERAL_EXT2 => {
                    let index = u64::from(self.next_u16());
                    let value = self.literal(self.current_method(), index);
                    self.push(value);
                }

                op::PUSH_INT8 => {
                    let value = self.next_bytecode() as i8;
                    self.push(Oop::small_int(i64::from(value)));
                }
                op::PUSH_INT16 => {
                    let value = self.next_u16() as i16;
                    self.push(Oop::small_int(i64::from(value)));
                }
                op::PUSH_INT32 => {
                    let value = (u32::from(self.next_u16()) << 16) | u32::from(self.next_u16());
                    self.push(Oop::small_int(i64::from(value as i32)));
                }

                op::PUSH_COPYING_BLOCK => self.push_block(false)?,
                op::PUSH_FULL_BLOCK => self.push_block(true)?,

                op::STORE_INST_VAR_EXT1 => {
                    let index = u64::from(self.next_bytecode());
                    let value = self.top();
                    let receiver = self.receiver();
                    self.store_inst_var(receiver, index, value)?;
                }
                op::STORE_INST_VAR_EXT2 => {
                    let index = u64::from(self.next_u16());
                    let value = self.top();
                    let receiver = self.receiver();
                    self.store_inst_var(receiver, index, value)?;
                }

                op::STORE_LOCAL_EXT1 => {
                    let index = u64::from(self.next_bytecode());
                    let value = self.top();
                    self.set_local(index, value);
                }
                op::STORE_LOCAL_EXT2 => {
                    let index = u64::from(self.next_u16());
                    let value = self.top();
                    self.set_local(index, value);
                }

                op::STORE_LOCAL_INDIRECT | op::STORE_SELF_INDIRECT => {
                    let local = u64::from(self.next_bytecode());
                    let var = u64::from(self.next_bytecode());
                    let captured = self.local(local);
                    if captured.is_immediate() {
                        self.dump_walkback("Indirect store into immediate object");
                        return Err(VmError::IndirectStoreIntoImmediate);
                    }
                    if self.mem.total_object_size(captured) < var {
                        self.dump_walkback("Indirect store out of bounds");
                        return Err(VmError::IndirectStoreOutOfBounds);
                    }
                    let value = self.top();
                    self.mem.inst_var_put(captured, var, value);
                }
                op::STORE_LOCAL_INDIRECT_EXT | op::STORE_SELF_INDIRECT_EXT => {
                    let local = u64::from(self.next_u16());
                    let var = u64::from(self.next_u16());
                    let captured = self.local(local);
                    let value = self.top();
                    self.mem.inst_var_put(captured, var, value);
                }

                op::STORE_GLOBAL_EXT1 => {
                    let index = u64::from(self.next_bytecode());
                    let association = self.literal(self.current_method(), index);
                    let value = self.top();
                    self.mem
                        .inst_var_put(association, object::association::VALUE, value);
                }
                op::STORE_GLOBAL_EXT2 => {
                    let index = u64::from(self.next_u16());
                    let association = self.literal(self.current_method(), index);
                    let value = self.top();
                    self.mem
                        .inst_var_put(association, object::association::VALUE, value);
                }

                op::STORE_NEW_ARRAY => {
                    let count = u64::from(self.next_bytecode());
                    let local = u64::from(self.next_bytecode());
                    let array_class = self.mem.known(well_known::ARRAY_CLASS);
                    let array = self.mem.new_instance_of(
                        array_class,
                        count,
                        crate::memory::space_index::EDEN,
                    )?;
                    self.sync();
                    self.set_local(local, array);
                }

                op::POP => {
                    self.pop();
                }
                op::DUP => {
                    let value = self.top();
                    self.push(value);
                }
                op::DROP_CASCADE_RECEIVER => {
                    let value = self.pop();
                    self.pop();
                    self.push(value);
                }

                op::JUMP => {
                    let offset = self.next_bytecode() as i8;
                    self.jump(i64::from(offset));
                }
                op::JUMP_EXT => {
                    let offset = self.next_u16() as i16;
                    self.jump(i64::from(offset));
                }
                op::JUMP_IF_TRUE => {
                    let offset = self.next_bytecode() as i8;
                    if self.pop() == self.mem.true_oop() {
                        self.jump(i64::from(offset));
                    }
                }
                op::JUMP_IF_TRUE_EXT => {
                    let offset = self.next_u16() as i16;
                    if self.pop() == self.mem.true_oop() {
                        self.jump(i64::from(offset));
                    }
                }
                op::JUMP_IF_FALSE => {
                    let offset = self.next_bytecode() as i8;
                    if self.pop() == self.mem.false_oop() {
                        self.jump(i64::from(offset));
                    }
                }
                op::JUMP_IF_FALSE_EXT => {
                    let offset = self.next_u16() as i16;
                    if self.pop() == self.mem.false_oop() {
                        self.jump(i64::from(offset));
                    }
                }

                op::THIS_CONTEXT => {
                    let copy = self.context_copy(self.mem.current_context)?;
                    self.sync();
                    self.push(copy);
                }

                // Send literal 0-15.
                0xC0..=0xCF => {
                    let num_args = u64::from(self.next_bytecode());
                    let selector =
                        self.literal(self.current_method(), u64::from(bytecode & 0x0F));
                    self.dispatch(selector, num_args)?;
                }

                // Super-send literal 0-5.
                0xD0..=0xD5 => {
                    let num_args = u64::from(self.next_bytecode());
                    let selector =
                        self.literal(self.current_method(), u64::from(bytecode & 0x0F));
                    self.dispatch_super(selector, num_args)?;
                }

                op::CALL_WELL_KNOWN => self.call_well_known()?,

                op::SEND_EXT1 => {
                    let index = u64::from(self.next_bytecode());
                    let num_args = u64::from(self.next_bytecode());
                    let selector = self.literal(self.current_method(), index);
                    self.dispatch(selector, num_args)?;
                }
                op::SEND_EXT2 => {
                    let index = u64::from(self.next_u16());
                    let num_args = u64::from(self.next_bytecode());
                    let selector = self.literal(self.current_method(), index);
                    self.dispatch(selector, num_args)?;
                }

                op::SUPER_SEND_EXT1 => {
                    let index = u64::from(self.next_bytecode());
                    let num_args = u64::from(self.next_bytecode());
                    let selector = self.literal(self.current_method(), index);
                    self.dispatch_super(selector, num_args)?;
                }
                op::SUPER_SEND_EXT2 => {
                    let index = u64::from(self.next_u16());
                    let num_args = u64::from(self.next_bytecode());
                    let selector = self.literal(self.current_method(), index);
                    self.dispatch_super(selector, num_args)?;
                }

                op::PRIMITIVE_CALL => {
                    let number = self.next_u16();
                    self.invoke_primitive(number)?;
                }

                op::RETURN | op::BLOCK_RETURN => {
                    if !self.return_from_context() {
                        return Ok(());
                    }
                }

                op::NON_LOCAL_RETURN => {
                    let return_value = self.pop();
                    let closure = self.receiver();
                    let home = self
                        .mem
                        .inst_var(closure, object::closure::METHOD_CONTEXT)
                        .strip_tags();

                    // The home frame may already have returned; its
                    // header would then sit outside the live stack
                    // region or carry a reused context id.
                    let home_alive = self.mem.is_in_stack_space(home)
                        && self.mem.inst_var(home, object::context::CONTEXT_ID)
                            == home.as_context_pointer();
                    if home_alive {
                        self.mem.current_context = home;
                        self.push(return_value);
                        if !self.return_from_context() {
                            return Ok(());
                        }
                    } else {
                        let error_class = self.mem.known(well_known::ERROR_CLASS);
                        self.raise_error(error_class, "Block context expired")?;
                    }
                }

                op::PRIMITIVE_RETURN => {
                    let value = self.pop();
                    let rcode = self.pop();
                    if rcode == Oop::small_int(0) {
                        self.push(value);
                        if !self.return_from_context() {
                            return Ok(());
                        }
                    } else {
                        // Leave the failure code for the fallback
                        // bytecodes that follow.
                        self.push(rcode);
                    }
                }

                _ => {
                    warn!("bad bytecode: {bytecode:#04x}");
                    return Err(VmError::BadBytecode(bytecode));
                }
            }

            if self.mem.current_context == self.stop_frame {
                return Ok(());
            }

            if self.event_waiting {
                if self.breakpoint_hit {
                    info!("breakpoint hit");
                    return Ok(());
                }
                if max_bytecodes > 0 {
                    count += 1;
                    if count == max_bytecodes {
                        return Ok(());
                    }
                }
                if self.suspended || self.finish_requested {
                    return Ok(());
                }
                if !self.error_string.is_empty() {
                    return Ok(());
                }
                self.event_waiting = max_bytecodes > 0;
            }
        }
    }

    /// Bounds-checked instance-variable store; violations raise the
    /// image-level index error.
    pub fn store_inst_var(
        &mut self,
        object: Oop,
        index: u64,
        value: Oop,
    ) -> Result<(), VmError> {
        if index >= self.mem.total_object_size(object) {
            let error_class = self.mem.known(well_known::ERROR_CLASS);
            return self.raise_error(error_class, "Index out of bounds");
        }
        self.mem.inst_var_put(object, index, value);
        Ok(())
    }

    /// Build a block closure: literal compiled block plus captured
    /// values popped off the stack; full blocks also capture the home
    /// context for non-local return.
    fn push_block(&mut self, full: bool) -> Result<(), VmError> {
        let literal_number = u64::from(self.next_bytecode());
        let copied_count = u64::from(self.next_bytecode());

        let closure_class = self.mem.known(well_known::BLOCK_CLOSURE_CLASS);
        let closure = self.mem.new_instance_of(
            closure_class,
            0,
            crate::memory::space_index::EDEN,
        )?;
        self.sync();

        let compiled_block = self.literal(self.current_method(), literal_number);
        self.mem
            .inst_var_put(closure, object::closure::METHOD, compiled_block);

        if full {
            let ctx = self.mem.current_context;
            let home = self.mem.inst_var(ctx, object::context::METHOD_CONTEXT);
            let captured_home = if home.strip_tags() == self.mem.nil() {
                ctx.as_context_pointer()
            } else {
                home
            };
            self.mem
                .inst_var_put(closure, object::closure::METHOD_CONTEXT, captured_home);
        }

        self.push(closure);
        let array_class = self.mem.known(well_known::ARRAY_CLASS);
        let array = self.mem.new_instance_of(
            array_class,
            copied_count,
            crate::memory::space_index::EDEN,
        )?;
        self.sync();
        let closure = self.pop();

        self.mem
            .inst_var_put(closure, object::closure::COPIED_VALUES, array);

        for i in (1..=copied_count).rev() {
            let value = self.pop();
            let named = self.mem.named_inst_vars(array);
            self.mem.inst_var_put(array, named + i - 1, value);
        }

        self.push(closure);
        Ok(())
    }
}

/// Argument count implied by a selector's spelling: one per colon, or
/// one for a binary selector.
fn selector_argument_count(mem: &ObjectMemory, selector: Oop) -> u64 {
    let bytes = mem.bytes_of(selector);
    let mut count = bytes.iter().filter(|&&b| b == b':').count() as u64;
    if let Some(&first) = bytes.first() {
        if !first.is_ascii_alphanumeric() {
            count += 1;
        }
    }
    count
}
