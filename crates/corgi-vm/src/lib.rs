// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # Corgi VM
//!
//! A Smalltalk virtual machine: a bytecode interpreter over a
//! generational, moving object memory with a snapshot image format.
//!
//! This crate provides:
//! - Tagged 64-bit object pointers (immediate integers, characters,
//!   floats, and heap pointers)
//! - The partitioned object memory (Eden, paired survivor spaces,
//!   old space, remembered set, well-known objects, stack space)
//! - A copying scavenger and a mark-sweep-compact global collector
//! - The image codec (load, save, offset relocation) and a minimal
//!   image bootstrap for tests and tooling
//! - The context-frame interpreter with its fixed bytecode set
//! - The primitive function table, including multi-precision integer
//!   and tagged-float arithmetic
//!
//! The VM is single-threaded and cooperative: the interpreter is the
//! only mutator, and collections run synchronously inside allocation.

pub mod error;
pub mod image;
pub mod interp;
pub mod memory;
pub mod object;
pub mod oop;
pub mod platform;
pub mod primitives;

// Re-export commonly used types at crate root
pub use error::VmError;
pub use interp::Interpreter;
pub use memory::ObjectMemory;
pub use oop::Oop;

/// Crate version, reported in walkbacks.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
pub(crate) mod testkit;
