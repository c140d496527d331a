// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Fatal VM errors.
//!
//! Smalltalk-visible failures (message not understood, index out of
//! bounds, primitive failure) are raised inside the image and never
//! surface here. `VmError` covers the conditions the VM cannot continue
//! from: the embedder is expected to log the walkback and terminate.

use thiserror::Error;

/// Unrecoverable VM failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// A memory space could not be carved out of the arena.
    #[error("out of memory allocating a space of {requested} bytes")]
    OutOfMemory {
        /// Requested space size in bytes.
        requested: u64,
    },

    /// Eden could not satisfy an allocation even after a scavenge.
    #[error("ran out of space in Eden")]
    OutOfEden,

    /// A non-Eden object space could not satisfy an allocation.
    #[error("ran out of space outside of Eden")]
    OutOfObjectSpace,

    /// The stack space is exhausted.
    #[error("ran out of stack space")]
    OutOfStackSpace,

    /// The mark queue (Eden, repurposed during global GC) overflowed.
    /// The image is too large for this Eden; resize Eden and retry.
    #[error("out of space in Eden during global GC")]
    MarkQueueOverflow,

    /// An indirect store targeted an immediate value.
    #[error("indirect store into immediate object")]
    IndirectStoreIntoImmediate,

    /// An indirect store fell outside the captured array.
    #[error("indirect store out of bounds")]
    IndirectStoreOutOfBounds,

    /// The bytecode stream produced an opcode outside the instruction set.
    #[error("bad bytecode: {0:#04x}")]
    BadBytecode(u8),

    /// An invariant audit failed with exit-on-audit enabled.
    #[error("image audit failed: {0}")]
    AuditFailed(String),

    /// The image stream ended early or carried a malformed header.
    #[error("bad image: {0}")]
    BadImage(String),

    /// Host I/O failed while reading or writing an image.
    #[error("image I/O failed: {0}")]
    ImageIo(String),
}
