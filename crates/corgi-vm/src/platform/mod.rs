// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Platform abstraction for the VM core.
//!
//! The interpreter and its primitives touch the host through this trait
//! only: wall clock, log sink, and the image file sink. File and socket
//! adapters proper live outside the core, wired in by the host binary.


mod host;
mod mock;

pub use host::HostPlatform;
pub use mock::MockPlatform;

/// Host services the VM core depends on.
pub trait Platform {
    /// Milliseconds of wall-clock time, monotonic enough for the image.
    fn now_millis(&self) -> i64;

    /// Current local date and time packed the way the image expects:
    /// `ddmmyyyy * 100_000_000 + milliseconds_since_midnight`.
    fn current_date_and_time(&self) -> i64;

    /// Sink for the log primitive.
    fn log_line(&mut self, line: &str);

    /// Persist a serialized image.
    ///
    /// # Errors
    ///
    /// Answers an error message when the host could not write the file.
    fn write_image(&mut self, path: &str, bytes: &[u8]) -> Result<(), String>;

    /// Platform discriminator answered by the platform primitive.
    fn platform_id(&self) -> i64 {
        1
    }
}
