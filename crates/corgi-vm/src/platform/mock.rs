// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mock platform for tests.
//!
//! Fixed clock, captured log lines, captured image writes. Clones share
//! their recordings, so a test can keep a handle while the interpreter
//! owns the boxed original.

use super::Platform;
use std::cell::RefCell;
use std::rc::Rc;

/// A platform that records instead of acting.
#[derive(Default, Clone)]
pub struct MockPlatform {
    /// Value answered by the clock, advanced manually by tests.
    pub millis: i64,
    /// Value answered by the date-and-time primitive.
    pub date_and_time: i64,
    /// Lines the log primitive emitted.
    pub log_lines: Rc<RefCell<Vec<String>>>,
    /// Images the save primitive wrote, as (path, bytes).
    pub images: Rc<RefCell<Vec<(String, Vec<u8>)>>>,
}

impl MockPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Platform for MockPlatform {
    fn now_millis(&self) -> i64 {
        self.millis
    }

    fn current_date_and_time(&self) -> i64 {
        self.date_and_time
    }

    fn log_line(&mut self, line: &str) {
        self.log_lines.borrow_mut().push(line.to_string());
    }

    fn write_image(&mut self, path: &str, bytes: &[u8]) -> Result<(), String> {
        self.images.borrow_mut().push((path.to_string(), bytes.to_vec()));
        Ok(())
    }
}
