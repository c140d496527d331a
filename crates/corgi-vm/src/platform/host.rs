// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Std platform implementation.

use super::Platform;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

/// The real host: std clock, stdout log sink, filesystem image sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostPlatform;

/// Civil date from days since the Unix epoch (Howard Hinnant's
/// `civil_from_days`).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if m <= 2 { y + 1 } else { y };
    (year, m as u32, d as u32)
}

impl Platform for HostPlatform {
    fn now_millis(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        // Masked the way the image expects: seconds wrap long before the
        // tag range does.
        ((now.as_secs() & 0x7_FFFF_FFFF) * 1000 + u64::from(now.subsec_millis())) as i64
    }

    fn current_date_and_time(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let secs = now.as_secs() as i64;
        let days = secs.div_euclid(86_400);
        let of_day = secs.rem_euclid(86_400);
        let (year, month, day) = civil_from_days(days);

        let date = i64::from(day) * 1_000_000 + i64::from(month) * 10_000 + year;
        date * 100_000_000 + of_day * 1000
    }

    fn log_line(&mut self, line: &str) {
        println!("{line}");
    }

    fn write_image(&mut self, path: &str, bytes: &[u8]) -> Result<(), String> {
        fs::write(path, bytes).map_err(|e| e.to_string())
    }
}
