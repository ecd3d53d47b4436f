//! Monotonic millisecond clock for store bookkeeping columns.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Current wall-clock time in milliseconds, bumped so that every call in
/// this process returns a value strictly greater than the previous one.
pub fn monotonic_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_MILLIS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}
