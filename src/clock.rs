//! Process-wide monotonic clock.
//!
//! Event timestamps are seconds since the first call into this module, as an
//! `f64`, comparable across threads and unaffected by wall-clock jumps.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Seconds elapsed since the process clock epoch.
pub fn now() -> f64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic() {
        let a = now();
        let b = now();
        assert!(b >= a);
    }
}
