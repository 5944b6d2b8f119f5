//! General time utility functions

use chrono;
use conquer_once::Lazy;
use std::time::Instant;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Instant against which monotonic timestamps are measured, set on first use.
static MONOTONIC_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Microseconds elapsed on the process monotonic clock.
///
/// The clock starts on the first call to this function, or to [`init_monotonic_clock`].
pub fn monotonic_micros() -> u64 {
    MONOTONIC_EPOCH.elapsed().as_micros() as u64
}

/// Start the monotonic clock now, if it hasn't been already.
pub fn init_monotonic_clock() {
    let _ = &*MONOTONIC_EPOCH;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(duration_to_seconds(chrono::Duration::milliseconds(1500)), Some(1.5));
        assert_eq!(duration_to_seconds(chrono::Duration::days(1_000_000)), None);
    }

    #[test]
    fn test_monotonic_micros() {
        let t0 = monotonic_micros();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let t1 = monotonic_micros();

        assert!(t1 >= t0 + 2_000);
    }
}
