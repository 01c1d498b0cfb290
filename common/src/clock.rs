//! Wall-clock access behind a trait so timestamp-dependent behaviour stays
//! testable.
//!
//! Only two places read the clock: the version normaliser's timestamp
//! suffix and the install timestamps written to overlay records. Both take a
//! `&dyn Clock` rather than calling [`SystemTime::now`] directly.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time in milliseconds since the Unix epoch.
#[cfg_attr(any(test, feature = "test-support"), mockall::automock)]
pub trait Clock {
    /// Returns the current time as epoch milliseconds.
    fn now_millis(&self) -> u128;
}

/// Clock backed by [`SystemTime::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u128 {
        // A clock before 1970 is treated as the epoch itself.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis())
    }
}

/// Clock that always returns the same instant.
///
/// # Examples
///
/// ```
/// use ampkit_common::clock::{Clock, FixedClock};
///
/// let clock = FixedClock::new(1_700_000_000_000);
/// assert_eq!(clock.now_millis(), 1_700_000_000_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    millis: u128,
}

impl FixedClock {
    /// Creates a clock frozen at `millis`.
    #[must_use]
    pub const fn new(millis: u128) -> Self {
        Self { millis }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> u128 {
        self.millis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn mock_clock_returns_programmed_value() {
        let mut clock = MockClock::new();
        clock.expect_now_millis().times(1).return_const(42_u128);
        assert_eq!(clock.now_millis(), 42);
    }
}
