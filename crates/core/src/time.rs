use chrono::{DateTime, Duration, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Returns true if this clock represents real time.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Clock::Default)
    }
}

/// Number of UTC calendar dates from `earlier` to `later`. Same date is 0.
///
/// Negative when `earlier` is in the future relative to `later`.
#[must_use]
pub fn calendar_days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later.date_naive() - earlier.date_naive()).num_days()
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z, a Tuesday).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_but_default_does_not() {
        let mut clock = fixed_clock();
        clock.advance(Duration::hours(3));
        assert_eq!(clock.now(), fixed_now() + Duration::hours(3));

        let mut real = Clock::default_clock();
        real.advance(Duration::hours(3));
        assert!(real.is_default());
    }

    #[test]
    fn calendar_days_count_date_changes() {
        // fixed_now() is 22:13 UTC.
        let now = fixed_now();
        assert_eq!(calendar_days_between(now - Duration::hours(22), now), 0);
        assert_eq!(calendar_days_between(now - Duration::hours(23), now), 1);
        assert_eq!(calendar_days_between(now - Duration::hours(47), now), 2);
        assert_eq!(calendar_days_between(now - Duration::days(7), now), 7);
        assert_eq!(calendar_days_between(now + Duration::days(1), now), -1);
    }
}
