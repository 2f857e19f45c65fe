use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

/// Wall-clock source injected into every stateful component.
///
/// `Fixed` keeps tests deterministic; it can be advanced manually to simulate
/// answer latency, drill timeouts or review intervals.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Advance a fixed clock. No effect on `Clock::System`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Calendar day of `now()` as observed at the given UTC offset.
    #[must_use]
    pub fn today(&self, offset: FixedOffset) -> NaiveDate {
        calendar_day(self.now(), offset)
    }
}

/// Calendar day of an instant as observed at the given UTC offset.
#[must_use]
pub fn calendar_day(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Fractional seconds of a (possibly negative) duration, floored at zero.
#[must_use]
pub fn seconds_f64(duration: Duration) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let millis = duration.num_milliseconds().max(0) as f64;
    millis / 1000.0
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
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
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(90));
    }

    #[test]
    fn calendar_day_respects_offset() {
        // 22:13 UTC is already the next day at UTC+3.
        let utc = FixedOffset::east_opt(0).unwrap();
        let plus3 = FixedOffset::east_opt(3 * 3600).unwrap();
        let day_utc = calendar_day(fixed_now(), utc);
        let day_plus3 = calendar_day(fixed_now(), plus3);
        assert_eq!(day_plus3, day_utc.succ_opt().unwrap());
    }

    #[test]
    fn negative_durations_floor_to_zero() {
        assert_eq!(seconds_f64(Duration::seconds(-5)), 0.0);
        assert_eq!(seconds_f64(Duration::milliseconds(1500)), 1.5);
    }
}
