use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Source of "now". Handlers never call `Utc::now()` for status decisions,
/// they ask the clock held in `AppState` so tests can pin the date.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar date in the clinic's reference frame.
    fn today(&self, frame: FixedOffset) -> NaiveDate {
        self.now().with_timezone(&frame).date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
