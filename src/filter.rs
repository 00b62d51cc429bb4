use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::{DailyActivity, OrderSummary, Transaction};

/// Records that can be placed on the calendar.
pub trait Dated {
    fn timestamp(&self) -> NaiveDateTime;
}

impl Dated for Transaction {
    fn timestamp(&self) -> NaiveDateTime {
        self.date
    }
}

impl Dated for OrderSummary {
    fn timestamp(&self) -> NaiveDateTime {
        self.date
    }
}

impl Dated for DailyActivity {
    fn timestamp(&self) -> NaiveDateTime {
        self.date.and_time(NaiveTime::MIN)
    }
}

/// Inclusive `[start, end]` calendar window, naive (no timezone).
/// The end bound covers the whole end day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// A reversed window matches nothing.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        if self.is_empty() || ts < self.start.and_time(NaiveTime::MIN) {
            return false;
        }
        match self.end.succ_opt() {
            Some(next_day) => ts < next_day.and_time(NaiveTime::MIN),
            None => true,
        }
    }

    pub fn apply<'a, T: Dated>(&self, records: &'a [T]) -> impl Iterator<Item = &'a T> + 'a {
        let window = *self;
        records.iter().filter(move |r| window.contains(r.timestamp()))
    }

    pub fn filter<T: Dated + Clone>(&self, records: &[T]) -> Vec<T> {
        self.apply(records).cloned().collect()
    }
}
