// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Source of wall-clock time. Workflows that stamp rows or number documents
/// take a clock so tests can pin the date.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now_utc().date_naive()
    }

    fn now_rfc3339(&self) -> String {
        self.now_utc().to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn unix_secs(&self) -> i64 {
        self.now_utc().timestamp()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Midnight UTC of the given calendar day. Invalid dates fall back to the epoch.
    #[must_use]
    pub fn at_date(year: i32, month: u32, day: u32) -> Self {
        let instant = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .unwrap_or_default();
        Self(instant)
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_pinned_day() {
        let clock = FixedClock::at_date(2025, 3, 14);
        assert_eq!(clock.today().to_string(), "2025-03-14");
        assert_eq!(clock.now_rfc3339(), "2025-03-14T00:00:00Z");
        assert_eq!(clock.unix_secs(), 1_741_910_400);
    }
}
