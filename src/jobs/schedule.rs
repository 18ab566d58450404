use std::str::FromStr;
use std::time::Duration;

use anyhow::{Error, anyhow};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};

/// When a periodic job fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// Fixed interval measured from the previous run
    Every(Duration),
    /// Once a day at a local wall clock time
    DailyAt(NaiveTime),
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::DailyAt(NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default())
    }
}

impl Schedule {
    /// How long to sleep from `now` (local time) until the next run.
    pub fn delay_from(&self, now: NaiveDateTime) -> Duration {
        match self {
            Schedule::Every(interval) => *interval,
            Schedule::DailyAt(time) => {
                let mut next = now.date().and_time(*time);
                if next <= now {
                    next += TimeDelta::days(1);
                }
                (next - now).to_std().unwrap_or(Duration::ZERO)
            }
        }
    }
}

/// Parses `HH:MM` as a daily time, or `<n>s`, `<n>m`, `<n>h` (bare
/// numbers are seconds) as an interval.
impl FromStr for Schedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M") {
            return Ok(Schedule::DailyAt(time));
        }

        let (digits, unit) = match s.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
            Some((idx, _)) => s.split_at(idx),
            None => (s, "s"),
        };
        let n: u64 = digits
            .parse()
            .map_err(|_| anyhow!("Invalid schedule \"{}\"", s))?;
        let secs = match unit {
            "s" => Some(n),
            "m" => n.checked_mul(60),
            "h" => n.checked_mul(60 * 60),
            _ => return Err(anyhow!("Invalid schedule unit \"{}\"", unit)),
        }
        .ok_or_else(|| anyhow!("Invalid schedule \"{}\"", s))?;
        if secs == 0 {
            return Err(anyhow!("Schedule interval must be greater than zero"));
        }
        Ok(Schedule::Every(Duration::from_secs(secs)))
    }
}
