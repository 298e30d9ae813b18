//! Daily check scheduling.
//!
//! Users pick a 12-hour wall-clock time. [`CheckTime::next_run`] converts it
//! to the next matching local instant, rolling over to tomorrow when today's
//! slot has passed; [`run_daily`] sleeps until then and checks every site,
//! repeating daily until shutdown.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::monitor::SiteChecker;

/// Half of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Meridiem {
    /// Midnight to noon.
    Am,
    /// Noon to midnight.
    Pm,
}

impl FromStr for Meridiem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AM" => Ok(Self::Am),
            "PM" => Ok(Self::Pm),
            other => Err(Error::Config(format!("expected AM or PM, got {other:?}"))),
        }
    }
}

/// Daily check time in 12-hour form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTime {
    /// 1 to 12.
    pub hour: u32,
    /// 0 to 59.
    pub minute: u32,
    /// AM or PM.
    #[serde(rename = "ampm")]
    pub period: Meridiem,
}

impl Default for CheckTime {
    fn default() -> Self {
        Self { hour: 9, minute: 0, period: Meridiem::Am }
    }
}

impl fmt::Display for CheckTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let period = match self.period {
            Meridiem::Am => "AM",
            Meridiem::Pm => "PM",
        };
        write!(f, "{}:{:02} {period}", self.hour, self.minute)
    }
}

impl CheckTime {
    /// Validated constructor.
    pub fn new(hour: u32, minute: u32, period: Meridiem) -> Result<Self> {
        if !(1..=12).contains(&hour) {
            return Err(Error::Config(format!("hour must be 1-12, got {hour}")));
        }
        if minute > 59 {
            return Err(Error::Config(format!("minute must be 0-59, got {minute}")));
        }
        Ok(Self { hour, minute, period })
    }

    /// Parse `h:mm` plus a period, e.g. `("7:30", "PM")`.
    pub fn parse(clock: &str, period: &str) -> Result<Self> {
        let (h, m) = clock
            .trim()
            .split_once(':')
            .ok_or_else(|| Error::Config(format!("expected h:mm, got {clock:?}")))?;
        let hour = h.parse().map_err(|_| Error::Config(format!("invalid hour {h:?}")))?;
        let minute = m.parse().map_err(|_| Error::Config(format!("invalid minute {m:?}")))?;
        Self::new(hour, minute, period.parse()?)
    }

    /// Hour on a 24-hour clock: 12 AM is 0, 12 PM is 12.
    #[must_use]
    pub fn hour24(&self) -> u32 {
        match (self.period, self.hour) {
            (Meridiem::Am, 12) => 0,
            (Meridiem::Am, h) | (Meridiem::Pm, h @ 12) => h,
            (Meridiem::Pm, h) => h + 12,
        }
    }

    /// Next instant at this wall-clock time strictly after `now`.
    #[must_use]
    pub fn next_run<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let time = NaiveTime::from_hms_opt(self.hour24(), self.minute, 0).unwrap_or_default();
        let tz = now.timezone();
        let mut day = now.date_naive();
        loop {
            // DST gaps have no local instant; try the next day.
            if let Some(candidate) = tz.from_local_datetime(&day.and_time(time)).earliest() {
                if candidate > *now {
                    return candidate;
                }
            }
            match day.checked_add_days(Days::new(1)) {
                Some(next) => day = next,
                None => return now.clone(),
            }
        }
    }
}

/// Run `check_all` daily at `time` until `shutdown` flips to `true`.
///
/// The next run is recomputed from the local clock after every pass, so
/// daylight-saving shifts keep the wall-clock time.
pub async fn run_daily(checker: &SiteChecker, time: CheckTime, mut shutdown: watch::Receiver<bool>) {
    let mut previous: Option<DateTime<Local>> = None;

    loop {
        let now = Local::now();
        let after = previous.map_or(now, |p| p.max(now));
        let next = time.next_run(&after);
        let deadline = Instant::now() + (next - now).to_std().unwrap_or_default();
        info!(%time, %next, "daily check scheduled");

        loop {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => break,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler stopped");
                        return;
                    }
                }
            }
        }

        info!("scheduled check started");
        match checker.check_all().await {
            Ok(report) => info!(new_posts = report.total_new, "scheduled check finished"),
            Err(e) => warn!(error = %e, "scheduled check failed"),
        }
        previous = Some(next);
    }
}
