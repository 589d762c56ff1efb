//! Sampling intervals and annualization.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::bars::BarMode;
use super::error::AlphaginiError;
use super::ohlcv::BarSeries;

const MINUTES_PER_YEAR: f64 = 365.0 * 24.0 * 60.0;

/// Fixed sampling interval, stored in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe {
    minutes: u32,
}

impl Timeframe {
    pub fn from_minutes(minutes: u32) -> Result<Self, AlphaginiError> {
        if minutes == 0 {
            return Err(AlphaginiError::invalid("timeframe", "interval must be positive"));
        }
        Ok(Self { minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    /// 5-minute bars give 365 * 24 * 12.
    pub fn periods_per_year(&self) -> f64 {
        MINUTES_PER_YEAR / self.minutes as f64
    }

    /// Most common spacing between consecutive bars.
    pub fn infer(series: &BarSeries) -> Result<Self, AlphaginiError> {
        let bars = series.bars();
        if bars.len() < 2 {
            return Err(AlphaginiError::AmbiguousFrequency {
                reason: format!("need at least 2 bars to infer an interval, have {}", bars.len()),
            });
        }

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for pair in bars.windows(2) {
            let delta = (pair[1].ts - pair[0].ts).num_seconds();
            *counts.entry(delta).or_default() += 1;
        }
        // ties go to the shorter interval so the result does not depend on map order
        let (seconds, _) = counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .ok_or_else(|| AlphaginiError::AmbiguousFrequency {
                reason: "no bar spacing found".into(),
            })?;

        if seconds <= 0 || seconds % 60 != 0 {
            return Err(AlphaginiError::AmbiguousFrequency {
                reason: format!("bar spacing of {seconds}s is not a whole number of minutes"),
            });
        }
        let minutes = u32::try_from(seconds / 60).map_err(|_| AlphaginiError::AmbiguousFrequency {
            reason: format!("bar spacing of {seconds}s is out of range"),
        })?;
        Self::from_minutes(minutes)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.minutes;
        if m % (7 * 1440) == 0 {
            write!(f, "{}w", m / (7 * 1440))
        } else if m % 1440 == 0 {
            write!(f, "{}d", m / 1440)
        } else if m % 60 == 0 {
            write!(f, "{}h", m / 60)
        } else {
            write!(f, "{}m", m)
        }
    }
}

impl FromStr for Timeframe {
    type Err = AlphaginiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || AlphaginiError::invalid("timeframe", format!("cannot parse '{s}'"));
        if s.len() < 2 {
            return Err(invalid());
        }
        let (count, unit) = s.split_at(s.len() - 1);
        let count: u32 = count.parse().map_err(|_| invalid())?;
        let per_unit = match unit {
            "m" => 1,
            "h" => 60,
            "d" => 1440,
            "w" => 7 * 1440,
            _ => return Err(invalid()),
        };
        let minutes = count.checked_mul(per_unit).ok_or_else(invalid)?;
        Self::from_minutes(minutes)
    }
}

impl TryFrom<String> for Timeframe {
    type Error = AlphaginiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_string()
    }
}

/// How the bars being scored were sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    Time(Timeframe),
    Threshold(BarMode),
}

/// Annualization factor for a run. An explicit value always wins; threshold
/// bars have no calendar frequency and require one.
pub fn resolve_periods_per_year(
    sampling: Option<&Sampling>,
    explicit: Option<f64>,
) -> Result<f64, AlphaginiError> {
    if let Some(value) = explicit {
        if !value.is_finite() || value <= 0.0 {
            return Err(AlphaginiError::invalid(
                "periods_per_year",
                format!("{value} must be positive"),
            ));
        }
        return Ok(value);
    }
    match sampling {
        Some(Sampling::Time(tf)) => Ok(tf.periods_per_year()),
        Some(Sampling::Threshold(mode)) => Err(AlphaginiError::AmbiguousFrequency {
            reason: format!("{mode} bars have no calendar frequency; set periods_per_year"),
        }),
        None => Err(AlphaginiError::AmbiguousFrequency {
            reason: "sampling interval unknown; set a timeframe or periods_per_year".into(),
        }),
    }
}

/// Parse an RFC 3339 timestamp, a naive `YYYY-MM-DD[ T]HH:MM:SS` (taken as
/// UTC), a bare date, or epoch milliseconds.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, AlphaginiError> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        if let Some(ts) = s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis) {
            return Ok(ts);
        }
    }
    Err(AlphaginiError::Data {
        reason: format!("invalid timestamp '{s}'"),
    })
}
