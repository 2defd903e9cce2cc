//! Half-open time intervals over epoch milliseconds.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::error::{CacheError, CacheResult};

/// A half-open interval `[low, high)`.
///
/// `high == None` means the interval is still open (no known end yet). The
/// lower bound is never negative because the domain is unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    /// Inclusive lower bound.
    pub low: u64,
    /// Exclusive upper bound, or `None` for an open interval.
    #[serde(default)]
    pub high: Option<u64>,
}

impl Interval {
    /// Create a bounded interval, rejecting `low > high`.
    pub fn new(low: u64, high: u64) -> CacheResult<Self> {
        if low > high {
            return Err(CacheError::MalformedInterval { low, high });
        }
        Ok(Self {
            low,
            high: Some(high),
        })
    }

    /// Create an open (continuing) interval starting at `low`.
    pub fn open(low: u64) -> Self {
        Self { low, high: None }
    }

    /// Create an interval from an optional upper bound.
    pub fn with_high(low: u64, high: Option<u64>) -> CacheResult<Self> {
        match high {
            Some(h) => Self::new(low, h),
            None => Ok(Self::open(low)),
        }
    }

    /// Build an interval from calendar dates, each taken at midnight UTC.
    pub fn from_dates(start: NaiveDate, end: Option<NaiveDate>) -> CacheResult<Self> {
        let to_millis = |d: NaiveDate| {
            d.and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
                .ok_or_else(|| CacheError::Config(format!("invalid date {d}")))
                .and_then(datetime_millis)
        };
        let low = to_millis(start)?;
        let high = end.map(to_millis).transpose()?;
        Self::with_high(low, high)
    }

    /// Build an interval from UTC timestamps.
    pub fn from_datetimes(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> CacheResult<Self> {
        let low = datetime_millis(start)?;
        let high = end.map(datetime_millis).transpose()?;
        Self::with_high(low, high)
    }

    /// Whether the interval has no upper bound.
    pub fn is_open(&self) -> bool {
        self.high.is_none()
    }

    /// Half-open containment test: `low <= point < high`.
    pub fn contains(&self, point: u64) -> bool {
        point >= self.low && self.high.map_or(true, |h| point < h)
    }

    /// Whether two intervals share at least one point.
    pub fn overlaps(&self, other: &Interval) -> bool {
        let self_end = self.high.unwrap_or(u64::MAX);
        let other_end = other.high.unwrap_or(u64::MAX);
        self.low < other_end && other.low < self_end
    }

    /// Whether every point of `other` is also in `self`.
    pub fn covers(&self, other: &Interval) -> bool {
        self.low <= other.low && self.high.unwrap_or(u64::MAX) >= other.high.unwrap_or(u64::MAX)
    }

    /// The last point this interval covers when placed in a tree over
    /// `[0, domain_max]`. A degenerate `[p, p)` is treated as the point `p`.
    pub fn last_point(&self, domain_max: u64) -> u64 {
        match self.high {
            Some(h) => h.saturating_sub(1).max(self.low),
            None => domain_max,
        }
    }

    /// Number of points covered; open intervals are the widest possible.
    pub fn width(&self) -> u64 {
        self.high.unwrap_or(u64::MAX) - self.low
    }

    /// Check that the interval fits inside `[0, domain_max]`.
    pub fn check_domain(&self, domain_max: u64) -> CacheResult<()> {
        if let Some(h) = self.high {
            if self.low > h {
                return Err(CacheError::MalformedInterval { low: self.low, high: h });
            }
        }
        let out_of_domain = self.low > domain_max || self.high.is_some_and(|h| h > domain_max);
        if out_of_domain {
            return Err(CacheError::Domain {
                low: self.low,
                high: self.high,
                max: domain_max,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.high {
            Some(h) => write!(f, "[{}, {})", self.low, h),
            None => write!(f, "[{}, ..)", self.low),
        }
    }
}

fn datetime_millis(dt: DateTime<Utc>) -> CacheResult<u64> {
    let millis = dt.timestamp_millis();
    u64::try_from(millis).map_err(|_| CacheError::Config(format!("timestamp before epoch: {dt}")))
}

/// Returns the current time as Unix epoch milliseconds.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
