use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SyncError;

/// Key of one candle: series plus grid-aligned open time in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandleKey {
    /// Trading pair (e.g. `ETHUSD`).
    pub pair: String,
    /// Candle duration in minutes.
    pub timeframe_minutes: u32,
    /// Open time, UNIX seconds.
    pub time: i64,
}

/// Identifies one candle series; the unit of lease exclusivity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    /// Trading pair.
    pub pair: String,
    /// Candle duration in minutes.
    pub timeframe_minutes: u32,
}

impl SeriesKey {
    /// Build a series key.
    pub fn new(pair: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            pair: pair.into(),
            timeframe_minutes: timeframe.minutes(),
        }
    }

    /// Key of the candle at `time` in this series.
    #[must_use]
    pub fn candle_key(&self, time: i64) -> CandleKey {
        CandleKey {
            pair: self.pair.clone(),
            timeframe_minutes: self.timeframe_minutes,
            time,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}m", self.pair, self.timeframe_minutes)
    }
}

/// Aggregated price and volume record for one fixed interval.
///
/// Candles are write-once: stores upsert them by [`CandleKey`] and never
/// update an existing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Trading pair.
    pub pair: String,
    /// Candle duration in minutes.
    pub timeframe_minutes: u32,
    /// Open time, UNIX seconds.
    pub time: i64,
    /// Open price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Volume weighted average price.
    pub vwap: f64,
    /// Traded volume.
    pub volume: f64,
    /// Number of trades aggregated.
    pub trade_count: u64,
}

impl Candle {
    /// Key of this candle.
    #[must_use]
    pub fn key(&self) -> CandleKey {
        CandleKey {
            pair: self.pair.clone(),
            timeframe_minutes: self.timeframe_minutes,
            time: self.time,
        }
    }

    /// Returns true if `time` lies on the grid of this candle's timeframe.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        let step = i64::from(self.timeframe_minutes) * 60;
        step > 0 && self.time.rem_euclid(step) == 0
    }

    /// Returns true if the candle belongs to `series`.
    #[must_use]
    pub fn belongs_to(&self, series: &SeriesKey) -> bool {
        self.timeframe_minutes == series.timeframe_minutes && self.pair == series.pair
    }
}

/// Validated candle duration in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Timeframe(u32);

impl Timeframe {
    /// One minute.
    pub const M1: Self = Self(1);
    /// Five minutes.
    pub const M5: Self = Self(5);
    /// Fifteen minutes.
    pub const M15: Self = Self(15);
    /// Thirty minutes.
    pub const M30: Self = Self(30);
    /// One hour.
    pub const H1: Self = Self(60);
    /// Four hours.
    pub const H4: Self = Self(240);
    /// One day.
    pub const D1: Self = Self(1440);
    /// One week.
    pub const W1: Self = Self(10080);

    const LABELS: &'static [(&'static str, Self)] = &[
        ("1m", Self::M1),
        ("5m", Self::M5),
        ("15m", Self::M15),
        ("30m", Self::M30),
        ("1h", Self::H1),
        ("4h", Self::H4),
        ("1d", Self::D1),
        ("1w", Self::W1),
    ];

    /// Validate a raw minute count.
    ///
    /// # Errors
    /// Returns `InvalidArg` if `minutes <= 0` or it does not fit the grid arithmetic.
    pub fn try_from_minutes(minutes: i64) -> Result<Self, SyncError> {
        if minutes <= 0 {
            return Err(SyncError::invalid_arg(format!(
                "timeframe must be positive, got {minutes}"
            )));
        }
        u32::try_from(minutes)
            .map(Self)
            .map_err(|_| SyncError::invalid_arg(format!("timeframe too large: {minutes}")))
    }

    /// Parse a label such as `15m`, `1h`, `4h` or `1d`.
    ///
    /// # Errors
    /// Returns `InvalidArg` for unknown labels.
    pub fn from_label(label: &str) -> Result<Self, SyncError> {
        let normalized = label.trim().to_ascii_lowercase();
        Self::LABELS
            .iter()
            .find(|(l, _)| *l == normalized)
            .map(|(_, tf)| *tf)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::LABELS.iter().map(|(l, _)| *l).collect();
                SyncError::invalid_arg(format!(
                    "unsupported timeframe '{label}', use one of: {}",
                    known.join(", ")
                ))
            })
    }

    /// Minutes per candle.
    #[must_use]
    pub const fn minutes(self) -> u32 {
        self.0
    }

    /// Seconds per candle, i.e. the grid step.
    #[must_use]
    pub const fn step_seconds(self) -> i64 {
        self.0 as i64 * 60
    }

    /// Canonical label when one exists (`60` -> `1h`), otherwise `<n>m`.
    #[must_use]
    pub fn label(self) -> String {
        Self::LABELS
            .iter()
            .find(|(_, tf)| *tf == self)
            .map_or_else(|| format!("{}m", self.0), |(l, _)| (*l).to_string())
    }
}

impl TryFrom<i64> for Timeframe {
    type Error = SyncError;

    fn try_from(minutes: i64) -> Result<Self, Self::Error> {
        Self::try_from_minutes(minutes)
    }
}

impl From<Timeframe> for i64 {
    fn from(tf: Timeframe) -> Self {
        Self::from(tf.0)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
