//! Core data types for the tickbars dashboard.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Milliseconds in one minute.
pub const MS_PER_MINUTE: i64 = 60_000;

/// Index of the fixed-width interval containing `ts_ms`, counted from the Unix epoch.
///
/// Uses euclidean division so timestamps before 1970 still land in the
/// interval that starts at or before them.
#[inline]
pub fn interval_index(ts_ms: TimestampMs, interval_ms: i64) -> i64 {
    ts_ms.div_euclid(interval_ms)
}

/// Convert a timestamp to a UTC datetime, if it is in chrono's range.
pub fn ts_to_datetime(ts_ms: TimestampMs) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts_ms)
}

/// A single executed trade (tick).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Timestamp in milliseconds.
    pub ts_ms: TimestampMs,
    /// Trade price.
    pub price: f64,
    /// Traded quantity in base units.
    pub volume: f64,
}

impl Trade {
    pub fn new(ts_ms: TimestampMs, price: f64, volume: f64) -> Self {
        Self { ts_ms, price, volume }
    }

    /// Quote-currency value of the trade.
    #[inline]
    pub fn dollar_value(&self) -> f64 {
        self.price * self.volume
    }

    /// Reject prices and volumes that would corrupt OHLC aggregates.
    ///
    /// `index` is the trade's position in its sequence and only feeds the
    /// error message.
    pub fn validate(&self, index: usize) -> Result<()> {
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(Error::data(format!(
                "trade #{index} has invalid price {}",
                self.price
            )));
        }
        if !self.volume.is_finite() || self.volume <= 0.0 {
            return Err(Error::data(format!(
                "trade #{index} has invalid volume {}",
                self.volume
            )));
        }
        Ok(())
    }
}

/// OHLC summary of one group of trades.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Timestamp of the last trade in the group.
    pub ts_ms: TimestampMs,
    /// Price of the first trade.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Price of the last trade.
    pub close: f64,
    /// Total traded volume.
    pub volume: f64,
    /// Number of trades in the group, saturating at `u32::MAX`.
    pub trade_count: u32,
}

impl Bar {
    /// High minus low.
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Whether high and low bound both open and close.
    pub fn is_well_formed(&self) -> bool {
        self.low <= self.open
            && self.low <= self.close
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.high
    }
}

/// The four sampling schemes, without their parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarKind {
    /// Fixed wall-clock intervals ("price bars").
    Time,
    /// Every N trades.
    Tick,
    /// Every V units of cumulative volume.
    Volume,
    /// Every D units of cumulative traded value.
    Dollar,
}

impl BarKind {
    /// All kinds in display order.
    pub const ALL: [BarKind; 4] = [BarKind::Time, BarKind::Tick, BarKind::Volume, BarKind::Dollar];

    /// Human-readable name used in chart titles.
    pub fn display_name(self) -> &'static str {
        match self {
            BarKind::Time => "Price Bars",
            BarKind::Tick => "Tick Bars",
            BarKind::Volume => "Volume Bars",
            BarKind::Dollar => "Dollar Bars",
        }
    }
}

/// A sampling rule together with its parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum BarRule {
    /// Group trades by fixed wall-clock interval.
    Time { interval_ms: i64 },
    /// Group every `count` consecutive trades.
    Tick { count: usize },
    /// Group by floor of cumulative volume over `threshold`.
    Volume { threshold: f64 },
    /// Group by floor of cumulative traded value over `threshold`.
    Dollar { threshold: f64 },
}

impl BarRule {
    /// Time bars of `minutes` minutes.
    pub fn time_minutes(minutes: u32) -> Self {
        BarRule::Time {
            interval_ms: i64::from(minutes) * MS_PER_MINUTE,
        }
    }

    /// The parameter-free kind of this rule.
    pub fn kind(&self) -> BarKind {
        match self {
            BarRule::Time { .. } => BarKind::Time,
            BarRule::Tick { .. } => BarKind::Tick,
            BarRule::Volume { .. } => BarKind::Volume,
            BarRule::Dollar { .. } => BarKind::Dollar,
        }
    }

    /// Reject parameters that cannot define a partition.
    pub fn validate(&self) -> Result<()> {
        match *self {
            BarRule::Time { interval_ms } if interval_ms <= 0 => Err(Error::config(format!(
                "time bar interval must be positive, got {interval_ms} ms"
            ))),
            BarRule::Tick { count: 0 } => Err(Error::config("tick bar count must be positive")),
            BarRule::Volume { threshold } | BarRule::Dollar { threshold }
                if !threshold.is_finite() || threshold <= 0.0 =>
            {
                Err(Error::config(format!(
                    "{} threshold must be positive and finite, got {threshold}",
                    self.kind().display_name()
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Crypto assets offered by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CryptoAsset {
    Eth,
    Ada,
    Matic,
}

impl CryptoAsset {
    /// All assets in menu order.
    pub const ALL: [CryptoAsset; 3] = [CryptoAsset::Eth, CryptoAsset::Ada, CryptoAsset::Matic];

    /// Ticker shown in the menu.
    pub fn as_str(self) -> &'static str {
        match self {
            CryptoAsset::Eth => "ETH",
            CryptoAsset::Ada => "ADA",
            CryptoAsset::Matic => "MATIC",
        }
    }

    /// Exchange symbol against USDT.
    pub fn symbol(self) -> String {
        format!("{}USDT", self.as_str())
    }

    /// File name of the exported trade table.
    pub fn default_trade_file(self) -> String {
        format!("{}_last_1000_trades.csv", self.symbol())
    }
}

impl fmt::Display for CryptoAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CryptoAsset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ETH" | "ETHUSDT" => Ok(CryptoAsset::Eth),
            "ADA" | "ADAUSDT" => Ok(CryptoAsset::Ada),
            "MATIC" | "MATICUSDT" => Ok(CryptoAsset::Matic),
            other => Err(Error::config(format!("unknown crypto asset: {other}"))),
        }
    }
}

/// One numeric column of a [`SeriesTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesColumn {
    pub name: String,
    /// One value per index row; `None` for missing cells.
    pub values: Vec<Option<f64>>,
}

/// A date-indexed table of pre-computed values (returns, volatility, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesTable {
    pub index: Vec<NaiveDate>,
    pub columns: Vec<SeriesColumn>,
}

impl SeriesTable {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Look up a column by exact name.
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in file order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Non-missing `(date, value)` pairs of a column.
    pub fn points(&self, name: &str) -> Option<Vec<(NaiveDate, f64)>> {
        let values = self.column(name)?;
        Some(
            self.index
                .iter()
                .zip(values)
                .filter_map(|(date, value)| value.map(|v| (*date, v)))
                .collect(),
        )
    }
}
