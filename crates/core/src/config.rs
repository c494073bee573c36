//! Configuration structures for the tickbars dashboard.

use crate::error::{Error, Result};
use crate::types::CryptoAsset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration for the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dataset locations.
    pub data: DataConfig,
    /// Equity tickers offered by the stock pages.
    pub stocks: Vec<String>,
    /// Choices offered by the crypto bars page.
    pub menu: MenuConfig,
    /// Commentary table overriding the built-in one.
    pub commentary_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            stocks: ["FLG", "HWKN", "HON", "GS", "EA", "F", "GOOGL", "GE", "HD", "HLT"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            menu: MenuConfig::default(),
            commentary_path: None,
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every menu choice is usable as a bar parameter.
    pub fn validate(&self) -> Result<()> {
        if self.stocks.is_empty() {
            return Err(Error::config("at least one stock must be configured"));
        }
        self.menu.validate()
    }
}

/// Where the pre-computed datasets live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding every dataset file.
    pub data_dir: PathBuf,
    /// Daily simple/log returns table.
    pub returns_file: String,
    /// Realized volatility table.
    pub volatility_file: String,
    /// Monthly nominal/real returns table.
    pub monthly_returns_file: String,
    /// Trade table per crypto asset.
    pub trade_files: BTreeMap<CryptoAsset, String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            returns_file: "data_with_returns.csv".to_string(),
            volatility_file: "realized_volatility.csv".to_string(),
            monthly_returns_file: "monthly_returns_with_inflation_adjusted.csv".to_string(),
            trade_files: CryptoAsset::ALL
                .iter()
                .map(|asset| (*asset, asset.default_trade_file()))
                .collect(),
        }
    }
}

impl DataConfig {
    pub fn returns_path(&self) -> PathBuf {
        self.data_dir.join(&self.returns_file)
    }

    pub fn volatility_path(&self) -> PathBuf {
        self.data_dir.join(&self.volatility_file)
    }

    pub fn monthly_returns_path(&self) -> PathBuf {
        self.data_dir.join(&self.monthly_returns_file)
    }

    /// Path of an asset's trade table, if the asset is configured.
    pub fn trade_path(&self, asset: CryptoAsset) -> Option<PathBuf> {
        self.trade_files.get(&asset).map(|f| self.data_dir.join(f))
    }
}

/// Enumerated choices of the crypto bars page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    /// Trades per tick bar.
    pub tick_counts: Vec<usize>,
    /// Time bar widths in minutes.
    pub time_frames_minutes: Vec<u32>,
    /// Volume bar thresholds.
    pub volume_thresholds: Vec<f64>,
    /// Dollar bar thresholds (USDT).
    pub dollar_thresholds: Vec<f64>,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            tick_counts: vec![20, 30, 50],
            time_frames_minutes: vec![1, 5, 15],
            volume_thresholds: vec![10.0, 30.0, 70.0],
            dollar_thresholds: vec![10_000.0, 20_000.0, 50_000.0],
        }
    }
}

impl MenuConfig {
    /// Every list must be non-empty and hold only positive values.
    pub fn validate(&self) -> Result<()> {
        if self.tick_counts.is_empty() || self.tick_counts.contains(&0) {
            return Err(Error::config("tick counts must be non-empty and positive"));
        }
        if self.time_frames_minutes.is_empty() || self.time_frames_minutes.contains(&0) {
            return Err(Error::config("time frames must be non-empty and positive"));
        }
        for (name, values) in [
            ("volume thresholds", &self.volume_thresholds),
            ("dollar thresholds", &self.dollar_thresholds),
        ] {
            if values.is_empty() || values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err(Error::config(format!("{name} must be non-empty and positive")));
            }
        }
        Ok(())
    }

    pub fn check_tick_count(&self, count: usize) -> Result<()> {
        if self.tick_counts.contains(&count) {
            Ok(())
        } else {
            Err(Error::config(format!(
                "tick count {count} is not one of {:?}",
                self.tick_counts
            )))
        }
    }

    pub fn check_time_frame(&self, minutes: u32) -> Result<()> {
        if self.time_frames_minutes.contains(&minutes) {
            Ok(())
        } else {
            Err(Error::config(format!(
                "time frame {minutes}m is not one of {:?}",
                self.time_frames_minutes
            )))
        }
    }

    pub fn check_volume_threshold(&self, threshold: f64) -> Result<()> {
        check_choice("volume threshold", threshold, &self.volume_thresholds)
    }

    pub fn check_dollar_threshold(&self, threshold: f64) -> Result<()> {
        check_choice("dollar threshold", threshold, &self.dollar_thresholds)
    }
}

fn check_choice(name: &str, value: f64, choices: &[f64]) -> Result<()> {
    // Menu values are small integers written in JSON, so exact comparison holds.
    if choices.iter().any(|c| *c == value) {
        Ok(())
    } else {
        Err(Error::config(format!("{name} {value} is not one of {choices:?}")))
    }
}
