//! Page selections and the chart descriptions they produce.

use crate::commentary::CommentBlock;
use serde::{Deserialize, Serialize};
use tickbars_core::config::MenuConfig;
use tickbars_core::{BarKind, CryptoAsset, Result};
use tickbars_ingestion::BarSetParams;

/// A dashboard page together with its sidebar selections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum ViewRequest {
    /// Daily simple and log returns of one stock.
    SimpleVsLog { stock: String },
    /// Realized volatility of several stocks. Absent means every configured stock.
    Volatility {
        #[serde(default)]
        stocks: Option<Vec<String>>,
    },
    /// Monthly nominal vs inflation-adjusted returns of one stock.
    AdjustedVsNominal { stock: String },
    /// Bars built from one asset's trades.
    CryptoBars(CryptoBarsRequest),
}

/// Which bar charts the crypto page shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarView {
    #[default]
    All,
    Price,
    Tick,
    Volume,
    Dollar,
}

impl BarView {
    /// Bar kinds shown, in panel order.
    pub fn kinds(self) -> Vec<BarKind> {
        match self {
            BarView::All => BarKind::ALL.to_vec(),
            BarView::Price => vec![BarKind::Time],
            BarView::Tick => vec![BarKind::Tick],
            BarView::Volume => vec![BarKind::Volume],
            BarView::Dollar => vec![BarKind::Dollar],
        }
    }
}

/// Selections of the crypto bars page. Unset parameters take the first menu choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoBarsRequest {
    pub asset: CryptoAsset,
    #[serde(default)]
    pub view: BarView,
    #[serde(default)]
    pub tick_count: Option<usize>,
    #[serde(default)]
    pub time_frame_minutes: Option<u32>,
    #[serde(default)]
    pub volume_threshold: Option<f64>,
    #[serde(default)]
    pub dollar_threshold: Option<f64>,
}

impl CryptoBarsRequest {
    pub fn new(asset: CryptoAsset, view: BarView) -> Self {
        Self {
            asset,
            view,
            tick_count: None,
            time_frame_minutes: None,
            volume_threshold: None,
            dollar_threshold: None,
        }
    }

    /// Fill defaults from the menu and reject values the menu does not offer.
    pub fn resolve(&self, menu: &MenuConfig) -> Result<BarSetParams> {
        let defaults = BarSetParams::default();
        let params = BarSetParams {
            tick_count: self
                .tick_count
                .or_else(|| menu.tick_counts.first().copied())
                .unwrap_or(defaults.tick_count),
            time_frame_minutes: self
                .time_frame_minutes
                .or_else(|| menu.time_frames_minutes.first().copied())
                .unwrap_or(defaults.time_frame_minutes),
            volume_threshold: self
                .volume_threshold
                .or_else(|| menu.volume_thresholds.first().copied())
                .unwrap_or(defaults.volume_threshold),
            dollar_threshold: self
                .dollar_threshold
                .or_else(|| menu.dollar_thresholds.first().copied())
                .unwrap_or(defaults.dollar_threshold),
        };
        menu.check_tick_count(params.tick_count)?;
        menu.check_time_frame(params.time_frame_minutes)?;
        menu.check_volume_threshold(params.volume_threshold)?;
        menu.check_dollar_threshold(params.dollar_threshold)?;
        Ok(params)
    }
}

/// One plotted point. `x` is an ISO date or timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: String,
    pub y: f64,
}

/// A labelled line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub label: String,
    /// Renderer default when absent.
    pub color: Option<String>,
    pub points: Vec<Point>,
}

/// One set of axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub title: String,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub series: Vec<Series>,
    /// Set when there is nothing to plot; the renderer shows a placeholder.
    pub no_data: bool,
}

impl Panel {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: None,
            y_label: None,
            series: Vec::new(),
            no_data: false,
        }
    }

    pub fn with_axes(mut self, x_label: &str, y_label: &str) -> Self {
        self.x_label = Some(x_label.to_string());
        self.y_label = Some(y_label.to_string());
        self
    }

    /// Add a series, marking the panel empty if no series has points.
    pub fn push_series(&mut self, series: Series) {
        self.series.push(series);
        self.no_data = self.series.iter().all(|s| s.points.is_empty());
    }
}

/// Everything a front end needs to draw one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartView {
    pub title: String,
    pub panels: Vec<Panel>,
    pub commentary: Vec<CommentBlock>,
    /// Message shown instead of, or above, the charts.
    pub notice: Option<String>,
}

impl ChartView {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            panels: Vec::new(),
            commentary: Vec::new(),
            notice: None,
        }
    }

    /// True when no panel has anything to plot.
    pub fn is_empty(&self) -> bool {
        self.panels.iter().all(|p| p.no_data)
    }
}
