//! Narrative commentary shown under the charts.
//!
//! Commentary is configuration data: a JSON lookup table keyed by ticker and
//! bar kind. The built-in table is compiled in; a config may point at a
//! replacement file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tickbars_core::{BarKind, Config, Result};

const BUILTIN_COMMENTARY: &str = include_str!("../assets/commentary.json");

/// One remark, optionally introduced by a bold heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub heading: Option<String>,
    pub text: String,
}

/// A titled list of remarks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentBlock {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl CommentBlock {
    /// A block holding a single untitled remark.
    pub fn single(text: impl Into<String>) -> Self {
        Self {
            title: None,
            notes: vec![Note {
                heading: None,
                text: text.into(),
            }],
        }
    }
}

/// The full commentary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commentary {
    /// Per-ticker remark for the simple vs log returns page.
    #[serde(default)]
    pub stock_returns: BTreeMap<String, String>,
    /// Shown for tickers without a remark.
    pub stock_returns_fallback: String,
    #[serde(default)]
    pub volatility: CommentBlock,
    #[serde(default)]
    pub inflation: CommentBlock,
    #[serde(default)]
    pub bars: BTreeMap<BarKind, CommentBlock>,
    /// Shown under the combined page, in display order.
    #[serde(default)]
    pub all_bars: Vec<CommentBlock>,
}

impl Commentary {
    /// The table shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Ok(serde_json::from_str(BUILTIN_COMMENTARY)?)
    }

    /// Read a table from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The configured table, or the built-in one.
    pub fn load(config: &Config) -> Result<Self> {
        match &config.commentary_path {
            Some(path) => Self::from_json_file(path),
            None => Self::builtin(),
        }
    }

    pub fn stock_comment(&self, ticker: &str) -> &str {
        self.stock_returns
            .get(ticker)
            .map(String::as_str)
            .unwrap_or(&self.stock_returns_fallback)
    }

    pub fn bars(&self, kind: BarKind) -> Option<&CommentBlock> {
        self.bars.get(&kind)
    }
}
