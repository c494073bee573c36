//! Datasets loaded once at startup.

use std::collections::BTreeMap;
use tickbars_core::{Config, CryptoAsset, Error, Result, SeriesTable, Trade};
use tickbars_ingestion::{load_series_table, load_trades};
use tracing::info;

/// Every table the dashboard displays, read-only after loading.
#[derive(Debug, Clone, Default)]
pub struct DashboardData {
    /// Daily `<T>_simple.return` / `<T>_log.return` columns.
    pub returns: SeriesTable,
    /// `<T>_rv` columns.
    pub volatility: SeriesTable,
    /// Monthly `<T>_simple.return` / `<T>_real.return` columns.
    pub monthly_returns: SeriesTable,
    /// Raw trades per asset, in file order.
    pub trades: BTreeMap<CryptoAsset, Vec<Trade>>,
}

impl DashboardData {
    /// Read every configured dataset. Any missing or malformed file fails the load.
    pub fn load(config: &Config) -> Result<Self> {
        let data = &config.data;
        let returns = load_series_table(data.returns_path())?;
        let volatility = load_series_table(data.volatility_path())?;
        let monthly_returns = load_series_table(data.monthly_returns_path())?;

        let mut trades = BTreeMap::new();
        for asset in data.trade_files.keys().copied() {
            if let Some(path) = data.trade_path(asset) {
                trades.insert(asset, load_trades(path)?);
            }
        }

        info!(
            returns_rows = returns.len(),
            volatility_rows = volatility.len(),
            monthly_rows = monthly_returns.len(),
            assets = trades.len(),
            "dashboard data loaded"
        );
        Ok(Self {
            returns,
            volatility,
            monthly_returns,
            trades,
        })
    }

    /// Trades of one asset.
    pub fn trades(&self, asset: CryptoAsset) -> Result<&[Trade]> {
        self.trades
            .get(&asset)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::data(format!("no trade table loaded for {asset}")))
    }
}
