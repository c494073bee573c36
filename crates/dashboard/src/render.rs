//! Chart view assembly for each dashboard page.

use crate::commentary::{CommentBlock, Commentary};
use crate::data::DashboardData;
use crate::view::{BarView, ChartView, CryptoBarsRequest, Panel, Point, Series, ViewRequest};
use chrono::SecondsFormat;
use tickbars_core::{ts_to_datetime, Bar, BarKind, Config, Error, Result, SeriesTable, TimestampMs};
use tickbars_ingestion::{build_bars, BarSet, BarSetParams};
use tracing::{debug, warn};

const NO_VOLATILITY_DATA: &str = "No volatility data available for the selected stocks.";

/// Render one page from already-loaded data.
pub fn render(
    data: &DashboardData,
    commentary: &Commentary,
    config: &Config,
    request: &ViewRequest,
) -> Result<ChartView> {
    Dashboard::new(data, commentary, config).render(request)
}

/// Borrowed view over everything rendering needs.
pub struct Dashboard<'a> {
    data: &'a DashboardData,
    commentary: &'a Commentary,
    config: &'a Config,
}

impl<'a> Dashboard<'a> {
    pub fn new(data: &'a DashboardData, commentary: &'a Commentary, config: &'a Config) -> Self {
        Self {
            data,
            commentary,
            config,
        }
    }

    pub fn render(&self, request: &ViewRequest) -> Result<ChartView> {
        debug!(?request, "rendering view");
        match request {
            ViewRequest::SimpleVsLog { stock } => self.simple_vs_log(stock),
            ViewRequest::Volatility { stocks } => self.volatility(stocks.as_deref()),
            ViewRequest::AdjustedVsNominal { stock } => self.adjusted_vs_nominal(stock),
            ViewRequest::CryptoBars(req) => self.crypto_bars(req),
        }
    }

    fn check_stock(&self, stock: &str) -> Result<()> {
        if self.config.stocks.iter().any(|s| s == stock) {
            Ok(())
        } else {
            Err(Error::config(format!("unknown stock: {stock}")))
        }
    }

    fn simple_vs_log(&self, stock: &str) -> Result<ChartView> {
        self.check_stock(stock)?;
        let returns = &self.data.returns;

        let mut view = ChartView::new("Simple vs Log Returns");
        for (suffix, kind, color) in [("simple.return", "Simple", "blue"), ("log.return", "Log", "red")] {
            let points = percent_points(returns, &format!("{stock}_{suffix}"), true)?;
            let mut panel =
                Panel::new(format!("{kind} Returns for {stock}")).with_axes("Date", "Return (%)");
            panel.push_series(Series {
                label: format!("{kind} Return"),
                color: Some(color.to_string()),
                points,
            });
            view.panels.push(panel);
        }
        view.commentary
            .push(CommentBlock::single(self.commentary.stock_comment(stock)));
        Ok(view)
    }

    fn volatility(&self, stocks: Option<&[String]>) -> Result<ChartView> {
        let selected = stocks.unwrap_or(self.config.stocks.as_slice());

        let mut panel =
            Panel::new("Annualized Volatility Over Time").with_axes("Date", "Volatility");
        for stock in selected {
            self.check_stock(stock)?;
            // Stocks without a volatility column are left out rather than failing the page.
            let Some(points) = self.data.volatility.points(&format!("{stock}_rv")) else {
                continue;
            };
            panel.push_series(Series {
                label: stock.clone(),
                color: None,
                points: points
                    .into_iter()
                    .map(|(date, y)| Point {
                        x: date.to_string(),
                        y,
                    })
                    .collect(),
            });
        }

        let mut view = ChartView::new("Annualized Volatility Comparison");
        if panel.series.is_empty() {
            warn!(?selected, "no volatility columns for selection");
            view.notice = Some(NO_VOLATILITY_DATA.to_string());
            return Ok(view);
        }
        view.panels.push(panel);
        view.commentary.push(self.commentary.volatility.clone());
        Ok(view)
    }

    fn adjusted_vs_nominal(&self, stock: &str) -> Result<ChartView> {
        self.check_stock(stock)?;
        let monthly = &self.data.monthly_returns;

        let mut panel = Panel::new(format!(
            "Monthly Adjusted vs Non-Adjusted Returns for {stock}"
        ))
        .with_axes("Date", "Return");
        for (suffix, label) in [
            ("simple.return", "Non-Adjusted Return"),
            ("real.return", "Inflation Adjusted Return"),
        ] {
            panel.push_series(Series {
                label: label.to_string(),
                color: None,
                points: percent_points(monthly, &format!("{stock}_{suffix}"), false)?,
            });
        }

        let mut view = ChartView::new("Adjusted vs Non-Adjusted Returns");
        view.panels.push(panel);
        view.commentary.push(self.commentary.inflation.clone());
        Ok(view)
    }

    fn crypto_bars(&self, req: &CryptoBarsRequest) -> Result<ChartView> {
        let params = req.resolve(&self.config.menu)?;
        let trades = self.data.trades(req.asset)?;

        let bars_by_kind: Vec<(BarKind, Vec<Bar>)> = match req.view {
            BarView::All => {
                let set = BarSet::build(trades, &params)?;
                BarKind::ALL
                    .iter()
                    .map(|kind| (*kind, set.get(*kind).to_vec()))
                    .collect()
            }
            single => single
                .kinds()
                .into_iter()
                .map(|kind| -> Result<(BarKind, Vec<Bar>)> {
                    Ok((kind, build_bars(trades, &params.rule(kind))?))
                })
                .collect::<Result<_>>()?,
        };

        let title = match req.view {
            BarView::All => format!("{} - Bars Analysis", req.asset),
            _ => "Crypto Bars Analysis".to_string(),
        };
        let mut view = ChartView::new(title);
        for (kind, bars) in bars_by_kind {
            let label = bar_panel_title(kind, &params);
            if bars.is_empty() {
                warn!(asset = %req.asset, ?kind, "no bars to plot");
            }

            let mut panel = Panel::new(label.clone());
            panel.push_series(Series {
                label,
                color: bar_color(kind).map(str::to_string),
                points: bars
                    .iter()
                    .map(|bar| Point {
                        x: format_ts(bar.ts_ms),
                        y: bar.close,
                    })
                    .collect(),
            });
            view.panels.push(panel);
        }

        match req.view {
            BarView::All => view.commentary.extend(self.commentary.all_bars.iter().cloned()),
            single => view.commentary.extend(
                single
                    .kinds()
                    .into_iter()
                    .filter_map(|kind| self.commentary.bars(kind).cloned()),
            ),
        }

        if view.is_empty() {
            view.notice = Some(format!("No trades available for {}.", req.asset));
        }
        Ok(view)
    }
}

/// Panel title and legend label of one bar chart.
pub fn bar_panel_title(kind: BarKind, params: &BarSetParams) -> String {
    let name = kind.display_name();
    match kind {
        BarKind::Time => format!("{name} ({})", time_frame_label(params.time_frame_minutes)),
        BarKind::Tick => format!("{name} (Every {} Trades)", params.tick_count),
        BarKind::Volume => format!("{name} (Every {} Volume)", params.volume_threshold),
        BarKind::Dollar => format!("{name} (Every {} USDT)", params.dollar_threshold),
    }
}

fn time_frame_label(minutes: u32) -> String {
    if minutes == 1 {
        "1 Minute".to_string()
    } else {
        format!("{minutes} Minutes")
    }
}

fn bar_color(kind: BarKind) -> Option<&'static str> {
    match kind {
        BarKind::Time => None,
        BarKind::Tick => Some("orange"),
        BarKind::Volume => Some("green"),
        BarKind::Dollar => Some("red"),
    }
}

fn format_ts(ts_ms: TimestampMs) -> String {
    ts_to_datetime(ts_ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| ts_ms.to_string())
}

/// Round to two decimals, ties to even.
fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Column values scaled from fractions to percent, optionally rounded to 2 dp.
fn percent_points(table: &SeriesTable, column: &str, round: bool) -> Result<Vec<Point>> {
    let points = table
        .points(column)
        .ok_or_else(|| Error::data(format!("missing column '{column}'")))?;
    Ok(points
        .into_iter()
        .map(|(date, value)| {
            let pct = value * 100.0;
            Point {
                x: date.to_string(),
                y: if round { round_2dp(pct) } else { pct },
            }
        })
        .collect())
}
