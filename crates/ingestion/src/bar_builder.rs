//! Bar construction from trade ticks.
//!
//! Builds OHLC bars under four sampling rules: fixed time intervals, fixed
//! trade counts, cumulative volume and cumulative traded value. Every rule
//! assigns each trade a group key; consecutive trades sharing a key form one
//! bar, so groups always partition the trade sequence contiguously.

use serde::{Deserialize, Serialize};
use tickbars_core::{
    interval_index, Bar, BarKind, BarRule, Error, Result, TimestampMs, Trade,
};
use ordered_float::OrderedFloat;
use tracing::debug;

/// Build the bar sequence for `trades` under `rule`.
///
/// The rule is validated before anything else, so an invalid parameter is
/// reported even for empty input. Empty input yields an empty sequence.
pub fn build_bars(trades: &[Trade], rule: &BarRule) -> Result<Vec<Bar>> {
    let mut builder = BarBuilder::new(*rule)?;
    let mut bars = builder.add_trades(trades)?;
    bars.extend(builder.finish());

    debug!(
        kind = ?rule.kind(),
        trades = trades.len(),
        bars = bars.len(),
        "built bars"
    );
    Ok(bars)
}

/// A bar that's currently being built.
#[derive(Debug, Clone)]
struct BarInProgress {
    key: i64,
    open: f64,
    high: OrderedFloat<f64>,
    low: OrderedFloat<f64>,
    close: f64,
    last_ts_ms: TimestampMs,
    volume: f64,
    trade_count: u32,
}

impl BarInProgress {
    fn start(key: i64, trade: &Trade) -> Self {
        Self {
            key,
            open: trade.price,
            high: OrderedFloat(trade.price),
            low: OrderedFloat(trade.price),
            close: trade.price,
            last_ts_ms: trade.ts_ms,
            volume: trade.volume,
            trade_count: 1,
        }
    }

    fn add_trade(&mut self, trade: &Trade) {
        self.high = self.high.max(OrderedFloat(trade.price));
        self.low = self.low.min(OrderedFloat(trade.price));
        self.close = trade.price;
        self.last_ts_ms = trade.ts_ms;
        self.volume += trade.volume;
        self.trade_count = self.trade_count.saturating_add(1);
    }

    fn to_bar(&self) -> Bar {
        Bar {
            ts_ms: self.last_ts_ms,
            open: self.open,
            high: self.high.into_inner(),
            low: self.low.into_inner(),
            close: self.close,
            volume: self.volume,
            trade_count: self.trade_count,
        }
    }
}

/// Per-rule state that maps each arriving trade to its group key.
#[derive(Debug, Clone)]
enum GroupKeyer {
    Time {
        interval_ms: i64,
        last_ts_ms: Option<TimestampMs>,
    },
    Tick {
        count: usize,
    },
    /// Floor of a running total that is never reset at group boundaries.
    Cumulative {
        threshold: f64,
        total: f64,
        by_value: bool,
    },
}

impl GroupKeyer {
    fn new(rule: BarRule) -> Self {
        match rule {
            BarRule::Time { interval_ms } => GroupKeyer::Time {
                interval_ms,
                last_ts_ms: None,
            },
            BarRule::Tick { count } => GroupKeyer::Tick { count },
            BarRule::Volume { threshold } => GroupKeyer::Cumulative {
                threshold,
                total: 0.0,
                by_value: false,
            },
            BarRule::Dollar { threshold } => GroupKeyer::Cumulative {
                threshold,
                total: 0.0,
                by_value: true,
            },
        }
    }

    /// Group key of the trade at arrival position `index`.
    fn key(&mut self, index: usize, trade: &Trade) -> Result<i64> {
        match self {
            GroupKeyer::Time {
                interval_ms,
                last_ts_ms,
            } => {
                if let Some(prev) = *last_ts_ms {
                    if trade.ts_ms < prev {
                        return Err(Error::data(format!(
                            "time bars require chronologically sorted trades: \
                             trade #{index} at {} ms precedes {prev} ms",
                            trade.ts_ms
                        )));
                    }
                }
                *last_ts_ms = Some(trade.ts_ms);
                Ok(interval_index(trade.ts_ms, *interval_ms))
            }
            GroupKeyer::Tick { count } => Ok((index / *count) as i64),
            GroupKeyer::Cumulative {
                threshold,
                total,
                by_value,
            } => {
                *total += if *by_value {
                    trade.dollar_value()
                } else {
                    trade.volume
                };
                Ok((*total / *threshold).floor() as i64)
            }
        }
    }
}

/// Incremental builder producing bars as trades arrive.
///
/// A bar is emitted when the first trade of the next group arrives; call
/// [`BarBuilder::finish`] to flush the last, possibly partial, group.
#[derive(Debug, Clone)]
pub struct BarBuilder {
    keyer: GroupKeyer,
    current: Option<BarInProgress>,
    /// Trades accepted so far (arrival index of the next trade).
    seen: usize,
}

impl BarBuilder {
    /// Create a builder, rejecting invalid rule parameters.
    pub fn new(rule: BarRule) -> Result<Self> {
        rule.validate()?;
        Ok(Self {
            keyer: GroupKeyer::new(rule),
            current: None,
            seen: 0,
        })
    }

    /// Add a trade, returning the bar it closed, if any.
    ///
    /// A rejected trade leaves the builder unchanged.
    pub fn add_trade(&mut self, trade: &Trade) -> Result<Option<Bar>> {
        trade.validate(self.seen)?;
        let key = self.keyer.key(self.seen, trade)?;
        self.seen += 1;

        match self.current.as_mut() {
            Some(bar) if bar.key == key => {
                bar.add_trade(trade);
                Ok(None)
            }
            _ => {
                let completed = self.current.replace(BarInProgress::start(key, trade));
                Ok(completed.map(|b| b.to_bar()))
            }
        }
    }

    /// Add multiple trades, collecting every bar they close.
    pub fn add_trades(&mut self, trades: &[Trade]) -> Result<Vec<Bar>> {
        let mut completed = Vec::new();
        for trade in trades {
            completed.extend(self.add_trade(trade)?);
        }
        Ok(completed)
    }

    /// Snapshot of the group still being built.
    pub fn pending_bar(&self) -> Option<Bar> {
        self.current.as_ref().map(BarInProgress::to_bar)
    }

    /// Number of trades accepted so far.
    pub fn trade_count(&self) -> usize {
        self.seen
    }

    /// Consume the builder and return the last group's bar.
    pub fn finish(self) -> Option<Bar> {
        self.current.map(|b| b.to_bar())
    }
}

/// Parameters for building all four bar kinds at once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarSetParams {
    pub time_frame_minutes: u32,
    pub tick_count: usize,
    pub volume_threshold: f64,
    pub dollar_threshold: f64,
}

impl BarSetParams {
    /// The rule used for `kind`.
    pub fn rule(&self, kind: BarKind) -> BarRule {
        match kind {
            BarKind::Time => BarRule::time_minutes(self.time_frame_minutes),
            BarKind::Tick => BarRule::Tick {
                count: self.tick_count,
            },
            BarKind::Volume => BarRule::Volume {
                threshold: self.volume_threshold,
            },
            BarKind::Dollar => BarRule::Dollar {
                threshold: self.dollar_threshold,
            },
        }
    }
}

impl Default for BarSetParams {
    fn default() -> Self {
        Self {
            time_frame_minutes: 1,
            tick_count: 20,
            volume_threshold: 10.0,
            dollar_threshold: 10_000.0,
        }
    }
}

/// Bars of the same trades under every sampling rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarSet {
    pub time: Vec<Bar>,
    pub tick: Vec<Bar>,
    pub volume: Vec<Bar>,
    pub dollar: Vec<Bar>,
}

impl BarSet {
    /// Build all four sequences. Every rule is validated before any work.
    pub fn build(trades: &[Trade], params: &BarSetParams) -> Result<Self> {
        for kind in BarKind::ALL {
            params.rule(kind).validate()?;
        }
        Ok(Self {
            time: build_bars(trades, &params.rule(BarKind::Time))?,
            tick: build_bars(trades, &params.rule(BarKind::Tick))?,
            volume: build_bars(trades, &params.rule(BarKind::Volume))?,
            dollar: build_bars(trades, &params.rule(BarKind::Dollar))?,
        })
    }

    /// Bars of one kind.
    pub fn get(&self, kind: BarKind) -> &[Bar] {
        match kind {
            BarKind::Time => &self.time,
            BarKind::Tick => &self.tick,
            BarKind::Volume => &self.volume,
            BarKind::Dollar => &self.dollar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_trade(ts_ms: i64, price: f64, volume: f64) -> Trade {
        Trade::new(ts_ms, price, volume)
    }

    fn at(h: u32, m: u32, s: u32) -> i64 {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    /// Deterministic pseudo-random trades (LCG) with strictly increasing timestamps.
    fn random_trades(seed: u64, n: usize) -> Vec<Trade> {
        let mut state = seed;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as f64 / (1u64 << 31) as f64
        };
        let mut ts = at(9, 0, 0);
        let mut price = 100.0;
        (0..n)
            .map(|_| {
                ts += 1 + (next() * 20_000.0) as i64;
                price *= 1.0 + (next() - 0.5) * 0.01;
                make_trade(ts, price, 0.01 + next() * 5.0)
            })
            .collect()
    }

    fn all_rules() -> Vec<BarRule> {
        vec![
            BarRule::time_minutes(1),
            BarRule::time_minutes(5),
            BarRule::Tick { count: 3 },
            BarRule::Tick { count: 20 },
            BarRule::Volume { threshold: 10.0 },
            BarRule::Dollar { threshold: 2_000.0 },
        ]
    }

    #[test]
    fn test_ohlc_bounds_hold_for_every_rule() {
        for seed in 1..6 {
            let trades = random_trades(seed, 250);
            for rule in all_rules() {
                let bars = build_bars(&trades, &rule).unwrap();
                assert!(!bars.is_empty());
                for bar in &bars {
                    assert!(bar.is_well_formed(), "{rule:?} produced {bar:?}");
                }
            }
        }
    }

    #[test]
    fn test_groups_partition_trades() {
        let trades = random_trades(42, 300);
        for rule in all_rules() {
            let bars = build_bars(&trades, &rule).unwrap();
            let total: u32 = bars.iter().map(|b| b.trade_count).sum();
            assert_eq!(total as usize, trades.len(), "{rule:?}");
            let volume: f64 = bars.iter().map(|b| b.volume).sum();
            let expected: f64 = trades.iter().map(|t| t.volume).sum();
            assert_relative_eq!(volume, expected, epsilon = 1e-9);
            // Open of the first bar and close of the last bar are the sequence endpoints.
            assert_eq!(bars[0].open, trades[0].price);
            assert_eq!(bars.last().unwrap().close, trades.last().unwrap().price);
            assert_eq!(bars.last().unwrap().ts_ms, trades.last().unwrap().ts_ms);
        }
    }

    #[test]
    fn test_tick_bars_short_final_group() {
        let trades: Vec<Trade> = (0..7).map(|i| make_trade(i, 10.0 + i as f64, 1.0)).collect();
        let bars = build_bars(&trades, &BarRule::Tick { count: 3 }).unwrap();

        let sizes: Vec<u32> = bars.iter().map(|b| b.trade_count).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(bars[0].open, 10.0);
        assert_eq!(bars[0].close, 12.0);
        assert_eq!(bars[2].open, 16.0);
        assert_eq!(bars[2].close, 16.0);
        assert_eq!(bars[2].ts_ms, 6);
    }

    #[test]
    fn test_tick_bars_exact_groups() {
        let trades: Vec<Trade> = (0..9).map(|i| make_trade(i, 5.0, 1.0)).collect();
        let bars = build_bars(&trades, &BarRule::Tick { count: 3 }).unwrap();
        let sizes: Vec<u32> = bars.iter().map(|b| b.trade_count).collect();
        assert_eq!(sizes, vec![3, 3, 3]);
    }

    #[test]
    fn test_tick_bars_ignore_timestamp_order() {
        let trades = vec![
            make_trade(300, 1.0, 1.0),
            make_trade(100, 2.0, 1.0),
            make_trade(200, 3.0, 1.0),
        ];
        let bars = build_bars(&trades, &BarRule::Tick { count: 2 }).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].ts_ms, 100);
        assert_eq!(bars[1].ts_ms, 200);
    }

    #[test]
    fn test_tick_concatenation_at_group_boundary() {
        let trades = random_trades(7, 60);
        let rule = BarRule::Tick { count: 6 };
        let whole = build_bars(&trades, &rule).unwrap();

        for split in [0, 6, 18, 36, 60] {
            let mut joined = build_bars(&trades[..split], &rule).unwrap();
            joined.extend(build_bars(&trades[split..], &rule).unwrap());
            assert_eq!(joined, whole, "split at {split}");
        }
    }

    #[test]
    fn test_volume_bars_floor_of_running_total() {
        // Cumulative volumes 4, 8, 12: floors 0, 0, 1.
        let trades = vec![
            make_trade(1, 100.0, 4.0),
            make_trade(2, 101.0, 4.0),
            make_trade(3, 99.0, 4.0),
        ];
        let bars = build_bars(&trades, &BarRule::Volume { threshold: 10.0 }).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].trade_count, 2);
        assert_eq!(bars[0].close, 101.0);
        assert_eq!(bars[0].high, 101.0);
        assert_eq!(bars[1].trade_count, 1);
        assert_eq!(bars.last().unwrap().close, trades[2].price);
    }

    #[test]
    fn test_volume_total_is_not_reset_at_boundaries() {
        // Running totals 25, 26, 30: floors 2, 2, 3.
        let trades = vec![
            make_trade(1, 10.0, 25.0),
            make_trade(2, 11.0, 1.0),
            make_trade(3, 12.0, 4.0),
        ];
        let bars = build_bars(&trades, &BarRule::Volume { threshold: 10.0 }).unwrap();
        let sizes: Vec<u32> = bars.iter().map(|b| b.trade_count).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[test]
    fn test_dollar_bars_single_trade() {
        let trades = vec![make_trade(1_000, 10.0, 1000.0)];
        let bars = build_bars(&trades, &BarRule::Dollar { threshold: 5000.0 }).unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].open, 10.0);
        assert_eq!(bars[0].close, 10.0);
        assert_eq!(bars[0].ts_ms, 1_000);
    }

    #[test]
    fn test_dollar_bars_group_by_value() {
        // Values 500, 600, 1000, 100: totals 500, 1100, 2100, 2200 -> floors 0, 1, 2, 2.
        let trades = vec![
            make_trade(1, 50.0, 10.0),
            make_trade(2, 60.0, 10.0),
            make_trade(3, 100.0, 10.0),
            make_trade(4, 10.0, 10.0),
        ];
        let bars = build_bars(&trades, &BarRule::Dollar { threshold: 1000.0 }).unwrap();
        let sizes: Vec<u32> = bars.iter().map(|b| b.trade_count).collect();
        assert_eq!(sizes, vec![1, 1, 2]);
        assert_eq!(bars[2].open, 100.0);
        assert_eq!(bars[2].low, 10.0);
    }

    #[test]
    fn test_empty_input_for_every_rule() {
        for rule in all_rules() {
            assert!(build_bars(&[], &rule).unwrap().is_empty());
        }
    }

    #[test]
    fn test_invalid_rule_rejected_before_aggregation() {
        let err = build_bars(&[], &BarRule::Volume { threshold: 0.0 }).unwrap_err();
        assert!(err.is_config());
        assert!(BarBuilder::new(BarRule::Tick { count: 0 }).is_err());
        assert!(BarBuilder::new(BarRule::Time { interval_ms: -60_000 }).is_err());
    }

    #[test]
    fn test_time_bars_skip_nothing_inside_minute() {
        let trades = vec![
            make_trade(at(9, 0, 0), 100.0, 1.0),
            make_trade(at(9, 0, 30), 102.0, 1.0),
            make_trade(at(9, 1, 10), 101.0, 1.0),
        ];
        let bars = build_bars(&trades, &BarRule::time_minutes(1)).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].close, 102.0);
        assert_eq!(bars[0].ts_ms, at(9, 0, 30));
        assert_eq!(bars[1].open, 101.0);
        assert_eq!(bars[1].close, 101.0);
        assert_eq!(bars[1].ts_ms, at(9, 1, 10));
    }

    #[test]
    fn test_time_bars_skip_empty_intervals() {
        let trades = vec![
            make_trade(at(9, 0, 5), 1.0, 1.0),
            make_trade(at(9, 14, 0), 2.0, 1.0),
            make_trade(at(9, 16, 0), 3.0, 1.0),
        ];
        let bars = build_bars(&trades, &BarRule::time_minutes(5)).unwrap();
        // 09:00-09:05, 09:10-09:15, 09:15-09:20; nothing for 09:05-09:10.
        assert_eq!(bars.len(), 3);
    }

    #[test]
    fn test_time_bars_reject_unsorted_input() {
        let trades = vec![
            make_trade(at(9, 1, 0), 1.0, 1.0),
            make_trade(at(9, 0, 0), 2.0, 1.0),
        ];
        let err = build_bars(&trades, &BarRule::time_minutes(1)).unwrap_err();
        assert!(err.is_data());
        assert!(err.to_string().contains("trade #1"));
    }

    #[test]
    fn test_invalid_trade_rejected() {
        let trades = vec![make_trade(1, 10.0, 1.0), make_trade(2, 10.0, 0.0)];
        let err = build_bars(&trades, &BarRule::Tick { count: 5 }).unwrap_err();
        assert!(err.is_data());
    }

    #[test]
    fn test_builder_emits_on_group_change() {
        let mut builder = BarBuilder::new(BarRule::Tick { count: 2 }).unwrap();
        assert!(builder.add_trade(&make_trade(1, 1.0, 1.0)).unwrap().is_none());
        assert!(builder.add_trade(&make_trade(2, 3.0, 1.0)).unwrap().is_none());

        let closed = builder.add_trade(&make_trade(3, 2.0, 1.0)).unwrap().unwrap();
        assert_eq!(closed.high, 3.0);
        assert_eq!(closed.trade_count, 2);
        assert_eq!(builder.pending_bar().unwrap().open, 2.0);
        assert_eq!(builder.trade_count(), 3);

        let last = builder.finish().unwrap();
        assert_eq!(last.trade_count, 1);
    }

    #[test]
    fn test_add_trades_returns_closed_bars_only() {
        let trades: Vec<Trade> = (0..5).map(|i| make_trade(i, 1.0 + i as f64, 1.0)).collect();
        let mut builder = BarBuilder::new(BarRule::Tick { count: 2 }).unwrap();

        let closed = builder.add_trades(&trades).unwrap();
        assert_eq!(closed.len(), 2);
        assert_eq!(closed[1].open, 3.0);
        assert_eq!(builder.trade_count(), 5);
        assert_eq!(builder.finish().unwrap().trade_count, 1);
    }

    #[test]
    fn test_trade_count_saturates() {
        let trade = make_trade(1, 10.0, 1.0);
        let mut bar = BarInProgress::start(0, &trade);
        bar.trade_count = u32::MAX - 1;
        bar.add_trade(&trade);
        bar.add_trade(&trade);
        assert_eq!(bar.to_bar().trade_count, u32::MAX);
    }

    #[test]
    fn test_bar_set_matches_individual_builds() {
        let trades = random_trades(3, 120);
        let params = BarSetParams::default();
        let set = BarSet::build(&trades, &params).unwrap();

        for kind in BarKind::ALL {
            let expected = build_bars(&trades, &params.rule(kind)).unwrap();
            assert_eq!(set.get(kind), expected.as_slice());
        }
    }

    #[test]
    fn test_input_is_not_mutated() {
        let trades = random_trades(9, 40);
        let before = trades.clone();
        let first = build_bars(&trades, &BarRule::Volume { threshold: 7.5 }).unwrap();
        let second = build_bars(&trades, &BarRule::Volume { threshold: 7.5 }).unwrap();
        assert_eq!(trades, before);
        assert_eq!(first, second);
    }
}
