//! PyO3 bindings for tickbars Rust components.
//!
//! Exposes the Rust implementations to the Python dashboard front end:
//! - Trade table loading
//! - Bar construction (time, tick, volume, dollar)
//! - Chart view rendering as JSON

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use tickbars_core::{
    Bar as RustBar, BarRule, Config as RustConfig, Error as RustError, Trade as RustTrade,
    MS_PER_MINUTE,
};
use tickbars_dashboard::{Commentary, DashboardData, ViewRequest};
use tickbars_ingestion::BarBuilder;

fn to_py_err(err: RustError) -> PyErr {
    match err {
        RustError::Io(e) => PyIOError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Build a rule from a menu name and a numeric parameter.
///
/// Time bars take their parameter in minutes; tick bars need a whole count.
fn parse_rule(rule: &str, parameter: f64) -> PyResult<BarRule> {
    let rule = match rule.to_ascii_lowercase().as_str() {
        "time" | "price" => BarRule::Time {
            interval_ms: (parameter * MS_PER_MINUTE as f64).round() as i64,
        },
        "tick" => {
            if parameter.fract() != 0.0 || parameter < 0.0 {
                return Err(PyValueError::new_err(format!(
                    "tick count must be a whole number, got {parameter}"
                )));
            }
            BarRule::Tick {
                count: parameter as usize,
            }
        }
        "volume" => BarRule::Volume {
            threshold: parameter,
        },
        "dollar" => BarRule::Dollar {
            threshold: parameter,
        },
        other => {
            return Err(PyValueError::new_err(format!(
                "unknown bar rule '{other}' (expected time, tick, volume or dollar)"
            )))
        }
    };
    rule.validate().map_err(to_py_err)?;
    Ok(rule)
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// A single executed trade.
#[pyclass]
#[derive(Clone)]
pub struct Trade {
    #[pyo3(get, set)]
    pub ts_ms: i64,
    #[pyo3(get, set)]
    pub price: f64,
    #[pyo3(get, set)]
    pub volume: f64,
}

#[pymethods]
impl Trade {
    #[new]
    fn new(ts_ms: i64, price: f64, volume: f64) -> Self {
        Trade {
            ts_ms,
            price,
            volume,
        }
    }

    #[getter]
    fn dollar_value(&self) -> f64 {
        self.price * self.volume
    }

    fn __repr__(&self) -> String {
        format!(
            "Trade(ts_ms={}, price={}, volume={})",
            self.ts_ms, self.price, self.volume
        )
    }
}

impl From<&Trade> for RustTrade {
    fn from(t: &Trade) -> Self {
        RustTrade::new(t.ts_ms, t.price, t.volume)
    }
}

impl From<RustTrade> for Trade {
    fn from(t: RustTrade) -> Self {
        Trade {
            ts_ms: t.ts_ms,
            price: t.price,
            volume: t.volume,
        }
    }
}

/// OHLC bar; `ts_ms` is the timestamp of its last trade.
#[pyclass]
#[derive(Clone)]
pub struct Bar {
    #[pyo3(get)]
    pub ts_ms: i64,
    #[pyo3(get)]
    pub open: f64,
    #[pyo3(get)]
    pub high: f64,
    #[pyo3(get)]
    pub low: f64,
    #[pyo3(get)]
    pub close: f64,
    #[pyo3(get)]
    pub volume: f64,
    #[pyo3(get)]
    pub trade_count: u32,
}

#[pymethods]
impl Bar {
    #[getter]
    fn range(&self) -> f64 {
        self.high - self.low
    }

    fn __repr__(&self) -> String {
        format!(
            "Bar(ts_ms={}, o={}, h={}, l={}, c={}, n={})",
            self.ts_ms, self.open, self.high, self.low, self.close, self.trade_count
        )
    }
}

impl From<RustBar> for Bar {
    fn from(b: RustBar) -> Self {
        Bar {
            ts_ms: b.ts_ms,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            volume: b.volume,
            trade_count: b.trade_count,
        }
    }
}

// ============================================================================
// Bar Builder
// ============================================================================

/// Incremental bar builder.
#[pyclass(name = "BarBuilder")]
pub struct PyBarBuilder {
    inner: BarBuilder,
}

#[pymethods]
impl PyBarBuilder {
    #[new]
    fn new(rule: &str, parameter: f64) -> PyResult<Self> {
        let rule = parse_rule(rule, parameter)?;
        Ok(PyBarBuilder {
            inner: BarBuilder::new(rule).map_err(to_py_err)?,
        })
    }

    /// Add a trade; returns the bar it closed, if any.
    fn add_trade(&mut self, trade: &Trade) -> PyResult<Option<Bar>> {
        let closed = self.inner.add_trade(&trade.into()).map_err(to_py_err)?;
        Ok(closed.map(Bar::from))
    }

    /// The bar still being built.
    fn pending_bar(&self) -> Option<Bar> {
        self.inner.pending_bar().map(Bar::from)
    }

    /// Number of trades accepted so far.
    fn trade_count(&self) -> usize {
        self.inner.trade_count()
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Build bars from trades under a rule: "time" (minutes), "tick", "volume" or "dollar".
#[pyfunction]
fn build_bars(trades: Vec<Trade>, rule: &str, parameter: f64) -> PyResult<Vec<Bar>> {
    let rule = parse_rule(rule, parameter)?;
    let trades: Vec<RustTrade> = trades.iter().map(RustTrade::from).collect();
    let bars = tickbars_ingestion::build_bars(&trades, &rule).map_err(to_py_err)?;
    Ok(bars.into_iter().map(Bar::from).collect())
}

/// Load a trade table (time, price, volume) from a CSV file.
#[pyfunction]
fn load_trades(path: &str) -> PyResult<Vec<Trade>> {
    let trades = tickbars_ingestion::load_trades(path).map_err(to_py_err)?;
    Ok(trades.into_iter().map(Trade::from).collect())
}

/// Render a dashboard page described by `request_json`, returning the chart view as JSON.
///
/// Every call loads the datasets afresh; callers that render repeatedly
/// should cache the result on the Python side.
#[pyfunction]
#[pyo3(signature = (request_json, config_path=None))]
fn render_view(request_json: &str, config_path: Option<&str>) -> PyResult<String> {
    let config = match config_path {
        Some(path) => RustConfig::from_json_file(path).map_err(to_py_err)?,
        None => RustConfig::default(),
    };
    let request: ViewRequest = serde_json::from_str(request_json)
        .map_err(|e| PyValueError::new_err(format!("invalid view request: {e}")))?;

    let data = DashboardData::load(&config).map_err(to_py_err)?;
    let commentary = Commentary::load(&config).map_err(to_py_err)?;
    let view = tickbars_dashboard::render(&data, &commentary, &config, &request)
        .map_err(to_py_err)?;
    serde_json::to_string(&view).map_err(|e| PyValueError::new_err(e.to_string()))
}

// ============================================================================
// Module Definition
// ============================================================================

/// tickbars - bar construction and dashboard views for Python.
#[pymodule]
fn tickbars(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<Trade>()?;
    m.add_class::<Bar>()?;
    m.add_class::<PyBarBuilder>()?;

    // Functions
    m.add_function(wrap_pyfunction!(build_bars, m)?)?;
    m.add_function(wrap_pyfunction!(load_trades, m)?)?;
    m.add_function(wrap_pyfunction!(render_view, m)?)?;

    Ok(())
}
