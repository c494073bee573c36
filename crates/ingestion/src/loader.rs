//! CSV loading for trade tables and pre-computed series tables.
//!
//! Nothing is skipped: a malformed field is reported with its row and column
//! so a bad export cannot silently distort OHLC aggregates or charts.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::io::Read;
use std::path::Path;
use tickbars_core::{Error, Result, SeriesColumn, SeriesTable, TimestampMs, Trade};
use tracing::info;

/// Epoch values at or above this are taken as milliseconds, below as seconds.
const MS_EPOCH_CUTOFF: f64 = 1e11;

/// Parse a trade timestamp into milliseconds since the Unix epoch.
///
/// Accepts epoch milliseconds, epoch seconds (optionally fractional),
/// RFC 3339, and naive `YYYY-MM-DD HH:MM:SS[.fff]` / `YYYY-MM-DDTHH:MM:SS[.fff]`
/// taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<TimestampMs> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(ms) = s.parse::<i64>() {
        return Some(if ms.unsigned_abs() as f64 >= MS_EPOCH_CUTOFF {
            ms
        } else {
            ms * 1000
        });
    }
    if let Ok(secs) = s.parse::<f64>() {
        if !secs.is_finite() {
            return None;
        }
        let ms = if secs.abs() >= MS_EPOCH_CUTOFF { secs } else { secs * 1000.0 };
        return Some(ms.round() as i64);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Parse a series index cell: a date, a datetime (date part kept) or a `YYYY-MM` month.
pub fn parse_index_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Some(dt) = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok()
}

fn parse_number(field: &str, row: usize, column: &str) -> Result<f64> {
    field.trim().parse::<f64>().map_err(|_| {
        Error::data(format!(
            "row {row}: column '{column}' is not a number: {field:?}"
        ))
    })
}

/// Parse a price or volume, which must be finite and positive.
fn parse_positive(field: &str, row: usize, column: &str) -> Result<f64> {
    let value = parse_number(field, row, column)?;
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::data(format!(
            "row {row}: column '{column}' must be a positive number, got {value}"
        )));
    }
    Ok(value)
}

fn csv_error(context: &str, err: csv::Error) -> Error {
    Error::data(format!("{context}: {err}"))
}

/// Prefix a data error with the file it came from.
fn with_path(path: &Path, err: Error) -> Error {
    match err {
        Error::Data(msg) => Error::data(format!("{}: {msg}", path.display())),
        other => other,
    }
}

/// Position of a header, compared case-insensitively.
fn find_column(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::data(format!("missing required column '{name}'")))
}

/// Read a trade table (`time`, `price`, `volume`, extra columns ignored).
///
/// Rows keep file order, which is the arrival order used by tick, volume
/// and dollar bars.
pub fn read_trades<R: Read>(reader: R) -> Result<Vec<Trade>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers().map_err(|e| csv_error("reading header", e))?.clone();

    let time_col = find_column(&headers, "time")?;
    let price_col = find_column(&headers, "price")?;
    let volume_col = find_column(&headers, "volume")?;

    let mut trades = Vec::new();
    for (i, result) in reader.records().enumerate() {
        // Row numbers are 1-based and count the header line.
        let row = i + 2;
        let record = result.map_err(|e| csv_error(&format!("row {row}"), e))?;

        let time = record.get(time_col).unwrap_or("");
        let ts_ms = parse_timestamp(time).ok_or_else(|| {
            Error::data(format!("row {row}: unparseable timestamp {time:?}"))
        })?;
        let price = parse_positive(record.get(price_col).unwrap_or(""), row, "price")?;
        let volume = parse_positive(record.get(volume_col).unwrap_or(""), row, "volume")?;

        trades.push(Trade::new(ts_ms, price, volume));
    }
    Ok(trades)
}

/// Load a trade table from disk.
pub fn load_trades(path: impl AsRef<Path>) -> Result<Vec<Trade>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let trades = read_trades(file).map_err(|e| with_path(path, e))?;
    info!(path = %path.display(), trades = trades.len(), "loaded trade table");
    Ok(trades)
}

/// Read a date-indexed table whose first column is the index.
///
/// Empty and `NaN` cells become missing values; any other non-numeric cell
/// is an error.
pub fn read_series_table<R: Read>(reader: R) -> Result<SeriesTable> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers().map_err(|e| csv_error("reading header", e))?.clone();
    if headers.is_empty() {
        return Err(Error::data("series table has no columns"));
    }

    let mut table = SeriesTable {
        index: Vec::new(),
        columns: headers
            .iter()
            .skip(1)
            .map(|name| SeriesColumn {
                name: name.to_string(),
                values: Vec::new(),
            })
            .collect(),
    };

    for (i, result) in reader.records().enumerate() {
        let row = i + 2;
        let record = result.map_err(|e| csv_error(&format!("row {row}"), e))?;

        let raw_index = record.get(0).unwrap_or("");
        let date = parse_index_date(raw_index)
            .ok_or_else(|| Error::data(format!("row {row}: unparseable date {raw_index:?}")))?;
        table.index.push(date);

        for (j, column) in table.columns.iter_mut().enumerate() {
            let cell = record.get(j + 1).unwrap_or("");
            let value = if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
                None
            } else {
                Some(parse_number(cell, row, &column.name)?)
            };
            column.values.push(value);
        }
    }
    Ok(table)
}

/// Load a series table from disk.
pub fn load_series_table(path: impl AsRef<Path>) -> Result<SeriesTable> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let table = read_series_table(file).map_err(|e| with_path(path, e))?;
    info!(
        path = %path.display(),
        rows = table.len(),
        columns = table.columns.len(),
        "loaded series table"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = 1_709_283_600_000; // 2024-03-01 09:00:00 UTC
        assert_eq!(parse_timestamp("1709283600000"), Some(expected));
        assert_eq!(parse_timestamp("1709283600"), Some(expected));
        assert_eq!(parse_timestamp("1709283600.0"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 09:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T09:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T09:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T10:00:00+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 09:00:00.250"), Some(expected + 250));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_parse_index_date() {
        let d = NaiveDate::from_ymd_opt(2020, 5, 31).unwrap();
        assert_eq!(parse_index_date("2020-05-31"), Some(d));
        assert_eq!(parse_index_date("2020-05-31 00:00:00"), Some(d));
        assert_eq!(
            parse_index_date("2020-05"),
            NaiveDate::from_ymd_opt(2020, 5, 1)
        );
        assert_eq!(parse_index_date("May 2020"), None);
    }

    #[test]
    fn test_read_trades() {
        let csv = "id,price,volume,time,isBuyerMaker\n\
                   1,\"3012.5\",0.25,1709283600000,true\n\
                   2,3013.0,1.5,1709283601000,false\n";
        let trades = read_trades(csv.as_bytes()).unwrap();

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].ts_ms, 1_709_283_600_000);
        assert_relative_eq!(trades[0].price, 3012.5);
        assert_relative_eq!(trades[1].volume, 1.5);
        assert_relative_eq!(trades[1].dollar_value(), 3013.0 * 1.5);
    }

    #[test]
    fn test_read_trades_case_insensitive_headers() {
        let csv = "Time,Price,Volume\n2024-03-01 09:00:00,1.5,10\n";
        let trades = read_trades(csv.as_bytes()).unwrap();
        assert_eq!(trades.len(), 1);
    }

    #[test]
    fn test_read_trades_missing_column() {
        let csv = "time,price\n1709283600000,1.0\n";
        let err = read_trades(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("volume"));
    }

    #[test]
    fn test_read_trades_malformed_fields_surface() {
        let bad_price = "time,price,volume\n1709283600000,abc,1\n";
        let err = read_trades(bad_price.as_bytes()).unwrap_err();
        assert!(err.is_data());
        assert!(err.to_string().contains("row 2"));

        let bad_time = "time,price,volume\n1709283600000,1,1\nnot-a-time,1,1\n";
        let err = read_trades(bad_time.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 3"));

        let zero_volume = "time,price,volume\n1709283600000,1,0\n";
        assert!(read_trades(zero_volume.as_bytes()).is_err());
    }

    #[test]
    fn test_read_trades_non_positive_values_name_row_and_column() {
        let zero_volume = "time,price,volume\n1709283600000,1,1\n1709283601000,1,0\n";
        let err = read_trades(zero_volume.as_bytes()).unwrap_err();
        assert!(err.is_data());
        let msg = err.to_string();
        assert!(msg.contains("row 3"), "{msg}");
        assert!(msg.contains("'volume'"), "{msg}");

        let negative_price = "time,price,volume\n1709283600000,-2,1\n";
        let msg = read_trades(negative_price.as_bytes()).unwrap_err().to_string();
        assert!(msg.contains("row 2"), "{msg}");
        assert!(msg.contains("'price'"), "{msg}");
    }

    #[test]
    fn test_read_trades_empty_table() {
        let trades = read_trades("time,price,volume\n".as_bytes()).unwrap();
        assert!(trades.is_empty());
    }

    #[test]
    fn test_read_series_table() {
        let csv = "Date,GS_simple.return,GS_log.return\n\
                   2024-01-02,0.0123,0.01222\n\
                   2024-01-03,,NaN\n";
        let table = read_series_table(csv.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["GS_simple.return", "GS_log.return"]
        );
        let simple = table.column("GS_simple.return").unwrap();
        assert_relative_eq!(simple[0].unwrap(), 0.0123);
        assert_eq!(simple[1], None);
        assert_eq!(table.column("GS_log.return").unwrap()[1], None);
    }

    #[test]
    fn test_read_series_table_rejects_text_values() {
        let csv = "Date,HD_rv\n2024-01-02,high\n";
        let err = read_series_table(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("HD_rv"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = load_trades("/nonexistent/ETHUSDT_last_1000_trades.csv").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
