//! OHLCV loading from CSV files.
//!
//! The header must start with `open,high,low,close,volume` (any case). Extra
//! trailing columns are ignored. The whole file is validated before a feed is
//! returned, so a single bad value rejects the load.

use crate::prices::PriceFeed;
use kate_core::{DataPoint, Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Required leading columns, in order.
pub const OHLCV_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Load a price feed from a CSV file on disk.
pub fn load_prices_from_csv(path: impl AsRef<Path>) -> Result<PriceFeed> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let feed = load_prices_from_reader(file)?;
    info!(path = %path.display(), candles = feed.len(), "loaded price data");
    Ok(feed)
}

/// Load a price feed from any CSV source.
pub fn load_prices_from_reader<R: Read>(source: R) -> Result<PriceFeed> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    validate_header(reader.headers()?)?;

    let mut points = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        points.push(parse_record(&record, idx + 1)?);
    }

    debug!(candles = points.len(), "parsed csv records");
    Ok(PriceFeed::new(points))
}

fn validate_header(header: &csv::StringRecord) -> Result<()> {
    for (idx, column) in OHLCV_COLUMNS.iter().enumerate() {
        let matches = header
            .get(idx)
            .map(|h| h.trim().eq_ignore_ascii_case(column))
            .unwrap_or(false);
        if !matches {
            return Err(Error::MissingColumn(column.to_string()));
        }
    }
    Ok(())
}

fn parse_record(record: &csv::StringRecord, row: usize) -> Result<DataPoint> {
    let mut values = [0.0; 5];
    for (idx, column) in OHLCV_COLUMNS.iter().enumerate() {
        let raw = record.get(idx).unwrap_or("");
        values[idx] = match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => return Err(Error::malformed(row, *column, raw)),
        };
    }
    let [open, high, low, close, volume] = values;
    Ok(DataPoint::new(open, high, low, close, volume))
}
