//! CSV file data adapter.
//!
//! Columns are located by header name, case-insensitively. Rows are returned
//! in file order; ordering is checked by the engine, not here.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::domain::error::StratTestError;
use crate::domain::ohlcv::{parse_timestamp, Bar};
use crate::domain::resample::{AuxColumn, Tick, TickSeries};
use crate::ports::data_port::DataPort;

const TIMESTAMP_HEADERS: [&str; 4] = ["timestamp", "datetime", "date", "time"];

pub struct CsvAdapter {
    path: PathBuf,
}

struct Header {
    index: HashMap<String, usize>,
    names: Vec<String>,
}

impl Header {
    fn new(record: &csv::StringRecord) -> Self {
        let names: Vec<String> = record.iter().map(|h| h.trim().to_lowercase()).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Header { index, names }
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn require(&self, name: &str) -> Result<usize, StratTestError> {
        self.find(name).ok_or_else(|| StratTestError::Data {
            reason: format!("missing '{}' column", name),
        })
    }

    fn timestamp(&self) -> Result<usize, StratTestError> {
        TIMESTAMP_HEADERS
            .iter()
            .find_map(|h| self.find(h))
            .ok_or_else(|| StratTestError::Data {
                reason: "missing timestamp column".into(),
            })
    }
}

fn field<'a>(record: &'a csv::StringRecord, col: usize, row: usize) -> Result<&'a str, StratTestError> {
    record
        .get(col)
        .map(str::trim)
        .ok_or_else(|| StratTestError::Data {
            reason: format!("row {}: too few fields", row + 1),
        })
}

fn number(record: &csv::StringRecord, col: usize, row: usize, name: &str) -> Result<f64, StratTestError> {
    let raw = field(record, col, row)?;
    raw.parse().map_err(|e| StratTestError::Data {
        reason: format!("row {}: invalid {} value '{}': {}", row + 1, name, raw, e),
    })
}

fn optional_number(
    record: &csv::StringRecord,
    col: Option<usize>,
    row: usize,
    name: &str,
) -> Result<Option<f64>, StratTestError> {
    match col {
        Some(c) if !field(record, c, row)?.is_empty() => number(record, c, row, name).map(Some),
        _ => Ok(None),
    }
}

fn timestamp(
    record: &csv::StringRecord,
    col: usize,
    row: usize,
) -> Result<chrono::NaiveDateTime, StratTestError> {
    let raw = field(record, col, row)?;
    parse_timestamp(raw).ok_or_else(|| StratTestError::Data {
        reason: format!("row {}: invalid timestamp '{}'", row + 1, raw),
    })
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn reader(&self) -> Result<(csv::Reader<std::fs::File>, Header), StratTestError> {
        let mut rdr = csv::Reader::from_path(&self.path).map_err(|e| StratTestError::Data {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        let header = Header::new(rdr.headers().map_err(|e| StratTestError::Data {
            reason: format!("CSV header error: {}", e),
        })?);
        Ok((rdr, header))
    }
}

fn csv_error(e: csv::Error) -> StratTestError {
    StratTestError::Data {
        reason: format!("CSV parse error: {}", e),
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self) -> Result<Vec<Bar>, StratTestError> {
        let (mut rdr, header) = self.reader()?;
        let ts_col = header.timestamp()?;
        let open_col = header.require("open")?;
        let high_col = header.require("high")?;
        let low_col = header.require("low")?;
        let close_col = header.require("close")?;
        let volume_col = header.find("volume");

        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(csv_error)?;
            bars.push(Bar {
                timestamp: timestamp(&record, ts_col, row)?,
                open: number(&record, open_col, row, "open")?,
                high: number(&record, high_col, row, "high")?,
                low: number(&record, low_col, row, "low")?,
                close: number(&record, close_col, row, "close")?,
                volume: optional_number(&record, volume_col, row, "volume")?,
            });
        }

        tracing::debug!(path = %self.path.display(), bars = bars.len(), "loaded bars");
        Ok(bars)
    }

    fn fetch_ticks(&self) -> Result<TickSeries, StratTestError> {
        let (mut rdr, header) = self.reader()?;
        let ts_col = header.timestamp()?;
        let price_col = header.require("price")?;
        let volume_col = header.find("volume");

        let aux_cols: Vec<usize> = (0..header.names.len())
            .filter(|&c| c != ts_col && c != price_col && Some(c) != volume_col)
            .collect();
        let mut series = TickSeries {
            ticks: Vec::new(),
            aux: aux_cols
                .iter()
                .map(|&c| AuxColumn {
                    name: header.names[c].clone(),
                    values: Vec::new(),
                })
                .collect(),
        };

        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(csv_error)?;
            series.ticks.push(Tick {
                timestamp: timestamp(&record, ts_col, row)?,
                price: number(&record, price_col, row, "price")?,
                volume: optional_number(&record, volume_col, row, "volume")?,
            });
            for (column, &c) in series.aux.iter_mut().zip(&aux_cols) {
                let value = optional_number(&record, Some(c), row, &column.name)?;
                column.values.push(value.unwrap_or(f64::NAN));
            }
        }

        tracing::debug!(
            path = %self.path.display(),
            ticks = series.ticks.len(),
            aux = series.aux.len(),
            "loaded ticks"
        );
        Ok(series)
    }
}
