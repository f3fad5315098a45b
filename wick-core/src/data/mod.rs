//! Bar history loading for replay.
//!
//! CSV layout: `date,open,high,low,close,volume` (any column order, header
//! names case-insensitive), dates as `YYYY-MM-DD` in ascending order. Every
//! other column is read as a precomputed indicator series keyed by its
//! header, e.g. `rsi_14`. Empty cells and `NaN` are missing values.

use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::Bar;
use crate::runtime::SeriesSet;

const PRICE_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("row {row}: column `{column}` has invalid value `{value}`")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
    #[error("row {row}: date {date} is not after the previous bar")]
    Unsorted { row: usize, date: NaiveDate },
    #[error("no bars in input")]
    Empty,
}

/// Bars plus the series view the runtime evaluates against.
#[derive(Debug, Clone)]
pub struct BarHistory {
    pub bars: Vec<Bar>,
    pub series: SeriesSet,
}

pub fn load_csv(path: &Path) -> Result<BarHistory, DataError> {
    let file = std::fs::File::open(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_csv(file)
}

pub fn read_csv<R: Read>(reader: R) -> Result<BarHistory, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut price_index = [0usize; 6];
    for (slot, name) in price_index.iter_mut().zip(PRICE_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or(DataError::MissingColumn(name))?;
    }
    let extras: Vec<(usize, &String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| !price_index.contains(i))
        .collect();

    let mut bars: Vec<Bar> = Vec::new();
    let mut extra_values: Vec<Vec<f64>> = vec![Vec::new(); extras.len()];

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let row = row + 1;
        let cell = |i: usize| record.get(i).unwrap_or("");
        let number = |i: usize| parse_number(cell(i), row, &headers[i]);

        let date_text = cell(price_index[0]);
        let date = NaiveDate::parse_from_str(date_text, "%Y-%m-%d").map_err(|_| {
            DataError::InvalidValue {
                row,
                column: headers[price_index[0]].clone(),
                value: date_text.to_string(),
            }
        })?;
        if bars.last().is_some_and(|prev| prev.date >= date) {
            return Err(DataError::Unsorted { row, date });
        }

        bars.push(Bar {
            date,
            open: number(price_index[1])?,
            high: number(price_index[2])?,
            low: number(price_index[3])?,
            close: number(price_index[4])?,
            volume: number(price_index[5])?,
        });
        for (values, (i, _)) in extra_values.iter_mut().zip(&extras) {
            values.push(number(*i)?);
        }
    }

    if bars.is_empty() {
        return Err(DataError::Empty);
    }
    let void = bars.iter().filter(|bar| bar.is_void()).count();
    let insane = bars
        .iter()
        .filter(|bar| !bar.is_void() && !bar.is_sane())
        .count();
    if void + insane > 0 {
        warn!(bars = bars.len(), void, insane, "bar history has suspect rows");
    }

    let mut series = SeriesSet::from_bars(&bars);
    for ((_, name), values) in extras.into_iter().zip(extra_values) {
        series.insert(name.clone(), values);
    }
    Ok(BarHistory { bars, series })
}

fn parse_number(text: &str, row: usize, column: &str) -> Result<f64, DataError> {
    if text.is_empty() || text.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    text.parse().map_err(|_| DataError::InvalidValue {
        row,
        column: column.to_string(),
        value: text.to_string(),
    })
}
