use std::collections::BTreeMap;

use csv::{ReaderBuilder, Trim};
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::ingest::coerce::coerce_numeric;
use crate::table::{
    parse_date_token, FAIL, FALSE_DEFECT, METRIC_COLUMN, PASS, TOTAL_TESTS, TRUE_DEFECT,
};

/// One date's observation as parsed from a block, still missing the
/// category tag the merge step attaches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayRecord {
    pub date: String,
    pub total_tests: Option<f64>,
    pub pass: Option<f64>,
    pub false_defect: Option<f64>,
    pub true_defect: Option<f64>,
    pub fail: Option<f64>,
    pub extra: BTreeMap<String, String>,
}

/// Parse one block's delimited text (header: metric-label cell + one column
/// per date; rows: metric name + one value per date) and transpose it into
/// one `DayRecord` per date column.
///
/// The header cells are trimmed before anything else; hand-formatted
/// exports carry stray padding. A header whose first cell is not the
/// metric-label token is a distinct, user-actionable failure; everything
/// else that goes wrong reading the table is a generic block parse error.
pub fn parse_block(index: usize, body: &str) -> Result<Vec<DayRecord>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|source| PipelineError::BlockParse { index, source })?
        .clone();

    if headers.get(0) != Some(METRIC_COLUMN) {
        return Err(PipelineError::MissingKeyColumn {
            expected: METRIC_COLUMN,
            found: headers.iter().map(str::to_string).collect(),
        });
    }

    let dates: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    for date in &dates {
        if parse_date_token(date).is_none() {
            warn!(block = index, date = %date, "date column is not a YYMMDD token");
        }
    }

    // Metric rows in file order; a repeated metric name overwrites the
    // earlier row.
    let mut metrics: Vec<(String, Vec<String>)> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| PipelineError::BlockParse { index, source })?;
        let name = record.get(0).unwrap_or("").to_string();
        if name.is_empty() {
            continue;
        }
        let values: Vec<String> = (1..=dates.len())
            .map(|i| record.get(i).unwrap_or("").to_string())
            .collect();
        if let Some(existing) = metrics.iter_mut().find(|(n, _)| *n == name) {
            warn!(block = index, metric = %name, "duplicate metric row, keeping the later one");
            existing.1 = values;
        } else {
            metrics.push((name, values));
        }
    }

    let mut days = Vec::with_capacity(dates.len());
    for (di, date) in dates.into_iter().enumerate() {
        let mut day = DayRecord {
            date,
            ..DayRecord::default()
        };
        for (name, values) in &metrics {
            let raw = values.get(di).map(String::as_str).unwrap_or("");
            match name.as_str() {
                TOTAL_TESTS => day.total_tests = coerce_numeric(raw),
                PASS => day.pass = coerce_numeric(raw),
                FALSE_DEFECT => day.false_defect = coerce_numeric(raw),
                TRUE_DEFECT => day.true_defect = coerce_numeric(raw),
                FAIL => day.fail = coerce_numeric(raw),
                _ => {
                    day.extra.insert(name.clone(), raw.to_string());
                }
            }
        }
        days.push(day);
    }

    Ok(days)
}
