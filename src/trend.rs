use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::table::{NormalizedTable, FAIL, FALSE_DEFECT, PASS, TRUE_DEFECT};

/// The five metrics for one (category, date), plus the signed change of
/// the two defect counts versus the immediately preceding date in the same
/// category. A delta is `None` at the category's first date or when either
/// operand is missing; it is never coerced to zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub category: String,
    pub date: String,
    pub total_tests: Option<f64>,
    pub pass: Option<f64>,
    pub fail: Option<f64>,
    pub false_defect: Option<f64>,
    pub true_defect: Option<f64>,
    pub delta_false_defect: Option<f64>,
    pub delta_true_defect: Option<f64>,
}

/// One point of the long-form defect-trend series (line-chart feed).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub metric: String,
    pub value: Option<f64>,
}

/// One slice of the same-day breakdown (bar-chart feed).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownSlice {
    pub metric: String,
    pub value: Option<f64>,
}

fn delta(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    Some(current? - previous?)
}

/// Resolve the selected date for a category: it must be one of the
/// category's own dates, and defaults to the chronologically last one.
fn resolve_date<'a>(
    table: &'a NormalizedTable,
    category: &str,
    date: Option<&'a str>,
) -> Result<(Vec<&'a str>, &'a str)> {
    let dates = table.dates(category);
    let Some(&last) = dates.last() else {
        return Err(PipelineError::UnknownCategory(category.to_string()));
    };
    let selected = match date {
        None => last,
        Some(d) if dates.contains(&d) => d,
        Some(d) => {
            return Err(PipelineError::UnknownDate {
                category: category.to_string(),
                date: d.to_string(),
            })
        }
    };
    Ok((dates, selected))
}

/// Compute the day summary for (category, date). `date = None` selects the
/// category's latest date.
pub fn day_summary(
    table: &NormalizedTable,
    category: &str,
    date: Option<&str>,
) -> Result<DaySummary> {
    let (dates, selected) = resolve_date(table, category, date)?;
    let row = table
        .row(category, selected)
        .ok_or_else(|| PipelineError::UnknownDate {
            category: category.to_string(),
            date: selected.to_string(),
        })?;

    let previous = dates
        .iter()
        .position(|d| *d == selected)
        .and_then(|pos| pos.checked_sub(1))
        .and_then(|pos| dates.get(pos))
        .and_then(|d| table.row(category, d));

    Ok(DaySummary {
        category: category.to_string(),
        date: selected.to_string(),
        total_tests: row.total_tests,
        pass: row.pass,
        fail: row.fail,
        false_defect: row.false_defect,
        true_defect: row.true_defect,
        delta_false_defect: delta(row.false_defect, previous.and_then(|p| p.false_defect)),
        delta_true_defect: delta(row.true_defect, previous.and_then(|p| p.true_defect)),
    })
}

/// Melt the three defect series across every date of one category into
/// long form: one (date, metric, value) point per cell.
pub fn defect_trend(table: &NormalizedTable, category: &str) -> Result<Vec<TrendPoint>> {
    let dates = table.dates(category);
    if dates.is_empty() {
        return Err(PipelineError::UnknownCategory(category.to_string()));
    }

    let mut points = Vec::with_capacity(dates.len() * 3);
    for date in dates {
        let row = table.row(category, date);
        for (metric, value) in [
            (FALSE_DEFECT, row.and_then(|r| r.false_defect)),
            (TRUE_DEFECT, row.and_then(|r| r.true_defect)),
            (FAIL, row.and_then(|r| r.fail)),
        ] {
            points.push(TrendPoint {
                date: date.to_string(),
                metric: metric.to_string(),
                value,
            });
        }
    }
    Ok(points)
}

/// Same-day breakdown of pass vs the two defect classes, for the bar chart.
pub fn day_breakdown(
    table: &NormalizedTable,
    category: &str,
    date: Option<&str>,
) -> Result<Vec<BreakdownSlice>> {
    let (_, selected) = resolve_date(table, category, date)?;
    let row = table.row(category, selected);
    Ok([
        (PASS, row.and_then(|r| r.pass)),
        (FALSE_DEFECT, row.and_then(|r| r.false_defect)),
        (TRUE_DEFECT, row.and_then(|r| r.true_defect)),
    ]
    .into_iter()
    .map(|(metric, value)| BreakdownSlice {
        metric: metric.to_string(),
        value,
    })
    .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest;

    const TWO_STATIONS: &str = "\
구분: 100.00
지표,250908,250909,250910
총 테스트 수,4157,5798,5039
PASS,3944,5548,4834
가성불량,81,110,108
진성불량,132,140,97
FAIL,213,250,205
구분: 101.00
지표,250908,250909
총 테스트 수,3258,4760
PASS,2872,4065
가성불량,60,102
진성불량,326,593
FAIL,386,695
";

    fn table() -> NormalizedTable {
        ingest::parse_text(TWO_STATIONS).unwrap().table
    }

    #[test]
    fn first_date_has_no_deltas() {
        let summary = day_summary(&table(), "100.00", Some("250908")).unwrap();
        assert_eq!(summary.false_defect, Some(81.0));
        assert_eq!(summary.delta_false_defect, None);
        assert_eq!(summary.delta_true_defect, None);
    }

    #[test]
    fn deltas_are_current_minus_previous() {
        let summary = day_summary(&table(), "100.00", Some("250909")).unwrap();
        assert_eq!(summary.delta_false_defect, Some(29.0));
        assert_eq!(summary.delta_true_defect, Some(8.0));

        let summary = day_summary(&table(), "100.00", Some("250910")).unwrap();
        assert_eq!(summary.delta_false_defect, Some(-2.0));
        assert_eq!(summary.delta_true_defect, Some(-43.0));
    }

    #[test]
    fn deltas_never_cross_categories() {
        let summary = day_summary(&table(), "101.00", Some("250909")).unwrap();
        // 102 - 60, not 102 - anything from station 100.00.
        assert_eq!(summary.delta_false_defect, Some(42.0));
        assert_eq!(summary.delta_true_defect, Some(267.0));
    }

    #[test]
    fn date_defaults_to_the_latest() {
        let summary = day_summary(&table(), "100.00", None).unwrap();
        assert_eq!(summary.date, "250910");
        let summary = day_summary(&table(), "101.00", None).unwrap();
        assert_eq!(summary.date, "250909");
    }

    #[test]
    fn missing_operand_makes_the_delta_missing() {
        let text = "\
지표,250908,250909,250910
가성불량,81,N/A,108
진성불량,132,140,N/A
";
        let table = ingest::parse_text(text).unwrap().table;

        let summary = day_summary(&table, "100.00", Some("250909")).unwrap();
        assert_eq!(summary.delta_false_defect, None);
        assert_eq!(summary.delta_true_defect, Some(8.0));

        // Previous value missing poisons the next day's delta too.
        let summary = day_summary(&table, "100.00", Some("250910")).unwrap();
        assert_eq!(summary.delta_false_defect, None);
        assert_eq!(summary.delta_true_defect, None);
    }

    #[test]
    fn unknown_selections_are_rejected() {
        let err = day_summary(&table(), "999.00", None).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownCategory(c) if c == "999.00"));

        let err = day_summary(&table(), "101.00", Some("250910")).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownDate { .. }));

        let err = defect_trend(&table(), "999.00").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownCategory(_)));
    }

    #[test]
    fn trend_series_is_long_form_over_all_dates() {
        let points = defect_trend(&table(), "100.00").unwrap();
        assert_eq!(points.len(), 9);
        assert_eq!(points[0].date, "250908");
        assert_eq!(points[0].metric, FALSE_DEFECT);
        assert_eq!(points[0].value, Some(81.0));
        assert_eq!(points[8].date, "250910");
        assert_eq!(points[8].metric, FAIL);
        assert_eq!(points[8].value, Some(205.0));
    }

    #[test]
    fn breakdown_covers_pass_and_both_defect_classes() {
        let slices = day_breakdown(&table(), "100.00", Some("250909")).unwrap();
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[0].metric, PASS);
        assert_eq!(slices[0].value, Some(5548.0));
        assert_eq!(slices[1].value, Some(110.0));
        assert_eq!(slices[2].value, Some(140.0));
    }
}
