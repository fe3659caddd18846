use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

/// Fixed cell labels used by the inspection export format.
pub const METRIC_COLUMN: &str = "지표";
pub const CATEGORY_MARKER: &str = "구분";
pub const TOTAL_TESTS: &str = "총 테스트 수";
pub const PASS: &str = "PASS";
pub const FALSE_DEFECT: &str = "가성불량";
pub const TRUE_DEFECT: &str = "진성불량";
pub const FAIL: &str = "FAIL";

/// The five metric rows every block is expected to carry. Blocks may carry
/// more; anything else is passed through untouched.
pub const EXPECTED_METRICS: [&str; 5] = [TOTAL_TESTS, PASS, FALSE_DEFECT, TRUE_DEFECT, FAIL];

/// One (category, date) observation. A `None` metric means the source cell
/// was empty, `N/A`, or otherwise non-numeric; it is never silently zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    pub category: String,
    pub date: String,
    pub total_tests: Option<f64>,
    pub pass: Option<f64>,
    pub false_defect: Option<f64>,
    pub true_defect: Option<f64>,
    pub fail: Option<f64>,
    /// Metric rows outside the expected five, kept verbatim.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// All rows across all blocks of one upload. Row order is whatever the
/// merge produced; lookups re-derive ordering by sorting date tokens,
/// which works because the tokens are fixed-width YYMMDD strings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedTable {
    pub rows: Vec<NormalizedRow>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct categories in first-seen order, matching the block order of
    /// the upload.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.category.as_str()) {
                seen.push(&row.category);
            }
        }
        seen
    }

    /// Distinct dates for one category, sorted ascending.
    pub fn dates(&self, category: &str) -> Vec<&str> {
        let mut dates: Vec<&str> = self
            .rows
            .iter()
            .filter(|r| r.category == category)
            .map(|r| r.date.as_str())
            .collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }

    pub fn row(&self, category: &str, date: &str) -> Option<&NormalizedRow> {
        self.rows
            .iter()
            .find(|r| r.category == category && r.date == date)
    }
}

/// Parse a 6-digit YYMMDD token. Used for display and for flagging suspect
/// date columns; ordering never depends on it.
pub fn parse_date_token(token: &str) -> Option<NaiveDate> {
    if token.len() != 6 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(token, "%y%m%d").ok()
}
