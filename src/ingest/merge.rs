use std::collections::HashSet;

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::ingest::block::DayRecord;
use crate::table::{NormalizedRow, NormalizedTable};

/// Starting offset for synthesized category labels on uploads that carry no
/// explicit `구분:` markers. Station ids in the source data start at 100.
const CATEGORY_BASE: f64 = 100.0;

/// One successfully parsed block, positioned by its place in the scan
/// order so label synthesis stays stable when a sibling block is skipped.
#[derive(Debug)]
pub struct ParsedBlock {
    pub index: usize,
    pub label: Option<String>,
    pub records: Vec<DayRecord>,
}

/// Label for the unlabeled block at scan position `index`: "100.00",
/// "101.00", and so on, strictly increasing by block order.
pub fn synthesized_label(index: usize) -> String {
    format!("{:.2}", CATEGORY_BASE + index as f64)
}

/// Attach a category to every record of every block and concatenate into
/// one table. Two blocks claiming the same (category, date) pair are a
/// conflict, not a merge.
pub fn tag_and_merge(blocks: Vec<ParsedBlock>) -> Result<NormalizedTable> {
    let mut rows = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for block in blocks {
        let category = match block.label {
            Some(label) => label,
            None => synthesized_label(block.index),
        };
        debug!(block = block.index, category = %category, days = block.records.len(), "tagging block");

        for record in block.records {
            if !seen.insert((category.clone(), record.date.clone())) {
                return Err(PipelineError::DuplicateKey {
                    category,
                    date: record.date,
                });
            }
            rows.push(NormalizedRow {
                category: category.clone(),
                date: record.date,
                total_tests: record.total_tests,
                pass: record.pass,
                false_defect: record.false_defect,
                true_defect: record.true_defect,
                fail: record.fail,
                extra: record.extra,
            });
        }
    }

    Ok(NormalizedTable { rows })
}
