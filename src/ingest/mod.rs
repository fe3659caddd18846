pub mod block;
pub mod coerce;
pub mod merge;
pub mod split;

use tracing::{debug, warn};

use crate::decode;
use crate::error::{PipelineError, Result};
use crate::table::NormalizedTable;

use self::merge::ParsedBlock;

/// A block that could not be used, kept so the caller can show the user
/// what was dropped and why.
#[derive(Debug)]
pub struct SkippedBlock {
    pub index: usize,
    pub label: Option<String>,
    pub error: PipelineError,
}

/// The result of one ingest pass: the normalized table plus the per-block
/// skip report. Rebuilt wholesale on every upload.
#[derive(Debug)]
pub struct Ingest {
    pub table: NormalizedTable,
    pub skipped: Vec<SkippedBlock>,
}

/// Decode an uploaded payload and parse it into a normalized table.
pub fn build_table(bytes: &[u8]) -> Result<Ingest> {
    let text = decode::decode_payload(bytes)?;
    parse_text(&text)
}

/// Parse decoded upload text: split into blocks, parse each block in
/// isolation, then tag and merge the survivors. A broken block never takes
/// its siblings down. An upload where nothing survives is reported as a
/// whole: as the missing-key-column error when that is the only problem,
/// so the caller can show the raw table alongside it.
#[tracing::instrument(level = "debug", skip(text), fields(bytes = text.len()))]
pub fn parse_text(text: &str) -> Result<Ingest> {
    let blocks = split::scan_blocks(text);
    debug!("found {} block(s)", blocks.len());

    let mut parsed: Vec<ParsedBlock> = Vec::new();
    let mut skipped: Vec<SkippedBlock> = Vec::new();

    for (index, raw) in blocks.into_iter().enumerate() {
        match block::parse_block(index, &raw.body) {
            Ok(records) if records.is_empty() => {
                warn!(index, label = ?raw.label, "block has no date columns, dropping it");
                skipped.push(SkippedBlock {
                    index,
                    label: raw.label,
                    error: PipelineError::EmptyBlock { index },
                });
            }
            Ok(records) => parsed.push(ParsedBlock {
                index,
                label: raw.label,
                records,
            }),
            Err(error) => {
                warn!(index, label = ?raw.label, %error, "skipping block");
                skipped.push(SkippedBlock {
                    index,
                    label: raw.label,
                    error,
                });
            }
        }
    }

    if parsed.is_empty() {
        let only_key_errors = !skipped.is_empty()
            && skipped
                .iter()
                .all(|s| matches!(s.error, PipelineError::MissingKeyColumn { .. }));
        if only_key_errors {
            return Err(skipped.remove(0).error);
        }
        return Err(PipelineError::NoValidData {
            failures: skipped.len(),
        });
    }

    let table = merge::tag_and_merge(parsed)?;
    debug!(rows = table.len(), skipped = skipped.len(), "ingest complete");
    Ok(Ingest { table, skipped })
}
