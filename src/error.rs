use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Everything that can go wrong between raw upload bytes and a rendered
/// day summary. Block-level kinds are isolated per block by the ingest
/// loop; table-level kinds abort the current run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not decode upload: neither valid {primary} nor {fallback}")]
    Decode {
        primary: &'static str,
        fallback: &'static str,
    },

    #[error("expected first column `{expected}` not found; header was {found:?}")]
    MissingKeyColumn {
        expected: &'static str,
        found: Vec<String>,
    },

    #[error("block {index} is not a readable table: {source}")]
    BlockParse {
        index: usize,
        #[source]
        source: csv::Error,
    },

    #[error("block {index} produced no rows")]
    EmptyBlock { index: usize },

    #[error("no valid data in upload ({failures} block(s) skipped)")]
    NoValidData { failures: usize },

    #[error("no rows for category `{0}`")]
    UnknownCategory(String),

    #[error("no rows for date `{date}` in category `{category}`")]
    UnknownDate { category: String, date: String },

    #[error("duplicate rows for category `{category}` at date `{date}`")]
    DuplicateKey { category: String, date: String },
}
