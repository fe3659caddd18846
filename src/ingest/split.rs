use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// One self-contained metric-table fragment for a single category.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBlock {
    /// Category label from an explicit `구분:` marker line, if one delimited
    /// this block. `None` means the merge step synthesizes one.
    pub label: Option<String>,
    pub body: String,
}

/// `구분: 100.00` on its own line opens a labeled block.
static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*구분[ \t]*:[ \t]*([^\r\n]*)").expect("marker pattern"));

/// A fresh `지표,...` header line opens an unlabeled block.
static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*지표[ \t]*,").expect("header pattern"));

/// Tokenize an upload into an ordered sequence of `(label, body)` blocks.
/// Two boundary conventions exist in the wild: explicit `구분:` marker lines
/// (which carry the category label) and bare repeated `지표` header lines.
/// Marker lines win when both appear. Text before the first boundary is
/// dropped with a warning; a payload with no boundary at all is treated as
/// one unlabeled block so the block parser can report what is wrong with it.
pub fn scan_blocks(text: &str) -> Vec<RawBlock> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let markers: Vec<(usize, usize, String)> = MARKER_RE
        .captures_iter(text)
        .map(|cap| {
            let whole = cap.get(0).expect("match always has a group 0");
            let label = cap.get(1).map(|g| g.as_str().trim().to_string()).unwrap_or_default();
            (whole.start(), whole.end(), label)
        })
        .collect();

    if !markers.is_empty() {
        warn_on_preamble(text, markers[0].0);
        return markers
            .iter()
            .enumerate()
            .map(|(i, (_, body_start, label))| {
                let body_end = markers.get(i + 1).map_or(text.len(), |next| next.0);
                RawBlock {
                    label: Some(label.clone()),
                    body: text[*body_start..body_end].trim().to_string(),
                }
            })
            .collect();
    }

    let starts: Vec<usize> = HEADER_RE.find_iter(text).map(|m| m.start()).collect();
    if starts.is_empty() {
        return vec![RawBlock {
            label: None,
            body: text.trim().to_string(),
        }];
    }

    warn_on_preamble(text, starts[0]);
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            RawBlock {
                label: None,
                body: text[start..end].trim().to_string(),
            }
        })
        .collect()
}

fn warn_on_preamble(text: &str, first_boundary: usize) {
    let preamble = text[..first_boundary].trim();
    if !preamble.is_empty() {
        warn!(
            bytes = preamble.len(),
            "ignoring text before the first block boundary"
        );
    }
}
