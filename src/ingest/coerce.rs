/// Token the stations write when a day has no measurement.
pub const MISSING_TOKEN: &str = "N/A";

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

/// Coerce one cell to a number. Empty cells, the `N/A` token, and anything
/// that does not parse all become `None`; this never fails.
pub fn coerce_numeric(raw: &str) -> Option<f64> {
    let cleaned = clean_str(raw);
    if cleaned.is_empty() || cleaned == MISSING_TOKEN {
        return None;
    }
    cleaned.parse::<f64>().ok()
}
