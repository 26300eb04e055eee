use std::sync::LazyLock;

use regex::Regex;

use super::{HeaderCell, ParseError, normalize_whitespace};

static RE_FOOTNOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\d+\]|[*†‡§¶¹²³⁴⁵⁶⁷⁸⁹⁰]+").expect("invalid regex: footnote marker")
});

/// Lowercased label with footnote markers removed and whitespace collapsed.
pub fn normalize_label(text: &str) -> String {
    normalize_whitespace(&RE_FOOTNOTE.replace_all(text, " ")).to_lowercase()
}

/// 0-based grid column where the header cell naming `target` begins.
///
/// Matching is case-insensitive and by substring, so "FCPIS" finds
/// "FCPIS¹" or "FCPIS 1". A cell equal to `target` wins over an earlier cell
/// that merely contains it ("Priority Mail International" vs.
/// "Priority Mail Express International").
pub fn resolve_column_index(header_row: &[HeaderCell], target: &str) -> Result<usize, ParseError> {
    let needle = normalize_label(target);
    let not_found = || ParseError::ColumnNotFound {
        target: target.to_string(),
        available: header_row
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" | "),
    };
    if needle.is_empty() {
        return Err(not_found());
    }

    let mut offset = 0;
    let mut first_partial = None;
    for cell in header_row {
        let label = normalize_label(&cell.text);
        if label == needle {
            return Ok(offset);
        }
        if first_partial.is_none() && label.contains(&needle) {
            first_partial = Some(offset);
        }
        offset += cell.span.max(1);
    }

    first_partial.ok_or_else(not_found)
}
