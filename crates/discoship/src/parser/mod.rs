mod columns;
mod locator;
mod rows;
mod table;

pub use columns::{normalize_label, resolve_column_index};
pub use locator::{TableHandle, TableLocator};
pub use rows::{extract_column_groups, extract_rows, extract_rows_multi, strip_currency};
pub use table::{HeaderCell, RateTable};

use scraper::{ElementRef, Node};

#[derive(Debug, thiserror::Error)]
pub enum StructureError {
    #[error("No heading containing '{0}' found; has source layout changed?")]
    HeadingNotFound(String),
    #[error(
        "Expected {wanted} table(s) after heading '{heading}' within {limit} elements, \
         found {found}; has source layout changed?"
    )]
    TableWalkExceeded {
        heading: String,
        wanted: usize,
        found: usize,
        limit: usize,
    },
    #[error("Expected exactly one <{section}> in table, found {found}")]
    Section { section: &'static str, found: usize },
    #[error("Row {row} ('{key}') has {len} cell(s), column {column} requested")]
    ShortRow {
        row: usize,
        key: String,
        len: usize,
        column: usize,
    },
    #[error(
        "Row {row} ('{key}') has {len} cell(s) but the header names {expected} column(s); \
         has source layout changed?"
    )]
    RowWidth {
        row: usize,
        key: String,
        len: usize,
        expected: usize,
    },
    #[error("'{key}' appears again in table {table}; has source layout changed?")]
    DuplicateKey { key: String, table: usize },
    #[error("No {0} extracted; has source layout changed?")]
    Empty(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Unexpected page structure: {0}")]
    Structure(#[from] StructureError),
    #[error("Column '{target}' not found in header [{available}]")]
    ColumnNotFound { target: String, available: String },
    #[error("Invalid selector '{0}'")]
    Selector(String),
}

pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of a cell; `<br>` counts as a space.
pub(crate) fn cell_text(element: ElementRef) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) if e.name() == "br" => out.push(' '),
            _ => {}
        }
    }
    normalize_whitespace(&out)
}

pub(crate) fn selector(css: &str) -> Result<scraper::Selector, ParseError> {
    scraper::Selector::parse(css).map_err(|_| ParseError::Selector(css.to_string()))
}
