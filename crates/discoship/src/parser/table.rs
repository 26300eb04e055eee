use std::collections::BTreeMap;

use scraper::ElementRef;
use serde::Serialize;

use super::{ParseError, StructureError, TableHandle, cell_text, resolve_column_index};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderCell {
    pub text: String,
    /// Number of grid columns the cell covers, always at least 1.
    pub span: usize,
}

impl HeaderCell {
    pub fn new(text: &str, span: usize) -> Self {
        Self {
            text: text.to_string(),
            span: span.max(1),
        }
    }
}

#[derive(Debug, Clone)]
struct RawCell {
    text: String,
    colspan: usize,
    rowspan: usize,
}

/// A carrier table reduced to text, with spans laid out on a column grid.
///
/// Header rows keep one [`HeaderCell`] per visual cell. A cell hanging down
/// from an earlier header row via `rowspan` is repeated in the rows it covers,
/// so summing spans left to right always lands on a body column. Body rows are
/// fully expanded: a cell with `colspan="3"` yields three entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateTable {
    pub header_rows: Vec<Vec<HeaderCell>>,
    pub body_rows: Vec<Vec<String>>,
}

impl RateTable {
    pub fn from_handle(handle: TableHandle<'_>) -> Result<Self, ParseError> {
        Self::from_element(handle.element())
    }

    pub fn from_element(table: ElementRef<'_>) -> Result<Self, ParseError> {
        let thead = single_section(table, "thead")?;
        let tbody = single_section(table, "tbody")?;

        let header_rows = layout(raw_rows(thead))
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| HeaderCell::new(&cell.text, cell.colspan))
                    .collect()
            })
            .collect();

        let body_rows = layout(raw_rows(tbody))
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .flat_map(|cell| std::iter::repeat_n(cell.text, cell.colspan))
                    .collect()
            })
            .collect();

        Ok(Self {
            header_rows,
            body_rows,
        })
    }

    /// Column index of the first header cell naming `target`, searching header
    /// rows top to bottom.
    pub fn resolve_column(&self, target: &str) -> Result<usize, ParseError> {
        let mut last_err = None;
        for row in &self.header_rows {
            match resolve_column_index(row, target) {
                Ok(index) => return Ok(index),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ParseError::ColumnNotFound {
            target: target.to_string(),
            available: String::new(),
        }))
    }

    /// Label of every grid column according to the lowest header row.
    pub fn column_labels(&self) -> Vec<String> {
        self.header_rows
            .last()
            .map(|row| {
                row.iter()
                    .flat_map(|cell| std::iter::repeat_n(cell.text.clone(), cell.span))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn single_section<'a>(
    table: ElementRef<'a>,
    section: &'static str,
) -> Result<ElementRef<'a>, ParseError> {
    let found: Vec<ElementRef<'a>> = table
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == section)
        .collect();
    match found.as_slice() {
        [one] => Ok(*one),
        _ => Err(StructureError::Section {
            section,
            found: found.len(),
        }
        .into()),
    }
}

fn span_attr(cell: ElementRef<'_>, name: &str) -> usize {
    cell.value()
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

fn raw_rows(section: ElementRef<'_>) -> Vec<Vec<RawCell>> {
    section
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "tr")
        .map(|tr| {
            tr.children()
                .filter_map(ElementRef::wrap)
                .filter(|e| matches!(e.value().name(), "td" | "th"))
                .map(|cell| RawCell {
                    text: cell_text(cell),
                    colspan: span_attr(cell, "colspan"),
                    rowspan: span_attr(cell, "rowspan"),
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect()
}

/// Places cells on the column grid, filling positions covered by a rowspan
/// from a previous row with a copy of the spanning cell.
fn layout(rows: Vec<Vec<RawCell>>) -> Vec<Vec<RawCell>> {
    // grid column -> (cell hanging down, rows still covered)
    let mut hanging: BTreeMap<usize, (RawCell, usize)> = BTreeMap::new();
    let mut out = Vec::with_capacity(rows.len());

    for row in rows {
        let mut placed = Vec::with_capacity(row.len());
        let mut started = BTreeMap::new();
        let mut cells = row.into_iter();
        let mut col = 0;

        loop {
            if let Some((cell, remaining)) = hanging.get_mut(&col) {
                let copy = RawCell {
                    rowspan: 1,
                    ..cell.clone()
                };
                *remaining -= 1;
                if *remaining == 0 {
                    hanging.remove(&col);
                }
                col += copy.colspan;
                placed.push(copy);
                continue;
            }

            match cells.next() {
                Some(cell) => {
                    if cell.rowspan > 1 {
                        started.insert(col, (cell.clone(), cell.rowspan - 1));
                    }
                    col += cell.colspan;
                    placed.push(cell);
                }
                None => match hanging.range(col..).next().map(|(c, _)| *c) {
                    // row ended short of a hanging cell; pad the gap
                    Some(next) => {
                        placed.push(RawCell {
                            text: String::new(),
                            colspan: next - col,
                            rowspan: 1,
                        });
                        col = next;
                    }
                    None => break,
                },
            }
        }

        hanging.extend(started);
        out.push(placed);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn parse(html: &str) -> Result<RateTable, ParseError> {
        let document = Html::parse_fragment(html);
        let table = document
            .select(&Selector::parse("table").unwrap())
            .next()
            .expect("fixture has a table");
        RateTable::from_element(table)
    }

    #[test]
    fn test_two_row_header_with_rowspan() {
        let table = parse(
            r#"<table>
            <thead>
              <tr><th rowspan="2">Country</th><th colspan="3">Price Group</th></tr>
              <tr><th>PMI</th><th>FCPIS</th><th>IPA</th></tr>
            </thead>
            <tbody>
              <tr><td>Albania</td><td>9</td><td>9</td><td>9</td></tr>
            </tbody>
            </table>"#,
        )
        .expect("Failed to parse table");

        assert_eq!(
            table.header_rows[1],
            vec![
                HeaderCell::new("Country", 1),
                HeaderCell::new("PMI", 1),
                HeaderCell::new("FCPIS", 1),
                HeaderCell::new("IPA", 1),
            ]
        );
        assert_eq!(table.resolve_column("FCPIS").expect("resolve"), 2);
        assert_eq!(
            table.column_labels(),
            vec!["Country", "PMI", "FCPIS", "IPA"]
        );
    }

    #[test]
    fn test_body_colspan_expanded() {
        let table = parse(
            r#"<table>
            <thead><tr><th>Country</th><th>A</th><th>B</th><th>C</th></tr></thead>
            <tbody>
              <tr><td>Cuba</td><td colspan="3">n/a</td></tr>
              <tr><td>Chad</td><td>5</td><td>6</td><td>7</td></tr>
            </tbody>
            </table>"#,
        )
        .expect("Failed to parse table");

        assert_eq!(table.body_rows[0], vec!["Cuba", "n/a", "n/a", "n/a"]);
        assert_eq!(table.body_rows[1], vec!["Chad", "5", "6", "7"]);
    }

    #[test]
    fn test_body_rowspan_carried_down() {
        let table = parse(
            r#"<table>
            <thead><tr><th>Weight</th><th>1</th><th>2</th></tr></thead>
            <tbody>
              <tr><td>1-8</td><td rowspan="2">$10.00</td><td>11.00</td></tr>
              <tr><td>9-32</td><td>12.00</td></tr>
            </tbody>
            </table>"#,
        )
        .expect("Failed to parse table");

        assert_eq!(table.body_rows[1], vec!["9-32", "$10.00", "12.00"]);
    }

    #[test]
    fn test_missing_thead_fails_fast() {
        let err = parse("<table><tbody><tr><td>1</td></tr></tbody></table>").unwrap_err();

        assert!(matches!(
            err,
            ParseError::Structure(StructureError::Section {
                section: "thead",
                found: 0
            })
        ));
    }

    #[test]
    fn test_two_tbody_sections_fail_fast() {
        let err = parse(
            r#"<table><thead><tr><th>a</th></tr></thead>
            <tbody><tr><td>1</td></tr></tbody>
            <tbody><tr><td>2</td></tr></tbody></table>"#,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ParseError::Structure(StructureError::Section {
                section: "tbody",
                found: 2
            })
        ));
    }

    #[test]
    fn test_empty_rows_and_bad_spans() {
        let table = parse(
            r#"<table><thead><tr><th colspan="0">Key</th><th colspan="x">Val</th></tr></thead>
            <tbody><tr></tr><tr><td>k</td><td>v</td></tr></tbody></table>"#,
        )
        .expect("Failed to parse table");

        assert_eq!(
            table.header_rows[0],
            vec![HeaderCell::new("Key", 1), HeaderCell::new("Val", 1)]
        );
        assert_eq!(table.body_rows, vec![vec!["k".to_string(), "v".to_string()]]);
    }
}
