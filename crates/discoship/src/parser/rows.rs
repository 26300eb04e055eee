use super::{ParseError, RateTable, StructureError};

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

pub fn strip_currency(text: &str) -> String {
    text.replace(CURRENCY_SYMBOLS, "").trim().to_string()
}

fn cell<'t>(row: &'t [String], row_no: usize, column: usize) -> Result<&'t str, ParseError> {
    row.get(column).map(String::as_str).ok_or_else(|| {
        StructureError::ShortRow {
            row: row_no,
            key: row.first().cloned().unwrap_or_default(),
            len: row.len(),
            column,
        }
        .into()
    })
}

/// `(first column, column `value_column`)` for every body row, in row order.
/// Values are returned as printed, placeholders like "n/a" included.
pub fn extract_rows(
    table: &RateTable,
    value_column: usize,
) -> Result<Vec<(String, String)>, ParseError> {
    table
        .body_rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let key = cell(row, i, 0)?;
            let value = cell(row, i, value_column)?;
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

pub fn extract_rows_multi(
    table: &RateTable,
    value_columns: &[usize],
) -> Result<Vec<(String, Vec<String>)>, ParseError> {
    table
        .body_rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let key = cell(row, i, 0)?.to_string();
            let values = value_columns
                .iter()
                .map(|c| cell(row, i, *c).map(strip_currency))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((key, values))
        })
        .collect()
}

/// Reads the table column-wise: every column from `first_column` on becomes
/// one group, keyed by its header label, holding that column's cells from
/// top to bottom. Every body row must be exactly as wide as the header.
pub fn extract_column_groups(
    table: &RateTable,
    first_column: usize,
) -> Result<Vec<(String, Vec<String>)>, ParseError> {
    let labels = table.column_labels();
    for (i, row) in table.body_rows.iter().enumerate() {
        if row.len() != labels.len() {
            return Err(StructureError::RowWidth {
                row: i,
                key: row.first().cloned().unwrap_or_default(),
                len: row.len(),
                expected: labels.len(),
            }
            .into());
        }
    }

    let mut groups: Vec<(String, Vec<String>)> = labels
        .iter()
        .skip(first_column)
        .map(|label| (label.clone(), Vec::with_capacity(table.body_rows.len())))
        .collect();

    for (i, row) in table.body_rows.iter().enumerate() {
        for (offset, (_, values)) in groups.iter_mut().enumerate() {
            values.push(strip_currency(cell(row, i, first_column + offset)?));
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HeaderCell;

    fn table(header: &[&str], body: &[&[&str]]) -> RateTable {
        RateTable {
            header_rows: vec![header.iter().map(|h| HeaderCell::new(h, 1)).collect()],
            body_rows: body
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_extract_rows_preserves_order_and_placeholders() {
        let t = table(
            &["Country", "PMI", "FCPIS"],
            &[
                &["Zambia", "8", "8"],
                &["Afghanistan", "n/a", "n/a"],
                &["Canada", "1", "1"],
            ],
        );

        let rows = extract_rows(&t, 2).expect("Failed to extract rows");

        assert_eq!(rows.len(), t.body_rows.len());
        assert_eq!(
            rows,
            vec![
                ("Zambia".to_string(), "8".to_string()),
                ("Afghanistan".to_string(), "n/a".to_string()),
                ("Canada".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_short_row_fails() {
        let t = table(&["Country", "FCPIS"], &[&["Canada", "1"], &["Cuba"]]);

        let err = extract_rows(&t, 1).unwrap_err();

        assert!(matches!(
            err,
            ParseError::Structure(StructureError::ShortRow { row: 1, len: 1, column: 1, .. })
        ));
    }

    #[test]
    fn test_extract_rows_multi_strips_currency() {
        let t = table(
            &["Weight", "1", "2"],
            &[&["1–8", "$17.85", "$18.05"], &["9–32", "26.00", "26.60"]],
        );

        let rows = extract_rows_multi(&t, &[1, 2]).expect("Failed to extract rows");

        assert_eq!(rows[0].0, "1–8");
        assert_eq!(rows[0].1, vec!["17.85", "18.05"]);
        assert_eq!(rows[1].1, vec!["26.00", "26.60"]);
    }

    #[test]
    fn test_column_groups_keyed_by_header() {
        let t = table(
            &["Weight Not Over (oz.)", "1", "2"],
            &[
                &["1–8", "$17.85", "$18.05"],
                &["9–32", "26.00", "26.60"],
                &["33–48", "38.50", "39.00"],
                &["49–64", "47.60", "51.05"],
            ],
        );

        let groups = extract_column_groups(&t, 1).expect("Failed to extract groups");

        assert_eq!(
            groups,
            vec![
                (
                    "1".to_string(),
                    vec!["17.85", "26.00", "38.50", "47.60"]
                        .into_iter()
                        .map(String::from)
                        .collect()
                ),
                (
                    "2".to_string(),
                    vec!["18.05", "26.60", "39.00", "51.05"]
                        .into_iter()
                        .map(String::from)
                        .collect()
                ),
            ]
        );
    }

    #[test]
    fn test_column_groups_reject_rows_wider_than_header() {
        let t = table(
            &["Weight Not Over (oz.)", "1", "2"],
            &[
                &["8", "$1.00", "$2.00", "$7.77"],
                &["32", "1.50", "2.50", "7.90"],
            ],
        );

        let err = extract_column_groups(&t, 1).unwrap_err();

        assert!(matches!(
            err,
            ParseError::Structure(StructureError::RowWidth { row: 0, len: 4, expected: 3, .. })
        ));
        assert!(err.to_string().contains("has source layout changed?"));
    }

    #[test]
    fn test_column_groups_reject_rows_narrower_than_header() {
        let t = table(
            &["Weight Not Over (oz.)", "1", "2"],
            &[&["8", "$1.00", "$2.00"], &["32", "1.50"]],
        );

        let err = extract_column_groups(&t, 1).unwrap_err();

        assert!(matches!(
            err,
            ParseError::Structure(StructureError::RowWidth { row: 1, len: 2, expected: 3, .. })
        ));
    }

    #[test]
    fn test_strip_currency() {
        assert_eq!(strip_currency(" $17.85 "), "17.85");
        assert_eq!(strip_currency("£3"), "3");
        assert_eq!(strip_currency("n/a"), "n/a");
    }
}
