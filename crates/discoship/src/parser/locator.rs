use scraper::{ElementRef, Html};

use super::{ParseError, StructureError, cell_text, selector};
use crate::config::DEFAULT_TABLE_WALK_LIMIT;

const HEADING_SELECTOR: &str = "h1, h2, h3, h4, h5, h6";

/// A `<table>` element found after a heading.
#[derive(Debug, Clone, Copy)]
pub struct TableHandle<'a> {
    element: ElementRef<'a>,
    /// 0-based position among the tables following the heading.
    pub index: usize,
}

impl<'a> TableHandle<'a> {
    pub fn element(&self) -> ElementRef<'a> {
        self.element
    }
}

/// Finds data tables by the heading printed above them.
///
/// Carrier pages render several near-identical tables; the heading is the only
/// stable anchor. After the heading, siblings are walked forward until enough
/// tables are seen or `walk_limit` elements have been visited, at which point
/// the page is assumed to have changed and the lookup fails.
#[derive(Debug, Clone)]
pub struct TableLocator {
    walk_limit: usize,
    ignore: Vec<String>,
}

impl Default for TableLocator {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_WALK_LIMIT)
    }
}

impl TableLocator {
    pub fn new(walk_limit: usize) -> Self {
        Self {
            walk_limit,
            ignore: Vec::new(),
        }
    }

    pub fn ignoring<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(labels.into_iter().map(Into::into));
        self
    }

    /// First heading whose text contains `heading_text` (case-sensitive),
    /// skipping headings that are only group labels.
    pub fn find_heading<'a>(
        &self,
        document: &'a Html,
        heading_text: &str,
    ) -> Result<ElementRef<'a>, ParseError> {
        let headings = selector(HEADING_SELECTOR)?;
        let mut matches = document.select(&headings).filter(|h| {
            let text = cell_text(*h);
            text.contains(heading_text) && !self.ignore.iter().any(|label| *label == text)
        });

        let heading = matches
            .next()
            .ok_or_else(|| StructureError::HeadingNotFound(heading_text.to_string()))?;
        if matches.next().is_some() {
            log::debug!("Several headings contain '{}', using the first", heading_text);
        }
        Ok(heading)
    }

    pub fn find_table<'a>(
        &self,
        document: &'a Html,
        heading_text: &str,
        table_index: usize,
    ) -> Result<TableHandle<'a>, ParseError> {
        let mut tables = self.find_tables(document, heading_text, table_index + 1)?;
        // find_tables returns exactly `count` handles on success
        Ok(tables.swap_remove(table_index))
    }

    pub fn find_tables<'a>(
        &self,
        document: &'a Html,
        heading_text: &str,
        count: usize,
    ) -> Result<Vec<TableHandle<'a>>, ParseError> {
        let heading = self.find_heading(document, heading_text)?;
        let mut tables = Vec::with_capacity(count);

        let siblings = heading.next_siblings().filter_map(ElementRef::wrap);
        for (step, element) in siblings.enumerate() {
            if tables.len() == count {
                break;
            }
            if step >= self.walk_limit {
                break;
            }
            if element.value().name() == "table" {
                tables.push(TableHandle {
                    element,
                    index: tables.len(),
                });
            }
        }

        if tables.len() < count {
            return Err(StructureError::TableWalkExceeded {
                heading: heading_text.to_string(),
                wanted: count,
                found: tables.len(),
                limit: self.walk_limit,
            }
            .into());
        }
        Ok(tables)
    }
}
