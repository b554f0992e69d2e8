//! Results-table extraction

use log::{debug, warn};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use super::pagination::{Pagination, parse_pagination_text};
use crate::lead::RawLead;

/// Markup layout of the results table.
///
/// All selector strings the extractor depends on live here so a change in
/// the site's markup is a change to this struct only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableLayout {
    pub table_selector: String,
    pub header_cell_selector: String,
    pub body_row_selector: String,
    pub cell_selector: String,
    pub pagination_selector: String,
    /// Leading header cells that carry controls rather than field names.
    pub header_skip: usize,
    /// Leading body cells that carry checkboxes and icons.
    pub cell_skip: usize,
    /// Rows with fewer non-empty data cells than this are discarded.
    pub min_filled_cells: usize,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            table_selector: "table".to_string(),
            header_cell_selector: "thead th, thead td".to_string(),
            body_row_selector: "tbody tr".to_string(),
            cell_selector: "td, th".to_string(),
            pagination_selector: "span".to_string(),
            header_skip: 3,
            cell_skip: 2,
            min_filled_cells: 2,
        }
    }
}

/// One page's worth of extracted data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageExtraction {
    pub leads: Vec<RawLead>,
    pub pagination: Option<Pagination>,
}

impl PageExtraction {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
enum ExtractError {
    #[error("invalid CSS selector '{selector}': {message}")]
    Selector { selector: String, message: String },
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses rendered result pages into raw lead rows.
#[derive(Debug, Clone, Default)]
pub struct TableExtractor {
    layout: TableLayout,
}

impl TableExtractor {
    #[must_use]
    pub fn new(layout: TableLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    /// Extract lead rows and the pagination summary from one page.
    ///
    /// Never fails: malformed markup yields an empty extraction and the
    /// cause is logged.
    #[must_use]
    pub fn extract(&self, html: &str) -> PageExtraction {
        match self.try_extract(html) {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!("Table extraction failed, treating page as empty: {e}");
                PageExtraction::default()
            }
        }
    }

    fn try_extract(&self, html: &str) -> Result<PageExtraction, ExtractError> {
        let table_sel = parse_selector(&self.layout.table_selector)?;
        let header_sel = parse_selector(&self.layout.header_cell_selector)?;
        let row_sel = parse_selector(&self.layout.body_row_selector)?;
        let cell_sel = parse_selector(&self.layout.cell_selector)?;
        let span_sel = parse_selector(&self.layout.pagination_selector)?;

        let document = Html::parse_document(html);
        let mut leads = Vec::new();

        for (table_idx, table) in document.select(&table_sel).enumerate() {
            let headers: Vec<String> = table
                .select(&header_sel)
                .skip(self.layout.header_skip)
                .map(cell_text)
                .collect();

            if headers.is_empty() {
                debug!("Table {table_idx} has no data headers, skipping");
                continue;
            }

            let before = leads.len();
            for row in table.select(&row_sel) {
                let cells: Vec<String> = row
                    .select(&cell_sel)
                    .skip(self.layout.cell_skip)
                    .map(cell_text)
                    .collect();

                let filled = cells.iter().filter(|c| !c.is_empty()).count();
                if filled < self.layout.min_filled_cells {
                    continue;
                }

                let lead: RawLead = headers.iter().cloned().zip(cells).collect();
                leads.push(lead);
            }
            debug!(
                "Table {table_idx}: {} headers, {} rows kept",
                headers.len(),
                leads.len() - before
            );
        }

        let pagination = find_pagination(&document, &span_sel);

        Ok(PageExtraction { leads, pagination })
    }
}

fn find_pagination(document: &Html, span_sel: &Selector) -> Option<Pagination> {
    document
        .select(span_sel)
        .find_map(|span| parse_pagination_text(&span.text().collect::<String>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_selector_yields_empty_page() {
        let extractor = TableExtractor::new(TableLayout {
            table_selector: "table[".to_string(),
            ..TableLayout::default()
        });
        let page = extractor.extract("<table><tr><td>x</td></tr></table>");
        assert!(page.is_empty());
        assert!(page.pagination.is_none());
    }

    #[test]
    fn test_cell_text_collapses_whitespace() {
        let html = Html::parse_fragment("<table><tr><td>\n  12  Elm\n St </td></tr></table>");
        let sel = Selector::parse("td").unwrap();
        let cell = html.select(&sel).next().unwrap();
        assert_eq!(cell_text(cell), "12 Elm St");
    }
}
