//! Page extraction: results table rows and the pagination summary

pub mod pagination;
pub mod table;

pub use pagination::{Pagination, parse_pagination_text};
pub use table::{PageExtraction, TableExtractor, TableLayout};
