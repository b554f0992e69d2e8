//! Column-name and value normalization

use super::schema::{SENTINEL_VALUE, is_numeric_column, schema_column};
use super::types::{FieldValue, Lead, RawLead};

/// Map a rendered header label to its column name.
///
/// Lowercases, turns spaces into underscores, strips `.` and `?` and spells
/// `%` as `pct`. Applying it to its own output is a no-op.
#[must_use]
pub fn normalize_column_name(header: &str) -> String {
    header
        .to_lowercase()
        .replace(' ', "_")
        .replace(['.', '?'], "")
        .replace('%', "pct")
}

/// Normalize one raw cell for the given (already normalized) column.
///
/// The sentinel placeholder becomes absent. Numeric columns are parsed as
/// integers and fall back to absent when the cell is empty or unparseable.
#[must_use]
pub fn normalize_value(column: &str, raw: &str) -> Option<FieldValue> {
    let trimmed = raw.trim();
    if trimmed == SENTINEL_VALUE {
        return None;
    }

    if is_numeric_column(column) {
        return trimmed.parse::<i64>().ok().map(FieldValue::Integer);
    }

    Some(FieldValue::Text(raw.to_string()))
}

/// Convert a scraped row into a schema-checked `Lead`.
///
/// Headers that do not map to a schema column are dropped. When two headers
/// normalize to the same column, the later one wins.
#[must_use]
pub fn normalize_lead(raw: &RawLead) -> Lead {
    let mut lead = Lead::new();
    for (header, value) in raw.iter() {
        let column = normalize_column_name(header);
        let Some(column) = schema_column(&column) else {
            continue;
        };
        lead.set(column, normalize_value(column, value));
    }
    lead
}
