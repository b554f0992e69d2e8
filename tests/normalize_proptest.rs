//! Property tests for header and cell normalization

use leadscrape::lead::{
    FieldValue, LEAD_COLUMNS, RawLead, is_numeric_column, normalize_column_name, normalize_lead,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn column_normalization_is_idempotent(header in "[A-Za-z0-9 .?%_#/-]{0,40}") {
        let once = normalize_column_name(&header);
        prop_assert_eq!(normalize_column_name(&once), once.clone());
        prop_assert!(!once.contains([' ', '.', '?', '%']));
    }

    #[test]
    fn normalized_leads_only_hold_schema_columns(
        cells in proptest::collection::vec(("[A-Za-z %.?]{1,24}", "[ -~]{0,16}"), 0..12)
    ) {
        let raw: RawLead = cells.into_iter().collect();
        let lead = normalize_lead(&raw);
        for (column, value) in lead.iter() {
            prop_assert!(LEAD_COLUMNS.contains(&column));
            if is_numeric_column(column) {
                prop_assert!(matches!(value, None | Some(FieldValue::Integer(_))));
            }
        }
    }

    #[test]
    fn schema_labels_round_trip(idx in 0..LEAD_COLUMNS.len()) {
        let column = LEAD_COLUMNS[idx];
        let label = column.replace('_', " ").to_uppercase();
        prop_assert_eq!(normalize_column_name(&label), column);
    }
}

#[test]
fn test_rendered_headers_map_to_columns() {
    let raw: RawLead = [
        ("Property Address", "12 Elm St"),
        ("Bedrooms", "3"),
        ("Bathrooms", "-"),
        ("Year Build", "n/a"),
        ("% ARV", "64%"),
        ("Opt Out?", "No"),
        ("Unknown Column", "x"),
    ]
    .into_iter()
    .collect();

    let lead = normalize_lead(&raw);
    assert_eq!(lead.get("property_address"), Some(&FieldValue::Text("12 Elm St".into())));
    assert_eq!(lead.get("bedrooms"), Some(&FieldValue::Integer(3)));
    assert!(lead.contains("bathrooms"));
    assert_eq!(lead.get("bathrooms"), None);
    assert_eq!(lead.get("year_build"), None);
    assert_eq!(lead.get("pct_arv"), Some(&FieldValue::Text("64%".into())));
    assert_eq!(lead.get("opt_out"), Some(&FieldValue::Text("No".into())));
    assert!(!lead.contains("unknown_column"));
}
