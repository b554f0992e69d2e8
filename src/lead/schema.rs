//! Fixed lead schema
//!
//! The column allow-list doubles as the CSV export header order and the
//! relational table layout. Keys outside this list are dropped during
//! normalization.

/// Every persisted lead column, in export order.
pub const LEAD_COLUMNS: [&str; 56] = [
    "property_address",
    "city",
    "state",
    "zip",
    "phone_numbers",
    "owner_first_name",
    "owner_last_name",
    "list_count",
    "tag_count",
    "mailing_address",
    "mailing_city",
    "mailing_state",
    "mailing_zip_code",
    "emails",
    "pics",
    "apn",
    "est_value",
    "county",
    "date_added",
    "date_updated",
    "last_sale_date",
    "last_sale_amount",
    "mailing_county",
    "salesforce_lead_id",
    "vacancy",
    "mailing_vacancy",
    "opt_out",
    "property_type",
    "owner_occupied",
    "bedrooms",
    "bathrooms",
    "property_sqft",
    "lot_size",
    "year_build",
    "assessed_value",
    "total_loan_balance",
    "est_equity",
    "est_ltv",
    "mls_status",
    "data_provider_ranking",
    "probate",
    "liens",
    "pre_foreclosure",
    "taxes",
    "vacant",
    "zoning",
    "loan_type",
    "loan_interest_rate",
    "owner_2_first_name",
    "owner_2_last_name",
    "self_managed",
    "pushed_to_batchdialer",
    "lead_score",
    "arv",
    "spread",
    "pct_arv",
];

/// Columns coerced to integers; unparseable values become absent.
pub const NUMERIC_COLUMNS: [&str; 6] = [
    "list_count",
    "tag_count",
    "bedrooms",
    "bathrooms",
    "year_build",
    "lead_score",
];

/// Placeholder the results table renders for an empty cell.
pub const SENTINEL_VALUE: &str = "-";

/// Look up the canonical `'static` name of a schema column.
#[must_use]
pub fn schema_column(name: &str) -> Option<&'static str> {
    LEAD_COLUMNS.iter().copied().find(|col| *col == name)
}

#[must_use]
pub fn is_numeric_column(name: &str) -> bool {
    NUMERIC_COLUMNS.contains(&name)
}
