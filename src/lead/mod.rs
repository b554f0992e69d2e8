//! Lead records: fixed schema, raw and normalized forms

pub mod normalize;
pub mod schema;
pub mod types;

pub use normalize::{normalize_column_name, normalize_lead, normalize_value};
pub use schema::{LEAD_COLUMNS, NUMERIC_COLUMNS, SENTINEL_VALUE, is_numeric_column, schema_column};
pub use types::{FieldValue, Lead, RawLead, StoredLead};
