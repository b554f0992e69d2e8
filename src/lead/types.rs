//! Lead value types
//!
//! `RawLead` is what the table extractor produces: header text paired with
//! cell text, in column order. `Lead` is the normalized, schema-checked
//! record handed to persistence. `StoredLead` is a `Lead` as read back from
//! a durable store, carrying the location it was saved under.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One table row as scraped: `(header, cell)` pairs in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawLead {
    fields: Vec<(String, String)>,
}

impl RawLead {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, header: impl Into<String>, value: impl Into<String>) {
        self.fields.push((header.into(), value.into()));
    }

    #[must_use]
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rough size of this record once serialized as a JSON object.
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        // braces plus, per field: two quoted strings, colon and comma
        2 + self
            .fields
            .iter()
            .map(|(h, v)| h.len() + v.len() + 6)
            .sum::<usize>()
    }
}

impl<H: Into<String>, V: Into<String>> FromIterator<(H, V)> for RawLead {
    fn from_iter<I: IntoIterator<Item = (H, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(h, v)| (h.into(), v.into()))
                .collect(),
        }
    }
}

/// A normalized column value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl FieldValue {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Integer(_) => None,
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A lead restricted to schema columns.
///
/// A key mapped to `None` was present in the scraped row but held the
/// sentinel placeholder or failed integer coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lead {
    fields: BTreeMap<String, Option<FieldValue>>,
}

impl Lead {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: impl Into<String>, value: Option<FieldValue>) {
        self.fields.insert(column.into(), value);
    }

    /// The value of a column, `None` when absent or null.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&FieldValue>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A lead read back from a durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLead {
    /// Row id; only the relational store assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub location: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(flatten)]
    pub lead: Lead,
}

impl StoredLead {
    #[must_use]
    pub fn new(location: impl Into<String>, lead: Lead, created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            location: location.into(),
            created_at,
            is_favorite: false,
            lead,
        }
    }
}
