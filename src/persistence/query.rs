//! Relational query surface over stored leads
//!
//! Filtering, favorites-first sorting and pagination for the lead table,
//! plus the per-lead edit operations. Column names only ever come from the
//! schema allow-list; every value is bound as a parameter.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use super::sqlite::{SqliteLeadStore, SqliteQuery, bind_field, row_to_stored};
use super::{PersistenceResult, parse_timestamp};
use crate::lead::{StoredLead, normalize_value, schema_column};

/// Default page size for `query_leads`.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Columns accepted as `sort_by` besides the schema columns.
const EXTRA_SORT_COLUMNS: [&str; 3] = ["id", "location", "created_at"];

/// A single filter on a schema column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// `column = value`
    Equals { column: String, value: String },
    /// `column LIKE value%`
    Prefix { column: String, value: String },
    /// `column LIKE %value%`
    Contains { column: String, value: String },
    /// Numeric bounds after stripping `$`, `,` and `%` from the stored text.
    Range {
        column: String,
        min: Option<f64>,
        max: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Lenient parse; anything but `asc` sorts descending.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A paginated lead query.
///
/// Results are always ordered favorites first, then by `sort_by`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadQuery {
    pub location: Option<String>,
    pub predicates: Vec<Predicate>,
    pub favorites_only: bool,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub offset: i64,
    pub limit: i64,
}

impl Default for LeadQuery {
    fn default() -> Self {
        Self {
            location: None,
            predicates: Vec::new(),
            favorites_only: false,
            sort_by: None,
            sort_order: SortOrder::Desc,
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Strip currency and percent decoration and parse the rest.
fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(['$', ',', '%'], "").trim().parse().ok()
}

impl LeadQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a query from the flat parameter map the web UI sends.
    ///
    /// Recognized keys: `city` (prefix), `mlsStatus` and `taxes` (substring),
    /// `preForeclosure`, `isFavorite`, `minValue`/`maxValue`,
    /// `minSaleAmount`/`maxSaleAmount`, `minLoanBalance`/`maxLoanBalance`,
    /// `minInterestRate`/`maxInterestRate`. Any other key naming a schema
    /// column is an equality filter; unknown keys are ignored.
    #[must_use]
    pub fn from_params(params: &BTreeMap<String, String>) -> Self {
        let mut query = Self::new();
        let mut ranges: BTreeMap<&'static str, (Option<f64>, Option<f64>)> = BTreeMap::new();

        for (key, value) in params {
            if value.trim().is_empty() {
                continue;
            }
            match key.as_str() {
                "city" => query = query.prefix("city", value),
                "mlsStatus" => query = query.contains("mls_status", value),
                "taxes" => query = query.contains("taxes", value),
                "preForeclosure" => query = query.equals("pre_foreclosure", value),
                "isFavorite" => {
                    query.favorites_only = matches!(value.as_str(), "true" | "1");
                }
                "location" => query.location = Some(value.clone()),
                "sortBy" | "sort_by" => query.sort_by = Some(value.clone()),
                "sortOrder" | "sort_order" => query.sort_order = SortOrder::parse(value),
                "minValue" => ranges.entry("est_value").or_default().0 = parse_amount(value),
                "maxValue" => ranges.entry("est_value").or_default().1 = parse_amount(value),
                "minSaleAmount" => {
                    ranges.entry("last_sale_amount").or_default().0 = parse_amount(value);
                }
                "maxSaleAmount" => {
                    ranges.entry("last_sale_amount").or_default().1 = parse_amount(value);
                }
                "minLoanBalance" => {
                    ranges.entry("total_loan_balance").or_default().0 = parse_amount(value);
                }
                "maxLoanBalance" => {
                    ranges.entry("total_loan_balance").or_default().1 = parse_amount(value);
                }
                "minInterestRate" => {
                    ranges.entry("loan_interest_rate").or_default().0 = parse_amount(value);
                }
                "maxInterestRate" => {
                    ranges.entry("loan_interest_rate").or_default().1 = parse_amount(value);
                }
                other => {
                    if let Some(column) = schema_column(other) {
                        query = query.equals(column, value);
                    }
                }
            }
        }

        for (column, (min, max)) in ranges {
            query = query.range(column, min, max);
        }
        query
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn equals(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Equals {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn prefix(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Prefix {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn contains(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Contains {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn range(mut self, column: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        if min.is_some() || max.is_some() {
            self.predicates.push(Predicate::Range {
                column: column.into(),
                min,
                max,
            });
        }
        self
    }

    #[must_use]
    pub fn favorites_only(mut self, only: bool) -> Self {
        self.favorites_only = only;
        self
    }

    #[must_use]
    pub fn sort(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(column.into());
        self.sort_order = order;
        self
    }

    #[must_use]
    pub fn page(mut self, offset: i64, limit: i64) -> Self {
        self.offset = offset.max(0);
        self.limit = limit.max(1);
        self
    }

    fn sort_column(&self) -> &str {
        match self.sort_by.as_deref() {
            Some(col) if schema_column(col).is_some() || EXTRA_SORT_COLUMNS.contains(&col) => col,
            Some(col) => {
                warn!("Ignoring unknown sort column '{col}'");
                "created_at"
            }
            None => "created_at",
        }
    }

    /// WHERE clause and its bind values.
    fn where_clause(&self) -> (String, Vec<BindValue>) {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();

        if let Some(location) = &self.location {
            clauses.push("location = ?".to_string());
            binds.push(BindValue::Text(location.clone()));
        }
        if self.favorites_only {
            clauses.push("is_favorite = 1".to_string());
        }

        for predicate in &self.predicates {
            let column = match predicate {
                Predicate::Equals { column, .. }
                | Predicate::Prefix { column, .. }
                | Predicate::Contains { column, .. }
                | Predicate::Range { column, .. } => column,
            };
            let Some(column) = schema_column(column) else {
                warn!("Ignoring filter on unknown column '{column}'");
                continue;
            };

            match predicate {
                Predicate::Equals { value, .. } => {
                    clauses.push(format!("{column} = ?"));
                    binds.push(BindValue::Text(value.clone()));
                }
                Predicate::Prefix { value, .. } => {
                    clauses.push(format!("{column} LIKE ?"));
                    binds.push(BindValue::Text(format!("{value}%")));
                }
                Predicate::Contains { value, .. } => {
                    clauses.push(format!("{column} LIKE ?"));
                    binds.push(BindValue::Text(format!("%{value}%")));
                }
                Predicate::Range { min, max, .. } => {
                    let numeric = format!(
                        "CAST(REPLACE(REPLACE(REPLACE({column}, '$', ''), ',', ''), '%', '') AS REAL)"
                    );
                    if let Some(min) = min {
                        clauses.push(format!("{numeric} >= ?"));
                        binds.push(BindValue::Real(*min));
                    }
                    if let Some(max) = max {
                        clauses.push(format!("{numeric} <= ?"));
                        binds.push(BindValue::Real(*max));
                    }
                }
            }
        }

        if clauses.is_empty() {
            (String::new(), binds)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), binds)
        }
    }
}

#[derive(Debug, Clone)]
enum BindValue {
    Text(String),
    Real(f64),
}

fn bind_all<'q>(mut query: SqliteQuery<'q>, binds: &[BindValue]) -> SqliteQuery<'q> {
    for bind in binds {
        query = match bind {
            BindValue::Text(s) => query.bind(s.clone()),
            BindValue::Real(n) => query.bind(*n),
        };
    }
    query
}

/// One page of query results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadPage {
    pub leads: Vec<StoredLead>,
    /// Matches across all pages.
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
    /// Leads on this page.
    pub count: usize,
}

/// Distinct values for the UI's filter dropdowns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub cities: Vec<String>,
    pub mls_statuses: Vec<String>,
    pub probate_values: Vec<String>,
    pub liens_values: Vec<String>,
    pub pre_foreclosure_values: Vec<String>,
    pub taxes_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSummary {
    pub location: String,
    pub lead_count: i64,
    pub last_scraped: Option<DateTime<Utc>>,
}

impl SqliteLeadStore {
    /// Run a filtered, favorites-first, paginated query.
    pub async fn query_leads(&self, query: &LeadQuery) -> PersistenceResult<LeadPage> {
        let (where_sql, binds) = query.where_clause();

        let count_sql = format!("SELECT COUNT(*) FROM leads{where_sql}");
        let count_row = bind_all(sqlx::query(&count_sql), &binds)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = sqlx::Row::try_get(&count_row, 0)?;

        let select_sql = format!(
            "SELECT * FROM leads{where_sql} ORDER BY is_favorite DESC, {} {} LIMIT ? OFFSET ?",
            query.sort_column(),
            query.sort_order.as_sql()
        );
        let rows = bind_all(sqlx::query(&select_sql), &binds)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await?;

        let leads = rows
            .iter()
            .map(row_to_stored)
            .collect::<PersistenceResult<Vec<_>>>()?;

        Ok(LeadPage {
            count: leads.len(),
            leads,
            total,
            offset: query.offset,
            limit: query.limit,
        })
    }

    async fn distinct_values(&self, column: &'static str) -> PersistenceResult<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {column} FROM leads \
             WHERE {column} IS NOT NULL AND {column} != '' AND {column} != '-' \
             ORDER BY {column}"
        );
        let rows: Vec<(String,)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    pub async fn filter_options(&self) -> PersistenceResult<FilterOptions> {
        Ok(FilterOptions {
            cities: self.distinct_values("city").await?,
            mls_statuses: self.distinct_values("mls_status").await?,
            probate_values: self.distinct_values("probate").await?,
            liens_values: self.distinct_values("liens").await?,
            pre_foreclosure_values: self.distinct_values("pre_foreclosure").await?,
            taxes_values: self.distinct_values("taxes").await?,
        })
    }

    pub async fn get_lead(&self, id: i64) -> PersistenceResult<Option<StoredLead>> {
        let row = sqlx::query("SELECT * FROM leads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_stored).transpose()
    }

    /// Returns false when no lead has this id.
    pub async fn set_favorite(&self, id: i64, favorite: bool) -> PersistenceResult<bool> {
        let affected = sqlx::query("UPDATE leads SET is_favorite = ? WHERE id = ?")
            .bind(favorite)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    /// Flip the favorite flag; returns the new state.
    pub async fn toggle_favorite(&self, id: i64) -> PersistenceResult<Option<bool>> {
        let row: Option<(bool,)> = sqlx::query_as(
            "UPDATE leads SET is_favorite = 1 - is_favorite WHERE id = ? RETURNING is_favorite",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(fav,)| fav))
    }

    /// Overwrite schema columns of one lead and mark it as a favorite.
    ///
    /// Keys outside the schema are ignored. Values go through the same
    /// normalization as scraped cells. Returns false when no lead has this id.
    pub async fn update_lead(
        &self,
        id: i64,
        updates: &BTreeMap<String, String>,
    ) -> PersistenceResult<bool> {
        let columns: Vec<(&'static str, &String)> = updates
            .iter()
            .filter_map(|(key, value)| schema_column(key).map(|col| (col, value)))
            .collect();

        let mut assignments: Vec<String> = columns.iter().map(|(col, _)| format!("{col} = ?")).collect();
        assignments.push("is_favorite = 1".to_string());

        let sql = format!("UPDATE leads SET {} WHERE id = ?", assignments.join(", "));
        let mut query = sqlx::query(&sql);
        for (col, value) in &columns {
            query = bind_field(query, normalize_value(col, value).as_ref());
        }

        let affected = query.bind(id).execute(&self.pool).await?.rows_affected();
        Ok(affected > 0)
    }

    /// Operator action: drop every lead and the entry metadata of a location.
    ///
    /// Returns the number of leads removed.
    pub async fn delete_location(&self, location: &str) -> PersistenceResult<u64> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM leads WHERE location = ?")
            .bind(location)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM locations WHERE location = ?")
            .bind(location)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log::info!("Deleted {deleted} leads for location '{location}'");
        Ok(deleted)
    }

    /// Every stored location with its lead count and newest row time.
    pub async fn location_summaries(&self) -> PersistenceResult<Vec<LocationSummary>> {
        let rows: Vec<(String, i64, Option<String>)> = sqlx::query_as(
            "SELECT location, COUNT(*), MAX(created_at) FROM leads GROUP BY location ORDER BY location",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(location, lead_count, last)| {
                Ok(LocationSummary {
                    location,
                    lead_count,
                    last_scraped: last.as_deref().map(parse_timestamp).transpose()?,
                })
            })
            .collect()
    }
}
