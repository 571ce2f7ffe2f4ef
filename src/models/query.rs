//! Incident query parameters and paged results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of incidents per feed page.
pub const PAGE_SIZE: usize = 12;

/// Upper bound on a single query's row count.
pub const MAX_QUERY_LIMIT: usize = 100;

/// Filter, range and cutoff for an incident query. Results are always ordered by
/// incident date, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentQuery {
    /// Case-insensitive substring over title, description and location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Only incidents dated at or after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

fn default_limit() -> usize {
    PAGE_SIZE
}

impl IncidentQuery {
    /// Query for feed page `page` (zero-based) under `term`.
    pub fn page(term: &str, page: usize) -> Self {
        Self::at_offset(term, page * PAGE_SIZE)
    }

    /// Query for one page starting at `offset` under `term`.
    pub fn at_offset(term: &str, offset: usize) -> Self {
        Self {
            search: Some(term.to_string()),
            offset,
            limit: PAGE_SIZE,
            since: None,
        }
    }

    /// The search term with surrounding whitespace removed, or `None` when there is
    /// nothing to filter by.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    /// Inclusive index of the last row this query can return.
    pub fn range_end(&self) -> usize {
        self.offset + self.limit.max(1) - 1
    }
}

/// One page of rows together with the exact count of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: usize,
}
