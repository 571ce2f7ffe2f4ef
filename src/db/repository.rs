//! Database repository for CRUD operations.
//!
//! Uses bound parameters throughout and transactions where a write spans rows.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::auth::{hash_password, verify_password};
use crate::errors::AppError;
use crate::models::{
    CrawlerSource, CreateEventLogRequest, CreateIncidentRequest, CreateSourceRequest,
    CreateUserRequest, DashboardUser, EventLog, Incident, IncidentQuery, Page, PrayerCommitment,
    Source, SourceType, UpdateIncidentRequest, UpdateSourceRequest, UpdateUserRequest,
    MAX_QUERY_LIMIT,
};
use crate::text::sanitize_description;

const INCIDENT_COLUMNS: &str = "id, title, description, location_raw, incident_date, sources, \
     is_verified, prayer_count, summary, image_url, created_at, updated_at, version";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== INCIDENT OPERATIONS ====================

    /// Query incidents newest first, returning one page plus the exact match count.
    pub async fn query_incidents(&self, query: &IncidentQuery) -> Result<Page<Incident>, AppError> {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();

        if let Some(term) = query.search_term() {
            // SQLite folds only ASCII in LIKE, so match against the lowercased copies.
            let pattern = like_pattern(&term.to_lowercase());
            conditions.push(
                "(title_lc LIKE ? ESCAPE '\\' OR description_lc LIKE ? ESCAPE '\\' \
                 OR location_lc LIKE ? ESCAPE '\\')",
            );
            binds.extend([pattern.clone(), pattern.clone(), pattern]);
        }
        if let Some(since) = query.since {
            conditions.push("incident_date >= ?");
            binds.push(format_timestamp(since));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit = query.limit.clamp(1, MAX_QUERY_LIMIT);

        // Count and page are read in one transaction so they agree with each other.
        let mut tx = self.pool.begin().await?;

        let count_sql = format!("SELECT COUNT(*) AS total FROM incidents {}", where_clause);
        let mut count_query = sqlx::query(&count_sql);
        for value in &binds {
            count_query = count_query.bind(value);
        }
        let total: i64 = count_query.fetch_one(&mut *tx).await?.get("total");

        let rows_sql = format!(
            "SELECT {} FROM incidents {} ORDER BY incident_date DESC, id DESC LIMIT ? OFFSET ?",
            INCIDENT_COLUMNS, where_clause
        );
        let mut rows_query = sqlx::query(&rows_sql);
        for value in &binds {
            rows_query = rows_query.bind(value);
        }
        let rows = rows_query
            .bind(limit as i64)
            .bind(query.offset as i64)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page {
            rows: rows.iter().map(incident_from_row).collect(),
            total: total.max(0) as usize,
        })
    }

    /// Get an incident by ID.
    pub async fn get_incident(&self, id: &str) -> Result<Option<Incident>, AppError> {
        let sql = format!("SELECT {} FROM incidents WHERE id = ?", INCIDENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(incident_from_row))
    }

    /// Create a new incident.
    pub async fn create_incident(
        &self,
        request: &CreateIncidentRequest,
    ) -> Result<Incident, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();
        let description = sanitize_description(&request.description);
        let sources_json = serde_json::to_string(&request.sources)?;

        sqlx::query(
            "INSERT INTO incidents (id, title, description, location_raw, title_lc, description_lc, location_lc, incident_date, sources, is_verified, prayer_count, summary, image_url, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, 1)"
        )
        .bind(&id)
        .bind(request.title.trim())
        .bind(&description)
        .bind(request.location_raw.trim())
        .bind(request.title.trim().to_lowercase())
        .bind(description.to_lowercase())
        .bind(request.location_raw.trim().to_lowercase())
        .bind(format_timestamp(request.incident_date))
        .bind(&sources_json)
        .bind(request.is_verified as i32)
        .bind(&request.summary)
        .bind(&request.image_url)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Incident {
            id,
            title: request.title.trim().to_string(),
            description,
            location_raw: request.location_raw.trim().to_string(),
            incident_date: request.incident_date,
            sources: request.sources.clone(),
            is_verified: request.is_verified,
            prayer_count: 0,
            summary: request.summary.clone(),
            image_url: request.image_url.clone(),
            created_at: now.clone(),
            updated_at: now,
            version: 1,
        })
    }

    /// Update an incident with optimistic concurrency control.
    ///
    /// The prayer count is not editable here and does not bump the version.
    pub async fn update_incident(
        &self,
        id: &str,
        request: &UpdateIncidentRequest,
    ) -> Result<Incident, AppError> {
        let existing = self
            .get_incident(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Incident {} not found", id)))?;

        if let Some(expected) = request.expected_version {
            if existing.version != expected {
                return Err(AppError::VersionMismatch {
                    message: format!(
                        "Version mismatch: expected {}, current {}",
                        expected, existing.version
                    ),
                    current_version: existing.version,
                });
            }
        }

        let now = now_timestamp();
        let new_version = existing.version + 1;

        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.title)
            .to_string();
        let description = request
            .description
            .as_deref()
            .map(sanitize_description)
            .unwrap_or_else(|| existing.description.clone());
        let location_raw = request
            .location_raw
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.location_raw)
            .to_string();
        let incident_date = request.incident_date.unwrap_or(existing.incident_date);
        let sources = request
            .sources
            .clone()
            .unwrap_or_else(|| existing.sources.clone());
        let is_verified = request.is_verified.unwrap_or(existing.is_verified);
        let summary = merge_optional(request.summary.as_deref(), existing.summary);
        let image_url = merge_optional(request.image_url.as_deref(), existing.image_url);
        let sources_json = serde_json::to_string(&sources)?;

        // Conditional UPDATE with version check to prevent lost updates
        let result = sqlx::query(
            "UPDATE incidents SET title = ?, description = ?, location_raw = ?, title_lc = ?, description_lc = ?, location_lc = ?, incident_date = ?, sources = ?, is_verified = ?, summary = ?, image_url = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?"
        )
        .bind(&title)
        .bind(&description)
        .bind(&location_raw)
        .bind(title.to_lowercase())
        .bind(description.to_lowercase())
        .bind(location_raw.to_lowercase())
        .bind(format_timestamp(incident_date))
        .bind(&sources_json)
        .bind(is_verified as i32)
        .bind(&summary)
        .bind(&image_url)
        .bind(&now)
        .bind(new_version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_incident(id).await?;
            return Err(AppError::VersionMismatch {
                message: "Concurrent modification detected".to_string(),
                current_version: current.map(|i| i.version).unwrap_or(0),
            });
        }

        // Re-read so a concurrent prayer increment is reflected.
        self.get_incident(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Incident {} not found", id)))
    }

    /// Delete an incident and its prayer commitments.
    pub async fn delete_incident(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM incidents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Incident {} not found", id)));
        }

        Ok(())
    }

    // ==================== PRAYER OPERATIONS ====================

    /// Record a commitment and bump the incident's tally in one transaction.
    ///
    /// A repeated `(visitor, incident)` pair fails with `Conflict` and changes nothing.
    pub async fn record_prayer(
        &self,
        visitor_id: &str,
        incident_id: &str,
    ) -> Result<PrayerCommitment, AppError> {
        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query("UPDATE incidents SET prayer_count = prayer_count + 1 WHERE id = ?")
            .bind(incident_id)
            .execute(&mut *tx)
            .await?;
        if bumped.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Incident {} not found",
                incident_id
            )));
        }

        sqlx::query(
            "INSERT INTO prayer_commitments (visitor_id, incident_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(visitor_id)
        .bind(incident_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(PrayerCommitment {
            visitor_id: visitor_id.to_string(),
            incident_id: incident_id.to_string(),
            created_at: now,
        })
    }

    /// List every commitment made by a visitor.
    pub async fn list_prayers(&self, visitor_id: &str) -> Result<Vec<PrayerCommitment>, AppError> {
        let rows = sqlx::query(
            "SELECT visitor_id, incident_id, created_at FROM prayer_commitments WHERE visitor_id = ? ORDER BY id",
        )
        .bind(visitor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| PrayerCommitment {
                visitor_id: row.get("visitor_id"),
                incident_id: row.get("incident_id"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    // ==================== SOURCE OPERATIONS ====================

    /// List all crawler sources.
    pub async fn list_sources(&self) -> Result<Vec<CrawlerSource>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, url_or_handle, source_type, is_active, created_at FROM crawler_sources ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(source_from_row).collect())
    }

    /// Get a crawler source by ID.
    pub async fn get_source(&self, id: &str) -> Result<Option<CrawlerSource>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, url_or_handle, source_type, is_active, created_at FROM crawler_sources WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(source_from_row))
    }

    pub async fn count_sources(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM crawler_sources")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("total"))
    }

    /// Create a crawler source.
    pub async fn create_source(
        &self,
        request: &CreateSourceRequest,
    ) -> Result<CrawlerSource, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        sqlx::query(
            "INSERT INTO crawler_sources (id, name, url_or_handle, source_type, is_active, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(request.name.trim())
        .bind(request.url_or_handle.trim())
        .bind(request.source_type.as_str())
        .bind(request.is_active as i32)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(CrawlerSource {
            id,
            name: request.name.trim().to_string(),
            url_or_handle: request.url_or_handle.trim().to_string(),
            source_type: request.source_type,
            is_active: request.is_active,
            created_at: now,
        })
    }

    /// Update a crawler source.
    pub async fn update_source(
        &self,
        id: &str,
        request: &UpdateSourceRequest,
    ) -> Result<CrawlerSource, AppError> {
        let existing = self
            .get_source(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Source {} not found", id)))?;

        let updated = CrawlerSource {
            name: request.name.clone().unwrap_or(existing.name),
            url_or_handle: request.url_or_handle.clone().unwrap_or(existing.url_or_handle),
            source_type: request.source_type.unwrap_or(existing.source_type),
            is_active: request.is_active.unwrap_or(existing.is_active),
            ..existing
        };

        sqlx::query(
            "UPDATE crawler_sources SET name = ?, url_or_handle = ?, source_type = ?, is_active = ? WHERE id = ?",
        )
        .bind(&updated.name)
        .bind(&updated.url_or_handle)
        .bind(updated.source_type.as_str())
        .bind(updated.is_active as i32)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(updated)
    }

    /// Delete a crawler source.
    pub async fn delete_source(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM crawler_sources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Source {} not found", id)));
        }

        Ok(())
    }

    // ==================== OPERATOR OPERATIONS ====================

    /// List all dashboard operators.
    pub async fn list_users(&self) -> Result<Vec<DashboardUser>, AppError> {
        let rows =
            sqlx::query("SELECT id, username, created_at FROM dashboard_users ORDER BY username")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    /// Look up an operator and their stored digest.
    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<(DashboardUser, String)>, AppError> {
        let row = sqlx::query(
            "SELECT id, username, created_at, password_hash FROM dashboard_users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| (user_from_row(&row), row.get("password_hash"))))
    }

    /// Create an operator; the password is stored as a SHA-256 digest.
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<DashboardUser, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        sqlx::query(
            "INSERT INTO dashboard_users (id, username, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(request.username.trim())
        .bind(hash_password(&request.password))
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(DashboardUser {
            id,
            username: request.username.trim().to_string(),
            created_at: now,
        })
    }

    /// Rename an operator and/or reset their password.
    pub async fn update_user(
        &self,
        id: &str,
        request: &UpdateUserRequest,
    ) -> Result<DashboardUser, AppError> {
        let row = sqlx::query("SELECT id, username, created_at FROM dashboard_users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let existing = row
            .as_ref()
            .map(user_from_row)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        let username = request
            .username
            .as_deref()
            .map(str::trim)
            .unwrap_or(&existing.username)
            .to_string();

        match &request.password {
            Some(password) => {
                sqlx::query("UPDATE dashboard_users SET username = ?, password_hash = ? WHERE id = ?")
                    .bind(&username)
                    .bind(hash_password(password))
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                sqlx::query("UPDATE dashboard_users SET username = ? WHERE id = ?")
                    .bind(&username)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
        }

        Ok(DashboardUser {
            username,
            ..existing
        })
    }

    /// Delete an operator.
    pub async fn delete_user(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM dashboard_users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }

        Ok(())
    }

    /// Verify operator credentials.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<DashboardUser, AppError> {
        let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

        let (user, stored_hash) = self
            .find_user_by_username(username.trim())
            .await?
            .ok_or_else(invalid)?;

        if verify_password(password, &stored_hash) {
            Ok(user)
        } else {
            Err(invalid())
        }
    }

    // ==================== EVENT LOG OPERATIONS ====================

    /// Append one visitor event.
    pub async fn append_log(&self, request: &CreateEventLogRequest) -> Result<EventLog, AppError> {
        let now = now_timestamp();

        let result = sqlx::query(
            "INSERT INTO event_logs (visitor_id, event_type, incident_id, details, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&request.visitor_id)
        .bind(&request.event_type)
        .bind(&request.incident_id)
        .bind(&request.details)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(EventLog {
            id: result.last_insert_rowid(),
            visitor_id: request.visitor_id.clone(),
            event_type: request.event_type.clone(),
            incident_id: request.incident_id.clone(),
            details: request.details.clone(),
            created_at: now,
        })
    }

    /// Most recent events first, at most `limit` (capped at 100).
    pub async fn list_recent_logs(&self, limit: usize) -> Result<Vec<EventLog>, AppError> {
        let limit = limit.clamp(1, MAX_QUERY_LIMIT);

        let rows = sqlx::query(
            "SELECT id, visitor_id, event_type, incident_id, details, created_at FROM event_logs ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| EventLog {
                id: row.get("id"),
                visitor_id: row.get("visitor_id"),
                event_type: row.get("event_type"),
                incident_id: row.get("incident_id"),
                details: row.get("details"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}

// ==================== HELPER FUNCTIONS ====================

/// Timestamps are stored as fixed-width UTC strings so text order is time order.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(e) => {
            tracing::warn!("Unparseable stored timestamp {:?}, using epoch: {}", value, e);
            DateTime::<Utc>::default()
        }
    }
}

/// Apply an optional text edit: absent keeps the current value, a blank string clears it.
fn merge_optional(requested: Option<&str>, current: Option<String>) -> Option<String> {
    match requested.map(str::trim) {
        Some("") => None,
        Some(value) => Some(value.to_string()),
        None => current,
    }
}

/// Wrap a term for `LIKE ... ESCAPE '\'`, escaping the wildcard characters it contains.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn incident_from_row(row: &SqliteRow) -> Incident {
    let sources: Vec<Source> = row
        .get::<Option<String>, _>("sources")
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();

    Incident {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        location_raw: row.get("location_raw"),
        incident_date: parse_timestamp(&row.get::<String, _>("incident_date")),
        sources,
        is_verified: row.get::<i32, _>("is_verified") != 0,
        prayer_count: row.get("prayer_count"),
        summary: row.get("summary"),
        image_url: row.get("image_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}

fn source_from_row(row: &SqliteRow) -> CrawlerSource {
    CrawlerSource {
        id: row.get("id"),
        name: row.get("name"),
        url_or_handle: row.get("url_or_handle"),
        source_type: SourceType::parse(&row.get::<String, _>("source_type"))
            .unwrap_or(SourceType::Rss),
        is_active: row.get::<i32, _>("is_active") != 0,
        created_at: row.get("created_at"),
    }
}

fn user_from_row(row: &SqliteRow) -> DashboardUser {
    DashboardUser {
        id: row.get("id"),
        username: row.get("username"),
        created_at: row.get("created_at"),
    }
}
