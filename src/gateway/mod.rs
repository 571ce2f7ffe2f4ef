//! Data gateway seam between the client core and the data service.
//!
//! The feed controller and prayer reconciler only see [`FeedGateway`]. The HTTP
//! implementation is [`RemoteGateway`]; the SQLite [`Repository`] implements the same
//! trait for in-process use.

mod remote;

pub use remote::*;

use async_trait::async_trait;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{CreateEventLogRequest, Incident, IncidentQuery, Page, PrayerCommitment};

/// Remote operations the feed and prayer reconciliation depend on.
#[async_trait]
pub trait FeedGateway: Send + Sync {
    /// Filtered, newest-first page of incidents plus the exact match count.
    async fn query_incidents(&self, query: &IncidentQuery) -> Result<Page<Incident>, AppError>;

    /// Insert one prayer commitment. A repeated pair fails with [`AppError::Conflict`].
    async fn insert_prayer(&self, visitor_id: &str, incident_id: &str) -> Result<(), AppError>;

    /// Every commitment previously made by this visitor.
    async fn list_prayers(&self, visitor_id: &str) -> Result<Vec<PrayerCommitment>, AppError>;

    /// Append one visitor event.
    async fn log_event(&self, event: &CreateEventLogRequest) -> Result<(), AppError>;
}

#[async_trait]
impl FeedGateway for Repository {
    async fn query_incidents(&self, query: &IncidentQuery) -> Result<Page<Incident>, AppError> {
        Repository::query_incidents(self, query).await
    }

    async fn insert_prayer(&self, visitor_id: &str, incident_id: &str) -> Result<(), AppError> {
        self.record_prayer(visitor_id, incident_id).await.map(|_| ())
    }

    async fn list_prayers(&self, visitor_id: &str) -> Result<Vec<PrayerCommitment>, AppError> {
        Repository::list_prayers(self, visitor_id).await
    }

    async fn log_event(&self, event: &CreateEventLogRequest) -> Result<(), AppError> {
        self.append_log(event).await.map(|_| ())
    }
}
