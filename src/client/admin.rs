//! Admin dashboard panels.
//!
//! Every panel follows the same pattern: list on mount, one remote mutation per action,
//! then a fresh list. Nothing is reconciled locally.

use super::local_state::LocalStore;
use crate::errors::AppError;
use crate::gateway::{FeedGateway, RemoteGateway};
use crate::models::{
    CrawlerSource, CreateIncidentRequest, CreateSourceRequest, CreateUserRequest, DashboardUser,
    EventLog, Incident, IncidentQuery, UpdateIncidentRequest, UpdateSourceRequest,
    UpdateUserRequest, MAX_QUERY_LIMIT,
};

/// Rows shown on the logs panel.
pub const LOG_PANEL_LIMIT: usize = 100;

pub struct AdminConsole {
    gateway: RemoteGateway,
}

impl AdminConsole {
    pub fn new(gateway: RemoteGateway) -> Self {
        Self { gateway }
    }

    /// Check operator credentials and remember the session locally.
    ///
    /// On failure the error's `message()` is the inline text to show.
    pub async fn login(
        &self,
        store: &mut LocalStore,
        username: &str,
        password: &str,
    ) -> Result<DashboardUser, AppError> {
        let user = self.gateway.login(username, password).await?;
        store.set_logged_in(true)?;
        tracing::info!("Operator {} logged in", user.username);
        Ok(user)
    }

    pub fn logout(&self, store: &mut LocalStore) -> Result<(), AppError> {
        store.set_logged_in(false)
    }

    // ==================== SOURCES PANEL ====================

    pub async fn sources(&self) -> Result<Vec<CrawlerSource>, AppError> {
        self.gateway.list_sources().await
    }

    pub async fn add_source(
        &self,
        request: &CreateSourceRequest,
    ) -> Result<Vec<CrawlerSource>, AppError> {
        self.gateway.create_source(request).await?;
        self.sources().await
    }

    pub async fn edit_source(
        &self,
        id: &str,
        request: &UpdateSourceRequest,
    ) -> Result<Vec<CrawlerSource>, AppError> {
        self.gateway.update_source(id, request).await?;
        self.sources().await
    }

    pub async fn remove_source(&self, id: &str) -> Result<Vec<CrawlerSource>, AppError> {
        self.gateway.delete_source(id).await?;
        self.sources().await
    }

    // ==================== INCIDENTS PANEL ====================

    pub async fn incidents(&self) -> Result<Vec<Incident>, AppError> {
        let query = IncidentQuery {
            limit: MAX_QUERY_LIMIT,
            ..IncidentQuery::default()
        };
        Ok(self.gateway.query_incidents(&query).await?.rows)
    }

    pub async fn add_incident(
        &self,
        request: &CreateIncidentRequest,
    ) -> Result<Vec<Incident>, AppError> {
        self.gateway.create_incident(request).await?;
        self.incidents().await
    }

    pub async fn edit_incident(
        &self,
        id: &str,
        request: &UpdateIncidentRequest,
    ) -> Result<Vec<Incident>, AppError> {
        self.gateway.update_incident(id, request).await?;
        self.incidents().await
    }

    pub async fn remove_incident(&self, id: &str) -> Result<Vec<Incident>, AppError> {
        self.gateway.delete_incident(id).await?;
        self.incidents().await
    }

    // ==================== OPERATORS PANEL ====================

    pub async fn users(&self) -> Result<Vec<DashboardUser>, AppError> {
        self.gateway.list_users().await
    }

    pub async fn add_user(&self, request: &CreateUserRequest) -> Result<Vec<DashboardUser>, AppError> {
        self.gateway.create_user(request).await?;
        self.users().await
    }

    pub async fn edit_user(
        &self,
        id: &str,
        request: &UpdateUserRequest,
    ) -> Result<Vec<DashboardUser>, AppError> {
        self.gateway.update_user(id, request).await?;
        self.users().await
    }

    pub async fn remove_user(&self, id: &str) -> Result<Vec<DashboardUser>, AppError> {
        self.gateway.delete_user(id).await?;
        self.users().await
    }

    // ==================== LOGS PANEL ====================

    pub async fn logs(&self) -> Result<Vec<EventLog>, AppError> {
        self.gateway.list_logs(LOG_PANEL_LIMIT).await
    }
}
