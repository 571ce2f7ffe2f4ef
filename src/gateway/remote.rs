//! HTTP client for the portal data service.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::FeedGateway;
use crate::auth::API_KEY_HEADER;
use crate::config::ClientConfig;
use crate::errors::{AppError, ErrorResponse};
use crate::models::{
    CrawlerSource, CreateEventLogRequest, CreateIncidentRequest, CreatePrayerRequest,
    CreateSourceRequest, CreateUserRequest, DashboardUser, EventLog, Incident, IncidentQuery,
    LoginRequest, Page, PrayerCommitment, UpdateIncidentRequest, UpdateSourceRequest,
    UpdateUserRequest,
};

/// Success envelope as sent by the service.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    count: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VisitorFilter<'a> {
    visitor_id: &'a str,
}

#[derive(Debug, Serialize)]
struct LimitFilter {
    limit: usize,
}

/// [`FeedGateway`] over the service's JSON API, plus the admin panel operations.
#[derive(Clone)]
pub struct RemoteGateway {
    client: Client,
    base_url: String,
    service_key: Option<String>,
}

impl RemoteGateway {
    pub fn new(base_url: impl Into<String>, service_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.api_url.clone(), config.service_key.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.service_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Envelope<T>, AppError> {
        let response = self.authorize(builder).send().await?;
        decode(response).await
    }

    // ==================== INCIDENTS ====================

    pub async fn get_incident(&self, id: &str) -> Result<Incident, AppError> {
        let url = self.url(&format!("/incidents/{}", id));
        Ok(self.send(self.client.get(url)).await?.data)
    }

    pub async fn create_incident(&self, request: &CreateIncidentRequest) -> Result<Incident, AppError> {
        let builder = self.client.post(self.url("/admin/incidents")).json(request);
        Ok(self.send(builder).await?.data)
    }

    pub async fn update_incident(
        &self,
        id: &str,
        request: &UpdateIncidentRequest,
    ) -> Result<Incident, AppError> {
        let builder = self
            .client
            .put(self.url(&format!("/admin/incidents/{}", id)))
            .json(request);
        Ok(self.send(builder).await?.data)
    }

    pub async fn delete_incident(&self, id: &str) -> Result<(), AppError> {
        let builder = self.client.delete(self.url(&format!("/admin/incidents/{}", id)));
        self.send::<()>(builder).await.map(|_| ())
    }

    // ==================== SOURCES ====================

    pub async fn list_sources(&self) -> Result<Vec<CrawlerSource>, AppError> {
        Ok(self.send(self.client.get(self.url("/admin/sources"))).await?.data)
    }

    pub async fn create_source(&self, request: &CreateSourceRequest) -> Result<CrawlerSource, AppError> {
        let builder = self.client.post(self.url("/admin/sources")).json(request);
        Ok(self.send(builder).await?.data)
    }

    pub async fn update_source(
        &self,
        id: &str,
        request: &UpdateSourceRequest,
    ) -> Result<CrawlerSource, AppError> {
        let builder = self
            .client
            .put(self.url(&format!("/admin/sources/{}", id)))
            .json(request);
        Ok(self.send(builder).await?.data)
    }

    pub async fn delete_source(&self, id: &str) -> Result<(), AppError> {
        let builder = self.client.delete(self.url(&format!("/admin/sources/{}", id)));
        self.send::<()>(builder).await.map(|_| ())
    }

    // ==================== OPERATORS ====================

    pub async fn list_users(&self) -> Result<Vec<DashboardUser>, AppError> {
        Ok(self.send(self.client.get(self.url("/admin/users"))).await?.data)
    }

    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<DashboardUser, AppError> {
        let builder = self.client.post(self.url("/admin/users")).json(request);
        Ok(self.send(builder).await?.data)
    }

    pub async fn update_user(
        &self,
        id: &str,
        request: &UpdateUserRequest,
    ) -> Result<DashboardUser, AppError> {
        let builder = self
            .client
            .put(self.url(&format!("/admin/users/{}", id)))
            .json(request);
        Ok(self.send(builder).await?.data)
    }

    pub async fn delete_user(&self, id: &str) -> Result<(), AppError> {
        let builder = self.client.delete(self.url(&format!("/admin/users/{}", id)));
        self.send::<()>(builder).await.map(|_| ())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<DashboardUser, AppError> {
        let builder = self.client.post(self.url("/auth/login")).json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        });
        Ok(self.send(builder).await?.data)
    }

    // ==================== LOGS ====================

    pub async fn list_logs(&self, limit: usize) -> Result<Vec<EventLog>, AppError> {
        let builder = self
            .client
            .get(self.url("/admin/logs"))
            .query(&LimitFilter { limit });
        Ok(self.send(builder).await?.data)
    }
}

#[async_trait]
impl FeedGateway for RemoteGateway {
    async fn query_incidents(&self, query: &IncidentQuery) -> Result<Page<Incident>, AppError> {
        let builder = self.client.get(self.url("/incidents")).query(query);
        let envelope: Envelope<Vec<Incident>> = self.send(builder).await?;
        let total = envelope
            .count
            .ok_or_else(|| AppError::Transport("Incident query response missing count".to_string()))?;

        Ok(Page {
            rows: envelope.data,
            total,
        })
    }

    async fn insert_prayer(&self, visitor_id: &str, incident_id: &str) -> Result<(), AppError> {
        let builder = self.client.post(self.url("/prayers")).json(&CreatePrayerRequest {
            visitor_id: visitor_id.to_string(),
            incident_id: incident_id.to_string(),
        });
        self.send::<PrayerCommitment>(builder).await.map(|_| ())
    }

    async fn list_prayers(&self, visitor_id: &str) -> Result<Vec<PrayerCommitment>, AppError> {
        let builder = self
            .client
            .get(self.url("/prayers"))
            .query(&VisitorFilter { visitor_id });
        Ok(self.send(builder).await?.data)
    }

    async fn log_event(&self, event: &CreateEventLogRequest) -> Result<(), AppError> {
        let builder = self.client.post(self.url("/logs")).json(event);
        self.send::<EventLog>(builder).await.map(|_| ())
    }
}

/// Turn a service response into its success envelope or the error it describes.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<Envelope<T>, AppError> {
    let status = response.status();
    let body = response.bytes().await?;

    if status.is_success() {
        return serde_json::from_slice(&body).map_err(|e| {
            AppError::Transport(format!("Undecodable response ({}): {}", status, e))
        });
    }

    match serde_json::from_slice::<ErrorResponse>(&body) {
        Ok(envelope) => Err(AppError::from_details(&envelope.error)),
        Err(_) => Err(AppError::Transport(format!(
            "Service responded with {}",
            status
        ))),
    }
}
