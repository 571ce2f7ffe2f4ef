//! Prayer commitments with optimistic, at-most-once local counter increments.
//!
//! The local tally is advisory: increments from other visitors are only picked up on
//! the next fetch, and no attempt is made to reconcile against them.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::controller::{FeedController, FeedState};
use crate::errors::AppError;
use crate::gateway::FeedGateway;
use crate::models::CreateEventLogRequest;

/// Event type written to the visitor log after a commitment.
pub const PRAYER_EVENT: &str = "prayer";

/// Result of a `record_prayer` call.
#[derive(Debug, Clone, PartialEq)]
pub enum PrayerOutcome {
    /// Remote insert succeeded and the local count was bumped.
    Recorded,
    /// This visitor had already committed; nothing changed locally.
    AlreadyCommitted,
    /// Remote insert failed; nothing changed, the user may retry.
    Failed(AppError),
}

/// Applies prayer commitments to the shared feed state.
pub struct PrayerReconciler<G> {
    gateway: Arc<G>,
    feed: Arc<RwLock<FeedState>>,
    visitor_id: String,
    // Only held for lookups and inserts, never across a gateway call.
    committed: Mutex<HashSet<String>>,
    // Held for a whole commit so concurrent calls for one incident serialise.
    commit_lock: Mutex<()>,
}

impl<G: FeedGateway> PrayerReconciler<G> {
    /// Reconciler sharing `feed`'s state, acting for `visitor_id`.
    pub fn new(feed: &FeedController<G>, visitor_id: impl Into<String>) -> Self {
        Self {
            gateway: Arc::clone(feed.gateway()),
            feed: Arc::clone(feed.shared_state()),
            visitor_id: visitor_id.into(),
            committed: Mutex::new(HashSet::new()),
            commit_lock: Mutex::new(()),
        }
    }

    pub fn visitor_id(&self) -> &str {
        &self.visitor_id
    }

    /// Load this visitor's earlier commitments from the remote store.
    pub async fn sync_commitments(&self) -> Result<usize, AppError> {
        let commitments = self.gateway.list_prayers(&self.visitor_id).await?;
        let mut committed = self.committed.lock().await;
        committed.extend(commitments.into_iter().map(|c| c.incident_id));
        Ok(committed.len())
    }

    /// Whether the pray button for `incident_id` should be disabled.
    pub async fn has_committed(&self, incident_id: &str) -> bool {
        self.committed.lock().await.contains(incident_id)
    }

    /// Commit to `incident_id` once, bumping the local tally on success.
    pub async fn record_prayer(&self, incident_id: &str) -> PrayerOutcome {
        let commit = self.commit_lock.lock().await;
        if self.has_committed(incident_id).await {
            return PrayerOutcome::AlreadyCommitted;
        }

        match self
            .gateway
            .insert_prayer(&self.visitor_id, incident_id)
            .await
        {
            Ok(()) => {
                self.mark_committed(incident_id).await;
                self.increment_local(incident_id).await;
                drop(commit);

                self.log_commitment(incident_id).await;
                PrayerOutcome::Recorded
            }
            Err(AppError::Conflict(_)) => {
                // Made in an earlier session the startup sync did not see.
                self.mark_committed(incident_id).await;
                PrayerOutcome::AlreadyCommitted
            }
            Err(err) => {
                tracing::warn!("Prayer commitment for {} failed: {}", incident_id, err);
                PrayerOutcome::Failed(err)
            }
        }
    }

    async fn mark_committed(&self, incident_id: &str) {
        self.committed.lock().await.insert(incident_id.to_string());
    }

    async fn increment_local(&self, incident_id: &str) {
        let mut state = self.feed.write().await;
        if let Some(incident) = state.incidents.iter_mut().find(|i| i.id == incident_id) {
            incident.prayer_count += 1;
        }
        if let Some(selected) = state.selected.as_mut().filter(|i| i.id == incident_id) {
            selected.prayer_count += 1;
        }
    }

    async fn log_commitment(&self, incident_id: &str) {
        let event = CreateEventLogRequest {
            visitor_id: self.visitor_id.clone(),
            event_type: PRAYER_EVENT.to_string(),
            incident_id: Some(incident_id.to_string()),
            details: None,
        };
        if let Err(err) = self.gateway.log_event(&event).await {
            tracing::warn!("Failed to log prayer event: {}", err);
        }
    }
}
