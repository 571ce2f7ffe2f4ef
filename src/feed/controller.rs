//! Feed state controller: pagination, search resets and stale-response discarding.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::gateway::FeedGateway;
use crate::models::{Incident, IncidentQuery, Page};

/// Client-side view of the incident feed.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    /// Accumulated incidents in retrieval order (newest first).
    pub incidents: Vec<Incident>,
    /// Active search term; empty means unfiltered.
    pub search: String,
    /// Number of pages applied under the current generation.
    pub page: usize,
    pub loading: bool,
    pub has_more: bool,
    /// Set once the first fetch has succeeded.
    pub synced: bool,
    /// Bumped by every reset; fetches carry the value they were issued under.
    pub generation: u64,
    /// Incident open in the detail view.
    pub selected: Option<Incident>,
}

/// What a single `load_page` call did to the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Rows were merged into the feed.
    Applied { fetched: usize, total: usize },
    /// Nothing issued: a fetch is already in flight or the stream is exhausted.
    Skipped,
    /// The response arrived after a reset and was dropped.
    Stale,
    /// The request failed; state is unchanged.
    Failed(AppError),
}

/// Everything a fetch needs, captured under the lock when it is issued.
#[derive(Debug, Clone)]
struct FetchTicket {
    generation: u64,
    search: String,
    page: usize,
}

/// Owns the feed state and issues incident queries through a [`FeedGateway`].
pub struct FeedController<G> {
    gateway: Arc<G>,
    state: Arc<RwLock<FeedState>>,
}

impl<G> Clone for FeedController<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            state: Arc::clone(&self.state),
        }
    }
}

impl<G: FeedGateway> FeedController<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            state: Arc::new(RwLock::new(FeedState {
                has_more: true,
                ..FeedState::default()
            })),
        }
    }

    pub(crate) fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub(crate) fn shared_state(&self) -> &Arc<RwLock<FeedState>> {
        &self.state
    }

    /// Cloned view of the current state for rendering.
    pub async fn snapshot(&self) -> FeedState {
        self.state.read().await.clone()
    }

    /// Load the first page again (`reset`) or append the next one.
    ///
    /// A reset clears the list and supersedes every fetch still in flight. A next-page
    /// request is only issued when nothing is loading and more rows exist.
    pub async fn load_page(&self, reset: bool) -> LoadOutcome {
        let ticket = if reset {
            Some(self.begin_reset(None).await)
        } else {
            self.begin_next().await
        };

        match ticket {
            Some(ticket) => self.fetch(ticket).await,
            None => LoadOutcome::Skipped,
        }
    }

    /// Change the search term and reload from the first page.
    pub async fn set_search(&self, term: impl Into<String>) -> LoadOutcome {
        let ticket = self.begin_reset(Some(term.into())).await;
        self.fetch(ticket).await
    }

    /// Presentation signal that the last rendered card is visible.
    pub async fn on_last_item_visible(&self) -> LoadOutcome {
        self.load_page(false).await
    }

    /// Open the detail view for an incident already in the feed.
    pub async fn open_details(&self, incident_id: &str) -> Option<Incident> {
        let mut state = self.state.write().await;
        let incident = state
            .incidents
            .iter()
            .find(|incident| incident.id == incident_id)
            .cloned();
        state.selected = incident.clone();
        incident
    }

    pub async fn close_details(&self) {
        self.state.write().await.selected = None;
    }

    async fn begin_reset(&self, search: Option<String>) -> FetchTicket {
        let mut state = self.state.write().await;
        if let Some(term) = search {
            state.search = term;
        }
        state.generation += 1;
        state.incidents.clear();
        state.page = 0;
        state.has_more = true;
        state.loading = true;

        FetchTicket {
            generation: state.generation,
            search: state.search.clone(),
            page: 0,
        }
    }

    async fn begin_next(&self) -> Option<FetchTicket> {
        let mut state = self.state.write().await;
        if state.loading || !state.has_more {
            return None;
        }
        state.loading = true;

        Some(FetchTicket {
            generation: state.generation,
            search: state.search.clone(),
            page: state.page,
        })
    }

    async fn fetch(&self, ticket: FetchTicket) -> LoadOutcome {
        let query = IncidentQuery::page(&ticket.search, ticket.page);
        tracing::debug!(
            generation = ticket.generation,
            offset = query.offset,
            end = query.range_end(),
            search = %ticket.search,
            "Fetching incident page"
        );

        let result = self.gateway.query_incidents(&query).await;

        let mut state = self.state.write().await;
        if state.generation != ticket.generation {
            tracing::debug!(
                issued = ticket.generation,
                current = state.generation,
                "Discarding stale incident page"
            );
            return LoadOutcome::Stale;
        }

        state.loading = false;
        match result {
            Ok(page) => apply_page(&mut state, &ticket, page),
            Err(err) => {
                tracing::warn!("Fetch error: {}", err);
                LoadOutcome::Failed(err)
            }
        }
    }
}

fn apply_page(state: &mut FeedState, ticket: &FetchTicket, page: Page<Incident>) -> LoadOutcome {
    let accumulated = state.incidents.len();
    let fetched = page.rows.len();

    let mut seen: HashSet<String> = state.incidents.iter().map(|i| i.id.clone()).collect();
    for incident in page.rows {
        if seen.insert(incident.id.clone()) {
            state.incidents.push(incident);
        }
    }

    state.page = ticket.page + 1;
    state.has_more = fetched > 0 && accumulated + fetched < page.total;
    state.synced = true;

    LoadOutcome::Applied {
        fetched,
        total: page.total,
    }
}
