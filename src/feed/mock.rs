//! In-memory gateway with scripted failures and held responses for feed tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use tokio::sync::oneshot;

use crate::errors::AppError;
use crate::gateway::FeedGateway;
use crate::models::{CreateEventLogRequest, Incident, IncidentQuery, Page, PrayerCommitment};

struct HeldQuery {
    search: String,
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

pub struct ScriptedGateway {
    incidents: Mutex<Vec<Incident>>,
    commitments: Mutex<HashSet<(String, String)>>,
    events: Mutex<Vec<CreateEventLogRequest>>,
    offsets: Mutex<Vec<usize>>,
    held: Mutex<Option<HeldQuery>>,
    held_prayer: Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
    fail_query: AtomicBool,
    fail_prayer: AtomicBool,
    prayer_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(incidents: Vec<Incident>) -> Self {
        Self {
            incidents: Mutex::new(incidents),
            commitments: Mutex::new(HashSet::new()),
            events: Mutex::new(Vec::new()),
            offsets: Mutex::new(Vec::new()),
            held: Mutex::new(None),
            held_prayer: Mutex::new(None),
            fail_query: AtomicBool::new(false),
            fail_prayer: AtomicBool::new(false),
            prayer_calls: AtomicUsize::new(0),
        }
    }

    /// `count` unremarkable incidents, one per day.
    pub fn with_incidents(count: usize) -> Self {
        Self::new((0..count).map(plain_incident).collect())
    }

    /// `count` plain incidents plus three that mention "flood" in different fields.
    pub fn with_flood_reports(count: usize) -> Self {
        let mut incidents: Vec<Incident> = (0..count).map(plain_incident).collect();

        let mut in_title = plain_incident(count);
        in_title.title = "Flood relief blocked".to_string();
        let mut in_description = plain_incident(count + 1);
        in_description.description = "Meeting raided after the FLOOD".to_string();
        let mut in_location = plain_incident(count + 2);
        in_location.location_raw = "Floodgate Road, Pune".to_string();

        incidents.extend([in_title, in_description, in_location]);
        Self::new(incidents)
    }

    pub fn mentions(incident: &Incident, term: &str) -> bool {
        let term = term.to_lowercase();
        [&incident.title, &incident.description, &incident.location_raw]
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    }

    /// Park the next query for `search` until `release` fires; `entered` fires on arrival.
    pub fn hold_next_query(
        &self,
        search: &str,
        entered: oneshot::Sender<()>,
        release: oneshot::Receiver<()>,
    ) {
        *self.held.lock().unwrap() = Some(HeldQuery {
            search: search.to_string(),
            entered,
            release,
        });
    }

    /// Park the next prayer insert until `release` fires; `entered` fires on arrival.
    pub fn hold_next_prayer(&self, entered: oneshot::Sender<()>, release: oneshot::Receiver<()>) {
        *self.held_prayer.lock().unwrap() = Some((entered, release));
    }

    pub fn fail_next_query(&self) {
        self.fail_query.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_prayer(&self) {
        self.fail_prayer.store(true, Ordering::SeqCst);
    }

    /// Record a commitment as if made in an earlier session.
    pub fn seed_commitment(&self, visitor_id: &str, incident_id: &str) {
        self.commitments
            .lock()
            .unwrap()
            .insert((visitor_id.to_string(), incident_id.to_string()));
    }

    pub fn query_count(&self) -> usize {
        self.offsets.lock().unwrap().len()
    }

    pub fn offsets(&self) -> Vec<usize> {
        self.offsets.lock().unwrap().clone()
    }

    pub fn prayer_calls(&self) -> usize {
        self.prayer_calls.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<CreateEventLogRequest> {
        self.events.lock().unwrap().clone()
    }

    pub fn stored_prayer_count(&self, incident_id: &str) -> i64 {
        self.incidents
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == incident_id)
            .map(|i| i.prayer_count)
            .unwrap_or_default()
    }
}

#[async_trait]
impl FeedGateway for ScriptedGateway {
    async fn query_incidents(&self, query: &IncidentQuery) -> Result<Page<Incident>, AppError> {
        let search = query.search_term().unwrap_or_default().to_string();
        self.offsets.lock().unwrap().push(query.offset);

        let held = {
            let mut slot = self.held.lock().unwrap();
            if slot.as_ref().is_some_and(|h| h.search == search) {
                slot.take()
            } else {
                None
            }
        };
        if let Some(held) = held {
            let _ = held.entered.send(());
            let _ = held.release.await;
        }

        if self.fail_query.swap(false, Ordering::SeqCst) {
            return Err(AppError::Transport("connection reset".to_string()));
        }

        let mut matching: Vec<Incident> = self
            .incidents
            .lock()
            .unwrap()
            .iter()
            .filter(|i| search.is_empty() || Self::mentions(i, &search))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.incident_date
                .cmp(&a.incident_date)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(Page {
            total: matching.len(),
            rows: matching
                .into_iter()
                .skip(query.offset)
                .take(query.limit)
                .collect(),
        })
    }

    async fn insert_prayer(&self, visitor_id: &str, incident_id: &str) -> Result<(), AppError> {
        self.prayer_calls.fetch_add(1, Ordering::SeqCst);
        let held = self.held_prayer.lock().unwrap().take();
        if let Some((entered, release)) = held {
            let _ = entered.send(());
            let _ = release.await;
        }
        tokio::task::yield_now().await;

        if self.fail_prayer.swap(false, Ordering::SeqCst) {
            return Err(AppError::Transport("timed out".to_string()));
        }

        let inserted = self
            .commitments
            .lock()
            .unwrap()
            .insert((visitor_id.to_string(), incident_id.to_string()));
        if !inserted {
            return Err(AppError::Conflict("Already exists".to_string()));
        }

        if let Some(incident) = self
            .incidents
            .lock()
            .unwrap()
            .iter_mut()
            .find(|i| i.id == incident_id)
        {
            incident.prayer_count += 1;
        }
        Ok(())
    }

    async fn list_prayers(&self, visitor_id: &str) -> Result<Vec<PrayerCommitment>, AppError> {
        Ok(self
            .commitments
            .lock()
            .unwrap()
            .iter()
            .filter(|(visitor, _)| visitor == visitor_id)
            .map(|(visitor, incident)| PrayerCommitment {
                visitor_id: visitor.clone(),
                incident_id: incident.clone(),
                created_at: String::new(),
            })
            .collect())
    }

    async fn log_event(&self, event: &CreateEventLogRequest) -> Result<(), AppError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn plain_incident(n: usize) -> Incident {
    let date = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() + Duration::days(n as i64);
    Incident {
        id: format!("inc-{:03}", n),
        title: format!("Incident {}", n),
        description: format!("Report number {}", n),
        location_raw: format!("District {}", n),
        incident_date: date,
        sources: Vec::new(),
        is_verified: n % 2 == 0,
        prayer_count: 0,
        summary: None,
        image_url: None,
        created_at: date.to_rfc3339(),
        updated_at: date.to_rfc3339(),
        version: 1,
    }
}
