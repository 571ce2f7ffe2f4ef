//! Integration tests for the incident portal service and its HTTP clients.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::client::{AdminConsole, LocalStore};
use crate::config::Config;
use crate::db::{init_database, seed_defaults, Repository, DEFAULT_SOURCES};
use crate::errors::AppError;
use crate::feed::{FeedController, LoadOutcome, PrayerOutcome, PrayerReconciler};
use crate::gateway::RemoteGateway;
use crate::models::{CreateIncidentRequest, CreateSourceRequest, Incident, SourceType};
use crate::{create_router, AppState};

const SERVICE_KEY: &str = "test-service-key";

/// Test fixture for integration tests.
struct TestFixture {
    /// Client sending the service key on every request
    client: Client,
    /// Client without credentials, as a visitor's browser would be
    anonymous: Client,
    repo: Arc<Repository>,
    base_url: String,
    temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_service_key(Some(SERVICE_KEY.to_string())).await
    }

    async fn with_service_key(service_key: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));
        seed_defaults(&repo, "admin", Some("hunter2"))
            .await
            .expect("Failed to seed");

        let config = Config {
            service_key: service_key.clone(),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            admin_username: "admin".to_string(),
            admin_password: Some("hunter2".to_string()),
        };

        let state = AppState {
            repo: Arc::clone(&repo),
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = service_key {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            anonymous: Client::new(),
            repo,
            base_url,
            temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn remote(&self, service_key: Option<&str>) -> RemoteGateway {
        RemoteGateway::new(self.base_url.clone(), service_key.map(str::to_string))
    }

    /// Insert incidents dated one day apart; `titles[0]` is the newest.
    async fn seed_incidents(&self, titles: &[&str]) -> Vec<Incident> {
        let newest = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
        let mut created = Vec::new();
        for (i, title) in titles.iter().enumerate() {
            let incident = self
                .repo
                .create_incident(&CreateIncidentRequest {
                    title: title.to_string(),
                    description: format!("Report number {}", i),
                    location_raw: "Bastar, Chhattisgarh".to_string(),
                    incident_date: newest - Duration::days(i as i64),
                    sources: Vec::new(),
                    is_verified: i % 2 == 0,
                    summary: None,
                    image_url: None,
                })
                .await
                .expect("Failed to seed incident");
            created.push(incident);
        }
        created
    }
}

fn numbered_titles(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("Incident {:02}", i)).collect()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .anonymous
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_admin_routes_require_service_key() {
    let fixture = TestFixture::new().await;

    // No key
    let resp = fixture
        .anonymous
        .get(fixture.url("/api/admin/sources"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    // Wrong key
    let resp = fixture
        .anonymous
        .get(fixture.url("/api/admin/sources"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Bearer form of the right key
    let resp = fixture
        .anonymous
        .get(fixture.url("/api/admin/sources"))
        .header("Authorization", format!("Bearer {}", SERVICE_KEY))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Public routes stay open
    let resp = fixture
        .anonymous
        .get(fixture.url("/api/incidents"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_admin_routes_open_without_configured_key() {
    let fixture = TestFixture::with_service_key(None).await;

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/admin/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_incident_crud() {
    let fixture = TestFixture::new().await;

    // Create
    let resp = fixture
        .client
        .post(fixture.url("/api/admin/incidents"))
        .json(&json!({
            "title": "Prayer meeting disrupted",
            "description": "<p>Police arrived&nbsp;during <b>worship</b>.</p><p>Two detained.</p>",
            "locationRaw": "Jaunpur, Uttar Pradesh",
            "incidentDate": "2024-05-12T09:30:00Z",
            "sources": [{ "name": "Morning Star News", "url": "https://example.org/story" }],
            "isVerified": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(
        body["data"]["description"],
        "Police arrived during worship. Two detained."
    );
    assert_eq!(body["data"]["prayerCount"], 0);
    assert_eq!(body["data"]["version"], 1);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // Read
    let resp = fixture
        .anonymous
        .get(fixture.url(&format!("/api/incidents/{}", id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["locationRaw"], "Jaunpur, Uttar Pradesh");
    assert_eq!(body["data"]["sources"][0]["name"], "Morning Star News");

    // Update
    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/admin/incidents/{}", id)))
        .json(&json!({ "title": "Prayer meeting raided", "expectedVersion": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["title"], "Prayer meeting raided");
    assert_eq!(body["data"]["version"], 2);
    assert_eq!(body["data"]["isVerified"], true);

    // Stale edit
    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/admin/incidents/{}", id)))
        .json(&json!({ "title": "Lost update", "expectedVersion": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VERSION_MISMATCH");
    assert_eq!(body["error"]["details"]["currentVersion"], 2);

    // Delete
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/admin/incidents/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .anonymous
        .get(fixture.url(&format!("/api/incidents/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_incident_validation() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/incidents"))
        .json(&json!({ "title": "   ", "incidentDate": "2024-05-12T09:30:00Z" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_incident_listing_pages_with_count() {
    let fixture = TestFixture::new().await;
    let titles = numbered_titles(14);
    let titles: Vec<&str> = titles.iter().map(String::as_str).collect();
    fixture.seed_incidents(&titles).await;

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/incidents?offset=0&limit=12"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 14);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 12);
    assert_eq!(rows[0]["title"], "Incident 00");
    assert_eq!(rows[11]["title"], "Incident 11");

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/incidents?offset=12&limit=12"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 14);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["title"], "Incident 13");
}

#[tokio::test]
async fn test_incident_search_matches_title_description_and_location() {
    let fixture = TestFixture::new().await;
    fixture
        .seed_incidents(&["Flood relief blocked", "Pastor assaulted", "Church sealed"])
        .await;
    fixture
        .repo
        .create_incident(&CreateIncidentRequest {
            title: "Homes burned".to_string(),
            description: "Families fled after the FLOOD of threats".to_string(),
            location_raw: "Kandhamal".to_string(),
            incident_date: Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
            sources: Vec::new(),
            is_verified: false,
            summary: None,
            image_url: None,
        })
        .await
        .unwrap();
    fixture
        .repo
        .create_incident(&CreateIncidentRequest {
            title: "Village meeting".to_string(),
            description: String::new(),
            location_raw: "Floodgate Road, Patna".to_string(),
            incident_date: Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap(),
            sources: Vec::new(),
            is_verified: false,
            summary: None,
            image_url: None,
        })
        .await
        .unwrap();

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/incidents?search=flood"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    // Nothing matches: empty page, zero count
    let resp = fixture
        .anonymous
        .get(fixture.url("/api/incidents?search=earthquake"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 0);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_prayer_is_recorded_once_per_visitor() {
    let fixture = TestFixture::new().await;
    let incidents = fixture.seed_incidents(&["Believers beaten"]).await;
    let id = incidents[0].id.clone();

    let commit = json!({ "visitorId": "visitor-1", "incidentId": id });

    let resp = fixture
        .anonymous
        .post(fixture.url("/api/prayers"))
        .json(&commit)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .anonymous
        .post(fixture.url("/api/prayers"))
        .json(&commit)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "CONFLICT");

    let resp = fixture
        .anonymous
        .get(fixture.url(&format!("/api/incidents/{}", id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["prayerCount"], 1);

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/prayers?visitorId=visitor-1"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["incidentId"], id.as_str());
}

#[tokio::test]
async fn test_prayer_for_missing_incident() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .anonymous
        .post(fixture.url("/api/prayers"))
        .json(&json!({ "visitorId": "visitor-1", "incidentId": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/prayers"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_event_logs_newest_first() {
    let fixture = TestFixture::new().await;

    for event_type in ["view", "search", "prayer"] {
        let resp = fixture
            .anonymous
            .post(fixture.url("/api/logs"))
            .json(&json!({ "visitorId": "visitor-1", "eventType": event_type }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let resp = fixture
        .client
        .get(fixture.url("/api/admin/logs"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["eventType"], "prayer");
    assert_eq!(rows[2]["eventType"], "view");

    let resp = fixture
        .client
        .get(fixture.url("/api/admin/logs?limit=2"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    // Reading logs is an admin operation
    let resp = fixture
        .anonymous
        .get(fixture.url("/api/admin/logs"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_login() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .anonymous
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "username": "admin", "password": "hunter2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["username"], "admin");
    assert!(body["data"].get("passwordHash").is_none());

    let resp = fixture
        .anonymous
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "username": "admin", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["message"], "Invalid username or password");
}

#[tokio::test]
async fn test_source_and_user_crud() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/admin/sources"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), DEFAULT_SOURCES.len());

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/sources"))
        .json(&json!({ "name": "Field reporter", "urlOrHandle": "@fieldreports", "sourceType": "social" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["isActive"], true);
    let source_id = body["data"]["id"].as_str().unwrap().to_string();

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/admin/sources/{}", source_id)))
        .json(&json!({ "isActive": false }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["isActive"], false);
    assert_eq!(body["data"]["sourceType"], "social");

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/sources"))
        .json(&json!({ "name": "", "urlOrHandle": "x", "sourceType": "rss" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Operators: duplicate usernames are rejected
    let resp = fixture
        .client
        .post(fixture.url("/api/admin/users"))
        .json(&json!({ "username": "admin", "password": "other" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/users"))
        .json(&json!({ "username": "moderator", "password": "pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let user_id = body["data"]["id"].as_str().unwrap().to_string();

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/admin/users/{}", user_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/admin/users/{}", user_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_feed_controller_over_http() {
    let fixture = TestFixture::new().await;
    let titles = numbered_titles(14);
    let titles: Vec<&str> = titles.iter().map(String::as_str).collect();
    fixture.seed_incidents(&titles).await;

    let feed = FeedController::new(Arc::new(fixture.remote(None)));

    assert_eq!(
        feed.load_page(true).await,
        LoadOutcome::Applied {
            fetched: 12,
            total: 14
        }
    );
    let state = feed.snapshot().await;
    assert_eq!(state.incidents.len(), 12);
    assert!(state.has_more);

    assert_eq!(
        feed.on_last_item_visible().await,
        LoadOutcome::Applied {
            fetched: 2,
            total: 14
        }
    );
    let state = feed.snapshot().await;
    assert_eq!(state.incidents.len(), 14);
    assert!(!state.has_more);
    assert_eq!(state.incidents[13].title, "Incident 13");

    assert_eq!(feed.on_last_item_visible().await, LoadOutcome::Skipped);

    feed.set_search("incident 03").await;
    let state = feed.snapshot().await;
    assert_eq!(state.incidents.len(), 1);
    assert!(!state.has_more);
}

#[tokio::test]
async fn test_feed_controller_reports_unreachable_service() {
    let feed = FeedController::new(Arc::new(RemoteGateway::new("http://127.0.0.1:9", None)));

    match feed.load_page(true).await {
        LoadOutcome::Failed(err) => assert!(err.is_transport()),
        other => panic!("expected transport failure, got {:?}", other),
    }
    assert!(feed.snapshot().await.incidents.is_empty());
}

#[tokio::test]
async fn test_prayer_reconciler_over_http() {
    let fixture = TestFixture::new().await;
    let incidents = fixture.seed_incidents(&["Bible school closed"]).await;
    let id = incidents[0].id.clone();

    let feed = FeedController::new(Arc::new(fixture.remote(None)));
    feed.load_page(true).await;

    let reconciler = PrayerReconciler::new(&feed, "visitor-http");
    assert_eq!(reconciler.record_prayer(&id).await, PrayerOutcome::Recorded);
    assert_eq!(
        reconciler.record_prayer(&id).await,
        PrayerOutcome::AlreadyCommitted
    );
    assert_eq!(feed.snapshot().await.incidents[0].prayer_count, 1);

    // Same visitor on a fresh session: the remote record wins
    let feed = FeedController::new(Arc::new(fixture.remote(None)));
    feed.load_page(true).await;
    assert_eq!(feed.snapshot().await.incidents[0].prayer_count, 1);

    let reconciler = PrayerReconciler::new(&feed, "visitor-http");
    assert_eq!(reconciler.sync_commitments().await.unwrap(), 1);
    assert!(reconciler.has_committed(&id).await);
    assert_eq!(
        reconciler.record_prayer(&id).await,
        PrayerOutcome::AlreadyCommitted
    );

    // The commit was logged for the admin logs panel
    let logs = fixture.repo.list_recent_logs(10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].visitor_id, "visitor-http");
    assert_eq!(logs[0].incident_id.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn test_admin_console_panels() {
    let fixture = TestFixture::new().await;
    let mut store = LocalStore::open(fixture.temp_dir.path().join("visitor.json")).unwrap();

    let console = AdminConsole::new(fixture.remote(Some(SERVICE_KEY)));

    let err = console
        .login(&mut store, "admin", "nope")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        AppError::Unauthorized("Invalid username or password".to_string())
    );
    assert!(!store.is_logged_in());

    let user = console.login(&mut store, "admin", "hunter2").await.unwrap();
    assert_eq!(user.username, "admin");
    assert!(store.is_logged_in());

    let sources = console
        .add_source(&CreateSourceRequest {
            name: "Diocese bulletin".to_string(),
            url_or_handle: "https://example.org/feed.xml".to_string(),
            source_type: SourceType::Rss,
            is_active: true,
        })
        .await
        .unwrap();
    assert_eq!(sources.len(), DEFAULT_SOURCES.len() + 1);
    let added = sources
        .iter()
        .find(|s| s.name == "Diocese bulletin")
        .unwrap();
    let sources = console.remove_source(&added.id).await.unwrap();
    assert_eq!(sources.len(), DEFAULT_SOURCES.len());

    let incidents = console
        .add_incident(&CreateIncidentRequest {
            title: "Funeral denied".to_string(),
            description: "Burial refused in the village ground".to_string(),
            location_raw: "Bastar".to_string(),
            incident_date: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            sources: Vec::new(),
            is_verified: false,
            summary: None,
            image_url: None,
        })
        .await
        .unwrap();
    assert_eq!(incidents.len(), 1);

    console.logout(&mut store).unwrap();
    assert!(!store.is_logged_in());

    // Without the service key the panels are refused
    let locked = AdminConsole::new(fixture.remote(None));
    let err = locked.sources().await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
    assert!(locked.logs().await.is_err());
}
