//! Terminal front end for the public incident feed.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use incident_portal::client::{LocalStore, Theme};
use incident_portal::config::ClientConfig;
use incident_portal::errors::AppError;
use incident_portal::feed::{FeedController, LoadOutcome, PrayerOutcome, PrayerReconciler};
use incident_portal::gateway::RemoteGateway;
use incident_portal::models::Incident;
use incident_portal::text::excerpt;

const CARD_EXCERPT_CHARS: usize = 160;

/// Browse the incident feed from a terminal.
#[derive(Parser, Debug)]
#[command(name = "portal-feed", version, about)]
struct Args {
    /// Only show incidents mentioning this text
    #[arg(long, default_value = "")]
    search: String,

    /// Number of feed pages to load
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pages: u32,

    /// Show the full details of one incident
    #[arg(long, value_name = "ID")]
    show: Option<String>,

    /// Commit to praying for an incident
    #[arg(long, value_name = "ID")]
    pray: Option<String>,

    /// Switch between the dark and light theme before rendering
    #[arg(long)]
    toggle_theme: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = ClientConfig::from_env();

    let mut store = LocalStore::open(&config.state_path)?;
    if args.toggle_theme {
        store.toggle_theme()?;
    }

    let gateway = Arc::new(RemoteGateway::from_config(&config));
    let feed = FeedController::new(gateway);
    let reconciler = PrayerReconciler::new(&feed, store.visitor_id());

    if let Err(err) = reconciler.sync_commitments().await {
        tracing::warn!("Could not load earlier commitments: {}", err);
    }

    report(feed.set_search(args.search.clone()).await)?;
    for _ in 1..args.pages {
        if let LoadOutcome::Skipped = report(feed.on_last_item_visible().await)? {
            break;
        }
    }

    if let Some(id) = &args.pray {
        if feed.open_details(id).await.is_none() {
            return Err(AppError::NotFound(format!("Incident {} is not in the loaded feed", id)).into());
        }
        match reconciler.record_prayer(id).await {
            PrayerOutcome::Recorded => println!("Thank you for praying."),
            PrayerOutcome::AlreadyCommitted => println!("You are already praying for this."),
            PrayerOutcome::Failed(err) => eprintln!("Could not record prayer: {}", err.message()),
        }
    }

    let state = feed.snapshot().await;
    let rule = match store.theme() {
        Theme::Dark => "=",
        Theme::Light => "-",
    };

    if state.synced && state.incidents.is_empty() {
        println!("No incidents found.");
    }

    match args.show.as_deref().or(args.pray.as_deref()) {
        Some(id) => match feed.open_details(id).await {
            Some(incident) => print_details(&incident, reconciler.has_committed(id).await, rule),
            None => eprintln!("Incident {} is not in the loaded feed", id),
        },
        None => {
            for incident in &state.incidents {
                print_card(incident, rule);
            }
            if state.has_more {
                println!("More incidents available (use --pages).");
            }
        }
    }

    Ok(())
}

/// Print failures and pass the outcome through.
fn report(outcome: LoadOutcome) -> Result<LoadOutcome, AppError> {
    match outcome {
        LoadOutcome::Failed(err) => Err(err),
        other => Ok(other),
    }
}

fn print_card(incident: &Incident, rule: &str) {
    println!("{}", rule.repeat(60));
    let badge = if incident.is_verified { " [verified]" } else { "" };
    println!("{}  {}{}", incident.card_date(), incident.title, badge);
    if !incident.location_raw.is_empty() {
        println!("{}", incident.location_raw);
    }
    println!("{}", excerpt(&incident.description, CARD_EXCERPT_CHARS));
    println!("Praying: {}   id: {}", incident.prayer_count, incident.id);
}

fn print_details(incident: &Incident, committed: bool, rule: &str) {
    println!("{}", rule.repeat(60));
    println!("{}", incident.title);
    println!("{} | {}", incident.card_date(), incident.location_raw);
    if let Some(summary) = &incident.summary {
        println!("\n{}", summary);
    }
    println!("\n{}\n", incident.description);
    for source in &incident.sources {
        println!("  - {}: {}", source.name, source.url);
    }
    let status = if committed { "you are praying" } else { "not yet" };
    println!("Praying: {} ({})", incident.prayer_count, status);
}
