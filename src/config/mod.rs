//! Configuration module for the incident portal.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;

const DEFAULT_DB_PATH: &str = "./data/portal.sqlite";
const DEFAULT_STATE_PATH: &str = "./data/visitor.json";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Service key guarding admin routes (required in production)
    pub service_key: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Operator account created at startup when a password is supplied
    pub admin_username: String,
    pub admin_password: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let service_key = non_empty_var("PORTAL_SERVICE_KEY");

        let db_path = env::var("PORTAL_DB_PATH")
            .unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
            .into();

        let bind_addr = env::var("PORTAL_BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e| AppError::BadRequest(format!("Invalid PORTAL_BIND_ADDR: {}", e)))?;

        let log_level = env::var("PORTAL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let admin_username =
            env::var("PORTAL_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
        let admin_password = non_empty_var("PORTAL_ADMIN_PASSWORD");

        Ok(Self {
            service_key,
            db_path,
            bind_addr,
            log_level,
            admin_username,
            admin_password,
        })
    }
}

/// Client-side configuration for the feed front end and admin console.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the data service
    pub api_url: String,
    /// Service key, only needed for admin panels
    pub service_key: Option<String>,
    /// Local state file holding the visitor identity and preferences
    pub state_path: PathBuf,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_url = env::var("PORTAL_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let state_path = env::var("PORTAL_STATE_PATH")
            .unwrap_or_else(|_| DEFAULT_STATE_PATH.to_string())
            .into();

        Self {
            api_url,
            service_key: non_empty_var("PORTAL_SERVICE_KEY"),
            state_path,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
