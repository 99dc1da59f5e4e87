//! Configuration module for the Young Lists backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key the identity gateway must present (optional in development)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// User ids seeded into an empty allow-list at startup
    pub bootstrap_users: Vec<String>,
    /// Upper bound for long-poll and watched-view requests
    pub subscription_timeout: Duration,
}

const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080);
const DEFAULT_SUBSCRIPTION_TIMEOUT_MS: u64 = 25_000;

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("YL_API_PSK").ok().filter(|s| !s.trim().is_empty());

        let db_path = env::var("YL_DB_PATH")
            .unwrap_or_else(|_| "./data/young-lists.sqlite".to_string())
            .into();

        let bind_addr = env::var("YL_BIND_ADDR")
            .ok()
            .and_then(|raw| match raw.parse() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!("Ignoring invalid YL_BIND_ADDR {:?}: {}", raw, e);
                    None
                }
            })
            .unwrap_or(DEFAULT_BIND_ADDR);

        let log_level = env::var("YL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let bootstrap_users = env::var("YL_BOOTSTRAP_USERS")
            .map(|raw| parse_user_list(&raw))
            .unwrap_or_default();

        let subscription_timeout = env::var("YL_SUBSCRIPTION_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_SUBSCRIPTION_TIMEOUT_MS));

        Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            bootstrap_users,
            subscription_timeout,
        }
    }
}

/// Split a comma-separated id list, dropping blanks and duplicates.
fn parse_user_list(raw: &str) -> Vec<String> {
    let mut users: Vec<String> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !users.iter().any(|u| u == part) {
            users.push(part.to_string());
        }
    }
    users
}
