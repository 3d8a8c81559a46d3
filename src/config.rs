//! Configuration management for Vantage

use crate::error::{Result, VantageError};
use crate::models::AuditConfig;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the admin token
pub const ADMIN_TOKEN_ENV: &str = "VANTAGE_ADMIN_TOKEN";

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub audit: AuditConfig,
    pub portal: PortalConfig,
    pub booking: BookingConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the API listens on
    pub bind: String,
    /// Static token for the admin surface. Admin routes are disabled when unset.
    #[serde(skip_serializing)]
    pub admin_token: Option<String>,
    /// Name of the cookie carrying the admin token
    pub admin_cookie: String,
    /// Largest accepted request body, in bytes
    pub max_body_bytes: usize,
    /// Public origin used to build links handed back to leads
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            admin_token: None,
            admin_cookie: "vantage_admin".to_string(),
            max_body_bytes: 64 * 1024,
            public_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Lifetime of a portal token
    pub ttl_hours: i64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self { ttl_hours: 72 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Opening days, e.g. `["mon", "tue"]`
    pub days: Vec<String>,
    /// First bookable hour, local time
    pub open_hour: u32,
    /// Closing hour, local time (exclusive)
    pub close_hour: u32,
    pub slot_minutes: u32,
    /// Offset of the agency's local time from UTC
    pub utc_offset_minutes: i32,
    /// Slots starting sooner than this are not offered
    pub min_notice_hours: i64,
    /// How far ahead bookings are accepted
    pub horizon_days: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            days: ["mon", "tue", "wed", "thu", "fri"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
            open_hour: 9,
            close_hour: 17,
            slot_minutes: 30,
            utc_offset_minutes: 0,
            min_notice_hours: 2,
            horizon_days: 30,
        }
    }
}

impl BookingConfig {
    /// Parses the configured opening days
    pub fn open_days(&self) -> Result<Vec<Weekday>> {
        self.days
            .iter()
            .map(|d| {
                d.trim()
                    .parse::<Weekday>()
                    .map_err(|_| VantageError::ConfigError(format!("Unknown weekday '{d}'")))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the JSON state snapshot. In-memory only when unset.
    pub data_dir: Option<PathBuf>,
    /// Directory where rendered PDF/HTML reports are written
    pub reports_dir: Option<PathBuf>,
    /// Directory with template overrides (`report.html`)
    pub templates_dir: Option<PathBuf>,
}

/// File-based configuration structure matching default.toml
#[derive(Debug, Deserialize)]
struct FileConfig {
    server: Option<ServerSection>,
    audit: Option<AuditSection>,
    portal: Option<PortalSection>,
    booking: Option<BookingSection>,
    storage: Option<StorageSection>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    bind: Option<String>,
    admin_token: Option<String>,
    admin_cookie: Option<String>,
    max_body_bytes: Option<usize>,
    public_base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuditSection {
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
    follow_redirects: Option<bool>,
    max_page_bytes: Option<usize>,
    checks: Option<Vec<String>>,
    workers: Option<usize>,
    job_timeout_secs: Option<u64>,
    reuse_window_minutes: Option<i64>,
    rate_limit: Option<u32>,
    allow_private_targets: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct PortalSection {
    ttl_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BookingSection {
    days: Option<Vec<String>>,
    open_hour: Option<u32>,
    close_hour: Option<u32>,
    slot_minutes: Option<u32>,
    utc_offset_minutes: Option<i32>,
    min_notice_hours: Option<i64>,
    horizon_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StorageSection {
    data_dir: Option<PathBuf>,
    reports_dir: Option<PathBuf>,
    templates_dir: Option<PathBuf>,
}

/// Loads configuration from a TOML file and merges with defaults
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(VantageError::IoError)?;
    parse_config(&content)
}

/// Parses TOML content over the defaults
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let file_config: FileConfig = toml::from_str(content)?;
    let mut config = AppConfig::default();

    if let Some(server) = file_config.server {
        if let Some(bind) = server.bind {
            config.server.bind = bind;
        }
        if server.admin_token.is_some() {
            config.server.admin_token = server.admin_token;
        }
        if let Some(cookie) = server.admin_cookie {
            config.server.admin_cookie = cookie;
        }
        if let Some(max) = server.max_body_bytes {
            config.server.max_body_bytes = max;
        }
        if server.public_base_url.is_some() {
            config.server.public_base_url = server.public_base_url;
        }
    }

    if let Some(audit) = file_config.audit {
        if let Some(timeout) = audit.timeout_secs {
            config.audit.timeout_secs = timeout;
        }
        if let Some(ua) = audit.user_agent {
            config.audit.user_agent = ua;
        }
        if let Some(follow) = audit.follow_redirects {
            config.audit.follow_redirects = follow;
        }
        if let Some(max) = audit.max_page_bytes {
            config.audit.max_page_bytes = max;
        }
        if let Some(checks) = audit.checks {
            config.audit.checks = checks;
        }
        if let Some(workers) = audit.workers {
            config.audit.workers = workers;
        }
        if let Some(timeout) = audit.job_timeout_secs {
            config.audit.job_timeout_secs = timeout;
        }
        if let Some(window) = audit.reuse_window_minutes {
            config.audit.reuse_window_minutes = window;
        }
        if let Some(rate) = audit.rate_limit {
            config.audit.rate_limit = Some(rate);
        }
        if let Some(allow) = audit.allow_private_targets {
            config.audit.allow_private_targets = allow;
        }
    }

    if let Some(portal) = file_config.portal {
        if let Some(ttl) = portal.ttl_hours {
            config.portal.ttl_hours = ttl;
        }
    }

    if let Some(booking) = file_config.booking {
        if let Some(days) = booking.days {
            config.booking.days = days;
        }
        if let Some(open) = booking.open_hour {
            config.booking.open_hour = open;
        }
        if let Some(close) = booking.close_hour {
            config.booking.close_hour = close;
        }
        if let Some(slot) = booking.slot_minutes {
            config.booking.slot_minutes = slot;
        }
        if let Some(offset) = booking.utc_offset_minutes {
            config.booking.utc_offset_minutes = offset;
        }
        if let Some(notice) = booking.min_notice_hours {
            config.booking.min_notice_hours = notice;
        }
        if let Some(horizon) = booking.horizon_days {
            config.booking.horizon_days = horizon;
        }
    }

    if let Some(storage) = file_config.storage {
        config.storage.data_dir = storage.data_dir;
        config.storage.reports_dir = storage.reports_dir;
        config.storage.templates_dir = storage.templates_dir;
    }

    validate(&config)?;
    Ok(config)
}

/// Rejects configurations the server cannot run with
pub fn validate(config: &AppConfig) -> Result<()> {
    let booking = &config.booking;
    if booking.open_hour >= booking.close_hour || booking.close_hour > 24 {
        return Err(VantageError::ConfigError(format!(
            "Booking hours {}..{} are not a valid range",
            booking.open_hour, booking.close_hour
        )));
    }
    if booking.slot_minutes == 0 || booking.slot_minutes > 24 * 60 {
        return Err(VantageError::ConfigError(
            "booking.slot_minutes must be between 1 and 1440".to_string(),
        ));
    }
    booking.open_days()?;
    if config.audit.workers == 0 {
        return Err(VantageError::ConfigError(
            "audit.workers must be at least 1".to_string(),
        ));
    }
    if config.portal.ttl_hours <= 0 {
        return Err(VantageError::ConfigError(
            "portal.ttl_hours must be positive".to_string(),
        ));
    }
    if let Some(ref token) = config.server.admin_token {
        if token.len() < 16 {
            return Err(VantageError::ConfigError(
                "server.admin_token must be at least 16 characters".to_string(),
            ));
        }
    }
    Ok(())
}

/// Merges CLI arguments into an existing AppConfig
pub fn merge_cli_args(
    config: &mut AppConfig,
    bind: Option<String>,
    admin_token: Option<String>,
    data_dir: Option<PathBuf>,
    reports_dir: Option<PathBuf>,
    workers: Option<usize>,
) {
    if let Some(b) = bind {
        config.server.bind = b;
    }
    if let Some(t) = admin_token {
        config.server.admin_token = Some(t);
    }
    if let Some(d) = data_dir {
        config.storage.data_dir = Some(d);
    }
    if let Some(r) = reports_dir {
        config.storage.reports_dir = Some(r);
    }
    if let Some(w) = workers {
        config.audit.workers = w;
    }
}

/// Applies the admin token from the environment when present
pub fn apply_env(config: &mut AppConfig) {
    if let Ok(token) = std::env::var(ADMIN_TOKEN_ENV) {
        if !token.trim().is_empty() {
            config.server.admin_token = Some(token.trim().to_string());
        }
    }
}
