use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Source of the periodically refreshed report
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Identity provider and user cache
    #[serde(default)]
    pub keycloak: KeycloakConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.upstream.report_url.trim().is_empty() {
            return Err("upstream.report_url must not be empty".into());
        }
        if self.upstream.request_timeout_ms == 0 {
            return Err("upstream.request_timeout_ms must be > 0".into());
        }
        if self.refresh.interval_ms == 0 {
            return Err("refresh.interval_ms must be > 0".into());
        }
        if self.keycloak.base_url.trim().is_empty() {
            return Err("keycloak.base_url must not be empty".into());
        }
        if self.keycloak.realm.trim().is_empty() {
            return Err("keycloak.realm must not be empty".into());
        }
        if self.keycloak.user_cache_ttl_secs <= 0 {
            return Err("keycloak.user_cache_ttl_secs must be > 0".into());
        }
        if self.keycloak.token_grant_ttl_secs < 0 {
            return Err("keycloak.token_grant_ttl_secs must be >= 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh.interval_ms)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream.request_timeout_ms)
    }

    pub fn keycloak_timeout(&self) -> Duration {
        Duration::from_millis(self.keycloak.request_timeout_ms)
    }

    /// Lifetime of a cached user record.
    pub fn user_cache_ttl(&self) -> time::Duration {
        time::Duration::seconds(self.keycloak.user_cache_ttl_secs)
    }

    /// How long an accepted bearer token may read cached users unchecked.
    pub fn token_grant_ttl(&self) -> time::Duration {
        time::Duration::seconds(self.keycloak.token_grant_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_report_url")]
    pub report_url: String,
    #[serde(default = "default_upstream_timeout_ms")]
    pub request_timeout_ms: u64,
}
fn default_report_url() -> String {
    "http://localhost:9000/report".into()
}
fn default_upstream_timeout_ms() -> u64 {
    5_000
}
impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            report_url: default_report_url(),
            request_timeout_ms: default_upstream_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_interval_ms")]
    pub interval_ms: u64,
}
fn default_refresh_interval_ms() -> u64 {
    60_000
}
impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_refresh_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeycloakConfig {
    #[serde(default = "default_keycloak_base_url")]
    pub base_url: String,
    #[serde(default = "default_keycloak_realm")]
    pub realm: String,
    #[serde(default = "default_keycloak_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Lifetime of a cached user record, in seconds. Must be positive.
    #[serde(default = "default_user_cache_ttl_secs")]
    pub user_cache_ttl_secs: i64,
    /// Seconds a token accepted by Keycloak is trusted on cache hits. Zero
    /// checks the token on every hit.
    #[serde(default = "default_token_grant_ttl_secs")]
    pub token_grant_ttl_secs: i64,
}
fn default_keycloak_base_url() -> String {
    "http://localhost:8180".into()
}
fn default_keycloak_realm() -> String {
    "master".into()
}
fn default_keycloak_timeout_ms() -> u64 {
    10_000
}
fn default_user_cache_ttl_secs() -> i64 {
    300
}
fn default_token_grant_ttl_secs() -> i64 {
    30
}
impl Default for KeycloakConfig {
    fn default() -> Self {
        Self {
            base_url: default_keycloak_base_url(),
            realm: default_keycloak_realm(),
            request_timeout_ms: default_keycloak_timeout_ms(),
            user_cache_ttl_secs: default_user_cache_ttl_secs(),
            token_grant_ttl_secs: default_token_grant_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file, read when no path is given.
    pub const DEFAULT_CONFIG_FILE: &str = "cached-updater.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., CACHED_UPDATER__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("CACHED_UPDATER")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
