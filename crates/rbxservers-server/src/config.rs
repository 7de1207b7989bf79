use rbxservers_core::{MAX_PAGE_SIZE, UpstreamConfig};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream listing API
    #[serde(default)]
    pub upstream: UpstreamSettings,
    /// Page cache
    #[serde(default)]
    pub cache: CacheSettings,
    /// First page preload loop
    #[serde(default)]
    pub preload: PreloadSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsSettings,
}

// Default derived via field defaults

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        // Upstream validations
        if url::Url::parse(&self.upstream.base_url).is_err() {
            return Err(format!(
                "upstream.base_url is not a valid URL: {}",
                self.upstream.base_url
            ));
        }
        if self.upstream.page_size == 0 || self.upstream.page_size > MAX_PAGE_SIZE {
            return Err(format!("upstream.page_size must be in 1..={MAX_PAGE_SIZE}"));
        }
        if self.upstream.request_timeout_ms == 0 {
            return Err("upstream.request_timeout_ms must be > 0".into());
        }
        if self.upstream.max_attempts == 0 {
            return Err("upstream.max_attempts must be > 0".into());
        }
        // Cache validation
        if self.cache.ttl_ms == 0 {
            return Err("cache.ttl_ms must be > 0".into());
        }
        // Preload validation
        if self.preload.enabled && self.preload.interval_ms == 0 {
            return Err("preload.interval_ms must be > 0 when preload is enabled".into());
        }
        // Logging validation
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

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.ttl_ms)
    }

    pub fn preload_interval(&self) -> Duration {
        Duration::from_millis(self.preload.interval_ms)
    }

    /// Client configuration for the upstream listing API.
    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig::new()
            .with_base_url(self.upstream.base_url.clone())
            .with_place_id(self.upstream.place_id)
            .with_page_size(self.upstream.page_size)
            .with_request_timeout(Duration::from_millis(self.upstream.request_timeout_ms))
            .with_max_attempts(self.upstream.max_attempts)
            .with_backoff_unit(Duration::from_millis(self.upstream.backoff_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_place_id")]
    pub place_id: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Total attempts per fetch, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff unit; the delay after attempt n is n units
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_base_url() -> String {
    "https://games.roblox.com".into()
}
fn default_place_id() -> u64 {
    109_983_668_079_237
}
fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_max_attempts() -> u32 {
    4
}
fn default_backoff_ms() -> u64 {
    300
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            place_id: default_place_id(),
            page_size: default_page_size(),
            request_timeout_ms: default_request_timeout_ms(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// How long a fetched page is served from cache
    #[serde(default = "default_cache_ttl_ms")]
    pub ttl_ms: u64,
}

fn default_cache_ttl_ms() -> u64 {
    60_000
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_ms: default_cache_ttl_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreloadSettings {
    #[serde(default = "default_preload_enabled")]
    pub enabled: bool,
    #[serde(default = "default_preload_interval_ms")]
    pub interval_ms: u64,
}

fn default_preload_enabled() -> bool {
    true
}
fn default_preload_interval_ms() -> u64 {
    30_000
}

impl Default for PreloadSettings {
    fn default() -> Self {
        Self {
            enabled: default_preload_enabled(),
            interval_ms: default_preload_interval_ms(),
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSettings {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}
fn default_metrics_enabled() -> bool {
    true
}
impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
    use std::path::PathBuf;

    /// Flat environment variables of earlier deployments, mapped onto
    /// their config keys.
    const LEGACY_ENV: &[(&str, &str)] = &[
        ("PORT", "server.port"),
        ("PLACE_ID", "upstream.place_id"),
        ("ROBLOX_TIMEOUT_MS", "upstream.request_timeout_ms"),
        ("CACHE_TTL_MS", "cache.ttl_ms"),
        ("PRELOAD_INTERVAL_MS", "preload.interval_ms"),
    ];

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("rbxservers.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., RBXSERVERS__CACHE__TTL_MS=30000
        builder = builder.add_source(
            Environment::with_prefix("RBXSERVERS")
                .try_parsing(true)
                .separator("__"),
        );
        builder = apply_legacy_env(builder, |name| std::env::var(name).ok())?;
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        // Validate
        merged.validate()?;
        Ok(merged)
    }

    /// Legacy variables win over the file and the prefixed environment.
    pub(crate) fn apply_legacy_env(
        mut builder: ConfigBuilder<DefaultState>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ConfigBuilder<DefaultState>, String> {
        for (var, key) in LEGACY_ENV {
            let value = lookup(var).filter(|v| !v.trim().is_empty());
            builder = builder
                .set_override_option(*key, value)
                .map_err(|e| format!("invalid {var}: {e}"))?;
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::loader::{apply_legacy_env, load_config};
    use super::*;
    use config::{Config, File, FileFormat};
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(60));
        assert_eq!(cfg.preload_interval(), Duration::from_secs(30));

        let upstream = cfg.upstream_config();
        assert_eq!(upstream.place_id, 109_983_668_079_237);
        assert_eq!(upstream.page_size, 100);
        assert_eq!(upstream.request_timeout, Duration::from_secs(10));
        assert_eq!(upstream.max_attempts, 4);
        assert_eq!(upstream.backoff_unit, Duration::from_millis(300));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        cfg.upstream.page_size = 101;
        assert!(cfg.validate().unwrap_err().contains("page_size"));

        let mut cfg = AppConfig::default();
        cfg.cache.ttl_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.preload.interval_ms = 0;
        assert!(cfg.validate().is_err());
        cfg.preload.enabled = false;
        assert!(cfg.validate().is_ok());

        let mut cfg = AppConfig::default();
        cfg.upstream.base_url = "games.roblox.com".into();
        assert!(cfg.validate().unwrap_err().contains("base_url"));

        let mut cfg = AppConfig::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[upstream]
place_id = 42
base_url = "http://localhost:1234"

[cache]
ttl_ms = 5000

[preload]
enabled = false
"#
        )
        .unwrap();

        let cfg = load_config(file.path().to_str()).unwrap();
        assert_eq!(cfg.upstream.place_id, 42);
        assert_eq!(cfg.upstream.base_url, "http://localhost:1234");
        assert_eq!(cfg.cache.ttl_ms, 5000);
        assert!(!cfg.preload.enabled);
        // Untouched sections keep their defaults
        assert_eq!(cfg.upstream.max_attempts, 4);
    }

    #[test]
    fn test_legacy_env_overrides_file() {
        let builder = Config::builder().add_source(File::from_str(
            "[cache]\nttl_ms = 5000\n[server]\nport = 9090\n",
            FileFormat::Toml,
        ));
        let builder = apply_legacy_env(builder, |name| match name {
            "CACHE_TTL_MS" => Some("15000".into()),
            "PLACE_ID" => Some("777".into()),
            "PORT" => Some(String::new()),
            _ => None,
        })
        .unwrap();

        let cfg: AppConfig = builder.build().unwrap().try_deserialize().unwrap();
        assert_eq!(cfg.cache.ttl_ms, 15_000);
        assert_eq!(cfg.upstream.place_id, 777);
        // Empty legacy values are ignored
        assert_eq!(cfg.server.port, 9090);
    }
}
