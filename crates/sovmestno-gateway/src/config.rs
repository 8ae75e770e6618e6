use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::HashSet, net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Bearer token verification
    #[serde(default)]
    pub auth: AuthSettings,
    /// Cross-origin allow-list
    #[serde(default)]
    pub cors: CorsConfig,
    /// Routes admitted without a bearer token
    #[serde(default)]
    pub routes: RoutesConfig,
    /// Outbound timeouts for proxied requests
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub health: HealthConfig,
    /// Documentation proxy settings
    #[serde(default)]
    pub docs: DocsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Downstream services, in the order they are reported by `/health`
    #[serde(default = "default_services")]
    pub services: Vec<ServiceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthSettings::default(),
            cors: CorsConfig::default(),
            routes: RoutesConfig::default(),
            proxy: ProxyConfig::default(),
            health: HealthConfig::default(),
            docs: DocsConfig::default(),
            logging: LoggingConfig::default(),
            services: default_services(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        // Timeout validations
        if self.proxy.response_header_timeout_ms == 0
            || self.proxy.idle_timeout_ms == 0
            || self.proxy.connect_timeout_ms == 0
        {
            return Err("proxy timeouts must be > 0".into());
        }
        if self.health.probe_timeout_ms == 0 {
            return Err("health.probe_timeout_ms must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Route rules
        if let Some(rule) = self.routes.public.iter().find(|r| !r.starts_with('/')) {
            return Err(format!("routes.public entry '{rule}' must start with '/'"));
        }
        // Services
        let mut names = HashSet::new();
        let mut mounts = HashSet::new();
        for svc in &self.services {
            if svc.name.trim().is_empty() {
                return Err("services[].name must not be empty".into());
            }
            if !svc.mount.starts_with('/') || svc.mount.ends_with('/') {
                return Err(format!(
                    "services.{}.mount must start with '/' and must not end with '/'",
                    svc.name
                ));
            }
            if let Some(prefix) = &svc.docs_prefix
                && (!prefix.starts_with('/') || prefix.ends_with('/'))
            {
                return Err(format!(
                    "services.{}.docs_prefix must start with '/' and must not end with '/'",
                    svc.name
                ));
            }
            if svc.is_configured() {
                match url::Url::parse(svc.base_url()) {
                    Ok(u) if matches!(u.scheme(), "http" | "https") && u.has_host() => {}
                    Ok(_) => {
                        return Err(format!(
                            "services.{}.base_url must be an absolute http(s) URL",
                            svc.name
                        ));
                    }
                    Err(e) => {
                        return Err(format!("services.{}.base_url is invalid: {e}", svc.name));
                    }
                }
            }
            let reserved = ["/health", "/swagger"];
            if reserved.contains(&svc.mount.as_str())
                || svc
                    .docs_prefix
                    .as_deref()
                    .is_some_and(|p| reserved.contains(&p))
            {
                return Err(format!(
                    "services.{} must not be mounted at {reserved:?}",
                    svc.name
                ));
            }
            if !names.insert(svc.name.as_str()) {
                return Err(format!("duplicate service name '{}'", svc.name));
            }
            if !mounts.insert(svc.mount.as_str()) {
                return Err(format!("duplicate service mount '{}'", svc.mount));
            }
            if let Some(prefix) = &svc.docs_prefix
                && !mounts.insert(prefix.as_str())
            {
                return Err(format!("duplicate service mount '{prefix}'"));
            }
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

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_grace_secs)
    }
    pub fn response_header_timeout(&self) -> Duration {
        Duration::from_millis(self.proxy.response_header_timeout_ms)
    }
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.proxy.idle_timeout_ms)
    }
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.proxy.connect_timeout_ms)
    }
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.health.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Time in-flight requests get to finish after a shutdown signal
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_shutdown_grace_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Shared HMAC secret. Empty means every protected route answers 401.
    #[serde(default, skip_serializing)]
    pub jwt_secret: String,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &if self.jwt_secret.is_empty() { "" } else { "***" })
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(
        default = "default_allowed_origins",
        deserialize_with = "string_or_list"
    )]
    pub allowed_origins: Vec<String>,
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".into(),
        "http://localhost:5173".into(),
    ]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Public route rules: `"/health"` matches exactly, `"/swagger/*"` matches
/// every path starting with `/swagger/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesConfig {
    #[serde(default = "default_public_routes", deserialize_with = "string_or_list")]
    pub public: Vec<String>,
}

fn default_public_routes() -> Vec<String> {
    [
        "/health",
        "/api/auth",
        "/api/user/auth",
        "/api/auth/*",
        "/api/user/auth/*",
        "/swagger/*",
        "/swagger-user/*",
        "/swagger-event/*",
        "/swagger-application/*",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            public: default_public_routes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Upper bound on waiting for downstream response headers
    #[serde(default = "default_response_header_timeout_ms")]
    pub response_header_timeout_ms: u64,
    /// Idle pooled connections are closed after this long
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_response_header_timeout_ms() -> u64 {
    10_000
}
fn default_idle_timeout_ms() -> u64 {
    30_000
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            response_header_timeout_ms: default_response_header_timeout_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_probe_timeout_ms() -> u64 {
    2_000
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocsConfig {
    /// Public host written into proxied OpenAPI documents. Falls back to the
    /// request's `Host` header.
    #[serde(default)]
    pub api_host: Option<String>,
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

/// A downstream service reachable through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    /// Gateway path prefix, e.g. `/api/user`
    pub mount: String,
    /// Base URL of the service. Empty means not configured.
    #[serde(default)]
    pub base_url: String,
    /// Environment variable that overrides `base_url`, e.g. `USER_SERVICE_URL`
    #[serde(default)]
    pub base_url_env: Option<String>,
    /// Gateway prefix for the service's generated API docs, e.g. `/swagger-user`
    #[serde(default)]
    pub docs_prefix: Option<String>,
    /// Whether the client's `Authorization` header is passed downstream
    #[serde(default = "default_forward_auth")]
    pub forward_auth: bool,
}

fn default_forward_auth() -> bool {
    true
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, mount: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mount: mount.into(),
            base_url: String::new(),
            base_url_env: None,
            docs_prefix: None,
            forward_auth: default_forward_auth(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_docs_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.docs_prefix = Some(prefix.into());
        self
    }

    /// Returns `true` if the service has a base URL.
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}

fn default_services() -> Vec<ServiceConfig> {
    [
        ("user-service", "/api/user", "/swagger-user", "USER_SERVICE_URL"),
        ("event-service", "/api/event", "/swagger-event", "EVENT_SERVICE_URL"),
        (
            "application-service",
            "/api/application",
            "/swagger-application",
            "APPLICATION_SERVICE_URL",
        ),
    ]
    .into_iter()
    .map(|(name, mount, docs, env)| ServiceConfig {
        base_url_env: Some(env.to_string()),
        ..ServiceConfig::new(name, mount).with_docs_prefix(docs)
    })
    .collect()
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::List(items) => items
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        StringOrList::Csv(value) => split_list(&value),
    })
}

pub mod loader {
    use super::{AppConfig, split_list};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file name.
    pub const DEFAULT_CONFIG_PATH: &str = "sovmestno.toml";

    /// Loads configuration from `path` (or `sovmestno.toml`), `SOVMESTNO__*`
    /// variables and the legacy deployment variables, then validates it.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        load_config_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_config_with_env<F>(path: Option<&str>, lookup: F) -> Result<AppConfig, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., SOVMESTNO__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("SOVMESTNO")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let mut merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        apply_legacy_env(&mut merged, lookup)?;
        // Validate
        merged.validate()?;
        Ok(merged)
    }

    /// Applies the variable names used by the existing deployment
    /// (`PORT`, `JWT_SECRET`, `ALLOWED_ORIGINS`, `API_HOST`, `PUBLIC_ROUTES`
    /// and each service's `base_url_env`). They take precedence over the
    /// file and `SOVMESTNO__*` values. A variable that is set but blank
    /// counts as unset.
    pub fn apply_legacy_env<F>(cfg: &mut AppConfig, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = lookup("PORT") {
            cfg.server.port = port
                .trim()
                .parse()
                .map_err(|_| format!("PORT must be a valid port number, got '{port}'"))?;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            cfg.auth.jwt_secret = secret;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            cfg.cors.allowed_origins = split_list(&origins);
        }
        if let Some(host) = lookup("API_HOST") {
            cfg.docs.api_host = Some(host.trim().to_string());
        }
        if let Some(routes) = lookup("PUBLIC_ROUTES") {
            cfg.routes.public = split_list(&routes);
        }
        for svc in &mut cfg.services {
            if let Some(url) = svc.base_url_env.as_deref().and_then(&lookup) {
                svc.base_url = url.trim().to_string();
            }
        }
        Ok(())
    }
}
