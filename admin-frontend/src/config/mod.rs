use secrecy::Secret;
use serde::Deserialize;

#[derive(Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub identity_service: IdentityServiceSettings,
    #[serde(default)]
    pub redis: RedisSettings,
    #[serde(default)]
    pub security: SecuritySettings,
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Secret the session cookie is signed with; at least 64 bytes.
    #[serde(default = "default_cookie_secret")]
    pub cookie_secret: Secret<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cookie_secret: default_cookie_secret(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9010
}

fn default_cookie_secret() -> Secret<String> {
    // Dev-only fallback; override APP_SERVER__COOKIE_SECRET in any real
    // deployment.
    Secret::new("insecure-dev-cookie-signing-secret-0123456789abcdef0123456789abcdef".to_string())
}

#[derive(Deserialize, Clone)]
pub struct IdentityServiceSettings {
    /// Base URL of the remote identity service.
    #[serde(default = "default_identity_url")]
    pub url: String,
    /// Liveness path polled by the readiness probe.
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default = "default_identity_timeout")]
    pub timeout_seconds: u64,
}

impl Default for IdentityServiceSettings {
    fn default() -> Self {
        Self {
            url: default_identity_url(),
            health_path: default_health_path(),
            timeout_seconds: default_identity_timeout(),
        }
    }
}

fn default_identity_url() -> String {
    "http://localhost:9005".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_identity_timeout() -> u64 {
    10
}

#[derive(Deserialize, Clone, Default)]
pub struct RedisSettings {
    /// Durable attempt-store backend. Unset falls back to an in-memory
    /// store, leaving lockout state process-local.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Deserialize, Clone, Default)]
pub struct SecuritySettings {
    #[serde(default)]
    pub lockout: LockoutSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

#[derive(Deserialize, Clone)]
pub struct LockoutSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_seconds")]
    pub base_seconds: u64,
    #[serde(default = "default_cap_seconds")]
    pub cap_seconds: u64,
}

impl Default for LockoutSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_seconds: default_base_seconds(),
            cap_seconds: default_cap_seconds(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_seconds() -> u64 {
    30
}

fn default_cap_seconds() -> u64 {
    1800
}

#[derive(Deserialize, Clone)]
pub struct SessionSettings {
    #[serde(default = "default_idle_minutes")]
    pub idle_minutes: i64,
    #[serde(default = "default_sweep_seconds")]
    pub sweep_seconds: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_minutes: default_idle_minutes(),
            sweep_seconds: default_sweep_seconds(),
        }
    }
}

fn default_idle_minutes() -> i64 {
    30
}

fn default_sweep_seconds() -> u64 {
    60
}

/// Coarse per-process limit on login submissions, on top of the per-client
/// lockout throttle.
#[derive(Deserialize, Clone)]
pub struct RateLimitSettings {
    #[serde(default = "default_rate_limit_attempts")]
    pub attempts: u32,
    #[serde(default = "default_rate_limit_window")]
    pub window_seconds: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            attempts: default_rate_limit_attempts(),
            window_seconds: default_rate_limit_window(),
        }
    }
}

fn default_rate_limit_attempts() -> u32 {
    20
}

fn default_rate_limit_window() -> u64 {
    60
}

#[derive(Deserialize, Clone)]
pub struct ObservabilitySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP collector endpoint; unset disables trace export.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("cannot determine current dir: {e}")))?;

    // Works both from the workspace root and from inside the crate.
    let configuration_directory = if base_path.ends_with("admin-frontend") {
        base_path.join("config")
    } else {
        base_path.join("admin-frontend").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
