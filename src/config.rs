use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Secret shipped in the embedded defaults; a deployment must override it.
pub const DEFAULT_JWT_SECRET: &str = "CHANGE_THIS_SECRET";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordAlgorithm {
    Argon2id,
    Bcrypt,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    /// Comma-separated list of origins that receive CORS headers.
    pub allowed_origins: String,
    pub csrf_header: String,
    pub csrf_field: String,
    pub session_cookie: String,
    pub session_ttl_secs: u64,
    pub enable_hsts: bool,
    /// When true, an unverified bearer token still selects the `user:<sub>` bucket.
    pub trust_unverified_token_subject: bool,
    pub password_algorithm: PasswordAlgorithm,
    /// Rewrites plaintext, MD5 and SHA-256 passwords as hashes after a successful login.
    pub rehash_legacy_passwords: bool,
    pub security_log: String,
    pub max_body_bytes: usize,
}

impl SecurityConfig {
    /// Comma-separated entries, used verbatim: `"a, b"` allows `" b"`, not `"b"`.
    pub fn allowed_origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterBackend {
    Redis,
    Memory,
    File,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub backend: CounterBackend,
    pub redis_host: String,
    pub redis_port: u16,
    pub store_timeout_ms: u64,
    /// Directory for the file-backed fallback; empty means the OS temp dir.
    pub fallback_dir: String,
    pub fail_open: bool,
    pub default_max_requests: u64,
    pub default_window_secs: u64,
    pub login_max_requests: u64,
    pub login_window_secs: u64,
}

impl RateLimitConfig {
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.redis_host, self.redis_port)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn fallback_dir(&self) -> PathBuf {
        if self.fallback_dir.trim().is_empty() {
            std::env::temp_dir()
        } else {
            PathBuf::from(&self.fallback_dir)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

const DEFAULTS: &str = include_str!("../config/default.toml");

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: mentorly.toml (in CWD)
        .add_source(::config::File::with_name("mentorly").required(false));

    if let Ok(custom_path) = std::env::var("MENTORLY_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    builder = builder.add_source(::config::Environment::with_prefix("MENTORLY").separator("__"));

    // Bare variables used by existing deployments win over everything else
    builder = builder
        .set_override_option("security.jwt_secret", non_empty_env("JWT_SECRET"))?
        .set_override_option("security.allowed_origins", non_empty_env("ALLOWED_ORIGINS"))?
        .set_override_option("rate_limit.redis_host", non_empty_env("REDIS_HOST"))?
        .set_override_option("rate_limit.redis_port", non_empty_env("REDIS_PORT"))?;

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    if cfg.security.jwt_secret.is_empty() {
        return Err(anyhow::anyhow!("security.jwt_secret must not be empty"));
    }
    if cfg.security.jwt_secret == DEFAULT_JWT_SECRET {
        tracing::warn!("security.jwt_secret still has its default value; set JWT_SECRET");
    }
    if cfg.security.csrf_header.trim().is_empty() || cfg.security.csrf_field.trim().is_empty() {
        return Err(anyhow::anyhow!("security.csrf_header and security.csrf_field must be set"));
    }
    if cfg.security.session_cookie.trim().is_empty() {
        return Err(anyhow::anyhow!("security.session_cookie must be set"));
    }
    if cfg.security.session_ttl_secs == 0 {
        return Err(anyhow::anyhow!("security.session_ttl_secs must be > 0"));
    }
    if cfg.security.max_body_bytes < 1024 {
        return Err(anyhow::anyhow!("security.max_body_bytes must be >= 1024"));
    }

    let rl = &cfg.rate_limit;
    if rl.default_max_requests == 0 || rl.login_max_requests == 0 {
        return Err(anyhow::anyhow!("rate_limit max requests must be > 0"));
    }
    if rl.default_window_secs == 0 || rl.login_window_secs == 0 {
        return Err(anyhow::anyhow!("rate_limit windows must be > 0"));
    }
    if rl.store_timeout_ms == 0 || rl.store_timeout_ms > 10_000 {
        return Err(anyhow::anyhow!("rate_limit.store_timeout_ms must be in 1..=10000"));
    }
    if rl.backend == CounterBackend::Redis && rl.redis_port == 0 {
        return Err(anyhow::anyhow!("invalid rate_limit.redis_port: 0"));
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
