use std::env;
use std::fs;

use tempfile::NamedTempFile;

use crate::config::{self, AppConfig, CounterBackend, PasswordAlgorithm};

fn write_temp_config(content: &str) -> NamedTempFile {
    let temp_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    fs::write(temp_file.path(), content).unwrap();
    temp_file
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.database.url, "sqlite://data/mentorly.db");
    assert_eq!(config.security.jwt_secret, config::DEFAULT_JWT_SECRET);
    assert_eq!(config.security.csrf_header, "X-CSRF-Token");
    assert_eq!(config.security.csrf_field, "csrf_token");
    assert_eq!(config.security.session_cookie, "mentorly_session");
    assert!(!config.security.enable_hsts);
    assert!(config.security.trust_unverified_token_subject);
    assert_eq!(config.security.password_algorithm, PasswordAlgorithm::Argon2id);
    assert_eq!(config.rate_limit.backend, CounterBackend::Redis);
    assert_eq!(config.rate_limit.redis_url(), "redis://127.0.0.1:6379/");
    assert_eq!(config.rate_limit.store_timeout().as_millis(), 250);
    assert!(config.rate_limit.fail_open);
    assert_eq!((config.rate_limit.default_max_requests, config.rate_limit.default_window_secs), (100, 60));
    assert_eq!((config.rate_limit.login_max_requests, config.rate_limit.login_window_secs), (5, 900));
    assert!(config::validate(&config).is_ok());
}

#[test]
fn test_allowed_origins_parsing() {
    let mut config = AppConfig::default();
    config.security.allowed_origins = "https://a.example,,https://b.example,".into();
    assert_eq!(config.security.allowed_origins(), vec!["https://a.example", "https://b.example"]);

    // Entries are not trimmed.
    config.security.allowed_origins = "https://a.example, https://b.example".into();
    assert_eq!(config.security.allowed_origins(), vec!["https://a.example", " https://b.example"]);
}

#[test]
fn test_fallback_dir_defaults_to_temp() {
    let mut config = AppConfig::default();
    assert_eq!(config.rate_limit.fallback_dir(), env::temp_dir());
    config.rate_limit.fallback_dir = "/var/lib/mentorly/ratelimit".into();
    assert_eq!(config.rate_limit.fallback_dir().to_str(), Some("/var/lib/mentorly/ratelimit"));
}

#[test]
fn test_validation_rejects_bad_values() {
    let base = AppConfig::default();

    let mut c = base.clone();
    c.server.port = 0;
    assert!(config::validate(&c).unwrap_err().to_string().contains("invalid server.port"));

    let mut c = base.clone();
    c.rate_limit.login_window_secs = 0;
    assert!(config::validate(&c).is_err());

    let mut c = base.clone();
    c.rate_limit.default_max_requests = 0;
    assert!(config::validate(&c).is_err());

    let mut c = base.clone();
    c.security.jwt_secret = String::new();
    assert!(config::validate(&c).is_err());

    let mut c = base.clone();
    c.rate_limit.store_timeout_ms = 0;
    assert!(config::validate(&c).is_err());

    let mut c = base;
    c.security.session_cookie = " ".into();
    assert!(config::validate(&c).is_err());
}

// The only test touching process environment; keep it that way.
#[test]
fn test_load_layers_file_and_environment() {
    let file = write_temp_config(
        r#"
[server]
port = 9090

[rate_limit]
backend = "memory"
login_max_requests = 3
"#,
    );
    env::set_var("MENTORLY_CONFIG", file.path());
    env::set_var("MENTORLY__SECURITY__ENABLE_HSTS", "true");
    env::set_var("JWT_SECRET", "from-env");
    env::set_var("ALLOWED_ORIGINS", "https://app.mentorly.id");

    let loaded = config::load();

    env::remove_var("MENTORLY__SECURITY__ENABLE_HSTS");
    env::remove_var("JWT_SECRET");
    env::remove_var("ALLOWED_ORIGINS");
    let cfg = loaded.unwrap();
    assert_eq!(cfg.server.port, 9090);
    assert_eq!(cfg.rate_limit.backend, CounterBackend::Memory);
    assert_eq!(cfg.rate_limit.login_max_requests, 3);
    assert_eq!(cfg.rate_limit.login_window_secs, 900);
    assert!(cfg.security.enable_hsts);
    assert_eq!(cfg.security.jwt_secret, "from-env");
    assert_eq!(cfg.security.allowed_origins(), vec!["https://app.mentorly.id"]);

    let bad = write_temp_config("[rate_limit]\nbackend = \"carrier-pigeon\"\n");
    env::set_var("MENTORLY_CONFIG", bad.path());
    let result = config::load();
    env::remove_var("MENTORLY_CONFIG");
    assert!(result.is_err());
}
