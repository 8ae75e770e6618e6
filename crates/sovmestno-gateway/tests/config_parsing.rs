use std::{env, fs};

use sovmestno_gateway::config::loader::{load_config, load_config_with_env};
use sovmestno_gateway::{AppConfig, ServiceConfig};

fn service<'a>(cfg: &'a AppConfig, name: &str) -> &'a ServiceConfig {
    cfg.services
        .iter()
        .find(|s| s.name == name)
        .expect("service configured")
}

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    // Create a temporary TOML configuration file
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("sovmestno.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081

[auth]
jwt_secret = "file-secret"

[cors]
allowed_origins = "https://sovmestno.ru, https://admin.sovmestno.ru"

[health]
probe_timeout_ms = 1500

[logging]
level = "debug"

[[services]]
name = "user-service"
mount = "/api/user"
base_url = "http://user-service:8081"
docs_prefix = "/swagger-user"

[[services]]
name = "event-service"
mount = "/api/event"
base_url = "http://event-service:8082/"
forward_auth = false
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config_with_env(path.to_str(), |_| None).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.auth.jwt_secret, "file-secret");
    assert_eq!(cfg.cors.allowed_origins.len(), 2);
    assert_eq!(cfg.health.probe_timeout_ms, 1500);
    assert_eq!(cfg.logging.level.to_ascii_lowercase(), "debug");
    assert_eq!(cfg.services.len(), 2);
    let event = service(&cfg, "event-service");
    assert_eq!(event.base_url(), "http://event-service:8082");
    assert!(!event.forward_auth);
    assert!(service(&cfg, "user-service").forward_auth);
    // Unlisted sections keep their defaults
    assert_eq!(cfg.proxy.response_header_timeout_ms, 10_000);
    assert!(cfg.routes.public.iter().any(|r| r == "/health"));

    // 2) Env override should win over file
    unsafe {
        env::set_var("SOVMESTNO__HEALTH__PROBE_TIMEOUT_MS", "750");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.health.probe_timeout_ms, 750);
    // cleanup env var
    unsafe {
        env::remove_var("SOVMESTNO__HEALTH__PROBE_TIMEOUT_MS");
    }

    // 3) Deployment variables win over both
    let cfg_legacy = load_config_with_env(path.to_str(), |key| match key {
        "PORT" => Some("9000".to_string()),
        "JWT_SECRET" => Some("env-secret".to_string()),
        _ => None,
    })
    .expect("should apply deployment variables");
    assert_eq!(cfg_legacy.server.port, 9000);
    assert_eq!(cfg_legacy.auth.jwt_secret, "env-secret");

    // 4) Invalid config (duplicate mount) should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[[services]]
name = "a"
mount = "/api/a"

[[services]]
name = "b"
mount = "/api/a"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config_with_env(invalid_path.to_str(), |_| None)
        .expect_err("expected validation error");
    assert!(err.contains("duplicate service mount"));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");

    let cfg = load_config_with_env(path.to_str(), |key| {
        (key == "EVENT_SERVICE_URL").then(|| "http://event:8082".to_string())
    })
    .expect("defaults are valid");

    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.services.len(), 3);
    assert!(service(&cfg, "event-service").is_configured());
    assert!(!service(&cfg, "user-service").is_configured());
}
