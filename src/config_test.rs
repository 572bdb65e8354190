use super::*;
use std::collections::HashMap;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

// =============================================================================
// from_lookup
// =============================================================================

#[test]
fn minimal_config_uses_defaults() {
    let config = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/procura")])).expect("valid");
    assert_eq!(config.database_url, "postgres://localhost/procura");
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
    assert!(config.agui_backend_url.is_none());
    assert!(config.gmail.is_none());
    assert!(config.stripe_webhook_secret.is_none());
}

#[test]
fn missing_database_url_is_an_error() {
    assert_eq!(AppConfig::from_lookup(lookup(&[])), Err(ConfigError::Missing("DATABASE_URL")));
}

#[test]
fn blank_database_url_counts_as_missing() {
    assert_eq!(
        AppConfig::from_lookup(lookup(&[("DATABASE_URL", "   ")])),
        Err(ConfigError::Missing("DATABASE_URL"))
    );
}

#[test]
fn invalid_port_is_an_error() {
    let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("PORT", "http")])).expect_err("invalid");
    assert_eq!(err, ConfigError::Invalid { var: "PORT", value: "http".into() });
}

#[test]
fn full_config_parses() {
    let config = AppConfig::from_lookup(lookup(&[
        ("DATABASE_URL", "postgres://x"),
        ("PORT", "8080"),
        ("DB_MAX_CONNECTIONS", "12"),
        ("AGUI_BACKEND_URL", "wss://agents.example.com/stream"),
        ("GMAIL_ACCESS_TOKEN", "ya29.token"),
        ("GMAIL_SENDER", "buyer@example.com"),
        ("STRIPE_WEBHOOK_SECRET", "whsec_123"),
    ]))
    .expect("valid");

    assert_eq!(config.port, 8080);
    assert_eq!(config.db_max_connections, 12);
    assert_eq!(config.agui_backend_url.as_deref(), Some("wss://agents.example.com/stream"));
    assert_eq!(
        config.gmail,
        Some(GmailConfig { access_token: "ya29.token".into(), sender: "buyer@example.com".into() })
    );
    assert_eq!(config.stripe_webhook_secret.as_deref(), Some("whsec_123"));
}

#[test]
fn non_websocket_backend_url_is_rejected() {
    let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("AGUI_BACKEND_URL", "https://agents")]))
        .expect_err("invalid");
    assert!(matches!(err, ConfigError::Invalid { var: "AGUI_BACKEND_URL", .. }));
}

#[test]
fn gmail_requires_both_vars() {
    let config =
        AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("GMAIL_ACCESS_TOKEN", "t")])).expect("valid");
    assert!(config.gmail.is_none());
}

// =============================================================================
// env_bool: unique env var names avoid races with parallel tests.
// =============================================================================

#[test]
fn env_bool_true_variants() {
    for (i, val) in ["1", "true", "yes", "on", "TRUE", " On "].iter().enumerate() {
        let key = format!("__PROCURA_EB_TRUE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(true), "expected true for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_false_variants() {
    for (i, val) in ["0", "false", "no", "off"].iter().enumerate() {
        let key = format!("__PROCURA_EB_FALSE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(false), "expected false for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_invalid_or_unset_is_none() {
    let key = "__PROCURA_EB_INVALID_4411__";
    unsafe { std::env::set_var(key, "maybe") };
    assert_eq!(env_bool(key), None);
    unsafe { std::env::remove_var(key) };

    assert_eq!(env_bool("__PROCURA_EB_SURELY_UNSET_4412__"), None);
}
