use super::*;
use serial_test::serial;
use std::env;

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe {
        for var in [
            "CLAIMCHECK_PORT",
            "CLAIMCHECK_BIND_ADDR",
            "CORS_ORIGINS",
            "X_ADMIN_TOKEN",
            "QDRANT_URL",
            "CLAIMCHECK_DB_PATH",
            "SOURCE_HUB_URL",
            "FACTCHECK_API_KEY",
            "GEMINI_API_KEY",
            "OPENROUTER_API_KEY",
            "OLLAMA_ENDPOINT",
            "FORCE_OFFLINE_MODE",
            "MIN_SIMILARITY",
            "CANON_SIMILARITY",
            "CHUNK_SIZE",
            "CHUNK_OVERLAP",
            "T_COOLDOWN_SEC",
            "T_REQUEST_SEC",
        ] {
            env::remove_var(var);
        }
    }
}

#[test]
fn default_config() {
    let config = Config::default();

    assert_eq!(config.port, 8080);
    assert_eq!(config.qdrant_url, "http://localhost:6334");
    assert_eq!(config.min_similarity, 0.65);
    assert_eq!(config.canon_similarity, 0.85);
    assert_eq!(config.chunk_size, 800);
    assert_eq!(config.chunk_overlap, 120);
    assert_eq!(config.cooldown, Duration::from_secs(600));
    assert_eq!(config.request_timeout, Duration::from_secs(15));
    assert!(!config.force_offline);
    assert!(config.gemini_api_key.is_none());
}

#[test]
fn socket_addr_formats() {
    let config = Config::default();
    assert_eq!(config.socket_addr(), "127.0.0.1:8080");
}

#[test]
#[serial]
fn from_env_with_defaults() {
    clear_env();
    let config = Config::from_env().expect("defaults must parse");
    assert_eq!(config.port, 8080);
    assert_eq!(config.admin_token, "dev_admin_token_change_in_production");
}

#[test]
#[serial]
fn from_env_overrides() {
    clear_env();
    with_env_vars(
        &[
            ("CLAIMCHECK_PORT", "9100"),
            ("GEMINI_API_KEY", "key-123"),
            ("MIN_SIMILARITY", "0.7"),
            ("T_COOLDOWN_SEC", "30"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
        ],
        || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.port, 9100);
            assert_eq!(config.gemini_api_key.as_deref(), Some("key-123"));
            assert_eq!(config.min_similarity, 0.7);
            assert_eq!(config.cooldown, Duration::from_secs(30));
            assert_eq!(
                config.cors_origins,
                vec!["https://a.example".to_string(), "https://b.example".to_string()]
            );
        },
    );
}

#[test]
#[serial]
fn offline_mode_extends_request_budget() {
    clear_env();
    with_env_vars(&[("FORCE_OFFLINE_MODE", "1")], || {
        let config = Config::from_env().unwrap();
        assert!(config.force_offline);
        assert_eq!(config.request_timeout, Duration::from_secs(20));
    });

    with_env_vars(&[("FORCE_OFFLINE_MODE", "1"), ("T_REQUEST_SEC", "5")], || {
        let config = Config::from_env().unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(5), "explicit value wins");
    });
}

#[test]
#[serial]
fn invalid_numbers_are_rejected() {
    clear_env();
    with_env_vars(&[("CLAIMCHECK_PORT", "not-a-port")], || {
        assert!(Config::from_env().is_err());
    });
}

#[test]
fn overlap_must_be_smaller_than_chunk() {
    let config = Config {
        chunk_size: 100,
        chunk_overlap: 100,
        ..Config::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapExceedsChunk { .. })
    ));
}

#[test]
#[serial]
fn empty_api_keys_count_as_unset() {
    clear_env();
    with_env_vars(&[("GEMINI_API_KEY", "   ")], || {
        let config = Config::from_env().unwrap();
        assert!(config.gemini_api_key.is_none());
    });
}
