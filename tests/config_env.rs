use embed_token::config::{Config, LogFormat, DEFAULT_PORT};
use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(g) => g,
        Err(e) => e.into_inner(),
    }
}

const VARS: [&str; 5] = [
    "API_KEY",
    "REDIRECT_BASE_URL",
    "PORT",
    "SWEEP_INTERVAL_SECS",
    "LOG_FORMAT",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
fn test_from_env_reads_process_environment() {
    let _g = lock_env();
    clear_env();
    std::env::set_var("API_KEY", "env-secret");
    std::env::set_var("REDIRECT_BASE_URL", "http://localhost:8501");
    std::env::set_var("LOG_FORMAT", "json");

    let cfg = Config::from_env().unwrap();
    assert_eq!(cfg.api_key, "env-secret");
    assert_eq!(cfg.redirect_base_url, "http://localhost:8501");
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.log_format, LogFormat::Json);

    clear_env();
}

#[test]
fn test_from_env_requires_api_key() {
    let _g = lock_env();
    clear_env();
    std::env::set_var("REDIRECT_BASE_URL", "http://localhost:8501");

    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("API_KEY"));

    clear_env();
}
