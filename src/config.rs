use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Application-level constants
pub const APP_NAME: &str = "frontdesk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Clinic default: refresh the queue view every 30 seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Per-request timeout against the remote store.
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;

/// Average consultation length used for advisory wait estimates.
pub const DEFAULT_AVG_CONSULT_MINS: u32 = 15;

pub const DEFAULT_STORE_URL: &str = "http://localhost:8600";

/// Runtime configuration for the queue engine.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub store_base_url: String,
    pub store_timeout_secs: u64,
    pub poll_interval: Duration,
    pub avg_consult_mins: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            store_base_url: DEFAULT_STORE_URL.to_string(),
            store_timeout_secs: DEFAULT_STORE_TIMEOUT_SECS,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            avg_consult_mins: DEFAULT_AVG_CONSULT_MINS,
        }
    }
}

impl QueueConfig {
    /// Read configuration from `FRONTDESK_*` environment variables,
    /// falling back to clinic defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self {
            store_base_url: std::env::var("FRONTDESK_STORE_URL")
                .unwrap_or_else(|_| DEFAULT_STORE_URL.to_string()),
            store_timeout_secs: env_u64(
                "FRONTDESK_STORE_TIMEOUT_SECS",
                DEFAULT_STORE_TIMEOUT_SECS,
            ),
            poll_interval: Duration::from_secs(env_u64(
                "FRONTDESK_POLL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )),
            avg_consult_mins: env_u64("FRONTDESK_AVG_CONSULT_MINS", DEFAULT_AVG_CONSULT_MINS as u64)
                as u32,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    format!("info,{APP_NAME}=debug")
}

/// Initialize tracing for binaries embedding the engine. Safe to call more
/// than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_filter())),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_clinic_poll_interval() {
        let config = QueueConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.store_base_url, DEFAULT_STORE_URL);
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn log_filter_names_the_crate() {
        assert!(default_log_filter().contains(APP_NAME));
    }
}
