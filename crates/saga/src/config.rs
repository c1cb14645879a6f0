//! Saga and inventory client configuration loaded from environment variables.

use std::time::Duration;

const DEFAULT_STEP_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_COMPENSATION_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_INVENTORY_URL: &str = "http://localhost:8001";
const DEFAULT_INVENTORY_TIMEOUT_MS: u64 = 5_000;

fn env_millis(key: &str, default: u64) -> Duration {
    let millis = std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default);
    Duration::from_millis(millis)
}

/// Timeouts applied by the saga coordinator.
///
/// Reads from environment variables:
/// - `SAGA_STEP_TIMEOUT_MS`: upper bound for one step's `execute` (default: `30000`)
/// - `SAGA_COMPENSATION_TIMEOUT_MS`: upper bound for one `compensate` (default: `15000`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SagaConfig {
    pub step_timeout: Duration,
    pub compensation_timeout: Duration,
}

impl SagaConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            step_timeout: env_millis("SAGA_STEP_TIMEOUT_MS", DEFAULT_STEP_TIMEOUT_MS),
            compensation_timeout: env_millis(
                "SAGA_COMPENSATION_TIMEOUT_MS",
                DEFAULT_COMPENSATION_TIMEOUT_MS,
            ),
        }
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_compensation_timeout(mut self, timeout: Duration) -> Self {
        self.compensation_timeout = timeout;
        self
    }
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_millis(DEFAULT_STEP_TIMEOUT_MS),
            compensation_timeout: Duration::from_millis(DEFAULT_COMPENSATION_TIMEOUT_MS),
        }
    }
}

/// Connection settings for the remote inventory service.
///
/// Reads from environment variables:
/// - `INVENTORY_SERVICE_URL`: base URL (default: `"http://localhost:8001"`)
/// - `INVENTORY_REQUEST_TIMEOUT_MS`: per-request timeout (default: `5000`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl InventoryClientConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("INVENTORY_SERVICE_URL")
                .unwrap_or_else(|_| DEFAULT_INVENTORY_URL.to_string()),
            request_timeout: env_millis(
                "INVENTORY_REQUEST_TIMEOUT_MS",
                DEFAULT_INVENTORY_TIMEOUT_MS,
            ),
        }
    }

    /// Creates a config for the given base URL with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

impl Default for InventoryClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INVENTORY_URL.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_INVENTORY_TIMEOUT_MS),
        }
    }
}
