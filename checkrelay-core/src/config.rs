//! Gateway Configuration Module
//!
//! Tunables for caching, worker pools, remote sessions and tenant
//! lifecycle. Loaded from environment variables with the defaults in
//! [`crate::constants`].

use crate::constants::*;
use crate::error::ConfigError;
use std::time::Duration;

// ============================================================================
// GATEWAY CONFIGURATION
// ============================================================================

/// Runtime configuration shared by every tenant dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    // ========================================================================
    // Caching
    // ========================================================================
    /// How long a job or disk snapshot (or a remembered refresh failure) is served.
    pub cache_ttl: Duration,

    /// Message queue entries fetched per page while tailing.
    pub message_page_size: usize,

    // ========================================================================
    // Worker pools
    // ========================================================================
    /// Workers in the global pool.
    pub global_pool_size: usize,

    /// Workers in the job-listing pool.
    pub job_pool_size: usize,

    /// Workers in the disk-listing pool.
    pub disk_pool_size: usize,

    /// Bounded queue capacity per pool.
    pub queue_capacity: usize,

    /// How long a submission waits for queue space before failing.
    pub submission_timeout: Duration,

    // ========================================================================
    // Remote sessions
    // ========================================================================
    pub login_timeout: Duration,

    pub read_timeout: Duration,

    pub so_linger_secs: u32,

    // ========================================================================
    // Tenant lifecycle
    // ========================================================================
    /// Idle time after which a tenant dispatcher is eligible for eviction.
    pub tenant_idle_timeout: Duration,

    /// Interval between idle-tenant sweeps.
    pub reaper_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            message_page_size: DEFAULT_MESSAGE_PAGE_SIZE,
            global_pool_size: DEFAULT_GLOBAL_POOL_SIZE,
            job_pool_size: DEFAULT_JOB_POOL_SIZE,
            disk_pool_size: DEFAULT_DISK_POOL_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            submission_timeout: Duration::from_millis(DEFAULT_SUBMISSION_TIMEOUT_MS),
            login_timeout: Duration::from_millis(DEFAULT_LOGIN_TIMEOUT_MS),
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            so_linger_secs: DEFAULT_SO_LINGER_SECS,
            tenant_idle_timeout: Duration::from_millis(DEFAULT_TENANT_IDLE_TIMEOUT_MS),
            reaper_interval: Duration::from_millis(DEFAULT_REAPER_INTERVAL_MS),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_or(name, default_ms))
}

impl GatewayConfig {
    /// Create GatewayConfig from environment variables.
    ///
    /// Environment variables (all optional, unparsable values fall back to the default):
    /// - `CHECKRELAY_CACHE_TTL_MS` (default: 60000)
    /// - `CHECKRELAY_MESSAGE_PAGE_SIZE` (default: 50)
    /// - `CHECKRELAY_GLOBAL_POOL_SIZE` (default: 5)
    /// - `CHECKRELAY_JOB_POOL_SIZE` (default: 1)
    /// - `CHECKRELAY_DISK_POOL_SIZE` (default: 1)
    /// - `CHECKRELAY_QUEUE_CAPACITY` (default: 64)
    /// - `CHECKRELAY_WORKER_QUEUE_TIMEOUT_MS` (default: 360000)
    /// - `CHECKRELAY_LOGIN_TIMEOUT_MS` (default: 10000)
    /// - `CHECKRELAY_READ_TIMEOUT_MS` (default: 300000)
    /// - `CHECKRELAY_SO_LINGER_SECS` (default: 1)
    /// - `CHECKRELAY_TENANT_IDLE_TIMEOUT_MS` (default: 7200000)
    /// - `CHECKRELAY_REAPER_INTERVAL_MS` (default: 60000)
    pub fn from_env() -> Self {
        Self {
            cache_ttl: env_millis("CHECKRELAY_CACHE_TTL_MS", DEFAULT_CACHE_TTL_MS),
            message_page_size: env_or("CHECKRELAY_MESSAGE_PAGE_SIZE", DEFAULT_MESSAGE_PAGE_SIZE),
            global_pool_size: env_or("CHECKRELAY_GLOBAL_POOL_SIZE", DEFAULT_GLOBAL_POOL_SIZE),
            job_pool_size: env_or("CHECKRELAY_JOB_POOL_SIZE", DEFAULT_JOB_POOL_SIZE),
            disk_pool_size: env_or("CHECKRELAY_DISK_POOL_SIZE", DEFAULT_DISK_POOL_SIZE),
            queue_capacity: env_or("CHECKRELAY_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY),
            submission_timeout: env_millis(
                "CHECKRELAY_WORKER_QUEUE_TIMEOUT_MS",
                DEFAULT_SUBMISSION_TIMEOUT_MS,
            ),
            login_timeout: env_millis("CHECKRELAY_LOGIN_TIMEOUT_MS", DEFAULT_LOGIN_TIMEOUT_MS),
            read_timeout: env_millis("CHECKRELAY_READ_TIMEOUT_MS", DEFAULT_READ_TIMEOUT_MS),
            so_linger_secs: env_or("CHECKRELAY_SO_LINGER_SECS", DEFAULT_SO_LINGER_SECS),
            tenant_idle_timeout: env_millis(
                "CHECKRELAY_TENANT_IDLE_TIMEOUT_MS",
                DEFAULT_TENANT_IDLE_TIMEOUT_MS,
            ),
            reaper_interval: env_millis("CHECKRELAY_REAPER_INTERVAL_MS", DEFAULT_REAPER_INTERVAL_MS),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_message_page_size(mut self, size: usize) -> Self {
        self.message_page_size = size;
        self
    }

    /// Set the worker counts of the global, job and disk pools.
    pub fn with_pool_sizes(mut self, global: usize, jobs: usize, disks: usize) -> Self {
        self.global_pool_size = global;
        self.job_pool_size = jobs;
        self.disk_pool_size = disks;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_submission_timeout(mut self, timeout: Duration) -> Self {
        self.submission_timeout = timeout;
        self
    }

    pub fn with_tenant_idle_timeout(mut self, timeout: Duration) -> Self {
        self.tenant_idle_timeout = timeout;
        self
    }

    pub fn with_reaper_interval(mut self, interval: Duration) -> Self {
        self.reaper_interval = interval;
        self
    }

    /// Reject configurations the pools or the tailing engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.global_pool_size == 0 || self.global_pool_size > MAX_GLOBAL_POOL_SIZE {
            return Err(invalid(
                "global_pool_size",
                self.global_pool_size,
                "must be between 1 and 10",
            ));
        }
        for (field, value) in [
            ("job_pool_size", self.job_pool_size),
            ("disk_pool_size", self.disk_pool_size),
            ("queue_capacity", self.queue_capacity),
            ("message_page_size", self.message_page_size),
        ] {
            if value == 0 {
                return Err(invalid(field, value, "must be at least 1"));
            }
        }
        if self.reaper_interval.is_zero() {
            return Err(invalid("reaper_interval", 0, "must be non-zero"));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.submission_timeout, Duration::from_secs(360));
        assert_eq!(config.global_pool_size, 5);
        assert_eq!(config.job_pool_size, 1);
        assert_eq!(config.disk_pool_size, 1);
        assert_eq!(config.message_page_size, 50);
        assert_eq!(config.login_timeout, Duration::from_secs(10));
        assert_eq!(config.read_timeout, Duration::from_secs(300));
        assert_eq!(config.so_linger_secs, 1);
        assert_eq!(config.tenant_idle_timeout, Duration::from_secs(7200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_setters() {
        let config = GatewayConfig::default()
            .with_cache_ttl(Duration::from_millis(10))
            .with_pool_sizes(2, 1, 1)
            .with_queue_capacity(3)
            .with_submission_timeout(Duration::from_millis(50));
        assert_eq!(config.cache_ttl, Duration::from_millis(10));
        assert_eq!(config.global_pool_size, 2);
        assert_eq!(config.queue_capacity, 3);
        assert_eq!(config.submission_timeout, Duration::from_millis(50));
    }

    #[test]
    fn test_validate_rejects_oversized_global_pool() {
        let config = GatewayConfig::default().with_pool_sizes(11, 1, 1);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "global_pool_size"));
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let config = GatewayConfig::default().with_message_page_size(0);
        assert!(config.validate().is_err());
    }
}
