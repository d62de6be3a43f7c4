//! Constants for checkrelay
//!
//! Default values for every tunable, plus fixed protocol strings.

// ============================================================================
// CACHING
// ============================================================================

/// Default time-to-live of the job and disk snapshot caches (60 seconds).
pub const DEFAULT_CACHE_TTL_MS: u64 = 60_000;

/// Default number of message queue entries requested per page while tailing.
pub const DEFAULT_MESSAGE_PAGE_SIZE: usize = 50;

// ============================================================================
// WORKER POOLS
// ============================================================================

/// Default worker count of the global pool.
pub const DEFAULT_GLOBAL_POOL_SIZE: usize = 5;

/// Upper bound accepted for the global pool.
pub const MAX_GLOBAL_POOL_SIZE: usize = 10;

/// Default worker count of the dedicated job-listing pool.
pub const DEFAULT_JOB_POOL_SIZE: usize = 1;

/// Default worker count of the dedicated disk-listing pool.
pub const DEFAULT_DISK_POOL_SIZE: usize = 1;

/// Default bounded queue capacity of every pool.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default time a submission may wait for queue space (6 minutes).
pub const DEFAULT_SUBMISSION_TIMEOUT_MS: u64 = 360_000;

// ============================================================================
// REMOTE SESSIONS
// ============================================================================

/// Default login timeout (10 seconds).
pub const DEFAULT_LOGIN_TIMEOUT_MS: u64 = 10_000;

/// Default socket read timeout (5 minutes).
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 300_000;

/// Default socket linger in seconds.
pub const DEFAULT_SO_LINGER_SECS: u32 = 1;

// ============================================================================
// TENANT LIFECYCLE
// ============================================================================

/// Default idle time after which a tenant dispatcher may be evicted (2 hours).
pub const DEFAULT_TENANT_IDLE_TIMEOUT_MS: u64 = 7_200_000;

/// Default interval between idle-tenant sweeps (1 minute).
pub const DEFAULT_REAPER_INTERVAL_MS: u64 = 60_000;

// ============================================================================
// PROTOCOL
// ============================================================================

/// Reply status marking a message queue entry as already answered.
pub const ACKNOWLEDGED_REPLY_STATUS: &str = "A";

/// Message returned by the first tailing poll of a queue.
pub const TAIL_INITIALIZED_MESSAGE: &str = "Initialisation of the local DB";
