//! Remote session capability.
//!
//! The gateway never speaks the remote protocol itself. A [`RemoteClient`]
//! opens sessions, a [`RemoteSession`] runs named queries, and
//! [`SessionGuard`] guarantees every opened session is disconnected on every
//! exit path.

use crate::config::GatewayConfig;
use crate::credentials::Credentials;
use crate::error::{GatewayError, GatewayResult};
use crate::Record;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// QUERY NAMES
// ============================================================================

/// Names of the remote queries the handlers issue.
pub mod queries {
    pub const ACTIVE_JOBS: &str = "activeJobs";
    pub const DISK_UNITS: &str = "diskUnits";
    pub const SUBSYSTEMS: &str = "subsystems";
    pub const SYSTEM_STATUS: &str = "systemStatus";
    pub const SYSTEM_POOLS: &str = "systemPools";
    pub const JOB_QUEUE: &str = "jobQueue";
    pub const RUN_COMMAND: &str = "runCommand";
    /// Params: `path`. Result: one record `{length}`.
    pub const MESSAGE_QUEUE_LENGTH: &str = "messageQueueLength";
    /// Params: `path`, `offset`, `count`. Result: entries newest first.
    pub const MESSAGE_QUEUE_PAGE: &str = "messageQueuePage";
    /// Params: `path`. Result: every entry, oldest first.
    pub const MESSAGE_QUEUE_ALL: &str = "messageQueueAll";
}

// ============================================================================
// QUERIES AND RESULTS
// ============================================================================

/// Ordered result records of one remote query.
pub type RawResult = Vec<Record>;

/// A named remote query with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteQuery {
    pub name: String,
    pub params: Record,
}

impl RemoteQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Record::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(Value::as_u64)
    }
}

/// Decode raw records into typed values, reporting shape mismatches as
/// remote protocol errors.
pub fn decode_records<T: DeserializeOwned>(query: &str, raw: RawResult) -> GatewayResult<Vec<T>> {
    raw.into_iter()
        .map(|record| {
            let object: serde_json::Map<String, Value> = record.into_iter().collect();
            serde_json::from_value(Value::Object(object))
                .map_err(|e| GatewayError::protocol(query, e.to_string()))
        })
        .collect()
}

// ============================================================================
// SOCKET POLICY
// ============================================================================

/// Fixed socket and timeout policy applied to every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketPolicy {
    pub so_linger_secs: u32,
    pub keep_alive: bool,
    pub tcp_no_delay: bool,
    pub login_timeout: Duration,
    pub read_timeout: Duration,
}

impl SocketPolicy {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            so_linger_secs: config.so_linger_secs,
            keep_alive: false,
            tcp_no_delay: true,
            login_timeout: config.login_timeout,
            read_timeout: config.read_timeout,
        }
    }
}

impl Default for SocketPolicy {
    fn default() -> Self {
        Self::from_config(&GatewayConfig::default())
    }
}

// ============================================================================
// CAPABILITY TRAITS
// ============================================================================

/// An open session to one remote host. All calls block.
pub trait RemoteSession: Send {
    fn run_query(&mut self, query: &RemoteQuery) -> GatewayResult<RawResult>;

    fn disconnect(&mut self);
}

/// Opens sessions. Fails with an authentication or network error.
pub trait RemoteClient: Send + Sync {
    fn open(
        &self,
        credentials: &Credentials,
        policy: &SocketPolicy,
    ) -> GatewayResult<Box<dyn RemoteSession>>;
}

// ============================================================================
// SESSION GUARD
// ============================================================================

/// Owns an open session and disconnects it exactly once, on [`close`] or drop.
///
/// [`close`]: SessionGuard::close
pub struct SessionGuard {
    session: Option<Box<dyn RemoteSession>>,
    host: String,
}

impl SessionGuard {
    pub fn new(session: Box<dyn RemoteSession>, host: impl Into<String>) -> Self {
        Self {
            session: Some(session),
            host: host.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn run_query(&mut self, query: &RemoteQuery) -> GatewayResult<RawResult> {
        match self.session.as_mut() {
            Some(session) => session.run_query(query),
            None => Err(GatewayError::protocol(&query.name, "session already closed")),
        }
    }

    /// Run a query and decode every record into `T`.
    pub fn fetch<T: DeserializeOwned>(&mut self, query: &RemoteQuery) -> GatewayResult<Vec<T>> {
        let raw = self.run_query(query)?;
        decode_records(&query.name, raw)
    }

    pub fn close(mut self) {
        self.disconnect();
    }

    fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            debug!(host = %self.host, "Disconnecting remote session");
            session.disconnect();
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("host", &self.host)
            .field("open", &self.session.is_some())
            .finish()
    }
}

// ============================================================================
// SESSION FACTORY
// ============================================================================

/// Opens guarded sessions with one fixed socket policy.
#[derive(Clone)]
pub struct SessionFactory {
    client: Arc<dyn RemoteClient>,
    policy: SocketPolicy,
}

impl SessionFactory {
    pub fn new(client: Arc<dyn RemoteClient>, policy: SocketPolicy) -> Self {
        Self { client, policy }
    }

    pub fn open(&self, credentials: &Credentials) -> GatewayResult<SessionGuard> {
        debug!(
            host = %credentials.host(),
            login = %credentials.login(),
            "Opening remote session"
        );
        match self.client.open(credentials, &self.policy) {
            Ok(session) => Ok(SessionGuard::new(session, credentials.host())),
            Err(e) => {
                warn!(
                    host = %credentials.host(),
                    login = %credentials.login(),
                    error = %e,
                    "Failed to open remote session"
                );
                Err(e)
            }
        }
    }
}

impl fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFactory")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
