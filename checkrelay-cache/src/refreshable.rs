//! TTL snapshot cache with sticky failure.
//!
//! The cache is always in exactly one of three states: never refreshed,
//! holding a snapshot, or holding the failure of the last refresh. Within
//! the TTL window after a refresh, reads are answered from that state
//! without contacting the remote system, even when the state is a failure.
//! Every refresh attempt, successful or not, restarts the window.
//!
//! State transitions happen under one mutex, and the lock is held across
//! the fetch, so concurrent readers of a cold cache trigger one fetch.

use crate::read::{CacheRead, CacheStats};
use checkrelay_core::{
    Clock, Credentials, GatewayError, GatewayResult, RemoteQuery, SessionFactory, Timestamp,
};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// SNAPSHOT SOURCES
// ============================================================================

/// Produces a complete, in-memory collection on demand.
pub trait SnapshotSource<T>: Send + Sync {
    fn fetch(&self) -> GatewayResult<Vec<T>>;
}

impl<T, F> SnapshotSource<T> for F
where
    F: Fn() -> GatewayResult<Vec<T>> + Send + Sync,
{
    fn fetch(&self) -> GatewayResult<Vec<T>> {
        self()
    }
}

/// Fetches a collection with one remote query on a fresh session.
///
/// The session is opened per fetch and disconnected on every exit path.
pub struct QuerySnapshotSource<T> {
    sessions: Arc<SessionFactory>,
    credentials: Arc<Credentials>,
    query: RemoteQuery,
    _item: PhantomData<fn() -> T>,
}

impl<T> QuerySnapshotSource<T> {
    pub fn new(
        sessions: Arc<SessionFactory>,
        credentials: Arc<Credentials>,
        query: RemoteQuery,
    ) -> Self {
        Self {
            sessions,
            credentials,
            query,
            _item: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> SnapshotSource<T> for QuerySnapshotSource<T> {
    fn fetch(&self) -> GatewayResult<Vec<T>> {
        let mut session = self.sessions.open(&self.credentials)?;
        let items = session.fetch(&self.query)?;
        session.close();
        Ok(items)
    }
}

// ============================================================================
// CACHE
// ============================================================================

enum CacheState<T> {
    Empty,
    Ready {
        snapshot: Arc<Vec<T>>,
        refreshed_at: Timestamp,
    },
    Failed {
        failure: GatewayError,
        refreshed_at: Timestamp,
    },
}

/// A TTL cache over one remote collection.
pub struct RefreshableCache<T> {
    name: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    source: Box<dyn SnapshotSource<T>>,
    state: Mutex<CacheState<T>>,
    hits: AtomicU64,
    misses: AtomicU64,
    refresh_failures: AtomicU64,
}

impl<T> RefreshableCache<T> {
    pub fn new(
        name: impl Into<String>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
        source: impl SnapshotSource<T> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            ttl,
            clock,
            source: Box::new(source),
            state: Mutex::new(CacheState::Empty),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the current snapshot, refreshing it when the TTL has elapsed
    /// or `force_refresh` is set.
    ///
    /// Inside the TTL window a remembered failure is returned again, unchanged.
    pub fn get_snapshot(&self, force_refresh: bool) -> GatewayResult<CacheRead<Arc<Vec<T>>>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| GatewayError::lock_poisoned(format!("{} cache", self.name)))?;

        if !force_refresh {
            let now = self.clock.now();
            match &*state {
                CacheState::Ready {
                    snapshot,
                    refreshed_at,
                } if self.within_ttl(*refreshed_at, now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(CacheRead::from_cache(Arc::clone(snapshot), *refreshed_at));
                }
                CacheState::Failed {
                    failure,
                    refreshed_at,
                } if self.within_ttl(*refreshed_at, now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = %self.name, error = %failure, "Replaying remembered refresh failure");
                    return Err(failure.clone());
                }
                _ => {}
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let fetched = self.source.fetch();
        let refreshed_at = self.clock.now();

        match fetched {
            Ok(items) => {
                debug!(cache = %self.name, count = items.len(), force_refresh, "Snapshot refreshed");
                let snapshot = Arc::new(items);
                *state = CacheState::Ready {
                    snapshot: Arc::clone(&snapshot),
                    refreshed_at,
                };
                Ok(CacheRead::from_source(snapshot, refreshed_at))
            }
            Err(cause) => {
                self.refresh_failures.fetch_add(1, Ordering::Relaxed);
                warn!(cache = %self.name, error = %cause, "Snapshot refresh failed");
                let failure = GatewayError::RefreshFailed {
                    cache: self.name.clone(),
                    cause: Box::new(cause),
                };
                *state = CacheState::Failed {
                    failure: failure.clone(),
                    refreshed_at,
                };
                Err(failure)
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
        }
    }

    fn within_ttl(&self, refreshed_at: Timestamp, now: Timestamp) -> bool {
        match (now - refreshed_at).to_std() {
            Ok(age) => age < self.ttl,
            // Clock moved backwards.
            Err(_) => true,
        }
    }
}
