//! Dispatcher registry.
//!
//! Maps each tenant to its [`TenantDispatcher`]. Lookup and creation happen
//! in one critical section, so concurrent first requests for a tenant build
//! exactly one dispatcher. Dispatchers idle past the configured timeout are
//! evicted and their pools shut down; message queue watermarks live in the
//! registry and survive eviction.

use crate::dispatcher::TenantDispatcher;
use checkrelay_cache::{TailingEngine, WatermarkStore};
use checkrelay_core::clock::elapsed_ms;
use checkrelay_core::{
    CheckRequest, CheckResponse, Clock, CredentialKey, Credentials, GatewayConfig, GatewayError,
    GatewayResult, RemoteClient, SessionFactory, SocketPolicy, Timestamp,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub struct DispatcherRegistry {
    config: Arc<GatewayConfig>,
    sessions: Arc<SessionFactory>,
    clock: Arc<dyn Clock>,
    tailing: Arc<TailingEngine>,
    dispatchers: Mutex<HashMap<CredentialKey, Arc<TenantDispatcher>>>,
}

impl DispatcherRegistry {
    pub fn new(
        config: GatewayConfig,
        client: Arc<dyn RemoteClient>,
        clock: Arc<dyn Clock>,
    ) -> GatewayResult<Self> {
        config.validate()?;
        let sessions = SessionFactory::new(client, SocketPolicy::from_config(&config));
        let tailing = TailingEngine::new(Arc::new(WatermarkStore::new()), config.message_page_size);
        Ok(Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            clock,
            tailing: Arc::new(tailing),
            dispatchers: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn tailing(&self) -> &Arc<TailingEngine> {
        &self.tailing
    }

    /// The tenant's dispatcher, created on first use. Marks it as used.
    pub fn resolve(&self, credentials: &Credentials) -> GatewayResult<Arc<TenantDispatcher>> {
        let key = credentials.key();
        let mut dispatchers = self.lock()?;

        if let Some(existing) = dispatchers.get(&key) {
            existing.touch();
            return Ok(Arc::clone(existing));
        }

        let dispatcher = Arc::new(TenantDispatcher::new(
            credentials.clone(),
            Arc::clone(&self.sessions),
            Arc::clone(&self.clock),
            Arc::clone(&self.config),
            Arc::clone(&self.tailing),
        )?);
        dispatchers.insert(key, Arc::clone(&dispatcher));
        info!(
            host = %credentials.host(),
            login = %credentials.login(),
            tenants = dispatchers.len(),
            "Registered tenant dispatcher"
        );
        Ok(dispatcher)
    }

    /// Resolve the tenant and dispatch. Every failure becomes an error response.
    pub async fn dispatch(&self, request: CheckRequest) -> CheckResponse {
        match self.resolve(request.credentials()) {
            Ok(dispatcher) => dispatcher.dispatch(request).await,
            Err(e) => {
                warn!(host = %request.credentials().host(), error = %e, "Failed to resolve tenant");
                CheckResponse::from_error(&e)
            }
        }
    }

    /// Decode a raw JSON request and dispatch it.
    pub async fn dispatch_json(&self, raw: impl Into<String>) -> CheckResponse {
        match CheckRequest::from_json(raw) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                debug!(error = %e, "Rejected malformed request");
                CheckResponse::from_error(&e)
            }
        }
    }

    /// Evict dispatchers unused for longer than the idle timeout and shut
    /// down their pools. Dispatchers with requests in flight are kept.
    pub fn evict_idle(&self, now: Timestamp) -> GatewayResult<usize> {
        let idle_ms = u64::try_from(self.config.tenant_idle_timeout.as_millis()).unwrap_or(u64::MAX);
        let evicted: Vec<Arc<TenantDispatcher>> = {
            let mut dispatchers = self.lock()?;
            let idle: Vec<CredentialKey> = dispatchers
                .iter()
                .filter(|(_, d)| d.in_flight() == 0 && elapsed_ms(d.last_used(), now) > idle_ms)
                .map(|(key, _)| key.clone())
                .collect();
            idle.iter().filter_map(|key| dispatchers.remove(key)).collect()
        };

        for dispatcher in &evicted {
            debug!(tenant = ?dispatcher.key(), "Evicting idle tenant dispatcher");
            dispatcher.shutdown();
        }
        Ok(evicted.len())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every dispatcher, stop its pools and wait for their threads.
    ///
    /// Queued work still runs first. Blocks; call it from a blocking context
    /// at process exit.
    pub fn shutdown(&self) -> GatewayResult<()> {
        let drained: Vec<Arc<TenantDispatcher>> = {
            let mut dispatchers = self.lock()?;
            dispatchers.drain().map(|(_, d)| d).collect()
        };
        for dispatcher in &drained {
            dispatcher.join();
        }
        info!(tenants = drained.len(), "Dispatcher registry shut down");
        Ok(())
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn lock(&self) -> GatewayResult<MutexGuard<'_, HashMap<CredentialKey, Arc<TenantDispatcher>>>> {
        self.dispatchers
            .lock()
            .map_err(|_| GatewayError::lock_poisoned("dispatcher registry"))
    }
}

impl std::fmt::Debug for DispatcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherRegistry")
            .field("tenants", &self.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
