//! Per-tenant dispatcher.
//!
//! A [`TenantDispatcher`] owns everything that serves one credential
//! tuple: three worker pools, the in-flight filter, and the memoized
//! handlers. Admission into the in-flight filter happens before a request
//! is queued; the pools' post-execution hook releases it.

use crate::handlers::{
    CommandHandler, DiskHandler, HandlerContext, JobHandler, SubsystemHandler, SystemHandler,
};
use crate::inflight::InFlightFilter;
use crate::pool::{AfterExecute, PoolSpec, WorkerPool};
use crate::runner;
use crate::slots::{HandlerCategory, HandlerSlots};
use checkrelay_cache::TailingEngine;
use checkrelay_core::{
    CheckRequest, CheckResponse, Clock, CredentialKey, Credentials, DispatchError, GatewayConfig,
    GatewayError, GatewayResult, PoolKind, SessionFactory, Timestamp,
};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, warn};

pub struct TenantDispatcher {
    key: CredentialKey,
    ctx: HandlerContext,
    global: WorkerPool<CheckResponse>,
    jobs: WorkerPool<CheckResponse>,
    disks: WorkerPool<CheckResponse>,
    in_flight: Arc<InFlightFilter>,
    slots: HandlerSlots,
    tailing: Arc<TailingEngine>,
    last_used: Mutex<Timestamp>,
}

impl TenantDispatcher {
    /// Build a dispatcher and start its worker pools.
    pub fn new(
        credentials: Credentials,
        sessions: Arc<SessionFactory>,
        clock: Arc<dyn Clock>,
        config: Arc<GatewayConfig>,
        tailing: Arc<TailingEngine>,
    ) -> GatewayResult<Self> {
        let in_flight = Arc::new(InFlightFilter::new(Arc::clone(&clock)));
        let filter = Arc::clone(&in_flight);
        let release: AfterExecute = Arc::new(move |fingerprint: &str| {
            filter.finish(fingerprint);
        });

        let spec = |kind: PoolKind, workers: usize| PoolSpec {
            host: credentials.host().to_string(),
            kind,
            workers,
            capacity: config.queue_capacity,
            submission_timeout: config.submission_timeout,
        };
        let global = WorkerPool::start(
            spec(PoolKind::Global, config.global_pool_size),
            Arc::clone(&release),
        )?;
        let jobs = WorkerPool::start(spec(PoolKind::Jobs, config.job_pool_size), Arc::clone(&release))?;
        let disks = WorkerPool::start(spec(PoolKind::Disks, config.disk_pool_size), release)?;

        debug!(
            host = %credentials.host(),
            login = %credentials.login(),
            global = config.global_pool_size,
            "Tenant dispatcher created"
        );

        let now = clock.now();
        Ok(Self {
            key: credentials.key(),
            ctx: HandlerContext {
                credentials: Arc::new(credentials),
                sessions,
                clock,
                config,
            },
            global,
            jobs,
            disks,
            in_flight,
            slots: HandlerSlots::new(),
            tailing,
            last_used: Mutex::new(now),
        })
    }

    pub fn key(&self) -> &CredentialKey {
        &self.key
    }

    pub fn credentials(&self) -> &Credentials {
        &self.ctx.credentials
    }

    pub fn context(&self) -> &HandlerContext {
        &self.ctx
    }

    pub fn tailing(&self) -> &TailingEngine {
        &self.tailing
    }

    pub fn pool(&self, kind: PoolKind) -> &WorkerPool<CheckResponse> {
        match kind {
            PoolKind::Global => &self.global,
            PoolKind::Jobs => &self.jobs,
            PoolKind::Disks => &self.disks,
        }
    }

    /// Admit the request and queue it on its pool.
    ///
    /// Fails without queueing when an identical request is in flight or the
    /// pool stays full for the submission timeout.
    pub async fn submit(
        self: &Arc<Self>,
        request: CheckRequest,
    ) -> GatewayResult<oneshot::Receiver<CheckResponse>> {
        self.touch();
        let admission = self.in_flight.admit(request.fingerprint())?;

        let pool = self.pool(PoolKind::for_command(request.command()));
        let fingerprint = admission.fingerprint().to_string();
        let dispatcher = Arc::clone(self);
        let job = move || runner::run(&dispatcher, &request);

        // Until the item is queued, dropping the admission releases the
        // fingerprint. Once queued, the pool hook releases it.
        let reply = pool.submit(fingerprint, job).await?;
        admission.hand_off();
        Ok(reply)
    }

    /// Submit and wait for the response. Every failure becomes an error response.
    pub async fn dispatch(self: &Arc<Self>, request: CheckRequest) -> CheckResponse {
        let started = Instant::now();
        let kind = PoolKind::for_command(request.command());
        let check = request.command().to_string();

        let outcome = match self.submit(request).await {
            Ok(reply) => reply.await.map_err(|_| {
                GatewayError::from(DispatchError::WorkerLost {
                    pool: self.pool(kind).name().to_string(),
                })
            }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(response) => response,
            Err(e) => {
                let pool = self.pool(kind);
                warn!(
                    host = %self.credentials().host(),
                    check = %check,
                    pool = %pool.name(),
                    active = pool.active(),
                    queued = pool.queued(),
                    kind = ?e.kind(),
                    error = %e,
                    "Request rejected"
                );
                CheckResponse::from_error(&e).with_duration(started.elapsed())
            }
        }
    }

    // === Handlers ===

    pub fn job_handler(&self) -> GatewayResult<Arc<JobHandler>> {
        self.slots.jobs.get_or_try_init(|| Ok(JobHandler::new(&self.ctx)))
    }

    pub fn disk_handler(&self) -> GatewayResult<Arc<DiskHandler>> {
        self.slots.disks.get_or_try_init(|| Ok(DiskHandler::new(&self.ctx)))
    }

    /// Opens the persistent system session on first use.
    pub fn system_handler(&self) -> GatewayResult<Arc<SystemHandler>> {
        self.slots.system.get_or_try_init(|| SystemHandler::new(&self.ctx))
    }

    pub fn subsystem_handler(&self) -> GatewayResult<Arc<SubsystemHandler>> {
        self.slots
            .subsystems
            .get_or_try_init(|| Ok(SubsystemHandler::new(&self.ctx)))
    }

    pub fn command_handler(&self) -> GatewayResult<Arc<CommandHandler>> {
        self.slots
            .commands
            .get_or_try_init(|| Ok(CommandHandler::new(&self.ctx)))
    }

    pub fn initialized_handlers(&self) -> Vec<HandlerCategory> {
        self.slots.initialized()
    }

    // === Lifecycle ===

    pub fn touch(&self) {
        let now = self.ctx.clock.now();
        if let Ok(mut last_used) = self.last_used.lock() {
            *last_used = now;
        }
    }

    pub fn last_used(&self) -> Timestamp {
        match self.last_used.lock() {
            Ok(last_used) => *last_used,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Requests admitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Stop all pools and drop the memoized handlers. Queued work still runs.
    pub fn shutdown(&self) {
        self.global.shutdown();
        self.jobs.shutdown();
        self.disks.shutdown();
        self.slots.clear();
        debug!(host = %self.credentials().host(), "Tenant dispatcher shut down");
    }

    /// Shut down and block until every worker thread has exited.
    pub fn join(&self) {
        self.shutdown();
        self.global.join();
        self.jobs.join();
        self.disks.join();
    }

    pub fn is_shut_down(&self) -> bool {
        self.global.is_shut_down() && self.jobs.is_shut_down() && self.disks.is_shut_down()
    }
}

impl std::fmt::Debug for TenantDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantDispatcher")
            .field("key", &self.key)
            .field("in_flight", &self.in_flight.len())
            .field("last_used", &self.last_used())
            .finish_non_exhaustive()
    }
}
