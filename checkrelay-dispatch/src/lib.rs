//! checkrelay Dispatch - Tenant Dispatchers and Worker Pools
//!
//! Control flow for one check request:
//!
//! 1. [`DispatcherRegistry::resolve`] finds or creates the tenant's
//!    [`TenantDispatcher`].
//! 2. The dispatcher admits the request into its in-flight filter, keyed by
//!    the raw payload, rejecting an identical request that is still running.
//! 3. The request is queued on the job, disk or global pool. A full queue
//!    fails the request after the submission timeout.
//! 4. A pool thread runs the check through the tenant's memoized handlers,
//!    which consult the snapshot caches and the tailing engine.
//! 5. The pool's post-execution hook releases the fingerprint, then the
//!    response is delivered.
//!
//! All remote I/O happens on pool threads. The async surface only waits.

pub mod dispatcher;
pub mod handlers;
pub mod inflight;
pub mod pool;
pub mod reaper;
pub mod registry;
pub mod runner;
pub mod slots;

pub use dispatcher::TenantDispatcher;
pub use inflight::{Admission, InFlightFilter};
pub use pool::{AfterExecute, PoolSpec, WorkerPool};
pub use reaper::{reaper_task, ReaperMetrics, ReaperSnapshot};
pub use registry::DispatcherRegistry;
pub use runner::{execute, run, CheckOutcome};
pub use slots::{HandlerCategory, HandlerSlot, HandlerSlots};
