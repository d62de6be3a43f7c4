//! Check handlers.
//!
//! Every handler runs on a worker pool thread and may block on remote I/O.
//! Handlers that keep state (caches, a persistent session) are memoized in
//! the dispatcher's [`HandlerSlots`](crate::slots::HandlerSlots); the rest
//! are cheap to build per call.

mod command;
mod disks;
mod job_queues;
mod jobs;
mod message_queue;
mod subsystems;
mod system;

pub use command::CommandHandler;
pub use disks::DiskHandler;
pub use job_queues::JobQueueHandler;
pub use jobs::JobHandler;
pub use message_queue::{MessageQueueHandler, MessageRead};
pub use subsystems::SubsystemHandler;
pub use system::{SystemHandler, POOL_FIELDS, SYSTEM_FIELDS};

use checkrelay_core::{Clock, Credentials, GatewayConfig, GatewayResult, SessionFactory, SessionGuard};
use std::sync::Arc;

/// Everything a handler needs to reach one tenant's remote system.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub credentials: Arc<Credentials>,
    pub sessions: Arc<SessionFactory>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<GatewayConfig>,
}

impl HandlerContext {
    pub fn open_session(&self) -> GatewayResult<SessionGuard> {
        self.sessions.open(&self.credentials)
    }
}
