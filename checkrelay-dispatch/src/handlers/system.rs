use super::HandlerContext;
use checkrelay_core::records::project;
use checkrelay_core::remote::queries;
use checkrelay_core::{GatewayError, GatewayResult, RawResult, Record, RemoteQuery, SessionGuard};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Fields of the `getSystem` record.
pub const SYSTEM_FIELDS: &[&str] = &[
    "percentProcessingUnitUsed",
    "percentSystemASPUsed",
    "maxJobInSystem",
    "jobInSystem",
    "activeJobInSystem",
    "activeThreadInSystem",
    "batchJobsEndedWithPrinterOutputWaitingToPrint",
    "batchJobEnding",
    "batchJobHeldInJobQueue",
    "batchJobHeldWhileRunning",
    "batchJobOnHeldJobQueue",
    "batchJobOnUnassignedJobQueue",
    "batchJobRunning",
    "batchJobWaitingForMessage",
    "batchJobWaitingToRunOrAlreadyScheduled",
];

/// Fields of each `pageFault` record.
pub const POOL_FIELDS: &[&str] = &[
    "id",
    "name",
    "dbPageFault",
    "dbPage",
    "nonDbPageFault",
    "nonDbPage",
];

/// System status and memory pool checks over one persistent session.
///
/// The session is opened when the handler is built. A query that fails
/// with a connection loss reopens the session and is retried once.
pub struct SystemHandler {
    ctx: HandlerContext,
    session: Mutex<SessionGuard>,
}

impl SystemHandler {
    pub fn new(ctx: &HandlerContext) -> GatewayResult<Self> {
        let session = ctx.open_session()?;
        Ok(Self {
            ctx: ctx.clone(),
            session: Mutex::new(session),
        })
    }

    pub fn system_status(&self) -> GatewayResult<Vec<Record>> {
        let rows = self.query(&RemoteQuery::new(queries::SYSTEM_STATUS))?;
        let status = rows
            .first()
            .ok_or_else(|| GatewayError::protocol(queries::SYSTEM_STATUS, "empty result"))?;
        Ok(vec![project(status, SYSTEM_FIELDS)])
    }

    pub fn page_faults(&self) -> GatewayResult<Vec<Record>> {
        let rows = self.query(&RemoteQuery::new(queries::SYSTEM_POOLS))?;
        Ok(rows.iter().map(|pool| project(pool, POOL_FIELDS)).collect())
    }

    fn query(&self, query: &RemoteQuery) -> GatewayResult<RawResult> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| GatewayError::lock_poisoned("system session"))?;

        match session.run_query(query) {
            Err(e) if e.is_connection_loss() => {
                warn!(host = %session.host(), query = %query.name, error = %e, "System session lost, reconnecting");
                *session = self.ctx.open_session()?;
                debug!(host = %session.host(), "System session reopened");
                session.run_query(query)
            }
            other => other,
        }
    }
}
