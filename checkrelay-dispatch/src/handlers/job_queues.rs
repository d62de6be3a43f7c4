use super::HandlerContext;
use checkrelay_core::remote::queries;
use checkrelay_core::{GatewayError, GatewayResult, JobQueueRef, JobQueueStatus, Record, RemoteQuery};

/// Job queue status lookups. Every queue named by the caller must exist.
pub struct JobQueueHandler<'a> {
    ctx: &'a HandlerContext,
}

impl<'a> JobQueueHandler<'a> {
    pub fn new(ctx: &'a HandlerContext) -> Self {
        Self { ctx }
    }

    pub fn job_queues(&self, refs: &[JobQueueRef]) -> GatewayResult<Vec<Record>> {
        let mut session = self.ctx.open_session()?;
        let mut records = Vec::with_capacity(refs.len());
        for queue in refs {
            let query = RemoteQuery::new(queries::JOB_QUEUE)
                .with_param("name", queue.name.as_str())
                .with_param("library", queue.library.as_str());
            let status = session
                .fetch::<JobQueueStatus>(&query)?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    GatewayError::not_found(format!(
                        "JobQueue {} in library {}",
                        queue.name, queue.library
                    ))
                })?;
            records.push(status.to_record());
        }
        session.close();
        Ok(records)
    }
}
