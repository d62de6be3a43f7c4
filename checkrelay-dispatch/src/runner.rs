//! Check execution on a worker thread.
//!
//! [`execute`] routes a request to its handler and returns either the
//! result records or an error. [`run`] wraps it into the response envelope
//! with the measured duration. Errors never escape a work item.

use crate::dispatcher::TenantDispatcher;
use crate::handlers::{JobQueueHandler, MessageQueueHandler};
use checkrelay_core::{
    CheckName, CheckRequest, CheckResponse, GatewayError, GatewayResult, Record, RequestError,
};
use std::time::Instant;
use tracing::{debug, warn};

/// Records of a successful check, and an optional message for the caller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CheckOutcome {
    pub records: Vec<Record>,
    pub message: Option<String>,
}

impl CheckOutcome {
    pub fn records(records: Vec<Record>) -> Self {
        Self {
            records,
            message: None,
        }
    }
}

impl From<CheckOutcome> for CheckResponse {
    fn from(outcome: CheckOutcome) -> Self {
        let mut response = CheckResponse::ok(outcome.records);
        response.message = outcome.message;
        response
    }
}

/// Run the check named by `request` against `dispatcher`'s handlers.
pub fn execute(dispatcher: &TenantDispatcher, request: &CheckRequest) -> GatewayResult<CheckOutcome> {
    let check = CheckName::parse(request.command()).ok_or_else(|| RequestError::UnknownCheck {
        name: request.command().to_string(),
    })?;

    match check {
        CheckName::ListJobs => dispatcher.job_handler()?.list_jobs().map(CheckOutcome::records),
        CheckName::ListDisks => dispatcher
            .disk_handler()?
            .list_disks(request.arg_str("diskName").as_deref())
            .map(CheckOutcome::records),
        CheckName::ListSubsystems => dispatcher
            .subsystem_handler()?
            .list_subsystems()
            .map(CheckOutcome::records),
        CheckName::GetSystem => dispatcher
            .system_handler()?
            .system_status()
            .map(CheckOutcome::records),
        CheckName::PageFault => dispatcher
            .system_handler()?
            .page_faults()
            .map(CheckOutcome::records),
        CheckName::ExecuteCommand => {
            let command = request
                .arg_str("cmdName")
                .ok_or_else(|| GatewayError::missing_field("cmdName"))?;
            dispatcher
                .command_handler()?
                .execute(&command)
                .map(CheckOutcome::records)
        }
        CheckName::GetJobQueues => {
            let queues = request.job_queue_refs("queues")?;
            JobQueueHandler::new(dispatcher.context())
                .job_queues(&queues)
                .map(CheckOutcome::records)
        }
        CheckName::GetErrorMessageQueue => {
            let query = MessageQueueHandler::query_from(request)?;
            let read = MessageQueueHandler::new(dispatcher.context()).read_all(&query)?;
            Ok(CheckOutcome {
                records: read.records,
                message: read.message,
            })
        }
        CheckName::GetNewMessageInMessageQueue => {
            let query = MessageQueueHandler::query_from(request)?;
            let read = MessageQueueHandler::new(dispatcher.context())
                .read_new(dispatcher.tailing(), &query)?;
            Ok(CheckOutcome {
                records: read.records,
                message: read.message,
            })
        }
    }
}

/// Execute and fold the outcome into a response stamped with its duration.
pub fn run(dispatcher: &TenantDispatcher, request: &CheckRequest) -> CheckResponse {
    let started = Instant::now();
    let response = match execute(dispatcher, request) {
        Ok(outcome) => {
            debug!(
                check = %request.command(),
                records = outcome.records.len(),
                "Check completed"
            );
            CheckResponse::from(outcome)
        }
        Err(e) => {
            warn!(
                host = %request.credentials().host(),
                check = %request.command(),
                kind = ?e.kind(),
                error = %e,
                "Check failed"
            );
            CheckResponse::from_error(&e)
        }
    };
    response.with_duration(started.elapsed())
}
