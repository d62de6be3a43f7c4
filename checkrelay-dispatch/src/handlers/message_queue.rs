//! Live and tailed message queue reads.

use super::HandlerContext;
use checkrelay_cache::{PollOutcome, TailingEngine};
use checkrelay_core::constants::TAIL_INITIALIZED_MESSAGE;
use checkrelay_core::remote::queries;
use checkrelay_core::{
    CheckRequest, GatewayError, GatewayResult, MessageFilter, MessageQueueQuery, QueuedMessage,
    Record, RemoteQuery, SeverityBand,
};
use tracing::debug;

/// Result of a message queue check: records, plus a message when the read
/// only established a watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRead {
    pub records: Vec<Record>,
    pub message: Option<String>,
}

pub struct MessageQueueHandler<'a> {
    ctx: &'a HandlerContext,
}

impl<'a> MessageQueueHandler<'a> {
    pub fn new(ctx: &'a HandlerContext) -> Self {
        Self { ctx }
    }

    /// Decode the query shape from request arguments.
    ///
    /// `messageQueuePath` is required. Severity bounds default to the full
    /// `i32` range when absent or unparsable.
    pub fn query_from(request: &CheckRequest) -> GatewayResult<MessageQueueQuery> {
        let path = request
            .arg_str("messageQueuePath")
            .ok_or_else(|| GatewayError::missing_field("messageQueuePath"))?;
        let band = SeverityBand::new(
            request.arg_i32_or("minSeverityLevel", i32::MIN),
            request.arg_i32_or("maxSeverityLevel", i32::MAX),
        );
        let mut query = MessageQueueQuery::new(path).with_band(band);
        if let Some(pattern) = request.arg_str("messageIdfilterPattern") {
            query = query.with_id_pattern(pattern);
        }
        Ok(query)
    }

    /// Every entry currently in the queue that passes the filter, oldest first.
    pub fn read_all(&self, query: &MessageQueueQuery) -> GatewayResult<MessageRead> {
        let filter = MessageFilter::for_query(query)?;
        let mut session = self.ctx.open_session()?;
        let entries: Vec<QueuedMessage> = session.fetch(
            &RemoteQuery::new(queries::MESSAGE_QUEUE_ALL).with_param("path", query.path.as_str()),
        )?;
        session.close();

        let records = filter
            .apply(&entries)
            .into_iter()
            .map(QueuedMessage::to_record)
            .collect();
        Ok(MessageRead {
            records,
            message: None,
        })
    }

    /// Entries added since the previous read with the same shape, newest first.
    pub fn read_new(
        &self,
        engine: &TailingEngine,
        query: &MessageQueueQuery,
    ) -> GatewayResult<MessageRead> {
        let filter = MessageFilter::for_query(query)?;
        match engine.poll_remote(&self.ctx.sessions, &self.ctx.credentials, query)? {
            PollOutcome::Initialized => {
                debug!(path = %query.path, "Message queue tail initialized");
                Ok(MessageRead {
                    records: Vec::new(),
                    message: Some(TAIL_INITIALIZED_MESSAGE.to_string()),
                })
            }
            PollOutcome::New(entries) => {
                debug!(path = %query.path, new = entries.len(), "Message queue tail polled");
                let records = filter
                    .apply(&entries)
                    .into_iter()
                    .map(QueuedMessage::to_record)
                    .collect();
                Ok(MessageRead {
                    records,
                    message: None,
                })
            }
        }
    }
}
