//! Incremental message queue tailing.
//!
//! A poll reports the entries added to a queue since the previous poll
//! with the same [`WatermarkKey`]. The first poll for a key only records
//! the newest entry and reports nothing. Later polls read the queue newest
//! first, in fixed-size pages, and stop at the first entry that is either
//! the watermark itself (field-by-field) or older than it. Afterwards the
//! newest entry read becomes the watermark.

use crate::key::WatermarkKey;
use crate::watermark::WatermarkStore;
use checkrelay_core::remote::{decode_records, queries};
use checkrelay_core::{
    Credentials, GatewayError, GatewayResult, MessageQueueQuery, QueuedMessage, RemoteQuery,
    SessionFactory, SessionGuard,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Paged, newest-first access to one remote message queue.
pub trait MessageQueueReader {
    /// Number of entries currently in the queue.
    fn length(&mut self, path: &str) -> GatewayResult<usize>;

    /// Up to `count` entries starting `offset` entries back from the newest,
    /// newest first.
    fn page(&mut self, path: &str, offset: usize, count: usize) -> GatewayResult<Vec<QueuedMessage>>;
}

impl MessageQueueReader for SessionGuard {
    fn length(&mut self, path: &str) -> GatewayResult<usize> {
        let query = RemoteQuery::new(queries::MESSAGE_QUEUE_LENGTH).with_param("path", path);
        let rows = self.run_query(&query)?;
        rows.first()
            .and_then(|row| row.get("length"))
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .ok_or_else(|| GatewayError::protocol(&query.name, "missing length"))
    }

    fn page(&mut self, path: &str, offset: usize, count: usize) -> GatewayResult<Vec<QueuedMessage>> {
        let query = RemoteQuery::new(queries::MESSAGE_QUEUE_PAGE)
            .with_param("path", path)
            .with_param("offset", offset as u64)
            .with_param("count", count as u64);
        let rows = self.run_query(&query)?;
        decode_records(&query.name, rows)
    }
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// First poll for this key: the watermark was established, nothing is reported.
    Initialized,
    /// Entries newer than the watermark, newest first. May be empty.
    New(Vec<QueuedMessage>),
}

/// Watermark-based tail over any [`MessageQueueReader`].
#[derive(Debug, Clone)]
pub struct TailingEngine {
    store: Arc<WatermarkStore>,
    page_size: usize,
}

impl TailingEngine {
    pub fn new(store: Arc<WatermarkStore>, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    pub fn store(&self) -> &Arc<WatermarkStore> {
        &self.store
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Open a session, poll, and disconnect on every exit path.
    pub fn poll_remote(
        &self,
        sessions: &SessionFactory,
        credentials: &Credentials,
        query: &MessageQueueQuery,
    ) -> GatewayResult<PollOutcome> {
        let key = WatermarkKey::derive(credentials, query);
        let mut session = sessions.open(credentials)?;
        let outcome = self.poll_new(&key, &mut session, &query.path);
        session.close();
        outcome
    }

    /// Report entries added since the last poll with `key`.
    pub fn poll_new(
        &self,
        key: &WatermarkKey,
        reader: &mut dyn MessageQueueReader,
        path: &str,
    ) -> GatewayResult<PollOutcome> {
        let Some(watermark) = self.store.get(key) else {
            let newest = reader.page(path, 0, 1)?;
            match newest.into_iter().next() {
                Some(entry) => {
                    debug!(key = ?key, path, "Watermark established");
                    self.store.set(key.clone(), entry);
                }
                None => debug!(key = ?key, path, "Queue empty, watermark deferred"),
            }
            return Ok(PollOutcome::Initialized);
        };

        let length = reader.length(path)?;
        let mut fresh = Vec::new();
        let mut newest: Option<QueuedMessage> = None;
        let mut offset = 0;

        'scan: while offset < length {
            let page = reader.page(path, offset, self.page_size)?;
            if page.is_empty() {
                break;
            }
            offset += page.len();
            for entry in page {
                if newest.is_none() {
                    newest = Some(entry.clone());
                }
                if entry.is_same_entry(&watermark) || entry.date < watermark.date {
                    break 'scan;
                }
                fresh.push(entry);
            }
        }

        debug!(key = ?key, path, new_entries = fresh.len(), scanned_to = offset, "Queue scanned");
        if let Some(newest) = newest {
            self.store.set(key.clone(), newest);
        }
        Ok(PollOutcome::New(fresh))
    }
}
