//! Watermark store: the last observed entry per tailed query.

use crate::key::WatermarkKey;
use checkrelay_core::QueuedMessage;
use dashmap::DashMap;

/// Concurrent map from [`WatermarkKey`] to the newest entry seen for it.
#[derive(Debug, Default)]
pub struct WatermarkStore {
    entries: DashMap<WatermarkKey, QueuedMessage>,
}

impl WatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &WatermarkKey) -> Option<QueuedMessage> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Store `entry` as the watermark for `key`, returning the previous one.
    pub fn set(&self, key: WatermarkKey, entry: QueuedMessage) -> Option<QueuedMessage> {
        self.entries.insert(key, entry)
    }

    pub fn remove(&self, key: &WatermarkKey) -> Option<QueuedMessage> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
