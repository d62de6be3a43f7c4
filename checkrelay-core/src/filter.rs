//! Severity/pattern filter applied to message queue reads.
//!
//! The filter is pure and order-preserving. It keeps an entry when its
//! severity falls in `[min, max)`, it is not acknowledged, and (when a
//! pattern is set) its whole identifier matches the pattern.

use crate::error::{GatewayError, GatewayResult};
use crate::message::{MessageQueueQuery, QueuedMessage};
use regex::Regex;

/// Severity band with an inclusive minimum and exclusive maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeverityBand {
    pub min: i32,
    pub max: i32,
}

impl SeverityBand {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, severity: i32) -> bool {
        self.min <= severity && severity < self.max
    }
}

impl Default for SeverityBand {
    /// Unbounded band.
    fn default() -> Self {
        Self {
            min: i32::MIN,
            max: i32::MAX,
        }
    }
}

/// Compiled filter for one message queue read.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    band: SeverityBand,
    id_pattern: Option<Regex>,
}

impl MessageFilter {
    /// Build a filter. The pattern must match the whole identifier.
    pub fn new(band: SeverityBand, id_pattern: Option<&str>) -> GatewayResult<Self> {
        let id_pattern = match id_pattern {
            Some(pattern) => Some(Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                GatewayError::invalid_argument("messageIdfilterPattern", e.to_string())
            })?),
            None => None,
        };
        Ok(Self { band, id_pattern })
    }

    pub fn for_query(query: &MessageQueueQuery) -> GatewayResult<Self> {
        Self::new(query.band, query.id_pattern.as_deref())
    }

    /// Whether `message` passes, given an acknowledgement predicate.
    pub fn accepts_with(
        &self,
        message: &QueuedMessage,
        is_acknowledged: impl Fn(&QueuedMessage) -> bool,
    ) -> bool {
        if !self.band.contains(message.severity) || is_acknowledged(message) {
            return false;
        }
        match (&self.id_pattern, message.id.as_deref()) {
            (None, _) => true,
            (Some(pattern), Some(id)) => pattern.is_match(id),
            (Some(_), None) => false,
        }
    }

    pub fn accepts(&self, message: &QueuedMessage) -> bool {
        self.accepts_with(message, QueuedMessage::is_acknowledged)
    }

    /// Keep the accepted entries, in input order.
    pub fn apply<'a, I>(&self, messages: I) -> Vec<&'a QueuedMessage>
    where
        I: IntoIterator<Item = &'a QueuedMessage>,
    {
        messages.into_iter().filter(|m| self.accepts(m)).collect()
    }
}
