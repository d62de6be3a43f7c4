//! Time source abstraction.
//!
//! Cache TTLs, in-flight ages and tenant idleness are all measured against
//! an injected [`Clock`] so tests can move time explicitly.

use crate::Timestamp;
use chrono::Utc;
use std::fmt;

/// Source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Milliseconds elapsed from `since` to `now`, clamped at zero.
pub fn elapsed_ms(since: Timestamp, now: Timestamp) -> u64 {
    (now - since).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_elapsed_ms_clamps_negative() {
        let now = Utc::now();
        assert_eq!(elapsed_ms(now + Duration::seconds(5), now), 0);
        assert_eq!(elapsed_ms(now - Duration::milliseconds(250), now), 250);
    }
}
