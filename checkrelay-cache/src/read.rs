//! Cache read results and usage counters.

use checkrelay_core::Timestamp;

/// Result of a cache read, carrying when the value was fetched.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    /// When the value was fetched from the remote system.
    refreshed_at: Timestamp,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// A read served from the cached snapshot.
    pub fn from_cache(value: T, refreshed_at: Timestamp) -> Self {
        Self {
            value,
            refreshed_at,
            was_cache_hit: true,
        }
    }

    /// A read that triggered a fetch.
    pub fn from_source(value: T, refreshed_at: Timestamp) -> Self {
        Self {
            value,
            refreshed_at,
            was_cache_hit: false,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn refreshed_at(&self) -> Timestamp {
        self.refreshed_at
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered without contacting the remote system (including replayed failures).
    pub hits: u64,
    /// Reads that attempted a fetch.
    pub misses: u64,
    /// Fetches that failed.
    pub refresh_failures: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < 0.001);
        assert!((CacheStats::default().hit_rate() - 0.0).abs() < 0.001);
    }
}
