use super::HandlerContext;
use checkrelay_cache::{CacheStats, QuerySnapshotSource, RefreshableCache};
use checkrelay_core::remote::queries;
use checkrelay_core::{ActiveJob, GatewayResult, Record, RemoteQuery};
use tracing::debug;

/// Active job listing served from a TTL cache.
pub struct JobHandler {
    cache: RefreshableCache<ActiveJob>,
}

impl JobHandler {
    pub fn new(ctx: &HandlerContext) -> Self {
        let source = QuerySnapshotSource::new(
            ctx.sessions.clone(),
            ctx.credentials.clone(),
            RemoteQuery::new(queries::ACTIVE_JOBS),
        );
        Self {
            cache: RefreshableCache::new(
                queries::ACTIVE_JOBS,
                ctx.config.cache_ttl,
                ctx.clock.clone(),
                source,
            ),
        }
    }

    pub fn list_jobs(&self) -> GatewayResult<Vec<Record>> {
        let read = self.cache.get_snapshot(false)?;
        let stats = self.cache.stats();
        debug!(
            count = read.value().len(),
            cache_hit = read.was_cache_hit(),
            refreshed_at = %read.refreshed_at(),
            hit_rate = stats.hit_rate(),
            "Listing active jobs"
        );
        Ok(read.value().iter().map(ActiveJob::to_record).collect())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
