use super::HandlerContext;
use checkrelay_cache::{CacheStats, QuerySnapshotSource, RefreshableCache};
use checkrelay_core::remote::queries;
use checkrelay_core::{DiskUnit, GatewayError, GatewayResult, Record, RemoteQuery};
use tracing::debug;

/// Disk unit listing served from a TTL cache.
pub struct DiskHandler {
    cache: RefreshableCache<DiskUnit>,
}

impl DiskHandler {
    pub fn new(ctx: &HandlerContext) -> Self {
        let source = QuerySnapshotSource::new(
            ctx.sessions.clone(),
            ctx.credentials.clone(),
            RemoteQuery::new(queries::DISK_UNITS),
        );
        Self {
            cache: RefreshableCache::new(
                queries::DISK_UNITS,
                ctx.config.cache_ttl,
                ctx.clock.clone(),
                source,
            ),
        }
    }

    /// Every disk unit, or only the one named `disk_name`.
    ///
    /// A named disk missing from a cached snapshot triggers one forced
    /// refresh before it is reported as not found.
    pub fn list_disks(&self, disk_name: Option<&str>) -> GatewayResult<Vec<Record>> {
        let read = self.cache.get_snapshot(false)?;
        debug!(
            count = read.value().len(),
            cache_hit = read.was_cache_hit(),
            refreshed_at = %read.refreshed_at(),
            hit_rate = self.cache.stats().hit_rate(),
            "Listing disk units"
        );
        let Some(name) = disk_name else {
            return Ok(read.value().iter().map(DiskUnit::to_record).collect());
        };

        if let Some(disk) = find(read.value(), name) {
            return Ok(vec![disk.to_record()]);
        }
        if !read.was_cache_hit() {
            return Err(not_found(name));
        }

        debug!(disk = name, "Disk missing from cached snapshot, forcing refresh");
        let fresh = self.cache.get_snapshot(true)?;
        find(fresh.value(), name)
            .map(|disk| vec![disk.to_record()])
            .ok_or_else(|| not_found(name))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn find<'a>(disks: &'a [DiskUnit], name: &str) -> Option<&'a DiskUnit> {
    disks.iter().find(|disk| disk.resource_name == name)
}

fn not_found(name: &str) -> GatewayError {
    GatewayError::not_found(format!("Disk {}", name))
}
