// Per-key TTL caching for expensive, slow-changing lookups. Owned by the
// sampling task alone, so no locking (single-writer event loop).

use std::time::{Duration, Instant};

use crate::models::{ContainerMetrics, DiskMetrics, PsiMetrics};
use crate::sampler::HostIdentity;

/// df-equivalent disk scan is comparatively expensive.
pub const DISK_TTL: Duration = Duration::from_secs(15);
/// Kernel pressure files are moderately stable.
pub const PSI_TTL: Duration = Duration::from_secs(10);
/// cgroup limits rarely change at runtime.
pub const CONTAINER_TTL: Duration = Duration::from_secs(10);
/// Hostname, OS, arch, internal IP are effectively constant.
pub const IDENTITY_TTL: Duration = Duration::from_secs(300);

/// One cached value with its refresh timestamp. Within `ttl` of the last
/// refresh, `get` returns the stored value unchanged; outside the window the
/// entry is recomputed before being returned.
#[derive(Debug)]
pub struct CacheEntry<T> {
    value: Option<T>,
    last_refreshed: Option<Instant>,
    ttl: Duration,
}

impl<T: Clone> CacheEntry<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            value: None,
            last_refreshed: None,
            ttl,
        }
    }

    /// Deterministic variant taking an explicit clock, for tests.
    pub fn get_at(&mut self, now: Instant, compute: impl FnOnce() -> T) -> T {
        if let (Some(at), Some(v)) = (self.last_refreshed, &self.value)
            && now.duration_since(at) < self.ttl
        {
            return v.clone();
        }
        let v = compute();
        self.value = Some(v.clone());
        self.last_refreshed = Some(now);
        v
    }

    pub fn get(&mut self, compute: impl FnOnce() -> T) -> T {
        self.get_at(Instant::now(), compute)
    }

    pub fn last_refreshed(&self) -> Option<Instant> {
        self.last_refreshed
    }
}

/// The cache tier in front of the sampler's expensive reads, one TTL per key.
/// CPU/memory/swap/network raw counters are deliberately not here: they are
/// cheap and must be fresh every tick.
#[derive(Debug)]
pub struct TieredCache {
    pub disk: CacheEntry<DiskMetrics>,
    pub psi: CacheEntry<Option<PsiMetrics>>,
    pub container: CacheEntry<Option<ContainerMetrics>>,
    pub identity: CacheEntry<HostIdentity>,
}

impl Default for TieredCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TieredCache {
    pub fn new() -> Self {
        Self {
            disk: CacheEntry::new(DISK_TTL),
            psi: CacheEntry::new(PSI_TTL),
            container: CacheEntry::new(CONTAINER_TTL),
            identity: CacheEntry::new(IDENTITY_TTL),
        }
    }
}
