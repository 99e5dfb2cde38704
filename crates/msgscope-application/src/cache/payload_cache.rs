use moka::sync::Cache;
use msgscope_core::config::CacheConfig;
use msgscope_core::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// Cost function estimating the memory held by a cached payload string.
pub type Weigher = fn(&str) -> u32;

/// Approximate in-memory footprint of a payload string: two bytes per
/// character plus a fixed header, rounded down to a multiple of eight.
pub fn approx_string_weight(raw: &str) -> u32 {
    let bytes = 2 * raw.len() as u64 + 35;
    u32::try_from(bytes / 8 * 8).unwrap_or(u32::MAX)
}

/// Process-wide cache from serialized payload to decoded payload.
///
/// Entries are content-addressed: the same payload string decoded once is
/// shared by every record and session that carries it. The cache is bounded
/// by the summed weight of its keys and forgets entries left idle.
pub struct PayloadCache<P> {
    cache: Cache<String, Arc<P>>,
}

impl<P> PayloadCache<P>
where
    P: Send + Sync + 'static,
{
    pub fn new(max_weight: u64, idle: Duration) -> Self {
        Self::with_weigher(max_weight, idle, approx_string_weight)
    }

    pub fn with_weigher(max_weight: u64, idle: Duration, weigher: Weigher) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_weight)
            .weigher(move |raw: &String, _payload: &Arc<P>| weigher(raw))
            .time_to_idle(idle)
            .build();
        Self { cache }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.payload_max_weight, config.payload_idle())
    }

    /// Returns the decoded payload for `raw`, running `decode` only on a miss.
    ///
    /// Concurrent misses on the same string share one `decode` call. Failed
    /// decodes are not cached.
    pub fn get_or_decode<F>(&self, raw: &str, decode: F) -> Result<Arc<P>>
    where
        F: FnOnce(&str) -> Result<P>,
    {
        if let Some(payload) = self.cache.get(raw) {
            return Ok(payload);
        }

        self.cache
            .try_get_with(raw.to_string(), || decode(raw).map(Arc::new))
            .map_err(|e| (*e).clone())
    }

    pub fn get(&self, raw: &str) -> Option<Arc<P>> {
        self.cache.get(raw)
    }

    pub fn invalidate(&self, raw: &str) {
        self.cache.invalidate(raw);
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Number of cached payloads. Pending maintenance is applied first.
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Summed weight of cached payloads. Pending maintenance is applied first.
    pub fn weighted_size(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.weighted_size()
    }
}
