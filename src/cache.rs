use crate::config::ServiceConfig;
use moka::future::Cache;
use std::time::Duration;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info};

/// WHOIS responses keyed by normalized domain.
///
/// Entries expire individually after the TTL (checked on lookup). On top of
/// that a background task wipes the whole cache every reset interval,
/// whatever the age of the entries. Dropping the cache stops that task.
pub struct ResponseCache {
    cache: Cache<String, String>,
    reset_task: JoinHandle<()>,
}

impl ResponseCache {
    /// Must be called from within a tokio runtime.
    pub fn new(ttl: Duration, reset_every: Duration, max_entries: Option<u64>) -> Self {
        let mut builder = Cache::builder().time_to_live(ttl);
        if let Some(max_entries) = max_entries {
            builder = builder.max_capacity(max_entries);
        }
        let cache: Cache<String, String> = builder.build();

        let reset_task = tokio::spawn(Self::reset_loop(cache.clone(), reset_every));

        Self { cache, reset_task }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.cache_ttl(), config.cache_reset(), config.cache_max_entries)
    }

    async fn reset_loop(cache: Cache<String, String>, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let dropped = cache.entry_count();
            cache.invalidate_all();
            info!(entries = dropped, "whois cache reset");
        }
    }

    pub async fn get(&self, domain: &str) -> Option<String> {
        let found = self.cache.get(domain).await;
        debug!(domain, found = found.is_some(), "cache lookup");
        found
    }

    pub async fn set(&self, domain: &str, response: String) {
        self.cache.insert(domain.to_string(), response).await;
        debug!(domain, "cached response");
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Drop for ResponseCache {
    fn drop(&mut self) {
        self.reset_task.abort();
    }
}
