//! Cached access to the settings singleton.
//!
//! Reads go through an in-memory snapshot refreshed at most every 60
//! seconds; updates validate, write through, and drop the snapshot so the
//! next read sees the new values immediately.

use parking_lot::RwLock;
use std::time::{Duration, Instant};

use crate::domain::{SystemSettings, ValidationError};
use crate::store::Store;

const CACHE_TTL: Duration = Duration::from_secs(60);

pub struct SettingsService {
    cached: RwLock<Option<(SystemSettings, Instant)>>,
    ttl: Duration,
}

impl Default for SettingsService {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsService {
    pub fn new() -> Self {
        Self {
            cached: RwLock::new(None),
            ttl: CACHE_TTL,
        }
    }

    #[cfg(test)]
    fn with_ttl(ttl: Duration) -> Self {
        Self {
            cached: RwLock::new(None),
            ttl,
        }
    }

    /// The current settings, from cache when fresh.
    pub fn get(&self, store: &Store) -> SystemSettings {
        if let Some((settings, fetched_at)) = self.cached.read().as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return settings.clone();
            }
        }

        let fresh = store.load_settings();
        *self.cached.write() = Some((fresh.clone(), Instant::now()));
        fresh
    }

    /// Validates and persists new settings, invalidating the cache.
    pub fn update(
        &self,
        store: &Store,
        settings: SystemSettings,
    ) -> Result<SystemSettings, ValidationError> {
        settings.validate()?;
        store.save_settings(settings.clone());
        *self.cached.write() = None;
        Ok(settings)
    }
}
