//! crates/arunika_core/src/cache.rs
//!
//! The local cache: typed, best-effort access to the persisted key/value
//! storage. Reads never fail and writes never propagate errors; the in-memory
//! state stays authoritative until the next successful write.

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::ports::KeyValueStorage;

pub const BRANDING_KEY: &str = "arunika_branding";
pub const MENTOR_KEY: &str = "arunika_mentor";
pub const COURSES_KEY: &str = "arunika_courses";
pub const REMOTE_CONFIG_KEY: &str = "arunika_remote_config";
pub const SESSION_KEY: &str = "arunika_session";

pub struct LocalCache {
    storage: Box<dyn KeyValueStorage>,
}

impl LocalCache {
    pub fn new(storage: Box<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Returns the cached value, or `default` when it is missing or unreadable.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let raw = match self.storage.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return default,
            Err(e) => {
                warn!("Local cache read of '{}' failed: {}", key, e);
                return default;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Discarding corrupt cache entry '{}': {}", key, e);
                default
            }
        }
    }

    /// Persists `value` under `key`. Returns `false` if the write was dropped.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not serialize cache entry '{}': {}", key, e);
                return false;
            }
        };
        match self.storage.write(key, &raw) {
            Ok(()) => {
                debug!("Cached '{}' ({} bytes)", key, raw.len());
                true
            }
            Err(e) => {
                warn!("Local cache write of '{}' dropped: {}", key, e);
                false
            }
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            warn!("Local cache removal of '{}' failed: {}", key, e);
        }
    }
}
