//! A concurrent key/value store whose entries expire after a fixed duration.
//!
//! Expired entries are evicted lazily when they are read, or in bulk by
//! [`Cache::delete_expired()`]. A cache created with a positive duration also runs a janitor
//! thread which calls the [`on_expired`](Cache::on_expired) hook once per period; it does not
//! evict anything by itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;

type Hook = Arc<dyn Fn() + Send + Sync>;

/// Errors returned by [`Cache`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Key {0} does not exist in the cache.")]
    KeyNotFound(String),
}

/// A cached value together with its expiration instant.
#[derive(Clone, Debug)]
pub struct Item<V> {
    /// [`None`] marks a key that is known to have no value.
    pub object: Option<V>,
    /// [`None`] means the item never expires.
    pub expiration: Option<Instant>,
}

impl<V> Item<V> {
    pub fn expired(&self) -> bool {
        self.expired_at(Instant::now())
    }

    fn expired_at(&self, now: Instant) -> bool {
        match self.expiration {
            Some(expiration) => now > expiration,
            None => false,
        }
    }
}

/// See the [module documentation](self).
pub struct Cache<V> {
    items: DashMap<String, Item<V>>,
    expiration: Option<Duration>,
    on_expired: Arc<RwLock<Option<Hook>>>,
    janitor: Mutex<Option<Sender<()>>>,
}

impl<V: Clone> Cache<V> {
    /// Creates a cache whose items expire `expiration` after they were set.
    ///
    /// A zero duration means items never expire; no janitor is started in that case. Durations
    /// too long to add to the current time also mean that items never expire.
    pub fn new(expiration: Duration) -> Self {
        let on_expired: Arc<RwLock<Option<Hook>>> = Arc::new(RwLock::new(None));
        let (expiration, janitor) = if expiration.is_zero() {
            (None, None)
        } else {
            (
                Some(expiration),
                run_janitor(expiration, Arc::clone(&on_expired)),
            )
        };

        Self {
            items: DashMap::new(),
            expiration,
            on_expired,
            janitor: Mutex::new(janitor),
        }
    }

    /// Inserts a value, replacing any existing item for `key`. Passing [`None`] stores the
    /// absence marker, which [`get()`](Self::get) does not report.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Option<V>>) {
        let item = Item {
            object: value.into(),
            // too far in the future to represent means never
            expiration: self.expiration.and_then(|d| Instant::now().checked_add(d)),
        };
        self.items.insert(key.into(), item);
    }

    /// Returns the value for `key` unless it is missing, expired or the absence marker.
    ///
    /// An expired item is removed.
    pub fn get(&self, key: &str) -> Option<V> {
        {
            let item = self.items.get(key)?;
            if !item.expired() {
                return item.object.clone();
            }
        }
        self.items.remove_if(key, |_, item| item.expired());
        None
    }

    /// Sets a new value for `key`, but only if [`get()`](Self::get) currently finds one.
    pub fn replace(&self, key: &str, value: impl Into<Option<V>>) -> Result<(), CacheError> {
        if self.get(key).is_none() {
            return Err(CacheError::KeyNotFound(key.to_string()));
        }
        self.set(key, value);
        Ok(())
    }

    /// Returns a snapshot of all unexpired values, skipping absence markers.
    pub fn get_all(&self) -> HashMap<String, V> {
        let now = Instant::now();
        self.items
            .iter()
            .filter(|entry| !entry.expired_at(now))
            .filter_map(|entry| {
                entry
                    .object
                    .as_ref()
                    .map(|object| (entry.key().clone(), object.clone()))
            })
            .collect()
    }
}

impl<V> Cache<V> {
    /// Removes `key`. Does nothing if it is not in the cache.
    pub fn delete(&self, key: &str) {
        self.items.remove(key);
    }

    /// Removes every expired item.
    pub fn delete_expired(&self) {
        let now = Instant::now();
        self.items.retain(|_, item| !item.expired_at(now));
    }

    /// Removes every item.
    pub fn flush(&self) {
        self.items.clear();
    }

    /// Number of items, including expired ones that have not been evicted yet.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sets the hook the janitor calls once per expiration period.
    pub fn on_expired(&self, hook: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut on_expired) = self.on_expired.write() {
            *on_expired = Some(Arc::new(hook));
        }
    }

    /// Stops the janitor thread without waiting for it. Calling this more than once, or on a
    /// cache without a janitor, does nothing.
    pub fn stop_janitor(&self) {
        let stop = match self.janitor.lock() {
            Ok(mut janitor) => janitor.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(stop) = stop {
            // the janitor may already be gone
            let _ = stop.send(());
        }
    }
}

impl<V> fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("items", &self.items.len())
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        self.stop_janitor();
    }
}

fn run_janitor(interval: Duration, on_expired: Arc<RwLock<Option<Hook>>>) -> Option<Sender<()>> {
    let (stop, stopped) = mpsc::channel::<()>();
    let spawned = thread::Builder::new()
        .name("cache-janitor".into())
        .spawn(move || loop {
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let hook = on_expired.read().ok().and_then(|hook| hook.clone());
                    if let Some(hook) = hook {
                        hook();
                    }
                }
                // explicit stop, or the cache was dropped
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

    match spawned {
        Ok(_) => Some(stop),
        Err(e) => {
            log::error!("could not start cache janitor: {}", e);
            None
        }
    }
}
