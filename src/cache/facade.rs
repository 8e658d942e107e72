//! Cache Facade Module
//!
//! The public engine: composes the key codec, per-key lock manager, state
//! store, and the user-supplied loader into get/reload/inspect/mutate
//! operations with request coalescing.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::cache::{CacheResult, CacheStats, StateStore};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::key::{JsonKeyCodec, KeyCodec};
use crate::lock::LockManager;
use crate::tasks::{spawn_expiry_timer, spawn_stale_timer};

// == Loader ==
/// Produces a value for an argument tuple. The only way the cache obtains
/// values, aside from explicit injection.
///
/// A loader may be invoked once per coalesced miss, so it must be safe to
/// call repeatedly with the same arguments. The engine never cancels an
/// in-flight load; loaders wanting timeouts implement them internally.
pub trait Loader<A, V>: Send + Sync {
    fn load(&self, args: A) -> BoxFuture<'static, anyhow::Result<V>>;
}

impl<A, V, F, Fut> Loader<A, V> for F
where
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
{
    fn load(&self, args: A) -> BoxFuture<'static, anyhow::Result<V>> {
        (self)(args).boxed()
    }
}

// == Cache ==
/// Keyed asynchronous cache with request coalescing, staleness tracking and
/// bounded capacity.
///
/// Concurrent `get` calls for the same key resolve to a single underlying
/// load; loads for different keys proceed independently. Cloning yields a
/// handle to the same engine.
///
/// # Example
/// ```ignore
/// let cache: Cache<String, String> =
///     Cache::new(|key: String| async move { Ok(key.to_uppercase()) });
/// assert_eq!(cache.get("a".to_string()).await?, "A");
/// ```
pub struct Cache<A, V>
where
    A: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    loader: Arc<dyn Loader<A, V>>,
    codec: Arc<dyn KeyCodec<A>>,
    store: Arc<StateStore<A, V>>,
    locks: LockManager,
    config: CacheConfig,
}

impl<A, V> Clone for Cache<A, V>
where
    A: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            loader: Arc::clone(&self.loader),
            codec: Arc::clone(&self.codec),
            store: Arc::clone(&self.store),
            locks: self.locks.clone(),
            config: self.config.clone(),
        }
    }
}

impl<A, V> Cache<A, V>
where
    A: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a cache around `loader` with everything optional disabled:
    /// unbounded capacity, no staleness, no expiry.
    pub fn new<L>(loader: L) -> Self
    where
        L: Loader<A, V> + 'static,
        A: Serialize,
    {
        Self::with_config(loader, CacheConfig::default())
    }

    /// Creates a cache with the given tuning parameters and the default
    /// JSON key codec.
    pub fn with_config<L>(loader: L, config: CacheConfig) -> Self
    where
        L: Loader<A, V> + 'static,
        A: Serialize,
    {
        Self::with_codec(loader, JsonKeyCodec, config)
    }

    /// Creates a cache with a custom key codec.
    pub fn with_codec<L, C>(loader: L, codec: C, config: CacheConfig) -> Self
    where
        L: Loader<A, V> + 'static,
        C: KeyCodec<A> + 'static,
    {
        Self {
            loader: Arc::new(loader),
            codec: Arc::new(codec),
            store: Arc::new(StateStore::new(config.capacity)),
            locks: LockManager::new(),
            config,
        }
    }

    // == Has ==
    /// True iff an entry currently exists for the arguments, in any status.
    pub fn has(&self, args: &A) -> Result<bool> {
        let key = self.codec.encode(args)?;
        Ok(self.store.contains(&key))
    }

    // == Get ==
    /// Returns the value for the arguments, loading it if necessary.
    ///
    /// Fresh entries are answered from a lock-free fast path. Otherwise the
    /// per-key lock serializes concurrent callers: whoever acquires it first
    /// performs the load, and the rest find the value already fresh on
    /// re-check without invoking the loader again.
    ///
    /// A successful load schedules the configured staleness and expiry
    /// timers. A failed load records the error in the entry (keeping any
    /// previously loaded value for fallback display) and returns it.
    pub async fn get(&self, args: A) -> Result<V> {
        let key = self.codec.encode(&args)?;
        if let Some(value) = self.store.fresh_value(&key) {
            return Ok(value);
        }

        let _guard = self.locks.acquire(&key).await?;
        // Another caller may have completed the load while we waited.
        if let Some(value) = self.store.fresh_value(&key) {
            return Ok(value);
        }

        self.load_entry(&key, args, true).await
    }

    // == Reload ==
    /// Unconditionally performs a real load, skipping the freshness check.
    ///
    /// Unlike `get`, a reload schedules no staleness/expiry timers; pending
    /// timers for the key are cancelled when the load begins.
    pub async fn reload(&self, args: A) -> Result<V> {
        let key = self.codec.encode(&args)?;
        let _guard = self.locks.acquire(&key).await?;
        self.load_entry(&key, args, false).await
    }

    /// Shared load path for `get` misses and `reload`. Caller must hold the
    /// key lock.
    async fn load_entry(&self, key: &str, args: A, schedule_timers: bool) -> Result<V> {
        self.store.set_loading(key, &args)?;
        debug!(%key, "load started");

        match self.loader.load(args).await {
            Ok(value) => {
                self.store.set_loaded(key, value.clone());
                if schedule_timers {
                    self.schedule_maintenance(key);
                }
                debug!(%key, "load completed");
                Ok(value)
            }
            Err(source) => {
                let source = Arc::new(source);
                self.store.set_failed(key, Arc::clone(&source));
                debug!(%key, error = %source, "load failed");
                Err(CacheError::Load {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    /// Spawns the staleness/expiry timers configured for this cache and
    /// registers their handles with the entry.
    fn schedule_maintenance(&self, key: &str) {
        let stale = self
            .config
            .stale_after
            .map(|delay| spawn_stale_timer(Arc::clone(&self.store), key.to_string(), delay));
        let expiry = self
            .config
            .evict_after
            .map(|delay| spawn_expiry_timer(Arc::clone(&self.store), key.to_string(), delay));
        if stale.is_some() || expiry.is_some() {
            self.store.attach_timers(key, stale, expiry);
        }
    }

    // == Explicit Value ==
    /// Stores a value directly, bypassing the loader and the lock. The
    /// override is immediately visible to subscribers of the entry's cell.
    pub fn set_explicit_value(&self, args: A, value: V) -> Result<()> {
        let key = self.codec.encode(&args)?;
        self.store.set_value(
            &key,
            &args,
            CacheResult::Loaded {
                value,
                updated_at: Utc::now(),
            },
        )
    }

    // == Set Obsolete ==
    /// Flags the entry's value as stale. Unlike the internal staleness
    /// timer, the precondition failure for a never-loaded entry propagates
    /// to the caller.
    pub fn set_obsolete(&self, args: &A) -> Result<()> {
        let key = self.codec.encode(args)?;
        self.store.set_obsolete(&key)
    }

    // == Remove ==
    /// Deletes the entry. Returns whether one existed.
    pub fn remove(&self, args: &A) -> Result<bool> {
        let key = self.codec.encode(args)?;
        Ok(self.store.remove(&key))
    }

    // == Observe ==
    /// Returns the entry's reactive cell, creating it if needed.
    ///
    /// If the cell is currently uninitialized, a background `get` is spawned
    /// to begin populating it; the caller receives the cell immediately and
    /// observes the transitions without polling. A failure of that
    /// background load lands in the cell as `Failed` rather than surfacing
    /// here.
    pub fn observe(&self, args: A) -> Result<watch::Receiver<CacheResult<V>>> {
        let key = self.codec.encode(&args)?;
        let rx = self.store.cell(&key, &args)?;
        if matches!(&*rx.borrow(), CacheResult::Uninitialized) {
            let cache = self.clone();
            tokio::spawn(async move {
                if let Err(error) = cache.get(args).await {
                    debug!(%error, "background load triggered by observation failed");
                }
            });
        }
        Ok(rx)
    }

    // == Bulk Operations ==
    /// Marks every entry whose `(value, args)` matches the predicate as
    /// obsolete. Returns the number of entries transitioned.
    pub fn obsolete_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&V, &A) -> bool,
    {
        self.store.obsolete_where(predicate)
    }

    /// Removes every entry whose `(value, args)` matches the predicate.
    /// Returns the number of entries removed.
    pub fn remove_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&V, &A) -> bool,
    {
        self.store.remove_where(predicate)
    }

    /// Removes every entry unconditionally. Returns how many were removed.
    pub fn flush(&self) -> usize {
        self.store.flush()
    }

    // == Inspection ==
    /// Number of resident entries, placeholders included.
    pub fn count(&self) -> usize {
        self.store.count()
    }

    /// Current performance counters.
    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    // == Dispose ==
    /// Tears the engine down: suspended lock acquirers resolve with
    /// [`CacheError::Disposed`], entries are dropped, and pending timers are
    /// aborted. Subsequent loads fail with the same error. Idempotent.
    pub fn dispose(&self) {
        self.locks.dispose();
        self.store.dispose();
        debug!("cache engine disposed");
    }
}
