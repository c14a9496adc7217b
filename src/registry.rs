//! Keyed registry of lazily created pools and singletons

use crate::config::PoolConfig;
use crate::errors::{PoolError, PoolResult};
use crate::factory::ResourceFactory;
use crate::pool::{ObjectPool, Pooled};
use crate::stats::PoolStats;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Identity of a primitive configuration: provider plus algorithm
///
/// Absent and empty names are equivalent.
///
/// ```
/// use cryptopool::PoolKey;
///
/// assert_eq!(PoolKey::new(None, Some("SHA-256")), PoolKey::new(Some(""), Some("SHA-256")));
/// assert_ne!(PoolKey::new(None, Some("SHA-256")), PoolKey::new(None, Some("SHA-512")));
/// assert_eq!(PoolKey::new(Some("RustCrypto"), Some("SHA-256")).to_string(), "RustCryptoSHA-256");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PoolKey {
    provider: String,
    algorithm: String,
}

impl PoolKey {
    pub fn new(provider: Option<&str>, algorithm: Option<&str>) -> Self {
        Self {
            provider: provider.unwrap_or_default().to_string(),
            algorithm: algorithm.unwrap_or_default().to_string(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.provider, self.algorithm)
    }
}

/// Registry holding at most one pool and one singleton per key
///
/// Pools and singletons are built on first use. A pool's configuration is
/// fixed by the call that created it: later calls for the same key get the
/// existing pool whatever configuration they pass. [`reset`](Self::reset) is
/// the only way to replace entries.
///
/// `reset` does not coordinate with borrowers on other threads; those may see
/// [`PoolError::UnknownPool`] or [`PoolError::PoolClosed`] while it runs.
///
/// # Examples
///
/// ```
/// use cryptopool::{FnFactory, KeyedPoolRegistry, PoolConfig, PoolError};
///
/// let registry: KeyedPoolRegistry<&str, u32> = KeyedPoolRegistry::new();
/// let config = PoolConfig::default();
///
/// let resource = registry.borrow_from(&"answers", &config, || FnFactory::new(|| Ok(42))).unwrap();
/// assert_eq!(*resource, 42);
/// registry.return_to(&"answers", resource).unwrap();
/// assert_eq!(registry.stats_for(&"answers").unwrap().num_idle, 1);
///
/// registry.reset();
/// assert!(matches!(registry.stats_for(&"answers"), Err(PoolError::UnknownPool(_))));
/// ```
pub struct KeyedPoolRegistry<K, T: Send + 'static> {
    pools: DashMap<K, ObjectPool<T>>,
    singletons: DashMap<K, Arc<T>>,
    pool_guards: DashMap<K, Arc<Mutex<()>>>,
    singleton_guards: DashMap<K, Arc<Mutex<()>>>,
}

impl<K, T> Default for KeyedPoolRegistry<K, T>
where
    K: Eq + Hash + Clone + fmt::Display,
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> KeyedPoolRegistry<K, T>
where
    K: Eq + Hash + Clone + fmt::Display,
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
            singletons: DashMap::new(),
            pool_guards: DashMap::new(),
            singleton_guards: DashMap::new(),
        }
    }

    /// The pool registered for `key`, if any
    pub fn pool(&self, key: &K) -> Option<ObjectPool<T>> {
        self.pools.get(key).map(|pool| pool.value().clone())
    }

    /// The pool for `key`, creating it with `config` and the factory from
    /// `build` when the key is new
    pub fn get_or_create_pool<F, B>(&self, key: &K, config: &PoolConfig, build: B) -> PoolResult<ObjectPool<T>>
    where
        F: ResourceFactory<T>,
        B: FnOnce() -> F,
    {
        if let Some(pool) = self.pool(key) {
            return Ok(pool);
        }

        let guard = Arc::clone(self.pool_guards.entry(key.clone()).or_default().value());
        let created = {
            let _creating = guard.lock();
            self.create_pool(key, config, build)
        };
        release_guard(&self.pool_guards, key, &guard);
        created
    }

    /// The shared instance for `key`, creating it when the key is new
    pub fn get_or_create_singleton<F, B>(&self, key: &K, build: B) -> PoolResult<Arc<T>>
    where
        F: ResourceFactory<T>,
        B: FnOnce() -> F,
    {
        if let Some(existing) = self.singleton(key) {
            return Ok(existing);
        }

        let guard = Arc::clone(self.singleton_guards.entry(key.clone()).or_default().value());
        let created = {
            let _creating = guard.lock();
            self.create_singleton(key, build)
        };
        release_guard(&self.singleton_guards, key, &guard);
        created
    }

    /// Borrow from the pool for `key`, creating the pool if needed
    pub fn borrow_from<F, B>(&self, key: &K, config: &PoolConfig, build: B) -> PoolResult<Pooled<T>>
    where
        F: ResourceFactory<T>,
        B: FnOnce() -> F,
    {
        let pool = self.get_or_create_pool(key, config, build)?;
        pool.borrow().inspect_err(|err| {
            tracing::debug!(key = %key, %err, "borrow from object pool failed");
        })
    }

    /// Return a resource to the pool registered for `key`
    ///
    /// Fails with [`PoolError::UnknownPool`] when no such pool exists, for
    /// instance after a [`reset`](Self::reset); the resource then goes back
    /// to the pool that lent it, or is destroyed if that pool is closed.
    pub fn return_to(&self, key: &K, resource: Pooled<T>) -> PoolResult<()> {
        match self.pool(key) {
            Some(pool) => pool.return_object(resource),
            None => {
                tracing::warn!(key = %key, "cannot return a resource, the object pool does not exist");
                Err(PoolError::UnknownPool(key.to_string()))
            }
        }
    }

    /// Statistics of the pool registered for `key`
    pub fn stats_for(&self, key: &K) -> PoolResult<PoolStats> {
        match self.pool(key) {
            Some(pool) => Ok(pool.stats()),
            None => {
                tracing::warn!(key = %key, "cannot read statistics, the object pool does not exist");
                Err(PoolError::UnknownPool(key.to_string()))
            }
        }
    }

    /// Close and forget every pool, drop every singleton
    ///
    /// Resources still borrowed are destroyed when they come back.
    pub fn reset(&self) {
        if !self.singletons.is_empty() {
            self.singletons.clear();
            tracing::debug!("singletons cleared");
        }

        let keys: Vec<K> = self.pools.iter().map(|entry| entry.key().clone()).collect();
        for key in keys {
            if let Some((key, pool)) = self.pools.remove(&key) {
                pool.close();
                tracing::debug!(key = %key, "object pool closed");
            }
        }
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn singleton_count(&self) -> usize {
        self.singletons.len()
    }

    fn singleton(&self, key: &K) -> Option<Arc<T>> {
        self.singletons.get(key).map(|instance| Arc::clone(instance.value()))
    }

    fn create_pool<F, B>(&self, key: &K, config: &PoolConfig, build: B) -> PoolResult<ObjectPool<T>>
    where
        F: ResourceFactory<T>,
        B: FnOnce() -> F,
    {
        if let Some(pool) = self.pool(key) {
            return Ok(pool);
        }

        tracing::debug!(key = %key, "creating a new object pool");
        let pool = ObjectPool::new(build(), config.clone())?;
        // A reset may have let a second creator in; the first insert wins.
        let pool = match self.pools.entry(key.clone()) {
            Entry::Occupied(existing) => {
                pool.close();
                existing.get().clone()
            }
            Entry::Vacant(slot) => slot.insert(pool).value().clone(),
        };
        tracing::debug!(key = %key, pool = pool.id(), "object pool created");
        Ok(pool)
    }

    fn create_singleton<F, B>(&self, key: &K, build: B) -> PoolResult<Arc<T>>
    where
        F: ResourceFactory<T>,
        B: FnOnce() -> F,
    {
        if let Some(existing) = self.singleton(key) {
            return Ok(existing);
        }

        tracing::debug!(key = %key, "creating a new singleton");
        let instance = Arc::new(build().create()?);
        let instance = Arc::clone(self.singletons.entry(key.clone()).or_insert(instance).value());
        Ok(instance)
    }
}

/// Drop the init guard for `key` unless another creator already replaced it
fn release_guard<K: Eq + Hash>(guards: &DashMap<K, Arc<Mutex<()>>>, key: &K, guard: &Arc<Mutex<()>>) {
    guards.remove_if(key, |_, current| Arc::ptr_eq(current, guard));
}
