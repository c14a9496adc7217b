//! Core object pool implementation

use crate::config::PoolConfig;
use crate::errors::{PoolError, PoolResult};
use crate::eviction::{EvictionContext, Evictor, ResourceMeta, ResourceState};
use crate::factory::ResourceFactory;
use crate::stats::{PoolStats, StatsTracker};

use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// A resource borrowed from an [`ObjectPool`]
///
/// Hand it back with [`ObjectPool::return_object`] or
/// [`ObjectPool::invalidate`]. A handle that is simply dropped goes back to
/// the pool it came from.
pub struct Pooled<T: Send + 'static> {
    value: Option<T>,
    id: u64,
    pool_id: u64,
    pool: Weak<PoolInner<T>>,
}

impl<T: Send + 'static> Pooled<T> {
    /// Identity of the underlying resource, unique within its pool
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Identity of the pool that lent this resource
    pub fn pool_id(&self) -> u64 {
        self.pool_id
    }
}

impl<T: Send + 'static> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("Value already taken")
    }
}

impl<T: Send + 'static> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("Value already taken")
    }
}

impl<T: Send + 'static> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            match self.pool.upgrade() {
                Some(pool) => {
                    if let Err(err) = pool.give_back(self.id, value) {
                        tracing::debug!(pool = self.pool_id, resource = self.id, %err, "dropped handle not taken back");
                    }
                }
                None => drop(value),
            }
        }
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("id", &self.id)
            .field("pool_id", &self.pool_id)
            .field("value", &self.value)
            .finish()
    }
}

/// A resource owned by the pool together with its bookkeeping
struct PooledResource<T> {
    meta: ResourceMeta,
    value: T,
}

struct PoolState<T> {
    idle: VecDeque<PooledResource<T>>,
    active: HashMap<u64, ResourceMeta>,
    // Resources in flight between the public collections; they still count
    // against `max_total`.
    creating: usize,
    returning: usize,
    under_test: usize,
    waiters: VecDeque<u64>,
    next_ticket: u64,
    closed: bool,
}

impl<T> PoolState<T> {
    fn new() -> Self {
        Self {
            idle: VecDeque::new(),
            active: HashMap::new(),
            creating: 0,
            returning: 0,
            under_test: 0,
            waiters: VecDeque::new(),
            next_ticket: 0,
            closed: false,
        }
    }

    fn total(&self) -> usize {
        self.idle.len() + self.active.len() + self.creating + self.returning + self.under_test
    }

    fn has_capacity(&self, config: &PoolConfig) -> bool {
        config.max_total_limit().is_none_or(|max| self.total() < max)
    }

    fn is_turn(&self, ticket: Option<u64>, fairness: bool) -> bool {
        if !fairness {
            return true;
        }
        match self.waiters.front() {
            None => true,
            Some(front) => ticket == Some(*front),
        }
    }

    fn join_queue(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.waiters.push_back(ticket);
        ticket
    }

    fn leave_queue(&mut self, ticket: Option<u64>) -> bool {
        match ticket {
            Some(ticket) => {
                self.waiters.retain(|waiter| *waiter != ticket);
                true
            }
            None => false,
        }
    }

    fn push_idle(&mut self, resource: PooledResource<T>, lifo: bool) {
        if lifo {
            self.idle.push_front(resource);
        } else {
            self.idle.push_back(resource);
        }
    }
}

enum Wait {
    Never,
    Forever,
    Until(Instant),
}

pub(crate) struct PoolInner<T: Send + 'static> {
    id: u64,
    config: PoolConfig,
    factory: Box<dyn ResourceFactory<T>>,
    state: Mutex<PoolState<T>>,
    available: Condvar,
    stats: StatsTracker,
    next_resource_id: AtomicU64,
    evictor: Mutex<Option<Evictor>>,
}

impl<T: Send + 'static> PoolInner<T> {
    fn create_resource(&self) -> PoolResult<PooledResource<T>> {
        let value = self.guarded("create", || self.factory.create())??;
        if self.config.test_on_create && !self.validate_quietly(&value) {
            self.dispose(value);
            return Err(PoolError::FactoryError(
                "newly created resource failed validation".to_string(),
            ));
        }

        let id = self.next_resource_id.fetch_add(1, Ordering::Relaxed);
        self.stats.created.fetch_add(1, Ordering::Relaxed);
        Ok(PooledResource {
            meta: ResourceMeta::new(id),
            value,
        })
    }

    /// Hand the resource to the factory without touching the counters
    fn dispose(&self, value: T) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.factory.destroy(value)));
        if outcome.is_err() {
            tracing::error!(pool = self.id, "resource factory panicked while destroying a resource");
        }
    }

    fn destroy(&self, value: T) {
        self.stats.destroyed.fetch_add(1, Ordering::Relaxed);
        self.dispose(value);
        tracing::debug!(pool = self.id, "resource destroyed");
    }

    /// Run a factory call, turning a panic into [`PoolError::FactoryError`]
    fn guarded<R>(&self, operation: &'static str, call: impl FnOnce() -> R) -> PoolResult<R> {
        panic::catch_unwind(AssertUnwindSafe(call)).map_err(|_| {
            tracing::error!(pool = self.id, operation, "resource factory panicked");
            PoolError::FactoryError(format!("resource factory panicked in {operation}"))
        })
    }

    /// Validate a resource; a panicking validation counts as a failure
    fn validate_quietly(&self, value: &T) -> bool {
        self.guarded("validate", || self.factory.validate(value)).unwrap_or(false)
    }

    fn give_back(&self, id: u64, mut value: T) -> PoolResult<()> {
        let meta = {
            let mut state = self.state.lock();
            let meta = state.active.remove(&id);
            if meta.is_some() {
                state.returning += 1;
            }
            meta
        };
        let Some(mut meta) = meta else {
            self.dispose(value);
            return Err(PoolError::DoubleReturn);
        };

        let active_time = meta.deactivate(Instant::now());
        self.stats.record_return(active_time);

        let keep = (!self.config.test_on_return || self.validate_quietly(&value))
            && self.guarded("reset", || self.factory.reset(&mut value)).is_ok();

        let mut state = self.state.lock();
        state.returning -= 1;
        let surplus = self
            .config
            .max_idle_limit()
            .is_some_and(|max| state.idle.len() >= max);
        if !keep || state.closed || surplus {
            drop(state);
            self.destroy(value);
        } else {
            state.push_idle(PooledResource { meta, value }, self.config.lifo);
            drop(state);
        }
        self.available.notify_all();
        Ok(())
    }

    fn discard(&self, id: u64, value: T) -> PoolResult<()> {
        let known = self.state.lock().active.remove(&id).is_some();
        if !known {
            self.dispose(value);
            return Err(PoolError::DoubleReturn);
        }
        self.destroy(value);
        self.available.notify_all();
        Ok(())
    }

    fn ensure_min_idle(&self) -> PoolResult<()> {
        let min_idle = self.config.min_idle_count();
        loop {
            {
                let mut state = self.state.lock();
                if state.closed
                    || state.idle.len() + state.under_test >= min_idle
                    || !state.has_capacity(&self.config)
                {
                    return Ok(());
                }
                state.creating += 1;
            }

            let created = self.create_resource();
            let mut state = self.state.lock();
            state.creating -= 1;
            match created {
                Ok(resource) if !state.closed => {
                    state.push_idle(resource, self.config.lifo);
                    drop(state);
                    self.available.notify_all();
                }
                Ok(resource) => {
                    drop(state);
                    self.destroy(resource.value);
                    return Ok(());
                }
                Err(err) => {
                    drop(state);
                    self.available.notify_all();
                    return Err(err);
                }
            }
        }
    }

    fn evict(&self) -> PoolResult<()> {
        let config = &self.config;
        let now = Instant::now();

        // Take the oldest candidates out of the queue so that borrowers never
        // see a resource while it is being judged.
        let (candidates, mut idle_count) = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(());
            }
            let idle_count = state.idle.len();
            let tests = config.num_tests(idle_count);
            let mut taken = Vec::with_capacity(tests);
            while taken.len() < tests {
                let oldest = if config.lifo {
                    state.idle.pop_back()
                } else {
                    state.idle.pop_front()
                };
                match oldest {
                    Some(resource) => taken.push(resource),
                    None => break,
                }
            }
            state.under_test += taken.len();
            (taken, idle_count)
        };

        let examined = candidates.len();
        let mut survivors = Vec::with_capacity(examined);
        let mut evicted = 0usize;
        for resource in candidates {
            debug_assert_eq!(resource.meta.state, ResourceState::Idle);
            let ctx = EvictionContext::new(&resource.meta, idle_count, config, now);
            let expired = config.eviction_policy.evict(&ctx);
            let broken = !expired && config.test_while_idle && !self.validate_quietly(&resource.value);
            if expired || broken {
                idle_count -= 1;
                evicted += 1;
                self.stats.destroyed_by_evictor.fetch_add(1, Ordering::Relaxed);
                self.destroy(resource.value);
            } else {
                survivors.push(resource);
            }
        }

        let orphans = {
            let mut state = self.state.lock();
            state.under_test -= examined;
            if state.closed {
                survivors
            } else {
                // Put survivors back at the old end, keeping their order.
                for resource in survivors.into_iter().rev() {
                    if config.lifo {
                        state.idle.push_back(resource);
                    } else {
                        state.idle.push_front(resource);
                    }
                }
                Vec::new()
            }
        };
        for resource in orphans {
            self.destroy(resource.value);
        }
        self.available.notify_all();

        tracing::debug!(pool = self.id, examined, evicted, "eviction sweep finished");
        self.ensure_min_idle()
    }

    fn close(&self) {
        let idle = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        self.available.notify_all();

        if let Some(mut evictor) = self.evictor.lock().take() {
            evictor.stop();
        }
        for resource in idle {
            self.destroy(resource.value);
        }
        tracing::debug!(pool = self.id, "pool closed");
    }
}

impl<T: Send + 'static> Drop for PoolInner<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Thread-safe bounded pool of resources built by a [`ResourceFactory`]
///
/// Cloning an `ObjectPool` yields another handle to the same pool.
///
/// # Examples
///
/// ```
/// use cryptopool::{FnFactory, ObjectPool, PoolConfig, PoolError};
///
/// let config = PoolConfig::new()
///     .with_max_total(2)
///     .with_block_when_exhausted(false);
/// let pool = ObjectPool::new(FnFactory::new(|| Ok(String::from("resource"))), config).unwrap();
///
/// let first = pool.borrow().unwrap();
/// let _second = pool.borrow().unwrap();
/// assert!(matches!(pool.borrow(), Err(PoolError::PoolExhausted)));
///
/// let id = first.id();
/// pool.return_object(first).unwrap();
/// assert_eq!(pool.borrow().unwrap().id(), id);
/// ```
pub struct ObjectPool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> Clone for ObjectPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> ObjectPool<T> {
    /// Create a pool, pre-populate it to `min_idle` and start its evictor
    pub fn new<F>(factory: F, config: PoolConfig) -> PoolResult<Self>
    where
        F: ResourceFactory<T>,
    {
        config.validate()?;

        let inner = Arc::new(PoolInner {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            config,
            factory: Box::new(factory),
            state: Mutex::new(PoolState::new()),
            available: Condvar::new(),
            stats: StatsTracker::new(),
            next_resource_id: AtomicU64::new(1),
            evictor: Mutex::new(None),
        });

        inner.ensure_min_idle()?;

        if let Some(interval) = inner.config.eviction_interval() {
            let weak = Arc::downgrade(&inner);
            let evictor = Evictor::spawn(format!("pool-evictor-{}", inner.id), interval, move || {
                let Some(pool) = weak.upgrade() else {
                    return false;
                };
                match panic::catch_unwind(AssertUnwindSafe(|| pool.evict())) {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        tracing::warn!(pool = pool.id, %err, "eviction sweep could not restore min_idle")
                    }
                    Err(_) => tracing::error!(pool = pool.id, "eviction sweep panicked"),
                }
                true
            })
            .map_err(|err| PoolError::FactoryError(format!("failed to start evictor: {err}")))?;
            *inner.evictor.lock() = Some(evictor);
        }

        Ok(Self { inner })
    }

    /// Borrow a resource, creating one if the pool has capacity left
    ///
    /// When the pool is exhausted this blocks according to
    /// `block_when_exhausted` and `max_wait_millis`; a zero wait fails
    /// immediately with [`PoolError::PoolExhausted`].
    pub fn borrow(&self) -> PoolResult<Pooled<T>> {
        let inner = &*self.inner;
        let config = &inner.config;
        let started = Instant::now();
        let wait = match (config.block_when_exhausted, config.max_wait()) {
            (false, _) => Wait::Never,
            (true, None) => Wait::Forever,
            (true, Some(limit)) if limit.is_zero() => Wait::Never,
            (true, Some(limit)) => Wait::Until(started + limit),
        };

        let mut ticket = None;
        let mut state = inner.state.lock();
        loop {
            if state.closed {
                state.leave_queue(ticket);
                drop(state);
                inner.available.notify_all();
                return Err(PoolError::PoolClosed);
            }

            if state.is_turn(ticket, config.fairness) {
                let next = state.idle.pop_front();
                if let Some(PooledResource { mut meta, value }) = next {
                    let now = Instant::now();
                    let idle_time = meta.activate(now);
                    let id = meta.id;
                    state.active.insert(id, meta);
                    // A waiter keeps its place in line until validation passes.
                    let checking = config.test_on_borrow;
                    let left = !checking && state.leave_queue(ticket.take());
                    drop(state);
                    if left {
                        inner.available.notify_all();
                    }

                    if checking {
                        if !inner.validate_quietly(&value) {
                            inner.state.lock().active.remove(&id);
                            inner
                                .stats
                                .destroyed_by_borrow_validation
                                .fetch_add(1, Ordering::Relaxed);
                            inner.destroy(value);
                            inner.available.notify_all();
                            state = inner.state.lock();
                            continue;
                        }
                        if inner.state.lock().leave_queue(ticket.take()) {
                            inner.available.notify_all();
                        }
                    }

                    inner.stats.record_borrow(idle_time, now.saturating_duration_since(started));
                    return Ok(self.lend(id, value));
                }

                if state.has_capacity(config) {
                    state.creating += 1;
                    let left = state.leave_queue(ticket.take());
                    drop(state);
                    if left {
                        inner.available.notify_all();
                    }

                    let created = inner.create_resource();
                    let mut state = inner.state.lock();
                    state.creating -= 1;
                    let resource = match created {
                        Ok(resource) => resource,
                        Err(err) => {
                            drop(state);
                            inner.available.notify_all();
                            return Err(err);
                        }
                    };
                    if state.closed {
                        drop(state);
                        inner.destroy(resource.value);
                        inner.available.notify_all();
                        return Err(PoolError::PoolClosed);
                    }

                    let PooledResource { mut meta, value } = resource;
                    let now = Instant::now();
                    let idle_time = meta.activate(now);
                    let id = meta.id;
                    state.active.insert(id, meta);
                    drop(state);
                    inner.stats.record_borrow(idle_time, now.saturating_duration_since(started));
                    return Ok(self.lend(id, value));
                }
            }

            let deadline = match wait {
                Wait::Never => {
                    let left = state.leave_queue(ticket);
                    drop(state);
                    if left {
                        inner.available.notify_all();
                    }
                    return Err(PoolError::PoolExhausted);
                }
                Wait::Forever => None,
                Wait::Until(deadline) => Some(deadline),
            };

            if ticket.is_none() {
                ticket = Some(state.join_queue());
            }

            match deadline {
                None => inner.available.wait(&mut state),
                Some(deadline) => {
                    if inner.available.wait_until(&mut state, deadline).timed_out() {
                        state.leave_queue(ticket);
                        drop(state);
                        inner.available.notify_all();
                        return Err(PoolError::PoolTimeout(deadline.saturating_duration_since(started)));
                    }
                }
            }
        }
    }

    /// Borrow from within an async context without blocking the executor
    pub async fn borrow_async(&self) -> PoolResult<Pooled<T>> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || pool.borrow())
            .await
            .map_err(|err| PoolError::FactoryError(format!("borrow task failed: {err}")))?
    }

    /// Give a borrowed resource back to the pool
    ///
    /// A handle lent by another pool is rejected with
    /// [`PoolError::ForeignResource`]; it then goes back to its own pool when
    /// dropped.
    pub fn return_object(&self, mut resource: Pooled<T>) -> PoolResult<()> {
        if resource.pool_id != self.inner.id {
            return Err(PoolError::ForeignResource);
        }
        match resource.value.take() {
            Some(value) => self.inner.give_back(resource.id, value),
            None => Err(PoolError::DoubleReturn),
        }
    }

    /// Destroy a borrowed resource instead of returning it
    pub fn invalidate(&self, mut resource: Pooled<T>) -> PoolResult<()> {
        if resource.pool_id != self.inner.id {
            return Err(PoolError::ForeignResource);
        }
        match resource.value.take() {
            Some(value) => self.inner.discard(resource.id, value),
            None => Err(PoolError::DoubleReturn),
        }
    }

    /// Run one eviction sweep now
    pub fn evict(&self) -> PoolResult<()> {
        self.inner.evict()
    }

    /// Close the pool
    ///
    /// Idle resources are destroyed right away, blocked borrowers fail with
    /// [`PoolError::PoolClosed`] and borrowed resources are destroyed when
    /// they come back. Closing twice is a no-op.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Snapshot of the pool statistics
    pub fn stats(&self) -> PoolStats {
        let (active, idle, waiters) = {
            let state = self.inner.state.lock();
            (
                state.active.len() + state.returning,
                state.idle.len() + state.under_test,
                state.waiters.len(),
            )
        };
        self.inner.stats.snapshot(active, idle, waiters)
    }

    pub fn num_active(&self) -> usize {
        let state = self.inner.state.lock();
        state.active.len() + state.returning
    }

    pub fn num_idle(&self) -> usize {
        let state = self.inner.state.lock();
        state.idle.len() + state.under_test
    }

    /// Identity of this pool, matching [`Pooled::pool_id`] of its resources
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    fn lend(&self, id: u64, value: T) -> Pooled<T> {
        Pooled {
            value: Some(value),
            id,
            pool_id: self.inner.id,
            pool: Arc::downgrade(&self.inner),
        }
    }
}
