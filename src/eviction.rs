//! Eviction policies and the background eviction thread

use crate::config::PoolConfig;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Eviction policy deciding whether an idle resource is removed because of
/// its age
///
/// Validation of idle resources (`test_while_idle`) is applied by the pool
/// independently of the policy.
///
/// # Examples
///
/// ```
/// use cryptopool::{EvictionContext, EvictionPolicy, PoolConfig};
/// use std::time::Duration;
///
/// fn older_than_a_minute(ctx: &EvictionContext) -> bool {
///     ctx.age > Duration::from_secs(60)
/// }
///
/// let config = PoolConfig::new()
///     .with_eviction_policy(EvictionPolicy::Custom(older_than_a_minute));
///
/// assert!(matches!(config.eviction_policy, EvictionPolicy::Custom(_)));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub enum EvictionPolicy {
    /// Evict past `min_evictable_idle`, or past `soft_min_evictable_idle`
    /// while more than `min_idle` resources are idle
    #[default]
    Default,

    /// User supplied decision function
    Custom(fn(&EvictionContext) -> bool),
}

impl EvictionPolicy {
    /// Look up a policy by its configuration name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" | "defaultevictionpolicy" => Some(Self::Default),
            _ => None,
        }
    }

    /// Decide whether the resource described by `ctx` should be evicted
    pub fn evict(&self, ctx: &EvictionContext) -> bool {
        match self {
            Self::Default => {
                let hard = ctx.min_evictable_idle.is_some_and(|limit| ctx.idle_time >= limit);
                let soft = ctx
                    .soft_min_evictable_idle
                    .is_some_and(|limit| ctx.idle_time >= limit && ctx.idle_count > ctx.min_idle);
                hard || soft
            }
            Self::Custom(decide) => decide(ctx),
        }
    }
}

/// Facts about one idle resource handed to an [`EvictionPolicy`]
#[derive(Debug, Clone)]
pub struct EvictionContext {
    /// Time since the resource was last returned (or created)
    pub idle_time: Duration,

    /// Time since the resource was created
    pub age: Duration,

    /// Idle resources currently in the pool, including this one
    pub idle_count: usize,

    /// The configured idle floor
    pub min_idle: usize,

    pub min_evictable_idle: Option<Duration>,
    pub soft_min_evictable_idle: Option<Duration>,
}

impl EvictionContext {
    pub(crate) fn new(meta: &ResourceMeta, idle_count: usize, config: &PoolConfig, now: Instant) -> Self {
        Self {
            idle_time: now.saturating_duration_since(meta.last_returned),
            age: now.saturating_duration_since(meta.created_at),
            idle_count,
            min_idle: config.min_idle_count(),
            min_evictable_idle: config.min_evictable_idle(),
            soft_min_evictable_idle: config.soft_min_evictable_idle(),
        }
    }
}

/// Lifecycle state of a pooled resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResourceState {
    Idle,
    Active,
}

/// Bookkeeping kept for every resource a pool owns
#[derive(Debug, Clone)]
pub(crate) struct ResourceMeta {
    pub id: u64,
    pub state: ResourceState,
    pub created_at: Instant,
    pub last_borrowed: Instant,
    pub last_returned: Instant,
}

impl ResourceMeta {
    pub fn new(id: u64) -> Self {
        let now = Instant::now();
        Self {
            id,
            state: ResourceState::Idle,
            created_at: now,
            last_borrowed: now,
            last_returned: now,
        }
    }

    /// Mark as lent out, returning how long the resource sat idle
    pub fn activate(&mut self, now: Instant) -> Duration {
        self.state = ResourceState::Active;
        self.last_borrowed = now;
        now.saturating_duration_since(self.last_returned)
    }

    /// Mark as idle again, returning how long the resource was lent out
    pub fn deactivate(&mut self, now: Instant) -> Duration {
        self.state = ResourceState::Idle;
        self.last_returned = now;
        now.saturating_duration_since(self.last_borrowed)
    }
}

/// Handle to a running eviction thread
///
/// The thread ticks every `interval` and stops when the sweep closure
/// returns `false` or the handle is stopped or dropped.
pub(crate) struct Evictor {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Evictor {
    pub fn spawn<F>(name: String, interval: Duration, mut sweep: F) -> std::io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (shutdown, ticks) = channel::bounded::<()>(0);
        let handle = thread::Builder::new().name(name).spawn(move || {
            loop {
                match ticks.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !sweep() {
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("evictor stopped");
        })?;

        Ok(Self {
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        // Disconnecting the channel wakes the thread immediately.
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            // The last pool handle may be released by the evictor itself.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for Evictor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx(idle_secs: u64, idle_count: usize, config: &PoolConfig) -> EvictionContext {
        EvictionContext {
            idle_time: Duration::from_secs(idle_secs),
            age: Duration::from_secs(idle_secs),
            idle_count,
            min_idle: config.min_idle_count(),
            min_evictable_idle: config.min_evictable_idle(),
            soft_min_evictable_idle: config.soft_min_evictable_idle(),
        }
    }

    #[test]
    fn test_default_policy_hard_criterion_ignores_floor() {
        let config = PoolConfig::new()
            .with_min_idle(5)
            .with_min_evictable_idle_millis(10_000);

        assert!(EvictionPolicy::Default.evict(&ctx(10, 1, &config)));
        assert!(!EvictionPolicy::Default.evict(&ctx(9, 1, &config)));
    }

    #[test]
    fn test_default_policy_soft_criterion_respects_floor() {
        let config = PoolConfig::new()
            .with_min_idle(2)
            .with_min_evictable_idle_millis(-1)
            .with_soft_min_evictable_idle_millis(1_000);

        assert!(EvictionPolicy::Default.evict(&ctx(5, 3, &config)));
        assert!(!EvictionPolicy::Default.evict(&ctx(5, 2, &config)));
        assert!(!EvictionPolicy::Default.evict(&ctx(0, 3, &config)));
    }

    #[test]
    fn test_policy_from_name() {
        assert!(matches!(EvictionPolicy::from_name("default"), Some(EvictionPolicy::Default)));
        assert!(matches!(
            EvictionPolicy::from_name("DefaultEvictionPolicy"),
            Some(EvictionPolicy::Default)
        ));
        assert!(EvictionPolicy::from_name("lru").is_none());
    }

    #[test]
    fn test_meta_tracks_idle_and_active_time() {
        let mut meta = ResourceMeta::new(7);
        let later = meta.created_at + Duration::from_millis(50);
        assert_eq!(meta.activate(later), Duration::from_millis(50));
        assert_eq!(meta.state, ResourceState::Active);

        let returned = later + Duration::from_millis(20);
        assert_eq!(meta.deactivate(returned), Duration::from_millis(20));
        assert_eq!(meta.state, ResourceState::Idle);
    }

    #[test]
    fn test_evictor_ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let mut evictor = Evictor::spawn("test-evictor".into(), Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })
        .unwrap();

        thread::sleep(Duration::from_millis(60));
        evictor.stop();
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 1);

        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn test_evictor_stops_when_sweep_declines() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let _evictor = Evictor::spawn("test-evictor".into(), Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }
}
