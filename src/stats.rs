//! Pool statistics

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Number of recent samples the mean statistics are computed over
pub const MEAN_WINDOW: usize = 100;

/// Point-in-time statistics of a pool
///
/// # Examples
///
/// ```
/// use cryptopool::{FnFactory, ObjectPool, PoolConfig};
///
/// let pool = ObjectPool::new(FnFactory::new(|| Ok(0u8)), PoolConfig::default()).unwrap();
///
/// let a = pool.borrow().unwrap();
/// let b = pool.borrow().unwrap();
/// pool.return_object(a).unwrap();
/// pool.return_object(b).unwrap();
///
/// let stats = pool.stats();
/// assert_eq!(stats.count_borrowed, 2);
/// assert_eq!(stats.count_returned, 2);
/// assert_eq!(stats.num_active, 0);
/// assert_eq!(stats.num_idle, 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStats {
    /// Resources currently lent out
    pub num_active: usize,

    /// Resources currently idle in the pool
    pub num_idle: usize,

    /// Threads blocked in `borrow`
    pub num_waiters: usize,

    pub count_borrowed: u64,
    pub count_created: u64,
    pub count_destroyed: u64,
    pub count_destroyed_by_borrow_validation: u64,
    pub count_destroyed_by_evictor: u64,
    pub count_returned: u64,

    /// Mean time resources stayed borrowed, over the recent window
    pub mean_active_time_millis: u64,

    /// Mean time borrowers waited, over the recent window
    pub mean_borrow_wait_time_millis: u64,

    /// Mean time resources sat idle before being borrowed, over the recent window
    pub mean_idle_time_millis: u64,
}

/// Arithmetic mean over a fixed-size ring of recent samples
#[derive(Debug)]
pub(crate) struct RollingMean {
    samples: [u64; MEAN_WINDOW],
    next: usize,
    len: usize,
}

impl RollingMean {
    pub fn new() -> Self {
        Self {
            samples: [0; MEAN_WINDOW],
            next: 0,
            len: 0,
        }
    }

    pub fn add(&mut self, sample: u64) {
        self.samples[self.next] = sample;
        self.next = (self.next + 1) % MEAN_WINDOW;
        self.len = (self.len + 1).min(MEAN_WINDOW);
    }

    pub fn mean(&self) -> u64 {
        if self.len == 0 {
            return 0;
        }
        let total: u128 = self.samples[..self.len].iter().map(|s| *s as u128).sum();
        (total / self.len as u128) as u64
    }
}

impl Default for RollingMean {
    fn default() -> Self {
        Self::new()
    }
}

/// Live counters of a pool
pub(crate) struct StatsTracker {
    pub borrowed: AtomicU64,
    pub created: AtomicU64,
    pub destroyed: AtomicU64,
    pub destroyed_by_borrow_validation: AtomicU64,
    pub destroyed_by_evictor: AtomicU64,
    pub returned: AtomicU64,
    active_times: Mutex<RollingMean>,
    wait_times: Mutex<RollingMean>,
    idle_times: Mutex<RollingMean>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            borrowed: AtomicU64::new(0),
            created: AtomicU64::new(0),
            destroyed: AtomicU64::new(0),
            destroyed_by_borrow_validation: AtomicU64::new(0),
            destroyed_by_evictor: AtomicU64::new(0),
            returned: AtomicU64::new(0),
            active_times: Mutex::new(RollingMean::new()),
            wait_times: Mutex::new(RollingMean::new()),
            idle_times: Mutex::new(RollingMean::new()),
        }
    }

    pub fn record_borrow(&self, idle_time: Duration, wait_time: Duration) {
        self.borrowed.fetch_add(1, Ordering::Relaxed);
        self.idle_times.lock().add(as_millis(idle_time));
        self.wait_times.lock().add(as_millis(wait_time));
    }

    pub fn record_return(&self, active_time: Duration) {
        self.returned.fetch_add(1, Ordering::Relaxed);
        self.active_times.lock().add(as_millis(active_time));
    }

    pub fn snapshot(&self, num_active: usize, num_idle: usize, num_waiters: usize) -> PoolStats {
        PoolStats {
            num_active,
            num_idle,
            num_waiters,
            count_borrowed: self.borrowed.load(Ordering::Relaxed),
            count_created: self.created.load(Ordering::Relaxed),
            count_destroyed: self.destroyed.load(Ordering::Relaxed),
            count_destroyed_by_borrow_validation: self
                .destroyed_by_borrow_validation
                .load(Ordering::Relaxed),
            count_destroyed_by_evictor: self.destroyed_by_evictor.load(Ordering::Relaxed),
            count_returned: self.returned.load(Ordering::Relaxed),
            mean_active_time_millis: self.active_times.lock().mean(),
            mean_borrow_wait_time_millis: self.wait_times.lock().mean(),
            mean_idle_time_millis: self.idle_times.lock().mean(),
        }
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
