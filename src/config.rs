//! Pool configuration options

use crate::errors::{PoolError, PoolResult};
use crate::eviction::EvictionPolicy;

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for object pool behavior
///
/// Signed fields keep the conventional "negative means unbounded/disabled"
/// encoding so that values read from property maps can be passed through
/// unchanged.
///
/// # Examples
///
/// ```
/// use cryptopool::PoolConfig;
///
/// let config = PoolConfig::new()
///     .with_max_total(16)
///     .with_min_idle(2)
///     .with_max_wait_millis(500)
///     .with_lifo(false);
///
/// assert_eq!(config.max_total, 16);
/// assert_eq!(config.min_idle, 2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of resources (idle + active), negative for no limit
    pub max_total: i32,

    /// Maximum number of idle resources kept, negative for no limit
    pub max_idle: i32,

    /// Number of idle resources the pool tries to keep around
    pub min_idle: i32,

    /// How long a blocking borrow waits, -1 to wait forever
    pub max_wait_millis: i64,

    /// Validate freshly created resources
    pub test_on_create: bool,

    /// Validate idle resources before lending them out
    pub test_on_borrow: bool,

    /// Validate resources when they are returned
    pub test_on_return: bool,

    /// Validate idle resources during eviction sweeps
    pub test_while_idle: bool,

    /// Period of the background eviction sweep, non-positive disables it
    pub eviction_interval_millis: i64,

    /// Idle resources examined per sweep; negative means 1/|n| of the idle count
    pub num_tests_per_eviction_run: i32,

    /// Idle time after which a resource is always evicted, negative disables
    pub min_evictable_idle_millis: i64,

    /// Idle time after which a resource is evicted while above `min_idle`,
    /// negative disables
    pub soft_min_evictable_idle_millis: i64,

    /// Strategy deciding age-based eviction
    pub eviction_policy: EvictionPolicy,

    /// Serve the most recently returned resource first
    pub lifo: bool,

    /// Serve blocked borrowers in arrival order
    pub fairness: bool,

    /// Block instead of failing when the pool is exhausted
    pub block_when_exhausted: bool,
}

impl PoolConfig {
    pub const DEFAULT_MAX_TOTAL: i32 = 8;
    pub const DEFAULT_MAX_IDLE: i32 = 8;
    pub const DEFAULT_MIN_IDLE: i32 = 0;
    pub const DEFAULT_MAX_WAIT_MILLIS: i64 = -1;
    pub const DEFAULT_EVICTION_INTERVAL_MILLIS: i64 = -1;
    pub const DEFAULT_NUM_TESTS_PER_EVICTION_RUN: i32 = 3;
    pub const DEFAULT_MIN_EVICTABLE_IDLE_MILLIS: i64 = 1000 * 60 * 30;
    pub const DEFAULT_SOFT_MIN_EVICTABLE_IDLE_MILLIS: i64 = -1;
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_total: Self::DEFAULT_MAX_TOTAL,
            max_idle: Self::DEFAULT_MAX_IDLE,
            min_idle: Self::DEFAULT_MIN_IDLE,
            max_wait_millis: Self::DEFAULT_MAX_WAIT_MILLIS,
            test_on_create: false,
            test_on_borrow: false,
            test_on_return: false,
            test_while_idle: false,
            eviction_interval_millis: Self::DEFAULT_EVICTION_INTERVAL_MILLIS,
            num_tests_per_eviction_run: Self::DEFAULT_NUM_TESTS_PER_EVICTION_RUN,
            min_evictable_idle_millis: Self::DEFAULT_MIN_EVICTABLE_IDLE_MILLIS,
            soft_min_evictable_idle_millis: Self::DEFAULT_SOFT_MIN_EVICTABLE_IDLE_MILLIS,
            eviction_policy: EvictionPolicy::Default,
            lifo: true,
            fairness: false,
            block_when_exhausted: true,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of resources
    pub fn with_max_total(mut self, max_total: i32) -> Self {
        self.max_total = max_total;
        self
    }

    /// Set the maximum number of idle resources
    pub fn with_max_idle(mut self, max_idle: i32) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set the idle floor
    pub fn with_min_idle(mut self, min_idle: i32) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// Set how long a blocking borrow may wait
    pub fn with_max_wait_millis(mut self, millis: i64) -> Self {
        self.max_wait_millis = millis;
        self
    }

    pub fn with_test_on_create(mut self, enabled: bool) -> Self {
        self.test_on_create = enabled;
        self
    }

    pub fn with_test_on_borrow(mut self, enabled: bool) -> Self {
        self.test_on_borrow = enabled;
        self
    }

    pub fn with_test_on_return(mut self, enabled: bool) -> Self {
        self.test_on_return = enabled;
        self
    }

    pub fn with_test_while_idle(mut self, enabled: bool) -> Self {
        self.test_while_idle = enabled;
        self
    }

    /// Set the eviction sweep period
    ///
    /// # Examples
    ///
    /// ```
    /// use cryptopool::PoolConfig;
    ///
    /// let config = PoolConfig::new()
    ///     .with_eviction_interval_millis(1_000)
    ///     .with_min_evictable_idle_millis(60_000);
    ///
    /// assert_eq!(config.eviction_interval().map(|d| d.as_millis()), Some(1_000));
    /// ```
    pub fn with_eviction_interval_millis(mut self, millis: i64) -> Self {
        self.eviction_interval_millis = millis;
        self
    }

    pub fn with_num_tests_per_eviction_run(mut self, count: i32) -> Self {
        self.num_tests_per_eviction_run = count;
        self
    }

    pub fn with_min_evictable_idle_millis(mut self, millis: i64) -> Self {
        self.min_evictable_idle_millis = millis;
        self
    }

    pub fn with_soft_min_evictable_idle_millis(mut self, millis: i64) -> Self {
        self.soft_min_evictable_idle_millis = millis;
        self
    }

    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    pub fn with_lifo(mut self, lifo: bool) -> Self {
        self.lifo = lifo;
        self
    }

    pub fn with_fairness(mut self, fairness: bool) -> Self {
        self.fairness = fairness;
        self
    }

    pub fn with_block_when_exhausted(mut self, block: bool) -> Self {
        self.block_when_exhausted = block;
        self
    }

    /// Check the range invariants of the configuration
    pub fn validate(&self) -> PoolResult<()> {
        if self.min_idle < 0 {
            return Err(PoolError::InvalidConfig(format!(
                "min_idle must be >= 0, got {}",
                self.min_idle
            )));
        }
        if self.max_wait_millis < -1 {
            return Err(PoolError::InvalidConfig(format!(
                "max_wait_millis must be >= -1, got {}",
                self.max_wait_millis
            )));
        }
        if self.eviction_interval_millis < -1 {
            return Err(PoolError::InvalidConfig(format!(
                "eviction_interval_millis must be >= -1, got {}",
                self.eviction_interval_millis
            )));
        }
        Ok(())
    }

    /// The capacity limit, `None` when unbounded
    pub fn max_total_limit(&self) -> Option<usize> {
        usize::try_from(self.max_total).ok()
    }

    /// The idle limit, `None` when unbounded
    pub fn max_idle_limit(&self) -> Option<usize> {
        usize::try_from(self.max_idle).ok()
    }

    pub(crate) fn min_idle_count(&self) -> usize {
        usize::try_from(self.min_idle).unwrap_or(0)
    }

    /// The blocking borrow limit, `None` when waiting forever
    pub fn max_wait(&self) -> Option<Duration> {
        millis(self.max_wait_millis)
    }

    /// The eviction sweep period, `None` when no evictor runs
    pub fn eviction_interval(&self) -> Option<Duration> {
        if self.eviction_interval_millis > 0 {
            millis(self.eviction_interval_millis)
        } else {
            None
        }
    }

    pub fn min_evictable_idle(&self) -> Option<Duration> {
        millis(self.min_evictable_idle_millis)
    }

    pub fn soft_min_evictable_idle(&self) -> Option<Duration> {
        millis(self.soft_min_evictable_idle_millis)
    }

    /// Number of idle resources one sweep examines out of `idle_count`
    pub fn num_tests(&self, idle_count: usize) -> usize {
        let n = self.num_tests_per_eviction_run;
        if n >= 0 {
            (n as usize).min(idle_count)
        } else {
            idle_count.div_ceil(n.unsigned_abs() as usize)
        }
    }

    /// Build a configuration from a flat property map
    ///
    /// Recognized keys override the defaults; missing keys keep them, and
    /// values that fail to parse or violate an invariant are logged and
    /// replaced by the default.
    ///
    /// # Examples
    ///
    /// ```
    /// use cryptopool::PoolConfig;
    /// use std::collections::HashMap;
    ///
    /// let mut props = HashMap::new();
    /// props.insert("maxTotal".to_string(), "32".to_string());
    /// props.insert("lifo".to_string(), "false".to_string());
    /// props.insert("minIdle".to_string(), "not a number".to_string());
    ///
    /// let config = PoolConfig::from_properties(&props);
    /// assert_eq!(config.max_total, 32);
    /// assert!(!config.lifo);
    /// assert_eq!(config.min_idle, 0);
    /// ```
    pub fn from_properties(properties: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let props = Properties(properties);

        let min_idle = props.parse_checked(&["minIdle"], defaults.min_idle, |v| *v >= 0);
        let max_wait_millis =
            props.parse_checked(&["maxWaitMillis"], defaults.max_wait_millis, |v| *v >= -1);
        let eviction_interval_millis = props.parse_checked(
            &["evictionIntervalMillis", "timeBetweenEvictionRunsMillis"],
            defaults.eviction_interval_millis,
            |v| *v >= -1,
        );

        let eviction_policy = match props.get(&["evictionPolicy", "evictionPolicyClassName"]) {
            Some(name) => EvictionPolicy::from_name(name).unwrap_or_else(|| {
                tracing::warn!(
                    value = %name,
                    "unknown eviction policy, using the default policy"
                );
                EvictionPolicy::Default
            }),
            None => EvictionPolicy::Default,
        };

        Self {
            max_total: props.parse(&["maxTotal"], defaults.max_total),
            max_idle: props.parse(&["maxIdle"], defaults.max_idle),
            min_idle,
            max_wait_millis,
            test_on_create: props.parse(&["testOnCreate"], defaults.test_on_create),
            test_on_borrow: props.parse(&["testOnBorrow"], defaults.test_on_borrow),
            test_on_return: props.parse(&["testOnReturn"], defaults.test_on_return),
            test_while_idle: props.parse(&["testWhileIdle"], defaults.test_while_idle),
            eviction_interval_millis,
            num_tests_per_eviction_run: props.parse(
                &["numTestsPerEvictionRun"],
                defaults.num_tests_per_eviction_run,
            ),
            min_evictable_idle_millis: props.parse(
                &["minEvictableIdleMillis", "minEvictableIdleTimeMillis"],
                defaults.min_evictable_idle_millis,
            ),
            soft_min_evictable_idle_millis: props.parse(
                &["softMinEvictableIdleMillis", "softMinEvictableIdleTimeMillis"],
                defaults.soft_min_evictable_idle_millis,
            ),
            eviction_policy,
            lifo: props.parse(&["lifo"], defaults.lifo),
            fairness: props.parse(&["fairness"], defaults.fairness),
            block_when_exhausted: props.parse(&["blockWhenExhausted"], defaults.block_when_exhausted),
        }
    }
}

fn millis(value: i64) -> Option<Duration> {
    u64::try_from(value).ok().map(Duration::from_millis)
}

/// Lookup helper over a property map with aliased keys
pub(crate) struct Properties<'a>(pub(crate) &'a HashMap<String, String>);

impl Properties<'_> {
    pub(crate) fn get(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|key| self.0.get(*key))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn parse<V>(&self, keys: &[&str], default: V) -> V
    where
        V: FromStr + std::fmt::Display,
    {
        self.parse_checked(keys, default, |_| true)
    }

    pub(crate) fn parse_checked<V>(&self, keys: &[&str], default: V, valid: impl Fn(&V) -> bool) -> V
    where
        V: FromStr + std::fmt::Display,
    {
        let Some(raw) = self.get(keys) else {
            return default;
        };
        match raw.parse::<V>() {
            Ok(value) if valid(&value) => value,
            Ok(_) | Err(_) => {
                tracing::warn!(
                    key = keys[0],
                    value = raw,
                    default = %default,
                    "invalid pool property, using the default"
                );
                default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_total, 8);
        assert_eq!(config.max_idle, 8);
        assert_eq!(config.min_idle, 0);
        assert_eq!(config.max_wait_millis, -1);
        assert_eq!(config.eviction_interval_millis, -1);
        assert_eq!(config.num_tests_per_eviction_run, 3);
        assert_eq!(config.min_evictable_idle_millis, 1_800_000);
        assert_eq!(config.soft_min_evictable_idle_millis, -1);
        assert!(config.lifo);
        assert!(!config.fairness);
        assert!(config.block_when_exhausted);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        for config in [
            PoolConfig::default().with_min_idle(-1),
            PoolConfig::default().with_max_wait_millis(-2),
            PoolConfig::default().with_eviction_interval_millis(-5),
        ] {
            assert!(matches!(config.validate(), Err(PoolError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_limits() {
        let config = PoolConfig::default().with_max_total(-1).with_max_idle(4);
        assert_eq!(config.max_total_limit(), None);
        assert_eq!(config.max_idle_limit(), Some(4));
        assert_eq!(config.max_wait(), None);
        assert_eq!(config.eviction_interval(), None);
        assert_eq!(config.soft_min_evictable_idle(), None);
        assert_eq!(
            PoolConfig::default().with_eviction_interval_millis(0).eviction_interval(),
            None
        );
    }

    #[test]
    fn test_num_tests_per_run() {
        let config = PoolConfig::default().with_num_tests_per_eviction_run(3);
        assert_eq!(config.num_tests(10), 3);
        assert_eq!(config.num_tests(2), 2);

        let config = PoolConfig::default().with_num_tests_per_eviction_run(-4);
        assert_eq!(config.num_tests(10), 3);
        assert_eq!(config.num_tests(0), 0);
    }

    #[test]
    fn test_from_properties_aliases() {
        let config = PoolConfig::from_properties(&props(&[
            ("timeBetweenEvictionRunsMillis", "5000"),
            ("minEvictableIdleTimeMillis", "60000"),
            ("softMinEvictableIdleTimeMillis", "1000"),
            ("evictionPolicyClassName", "DefaultEvictionPolicy"),
            ("fairness", "true"),
        ]));
        assert_eq!(config.eviction_interval_millis, 5000);
        assert_eq!(config.min_evictable_idle_millis, 60_000);
        assert_eq!(config.soft_min_evictable_idle_millis, 1000);
        assert!(matches!(config.eviction_policy, EvictionPolicy::Default));
        assert!(config.fairness);
    }

    #[test]
    fn test_from_properties_invalid_values_fall_back() {
        let config = PoolConfig::from_properties(&props(&[
            ("maxWaitMillis", "-7"),
            ("evictionIntervalMillis", "-3"),
            ("lifo", "maybe"),
            ("evictionPolicy", "com.example.Custom"),
        ]));
        assert_eq!(config.max_wait_millis, -1);
        assert_eq!(config.eviction_interval_millis, -1);
        assert!(config.lifo);
        assert!(matches!(config.eviction_policy, EvictionPolicy::Default));
        assert!(config.validate().is_ok());
    }
}
