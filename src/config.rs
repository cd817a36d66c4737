//! Pool configuration options

use crate::errors::{PoolError, PoolResult};
use std::time::Duration;

/// Fixed period between two sweeps of a background worker.
pub(crate) const SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for connection pool behavior
///
/// Everything here is read once at construction; the pool never mutates it.
///
/// # Examples
///
/// ```
/// use esox_connectionpool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_max_pool_size(16)
///     .with_max_idle_time(Duration::from_secs(30))
///     .with_max_idle_connections(4);
///
/// assert_eq!(config.max_pool_size, 16);
/// assert_eq!(config.max_idle_connections, 4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfiguration {
    /// Number of slots, and capacity of both the idle and the frozen queue
    pub max_pool_size: usize,

    /// Idle time after which the reaper freezes a connection
    pub max_idle_time: Duration,

    /// Idle set size above which the reclaimer starts evicting
    pub max_idle_connections: usize,

    /// Upper bound between two scans of the idle queue while an acquirer waits
    pub acquire_recheck: Duration,

    #[cfg_attr(feature = "serde", serde(skip, default = "default_scan_interval"))]
    pub(crate) scan_interval: Duration,
}

#[cfg(feature = "serde")]
fn default_scan_interval() -> Duration {
    SCAN_INTERVAL
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            max_pool_size: 100,
            max_idle_time: Duration::from_secs(60),
            max_idle_connections: 50,
            acquire_recheck: Duration::from_millis(10),
            scan_interval: SCAN_INTERVAL,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of slots
    ///
    /// The reclaimer watermark follows at half the capacity; call
    /// [`with_max_idle_connections`](Self::with_max_idle_connections)
    /// afterwards to override it.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_connectionpool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_max_pool_size(5);
    ///
    /// assert_eq!(config.max_pool_size, 5);
    /// assert_eq!(config.max_idle_connections, 3);
    /// ```
    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self.max_idle_connections = size.div_ceil(2).max(1);
        self
    }

    /// Set the staleness threshold used by the reaper
    pub fn with_max_idle_time(mut self, idle: Duration) -> Self {
        self.max_idle_time = idle;
        self
    }

    /// Set the reclaimer watermark
    pub fn with_max_idle_connections(mut self, count: usize) -> Self {
        self.max_idle_connections = count;
        self
    }

    /// Set how often a waiting acquirer rescans the idle queue
    pub fn with_acquire_recheck(mut self, period: Duration) -> Self {
        self.acquire_recheck = period;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Check the configuration before a pool is built from it
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_pool_size == 0 {
            return Err(PoolError::InvalidConfiguration(
                "max_pool_size must be at least 1".to_string(),
            ));
        }
        if self.max_idle_time.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "max_idle_time must be non-zero".to_string(),
            ));
        }
        if self.acquire_recheck.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "acquire_recheck must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PoolConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scan_interval, SCAN_INTERVAL);
    }

    #[test]
    fn test_watermark_follows_capacity() {
        assert_eq!(PoolConfiguration::new().with_max_pool_size(1).max_idle_connections, 1);
        assert_eq!(PoolConfiguration::new().with_max_pool_size(10).max_idle_connections, 5);

        let config = PoolConfiguration::new()
            .with_max_pool_size(10)
            .with_max_idle_connections(8);
        assert_eq!(config.max_idle_connections, 8);
    }

    #[test]
    fn test_rejects_zero_values() {
        let zero_size = PoolConfiguration::new().with_max_pool_size(0);
        assert!(matches!(zero_size.validate(), Err(PoolError::InvalidConfiguration(_))));

        let zero_idle = PoolConfiguration::new().with_max_idle_time(Duration::ZERO);
        assert!(matches!(zero_idle.validate(), Err(PoolError::InvalidConfiguration(_))));

        let zero_recheck = PoolConfiguration::new().with_acquire_recheck(Duration::ZERO);
        assert!(matches!(zero_recheck.validate(), Err(PoolError::InvalidConfiguration(_))));
    }
}
