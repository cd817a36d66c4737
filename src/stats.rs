//! Point-in-time view of a connection pool

/// Snapshot of slot and queue occupancy
///
/// The counters are read one after another without a global lock, so under
/// concurrent use they may not add up exactly.
///
/// # Examples
///
/// ```
/// use esox_connectionpool::{ConnectionPool, ConnectionState, PooledConnection, PoolConfiguration};
/// use std::sync::Arc;
///
/// struct Conn(ConnectionState);
///
/// impl PooledConnection for Conn {
///     fn is_closed(&self) -> bool { false }
///     fn state(&self) -> &ConnectionState { &self.0 }
/// }
///
/// let pool = ConnectionPool::new(PoolConfiguration::new().with_max_pool_size(4)).unwrap();
/// let index = pool.apply_index().unwrap();
/// pool.put_occupied_connection(Arc::new(Conn(ConnectionState::new())), index).unwrap();
///
/// let stats = pool.stats();
/// assert_eq!(stats.issued_slots, 1);
/// assert_eq!(stats.occupied_connections, 1);
/// assert_eq!(stats.utilization, 0.25);
/// assert!(!stats.is_exhausted());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolStats {
    /// Total number of slots
    pub max_pool_size: usize,

    /// Slots handed out by `apply_index` so far
    pub issued_slots: usize,

    /// Connections waiting in the idle queue
    pub idle_connections: usize,

    /// Installed connections currently handed out
    pub occupied_connections: usize,

    /// Connections parked in the frozen queue
    pub frozen_connections: usize,

    /// Occupied connections over capacity (0.0 to 1.0)
    pub utilization: f64,

    pub reaper_enabled: bool,

    pub reclaimer_enabled: bool,
}

impl PoolStats {
    /// True when no new slot can be issued and nothing is waiting to be reused
    pub fn is_exhausted(&self) -> bool {
        self.issued_slots >= self.max_pool_size && self.idle_connections == 0
    }
}
