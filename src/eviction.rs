//! Eviction policies run by the background workers
//!
//! Both policies only go through the pool's public surface: they read an
//! idle snapshot and call [`ConnectionPool::freeze`], which loses gracefully
//! to any acquirer that claims the same connection first.

use crate::connection::PooledConnection;
use crate::errors::PoolError;
use crate::pool::ConnectionPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Freezes idle connections that have not been used for too long
///
/// # Examples
///
/// ```
/// use esox_connectionpool::{ConnectionPool, ConnectionState, PooledConnection, PoolConfiguration, Reaper};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// struct Conn(ConnectionState);
///
/// impl PooledConnection for Conn {
///     fn is_closed(&self) -> bool { false }
///     fn state(&self) -> &ConnectionState { &self.0 }
/// }
///
/// let pool = ConnectionPool::new(PoolConfiguration::new().with_max_pool_size(2)).unwrap();
/// pool.put_leisure_connection(Arc::new(Conn(ConnectionState::new())), 0).unwrap();
///
/// std::thread::sleep(Duration::from_millis(20));
/// let frozen = Reaper::new(Duration::from_millis(10)).sweep(&pool);
///
/// assert_eq!(frozen, 1);
/// assert!(pool.actionable());
/// ```
#[derive(Debug, Clone)]
pub struct Reaper {
    max_idle_time: Duration,
}

impl Reaper {
    pub fn new(max_idle_time: Duration) -> Self {
        Self { max_idle_time }
    }

    pub fn max_idle_time(&self) -> Duration {
        self.max_idle_time
    }

    /// Freeze every idle connection past the threshold. Returns how many were frozen.
    pub fn sweep<C: PooledConnection>(&self, pool: &ConnectionPool<C>) -> usize {
        let stale: Vec<Arc<C>> = pool
            .idle_connections()
            .into_iter()
            .filter(|conn| conn.idle_for() > self.max_idle_time)
            .collect();

        let frozen = freeze_all(pool, stale, "reaper");
        if frozen > 0 {
            debug!(frozen, max_idle_ms = self.max_idle_time.as_millis() as u64, "reaper froze stale connections");
        }
        frozen
    }
}

/// Keeps the idle set under a watermark by freezing the least recently used connections
#[derive(Debug, Clone)]
pub struct Reclaimer {
    max_idle_connections: usize,
}

impl Reclaimer {
    pub fn new(max_idle_connections: usize) -> Self {
        Self { max_idle_connections }
    }

    pub fn max_idle_connections(&self) -> usize {
        self.max_idle_connections
    }

    pub fn sweep<C: PooledConnection>(&self, pool: &ConnectionPool<C>) -> usize {
        let mut idle = pool.idle_connections();
        if idle.len() <= self.max_idle_connections {
            return 0;
        }

        let surplus = idle.len() - self.max_idle_connections;
        idle.sort_by_key(|conn| conn.last_active());
        idle.truncate(surplus);

        let frozen = freeze_all(pool, idle, "reclaimer");
        if frozen > 0 {
            debug!(frozen, watermark = self.max_idle_connections, "reclaimer evicted idle connections");
        }
        frozen
    }
}

fn freeze_all<C: PooledConnection>(pool: &ConnectionPool<C>, candidates: Vec<Arc<C>>, worker: &str) -> usize {
    let mut frozen = 0;
    for conn in candidates {
        match pool.freeze(&conn) {
            Ok(true) => frozen += 1,
            Ok(false) => trace!(worker, index = ?conn.index(), "connection claimed before it could be frozen"),
            Err(PoolError::FrozenQueueFull) => {
                warn!(worker, "frozen queue is full, deferring remaining evictions");
                break;
            }
            Err(e) => {
                debug!(worker, error = %e, "sweep aborted");
                break;
            }
        }
    }
    frozen
}
