//! Core connection pool implementation

use crate::config::PoolConfiguration;
use crate::connection::PooledConnection;
use crate::errors::{PoolError, PoolResult};
use crate::eviction::{Reaper, Reclaimer};
use crate::features::PoolFeature;
use crate::queue::{BoundedQueue, Rejected};
use crate::stats::PoolStats;
use crate::worker::Worker;

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Bounded pool of reusable network connections
///
/// The pool owns a fixed table of slots, an idle queue of connections ready
/// for reuse, and a frozen queue of connections an eviction worker has
/// demoted. There is no global lock: slot issuance goes through an atomic
/// counter and every queue carries its own lock.
///
/// # Examples
///
/// ```
/// use esox_connectionpool::{ConnectionPool, ConnectionState, PooledConnection, PoolConfiguration};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::time::Duration;
///
/// struct Conn {
///     closed: AtomicBool,
///     state: ConnectionState,
/// }
///
/// impl PooledConnection for Conn {
///     fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }
///     fn state(&self) -> &ConnectionState { &self.state }
/// }
///
/// let pool = ConnectionPool::new(PoolConfiguration::new().with_max_pool_size(1)).unwrap();
///
/// let index = pool.apply_index().unwrap();
/// let conn = Arc::new(Conn { closed: AtomicBool::new(false), state: ConnectionState::new() });
/// pool.put_leisure_connection(Arc::clone(&conn), index).unwrap();
/// assert!(pool.assignable());
///
/// // The transport closed it, so its slot can be redialed
/// conn.closed.store(true, Ordering::Release);
/// let reusable = pool.get_idle_connection(Duration::from_millis(100)).unwrap();
/// assert_eq!(reusable.index(), Some(0));
/// assert!(reusable.state().is_occupied());
/// ```
pub struct ConnectionPool<C: PooledConnection> {
    config: PoolConfiguration,
    slots: Box<[RwLock<Option<Arc<C>>>]>,
    next_index: AtomicUsize,
    idle: BoundedQueue<Arc<C>>,
    frozen: BoundedQueue<Arc<C>>,
    workers: Mutex<HashMap<PoolFeature, Worker>>,
}

impl<C: PooledConnection> ConnectionPool<C> {
    /// Create an empty pool
    pub fn new(config: PoolConfiguration) -> PoolResult<Self> {
        config.validate()?;

        let capacity = config.max_pool_size;
        let slots = (0..capacity).map(|_| RwLock::new(None)).collect();

        debug!(
            max_pool_size = capacity,
            max_idle_time_ms = config.max_idle_time.as_millis() as u64,
            "connection pool created"
        );

        Ok(Self {
            config,
            slots,
            next_index: AtomicUsize::new(0),
            idle: BoundedQueue::new(capacity),
            frozen: BoundedQueue::new(capacity),
            workers: Mutex::new(HashMap::new()),
        })
    }

    /// Issue a fresh slot index, or `None` once every slot has been issued
    ///
    /// Indices are handed out exactly once. After exhaustion, callers must
    /// reuse connections through the idle queue.
    pub fn apply_index(&self) -> Option<usize> {
        let max = self.config.max_pool_size;
        match self
            .next_index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |issued| {
                (issued < max).then_some(issued + 1)
            }) {
            Ok(index) => {
                trace!(index, "slot issued");
                Some(index)
            }
            Err(_) => {
                trace!(max_pool_size = max, "slot table exhausted");
                None
            }
        }
    }

    /// Whether the idle queue holds anything right now. Not a reservation.
    pub fn assignable(&self) -> bool {
        !self.idle.is_empty()
    }

    /// Whether frozen connections are waiting for disposal
    pub fn actionable(&self) -> bool {
        !self.frozen.is_empty()
    }

    /// Wait up to `wait` for an idle connection whose transport has closed
    ///
    /// A candidate is taken only if it reports closed *and* switches to
    /// occupied; open idle connections are left in the queue untouched. The
    /// deadline is fixed on entry, so a zero budget fails at once.
    /// [`PooledConnection::is_closed`] runs under the idle-queue lock.
    ///
    /// # Errors
    ///
    /// [`PoolError::AcquireTimeout`] when the budget runs out, and
    /// [`PoolError::AcquisitionInterrupted`] when the pool shuts down during
    /// the wait.
    pub fn get_idle_connection(&self, wait: Duration) -> PoolResult<Arc<C>> {
        let start = Instant::now();
        let deadline = start
            .checked_add(wait)
            .unwrap_or_else(|| start + Duration::from_secs(u32::MAX as u64));

        let claimed = self
            .idle
            .poll_where(deadline, self.config.acquire_recheck, |conn| {
                conn.is_closed() && conn.state().switch_occupied()
            })
            .map_err(|_| {
                debug!("acquire interrupted by shutdown");
                PoolError::AcquisitionInterrupted
            })?;

        match claimed {
            Some(conn) => {
                debug!(
                    index = ?conn.index(),
                    waited_ms = start.elapsed().as_millis() as u64,
                    "claimed closed idle connection"
                );
                Ok(conn)
            }
            None => {
                debug!(wait_ms = wait.as_millis() as u64, "acquire timed out");
                Err(PoolError::AcquireTimeout(wait))
            }
        }
    }

    /// Async variant of [`get_idle_connection`](Self::get_idle_connection)
    ///
    /// The wait runs on tokio's blocking thread pool.
    pub async fn get_idle_connection_async(self: &Arc<Self>, wait: Duration) -> PoolResult<Arc<C>> {
        let pool = Arc::clone(self);
        tokio::task::spawn_blocking(move || pool.get_idle_connection(wait))
            .await
            .map_err(|_| PoolError::AcquisitionInterrupted)?
    }

    /// Take one frozen connection, if any, without waiting
    pub fn get_freeze_connection(&self) -> Option<Arc<C>> {
        let conn = self.frozen.try_poll()?;
        trace!(index = ?conn.index(), "frozen connection handed out");
        Some(conn)
    }

    /// Install a connection that goes straight to a caller
    ///
    /// A connection still parked in the frozen queue is pulled out of it, so
    /// disposal never receives an occupied connection.
    pub fn put_occupied_connection(&self, conn: Arc<C>, index: usize) -> PoolResult<Arc<C>> {
        self.ensure_open()?;
        let slot = self.slot_cell(index)?;

        // Once occupied, no worker can freeze it again
        conn.state().mark_occupied();
        conn.state().set_index(index);
        *slot.write() = Some(Arc::clone(&conn));
        self.idle.remove_where(|queued| Arc::ptr_eq(queued, &conn));
        if self.frozen.remove_where(|queued| Arc::ptr_eq(queued, &conn)).is_some() {
            debug!(index, "frozen connection reinstalled as occupied");
        }

        trace!(index, "occupied connection installed");
        Ok(conn)
    }

    /// Install a connection and make it available for reuse
    ///
    /// The connection ends up in the idle queue exactly once, even if it was
    /// already queued. When the queue rejects it, neither the slot table nor
    /// the connection is modified.
    pub fn put_leisure_connection(&self, conn: Arc<C>, index: usize) -> PoolResult<Arc<C>> {
        self.ensure_open()?;
        let slot = self.slot_cell(index)?;

        let offered = self.idle.offer_if_absent_with(
            Arc::clone(&conn),
            |queued, new| Arc::ptr_eq(queued, new),
            |admitted| {
                admitted.state().mark_idle();
                admitted.state().set_index(index);
                *slot.write() = Some(Arc::clone(admitted));
            },
        );
        idle_offer_result(offered)?;

        trace!(index, "idle connection installed");
        Ok(conn)
    }

    /// Hand a connection back to the idle queue
    ///
    /// Neither the slot table nor the connection's state is touched.
    /// Recycling a connection that is already queued is a no-op.
    ///
    /// # Errors
    ///
    /// [`PoolError::IdleQueueFull`] if the queue is at capacity.
    pub fn recycle(&self, conn: Arc<C>) -> PoolResult<()> {
        self.enqueue_idle(conn)
    }

    /// Move an idle connection into the frozen queue
    ///
    /// Returns `Ok(false)` when the connection is no longer queued as idle
    /// or is still occupied; in both cases nothing changes. The move happens
    /// under both queue locks, so the connection is never outside both
    /// queues and keeps its place in the idle queue when it stays.
    ///
    /// # Errors
    ///
    /// [`PoolError::FrozenQueueFull`] leaves the connection idle and queued.
    pub fn freeze(&self, conn: &Arc<C>) -> PoolResult<bool> {
        let moved = self.idle.transfer_where(
            &self.frozen,
            |queued| Arc::ptr_eq(queued, conn),
            |queued| queued.state().freeze(),
        );

        match moved {
            Ok(moved) => Ok(moved),
            Err(Rejected::Full(())) => Err(PoolError::FrozenQueueFull),
            Err(Rejected::Closed(())) => Err(PoolError::PoolClosed),
        }
    }

    /// Snapshot of the idle queue, front first
    pub fn idle_connections(&self) -> Vec<Arc<C>> {
        self.idle.snapshot()
    }

    pub fn contains_idle(&self, conn: &Arc<C>) -> bool {
        self.idle.contains_where(|queued| Arc::ptr_eq(queued, conn))
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn frozen_count(&self) -> usize {
        self.frozen.len()
    }

    /// Connection installed at `index`, if any
    pub fn slot(&self, index: usize) -> Option<Arc<C>> {
        self.slots.get(index)?.read().clone()
    }

    /// Number of slot indices issued so far
    pub fn issued_slots(&self) -> usize {
        self.next_index.load(Ordering::Acquire)
    }

    pub fn max_pool_size(&self) -> usize {
        self.config.max_pool_size
    }

    pub fn max_idle_time(&self) -> Duration {
        self.config.max_idle_time
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.config
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let occupied = self
            .slots
            .iter()
            .filter(|slot| slot.read().as_ref().is_some_and(|conn| conn.state().is_occupied()))
            .count();
        let capacity = self.config.max_pool_size;

        PoolStats {
            max_pool_size: capacity,
            issued_slots: self.issued_slots(),
            idle_connections: self.idle.len(),
            occupied_connections: occupied,
            frozen_connections: self.frozen.len(),
            utilization: occupied as f64 / capacity as f64,
            reaper_enabled: self.is_enabled(PoolFeature::Reaper),
            reclaimer_enabled: self.is_enabled(PoolFeature::Reclaimer),
        }
    }

    /// Start the background worker behind `feature`
    ///
    /// Enabling a feature that is already running does nothing.
    ///
    /// # Errors
    ///
    /// [`PoolError::UnsupportedCapability`] for [`PoolFeature::Monitor`].
    pub fn enable(self: &Arc<Self>, feature: PoolFeature) -> PoolResult<()> {
        if !feature.is_supported() {
            return Err(PoolError::UnsupportedCapability(feature));
        }
        self.ensure_open()?;

        let mut workers = self.workers.lock();
        if workers.get(&feature).is_some_and(Worker::is_running) {
            debug!(%feature, "feature already enabled");
            return Ok(());
        }

        let worker = self.spawn_worker(feature)?;
        workers.insert(feature, worker);
        Ok(())
    }

    pub fn enable_reaper(self: &Arc<Self>) -> PoolResult<()> {
        self.enable(PoolFeature::Reaper)
    }

    pub fn enable_monitor(self: &Arc<Self>) -> PoolResult<()> {
        self.enable(PoolFeature::Monitor)
    }

    pub fn enable_reclaimer(self: &Arc<Self>) -> PoolResult<()> {
        self.enable(PoolFeature::Reclaimer)
    }

    /// Stop the worker behind `feature`. Returns whether one was running.
    pub fn disable(&self, feature: PoolFeature) -> PoolResult<bool> {
        if !feature.is_supported() {
            return Err(PoolError::UnsupportedCapability(feature));
        }

        let worker = self.workers.lock().remove(&feature);
        match worker {
            Some(worker) => {
                worker.stop();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_enabled(&self, feature: PoolFeature) -> bool {
        self.workers
            .lock()
            .get(&feature)
            .is_some_and(Worker::is_running)
    }

    /// Close both queues and stop every worker
    ///
    /// Threads blocked in [`get_idle_connection`](Self::get_idle_connection)
    /// fail with [`PoolError::AcquisitionInterrupted`]; later mutators fail
    /// with [`PoolError::PoolClosed`].
    pub fn shutdown(&self) {
        self.idle.close();
        self.frozen.close();

        let workers: Vec<Worker> = self.workers.lock().drain().map(|(_, worker)| worker).collect();
        for worker in workers {
            worker.stop();
        }

        info!(max_pool_size = self.config.max_pool_size, "connection pool shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.idle.is_closed()
    }

    fn spawn_worker(self: &Arc<Self>, feature: PoolFeature) -> PoolResult<Worker> {
        let pool = Arc::downgrade(self);
        let interval = self.config.scan_interval;

        match feature {
            PoolFeature::Reaper => {
                let reaper = Reaper::new(self.config.max_idle_time);
                Worker::spawn(feature.thread_name(), interval, move || {
                    sweep_if_alive(&pool, |pool| reaper.sweep(pool))
                })
            }
            PoolFeature::Reclaimer => {
                let reclaimer = Reclaimer::new(self.config.max_idle_connections);
                Worker::spawn(feature.thread_name(), interval, move || {
                    sweep_if_alive(&pool, |pool| reclaimer.sweep(pool))
                })
            }
            PoolFeature::Monitor => Err(PoolError::UnsupportedCapability(feature)),
        }
    }

    fn enqueue_idle(&self, conn: Arc<C>) -> PoolResult<()> {
        idle_offer_result(self.idle.offer_if_absent(conn, |queued, new| Arc::ptr_eq(queued, new)))
    }

    fn slot_cell(&self, index: usize) -> PoolResult<&RwLock<Option<Arc<C>>>> {
        self.slots.get(index).ok_or(PoolError::SlotOutOfRange {
            index,
            max_pool_size: self.config.max_pool_size,
        })
    }

    fn ensure_open(&self) -> PoolResult<()> {
        if self.is_shut_down() {
            return Err(PoolError::PoolClosed);
        }
        Ok(())
    }
}

fn idle_offer_result<T>(offered: Result<bool, Rejected<T>>) -> PoolResult<()> {
    match offered {
        Ok(true) => Ok(()),
        Ok(false) => {
            trace!("connection already queued as idle");
            Ok(())
        }
        Err(Rejected::Full(_)) => Err(PoolError::IdleQueueFull),
        Err(Rejected::Closed(_)) => Err(PoolError::PoolClosed),
    }
}

fn sweep_if_alive<C, F>(pool: &Weak<ConnectionPool<C>>, sweep: F) -> ControlFlow<()>
where
    C: PooledConnection,
    F: FnOnce(&ConnectionPool<C>) -> usize,
{
    match pool.upgrade() {
        Some(pool) => {
            sweep(&pool);
            ControlFlow::Continue(())
        }
        None => ControlFlow::Break(()),
    }
}
