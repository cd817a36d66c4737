//! Connection contract consumed by the pool
//!
//! The pool never performs I/O. It only needs to know whether the transport
//! has closed a connection, and it owns the occupancy state stored in the
//! [`ConnectionState`] every pooled connection embeds.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

const UNASSIGNED: usize = usize::MAX;

/// Occupancy of a pooled connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ConnectionStatus {
    /// Available for reuse
    Idle,

    /// Handed out to a caller
    Occupied,

    /// Demoted by an eviction worker, awaiting disposal
    Frozen,
}

impl ConnectionStatus {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionStatus::Idle => 0,
            ConnectionStatus::Occupied => 1,
            ConnectionStatus::Frozen => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConnectionStatus::Idle,
            1 => ConnectionStatus::Occupied,
            _ => ConnectionStatus::Frozen,
        }
    }
}

/// Lock-free state cell shared by the pool, its workers and callers
///
/// # Examples
///
/// ```
/// use esox_connectionpool::{ConnectionState, ConnectionStatus};
///
/// let state = ConnectionState::new();
/// assert_eq!(state.status(), ConnectionStatus::Idle);
///
/// assert!(state.switch_occupied());
/// assert!(state.switch_idle());
/// assert!(state.freeze());
///
/// // A frozen connection can no longer be claimed
/// assert!(!state.switch_occupied());
/// ```
pub struct ConnectionState {
    status: AtomicU8,
    index: AtomicUsize,
    last_active: Mutex<Instant>,
}

impl ConnectionState {
    /// Create an idle, unassigned state
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(ConnectionStatus::Idle.as_u8()),
            index: AtomicUsize::new(UNASSIGNED),
            last_active: Mutex::new(Instant::now()),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn is_idle(&self) -> bool {
        self.status() == ConnectionStatus::Idle
    }

    pub fn is_occupied(&self) -> bool {
        self.status() == ConnectionStatus::Occupied
    }

    pub fn is_frozen(&self) -> bool {
        self.status() == ConnectionStatus::Frozen
    }

    /// Claim the connection for a caller
    ///
    /// Succeeds from any status except `Frozen`. Exclusivity between two
    /// acquirers comes from queue removal; this guards against a worker that
    /// froze the connection in the meantime.
    pub fn switch_occupied(&self) -> bool {
        let occupied = ConnectionStatus::Occupied.as_u8();
        let frozen = ConnectionStatus::Frozen.as_u8();
        let switched = self
            .status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != frozen).then_some(occupied)
            })
            .is_ok();
        if switched {
            self.touch();
        }
        switched
    }

    /// Release the connection after use
    pub fn switch_idle(&self) -> bool {
        let switched = self.transition(ConnectionStatus::Occupied, ConnectionStatus::Idle);
        if switched {
            self.touch();
        }
        switched
    }

    /// Demote an idle connection
    pub fn freeze(&self) -> bool {
        self.transition(ConnectionStatus::Idle, ConnectionStatus::Frozen)
    }

    /// Undo a [`freeze`](Self::freeze) whose connection could not be parked
    pub fn thaw(&self) -> bool {
        self.transition(ConnectionStatus::Frozen, ConnectionStatus::Idle)
    }

    pub fn mark_occupied(&self) {
        self.status.store(ConnectionStatus::Occupied.as_u8(), Ordering::Release);
        self.touch();
    }

    pub fn mark_idle(&self) {
        self.status.store(ConnectionStatus::Idle.as_u8(), Ordering::Release);
        self.touch();
    }

    /// Slot index, once the pool has stamped one
    pub fn index(&self) -> Option<usize> {
        match self.index.load(Ordering::Acquire) {
            UNASSIGNED => None,
            index => Some(index),
        }
    }

    pub fn set_index(&self, index: usize) {
        self.index.store(index, Ordering::Release);
    }

    pub fn last_active(&self) -> Instant {
        *self.last_active.lock()
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active().elapsed()
    }

    pub fn touch(&self) {
        *self.last_active.lock() = Instant::now();
    }

    fn transition(&self, from: ConnectionStatus, to: ConnectionStatus) -> bool {
        self.status
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionState")
            .field("status", &self.status())
            .field("index", &self.index())
            .field("idle_for", &self.idle_for())
            .finish()
    }
}

/// A network connection the pool can hold
///
/// Implementors embed a [`ConnectionState`] and report their transport's
/// closed flag. The pool only ever reads `is_closed`.
///
/// # Examples
///
/// ```
/// use esox_connectionpool::{ConnectionState, PooledConnection};
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Upstream {
///     closed: AtomicBool,
///     state: ConnectionState,
/// }
///
/// impl PooledConnection for Upstream {
///     fn is_closed(&self) -> bool {
///         self.closed.load(Ordering::Acquire)
///     }
///
///     fn state(&self) -> &ConnectionState {
///         &self.state
///     }
/// }
///
/// let conn = Upstream { closed: AtomicBool::new(false), state: ConnectionState::new() };
/// assert_eq!(conn.index(), None);
/// ```
pub trait PooledConnection: Send + Sync + 'static {
    /// Whether the underlying transport has closed
    ///
    /// Called while the pool holds its idle-queue lock, so it must be cheap
    /// and must not call back into the pool.
    fn is_closed(&self) -> bool;

    fn state(&self) -> &ConnectionState;

    fn index(&self) -> Option<usize> {
        self.state().index()
    }

    fn last_active(&self) -> Instant {
        self.state().last_active()
    }

    fn idle_for(&self) -> Duration {
        self.state().idle_for()
    }
}
