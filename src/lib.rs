//! # EsoxSolutions.ConnectionPool (Rust Port)
//!
//! Bounded, thread-safe pool of reusable network connections with slot
//! allocation, timeout-bounded acquire and background eviction.
//!
//! ## Features
//!
//! - Fixed slot table with issue-once indices
//! - Lock-free occupancy state on every connection
//! - Blocking acquire with a wall-clock budget (and an async variant)
//! - Idle and frozen queues with hard capacity
//! - Staleness reaper and LRU reclaimer as cancellable background workers
//! - Structured logging through `tracing`
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_connectionpool::{ConnectionPool, ConnectionState, PooledConnection, PoolConfiguration};
//! use std::sync::Arc;
//!
//! struct Conn(ConnectionState);
//!
//! impl PooledConnection for Conn {
//!     fn is_closed(&self) -> bool { false }
//!     fn state(&self) -> &ConnectionState { &self.0 }
//! }
//!
//! let pool = ConnectionPool::new(PoolConfiguration::new().with_max_pool_size(8)).unwrap();
//!
//! if let Some(index) = pool.apply_index() {
//!     let conn = pool.put_occupied_connection(Arc::new(Conn(ConnectionState::new())), index).unwrap();
//!     // ... use the connection, then give it back
//!     conn.state().switch_idle();
//!     pool.recycle(conn).unwrap();
//! }
//!
//! assert!(pool.assignable());
//! ```

mod pool;
mod config;
mod connection;
mod queue;
mod eviction;
mod features;
mod worker;
mod stats;
mod errors;

pub use pool::ConnectionPool;
pub use config::PoolConfiguration;
pub use connection::{ConnectionState, ConnectionStatus, PooledConnection};
pub use eviction::{Reaper, Reclaimer};
pub use features::PoolFeature;
pub use stats::PoolStats;
pub use errors::{PoolError, PoolResult};
