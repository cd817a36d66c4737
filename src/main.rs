// EsoxSolutions.ConnectionPool - Rust Port
// Bounded connection pool with background eviction

// This is just a binary wrapper - the actual library is in lib.rs
// Run examples with: cargo run --example basic

use esox_connectionpool::{ConnectionPool, ConnectionState, PoolConfiguration, PoolResult, PooledConnection};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

struct DemoConnection {
    closed: AtomicBool,
    state: ConnectionState,
}

impl PooledConnection for DemoConnection {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn state(&self) -> &ConnectionState {
        &self.state
    }
}

fn main() -> PoolResult<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();

    info!("EsoxSolutions.ConnectionPool v{}", env!("CARGO_PKG_VERSION"));

    let pool = ConnectionPool::new(PoolConfiguration::new().with_max_pool_size(2))?;

    let Some(index) = pool.apply_index() else {
        return Ok(());
    };
    let conn = Arc::new(DemoConnection {
        closed: AtomicBool::new(false),
        state: ConnectionState::new(),
    });
    pool.put_occupied_connection(Arc::clone(&conn), index)?;
    pool.recycle(Arc::clone(&conn))?;

    // The peer hung up; the slot can now be redialed
    conn.closed.store(true, Ordering::Release);
    let reusable = pool.get_idle_connection(Duration::from_millis(100))?;

    info!(index = ?reusable.index(), stats = ?pool.stats(), "slot ready for a fresh connection");
    Ok(())
}
