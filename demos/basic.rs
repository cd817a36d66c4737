//! Basic usage: slot allocation, reuse and background eviction

use esox_connectionpool::{
    ConnectionPool, ConnectionState, PoolConfiguration, PoolError, PooledConnection,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

struct Upstream {
    name: String,
    closed: AtomicBool,
    state: ConnectionState,
}

impl Upstream {
    fn dial(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            closed: AtomicBool::new(false),
            state: ConnectionState::new(),
        })
    }

    fn hang_up(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl PooledConnection for Upstream {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn state(&self) -> &ConnectionState {
        &self.state
    }
}

fn main() {
    println!("=== EsoxSolutions.ConnectionPool - Basic Usage ===\n");

    slot_allocation();
    reuse_closed_connection();
    background_reaper();
    unsupported_monitor();
}

fn slot_allocation() {
    println!("1. Slot allocation:");

    let pool = ConnectionPool::<Upstream>::new(PoolConfiguration::new().with_max_pool_size(2)).unwrap();
    for attempt in 1..=3 {
        match pool.apply_index() {
            Some(index) => println!("   Attempt {}: slot {}", attempt, index),
            None => println!("   Attempt {}: pool exhausted, reuse an idle connection", attempt),
        }
    }

    println!();
}

fn reuse_closed_connection() {
    println!("2. Reusing a closed slot:");

    let pool = ConnectionPool::new(PoolConfiguration::new().with_max_pool_size(1)).unwrap();
    let conn = Upstream::dial("db-primary");
    pool.put_leisure_connection(Arc::clone(&conn), 0).unwrap();

    match pool.get_idle_connection(Duration::from_millis(50)) {
        Ok(_) => println!("   Unexpected: open connection handed out"),
        Err(e) => println!("   While open: {}", e),
    }

    conn.hang_up();
    let reusable = pool.get_idle_connection(Duration::from_millis(50)).unwrap();
    println!("   After hang-up: slot {:?} of {} is ready to redial", reusable.index(), reusable.name);

    println!();
}

fn background_reaper() {
    println!("3. Background reaper:");

    let config = PoolConfiguration::new()
        .with_max_pool_size(4)
        .with_max_idle_time(Duration::from_millis(100));
    let pool = Arc::new(ConnectionPool::new(config).unwrap());

    for index in 0..2 {
        pool.put_leisure_connection(Upstream::dial(&format!("cache-{}", index)), index).unwrap();
    }
    pool.enable_reaper().unwrap();
    println!("   Reaper running: {}", pool.stats().reaper_enabled);

    // The reaper sweeps every few seconds
    thread::sleep(Duration::from_secs(6));

    while let Some(frozen) = pool.get_freeze_connection() {
        println!("   Disposing {} from slot {:?}", frozen.name, frozen.index());
    }

    pool.shutdown();
    println!();
}

fn unsupported_monitor() {
    println!("4. Monitor capability:");

    let pool = Arc::new(ConnectionPool::<Upstream>::new(PoolConfiguration::default()).unwrap());
    match pool.enable_monitor() {
        Err(PoolError::UnsupportedCapability(feature)) => println!("   {} is not supported", feature),
        other => println!("   Unexpected: {:?}", other),
    }
}
