//! Cancellable background loop shared by the eviction workers

use crate::errors::{PoolError, PoolResult};
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::ops::ControlFlow;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Handle to a named thread that calls `tick` once per interval.
///
/// Stopping or dropping the handle disconnects the stop channel, which ends
/// the loop at its next wait.
pub(crate) struct Worker {
    name: &'static str,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn<F>(name: &'static str, interval: Duration, mut tick: F) -> PoolResult<Self>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let (stop, stopped) = channel::bounded::<()>(0);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if tick().is_break() {
                                debug!(worker = name, "pool dropped, worker exiting");
                                break;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| PoolError::WorkerSpawn(e.to_string()))?;

        info!(worker = name, interval_ms = interval.as_millis() as u64, "worker started");

        Ok(Self {
            name,
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Signal the loop and wait for it to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn shutdown(&mut self) {
        drop(self.stop.take());

        if let Some(handle) = self.handle.take() {
            // The last pool reference can be released on the worker's own
            // thread, in which case it must not join itself.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!(worker = self.name, "worker panicked");
                return;
            }
            info!(worker = self.name, "worker stopped");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
