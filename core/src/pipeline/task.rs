use crate::prelude::PipelineError;
use log::{error, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const JOIN_POLL: Duration = Duration::from_millis(10);

/// Cooperative cancellation flag checked once per worker loop iteration.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A named worker thread with an explicit stop signal and a bounded join.
pub struct WorkerHandle {
    name: String,
    stop: StopSignal,
    handle: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn spawn<F>(name: &str, body: F) -> Result<Self, PipelineError>
    where
        F: FnOnce(StopSignal) + Send + 'static,
    {
        let stop = StopSignal::new();
        let worker_stop = stop.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(worker_stop))
            .map_err(|source| PipelineError::Spawn {
                name: name.to_string(),
                source,
            })?;
        Ok(Self {
            name: name.to_string(),
            stop,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn request_stop(&self) {
        self.stop.request();
    }

    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    /// Waits up to `deadline` for the thread to exit. Returns false if it is still running.
    pub fn join(&mut self, deadline: Duration) -> bool {
        let started = Instant::now();
        while !self.is_finished() {
            if started.elapsed() >= deadline {
                warn!("{} did not stop within {:?}", self.name, deadline);
                return false;
            }
            thread::sleep(JOIN_POLL);
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("{} panicked", self.name);
            }
        }
        true
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop.request();
    }
}
