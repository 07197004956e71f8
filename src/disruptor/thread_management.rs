//! Thread management and CPU affinity
//!
//! Every event processor runs on its own named OS thread, optionally pinned
//! to a CPU core.

use core_affinity::CoreId;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Builder for a processor thread with an optional name and core pin
#[derive(Debug, Clone, Default)]
pub struct ThreadBuilder {
    name: Option<String>,
    core: Option<usize>,
}

impl ThreadBuilder {
    /// Create a new thread builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the thread to a CPU core
    ///
    /// A core that does not exist on this machine is reported with a warning
    /// when the thread starts and the thread runs unpinned.
    pub fn pin_at_core(mut self, core_id: usize) -> Self {
        self.core = Some(core_id);
        self
    }

    /// Set the thread name
    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Spawn a thread running `f`
    ///
    /// # Errors
    /// Returns the OS error if the thread cannot be created
    pub fn spawn<F>(self, f: F) -> std::io::Result<ManagedThread>
    where
        F: FnOnce() + Send + 'static,
    {
        let thread_name = self.name.unwrap_or_else(|| "ringway-processor".to_string());
        let core = self.core;

        let join_handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                if let Some(core_id) = core {
                    pin_current_thread(core_id);
                }
                f();
            })?;

        Ok(ManagedThread {
            join_handle: Some(join_handle),
            thread_name,
        })
    }
}

fn pin_current_thread(core_id: usize) {
    let available = core_affinity::get_core_ids().unwrap_or_default();
    if !available.iter().any(|core| core.id == core_id) {
        warn!(core_id, available = available.len(), "CPU core is not available, running unpinned");
        return;
    }

    if core_affinity::set_for_current(CoreId { id: core_id }) {
        debug!(core_id, "Pinned processor thread");
    } else {
        warn!(core_id, "Failed to pin processor thread");
    }
}

/// A spawned processor thread that is joined on drop
#[derive(Debug)]
pub struct ManagedThread {
    join_handle: Option<JoinHandle<()>>,
    thread_name: String,
}

impl ManagedThread {
    /// Get the thread name
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Wait for the thread to finish
    pub fn join(mut self) -> thread::Result<()> {
        match self.join_handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }

    /// Whether the thread has not finished yet
    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ManagedThread {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}
