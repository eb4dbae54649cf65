//! Global host storage
//!
//! The host table is validated once during plugin load and stored here.
//! Access is thread-safe via OnceLock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;

use crate::error::HostError;
use crate::host::ReflectionHost;

/// Global host state
pub struct HostGlobals {
    /// Reflection store access
    pub host: Arc<dyn ReflectionHost>,

    /// Game thread ID for thread safety checks
    pub main_thread_id: ThreadId,

    /// Set once the host signalled that its registry is populated
    registry_ready: AtomicBool,
}

/// Global host storage
static HOST: OnceLock<HostGlobals> = OnceLock::new();

/// Initialize host globals
///
/// Called once during plugin load, on the game thread. Returns error if
/// already initialized.
pub fn init_host(globals: HostGlobals) -> Result<(), HostError> {
    HOST.set(globals).map_err(|_| HostError::AlreadyInitialized)
}

/// Try to get host globals without panicking
pub fn try_host() -> Option<&'static HostGlobals> {
    HOST.get()
}

/// Check if host is initialized
pub fn is_host_initialized() -> bool {
    HOST.get().is_some()
}

/// Check if current thread is the game thread
pub fn is_game_thread() -> bool {
    HOST.get()
        .map(|g| std::thread::current().id() == g.main_thread_id)
        .unwrap_or(false)
}

impl HostGlobals {
    /// Create new HostGlobals, recording the calling thread as the game thread
    pub fn new(host: Arc<dyn ReflectionHost>) -> Self {
        Self {
            host,
            main_thread_id: std::thread::current().id(),
            registry_ready: AtomicBool::new(false),
        }
    }

    /// Whether the registry-ready signal has been received
    pub fn is_registry_ready(&self) -> bool {
        self.registry_ready.load(Ordering::Acquire)
    }

    /// Record the registry-ready signal
    ///
    /// Returns `true` the first time it is called.
    pub fn mark_registry_ready(&self) -> bool {
        !self.registry_ready.swap(true, Ordering::AcqRel)
    }

    /// Forget the registry-ready signal (host unloading its store)
    pub fn clear_registry_ready(&self) {
        self.registry_ready.store(false, Ordering::Release);
        tracing::debug!("Registry ready flag cleared");
    }
}
