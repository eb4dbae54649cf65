//! Bridge runtime
//!
//! Owns the object registry, the state mirror and the game-thread scheduler
//! along with the components wired between them. One runtime is installed
//! per session: created when the host signals that its registry is ready and
//! torn down in reverse order on unload or fatal error.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use coopbridge_engine::{HostError, ReflectionHost};

use crate::config::CoreConfig;
use crate::error::BridgeError;
use crate::game::GameCalls;
use crate::invoke::ThunkInvoker;
use crate::listeners::Listeners;
use crate::mirror::StateMirror;
use crate::net::ReplicationChannel;
use crate::registry::ObjectRegistry;
use crate::status::{self, BridgeStatus, StatusFlags};
use crate::tasks::GameThreadScheduler;
use crate::thread::GameThread;

/// Installed runtime, if any
static RUNTIME: RwLock<Option<Arc<Runtime>>> = RwLock::new(None);

/// Every component of one bridge session
pub struct Runtime {
    config: CoreConfig,
    game_thread: GameThread,
    status: Arc<BridgeStatus>,
    registry: Arc<ObjectRegistry>,
    invoker: Arc<ThunkInvoker>,
    calls: Arc<GameCalls>,
    scheduler: Arc<GameThreadScheduler>,
    mirror: Arc<StateMirror>,
    channel: Arc<ReplicationChannel>,
    listeners: Arc<Listeners>,
}

impl Runtime {
    /// Wire up a session against `host`
    ///
    /// `game_thread` is the only thread allowed to drain the scheduler and
    /// call into the host.
    pub fn new(
        host: Arc<dyn ReflectionHost>,
        game_thread: GameThread,
        status: Arc<BridgeStatus>,
        config: CoreConfig,
    ) -> Self {
        let registry = Arc::new(ObjectRegistry::new(host.clone(), status.clone()));
        let invoker = Arc::new(ThunkInvoker::new(host, game_thread, status.clone()));
        let calls = Arc::new(GameCalls::new(
            registry.clone(),
            invoker.clone(),
            config.reflection.clone(),
        ));
        let scheduler = Arc::new(GameThreadScheduler::new(
            game_thread,
            config.scheduler.soft_cap,
        ));
        let mirror = Arc::new(StateMirror::new(game_thread, scheduler.clone(), calls.clone()));
        let listeners = Arc::new(Listeners::new());
        let channel = Arc::new(ReplicationChannel::new(
            config.replication.clone(),
            scheduler.clone(),
            mirror.clone(),
            listeners.clone(),
            status.clone(),
        ));

        Self {
            config,
            game_thread,
            status,
            registry,
            invoker,
            calls,
            scheduler,
            mirror,
            channel,
            listeners,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn game_thread(&self) -> GameThread {
        self.game_thread
    }

    pub fn status(&self) -> &Arc<BridgeStatus> {
        &self.status
    }

    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    pub fn invoker(&self) -> &Arc<ThunkInvoker> {
        &self.invoker
    }

    pub fn calls(&self) -> &Arc<GameCalls> {
        &self.calls
    }

    pub fn scheduler(&self) -> &Arc<GameThreadScheduler> {
        &self.scheduler
    }

    pub fn mirror(&self) -> &Arc<StateMirror> {
        &self.mirror
    }

    pub fn channel(&self) -> &Arc<ReplicationChannel> {
        &self.channel
    }

    pub fn listeners(&self) -> &Arc<Listeners> {
        &self.listeners
    }

    /// One game frame: drain queued work, retry host effects, age buffered
    /// updates, then notify frame listeners
    ///
    /// Returns the number of tasks executed.
    pub fn run_frame(&self, frame: u64) -> usize {
        let executed = self.scheduler.drain();
        self.mirror.retry_pending();
        self.channel.tick();
        self.listeners.fire_frame(frame);
        executed
    }

    /// The host rebuilt its object store; cached handles are stale
    pub fn on_registry_changed(&self) {
        self.registry.on_registry_changed();
    }

    /// Tear the session down in reverse order of construction
    ///
    /// Inbound traffic stops first, then the scheduler runs its remaining
    /// despawns and drops everything else, then mirror and registry state is
    /// forgotten.
    pub fn shutdown(&self) {
        self.channel.close();

        self.scheduler.shutdown();
        if self.game_thread.is_current() {
            let executed = self.scheduler.drain();
            debug!("Shutdown drain ran {} tasks", executed);
        } else {
            warn!("Shutdown off the game thread; skipping final drain");
        }

        self.channel.clear();
        self.mirror.clear();
        self.registry.on_registry_changed();
        self.listeners.clear();
    }
}

/// Create and install the session runtime
///
/// Called on the game thread once the host registry is populated.
#[tracing::instrument(skip_all)]
pub fn init(host: Arc<dyn ReflectionHost>, config: CoreConfig) -> Result<Arc<Runtime>, BridgeError> {
    if !host.is_ready() {
        return Err(HostError::NotReady.into());
    }

    let mut slot = RUNTIME.write();
    if slot.is_some() {
        return Err(HostError::AlreadyInitialized.into());
    }

    let status = status::global();
    if status.is_host_unsupported() {
        warn!("Refusing to start: host version was found unsupported");
        return Err(HostError::Unsupported.into());
    }
    status.clear();

    let runtime = Arc::new(Runtime::new(host, GameThread::current(), status, config));
    *slot = Some(runtime.clone());

    info!("Bridge runtime initialized");
    Ok(runtime)
}

/// The installed runtime, if any
pub fn current() -> Option<Arc<Runtime>> {
    RUNTIME.read().clone()
}

pub fn is_initialized() -> bool {
    RUNTIME.read().is_some()
}

/// Uninstall and tear down the runtime
///
/// Returns `false` if none was installed.
#[tracing::instrument]
pub fn shutdown() -> bool {
    // Release the lock before tearing down so shutdown tasks can still
    // observe `current()` without deadlocking.
    let runtime = RUNTIME.write().take();
    match runtime {
        Some(runtime) => {
            runtime.shutdown();
            info!("Bridge runtime shut down");
            true
        }
        None => false,
    }
}

/// Forward a registry rebuild to the installed runtime
pub fn on_registry_changed() {
    if let Some(runtime) = current() {
        runtime.on_registry_changed();
    }
}

/// Whether a fatal condition has asked for teardown
pub fn shutdown_requested() -> bool {
    current().is_some_and(|runtime| runtime.status().contains(StatusFlags::SHUTDOWN_REQUESTED))
}
