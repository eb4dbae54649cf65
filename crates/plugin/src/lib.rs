//! coopbridge - injectable module
//!
//! This crate provides the FFI boundary between the loader / networking
//! layer and the Rust core logic. It compiles to a cdylib (.so/.dll).

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

use coopbridge_core::CoreConfig;

pub mod ffi;

/// Configuration read at load, used for every session
static CONFIG: OnceLock<CoreConfig> = OnceLock::new();

/// Load `core.toml` and install logging
///
/// Falls back to defaults if the file cannot be read. Idempotent across
/// reloads of the module within one process.
fn configure() -> &'static CoreConfig {
    let loaded = CONFIG.get().is_none().then(CoreConfig::load);
    let config = CONFIG.get_or_init(|| {
        loaded
            .as_ref()
            .and_then(|result| result.as_ref().ok())
            .cloned()
            .unwrap_or_default()
    });

    init_logging(config);
    if let Some(Err(e)) = loaded {
        tracing::warn!("Using default config: {}", e);
    }
    config
}

/// Install the global subscriber; `RUST_LOG` wins over the config filter
fn init_logging(config: &CoreConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.effective_log_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(true)
        .try_init();
}

/// Tear down the session runtime
///
/// Called from the FFI layer when the loader unloads the module.
pub fn shutdown() {
    tracing::info!("coopbridge shutting down...");
    coopbridge_core::runtime::shutdown();
    if let Some(globals) = coopbridge_engine::try_host() {
        globals.clear_registry_ready();
    }
}
