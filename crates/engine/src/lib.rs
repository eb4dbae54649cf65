//! coopbridge Engine - Host Interface Loading and Global Storage
//!
//! This crate handles:
//! - Validating the [`HostApi`](coopbridge_sdk::HostApi) table passed in by the loader
//! - Exposing the host's reflection store through the [`ReflectionHost`] trait
//! - Storing the loaded host in a thread-safe global static
//!
//! # Architecture
//!
//! The table is validated once during plugin load via [`loader::load_host`]
//! and stored in [`globals::HostGlobals`]. Access is provided via the
//! [`try_host()`] function.
//!
//! # Thread Safety
//!
//! The host table is valid for the plugin's lifetime. The game thread ID is
//! stored at load for runtime checks via [`is_game_thread()`].

pub mod error;
pub mod globals;
pub mod host;
pub mod loader;

pub use error::HostError;
pub use globals::{init_host, is_game_thread, is_host_initialized, try_host, HostGlobals};
pub use host::{PropertyDesc, RawObject, ReflectionHost, TypeTag};
pub use loader::{load_host, FfiHost};
