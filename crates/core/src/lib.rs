//! coopbridge core - reflection bridge, state mirror and replication
//!
//! This crate contains everything between the host's reflection store and
//! the mod's networking layer:
//! - [`registry`] - cached lookups of host objects and functions
//! - [`invoke`] - parameter blocks and the `process_event` thunk
//! - [`mirror`] - client replica of server-authoritative state
//! - [`net`] - message codec and the replication channel
//! - [`tasks`] - game-thread scheduler
//! - [`runtime`] - session wiring, installed on registry-ready
//!
//! # Re-exports
//!
//! This crate re-exports the SDK and engine crates for convenience:
//! - [`sdk`] - C ABI host table and default target names
//! - [`engine`] - `ReflectionHost` and host globals

// Allow the crate to refer to itself as `coopbridge_core` for proc macro compatibility
extern crate self as coopbridge_core;

// Re-export SDK and engine crates
pub use coopbridge_engine as engine;
pub use coopbridge_sdk as sdk;

pub mod config;
pub mod error;
pub mod frame;
pub mod game;
pub mod invoke;
pub mod listeners;
pub mod mirror;
pub mod net;
pub mod registry;
pub mod runtime;
pub mod status;
pub mod tasks;
pub mod thread;

#[cfg(test)]
mod scenarios;
#[cfg(test)]
mod testing;

// Re-export commonly used items
pub use config::{ConfigError, ConfigResult, CoreConfig};
pub use error::{BridgeError, ErrorKind};
pub use frame::{frame_count, on_game_frame};
pub use game::GameCalls;
pub use invoke::{InvokeError, ParamBlock, ThunkInvoker};
pub use listeners::{ListenerKey, Listeners};
pub use mirror::{AvatarState, InputFlags, Quat, Season, StateMirror, Vec3};
pub use net::{ChannelError, Message, MessageId, ReplicationChannel};
pub use registry::{ObjectHandle, ObjectRegistry, RegistryError};
pub use runtime::Runtime;
pub use status::{BridgeStatus, StatusFlags};
pub use tasks::{GameThreadScheduler, TaskKind};
pub use thread::GameThread;

// Re-export macros
pub use coopbridge_macros::ParamBlock;

#[cfg(test)]
mod tests {
    #[test]
    fn test_default_targets_match_config() {
        let reflection = crate::config::ReflectionConfig::default();
        assert_eq!(reflection.season_changer_class, crate::sdk::SEASON_CHANGER_CLASS);
        assert_eq!(reflection.scheduler_class, crate::sdk::SCHEDULER_CLASS);
    }
}
