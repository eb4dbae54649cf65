//! State mirror
//!
//! Season, clock and avatars as last received from the server.

mod state;
mod types;

pub use state::{Authority, MirrorError, StateMirror, UpdateOutcome};
pub use types::{AvatarState, InputFlags, Quat, Season, Transform, Vec3, QUAT_MAGNITUDE_RANGE};
