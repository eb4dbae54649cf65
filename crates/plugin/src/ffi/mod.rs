//! C ABI surface

pub mod exports;
pub mod types;

pub use types::{CAvatarState, CQuat, CVec3};
