//! coopbridge SDK - Host Reflection ABI Type Definitions
//!
//! This crate contains opaque type definitions for the host game's reflection
//! store and the C function table the loader hands us at injection time.
//! It has no dependencies and compiles quickly, allowing parallel compilation
//! of dependent crates.
//!
//! # Modules
//!
//! - [`interfaces`] - Opaque host object types and the [`HostApi`] table
//! - [`property`] - Function parameter property records and flag bits
//! - [`names`] - Default full names of the reflection targets we call

pub mod interfaces;
pub mod names;
pub mod property;

pub use interfaces::*;
pub use property::*;
pub use names::*;
