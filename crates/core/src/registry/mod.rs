//! Object Registry Accessor
//!
//! Locates live objects and member functions inside the host's reflection
//! store by dotted full name.
//!
//! # Example
//!
//! ```ignore
//! let scheduler = registry.lookup_class("Game.Scheduler")?;
//! let advance = registry.lookup_function("Game.Scheduler", "AdvanceHours")?;
//! for instance in registry.instances_of("Game.Scheduler")? {
//!     // ...
//! }
//! ```

mod cache;
mod handle;

pub use cache::{ObjectRegistry, RegistryError};
pub use handle::ObjectHandle;
