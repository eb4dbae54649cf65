//! Game-thread scheduling
//!
//! Network threads hand work to the game thread through
//! [`GameThreadScheduler`]; the frame hook drains it once per frame.

pub mod queue;

pub use queue::*;
