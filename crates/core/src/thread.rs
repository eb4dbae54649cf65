//! Game thread identity
//!
//! Every host call and every state mirror write must happen on the host's
//! game thread. Components capture a [`GameThread`] at construction and check
//! it on entry.

use std::thread::ThreadId;

/// Identity of the host's designated main thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameThread {
    id: ThreadId,
}

impl GameThread {
    /// Record the calling thread as the game thread
    pub fn current() -> Self {
        Self {
            id: std::thread::current().id(),
        }
    }

    /// Use a previously recorded thread id
    pub fn from_id(id: ThreadId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// True when called from the game thread
    #[inline]
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.id
    }
}

/// Report a game-thread-only operation reached from another thread
///
/// Panics in debug builds. Release builds log and let the caller recover.
#[track_caller]
pub(crate) fn report_violation(operation: &str) {
    if cfg!(debug_assertions) {
        panic!("{} called off the game thread", operation);
    }
    tracing::error!(
        "{} called off the game thread ({:?})",
        operation,
        std::thread::current().id()
    );
}
