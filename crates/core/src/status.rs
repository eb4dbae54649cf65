//! Bridge status flags
//!
//! Fatal conditions (host version drift, invalid message bursts) never unwind
//! through the host. They set flags here, which the loader and networking
//! layer poll to disconnect and unload us cleanly.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, LazyLock};

use bitflags::bitflags;

/// Text of the one-time banner shown when the host build is not supported
pub const HOST_UNSUPPORTED_BANNER: &str = "host version unsupported";

bitflags! {
    /// Conditions the outer layers must act on
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u32 {
        /// Host layout or type tags disagree with what we were built for
        const HOST_UNSUPPORTED = 0x01;
        /// The networking layer should drop the server connection
        const DISCONNECT_REQUESTED = 0x02;
        /// The bridge should be torn down at the next frame
        const SHUTDOWN_REQUESTED = 0x04;
    }
}

/// Shared status word
#[derive(Debug, Default)]
pub struct BridgeStatus {
    flags: AtomicU32,
    banner_shown: AtomicBool,
}

static GLOBAL_STATUS: LazyLock<Arc<BridgeStatus>> = LazyLock::new(|| Arc::new(BridgeStatus::new()));

/// Process-wide status used by the installed runtime
pub fn global() -> Arc<BridgeStatus> {
    GLOBAL_STATUS.clone()
}

impl BridgeStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current flags
    pub fn flags(&self) -> StatusFlags {
        StatusFlags::from_bits_retain(self.flags.load(Ordering::Acquire))
    }

    pub fn contains(&self, flags: StatusFlags) -> bool {
        self.flags().contains(flags)
    }

    fn set(&self, flags: StatusFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Host version drift: stop calling into the host, disconnect, shut down
    ///
    /// The banner is logged exactly once per process no matter how many
    /// components report the condition.
    pub fn raise_host_unsupported(&self, reason: &str) {
        self.set(
            StatusFlags::HOST_UNSUPPORTED
                | StatusFlags::DISCONNECT_REQUESTED
                | StatusFlags::SHUTDOWN_REQUESTED,
        );

        if !self.banner_shown.swap(true, Ordering::AcqRel) {
            tracing::error!("{}: {}", HOST_UNSUPPORTED_BANNER, reason);
        } else {
            tracing::debug!("Further host mismatch: {}", reason);
        }
    }

    /// Ask the networking layer to drop the connection
    pub fn request_disconnect(&self, reason: &str) {
        if !self.contains(StatusFlags::DISCONNECT_REQUESTED) {
            tracing::warn!("Disconnect requested: {}", reason);
        }
        self.set(StatusFlags::DISCONNECT_REQUESTED);
    }

    /// Banner text to show, if any
    pub fn banner(&self) -> Option<&'static str> {
        self.contains(StatusFlags::HOST_UNSUPPORTED)
            .then_some(HOST_UNSUPPORTED_BANNER)
    }

    /// True once the host has been judged unsupported; never reset
    pub fn is_host_unsupported(&self) -> bool {
        self.contains(StatusFlags::HOST_UNSUPPORTED)
    }

    /// Reset the per-session flags before a new session
    ///
    /// `HOST_UNSUPPORTED` and the banner outlive the session: a host build
    /// we cannot talk to stays unsupported for the rest of the process.
    pub fn clear(&self) {
        self.flags
            .fetch_and(StatusFlags::HOST_UNSUPPORTED.bits(), Ordering::AcqRel);
    }

    /// Forget everything, including host support
    #[cfg(test)]
    pub(crate) fn reset(&self) {
        self.flags.store(0, Ordering::Release);
        self.banner_shown.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_unsupported_sets_all() {
        let status = BridgeStatus::new();
        assert!(status.flags().is_empty());
        assert_eq!(status.banner(), None);

        status.raise_host_unsupported("size mismatch");
        status.raise_host_unsupported("again");

        assert!(status.contains(StatusFlags::HOST_UNSUPPORTED));
        assert!(status.contains(StatusFlags::DISCONNECT_REQUESTED));
        assert!(status.contains(StatusFlags::SHUTDOWN_REQUESTED));
        assert_eq!(status.banner(), Some(HOST_UNSUPPORTED_BANNER));
    }

    #[test]
    fn test_disconnect_only() {
        let status = BridgeStatus::new();
        status.request_disconnect("burst");
        assert_eq!(status.flags(), StatusFlags::DISCONNECT_REQUESTED);
        assert_eq!(status.banner(), None);

        status.clear();
        assert!(status.flags().is_empty());
    }

    #[test]
    fn test_clear_keeps_host_unsupported() {
        let status = BridgeStatus::new();
        status.raise_host_unsupported("tag mismatch");

        status.clear();
        assert_eq!(status.flags(), StatusFlags::HOST_UNSUPPORTED);
        assert!(status.is_host_unsupported());
        assert_eq!(status.banner(), Some(HOST_UNSUPPORTED_BANNER));

        status.reset();
        assert!(status.flags().is_empty());
    }
}
