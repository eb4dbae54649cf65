//! Error classification
//!
//! Every concern has its own error enum; [`BridgeError`] wraps them all and
//! [`ErrorKind`] says how the runtime reacts.

use coopbridge_engine::HostError;

use crate::config::ConfigError;
use crate::invoke::InvokeError;
use crate::mirror::MirrorError;
use crate::net::{ChannelError, StreamError};
use crate::registry::RegistryError;

/// How a failure is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A host object is missing; retried on later ticks, never propagated
    NotFoundYet,
    /// Failed validity check or truncated payload; dropped and counted
    InvalidMessage,
    /// Update for an entity that does not exist yet; buffered then dropped
    OutOfOrder,
    /// Host layout drift; host calls are disabled and we shut down
    LayoutMismatch,
    /// Game-thread-only work attempted elsewhere
    ThreadViolation,
    /// Loader or configuration problem
    Setup,
}

impl ErrorKind {
    /// True if the bridge must stop talking to the host
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::LayoutMismatch)
    }
}

/// Any error produced by the bridge
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Mirror(#[from] MirrorError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Host(HostError::VersionMismatch { .. } | HostError::Unsupported) => {
                ErrorKind::LayoutMismatch
            }
            Self::Host(_) => ErrorKind::Setup,
            Self::Registry(e) => e.kind(),
            Self::Invoke(e) => e.kind(),
            Self::Stream(_) => ErrorKind::InvalidMessage,
            Self::Channel(e) => e.kind(),
            Self::Mirror(e) => e.kind(),
            Self::Config(_) => ErrorKind::Setup,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }
}
