//! Error types for host interface loading

/// Error type for host table loading operations
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Loader passed a null `HostApi` pointer
    #[error("Host API table is null")]
    NullTable,

    /// A required function pointer in the table was null
    #[error("Host API entry is null: {0}")]
    NullEntry(&'static str),

    /// Loader was built against a different table layout
    #[error("Host API version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// Registry-ready has not been signalled yet
    #[error("Host registry is not ready")]
    NotReady,

    /// An earlier session found the host layout unsupported
    #[error("Host version unsupported")]
    Unsupported,

    /// Host globals already initialized
    #[error("Host already initialized")]
    AlreadyInitialized,
}
