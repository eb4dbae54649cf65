//! Thunk invoker
//!
//! Runs a host member function synchronously through the host's universal
//! dispatcher. The caller's parameter block is copied into a stack frame sized
//! by the descriptor, the dispatcher is called with (target, function, frame),
//! and the output slots are copied back.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{trace, warn};

use coopbridge_engine::ReflectionHost;

use super::block::ParameterBlock;
use super::layout::FunctionDescriptor;
use crate::error::ErrorKind;
use crate::registry::ObjectHandle;
use crate::status::BridgeStatus;
use crate::thread::{report_violation, GameThread};

/// Blocks up to this size are staged on the stack
const STACK_FRAME_SIZE: usize = 512;

#[repr(C, align(16))]
struct StackFrame([u8; STACK_FRAME_SIZE]);

/// Error type for host calls
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    #[error("{function} invoked off the game thread")]
    WrongThread { function: String },

    #[error("Host calls disabled after a layout mismatch")]
    Disabled,

    #[error("Parameter block size mismatch for {function}: expected {expected}, found {found}")]
    SizeMismatch {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("Parameter {param} missing from {function}")]
    MissingParam { function: String, param: String },

    #[error("Parameter {param} size mismatch: expected {expected}, found {found}")]
    SlotSize {
        param: String,
        expected: usize,
        found: usize,
    },

    #[error("Parameter access out of bounds: offset {offset} size {size} in block of {len}")]
    OutOfBounds {
        offset: usize,
        size: usize,
        len: usize,
    },

    #[error("Host faulted while dispatching {function}")]
    HostFault { function: String },
}

impl InvokeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WrongThread { .. } => ErrorKind::ThreadViolation,
            _ => ErrorKind::LayoutMismatch,
        }
    }
}

/// What happened to an invoke request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeOutcome {
    /// The host dispatcher ran
    Dispatched,
    /// Null target or function; logged and ignored
    Skipped,
}

/// Executes host member functions on the game thread
pub struct ThunkInvoker {
    host: Arc<dyn ReflectionHost>,
    game_thread: GameThread,
    status: Arc<BridgeStatus>,
    disabled: AtomicBool,
    dispatched: AtomicU64,
}

impl ThunkInvoker {
    pub fn new(host: Arc<dyn ReflectionHost>, game_thread: GameThread, status: Arc<BridgeStatus>) -> Self {
        Self {
            host,
            game_thread,
            status,
            disabled: AtomicBool::new(false),
            dispatched: AtomicU64::new(0),
        }
    }

    /// Call `function` on `target` with `params`
    ///
    /// Must run on the game thread. `params` must be exactly
    /// `function.param_block_size()` bytes; output slots are written back
    /// into it after the call.
    pub fn invoke(
        &self,
        target: ObjectHandle,
        function: &FunctionDescriptor,
        params: &mut ParameterBlock,
    ) -> Result<InvokeOutcome, InvokeError> {
        if !self.game_thread.is_current() {
            report_violation(function.name());
            return Err(InvokeError::WrongThread {
                function: function.name().to_string(),
            });
        }

        if self.is_disabled() {
            return Err(InvokeError::Disabled);
        }

        if target.is_null() || function.function().is_null() {
            warn!(
                "Skipping {}: null target or function ({:?}, {:?})",
                function.name(),
                target,
                function.function()
            );
            return Ok(InvokeOutcome::Skipped);
        }

        let size = function.param_block_size();
        if params.len() != size {
            let err = InvokeError::SizeMismatch {
                function: function.name().to_string(),
                expected: size,
                found: params.len(),
            };
            self.fail_layout(&err);
            return Err(err);
        }

        if size <= STACK_FRAME_SIZE {
            let mut frame = StackFrame([0; STACK_FRAME_SIZE]);
            self.dispatch(target, function, params, &mut frame.0[..size])?;
        } else {
            let mut frame = vec![0u8; size];
            self.dispatch(target, function, params, &mut frame)?;
        }

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        trace!("Dispatched {}::{} on {}", function.class_name(), function.name(), target);
        Ok(InvokeOutcome::Dispatched)
    }

    fn dispatch(
        &self,
        target: ObjectHandle,
        function: &FunctionDescriptor,
        params: &mut ParameterBlock,
        frame: &mut [u8],
    ) -> Result<(), InvokeError> {
        frame.copy_from_slice(params.as_bytes());

        let host = &self.host;
        let call = panic::catch_unwind(AssertUnwindSafe(|| unsafe {
            host.process_event(target.raw(), function.function().raw(), frame.as_mut_ptr());
        }));

        if call.is_err() {
            let err = InvokeError::HostFault {
                function: function.name().to_string(),
            };
            self.fail_layout(&err);
            return Err(err);
        }

        let out = params.as_mut_bytes();
        for slot in function.layout().outputs() {
            out[slot.offset..slot.end()].copy_from_slice(&frame[slot.offset..slot.end()]);
        }

        Ok(())
    }

    /// Disable all further host calls and request a clean shutdown
    pub fn fail_layout(&self, err: &InvokeError) {
        if !self.disabled.swap(true, Ordering::AcqRel) {
            tracing::error!("Disabling host calls: {}", err);
        }
        self.status.raise_host_unsupported(&err.to_string());
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Number of successful dispatches
    pub fn dispatch_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}
