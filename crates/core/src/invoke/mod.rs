//! Host function invocation
//!
//! - [`FunctionDescriptor`] / [`ParamLayout`]: resolved method and its block layout
//! - [`ParameterBlock`]: raw argument buffer
//! - [`ParamBlock`]: typed parameter structs (`#[derive(ParamBlock)]`)
//! - [`ThunkInvoker`]: game-thread dispatch through the host

mod block;
mod invoker;
mod layout;

pub use block::{ParamBlock, ParamValue, ParameterBlock};
pub use invoker::{InvokeError, InvokeOutcome, ThunkInvoker};
pub use layout::{FunctionDescriptor, ParamFlags, ParamLayout, ParamSlot};
