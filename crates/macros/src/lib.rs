//! coopbridge Proc Macros
//!
//! This crate provides proc macros for the coopbridge framework:
//!
//! - `#[derive(ParamBlock)]` - Bind a typed struct to a host function's parameter block
//!
//! # ParamBlock Example
//!
//! ```ignore
//! use coopbridge_macros::ParamBlock;
//!
//! #[derive(ParamBlock)]
//! #[param_block(function = "AdvanceHours", size = 4)]
//! pub struct AdvanceHoursParams {
//!     #[param(name = "InHours")]
//!     pub in_hours: i32,
//! }
//!
//! // Generated:
//! // - AdvanceHoursParams::FUNCTION / SIZE / PROPERTIES
//! // - encode(&descriptor) -> ParameterBlock
//! // - decode_outputs(&descriptor, &block) for `#[param(out)]` fields
//! ```
//!
//! # Attributes
//!
//! ## Struct Attributes
//!
//! - `#[param_block(function = "Name")]` - **Required.** The host method name.
//! - `#[param_block(size = N)]` - **Required.** Expected block size in bytes.
//!   A descriptor reporting a different size is a layout mismatch.
//!
//! ## Field Attributes
//!
//! - `#[param(name = "HostName")]` - Host property name (default: field name in UpperCamelCase).
//! - `#[param(out)]` - Read the field back from the block after the call.

mod param_block;
mod parse;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derive macro for host function parameter structs
///
/// Every field is written into the parameter block at the offset the host
/// reports for the property of the same name. Field types must implement
/// `ParamValue`, and each field's size must match the host property's size.
///
/// # Example
///
/// ```ignore
/// use coopbridge_macros::ParamBlock;
///
/// #[derive(ParamBlock)]
/// #[param_block(function = "SetCurrentSeason", size = 1)]
/// pub struct SetCurrentSeasonParams {
///     #[param(name = "NewSeason")]
///     pub new_season: u8,
/// }
/// ```
///
/// # Generated Code
///
/// - `const FUNCTION`, `const SIZE`, `const PROPERTIES`
/// - `fn encode(&self, descriptor) -> Result<ParameterBlock, InvokeError>`
/// - `fn decode_outputs(&mut self, descriptor, block) -> Result<(), InvokeError>`
#[proc_macro_derive(ParamBlock, attributes(param_block, param))]
pub fn derive_param_block(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    param_block::derive_param_block(input).into()
}
