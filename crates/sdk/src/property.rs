//! Function parameter property records
//!
//! A host function's parameters are described by a chain of properties, each
//! with an offset into the parameter block and a byte size. The loader copies
//! each link of the chain into a [`PropertyInfo`].

use std::ffi::c_char;

/// Property is a function parameter
pub const PROPERTY_FLAG_PARM: u64 = 0x0000_0000_0000_0080;

/// Property is written by the callee (out parameter)
pub const PROPERTY_FLAG_OUT_PARM: u64 = 0x0000_0000_0000_0100;

/// Property holds the function's return value
pub const PROPERTY_FLAG_RETURN_PARM: u64 = 0x0000_0000_0000_0400;

/// Property is passed by reference
pub const PROPERTY_FLAG_REFERENCE_PARM: u64 = 0x0000_0000_0800_0000;

/// One link in a function's parameter property chain
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PropertyInfo {
    /// Null-terminated property name, owned by the host
    pub name: *const c_char,
    /// Byte offset inside the parameter block
    pub offset: i32,
    /// Size of a single element in bytes
    pub element_size: i32,
    /// Static array dimension (1 for scalars)
    pub array_dim: i32,
    /// Combination of `PROPERTY_FLAG_*` bits
    pub flags: u64,
}

impl Default for PropertyInfo {
    fn default() -> Self {
        Self {
            name: std::ptr::null(),
            offset: 0,
            element_size: 0,
            array_dim: 1,
            flags: 0,
        }
    }
}
