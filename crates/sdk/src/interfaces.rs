//! Host reflection type definitions
//!
//! These are opaque types representing entries in the host's reflection store.
//! We don't need their internal structure - just pointers.
//! All access goes through the [`HostApi`] function table provided by the loader.

use std::ffi::{c_char, c_void};

use crate::property::PropertyInfo;

/// ABI revision of [`HostApi`]. The loader must pass a table with this value.
pub const HOST_API_VERSION: u32 = 1;

/// Opaque type for a live host object (any reflection store entry)
#[repr(C)]
pub struct UObject {
    _opaque: [u8; 0],
}

/// Opaque type for a host class descriptor
#[repr(C)]
pub struct UClass {
    _opaque: [u8; 0],
}

/// Opaque type for a host member function descriptor
#[repr(C)]
pub struct UFunction {
    _opaque: [u8; 0],
}

/// Type tag reported for plain object instances
pub const TYPE_TAG_OBJECT: u32 = 0;

/// Type tag reported for class descriptors
pub const TYPE_TAG_CLASS: u32 = 1;

/// Type tag reported for function descriptors
pub const TYPE_TAG_FUNCTION: u32 = 2;

/// Type tag reported for anything the loader cannot classify
pub const TYPE_TAG_UNKNOWN: u32 = u32::MAX;

/// Object flag: entry is a class default object / archetype, not a live instance
pub const OBJECT_FLAG_TEMPLATE: u32 = 0x01;

/// Object flag: entry is pending destruction
pub const OBJECT_FLAG_PENDING_KILL: u32 = 0x02;

/// `bool IsReady(ctx)` - true once the host has populated its reflection store
pub type IsReadyFn = unsafe extern "C" fn(ctx: *mut c_void) -> bool;

/// `size_t ObjectCount(ctx)` - number of slots in the global object array
pub type ObjectCountFn = unsafe extern "C" fn(ctx: *mut c_void) -> usize;

/// `UObject* ObjectAt(ctx, index)` - slot contents, null for free slots
pub type ObjectAtFn = unsafe extern "C" fn(ctx: *mut c_void, index: usize) -> *mut UObject;

/// `size_t FullName(ctx, obj, buf, cap)`
///
/// Writes the dotted full name (without terminator) into `buf` and returns the
/// full length, which may exceed `cap` if the buffer was too small.
pub type FullNameFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    object: *mut UObject,
    buf: *mut c_char,
    cap: usize,
) -> usize;

/// `UClass* ClassOf(ctx, obj)`
pub type ClassOfFn = unsafe extern "C" fn(ctx: *mut c_void, object: *mut UObject) -> *mut UClass;

/// `uint32 TypeTag(ctx, obj)` - one of the `TYPE_TAG_*` constants
pub type TypeTagFn = unsafe extern "C" fn(ctx: *mut c_void, object: *mut UObject) -> u32;

/// `uint32 ObjectFlags(ctx, obj)` - combination of `OBJECT_FLAG_*` bits
pub type ObjectFlagsFn = unsafe extern "C" fn(ctx: *mut c_void, object: *mut UObject) -> u32;

/// `UFunction* FindFunction(ctx, class, name)`
pub type FindFunctionFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    class: *mut UClass,
    name: *const c_char,
) -> *mut UFunction;

/// `size_t PropertyCount(ctx, fn)` - length of the function's parameter property chain
pub type PropertyCountFn = unsafe extern "C" fn(ctx: *mut c_void, function: *mut UFunction) -> usize;

/// `bool PropertyAt(ctx, fn, index, out)` - fill `out` with the property at `index`
pub type PropertyAtFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    function: *mut UFunction,
    index: usize,
    out: *mut PropertyInfo,
) -> bool;

/// `void ProcessEvent(ctx, target, fn, params)` - the host's universal dispatcher
pub type ProcessEventFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    target: *mut UObject,
    function: *mut UFunction,
    params: *mut c_void,
);

/// Function table handed to the plugin by the loader
///
/// Every entry is required; a `None` entry fails the load.
/// The table and `ctx` must stay valid until the plugin is unloaded.
#[repr(C)]
pub struct HostApi {
    /// Must equal [`HOST_API_VERSION`]
    pub abi_version: u32,
    /// Opaque loader context passed back to every call
    pub ctx: *mut c_void,
    pub is_ready: Option<IsReadyFn>,
    pub object_count: Option<ObjectCountFn>,
    pub object_at: Option<ObjectAtFn>,
    pub full_name: Option<FullNameFn>,
    pub class_of: Option<ClassOfFn>,
    pub type_tag: Option<TypeTagFn>,
    pub object_flags: Option<ObjectFlagsFn>,
    pub find_function: Option<FindFunctionFn>,
    pub property_count: Option<PropertyCountFn>,
    pub property_at: Option<PropertyAtFn>,
    pub process_event: Option<ProcessEventFn>,
}
