//! Host table loading and the FFI-backed [`ReflectionHost`]

use std::ffi::{c_char, c_void, CStr, CString};

use coopbridge_sdk::{
    ClassOfFn, FindFunctionFn, FullNameFn, HostApi, IsReadyFn, ObjectAtFn, ObjectCountFn,
    ObjectFlagsFn, ProcessEventFn, PropertyAtFn, PropertyCountFn, PropertyInfo, TypeTagFn,
    HOST_API_VERSION, OBJECT_FLAG_PENDING_KILL, OBJECT_FLAG_TEMPLATE,
};

use crate::error::HostError;
use crate::host::{PropertyDesc, RawObject, ReflectionHost, TypeTag};

/// Size of the on-stack buffer used for full name queries
const NAME_BUFFER_SIZE: usize = 256;

/// [`ReflectionHost`] backed by the loader's [`HostApi`] function table
///
/// Every function pointer is checked for null once at load, so calls never
/// need to re-check.
pub struct FfiHost {
    ctx: *mut c_void,
    is_ready: IsReadyFn,
    object_count: ObjectCountFn,
    object_at: ObjectAtFn,
    full_name: FullNameFn,
    class_of: ClassOfFn,
    type_tag: TypeTagFn,
    object_flags: ObjectFlagsFn,
    find_function: FindFunctionFn,
    property_count: PropertyCountFn,
    property_at: PropertyAtFn,
    process_event: ProcessEventFn,
}

// SAFETY: The loader guarantees the table and its context outlive the plugin and
// that the read-only entries are callable from any thread. ProcessEvent is only
// called on the game thread (enforced by the invoker).
unsafe impl Send for FfiHost {}
unsafe impl Sync for FfiHost {}

fn required<T>(entry: Option<T>, name: &'static str) -> Result<T, HostError> {
    entry.ok_or(HostError::NullEntry(name))
}

/// Validate a loader-supplied table and wrap it
///
/// # Safety
/// `api` must be null or point to a valid [`HostApi`] that outlives the plugin.
#[tracing::instrument(skip_all)]
pub unsafe fn load_host(api: *const HostApi) -> Result<FfiHost, HostError> {
    let api = api.as_ref().ok_or(HostError::NullTable)?;

    if api.abi_version != HOST_API_VERSION {
        return Err(HostError::VersionMismatch {
            expected: HOST_API_VERSION,
            found: api.abi_version,
        });
    }

    let host = FfiHost {
        ctx: api.ctx,
        is_ready: required(api.is_ready, "is_ready")?,
        object_count: required(api.object_count, "object_count")?,
        object_at: required(api.object_at, "object_at")?,
        full_name: required(api.full_name, "full_name")?,
        class_of: required(api.class_of, "class_of")?,
        type_tag: required(api.type_tag, "type_tag")?,
        object_flags: required(api.object_flags, "object_flags")?,
        find_function: required(api.find_function, "find_function")?,
        property_count: required(api.property_count, "property_count")?,
        property_at: required(api.property_at, "property_at")?,
        process_event: required(api.process_event, "process_event")?,
    };

    tracing::info!("Host API table loaded (ctx={:p})", api.ctx);
    Ok(host)
}

impl FfiHost {
    fn flags(&self, object: RawObject) -> u32 {
        unsafe { (self.object_flags)(self.ctx, object.as_ptr()) }
    }
}

impl ReflectionHost for FfiHost {
    fn is_ready(&self) -> bool {
        unsafe { (self.is_ready)(self.ctx) }
    }

    fn object_count(&self) -> usize {
        unsafe { (self.object_count)(self.ctx) }
    }

    fn object_at(&self, index: usize) -> Option<RawObject> {
        let object = RawObject::from_ptr(unsafe { (self.object_at)(self.ctx, index) });
        let object = object.non_null()?;

        if self.flags(object) & OBJECT_FLAG_PENDING_KILL != 0 {
            return None;
        }
        Some(object)
    }

    fn full_name(&self, object: RawObject) -> Option<String> {
        if object.is_null() {
            return None;
        }

        let mut buf = [0u8; NAME_BUFFER_SIZE];
        let len = unsafe {
            (self.full_name)(
                self.ctx,
                object.as_ptr(),
                buf.as_mut_ptr() as *mut c_char,
                buf.len(),
            )
        };

        if len == 0 {
            return None;
        }
        if len <= buf.len() {
            return Some(String::from_utf8_lossy(&buf[..len]).into_owned());
        }

        // Name longer than the stack buffer: ask again with an exact fit
        let mut heap = vec![0u8; len];
        let written = unsafe {
            (self.full_name)(
                self.ctx,
                object.as_ptr(),
                heap.as_mut_ptr() as *mut c_char,
                heap.len(),
            )
        };
        heap.truncate(written.min(len));
        Some(String::from_utf8_lossy(&heap).into_owned())
    }

    fn class_of(&self, object: RawObject) -> Option<RawObject> {
        if object.is_null() {
            return None;
        }
        RawObject::from_ptr(unsafe { (self.class_of)(self.ctx, object.as_ptr()) }).non_null()
    }

    fn type_tag(&self, object: RawObject) -> TypeTag {
        if object.is_null() {
            return TypeTag::Unknown;
        }
        TypeTag::from_raw(unsafe { (self.type_tag)(self.ctx, object.as_ptr()) })
    }

    fn is_template(&self, object: RawObject) -> bool {
        !object.is_null() && self.flags(object) & OBJECT_FLAG_TEMPLATE != 0
    }

    fn find_function(&self, class: RawObject, name: &str) -> Option<RawObject> {
        if class.is_null() {
            return None;
        }
        let name = CString::new(name).ok()?;
        let function =
            unsafe { (self.find_function)(self.ctx, class.as_ptr(), name.as_ptr()) };
        RawObject::from_ptr(function).non_null()
    }

    fn function_properties(&self, function: RawObject) -> Vec<PropertyDesc> {
        if function.is_null() {
            return Vec::new();
        }

        let count = unsafe { (self.property_count)(self.ctx, function.as_ptr()) };
        let mut properties = Vec::with_capacity(count);

        for index in 0..count {
            let mut info = PropertyInfo::default();
            let ok = unsafe { (self.property_at)(self.ctx, function.as_ptr(), index, &mut info) };
            if !ok || info.name.is_null() {
                tracing::warn!("Property {} of {:?} unreadable, skipping", index, function);
                continue;
            }

            let name = unsafe { CStr::from_ptr(info.name) }
                .to_string_lossy()
                .into_owned();
            let size = (info.element_size.max(0) as usize) * (info.array_dim.max(1) as usize);

            properties.push(PropertyDesc {
                name,
                offset: info.offset.max(0) as usize,
                size,
                flags: info.flags,
            });
        }

        properties
    }

    unsafe fn process_event(&self, target: RawObject, function: RawObject, params: *mut u8) {
        (self.process_event)(
            self.ctx,
            target.as_ptr(),
            function.as_ptr(),
            params as *mut c_void,
        );
    }
}
