//! The host reflection interface
//!
//! [`ReflectionHost`] is the only way the rest of the framework touches the
//! host's reflection store. The primitives map one-to-one onto the loader's
//! function table; the lookups built on top of them (`find_object_by_full_name`,
//! `enumerate_class_instances`) are default methods so every implementation
//! walks the store the same way.

use std::ffi::c_void;
use std::fmt;

use coopbridge_sdk::{TYPE_TAG_CLASS, TYPE_TAG_FUNCTION, TYPE_TAG_OBJECT};

/// Address of a reflection store entry
///
/// Non-owning. The host owns every entry for the lifetime of the process;
/// we never free through one of these.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawObject(usize);

impl RawObject {
    /// The null entry
    pub const NULL: RawObject = RawObject(0);

    /// Wrap a raw pointer
    #[inline]
    pub fn from_ptr<T>(ptr: *mut T) -> Self {
        Self(ptr as usize)
    }

    /// Wrap a raw address
    #[inline]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw pointer
    #[inline]
    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    /// Get the raw address
    #[inline]
    pub const fn addr(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Convert to `None` when null
    #[inline]
    pub fn non_null(self) -> Option<Self> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawObject({:#x})", self.0)
    }
}

impl From<*mut c_void> for RawObject {
    fn from(ptr: *mut c_void) -> Self {
        Self::from_ptr(ptr)
    }
}

/// Kind of reflection store entry, used for handle sanity checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Object,
    Class,
    Function,
    Unknown,
}

impl TypeTag {
    /// Decode a `TYPE_TAG_*` value from the loader
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            TYPE_TAG_OBJECT => Self::Object,
            TYPE_TAG_CLASS => Self::Class,
            TYPE_TAG_FUNCTION => Self::Function,
            _ => Self::Unknown,
        }
    }
}

/// Owned copy of one link in a function's parameter property chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDesc {
    pub name: String,
    /// Byte offset inside the parameter block
    pub offset: usize,
    /// Total byte size (element size times array dimension)
    pub size: usize,
    /// Raw `PROPERTY_FLAG_*` bits
    pub flags: u64,
}

/// Access to the host's reflection store
///
/// Implementations must be callable from any thread for the read-only
/// primitives. [`process_event`](Self::process_event) must only ever be
/// called on the game thread.
pub trait ReflectionHost: Send + Sync {
    /// True once the host has populated its reflection store
    fn is_ready(&self) -> bool;

    /// Number of slots in the global object array
    fn object_count(&self) -> usize;

    /// Entry in slot `index`, `None` for free slots
    fn object_at(&self, index: usize) -> Option<RawObject>;

    /// Dotted full name ("Package.Outer.Inner")
    fn full_name(&self, object: RawObject) -> Option<String>;

    /// Class descriptor of an entry
    fn class_of(&self, object: RawObject) -> Option<RawObject>;

    /// Kind of entry
    fn type_tag(&self, object: RawObject) -> TypeTag;

    /// True for class default objects and archetypes
    fn is_template(&self, object: RawObject) -> bool;

    /// Method lookup on a class descriptor
    fn find_function(&self, class: RawObject, name: &str) -> Option<RawObject>;

    /// Parameter property chain of a function descriptor, in chain order
    fn function_properties(&self, function: RawObject) -> Vec<PropertyDesc>;

    /// Invoke `function` on `target` with a packed parameter block
    ///
    /// # Safety
    /// `params` must point to a writable buffer at least as large as the
    /// function's parameter block, and the call must happen on the game thread.
    unsafe fn process_event(&self, target: RawObject, function: RawObject, params: *mut u8);

    /// First live entry whose full name matches exactly
    ///
    /// Walks the whole store; returns `None` before the store is populated.
    fn find_object_by_full_name(&self, full_name: &str) -> Option<RawObject> {
        if !self.is_ready() {
            return None;
        }

        (0..self.object_count())
            .filter_map(|index| self.object_at(index))
            .find(|&object| self.full_name(object).as_deref() == Some(full_name))
    }

    /// Every live, non-template instance of exactly `class`
    fn enumerate_class_instances(&self, class: RawObject) -> Vec<RawObject> {
        if !self.is_ready() || class.is_null() {
            return Vec::new();
        }

        (0..self.object_count())
            .filter_map(|index| self.object_at(index))
            .filter(|&object| self.type_tag(object) == TypeTag::Object)
            .filter(|&object| self.class_of(object) == Some(class))
            .filter(|&object| !self.is_template(object))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_object_null() {
        assert!(RawObject::NULL.is_null());
        assert_eq!(RawObject::NULL.non_null(), None);
        assert_eq!(RawObject::from_addr(0x1000).non_null(), Some(RawObject::from_addr(0x1000)));
    }

    #[test]
    fn test_type_tag_from_raw() {
        assert_eq!(TypeTag::from_raw(TYPE_TAG_CLASS), TypeTag::Class);
        assert_eq!(TypeTag::from_raw(TYPE_TAG_FUNCTION), TypeTag::Function);
        assert_eq!(TypeTag::from_raw(TYPE_TAG_OBJECT), TypeTag::Object);
        assert_eq!(TypeTag::from_raw(77), TypeTag::Unknown);
    }
}
