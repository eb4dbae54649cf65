//! Object handles
//!
//! An [`ObjectHandle`] is an opaque, non-owning reference to a reflection
//! store entry. The store is owned entirely by the host; a handle is only
//! invalidated by host teardown or a registry reload, never by us.

use std::fmt;

use coopbridge_engine::RawObject;

/// Non-owning reference to a host reflection entry
///
/// Two handles compare equal iff they refer to the same host entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    raw: RawObject,
}

impl ObjectHandle {
    /// Wrap a raw store entry
    #[inline]
    pub const fn from_raw(raw: RawObject) -> Self {
        Self { raw }
    }

    /// A handle that refers to nothing
    #[inline]
    pub const fn null() -> Self {
        Self::from_raw(RawObject::NULL)
    }

    /// Get the raw store entry
    #[inline]
    pub const fn raw(&self) -> RawObject {
        self.raw
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.raw.is_null()
    }
}

impl Default for ObjectHandle {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "ObjectHandle(null)")
        } else {
            write!(f, "ObjectHandle({:#x})", self.raw.addr())
        }
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.raw.addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_equality() {
        let a = ObjectHandle::from_raw(RawObject::from_addr(0x1000));
        let b = ObjectHandle::from_raw(RawObject::from_addr(0x1000));
        let c = ObjectHandle::from_raw(RawObject::from_addr(0x2000));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_null());
        assert!(ObjectHandle::default().is_null());
    }

    #[test]
    fn test_handle_debug() {
        assert_eq!(format!("{:?}", ObjectHandle::null()), "ObjectHandle(null)");
        let handle = ObjectHandle::from_raw(RawObject::from_addr(0x10));
        assert_eq!(format!("{:?}", handle), "ObjectHandle(0x10)");
    }
}
