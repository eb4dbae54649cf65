//! Function descriptors and parameter block layouts
//!
//! A [`FunctionDescriptor`] is built once per (class, method) pair by the
//! object registry and cached for the rest of the host session. Its
//! [`ParamLayout`] is derived from the method's parameter property chain.

use bitflags::bitflags;

use coopbridge_engine::PropertyDesc;
use coopbridge_sdk::{
    PROPERTY_FLAG_OUT_PARM, PROPERTY_FLAG_PARM, PROPERTY_FLAG_REFERENCE_PARM,
    PROPERTY_FLAG_RETURN_PARM,
};

use super::invoker::InvokeError;
use crate::registry::ObjectHandle;

bitflags! {
    /// Parameter property flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParamFlags: u64 {
        const PARM = PROPERTY_FLAG_PARM;
        const OUT_PARM = PROPERTY_FLAG_OUT_PARM;
        const RETURN_PARM = PROPERTY_FLAG_RETURN_PARM;
        const REFERENCE_PARM = PROPERTY_FLAG_REFERENCE_PARM;
    }
}

/// One named region of a parameter block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSlot {
    pub name: String,
    pub offset: usize,
    pub size: usize,
    pub flags: ParamFlags,
}

impl ParamSlot {
    /// One past the last byte of the slot
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    /// True if the callee writes this slot
    pub fn is_output(&self) -> bool {
        self.flags
            .intersects(ParamFlags::OUT_PARM | ParamFlags::RETURN_PARM)
    }

    /// Natural alignment assumed for the slot's type
    fn alignment(&self) -> usize {
        match self.size {
            0 | 1 => 1,
            2 | 3 => 2,
            4..=7 => 4,
            _ => 8,
        }
    }
}

/// Byte layout of a function's parameter block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamLayout {
    slots: Vec<ParamSlot>,
    size: usize,
}

impl ParamLayout {
    /// Build a layout from a property chain
    ///
    /// The block size is the end of the furthest property, rounded up to the
    /// largest property alignment.
    pub fn from_properties(properties: &[PropertyDesc]) -> Self {
        let slots: Vec<ParamSlot> = properties
            .iter()
            .map(|p| ParamSlot {
                name: p.name.clone(),
                offset: p.offset,
                size: p.size,
                flags: ParamFlags::from_bits_retain(p.flags),
            })
            .collect();

        let end = slots.iter().map(ParamSlot::end).max().unwrap_or(0);
        let align = slots.iter().map(ParamSlot::alignment).max().unwrap_or(1);
        let size = end.div_ceil(align) * align;

        Self { slots, size }
    }

    /// Total block size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots in property chain order
    pub fn slots(&self) -> &[ParamSlot] {
        &self.slots
    }

    /// Find a slot by property name
    pub fn slot(&self, name: &str) -> Option<&ParamSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    /// Slots written by the callee
    pub fn outputs(&self) -> impl Iterator<Item = &ParamSlot> {
        self.slots.iter().filter(|slot| slot.is_output())
    }
}

/// Resolved host member function
///
/// Immutable after creation. One per (class, method) pair, shared through an
/// `Arc` from the registry cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    owning_class: ObjectHandle,
    function: ObjectHandle,
    class_name: String,
    name: String,
    layout: ParamLayout,
}

impl FunctionDescriptor {
    pub fn new(
        owning_class: ObjectHandle,
        function: ObjectHandle,
        class_name: impl Into<String>,
        name: impl Into<String>,
        layout: ParamLayout,
    ) -> Self {
        Self {
            owning_class,
            function,
            class_name: class_name.into(),
            name: name.into(),
            layout,
        }
    }

    pub fn owning_class(&self) -> ObjectHandle {
        self.owning_class
    }

    pub fn function(&self) -> ObjectHandle {
        self.function
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &ParamLayout {
        &self.layout
    }

    /// Parameter block size in bytes
    #[inline]
    pub fn param_block_size(&self) -> usize {
        self.layout.size()
    }

    /// Look up a parameter slot, failing with a layout error if the host
    /// build does not have it
    pub fn slot(&self, name: &str) -> Result<&ParamSlot, InvokeError> {
        self.layout
            .slot(name)
            .ok_or_else(|| InvokeError::MissingParam {
                function: self.name.clone(),
                param: name.to_string(),
            })
    }

    /// Check the block size against what a typed parameter struct expects
    pub fn expect_size(&self, expected: usize) -> Result<(), InvokeError> {
        if self.param_block_size() == expected {
            Ok(())
        } else {
            Err(InvokeError::SizeMismatch {
                function: self.name.clone(),
                expected,
                found: self.param_block_size(),
            })
        }
    }
}
