//! Parameter blocks
//!
//! A [`ParameterBlock`] is the raw, zero-initialized byte buffer the host's
//! dispatcher reads arguments from and writes outputs to. Values are stored in
//! host byte order at the offsets reported by the function's layout.

use super::invoker::InvokeError;
use super::layout::{FunctionDescriptor, ParamSlot};

/// Scalar types that can be stored in a parameter block
pub trait ParamValue: Copy {
    /// Size in bytes inside the block
    const SIZE: usize;

    fn write_to(self, out: &mut [u8]);

    fn read_from(bytes: &[u8]) -> Self;
}

macro_rules! impl_param_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ParamValue for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn write_to(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_ne_bytes());
                }

                #[inline]
                fn read_from(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_ne_bytes(raw)
                }
            }
        )*
    };
}

impl_param_value!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl ParamValue for bool {
    const SIZE: usize = 1;

    #[inline]
    fn write_to(self, out: &mut [u8]) {
        out[0] = self as u8;
    }

    #[inline]
    fn read_from(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Caller-owned argument buffer for one host call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBlock {
    bytes: Vec<u8>,
}

impl ParameterBlock {
    /// Zero-initialized block of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    /// Zero-initialized block sized for `descriptor`
    pub fn for_descriptor(descriptor: &FunctionDescriptor) -> Self {
        Self::new(descriptor.param_block_size())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn range(&self, offset: usize, size: usize) -> Result<std::ops::Range<usize>, InvokeError> {
        let end = offset.checked_add(size).unwrap_or(usize::MAX);
        if end > self.bytes.len() {
            return Err(InvokeError::OutOfBounds {
                offset,
                size,
                len: self.bytes.len(),
            });
        }
        Ok(offset..end)
    }

    /// Write a value at a raw offset
    pub fn write<T: ParamValue>(&mut self, offset: usize, value: T) -> Result<(), InvokeError> {
        let range = self.range(offset, T::SIZE)?;
        value.write_to(&mut self.bytes[range]);
        Ok(())
    }

    /// Read a value at a raw offset
    pub fn read<T: ParamValue>(&self, offset: usize) -> Result<T, InvokeError> {
        let range = self.range(offset, T::SIZE)?;
        Ok(T::read_from(&self.bytes[range]))
    }

    /// Write a value into a named slot, checking the slot size
    pub fn write_slot<T: ParamValue>(&mut self, slot: &ParamSlot, value: T) -> Result<(), InvokeError> {
        check_slot::<T>(slot)?;
        self.write(slot.offset, value)
    }

    /// Read a value from a named slot, checking the slot size
    pub fn read_slot<T: ParamValue>(&self, slot: &ParamSlot) -> Result<T, InvokeError> {
        check_slot::<T>(slot)?;
        self.read(slot.offset)
    }
}

fn check_slot<T: ParamValue>(slot: &ParamSlot) -> Result<(), InvokeError> {
    if slot.size == T::SIZE {
        Ok(())
    } else {
        Err(InvokeError::SlotSize {
            param: slot.name.clone(),
            expected: T::SIZE,
            found: slot.size,
        })
    }
}

/// Typed parameter struct bound to a host function
///
/// Implemented by `#[derive(ParamBlock)]`.
pub trait ParamBlock: Sized {
    /// Host method name
    const FUNCTION: &'static str;

    /// Block size this struct was written against
    const SIZE: usize;

    /// Host property names, in field order
    const PROPERTIES: &'static [&'static str];

    /// Lay the fields out into a fresh block
    fn encode(&self, descriptor: &FunctionDescriptor) -> Result<ParameterBlock, InvokeError>;

    /// Copy `#[param(out)]` fields back from a block after the call
    fn decode_outputs(
        &mut self,
        descriptor: &FunctionDescriptor,
        block: &ParameterBlock,
    ) -> Result<(), InvokeError>;
}
